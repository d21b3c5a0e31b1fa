//! # Ferry Redmine Import
//!
//! Import engine that copies a Redmine project into a Ferry tracker store.
//!
//! ## Stages
//!
//! - **Options**: read statuses, trackers and priorities from Redmine and
//!   map each one to a target state or field value
//! - **Versions**: create a milestone per version, including its wiki page
//! - **Categories**: create a choice field listing the project's categories
//! - **Issues**: convert issues with their comments and change history,
//!   renumber `#123` references, and save them unless dry running
//!
//! ## Example
//!
//! ```rust,ignore
//! use ferry_migrate::{ImportServer, RedmineImporter};
//! use ferry_tracker::MemoryStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let server = ImportServer::new("https://redmine.example.com").with_api_key("secret");
//!     let importer = RedmineImporter::new(server, Arc::new(MemoryStore::new()));
//!
//!     let option = importer
//!         .build_import_option()
//!         .await?
//!         .map_tracker("Support", "Type::Task")
//!         .with_dry_run(false);
//!
//!     let result = importer.run("Acme:acme", "acme", &option).await?;
//!     result.print_summary();
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;
pub mod history;
pub mod identity;
pub mod importer;
pub mod mapping;
pub mod paginate;
pub mod progress;
pub mod renumber;
pub mod source;
pub mod transform;
pub mod types;

// Re-export main types
pub use client::{ImportServer, RedmineClient};
pub use error::{MigrationError, Result};
pub use history::{HistoryReplayer, SourceLookups};
pub use identity::IdentityCache;
pub use importer::{RedmineImporter, RunState};
pub use mapping::{
    FieldAssignment, MappingDomain, MappingEntry, MappingTable, Mappings, PriorityDomain,
    StatusDomain, TrackerDomain,
};
pub use paginate::{list_all, Pages};
pub use progress::{ConsoleProgressReporter, ImportPhase, MigrationProgress, ProgressCallback};
pub use renumber::{NumberMapping, Renumberer};
pub use transform::IssueTransformer;
pub use types::*;

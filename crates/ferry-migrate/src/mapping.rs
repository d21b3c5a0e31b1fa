//! Mapping of Redmine statuses, trackers and priorities onto the target
//! issue setting.
//!
//! All three mappings share one shape: a table of `source → target` entries
//! seeded with defaults from the live source values, then overridden by the
//! operator, then compiled against the issue setting at import time.

use ferry_tracker::IssueSetting;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use tracing::warn;

use crate::error::{MigrationError, Result};

/// A value domain a [`MappingTable`] maps into.
pub trait MappingDomain {
    /// Human-readable name of the source concept.
    const KIND: &'static str;

    /// Built-in targets for well-known Redmine values.
    const DEFAULTS: &'static [(&'static str, &'static str)];

    /// Compiled target type.
    type Target: Clone + fmt::Debug;

    /// Target used when the setting already declares the source value itself.
    fn direct_target(source: &str, setting: &IssueSetting) -> Option<String>;

    /// Validate a configured target against the setting.
    fn compile(target: &str, setting: &IssueSetting) -> Result<Self::Target>;
}

/// Redmine issue status → target state name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusDomain;

/// Redmine tracker → `field::value` assignment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackerDomain;

/// Redmine priority → `field::value` assignment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PriorityDomain;

/// A resolved custom field assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldAssignment {
    pub field: String,
    pub value: String,
}

impl MappingDomain for StatusDomain {
    const KIND: &'static str = "status";

    const DEFAULTS: &'static [(&'static str, &'static str)] = &[
        ("New", "Open"),
        ("In Progress", "Open"),
        ("Resolved", "Open"),
        ("Feedback", "Open"),
        ("Closed", "Closed"),
        ("Rejected", "Closed"),
    ];

    type Target = String;

    fn direct_target(source: &str, setting: &IssueSetting) -> Option<String> {
        setting.has_state(source).then(|| source.to_string())
    }

    fn compile(target: &str, setting: &IssueSetting) -> Result<String> {
        if !setting.has_state(target) {
            warn!(state = target, "Status mapped to a state the issue setting does not declare");
        }
        Ok(target.to_string())
    }
}

impl MappingDomain for TrackerDomain {
    const KIND: &'static str = "tracker";

    const DEFAULTS: &'static [(&'static str, &'static str)] = &[
        ("Bug", "Type::Bug"),
        ("Feature", "Type::New Feature"),
        ("Task", "Type::Task"),
    ];

    type Target = FieldAssignment;

    fn direct_target(source: &str, setting: &IssueSetting) -> Option<String> {
        declared_choice("Type", source, setting)
    }

    fn compile(target: &str, setting: &IssueSetting) -> Result<FieldAssignment> {
        compile_field_target(target, setting)
    }
}

impl MappingDomain for PriorityDomain {
    const KIND: &'static str = "priority";

    const DEFAULTS: &'static [(&'static str, &'static str)] = &[
        ("Low", "Priority::Minor"),
        ("Normal", "Priority::Normal"),
        ("High", "Priority::Major"),
        ("Urgent", "Priority::Critical"),
        ("Immediate", "Priority::Critical"),
    ];

    type Target = FieldAssignment;

    fn direct_target(source: &str, setting: &IssueSetting) -> Option<String> {
        declared_choice("Priority", source, setting)
    }

    fn compile(target: &str, setting: &IssueSetting) -> Result<FieldAssignment> {
        compile_field_target(target, setting)
    }
}

fn declared_choice(field: &str, source: &str, setting: &IssueSetting) -> Option<String> {
    setting
        .field_spec(field)
        .filter(|spec| spec.has_choice(source))
        .map(|_| format!("{field}::{source}"))
}

fn compile_field_target(target: &str, setting: &IssueSetting) -> Result<FieldAssignment> {
    let (field, value) = target.split_once("::").ok_or_else(|| {
        MigrationError::InvalidConfig(format!(
            "field mapping '{target}' must have the form 'Field::Value'"
        ))
    })?;

    let spec = setting
        .field_spec(field)
        .ok_or_else(|| MigrationError::UnknownField(field.to_string()))?;

    Ok(FieldAssignment {
        field: spec.name.clone(),
        value: value.to_string(),
    })
}

/// One `source → target` row. A `None` target leaves the value unmapped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub source: String,
    pub target: Option<String>,
}

/// Ordered mapping table for one domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent, bound = "")]
pub struct MappingTable<D> {
    entries: Vec<MappingEntry>,
    #[serde(skip)]
    _domain: PhantomData<D>,
}

impl<D> Default for MappingTable<D> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            _domain: PhantomData,
        }
    }
}

impl<D: MappingDomain> MappingTable<D> {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds one row per source value with its default target.
    ///
    /// A source value already declared by the setting maps to itself;
    /// otherwise the built-in default applies; otherwise it stays unmapped.
    pub fn with_defaults<I, S>(sources: I, setting: &IssueSetting) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = Self::new();
        for source in sources {
            let source = source.into();
            let target = Self::default_target(&source, setting);
            table.set(source, target);
        }
        table
    }

    /// Default target for a single source value.
    pub fn default_target(source: &str, setting: &IssueSetting) -> Option<String> {
        D::direct_target(source, setting).or_else(|| {
            D::DEFAULTS
                .iter()
                .find(|(s, _)| *s == source)
                .map(|(_, t)| (*t).to_string())
        })
    }

    /// Sets the target of a source value, replacing any existing row.
    pub fn set(&mut self, source: impl Into<String>, target: Option<String>) {
        let source = source.into();
        match self.entries.iter_mut().find(|e| e.source == source) {
            Some(entry) => entry.target = target,
            None => self.entries.push(MappingEntry { source, target }),
        }
    }

    /// Rows in insertion order.
    pub fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }

    /// Configured target of a source value.
    pub fn target(&self, source: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.source == source)
            .and_then(|e| e.target.as_deref())
    }

    /// Validates every target against the setting.
    ///
    /// # Errors
    ///
    /// Fails on the first target naming an undeclared field, which aborts
    /// the run before any issue is touched.
    pub fn compile(&self, setting: &IssueSetting) -> Result<CompiledMapping<D>> {
        let mut targets = HashMap::with_capacity(self.entries.len());
        for entry in &self.entries {
            if let Some(target) = &entry.target {
                targets.insert(entry.source.clone(), D::compile(target, setting)?);
            }
        }
        Ok(CompiledMapping { targets })
    }
}

/// A mapping table validated against the issue setting.
#[derive(Debug, Clone)]
pub struct CompiledMapping<D: MappingDomain> {
    targets: HashMap<String, D::Target>,
}

impl<D: MappingDomain> CompiledMapping<D> {
    /// Target of a source value, `None` if unmapped.
    pub fn resolve(&self, source: &str) -> Option<&D::Target> {
        self.targets.get(source)
    }
}

/// The three compiled mappings used while importing issues.
#[derive(Debug, Clone)]
pub struct Mappings {
    pub status: CompiledMapping<StatusDomain>,
    pub tracker: CompiledMapping<TrackerDomain>,
    pub priority: CompiledMapping<PriorityDomain>,
}

impl Mappings {
    pub fn compile(option: &crate::ImportOption, setting: &IssueSetting) -> Result<Self> {
        Ok(Self {
            status: option.status_mappings.compile(setting)?,
            tracker: option.tracker_mappings.compile(setting)?,
            priority: option.priority_mappings.compile(setting)?,
        })
    }
}

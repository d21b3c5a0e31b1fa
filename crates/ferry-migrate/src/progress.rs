//! Progress tracking for import runs.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

/// Callback type for progress updates.
pub type ProgressCallback = Box<dyn Fn(ProgressUpdate) + Send + Sync>;

/// Progress update information.
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// Current phase of the import.
    pub phase: ImportPhase,

    /// Current item being processed.
    pub current_item: Option<String>,

    /// Items completed in current phase.
    pub completed: u64,

    /// Total items in current phase, 0 when unknown.
    pub total: u64,

    /// Optional message.
    pub message: Option<String>,
}

/// Phases of an import run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ImportPhase {
    /// Reading statuses, trackers and priorities.
    BuildingOptions = 0,
    /// Creating milestones from versions.
    ImportingVersions = 1,
    /// Creating the category field.
    ImportingCategories = 2,
    /// Converting issues.
    ImportingIssues = 3,
    /// Writing issues to the store.
    Persisting = 4,
    /// Run complete.
    Complete = 5,
}

impl ImportPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::BuildingOptions,
            1 => Self::ImportingVersions,
            2 => Self::ImportingCategories,
            3 => Self::ImportingIssues,
            4 => Self::Persisting,
            _ => Self::Complete,
        }
    }
}

impl std::fmt::Display for ImportPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BuildingOptions => write!(f, "Reading Redmine settings"),
            Self::ImportingVersions => write!(f, "Importing versions"),
            Self::ImportingCategories => write!(f, "Importing categories"),
            Self::ImportingIssues => write!(f, "Importing issues"),
            Self::Persisting => write!(f, "Saving issues"),
            Self::Complete => write!(f, "Complete"),
        }
    }
}

/// Progress tracker for import runs.
pub struct MigrationProgress {
    phase: AtomicU8,
    completed: AtomicU64,
    total: AtomicU64,
    callback: Option<Arc<ProgressCallback>>,
}

impl MigrationProgress {
    /// Create a new progress tracker.
    pub fn new() -> Self {
        Self {
            phase: AtomicU8::new(ImportPhase::BuildingOptions as u8),
            completed: AtomicU64::new(0),
            total: AtomicU64::new(0),
            callback: None,
        }
    }

    /// Create a progress tracker with a callback.
    pub fn with_callback(callback: ProgressCallback) -> Self {
        Self {
            callback: Some(Arc::new(callback)),
            ..Self::new()
        }
    }

    /// Set the current phase.
    pub fn set_phase(&self, phase: ImportPhase, total: u64) {
        self.phase.store(phase as u8, Ordering::SeqCst);
        self.completed.store(0, Ordering::SeqCst);
        self.total.store(total, Ordering::SeqCst);
        self.notify(None, None);
    }

    /// Raise the expected total of the current phase.
    pub fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::SeqCst);
    }

    /// Increment progress.
    pub fn increment(&self, item: Option<&str>) {
        self.completed.fetch_add(1, Ordering::SeqCst);
        self.notify(item.map(|s| s.to_string()), None);
    }

    /// Set a message.
    pub fn message(&self, msg: &str) {
        self.notify(None, Some(msg.to_string()));
    }

    /// Items completed in the current phase.
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    /// Get current progress percentage.
    pub fn percentage(&self) -> f64 {
        let total = self.total.load(Ordering::SeqCst);
        if total == 0 {
            return 0.0;
        }
        let completed = self.completed.load(Ordering::SeqCst);
        (completed as f64 / total as f64) * 100.0
    }

    /// Get current phase.
    pub fn current_phase(&self) -> ImportPhase {
        ImportPhase::from_u8(self.phase.load(Ordering::SeqCst))
    }

    fn notify(&self, current_item: Option<String>, message: Option<String>) {
        if let Some(callback) = &self.callback {
            let update = ProgressUpdate {
                phase: self.current_phase(),
                current_item,
                completed: self.completed.load(Ordering::SeqCst),
                total: self.total.load(Ordering::SeqCst),
                message,
            };
            callback(update);
        }
    }
}

impl Default for MigrationProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Console progress reporter using indicatif.
pub struct ConsoleProgressReporter {
    progress_bar: indicatif::ProgressBar,
}

impl ConsoleProgressReporter {
    /// Create a new console progress reporter.
    pub fn new() -> Self {
        let progress_bar = indicatif::ProgressBar::new(0);
        if let Ok(style) = indicatif::ProgressStyle::default_bar().template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        ) {
            progress_bar.set_style(style.progress_chars("#>-"));
        }
        Self { progress_bar }
    }

    /// Create a progress callback for use with an import run.
    pub fn callback(&self) -> ProgressCallback {
        let pb = self.progress_bar.clone();
        Box::new(move |update: ProgressUpdate| {
            pb.set_length(update.total.max(update.completed));
            pb.set_position(update.completed);

            let mut msg = update.phase.to_string();
            if let Some(item) = &update.current_item {
                msg = format!("{msg}: {item}");
            }
            if let Some(message) = &update.message {
                msg = format!("{msg} - {message}");
            }
            pb.set_message(msg);
        })
    }

    /// Finish the progress bar.
    pub fn finish(&self, message: &str) {
        self.progress_bar.finish_with_message(message.to_string());
    }

    /// Remove the bar, e.g. before printing an error.
    pub fn abandon(&self) {
        self.progress_bar.finish_and_clear();
    }
}

impl Default for ConsoleProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_tracker() {
        let progress = MigrationProgress::new();
        assert_eq!(progress.current_phase(), ImportPhase::BuildingOptions);

        progress.set_phase(ImportPhase::ImportingIssues, 10);
        assert_eq!(progress.current_phase(), ImportPhase::ImportingIssues);
        assert_eq!(progress.percentage(), 0.0);

        progress.increment(Some("#1"));
        assert!((progress.percentage() - 10.0).abs() < 0.01);

        for _ in 0..9 {
            progress.increment(None);
        }
        assert_eq!(progress.completed(), 10);
        assert!((progress.percentage() - 100.0).abs() < 0.01);
    }

    #[test]
    fn test_progress_with_callback() {
        use std::sync::atomic::AtomicUsize;
        use std::sync::Mutex;

        let phases = Arc::new(Mutex::new(Vec::new()));
        let calls = Arc::new(AtomicUsize::new(0));
        let (phases_clone, calls_clone) = (phases.clone(), calls.clone());

        let progress = MigrationProgress::with_callback(Box::new(move |update| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            phases_clone.lock().unwrap().push(update.phase);
        }));

        progress.set_phase(ImportPhase::ImportingVersions, 2);
        progress.increment(None);
        progress.set_phase(ImportPhase::Complete, 0);

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            *phases.lock().unwrap(),
            vec![
                ImportPhase::ImportingVersions,
                ImportPhase::ImportingVersions,
                ImportPhase::Complete
            ]
        );
    }
}

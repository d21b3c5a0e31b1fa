//! Persistence interface and an in-memory implementation.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::{
    Issue, IssueChange, IssueComment, IssueField, IssueSchedule, IssueSetting, Milestone, Result,
    TrackerError, User,
};

/// Persistence operations the import engine relies on.
///
/// An issue is saved first; its field values, schedules, comments and
/// changes are then persisted individually against the returned issue id.
#[async_trait]
pub trait TrackerStore: Send + Sync {
    /// Fetches the global issue setting.
    async fn issue_setting(&self) -> Result<IssueSetting>;

    /// Replaces the global issue setting.
    async fn save_issue_setting(&self, setting: &IssueSetting) -> Result<()>;

    /// Lists the milestones of a project.
    async fn milestones(&self, project: &str) -> Result<Vec<Milestone>>;

    /// Saves a new milestone, returning it with its id assigned.
    async fn save_milestone(&self, milestone: Milestone) -> Result<Milestone>;

    /// Reserves the next free issue number of a project.
    async fn next_issue_number(&self, project: &str) -> Result<u64>;

    /// Saves an issue's own attributes, returning its id.
    async fn save_issue(&self, issue: &Issue) -> Result<u64>;

    /// Persists one field value of a saved issue.
    async fn persist_field(&self, issue_id: u64, field: &IssueField) -> Result<()>;

    /// Persists one milestone association of a saved issue.
    async fn persist_schedule(&self, issue_id: u64, schedule: &IssueSchedule) -> Result<()>;

    /// Persists one comment of a saved issue, returning the comment id.
    async fn persist_comment(&self, issue_id: u64, comment: &IssueComment) -> Result<u64>;

    /// Persists one change record of a saved issue, returning the change id.
    async fn persist_change(&self, issue_id: u64, change: &IssueChange) -> Result<u64>;

    /// Finds a user by email address.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Saves a new user, returning it with its id assigned.
    async fn save_user(&self, user: User) -> Result<User>;

    /// The user substituted for unresolvable accounts.
    fn unknown_user(&self) -> User {
        User::unknown()
    }
}

/// Serializable image of a [`MemoryStore`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    /// Global issue setting.
    pub setting: IssueSetting,
    /// All issues with their records attached.
    pub issues: Vec<Issue>,
    /// All milestones.
    pub milestones: Vec<Milestone>,
    /// All users.
    pub users: Vec<User>,
}

/// In-memory tracker store.
///
/// Thread-safe storage for issues, milestones, users and the issue setting.
#[derive(Default)]
pub struct MemoryStore {
    setting: RwLock<IssueSetting>,
    /// Issues indexed by id.
    issues: RwLock<HashMap<u64, Issue>>,
    /// Issue ids indexed by (project, number).
    numbers: RwLock<HashMap<(String, u64), u64>>,
    /// Last reserved issue number per project.
    issue_counters: RwLock<HashMap<String, u64>>,
    milestones: RwLock<Vec<Milestone>>,
    users: RwLock<Vec<User>>,
    /// Global ID counter for entities.
    next_id: AtomicU64,
}

impl MemoryStore {
    /// Creates a new empty store with the default issue setting.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with the given issue setting.
    pub fn with_setting(setting: IssueSetting) -> Self {
        Self {
            setting: RwLock::new(setting),
            ..Self::default()
        }
    }

    /// Restores a store from a snapshot.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Result<Self> {
        let store = Self::with_setting(snapshot.setting);
        let mut max_id = 0;

        {
            let mut numbers = store.numbers.write();
            let mut issues = store.issues.write();
            for issue in snapshot.issues {
                let key = (issue.project.clone(), issue.number);
                if numbers.contains_key(&key) {
                    return Err(TrackerError::IssueExists {
                        project: issue.project,
                        number: issue.number,
                    });
                }
                max_id = max_id
                    .max(issue.id)
                    .max(issue.comments.iter().map(|c| c.id).max().unwrap_or(0))
                    .max(issue.changes.iter().map(|c| c.id).max().unwrap_or(0));
                numbers.insert(key, issue.id);
                issues.insert(issue.id, issue);
            }
        }

        for milestone in &snapshot.milestones {
            max_id = max_id.max(milestone.id);
        }
        for user in &snapshot.users {
            max_id = max_id.max(user.id);
        }
        *store.milestones.write() = snapshot.milestones;
        *store.users.write() = snapshot.users;
        store.next_id.store(max_id, Ordering::SeqCst);

        Ok(store)
    }

    /// Captures the current contents.
    pub fn snapshot(&self) -> StoreSnapshot {
        let mut issues: Vec<Issue> = self.issues.read().values().cloned().collect();
        issues.sort_by(|a, b| (&a.project, a.number).cmp(&(&b.project, b.number)));

        StoreSnapshot {
            setting: self.setting.read().clone(),
            issues,
            milestones: self.milestones.read().clone(),
            users: self.users.read().clone(),
        }
    }

    /// Generates a new unique ID.
    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Gets an issue by project and number.
    pub fn get_issue(&self, project: &str, number: u64) -> Option<Issue> {
        let id = *self.numbers.read().get(&(project.to_string(), number))?;
        self.issues.read().get(&id).cloned()
    }

    /// Lists the issues of a project ordered by number.
    pub fn list_issues(&self, project: &str) -> Vec<Issue> {
        let mut issues: Vec<Issue> = self
            .issues
            .read()
            .values()
            .filter(|issue| issue.project == project)
            .cloned()
            .collect();
        issues.sort_by_key(|issue| issue.number);
        issues
    }

    /// Total number of stored issues.
    pub fn issue_count(&self) -> usize {
        self.issues.read().len()
    }

    /// Total number of stored milestones.
    pub fn milestone_count(&self) -> usize {
        self.milestones.read().len()
    }

    fn update_issue<F>(&self, issue_id: u64, f: F) -> Result<()>
    where
        F: FnOnce(&mut Issue),
    {
        let mut issues = self.issues.write();
        let issue = issues
            .get_mut(&issue_id)
            .ok_or(TrackerError::IssueNotFound { id: issue_id })?;
        f(issue);
        Ok(())
    }
}

#[async_trait]
impl TrackerStore for MemoryStore {
    async fn issue_setting(&self) -> Result<IssueSetting> {
        Ok(self.setting.read().clone())
    }

    async fn save_issue_setting(&self, setting: &IssueSetting) -> Result<()> {
        *self.setting.write() = setting.clone();
        Ok(())
    }

    async fn milestones(&self, project: &str) -> Result<Vec<Milestone>> {
        Ok(self
            .milestones
            .read()
            .iter()
            .filter(|m| m.project == project)
            .cloned()
            .collect())
    }

    async fn save_milestone(&self, mut milestone: Milestone) -> Result<Milestone> {
        let mut milestones = self.milestones.write();
        if milestones
            .iter()
            .any(|m| m.project == milestone.project && m.name == milestone.name)
        {
            return Err(TrackerError::MilestoneExists {
                project: milestone.project,
                name: milestone.name,
            });
        }

        milestone.id = self.next_id();
        milestones.push(milestone.clone());
        Ok(milestone)
    }

    async fn next_issue_number(&self, project: &str) -> Result<u64> {
        let highest_stored = self
            .numbers
            .read()
            .keys()
            .filter(|(p, _)| p == project)
            .map(|(_, number)| *number)
            .max()
            .unwrap_or(0);

        let mut counters = self.issue_counters.write();
        let counter = counters.entry(project.to_string()).or_insert(0);
        *counter = (*counter).max(highest_stored) + 1;
        Ok(*counter)
    }

    async fn save_issue(&self, issue: &Issue) -> Result<u64> {
        let key = (issue.project.clone(), issue.number);
        let mut numbers = self.numbers.write();

        if numbers.contains_key(&key) {
            return Err(TrackerError::IssueExists {
                project: issue.project.clone(),
                number: issue.number,
            });
        }

        let mut stored = issue.clone();
        stored.id = self.next_id();
        stored.fields.clear();
        stored.schedules.clear();
        stored.comments.clear();
        stored.comment_count = 0;
        stored.changes.clear();

        let id = stored.id;
        numbers.insert(key, id);
        self.issues.write().insert(id, stored);
        Ok(id)
    }

    async fn persist_field(&self, issue_id: u64, field: &IssueField) -> Result<()> {
        self.update_issue(issue_id, |issue| {
            issue.set_field_value(field.name.clone(), field.value.clone());
        })
    }

    async fn persist_schedule(&self, issue_id: u64, schedule: &IssueSchedule) -> Result<()> {
        self.update_issue(issue_id, |issue| issue.add_schedule(schedule.milestone.clone()))
    }

    async fn persist_comment(&self, issue_id: u64, comment: &IssueComment) -> Result<u64> {
        let id = self.next_id();
        let mut comment = comment.clone();
        comment.id = id;
        self.update_issue(issue_id, |issue| issue.add_comment(comment))?;
        Ok(id)
    }

    async fn persist_change(&self, issue_id: u64, change: &IssueChange) -> Result<u64> {
        let id = self.next_id();
        let mut change = change.clone();
        change.id = id;
        self.update_issue(issue_id, |issue| issue.add_change(change))?;
        Ok(id)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .read()
            .iter()
            .find(|u| {
                u.email
                    .as_deref()
                    .is_some_and(|e| e.eq_ignore_ascii_case(email))
            })
            .cloned())
    }

    async fn save_user(&self, mut user: User) -> Result<User> {
        let mut users = self.users.write();
        if let Some(email) = &user.email {
            if users
                .iter()
                .any(|u| u.email.as_deref().is_some_and(|e| e.eq_ignore_ascii_case(email)))
            {
                return Err(TrackerError::UserExists {
                    email: email.clone(),
                });
            }
        }

        user.id = self.next_id();
        users.push(user.clone());
        Ok(user)
    }
}

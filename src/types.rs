use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::{messages::Message, role::Role};

#[derive(Debug, Clone)]
pub struct ClassInfo {
    pub path: PathBuf,
    pub name: String,
    pub project: String,
    pub instructor: String,
    pub role: Role,
    pub assignments: Vec<PathBuf>,
    pub submissions: Vec<PathBuf>,
    /// mtime of the class marker.
    pub created: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct AssignmentInfo {
    pub path: PathBuf,
    pub name: String,
    pub class: String,
    pub project: String,
    pub open: bool,
    pub submissions: Vec<PathBuf>,
    pub created: DateTime<Utc>,
    pub due: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct SubmissionInfo {
    pub path: PathBuf,
    /// Account name, i.e. the directory name.
    pub user: String,
    pub submitter: String,
    pub size: u64,
    pub submitted: DateTime<Utc>,
    pub late: bool,
}

/// Rows for one page plus whatever went wrong while collecting them.
#[derive(Debug)]
pub struct Listing<T> {
    pub rows: Vec<T>,
    pub messages: Vec<Message>,
}

impl<T> Listing<T> {
    pub fn new() -> Self {
        Listing {
            rows: Vec::new(),
            messages: Vec::new(),
        }
    }
}

impl<T> Default for Listing<T> {
    fn default() -> Self {
        Listing::new()
    }
}

impl AssignmentInfo {
    /// Submissions of this assignment are late only against a known due date.
    pub fn is_late(&self, submitted: DateTime<Utc>) -> bool {
        self.due.is_some_and(|due| submitted > due)
    }

    /// Key for "most urgent first": due date, else creation date.
    pub fn urgency(&self) -> DateTime<Utc> {
        self.due.unwrap_or(self.created)
    }
}

pub fn sort_classes(classes: &mut [ClassInfo]) {
    classes.sort_by(|a, b| b.created.cmp(&a.created));
}

pub fn sort_assignments_by_created(assignments: &mut [AssignmentInfo]) {
    assignments.sort_by(|a, b| b.created.cmp(&a.created));
}

pub fn sort_assignments_by_urgency(assignments: &mut [AssignmentInfo]) {
    assignments.sort_by(|a, b| b.urgency().cmp(&a.urgency()));
}

pub fn sort_submissions(submissions: &mut [SubmissionInfo]) {
    submissions.sort_by_cached_key(|s| s.submitter.to_lowercase());
}

//! Marker files: presence-only facts about a directory.

use std::{
    fs::{remove_file, OpenOptions},
    io::ErrorKind,
    path::Path,
};

use crate::{
    config::DashboardConfig,
    error::{DashboardError, Result},
};

pub fn is_class_dir(config: &DashboardConfig, dir: &Path) -> bool {
    dir.join(&config.class_marker).is_file()
}

pub fn is_assignment_dir(config: &DashboardConfig, dir: &Path) -> bool {
    dir.join(&config.assignment_metadata).is_file()
}

pub fn is_open(config: &DashboardConfig, assignment: &Path) -> bool {
    assignment.join(&config.open_sentinel).exists()
}

/// Removes the open sentinel. Already locked is fine.
pub fn lock(config: &DashboardConfig, assignment: &Path) -> Result<()> {
    let sentinel = assignment.join(&config.open_sentinel);
    match remove_file(&sentinel) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(DashboardError::from_io("removing", sentinel, e)),
    }
}

/// Creates an empty open sentinel, leaving an existing one untouched.
pub fn unlock(config: &DashboardConfig, assignment: &Path) -> Result<()> {
    let sentinel = assignment.join(&config.open_sentinel);
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&sentinel)
        .map(|_| ())
        .map_err(|e| DashboardError::from_io("creating", sentinel, e))
}

/// Flips the open state, returning whether the assignment is now open.
pub fn toggle(config: &DashboardConfig, assignment: &Path) -> Result<bool> {
    if is_open(config, assignment) {
        lock(config, assignment)?;
        Ok(false)
    } else {
        unlock(config, assignment)?;
        Ok(true)
    }
}

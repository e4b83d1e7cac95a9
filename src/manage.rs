use std::{fs, path::Path};

use crate::{
    config::DashboardConfig,
    error::{DashboardError, Result},
    markers::{is_assignment_dir, is_class_dir, lock, toggle, unlock},
    messages::Message,
    metadata::{created_or_mtime, migrate, parse_timestamp, read_meta, write_meta},
    util::{is_writable, list_subdirs},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockAction {
    Lock,
    Unlock,
    Toggle,
}

pub fn set_lock(
    config: &DashboardConfig,
    assignment: &Path,
    action: LockAction,
) -> Result<Message> {
    let open = match action {
        LockAction::Lock => {
            lock(config, assignment)?;
            false
        }
        LockAction::Unlock => {
            unlock(config, assignment)?;
            true
        }
        LockAction::Toggle => toggle(config, assignment)?,
    };
    let name = assignment
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    tracing::info!(assignment = %assignment.display(), open, "lock state changed");
    Ok(if open {
        Message::success(format!("{} is open for submissions", name))
    } else {
        Message::success(format!("{} is locked", name))
    })
}

/// Replaces the due date, keeping the creation date. `due` is user input, so a
/// value that doesn't parse is a bad request rather than a silent "no due date".
pub fn set_due(config: &DashboardConfig, assignment: &Path, due: &str) -> Result<Message> {
    let parsed = if due.trim().is_empty() {
        None
    } else {
        Some(parse_timestamp(due).ok_or_else(|| {
            DashboardError::BadRequest(format!("Invalid due date: '{}'", due))
        })?)
    };
    let meta_path = assignment.join(&config.assignment_metadata);
    let meta = read_meta(&meta_path)?;
    let created = created_or_mtime(&meta, &meta_path)?;
    write_meta(&meta_path, created, parsed)?;
    tracing::info!(assignment = %assignment.display(), ?parsed, "due date changed");
    Ok(Message::success(match parsed {
        Some(d) => format!("Due date set to {}", d.format("%Y-%m-%d %H:%M UTC")),
        None => String::from("Due date cleared"),
    }))
}

/// Removes a class or assignment tree. Only directories that are still valid
/// of their kind can go, and only when the caller can write the parent.
pub fn delete(config: &DashboardConfig, target: &Path) -> Result<Message> {
    if !is_class_dir(config, target) && !is_assignment_dir(config, target) {
        return Err(DashboardError::BadRequest(format!(
            "Not a class or assignment directory: {}",
            target.display()
        )));
    }
    let parent = target.parent().unwrap_or(Path::new("/"));
    if !is_writable(parent) {
        return Err(DashboardError::PermissionDenied {
            path: parent.to_path_buf(),
        });
    }
    fs::remove_dir_all(target).map_err(|e| DashboardError::from_io("removing", target, e))?;
    tracing::info!(path = %target.display(), "deleted");
    Ok(Message::success(format!("Deleted {}", target.display())))
}

/// Rewrites the legacy metadata files of every assignment in the class.
pub fn migrate_class(config: &DashboardConfig, class_path: &Path) -> Result<Message> {
    let mut changed = 0;
    let assignments =
        list_subdirs(class_path).map_err(|e| DashboardError::from_io("listing", class_path, e))?;
    for assignment in assignments.iter().filter(|a| is_assignment_dir(config, a)) {
        if migrate(&assignment.join(&config.assignment_metadata))? {
            changed += 1;
        }
    }
    Ok(Message::success(format!(
        "Migrated {} metadata file{}",
        changed,
        if changed == 1 { "" } else { "s" }
    )))
}

#[cfg(test)]
mod tests {
    use assert_fs::prelude::*;
    use predicates::prelude::*;

    use super::*;
    use crate::markers::is_open;

    fn config() -> DashboardConfig {
        DashboardConfig::default()
    }

    #[test]
    fn lock_actions_report_new_state() {
        let config = config();
        let tmp = assert_fs::TempDir::new().unwrap();
        let hw = tmp.child("hw1");
        hw.create_dir_all().unwrap();

        let msg = set_lock(&config, hw.path(), LockAction::Unlock).unwrap();
        assert_eq!(msg.text, "hw1 is open for submissions");
        let msg = set_lock(&config, hw.path(), LockAction::Unlock).unwrap();
        assert_eq!(msg.text, "hw1 is open for submissions");
        let msg = set_lock(&config, hw.path(), LockAction::Toggle).unwrap();
        assert_eq!(msg.text, "hw1 is locked");
        assert!(!is_open(&config, hw.path()));
        set_lock(&config, hw.path(), LockAction::Lock).unwrap();
        assert!(!is_open(&config, hw.path()));
    }

    #[test]
    fn set_due_keeps_created() {
        let config = config();
        let tmp = assert_fs::TempDir::new().unwrap();
        let meta = tmp.child("hw1/meta_date_a");
        meta.write_str("Created: 2023-01-01\nDue: 2023-01-10\n").unwrap();

        set_due(&config, tmp.child("hw1").path(), "2023-01-17 23:59").unwrap();
        meta.assert("Created: 2023-01-01T00:00:00+00:00\nDue: 2023-01-17T23:59:00+00:00\n");

        let msg = set_due(&config, tmp.child("hw1").path(), "").unwrap();
        assert_eq!(msg.text, "Due date cleared");
        meta.assert("Created: 2023-01-01T00:00:00+00:00\nDue: \n");

        let err = set_due(&config, tmp.child("hw1").path(), "someday").unwrap_err();
        assert_eq!(err.status(), 400);
        meta.assert(predicate::str::contains("Created: 2023-01-01"));
    }

    #[test]
    fn delete_only_marked_directories() {
        let config = config();
        let tmp = assert_fs::TempDir::new().unwrap();
        let class = tmp.child("PZS0001/mathclass");
        class.child(&config.class_marker).touch().unwrap();
        class.child("hw1/meta_date_a").write_str("Created: 2023-01-01\n").unwrap();
        let other = tmp.child("PZS0001/thesis");
        other.child("draft.tex").touch().unwrap();

        let err = delete(&config, other.path()).unwrap_err();
        assert_eq!(err.status(), 400);
        other.assert(predicate::path::is_dir());

        delete(&config, class.child("hw1").path()).unwrap();
        class.child("hw1").assert(predicate::path::missing());
        class.assert(predicate::path::is_dir());

        delete(&config, class.path()).unwrap();
        class.assert(predicate::path::missing());
    }

    #[test]
    fn migrate_counts_rewritten_files() {
        let config = config();
        let tmp = assert_fs::TempDir::new().unwrap();
        tmp.child("hw1/meta_date_a").write_str("created: 2023-01-01\ndue: 2023-01-10\n").unwrap();
        tmp.child("hw2/meta_date_a").write_str("Created: 2023-01-05\nDue: \n").unwrap();
        tmp.child("hw3/meta_date_a").write_str("---\ndate_created: 2023-01-09\n").unwrap();

        let msg = migrate_class(&config, tmp.path()).unwrap();
        assert_eq!(msg.text, "Migrated 2 metadata files");
        let msg = migrate_class(&config, tmp.path()).unwrap();
        assert_eq!(msg.text, "Migrated 0 metadata files");
    }
}

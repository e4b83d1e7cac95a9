use std::{
    env,
    fs::OpenOptions,
    path::{Path, PathBuf},
};

use nix::unistd::getuid;
use serde::{Deserialize, Serialize};

use crate::error::{DashboardError, Result};

pub const CONFIG_ENV: &str = "HW_DASHBOARD_CONFIG";

pub const HW_DIR_SETUP_SCRIPT: &str = "hw_dir_setup";
pub const ADD_ASSIGNMENT_SCRIPT: &str = "add_assignment";
pub const SUBMIT_SCRIPT: &str = "submit_hw_helper";

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct DashboardConfig {
    /// Directory holding one project directory per group.
    pub projects_root: PathBuf,
    /// File found in class directories to identify them as such.
    pub class_marker: String,
    /// File found in each assignment directory; holds the creation and due
    /// dates and identifies the directory as an assignment.
    pub assignment_metadata: String,
    /// Present while an assignment accepts submissions.
    pub open_sentinel: String,
    pub scripts_dir: PathBuf,
    /// Program used to give TAs access to a class tree.
    pub setfacl: PathBuf,
    pub download_tmp_root: PathBuf,
    /// Flash messages live here. Per user by default, since one user's
    /// directory under /tmp is not writable by the next.
    pub state_dir: PathBuf,
    pub download_max_age_hours: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        DashboardConfig {
            projects_root: PathBuf::from("/fs/project"),
            class_marker: String::from("this_is_a_homework_directory"),
            assignment_metadata: String::from("meta_date_a"),
            open_sentinel: String::from("open_for_submissions"),
            scripts_dir: PathBuf::from("."),
            setfacl: PathBuf::from("setfacl"),
            download_tmp_root: PathBuf::from("/tmp"),
            state_dir: PathBuf::from(format!("/tmp/hw_dashboard-{}", getuid())),
            download_max_age_hours: 24,
        }
    }
}

/// `--config` wins, then `$HW_DASHBOARD_CONFIG`, then the defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<DashboardConfig> {
    let path = match explicit {
        Some(p) => Some(p.to_path_buf()),
        None => env::var_os(CONFIG_ENV).map(PathBuf::from),
    };
    match path {
        Some(path) => read_config(&path),
        None => Ok(DashboardConfig::default()),
    }
}

pub fn read_config(path: &Path) -> Result<DashboardConfig> {
    let file = OpenOptions::new()
        .read(true)
        .open(path)
        .map_err(|e| DashboardError::from_io("opening config", path, e))?;
    serde_json::from_reader(file).map_err(|source| DashboardError::Config {
        path: path.to_path_buf(),
        source,
    })
}

impl DashboardConfig {
    pub fn project_dir(&self, project: &str) -> PathBuf {
        self.projects_root.join(project)
    }

    pub fn class_dir(&self, project: &str, class: &str) -> PathBuf {
        self.project_dir(project).join(class)
    }

    pub fn assignment_dir(&self, project: &str, class: &str, assignment: &str) -> PathBuf {
        self.class_dir(project, class).join(assignment)
    }

    pub fn script_path(&self, script: &str) -> PathBuf {
        self.scripts_dir.join(script)
    }

    pub fn flash_dir(&self) -> PathBuf {
        self.state_dir.join("flash")
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, r#"{{"projects_root": "/srv/projects", "open_sentinel": "OPEN"}}"#).unwrap();
        f.as_file_mut().flush().unwrap();

        let config = read_config(f.path()).unwrap();
        assert_eq!(config.projects_root, PathBuf::from("/srv/projects"));
        assert_eq!(config.open_sentinel, "OPEN");
        assert_eq!(config.class_marker, "this_is_a_homework_directory");
        assert_eq!(
            config.assignment_dir("PZS0001", "mathclass", "hw1"),
            PathBuf::from("/srv/projects/PZS0001/mathclass/hw1")
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, r#"{{"project_root": "/srv/projects"}}"#).unwrap();
        f.as_file_mut().flush().unwrap();

        assert!(matches!(read_config(f.path()), Err(DashboardError::Config { .. })));
    }

    #[test]
    fn default_state_dir_is_per_user() {
        let config = DashboardConfig::default();
        assert_eq!(
            config.flash_dir(),
            PathBuf::from(format!("/tmp/hw_dashboard-{}/flash", getuid()))
        );
        assert_eq!(config.setfacl, PathBuf::from("setfacl"));
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(Some(&dir.path().join("nope.json"))).unwrap_err();
        assert_eq!(err.status(), 404);
    }
}

use std::{fs, os::unix::fs::MetadataExt, path::Path};

use nix::unistd::geteuid;
use serde::Serialize;
use strum::Display;

use crate::{
    error::{DashboardError, Result},
    util::is_writable,
};

/// What the current user is to a class directory.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Display)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Instructor,
    #[strum(serialize = "TA")]
    Ta,
    Student,
}

pub fn classify(owner_uid: u32, writable: bool, euid: u32) -> Role {
    if owner_uid == euid {
        Role::Instructor
    } else if writable {
        Role::Ta
    } else {
        Role::Student
    }
}

pub fn role_for(class_dir: &Path) -> Result<Role> {
    let meta =
        fs::metadata(class_dir).map_err(|e| DashboardError::from_io("reading", class_dir, e))?;
    Ok(classify(meta.uid(), is_writable(class_dir), geteuid().as_raw()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_is_instructor_even_without_write() {
        assert_eq!(classify(1000, false, 1000), Role::Instructor);
        assert_eq!(classify(1000, true, 1000), Role::Instructor);
    }

    #[test]
    fn writer_who_is_not_owner_is_ta() {
        assert_eq!(classify(1000, true, 2000), Role::Ta);
        assert_eq!(classify(1000, false, 2000), Role::Student);
    }

    #[test]
    fn own_directory_is_instructor() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(role_for(tmp.path()).unwrap(), Role::Instructor);
        assert_eq!(Role::Ta.to_string(), "TA");
    }
}

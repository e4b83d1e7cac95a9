use std::{
    fs,
    io,
    path::{Component, Path, PathBuf},
    process::{Command, Stdio},
    sync::LazyLock,
    time::SystemTime,
};

use chrono::{DateTime, Utc};
use nix::unistd::{access, AccessFlags};
use regex::Regex;
use walkdir::WalkDir;

use crate::error::{DashboardError, Result};

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").unwrap());
static LOGIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.-]*$").unwrap());

/// Class and assignment names: word characters only.
pub fn is_valid_name(name: &str) -> bool {
    NAME_RE.is_match(name)
}

pub fn is_valid_login(login: &str) -> bool {
    LOGIN_RE.is_match(login)
}

/// Joins a caller supplied relative path onto `root`, refusing anything that
/// could climb out of it.
pub fn resolve_under(root: &Path, relative: &str) -> Result<PathBuf> {
    let rel = Path::new(relative);
    let mut out = root.to_path_buf();
    for component in rel.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            _ => {
                return Err(DashboardError::BadRequest(format!(
                    "Invalid path: '{}'",
                    relative
                )))
            }
        }
    }
    Ok(out)
}

/// A single path component naming an existing project, class or assignment.
pub fn check_component(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') {
        return Err(DashboardError::BadRequest(format!("Invalid name: '{}'", name)));
    }
    Ok(())
}

/// Immediate subdirectories of `dir`, sorted by name. Symlinks to directories
/// are not followed.
pub fn list_subdirs(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Sum of regular file sizes below `dir`. Symlinks count as zero and are never
/// followed, so link cycles and shared targets can't inflate the total.
pub fn dir_size(dir: &Path) -> Result<u64> {
    let mut total = 0;
    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = entry?;
        if entry.file_type().is_file() {
            total += entry.metadata()?.len();
        }
    }
    Ok(total)
}

pub fn to_utc(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}

pub fn modified(path: &Path) -> io::Result<DateTime<Utc>> {
    Ok(to_utc(fs::metadata(path)?.modified()?))
}

pub fn is_writable(path: &Path) -> bool {
    access(path, AccessFlags::W_OK).is_ok()
}

pub fn is_readable(path: &Path) -> bool {
    access(path, AccessFlags::R_OK).is_ok()
}

pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Runs `program` to completion and captures both streams. Only a failure to
/// spawn is an error; a non-zero exit is reported through `success`.
pub fn capture(program: &Path, args: &[&str], cwd: Option<&Path>) -> io::Result<CommandOutput> {
    let mut command = Command::new(program);
    command.args(args).stdin(Stdio::null());
    if let Some(cwd) = cwd {
        command.current_dir(cwd);
    }
    tracing::debug!(program = %program.display(), ?args, "running");
    let output = command.output()?;
    Ok(CommandOutput {
        success: output.status.success(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

#[cfg(test)]
mod tests {
    use std::os::unix::fs::symlink;

    use assert_fs::prelude::*;

    use super::*;

    #[test]
    fn size_ignores_symlinks() {
        let tmp = assert_fs::TempDir::new().unwrap();
        let outside = tmp.child("elsewhere.bin");
        outside.write_binary(&[0u8; 1000]).unwrap();

        let submission = tmp.child("alice");
        submission.child("a.txt").write_binary(&[1u8; 10]).unwrap();
        submission.child("src/b.txt").write_binary(&[2u8; 20]).unwrap();
        symlink(outside.path(), submission.child("link.bin").path()).unwrap();
        symlink(tmp.path(), submission.child("loop").path()).unwrap();

        assert_eq!(dir_size(submission.path()).unwrap(), 30);
    }

    #[test]
    fn subdirs_skip_files_and_links() {
        let tmp = assert_fs::TempDir::new().unwrap();
        tmp.child("bob").create_dir_all().unwrap();
        tmp.child("alice").create_dir_all().unwrap();
        tmp.child("meta_date_a").touch().unwrap();
        symlink(tmp.child("bob").path(), tmp.child("carol").path()).unwrap();

        let names: Vec<_> = list_subdirs(tmp.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["alice", "bob"]);
    }

    #[test]
    fn resolve_under_rejects_escapes() {
        let root = Path::new("/fs/project");
        assert_eq!(
            resolve_under(root, "PZS0001/mathclass/hw1").unwrap(),
            PathBuf::from("/fs/project/PZS0001/mathclass/hw1")
        );
        assert!(resolve_under(root, "PZS0001/../../etc").is_err());
        assert!(resolve_under(root, "/etc/passwd").is_err());
        assert!(check_component("math-101.v2").is_ok());
        assert!(check_component("..").is_err());
        assert!(check_component("a/b").is_err());
    }

    #[test]
    fn names() {
        assert!(is_valid_name("math_101"));
        assert!(!is_valid_name("math 101"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("hw1;rm"));
        assert!(is_valid_login("osc.0001"));
        assert!(!is_valid_login(".."));
        assert!(!is_valid_login("a/b"));
    }

    #[test]
    fn capture_reports_exit_status() {
        let out =
            capture(Path::new("sh"), &["-c", "echo out; echo err >&2; exit 3"], None).unwrap();
        assert!(!out.success);
        assert_eq!(out.stdout, "out\n");
        assert_eq!(out.stderr, "err\n");
    }
}

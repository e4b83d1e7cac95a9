//! Downloads: files go out as they are, directories get zipped into a fresh
//! staging directory.
//!
//! Staging directories are left behind on purpose. Removing one while the file
//! is still being handed out truncates the download, so cleanup is the job of
//! [`sweep`], run out of band (cron).

use std::{
    collections::BTreeSet,
    fs::{self, File},
    io,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use tempfile::Builder;
use walkdir::WalkDir;
use zip::{result::ZipResult, write::SimpleFileOptions, CompressionMethod, ZipWriter};

use crate::{
    config::DashboardConfig,
    error::{DashboardError, Result},
    util::{check_component, is_readable, resolve_under},
};

pub const STAGING_PREFIX: &str = "download.";

#[derive(Debug, PartialEq, Eq)]
pub enum Download {
    /// Send the file itself.
    File(PathBuf),
    /// A freshly built zip inside its own staging directory.
    Archive(PathBuf),
}

impl Download {
    pub fn path(&self) -> &Path {
        match self {
            Download::File(p) | Download::Archive(p) => p,
        }
    }
}

/// Resolves `relative` under the projects root and produces something to send.
/// With `members`, only those children of the directory are archived.
pub fn prepare_download(
    config: &DashboardConfig,
    relative: &str,
    members: &[String],
) -> Result<Download> {
    if relative.trim_matches('/').is_empty() {
        return Err(DashboardError::BadRequest(String::from("Nothing to download")));
    }
    let target = resolve_under(&config.projects_root, relative)?;
    if !target.exists() {
        return Err(DashboardError::NotFound { path: target });
    }
    if !is_readable(&target) {
        return Err(DashboardError::PermissionDenied { path: target });
    }

    if target.is_file() {
        if !members.is_empty() {
            return Err(DashboardError::BadRequest(String::from(
                "Members can only be selected from a directory",
            )));
        }
        return Ok(Download::File(target));
    }
    if !target.is_dir() {
        return Err(DashboardError::BadRequest(String::from("Not a file or directory")));
    }

    // a repeated member would be written to the zip twice
    let members: Vec<String> = members
        .iter()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    for member in members.iter() {
        check_component(member)?;
        if !target.join(member).exists() {
            return Err(DashboardError::BadRequest(format!(
                "'{}' is not in {}",
                member,
                target.display()
            )));
        }
    }

    let staging = staging_dir(&config.download_tmp_root)?;
    let archive = archive_dir(&target, &staging, &members)?;
    tracing::info!(target = %target.display(), archive = %archive.display(), "built download");
    Ok(Download::Archive(archive))
}

/// `download.XXXXXX` under `tmp_root`, kept after this process exits.
pub fn staging_dir(tmp_root: &Path) -> Result<PathBuf> {
    let dir = Builder::new()
        .prefix(STAGING_PREFIX)
        .rand_bytes(6)
        .tempdir_in(tmp_root)
        .map_err(DashboardError::TempDir)?;
    Ok(dir.keep())
}

/// Writes `<staging>/<name>.zip` holding `target` with entry names relative to
/// the target's parent, i.e. `<name>/...`.
pub fn archive_dir(target: &Path, staging: &Path, members: &[String]) -> Result<PathBuf> {
    let name = target
        .file_name()
        .ok_or_else(|| DashboardError::BadRequest(String::from("Not a file or directory")))?
        .to_string_lossy()
        .to_string();
    let parent = target.parent().unwrap_or(Path::new("/"));
    let dest = staging.join(format!("{}.zip", name));

    let file = File::create(&dest).map_err(|e| DashboardError::io("creating", &dest, e))?;
    let mut writer = ZipWriter::new(file);

    if members.is_empty() {
        add_tree(&mut writer, target, parent)?;
    } else {
        writer.add_directory(format!("{}/", name), entry_options())?;
        for member in members {
            add_tree(&mut writer, &target.join(member), parent)?;
        }
    }
    writer.finish()?;
    Ok(dest)
}

fn entry_options() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
}

fn entry_name(path: &Path, base: &Path) -> Option<String> {
    let rel = path.strip_prefix(base).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    Some(parts.join("/"))
}

fn add_tree(writer: &mut ZipWriter<File>, root: &Path, base: &Path) -> ZipResult<()> {
    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        let Some(name) = entry_name(entry.path(), base) else {
            continue;
        };
        let file_type = entry.file_type();
        if file_type.is_dir() {
            writer.add_directory(format!("{}/", name), entry_options())?;
        } else if file_type.is_file() {
            writer.start_file(name, entry_options())?;
            let mut f = File::open(entry.path())?;
            io::copy(&mut f, writer)?;
        } else {
            tracing::debug!(
                path = %entry.path().display(),
                "not archiving special file or symlink"
            );
        }
    }
    Ok(())
}

/// Removes staging directories older than `max_age`. Returns how many went.
pub fn sweep(tmp_root: &Path, max_age: Duration) -> Result<usize> {
    let cutoff = SystemTime::now()
        .checked_sub(max_age)
        .unwrap_or(SystemTime::UNIX_EPOCH);
    let entries =
        fs::read_dir(tmp_root).map_err(|e| DashboardError::from_io("listing", tmp_root, e))?;

    let mut removed = 0;
    for entry in entries.flatten() {
        if !entry.file_name().to_string_lossy().starts_with(STAGING_PREFIX) {
            continue;
        }
        let path = entry.path();
        let stale = entry
            .metadata()
            .ok()
            .filter(|m| m.is_dir())
            .and_then(|m| m.modified().ok())
            .is_some_and(|mtime| mtime < cutoff);
        if !stale {
            continue;
        }
        match fs::remove_dir_all(&path) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "removed stale download");
                removed += 1;
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), "could not remove stale download: {}", e)
            }
        }
    }
    Ok(removed)
}

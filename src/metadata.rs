//! The assignment metadata file.
//!
//! Written as two lines:
//!
//! ```text
//! Created: 2023-01-01T00:00:00+00:00
//! Due: 2023-01-10T00:00:00+00:00
//! ```
//!
//! Older directories carry a structured mapping instead (`created: ...`,
//! `date_due: "..."`, possibly under a `---` header). Those are still read, and
//! [`migrate`] rewrites them into the two-line form.

use std::{
    fs::{self, Permissions},
    io::Write,
    os::unix::fs::PermissionsExt,
    path::Path,
};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tempfile::NamedTempFile;

use crate::{
    error::{DashboardError, Result},
    util::modified,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaFormat {
    Canonical,
    Legacy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentMeta {
    pub created: Option<DateTime<Utc>>,
    pub due: Option<DateTime<Utc>>,
    pub format: MetaFormat,
}

/// Naive values are taken as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    // Ruby's YAML dump: "2023-01-10 23:59:00.000000000 -05:00"
    for fmt in ["%Y-%m-%d %H:%M:%S%.f %z", "%Y-%m-%d %H:%M:%S%.f %:z"] {
        if let Ok(dt) = DateTime::parse_from_str(value, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn unquote(value: &str) -> &str {
    let value = value.trim();
    for q in ['"', '\''] {
        if let Some(inner) = value.strip_prefix(q).and_then(|v| v.strip_suffix(q)) {
            return inner;
        }
    }
    value
}

/// Never fails: fields that are missing or don't parse come back as `None`.
pub fn parse_meta(contents: &str) -> AssignmentMeta {
    let mut meta = AssignmentMeta {
        created: None,
        due: None,
        format: MetaFormat::Canonical,
    };
    for line in contents.lines() {
        let line = line.trim();
        if line == "---" {
            meta.format = MetaFormat::Legacy;
            continue;
        }
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        if key != "Created" && key != "Due" {
            meta.format = MetaFormat::Legacy;
        }
        match key.to_ascii_lowercase().as_str() {
            "created" | "date_created" => meta.created = parse_timestamp(unquote(value)),
            "due" | "date_due" => meta.due = parse_timestamp(unquote(value)),
            _ => {}
        }
    }
    meta
}

pub fn render_meta(created: DateTime<Utc>, due: Option<DateTime<Utc>>) -> String {
    format!(
        "Created: {}\nDue: {}\n",
        created.to_rfc3339(),
        due.map(|d| d.to_rfc3339()).unwrap_or_default()
    )
}

pub fn read_meta(path: &Path) -> Result<AssignmentMeta> {
    let contents =
        fs::read_to_string(path).map_err(|e| DashboardError::from_io("reading", path, e))?;
    Ok(parse_meta(&contents))
}

/// Creation time from the file, or the file's mtime when the field is unusable.
pub fn created_or_mtime(meta: &AssignmentMeta, path: &Path) -> Result<DateTime<Utc>> {
    match meta.created {
        Some(created) => Ok(created),
        None => {
            tracing::warn!(path = %path.display(), "unreadable creation date, using file mtime");
            modified(path).map_err(|e| DashboardError::from_io("reading", path, e))
        }
    }
}

/// Replaces the file in one rename so readers never see half a file. The new
/// file keeps the old one's mode, or gets 0644 so students can still read it.
pub fn write_meta(path: &Path, created: DateTime<Utc>, due: Option<DateTime<Utc>>) -> Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mode = fs::metadata(path).map(|m| m.permissions().mode()).unwrap_or(0o644);
    let mut tmp =
        NamedTempFile::new_in(dir).map_err(|e| DashboardError::from_io("writing", dir, e))?;
    tmp.write_all(render_meta(created, due).as_bytes())
        .map_err(|e| DashboardError::io("writing", path, e))?;
    tmp.as_file()
        .set_permissions(Permissions::from_mode(mode))
        .map_err(|e| DashboardError::io("writing", path, e))?;
    tmp.persist(path)
        .map_err(|e| DashboardError::io("writing", path, e.error))?;
    Ok(())
}

/// Rewrites a legacy file in the two-line form. Returns whether anything changed.
pub fn migrate(path: &Path) -> Result<bool> {
    let meta = read_meta(path)?;
    if meta.format == MetaFormat::Canonical {
        return Ok(false);
    }
    let created = created_or_mtime(&meta, path)?;
    write_meta(path, created, meta.due)?;
    tracing::info!(path = %path.display(), "migrated assignment metadata");
    Ok(true)
}

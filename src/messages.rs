use std::{
    fs::{self, OpenOptions},
    io::ErrorKind,
    path::PathBuf,
};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::{DashboardError, Result};

/// Named after the bootstrap theme colors the pages use.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Success,
    Danger,
    Warning,
    Info,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub severity: Severity,
    pub text: String,
}

impl Message {
    pub fn new(severity: Severity, text: impl Into<String>) -> Self {
        Message {
            severity,
            text: text.into(),
        }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Message::new(Severity::Success, text)
    }

    pub fn danger(text: impl Into<String>) -> Self {
        Message::new(Severity::Danger, text)
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Message::new(Severity::Warning, text)
    }
}

/// Any session key maps to its own plain file name: bytes outside
/// `[A-Za-z0-9_-]` become `%XX`, and so does a dot that leads the key or
/// follows another dot.
fn slot_name(session: &str) -> String {
    let mut name = String::with_capacity(session.len());
    let mut prev: Option<u8> = None;
    for b in session.bytes() {
        let keep = b.is_ascii_alphanumeric()
            || b == b'_'
            || b == b'-'
            || (b == b'.' && prev.is_some_and(|p| p != b'.'));
        prev = Some(b);
        if keep {
            name.push(b as char);
        } else {
            name.push_str(&format!("%{:02X}", b));
        }
    }
    if name.is_empty() {
        name.push('%');
    }
    name
}

/// One-shot messages carried from a mutation to the next listing of the same
/// session. Written once, removed on the first read.
pub struct FlashStore {
    dir: PathBuf,
}

impl FlashStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FlashStore { dir: dir.into() }
    }

    fn slot(&self, session: &str) -> PathBuf {
        self.dir.join(format!("{}.json", slot_name(session)))
    }

    /// Replaces whatever message the session had pending.
    pub fn put(&self, session: &str, message: &Message) -> Result<()> {
        let slot = self.slot(session);
        fs::create_dir_all(&self.dir)
            .map_err(|e| DashboardError::io("creating flash directory", &self.dir, e))?;
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&slot)
            .map_err(|e| DashboardError::io("writing flash message", &slot, e))?;
        serde_json::to_writer(file, message)?;
        Ok(())
    }

    pub fn take(&self, session: &str) -> Result<Option<Message>> {
        let slot = self.slot(session);
        let contents = match fs::read_to_string(&slot) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(DashboardError::io("reading flash message", &slot, e)),
        };
        fs::remove_file(&slot)
            .map_err(|e| DashboardError::io("clearing flash message", &slot, e))?;
        match serde_json::from_str(&contents) {
            Ok(message) => Ok(Some(message)),
            Err(e) => {
                tracing::warn!(path = %slot.display(), "dropping unreadable flash message: {}", e);
                Ok(None)
            }
        }
    }
}

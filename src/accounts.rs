use std::{
    io::{Error, ErrorKind, Result},
    path::Path,
};

use crate::{messages::Message, util::capture};

/// Who the current user is and what other accounts are called.
///
/// Lookups go through function pointers so a test can swap in a fixed set of
/// groups and names without touching `groups` or `getent`.
#[derive(Clone)]
pub struct Accounts {
    groups_fn: fn() -> Result<Vec<String>>,
    display_name_fn: fn(&str) -> Option<String>,
}

pub fn system_accounts() -> Accounts {
    Accounts {
        groups_fn: system_groups,
        display_name_fn: getent_display_name,
    }
}

impl Accounts {
    #[cfg(test)]
    pub fn new(
        groups_fn: fn() -> Result<Vec<String>>,
        display_name_fn: fn(&str) -> Option<String>,
    ) -> Self {
        Accounts {
            groups_fn,
            display_name_fn,
        }
    }

    /// Groups of the current user. A failed lookup is not fatal: the scan goes
    /// on with no groups and the returned message explains why.
    pub fn groups(&self) -> (Vec<String>, Option<Message>) {
        match (self.groups_fn)() {
            Ok(groups) => (groups, None),
            Err(e) => {
                tracing::warn!("group lookup failed: {}", e);
                (
                    Vec::new(),
                    Some(Message::danger("could not identify user's groups (groups)")),
                )
            }
        }
    }

    /// `key` is a uid or a login. Falls back to the key itself.
    pub fn display_name(&self, key: &str) -> String {
        (self.display_name_fn)(key).unwrap_or_else(|| key.to_string())
    }
}

fn system_groups() -> Result<Vec<String>> {
    let out = capture(Path::new("groups"), &[], None)?;
    if !out.success {
        return Err(Error::new(
            ErrorKind::Other,
            format!("groups exited unsuccessfully: {}", out.stderr.trim()),
        ));
    }
    Ok(parse_groups(&out.stdout))
}

pub fn parse_groups(stdout: &str) -> Vec<String> {
    // `groups <user>` prints "user : g1 g2"; plain `groups` prints just the list
    let list = stdout.rsplit_once(" : ").map_or(stdout, |(_, l)| l);
    list.split_whitespace().map(String::from).collect()
}

fn getent_display_name(key: &str) -> Option<String> {
    let out = capture(Path::new("getent"), &["passwd", key], None).ok()?;
    if !out.success {
        return None;
    }
    gecos_name(&out.stdout)
}

/// Full name from a passwd line: field 5 up to the first comma.
pub fn gecos_name(passwd_line: &str) -> Option<String> {
    let gecos = passwd_line.lines().next()?.split(':').nth(4)?;
    let name = gecos.split(',').next()?.trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

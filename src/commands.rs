//! One function per subcommand: run the operation, print what the user should
//! see, and leave the flash message for the next listing.

use std::{path::Path, time::Duration};

use chrono::{DateTime, Utc};

use crate::{
    accounts::Accounts,
    archive::{self, Download},
    config::DashboardConfig,
    error::{DashboardError, Result},
    export,
    manage::{self, LockAction},
    messages::{FlashStore, Message},
    metadata::parse_timestamp,
    provision,
    render::{self, OutputFormat},
    scan,
    types::{sort_assignments_by_created, Listing},
};

pub struct Session {
    pub config: DashboardConfig,
    pub accounts: Accounts,
    pub flash: FlashStore,
    pub key: String,
}

impl Session {
    pub fn new(config: DashboardConfig, accounts: Accounts, key: String) -> Self {
        let flash = FlashStore::new(config.flash_dir());
        Session {
            config,
            accounts,
            flash,
            key,
        }
    }

    /// The pending flash message, if any. A broken flash store never stops a
    /// listing from rendering.
    fn pending(&self) -> Vec<Message> {
        let mut messages = Vec::new();
        match self.flash.take(&self.key) {
            Ok(Some(m)) => messages.push(m),
            Ok(None) => {}
            Err(e) => tracing::warn!("could not read flash message: {}", e),
        }
        messages
    }

    /// Prints a mutation's outcome and keeps it for the next listing. The
    /// change is already made by now, so a flash store that can't be written
    /// only costs the next listing its message.
    fn report(&self, message: Message) -> Result<()> {
        println!("[{}] {}", message.severity, message.text);
        if let Err(e) = self.flash.put(&self.key, &message) {
            tracing::warn!("could not store flash message: {}", e);
        }
        Ok(())
    }
}

fn with_pending<T>(pending: Vec<Message>, listing: &mut Listing<T>) {
    let found = std::mem::take(&mut listing.messages);
    listing.messages = pending;
    listing.messages.extend(found);
}

pub fn list_all(session: &Session, format: OutputFormat) -> Result<()> {
    let pending = session.pending();
    let mut listing = scan::scan_all(&session.config, &session.accounts);
    with_pending(pending, &mut listing);
    print!("{}", render::render_classes(format, "Classes", &listing)?);
    Ok(())
}

pub fn list_project(session: &Session, project: &str, format: OutputFormat) -> Result<()> {
    let pending = session.pending();
    let mut listing = scan::scan_project(&session.config, &session.accounts, project)?;
    with_pending(pending, &mut listing);
    print!("{}", render::render_classes(format, project, &listing)?);
    Ok(())
}

/// Most urgent assignment first, or newest first with `by_created`.
pub fn show_class(
    session: &Session,
    project: &str,
    class: &str,
    by_created: bool,
    format: OutputFormat,
) -> Result<()> {
    let pending = session.pending();
    let (info, mut listing) = scan::scan_class(&session.config, &session.accounts, project, class)?;
    if by_created {
        sort_assignments_by_created(&mut listing.rows);
    }
    with_pending(pending, &mut listing);
    print!("{}", render::render_class(format, &info, &listing)?);
    Ok(())
}

pub fn show_assignment(
    session: &Session,
    project: &str,
    class: &str,
    assignment: &str,
    format: OutputFormat,
) -> Result<()> {
    let pending = session.pending();
    let (info, mut listing) =
        scan::scan_assignment(&session.config, &session.accounts, project, class, assignment)?;
    with_pending(pending, &mut listing);
    print!("{}", render::render_assignment(format, &info, &listing)?);
    Ok(())
}

/// Prints the path to hand out: the file itself or the fresh archive.
pub fn download(session: &Session, path: &str, members: &[String]) -> Result<()> {
    let download = archive::prepare_download(&session.config, path, members)?;
    if let Download::Archive(_) = download {
        tracing::info!(path, "archive staged; sweep-downloads removes it later");
    }
    println!("{}", download.path().display());
    Ok(())
}

pub fn sweep_downloads(session: &Session, max_age_hours: Option<u64>) -> Result<()> {
    let hours = max_age_hours.unwrap_or(session.config.download_max_age_hours);
    let removed = archive::sweep(
        &session.config.download_tmp_root,
        Duration::from_secs(hours * 3600),
    )?;
    println!(
        "Removed {} stale download director{}",
        removed,
        if removed == 1 { "y" } else { "ies" }
    );
    Ok(())
}

pub fn set_lock(
    session: &Session,
    project: &str,
    class: &str,
    assignment: &str,
    action: LockAction,
) -> Result<()> {
    let path = scan::open_assignment(&session.config, project, class, assignment)?;
    session.report(manage::set_lock(&session.config, &path, action)?)
}

pub fn set_due(
    session: &Session,
    project: &str,
    class: &str,
    assignment: &str,
    due: &str,
) -> Result<()> {
    let path = scan::open_assignment(&session.config, project, class, assignment)?;
    session.report(manage::set_due(&session.config, &path, due)?)
}

pub fn add_class(session: &Session, parent_dir: &Path, class_name: &str) -> Result<()> {
    session.report(provision::add_class(&session.config, parent_dir, class_name)?)
}

fn parse_due(due: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    due.map(|d| {
        parse_timestamp(d)
            .ok_or_else(|| DashboardError::BadRequest(format!("Invalid due date: '{}'", d)))
    })
    .transpose()
}

pub fn add_assignment(
    session: &Session,
    project: &str,
    class: &str,
    name: &str,
    due: Option<&str>,
) -> Result<()> {
    let due = parse_due(due)?;
    let class_path = scan::open_class(&session.config, project, class)?;
    session.report(provision::add_assignment(&session.config, &class_path, name, due)?)
}

pub fn submit(
    session: &Session,
    project: &str,
    class: &str,
    assignment: &str,
    source: &Path,
) -> Result<()> {
    let path = scan::open_assignment(&session.config, project, class, assignment)?;
    session.report(provision::submit(&session.config, &path, source)?)
}

pub fn grant_ta(session: &Session, project: &str, class: &str, login: &str) -> Result<()> {
    let class_path = scan::open_class(&session.config, project, class)?;
    session.report(provision::grant_ta(&session.config, &class_path, login)?)
}

pub fn delete(
    session: &Session,
    project: &str,
    class: &str,
    assignment: Option<&str>,
) -> Result<()> {
    let target = match assignment {
        Some(a) => scan::open_assignment(&session.config, project, class, a)?,
        None => scan::open_class(&session.config, project, class)?,
    };
    session.report(manage::delete(&session.config, &target)?)
}

pub fn migrate_metadata(session: &Session, project: &str, class: &str) -> Result<()> {
    let class_path = scan::open_class(&session.config, project, class)?;
    session.report(manage::migrate_class(&session.config, &class_path)?)
}

pub fn export(
    session: &Session,
    project: &str,
    class: &str,
    assignment: &str,
    outfile: &Path,
) -> Result<()> {
    session.report(export::export_assignment(
        &session.config,
        &session.accounts,
        project,
        class,
        assignment,
        outfile,
    )?)
}

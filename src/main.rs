use std::{env, process::ExitCode};

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};

use crate::{
    accounts::system_accounts,
    commands::Session,
    config::load_config,
    error::{DashboardError, Result},
    manage::LockAction,
    render::OutputFormat,
};

mod accounts;
mod archive;
mod commands;
mod config;
mod error;
mod export;
mod logging;
mod manage;
mod markers;
mod messages;
mod metadata;
mod provision;
mod render;
mod role;
mod scan;
mod types;
mod util;

#[derive(Parser, Debug)]
#[command(version, about = "Browse and manage homework directories", long_about = None)]
struct Args {
    /// JSON config file; falls back to $HW_DASHBOARD_CONFIG, then built-in defaults
    #[arg(long, global = true)]
    config: Option<Utf8PathBuf>,
    /// Key for flash messages carried between invocations; defaults to $USER
    #[arg(long, global = true)]
    session: Option<String>,
    /// More logging on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    #[clap(subcommand)]
    command: SubCommand,
}

#[derive(Debug, Subcommand)]
enum SubCommand {
    /// Every class reachable through the user's groups
    List {
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Classes of one project
    Project {
        project: String,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Assignments of a class
    Class {
        project: String,
        class: String,
        /// Newest first instead of most urgent first
        #[arg(long)]
        by_created: bool,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Submissions of an assignment
    Assignment {
        project: String,
        class: String,
        assignment: String,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Prints the file to send, zipping directories first
    Download {
        /// Relative to the projects root
        path: String,
        #[arg(long = "member")]
        members: Vec<String>,
    },
    /// Removes stale download staging directories
    SweepDownloads {
        #[arg(long)]
        max_age_hours: Option<u64>,
    },
    Lock {
        project: String,
        class: String,
        assignment: String,
    },
    Unlock {
        project: String,
        class: String,
        assignment: String,
    },
    Toggle {
        project: String,
        class: String,
        assignment: String,
    },
    /// An empty due date clears it
    SetDue {
        project: String,
        class: String,
        assignment: String,
        due: String,
    },
    AddClass {
        parent_dir: Utf8PathBuf,
        class_name: String,
    },
    AddAssignment {
        project: String,
        class: String,
        name: String,
        #[arg(long)]
        due: Option<String>,
    },
    Submit {
        project: String,
        class: String,
        assignment: String,
        source: Utf8PathBuf,
    },
    GrantTa {
        project: String,
        class: String,
        login: String,
    },
    Delete {
        project: String,
        class: String,
        assignment: Option<String>,
    },
    /// Rewrites old-style metadata files of a class
    MigrateMetadata {
        project: String,
        class: String,
    },
    /// Submissions of an assignment as CSV
    Export {
        project: String,
        class: String,
        assignment: String,
        outfile: Utf8PathBuf,
    },
}

fn run(cli: Args) -> Result<()> {
    let config = load_config(cli.config.as_ref().map(|p| p.as_std_path()))?;
    let key = cli
        .session
        .or_else(|| env::var("USER").ok())
        .unwrap_or_else(|| String::from("default"));
    let session = Session::new(config, system_accounts(), key);

    match cli.command {
        SubCommand::List { format } => commands::list_all(&session, format),
        SubCommand::Project { project, format } => {
            commands::list_project(&session, &project, format)
        }
        SubCommand::Class {
            project,
            class,
            by_created,
            format,
        } => commands::show_class(&session, &project, &class, by_created, format),
        SubCommand::Assignment {
            project,
            class,
            assignment,
            format,
        } => commands::show_assignment(&session, &project, &class, &assignment, format),
        SubCommand::Download { path, members } => commands::download(&session, &path, &members),
        SubCommand::SweepDownloads { max_age_hours } => {
            commands::sweep_downloads(&session, max_age_hours)
        }
        SubCommand::Lock {
            project,
            class,
            assignment,
        } => commands::set_lock(&session, &project, &class, &assignment, LockAction::Lock),
        SubCommand::Unlock {
            project,
            class,
            assignment,
        } => commands::set_lock(&session, &project, &class, &assignment, LockAction::Unlock),
        SubCommand::Toggle {
            project,
            class,
            assignment,
        } => commands::set_lock(&session, &project, &class, &assignment, LockAction::Toggle),
        SubCommand::SetDue {
            project,
            class,
            assignment,
            due,
        } => commands::set_due(&session, &project, &class, &assignment, &due),
        SubCommand::AddClass {
            parent_dir,
            class_name,
        } => commands::add_class(&session, parent_dir.as_std_path(), &class_name),
        SubCommand::AddAssignment {
            project,
            class,
            name,
            due,
        } => commands::add_assignment(&session, &project, &class, &name, due.as_deref()),
        SubCommand::Submit {
            project,
            class,
            assignment,
            source,
        } => commands::submit(&session, &project, &class, &assignment, source.as_std_path()),
        SubCommand::GrantTa {
            project,
            class,
            login,
        } => commands::grant_ta(&session, &project, &class, &login),
        SubCommand::Delete {
            project,
            class,
            assignment,
        } => commands::delete(&session, &project, &class, assignment.as_deref()),
        SubCommand::MigrateMetadata { project, class } => {
            commands::migrate_metadata(&session, &project, &class)
        }
        SubCommand::Export {
            project,
            class,
            assignment,
            outfile,
        } => commands::export(&session, &project, &class, &assignment, outfile.as_std_path()),
    }
}

/// 2 for anything the caller got wrong, 1 for our own failures.
fn exit_code(err: &DashboardError) -> u8 {
    if (400..500).contains(&err.status()) {
        2
    } else {
        1
    }
}

fn main() -> ExitCode {
    let cli = Args::parse();
    logging::init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!("{:?}", e);
            eprintln!("error ({}): {}", e.status(), e);
            ExitCode::from(exit_code(&e))
        }
    }
}

//! Creating classes and assignments, submitting, and granting TAs access.
//! The work is done by site scripts; this module validates input, runs them in
//! the right directory and turns their exit status into a [`Message`].

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::{
    config::{DashboardConfig, ADD_ASSIGNMENT_SCRIPT, HW_DIR_SETUP_SCRIPT, SUBMIT_SCRIPT},
    error::{DashboardError, Result},
    markers::{is_assignment_dir, is_open},
    messages::Message,
    metadata::{created_or_mtime, read_meta, write_meta},
    util::{capture, is_valid_login, is_valid_name, is_writable},
};

fn script(config: &DashboardConfig, name: &str) -> std::result::Result<PathBuf, Message> {
    let path = config.script_path(name);
    // relative script dirs are resolved against the working directory
    let path = path.canonicalize().unwrap_or(path);
    if path.is_file() {
        Ok(path)
    } else {
        tracing::error!(script = %path.display(), "provisioning script missing");
        Err(Message::danger("Internal error: could not access script"))
    }
}

fn run_script(
    script: &Path,
    args: &[&str],
    cwd: &Path,
    failure: &str,
) -> Result<std::result::Result<(), Message>> {
    let out = capture(script, args, Some(cwd))
        .map_err(|e| DashboardError::io("running", script, e))?;
    if out.success {
        Ok(Ok(()))
    } else {
        tracing::warn!(
            script = %script.display(),
            stdout = %out.stdout.trim(),
            stderr = %out.stderr.trim(),
            "script failed"
        );
        Ok(Err(Message::warning(format!("{}: {}", failure, out.stdout.trim()))))
    }
}

/// Runs `hw_dir_setup <class> <project>` inside `parent`.
///
/// Request errors (missing parent, no write access) come back as `Err`; the
/// outcome the user should see comes back as the `Message`.
pub fn add_class(config: &DashboardConfig, parent: &Path, class_name: &str) -> Result<Message> {
    if !parent.exists() {
        return Err(DashboardError::NotFound {
            path: parent.to_path_buf(),
        });
    }
    if !parent.is_dir() {
        return Err(DashboardError::BadRequest(String::from("Not a directory")));
    }
    if !is_writable(parent) {
        return Err(DashboardError::PermissionDenied {
            path: parent.to_path_buf(),
        });
    }
    if !is_valid_name(class_name) {
        return Ok(Message::danger(format!("Invalid class name: '{}'", class_name)));
    }
    let script = match script(config, HW_DIR_SETUP_SCRIPT) {
        Ok(s) => s,
        Err(msg) => return Ok(msg),
    };
    let project = parent
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    match run_script(&script, &[class_name, project.as_str()], parent, "Could not add class")? {
        Ok(()) => {
            tracing::info!(class = class_name, project = %project, "class added");
            Ok(Message::success(format!(
                "Class Added: directory for {} successfully created",
                class_name
            )))
        }
        Err(msg) => Ok(msg),
    }
}

/// Runs `add_assignment <name>` inside the class directory, then makes sure the
/// metadata file exists and carries `due` when one was given.
pub fn add_assignment(
    config: &DashboardConfig,
    class_path: &Path,
    name: &str,
    due: Option<DateTime<Utc>>,
) -> Result<Message> {
    if !is_writable(class_path) {
        return Err(DashboardError::PermissionDenied {
            path: class_path.to_path_buf(),
        });
    }
    if !is_valid_name(name) {
        return Ok(Message::danger(format!("Invalid assignment name: '{}'", name)));
    }
    let script = match script(config, ADD_ASSIGNMENT_SCRIPT) {
        Ok(s) => s,
        Err(msg) => return Ok(msg),
    };
    if let Err(msg) = run_script(&script, &[name], class_path, "Could not add assignment")? {
        return Ok(msg);
    }

    let assignment = class_path.join(name);
    if !assignment.is_dir() {
        return Ok(Message::warning(format!(
            "Could not add assignment: {} did not create {}",
            ADD_ASSIGNMENT_SCRIPT,
            assignment.display()
        )));
    }
    let meta_path = assignment.join(&config.assignment_metadata);
    if !is_assignment_dir(config, &assignment) {
        write_meta(&meta_path, Utc::now(), due)?;
    } else if due.is_some() {
        let meta = read_meta(&meta_path)?;
        write_meta(&meta_path, created_or_mtime(&meta, &meta_path)?, due)?;
    }
    tracing::info!(assignment = %assignment.display(), "assignment added");
    Ok(Message::success(format!(
        "Assignment Added: {} successfully created",
        name
    )))
}

/// Hands `source` to `submit_hw_helper`. Locked assignments refuse.
pub fn submit(config: &DashboardConfig, assignment: &Path, source: &Path) -> Result<Message> {
    if !is_open(config, assignment) {
        return Err(DashboardError::Locked {
            path: assignment.to_path_buf(),
        });
    }
    if !source.exists() {
        return Err(DashboardError::NotFound {
            path: source.to_path_buf(),
        });
    }
    let script = match script(config, SUBMIT_SCRIPT) {
        Ok(s) => s,
        Err(msg) => return Ok(msg),
    };
    let source = source
        .canonicalize()
        .map_err(|e| DashboardError::from_io("resolving", source, e))?;
    let source_arg = source.to_string_lossy().to_string();
    let assignment_arg = assignment.to_string_lossy().to_string();
    let args = [source_arg.as_str(), assignment_arg.as_str()];

    match run_script(&script, &args, assignment, "Could not submit")? {
        Ok(()) => {
            tracing::info!(assignment = %assignment.display(), "submitted");
            Ok(Message::success("Submitted"))
        }
        Err(msg) => Ok(msg),
    }
}

/// Gives `login` read/write on the class tree, now and for files created later.
pub fn grant_ta(config: &DashboardConfig, class_path: &Path, login: &str) -> Result<Message> {
    if !is_valid_login(login) {
        return Ok(Message::danger(format!("Invalid user name: '{}'", login)));
    }
    let spec = format!("u:{}:rwX", login);
    let class_arg = class_path.to_string_lossy().to_string();
    for args in [
        vec!["-R", "-m", spec.as_str(), class_arg.as_str()],
        vec!["-R", "-d", "-m", spec.as_str(), class_arg.as_str()],
    ] {
        let out = capture(&config.setfacl, &args, None)
            .map_err(|e| DashboardError::io("running setfacl on", class_path, e))?;
        if !out.success {
            tracing::warn!(
                class = %class_path.display(),
                stderr = %out.stderr.trim(),
                "setfacl failed"
            );
            return Ok(Message::warning(format!(
                "Could not grant access to {}: {}",
                login,
                out.stderr.trim()
            )));
        }
    }
    tracing::info!(class = %class_path.display(), login, "granted TA access");
    Ok(Message::success(format!("{} can now manage this class", login)))
}

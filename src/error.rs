//! Errors that end a request.
//!
//! Soft problems (a group lookup failing, an unparsable due date) never show up
//! here; they travel as [`crate::messages::Message`]s next to the listing.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("File or directory not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("assignment is locked: {path}")]
    Locked { path: PathBuf },

    #[error("{0}")]
    BadRequest(String),

    #[error("Not a homework directory: {path}")]
    NotHomeworkDirectory { path: PathBuf },

    #[error("Not an assignment directory: {path}")]
    NotAssignmentDirectory { path: PathBuf },

    #[error("{context} {path}: {source}")]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not create temporary file for downloading: {0}")]
    TempDir(#[source] std::io::Error),

    #[error("could not compress directory: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("invalid config {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Template(#[from] handlebars::TemplateError),

    #[error(transparent)]
    Render(#[from] handlebars::RenderError),

    #[error(transparent)]
    Walk(#[from] walkdir::Error),
}

impl DashboardError {
    pub fn io(context: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DashboardError::Io {
            context,
            path: path.into(),
            source,
        }
    }

    /// Maps an error from touching `path` onto the not-found / permission tiers
    /// when the kind allows it.
    pub fn from_io(
        context: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => DashboardError::NotFound { path },
            std::io::ErrorKind::PermissionDenied => DashboardError::PermissionDenied { path },
            _ => DashboardError::io(context, path, source),
        }
    }

    /// HTTP-style status used for exit codes and error output.
    pub fn status(&self) -> u16 {
        match self {
            DashboardError::NotFound { .. } => 404,
            DashboardError::PermissionDenied { .. } | DashboardError::Locked { .. } => 403,
            DashboardError::BadRequest(_) => 400,
            DashboardError::NotHomeworkDirectory { .. }
            | DashboardError::NotAssignmentDirectory { .. } => 401,
            _ => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, DashboardError>;

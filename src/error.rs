//! Error types for the scan pipeline.
//!
//! Classification failures are not represented here: the classifier treats a
//! directory it cannot read as "not a project" and only logs, so no caller
//! ever receives such an error.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the scan pipeline. Each variant carries the path or key
/// that was being worked on so a failure can be diagnosed without re-running.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The scan root itself could not be listed. Fatal: the run aborts before
    /// any store write.
    #[error("cannot list scan root {path}: {source}")]
    ScanDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An open/stat/read/list failure while processing one file or project.
    /// Fails that unit of work; sibling projects are unaffected in concurrent
    /// mode.
    #[error("{action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The platform owner of a path could not be resolved (stat, security
    /// descriptor, or account lookup failed). Fails the unit that needed the
    /// owner; never silently replaced with a placeholder identity.
    #[error("resolving owner of {path}: {detail}")]
    OwnerResolution { path: PathBuf, detail: String },

    /// A store lookup or create failed with something other than "not found".
    /// Fails the unit; never retried here.
    #[error("store {action} for {key}: {source}")]
    Store {
        action: &'static str,
        key: String,
        #[source]
        source: rusqlite::Error,
    },
}

impl ScanError {
    /// Shorthand for wrapping an I/O failure with the action and path context.
    pub fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ScanError::Io {
            action,
            path: path.into(),
            source,
        }
    }

    /// Shorthand for a store failure tagged with the operation and natural key.
    pub fn store(action: &'static str, key: impl Into<String>, source: rusqlite::Error) -> Self {
        ScanError::Store {
            action,
            key: key.into(),
            source,
        }
    }
}

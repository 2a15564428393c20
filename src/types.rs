//! Records, attribute sets, and run options shared across the pipeline.

use std::path::PathBuf;

use crate::error::ScanError;

/// A registered platform account (same shape as a row in the `owners` table).
///
/// The natural key is `uid` on POSIX hosts and `username` on Windows; `id` is
/// the opaque store identifier. Rows are created lazily on first observation
/// and never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnerRecord {
    pub id: String,
    /// Platform-native numeric id: the owning uid on POSIX, a SID
    /// sub-authority value on Windows.
    pub uid: i64,
    /// Login / account name.
    pub username: String,
    /// Display name: GECOS field on POSIX, `DOMAIN\account` on Windows.
    pub fullname: String,
}

/// A registered project directory (row in the `projects` table).
/// Unique by absolute `path`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectRecord {
    pub id: String,
    pub name: String,
    pub path: PathBuf,
    pub description: Option<String>,
    /// Owner id of the account that owned the directory when it was first
    /// registered. Set once; rediscovery does not overwrite it.
    pub created_by: String,
    /// RFC 3339 timestamp of first registration.
    pub created_at: String,
}

/// A registered file (row in the `files` table). Unique by absolute `path`;
/// re-scans return the first-seen row unchanged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileRecord {
    pub id: String,
    pub name: String,
    pub project_id: String,
    pub owner_id: String,
    pub path: PathBuf,
    pub size: u64,
    /// Permission-mode string: octal mode bits on Unix, `ro`/`rw` elsewhere.
    pub mode: String,
    /// RFC 3339 modification timestamp captured at registration.
    pub modified_at: String,
    /// Lowercase-hex SHA-512 of the file contents.
    pub digest: String,
    pub description: Option<String>,
}

/// Attributes used when a project create is needed (the lookup key is `path`).
#[derive(Clone, Debug)]
pub struct NewProject {
    pub name: String,
    pub path: PathBuf,
    pub description: Option<String>,
    pub created_by: String,
}

/// Attributes used when a file create is needed (the lookup key is `path`).
#[derive(Clone, Debug)]
pub struct NewFile {
    pub name: String,
    pub project_id: String,
    pub owner_id: String,
    pub path: PathBuf,
    pub size: u64,
    pub mode: String,
    pub modified_at: String,
    pub digest: String,
    pub description: Option<String>,
}

/// Run options for [`run_scan`](crate::scan::run_scan).
#[derive(Clone, Debug, Default)]
pub struct ScanOpts {
    /// Process projects one at a time and abort on the first failure, instead
    /// of fanning out one unit per project with failures isolated.
    pub serial: bool,
    /// Concurrency cap override. When None, derived from available
    /// parallelism and the FD limit.
    pub workers: Option<usize>,
    /// Verbose output (debug-level logging).
    pub verbose: bool,
}

/// Result of processing a single project directory.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProjectStats {
    /// True when this run created the project row (first discovery).
    pub project_created: bool,
    /// Files registered (created or re-fetched) inside the project.
    pub files: usize,
    /// Files newly created this run.
    pub files_created: usize,
}

/// A project unit that failed in concurrent mode, kept with its error so the
/// run can report every failure instead of only the first.
#[derive(Debug)]
pub struct ProjectFailure {
    pub path: PathBuf,
    pub error: ScanError,
}

/// Aggregate outcome of one scan run.
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Projects processed to completion.
    pub projects: usize,
    /// Projects newly created this run.
    pub projects_created: usize,
    /// Files registered across all completed projects.
    pub files: usize,
    /// Files newly created this run.
    pub files_created: usize,
    /// Per-project failures collected in concurrent mode (empty in a clean
    /// run; serial mode aborts instead of collecting).
    pub failures: Vec<ProjectFailure>,
}

impl ScanReport {
    /// True when every discovered project was processed without error.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// One-line human summary used for the completion log.
    pub fn summary(&self) -> String {
        format!(
            "{} projects ({} new), {} files ({} new), {} failed",
            self.projects,
            self.projects_created,
            self.files,
            self.files_created,
            self.failures.len()
        )
    }
}

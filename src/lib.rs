//! Scanledger: register digitization projects, their files, and their owners
//! in a shared SQLite ledger.
//!
//! A scan walks one root directory, treats each subdirectory holding `*.tif`
//! entries as a project, and records owner, project, and file rows with
//! get-or-create semantics, so re-running a scan is always safe.

pub mod classify;
pub mod cli;
pub mod digest;
pub mod error;
pub mod owner;
pub mod scan;
pub mod store;
pub mod types;
pub mod utils;

/// Re-export records and options for API
pub use types::*;

pub use classify::is_scan_project;
pub use digest::digest_file;
pub use error::ScanError;
pub use owner::{OwnerResolver, platform_resolver};
pub use scan::{discover_projects, process_project, run_scan};
pub use store::{Store, StoreCounts};

use std::path::Path;

/// Single entry point: open the ledger at `db_path`, scan `root`, and return
/// the report. This is what the CLI runs once its flags are resolved; library
/// callers get the same behavior without the flag layer.
pub fn scan_root(root: &Path, db_path: &Path, opts: &ScanOpts) -> Result<ScanReport, ScanError> {
    let store = Store::open(db_path)?;
    let resolver = platform_resolver(&store);
    run_scan(&store, &resolver, root, opts)
}

//! Project classification: a directory qualifies when it directly contains at
//! least one `*.tif` entry.

use glob::Pattern;
use log::warn;
use std::path::Path;

/// True iff `dir` directly contains at least one entry matching the
/// case-sensitive glob `*.tif`. Non-recursive: nested `.tif` files do not
/// qualify a parent, and the four-letter `.tiff` extension never matches.
///
/// Deliberately permissive about failures: if the directory cannot be
/// canonicalized or the glob cannot run, the problem is logged and the
/// directory is treated as not a project, so one bad entry never stops a scan
/// of its siblings.
pub fn is_scan_project(dir: &Path) -> bool {
    let abs = match dir.canonicalize() {
        Ok(p) => p,
        Err(e) => {
            warn!("classify: cannot resolve {}: {}", dir.display(), e);
            return false;
        }
    };
    // The directory component gets escaped so bracket/star characters in real
    // directory names cannot widen the match.
    let pattern = format!("{}/*.tif", Pattern::escape(&abs.to_string_lossy()));
    let entries = match glob::glob(&pattern) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("classify: bad glob for {}: {}", abs.display(), e);
            return false;
        }
    };
    for entry in entries {
        match entry {
            Ok(_) => return true,
            Err(e) => warn!("classify: unreadable entry under {}: {}", abs.display(), e),
        }
    }
    false
}

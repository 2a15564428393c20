//! Load `scanledger.toml` from the scan root (CLI only). Library callers
//! inject options directly via [`ScanOpts`](crate::ScanOpts).

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::ScanOpts;
use crate::utils::config::SETTINGS_FILE_NAME;

#[derive(Debug, Deserialize)]
pub(crate) struct SettingsToml {
    #[serde(default)]
    settings: SettingsSection,
}

#[derive(Debug, Default, Deserialize)]
struct SettingsSection {
    db: Option<String>,
    workers: Option<usize>,
    serial: Option<bool>,
    verbose: Option<bool>,
}

/// Load `scanledger.toml` from `dir` if present. Returns None if the file is
/// missing or unparseable (the latter is logged, not fatal).
pub(crate) fn load_settings_toml(dir: &Path) -> Option<SettingsToml> {
    let path = dir.join(SETTINGS_FILE_NAME);
    let s = std::fs::read_to_string(&path).ok()?;
    toml::from_str(&s)
        .map_err(|e| log::warn!("{}: {}", path.display(), e))
        .ok()
}

/// Overwrite an opts field from the file when present.
macro_rules! apply_file_opt {
    ($section:expr, $opts:expr, $field:ident) => {
        if let Some(v) = $section.$field {
            $opts.$field = v;
        }
    };
}

impl SettingsToml {
    /// Store path from the file, if set. Applied beneath CLI and environment.
    pub(crate) fn db_path(&self) -> Option<PathBuf> {
        self.settings.db.as_ref().map(PathBuf::from)
    }

    /// Apply file config to opts (only fields present in the file). Call
    /// before applying CLI flags so the command line wins.
    pub(crate) fn apply_to_opts(&self, opts: &mut ScanOpts) {
        let section = &self.settings;
        if let Some(n) = section.workers {
            opts.workers = Some(n);
        }
        apply_file_opt!(section, opts, serial);
        apply_file_opt!(section, opts, verbose);
    }
}

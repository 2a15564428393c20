//! Platform file-owner resolution.
//!
//! A resolver reads the owning account of a path from the platform (POSIX uid
//! via passwd lookup, Windows SID via the security API) and registers it in
//! the store, handing back the stored row. Resolvers are built against a
//! store handle once, up front; nothing here reaches for globals.

use std::path::Path;

use crate::error::ScanError;
use crate::store::Store;
use crate::types::OwnerRecord;

#[cfg(unix)]
mod posix;
#[cfg(windows)]
mod windows;

#[cfg(not(any(unix, windows)))]
compile_error!("file owner resolution is implemented for unix and windows targets only");

/// Turns the owner of a filesystem entry into a registered owner row.
/// Implementations are shared across scan workers, so they must be [`Sync`].
pub trait OwnerResolver: Sync {
    fn resolve_owner_for_path(&self, path: &Path) -> Result<OwnerRecord, ScanError>;
}

/// Resolver for the platform this binary was built for.
pub fn platform_resolver(store: &Store) -> impl OwnerResolver + '_ {
    #[cfg(unix)]
    {
        posix::PosixOwnerResolver::new(store)
    }

    #[cfg(windows)]
    {
        windows::WindowsOwnerResolver::new(store)
    }
}

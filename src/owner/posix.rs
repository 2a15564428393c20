//! POSIX owner lookup: uid from file metadata, account details via
//! `getpwuid_r`.

use log::debug;
use std::ffi::CStr;
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use super::OwnerResolver;
use crate::error::ScanError;
use crate::store::Store;
use crate::types::OwnerRecord;

struct Account {
    username: String,
    fullname: String,
}

pub struct PosixOwnerResolver<'a> {
    store: &'a Store,
}

impl<'a> PosixOwnerResolver<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }
}

impl OwnerResolver for PosixOwnerResolver<'_> {
    fn resolve_owner_for_path(&self, path: &Path) -> Result<OwnerRecord, ScanError> {
        let meta = fs::metadata(path).map_err(|e| ScanError::io("stat", path, e))?;
        let uid = meta.uid();
        let account = lookup_account(uid).map_err(|detail| ScanError::OwnerResolution {
            path: path.to_path_buf(),
            detail,
        })?;
        let (record, created) =
            self.store
                .ensure_owner_by_uid(i64::from(uid), &account.username, &account.fullname)?;
        if created {
            debug!("registered owner {} (uid {})", record.username, record.uid);
        }
        Ok(record)
    }
}

/// `getpwuid_r` with the usual grow-on-ERANGE retry loop.
fn lookup_account(uid: u32) -> Result<Account, String> {
    let hint = unsafe { libc::sysconf(libc::_SC_GETPW_R_SIZE_MAX) };
    let mut buf = vec![0u8; if hint > 0 { hint as usize } else { 1024 }];
    let mut pwd: libc::passwd = unsafe { std::mem::zeroed() };
    loop {
        let mut result: *mut libc::passwd = std::ptr::null_mut();
        let rc = unsafe {
            libc::getpwuid_r(
                uid,
                &mut pwd,
                buf.as_mut_ptr() as *mut libc::c_char,
                buf.len(),
                &mut result,
            )
        };
        if rc == libc::ERANGE {
            let grown = buf.len() * 2;
            buf.resize(grown, 0);
            continue;
        }
        if rc != 0 {
            return Err(format!("getpwuid_r failed for uid {uid}: errno {rc}"));
        }
        if result.is_null() {
            return Err(format!("no account entry for uid {uid}"));
        }
        let username = unsafe { CStr::from_ptr(pwd.pw_name) }
            .to_string_lossy()
            .into_owned();
        let gecos = if pwd.pw_gecos.is_null() {
            String::new()
        } else {
            unsafe { CStr::from_ptr(pwd.pw_gecos) }
                .to_string_lossy()
                .into_owned()
        };
        return Ok(Account {
            username,
            fullname: gecos_display_name(&gecos),
        });
    }
}

/// First comma-separated GECOS field, the display name by convention. An
/// entry without GECOS data yields an empty name.
fn gecos_display_name(gecos: &str) -> String {
    gecos.split(',').next().unwrap_or("").trim().to_string()
}

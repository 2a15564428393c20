//! Windows owner lookup via the security API: owner SID from the file's
//! security descriptor, account and domain names from `LookupAccountSidW`.

use log::debug;
use std::os::windows::ffi::OsStrExt;
use std::path::Path;

use windows::Win32::Foundation::{HLOCAL, LocalFree, PSID};
use windows::Win32::Security::Authorization::{GetNamedSecurityInfoW, SE_FILE_OBJECT};
use windows::Win32::Security::{
    GetSidSubAuthority, GetSidSubAuthorityCount, LookupAccountSidW, OWNER_SECURITY_INFORMATION,
    PSECURITY_DESCRIPTOR, SID_NAME_USE,
};
use windows::core::{PCWSTR, PWSTR};

use super::OwnerResolver;
use crate::error::ScanError;
use crate::store::Store;
use crate::types::OwnerRecord;

struct Account {
    uid: i64,
    username: String,
    fullname: String,
}

pub struct WindowsOwnerResolver<'a> {
    store: &'a Store,
}

impl<'a> WindowsOwnerResolver<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }
}

impl OwnerResolver for WindowsOwnerResolver<'_> {
    fn resolve_owner_for_path(&self, path: &Path) -> Result<OwnerRecord, ScanError> {
        let account = lookup_file_owner(path).map_err(|detail| ScanError::OwnerResolution {
            path: path.to_path_buf(),
            detail,
        })?;
        // Account names are the stable identity here; the numeric value is the
        // SID's first sub-authority and collides across accounts.
        let (record, created) = self.store.ensure_owner_by_username(
            account.uid,
            &account.username,
            &account.fullname,
        )?;
        if created {
            debug!("registered owner {}", record.username);
        }
        Ok(record)
    }
}

fn lookup_file_owner(path: &Path) -> Result<Account, String> {
    let wide: Vec<u16> = path
        .as_os_str()
        .encode_wide()
        .chain(std::iter::once(0))
        .collect();
    let mut owner_sid = PSID::default();
    let mut descriptor = PSECURITY_DESCRIPTOR::default();
    unsafe {
        GetNamedSecurityInfoW(
            PCWSTR(wide.as_ptr()),
            SE_FILE_OBJECT,
            OWNER_SECURITY_INFORMATION,
            Some(&mut owner_sid),
            None,
            None,
            None,
            Some(&mut descriptor),
        )
    }
    .ok()
    .map_err(|e| format!("query file security info: {e}"))?;

    // The SID points into the descriptor, so resolve before freeing it.
    let account = sid_to_account(owner_sid);
    unsafe {
        let _ = LocalFree(HLOCAL(descriptor.0));
    }
    account
}

fn sid_to_account(sid: PSID) -> Result<Account, String> {
    let mut name_len = 0u32;
    let mut domain_len = 0u32;
    let mut use_kind = SID_NAME_USE(0);
    // First call sizes the buffers and is expected to fail.
    let _ = unsafe {
        LookupAccountSidW(
            PCWSTR::null(),
            sid,
            None,
            &mut name_len,
            None,
            &mut domain_len,
            &mut use_kind,
        )
    };
    if name_len == 0 {
        return Err("no account name for owner SID".into());
    }
    let mut name = vec![0u16; name_len as usize];
    let mut domain = vec![0u16; domain_len as usize];
    unsafe {
        LookupAccountSidW(
            PCWSTR::null(),
            sid,
            Some(PWSTR(name.as_mut_ptr())),
            &mut name_len,
            Some(PWSTR(domain.as_mut_ptr())),
            &mut domain_len,
            &mut use_kind,
        )
    }
    .map_err(|e| format!("resolve account name for owner SID: {e}"))?;

    let username = wide_to_string(&name);
    let domain = wide_to_string(&domain);
    let uid = unsafe {
        if *GetSidSubAuthorityCount(sid) == 0 {
            return Err("owner SID has no sub-authorities".into());
        }
        i64::from(*GetSidSubAuthority(sid, 0))
    };
    let fullname = format!("{domain}\\{username}");
    Ok(Account {
        uid,
        username,
        fullname,
    })
}

fn wide_to_string(buf: &[u16]) -> String {
    let end = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
    String::from_utf16_lossy(&buf[..end])
}

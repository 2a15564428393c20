//! File content fingerprinting.

use sha2::{Digest, Sha512};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::ScanError;
use crate::utils::config::DIGEST_READ_CHUNK_SIZE;

/// Digest a file with SHA-512 in one forward streaming pass, chunked so memory
/// stays constant regardless of file size. Returns the fingerprint as a
/// 128-char lowercase hex string.
pub fn digest_file(path: &Path) -> Result<String, ScanError> {
    let file = File::open(path).map_err(|e| ScanError::io("opening for digest", path, e))?;
    let mut reader = BufReader::with_capacity(DIGEST_READ_CHUNK_SIZE, file);
    let mut hasher = Sha512::new();
    let mut buffer = vec![0u8; DIGEST_READ_CHUNK_SIZE];
    loop {
        let n = reader
            .read(&mut buffer)
            .map_err(|e| ScanError::io("reading for digest", path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(to_lower_hex(&hasher.finalize()))
}

fn to_lower_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

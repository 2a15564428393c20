//! Application configuration constants.
//! Tuning and thresholds in one place.

// ---- Digesting ----

/// Chunk size for the streaming SHA-512 pass (bytes). 1 MiB keeps syscall
/// count low without holding more than one chunk in memory.
pub const DIGEST_READ_CHUNK_SIZE: usize = 1024 * 1024;

// ---- Settings file ----

/// Optional per-scan-root settings file looked up inside the scan root.
pub const SETTINGS_FILE_NAME: &str = "scanledger.toml";

// ---- Store ----

/// SQLite busy timeout. Concurrent units share one connection, but a second
/// process (or a test opening a second connection) may hold the write lock
/// briefly; waiting beats surfacing SQLITE_BUSY as a unit failure.
pub const STORE_BUSY_TIMEOUT_MS: u64 = 5_000;

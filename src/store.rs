//! Registration store: idempotent get-or-create over SQLite.
//!
//! Every operation looks up by natural key first and only creates on "not
//! found". The lookup and the create take the connection lock separately, so
//! two concurrent units can race the same key; the unique constraints turn the
//! loser's insert into a constraint violation, which is converted back into a
//! fetch of the winner's row. "Not found" is never an error here, it is the
//! create trigger.

use chrono::Utc;
use log::debug;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

use crate::error::ScanError;
use crate::types::{FileRecord, NewFile, NewProject, OwnerRecord, ProjectRecord};
use crate::utils::config::STORE_BUSY_TIMEOUT_MS;

/// Uniqueness lives on the natural keys: `projects.path`, `files.path`, and
/// `owners.username`. The numeric owner id is only indexed, not unique: on
/// Windows the derived sub-authority value collides across accounts, while the
/// same physical identity always carries the same username on both platforms,
/// so the username constraint is the one that catches a create race.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS owners (
    id TEXT PRIMARY KEY,
    uid INTEGER NOT NULL,
    username TEXT NOT NULL UNIQUE,
    fullname TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_owners_uid ON owners(uid);

CREATE TABLE IF NOT EXISTS projects (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    path TEXT NOT NULL UNIQUE,
    description TEXT,
    created_by TEXT NOT NULL REFERENCES owners(id),
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS files (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    project_id TEXT NOT NULL REFERENCES projects(id),
    owner_id TEXT NOT NULL REFERENCES owners(id),
    path TEXT NOT NULL UNIQUE,
    size INTEGER NOT NULL,
    mode TEXT NOT NULL,
    modified_at TEXT NOT NULL,
    digest TEXT NOT NULL,
    description TEXT
);
CREATE INDEX IF NOT EXISTS idx_files_project ON files(project_id);
"#;

const SELECT_OWNER: &str = "SELECT id, uid, username, fullname FROM owners";
const SELECT_PROJECT: &str =
    "SELECT id, name, path, description, created_by, created_at FROM projects";
const SELECT_FILE: &str = "SELECT id, name, project_id, owner_id, path, size, mode, \
     modified_at, digest, description FROM files";

/// Row counts per relation, used for reporting and by tests asserting on
/// final store contents.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreCounts {
    pub owners: usize,
    pub projects: usize,
    pub files: usize,
}

/// Handle to the registration store. One SQLite connection behind a mutex, so
/// `&Store` can be shared by concurrent project units; each statement takes
/// the lock on its own and the get-then-create pair is deliberately not
/// atomic (see module docs).
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (or create) the store at `path` and make it ready to query: WAL
    /// journal, busy timeout, foreign keys on, idempotent schema.
    pub fn open(path: &Path) -> Result<Store, ScanError> {
        let key = path.to_string_lossy().into_owned();
        let conn = Connection::open(path).map_err(|e| ScanError::store("open", &key, e))?;
        conn.busy_timeout(Duration::from_millis(STORE_BUSY_TIMEOUT_MS))
            .map_err(|e| ScanError::store("set busy timeout", &key, e))?;
        conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))
            .map_err(|e| ScanError::store("enable WAL", &key, e))?;
        conn.execute_batch("PRAGMA synchronous = NORMAL; PRAGMA foreign_keys = ON;")
            .map_err(|e| ScanError::store("set pragmas", &key, e))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| ScanError::store("create schema", &key, e))?;
        debug!("store ready at {}", path.display());
        Ok(Store {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory store with the same schema (tests and dry
    /// experiments; no WAL needed).
    pub fn open_in_memory() -> Result<Store, ScanError> {
        let conn =
            Connection::open_in_memory().map_err(|e| ScanError::store("open", ":memory:", e))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| ScanError::store("set pragmas", ":memory:", e))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| ScanError::store("create schema", ":memory:", e))?;
        Ok(Store {
            conn: Mutex::new(conn),
        })
    }

    // ---- Lookups (None = not found, which is not an error) ----

    pub fn owner_by_uid(&self, uid: i64) -> Result<Option<OwnerRecord>, ScanError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!("{SELECT_OWNER} WHERE uid = ?1"),
            params![uid],
            row_to_owner,
        )
        .optional()
        .map_err(|e| ScanError::store("lookup owner", uid.to_string(), e))
    }

    pub fn owner_by_username(&self, username: &str) -> Result<Option<OwnerRecord>, ScanError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!("{SELECT_OWNER} WHERE username = ?1"),
            params![username],
            row_to_owner,
        )
        .optional()
        .map_err(|e| ScanError::store("lookup owner", username, e))
    }

    pub fn project_by_path(&self, path: &Path) -> Result<Option<ProjectRecord>, ScanError> {
        let key = path.to_string_lossy();
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!("{SELECT_PROJECT} WHERE path = ?1"),
            params![key.as_ref()],
            row_to_project,
        )
        .optional()
        .map_err(|e| ScanError::store("lookup project", key.as_ref(), e))
    }

    pub fn file_by_path(&self, path: &Path) -> Result<Option<FileRecord>, ScanError> {
        let key = path.to_string_lossy();
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!("{SELECT_FILE} WHERE path = ?1"),
            params![key.as_ref()],
            row_to_file,
        )
        .optional()
        .map_err(|e| ScanError::store("lookup file", key.as_ref(), e))
    }

    // ---- Get-or-create ----

    /// Get-or-create an owner by POSIX uid. The bool is true when this call
    /// created the row.
    pub fn ensure_owner_by_uid(
        &self,
        uid: i64,
        username: &str,
        fullname: &str,
    ) -> Result<(OwnerRecord, bool), ScanError> {
        if let Some(existing) = self.owner_by_uid(uid)? {
            return Ok((existing, false));
        }
        match self.insert_owner(uid, username, fullname) {
            Ok(record) => Ok((record, true)),
            Err(e) if is_constraint_violation(&e) => match self.owner_by_uid(uid)? {
                Some(existing) => Ok((existing, false)),
                None => Err(ScanError::store("create owner", uid.to_string(), e)),
            },
            Err(e) => Err(ScanError::store("create owner", uid.to_string(), e)),
        }
    }

    /// Get-or-create an owner by account name (the Windows natural key, where
    /// numeric ids are not stably comparable).
    pub fn ensure_owner_by_username(
        &self,
        uid: i64,
        username: &str,
        fullname: &str,
    ) -> Result<(OwnerRecord, bool), ScanError> {
        if let Some(existing) = self.owner_by_username(username)? {
            return Ok((existing, false));
        }
        match self.insert_owner(uid, username, fullname) {
            Ok(record) => Ok((record, true)),
            Err(e) if is_constraint_violation(&e) => match self.owner_by_username(username)? {
                Some(existing) => Ok((existing, false)),
                None => Err(ScanError::store("create owner", username, e)),
            },
            Err(e) => Err(ScanError::store("create owner", username, e)),
        }
    }

    /// Get-or-create a project by absolute path. On rediscovery the stored row
    /// is returned unchanged; in particular `created_by` keeps the owner seen
    /// at first registration.
    pub fn ensure_project(&self, attrs: &NewProject) -> Result<(ProjectRecord, bool), ScanError> {
        let key = attrs.path.to_string_lossy().into_owned();
        if let Some(existing) = self.project_by_path(&attrs.path)? {
            return Ok((existing, false));
        }
        match self.insert_project(attrs) {
            Ok(record) => Ok((record, true)),
            Err(e) if is_constraint_violation(&e) => match self.project_by_path(&attrs.path)? {
                Some(existing) => Ok((existing, false)),
                None => Err(ScanError::store("create project", key, e)),
            },
            Err(e) => Err(ScanError::store("create project", key, e)),
        }
    }

    /// Get-or-create a file by absolute path. A re-scan of a changed file
    /// still returns the first-seen row; the caller decides what to do with
    /// the difference.
    pub fn ensure_file(&self, attrs: &NewFile) -> Result<(FileRecord, bool), ScanError> {
        let key = attrs.path.to_string_lossy().into_owned();
        if let Some(existing) = self.file_by_path(&attrs.path)? {
            return Ok((existing, false));
        }
        match self.insert_file(attrs) {
            Ok(record) => Ok((record, true)),
            Err(e) if is_constraint_violation(&e) => match self.file_by_path(&attrs.path)? {
                Some(existing) => Ok((existing, false)),
                None => Err(ScanError::store("create file", key, e)),
            },
            Err(e) => Err(ScanError::store("create file", key, e)),
        }
    }

    /// Row counts for all three relations.
    pub fn counts(&self) -> Result<StoreCounts, ScanError> {
        let conn = self.conn.lock().unwrap();
        let count = |table: &str| -> Result<usize, ScanError> {
            conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get::<_, i64>(0)
            })
            .map(|n| n.max(0) as usize)
            .map_err(|e| ScanError::store("count rows", table, e))
        };
        Ok(StoreCounts {
            owners: count("owners")?,
            projects: count("projects")?,
            files: count("files")?,
        })
    }

    // ---- Inserts (plain rusqlite errors so callers can spot violations) ----

    fn insert_owner(
        &self,
        uid: i64,
        username: &str,
        fullname: &str,
    ) -> Result<OwnerRecord, rusqlite::Error> {
        let record = OwnerRecord {
            id: Uuid::new_v4().to_string(),
            uid,
            username: username.to_string(),
            fullname: fullname.to_string(),
        };
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO owners (id, uid, username, fullname) VALUES (?1, ?2, ?3, ?4)",
            params![record.id, record.uid, record.username, record.fullname],
        )?;
        Ok(record)
    }

    fn insert_project(&self, attrs: &NewProject) -> Result<ProjectRecord, rusqlite::Error> {
        let record = ProjectRecord {
            id: Uuid::new_v4().to_string(),
            name: attrs.name.clone(),
            path: attrs.path.clone(),
            description: attrs.description.clone(),
            created_by: attrs.created_by.clone(),
            created_at: Utc::now().to_rfc3339(),
        };
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO projects (id, name, path, description, created_by, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.id,
                record.name,
                record.path.to_string_lossy(),
                record.description,
                record.created_by,
                record.created_at
            ],
        )?;
        Ok(record)
    }

    fn insert_file(&self, attrs: &NewFile) -> Result<FileRecord, rusqlite::Error> {
        let record = FileRecord {
            id: Uuid::new_v4().to_string(),
            name: attrs.name.clone(),
            project_id: attrs.project_id.clone(),
            owner_id: attrs.owner_id.clone(),
            path: attrs.path.clone(),
            size: attrs.size,
            mode: attrs.mode.clone(),
            modified_at: attrs.modified_at.clone(),
            digest: attrs.digest.clone(),
            description: attrs.description.clone(),
        };
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO files (id, name, project_id, owner_id, path, size, mode, \
             modified_at, digest, description) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                record.id,
                record.name,
                record.project_id,
                record.owner_id,
                record.path.to_string_lossy(),
                record.size as i64,
                record.mode,
                record.modified_at,
                record.digest,
                record.description
            ],
        )?;
        Ok(record)
    }
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(e, _)
        if e.code == rusqlite::ErrorCode::ConstraintViolation)
}

fn row_to_owner(row: &rusqlite::Row<'_>) -> rusqlite::Result<OwnerRecord> {
    Ok(OwnerRecord {
        id: row.get(0)?,
        uid: row.get(1)?,
        username: row.get(2)?,
        fullname: row.get(3)?,
    })
}

fn row_to_project(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProjectRecord> {
    let path: String = row.get(2)?;
    Ok(ProjectRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        path: path.into(),
        description: row.get(3)?,
        created_by: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn row_to_file(row: &rusqlite::Row<'_>) -> rusqlite::Result<FileRecord> {
    let path: String = row.get(4)?;
    let size: i64 = row.get(5)?;
    Ok(FileRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        project_id: row.get(2)?,
        owner_id: row.get(3)?,
        path: path.into(),
        size: size.max(0) as u64,
        mode: row.get(6)?,
        modified_at: row.get(7)?,
        digest: row.get(8)?,
        description: row.get(9)?,
    })
}

//! Store tests: get-or-create semantics, natural-key lookups, concurrent
//! registration, and persistence across reopen.

use scanledger::{NewFile, NewProject, ScanError, Store};
use std::path::Path;
use std::sync::Barrier;
use std::thread;
use tempfile::tempdir;

fn sample_file(project_id: &str, owner_id: &str, path: &Path) -> NewFile {
    NewFile {
        name: path.file_name().unwrap().to_string_lossy().into_owned(),
        project_id: project_id.to_string(),
        owner_id: owner_id.to_string(),
        path: path.to_path_buf(),
        size: 1024,
        mode: "0644".to_string(),
        modified_at: "2026-02-10T09:30:00+00:00".to_string(),
        digest: "0d".repeat(64),
        description: None,
    }
}

// --- lookups ---

#[test]
fn test_counts_empty_store() {
    let store = Store::open_in_memory().unwrap();
    let counts = store.counts().unwrap();
    assert_eq!((counts.owners, counts.projects, counts.files), (0, 0, 0));
}

#[test]
fn test_lookup_missing_is_none() {
    let store = Store::open_in_memory().unwrap();
    assert!(store.owner_by_uid(1000).unwrap().is_none());
    assert!(store.owner_by_username("nobody").unwrap().is_none());
    assert!(store.project_by_path(Path::new("/no/such")).unwrap().is_none());
    assert!(store.file_by_path(Path::new("/no/such/file")).unwrap().is_none());
}

// --- owners ---

#[test]
fn test_ensure_owner_creates_then_fetches() {
    let store = Store::open_in_memory().unwrap();
    let (first, created) = store
        .ensure_owner_by_uid(1000, "ada", "Ada Lovelace")
        .unwrap();
    assert!(created);
    assert_eq!(first.uid, 1000);
    assert_eq!(first.username, "ada");
    assert_eq!(first.fullname, "Ada Lovelace");

    let (second, created) = store
        .ensure_owner_by_uid(1000, "ada", "Ada Lovelace")
        .unwrap();
    assert!(!created);
    assert_eq!(second.id, first.id);
    assert_eq!(store.counts().unwrap().owners, 1);
}

#[test]
fn test_ensure_owner_by_username_keeps_first_seen_attributes() {
    let store = Store::open_in_memory().unwrap();
    let (first, created) = store
        .ensure_owner_by_username(21, "LAB\\scanner", "LAB\\scanner")
        .unwrap();
    assert!(created);

    // Same account name again, even with a different numeric value: the
    // stored row wins and is not rewritten.
    let (second, created) = store
        .ensure_owner_by_username(98, "LAB\\scanner", "other")
        .unwrap();
    assert!(!created);
    assert_eq!(second.id, first.id);
    assert_eq!(second.uid, 21);
    assert_eq!(second.fullname, "LAB\\scanner");
}

#[test]
fn test_conflicting_username_for_new_uid_errors() {
    let store = Store::open_in_memory().unwrap();
    store.ensure_owner_by_uid(1000, "bob", "Bob").unwrap();
    // A different uid claiming an already-registered username cannot be
    // resolved by re-fetching the uid key, so it surfaces instead of merging
    // two accounts into one row.
    let err = store
        .ensure_owner_by_uid(2000, "bob", "Other Bob")
        .unwrap_err();
    assert!(matches!(err, ScanError::Store { action: "create owner", .. }));
    assert_eq!(store.counts().unwrap().owners, 1);
}

#[test]
fn test_concurrent_owner_registration_yields_single_row() {
    let store = Store::open_in_memory().unwrap();
    let barrier = Barrier::new(8);
    let results: Vec<(String, bool)> = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    let (rec, created) = store
                        .ensure_owner_by_uid(4242, "race", "Race Condition")
                        .unwrap();
                    (rec.id, created)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let first_id = &results[0].0;
    assert!(results.iter().all(|(id, _)| id == first_id));
    assert_eq!(results.iter().filter(|(_, c)| *c).count(), 1);
    assert_eq!(store.counts().unwrap().owners, 1);
}

// --- projects ---

#[test]
fn test_ensure_project_pins_creator_and_timestamp() {
    let store = Store::open_in_memory().unwrap();
    let (ada, _) = store
        .ensure_owner_by_uid(1000, "ada", "Ada Lovelace")
        .unwrap();
    let (bob, _) = store.ensure_owner_by_uid(1001, "bob", "Bob").unwrap();

    let (project, created) = store
        .ensure_project(&NewProject {
            name: "alpha".to_string(),
            path: "/scans/alpha".into(),
            description: None,
            created_by: ada.id.clone(),
        })
        .unwrap();
    assert!(created);
    assert_eq!(project.name, "alpha");
    assert_eq!(project.created_by, ada.id);
    assert!(project.created_at.contains('T'));
    assert!(project.description.is_none());

    // Rediscovery under a different account does not rewrite the row.
    let (again, created) = store
        .ensure_project(&NewProject {
            name: "alpha".to_string(),
            path: "/scans/alpha".into(),
            description: None,
            created_by: bob.id,
        })
        .unwrap();
    assert!(!created);
    assert_eq!(again.id, project.id);
    assert_eq!(again.created_by, ada.id);
    assert_eq!(again.created_at, project.created_at);
    assert_eq!(store.counts().unwrap().projects, 1);
}

// --- files ---

#[test]
fn test_ensure_file_keeps_first_seen_snapshot() {
    let store = Store::open_in_memory().unwrap();
    let (owner, _) = store
        .ensure_owner_by_uid(1000, "ada", "Ada Lovelace")
        .unwrap();
    let (project, _) = store
        .ensure_project(&NewProject {
            name: "alpha".to_string(),
            path: "/scans/alpha".into(),
            description: None,
            created_by: owner.id.clone(),
        })
        .unwrap();

    let attrs = sample_file(&project.id, &owner.id, Path::new("/scans/alpha/page_001.tif"));
    let (first, created) = store.ensure_file(&attrs).unwrap();
    assert!(created);
    assert_eq!(first.name, "page_001.tif");
    assert_eq!(first.size, 1024);
    assert_eq!(first.mode, "0644");
    assert_eq!(first.digest, "0d".repeat(64));
    assert!(first.description.is_none());

    // A later scan seeing different contents still gets the original row.
    let mut changed = attrs.clone();
    changed.size = 2048;
    changed.digest = "ff".repeat(64);
    let (second, created) = store.ensure_file(&changed).unwrap();
    assert!(!created);
    assert_eq!(second.id, first.id);
    assert_eq!(second.size, 1024);
    assert_eq!(second.digest, "0d".repeat(64));
    assert_eq!(store.counts().unwrap().files, 1);
}

#[test]
fn test_file_with_unknown_project_is_rejected() {
    let store = Store::open_in_memory().unwrap();
    let (owner, _) = store
        .ensure_owner_by_uid(1000, "ada", "Ada Lovelace")
        .unwrap();
    let err = store
        .ensure_file(&sample_file("no-such-project", &owner.id, Path::new("/scans/x/y.tif")))
        .unwrap_err();
    assert!(matches!(err, ScanError::Store { action: "create file", .. }));
    assert_eq!(store.counts().unwrap().files, 0);
}

// --- file-backed ledgers ---

#[test]
fn test_two_handles_on_one_ledger_agree() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("ledger.db");
    let a = Store::open(&db_path).unwrap();
    let b = Store::open(&db_path).unwrap();

    let (created_row, created) = a.ensure_owner_by_uid(1000, "ada", "Ada Lovelace").unwrap();
    assert!(created);
    let (seen_row, created) = b.ensure_owner_by_uid(1000, "ada", "Ada Lovelace").unwrap();
    assert!(!created);
    assert_eq!(seen_row.id, created_row.id);
}

#[test]
fn test_store_persists_across_reopen() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("ledger.db");
    {
        let store = Store::open(&db_path).unwrap();
        let (owner, _) = store
            .ensure_owner_by_uid(1000, "ada", "Ada Lovelace")
            .unwrap();
        let (project, _) = store
            .ensure_project(&NewProject {
                name: "alpha".to_string(),
                path: dir.path().join("alpha"),
                description: None,
                created_by: owner.id.clone(),
            })
            .unwrap();
        store
            .ensure_file(&sample_file(
                &project.id,
                &owner.id,
                &dir.path().join("alpha/scan.tif"),
            ))
            .unwrap();
    }

    let store = Store::open(&db_path).unwrap();
    let counts = store.counts().unwrap();
    assert_eq!((counts.owners, counts.projects, counts.files), (1, 1, 1));
    let owner = store.owner_by_uid(1000).unwrap().unwrap();
    assert_eq!(owner.username, "ada");
    let file = store
        .file_by_path(&dir.path().join("alpha/scan.tif"))
        .unwrap()
        .unwrap();
    assert_eq!(file.name, "scan.tif");
}

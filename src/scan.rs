//! Scan orchestration: discover project directories under a root, then
//! register owner, project, and file rows for each.
//!
//! Project directories are independent units of work. The default mode fans
//! them out over a small worker pool and collects per-unit failures into the
//! report; serial mode processes them one at a time and aborts on the first
//! error. Within one unit the order is fixed: owner, then project, then the
//! project's files.

use chrono::{DateTime, Utc};
use crossbeam_channel::bounded;
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use walkdir::WalkDir;

use crate::classify::is_scan_project;
use crate::digest::digest_file;
use crate::error::ScanError;
use crate::owner::OwnerResolver;
use crate::store::Store;
use crate::types::{NewFile, NewProject, ProjectFailure, ProjectStats, ScanOpts, ScanReport};
use crate::utils::max_workers_by_fd_limit;

/// List the immediate subdirectories of `root` that qualify as projects.
/// A root that cannot be listed is fatal; unreadable children are handled by
/// the classifier (logged and skipped).
pub fn discover_projects(root: &Path) -> Result<Vec<PathBuf>, ScanError> {
    let entries = fs::read_dir(root).map_err(|e| ScanError::ScanDirectory {
        path: root.to_path_buf(),
        source: e,
    })?;
    let mut projects = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ScanError::ScanDirectory {
            path: root.to_path_buf(),
            source: e,
        })?;
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if !is_dir {
            continue;
        }
        let path = entry.path();
        if is_scan_project(&path) {
            projects.push(path);
        } else {
            debug!("skipping {} (no scan markers)", path.display());
        }
    }
    projects.sort();
    Ok(projects)
}

/// Register one project directory: its owner, the project row, then every
/// regular file directly inside it. Returns what was created vs. re-fetched.
pub fn process_project(
    store: &Store,
    resolver: &dyn OwnerResolver,
    project_dir: &Path,
) -> Result<ProjectStats, ScanError> {
    debug!("processing project {}", project_dir.display());
    let project_owner = resolver.resolve_owner_for_path(project_dir)?;
    let name = project_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| project_dir.to_string_lossy().into_owned());
    let (project, project_created) = store.ensure_project(&NewProject {
        name,
        path: project_dir.to_path_buf(),
        description: None,
        created_by: project_owner.id,
    })?;
    if project_created {
        debug!("registered project {} as {}", project.name, project.id);
    }

    let mut stats = ProjectStats {
        project_created,
        ..Default::default()
    };
    for entry in WalkDir::new(project_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| {
            let path = e
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| project_dir.to_path_buf());
            ScanError::io("list", path, e.into())
        })?;
        // Every non-directory entry belongs to the inventory; subdirectories
        // are skipped, not recursed. Symlinks are stat'd and digested through
        // their target.
        if entry.file_type().is_dir() {
            continue;
        }
        let path = entry.path();
        let meta = fs::metadata(path).map_err(|e| ScanError::io("stat", path, e))?;
        let digest = digest_file(path)?;
        let owner = resolver.resolve_owner_for_path(path)?;
        let (record, created) = store.ensure_file(&NewFile {
            name: entry.file_name().to_string_lossy().into_owned(),
            project_id: project.id.clone(),
            owner_id: owner.id,
            path: path.to_path_buf(),
            size: meta.len(),
            mode: mode_string(&meta),
            modified_at: modified_rfc3339(&meta, path)?,
            digest: digest.clone(),
            description: None,
        })?;
        stats.files += 1;
        if created {
            stats.files_created += 1;
        } else if record.digest != digest {
            warn!(
                "contents of {} changed since first registration (stored {}…, rescanned {}…)",
                path.display(),
                short(&record.digest),
                short(&digest)
            );
        }
    }
    Ok(stats)
}

/// Run a full scan under `root`. Concurrent by default; see [`ScanOpts`].
pub fn run_scan(
    store: &Store,
    resolver: &dyn OwnerResolver,
    root: &Path,
    opts: &ScanOpts,
) -> Result<ScanReport, ScanError> {
    let root = fs::canonicalize(root).map_err(|e| ScanError::ScanDirectory {
        path: root.to_path_buf(),
        source: e,
    })?;
    let projects = discover_projects(&root)?;
    let mut report = ScanReport::default();
    if projects.is_empty() {
        info!("no projects found under {}", root.display());
        return Ok(report);
    }
    info!(
        "discovered {} project(s) under {}",
        projects.len(),
        root.display()
    );

    if opts.serial {
        for dir in projects {
            let stats = process_project(store, resolver, &dir)?;
            absorb(&mut report, stats);
        }
        return Ok(report);
    }

    let unit_count = projects.len();
    let workers = resolve_worker_count(opts.workers, unit_count);
    debug!("fanning out {unit_count} project unit(s) across {workers} worker(s)");

    // Both channels hold every message, so neither side ever blocks on send.
    let (dir_tx, dir_rx) = bounded::<PathBuf>(unit_count);
    let (result_tx, result_rx) = bounded::<(PathBuf, Result<ProjectStats, ScanError>)>(unit_count);
    for dir in projects {
        let _ = dir_tx.send(dir);
    }
    drop(dir_tx);

    thread::scope(|s| {
        for _ in 0..workers {
            let dir_rx = dir_rx.clone();
            let result_tx = result_tx.clone();
            s.spawn(move || {
                while let Ok(dir) = dir_rx.recv() {
                    let outcome = process_project(store, resolver, &dir);
                    let _ = result_tx.send((dir, outcome));
                }
            });
        }
        drop(result_tx);

        while let Ok((dir, outcome)) = result_rx.recv() {
            match outcome {
                Ok(stats) => absorb(&mut report, stats),
                Err(error) => {
                    warn!("project {} failed: {error}", dir.display());
                    report.failures.push(ProjectFailure { path: dir, error });
                }
            }
        }
    });

    Ok(report)
}

fn absorb(report: &mut ScanReport, stats: ProjectStats) {
    report.projects += 1;
    if stats.project_created {
        report.projects_created += 1;
    }
    report.files += stats.files;
    report.files_created += stats.files_created;
}

/// Worker count: requested (or available parallelism), capped by the FD
/// budget, never more than one per project.
fn resolve_worker_count(requested: Option<usize>, unit_count: usize) -> usize {
    let available = thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let mut workers = requested.unwrap_or(available).max(1);
    if let Some(cap) = max_workers_by_fd_limit() {
        if workers > cap {
            debug!("capping workers at {cap} (fd limit)");
            workers = cap.max(1);
        }
    }
    workers.clamp(1, unit_count)
}

#[cfg(unix)]
fn mode_string(meta: &fs::Metadata) -> String {
    use std::os::unix::fs::PermissionsExt;
    format!("{:04o}", meta.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
fn mode_string(meta: &fs::Metadata) -> String {
    if meta.permissions().readonly() {
        "ro".to_string()
    } else {
        "rw".to_string()
    }
}

fn modified_rfc3339(meta: &fs::Metadata, path: &Path) -> Result<String, ScanError> {
    let mtime = meta
        .modified()
        .map_err(|e| ScanError::io("read mtime of", path, e))?;
    Ok(DateTime::<Utc>::from(mtime).to_rfc3339())
}

fn short(digest: &str) -> &str {
    &digest[..digest.len().min(12)]
}

//! Deleting expired working files
//!
//! Two passes share one timer: artifacts of sessions removed from the store,
//! then anything left in the working areas whose modification time is older
//! than the retention window (orphans from crashes or abandoned uploads).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use super::session_store::ExpiredSession;

/// Outcome of one sweep
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub sessions_removed: usize,
    pub paths_removed: usize,
    pub failures: usize,
}

impl SweepReport {
    fn record(&mut self, path: &Path, result: io::Result<()>) {
        match result {
            Ok(()) => self.paths_removed += 1,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                self.failures += 1;
                tracing::warn!(path = %path.display(), error = %e, "Sweep failed to delete");
            }
        }
    }
}

fn remove_path(path: &Path) -> io::Result<()> {
    if fs::symlink_metadata(path)?.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

/// Delete the extracted tree and bundles of expired sessions
pub fn remove_session_artifacts(expired: &[ExpiredSession], report: &mut SweepReport) {
    for session in expired {
        report.sessions_removed += 1;
        report.record(&session.document_root, remove_path(&session.document_root));
        for bundle in &session.bundles {
            report.record(bundle, remove_path(bundle));
        }
    }
}

/// Delete direct children of each area last modified before `now - retention`
pub fn sweep_stale_files(areas: &[PathBuf], retention: Duration, now: SystemTime, report: &mut SweepReport) {
    let Some(cutoff) = now.checked_sub(retention) else {
        return;
    };

    for area in areas {
        let entries = match fs::read_dir(area) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => {
                report.failures += 1;
                tracing::warn!(area = %area.display(), error = %e, "Sweep could not read working area");
                continue;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let modified = match entry.metadata().and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "No modification time, skipped");
                    continue;
                }
            };
            if modified < cutoff {
                tracing::debug!(path = %path.display(), "Removing stale working file");
                report.record(&path, remove_path(&path));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn test_stale_files_removed_fresh_kept() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = dir.path().join("uploads");
        fs::create_dir_all(uploads.join("nested")).unwrap();
        fs::write(uploads.join("a.xlsx"), b"x").unwrap();

        let mut report = SweepReport::default();
        sweep_stale_files(&[uploads.clone()], Duration::from_secs(3600), SystemTime::now(), &mut report);
        assert_eq!(report.paths_removed, 0);
        assert!(uploads.join("a.xlsx").exists());

        let later = SystemTime::now() + Duration::from_secs(2 * 3600);
        sweep_stale_files(&[uploads.clone()], Duration::from_secs(3600), later, &mut report);
        assert_eq!(report.paths_removed, 2);
        assert!(!uploads.join("a.xlsx").exists());
        assert!(!uploads.join("nested").exists());
        assert!(uploads.exists());
    }

    #[test]
    fn test_missing_area_is_not_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut report = SweepReport::default();
        sweep_stale_files(&[dir.path().join("absent")], Duration::from_secs(1), SystemTime::now(), &mut report);
        assert_eq!(report, SweepReport::default());
    }

    #[test]
    fn test_session_artifacts_removed() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("temp").join("s1");
        fs::create_dir_all(root.join("day1")).unwrap();
        fs::write(root.join("day1").join("1-203-李雷--票.pdf"), b"%PDF").unwrap();
        let bundle = dir.path().join("b.zip");
        fs::write(&bundle, b"PK").unwrap();

        let expired = vec![ExpiredSession {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            document_root: root.clone(),
            bundles: vec![bundle.clone(), dir.path().join("already-gone.zip")],
        }];
        let mut report = SweepReport::default();
        remove_session_artifacts(&expired, &mut report);

        assert_eq!(report.sessions_removed, 1);
        assert_eq!(report.paths_removed, 2);
        assert_eq!(report.failures, 0);
        assert!(!root.exists());
        assert!(!bundle.exists());
    }
}

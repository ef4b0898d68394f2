//! Cold archive: append-only JSON files on a filesystem, organized by
//! learning phase (spec.md §2 row F, §4.8, §6 "Cold archive filesystem
//! layout").

use chrono::{DateTime, NaiveDateTime, Utc};
use pai_core::{MemoryError, PaiError, PaiResult, Phase};
use std::path::{Path, PathBuf};

fn archive_err(reason: impl Into<String>) -> PaiError {
    PaiError::Memory(MemoryError::ColdArchive { reason: reason.into() })
}

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Filesystem-backed append-only archive rooted at `<root>/Learning/<PHASE>/`.
pub struct ColdArchive {
    root: PathBuf,
}

impl ColdArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn phase_dir(&self, phase: Phase) -> PathBuf {
        self.root.join("Learning").join(phase.as_db_str())
    }

    /// Write `payload` (already-serialized JSON) to
    /// `<root>/Learning/<PHASE>/<timestamp>_<category>.json`, creating parent
    /// directories as needed. Returns the written path.
    pub fn archive(&self, phase: Phase, category: &str, payload: &serde_json::Value) -> PaiResult<PathBuf> {
        self.archive_at(phase, category, payload, Utc::now())
    }

    /// Same as `archive` but with an explicit timestamp, to keep tests
    /// deterministic without touching the wall clock.
    pub fn archive_at(
        &self,
        phase: Phase,
        category: &str,
        payload: &serde_json::Value,
        at: DateTime<Utc>,
    ) -> PaiResult<PathBuf> {
        let dir = self.phase_dir(phase);
        std::fs::create_dir_all(&dir).map_err(|e| archive_err(e.to_string()))?;

        let filename = format!("{}_{}.json", at.format(TIMESTAMP_FORMAT), sanitize_category(category));
        let path = dir.join(filename);

        let bytes = serde_json::to_vec_pretty(payload).map_err(|e| archive_err(e.to_string()))?;
        std::fs::write(&path, bytes).map_err(|e| archive_err(e.to_string()))?;
        Ok(path)
    }

    /// Delete archived files whose filename timestamp is older than
    /// `older_than_days`, relative to `now`. The filename timestamp is
    /// authoritative, not filesystem mtime (spec.md §6).
    pub fn cleanup_older_than(&self, older_than_days: i64, now: DateTime<Utc>) -> PaiResult<usize> {
        let cutoff = now - chrono::Duration::days(older_than_days);
        let mut removed = 0;

        let learning_dir = self.root.join("Learning");
        if !learning_dir.exists() {
            return Ok(0);
        }

        for phase in Phase::ALL {
            let dir = self.phase_dir(phase);
            if !dir.exists() {
                continue;
            }
            for entry in std::fs::read_dir(&dir).map_err(|e| archive_err(e.to_string()))? {
                let entry = entry.map_err(|e| archive_err(e.to_string()))?;
                let path = entry.path();
                if let Some(ts) = filename_timestamp(&path) {
                    if ts < cutoff {
                        std::fs::remove_file(&path).map_err(|e| archive_err(e.to_string()))?;
                        removed += 1;
                    }
                }
            }
        }
        Ok(removed)
    }
}

fn sanitize_category(category: &str) -> String {
    category
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// Parse the `YYYYMMDD_HHMMSS` prefix out of an archive filename's stem.
fn filename_timestamp(path: &Path) -> Option<DateTime<Utc>> {
    let stem = path.file_stem()?.to_str()?;
    let prefix: String = stem.chars().take(15).collect();
    let naive = NaiveDateTime::parse_from_str(&prefix, TIMESTAMP_FORMAT).ok()?;
    Some(DateTime::from_naive_utc_and_offset(naive, Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn archive_writes_under_phase_directory() {
        let dir = tempfile::tempdir().unwrap();
        let archive = ColdArchive::new(dir.path());
        let at = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc);
        let path = archive.archive_at(Phase::Build, "tool_success", &json!({"x": 1}), at).unwrap();
        assert!(path.starts_with(dir.path().join("Learning").join("BUILD")));
        assert!(path.exists());
    }

    #[test]
    fn cleanup_removes_only_old_files() {
        let dir = tempfile::tempdir().unwrap();
        let archive = ColdArchive::new(dir.path());
        let old = DateTime::parse_from_rfc3339("2020-01-01T00:00:00Z").unwrap().with_timezone(&Utc);
        let recent = Utc::now();
        archive.archive_at(Phase::Learn, "note", &json!({}), old).unwrap();
        archive.archive_at(Phase::Learn, "note", &json!({}), recent).unwrap();

        let removed = archive.cleanup_older_than(365, Utc::now()).unwrap();
        assert_eq!(removed, 1);
    }

    #[test]
    fn filename_timestamp_parses_prefix() {
        let path = PathBuf::from("/tmp/Learning/BUILD/20260101_000000_tool_success.json");
        let ts = filename_timestamp(&path).unwrap();
        assert_eq!(ts.format("%Y").to_string(), "2026");
    }
}

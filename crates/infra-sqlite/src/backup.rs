// Backup File Management
//
// Snapshots are named `<base>_backup_<YYYYMMDD_HHMMSS>.db`; a second snapshot
// within the same second gets `_<N>` appended to the timestamp. Only files
// that match this pattern for the configured base name are listed or pruned.

use chrono::{DateTime, Local, NaiveDateTime};
use optical_core::error::Result;
use optical_core::port::RetentionReport;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const BACKUP_EXTENSION: &str = ".db";

// YYYYMMDD_HHMMSS
const STAMP_LEN: usize = 15;

/// A snapshot found in the backup directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupFile {
    pub path: PathBuf,
    pub taken_at: NaiveDateTime,
    /// 0 for the first snapshot of a second, N for the `_N` suffix
    pub sequence: u32,
}

pub fn backup_file_name(base: &str, taken_at: &DateTime<Local>) -> String {
    sequenced_file_name(base, taken_at, 0)
}

fn sequenced_file_name(base: &str, taken_at: &DateTime<Local>, sequence: u32) -> String {
    let stamp = taken_at.format(BACKUP_TIMESTAMP_FORMAT);
    if sequence == 0 {
        format!("{}_backup_{}{}", base, stamp, BACKUP_EXTENSION)
    } else {
        format!("{}_backup_{}_{}{}", base, stamp, sequence, BACKUP_EXTENSION)
    }
}

/// First snapshot path in `dir` for this second that does not exist yet
///
/// Callers hold the exclusive handle lock, so nothing else picks the same name.
pub async fn next_backup_path(
    dir: &Path,
    base: &str,
    taken_at: &DateTime<Local>,
) -> Result<PathBuf> {
    let mut sequence = 0;
    loop {
        let path = dir.join(sequenced_file_name(base, taken_at, sequence));
        if !tokio::fs::try_exists(&path).await? {
            if sequence > 0 {
                warn!(path = %path.display(), "Snapshot name already taken this second, using suffix");
            }
            return Ok(path);
        }
        sequence += 1;
    }
}

/// Timestamp and same-second sequence of a snapshot name, or None for any
/// other file
pub fn parse_backup_name(base: &str, file_name: &str) -> Option<(NaiveDateTime, u32)> {
    let stamp = file_name
        .strip_prefix(base)?
        .strip_prefix("_backup_")?
        .strip_suffix(BACKUP_EXTENSION)?;

    let timestamp = stamp.get(..STAMP_LEN)?;
    let sequence = match stamp.get(STAMP_LEN..)? {
        "" => 0,
        suffix => {
            let digits = suffix.strip_prefix('_')?;
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            digits.parse().ok()?
        }
    };

    let taken_at = NaiveDateTime::parse_from_str(timestamp, BACKUP_TIMESTAMP_FORMAT).ok()?;
    Some((taken_at, sequence))
}

/// Timestamp embedded in a snapshot name, or None for any other file
pub fn parse_backup_timestamp(base: &str, file_name: &str) -> Option<NaiveDateTime> {
    parse_backup_name(base, file_name).map(|(taken_at, _)| taken_at)
}

/// Snapshots in `dir`, newest first
///
/// A missing directory has no backups.
pub async fn list_backups(dir: &Path, base: &str) -> Result<Vec<BackupFile>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut backups = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        if let Some((taken_at, sequence)) = parse_backup_name(base, name) {
            backups.push(BackupFile {
                path: entry.path(),
                taken_at,
                sequence,
            });
        }
    }

    backups.sort_by(|a, b| {
        b.taken_at
            .cmp(&a.taken_at)
            .then_with(|| b.sequence.cmp(&a.sequence))
    });
    Ok(backups)
}

/// Keep the newest `keep` snapshots and delete the rest
///
/// A file that cannot be deleted is reported in `failures`, not returned as
/// an error.
pub async fn prune_backups(dir: &Path, base: &str, keep: usize) -> Result<RetentionReport> {
    let backups = list_backups(dir, base).await?;
    let mut report = RetentionReport::default();

    for (index, backup) in backups.into_iter().enumerate() {
        if index < keep {
            report.kept.push(backup.path);
            continue;
        }

        match tokio::fs::remove_file(&backup.path).await {
            Ok(()) => {
                debug!(path = %backup.path.display(), "Deleted old backup");
                report.deleted.push(backup.path);
            }
            Err(e) => {
                warn!(path = %backup.path.display(), error = %e, "Failed to delete old backup");
                report.failures.push((backup.path, e.to_string()));
            }
        }
    }

    info!(
        kept = report.kept.len(),
        deleted = report.deleted.len(),
        failures = report.failures.len(),
        "Backup retention applied"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_backup_file_name_format() {
        let at = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(
            backup_file_name("optical_shop", &at),
            "optical_shop_backup_20240309_140507.db"
        );
    }

    #[test]
    fn test_parse_backup_timestamp() {
        let parsed = parse_backup_timestamp("shop", "shop_backup_20240309_140507.db").unwrap();
        assert_eq!(parsed.format(BACKUP_TIMESTAMP_FORMAT).to_string(), "20240309_140507");

        assert!(parse_backup_timestamp("shop", "other_backup_20240309_140507.db").is_none());
        assert!(parse_backup_timestamp("shop", "shop_backup_latest.db").is_none());
        assert!(parse_backup_timestamp("shop", "shop_backup_20240309_140507.db.bak").is_none());
        assert!(parse_backup_timestamp("shop", "shop_backup_20241399_140507.db").is_none());
        assert!(parse_backup_timestamp("shop", "notes.txt").is_none());
        assert!(parse_backup_timestamp("shop", "shop_backup_20240309_140507_.db").is_none());
        assert!(parse_backup_timestamp("shop", "shop_backup_20240309_140507_x.db").is_none());
    }

    #[test]
    fn test_parse_same_second_sequence() {
        let (base_stamp, first) = parse_backup_name("shop", "shop_backup_20240309_140507.db").unwrap();
        let (stamp, second) = parse_backup_name("shop", "shop_backup_20240309_140507_2.db").unwrap();
        assert_eq!(base_stamp, stamp);
        assert_eq!(first, 0);
        assert_eq!(second, 2);
    }

    #[tokio::test]
    async fn test_next_backup_path_adds_suffix_and_sorts_newest_first() {
        let dir = TempDir::new().unwrap();
        let at = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();

        let first = next_backup_path(dir.path(), "shop", &at).await.unwrap();
        assert!(first.ends_with("shop_backup_20240309_140507.db"));
        tokio::fs::write(&first, b"one").await.unwrap();

        let second = next_backup_path(dir.path(), "shop", &at).await.unwrap();
        assert!(second.ends_with("shop_backup_20240309_140507_1.db"));
        tokio::fs::write(&second, b"two").await.unwrap();

        let third = next_backup_path(dir.path(), "shop", &at).await.unwrap();
        assert!(third.ends_with("shop_backup_20240309_140507_2.db"));
        tokio::fs::write(&third, b"three").await.unwrap();
        tokio::fs::write(dir.path().join("shop_backup_20240309_140508.db"), b"later")
            .await
            .unwrap();

        let listed = list_backups(dir.path(), "shop").await.unwrap();
        let names: Vec<String> = listed
            .iter()
            .map(|b| b.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec![
                "shop_backup_20240309_140508.db",
                "shop_backup_20240309_140507_2.db",
                "shop_backup_20240309_140507_1.db",
                "shop_backup_20240309_140507.db",
            ]
        );

        let report = prune_backups(dir.path(), "shop", 2).await.unwrap();
        assert_eq!(report.deleted.len(), 2);
        assert!(third.exists());
        assert!(!first.exists());
    }

    #[tokio::test]
    async fn test_list_missing_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        let backups = list_backups(&dir.path().join("absent"), "shop").await.unwrap();
        assert!(backups.is_empty());
    }

    #[tokio::test]
    async fn test_prune_keeps_newest_and_ignores_strays() {
        let dir = TempDir::new().unwrap();

        for day in 1..=15 {
            let name = format!("shop_backup_202401{:02}_120000.db", day);
            tokio::fs::write(dir.path().join(name), b"snapshot").await.unwrap();
        }
        tokio::fs::write(dir.path().join("readme.txt"), b"keep me").await.unwrap();
        tokio::fs::write(dir.path().join("other_backup_20230101_000000.db"), b"x")
            .await
            .unwrap();

        let report = prune_backups(dir.path(), "shop", 10).await.unwrap();
        assert_eq!(report.kept.len(), 10);
        assert_eq!(report.deleted.len(), 5);
        assert!(report.failures.is_empty());

        let remaining = list_backups(dir.path(), "shop").await.unwrap();
        assert_eq!(remaining.len(), 10);
        let newest = remaining.first().unwrap();
        assert!(newest.path.ends_with("shop_backup_20240115_120000.db"));
        let oldest = remaining.last().unwrap();
        assert!(oldest.path.ends_with("shop_backup_20240106_120000.db"));

        assert!(dir.path().join("readme.txt").exists());
        assert!(dir.path().join("other_backup_20230101_000000.db").exists());
    }
}

//! One JSON record file per guild, with backup-before-overwrite.

use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::error::Result;

pub const STATE_DIR: &str = "state";
const SAVE_EXT: &str = "json";
const BACKUP_SUFFIX: &str = "-backup";

/// On-disk projection of one guild's configuration. Field order is stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub guild_id: String,
    /// Empty means unset.
    #[serde(default)]
    pub channel_id: String,
    /// Zero means unset.
    #[serde(default)]
    pub period_minutes: i64,
}

pub struct Store {
    dir: PathBuf,
}

impl Store {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn save_path(&self, guild_id: &str) -> PathBuf {
        self.dir.join(format!("{guild_id}.{SAVE_EXT}"))
    }

    pub fn backup_path(&self, guild_id: &str) -> PathBuf {
        self.dir.join(format!("{guild_id}{BACKUP_SUFFIX}.{SAVE_EXT}"))
    }

    async fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.dir, std::fs::Permissions::from_mode(0o700)).await?;
        }
        Ok(())
    }

    async fn write_file(&self, path: &Path, data: &[u8]) -> Result<()> {
        fs::write(path, data).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, std::fs::Permissions::from_mode(0o644)).await?;
        }
        Ok(())
    }

    /// Writes the record, preserving the previous file contents in the backup
    /// file first. A failed backup aborts the write, and serialization happens
    /// before the primary file is touched so it can't be truncated.
    pub async fn write(&self, guild_id: &str, record: &Record) -> Result<()> {
        self.ensure_dir().await?;

        let data = serde_json::to_vec_pretty(record)?;

        let path = self.save_path(guild_id);
        match fs::read(&path).await {
            Ok(previous) => {
                self.write_file(&self.backup_path(guild_id), &previous)
                    .await?;
            }
            // No savefile yet, nothing to back up
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }

        self.write_file(&path, &data).await?;
        debug!(guild_id, "wrote guild record");
        Ok(())
    }

    /// `None` when the guild has never been saved; that's a normal first-run
    /// state, not an error.
    pub async fn read(&self, guild_id: &str) -> Result<Option<Record>> {
        match fs::read(self.save_path(guild_id)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// All guilds with a primary record file, derived from filenames. Backup
    /// files are skipped.
    pub async fn guild_ids(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(ids),
            Err(err) => return Err(err.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let Some(stem) = name.strip_suffix(&format!(".{SAVE_EXT}")) else {
                continue;
            };
            if stem.ends_with(BACKUP_SUFFIX) {
                continue;
            }
            ids.push(stem.to_string());
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(guild: &str, channel: &str, minutes: i64) -> Record {
        Record {
            guild_id: guild.to_string(),
            channel_id: channel.to_string(),
            period_minutes: minutes,
        }
    }

    #[tokio::test]
    async fn write_then_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path());
        let rec = record("g1", "c1", 5);
        store.write("g1", &rec).await.unwrap();
        assert_eq!(store.read("g1").await.unwrap(), Some(rec));
    }

    #[tokio::test]
    async fn read_missing_guild_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path());
        assert_eq!(store.read("never-seen").await.unwrap(), None);
    }

    #[tokio::test]
    async fn backup_holds_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path());
        let first = record("g1", "c1", 5);
        let second = record("g1", "c2", 10);
        store.write("g1", &first).await.unwrap();
        store.write("g1", &second).await.unwrap();

        let backup = std::fs::read(store.backup_path("g1")).unwrap();
        assert_eq!(serde_json::from_slice::<Record>(&backup).unwrap(), first);
        assert_eq!(store.read("g1").await.unwrap(), Some(second));
    }

    #[tokio::test]
    async fn first_write_creates_no_backup() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path());
        store.write("g1", &record("g1", "", 0)).await.unwrap();
        assert!(!store.backup_path("g1").exists());
    }

    #[tokio::test]
    async fn guild_ids_skips_backups() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path());
        store.write("g1", &record("g1", "c1", 1)).await.unwrap();
        store.write("g1", &record("g1", "c2", 2)).await.unwrap();
        store.write("g2", &record("g2", "", 0)).await.unwrap();

        let mut ids = store.guild_ids().await.unwrap();
        ids.sort();
        assert_eq!(ids, vec!["g1".to_string(), "g2".to_string()]);
    }

    #[tokio::test]
    async fn guild_ids_with_no_state_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path().join("missing"));
        assert!(store.guild_ids().await.unwrap().is_empty());
    }

    #[test]
    fn record_field_order_is_stable() {
        let json = serde_json::to_string(&record("g", "c", 3)).unwrap();
        let guild = json.find("guild_id").unwrap();
        let channel = json.find("channel_id").unwrap();
        let period = json.find("period_minutes").unwrap();
        assert!(guild < channel && channel < period);
    }
}

//! Local reminder journal
//!
//! Append-mostly log of reminder entries produced by the due-check.
//! The file-backed journal keeps the whole log as one JSON array under a
//! well-known file name so that every agent sharing a data directory sees
//! the same entries.
//!
//! Reads never fail: a missing, unreadable or corrupt journal is treated
//! as empty. Every write goes to its own temp file and is renamed into
//! place, so readers only ever see a complete journal. Handles in one
//! process share a lock per path; across processes there is no lock and
//! concurrent writers resolve last-writer-wins.

use crate::database::NotificationKind;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::SystemTime;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Which kind of care item produced a reminder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderKind {
    Schedule,
    Medicine,
}

impl From<ReminderKind> for NotificationKind {
    fn from(kind: ReminderKind) -> Self {
        match kind {
            ReminderKind::Schedule => NotificationKind::Schedule,
            ReminderKind::Medicine => NotificationKind::Medicine,
        }
    }
}

/// Reminder recorded locally when a schedule or medicine falls due
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalReminderEntry {
    pub id: Uuid,
    pub user_id: i64,
    /// Id of the schedule or medicine that fired
    pub source_id: i64,
    #[serde(rename = "type")]
    pub kind: ReminderKind,
    pub title: String,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Storage for local reminder entries
#[async_trait]
pub trait ReminderJournal: Send + Sync {
    /// All entries for every user. Never fails; unreadable storage is empty.
    async fn load(&self) -> Vec<LocalReminderEntry>;

    /// Append entries in a single write.
    async fn append(&self, entries: &[LocalReminderEntry]) -> Result<()>;

    /// Mark one of the user's entries read. Returns false if it was not found.
    async fn mark_read(&self, user_id: i64, id: Uuid) -> Result<bool>;

    /// Mark every entry of the user read. Returns the number of entries changed.
    async fn mark_all_read(&self, user_id: i64) -> Result<usize>;
}

fn flag_read(entries: &mut [LocalReminderEntry], user_id: i64, id: Uuid) -> bool {
    match entries
        .iter_mut()
        .find(|e| e.user_id == user_id && e.id == id)
    {
        Some(entry) => {
            entry.read = true;
            true
        }
        None => false,
    }
}

fn flag_all_read(entries: &mut [LocalReminderEntry], user_id: i64) -> usize {
    let mut changed = 0;
    for entry in entries.iter_mut().filter(|e| e.user_id == user_id && !e.read) {
        entry.read = true;
        changed += 1;
    }
    changed
}

/// Lock shared by every handle on `path` in this process
fn path_lock(path: &Path) -> Arc<Mutex<()>> {
    static LOCKS: OnceLock<std::sync::Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> = OnceLock::new();

    let locks = LOCKS.get_or_init(Default::default);
    match locks.lock() {
        Ok(mut locks) => locks.entry(path.to_path_buf()).or_default().clone(),
        // A poisoned registry only loses in-process sharing.
        Err(_) => Arc::new(Mutex::new(())),
    }
}

/// Journal persisted as a JSON array in a single file
#[derive(Clone)]
pub struct FileJournal {
    path: PathBuf,
    // Serialises read-modify-write cycles within this process.
    write_lock: Arc<Mutex<()>>,
}

impl FileJournal {
    pub fn new(path: PathBuf) -> Self {
        Self {
            write_lock: path_lock(&path),
            path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last modification time of the journal file, if it exists
    pub async fn modified(&self) -> Option<SystemTime> {
        fs::metadata(&self.path)
            .await
            .and_then(|meta| meta.modified())
            .ok()
    }

    async fn read_entries(&self) -> Result<Vec<LocalReminderEntry>> {
        if !fs::try_exists(&self.path).await? {
            return Ok(Vec::new());
        }

        let raw = fs::read_to_string(&self.path).await?;
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }

        Ok(serde_json::from_str(&raw)?)
    }

    async fn write_entries(&self, entries: &[LocalReminderEntry]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let data = serde_json::to_vec(entries)?;

        // Unique per write so concurrent writers never share a temp file
        let temp_path = self
            .path
            .with_extension(format!("json.{}.tmp", Uuid::new_v4().simple()));

        if let Err(e) = Self::write_and_rename(&temp_path, &self.path, &data).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e);
        }

        tracing::debug!(
            "Wrote reminder journal: {} entries ({} bytes)",
            entries.len(),
            data.len()
        );
        Ok(())
    }

    async fn write_and_rename(temp_path: &Path, path: &Path, data: &[u8]) -> Result<()> {
        let mut file = fs::File::create(temp_path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(temp_path, path).await?;
        Ok(())
    }
}

#[async_trait]
impl ReminderJournal for FileJournal {
    async fn load(&self) -> Vec<LocalReminderEntry> {
        match self.read_entries().await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(
                    "Reminder journal at {:?} unreadable, treating as empty: {}",
                    self.path,
                    e
                );
                Vec::new()
            }
        }
    }

    async fn append(&self, entries: &[LocalReminderEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let _guard = self.write_lock.lock().await;
        let mut all = self.load().await;
        all.extend_from_slice(entries);
        self.write_entries(&all).await
    }

    async fn mark_read(&self, user_id: i64, id: Uuid) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let mut all = self.load().await;

        if !flag_read(&mut all, user_id, id) {
            return Ok(false);
        }

        self.write_entries(&all).await?;
        Ok(true)
    }

    async fn mark_all_read(&self, user_id: i64) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let mut all = self.load().await;

        let changed = flag_all_read(&mut all, user_id);
        if changed > 0 {
            self.write_entries(&all).await?;
        }

        Ok(changed)
    }
}

/// In-process journal, for embedding and tests
#[derive(Clone, Default)]
pub struct MemoryJournal {
    entries: Arc<Mutex<Vec<LocalReminderEntry>>>,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReminderJournal for MemoryJournal {
    async fn load(&self) -> Vec<LocalReminderEntry> {
        self.entries.lock().await.clone()
    }

    async fn append(&self, entries: &[LocalReminderEntry]) -> Result<()> {
        self.entries.lock().await.extend_from_slice(entries);
        Ok(())
    }

    async fn mark_read(&self, user_id: i64, id: Uuid) -> Result<bool> {
        Ok(flag_read(&mut self.entries.lock().await, user_id, id))
    }

    async fn mark_all_read(&self, user_id: i64) -> Result<usize> {
        Ok(flag_all_read(&mut self.entries.lock().await, user_id))
    }
}

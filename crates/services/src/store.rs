use std::sync::Arc;

use parking_lot::Mutex;
use retiscan_config::Settings;
use retiscan_model::{NotificationRecord, ServerEvent, ToastSeverity};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::presenter::{Presenter, SoundPlayer};
use crate::storage::StorageBackend;

/// Single source of truth for the notification records visible in the
/// current session.
///
/// Keeps a newest-first list capped at the configured maximum, a derived
/// unread count that never drifts negative, and writes the full list to
/// durable local storage after every mutation. The storage key belongs
/// exclusively to this store.
pub struct NotificationStore {
    max_records: usize,
    storage_key: String,
    sound_clip: Option<String>,
    storage: Arc<dyn StorageBackend>,
    presenter: Arc<dyn Presenter>,
    sound: Arc<dyn SoundPlayer>,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    records: Vec<NotificationRecord>,
    unread: usize,
}

impl NotificationStore {
    pub fn new(
        settings: &Settings,
        storage: Arc<dyn StorageBackend>,
        presenter: Arc<dyn Presenter>,
        sound: Arc<dyn SoundPlayer>,
    ) -> Self {
        Self {
            max_records: settings.store.max_records,
            storage_key: settings.store.storage_key.clone(),
            sound_clip: settings
                .sound
                .enabled
                .then(|| settings.sound.clip.clone()),
            storage,
            presenter,
            sound,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Loads the persisted record list. A corrupt payload is discarded
    /// wholesale and the store resets to empty; never fatal.
    pub fn initialize(&self) {
        let raw = match self.storage.get(&self.storage_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return,
            Err(e) => {
                warn!(%e, "Failed to read persisted notifications, starting empty");
                return;
            }
        };

        let mut records: Vec<NotificationRecord> = match serde_json::from_str(&raw) {
            Ok(records) => records,
            Err(e) => {
                warn!(%e, "Discarding corrupt persisted notifications");
                if let Err(e) = self.storage.remove(&self.storage_key) {
                    warn!(%e, "Failed to remove corrupt storage entry");
                }
                return;
            }
        };

        records.truncate(self.max_records);
        let unread = records.iter().filter(|r| !r.read).count();
        debug!(count = records.len(), unread, "Loaded persisted notifications");

        let mut inner = self.inner.lock();
        inner.records = records;
        inner.unread = unread;
    }

    /// Applies a delivered server event: creates the record, prepends it,
    /// evicts over-cap tail entries, bumps the unread count, persists,
    /// and fires the toast + sound cue exactly once.
    pub fn ingest(&self, event: ServerEvent) -> NotificationRecord {
        let record = NotificationRecord::from_event(event);

        {
            let mut inner = self.inner.lock();
            inner.records.insert(0, record.clone());
            // Count the new record before evicting: with a tiny cap the
            // record just inserted can itself be the one evicted.
            inner.unread += 1;
            while inner.records.len() > self.max_records {
                if let Some(evicted) = inner.records.pop() {
                    if !evicted.read {
                        inner.unread = inner.unread.saturating_sub(1);
                    }
                }
            }
            self.persist(&inner);
        }

        self.presenter
            .show_toast(&record.message, ToastSeverity::Info);
        if let Some(clip) = &self.sound_clip {
            self.sound.play(clip);
        }

        record
    }

    /// Marks one record read. No-op if the id is unknown or the record is
    /// already read; returns whether anything changed.
    pub fn mark_read(&self, id: Uuid) -> bool {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let Some(record) = inner
            .records
            .iter_mut()
            .find(|r| r.id == id && !r.read)
        else {
            return false;
        };
        record.read = true;
        inner.unread = inner.unread.saturating_sub(1);
        self.persist(inner);
        true
    }

    pub fn mark_all_read(&self) {
        let mut inner = self.inner.lock();
        for record in &mut inner.records {
            record.read = true;
        }
        inner.unread = 0;
        self.persist(&inner);
    }

    /// Removes one record; returns whether it was present.
    pub fn delete(&self, id: Uuid) -> bool {
        let mut inner = self.inner.lock();
        let Some(pos) = inner.records.iter().position(|r| r.id == id) else {
            return false;
        };
        let removed = inner.records.remove(pos);
        if !removed.read {
            inner.unread = inner.unread.saturating_sub(1);
        }
        self.persist(&inner);
        true
    }

    /// Empties the list and drops the persisted storage entry.
    pub fn clear_all(&self) {
        let mut inner = self.inner.lock();
        inner.records.clear();
        inner.unread = 0;
        if let Err(e) = self.storage.remove(&self.storage_key) {
            warn!(%e, "Failed to remove persisted notifications");
        }
    }

    /// Snapshot of the current list, newest first.
    pub fn records(&self) -> Vec<NotificationRecord> {
        self.inner.lock().records.clone()
    }

    pub fn unread_count(&self) -> usize {
        self.inner.lock().unread
    }

    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().records.is_empty()
    }

    fn persist(&self, inner: &Inner) {
        let serialized = match serde_json::to_string(&inner.records) {
            Ok(s) => s,
            Err(e) => {
                warn!(%e, "Failed to serialize notifications");
                return;
            }
        };
        if let Err(e) = self.storage.set(&self.storage_key, &serialized) {
            warn!(%e, "Failed to persist notifications");
        }
    }
}

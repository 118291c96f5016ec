//! Store/delete orchestration with upload hooks.
//!
//! Store-then-persist (and delete-blob-then-delete-record) is best-effort
//! sequencing, not a two-phase commit; the gap is accepted. Two concurrent
//! stores to the same `(disk, path)` race at the backend and the last
//! write wins. Callers wanting mutual exclusion must layer it on keyed by
//! `(disk, path)`.

use std::sync::Arc;

use bytes::Bytes;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use attache_core::traits::Identifiable;

use crate::model::FileRecord;
use crate::storage::{BoxReader, DiskSet, StorageBackend, WriteMetadata};

/// Pre-store hook; returning `false` vetoes the store.
pub type StoringHook = Box<dyn Fn(&FileRecord) -> bool + Send + Sync>;

/// Post-store hook; informational, result ignored.
pub type StoredHook = Box<dyn Fn(&FileRecord) + Send + Sync>;

/// Orchestrates blob writes and deletes for file records.
///
/// Hooks are registered at the type level and apply to every record this
/// lifecycle touches, invoked synchronously in registration order.
pub struct FileLifecycle {
    disks: DiskSet,
    storing_hooks: Vec<StoringHook>,
    stored_hooks: Vec<StoredHook>,
}

impl FileLifecycle {
    pub fn new(disks: DiskSet) -> Self {
        Self {
            disks,
            storing_hooks: Vec::new(),
            stored_hooks: Vec::new(),
        }
    }

    /// Register a pre-store hook. The first hook returning `false` aborts
    /// the store before the backend is touched.
    pub fn on_storing(&mut self, hook: impl Fn(&FileRecord) -> bool + Send + Sync + 'static) {
        self.storing_hooks.push(Box::new(hook));
    }

    /// Register a post-store hook, run after a successful backend write.
    pub fn on_stored(&mut self, hook: impl Fn(&FileRecord) + Send + Sync + 'static) {
        self.stored_hooks.push(Box::new(hook));
    }

    /// Write `data` to the record's backend at its path.
    ///
    /// Returns `false` when the record has no storage address, a storing
    /// hook vetoes, or the backend write fails. No partial-write recovery
    /// is attempted; callers retry. Re-storing overwrites.
    #[instrument(skip(self, data), fields(file = %record.filename, owner = %record.owner))]
    pub async fn store(&self, record: &mut FileRecord, data: Bytes) -> bool {
        let Some((backend, path)) = self.address(record) else {
            return false;
        };
        if self.vetoed(record) {
            return false;
        }

        match backend.put(&path, data).await {
            Ok(meta) => {
                self.finish_store(record, meta);
                true
            }
            Err(e) => {
                warn!(error = %e, "backend write failed");
                false
            }
        }
    }

    /// Like [`store`](FileLifecycle::store) but passes the bytes through
    /// from a reader without buffering the whole payload.
    #[instrument(skip(self, reader), fields(file = %record.filename, owner = %record.owner))]
    pub async fn store_stream(&self, record: &mut FileRecord, reader: BoxReader) -> bool {
        let Some((backend, path)) = self.address(record) else {
            return false;
        };
        if self.vetoed(record) {
            return false;
        }

        match backend.put_stream(&path, reader).await {
            Ok(meta) => {
                self.finish_store(record, meta);
                true
            }
            Err(e) => {
                warn!(error = %e, "backend stream write failed");
                false
            }
        }
    }

    /// Delete the record's blob. Runs as a pre-destroy guard: `false`
    /// means the caller must not destroy the record row (fail-closed).
    ///
    /// A record that was never persisted, or was persisted without ever
    /// being stored, succeeds trivially.
    #[instrument(skip(self), fields(file = %record.filename, owner = %record.owner))]
    pub async fn delete(&self, record: &FileRecord) -> bool {
        if record.is_new_record() {
            return true;
        }
        let (Some(disk), Some(path)) = (record.disk.as_deref(), record.path.as_deref()) else {
            return true;
        };
        let Some(backend) = self.disks.get(disk) else {
            warn!(disk, "unknown disk, refusing delete");
            return false;
        };

        match backend.delete(path).await {
            Ok(()) => {
                info!(disk, path, "blob deleted");
                true
            }
            Err(e) => {
                warn!(error = %e, "backend delete failed");
                false
            }
        }
    }

    /// Authoritative existence check: true only if the record is persisted
    /// AND the backend reports the blob present at its `(disk, path)`.
    pub async fn exists(&self, record: &FileRecord) -> bool {
        if record.is_new_record() {
            return false;
        }
        let Some((backend, path)) = self.address(record) else {
            return false;
        };
        backend.exists(&path).await.unwrap_or(false)
    }

    fn address(&self, record: &FileRecord) -> Option<(Arc<dyn StorageBackend>, String)> {
        let disk = record.disk.as_deref()?;
        let path = record.path.as_deref()?;
        match self.disks.get(disk) {
            Some(backend) => Some((backend, path.to_string())),
            None => {
                warn!(disk, "unknown disk");
                None
            }
        }
    }

    fn vetoed(&self, record: &FileRecord) -> bool {
        for hook in &self.storing_hooks {
            if !hook(record) {
                debug!("store vetoed by hook");
                return true;
            }
        }
        false
    }

    fn finish_store(&self, record: &mut FileRecord, meta: WriteMetadata) {
        record.size = Some(meta.size as i64);
        record
            .meta
            .insert("digest".to_string(), Value::String(meta.digest));
        for hook in &self.stored_hooks {
            hook(record);
        }
        info!(size = meta.size, "file stored");
    }
}

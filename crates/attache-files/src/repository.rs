//! Persistence port for file records.
//!
//! Deep query mechanics live in the host application; this crate only
//! needs CRUD plus owner-scoped lookup. The in-memory implementation backs
//! the tests.

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use attache_core::traits::Id;

use crate::model::{FileRecord, OwnerRef};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("File record not found: {0}")]
    NotFound(Id),
    #[error("Duplicate external id: {0}")]
    DuplicateExternalId(Uuid),
    #[error("Repository backend error: {0}")]
    Backend(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Record storage contract. Timestamps are owned by implementations:
/// `create` sets both, `update` bumps `updated_at`.
#[async_trait]
pub trait FileRepository: Send + Sync {
    /// Persist a new record, assigning its id and timestamps in place.
    async fn create(&self, record: &mut FileRecord) -> RepositoryResult<Id>;

    async fn find(&self, id: Id) -> RepositoryResult<Option<FileRecord>>;

    async fn find_by_external_id(&self, external_id: Uuid)
        -> RepositoryResult<Option<FileRecord>>;

    /// All records belonging to `owner`, matched by exact equality.
    async fn find_by_owner(&self, owner: &OwnerRef) -> RepositoryResult<Vec<FileRecord>>;

    async fn update(&self, record: &FileRecord) -> RepositoryResult<()>;

    async fn delete(&self, id: Id) -> RepositoryResult<()>;

    async fn count_for_owner(&self, owner: &OwnerRef) -> RepositoryResult<usize>;
}

/// In-memory repository for tests and examples.
pub struct MemoryFileRepository {
    records: RwLock<Vec<FileRecord>>,
    next_id: std::sync::atomic::AtomicI64,
}

impl Default for MemoryFileRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFileRepository {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            next_id: std::sync::atomic::AtomicI64::new(1),
        }
    }
}

#[async_trait]
impl FileRepository for MemoryFileRepository {
    async fn create(&self, record: &mut FileRecord) -> RepositoryResult<Id> {
        use attache_core::traits::ExternallyIdentifiable;

        let mut records = self.records.write().await;
        if records
            .iter()
            .any(|r| r.external_id() == record.external_id())
        {
            return Err(RepositoryError::DuplicateExternalId(record.external_id()));
        }

        let id = self
            .next_id
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let now = Utc::now();
        record.id = Some(id);
        record.created_at = Some(now);
        record.updated_at = Some(now);

        records.push(record.clone());
        Ok(id)
    }

    async fn find(&self, id: Id) -> RepositoryResult<Option<FileRecord>> {
        let records = self.records.read().await;
        Ok(records.iter().find(|r| r.id == Some(id)).cloned())
    }

    async fn find_by_external_id(
        &self,
        external_id: Uuid,
    ) -> RepositoryResult<Option<FileRecord>> {
        use attache_core::traits::ExternallyIdentifiable;

        let records = self.records.read().await;
        Ok(records
            .iter()
            .find(|r| r.external_id() == external_id)
            .cloned())
    }

    async fn find_by_owner(&self, owner: &OwnerRef) -> RepositoryResult<Vec<FileRecord>> {
        let records = self.records.read().await;
        Ok(records.iter().filter(|r| &r.owner == owner).cloned().collect())
    }

    async fn update(&self, record: &FileRecord) -> RepositoryResult<()> {
        let mut records = self.records.write().await;
        match records.iter().position(|r| r.id == record.id && r.id.is_some()) {
            Some(pos) => {
                let mut updated = record.clone();
                updated.updated_at = Some(Utc::now());
                records[pos] = updated;
                Ok(())
            }
            None => Err(RepositoryError::NotFound(record.id.unwrap_or_default())),
        }
    }

    async fn delete(&self, id: Id) -> RepositoryResult<()> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| r.id != Some(id));
        if records.len() == before {
            return Err(RepositoryError::NotFound(id));
        }
        Ok(())
    }

    async fn count_for_owner(&self, owner: &OwnerRef) -> RepositoryResult<usize> {
        let records = self.records.read().await;
        Ok(records.iter().filter(|r| &r.owner == owner).count())
    }
}

//! Entity traits shared across the workspace.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Primary key type assigned by the persistence layer.
pub type Id = i64;

/// Trait for entities that have a primary key.
pub trait Identifiable {
    fn id(&self) -> Option<Id>;

    /// A record is persisted once the repository has assigned it an id.
    fn is_persisted(&self) -> bool {
        self.id().is_some()
    }

    fn is_new_record(&self) -> bool {
        !self.is_persisted()
    }
}

/// Trait for entities carrying an externally-safe UUID identifier,
/// distinct from the primary key and stable across its lifetime.
pub trait ExternallyIdentifiable {
    fn external_id(&self) -> Uuid;
}

/// Trait for entities with repository-managed timestamps.
pub trait Timestamped {
    fn created_at(&self) -> Option<DateTime<Utc>>;
    fn updated_at(&self) -> Option<DateTime<Utc>>;
}

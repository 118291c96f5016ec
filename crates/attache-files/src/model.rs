//! File record model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use attache_core::traits::{ExternallyIdentifiable, Id, Identifiable, Timestamped};

use crate::mime::wildcard_match;

/// Polymorphic owner reference: a type discriminator plus a key. The pair
/// is opaque to this crate and compared by exact equality only; resolving
/// it to a concrete entity is the host application's concern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerRef {
    /// Owner type discriminator (e.g. "Document", "WorkPackage")
    pub kind: String,
    /// Owner key, kept as a string so any key scheme fits
    pub id: String,
}

impl OwnerRef {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }
}

impl std::fmt::Display for OwnerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

/// A stored file record.
///
/// The record only references its blob by `(disk, path)`; the blob itself
/// lives on whichever [`crate::StorageBackend`] that disk name resolves to.
/// A record whose blob is absent on its backend is logically non-existent
/// even when the row is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    /// Primary key, assigned by the repository
    pub id: Option<Id>,
    /// Externally-safe identifier, immutable once assigned
    external_id: Uuid,
    /// Owning entity reference
    pub owner: OwnerRef,
    /// Name of the storage backend holding the blob
    pub disk: Option<String>,
    /// Backend-relative blob location
    pub path: Option<String>,
    /// Original filename including extension
    pub filename: String,
    /// Human label; only stored when explicitly set
    display_name: Option<String>,
    /// Full MIME type, wildcard-matchable on read
    pub mimetype: String,
    /// Byte length, non-negative when set
    pub size: Option<i64>,
    /// Free-form string-keyed metadata
    pub meta: Map<String, Value>,
    /// Set by the repository on create
    pub created_at: Option<DateTime<Utc>>,
    /// Set by the repository on create and update
    pub updated_at: Option<DateTime<Utc>>,
}

impl FileRecord {
    /// Create a new unpersisted record. The mime type is sniffed from the
    /// filename extension and can be overridden with [`with_mimetype`].
    ///
    /// [`with_mimetype`]: FileRecord::with_mimetype
    pub fn new(owner: OwnerRef, filename: impl Into<String>) -> Self {
        let filename = filename.into();
        let mimetype = mime_guess::from_path(&filename)
            .first_or_octet_stream()
            .to_string();

        Self {
            id: None,
            external_id: Uuid::new_v4(),
            owner,
            disk: None,
            path: None,
            filename,
            display_name: None,
            mimetype,
            size: None,
            meta: Map::new(),
            created_at: None,
            updated_at: None,
        }
    }

    /// Pin the record to a disk and backend-relative path.
    pub fn on_disk(mut self, disk: impl Into<String>, path: impl Into<String>) -> Self {
        self.disk = Some(disk.into());
        self.path = Some(path.into());
        self
    }

    pub fn with_mimetype(mut self, mimetype: impl Into<String>) -> Self {
        self.mimetype = mimetype.into();
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: Value) -> Self {
        self.meta.insert(key.into(), value);
        self
    }

    /// The externally-safe identifier. There is deliberately no setter.
    pub fn external_id(&self) -> Uuid {
        self.external_id
    }

    /// Human label for the file. Falls back to a URL-safe slug of the
    /// filename stem when no explicit name was set; never mutates the
    /// stored value.
    pub fn display_name(&self) -> String {
        match &self.display_name {
            Some(name) => name.clone(),
            None => slugify(self.stem()),
        }
    }

    pub fn set_display_name(&mut self, name: impl Into<String>) {
        self.display_name = Some(name.into());
    }

    /// Filename without its extension.
    pub fn stem(&self) -> &str {
        match self.filename.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => &self.filename,
        }
    }

    /// File extension, if any.
    pub fn extension(&self) -> Option<&str> {
        match self.filename.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext),
            _ => None,
        }
    }

    /// Wildcard glob match of `pattern` against the stored mime type,
    /// e.g. `record.is_of_type("image/*")`.
    pub fn is_of_type(&self, pattern: &str) -> bool {
        wildcard_match(pattern, &self.mimetype)
    }

    /// Whether the record has a complete storage address.
    pub fn has_storage_address(&self) -> bool {
        self.disk.is_some() && self.path.is_some()
    }
}

impl Identifiable for FileRecord {
    fn id(&self) -> Option<Id> {
        self.id
    }
}

impl ExternallyIdentifiable for FileRecord {
    fn external_id(&self) -> Uuid {
        self.external_id
    }
}

impl Timestamped for FileRecord {
    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }
}

/// Lowercase, URL-safe slug: alphanumeric runs survive, everything else
/// collapses to single hyphens.
fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_hyphen = false;
    for c in value.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }
    slug
}

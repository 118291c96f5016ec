//! # attache-files
//!
//! Polymorphic file attachments: each stored file is a record linking an
//! owner (by type and identifier) to a blob on a named storage backend,
//! with metadata and lifecycle hooks around upload.
//!
//! ## Components
//!
//! - [`FileRecord`]: the entity — owner reference, disk name, path,
//!   filename, mime type, size, free-form metadata
//! - [`StorageBackend`]: the blob-store contract, with local-disk and
//!   in-memory implementations and an explicit [`DiskSet`] name map
//! - [`FileLifecycle`]: store/delete orchestration with pre/post-store hooks
//! - [`ContentResponder`]: inline-vs-download content negotiation
//! - [`FileRepository`]: persistence port for record CRUD
//!
//! ## Example
//!
//! ```rust,ignore
//! use attache_files::{ContentResponder, DiskSet, FileLifecycle, FileRecord, MemoryStorage, OwnerRef};
//! use std::sync::Arc;
//!
//! let disks = DiskSet::new().register("local", Arc::new(MemoryStorage::new()));
//! let lifecycle = FileLifecycle::new(disks.clone());
//!
//! let mut record = FileRecord::new(OwnerRef::new("Document", "42"), "report.pdf")
//!     .on_disk("local", "2024/01/report.pdf");
//! let ok = lifecycle.store(&mut record, bytes::Bytes::from(pdf_data)).await;
//! ```

pub mod lifecycle;
pub mod mime;
pub mod model;
pub mod repository;
pub mod respond;
pub mod storage;

pub use lifecycle::FileLifecycle;
pub use mime::wildcard_match;
pub use model::{FileRecord, OwnerRef};
pub use repository::{
    FileRepository, MemoryFileRepository, RepositoryError, RepositoryResult,
};
pub use respond::{
    content_disposition, ContentResponder, FileError, FileRepresentation, FileResponse,
    FileStream, CACHE_CONTROL,
};
pub use storage::{
    generate_path, BoxReader, DiskSet, DiskStorage, MemoryStorage, StorageBackend, StorageError,
    StorageResult, WriteMetadata,
};

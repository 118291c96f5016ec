//! Content negotiation for file responses.
//!
//! Decides, from the requested accept types, whether a record's blob is
//! rendered inline or forced into a download, and carries the transfer
//! headers either way. The structured (JSON) path never opens the blob.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use attache_core::traits::{ExternallyIdentifiable, Id};

use crate::mime::wildcard_match;
use crate::model::{FileRecord, OwnerRef};
use crate::storage::{BoxReader, DiskSet, StorageBackend, StorageError};

/// Cache policy sent with every blob response.
pub const CACHE_CONTROL: &str = "must-revalidate, post-check=0, pre-check=0";

#[derive(Debug, Error)]
pub enum FileError {
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("Unknown disk: {0}")]
    UnknownDisk(String),
    #[error("Record has no stored content")]
    Unstored,
    #[error("Storage error: {0}")]
    Storage(StorageError),
}

impl From<StorageError> for FileError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(path) => FileError::NotFound(path),
            other => FileError::Storage(other),
        }
    }
}

/// A streamed blob with its transfer headers.
pub struct FileStream {
    pub content_type: String,
    pub content_length: Option<i64>,
    /// Pass-through reader over the backend blob. The handle is released
    /// when the stream is dropped, on every exit path.
    pub stream: BoxReader,
}

/// The negotiated response shape.
pub enum FileResponse {
    /// The client accepts the record's mime type: render inline.
    Inline(FileStream),
    /// No acceptable type matched: force a download.
    Download {
        stream: FileStream,
        /// Full `Content-Disposition` header value.
        disposition: String,
    },
    /// Structured representation of the record's fields.
    Structured(FileRepresentation),
}

/// Serialized record shape, including the backend-derived `url` and
/// `modified_at` fields.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRepresentation {
    pub id: Option<Id>,
    pub external_id: Uuid,
    pub owner: OwnerRef,
    pub disk: Option<String>,
    pub path: Option<String>,
    pub filename: String,
    pub display_name: String,
    pub mimetype: String,
    pub size: Option<i64>,
    pub meta: Map<String, Value>,
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Builds content-negotiated responses for file records.
pub struct ContentResponder {
    disks: DiskSet,
}

impl ContentResponder {
    pub fn new(disks: DiskSet) -> Self {
        Self { disks }
    }

    /// Negotiate a response for `record`.
    ///
    /// `accept` is scanned in caller-supplied preference order; the first
    /// entry whose pattern matches the record's mime type selects an
    /// inline stream. With no match the blob becomes a forced download.
    /// `prefer_json` short-circuits to the structured representation.
    ///
    /// A missing blob surfaces as [`FileError::NotFound`], never a panic
    /// or an empty body.
    pub async fn respond_to(
        &self,
        record: &FileRecord,
        accept: &[String],
        prefer_json: bool,
    ) -> Result<FileResponse, FileError> {
        if prefer_json {
            return Ok(FileResponse::Structured(self.represent(record).await?));
        }

        let (backend, path) = self.backend_for(record)?;
        let stream = FileStream {
            content_type: record.mimetype.clone(),
            content_length: record.size,
            stream: backend.read_stream(&path).await?,
        };

        let matched = accept
            .iter()
            .find(|pattern| wildcard_match(pattern, &record.mimetype));

        match matched {
            Some(_) => Ok(FileResponse::Inline(stream)),
            None => Ok(FileResponse::Download {
                stream,
                disposition: content_disposition(&record.filename),
            }),
        }
    }

    /// Structured representation with backend-resolved `url` and
    /// last-modified timestamp. Tolerates an absent blob.
    pub async fn represent(&self, record: &FileRecord) -> Result<FileRepresentation, FileError> {
        let (url, modified_at) = match (record.disk.as_deref(), record.path.as_deref()) {
            (Some(disk), Some(path)) => {
                let backend = self
                    .disks
                    .get(disk)
                    .ok_or_else(|| FileError::UnknownDisk(disk.to_string()))?;
                let modified = backend.last_modified(path).await.unwrap_or(None);
                (Some(backend.url(path)), modified)
            }
            _ => (None, None),
        };

        Ok(FileRepresentation {
            id: record.id,
            external_id: record.external_id(),
            owner: record.owner.clone(),
            disk: record.disk.clone(),
            path: record.path.clone(),
            filename: record.filename.clone(),
            display_name: record.display_name(),
            mimetype: record.mimetype.clone(),
            size: record.size,
            meta: record.meta.clone(),
            url,
            modified_at,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }

    fn backend_for(
        &self,
        record: &FileRecord,
    ) -> Result<(Arc<dyn StorageBackend>, String), FileError> {
        let (Some(disk), Some(path)) = (record.disk.as_deref(), record.path.as_deref()) else {
            return Err(FileError::Unstored);
        };
        let backend = self
            .disks
            .get(disk)
            .ok_or_else(|| FileError::UnknownDisk(disk.to_string()))?;
        Ok((backend, path.to_string()))
    }
}

/// Build an attachment `Content-Disposition` value carrying both the
/// RFC 5987 encoded filename and an ASCII fallback (percent signs
/// stripped) for clients that cannot parse the extended form.
pub fn content_disposition(filename: &str) -> String {
    let ascii: String = filename
        .chars()
        .filter(|c| c.is_ascii_graphic() && !matches!(c, '"' | ';' | '\\' | '%'))
        .collect();
    let fallback = if ascii.is_empty() {
        "download".to_string()
    } else {
        ascii
    };

    let encoded: String = filename
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'!'
            | b'#'
            | b'$'
            | b'&'
            | b'+'
            | b'-'
            | b'.'
            | b'^'
            | b'_'
            | b'`'
            | b'|'
            | b'~' => String::from(b as char),
            _ => format!("%{b:02X}"),
        })
        .collect();

    format!("attachment; filename=\"{fallback}\"; filename*=UTF-8''{encoded}")
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use tokio::io::AsyncReadExt;

    use crate::storage::MemoryStorage;

    use super::*;

    async fn responder_with_blob(data: &'static str) -> (ContentResponder, FileRecord) {
        let storage = Arc::new(MemoryStorage::new());
        storage.put("d/pic.png", Bytes::from(data)).await.unwrap();

        let disks = DiskSet::new().register("mem", storage as Arc<dyn StorageBackend>);
        let mut record =
            FileRecord::new(OwnerRef::new("Document", "1"), "pic.png").on_disk("mem", "d/pic.png");
        record.id = Some(1);
        record.size = Some(data.len() as i64);

        (ContentResponder::new(disks), record)
    }

    fn accepts(types: &[&str]) -> Vec<String> {
        types.iter().map(|t| t.to_string()).collect()
    }

    async fn drain(mut stream: FileStream) -> Vec<u8> {
        let mut out = Vec::new();
        stream.stream.read_to_end(&mut out).await.unwrap();
        out
    }

    #[tokio::test]
    async fn wildcard_accept_yields_inline_stream() {
        let (responder, record) = responder_with_blob("png bytes").await;

        let response = responder
            .respond_to(&record, &accepts(&["text/html", "image/*"]), false)
            .await
            .unwrap();

        match response {
            FileResponse::Inline(stream) => {
                assert_eq!(stream.content_type, "image/png");
                assert_eq!(stream.content_length, Some(9));
                assert_eq!(drain(stream).await, b"png bytes");
            }
            _ => panic!("expected inline response"),
        }
    }

    #[tokio::test]
    async fn unmatched_accept_forces_download() {
        let (responder, record) = responder_with_blob("png bytes").await;

        let response = responder
            .respond_to(&record, &accepts(&["text/html"]), false)
            .await
            .unwrap();

        match response {
            FileResponse::Download { disposition, stream } => {
                assert!(disposition.starts_with("attachment;"));
                assert!(disposition.contains("filename=\"pic.png\""));
                assert_eq!(drain(stream).await, b"png bytes");
            }
            _ => panic!("expected download response"),
        }
    }

    #[tokio::test]
    async fn empty_accept_list_forces_download() {
        let (responder, record) = responder_with_blob("x").await;
        let response = responder.respond_to(&record, &[], false).await.unwrap();
        assert!(matches!(response, FileResponse::Download { .. }));
    }

    #[tokio::test]
    async fn prefer_json_skips_the_blob_entirely() {
        let storage = Arc::new(MemoryStorage::new());
        let disks = DiskSet::new().register("mem", storage as Arc<dyn StorageBackend>);
        let responder = ContentResponder::new(disks);

        // No blob was ever written; the structured path must still work.
        let mut record =
            FileRecord::new(OwnerRef::new("Document", "1"), "gone.txt").on_disk("mem", "d/gone.txt");
        record.id = Some(7);

        let response = responder.respond_to(&record, &[], true).await.unwrap();
        match response {
            FileResponse::Structured(rep) => {
                assert_eq!(rep.id, Some(7));
                assert_eq!(rep.display_name, "gone");
                assert_eq!(rep.url.as_deref(), Some("/memory/d/gone.txt"));
                assert!(rep.modified_at.is_none());
            }
            _ => panic!("expected structured response"),
        }
    }

    #[tokio::test]
    async fn representation_carries_backend_modified_at() {
        let (responder, record) = responder_with_blob("data").await;
        let rep = responder.represent(&record).await.unwrap();
        assert!(rep.modified_at.is_some());
        assert_eq!(rep.url.as_deref(), Some("/memory/d/pic.png"));
        assert_eq!(rep.mimetype, "image/png");
    }

    #[tokio::test]
    async fn missing_blob_surfaces_not_found() {
        let storage = Arc::new(MemoryStorage::new());
        let disks = DiskSet::new().register("mem", storage as Arc<dyn StorageBackend>);
        let responder = ContentResponder::new(disks);

        let mut record =
            FileRecord::new(OwnerRef::new("Document", "1"), "gone.txt").on_disk("mem", "d/gone.txt");
        record.id = Some(1);

        let result = responder.respond_to(&record, &accepts(&["*/*"]), false).await;
        assert!(matches!(result, Err(FileError::NotFound(_))));
    }

    #[tokio::test]
    async fn unstored_record_is_a_typed_error() {
        let responder = ContentResponder::new(DiskSet::new());
        let record = FileRecord::new(OwnerRef::new("Document", "1"), "x.txt");
        let result = responder.respond_to(&record, &[], false).await;
        assert!(matches!(result, Err(FileError::Unstored)));
    }

    #[tokio::test]
    async fn unknown_disk_is_a_typed_error() {
        let responder = ContentResponder::new(DiskSet::new());
        let record =
            FileRecord::new(OwnerRef::new("Document", "1"), "x.txt").on_disk("s3", "x.txt");
        let result = responder.respond_to(&record, &[], false).await;
        assert!(matches!(result, Err(FileError::UnknownDisk(_))));
    }

    #[test]
    fn disposition_strips_percent_from_fallback() {
        let value = content_disposition("100% raise.pdf");
        assert!(value.starts_with("attachment;"));
        assert!(value.contains("filename=\"100raise.pdf\""));
        assert!(value.contains("filename*=UTF-8''100%25%20raise.pdf"));
    }

    #[test]
    fn disposition_handles_non_ascii_names() {
        let value = content_disposition("résumé.pdf");
        // The fallback keeps only printable ASCII.
        assert!(value.contains("filename=\"rsum.pdf\""));
        assert!(value.contains("filename*=UTF-8''r%C3%A9sum%C3%A9.pdf"));
    }

    #[test]
    fn disposition_never_emits_empty_fallback() {
        let value = content_disposition("研究");
        assert!(value.contains("filename=\"download\""));
    }
}

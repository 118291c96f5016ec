//! Streaming response conversion and Accept-header parsing.

use axum::{
    body::Body,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tokio_util::io::ReaderStream;

use attache_files::{FileResponse, FileStream, CACHE_CONTROL};

/// Newtype carrying a negotiated [`FileResponse`] into axum. Blob bodies
/// are passed through chunk by chunk; dropping the body stream releases
/// the backend handle on success, disconnect, and error alike.
pub struct Negotiated(pub FileResponse);

impl IntoResponse for Negotiated {
    fn into_response(self) -> Response {
        match self.0 {
            FileResponse::Structured(rep) => Json(rep).into_response(),
            FileResponse::Inline(stream) => stream_response(stream, None),
            FileResponse::Download {
                stream,
                disposition,
            } => stream_response(stream, Some(disposition)),
        }
    }
}

fn stream_response(file: FileStream, disposition: Option<String>) -> Response {
    let body = Body::from_stream(ReaderStream::new(file.stream));

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CACHE_CONTROL, CACHE_CONTROL)
        .header(header::CONTENT_TYPE, file.content_type);
    if let Some(length) = file.content_length {
        builder = builder.header(header::CONTENT_LENGTH, length.to_string());
    }
    if let Some(disposition) = disposition {
        builder = builder.header(header::CONTENT_DISPOSITION, disposition);
    }

    builder
        .body(body)
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// Parse an `Accept` header into its media-range patterns, preserving the
/// client's order. Quality parameters are stripped, not weighed;
/// negotiation is first-listed-first-matched.
pub fn parse_accept(header: Option<&str>) -> Vec<String> {
    match header {
        Some(value) => value
            .split(',')
            .filter_map(|entry| {
                let range = entry.split(';').next().unwrap_or("").trim();
                (!range.is_empty()).then(|| range.to_string())
            })
            .collect(),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accept_preserves_order_and_strips_q() {
        let parsed = parse_accept(Some("text/html, image/*;q=0.8, */*;q=0.1"));
        assert_eq!(parsed, vec!["text/html", "image/*", "*/*"]);
    }

    #[test]
    fn parse_accept_of_missing_header_is_empty() {
        assert!(parse_accept(None).is_empty());
        assert!(parse_accept(Some("")).is_empty());
    }

    #[tokio::test]
    async fn inline_response_carries_transfer_headers() {
        let file = FileStream {
            content_type: "image/png".to_string(),
            content_length: Some(4),
            stream: Box::new(std::io::Cursor::new(b"data".to_vec())),
        };
        let response = Negotiated(FileResponse::Inline(file)).into_response();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "image/png");
        assert_eq!(headers[header::CONTENT_LENGTH], "4");
        assert_eq!(
            headers[header::CACHE_CONTROL],
            "must-revalidate, post-check=0, pre-check=0"
        );
        assert!(!headers.contains_key(header::CONTENT_DISPOSITION));

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"data");
    }

    #[tokio::test]
    async fn download_response_adds_disposition() {
        let file = FileStream {
            content_type: "application/pdf".to_string(),
            content_length: Some(3),
            stream: Box::new(std::io::Cursor::new(b"pdf".to_vec())),
        };
        let response = Negotiated(FileResponse::Download {
            stream: file,
            disposition: attache_files::content_disposition("report.pdf"),
        })
        .into_response();

        let disposition = response.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .to_string();
        assert!(disposition.starts_with("attachment;"));
        assert!(disposition.contains("report.pdf"));
    }
}

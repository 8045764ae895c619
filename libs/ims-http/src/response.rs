use crate::error::HttpError;
use crate::security::ERROR_BODY_PREVIEW_LIMIT;
use bytes::Bytes;
use http::{HeaderMap, Response, StatusCode};
use http_body_util::BodyExt;
use std::time::Duration;
use tokio::time::Instant;

/// Boxed response body
pub type ResponseBody =
    http_body_util::combinators::BoxBody<Bytes, Box<dyn std::error::Error + Send + Sync>>;

/// HTTP response wrapper with bounded body reads
///
/// Body reads enforce the configured `max_body_size` limit and finish by the
/// deadline set when the request was sent.
#[derive(Debug)]
pub struct HttpResponse {
    pub(crate) inner: Response<ResponseBody>,
    pub(crate) max_body_size: usize,
    /// `None` when the timeout is too large to express as an instant
    pub(crate) deadline: Option<Instant>,
    pub(crate) timeout: Duration,
}

impl HttpResponse {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    /// Read the body without looking at the status
    ///
    /// # Errors
    /// Returns `HttpError::BodyTooLarge` if body exceeds limit.
    /// Returns `HttpError::Timeout` if the body is not complete by the
    /// request deadline.
    pub async fn bytes(self) -> Result<Bytes, HttpError> {
        let limit = self.max_body_size;
        self.read_limited(limit).await
    }

    /// Consume the response into an `HttpError::HttpStatus` carrying up to
    /// 8 KiB of the body.
    ///
    /// Works for any status, so callers with a stricter notion of success
    /// than "2xx" can still produce a uniform error. A body read failure is
    /// returned instead of the status error.
    pub async fn into_status_error(self) -> HttpError {
        let status = self.inner.status();
        let content_type = content_type(self.inner.headers());

        let preview_limit = self.max_body_size.min(ERROR_BODY_PREVIEW_LIMIT);
        let body_preview = match self.read_limited(preview_limit).await {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(HttpError::BodyTooLarge { .. }) => "<body too large for preview>".to_owned(),
            Err(e) => return e,
        };

        HttpError::HttpStatus {
            status,
            body_preview,
            content_type,
        }
    }

    async fn read_limited(self, limit: usize) -> Result<Bytes, HttpError> {
        let read = read_body_limited(self.inner, limit);
        match self.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, read)
                .await
                .map_err(|_| HttpError::Timeout(self.timeout))?,
            None => read.await,
        }
    }
}

fn content_type(headers: &HeaderMap) -> Option<String> {
    headers
        .get(http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

async fn read_body_limited(
    response: Response<ResponseBody>,
    limit: usize,
) -> Result<Bytes, HttpError> {
    let mut body = std::pin::pin!(response.into_body());
    let mut collected = Vec::new();

    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(HttpError::Transport)?;
        if let Some(chunk) = frame.data_ref() {
            let total = collected.len() + chunk.len();
            if total > limit {
                return Err(HttpError::BodyTooLarge {
                    limit,
                    actual: total,
                });
            }
            collected.extend_from_slice(chunk);
        }
    }

    Ok(Bytes::from(collected))
}

use std::error::Error as StdError;

use ims_http::HttpError;
use thiserror::Error;

/// Errors returned by the IMS JWT exchange.
///
/// No variant ever carries the private key, the client secret or the
/// unsigned claim set.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExchangeError {
    /// The integration descriptor lacks one or more required fields.
    #[error("The following configuration elements are missing: {}", .missing.join(", "))]
    Configuration { missing: Vec<&'static str> },

    /// A per-call exchange option is absent.
    #[error("{0} is a required option")]
    MissingField(&'static str),

    /// The exchange client could not be created, or the assertion validity
    /// window is out of range.
    #[error("cannot set up exchange: {0}")]
    Construction(String),

    /// The assertion could not be signed (usually an unparseable private key).
    #[error("failed to sign JWT assertion: {0}")]
    Signing(String),

    /// The identity host could not be reached: connect, proxy tunnel, TLS,
    /// or timeout.
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    /// The identity host answered with a status other than 200.
    #[error("token exchange at {url} failed with HTTP {status}: {body}")]
    Exchange {
        url: String,
        status: http::StatusCode,
        /// Response body, capped at 8 KiB
        body: String,
    },

    /// HTTP 200 whose body is not a token response.
    #[error("invalid token response from {url}: {message}")]
    InvalidResponse { url: String, message: String },
}

impl ExchangeError {
    /// True for failures that happened before the request left the process.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Configuration { .. } | Self::MissingField(_) | Self::Construction(_)
        )
    }

    /// Short machine-friendly label, used as a log field.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration",
            Self::MissingField(_) => "missing_field",
            Self::Construction(_) => "construction",
            Self::Signing(_) => "signing",
            Self::Transport { .. } => "transport",
            Self::Exchange { .. } => "exchange",
            Self::InvalidResponse { .. } => "invalid_response",
        }
    }
}

/// Describe an HTTP channel failure, walking the source chain so that
/// proxy and connect failures keep their root cause.
#[must_use]
pub fn describe_http_error(err: &HttpError) -> String {
    match err {
        HttpError::Timeout(duration) => format!("request timed out after {duration:?}"),
        HttpError::Transport(source) => with_sources("transport error", source.as_ref()),
        HttpError::Tls(source) => with_sources("TLS error", source.as_ref()),
        other => other.to_string(),
    }
}

fn with_sources(prefix: &str, err: &(dyn StdError + 'static)) -> String {
    std::iter::once(prefix.to_owned())
        .chain(std::iter::successors(Some(err), |&e| e.source()).map(ToString::to_string))
        .collect::<Vec<_>>()
        .join(": ")
}

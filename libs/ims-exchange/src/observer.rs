//! Exchange lifecycle hooks.
//!
//! The client reports the outgoing request, the response, every error and
//! the result of the local self-check through an [`ExchangeObserver`].
//! [`TracingObserver`] is the default; request and response bodies only
//! reach it when the caller asked for verbose output, and the client secret
//! is already redacted by then.

use std::time::Duration;

use http::{Method, StatusCode};

use crate::error::ExchangeError;

/// The exchange request is about to be sent.
#[derive(Debug, Clone, Copy)]
pub struct RequestEvent<'a> {
    pub method: &'a Method,
    pub url: &'a str,
    /// Form body with `client_secret` redacted; only set in verbose mode
    pub body: Option<&'a str>,
}

/// The identity host answered (any status).
#[derive(Debug, Clone, Copy)]
pub struct ResponseEvent<'a> {
    pub method: &'a Method,
    pub url: &'a str,
    pub status: StatusCode,
    pub elapsed: Duration,
    /// Response body; only set in verbose mode
    pub body: Option<&'a str>,
}

/// The exchange failed.
#[derive(Debug, Clone, Copy)]
pub struct ErrorEvent<'a> {
    /// Exchange URL, unknown when validation failed before a client existed
    pub url: Option<&'a str>,
    pub error: &'a ExchangeError,
    pub elapsed: Option<Duration>,
}

/// Outcome of checking the signed assertion against the public key.
#[derive(Debug, Clone, Copy)]
pub struct SelfCheckEvent<'a> {
    pub issuer: &'a str,
    pub audience: &'a str,
    /// `Err` carries the verification failure reason
    pub outcome: Result<(), &'a str>,
}

/// Receiver for exchange lifecycle events.
pub trait ExchangeObserver: Send + Sync {
    fn on_request(&self, event: &RequestEvent<'_>);

    fn on_response(&self, event: &ResponseEvent<'_>);

    fn on_error(&self, event: &ErrorEvent<'_>);

    fn on_self_check(&self, event: &SelfCheckEvent<'_>);
}

/// Drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl ExchangeObserver for NoOpObserver {
    fn on_request(&self, _event: &RequestEvent<'_>) {}

    fn on_response(&self, _event: &ResponseEvent<'_>) {}

    fn on_error(&self, _event: &ErrorEvent<'_>) {}

    fn on_self_check(&self, _event: &SelfCheckEvent<'_>) {}
}

/// Emits events through `tracing`.
///
/// Requests, responses and successful self-checks go out at `debug`, failed
/// self-checks at `warn` and errors at `error`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

impl ExchangeObserver for TracingObserver {
    fn on_request(&self, event: &RequestEvent<'_>) {
        tracing::debug!(method = %event.method, url = event.url, ">> token exchange request");
        if let Some(body) = event.body {
            tracing::debug!(body, ">> request body");
        }
    }

    fn on_response(&self, event: &ResponseEvent<'_>) {
        tracing::debug!(
            method = %event.method,
            url = event.url,
            status = event.status.as_u16(),
            elapsed_ms = millis(event.elapsed),
            "<< token exchange response"
        );
        if let Some(body) = event.body {
            tracing::debug!(body, "<< response body");
        }
    }

    fn on_error(&self, event: &ErrorEvent<'_>) {
        tracing::error!(
            kind = event.error.kind(),
            url = event.url,
            elapsed_ms = event.elapsed.map(millis),
            error = %event.error,
            "token exchange failed"
        );
    }

    fn on_self_check(&self, event: &SelfCheckEvent<'_>) {
        match event.outcome {
            Ok(()) => tracing::debug!(
                issuer = event.issuer,
                audience = event.audience,
                "assertion verified against public key"
            ),
            Err(reason) => tracing::warn!(
                issuer = event.issuer,
                audience = event.audience,
                reason,
                "assertion failed local verification, submitting anyway"
            ),
        }
    }
}

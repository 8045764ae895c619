use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::ExchangeError;

/// Validity window the one-shot exchange puts on every assertion.
pub const DEFAULT_VALIDITY: Duration = Duration::from_secs(8 * 60 * 60);

/// Source of the current time, so tests can pin `exp`.
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

/// Wall clock (UTC).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// A clock stuck at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub OffsetDateTime);

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        self.0
    }
}

/// `exp` for an assertion issued now: Unix seconds of `now + validity`.
///
/// # Errors
///
/// Returns [`ExchangeError::Construction`] if `now + validity` does not fit
/// in a timestamp.
pub fn expiration_after(clock: &dyn Clock, validity: Duration) -> Result<i64, ExchangeError> {
    time::Duration::try_from(validity)
        .ok()
        .and_then(|window| clock.now().checked_add(window))
        .map(OffsetDateTime::unix_timestamp)
        .ok_or_else(|| {
            ExchangeError::Construction(format!("assertion validity of {validity:?} is out of range"))
        })
}

/// Split a comma-separated metascope list.
///
/// Entries are trimmed, empty entries dropped and repeats removed; the first
/// occurrence keeps its position.
#[must_use]
pub fn parse_metascopes(raw: &str) -> Vec<String> {
    let mut scopes: Vec<String> = Vec::new();
    for scope in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !scopes.iter().any(|seen| seen == scope) {
            scopes.push(scope.to_owned());
        }
    }
    scopes
}

/// Claim set of the JWT assertion.
///
/// Scope claims are flattened next to the registered claims, one
/// `https://{host}/s/{scope}: true` entry per metascope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionClaims {
    pub iss: String,
    pub sub: String,
    pub exp: i64,
    pub aud: String,
    #[serde(flatten)]
    pub scopes: BTreeMap<String, bool>,
}

impl AssertionClaims {
    /// Build the claims for `host`. Blank metascopes are skipped and
    /// duplicates collapse into one claim.
    #[must_use]
    pub fn new(
        host: &str,
        issuer: &str,
        subject: &str,
        expiration: i64,
        client_id: &str,
        metascopes: &[String],
    ) -> Self {
        let scopes = metascopes
            .iter()
            .map(|scope| scope.trim())
            .filter(|scope| !scope.is_empty())
            .map(|scope| (scope_claim(host, scope), true))
            .collect();

        Self {
            iss: issuer.to_owned(),
            sub: subject.to_owned(),
            exp: expiration,
            aud: audience(host, client_id),
            scopes,
        }
    }
}

/// `https://{host}/c/{client_id}`
#[must_use]
pub fn audience(host: &str, client_id: &str) -> String {
    format!("https://{host}/c/{client_id}")
}

/// `https://{host}/s/{scope}`
#[must_use]
pub fn scope_claim(host: &str, scope: &str) -> String {
    format!("https://{host}/s/{scope}")
}

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Token endpoint response for a successful exchange.
///
/// Fields the identity host adds beyond the three standard ones are kept in
/// [`extra`](Self::extra) and serialized back in place, so printing the
/// response reproduces what the host sent.
///
/// `Debug` redacts the access token; `Serialize` does not, since the CLI
/// prints the response on purpose.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Token lifetime, passed through exactly as the host sends it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("extra", &self.extra.keys().collect::<Vec<_>>())
            .finish()
    }
}

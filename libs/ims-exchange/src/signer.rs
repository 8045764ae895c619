use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};

use crate::claims::AssertionClaims;
use crate::error::ExchangeError;
use crate::secret::SecretString;

/// Sign `claims` into a compact RS256 JWT with header `{"typ":"JWT","alg":"RS256"}`.
///
/// The key may be PKCS#1 (`BEGIN RSA PRIVATE KEY`) or PKCS#8
/// (`BEGIN PRIVATE KEY`) PEM.
///
/// # Errors
///
/// Returns [`ExchangeError::Signing`] if the key cannot be parsed or signing
/// fails. The message never includes key material.
pub fn sign(claims: &AssertionClaims, private_key: &SecretString) -> Result<String, ExchangeError> {
    let key = EncodingKey::from_rsa_pem(private_key.expose().as_bytes())
        .map_err(|e| ExchangeError::Signing(format!("invalid RSA private key: {e}")))?;

    encode(&Header::new(Algorithm::RS256), claims, &key)
        .map_err(|e| ExchangeError::Signing(e.to_string()))
}

/// Verify a signed assertion against a PEM public key.
///
/// Checks the signature, `exp`, the issuer and the audience. Used for the
/// local self-check before submission, whose outcome is only reported.
///
/// # Errors
///
/// Returns the `jsonwebtoken` error when the key is unusable or any check
/// fails.
pub fn verify(
    token: &str,
    public_key_pem: &str,
    issuer: &str,
    audience: &str,
) -> Result<AssertionClaims, jsonwebtoken::errors::Error> {
    let key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())?;

    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_issuer(&[issuer]);
    validation.set_audience(&[audience]);
    validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

    decode::<AssertionClaims>(token, &key, &validation).map(|data| data.claims)
}

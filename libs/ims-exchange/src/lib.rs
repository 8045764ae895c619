#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! IMS JWT trust exchange
//!
//! Turns a service integration (organization, technical account, client
//! credentials, metascopes, RSA private key) into an access token:
//!
//! 1. [`IntegrationConfig::validate`] reports every missing field at once
//! 2. an RS256 assertion is signed with the integration's private key
//! 3. the assertion is POSTed as a form to `https://{host}/ims/exchange/jwt`
//! 4. a 200 response becomes a [`TokenResponse`]
//!
//! The request is sent once, with a ten second timeout, optionally through a
//! forward proxy. Nothing is cached and nothing is retried.
//!
//! # Example
//!
//! ```ignore
//! use ims_exchange::{IntegrationConfig, exchange};
//!
//! let config = IntegrationConfig::load("integration.json")?;
//! let token = exchange(&config).await?;
//! println!("{}", token.access_token);
//! ```

pub mod claims;
pub mod config;
pub mod observer;
pub mod signer;

mod client;
mod error;
mod exchange;
mod secret;
mod token;

pub use claims::{AssertionClaims, Clock, DEFAULT_VALIDITY, FixedClock, SystemClock};
pub use client::{EXCHANGE_PATH, ExchangeRequest, JwtExchangeClient, JwtExchangeClientBuilder};
pub use config::{ConfigLoadError, IntegrationConfig, ValidatedIntegration};
pub use error::{ExchangeError, describe_http_error};
pub use exchange::{ExchangeOptions, exchange, exchange_with};
pub use observer::{ExchangeObserver, NoOpObserver, TracingObserver};
pub use secret::SecretString;
pub use token::TokenResponse;

// Re-exported so callers can configure the channel without a direct dependency.
pub use ims_http::{HttpClientConfig, ProxyConfig, TransportSecurity};

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! HTTP channel for the IMS JWT exchange
//!
//! A small hyper-based client that does one thing: POST a form and read a
//! bounded response.
//! - TLS via rustls with the Mozilla root set (HTTPS only by default)
//! - Connection pooling
//! - One fixed timeout covering connect, request and the whole response
//! - Optional forward-proxy routing through an HTTP `CONNECT` tunnel
//! - Size-limited response bodies
//!
//! Requests are never retried. Callers decide what to do with a failure.
//!
//! # Example
//!
//! ```ignore
//! use ims_http::{HttpClient, ProxyConfig};
//! use std::time::Duration;
//!
//! let client = HttpClient::builder()
//!     .timeout(Duration::from_secs(10))
//!     .proxy(ProxyConfig::new("127.0.0.1", 8888))
//!     .build()?;
//!
//! let resp = client
//!     .post("https://ims-na1.adobelogin.com/ims/exchange/jwt")
//!     .form(&[("client_id", "abc")])?
//!     .send()
//!     .await?;
//! ```

mod builder;
mod client;
mod config;
mod connector;
mod error;
mod layers;
mod request;
mod response;
mod security;

pub use builder::HttpClientBuilder;
pub use client::HttpClient;
pub use config::{DEFAULT_USER_AGENT, HttpClientConfig, ProxyConfig, TransportSecurity};
pub use error::HttpError;
pub use request::RequestBuilder;
pub use response::HttpResponse;

//! TCP connector with optional forward-proxy tunnelling.
//!
//! The TLS connector wraps this service, so the same code path serves both
//! direct connections and connections opened through a `CONNECT` tunnel.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use http::Uri;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::connect::proxy::Tunnel;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tower::Service;

use crate::config::ProxyConfig;
use crate::error::HttpError;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

type ConnectFuture = Pin<Box<dyn Future<Output = Result<TokioIo<TcpStream>, BoxError>> + Send>>;

/// Connects directly to the origin, or to the proxy and tunnels through it.
#[derive(Clone)]
pub enum ProxyAwareConnector {
    Direct(HttpConnector),
    Tunnel(Tunnel<HttpConnector>),
}

impl ProxyAwareConnector {
    /// Build the connector for the given proxy descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::InvalidProxy`] if the host/port pair does not form
    /// a valid URI.
    pub fn new(proxy: Option<&ProxyConfig>) -> Result<Self, HttpError> {
        let mut http = HttpConnector::new();
        // Scheme checks happen in the request builder; the TLS wrapper needs
        // the raw connector to accept https URIs.
        http.enforce_http(false);

        let Some(proxy) = proxy else {
            return Ok(Self::Direct(http));
        };

        let proxy_uri: Uri = proxy
            .uri_string()
            .parse()
            .map_err(|e: http::uri::InvalidUri| HttpError::InvalidProxy {
                proxy: format!("{}:{}", proxy.host, proxy.port),
                reason: e.to_string(),
            })?;

        tracing::debug!(proxy = %proxy_uri, "routing requests through forward proxy");
        Ok(Self::Tunnel(Tunnel::new(proxy_uri, http)))
    }

    #[must_use]
    pub fn is_proxied(&self) -> bool {
        matches!(self, Self::Tunnel(_))
    }
}

impl Service<Uri> for ProxyAwareConnector {
    type Response = TokioIo<TcpStream>;
    type Error = BoxError;
    type Future = ConnectFuture;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        match self {
            Self::Direct(http) => http.poll_ready(cx).map_err(Into::into),
            Self::Tunnel(tunnel) => tunnel.poll_ready(cx).map_err(Into::into),
        }
    }

    fn call(&mut self, dst: Uri) -> Self::Future {
        match self {
            Self::Direct(http) => {
                let connecting = http.call(dst);
                Box::pin(async move { connecting.await.map_err(Into::into) })
            }
            Self::Tunnel(tunnel) => {
                let tunnelling = tunnel.call(dst);
                Box::pin(async move { tunnelling.await.map_err(Into::into) })
            }
        }
    }
}

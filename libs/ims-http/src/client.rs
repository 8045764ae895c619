use crate::builder::HttpClientBuilder;
use crate::config::TransportSecurity;
use crate::error::HttpError;
use crate::request::RequestBuilder;
use crate::response::ResponseBody;
use bytes::Bytes;
use http::{Request, Response};
use http_body_util::Full;
use std::time::Duration;
use tower::util::BoxCloneSyncService;

/// Type-erased service stack behind [`HttpClient`]
pub type HttpService = BoxCloneSyncService<Request<Full<Bytes>>, Response<ResponseBody>, HttpError>;

/// HTTP client over a small tower stack: timeout, user agent, hyper
///
/// `HttpClient` is `Clone + Send + Sync`; clones share the connection pool.
/// It can be built outside a Tokio runtime, but requests must be sent from
/// inside one.
///
/// ```ignore
/// let client = HttpClient::builder()
///     .timeout(Duration::from_secs(10))
///     .build()?;
/// let resp = client.post(url).form(&fields)?.send().await?;
/// ```
#[derive(Clone)]
pub struct HttpClient {
    pub(crate) service: HttpService,
    pub(crate) max_body_size: usize,
    pub(crate) timeout: Duration,
    pub(crate) transport_security: TransportSecurity,
    pub(crate) proxied: bool,
}

impl HttpClient {
    /// Create a builder for configuring the HTTP client
    #[must_use]
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::new()
    }

    /// True when connections are tunnelled through a forward proxy
    #[must_use]
    pub fn is_proxied(&self) -> bool {
        self.proxied
    }

    /// Create a POST request builder
    ///
    /// The URL must be absolute. Plain `http://` is accepted only with
    /// [`TransportSecurity::AllowInsecureHttp`].
    pub fn post(&self, url: &str) -> RequestBuilder {
        RequestBuilder::new(
            self.service.clone(),
            self.max_body_size,
            self.timeout,
            http::Method::POST,
            url.to_owned(),
            self.transport_security,
        )
    }
}

use crate::client::HttpService;
use crate::config::TransportSecurity;
use crate::error::HttpError;
use crate::response::HttpResponse;
use bytes::Bytes;
use http::Request;
use http_body_util::Full;
use std::time::Duration;
use tokio::time::Instant;
use tower::ServiceExt;

/// HTTP request builder
///
/// Created by [`HttpClient::post`](crate::HttpClient::post).
#[must_use = "RequestBuilder does nothing until .send() is called"]
pub struct RequestBuilder {
    service: HttpService,
    max_body_size: usize,
    timeout: Duration,
    method: http::Method,
    url: String,
    /// URL-encoded form, stored after serialization
    form: Option<Bytes>,
    transport_security: TransportSecurity,
}

impl RequestBuilder {
    pub(crate) fn new(
        service: HttpService,
        max_body_size: usize,
        timeout: Duration,
        method: http::Method,
        url: String,
        transport_security: TransportSecurity,
    ) -> Self {
        Self {
            service,
            max_body_size,
            timeout,
            method,
            url,
            form: None,
            transport_security,
        }
    }

    /// The request method
    #[must_use]
    pub fn method(&self) -> &http::Method {
        &self.method
    }

    /// Set the body as `application/x-www-form-urlencoded`
    ///
    /// Fields are encoded in the order given.
    ///
    /// # Errors
    ///
    /// Returns `HttpError::FormEncode` if encoding fails.
    pub fn form(mut self, fields: &[(&str, &str)]) -> Result<Self, HttpError> {
        let encoded = serde_urlencoded::to_string(fields)?;
        self.form = Some(Bytes::from(encoded));
        Ok(self)
    }

    fn validate_url(&self) -> Result<http::Uri, HttpError> {
        let invalid = |reason: String| HttpError::InvalidUri {
            url: self.url.clone(),
            reason,
        };

        let uri: http::Uri = self
            .url
            .parse()
            .map_err(|e: http::uri::InvalidUri| invalid(e.to_string()))?;

        if uri.authority().is_none() {
            return Err(invalid("missing host/authority".to_owned()));
        }

        match uri.scheme_str() {
            Some("https") => Ok(uri),
            Some("http") => match self.transport_security {
                TransportSecurity::AllowInsecureHttp => Ok(uri),
                TransportSecurity::TlsOnly => Err(HttpError::InvalidScheme {
                    scheme: "http".to_owned(),
                    reason: "HTTPS required (transport security is TlsOnly)".to_owned(),
                }),
            },
            Some(scheme) => Err(HttpError::InvalidScheme {
                scheme: scheme.to_owned(),
                reason: "only http:// and https:// schemes are supported".to_owned(),
            }),
            None => Err(invalid("missing scheme".to_owned())),
        }
    }

    /// Send the request once and return the response
    ///
    /// Every HTTP status is returned as `Ok`. The configured timeout starts
    /// here and also bounds the body reads on the returned response.
    ///
    /// # Errors
    ///
    /// Returns `HttpError` for an invalid URL, a disallowed scheme,
    /// connection or proxy failures, TLS failures and timeouts.
    pub async fn send(self) -> Result<HttpResponse, HttpError> {
        let deadline = Instant::now().checked_add(self.timeout);
        let uri = self.validate_url()?;
        let mut builder = Request::builder().method(self.method).uri(uri);

        let body = match self.form {
            Some(form) => {
                builder = builder.header(
                    http::header::CONTENT_TYPE,
                    "application/x-www-form-urlencoded",
                );
                form
            }
            None => Bytes::new(),
        };
        let request = builder.body(Full::new(body))?;

        let inner = self.service.oneshot(request).await?;

        Ok(HttpResponse {
            inner,
            max_body_size: self.max_body_size,
            deadline,
            timeout: self.timeout,
        })
    }
}

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use http::StatusCode;
use ims_http::{HttpClient, HttpClientBuilder, HttpClientConfig, HttpError, ProxyConfig, TransportSecurity};

use crate::claims::AssertionClaims;
use crate::config::ValidatedIntegration;
use crate::error::{ExchangeError, describe_http_error};
use crate::observer::{ErrorEvent, ExchangeObserver, RequestEvent, ResponseEvent, SelfCheckEvent, TracingObserver};
use crate::secret::SecretString;
use crate::signer;
use crate::token::TokenResponse;

/// Path of the JWT exchange endpoint on the identity host.
pub const EXCHANGE_PATH: &str = "/ims/exchange/jwt";

/// Per-call inputs of an exchange.
///
/// Every field except `public_key` and `verbose` is required. They are
/// `Option` so that a missing one is reported as
/// [`ExchangeError::MissingField`] before anything is signed or sent.
#[derive(Debug, Clone, Default)]
pub struct ExchangeRequest {
    /// Issuer organization (`iss`)
    pub issuer: Option<String>,
    /// Technical account identifier (`sub`)
    pub subject: Option<String>,
    /// Absolute expiration, Unix seconds (`exp`)
    pub expiration: Option<i64>,
    pub metascopes: Option<Vec<String>>,
    pub client_id: Option<String>,
    pub client_secret: Option<SecretString>,
    /// PEM RSA private key used to sign the assertion
    pub private_key: Option<SecretString>,
    /// PEM RSA public key; when set the signed assertion is verified locally
    /// first and the outcome is reported, never enforced
    pub public_key: Option<String>,
    /// Hand request and response bodies to the observer
    pub verbose: bool,
}

impl ExchangeRequest {
    /// Request for a validated integration, expiring at `expiration`.
    #[must_use]
    pub fn for_integration(integration: &ValidatedIntegration, expiration: i64) -> Self {
        Self {
            issuer: Some(integration.org.clone()),
            subject: Some(integration.technical_account_id.clone()),
            expiration: Some(expiration),
            metascopes: Some(integration.metascopes.clone()),
            client_id: Some(integration.client_id.clone()),
            client_secret: Some(integration.client_secret.clone()),
            private_key: Some(integration.private_key.clone()),
            public_key: integration.public_key.clone(),
            verbose: false,
        }
    }

    // Checked in declaration order; the first gap wins.
    fn require(&self) -> Result<RequiredFields<'_>, ExchangeError> {
        use ExchangeError::MissingField;

        Ok(RequiredFields {
            issuer: present(self.issuer.as_deref()).ok_or(MissingField("issuer"))?,
            subject: present(self.subject.as_deref()).ok_or(MissingField("subject"))?,
            expiration: self.expiration.ok_or(MissingField("expiration"))?,
            metascopes: self
                .metascopes
                .as_deref()
                .filter(|scopes| scopes.iter().any(|s| !s.trim().is_empty()))
                .ok_or(MissingField("metascopes"))?,
            client_id: present(self.client_id.as_deref()).ok_or(MissingField("client_id"))?,
            client_secret: present_secret(self.client_secret.as_ref())
                .ok_or(MissingField("client_secret"))?,
            private_key: present_secret(self.private_key.as_ref())
                .ok_or(MissingField("private_key"))?,
            public_key: present(self.public_key.as_deref()),
        })
    }
}

struct RequiredFields<'a> {
    issuer: &'a str,
    subject: &'a str,
    expiration: i64,
    metascopes: &'a [String],
    client_id: &'a str,
    client_secret: &'a SecretString,
    private_key: &'a SecretString,
    public_key: Option<&'a str>,
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn present_secret(value: Option<&SecretString>) -> Option<&SecretString> {
    value.filter(|v| !v.is_empty())
}

/// Client for the IMS JWT exchange endpoint of one identity host.
///
/// Cheap to clone; clones share the connection pool. Each call to
/// [`exchange`](Self::exchange) makes at most one POST and never retries.
#[derive(Clone)]
pub struct JwtExchangeClient {
    host: String,
    endpoint: String,
    http: HttpClient,
    observer: Arc<dyn ExchangeObserver>,
}

impl fmt::Debug for JwtExchangeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtExchangeClient")
            .field("host", &self.host)
            .field("endpoint", &self.endpoint)
            .field("proxied", &self.http.is_proxied())
            .finish_non_exhaustive()
    }
}

impl JwtExchangeClient {
    /// Start building a client for `host`, e.g. `ims-na1.adobelogin.com`.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> JwtExchangeClientBuilder {
        JwtExchangeClientBuilder {
            host: host.into(),
            http_config: HttpClientConfig::token_exchange(),
            observer: Arc::new(TracingObserver),
        }
    }

    /// Identity host the client was built for.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Full exchange URL.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    #[must_use]
    pub fn is_proxied(&self) -> bool {
        self.http.is_proxied()
    }

    /// Sign an assertion for `request` and trade it for an access token.
    ///
    /// # Errors
    ///
    /// - [`ExchangeError::MissingField`] for the first absent required
    ///   option; nothing is signed or sent
    /// - [`ExchangeError::Signing`] if the private key is unusable
    /// - [`ExchangeError::Transport`] if the host cannot be reached in time
    /// - [`ExchangeError::Exchange`] for any status other than 200
    /// - [`ExchangeError::InvalidResponse`] for a 200 that is not a token
    pub async fn exchange(&self, request: &ExchangeRequest) -> Result<TokenResponse, ExchangeError> {
        let started = Instant::now();
        let result = self.try_exchange(request).await;
        if let Err(error) = &result {
            self.observer.on_error(&ErrorEvent {
                url: Some(&self.endpoint),
                error,
                elapsed: Some(started.elapsed()),
            });
        }
        result
    }

    async fn try_exchange(&self, request: &ExchangeRequest) -> Result<TokenResponse, ExchangeError> {
        let fields = request.require()?;

        let claims = AssertionClaims::new(
            &self.host,
            fields.issuer,
            fields.subject,
            fields.expiration,
            fields.client_id,
            fields.metascopes,
        );
        let token = signer::sign(&claims, fields.private_key)?;

        if let Some(public_key) = fields.public_key {
            self.self_check(&token, public_key, &claims);
        }

        let form = [
            ("client_id", fields.client_id),
            ("client_secret", fields.client_secret.expose()),
            ("jwt_token", token.as_str()),
        ];
        let builder = self
            .http
            .post(&self.endpoint)
            .form(&form)
            .map_err(|e| self.transport_error(&e))?;

        let logged_body = request
            .verbose
            .then(|| redacted_form(fields.client_id, &token));
        self.observer.on_request(&RequestEvent {
            method: builder.method(),
            url: &self.endpoint,
            body: logged_body.as_deref(),
        });

        let sent = Instant::now();
        let response = builder.send().await.map_err(|e| self.transport_error(&e))?;
        let status = response.status();

        if status == StatusCode::OK {
            let body = response.bytes().await.map_err(|e| match e {
                HttpError::BodyTooLarge { .. } => self.invalid_response(e.to_string()),
                other => self.transport_error(&other),
            })?;
            let text = request.verbose.then(|| String::from_utf8_lossy(&body));
            self.report_response(status, sent.elapsed(), text.as_deref());

            return serde_json::from_slice(&body).map_err(|e| self.invalid_response(e.to_string()));
        }

        match response.into_status_error().await {
            HttpError::HttpStatus {
                status,
                body_preview,
                ..
            } => {
                let logged = request.verbose.then_some(body_preview.as_str());
                self.report_response(status, sent.elapsed(), logged);
                Err(ExchangeError::Exchange {
                    url: self.endpoint.clone(),
                    status,
                    body: body_preview,
                })
            }
            other => Err(self.transport_error(&other)),
        }
    }

    fn self_check(&self, token: &str, public_key: &str, claims: &AssertionClaims) {
        let failure = signer::verify(token, public_key, &claims.iss, &claims.aud)
            .err()
            .map(|e| e.to_string());
        self.observer.on_self_check(&SelfCheckEvent {
            issuer: &claims.iss,
            audience: &claims.aud,
            outcome: failure.as_deref().map_or(Ok(()), Err),
        });
    }

    fn report_response(&self, status: StatusCode, elapsed: Duration, body: Option<&str>) {
        self.observer.on_response(&ResponseEvent {
            method: &http::Method::POST,
            url: &self.endpoint,
            status,
            elapsed,
            body,
        });
    }

    fn transport_error(&self, err: &HttpError) -> ExchangeError {
        ExchangeError::Transport {
            url: self.endpoint.clone(),
            message: describe_http_error(err),
        }
    }

    fn invalid_response(&self, message: String) -> ExchangeError {
        ExchangeError::InvalidResponse {
            url: self.endpoint.clone(),
            message,
        }
    }
}

fn redacted_form(client_id: &str, token: &str) -> String {
    serde_urlencoded::to_string([
        ("client_id", client_id),
        ("client_secret", "[REDACTED]"),
        ("jwt_token", token),
    ])
    .unwrap_or_else(|_| "<unencodable form>".to_owned())
}

/// Builder for [`JwtExchangeClient`].
pub struct JwtExchangeClientBuilder {
    host: String,
    http_config: HttpClientConfig,
    observer: Arc<dyn ExchangeObserver>,
}

impl JwtExchangeClientBuilder {
    /// Replace the HTTP channel settings (default:
    /// [`HttpClientConfig::token_exchange`], 10 second timeout).
    #[must_use]
    pub fn http_config(mut self, config: HttpClientConfig) -> Self {
        self.http_config = config;
        self
    }

    /// Route the exchange through a forward proxy.
    #[must_use]
    pub fn proxy(mut self, proxy: ProxyConfig) -> Self {
        self.http_config.proxy = Some(proxy);
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.http_config.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn observer(mut self, observer: Arc<dyn ExchangeObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Talk plain HTTP to the host. Test servers only.
    #[must_use]
    #[cfg(any(debug_assertions, feature = "allow-insecure-http"))]
    pub fn allow_insecure_http(mut self) -> Self {
        self.http_config.transport = TransportSecurity::AllowInsecureHttp;
        self
    }

    /// Build the client.
    ///
    /// The exchange URL uses `https` unless the HTTP settings allow insecure
    /// transport. The audience claim always uses `https`.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::Construction`] if the host is empty or not a
    /// bare `host[:port]`, or the HTTP channel cannot be created (unusable
    /// proxy, TLS initialization failure).
    pub fn build(self) -> Result<JwtExchangeClient, ExchangeError> {
        let host = self.host.trim();
        if host.is_empty() {
            return Err(ExchangeError::Construction("IMS host is required".to_owned()));
        }
        if host.contains('/') || host.contains(char::is_whitespace) {
            return Err(ExchangeError::Construction(format!(
                "IMS host must be a bare host name, got '{host}'"
            )));
        }

        let scheme = if self.http_config.transport == TransportSecurity::AllowInsecureHttp {
            "http"
        } else {
            "https"
        };
        let endpoint = format!("{scheme}://{host}{EXCHANGE_PATH}");

        let http = HttpClientBuilder::with_config(self.http_config)
            .build()
            .map_err(|e| ExchangeError::Construction(describe_http_error(&e)))?;

        tracing::debug!(host, endpoint, proxied = http.is_proxied(), "exchange client ready");

        Ok(JwtExchangeClient {
            host: host.to_owned(),
            endpoint,
            http,
            observer: self.observer,
        })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::observer::NoOpObserver;
    use httpmock::prelude::*;
    use std::sync::Mutex;

    const PRIVATE_KEY: &str = include_str!("../tests/fixtures/private_key.pem");
    const PUBLIC_KEY: &str = include_str!("../tests/fixtures/public_key.pem");
    const OTHER_PUBLIC_KEY: &str = include_str!("../tests/fixtures/other_public_key.pem");

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn push(&self, event: String) {
            self.events.lock().unwrap().push(event);
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl ExchangeObserver for Recorder {
        fn on_request(&self, event: &RequestEvent<'_>) {
            self.push(format!("request {} {}", event.method, event.body.unwrap_or("-")));
        }

        fn on_response(&self, event: &ResponseEvent<'_>) {
            self.push(format!("response {} {}", event.status.as_u16(), event.body.unwrap_or("-")));
        }

        fn on_error(&self, event: &ErrorEvent<'_>) {
            self.push(format!("error {}", event.error.kind()));
        }

        fn on_self_check(&self, event: &SelfCheckEvent<'_>) {
            self.push(format!("self_check {}", event.outcome.is_ok()));
        }
    }

    fn request() -> ExchangeRequest {
        ExchangeRequest {
            issuer: Some("ORG@AdobeOrg".to_owned()),
            subject: Some("tech@techacct.adobe.com".to_owned()),
            expiration: Some(time::OffsetDateTime::now_utc().unix_timestamp() + 3600),
            metascopes: Some(vec!["ent_admin_sdk".to_owned()]),
            client_id: Some("abc".to_owned()),
            client_secret: Some(SecretString::new("s3cr3t")),
            private_key: Some(SecretString::new(PRIVATE_KEY)),
            public_key: None,
            verbose: false,
        }
    }

    fn client_for(server: &MockServer, observer: Arc<dyn ExchangeObserver>) -> JwtExchangeClient {
        JwtExchangeClient::builder(format!("127.0.0.1:{}", server.port()))
            .http_config(HttpClientConfig::for_testing())
            .observer(observer)
            .build()
            .unwrap()
    }

    #[test]
    fn endpoint_uses_https_by_default() {
        let client = JwtExchangeClient::builder("ims-na1.adobelogin.com").build().unwrap();
        assert_eq!(client.endpoint(), "https://ims-na1.adobelogin.com/ims/exchange/jwt");
        assert_eq!(client.host(), "ims-na1.adobelogin.com");
        assert!(!client.is_proxied());
    }

    #[test]
    fn empty_host_is_construction_error() {
        let Err(err) = JwtExchangeClient::builder("  ").build() else {
            panic!("empty host must be rejected");
        };
        assert!(matches!(err, ExchangeError::Construction(_)), "got {err:?}");
    }

    #[test]
    fn host_with_scheme_is_rejected() {
        let result = JwtExchangeClient::builder("https://ims-na1.adobelogin.com").build();
        assert!(matches!(result, Err(ExchangeError::Construction(_))));
    }

    #[test]
    fn proxy_marks_client_proxied() {
        let client = JwtExchangeClient::builder("ims-na1.adobelogin.com")
            .proxy(ProxyConfig::new("proxy.corp", 3128))
            .build()
            .unwrap();
        assert!(client.is_proxied());
        assert!(format!("{client:?}").contains("proxied: true"));
    }

    #[tokio::test]
    async fn missing_options_are_reported_in_order_without_network() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST);
            then.status(200);
        });
        let client = client_for(&server, Arc::new(NoOpObserver));

        let cases: [(&str, fn(&mut ExchangeRequest)); 7] = [
            ("issuer", |r| r.issuer = None),
            ("subject", |r| r.subject = Some(String::new())),
            ("expiration", |r| r.expiration = None),
            ("metascopes", |r| r.metascopes = Some(vec![" ".to_owned()])),
            ("client_id", |r| r.client_id = None),
            ("client_secret", |r| r.client_secret = Some(SecretString::new(""))),
            ("private_key", |r| r.private_key = None),
        ];

        for (name, strip) in cases {
            let mut req = request();
            strip(&mut req);
            let Err(err) = client.exchange(&req).await else {
                panic!("{name} missing must fail");
            };
            assert!(
                matches!(err, ExchangeError::MissingField(field) if field == name),
                "expected {name}, got {err:?}"
            );
        }

        let everything_missing = ExchangeRequest {
            verbose: true,
            ..ExchangeRequest::default()
        };
        let err = client.exchange(&everything_missing).await.unwrap_err();
        assert!(matches!(err, ExchangeError::MissingField("issuer")));

        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn expiration_zero_counts_as_present() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path(EXCHANGE_PATH);
            then.status(200).json_body(serde_json::json!({ "access_token": "tok" }));
        });
        let client = client_for(&server, Arc::new(NoOpObserver));

        let mut req = request();
        req.expiration = Some(0);
        let token = client.exchange(&req).await.unwrap();
        assert_eq!(token.access_token, "tok");
        mock.assert();
    }

    #[tokio::test]
    async fn success_posts_form_once() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path(EXCHANGE_PATH)
                .header("content-type", "application/x-www-form-urlencoded")
                .body_includes("client_id=abc")
                .body_includes("client_secret=s3cr3t")
                .body_includes("jwt_token=");
            then.status(200).json_body(serde_json::json!({
                "token_type": "bearer",
                "access_token": "eyJ",
                "expires_in": 86_399_999
            }));
        });
        let client = client_for(&server, Arc::new(NoOpObserver));

        let token = client.exchange(&request()).await.unwrap();
        assert_eq!(token.access_token, "eyJ");
        assert_eq!(token.token_type.as_deref(), Some("bearer"));
        assert_eq!(token.expires_in, Some(86_399_999));
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn non_200_is_exchange_error_with_body() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path(EXCHANGE_PATH);
            then.status(400)
                .body(r#"{"error":"invalid_token","error_description":"JWT token is incorrectly formatted"}"#);
        });
        let recorder = Arc::new(Recorder::default());
        let client = client_for(&server, recorder.clone());

        let Err(err) = client.exchange(&request()).await else {
            panic!("400 must fail");
        };
        let ExchangeError::Exchange { status, body, url } = &err else {
            panic!("expected Exchange, got {err:?}");
        };
        assert_eq!(*status, StatusCode::BAD_REQUEST);
        assert!(body.contains("invalid_token"));
        assert!(url.ends_with(EXCHANGE_PATH));
        assert_eq!(mock.calls(), 1);

        let events = recorder.events();
        assert_eq!(events, vec!["request POST -", "response 400 -", "error exchange"]);
    }

    #[tokio::test]
    async fn other_2xx_is_not_success() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path(EXCHANGE_PATH);
            then.status(201).json_body(serde_json::json!({ "access_token": "tok" }));
        });
        let client = client_for(&server, Arc::new(NoOpObserver));

        let err = client.exchange(&request()).await.unwrap_err();
        assert!(
            matches!(err, ExchangeError::Exchange { status, .. } if status == StatusCode::CREATED),
            "got {err:?}"
        );
    }

    #[tokio::test]
    async fn unparseable_200_is_invalid_response() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path(EXCHANGE_PATH);
            then.status(200).body("<html>maintenance</html>");
        });
        let client = client_for(&server, Arc::new(NoOpObserver));

        let err = client.exchange(&request()).await.unwrap_err();
        assert!(matches!(err, ExchangeError::InvalidResponse { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn failed_self_check_still_submits() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path(EXCHANGE_PATH);
            then.status(200).json_body(serde_json::json!({ "access_token": "tok" }));
        });
        let recorder = Arc::new(Recorder::default());
        let client = client_for(&server, recorder.clone());

        let mut req = request();
        req.public_key = Some(OTHER_PUBLIC_KEY.to_owned());
        client.exchange(&req).await.unwrap();
        mock.assert();

        let events = recorder.events();
        assert_eq!(events.first().map(String::as_str), Some("self_check false"));
    }

    #[tokio::test]
    async fn matching_public_key_passes_self_check() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path(EXCHANGE_PATH);
            then.status(200).json_body(serde_json::json!({ "access_token": "tok" }));
        });
        let recorder = Arc::new(Recorder::default());
        let client = client_for(&server, recorder.clone());

        let mut req = request();
        req.public_key = Some(PUBLIC_KEY.to_owned());
        client.exchange(&req).await.unwrap();

        assert!(recorder.events().contains(&"self_check true".to_owned()));
    }

    #[tokio::test]
    async fn verbose_bodies_hide_client_secret() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path(EXCHANGE_PATH);
            then.status(200).json_body(serde_json::json!({ "access_token": "tok" }));
        });
        let recorder = Arc::new(Recorder::default());
        let client = client_for(&server, recorder.clone());

        let mut req = request();
        req.verbose = true;
        client.exchange(&req).await.unwrap();

        let events = recorder.events();
        let request_event = events.iter().find(|e| e.starts_with("request")).unwrap();
        assert!(request_event.contains("client_id=abc"), "{request_event}");
        assert!(request_event.contains("client_secret=%5BREDACTED%5D"), "{request_event}");
        assert!(!request_event.contains("s3cr3t"), "{request_event}");

        let response_event = events.iter().find(|e| e.starts_with("response")).unwrap();
        assert!(response_event.contains("access_token"), "{response_event}");
    }

    #[tokio::test]
    async fn tracing_output_never_contains_client_secret() {
        use tracing_subscriber::layer::SubscriberExt;

        #[derive(Clone, Default)]
        struct Capture {
            lines: Arc<Mutex<Vec<String>>>,
        }

        impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for Capture {
            fn on_event(
                &self,
                event: &tracing::Event<'_>,
                _ctx: tracing_subscriber::layer::Context<'_, S>,
            ) {
                let mut visitor = FieldVisitor(Vec::new());
                event.record(&mut visitor);
                self.lines.lock().unwrap().push(visitor.0.join(" "));
            }
        }

        struct FieldVisitor(Vec<String>);
        impl tracing::field::Visit for FieldVisitor {
            fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
                self.0.push(format!("{}={value:?}", field.name()));
            }
        }

        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path(EXCHANGE_PATH);
            then.status(400).body(r#"{"error":"invalid_client"}"#);
        });

        let capture = Capture::default();
        let lines = capture.lines.clone();
        let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(capture));

        let client = client_for(&server, Arc::new(TracingObserver));
        let mut req = request();
        req.verbose = true;
        req.public_key = Some(OTHER_PUBLIC_KEY.to_owned());
        client.exchange(&req).await.unwrap_err();

        let lines = lines.lock().unwrap();
        assert!(lines.iter().any(|l| l.contains("client_secret=%5BREDACTED%5D")), "{lines:?}");
        assert!(lines.iter().any(|l| l.contains("invalid_client")), "{lines:?}");
        assert!(lines.iter().all(|l| !l.contains("s3cr3t")), "secret leaked: {lines:?}");
        assert!(lines.iter().all(|l| !l.contains("BEGIN PRIVATE KEY")), "key leaked");
    }

    #[tokio::test]
    async fn broken_private_key_fails_before_network() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST);
            then.status(200);
        });
        let client = client_for(&server, Arc::new(NoOpObserver));

        let mut req = request();
        req.private_key = Some(SecretString::new("not a pem"));
        let err = client.exchange(&req).await.unwrap_err();
        assert!(matches!(err, ExchangeError::Signing(_)), "got {err:?}");
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn unreachable_host_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = JwtExchangeClient::builder(addr.to_string())
            .http_config(HttpClientConfig::for_testing())
            .observer(Arc::new(NoOpObserver))
            .build()
            .unwrap();

        let err = client.exchange(&request()).await.unwrap_err();
        let ExchangeError::Transport { url, message } = &err else {
            panic!("expected Transport, got {err:?}");
        };
        assert_eq!(url, &format!("http://{addr}{EXCHANGE_PATH}"));
        assert!(!message.is_empty());
    }

    #[tokio::test]
    async fn stalled_token_body_times_out_as_transport_error() {
        use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hold = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(socket);
            let mut line = String::new();
            while reader.read_line(&mut line).await.unwrap() > 2 {
                line.clear();
            }
            reader
                .get_mut()
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 100\r\n\r\n{\"access")
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
        });

        let recorder = Arc::new(Recorder::default());
        let client = JwtExchangeClient::builder(addr.to_string())
            .http_config(HttpClientConfig::for_testing())
            .timeout(Duration::from_millis(300))
            .observer(recorder.clone())
            .build()
            .unwrap();

        let outcome = tokio::time::timeout(Duration::from_secs(5), client.exchange(&request()))
            .await
            .expect("exchange must finish within its own timeout");
        let Err(err) = outcome else {
            panic!("a stalled body must not produce a token");
        };
        let ExchangeError::Transport { message, .. } = &err else {
            panic!("expected Transport, got {err:?}");
        };
        assert!(message.contains("timed out"), "{message}");
        assert_eq!(recorder.events().last().map(String::as_str), Some("error transport"));
        hold.abort();
    }

    #[test]
    fn for_integration_copies_every_field() {
        let integration = ValidatedIntegration {
            org: "ORG@AdobeOrg".to_owned(),
            technical_account_id: "tech@techacct.adobe.com".to_owned(),
            client_id: "abc".to_owned(),
            client_secret: SecretString::new("s3cr3t"),
            metascopes: vec!["ent_admin_sdk".to_owned()],
            private_key: SecretString::new(PRIVATE_KEY),
            public_key: Some(PUBLIC_KEY.to_owned()),
            ims_endpoint: "ims-na1.adobelogin.com".to_owned(),
            proxy: None,
        };
        let req = ExchangeRequest::for_integration(&integration, 42);
        assert_eq!(req.expiration, Some(42));
        assert_eq!(req.issuer.as_deref(), Some("ORG@AdobeOrg"));
        assert_eq!(req.subject.as_deref(), Some("tech@techacct.adobe.com"));
        assert!(req.public_key.is_some());
        assert!(!req.verbose);
        assert!(req.require().is_ok());
    }

    #[test]
    fn client_is_send_sync_clone() {
        fn assert_traits<T: Send + Sync + Clone>() {}
        assert_traits::<JwtExchangeClient>();
    }
}

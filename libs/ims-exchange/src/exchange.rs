use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use ims_http::HttpClientConfig;

use crate::claims::{Clock, DEFAULT_VALIDITY, SystemClock, expiration_after};
use crate::client::{ExchangeRequest, JwtExchangeClient};
use crate::config::IntegrationConfig;
use crate::error::ExchangeError;
use crate::observer::{ErrorEvent, ExchangeObserver, TracingObserver};
use crate::token::TokenResponse;

/// Knobs for [`exchange_with`].
#[derive(Clone)]
pub struct ExchangeOptions {
    /// Time source for `exp` (default: system clock)
    pub clock: Arc<dyn Clock>,
    /// Assertion lifetime (default: 8 hours)
    pub validity: Duration,
    /// Lifecycle hooks (default: [`TracingObserver`])
    pub observer: Arc<dyn ExchangeObserver>,
    /// HTTP channel settings (default: [`HttpClientConfig::token_exchange`]).
    /// A proxy in the integration document overrides the one set here.
    pub http_config: HttpClientConfig,
    /// Hand request and response bodies to the observer
    pub verbose: bool,
}

impl Default for ExchangeOptions {
    fn default() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            validity: DEFAULT_VALIDITY,
            observer: Arc::new(TracingObserver),
            http_config: HttpClientConfig::token_exchange(),
            verbose: false,
        }
    }
}

impl fmt::Debug for ExchangeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExchangeOptions")
            .field("validity", &self.validity)
            .field("http_config", &self.http_config)
            .field("verbose", &self.verbose)
            .finish_non_exhaustive()
    }
}

/// Validate `config` and exchange an eight-hour assertion for an access
/// token.
///
/// # Errors
///
/// See [`exchange_with`].
pub async fn exchange(config: &IntegrationConfig) -> Result<TokenResponse, ExchangeError> {
    exchange_with(config, &ExchangeOptions::default()).await
}

/// Validate `config`, build a client for its IMS endpoint (through its
/// proxy, if any) and perform one exchange.
///
/// # Errors
///
/// Returns [`ExchangeError::Configuration`] listing every missing path when
/// validation fails; nothing is sent in that case. Otherwise returns
/// whatever [`JwtExchangeClient::exchange`] returns.
pub async fn exchange_with(
    config: &IntegrationConfig,
    options: &ExchangeOptions,
) -> Result<TokenResponse, ExchangeError> {
    let report = |error: &ExchangeError| {
        options.observer.on_error(&ErrorEvent {
            url: None,
            error,
            elapsed: None,
        });
    };

    let integration = config.validate().inspect_err(report)?;

    let mut builder = JwtExchangeClient::builder(integration.ims_endpoint.as_str())
        .http_config(options.http_config.clone())
        .observer(Arc::clone(&options.observer));
    if let Some(proxy) = integration.proxy.clone() {
        builder = builder.proxy(proxy);
    }
    let client = builder.build().inspect_err(report)?;

    let expiration = expiration_after(options.clock.as_ref(), options.validity).inspect_err(report)?;
    let request = ExchangeRequest {
        verbose: options.verbose,
        ..ExchangeRequest::for_integration(&integration, expiration)
    };

    client.exchange(&request).await
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::claims::FixedClock;
    use crate::client::EXCHANGE_PATH;
    use crate::observer::NoOpObserver;
    use httpmock::prelude::*;
    use serde_json::json;

    const PRIVATE_KEY: &str = include_str!("../tests/fixtures/private_key.pem");

    fn config_for(host: &str) -> IntegrationConfig {
        serde_json::from_value(json!({
            "integration": {
                "org": "ORG@AdobeOrg",
                "id": "tech@techacct.adobe.com",
                "technicalAccount": { "clientId": "abc", "clientSecret": "s3cr3t" },
                "metascopes": "ent_admin_sdk",
                "privateKey": PRIVATE_KEY,
                "imsEndpoint": host
            }
        }))
        .unwrap()
    }

    fn testing_options() -> ExchangeOptions {
        ExchangeOptions {
            observer: Arc::new(NoOpObserver),
            http_config: HttpClientConfig::for_testing(),
            ..ExchangeOptions::default()
        }
    }

    #[test]
    fn defaults() {
        let options = ExchangeOptions::default();
        assert_eq!(options.validity, Duration::from_secs(8 * 3600));
        assert_eq!(options.http_config.request_timeout, Duration::from_secs(10));
        assert!(!options.verbose);
        assert!(format!("{options:?}").contains("validity"));
    }

    #[tokio::test]
    async fn invalid_config_lists_paths_and_sends_nothing() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST);
            then.status(200);
        });

        let config: IntegrationConfig = serde_json::from_value(json!({
            "integration": { "org": "ORG@AdobeOrg" }
        }))
        .unwrap();

        let Err(err) = exchange_with(&config, &testing_options()).await else {
            panic!("incomplete config must fail");
        };
        let ExchangeError::Configuration { missing } = &err else {
            panic!("expected Configuration, got {err:?}");
        };
        assert_eq!(
            missing,
            &[
                "integration.id",
                "integration.technicalAccount.clientId",
                "integration.technicalAccount.clientSecret",
                "integration.metascopes",
                "integration.privateKey",
                "integration.imsEndpoint",
            ]
        );
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn valid_config_exchanges_once() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path(EXCHANGE_PATH)
                .body_includes("client_id=abc");
            then.status(200)
                .json_body(json!({ "token_type": "bearer", "access_token": "eyJ", "expires_in": 86_399_999 }));
        });

        let config = config_for(&format!("127.0.0.1:{}", server.port()));
        let options = ExchangeOptions {
            clock: Arc::new(FixedClock(time::OffsetDateTime::now_utc())),
            ..testing_options()
        };

        let token = exchange_with(&config, &options).await.unwrap();
        assert_eq!(token.access_token, "eyJ");
        mock.assert();
    }

    #[tokio::test]
    async fn oversized_validity_fails_before_sending() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST);
            then.status(200);
        });

        let config = config_for(&format!("127.0.0.1:{}", server.port()));
        let options = ExchangeOptions {
            validity: Duration::MAX,
            ..testing_options()
        };

        let err = exchange_with(&config, &options).await.unwrap_err();
        assert!(matches!(err, ExchangeError::Construction(_)), "got {err:?}");
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn rejected_exchange_surfaces_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path(EXCHANGE_PATH);
            then.status(401).body(r#"{"error":"invalid_client"}"#);
        });

        let config = config_for(&format!("127.0.0.1:{}", server.port()));
        let err = exchange_with(&config, &testing_options()).await.unwrap_err();
        assert!(
            matches!(&err, ExchangeError::Exchange { status, body, .. }
                if status.as_u16() == 401 && body.contains("invalid_client")),
            "got {err:?}"
        );
    }
}

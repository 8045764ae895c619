//! Integration descriptor and its validator.
//!
//! The descriptor mirrors the JSON document downloaded from the developer
//! console. Every leaf is optional at the type level so that a partial file
//! deserializes cleanly and [`IntegrationConfig::missing_fields`] can report
//! all gaps at once.

use std::fmt;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized};
use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;
use thiserror::Error;

use crate::claims::parse_metascopes;
use crate::error::ExchangeError;
use crate::secret::SecretString;

/// Prefix for environment overrides, e.g.
/// `IMS_EXCHANGE_INTEGRATION__IMSENDPOINT=ims-na1-stg1.adobelogin.com`.
pub const ENV_PREFIX: &str = "IMS_EXCHANGE_";

/// Top-level integration document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IntegrationConfig {
    #[serde(default)]
    pub integration: Option<Integration>,
    #[serde(default)]
    pub proxy: Option<ProxySettings>,
}

/// The `integration` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Integration {
    /// Issuer organization, e.g. `ORG@AdobeOrg`
    #[serde(default, deserialize_with = "optional_text")]
    pub org: Option<String>,
    /// Technical account identifier, e.g. `tech@techacct.adobe.com`
    #[serde(default, deserialize_with = "optional_text")]
    pub id: Option<String>,
    #[serde(default)]
    pub technical_account: Option<TechnicalAccount>,
    /// Comma-separated metascope names
    #[serde(default, deserialize_with = "optional_text")]
    pub metascopes: Option<String>,
    /// PEM-encoded RSA private key
    #[serde(default)]
    pub private_key: Option<SecretString>,
    /// PEM-encoded RSA public key, only used for the local self-check
    #[serde(default, deserialize_with = "optional_text")]
    pub public_key: Option<String>,
    /// Identity host name, e.g. `ims-na1.adobelogin.com`
    #[serde(default, deserialize_with = "optional_text")]
    pub ims_endpoint: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicalAccount {
    #[serde(default, deserialize_with = "optional_text")]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<SecretString>,
}

/// Forward proxy routing for every request to the identity host.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProxySettings {
    #[serde(default, deserialize_with = "optional_text")]
    pub host: Option<String>,
    #[serde(default, deserialize_with = "optional_port")]
    pub port: Option<u16>,
}

/// An integration that passed validation, with owned values ready for the
/// exchange.
#[derive(Debug, Clone)]
pub struct ValidatedIntegration {
    pub org: String,
    pub technical_account_id: String,
    pub client_id: String,
    pub client_secret: SecretString,
    /// Trimmed, de-duplicated metascope names
    pub metascopes: Vec<String>,
    pub private_key: SecretString,
    pub public_key: Option<String>,
    pub ims_endpoint: String,
    pub proxy: Option<ims_http::ProxyConfig>,
}

/// Failure to read or parse an integration file.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("cannot read integration file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid integration file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: Box<figment::Error>,
    },
}

type Accessor = fn(&IntegrationConfig) -> Option<&str>;

/// Required string paths, in reporting order.
const REQUIRED_FIELDS: [(&str, Accessor); 7] = [
    ("integration.org", IntegrationConfig::org),
    ("integration.id", IntegrationConfig::technical_account_id),
    ("integration.technicalAccount.clientId", IntegrationConfig::client_id),
    (
        "integration.technicalAccount.clientSecret",
        IntegrationConfig::client_secret,
    ),
    ("integration.metascopes", IntegrationConfig::metascopes),
    ("integration.privateKey", IntegrationConfig::private_key),
    ("integration.imsEndpoint", IntegrationConfig::ims_endpoint),
];

/// Turn `INTEGRATION__TECHNICALACCOUNT__CLIENTID` into
/// `integration.technicalAccount.clientId`.
fn env_key_path(key: &str) -> String {
    key.split("__")
        .map(|segment| {
            let segment = segment.to_ascii_lowercase();
            match segment.as_str() {
                "technicalaccount" => "technicalAccount".to_owned(),
                "clientid" => "clientId".to_owned(),
                "clientsecret" => "clientSecret".to_owned(),
                "privatekey" => "privateKey".to_owned(),
                "publickey" => "publicKey".to_owned(),
                "imsendpoint" => "imsEndpoint".to_owned(),
                _ => segment,
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}

fn is_missing(value: Option<&str>) -> bool {
    value.is_none_or(str::is_empty)
}

/// Visitor keeping the text of any scalar: ids and secrets that look like
/// numbers or booleans stay strings.
pub(crate) struct ScalarText;

impl Visitor<'_> for ScalarText {
    type Value = String;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a string, number or boolean")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<String, E> {
        Ok(v.to_owned())
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<String, E> {
        Ok(v)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<String, E> {
        Ok(v.to_string())
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<String, E> {
        Ok(v.to_string())
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<String, E> {
        Ok(v.to_string())
    }

    fn visit_i128<E: de::Error>(self, v: i128) -> Result<String, E> {
        Ok(v.to_string())
    }

    fn visit_u128<E: de::Error>(self, v: u128) -> Result<String, E> {
        Ok(v.to_string())
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<String, E> {
        Ok(v.to_string())
    }
}

struct Text(String);

impl<'de> Deserialize<'de> for Text {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ScalarText).map(Text)
    }
}

fn optional_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<Text>::deserialize(deserializer)?.map(|text| text.0))
}

/// Port as a JSON number or a numeric string (environment overrides).
struct Port(u16);

impl<'de> Deserialize<'de> for Port {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = deserializer.deserialize_any(ScalarText)?;
        text.trim()
            .parse()
            .map(Port)
            .map_err(|_| de::Error::invalid_value(de::Unexpected::Str(&text), &"a port number (0-65535)"))
    }
}

fn optional_port<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u16>, D::Error> {
    Ok(Option::<Port>::deserialize(deserializer)?.map(|port| port.0))
}

impl IntegrationConfig {
    /// Load a JSON integration file, then merge `IMS_EXCHANGE_*` environment
    /// overrides on top (`__` separates nested keys).
    ///
    /// No validation happens here; call [`validate`](Self::validate).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigLoadError`] if the file cannot be read or the merged
    /// document does not have the expected shape.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigLoadError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigLoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        // Env values are merged as raw strings; typed parsing would turn a
        // client id like `0123` into the integer 123.
        Env::prefixed(ENV_PREFIX)
            .iter()
            .fold(Figment::new().merge(Json::string(&raw)), |figment, (key, value)| {
                figment.merge(Serialized::default(&env_key_path(key.as_str()), value))
            })
            .extract()
            .map_err(|e| ConfigLoadError::Parse {
                path: path.to_path_buf(),
                source: Box::new(e),
            })
    }

    fn org(&self) -> Option<&str> {
        self.integration.as_ref()?.org.as_deref()
    }

    fn technical_account_id(&self) -> Option<&str> {
        self.integration.as_ref()?.id.as_deref()
    }

    fn client_id(&self) -> Option<&str> {
        self.integration
            .as_ref()?
            .technical_account
            .as_ref()?
            .client_id
            .as_deref()
    }

    fn client_secret(&self) -> Option<&str> {
        self.integration
            .as_ref()?
            .technical_account
            .as_ref()?
            .client_secret
            .as_ref()
            .map(SecretString::expose)
    }

    fn metascopes(&self) -> Option<&str> {
        self.integration.as_ref()?.metascopes.as_deref()
    }

    fn private_key(&self) -> Option<&str> {
        self.integration
            .as_ref()?
            .private_key
            .as_ref()
            .map(SecretString::expose)
    }

    fn public_key(&self) -> Option<&str> {
        self.integration.as_ref()?.public_key.as_deref()
    }

    fn ims_endpoint(&self) -> Option<&str> {
        self.integration.as_ref()?.ims_endpoint.as_deref()
    }

    /// Every required dotted path that is absent or empty.
    ///
    /// An absent parent marks all of its children missing. `proxy.host` and
    /// `proxy.port` are only required when a `proxy` section is present; a
    /// port of zero counts as set.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing: Vec<&'static str> = REQUIRED_FIELDS
            .iter()
            .filter(|(_, get)| is_missing(get(self)))
            .map(|(path, _)| *path)
            .collect();

        if let Some(proxy) = &self.proxy {
            if is_missing(proxy.host.as_deref()) {
                missing.push("proxy.host");
            }
            if proxy.port.is_none() {
                missing.push("proxy.port");
            }
        }

        missing
    }

    /// Check the descriptor and copy out the values the exchange needs.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::Configuration`] naming every missing path.
    pub fn validate(&self) -> Result<ValidatedIntegration, ExchangeError> {
        let missing = self.missing_fields();
        if !missing.is_empty() {
            return Err(ExchangeError::Configuration { missing });
        }

        let (
            Some(org),
            Some(technical_account_id),
            Some(client_id),
            Some(client_secret),
            Some(metascopes),
            Some(private_key),
            Some(ims_endpoint),
        ) = (
            self.org(),
            self.technical_account_id(),
            self.client_id(),
            self.client_secret(),
            self.metascopes(),
            self.private_key(),
            self.ims_endpoint(),
        )
        else {
            return Err(ExchangeError::Configuration { missing });
        };

        let proxy = self.proxy.as_ref().and_then(|p| {
            p.host
                .as_deref()
                .zip(p.port)
                .map(|(host, port)| ims_http::ProxyConfig::new(host, port))
        });

        Ok(ValidatedIntegration {
            org: org.to_owned(),
            technical_account_id: technical_account_id.to_owned(),
            client_id: client_id.to_owned(),
            client_secret: SecretString::new(client_secret),
            metascopes: parse_metascopes(metascopes),
            private_key: SecretString::new(private_key),
            public_key: self
                .public_key()
                .filter(|k| !k.is_empty())
                .map(str::to_owned),
            ims_endpoint: ims_endpoint.to_owned(),
            proxy,
        })
    }
}

//! Explicit configuration for the upstream client and the proxy.
//!
//! Nothing here is global: values are resolved once, when a config value is
//! built, and then handed to constructors.

use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::PersonaError;

/// Environment variable consulted when no API key is given explicitly.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1/";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_PROXY_PORT: u16 = 443;
const DEFAULT_BIND_ADDR: &str = "0.0.0.0";

/// Connection settings for the upstream completion service.
#[derive(Clone, Debug, Deserialize)]
pub struct ClientConfig {
    /// Bearer token sent to the upstream
    pub api_key: SecretString,
    /// API base, e.g. `https://api.openai.com/v1/`
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
    /// Accept any TLS certificate from the upstream
    #[serde(default)]
    pub disable_host_verify: bool,
    /// Model used when a persona is initialized without one
    #[serde(default = "default_model")]
    pub default_model: String,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            base_url: default_base_url(),
            timeout_seconds: None,
            disable_host_verify: false,
            default_model: default_model(),
        }
    }

    /// Resolves the API key from the argument or, failing that, from
    /// `OPENAI_API_KEY`.
    pub fn from_env(base_url: Option<&str>, api_key: Option<&str>) -> Result<Self, PersonaError> {
        let key = match api_key.filter(|k| !k.is_empty()) {
            Some(key) => key.to_string(),
            None => std::env::var(API_KEY_ENV)
                .ok()
                .filter(|k| !k.is_empty())
                .ok_or_else(|| PersonaError::AuthError(format!("{API_KEY_ENV} not found")))?,
        };
        let mut config = Self::new(key);
        if let Some(url) = base_url.filter(|u| !u.is_empty()) {
            config.base_url = url.to_string();
        }
        Ok(config)
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    pub fn disable_host_verify(mut self, disable: bool) -> Self {
        self.disable_host_verify = disable;
        self
    }

    pub fn default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub(crate) fn key(&self) -> &str {
        self.api_key.expose_secret()
    }
}

/// Listener settings for the reverse proxy.
#[derive(Clone, Debug, Deserialize)]
pub struct ProxyConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// When set, clients must send `Authorization: Bearer <auth_key>`
    #[serde(default)]
    pub auth_key: Option<String>,
    /// Pretty-print every exchange through the logging observer
    #[serde(default)]
    pub log_exchanges: bool,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            port: DEFAULT_PROXY_PORT,
            auth_key: None,
            log_exchanges: false,
        }
    }
}

impl ProxyConfig {
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

/// Top-level configuration file.
///
/// ```toml
/// [client]
/// base_url = "https://api.openai.com/v1/"
/// timeout_seconds = 60
///
/// [proxy]
/// port = 8443
/// log_exchanges = true
/// ```
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub client: ClientConfig,
    pub proxy: ProxyConfig,
}

#[derive(Debug, Default, Deserialize)]
struct RawAppConfig {
    #[serde(default)]
    client: RawClientConfig,
    #[serde(default)]
    proxy: ProxyConfig,
}

#[derive(Debug, Default, Deserialize)]
struct RawClientConfig {
    api_key: Option<String>,
    base_url: Option<String>,
    timeout_seconds: Option<u64>,
    #[serde(default)]
    disable_host_verify: bool,
    default_model: Option<String>,
}

impl AppConfig {
    /// Parses a TOML document. A missing `client.api_key` falls back to the
    /// environment.
    pub fn from_toml_str(contents: &str) -> Result<Self, PersonaError> {
        let raw: RawAppConfig = toml::from_str(contents)?;
        let client = raw.client;
        let mut config = ClientConfig::from_env(client.base_url.as_deref(), client.api_key.as_deref())?
            .disable_host_verify(client.disable_host_verify);
        config.timeout_seconds = client.timeout_seconds;
        if let Some(model) = client.default_model {
            config.default_model = model;
        }
        Ok(Self {
            client: config,
            proxy: raw.proxy,
        })
    }

    /// Loads `path`; a missing file behaves like an empty document.
    pub fn load(path: &Path) -> Result<Self, PersonaError> {
        match fs::read_to_string(path) {
            Ok(contents) => Self::from_toml_str(&contents),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("no config at {}, using defaults", path.display());
                Self::from_toml_str("")
            }
            Err(err) => Err(PersonaError::ConfigError(format!(
                "reading {}: {err}",
                path.display()
            ))),
        }
    }

    /// `~/.gpeasy/config.toml`
    pub fn default_path() -> Result<PathBuf, PersonaError> {
        let home = dirs::home_dir()
            .ok_or_else(|| PersonaError::ConfigError("could not find home directory".into()))?;
        Ok(home.join(".gpeasy").join("config.toml"))
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_bind_addr() -> String {
    DEFAULT_BIND_ADDR.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PROXY_PORT
}

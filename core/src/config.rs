//! Configuration loading and default option resolution.
//!
//! Sources are merged in this order (later sources override earlier):
//! 1. `GuzzleConfig::default()`
//! 2. a TOML file (explicit path, or `config/guzzle.toml` if it exists)
//! 3. environment variables prefixed with `GUZZLE_`, nested keys joined
//!    with `__` (e.g. `GUZZLE_AUTH__USERNAME`)
//!
//! String settings (the base URI and the credentials) accept any scalar.
//! Their environment values are taken verbatim, so `GUZZLE_AUTH__PASSWORD=007`
//! stays `"007"` instead of going through figment's number parsing.

use std::fs;
use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::Result;
use crate::options::{AuthSpec, OptionMap, BASE_URI, VERIFY};

/// Environment variable prefix for every setting.
pub const ENV_PREFIX: &str = "GUZZLE_";
/// File name of the configuration file.
pub const CONFIG_FILENAME: &str = "guzzle.toml";
/// Directory, relative to the working directory, searched for the file.
pub const CONFIG_DIR: &str = "config";
/// The bundled default configuration file.
pub const DEFAULT_CONFIG: &str = include_str!("../config/guzzle.toml");

/// Keys whose environment values are read as plain strings.
const STRING_KEYS: [&str; 4] = ["base_uri", "auth.username", "auth.password", "auth.method"];

/// Settings read from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuzzleConfig {
    #[serde(deserialize_with = "scalar_as_string")]
    pub base_uri: Option<String>,
    pub verify_cert: bool,
    pub auth: AuthConfig,
}

impl Default for GuzzleConfig {
    fn default() -> Self {
        Self {
            base_uri: None,
            verify_cert: true,
            auth: AuthConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    #[serde(deserialize_with = "scalar_as_string")]
    pub username: Option<String>,
    #[serde(deserialize_with = "scalar_as_string")]
    pub password: Option<String>,
    #[serde(deserialize_with = "scalar_as_string")]
    pub method: Option<String>,
}

/// Accept a string, number or boolean and keep its textual form.
fn scalar_as_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Signed(i64),
        Unsigned(u64),
        Float(f64),
        Flag(bool),
    }

    Ok(Option::<Scalar>::deserialize(deserializer)?.map(|scalar| match scalar {
        Scalar::Text(text) => text,
        Scalar::Signed(n) => n.to_string(),
        Scalar::Unsigned(n) => n.to_string(),
        Scalar::Float(n) => n.to_string(),
        Scalar::Flag(b) => b.to_string(),
    }))
}

/// Loads [`GuzzleConfig`] from defaults, a TOML file and the environment.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
    env_prefix: String,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            config_path: None,
            env_prefix: ENV_PREFIX.to_string(),
        }
    }

    pub fn with_config_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_env_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    pub fn load(&self) -> Result<GuzzleConfig> {
        let mut figment = Figment::new().merge(Serialized::defaults(GuzzleConfig::default()));

        match &self.config_path {
            Some(path) if path.exists() => {
                info!(path = %path.display(), "loading configuration file");
                figment = figment.merge(Toml::file(path));
            }
            Some(path) => {
                info!(path = %path.display(), "configuration file not found, skipping");
            }
            None => {
                let default_path = Path::new(CONFIG_DIR).join(CONFIG_FILENAME);
                if default_path.exists() {
                    info!(path = %default_path.display(), "loading configuration file");
                    figment = figment.merge(Toml::file(default_path));
                }
            }
        }

        figment = figment.merge(Env::prefixed(&self.env_prefix).split("__"));
        for key in STRING_KEYS {
            let var = format!("{}{}", self.env_prefix, key.replace('.', "__")).to_uppercase();
            if let Ok(raw) = std::env::var(&var) {
                figment = figment.merge(Serialized::default(key, raw));
            }
        }

        let config: GuzzleConfig = figment.extract()?;
        debug!(
            base_uri = config.base_uri.as_deref().unwrap_or(""),
            verify_cert = config.verify_cert,
            has_auth = config.auth.username.is_some() || config.auth.password.is_some(),
            "configuration loaded"
        );
        Ok(config)
    }
}

/// Turn configuration into client options, request options and optional
/// credentials. Credentials are returned separately; the caller merges them.
pub fn resolve_defaults(config: &GuzzleConfig) -> (OptionMap, OptionMap, Option<AuthSpec>) {
    let mut client_options = OptionMap::new();
    if let Some(base_uri) = config.base_uri.as_deref().filter(|uri| !uri.is_empty()) {
        client_options.insert(BASE_URI.to_string(), Value::String(base_uri.to_string()));
    }

    let mut request_options = OptionMap::new();
    request_options.insert(VERIFY.to_string(), Value::Bool(config.verify_cert));

    let username = config.auth.username.as_deref().unwrap_or_default();
    let password = config.auth.password.as_deref().unwrap_or_default();
    let auth = (!username.is_empty() || !password.is_empty())
        .then(|| AuthSpec::new(username, password, config.auth.method.as_deref()));

    (client_options, request_options, auth)
}

/// Write the bundled default configuration into `dir`, creating the
/// directory. An existing file is left alone and `None` is returned.
pub fn publish_default_config<P: AsRef<Path>>(dir: P) -> Result<Option<PathBuf>> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;
    let path = dir.join(CONFIG_FILENAME);
    if path.exists() {
        info!(path = %path.display(), "configuration already published");
        return Ok(None);
    }
    fs::write(&path, DEFAULT_CONFIG)?;
    info!(path = %path.display(), "published default configuration");
    Ok(Some(path))
}

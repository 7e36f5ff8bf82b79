//! Settings — loaded from a TOML file or from the environment.
//!
//! The file carries `[aaisp]`, `[mqtt]` and an optional `[homeassistant]`
//! section. Without a file every value comes from environment variables
//! (`AAISP_USERNAME`, `MQTT_BROKER`, ...), with the same defaults.
//!
//! Passwords are held in [`Secret`], which is zeroized on drop and
//! redacted in `Debug` output.

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

pub const DEFAULT_MQTT_PORT: u16 = 1883;
pub const DEFAULT_TOPIC_PREFIX: &str = "aaisp";
pub const DEFAULT_DISCOVERY_PREFIX: &str = "homeassistant";
const DEFAULT_ENV_BROKER: &str = "localhost";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file {0} does not exist")]
    NotFound(PathBuf),

    #[error("failed to read configuration file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("sections are missing from the configuration file: {}", .0.join(","))]
    MissingSections(Vec<&'static str>),

    #[error("username or password missing for AAISP")]
    MissingCredentials,

    #[error("invalid MQTT_PORT {0:?}")]
    InvalidPort(String),
}

// ── Secrets ─────────────────────────────────────────────────────────

/// A password that never prints and is wiped when dropped.
#[derive(Clone, PartialEq, Eq, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// The secret as `*` repeated to its length, for log lines.
    pub fn masked(&self) -> String {
        "*".repeat(self.0.chars().count())
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

// ── Settings ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AaispCredentials {
    pub username: String,
    pub password: Secret,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MqttSettings {
    pub broker: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<Secret>,
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,
}

impl MqttSettings {
    /// Username and password, only when both are set.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some((user.as_str(), pass.expose())),
            _ => None,
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.broker, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HomeAssistantSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_discovery_prefix")]
    pub discovery_prefix: String,
}

impl Default for HomeAssistantSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            discovery_prefix: DEFAULT_DISCOVERY_PREFIX.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub aaisp: AaispCredentials,
    pub mqtt: MqttSettings,
    pub homeassistant: HomeAssistantSettings,
}

fn default_port() -> u16 {
    DEFAULT_MQTT_PORT
}

fn default_topic_prefix() -> String {
    DEFAULT_TOPIC_PREFIX.to_string()
}

fn default_discovery_prefix() -> String {
    DEFAULT_DISCOVERY_PREFIX.to_string()
}

/// On-disk layout. Sections are optional here so a missing one can be
/// reported by name instead of as a serde error.
#[derive(Deserialize)]
struct FileConfig {
    aaisp: Option<AaispCredentials>,
    mqtt: Option<MqttSettings>,
    #[serde(default)]
    homeassistant: HomeAssistantSettings,
}

impl Settings {
    /// Load from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&raw).map_err(|err| match err {
            ParseFailure::Toml(source) => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            ParseFailure::Config(err) => err,
        })
    }

    fn from_toml(raw: &str) -> Result<Self, ParseFailure> {
        let file: FileConfig = toml::from_str(raw).map_err(ParseFailure::Toml)?;

        let mut missing = Vec::new();
        if file.aaisp.is_none() {
            missing.push("aaisp");
        }
        if file.mqtt.is_none() {
            missing.push("mqtt");
        }
        match (file.aaisp, file.mqtt) {
            (Some(aaisp), Some(mqtt)) => Ok(Self {
                aaisp,
                mqtt,
                homeassistant: file.homeassistant,
            }),
            _ => Err(ParseFailure::Config(ConfigError::MissingSections(missing))),
        }
    }

    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let (username, password) = match (get("AAISP_USERNAME"), get("AAISP_PASSWORD")) {
            (Some(u), Some(p)) => (u, Secret::new(p)),
            _ => return Err(ConfigError::MissingCredentials),
        };

        let port: u16 = match get("MQTT_PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort(raw))?,
            None => DEFAULT_MQTT_PORT,
        };

        Ok(Self {
            aaisp: AaispCredentials { username, password },
            mqtt: MqttSettings {
                broker: get("MQTT_BROKER").unwrap_or_else(|| DEFAULT_ENV_BROKER.to_string()),
                port,
                username: get("MQTT_USERNAME"),
                password: get("MQTT_PASSWORD").map(Secret::new),
                topic_prefix: get("MQTT_TOPIC_PREFIX").unwrap_or_else(default_topic_prefix),
            },
            homeassistant: HomeAssistantSettings {
                enabled: get("HOMEASSISTANT_ENABLED").as_deref() == Some("true"),
                discovery_prefix: get("HOMEASSISTANT_DISCOVERY_PREFIX")
                    .unwrap_or_else(default_discovery_prefix),
            },
        })
    }
}

enum ParseFailure {
    Toml(toml::de::Error),
    Config(ConfigError),
}

// ── Path handling ───────────────────────────────────────────────────

/// Expand `$VAR` and `${VAR}` references. Unknown variables are left as
/// written, as is a `$` followed by anything other than an identifier or
/// a closed `{...}`.
pub fn expand_vars<F>(raw: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        let (name, consumed) = if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(end) => (&braced[..end], end + 2),
                None => ("", 0),
            }
        } else {
            let end = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            (&after[..end], end)
        };

        match (name.is_empty(), lookup(name)) {
            (false, Some(value)) => out.push_str(&value),
            _ => out.push_str(&rest[pos..pos + 1 + consumed]),
        }
        rest = &rest[pos + 1 + consumed..];
    }
    out.push_str(rest);
    out
}

/// Expand environment references in a config path and make it absolute.
pub fn resolve_config_path(raw: &str) -> std::io::Result<PathBuf> {
    let expanded = PathBuf::from(expand_vars(raw, |key| std::env::var(key).ok()));
    if expanded.is_absolute() {
        Ok(expanded)
    } else {
        Ok(std::env::current_dir()?.join(expanded))
    }
}

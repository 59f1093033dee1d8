//! Configuration management for the BITS server

use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::bits::types::{DEFAULT_ALLOW_PATTERN, DEFAULT_METHOD, DEFAULT_PROTOCOL, DEFAULT_TEMP_DIR_NAME};
use crate::error::ConfigError;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub bits: BitsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Path prefix BITS packets are accepted under
    pub uri: String,
    /// Directory completed files are moved to
    pub root: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 8080,
            uri: "/".to_string(),
            root: PathBuf::from("."),
        }
    }
}

/// Protocol engine settings
///
/// Empty values mean "use the default"; `resolve` fills them in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BitsConfig {
    /// Root for session directories
    pub temp_dir: PathBuf,
    /// Request method token BITS packets must use
    pub allowed_method: String,
    /// Protocol identifier negotiated on create-session
    pub protocol: String,
    /// Largest declared file size, 0 = unlimited
    pub max_size: u64,
    /// Filename patterns that may be uploaded
    pub allowed: Vec<String>,
    /// Filename patterns that may never be uploaded; checked first
    pub disallowed: Vec<String>,
}

impl BitsConfig {
    /// Replace empty values with defaults
    pub fn resolve(mut self) -> Self {
        if self.temp_dir.as_os_str().is_empty() {
            self.temp_dir = env::temp_dir().join(DEFAULT_TEMP_DIR_NAME);
        }
        if self.allowed_method.is_empty() {
            self.allowed_method = DEFAULT_METHOD.to_string();
        }
        if self.protocol.is_empty() {
            self.protocol = DEFAULT_PROTOCOL.to_string();
        }
        if self.allowed.is_empty() {
            self.allowed = vec![DEFAULT_ALLOW_PATTERN.to_string()];
        }
        self
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ServerConfig::default();
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        Ok(Config {
            server: ServerConfig {
                host: var("SERVER_HOST").unwrap_or(defaults.host),
                port: parse_var(&var, "SERVER_PORT", defaults.port)?,
                uri: var("BITS_URI").unwrap_or(defaults.uri),
                root: var("BITS_ROOT").map(PathBuf::from).unwrap_or(defaults.root),
            },
            bits: BitsConfig {
                temp_dir: var("BITS_TEMP_DIR").map(PathBuf::from).unwrap_or_default(),
                allowed_method: var("BITS_METHOD").unwrap_or_default(),
                protocol: var("BITS_PROTOCOL").unwrap_or_default(),
                max_size: parse_var(&var, "BITS_MAX_SIZE", 0)?,
                allowed: var("BITS_ALLOWED").map(|v| split_list(&v)).unwrap_or_default(),
                disallowed: var("BITS_DISALLOWED").map(|v| split_list(&v)).unwrap_or_default(),
            },
        })
    }
}

fn parse_var<T, F>(var: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        None => Ok(default),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

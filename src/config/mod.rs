//! Smart-host relay settings.
//!
//! Values come from a YAML file first; environment variables only fill the
//! fields the file left empty.

mod error;

pub use error::ConfigError;

use std::io;
use std::path::Path;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::smtp::Credentials;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/direct-sendmail.yaml";

pub const ENV_HOST: &str = "SENDMAIL_SMART_HOST";
pub const ENV_LOGIN: &str = "SENDMAIL_SMART_LOGIN";
pub const ENV_PASSWORD: &str = "SENDMAIL_SMART_PASSWORD";

/// Relay server and optional login. An empty `host` means direct delivery.
#[derive(Debug, Default, Deserialize)]
pub struct RelayConfig {
    #[serde(rename = "relay_host", default)]
    pub host: String,
    #[serde(rename = "relay_login", default)]
    pub login: String,
    #[serde(rename = "relay_password", default)]
    pub password: Option<SecretString>,
}

impl RelayConfig {
    /// File values, then environment fallbacks.
    pub fn resolve(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.fill_from(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Reads the YAML file at `path`. A missing or blank file yields an
    /// empty configuration.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = match std::fs::read_to_string(path) {
            Ok(data) => data,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no relay config file");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Self::parse(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(data: &str) -> Result<Self, serde_yaml::Error> {
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(data)
    }

    /// Fills every empty field from `lookup`, keyed by the `SENDMAIL_SMART_*`
    /// variable names.
    pub fn fill_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.is_empty());
        if self.host.is_empty() {
            if let Some(host) = lookup(ENV_HOST) {
                self.host = host;
            }
        }
        if self.login.is_empty() {
            if let Some(login) = lookup(ENV_LOGIN) {
                self.login = login;
            }
        }
        let password_missing = self
            .password
            .as_ref()
            .is_none_or(|p| p.expose_secret().is_empty());
        if password_missing {
            if let Some(password) = lookup(ENV_PASSWORD) {
                self.password = Some(SecretString::new(password));
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.host.trim().is_empty()
    }

    /// `None` unless a login is set; a missing password becomes empty.
    pub fn credentials(&self) -> Option<Credentials> {
        if self.login.is_empty() {
            return None;
        }
        let password = self
            .password
            .as_ref()
            .map(|p| p.expose_secret().as_str())
            .unwrap_or_default();
        Some(Credentials::new(self.login.clone(), password))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::PathBuf;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn scratch_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "direct-mta-{}-{name}.yaml",
            std::process::id()
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn parses_yaml_keys() {
        let config = RelayConfig::parse(
            "relay_host: smtp.example.net:587\nrelay_login: robot\nrelay_password: hunter2\n",
        )
        .unwrap();
        assert_eq!(config.host, "smtp.example.net:587");
        assert_eq!(config.login, "robot");
        let credentials = config.credentials().expect("login set");
        assert_eq!(credentials.login, "robot");
        assert_eq!(credentials.password.expose_secret(), "hunter2");
    }

    #[test]
    fn file_values_win_over_environment() {
        let mut config = RelayConfig::parse("relay_host: file.example.net\n").unwrap();
        config.fill_from(env(&[
            (ENV_HOST, "env.example.net"),
            (ENV_LOGIN, "env-user"),
            (ENV_PASSWORD, "env-secret"),
        ]));
        assert_eq!(config.host, "file.example.net");
        assert_eq!(config.login, "env-user");
        assert_eq!(
            config.password.as_ref().map(|p| p.expose_secret().as_str()),
            Some("env-secret")
        );
    }

    #[test]
    fn empty_environment_values_are_ignored() {
        let mut config = RelayConfig::default();
        config.fill_from(env(&[(ENV_HOST, "")]));
        assert!(!config.is_configured());
        assert!(config.credentials().is_none());
    }

    #[test]
    fn missing_file_is_empty_config() {
        let config = RelayConfig::load("/nonexistent/direct-mta/relay.yaml").unwrap();
        assert!(!config.is_configured());
    }

    #[test]
    fn blank_file_is_empty_config() {
        let path = scratch_file("blank", "\n");
        let config = RelayConfig::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert!(!config.is_configured());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let path = scratch_file("malformed", "relay_host: [unterminated\n");
        let err = RelayConfig::load(&path).expect_err("bad yaml");
        std::fs::remove_file(&path).ok();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn password_is_redacted_in_debug_output() {
        let config = RelayConfig::parse("relay_password: hunter2\n").unwrap();
        assert!(!format!("{config:?}").contains("hunter2"));
    }
}

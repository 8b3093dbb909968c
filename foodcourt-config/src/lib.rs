use core::fmt::{Debug, Display};
use core::time::Duration;
use std::net::SocketAddr;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "foodcourt.toml";
pub const ENV_PREFIX: &str = "FOODCOURT_";

#[derive(Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct AdminConfig {
    pub username: String,
    /// Used once to create the admin credential if none is stored yet.
    pub password: Option<String>,
}

impl Debug for AdminConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AdminConfig")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct Config {
    pub listen_address: SocketAddr,
    /// Without one participants live in process memory.
    pub database_url: Option<String>,
    pub store_timeout_ms: u64,
    pub cors_allow_any_origin: bool,
    pub admin: AdminConfig,
}

impl Config {
    #[must_use]
    pub const fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_address: SocketAddr::from(([0, 0, 0, 0], 5000)),
            database_url: None,
            store_timeout_ms: 5000,
            cors_allow_any_origin: true,
            admin: AdminConfig {
                username: "admin".to_owned(),
                password: None,
            },
        }
    }
}

impl Debug for Config {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Config")
            .field("listen_address", &self.listen_address)
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "<redacted>"),
            )
            .field("store_timeout_ms", &self.store_timeout_ms)
            .field("cors_allow_any_origin", &self.cors_allow_any_origin)
            .field("admin", &self.admin)
            .finish()
    }
}

#[derive(thiserror::Error)]
pub enum ConfigError {
    #[error("config error: {0}")]
    Figment(#[from] Box<figment::Error>),
    #[error("store_timeout_ms must be greater than zero")]
    ZeroStoreTimeout,
}

impl From<figment::Error> for ConfigError {
    fn from(value: figment::Error) -> Self {
        Self::Figment(Box::new(value))
    }
}

impl Debug for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

/// Defaults, then `foodcourt.toml`, then `FOODCOURT_*` variables. Nested keys
/// use a double underscore, e.g. `FOODCOURT_ADMIN__PASSWORD`.
pub fn figment() -> Figment {
    Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file(CONFIG_FILE))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
}

pub fn get_config() -> Result<Config, ConfigError> {
    let config: Config = figment().extract()?;
    if config.store_timeout_ms == 0 {
        return Err(ConfigError::ZeroStoreTimeout);
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;

    #[test]
    fn defaults_apply_without_any_source() {
        Jail::expect_with(|_jail| {
            let config = get_config().unwrap();
            assert_eq!(config, Config::default());
            assert_eq!(config.listen_address.port(), 5000);
            assert_eq!(config.store_timeout(), Duration::from_secs(5));
            assert!(config.database_url.is_none());
            Ok(())
        });
    }

    #[test]
    fn environment_overrides_the_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                CONFIG_FILE,
                r#"
                listen_address = "127.0.0.1:8080"
                database_url = "postgres://localhost/foodcourt"
                store_timeout_ms = 1500

                [admin]
                username = "cscr"
                "#,
            )?;
            jail.set_env("FOODCOURT_STORE_TIMEOUT_MS", "250");
            jail.set_env("FOODCOURT_ADMIN__PASSWORD", "hunter2");

            let config = get_config().unwrap();
            assert_eq!(config.listen_address, "127.0.0.1:8080".parse().unwrap());
            assert_eq!(
                config.database_url.as_deref(),
                Some("postgres://localhost/foodcourt")
            );
            assert_eq!(config.store_timeout(), Duration::from_millis(250));
            assert_eq!(config.admin.username, "cscr");
            assert_eq!(config.admin.password.as_deref(), Some("hunter2"));
            assert!(config.cors_allow_any_origin);
            Ok(())
        });
    }

    #[test]
    fn zero_timeout_is_rejected() {
        Jail::expect_with(|jail| {
            jail.set_env("FOODCOURT_STORE_TIMEOUT_MS", "0");
            assert!(matches!(get_config(), Err(ConfigError::ZeroStoreTimeout)));
            Ok(())
        });
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let mut config = Config::default();
        config.database_url = Some("postgres://user:pw@db/foodcourt".to_owned());
        config.admin.password = Some("hunter2".to_owned());
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("user:pw"));
    }
}

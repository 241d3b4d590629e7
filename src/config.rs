use std::env;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("{key} has an invalid value `{value}`")]
    Invalid { key: &'static str, value: String },
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { key, value }),
        Err(_) => Ok(default),
    }
}

/// Split a comma separated host list, ignoring blanks.
pub fn parse_hosts(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|host| !host.is_empty())
        .map(str::to_string)
        .collect()
}

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct InboxConfig {
    pub memcache_hosts: Vec<String>,
    pub memcache_expiry_secs: u32,
    pub hash_secret: String,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
}

impl InboxConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let memcache_hosts = parse_hosts(&env_string("MEMCACHE_HOSTS", "127.0.0.1:11211"));
        if memcache_hosts.is_empty() {
            return Err(ConfigError::Missing("MEMCACHE_HOSTS"));
        }

        let hash_secret = env::var("INBOX_HASH_SECRET")
            .ok()
            .filter(|secret| !secret.is_empty())
            .ok_or(ConfigError::Missing("INBOX_HASH_SECRET"))?;

        Ok(Self {
            memcache_hosts,
            memcache_expiry_secs: env_parsed("MEMCACHE_EXPIRY_SECS", 0)?,
            hash_secret,
            database_url: env::var("DATABASE_URL").ok(),
            database_max_connections: env_parsed("DATABASE_MAX_CONNECTIONS", 5)?,
        })
    }

    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .ok_or(ConfigError::Missing("DATABASE_URL"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_list_ignores_blanks() {
        assert_eq!(
            parse_hosts(" 10.0.0.1:11211, ,10.0.0.2:11211,"),
            vec!["10.0.0.1:11211", "10.0.0.2:11211"]
        );
        assert!(parse_hosts("").is_empty());
    }

    #[test]
    fn missing_database_url_is_reported() {
        let config = InboxConfig {
            memcache_hosts: vec!["127.0.0.1:11211".into()],
            memcache_expiry_secs: 0,
            hash_secret: "s".into(),
            database_url: None,
            database_max_connections: 5,
        };
        assert!(matches!(
            config.require_database_url(),
            Err(ConfigError::Missing("DATABASE_URL"))
        ));
    }
}

use crate::storage::resolve_data_path;
use std::{env, path::PathBuf};

pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub url: String,
    pub anon_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub data_path: PathBuf,
    pub remote: Option<RemoteConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self, std::io::Error> {
        let data_path = resolve_data_path()?;
        Ok(Self::from_lookup(data_path, |key| env::var(key).ok()))
    }

    /// The remote store is enabled only when both its URL and key are set.
    pub fn from_lookup(data_path: PathBuf, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let port = lookup("PORT")
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);

        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let remote = match (
            non_empty("PERCENTDONE_REMOTE_URL"),
            non_empty("PERCENTDONE_REMOTE_KEY"),
        ) {
            (Some(url), Some(anon_key)) => Some(RemoteConfig { url, anon_key }),
            _ => None,
        };

        Self {
            port,
            data_path,
            remote,
        }
    }
}

//! Connection settings for the REST API and the event channel.
//!
//! Each value is resolved from: explicit override (CLI flag) > environment >
//! `<data_dir>/config.toml` > built-in default.

use std::path::{Path, PathBuf};

use helpdesk_protocol::DEFAULT_ROOM;
use reqwest::Url;
use serde::Deserialize;
use tracing::debug;

use crate::error::ConfigError;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:3000/api";
const CHANNEL_PATH: &str = "/socket";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Fully resolved settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub api_url: Url,
    pub channel_url: Url,
    pub room: String,
    pub api_token: Option<String>,
    pub data_dir: PathBuf,
}

/// Values that win over everything else, typically from CLI flags
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub api_url: Option<String>,
    pub channel_url: Option<String>,
    pub room: Option<String>,
    pub api_token: Option<String>,
    pub data_dir: Option<PathBuf>,
}

/// Shape of `config.toml`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub api_url: Option<String>,
    pub channel_url: Option<String>,
    pub room: Option<String>,
    pub api_token: Option<String>,
}

impl FileConfig {
    /// Read `config.toml` from `data_dir`. A missing file is an empty config.
    pub fn load(data_dir: &Path) -> Result<Self, ConfigError> {
        let path = data_dir.join(CONFIG_FILE_NAME);
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path)?;
        Ok(toml::from_str(&text)?)
    }
}

impl SyncConfig {
    /// Resolve from the process environment
    pub fn resolve(overrides: ConfigOverrides) -> Result<Self, ConfigError> {
        Self::resolve_with(overrides, |key| std::env::var(key).ok())
    }

    /// Resolve with an explicit environment lookup
    pub fn resolve_with(
        overrides: ConfigOverrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let data_dir = match overrides.data_dir.or_else(|| env("HELPDESK_DATA_DIR").map(PathBuf::from)) {
            Some(dir) => dir,
            None => dirs::home_dir().ok_or(ConfigError::NoHome)?.join(".helpdesk"),
        };
        let file = FileConfig::load(&data_dir)?;

        let pick = |flag: Option<String>, key: &str, from_file: Option<String>| {
            flag.or_else(|| env(key))
                .or(from_file)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_url_raw = pick(overrides.api_url, "HELPDESK_API_URL", file.api_url)
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let api_url = parse_url("api_url", &api_url_raw)?;

        let channel_url = match pick(overrides.channel_url, "HELPDESK_CHANNEL_URL", file.channel_url) {
            Some(raw) => parse_url("channel_url", &raw)?,
            None => channel_url_from_api(&api_url)?,
        };

        let room = pick(overrides.room, "HELPDESK_ROOM", file.room)
            .unwrap_or_else(|| DEFAULT_ROOM.to_string());
        let api_token = pick(overrides.api_token, "HELPDESK_API_TOKEN", file.api_token);

        debug!(
            component = "config",
            event = "config.resolved",
            api_url = %api_url,
            channel_url = %channel_url,
            room = %room,
            has_token = api_token.is_some(),
            data_dir = %data_dir.display(),
        );

        Ok(Self {
            api_url,
            channel_url,
            room,
            api_token,
            data_dir,
        })
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

fn parse_url(field: &'static str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|_| ConfigError::InvalidUrl {
        field,
        value: raw.to_string(),
    })?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidUrl {
            field,
            value: raw.to_string(),
        });
    }
    Ok(url)
}

/// Same origin as the API, with a WebSocket scheme and the channel path
fn channel_url_from_api(api_url: &Url) -> Result<Url, ConfigError> {
    let scheme = if api_url.scheme() == "https" { "wss" } else { "ws" };
    let host = api_url.host_str().ok_or_else(|| ConfigError::InvalidUrl {
        field: "api_url",
        value: api_url.to_string(),
    })?;
    let raw = match api_url.port() {
        Some(port) => format!("{}://{}:{}{}", scheme, host, port, CHANNEL_PATH),
        None => format!("{}://{}{}", scheme, host, CHANNEL_PATH),
    };
    parse_url("channel_url", &raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn overrides_in(dir: &Path) -> ConfigOverrides {
        ConfigOverrides {
            data_dir: Some(dir.to_path_buf()),
            ..Default::default()
        }
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let config = SyncConfig::resolve_with(overrides_in(tmp.path()), env_from(&[]))
            .expect("resolve");

        assert_eq!(config.api_url.as_str(), DEFAULT_API_URL);
        assert_eq!(config.channel_url.as_str(), "ws://127.0.0.1:3000/socket");
        assert_eq!(config.room, "admin-room");
        assert_eq!(config.api_token, None);
        assert_eq!(config.log_dir(), tmp.path().join("logs"));
    }

    #[test]
    fn flag_beats_env_beats_file() {
        let tmp = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            tmp.path().join("config.toml"),
            "api_url = \"https://file.example.com/api\"\nroom = \"file-room\"\napi_token = \"from-file\"\n",
        )
        .expect("write config");

        let env = env_from(&[
            ("HELPDESK_API_URL", "https://env.example.com/api"),
            ("HELPDESK_ROOM", "env-room"),
        ]);
        let mut overrides = overrides_in(tmp.path());
        overrides.room = Some("flag-room".to_string());

        let config = SyncConfig::resolve_with(overrides, env).expect("resolve");
        assert_eq!(config.api_url.as_str(), "https://env.example.com/api");
        assert_eq!(config.channel_url.as_str(), "wss://env.example.com/socket");
        assert_eq!(config.room, "flag-room");
        assert_eq!(config.api_token.as_deref(), Some("from-file"));
    }

    #[test]
    fn explicit_channel_url_is_kept() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let env = env_from(&[("HELPDESK_CHANNEL_URL", "ws://push.example.com:9000/events")]);
        let config = SyncConfig::resolve_with(overrides_in(tmp.path()), env).expect("resolve");
        assert_eq!(
            config.channel_url.as_str(),
            "ws://push.example.com:9000/events"
        );
    }

    #[test]
    fn blank_values_fall_through() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let env = env_from(&[("HELPDESK_API_TOKEN", "   ")]);
        let config = SyncConfig::resolve_with(overrides_in(tmp.path()), env).expect("resolve");
        assert_eq!(config.api_token, None);
    }

    #[test]
    fn invalid_url_is_rejected() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let env = env_from(&[("HELPDESK_API_URL", "not a url")]);
        match SyncConfig::resolve_with(overrides_in(tmp.path()), env) {
            Err(ConfigError::InvalidUrl { field, .. }) => assert_eq!(field, "api_url"),
            other => panic!("expected invalid url, got {:?}", other),
        }
    }

    #[test]
    fn malformed_config_file_is_an_error() {
        let tmp = tempfile::tempdir().expect("tempdir");
        std::fs::write(tmp.path().join("config.toml"), "api_url = [").expect("write config");
        assert!(matches!(
            SyncConfig::resolve_with(overrides_in(tmp.path()), env_from(&[])),
            Err(ConfigError::Toml(_))
        ));
    }
}

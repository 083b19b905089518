use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::services::player_service::PlayerSettings;

const DEFAULT_INACTIVITY_TIMEOUT_SECS: u64 = 300;
const DEFAULT_MAX_QUEUE_LENGTH: usize = 500;
const DEFAULT_MAX_PLAYLIST_TRACKS: usize = 100;
const DEFAULT_YTDLP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing {0}")]
    Missing(&'static str),
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug)]
pub struct Config {
    pub discord_token: String,
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,
    pub media_dir: Option<PathBuf>,
    pub ytdlp_path: String,
    pub ytdlp_timeout: Duration,
    pub inactivity_timeout: Duration,
    pub max_queue_length: usize,
    pub max_playlist_tracks: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let optional = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            discord_token: optional("DISCORD_TOKEN")
                .ok_or(ConfigError::Missing("DISCORD_TOKEN"))?,
            spotify_client_id: optional("SPOTIFY_CLIENT_ID"),
            spotify_client_secret: optional("SPOTIFY_CLIENT_SECRET"),
            media_dir: optional("MEDIA_DIR").map(PathBuf::from),
            ytdlp_path: optional("YTDLP_PATH").unwrap_or_else(|| "yt-dlp".to_string()),
            ytdlp_timeout: Duration::from_secs(parse_or(
                "YTDLP_TIMEOUT_SECS",
                optional("YTDLP_TIMEOUT_SECS"),
                DEFAULT_YTDLP_TIMEOUT_SECS,
            )?),
            inactivity_timeout: Duration::from_secs(parse_or(
                "INACTIVITY_TIMEOUT_SECS",
                optional("INACTIVITY_TIMEOUT_SECS"),
                DEFAULT_INACTIVITY_TIMEOUT_SECS,
            )?),
            max_queue_length: parse_or(
                "MAX_QUEUE_LENGTH",
                optional("MAX_QUEUE_LENGTH"),
                DEFAULT_MAX_QUEUE_LENGTH,
            )?,
            max_playlist_tracks: parse_or(
                "MAX_PLAYLIST_TRACKS",
                optional("MAX_PLAYLIST_TRACKS"),
                DEFAULT_MAX_PLAYLIST_TRACKS,
            )?,
        })
    }

    pub fn player_settings(&self) -> PlayerSettings {
        PlayerSettings {
            idle_timeout: self.inactivity_timeout,
            max_queue_length: self.max_queue_length,
        }
    }
}

fn parse_or<T: FromStr>(
    key: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use tracing::warn;

use crate::game::card::CompletionPolicy;
use crate::tcp::header::MAX_PAYLOAD_LENGTH;

/// Server configuration.
///
/// Read from an optional `Settings.toml` next to the binary, then overridden by
/// `BINGO_*` environment variables (`BINGO_PORT=9000`, `BINGO_SNAPSHOT_PATH=...`).
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    /// Largest accepted packet payload, in bytes. Never above what a header can announce.
    pub max_payload: usize,
    /// Most rooms returned by a LIST_GAMES request.
    pub games_limit: usize,
    pub default_max_players: u32,
    pub completion_policy: CompletionPolicy,
    pub snapshot_path: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            max_payload: 4096,
            games_limit: 50,
            default_max_players: 1,
            completion_policy: CompletionPolicy::Latch,
            snapshot_path: None,
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("Settings")
    }

    fn load_from(file: &str) -> Result<Self, ConfigError> {
        let defaults = Settings::default();

        let mut settings: Settings = Config::builder()
            .set_default("host", defaults.host)?
            .set_default("port", defaults.port as u64)?
            .set_default("max_payload", defaults.max_payload as u64)?
            .set_default("games_limit", defaults.games_limit as u64)?
            .set_default("default_max_players", defaults.default_max_players as u64)?
            .set_default("completion_policy", "latch")?
            .add_source(File::with_name(file).required(false))
            .add_source(Environment::with_prefix("BINGO"))
            .build()?
            .try_deserialize()?;

        if settings.max_payload > MAX_PAYLOAD_LENGTH {
            warn!(
                "[SETTINGS] max_payload {} exceeds the frame limit, using {MAX_PAYLOAD_LENGTH}",
                settings.max_payload
            );
            settings.max_payload = MAX_PAYLOAD_LENGTH;
        }

        Ok(settings)
    }
}

//! Process configuration, read from the environment (and `.env` if present).

use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, warn};
use tunebot_common::models::MAX_RESULTS;

use crate::Error;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_SELECTION_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_COMMAND_PREFIX: &str = "@";

#[derive(Clone)]
pub struct BotConfig {
    pub discord_token: String,
    pub youtube_api_key: String,
    /// Listening port. Kept for deployment parity; the bot itself never binds it.
    pub port: u16,
    /// Overrides the `yt-dlp` compatible program used to open audio streams.
    pub transcoder_path: Option<PathBuf>,
    pub selection_timeout: Duration,
    pub search_limit: usize,
    pub command_prefix: String,
}

impl std::fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotConfig")
            .field("discord_token", &"<redacted>")
            .field("youtube_api_key", &"<redacted>")
            .field("port", &self.port)
            .field("transcoder_path", &self.transcoder_path)
            .field("selection_timeout", &self.selection_timeout)
            .field("search_limit", &self.search_limit)
            .field("command_prefix", &self.command_prefix)
            .finish()
    }
}

impl BotConfig {
    /// Loads `.env` (if any) and reads the process environment.
    pub fn from_env() -> Result<Self, Error> {
        if let Err(e) = dotenv::dotenv() {
            debug!("No .env file loaded: {e}");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |key: &str| get(key).ok_or_else(|| Error::Config(format!("{key} is not set")));

        let discord_token = require("DISCORD_BOT_TOKEN")?;
        let youtube_api_key = require("YOUTUBE_API_KEY")?;

        let port = match get("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|e| Error::Config(format!("PORT '{raw}': {e}")))?,
            None => DEFAULT_PORT,
        };

        let selection_timeout = match get("SELECTION_TIMEOUT_SECS") {
            Some(raw) => {
                let secs = raw
                    .parse::<u64>()
                    .map_err(|e| Error::Config(format!("SELECTION_TIMEOUT_SECS '{raw}': {e}")))?;
                if secs == 0 {
                    return Err(Error::Config("SELECTION_TIMEOUT_SECS must be positive".into()));
                }
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_SELECTION_TIMEOUT_SECS),
        };

        let search_limit = match get("SEARCH_LIMIT") {
            Some(raw) => {
                let requested = raw
                    .parse::<usize>()
                    .map_err(|e| Error::Config(format!("SEARCH_LIMIT '{raw}': {e}")))?;
                let clamped = requested.clamp(1, MAX_RESULTS);
                if clamped != requested {
                    warn!("SEARCH_LIMIT={requested} clamped to {clamped}");
                }
                clamped
            }
            None => MAX_RESULTS,
        };

        Ok(Self {
            discord_token,
            youtube_api_key,
            port,
            transcoder_path: get("TRANSCODER_PATH").map(PathBuf::from),
            selection_timeout,
            search_limit,
            command_prefix: get("COMMAND_PREFIX").unwrap_or_else(|| DEFAULT_COMMAND_PREFIX.to_string()),
        })
    }
}

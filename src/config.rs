use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, str::FromStr, time::Duration};

const MAX_DEFAULT_WORKERS: usize = 8;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Cola
    pub max_queue_size: usize,
    pub max_playlist_size: usize,
    pub disconnect_grace: Duration,

    // Resolución
    pub resolver_workers: usize,
    pub ytdlp_path: String,

    // Paths
    pub data_dir: PathBuf,
    pub messages_file: Option<PathBuf>,

    // Presencia
    pub idle_presence: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self::from_lookup(|key| std::env::var(key).ok())?;

        // Validate configuration before returning
        config.validate()?;

        Ok(config)
    }

    /// Construye la configuración a partir de cualquier fuente clave/valor.
    /// Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Ok(Self {
            // Discord
            discord_token: get("DISCORD_TOKEN").context("DISCORD_TOKEN is not set")?,
            guild_id: get("GUILD_ID").and_then(|s| s.trim().parse().ok()),

            // Cola
            max_queue_size: parse_or(get("MAX_QUEUE_SIZE"), "MAX_QUEUE_SIZE", defaults.max_queue_size)?,
            max_playlist_size: parse_or(
                get("MAX_PLAYLIST_SIZE"),
                "MAX_PLAYLIST_SIZE",
                defaults.max_playlist_size,
            )?,
            disconnect_grace: match get("DISCONNECT_GRACE") {
                Some(val) => humantime::parse_duration(val.trim())
                    .with_context(|| format!("DISCONNECT_GRACE is not a duration: {val}"))?,
                None => defaults.disconnect_grace,
            },

            // Resolución
            resolver_workers: parse_or(
                get("RESOLVER_WORKERS"),
                "RESOLVER_WORKERS",
                defaults.resolver_workers,
            )?,
            ytdlp_path: get("YTDLP_PATH").unwrap_or(defaults.ytdlp_path),

            // Paths
            data_dir: get("DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
            messages_file: get("MESSAGES_FILE").map(PathBuf::from),

            // Presencia
            idle_presence: get("IDLE_PRESENCE").unwrap_or(defaults.idle_presence),
        })
    }

    /// Validates configuration values for correctness.
    ///
    /// - Queue and playlist sizes must be greater than 0
    /// - At least one resolver worker
    /// - A non-zero disconnect grace period
    pub fn validate(&self) -> Result<()> {
        if self.discord_token.trim().is_empty() {
            anyhow::bail!("Discord token must not be empty");
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("Max queue size must be greater than 0");
        }

        if self.max_playlist_size == 0 {
            anyhow::bail!("Max playlist size must be greater than 0");
        }

        if self.resolver_workers == 0 {
            anyhow::bail!("Resolver workers must be greater than 0");
        }

        if self.disconnect_grace.is_zero() {
            anyhow::bail!("Disconnect grace period must be greater than 0");
        }

        Ok(())
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// The token is never included.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: Guild {}\n  \
            Queue: {} tracks, {} per playlist, {} grace\n  \
            Resolver: {} workers via {}\n  \
            Data: {} (messages: {})\n  \
            Idle presence: {}",
            self.guild_id.map_or("global".to_string(), |id| id.to_string()),
            self.max_queue_size,
            self.max_playlist_size,
            humantime::format_duration(self.disconnect_grace),
            self.resolver_workers,
            self.ytdlp_path,
            self.data_dir.display(),
            self.messages_file
                .as_ref()
                .map_or("built-in".to_string(), |p| p.display().to_string()),
            self.idle_presence,
        )
    }
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(val) => val
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {val}")),
        None => Ok(default),
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (no defaults - must be provided)
            discord_token: String::new(),
            guild_id: None,

            max_queue_size: 1000,
            max_playlist_size: 100,
            disconnect_grace: Duration::from_secs(3),

            resolver_workers: num_cpus::get().clamp(1, MAX_DEFAULT_WORKERS),
            ytdlp_path: "yt-dlp".to_string(),

            data_dir: "./data".into(),
            messages_file: None,

            idle_presence: "/play".to_string(),
        }
    }
}

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Textos mostrados al usuario.
///
/// Placeholders in braces (`{title}`, `{count}`, `{position}`) are filled in
/// by [`Messages::render`]. Missing fields in a custom file keep the built-in text.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Messages {
    pub not_in_voice: String,
    pub added_to_queue: String,
    pub playlist_added: String,
    pub now_playing: String,
    pub queue_empty: String,
    pub skipped: String,
    pub nothing_playing: String,
    pub stopped: String,
    pub not_found: String,
    pub unsupported: String,
    pub network_error: String,
    pub connection_failed: String,
    pub playback_failed: String,
    pub queue_full: String,
    pub stats_header: String,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            not_in_voice: "You need to be in a voice channel to play music.".into(),
            added_to_queue: "Added **{title}** to the queue at position {position}.".into(),
            playlist_added: "Added {count} tracks to the queue starting at position {position}.".into(),
            now_playing: "Now playing".into(),
            queue_empty: "The queue is empty. Leaving the voice channel soon.".into(),
            skipped: "Skipped **{title}**.".into(),
            nothing_playing: "Nothing is playing right now.".into(),
            stopped: "Playback stopped and the queue was cleared.".into(),
            not_found: "No results for that query.".into(),
            unsupported: "That link is not supported.".into(),
            network_error: "The media source could not be reached. Try again later.".into(),
            connection_failed: "Could not join your voice channel.".into(),
            playback_failed: "None of those tracks could be played.".into(),
            queue_full: "The queue is full ({count} tracks).".into(),
            stats_header: "Playback statistics".into(),
        }
    }
}

impl Messages {
    /// Carga textos desde un archivo JSON, o los de fábrica si no hay ruta.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read messages file {}", path.display()))?;
        let messages = serde_json::from_str(&content)
            .with_context(|| format!("invalid messages file {}", path.display()))?;

        info!("💬 Textos cargados desde {}", path.display());
        Ok(messages)
    }

    pub fn render(template: &str, vars: &[(&str, String)]) -> String {
        vars.iter().fold(template.to_string(), |text, (key, value)| {
            text.replace(&format!("{{{key}}}"), value)
        })
    }
}

//! Contrato con la conexión de voz de cada guild.
//!
//! The transport (songbird in production) never touches playback state. It
//! reports the end of a track by posting a [`PlaybackEvent`] through the
//! [`CompletionHandle`] it was given, and the orchestrator's event loop picks
//! it up.

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use super::track::Track;

/// No se pudo conectar (o reconectar) al canal de voz
#[derive(Debug, Clone, Error, PartialEq)]
#[error("voice connection failed: {0}")]
pub struct ConnectionError(pub String);

/// El transporte rechazó o interrumpió un track
#[derive(Debug, Clone, Error, PartialEq)]
#[error("playback failed: {0}")]
pub struct PlaybackError(pub String);

/// Cómo terminó un track
#[derive(Debug, Clone, PartialEq)]
pub enum TrackOutcome {
    Finished,
    Errored(String),
}

/// Eventos consumidos por el bucle del orquestador
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    TrackEnded {
        guild_id: GuildId,
        generation: u64,
        outcome: TrackOutcome,
    },
    CountdownExpired {
        guild_id: GuildId,
        generation: u64,
    },
}

/// Callback de finalización ligado a una generación concreta.
#[derive(Debug, Clone)]
pub struct CompletionHandle {
    guild_id: GuildId,
    generation: u64,
    events: flume::Sender<PlaybackEvent>,
}

impl CompletionHandle {
    pub fn new(guild_id: GuildId, generation: u64, events: flume::Sender<PlaybackEvent>) -> Self {
        Self {
            guild_id,
            generation,
            events,
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Posts the completion. Safe to call more than once; extra calls are
    /// discarded by the generation check on the receiving side.
    pub fn complete(&self, outcome: TrackOutcome) {
        let event = PlaybackEvent::TrackEnded {
            guild_id: self.guild_id,
            generation: self.generation,
            outcome,
        };
        if self.events.send(event).is_err() {
            debug!("Bucle de eventos cerrado, finalización descartada");
        }
    }
}

/// Conexión de voz viva de un guild
#[async_trait]
pub trait VoiceSession: Send + Sync {
    /// Starts `track`, replacing whatever was playing. `on_complete` must fire
    /// when the track ends or fails mid-stream.
    async fn play(&self, track: &Track, on_complete: CompletionHandle) -> Result<(), PlaybackError>;

    /// Stops the current track. The transport still reports it as ended.
    async fn stop(&self);

    async fn disconnect(&self);

    async fn is_connected(&self) -> bool;

    async fn is_playing(&self) -> bool;
}

/// Abre sesiones de voz
#[async_trait]
pub trait VoiceGateway: Send + Sync {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<dyn VoiceSession>, ConnectionError>;
}

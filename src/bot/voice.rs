//! Sesiones de voz sobre songbird.

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    input::{Input, YoutubeDl},
    tracks::{PlayMode, TrackHandle},
    Call, Event, Songbird, TrackEvent,
};
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, warn};

use crate::{
    audio::{
        track::Track,
        voice::{CompletionHandle, ConnectionError, PlaybackError, VoiceGateway, VoiceSession},
    },
    bot::events::TrackCompletionNotifier,
};

/// Abre conexiones con el manager de songbird registrado en el cliente
pub struct SongbirdGateway {
    manager: Arc<Songbird>,
    http: reqwest::Client,
}

impl SongbirdGateway {
    pub fn new(manager: Arc<Songbird>) -> anyhow::Result<Self> {
        // Cliente HTTP compartido por todos los inputs de yt-dlp
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .pool_idle_timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self { manager, http })
    }
}

#[async_trait]
impl VoiceGateway for SongbirdGateway {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<dyn VoiceSession>, ConnectionError> {
        let call = self
            .manager
            .join(guild_id, channel_id)
            .await
            .map_err(|e| ConnectionError(e.to_string()))?;

        Ok(Arc::new(SongbirdSession {
            guild_id,
            manager: self.manager.clone(),
            call,
            http: self.http.clone(),
            current: Mutex::new(None),
        }))
    }
}

pub struct SongbirdSession {
    guild_id: GuildId,
    manager: Arc<Songbird>,
    call: Arc<tokio::sync::Mutex<Call>>,
    http: reqwest::Client,
    current: Mutex<Option<TrackHandle>>,
}

#[async_trait]
impl VoiceSession for SongbirdSession {
    async fn play(&self, track: &Track, on_complete: CompletionHandle) -> Result<(), PlaybackError> {
        let input: Input = YoutubeDl::new(self.http.clone(), track.locator().to_string()).into();

        let handle = {
            let mut call = self.call.lock().await;
            if call.current_channel().is_none() {
                return Err(PlaybackError("voice call is not connected".into()));
            }
            call.play_only_input(input)
        };

        for event in [TrackEvent::End, TrackEvent::Error] {
            handle
                .add_event(Event::Track(event), TrackCompletionNotifier::new(on_complete.clone()))
                .map_err(|e| PlaybackError(e.to_string()))?;
        }

        debug!("🎵 [{}] Track enviado a songbird: {}", self.guild_id, track.locator());
        *self.current.lock() = Some(handle);
        Ok(())
    }

    async fn stop(&self) {
        let handle = self.current.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.stop() {
                debug!("⏹️ [{}] El track ya había terminado: {}", self.guild_id, e);
            }
        }
    }

    async fn disconnect(&self) {
        self.current.lock().take();
        if let Err(e) = self.manager.remove(self.guild_id).await {
            warn!("⚠️ [{}] Error al salir del canal de voz: {}", self.guild_id, e);
        } else {
            info!("👋 [{}] Salió del canal de voz", self.guild_id);
        }
    }

    async fn is_connected(&self) -> bool {
        self.call.lock().await.current_channel().is_some()
    }

    async fn is_playing(&self) -> bool {
        let handle = self.current.lock().clone();
        match handle {
            Some(handle) => matches!(
                handle.get_info().await.map(|state| state.playing),
                Ok(PlayMode::Play)
            ),
            None => false,
        }
    }
}

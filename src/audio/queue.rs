use serenity::model::id::{ChannelId, GuildId};
use std::{collections::VecDeque, sync::Arc, time::Duration};
use tracing::{debug, info};

use super::{track::Track, voice::VoiceSession};

/// Posición de un guild en la máquina de estados de reproducción
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Playing,
    CountdownToDisconnect,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Playing => "playing",
            Phase::CountdownToDisconnect => "countdown",
        }
    }
}

/// La cola no admite más tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFull {
    pub max_size: usize,
}

/// Estado de reproducción de un guild.
///
/// Only the orchestrator mutates this, always while holding the guild's lock
/// from [`GuildStateRegistry`](super::registry::GuildStateRegistry).
pub struct PlaybackState {
    guild_id: GuildId,
    queue: VecDeque<Track>,
    current: Option<Track>,
    phase: Phase,
    countdown_active: bool,
    generation: u64,
    voice: Option<Arc<dyn VoiceSession>>,
    announce_channel: Option<ChannelId>,
    max_size: usize,
}

impl PlaybackState {
    pub fn new(guild_id: GuildId, max_size: usize) -> Self {
        Self {
            guild_id,
            queue: VecDeque::new(),
            current: None,
            phase: Phase::Idle,
            countdown_active: false,
            generation: 0,
            voice: None,
            announce_channel: None,
            max_size,
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }
    pub fn phase(&self) -> Phase {
        self.phase
    }
    pub fn generation(&self) -> u64 {
        self.generation
    }
    pub fn countdown_active(&self) -> bool {
        self.countdown_active
    }
    pub fn current(&self) -> Option<&Track> {
        self.current.as_ref()
    }
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }
    pub fn is_queue_empty(&self) -> bool {
        self.queue.is_empty()
    }
    pub fn upcoming(&self) -> impl Iterator<Item = &Track> {
        self.queue.iter()
    }
    pub fn voice(&self) -> Option<Arc<dyn VoiceSession>> {
        self.voice.clone()
    }
    pub fn announce_channel(&self) -> Option<ChannelId> {
        self.announce_channel
    }
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn set_voice(&mut self, voice: Arc<dyn VoiceSession>) {
        self.voice = Some(voice);
    }

    pub fn set_announce_channel(&mut self, channel_id: ChannelId) {
        self.announce_channel = Some(channel_id);
    }

    pub fn remaining_capacity(&self) -> usize {
        self.max_size.saturating_sub(self.queue.len())
    }

    /// Agrega tracks al final de la cola, en el orden dado.
    ///
    /// Returns how many landed and the 1-based queue position of the first one.
    /// Tracks beyond the remaining capacity are dropped.
    pub fn push_tracks(&mut self, tracks: Vec<Track>) -> Result<(usize, usize), QueueFull> {
        let position = self.queue.len() + 1;
        if tracks.is_empty() {
            return Ok((0, position));
        }

        let available = self.remaining_capacity();
        if available == 0 {
            return Err(QueueFull {
                max_size: self.max_size,
            });
        }

        let to_add = tracks.len().min(available);
        for track in tracks.into_iter().take(to_add) {
            debug!("➕ [{}] En cola: {}", self.guild_id, track.title());
            self.queue.push_back(track);
        }

        info!("➕ [{}] Agregados {} tracks a la cola", self.guild_id, to_add);
        Ok((to_add, position))
    }

    /// Saca la cabeza de la cola (FIFO) y abre una nueva generación para ella.
    ///
    /// The track is not `current` until [`confirm_playing`](Self::confirm_playing).
    pub fn take_next(&mut self) -> Option<(Track, u64)> {
        let next = self.queue.pop_front()?;
        self.current = None;
        self.generation += 1;
        Some((next, self.generation))
    }

    /// The voice session accepted the track.
    pub fn confirm_playing(&mut self, track: Track) {
        self.current = Some(track);
        self.phase = Phase::Playing;
        self.countdown_active = false;
    }

    /// Entra en cuenta regresiva. Returns the generation the countdown is stamped with.
    pub fn enter_countdown(&mut self) -> u64 {
        self.current = None;
        self.phase = Phase::CountdownToDisconnect;
        self.countdown_active = true;
        self.generation
    }

    /// Cancels a pending countdown without touching the queue.
    pub fn cancel_countdown(&mut self) {
        if self.countdown_active {
            debug!("⏳ [{}] Cuenta regresiva cancelada", self.guild_id);
        }
        self.countdown_active = false;
    }

    /// Whether a countdown stamped with `generation` is still the live one.
    pub fn countdown_still_due(&self, generation: u64) -> bool {
        self.countdown_active
            && self.phase == Phase::CountdownToDisconnect
            && self.queue.is_empty()
            && self.generation == generation
    }

    /// The voice session went away under a playing track. The track is
    /// dropped, the rest of the queue is kept.
    pub fn interrupt(&mut self) -> Option<Arc<dyn VoiceSession>> {
        self.current = None;
        self.phase = Phase::Idle;
        self.countdown_active = false;
        self.voice.take()
    }

    /// Vuelve a Idle y suelta la sesión de voz, que se devuelve al llamador.
    pub fn reset(&mut self) -> Option<Arc<dyn VoiceSession>> {
        self.queue.clear();
        self.current = None;
        self.phase = Phase::Idle;
        self.countdown_active = false;
        self.voice.take()
    }

    pub fn status(&self) -> QueueStatus {
        let upcoming: Vec<Track> = self.queue.iter().cloned().collect();
        let total_duration = upcoming
            .iter()
            .chain(self.current.iter())
            .map(Track::duration)
            .sum();

        QueueStatus {
            phase: self.phase,
            current: self.current.clone(),
            upcoming,
            total_duration,
        }
    }
}

impl std::fmt::Debug for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackState")
            .field("guild_id", &self.guild_id)
            .field("phase", &self.phase)
            .field("current", &self.current.as_ref().map(Track::title))
            .field("queue_len", &self.queue.len())
            .field("generation", &self.generation)
            .field("countdown_active", &self.countdown_active)
            .field("has_voice", &self.voice.is_some())
            .finish()
    }
}

/// Foto de la cola de un guild
#[derive(Debug, Clone)]
pub struct QueueStatus {
    pub phase: Phase,
    pub current: Option<Track>,
    pub upcoming: Vec<Track>,
    pub total_duration: Duration,
}

impl QueueStatus {
    /// Obtiene una página específica de la cola
    pub fn get_page(&self, page: usize, items_per_page: usize) -> QueuePage {
        let items_per_page = items_per_page.max(1);
        let total_items = self.upcoming.len();
        let total_pages = if total_items == 0 {
            1
        } else {
            total_items.div_ceil(items_per_page)
        };
        let safe_page = page.clamp(1, total_pages);
        let start = (safe_page - 1) * items_per_page;
        let end = (start + items_per_page).min(total_items);

        QueuePage {
            items: self.upcoming[start..end].to_vec(),
            first_position: start + 1,
            current_page: safe_page,
            total_pages,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueuePage {
    pub items: Vec<Track>,
    pub first_position: usize,
    pub current_page: usize,
    pub total_pages: usize,
}

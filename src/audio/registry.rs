use dashmap::DashMap;
use serenity::model::id::GuildId;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use super::queue::{Phase, PlaybackState};

/// Estado compartido de un guild, serializado por su propio mutex
pub type GuildHandle = Arc<Mutex<PlaybackState>>;

/// Dueño de un `PlaybackState` por guild.
///
/// Each guild has its own lock; guilds never contend with each other. A
/// lock-free index of what is playing where is kept next to the states so
/// presence can be computed without touching any guild lock.
pub struct GuildStateRegistry {
    states: DashMap<GuildId, GuildHandle>,
    now_playing: DashMap<GuildId, String>,
    max_queue_size: usize,
}

impl GuildStateRegistry {
    pub fn new(max_queue_size: usize) -> Self {
        Self {
            states: DashMap::new(),
            now_playing: DashMap::new(),
            max_queue_size,
        }
    }

    /// Returns the guild's state, creating an idle one on first use.
    /// Repeated calls for the same guild return the same record.
    pub fn get_or_create(&self, guild_id: GuildId) -> GuildHandle {
        self.states
            .entry(guild_id)
            .or_insert_with(|| {
                debug!("🆕 Estado creado para guild {}", guild_id);
                Arc::new(Mutex::new(PlaybackState::new(guild_id, self.max_queue_size)))
            })
            .clone()
    }

    /// Refresca el índice de reproducción con el estado ya mutado.
    ///
    /// Must be called while the guild lock is still held, after every
    /// transition.
    pub fn sync_index(&self, state: &PlaybackState) {
        match (state.phase(), state.current()) {
            (Phase::Playing, Some(track)) => {
                self.now_playing
                    .insert(state.guild_id(), track.title().to_string());
            }
            _ => {
                self.now_playing.remove(&state.guild_id());
            }
        }
    }

    pub fn count_playing(&self) -> usize {
        self.now_playing.len()
    }

    /// Guilds que están reproduciendo y su título actual, ordenados por id
    pub fn snapshot_playing_titles(&self) -> Vec<(GuildId, String)> {
        let mut titles: Vec<_> = self
            .now_playing
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        titles.sort_by_key(|(guild_id, _)| *guild_id);
        titles
    }

    pub fn guild_count(&self) -> usize {
        self.states.len()
    }
}

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::audio::registry::GuildStateRegistry;

const UNTITLED: &str = "music";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceKind {
    Playing,
    Listening,
}

/// Estado global mostrado por el bot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Presence {
    pub kind: PresenceKind,
    pub text: String,
}

/// API externa de presencia. Must not block.
pub trait PresencePublisher: Send + Sync {
    fn set_presence(&self, presence: &Presence) -> anyhow::Result<()>;
}

/// Deriva una presencia única a partir de todos los guilds
pub struct PresenceAggregator {
    registry: Arc<GuildStateRegistry>,
    publisher: Arc<dyn PresencePublisher>,
    idle_text: String,
    last: Mutex<Option<Presence>>,
}

impl PresenceAggregator {
    pub fn new(
        registry: Arc<GuildStateRegistry>,
        publisher: Arc<dyn PresencePublisher>,
        idle_text: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            publisher,
            idle_text: idle_text.into(),
            last: Mutex::new(None),
        }
    }

    pub fn compute(&self) -> Presence {
        match self.registry.count_playing() {
            0 => Presence {
                kind: PresenceKind::Playing,
                text: self.idle_text.clone(),
            },
            1 => {
                let title = self
                    .registry
                    .snapshot_playing_titles()
                    .into_iter()
                    .next()
                    .map(|(_, title)| title)
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or_else(|| UNTITLED.to_string());
                Presence {
                    kind: PresenceKind::Listening,
                    text: title,
                }
            }
            n => Presence {
                kind: PresenceKind::Listening,
                text: format!("music in {n} communities"),
            },
        }
    }

    /// Recalcula y publica si cambió. Publishing errors are logged only.
    pub fn recompute(&self) -> Presence {
        // Cálculo y publicación en serie para no publicar fuera de orden
        let mut last = self.last.lock();
        let presence = self.compute();

        if last.as_ref() == Some(&presence) {
            return presence;
        }

        match self.publisher.set_presence(&presence) {
            Ok(()) => {
                debug!("🎧 Presencia: {:?} {}", presence.kind, presence.text);
                *last = Some(presence.clone());
            }
            Err(e) => {
                warn!("⚠️ No se pudo actualizar la presencia: {:?}", e);
                *last = None;
            }
        }

        presence
    }
}

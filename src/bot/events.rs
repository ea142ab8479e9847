use serenity::async_trait;
use songbird::{tracks::PlayMode, Event as VoiceEvent, EventContext, EventHandler as VoiceEventHandler};
use tracing::{debug, error};

use crate::audio::voice::{CompletionHandle, TrackOutcome};

/// Reenvía el fin (o el error) de un track al bucle del orquestador
pub struct TrackCompletionNotifier {
    completion: CompletionHandle,
}

impl TrackCompletionNotifier {
    pub fn new(completion: CompletionHandle) -> Self {
        Self { completion }
    }
}

#[async_trait]
impl VoiceEventHandler for TrackCompletionNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<VoiceEvent> {
        let outcome = match ctx {
            EventContext::Track(track_list) => track_list
                .iter()
                .find_map(|(state, _handle)| match &state.playing {
                    PlayMode::Errored(e) => Some(TrackOutcome::Errored(format!("{e:?}"))),
                    _ => None,
                })
                .unwrap_or(TrackOutcome::Finished),
            _ => TrackOutcome::Finished,
        };

        match &outcome {
            TrackOutcome::Errored(reason) => error!(
                "❌ Error en track para guild {} (gen {}): {}",
                self.completion.guild_id(),
                self.completion.generation(),
                reason
            ),
            TrackOutcome::Finished => debug!(
                "🎵 Track terminó en guild {} (gen {})",
                self.completion.guild_id(),
                self.completion.generation()
            ),
        }

        self.completion.complete(outcome);

        // Un solo aviso por track
        Some(VoiceEvent::Cancel)
    }
}

use serenity::{builder::CreateMessage, http::Http, model::id::{ChannelId, GuildId}};
use std::sync::Arc;
use tracing::warn;

use crate::{
    audio::player::{Announcer, Notice},
    messages::Messages,
    ui::embeds,
};

/// Envía los avisos de reproducción al canal de texto
pub struct ChannelAnnouncer {
    http: Arc<Http>,
    messages: Arc<Messages>,
}

impl ChannelAnnouncer {
    pub fn new(http: Arc<Http>, messages: Arc<Messages>) -> Self {
        Self { http, messages }
    }
}

impl Announcer for ChannelAnnouncer {
    fn announce(&self, guild_id: GuildId, channel_id: ChannelId, notice: Notice) {
        let embed = match &notice {
            Notice::NowPlaying(track) => embeds::create_now_playing_embed(track, &self.messages),
            Notice::QueueEmpty => embeds::create_info_embed("Queue", &self.messages.queue_empty),
        };

        let http = self.http.clone();
        tokio::spawn(async move {
            if let Err(e) = channel_id
                .send_message(&http, CreateMessage::new().embed(embed))
                .await
            {
                warn!("⚠️ [{}] No se pudo enviar el aviso a {}: {:?}", guild_id, channel_id, e);
            }
        });
    }
}

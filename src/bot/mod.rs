//! # Bot Module
//!
//! Discord front end: slash command registration and dispatch, voice state
//! tracking and the songbird-backed voice transport.
//!
//! The bot is built around the [`JukeboxBot`] struct, which implements
//! Serenity's [`EventHandler`] trait and forwards everything playback-related
//! to the shared [`PlaybackOrchestrator`].

use anyhow::Result;
use serenity::{
    all::{Context, EventHandler, GuildId, Interaction, Ready, VoiceState},
    async_trait,
};
use std::sync::Arc;
use tracing::{error, info, warn};

pub mod announcer;
pub mod commands;
pub mod events;
pub mod handlers;
pub mod presence;
pub mod voice;

use crate::{
    audio::player::PlaybackOrchestrator, config::Config, messages::Messages,
    presence::PresenceAggregator,
};

use self::presence::ShardPresence;

pub struct JukeboxBot {
    config: Arc<Config>,
    pub orchestrator: Arc<PlaybackOrchestrator>,
    pub messages: Arc<Messages>,
    presence: Arc<PresenceAggregator>,
    shard_presence: Arc<ShardPresence>,
}

impl JukeboxBot {
    pub fn new(
        config: Arc<Config>,
        orchestrator: Arc<PlaybackOrchestrator>,
        messages: Arc<Messages>,
        presence: Arc<PresenceAggregator>,
        shard_presence: Arc<ShardPresence>,
    ) -> Self {
        Self {
            config,
            orchestrator,
            messages,
            presence,
            shard_presence,
        }
    }

    /// Registers slash commands with Discord.
    ///
    /// Per-guild when `GUILD_ID` is configured (near-instant propagation,
    /// useful for development), global otherwise.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);

                if !ctx.cache.guilds().contains(&guild_id) {
                    warn!("⚠️ El bot no está en la guild especificada: {}", guild_id);
                    return Ok(());
                }

                commands::register_guild_commands(ctx, guild_id).await.map_err(|e| {
                    error!("❌ Error registrando comandos de guild: {:?}", e);
                    anyhow::anyhow!("No se pudieron registrar comandos de guild. Verifica el permiso 'applications.commands'.")
                })?;
                info!("✅ Comandos de guild registrados para: {}", guild_id);
            }
            None => {
                commands::register_global_commands(ctx).await.map_err(|e| {
                    error!("❌ Error registrando comandos globales: {:?}", e);
                    anyhow::anyhow!("No se pudieron registrar comandos globales. Verifica el permiso 'applications.commands'.")
                })?;
                info!("✅ Comandos globales registrados");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl EventHandler for JukeboxBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }

        // Presencia inicial una vez que hay shard
        self.shard_presence.attach(ctx.shard.clone());
        self.presence.recompute();
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command_interaction) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command_interaction, self).await {
                error!("Error manejando comando: {:?}", e);
            }
        }
    }

    /// Detects the bot being removed from voice by someone else.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id {
            return;
        }

        if old.is_some() && new.channel_id.is_none() {
            if let Some(guild_id) = new.guild_id {
                info!("🔌 Bot desconectado en guild {}", guild_id);
                self.orchestrator.voice_lost(guild_id).await;
            }
        }
    }
}

use anyhow::Result;
use serenity::{http::Http, model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tracing::{error, info, warn};

mod audio;
mod bot;
mod config;
mod messages;
mod presence;
mod sources;
mod stats;
mod storage;
mod ui;

use crate::audio::{player::PlaybackOrchestrator, registry::GuildStateRegistry};
use crate::bot::{announcer::ChannelAnnouncer, presence::ShardPresence, voice::SongbirdGateway, JukeboxBot};
use crate::config::Config;
use crate::messages::Messages;
use crate::presence::PresenceAggregator;
use crate::sources::{QueryResolver, YtDlp};
use crate::stats::StatsAccumulator;
use crate::storage::JsonStorage;

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("guild_jukebox=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando Guild Jukebox v{}", env!("CARGO_PKG_VERSION"));

    // Cargar configuración
    let config = Arc::new(Config::load()?);
    info!("{}", config.summary());

    let messages = Arc::new(Messages::load(config.messages_file.as_deref())?);

    // Estadísticas persistidas
    let storage = JsonStorage::new(config.data_dir.clone()).await?;
    let stats = Arc::new(StatsAccumulator::load(storage).await);

    // Resolución de consultas con yt-dlp
    let extractor = YtDlp::new(config.ytdlp_path.clone());
    match extractor.version().await {
        Ok(version) => info!("✅ yt-dlp {}", version),
        Err(e) => warn!("⚠️ yt-dlp no disponible, las búsquedas fallarán: {:?}", e),
    }
    let resolver = Arc::new(QueryResolver::new(
        extractor,
        config.resolver_workers,
        config.max_playlist_size,
    ));

    let registry = Arc::new(GuildStateRegistry::new(config.max_queue_size));
    let shard_presence = Arc::new(ShardPresence::new());
    let presence = Arc::new(PresenceAggregator::new(
        registry.clone(),
        shard_presence.clone(),
        config.idle_presence.clone(),
    ));

    let songbird = Songbird::serenity();
    let http = Arc::new(Http::new(&config.discord_token));

    let orchestrator = Arc::new(PlaybackOrchestrator::new(
        registry,
        resolver,
        Arc::new(SongbirdGateway::new(songbird.clone())?),
        presence.clone(),
        stats.clone(),
        Arc::new(ChannelAnnouncer::new(http, messages.clone())),
        config.disconnect_grace,
    ));
    tokio::spawn(orchestrator.clone().run());

    // Configurar intents mínimos necesarios
    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;

    // Crear handler del bot
    let handler = JukeboxBot::new(
        config.clone(),
        orchestrator,
        messages,
        presence,
        shard_presence,
    );

    // Construir cliente
    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird)
        .await?;

    // Manejar shutdown graceful
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Error al registrar Ctrl+C: {:?}", e);
            return;
        }
        info!("⚠️ Señal de shutdown recibida, cerrando...");
        stats.flush().await;
        shard_manager.shutdown_all().await;
    });

    // Iniciar bot
    info!("🚀 Bot iniciado exitosamente");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {:?}", why);
    }

    Ok(())
}

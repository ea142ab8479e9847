use anyhow::Result;
use serenity::{
    builder::{
        CreateEmbed, CreateInteractionResponse, CreateInteractionResponseMessage,
        EditInteractionResponse,
    },
    model::{
        application::CommandInteraction,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tracing::{info, warn};

use crate::{
    audio::player::{EnqueueOutcome, PlayError, PlayRequest, SkipOutcome},
    bot::JukeboxBot,
    messages::Messages,
    sources::ResolutionError,
    ui::embeds,
};

/// Maneja comandos slash
pub async fn handle_command(ctx: &Context, command: CommandInteraction, bot: &JukeboxBot) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Comando usado fuera de un servidor"))?;

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    match command.data.name.as_str() {
        "play" => handle_play(ctx, command, guild_id, bot).await?,
        "skip" => handle_skip(ctx, command, guild_id, bot).await?,
        "stop" => handle_stop(ctx, command, guild_id, bot).await?,
        "queue" => handle_queue(ctx, command, guild_id, bot).await?,
        "nowplaying" => handle_nowplaying(ctx, command, guild_id, bot).await?,
        "stats" => handle_stats(ctx, command, bot).await?,
        _ => {
            command
                .create_response(
                    &ctx.http,
                    CreateInteractionResponse::Message(
                        CreateInteractionResponseMessage::new()
                            .content("❌ Unknown command")
                            .ephemeral(true),
                    ),
                )
                .await?;
        }
    }

    Ok(())
}

async fn respond(ctx: &Context, command: &CommandInteraction, embed: CreateEmbed) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(CreateInteractionResponseMessage::new().embed(embed)),
        )
        .await?;
    Ok(())
}

async fn handle_play(
    ctx: &Context,
    command: CommandInteraction,
    guild_id: GuildId,
    bot: &JukeboxBot,
) -> Result<()> {
    let query = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "query")
        .and_then(|opt| opt.value.as_str())
        .ok_or_else(|| anyhow::anyhow!("Query no proporcionado"))?
        .to_string();

    // Defer la respuesta ya que la resolución puede tardar
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    let request = PlayRequest {
        guild_id,
        text_channel: command.channel_id,
        voice_channel: get_user_voice_channel(ctx, guild_id, command.user.id),
        requested_by: command.user.id,
        query,
    };

    let messages = &bot.messages;
    let embed = match bot.orchestrator.enqueue(request).await {
        Ok(EnqueueOutcome::NowPlaying { track, queued }) => {
            let mut description = format!("**{}**", track.title());
            if queued > 0 {
                description.push_str(&format!("\n+{} queued", queued));
            }
            embeds::create_info_embed(&messages.now_playing, &description)
        }
        Ok(EnqueueOutcome::Queued {
            first,
            added,
            position,
        }) => {
            if added == 1 {
                embeds::create_track_added_embed(&first, position, messages)
            } else {
                embeds::create_playlist_added_embed(added, position, messages)
            }
        }
        Err(e) => {
            warn!("⚠️ [{}] /play falló: {}", guild_id, e);
            let (title, description) = play_error_text(&e, messages);
            embeds::create_error_embed(title, &description)
        }
    };

    command
        .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
        .await?;

    Ok(())
}

/// Título y texto para cada fallo de /play
pub fn play_error_text(error: &PlayError, messages: &Messages) -> (&'static str, String) {
    match error {
        PlayError::NotInVoiceChannel => ("Not in voice", messages.not_in_voice.clone()),
        PlayError::Resolution(ResolutionError::NotFound(_)) => ("Not found", messages.not_found.clone()),
        PlayError::Resolution(ResolutionError::UnsupportedFormat(_)) => {
            ("Unsupported", messages.unsupported.clone())
        }
        PlayError::Resolution(ResolutionError::Network(_)) => {
            ("Source unavailable", messages.network_error.clone())
        }
        PlayError::Connection(_) => ("Voice error", messages.connection_failed.clone()),
        PlayError::QueueFull { max_size } => (
            "Queue full",
            Messages::render(&messages.queue_full, &[("count", max_size.to_string())]),
        ),
        PlayError::Playback(_) => ("Playback error", messages.playback_failed.clone()),
    }
}

async fn handle_skip(
    ctx: &Context,
    command: CommandInteraction,
    guild_id: GuildId,
    bot: &JukeboxBot,
) -> Result<()> {
    let embed = match bot.orchestrator.skip(guild_id).await {
        SkipOutcome::Skipped(track) => {
            let title = track.as_ref().map_or("-", |t| t.title());
            embeds::create_info_embed(
                "Skip",
                &Messages::render(&bot.messages.skipped, &[("title", title.to_string())]),
            )
        }
        SkipOutcome::NothingPlaying => embeds::create_warning_embed("Skip", &bot.messages.nothing_playing),
    };

    respond(ctx, &command, embed).await
}

async fn handle_stop(
    ctx: &Context,
    command: CommandInteraction,
    guild_id: GuildId,
    bot: &JukeboxBot,
) -> Result<()> {
    bot.orchestrator.stop(guild_id).await;

    respond(ctx, &command, embeds::create_info_embed("Stop", &bot.messages.stopped)).await
}

async fn handle_queue(
    ctx: &Context,
    command: CommandInteraction,
    guild_id: GuildId,
    bot: &JukeboxBot,
) -> Result<()> {
    let page = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "page")
        .and_then(|opt| opt.value.as_i64())
        .unwrap_or(1)
        .max(1) as usize;

    let status = bot.orchestrator.queue_status(guild_id).await;
    let embed = embeds::create_queue_embed(&status, page, &bot.messages);

    respond(ctx, &command, embed).await
}

async fn handle_nowplaying(
    ctx: &Context,
    command: CommandInteraction,
    guild_id: GuildId,
    bot: &JukeboxBot,
) -> Result<()> {
    let embed = match bot.orchestrator.now_playing(guild_id).await {
        Some(track) => embeds::create_now_playing_embed(&track, &bot.messages),
        None => embeds::create_warning_embed(&bot.messages.now_playing, &bot.messages.nothing_playing),
    };

    respond(ctx, &command, embed).await
}

async fn handle_stats(ctx: &Context, command: CommandInteraction, bot: &JukeboxBot) -> Result<()> {
    let report = bot.orchestrator.stats().report();

    respond(ctx, &command, embeds::create_stats_embed(&report, &bot.messages)).await
}

fn get_user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;

    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}

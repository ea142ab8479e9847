use num_format::{Locale, ToFormattedString};
use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};
use std::time::Duration;

use crate::{
    audio::{queue::QueueStatus, track::Track},
    messages::Messages,
    stats::StatsReport,
};

pub const QUEUE_PAGE_SIZE: usize = 10;

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const WARNING_ORANGE: Colour = Colour::from_rgb(255, 193, 7);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Guild Jukebox";

fn duration_label(track: &Track) -> String {
    if track.has_known_duration() {
        format_duration(track.duration())
    } else {
        "🔴 Live".to_string()
    }
}

fn requester_label(track: &Track) -> String {
    track
        .requested_by()
        .map_or_else(|| "-".to_string(), |user| format!("<@{}>", user))
}

/// Crea un embed para mostrar la canción actual
pub fn create_now_playing_embed(track: &Track, messages: &Messages) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title(format!("🎵 {}", messages.now_playing))
        .description(format!("**{}**", track.title()))
        .color(colors::SUCCESS_GREEN)
        .field("⏱️ Duration", duration_label(track), true)
        .field("👤 Requested by", requester_label(track), true);

    if let Some(thumbnail) = track.thumbnail() {
        embed = embed.thumbnail(thumbnail);
    }

    if track.locator().starts_with("http") {
        embed = embed.url(track.locator());
    }

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed para mostrar que se agregó una canción
pub fn create_track_added_embed(track: &Track, position: usize, messages: &Messages) -> CreateEmbed {
    let description = Messages::render(
        &messages.added_to_queue,
        &[("title", track.title().to_string()), ("position", position.to_string())],
    );

    let mut embed = CreateEmbed::default()
        .title("✅ Queued")
        .description(description)
        .color(colors::SUCCESS_GREEN)
        .field("⏱️ Duration", duration_label(track), true)
        .field("📍 Position", position.to_string(), true);

    if let Some(thumbnail) = track.thumbnail() {
        embed = embed.thumbnail(thumbnail);
    }

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed para mostrar que una playlist fue agregada
pub fn create_playlist_added_embed(added: usize, position: usize, messages: &Messages) -> CreateEmbed {
    let description = Messages::render(
        &messages.playlist_added,
        &[("count", added.to_string()), ("position", position.to_string())],
    );

    CreateEmbed::default()
        .title("📋 Playlist queued")
        .description(description)
        .color(colors::MUSIC_PURPLE)
        .field("📊 Tracks added", added.to_string(), true)
        .footer(CreateEmbedFooter::new("Use /queue to see every track"))
        .timestamp(Timestamp::now())
}

/// Crea un embed para mostrar la cola de reproducción
pub fn create_queue_embed(status: &QueueStatus, page: usize, messages: &Messages) -> CreateEmbed {
    let queue_page = status.get_page(page, QUEUE_PAGE_SIZE);

    let mut embed = CreateEmbed::default()
        .title("📋 Queue")
        .color(colors::INFO_BLUE);

    if status.current.is_none() && status.upcoming.is_empty() {
        return embed
            .description(format!("😴 {}\n\n💡 `/play <query>`", messages.nothing_playing))
            .color(colors::NEUTRAL_GRAY)
            .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
            .timestamp(Timestamp::now());
    }

    if let Some(current) = &status.current {
        embed = embed.field(
            "▶️ Playing",
            format!("**{}** `[{}]`", current.title(), duration_label(current)),
            false,
        );
    }

    if !queue_page.items.is_empty() {
        let description: String = queue_page
            .items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                format!(
                    "**{}**. {} `[{}]`\n",
                    queue_page.first_position + i,
                    item.title(),
                    duration_label(item)
                )
            })
            .collect();

        embed = embed.field("Up next", description, false);
    }

    let mut info = format!("**Total:** {} tracks", status.upcoming.len());
    if status.total_duration > Duration::ZERO {
        info.push_str(&format!(" • **Duration:** {}", format_duration(status.total_duration)));
    }
    embed = embed.field("Info", info, false);

    // Paginación
    let footer = if queue_page.total_pages > 1 {
        format!(
            "Page {} of {} • Guild Jukebox",
            queue_page.current_page, queue_page.total_pages
        )
    } else {
        STANDARD_FOOTER.to_string()
    };

    embed
        .footer(CreateEmbedFooter::new(footer))
        .timestamp(Timestamp::now())
}

pub fn create_stats_embed(report: &StatsReport, messages: &Messages) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("📊 {}", messages.stats_header))
        .color(colors::MUSIC_PURPLE)
        .field(
            "🎵 Tracks played",
            report.total_tracks.to_formatted_string(&Locale::en),
            true,
        )
        .field("⏱️ Hours played", format!("{:.2}", report.total_hours), true)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
        .timestamp(Timestamp::now())
}

/// Crea un embed de error
pub fn create_error_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("❌ {}", title))
        .description(description)
        .color(colors::ERROR_RED)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed de información
pub fn create_info_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("ℹ️ {}", title))
        .description(description)
        .color(colors::INFO_BLUE)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

pub fn create_warning_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("⚠️ {}", title))
        .description(description)
        .color(colors::WARNING_ORANGE)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Formatea una duración en formato legible
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

use poise::serenity_prelude::{Colour, CreateEmbed, CreateEmbedAuthor};

use crate::domain::track::{Track, TrackSource};
use crate::services::error::MusicError;
use crate::services::player_service::{PlayOutcome, PlayRequest};
use crate::{Context, Error};

pub const WEB_ICON: &str = "https://www.gstatic.com/images/branding/product/2x/youtube_64dp.png";

const WEB_COLOR: Colour = Colour::new(0xFF0000);
const FILE_COLOR: Colour = Colour::new(0x95A5A6);

pub fn source_info(source: &TrackSource) -> (Colour, &'static str) {
    match source {
        TrackSource::Remote(_) => (WEB_COLOR, "Stream"),
        TrackSource::File(_) => (FILE_COLOR, "Local file"),
    }
}

pub fn linked_title(track: &Track) -> String {
    let label = match &track.uploader {
        Some(uploader) => format!("**{}** - {}", track.title, uploader),
        None => format!("**{}**", track.title),
    };
    match track.source.web_url() {
        Some(url) => format!("[{label}]({url})"),
        None => label,
    }
}

fn enqueue_embed(track: &Track, position: usize) -> CreateEmbed {
    let (color, source_name) = source_info(&track.source);

    CreateEmbed::new()
        .author(CreateEmbedAuthor::new(source_name).icon_url(WEB_ICON))
        .description(format!(
            "Added {} - `{}` to the queue at position `{position}`.",
            linked_title(track),
            track.display_duration()
        ))
        .colour(color)
}

pub fn now_playing_embed(track: &Track) -> CreateEmbed {
    let (color, _) = source_info(&track.source);
    let requester = track.requester.as_deref().unwrap_or("someone");

    let mut embed = CreateEmbed::new()
        .title("Now playing")
        .description(format!(
            "{} - `{}`\n\nRequested by {}",
            linked_title(track),
            track.display_duration(),
            requester
        ))
        .colour(color);

    if let Some(url) = &track.thumbnail_url {
        embed = embed.thumbnail(url);
    }

    embed
}

fn collection_embed(outcome: &PlayOutcome) -> CreateEmbed {
    let total: u64 = outcome.enqueued.iter().map(|t| t.duration).sum();

    CreateEmbed::new()
        .description(format!(
            "Added `{}` tracks to the queue (`{}` total).",
            outcome.enqueued.len(),
            crate::domain::track::format_duration(total)
        ))
        .colour(WEB_COLOR)
}

/// Play a song from a URL, a search query or the local media folder
#[poise::command(slash_command, guild_only)]
pub async fn play(
    ctx: Context<'_>,
    #[description = "URL, search query or media file name"] query: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or(MusicError::NotInGuild)?;

    let voice_channel_id = {
        let guild = ctx.guild().ok_or(MusicError::NotInGuild)?;
        guild
            .voice_states
            .get(&ctx.author().id)
            .and_then(|vs| vs.channel_id)
            .ok_or(MusicError::NotInVoiceChannel)?
    };

    ctx.defer().await?;

    let outcome = ctx
        .data()
        .player
        .play(PlayRequest {
            guild_id,
            voice_channel_id,
            text_channel_id: ctx.channel_id(),
            requester: format!("<@{}>", ctx.author().id),
            query,
        })
        .await?;

    let mut reply = poise::CreateReply::default();
    if outcome.enqueued.len() > 1 {
        reply = reply.embed(collection_embed(&outcome));
    }
    match &outcome.started {
        Some(track) => reply = reply.embed(now_playing_embed(track)),
        None => {
            if let [track] = outcome.enqueued.as_slice() {
                reply = reply.embed(enqueue_embed(track, outcome.position));
            }
        }
    }

    ctx.send(reply).await?;
    Ok(())
}

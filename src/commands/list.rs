use poise::serenity_prelude::{Colour, CreateEmbed, CreateEmbedFooter};

use crate::commands::play::{linked_title, now_playing_embed};
use crate::domain::queue::LoopMode;
use crate::services::error::MusicError;
use crate::{Context, Error};

const QUEUE_COLOR: Colour = Colour::new(0x5865F2);
const MAX_DISPLAY: usize = 10;

/// Show the current music queue
#[poise::command(slash_command, guild_only)]
pub async fn list(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or(MusicError::NotInGuild)?;

    let snapshot = ctx.data().player.snapshot(guild_id).await;
    let Some(current) = &snapshot.current else {
        return Err(MusicError::NothingPlaying.into());
    };

    let mut reply = poise::CreateReply::default().embed(now_playing_embed(current));

    if !snapshot.pending.is_empty() {
        let mut desc = String::new();
        for (i, track) in snapshot.pending.iter().take(MAX_DISPLAY).enumerate() {
            desc.push_str(&format!(
                "`{}.` {} {} - `{}`\n",
                i + 1,
                track.source,
                linked_title(track),
                track.display_duration()
            ));
        }

        let remaining = snapshot.pending.len().saturating_sub(MAX_DISPLAY);
        let mut footer_text = if remaining > 0 {
            format!("{} tracks in queue (+{} more)", snapshot.pending.len(), remaining)
        } else {
            format!("{} tracks in queue", snapshot.pending.len())
        };
        if snapshot.loop_mode != LoopMode::Off {
            footer_text.push_str(&format!(" · loop: {}", snapshot.loop_mode));
        }
        if snapshot.skip_votes > 0 {
            footer_text.push_str(&format!(" · {} skip votes", snapshot.skip_votes));
        }
        if snapshot.idle {
            footer_text.push_str(" · leaving soon if nothing plays");
        }

        let queue_embed = CreateEmbed::new()
            .title("Up next")
            .description(desc)
            .colour(QUEUE_COLOR)
            .footer(CreateEmbedFooter::new(footer_text));

        reply = reply.embed(queue_embed);
    }

    ctx.send(reply).await?;
    Ok(())
}

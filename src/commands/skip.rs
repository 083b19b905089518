use poise::serenity_prelude::Member;

use crate::services::error::MusicError;
use crate::services::player_service::SkipOutcome;
use crate::{Context, Error};

/// Interaction members carry their resolved permissions.
pub fn is_admin(member: Option<&Member>) -> bool {
    member
        .and_then(|m| m.permissions)
        .is_some_and(|p| p.administrator())
}

pub fn skip_message(outcome: &SkipOutcome) -> String {
    match outcome {
        SkipOutcome::Skipped(track) => format!("Skipped: **{}**", track.title),
        SkipOutcome::Pending { votes, required } => {
            format!("Vote to skip registered (`{votes}/{required}`).")
        }
    }
}

/// Skip the current track, or vote to skip it
#[poise::command(slash_command, guild_only)]
pub async fn skip(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or(MusicError::NotInGuild)?;
    let admin = is_admin(ctx.author_member().await.as_deref());

    let outcome = ctx
        .data()
        .player
        .skip(guild_id, ctx.author().id, admin)
        .await?;

    ctx.say(skip_message(&outcome)).await?;
    Ok(())
}

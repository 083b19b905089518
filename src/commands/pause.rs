use crate::services::error::MusicError;
use crate::{Context, Error};

/// Pause the current track
#[poise::command(slash_command, guild_only)]
pub async fn pause(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or(MusicError::NotInGuild)?;

    let track = ctx.data().player.pause(guild_id).await?;

    ctx.say(format!("Paused **{}**.", track.title)).await?;
    Ok(())
}

/// Resume the paused track
#[poise::command(slash_command, guild_only)]
pub async fn resume(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or(MusicError::NotInGuild)?;

    let track = ctx.data().player.resume(guild_id).await?;

    ctx.say(format!("Resumed **{}**.", track.title)).await?;
    Ok(())
}

use crate::domain::queue::LoopMode;
use crate::services::error::MusicError;
use crate::{Context, Error};

#[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
pub enum LoopChoice {
    #[name = "off"]
    Off,
    #[name = "track"]
    Track,
    #[name = "queue"]
    Queue,
}

impl From<LoopChoice> for LoopMode {
    fn from(choice: LoopChoice) -> Self {
        match choice {
            LoopChoice::Off => LoopMode::Off,
            LoopChoice::Track => LoopMode::Track,
            LoopChoice::Queue => LoopMode::Queue,
        }
    }
}

/// Remove a track from the queue
#[poise::command(slash_command, guild_only)]
pub async fn remove(
    ctx: Context<'_>,
    #[description = "Position in the queue (1 = next up)"]
    #[min = 1]
    position: usize,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or(MusicError::NotInGuild)?;

    let removed = ctx.data().player.remove(guild_id, position).await?;

    ctx.say(format!("Removed **{}** from the queue.", removed.title))
        .await?;
    Ok(())
}

/// Shuffle the upcoming tracks
#[poise::command(slash_command, guild_only)]
pub async fn shuffle(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or(MusicError::NotInGuild)?;

    let count = ctx.data().player.shuffle(guild_id).await;
    if count == 0 {
        return Err("There is nothing queued to shuffle".into());
    }

    ctx.say(format!("Shuffled `{count}` tracks.")).await?;
    Ok(())
}

/// Repeat the current track, the whole queue, or nothing
#[poise::command(slash_command, guild_only, rename = "loop")]
pub async fn loop_mode(
    ctx: Context<'_>,
    #[description = "Loop mode"] mode: LoopChoice,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or(MusicError::NotInGuild)?;

    let mode = LoopMode::from(mode);
    ctx.data().player.set_loop_mode(guild_id, mode).await;

    ctx.say(format!("Loop mode set to `{mode}`.")).await?;
    Ok(())
}

use poise::serenity_prelude::{
    self as serenity, ButtonStyle, ComponentInteraction, CreateActionRow, CreateButton,
    CreateInteractionResponse, CreateInteractionResponseMessage, GuildId,
};

use crate::commands::play::now_playing_embed;
use crate::commands::skip::{is_admin, skip_message};
use crate::services::error::MusicError;
use crate::{Context, Data, Error};

pub fn build_now_playing_components(guild_id: GuildId, paused: bool) -> Vec<CreateActionRow> {
    let pause_label = if paused { "▶ Resume" } else { "⏸ Pause" };

    let row = CreateActionRow::Buttons(vec![
        CreateButton::new(format!("np_pause_{guild_id}"))
            .label(pause_label)
            .style(ButtonStyle::Primary),
        CreateButton::new(format!("np_skip_{guild_id}"))
            .label("⏭ Skip")
            .style(ButtonStyle::Secondary),
        CreateButton::new(format!("np_stop_{guild_id}"))
            .label("⏹ Stop")
            .style(ButtonStyle::Danger),
    ]);

    vec![row]
}

/// Show the track that is playing, with playback controls
#[poise::command(slash_command, guild_only, rename = "nowplaying")]
pub async fn now_playing(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or(MusicError::NotInGuild)?;

    let snapshot = ctx.data().player.snapshot(guild_id).await;
    let current = snapshot.current.ok_or(MusicError::NothingPlaying)?;

    let reply = poise::CreateReply::default()
        .embed(now_playing_embed(&current))
        .components(build_now_playing_components(guild_id, snapshot.paused));

    ctx.send(reply).await?;
    Ok(())
}

fn parse_custom_id(custom_id: &str) -> Option<(&str, GuildId)> {
    // Format: np_{action}_{guild_id}
    let rest = custom_id.strip_prefix("np_")?;
    let (action, guild_id_str) = rest.rsplit_once('_')?;
    let guild_id: u64 = guild_id_str.parse().ok()?;
    if guild_id == 0 {
        return None;
    }
    Some((action, GuildId::new(guild_id)))
}

pub async fn handle_now_playing_interaction(
    ctx: &serenity::Context,
    component: &ComponentInteraction,
    data: &Data,
) {
    let Some((action, guild_id)) = parse_custom_id(&component.data.custom_id) else {
        return;
    };
    if component.guild_id != Some(guild_id) {
        return;
    }

    match action {
        "pause" => handle_pause(ctx, component, data, guild_id).await,
        "skip" => {
            let admin = is_admin(component.member.as_ref());
            let msg = match data.player.skip(guild_id, component.user.id, admin).await {
                Ok(outcome) => skip_message(&outcome),
                Err(e) => e.to_string(),
            };
            send_ephemeral(ctx, component, &msg).await;
        }
        "stop" => {
            let msg = match data.player.stop(guild_id).await {
                Ok(()) => "Stopped playback and cleared the queue.".to_string(),
                Err(e) => e.to_string(),
            };
            send_ephemeral(ctx, component, &msg).await;
        }
        _ => {}
    }
}

async fn handle_pause(
    ctx: &serenity::Context,
    component: &ComponentInteraction,
    data: &Data,
    guild_id: GuildId,
) {
    let now_paused = match data.player.toggle_pause(guild_id).await {
        Ok(paused) => paused,
        Err(e) => {
            send_ephemeral(ctx, component, &e.to_string()).await;
            return;
        }
    };

    // Update the message with toggled button
    let components = build_now_playing_components(guild_id, now_paused);

    let response = CreateInteractionResponse::UpdateMessage(
        CreateInteractionResponseMessage::new().components(components),
    );

    if let Err(e) = component.create_response(&ctx.http, response).await {
        tracing::warn!("Failed to respond to pause interaction: {e}");
    }
}

async fn send_ephemeral(
    ctx: &serenity::Context,
    component: &ComponentInteraction,
    content: &str,
) {
    let response = CreateInteractionResponse::Message(
        CreateInteractionResponseMessage::new()
            .content(content)
            .ephemeral(true),
    );

    if let Err(e) = component.create_response(&ctx.http, response).await {
        tracing::warn!("Failed to respond to component interaction: {e}");
    }
}

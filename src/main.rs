mod commands;
mod config;
mod domain;
mod infrastructure;
mod services;

use std::sync::Arc;

use poise::serenity_prelude as serenity;
use songbird::SerenityInit;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use config::Config;
use infrastructure::notifier::DiscordNotifier;
use infrastructure::spotify::SpotifyClient;
use infrastructure::voice::SongbirdBackend;
use infrastructure::ytdlp::YtDlp;
use services::music_service::MusicService;
use services::player_service::PlayerService;

pub struct Data {
    pub player: PlayerService,
}

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;

async fn handle_event(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::InteractionCreate { interaction } => {
            if let Some(component) = interaction.as_message_component() {
                if component.data.custom_id.starts_with("np_") {
                    commands::now_playing::handle_now_playing_interaction(ctx, component, data)
                        .await;
                }
            }
        }
        serenity::FullEvent::VoiceStateUpdate { new, .. } => {
            // The bot itself was disconnected (kicked, channel deleted, or left).
            if new.user_id == ctx.cache.current_user().id && new.channel_id.is_none() {
                if let Some(guild_id) = new.guild_id {
                    data.player.forget(guild_id).await;
                }
            }
        }
        _ => {}
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    dotenvy::dotenv().ok();
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Configuration error: {e}");
            return;
        }
    };

    let http_client = reqwest::Client::new();

    let spotify = match (&config.spotify_client_id, &config.spotify_client_secret) {
        (Some(id), Some(secret)) => match SpotifyClient::new(id, secret).await {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::warn!("Spotify disabled, token request failed: {e}");
                None
            }
        },
        _ => None,
    };
    let music_service = MusicService::new(
        spotify,
        YtDlp::new(config.ytdlp_path.clone(), config.ytdlp_timeout),
        config.media_dir.clone(),
        config.max_playlist_tracks,
    );
    let settings = config.player_settings();

    let intents =
        serenity::GatewayIntents::non_privileged() | serenity::GatewayIntents::GUILD_VOICE_STATES;

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands::all(),
            event_handler: |ctx, event, _framework, data| Box::pin(handle_event(ctx, event, data)),
            on_error: |error| {
                Box::pin(async move {
                    match error {
                        poise::FrameworkError::Command { error, ctx, .. } => {
                            let msg = error.to_string();
                            tracing::warn!("Command error: {msg}");
                            let _ = ctx.say(format!("❌ {msg}")).await;
                        }
                        other => {
                            if let Err(e) = poise::builtins::on_error(other).await {
                                tracing::error!("Error handling error: {e}");
                            }
                        }
                    }
                })
            },
            ..Default::default()
        })
        .setup(move |ctx, _ready, framework| {
            Box::pin(async move {
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;

                let manager = songbird::get(ctx)
                    .await
                    .ok_or("Songbird not registered")?;
                let (events_tx, events_rx) = mpsc::unbounded_channel();
                let backend =
                    SongbirdBackend::new(manager, ctx.cache.clone(), http_client, events_tx);

                let player = PlayerService::new(
                    Arc::new(backend),
                    Arc::new(music_service),
                    Arc::new(DiscordNotifier::new(ctx.http.clone())),
                    settings,
                );
                tokio::spawn(player.clone().run(events_rx));

                tracing::info!("Bot is ready!");
                Ok(Data { player })
            })
        })
        .build();

    let mut client = match serenity::ClientBuilder::new(&config.discord_token, intents)
        .framework(framework)
        .register_songbird()
        .await
    {
        Ok(client) => client,
        Err(e) => {
            tracing::error!("Failed to create client: {e}");
            return;
        }
    };

    if let Err(e) = client.start().await {
        tracing::error!("Client error: {e}");
    }
}

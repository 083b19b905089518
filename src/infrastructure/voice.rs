use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use poise::serenity_prelude::{Cache, ChannelId, GuildId};
use songbird::Songbird;
use songbird::events::{Event, EventContext, EventHandler, TrackEvent};
use songbird::tracks::{PlayMode, TrackHandle};
use tokio::sync::RwLock;
use tokio::sync::mpsc::UnboundedSender;

use crate::domain::track::{Track, TrackSource};
use crate::infrastructure::audio::AudioSource;
use crate::services::backend::{Listener, PlayerEvent, VoiceBackend};
use crate::services::error::BackendError;

/// Forwards the end (or failure) of one track to the player event loop.
#[derive(Clone)]
struct TrackEndNotifier {
    guild_id: GuildId,
    playback_id: u64,
    events: UnboundedSender<PlayerEvent>,
}

#[async_trait]
impl EventHandler for TrackEndNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let error = match ctx {
            EventContext::Track(tracks) => {
                tracks
                    .iter()
                    .find_map(|(state, _)| match &state.playing {
                        PlayMode::Errored(e) => Some(format!("{e:?}")),
                        _ => None,
                    })
            }
            _ => None,
        };

        let event = PlayerEvent::TrackFinished {
            guild_id: self.guild_id,
            playback_id: self.playback_id,
            error,
        };
        if self.events.send(event).is_err() {
            tracing::warn!(guild_id = %self.guild_id, "player event loop is gone");
        }
        None
    }
}

/// [`VoiceBackend`] over songbird calls, with listeners read from the serenity cache.
pub struct SongbirdBackend {
    manager: Arc<Songbird>,
    cache: Arc<Cache>,
    http: reqwest::Client,
    events: UnboundedSender<PlayerEvent>,
    handles: RwLock<HashMap<GuildId, TrackHandle>>,
}

impl SongbirdBackend {
    pub fn new(
        manager: Arc<Songbird>,
        cache: Arc<Cache>,
        http: reqwest::Client,
        events: UnboundedSender<PlayerEvent>,
    ) -> Self {
        Self {
            manager,
            cache,
            http,
            events,
            handles: RwLock::new(HashMap::new()),
        }
    }

    async fn current_channel(&self, guild_id: GuildId) -> Option<ChannelId> {
        let call = self.manager.get(guild_id)?;
        let channel = call.lock().await.current_channel()?;
        Some(ChannelId::new(channel.0.get()))
    }

    async fn handle(&self, guild_id: GuildId) -> Option<TrackHandle> {
        self.handles.read().await.get(&guild_id).cloned()
    }
}

#[async_trait]
impl VoiceBackend for SongbirdBackend {
    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<(), BackendError> {
        if self.current_channel(guild_id).await == Some(channel_id) {
            return Ok(());
        }
        self.manager
            .join(guild_id, channel_id)
            .await
            .map_err(|e| BackendError::Join(e.to_string()))?;
        tracing::info!(%guild_id, %channel_id, "joined voice channel");
        Ok(())
    }

    async fn disconnect(&self, guild_id: GuildId) -> Result<(), BackendError> {
        self.handles.write().await.remove(&guild_id);
        self.manager
            .remove(guild_id)
            .await
            .map_err(|_| BackendError::NotConnected)
    }

    async fn play(
        &self,
        guild_id: GuildId,
        track: &Track,
        playback_id: u64,
    ) -> Result<(), BackendError> {
        if let TrackSource::File(path) = &track.source {
            if !tokio::fs::try_exists(path).await.unwrap_or(false) {
                return Err(BackendError::FileMissing(path.clone()));
            }
        }

        let call = self.manager.get(guild_id).ok_or(BackendError::NotConnected)?;
        let input = AudioSource::from_source(self.http.clone(), &track.source);

        let handle = {
            let mut handler = call.lock().await;
            handler.play_only_input(input)
        };

        let notifier = TrackEndNotifier {
            guild_id,
            playback_id,
            events: self.events.clone(),
        };
        for event in [TrackEvent::End, TrackEvent::Error] {
            handle
                .add_event(Event::Track(event), notifier.clone())
                .map_err(|e| BackendError::Playback(e.to_string()))?;
        }

        self.handles.write().await.insert(guild_id, handle);
        Ok(())
    }

    async fn stop(&self, guild_id: GuildId) {
        if let Some(handle) = self.handles.write().await.remove(&guild_id) {
            let _ = handle.stop();
        }
    }

    async fn pause(&self, guild_id: GuildId) -> Result<(), BackendError> {
        let handle = self.handle(guild_id).await.ok_or(BackendError::NotConnected)?;
        handle
            .pause()
            .map_err(|e| BackendError::Playback(e.to_string()))
    }

    async fn resume(&self, guild_id: GuildId) -> Result<(), BackendError> {
        let handle = self.handle(guild_id).await.ok_or(BackendError::NotConnected)?;
        handle
            .play()
            .map_err(|e| BackendError::Playback(e.to_string()))
    }

    async fn is_playing(&self, guild_id: GuildId) -> bool {
        let Some(handle) = self.handle(guild_id).await else {
            return false;
        };
        match handle.get_info().await {
            Ok(state) => matches!(state.playing, PlayMode::Play),
            Err(_) => false,
        }
    }

    async fn is_connected(&self, guild_id: GuildId) -> bool {
        self.current_channel(guild_id).await.is_some()
    }

    async fn channel_members(&self, guild_id: GuildId) -> Vec<Listener> {
        let Some(channel_id) = self.current_channel(guild_id).await else {
            return Vec::new();
        };
        let Some(guild) = self.cache.guild(guild_id) else {
            return Vec::new();
        };

        guild
            .voice_states
            .values()
            .filter(|vs| vs.channel_id == Some(channel_id))
            .map(|vs| {
                let is_bot = vs
                    .member
                    .as_ref()
                    .map(|m| m.user.bot)
                    .or_else(|| guild.members.get(&vs.user_id).map(|m| m.user.bot))
                    .unwrap_or(false);
                Listener {
                    id: vs.user_id,
                    is_bot,
                }
            })
            .collect()
    }
}

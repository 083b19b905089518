use async_trait::async_trait;
use poise::serenity_prelude::{ChannelId, GuildId, UserId};

use crate::domain::track::Track;
use crate::services::error::{BackendError, MusicError};

/// A member of the bot's voice channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Listener {
    pub id: UserId,
    pub is_bot: bool,
}

/// Sent by the voice backend when a started track stops for any reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    TrackFinished {
        guild_id: GuildId,
        playback_id: u64,
        error: Option<String>,
    },
}

/// Voice connection and audio output for all guilds.
///
/// `play` must report the end of every track it starts by sending
/// [`PlayerEvent::TrackFinished`] tagged with the given `playback_id`.
#[async_trait]
pub trait VoiceBackend: Send + Sync {
    /// Joins `channel_id`, moving there if already connected elsewhere.
    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<(), BackendError>;
    async fn disconnect(&self, guild_id: GuildId) -> Result<(), BackendError>;
    async fn play(
        &self,
        guild_id: GuildId,
        track: &Track,
        playback_id: u64,
    ) -> Result<(), BackendError>;
    async fn stop(&self, guild_id: GuildId);
    async fn pause(&self, guild_id: GuildId) -> Result<(), BackendError>;
    async fn resume(&self, guild_id: GuildId) -> Result<(), BackendError>;
    async fn is_playing(&self, guild_id: GuildId) -> bool;
    async fn is_connected(&self, guild_id: GuildId) -> bool;
    async fn channel_members(&self, guild_id: GuildId) -> Vec<Listener>;
}

#[async_trait]
pub trait QueryResolver: Send + Sync {
    /// Turns a user query into playable tracks. Never returns an empty list.
    async fn resolve(&self, query: &str, requester: &str) -> Result<Vec<Track>, MusicError>;
}

/// Fire-and-forget text output. Implementations log delivery failures.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, channel_id: ChannelId, text: String);
}

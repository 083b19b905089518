use std::sync::Arc;

use async_trait::async_trait;
use poise::serenity_prelude::{ChannelId, CreateMessage, Http};

use crate::services::backend::Notifier;

pub struct DiscordNotifier {
    http: Arc<Http>,
}

impl DiscordNotifier {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn send(&self, channel_id: ChannelId, text: String) {
        let message = CreateMessage::new().content(text);
        if let Err(e) = channel_id.send_message(&self.http, message).await {
            tracing::warn!(%channel_id, "Failed to send notification: {e}");
        }
    }
}

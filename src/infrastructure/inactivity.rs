use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use poise::serenity_prelude::GuildId;
use tokio::sync::{Notify, RwLock};

/// One pending idle check per guild.
///
/// Starting a timer replaces (and cancels) the guild's previous one. The check
/// itself decides what to do, so it should read live state when it runs.
#[derive(Clone, Default)]
pub struct InactivityTimers {
    handles: Arc<RwLock<HashMap<GuildId, Arc<Notify>>>>,
}

impl InactivityTimers {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn start<F, Fut>(&self, guild_id: GuildId, delay: Duration, check: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancel = Arc::new(Notify::new());

        if let Some(previous) = self.handles.write().await.insert(guild_id, cancel.clone()) {
            previous.notify_one();
        }

        let handles = self.handles.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.notified() => {
                    tracing::debug!(%guild_id, "inactivity timer cancelled");
                    return;
                }
            }

            {
                let mut map = handles.write().await;
                match map.get(&guild_id) {
                    Some(active) if Arc::ptr_eq(active, &cancel) => {
                        map.remove(&guild_id);
                    }
                    // Replaced while we were waking up.
                    _ => return,
                }
            }

            check().await;
        });
    }

    pub async fn cancel(&self, guild_id: GuildId) {
        if let Some(cancel) = self.handles.write().await.remove(&guild_id) {
            cancel.notify_one();
        }
    }

    pub async fn is_active(&self, guild_id: GuildId) -> bool {
        self.handles.read().await.contains_key(&guild_id)
    }
}

//! What actually happens when a guild's update timer fires.

use async_trait::async_trait;
use poise::serenity_prelude::GuildId;
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

use crate::embeds::{self, Verb};
use crate::gateway::ChatGateway;
use crate::registry::ServerMap;
use crate::riot;

#[async_trait]
pub trait TickDispatcher: Send + Sync + 'static {
    /// Invoked on every timer fire. Must never fail loudly: a bad tick is
    /// logged and dropped so the guild's schedule keeps running.
    async fn dispatch(&self, guild_id: GuildId);
}

/// Production dispatcher: looks up the guild's configured channel, renders the
/// full stats payload and posts it.
pub struct UpdateDispatcher {
    servers: Weak<ServerMap>,
    gateway: Arc<dyn ChatGateway>,
    riot: Arc<riot::Client>,
}

impl UpdateDispatcher {
    pub fn new(
        servers: Weak<ServerMap>,
        gateway: Arc<dyn ChatGateway>,
        riot: Arc<riot::Client>,
    ) -> Self {
        Self {
            servers,
            gateway,
            riot,
        }
    }
}

#[async_trait]
impl TickDispatcher for UpdateDispatcher {
    async fn dispatch(&self, guild_id: GuildId) {
        // Registry already gone means we're shutting down.
        let Some(servers) = self.servers.upgrade() else {
            return;
        };
        let server = servers.read().await.get(&guild_id).cloned();
        let Some(server) = server else {
            warn!(%guild_id, "tick fired for an unregistered guild");
            return;
        };
        let Some(channel) = server.channel().await else {
            debug!(%guild_id, "no update channel configured, skipping tick");
            return;
        };

        debug!(%guild_id, %channel, "sending scheduled stats update");
        let embeds = match embeds::render(&self.riot, Verb::All).await {
            Ok(embeds) => embeds,
            Err(err) => {
                warn!(%guild_id, "couldn't render stats for scheduled update: {err}");
                return;
            }
        };
        if let Err(err) = self.gateway.post_embeds(channel, embeds).await {
            warn!(%guild_id, %channel, "couldn't post scheduled update: {err}");
        }
    }
}

#[cfg(test)]
pub mod test {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records how many times it was invoked, nothing else.
    #[derive(Default)]
    pub struct CountingDispatcher {
        ticks: AtomicUsize,
    }

    impl CountingDispatcher {
        pub fn ticks(&self) -> usize {
            self.ticks.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TickDispatcher for CountingDispatcher {
        async fn dispatch(&self, _guild_id: GuildId) {
            self.ticks.fetch_add(1, Ordering::SeqCst);
        }
    }
}

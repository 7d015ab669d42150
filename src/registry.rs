//! Owns every guild's `Server`, from lazy creation through shutdown.

use poise::serenity_prelude::GuildId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::dispatch::TickDispatcher;
use crate::error::{BotError, Result};
use crate::gateway::ChatGateway;
use crate::server::Server;
use crate::store::Store;

pub type ServerMap = RwLock<HashMap<GuildId, Arc<Server>>>;

pub struct Registry {
    servers: Arc<ServerMap>,
    store: Arc<Store>,
    gateway: Arc<dyn ChatGateway>,
    dispatcher: Arc<dyn TickDispatcher>,
}

impl Registry {
    pub fn new(
        servers: Arc<ServerMap>,
        store: Arc<Store>,
        gateway: Arc<dyn ChatGateway>,
        dispatcher: Arc<dyn TickDispatcher>,
    ) -> Self {
        Self {
            servers,
            store,
            gateway,
            dispatcher,
        }
    }

    fn fresh_server(&self, guild_id: GuildId) -> Arc<Server> {
        Arc::new(Server::new(
            guild_id,
            self.store.clone(),
            self.gateway.clone(),
            self.dispatcher.clone(),
        ))
    }

    /// The guild's server, created all-unset on first reference. An unseen
    /// guild is never an error; absence means defaults.
    pub async fn server_for(&self, guild_id: GuildId) -> Arc<Server> {
        if let Some(server) = self.servers.read().await.get(&guild_id) {
            return server.clone();
        }
        let mut servers = self.servers.write().await;
        servers
            .entry(guild_id)
            .or_insert_with(|| {
                info!(%guild_id, "creating config for new guild");
                self.fresh_server(guild_id)
            })
            .clone()
    }

    /// Loads every persisted guild record. Must run after the gateway
    /// connection is live, since channels are re-validated against it. A bad
    /// record is logged and skipped, never fatal to the rest.
    pub async fn load_all(&self) {
        let ids = match self.store.guild_ids().await {
            Ok(ids) => ids,
            Err(err) => {
                warn!("couldn't enumerate saved guilds: {err}");
                return;
            }
        };
        let mut loaded = 0;
        for id in ids {
            match self.load_one(&id).await {
                Ok(()) => loaded += 1,
                Err(err) => warn!(guild_id = %id, "skipping saved guild: {err}"),
            }
        }
        info!(loaded, "restored saved guilds");
    }

    async fn load_one(&self, id: &str) -> Result<()> {
        let raw: u64 = id
            .parse()
            .map_err(|_| BotError::BadRecord(id.to_string()))?;
        if raw == 0 {
            return Err(BotError::BadRecord(id.to_string()));
        }
        let guild_id = GuildId::new(raw);

        let Some(record) = self.store.read(id).await? else {
            return Err(BotError::BadRecord(id.to_string()));
        };
        let server = self.fresh_server(guild_id);
        server.load(&record).await?;
        self.servers.write().await.insert(guild_id, server);
        Ok(())
    }

    /// Persists every registered guild. Per-guild failures are logged and
    /// don't block the rest.
    pub async fn save_all(&self) {
        let servers: Vec<_> = self
            .servers
            .read()
            .await
            .values()
            .cloned()
            .collect();
        for server in servers {
            if let Err(err) = server.save().await {
                error!(guild_id = %server.guild_id(), "couldn't save guild: {err}");
            }
        }
    }

    /// Stops every guild's timer (waiting for each loop to exit), then saves
    /// all state. No loop outlives this call.
    pub async fn shutdown(&self) {
        let servers: Vec<_> = self
            .servers
            .read()
            .await
            .values()
            .cloned()
            .collect();
        for server in &servers {
            server.stop().await;
        }
        self.save_all().await;
        info!("registry shut down");
    }

    #[cfg(test)]
    pub(crate) async fn guild_count(&self) -> usize {
        self.servers.read().await.len()
    }
}

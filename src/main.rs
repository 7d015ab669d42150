mod commands;
mod dispatch;
mod embeds;
mod error;
mod events;
mod gateway;
mod registry;
mod riot;
mod server;
mod store;
mod timer;

use poise::serenity_prelude as serenity;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::info;

use dispatch::UpdateDispatcher;
use events::event_handler;
use gateway::{ChatGateway, DiscordGateway};
use registry::{Registry, ServerMap};
use riot::RiotId;
use store::Store;

const RIOT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_RIOT_ID: &str = "simipangpang#NA1";

#[derive(Clone)]
pub struct Data {
    pub registry: Arc<Registry>,
    pub riot: Arc<riot::Client>,
}

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;

#[tokio::main]
async fn main() -> Result<(), Error> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    let token = std::env::var("DISCORD_TOKEN").expect("DISCORD_TOKEN not set");
    let intents =
        serenity::GatewayIntents::non_privileged() | serenity::GatewayIntents::MESSAGE_CONTENT;

    let riot_id = std::env::var("TRACKED_RIOT_ID").unwrap_or_else(|_| DEFAULT_RIOT_ID.into());
    let (name, tag) = riot_id
        .split_once('#')
        .ok_or("TRACKED_RIOT_ID must look like name#tag")?;
    let riot = Arc::new(
        riot::Client::new(
            RiotId {
                name: name.to_string(),
                tag: tag.to_string(),
            },
            RIOT_TIMEOUT,
        )
        .await?,
    );

    let store = Arc::new(Store::new(store::STATE_DIR));

    // Filled in during framework setup; used for shutdown afterwards.
    let registry_slot: Arc<OnceLock<Arc<Registry>>> = Arc::new(OnceLock::new());

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![
                commands::update::update_channel(),
                commands::update::update_period(),
                commands::stats::stats(),
            ],
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            ..Default::default()
        })
        .setup({
            let riot = riot.clone();
            let registry_slot = registry_slot.clone();
            move |ctx, _ready, framework| {
                Box::pin(async move {
                    poise::builtins::register_globally(ctx, &framework.options().commands).await?;

                    let gateway: Arc<dyn ChatGateway> = Arc::new(DiscordGateway::new(ctx.clone()));
                    let servers: Arc<ServerMap> = Arc::new(RwLock::new(HashMap::new()));
                    let dispatcher = Arc::new(UpdateDispatcher::new(
                        Arc::downgrade(&servers),
                        gateway.clone(),
                        riot.clone(),
                    ));
                    let registry =
                        Arc::new(Registry::new(servers, store, gateway, dispatcher));

                    // The gateway is live at this point, so saved channels can
                    // be re-validated against it.
                    registry.load_all().await;
                    let _ = registry_slot.set(registry.clone());

                    Ok(Data { registry, riot })
                })
            }
        })
        .build();

    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("couldn't listen for interrupt");
        info!("interrupt received, shutting down");
        shard_manager.shutdown_all().await;
    });

    client.start().await?;

    // All timers stop (and their loops exit) before state hits the disk.
    if let Some(registry) = registry_slot.get() {
        registry.shutdown().await;
    }

    Ok(())
}

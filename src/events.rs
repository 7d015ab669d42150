use poise::serenity_prelude::{self as serenity, ActivityData, OnlineStatus};
use tracing::{info, warn};

use crate::embeds::{self, Verb};
use crate::{Data, Error};

pub async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::Ready { data_about_bot } => {
            info!("logged in as {}", data_about_bot.user.name);
            ctx.set_presence(
                Some(ActivityData::watching("the Rift")),
                OnlineStatus::Online,
            );
        }
        serenity::FullEvent::Message { new_message } => {
            on_message(ctx, data, new_message).await;
        }
        _ => {}
    }
    Ok(())
}

/// Replies with the full stats payload whenever a message mentions the
/// tracked player by name. Failures are logged, never surfaced.
async fn on_message(ctx: &serenity::Context, data: &Data, message: &serenity::Message) {
    // Ignore messages sent by ourselves
    if message.author.id == ctx.cache.current_user().id {
        return;
    }
    if !mentions_player(&message.content, &data.riot.riot_id().name) {
        return;
    }

    info!(
        author = %message.author.name,
        "got a message mentioning the tracked player"
    );
    let embeds = match embeds::render(&data.riot, Verb::All).await {
        Ok(embeds) => embeds,
        Err(err) => {
            warn!("couldn't retrieve stats for mention reply: {err}");
            return;
        }
    };
    if let Err(err) = message
        .channel_id
        .send_message(
            &ctx.http,
            serenity::CreateMessage::new()
                .embeds(embeds)
                .reference_message(message),
        )
        .await
    {
        warn!("couldn't send mention reply: {err}");
    }
}

fn mentions_player(content: &str, name: &str) -> bool {
    content.to_lowercase().contains(&name.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mention_matching_is_case_insensitive() {
        assert!(mentions_player("how is SimiPangPang doing", "simipangpang"));
        assert!(mentions_player("simipangpang", "simipangpang"));
        assert!(!mentions_player("unrelated chatter", "simipangpang"));
    }
}

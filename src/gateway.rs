//! Boundary to the Discord gateway: channel lookup, permission checks, posting.

use async_trait::async_trait;
use poise::serenity_prelude::{self as serenity, ChannelId, CreateEmbed};

use crate::error::{BotError, Result};

#[async_trait]
pub trait ChatGateway: Send + Sync + 'static {
    /// Checks that the channel resolves to a guild text channel and that the
    /// bot currently holds send permission in it.
    async fn validate_channel(&self, channel_id: ChannelId) -> Result<()>;

    async fn post_embeds(&self, channel_id: ChannelId, embeds: Vec<CreateEmbed>) -> Result<()>;
}

pub struct DiscordGateway {
    ctx: serenity::Context,
}

impl DiscordGateway {
    pub fn new(ctx: serenity::Context) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ChatGateway for DiscordGateway {
    async fn validate_channel(&self, channel_id: ChannelId) -> Result<()> {
        // Cache-backed lookup with a fresh fetch on miss.
        let channel = match channel_id.to_channel(&self.ctx).await {
            Ok(serenity::Channel::Guild(channel)) => channel,
            Ok(_) | Err(_) => return Err(BotError::ChannelNotFound(channel_id)),
        };
        if channel.kind != serenity::ChannelType::Text {
            return Err(BotError::ChannelNotFound(channel_id));
        }

        let me = self.ctx.cache.current_user().id;
        let member = channel.guild_id.member(&self.ctx, me).await?;
        let perms = {
            let guild = self
                .ctx
                .cache
                .guild(channel.guild_id)
                .ok_or(BotError::ChannelNotFound(channel_id))?;
            guild.user_permissions_in(&channel, &member)
        };
        if !perms.contains(serenity::Permissions::SEND_MESSAGES) {
            return Err(BotError::MissingPermission(channel_id));
        }
        Ok(())
    }

    async fn post_embeds(&self, channel_id: ChannelId, embeds: Vec<CreateEmbed>) -> Result<()> {
        channel_id
            .send_message(&self.ctx.http, serenity::CreateMessage::new().embeds(embeds))
            .await?;
        Ok(())
    }
}

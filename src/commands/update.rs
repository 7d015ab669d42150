//! `/update_channel` and `/update_period`: per-guild scheduled-post settings.

use crate::{Context, Error};
use poise::serenity_prelude as serenity;

async fn reply_ephemeral(ctx: Context<'_>, content: String) -> Result<(), Error> {
    ctx.send(
        poise::CreateReply::default()
            .content(content)
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

fn guild_id(ctx: &Context<'_>) -> Result<serenity::GuildId, Error> {
    ctx.guild_id()
        .ok_or_else(|| "this command must be used in a server".into())
}

/// Set or get the update channel for the server
#[poise::command(
    slash_command,
    guild_only,
    subcommands("channel_get", "channel_set"),
    default_member_permissions = "MANAGE_GUILD"
)]
pub async fn update_channel(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Get the update channel for the server
#[poise::command(slash_command, rename = "get")]
pub async fn channel_get(ctx: Context<'_>) -> Result<(), Error> {
    let server = ctx.data().registry.server_for(guild_id(&ctx)?).await;
    let reply = format!(
        "The current update channel is {}",
        server.channel_display().await
    );
    reply_ephemeral(ctx, reply).await
}

/// Set the update channel for the server
#[poise::command(slash_command, rename = "set")]
pub async fn channel_set(
    ctx: Context<'_>,
    #[description = "The new channel to post updates in"]
    #[channel_types("Text")]
    channel: serenity::Channel,
) -> Result<(), Error> {
    let server = ctx.data().registry.server_for(guild_id(&ctx)?).await;
    let reply = match server.set_channel(channel.id()).await {
        Ok(confirmation) => confirmation,
        Err(err) => format!(":warning: {err}"),
    };
    reply_ephemeral(ctx, reply).await
}

/// Set or get the update period for the server
#[poise::command(
    slash_command,
    guild_only,
    subcommands("period_get", "period_set"),
    default_member_permissions = "MANAGE_GUILD"
)]
pub async fn update_period(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Get the update period for the server
#[poise::command(slash_command, rename = "get")]
pub async fn period_get(ctx: Context<'_>) -> Result<(), Error> {
    let server = ctx.data().registry.server_for(guild_id(&ctx)?).await;
    let reply = match server.period_minutes().await {
        0 => "The update period is unset".to_string(),
        minutes => format!("The current update period is {minutes} minute(s)"),
    };
    reply_ephemeral(ctx, reply).await
}

/// Set the update period for the server
#[poise::command(slash_command, rename = "set")]
pub async fn period_set(
    ctx: Context<'_>,
    #[description = "Minutes between scheduled stats posts"] minutes: i64,
) -> Result<(), Error> {
    let server = ctx.data().registry.server_for(guild_id(&ctx)?).await;
    let reply = match server.set_period(minutes).await {
        Ok(confirmation) => confirmation,
        Err(err) => format!(":warning: {err}"),
    };
    reply_ephemeral(ctx, reply).await
}

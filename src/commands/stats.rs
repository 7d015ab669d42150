//! `/stats`: on-demand stats for the tracked player.

use tracing::warn;

use crate::embeds::{self, Verb};
use crate::{Context, Error};

async fn respond(ctx: Context<'_>, verb: Verb) -> Result<(), Error> {
    // Stats rendering takes several API round trips; acknowledge first.
    ctx.defer().await?;
    match embeds::render(&ctx.data().riot, verb).await {
        Ok(embeds) => {
            let mut reply = poise::CreateReply::default();
            for embed in embeds {
                reply = reply.embed(embed);
            }
            ctx.send(reply).await?;
        }
        Err(err) => {
            warn!("couldn't retrieve stats: {err}");
            ctx.say("Couldn't retrieve stats right now, try again later!")
                .await?;
        }
    }
    Ok(())
}

/// Get the tracked player's stats
#[poise::command(slash_command, subcommands("short", "best", "worst", "all"))]
pub async fn stats(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Account summary: rank, LP and winrate
#[poise::command(slash_command)]
pub async fn short(ctx: Context<'_>) -> Result<(), Error> {
    respond(ctx, Verb::Short).await
}

/// Best ranked match of the week
#[poise::command(slash_command)]
pub async fn best(ctx: Context<'_>) -> Result<(), Error> {
    respond(ctx, Verb::Best).await
}

/// Worst ranked match of the week
#[poise::command(slash_command)]
pub async fn worst(ctx: Context<'_>) -> Result<(), Error> {
    respond(ctx, Verb::Worst).await
}

/// Everything: summary plus best and worst matches
#[poise::command(slash_command)]
pub async fn all(ctx: Context<'_>) -> Result<(), Error> {
    respond(ctx, Verb::All).await
}

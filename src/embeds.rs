//! Renders Riot stats into Discord embeds.

use chrono::Utc;
use poise::serenity_prelude::{CreateEmbed, CreateEmbedAuthor, CreateEmbedFooter};

use crate::error::{BotError, Result};
use crate::riot::{Account, Client, Match};

const LOOKBACK_DAYS: i64 = 7;
const WIN_COLOR: u32 = 0x6EEB34;
const LOSS_COLOR: u32 = 0xEB4C34;
const ACCOUNT_COLOR: u32 = 0xF7F12F;

/// Which slice of the stats payload to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Short,
    Best,
    Worst,
    All,
}

pub async fn render(riot: &Client, verb: Verb) -> Result<Vec<CreateEmbed>> {
    let account = riot.tracked_account().await?;
    match verb {
        Verb::Short => Ok(vec![short_embed(riot, &account).await?]),
        Verb::Best => {
            let (best, _) = week_extremes(riot, &account).await?;
            Ok(vec![match_embed(riot, &account, &best, "Best match this week")?])
        }
        Verb::Worst => {
            let (_, worst) = week_extremes(riot, &account).await?;
            Ok(vec![match_embed(
                riot,
                &account,
                &worst,
                "Worst match this week",
            )?])
        }
        Verb::All => {
            let (best, worst) = week_extremes(riot, &account).await?;
            Ok(vec![
                short_embed(riot, &account).await?,
                match_embed(riot, &account, &best, "Best match this week")?,
                match_embed(riot, &account, &worst, "Worst match this week")?,
            ])
        }
    }
}

/// Best and worst ranked match of the lookback window, by performance.
async fn week_extremes(riot: &Client, account: &Account) -> Result<(Match, Match)> {
    let mut matches = riot
        .ranked_matches_since(account, Utc::now() - chrono::Duration::days(LOOKBACK_DAYS))
        .await?;
    if matches.is_empty() {
        return Err(BotError::Riot(format!(
            "no ranked matches in the last {LOOKBACK_DAYS} days"
        )));
    }
    matches.sort_by(|a, b| a.cmp_performance(b));
    let worst = matches[0].clone();
    let best = matches[matches.len() - 1].clone();
    Ok((best, worst))
}

fn author(account: &Account) -> CreateEmbedAuthor {
    CreateEmbedAuthor::new(format!("{}#{}", account.name, account.tag))
        .icon_url(&account.icon_url)
}

async fn short_embed(riot: &Client, account: &Account) -> Result<CreateEmbed> {
    let mastery = riot.top_mastery(account).await?;
    let champion = riot.champion_by_id(mastery.champion_id)?;

    Ok(CreateEmbed::new()
        .color(ACCOUNT_COLOR)
        .author(author(account))
        .thumbnail(&account.rank_url)
        .description(format!("**{}** / {} LP\n", account.rank, account.points))
        .footer(CreateEmbedFooter::new("Account stats"))
        .image(riot.champion_icon_url(champion))
        .field("Wins", account.wins.to_string(), true)
        .field("Losses", account.losses.to_string(), true)
        .field("Winrate", format!("{}%", account.winrate()), true)
        .field("Top mastery", champion.name.clone(), true)
        .field("Mastery points", mastery.points.to_string(), true))
}

fn match_embed(
    riot: &Client,
    account: &Account,
    game: &Match,
    caption: &str,
) -> Result<CreateEmbed> {
    let champion = riot.champion_by_id(game.champion)?;
    let (color, outcome) = if game.won {
        (WIN_COLOR, "Victory")
    } else {
        (LOSS_COLOR, "Defeat")
    };

    Ok(CreateEmbed::new()
        .color(color)
        .author(author(account))
        .thumbnail(riot.champion_icon_url(champion))
        .description(format!(
            "**{outcome}** (played <t:{}:R>)",
            game.time.timestamp()
        ))
        .footer(CreateEmbedFooter::new(caption))
        .field("Kills", game.kills.to_string(), true)
        .field("Deaths", game.deaths.to_string(), true)
        .field("Assists", game.assists.to_string(), true))
}

use poise::serenity_prelude as serenity;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BotError {
    #[error("period must be a positive number of minutes (got {0})")]
    InvalidPeriod(i64),

    #[error("couldn't resolve channel <#{0}>; pass a text channel the bot can see")]
    ChannelNotFound(serenity::ChannelId),

    #[error("bot has no permission to send messages in <#{0}>")]
    MissingPermission(serenity::ChannelId),

    #[error("saved record for guild {0} is malformed")]
    BadRecord(String),

    #[error("Discord API error: {0}")]
    Discord(#[from] serenity::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Riot API error: {0}")]
    Riot(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BotError>;

//! Per-guild configuration: update channel, update period, and the timer that
//! goes with them. All mutation flows through the validated setters, which
//! persist before reporting success.

use poise::serenity_prelude::{ChannelId, GuildId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::info;

use crate::dispatch::TickDispatcher;
use crate::error::{BotError, Result};
use crate::gateway::ChatGateway;
use crate::store::{Record, Store};
use crate::timer::GuildTimer;

const UNSET: &str = "<unset>";

/// Minutes to a duration, rejecting non-positive values and anything too
/// large to represent in seconds.
fn period_from_minutes(minutes: i64) -> Result<Duration> {
    if minutes <= 0 {
        return Err(BotError::InvalidPeriod(minutes));
    }
    let secs = (minutes as u64)
        .checked_mul(60)
        .ok_or(BotError::InvalidPeriod(minutes))?;
    Ok(Duration::from_secs(secs))
}

#[derive(Default)]
struct State {
    channel: Option<ChannelId>,
    period: Option<Duration>,
    // Present iff `period` is set. Not persisted; rebuilt on load.
    timer: Option<GuildTimer>,
}

pub struct Server {
    guild_id: GuildId,
    store: Arc<Store>,
    gateway: Arc<dyn ChatGateway>,
    dispatcher: Arc<dyn TickDispatcher>,
    state: Mutex<State>,
}

impl Server {
    pub fn new(
        guild_id: GuildId,
        store: Arc<Store>,
        gateway: Arc<dyn ChatGateway>,
        dispatcher: Arc<dyn TickDispatcher>,
    ) -> Self {
        Self {
            guild_id,
            store,
            gateway,
            dispatcher,
            state: Mutex::new(State::default()),
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    /// Reconstitutes settings from a persisted record: the channel is
    /// re-validated against the live gateway and a saved period re-arms the
    /// timer. Doesn't persist; the record came from disk.
    pub async fn load(&self, record: &Record) -> Result<()> {
        let mut state = self.state.lock().await;

        if !record.channel_id.is_empty() {
            let raw: u64 = record
                .channel_id
                .parse()
                .map_err(|_| BotError::BadRecord(record.guild_id.clone()))?;
            if raw == 0 {
                return Err(BotError::BadRecord(record.guild_id.clone()));
            }
            let channel = ChannelId::new(raw);
            self.gateway.validate_channel(channel).await?;
            state.channel = Some(channel);
        }

        if record.period_minutes != 0 {
            let period = period_from_minutes(record.period_minutes)?;
            state.period = Some(period);
            self.arm(&mut state, period);
        }

        Ok(())
    }

    /// Validates the channel and the bot's send permission, then replaces the
    /// update channel and persists. On any failure the field is unchanged.
    pub async fn set_channel(&self, channel_id: ChannelId) -> Result<String> {
        let mut state = self.state.lock().await;
        self.gateway.validate_channel(channel_id).await?;
        state.channel = Some(channel_id);
        self.persist(&state).await?;
        info!(guild_id = %self.guild_id, channel = %channel_id, "set update channel");
        Ok(format!("Success! The new update channel is <#{channel_id}>"))
    }

    pub async fn channel(&self) -> Option<ChannelId> {
        self.state.lock().await.channel
    }

    pub async fn channel_display(&self) -> String {
        match self.state.lock().await.channel {
            Some(channel) => format!("<#{channel}>"),
            None => UNSET.to_string(),
        }
    }

    /// Sets the update period and synchronizes the timer: created on first
    /// set, reset in place afterwards. Rejects non-positive periods without
    /// touching anything.
    pub async fn set_period(&self, minutes: i64) -> Result<String> {
        let period = period_from_minutes(minutes)?;

        let mut state = self.state.lock().await;
        state.period = Some(period);
        self.persist(&state).await?;
        self.arm(&mut state, period);
        info!(guild_id = %self.guild_id, minutes, "set update period");
        Ok(format!(
            "Success! Stats will now be posted every {minutes} minute(s)"
        ))
    }

    /// Current period in whole minutes, 0 when unset.
    pub async fn period_minutes(&self) -> i64 {
        self.state
            .lock()
            .await
            .period
            .map(|p| (p.as_secs() / 60) as i64)
            .unwrap_or(0)
    }

    fn arm(&self, state: &mut State, period: Duration) {
        match &state.timer {
            Some(timer) => timer.reset(period),
            None => {
                info!(guild_id = %self.guild_id, "starting update timer");
                state.timer = Some(GuildTimer::spawn(
                    self.guild_id,
                    period,
                    self.dispatcher.clone(),
                ));
            }
        }
    }

    /// Halts the recurring schedule, waiting for its loop to exit. Idempotent.
    pub async fn stop(&self) {
        let timer = self.state.lock().await.timer.take();
        if let Some(mut timer) = timer {
            timer.stop().await;
        }
    }

    pub async fn save(&self) -> Result<()> {
        let state = self.state.lock().await;
        self.persist(&state).await
    }

    async fn persist(&self, state: &State) -> Result<()> {
        let record = Record {
            guild_id: self.guild_id.to_string(),
            channel_id: state
                .channel
                .map(|c| c.to_string())
                .unwrap_or_default(),
            period_minutes: state
                .period
                .map(|p| (p.as_secs() / 60) as i64)
                .unwrap_or(0),
        };
        self.store.write(&record.guild_id, &record).await
    }

    #[cfg(test)]
    pub(crate) async fn has_timer(&self) -> bool {
        self.state.lock().await.timer.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::test::CountingDispatcher;
    use crate::gateway::test::MockGateway;

    fn server_with(
        dir: &std::path::Path,
        gateway: MockGateway,
    ) -> (Arc<Server>, Arc<CountingDispatcher>) {
        let dispatcher = Arc::new(CountingDispatcher::default());
        let server = Arc::new(Server::new(
            GuildId::new(10),
            Arc::new(Store::new(dir)),
            Arc::new(gateway),
            dispatcher.clone(),
        ));
        (server, dispatcher)
    }

    #[tokio::test]
    async fn set_period_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let (server, _) = server_with(dir.path(), MockGateway::default());
        for minutes in [1, 5, 60, 1440] {
            server.set_period(minutes).await.unwrap();
            assert_eq!(server.period_minutes().await, minutes);
        }
        server.stop().await;
    }

    #[tokio::test]
    async fn non_positive_period_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (server, _) = server_with(dir.path(), MockGateway::default());
        server.set_period(7).await.unwrap();

        for minutes in [0, -1, i64::MAX] {
            let err = server.set_period(minutes).await.unwrap_err();
            assert!(matches!(err, BotError::InvalidPeriod(m) if m == minutes));
        }
        // Prior period untouched.
        assert_eq!(server.period_minutes().await, 7);
        server.stop().await;
    }

    #[tokio::test]
    async fn load_rejects_out_of_range_period() {
        let dir = tempfile::tempdir().unwrap();
        let (server, _) = server_with(dir.path(), MockGateway::default());
        let record = Record {
            guild_id: "10".to_string(),
            channel_id: String::new(),
            period_minutes: i64::MAX,
        };

        let err = server.load(&record).await.unwrap_err();
        assert!(matches!(err, BotError::InvalidPeriod(_)));
        assert_eq!(server.period_minutes().await, 0);
        assert!(!server.has_timer().await);
    }

    #[tokio::test(start_paused = true)]
    async fn second_set_period_reuses_the_timer() {
        let dir = tempfile::tempdir().unwrap();
        let (server, dispatcher) = server_with(dir.path(), MockGateway::default());

        server.set_period(60).await.unwrap();
        server.set_period(2).await.unwrap();
        assert!(server.has_timer().await);

        // Fires at the new interval, not the old one.
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        let before = dispatcher.ticks();
        tokio::time::sleep(Duration::from_secs(2 * 60 + 1)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(dispatcher.ticks(), before + 1);
        server.stop().await;
    }

    #[tokio::test]
    async fn set_channel_without_permission_leaves_field_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let denied = ChannelId::new(42);
        let gateway = MockGateway {
            denied: vec![denied],
            ..Default::default()
        };
        let (server, _) = server_with(dir.path(), gateway);

        let err = server.set_channel(denied).await.unwrap_err();
        assert!(matches!(err, BotError::MissingPermission(c) if c == denied));
        assert_eq!(server.channel_display().await, "<unset>");
    }

    #[tokio::test]
    async fn set_channel_unknown_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let unknown = ChannelId::new(43);
        let gateway = MockGateway {
            unknown: vec![unknown],
            ..Default::default()
        };
        let (server, _) = server_with(dir.path(), gateway);

        let err = server.set_channel(unknown).await.unwrap_err();
        assert!(matches!(err, BotError::ChannelNotFound(c) if c == unknown));
    }

    #[tokio::test]
    async fn setters_persist_before_returning() {
        let dir = tempfile::tempdir().unwrap();
        let (server, _) = server_with(dir.path(), MockGateway::default());
        let channel = ChannelId::new(99);

        server.set_channel(channel).await.unwrap();
        server.set_period(15).await.unwrap();

        let store = Store::new(dir.path());
        let record = store.read("10").await.unwrap().unwrap();
        assert_eq!(record.channel_id, channel.to_string());
        assert_eq!(record.period_minutes, 15);
        server.stop().await;
    }

    #[tokio::test]
    async fn load_rearms_saved_period() {
        let dir = tempfile::tempdir().unwrap();
        let (server, _) = server_with(dir.path(), MockGateway::default());
        let record = Record {
            guild_id: "10".to_string(),
            channel_id: "99".to_string(),
            period_minutes: 30,
        };

        server.load(&record).await.unwrap();
        assert_eq!(server.period_minutes().await, 30);
        assert_eq!(server.channel_display().await, "<#99>");
        assert!(server.has_timer().await);
        server.stop().await;
    }

    #[tokio::test]
    async fn stop_twice_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let (server, _) = server_with(dir.path(), MockGateway::default());
        server.set_period(5).await.unwrap();
        server.stop().await;
        server.stop().await;
        assert!(!server.has_timer().await);
    }
}

//! Per-guild recurring update schedule.

use poise::serenity_prelude::GuildId;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

use crate::dispatch::TickDispatcher;

/// One background loop firing at the configured period until stopped. The
/// period can be changed in place without tearing the loop down, so a reset
/// never opens a stop/start window where a fire could be missed or doubled.
pub struct GuildTimer {
    period: watch::Sender<Duration>,
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl GuildTimer {
    pub fn spawn(
        guild_id: GuildId,
        period: Duration,
        dispatcher: Arc<dyn TickDispatcher>,
    ) -> Self {
        let (period_tx, mut period_rx) = watch::channel(period);
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let mut deadline = Instant::now() + *period_rx.borrow_and_update();
            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => {
                        debug!(%guild_id, "update loop stopping");
                        return;
                    }
                    changed = period_rx.changed() => {
                        // Sender dropped means the owning server is gone.
                        if changed.is_err() {
                            return;
                        }
                        deadline = Instant::now() + *period_rx.borrow_and_update();
                    }
                    _ = sleep_until(deadline) => {
                        deadline = Instant::now() + *period_rx.borrow();
                        // Dispatch on its own task so a slow stats fetch can't
                        // hold up a period change or a stop.
                        let dispatcher = dispatcher.clone();
                        tokio::spawn(async move {
                            dispatcher.dispatch(guild_id).await;
                        });
                    }
                }
            }
        });

        Self {
            period: period_tx,
            stop: Some(stop_tx),
            task: Some(task),
        }
    }

    /// Moves the next deadline to one full new period from now; the running
    /// loop is kept as-is.
    pub fn reset(&self, period: Duration) {
        let _ = self.period.send(period);
    }

    /// Signals the loop and waits for it to exit. Idempotent; once this
    /// returns, no further ticks fire.
    pub async fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!("update loop didn't exit cleanly: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::test::CountingDispatcher;

    fn guild() -> GuildId {
        GuildId::new(1)
    }

    fn minutes(m: u64) -> Duration {
        Duration::from_secs(m * 60)
    }

    async fn settle() {
        // Let spawned dispatch tasks run.
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fires_once_per_period() {
        let dispatcher = Arc::new(CountingDispatcher::default());
        let mut timer = GuildTimer::spawn(guild(), minutes(5), dispatcher.clone());

        tokio::time::sleep(minutes(5) + Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(dispatcher.ticks(), 1);

        tokio::time::sleep(minutes(5)).await;
        settle().await;
        assert_eq!(dispatcher.ticks(), 2);

        timer.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn reset_moves_the_deadline_in_place() {
        let dispatcher = Arc::new(CountingDispatcher::default());
        let mut timer = GuildTimer::spawn(guild(), minutes(5), dispatcher.clone());

        // Stretch the period before the first fire; the old deadline must not
        // be honored.
        timer.reset(minutes(10));
        settle().await;

        tokio::time::sleep(minutes(7)).await;
        settle().await;
        assert_eq!(dispatcher.ticks(), 0);

        tokio::time::sleep(minutes(4)).await;
        settle().await;
        assert_eq!(dispatcher.ticks(), 1);

        timer.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn reset_to_shorter_period_fires_sooner() {
        let dispatcher = Arc::new(CountingDispatcher::default());
        let mut timer = GuildTimer::spawn(guild(), minutes(30), dispatcher.clone());

        timer.reset(minutes(1));
        settle().await;
        tokio::time::sleep(minutes(1) + Duration::from_secs(1)).await;
        settle().await;
        assert_eq!(dispatcher.ticks(), 1);

        timer.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn no_ticks_after_stop() {
        let dispatcher = Arc::new(CountingDispatcher::default());
        let mut timer = GuildTimer::spawn(guild(), minutes(5), dispatcher.clone());

        timer.stop().await;
        tokio::time::sleep(minutes(60)).await;
        settle().await;
        assert_eq!(dispatcher.ticks(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent() {
        let dispatcher = Arc::new(CountingDispatcher::default());
        let mut timer = GuildTimer::spawn(guild(), minutes(5), dispatcher);
        timer.stop().await;
        timer.stop().await;
    }
}

//! The poll → filter → publish loop.
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

use crate::dedup::select_new;
use crate::error::BotError;
use crate::profile::NowPlaying;
use crate::publisher::Publisher;
use crate::state::StateStore;
use crate::subsonic::SourceService;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub new: usize,
    pub published: usize,
    /// Records whose publish failed; they stay out of the store and come back next cycle.
    pub failed: usize,
}

pub struct Scheduler<St: StateStore> {
    source: Arc<dyn SourceService>,
    publisher: Publisher,
    store: St,
    interval: Duration,
    now_playing: Option<NowPlaying>,
}

impl<St: StateStore> Scheduler<St> {
    pub fn new(
        source: Arc<dyn SourceService>,
        publisher: Publisher,
        store: St,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            publisher,
            store,
            interval,
            now_playing: None,
        }
    }

    /// Also keep a profile field in sync with the latest play, once per cycle.
    pub fn with_now_playing(mut self, now_playing: NowPlaying) -> Self {
        self.now_playing = Some(now_playing);
        self
    }

    pub fn store(&self) -> &St {
        &self.store
    }

    /// Profile step of a cycle. `Ok(false)` when disabled or nothing changed.
    pub async fn refresh_profile(&mut self) -> Result<bool, BotError> {
        match self.now_playing.as_mut() {
            Some(now_playing) => now_playing.refresh().await,
            None => Ok(false),
        }
    }

    /// One full pass. A record that fails to publish is logged and skipped;
    /// only fatal (state) errors end the cycle early.
    #[instrument(skip_all)]
    pub async fn run_cycle(&mut self) -> Result<CycleReport, BotError> {
        debug!("polling favorites");
        let fetched = self
            .source
            .fetch_favorites()
            .await
            .map_err(BotError::SourceUnavailable)?;
        let mut report = CycleReport {
            fetched: fetched.len(),
            ..CycleReport::default()
        };

        let fresh = select_new(fetched, &self.store);
        report.new = fresh.len();
        if !fresh.is_empty() {
            info!(count = fresh.len(), "new favorites to publish");
        }

        for track in &fresh {
            match self.publisher.process_track(track, &mut self.store).await {
                Ok(_) => report.published += 1,
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    warn!(
                        track_id = %track.id,
                        stage = err.stage(),
                        error = %err,
                        "skipping favorite until next cycle"
                    );
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    /// Run cycles until `shutdown` turns true (or its sender is dropped).
    /// Shutdown is only observed between cycles. Returns the store on a clean
    /// stop and the error on a fatal one.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<St, BotError> {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            interval_secs = self.interval.as_secs(),
            known = self.store.len(),
            "scheduler started"
        );

        let mut cycle: u64 = 0;
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            }

            cycle += 1;
            match self.run_cycle().await {
                Ok(report) => info!(
                    cycle,
                    fetched = report.fetched,
                    new = report.new,
                    published = report.published,
                    failed = report.failed,
                    "cycle complete"
                ),
                Err(err) if err.is_fatal() => {
                    error!(cycle, stage = err.stage(), error = %err, "fatal error; stopping");
                    return Err(err);
                }
                Err(err) => warn!(
                    cycle,
                    stage = err.stage(),
                    error = %err,
                    "cycle failed; retrying next interval"
                ),
            }
            if let Err(err) = self.refresh_profile().await {
                warn!(cycle, stage = err.stage(), error = %err, "profile not updated");
            }
        }

        info!(cycles = cycle, "scheduler stopped");
        Ok(self.store)
    }
}

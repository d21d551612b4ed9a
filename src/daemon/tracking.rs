use std::{sync::Arc, time::Duration};

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::utils::clock::Clock;

use super::{persist::PlaytimeFile, sampler::ProcessSampler, tracker::SessionTracker};

/// The tracking loop: samples the process list once per interval, feeds the
/// sampled set to the [SessionTracker], and persists the totals whenever a
/// session completes.
pub struct TrackingModule {
    tracker: Arc<SessionTracker>,
    sampler: Box<dyn ProcessSampler>,
    playtime_file: PlaytimeFile,
    shutdown: CancellationToken,
    poll_interval: Duration,
    time_provider: Box<dyn Clock>,
}

impl TrackingModule {
    pub fn new(
        tracker: Arc<SessionTracker>,
        sampler: Box<dyn ProcessSampler>,
        playtime_file: PlaytimeFile,
        shutdown: CancellationToken,
        poll_interval: Duration,
        time_provider: Box<dyn Clock>,
    ) -> Self {
        Self {
            tracker,
            sampler,
            playtime_file,
            shutdown,
            poll_interval,
            time_provider,
        }
    }

    fn run_cycle(&mut self) {
        if self.tracker.is_paused() {
            debug!("Paused, skipping sample");
            return;
        }

        match self.sampler.sample() {
            Ok(running) => {
                let completed = self.tracker.observe(&running, self.time_provider.time());
                if !completed.is_empty() {
                    self.persist_totals();
                }
            }
            Err(e) => {
                // Unknown state. The cycle self-heals on the next sample.
                error!("Process sampling failed, retrying next cycle {e:?}")
            }
        }
    }

    fn persist_totals(&self) {
        if let Err(e) = self.playtime_file.persist(&self.tracker.snapshot()) {
            // In-memory totals stay authoritative; the next completed
            // session retries the write.
            error!("Failed to persist playtime totals {e:?}");
        }
    }

    /// Executes the tracking event loop until cancelled, then flushes every
    /// still-active session and forces a final persist before returning.
    pub async fn run(mut self) -> Result<()> {
        let mut poll_point = self.time_provider.instant();
        loop {
            poll_point += self.poll_interval;

            self.run_cycle();

            tokio::select! {
                // Cancellation interrupts the sleep, so shutdown never waits
                // out the rest of an interval.
                _ = self.shutdown.cancelled() => break,
                _ = self.time_provider.sleep_until(poll_point) => ()
            }
        }

        let flushed = self.tracker.flush_active(self.time_provider.time());
        if !flushed.is_empty() {
            info!("Flushed {} active sessions on shutdown", flushed.len());
        }
        self.persist_totals();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, sync::Arc, time::Duration};

    use anyhow::Result;
    use tempfile::tempdir;
    use tokio_util::sync::CancellationToken;

    use crate::{
        daemon::{
            persist::PlaytimeFile,
            registry::Registry,
            sampler::{MockProcessSampler, SampleError},
            store::PlaytimeStore,
            tracker::SessionTracker,
        },
        utils::{clock::DefaultClock, logging::TEST_LOGGING},
    };

    use super::TrackingModule;

    fn game_tracker() -> Arc<SessionTracker> {
        let registry = Registry::from_entries([("game.exe".to_string(), "Game".to_string())]);
        Arc::new(SessionTracker::new(registry, PlaytimeStore::new()))
    }

    fn running(names: &[&str]) -> HashSet<String> {
        names.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn sampler_errors_skip_the_cycle_without_stopping_the_loop() -> Result<()> {
        *TEST_LOGGING;
        let mut sampler = MockProcessSampler::new();
        let mut calls = 0;
        sampler.expect_sample().returning(move || {
            calls += 1;
            match calls {
                1 => Err(SampleError::ProcessTableUnavailable),
                2 => Ok(running(&["game.exe"])),
                _ => Ok(running(&[])),
            }
        });

        let dir = tempdir()?;
        let playtime_file = PlaytimeFile::new(dir.path().join("playtime.txt"));
        let tracker = game_tracker();
        let shutdown = CancellationToken::new();

        let module = TrackingModule::new(
            tracker.clone(),
            Box::new(sampler),
            playtime_file,
            shutdown.clone(),
            Duration::from_millis(20),
            Box::new(DefaultClock),
        );

        let (_, run_result) = tokio::join!(
            async {
                tokio::time::sleep(Duration::from_millis(90)).await;
                shutdown.cancel()
            },
            module.run(),
        );
        run_result?;

        // Cycle 2 started a session, cycle 3 closed it; the error in cycle 1
        // cost nothing but one interval.
        let persisted = PlaytimeFile::new(dir.path().join("playtime.txt")).load()?;
        assert!(persisted.contains_key("Game"));
        assert!(persisted["Game"] > 0.0);
        Ok(())
    }

    #[tokio::test]
    async fn shutdown_flushes_active_sessions_to_disk() -> Result<()> {
        *TEST_LOGGING;
        let mut sampler = MockProcessSampler::new();
        sampler
            .expect_sample()
            .returning(|| Ok(running(&["game.exe"])));

        let dir = tempdir()?;
        let playtime_file = PlaytimeFile::new(dir.path().join("playtime.txt"));
        let tracker = game_tracker();
        let shutdown = CancellationToken::new();

        let module = TrackingModule::new(
            tracker.clone(),
            Box::new(sampler),
            playtime_file,
            shutdown.clone(),
            Duration::from_millis(20),
            Box::new(DefaultClock),
        );

        let (_, run_result) = tokio::join!(
            async {
                tokio::time::sleep(Duration::from_millis(70)).await;
                shutdown.cancel()
            },
            module.run(),
        );
        run_result?;

        // The session never closed on its own, only the shutdown flush can
        // have written it.
        assert_eq!(tracker.active_count(), 0);
        let persisted = PlaytimeFile::new(dir.path().join("playtime.txt")).load()?;
        assert!(persisted["Game"] > 0.0);
        Ok(())
    }

    #[tokio::test]
    async fn paused_loop_samples_nothing() -> Result<()> {
        *TEST_LOGGING;
        let mut sampler = MockProcessSampler::new();
        // Pausing before the loop starts means sample() must never run.
        sampler.expect_sample().times(0);

        let dir = tempdir()?;
        let playtime_file = PlaytimeFile::new(dir.path().join("playtime.txt"));
        let tracker = game_tracker();
        tracker.pause(chrono::Utc::now());
        let shutdown = CancellationToken::new();

        let module = TrackingModule::new(
            tracker.clone(),
            Box::new(sampler),
            playtime_file,
            shutdown.clone(),
            Duration::from_millis(20),
            Box::new(DefaultClock),
        );

        let (_, run_result) = tokio::join!(
            async {
                tokio::time::sleep(Duration::from_millis(70)).await;
                shutdown.cancel()
            },
            module.run(),
        );
        run_result?;
        Ok(())
    }
}

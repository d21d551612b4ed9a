use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::utils::clock::{Clock, DefaultClock};

pub mod args;
pub mod persist;
pub mod registry;
pub mod sampler;
pub mod shutdown;
pub mod store;
pub mod tracker;
pub mod tracking;

use persist::PlaytimeFile;
use registry::{ensure_registry_file, Registry};
use sampler::{ProcessSampler, SystemSampler};
use store::PlaytimeStore;
use tracker::SessionTracker;
use tracking::TrackingModule;

pub const REGISTRY_FILE: &str = "games.csv";
pub const PLAYTIME_FILE: &str = "playtime.txt";

/// Represents the starting point for the daemon
pub async fn start_daemon(dir: PathBuf, poll_interval: Duration) -> Result<()> {
    let registry_path = dir.join(REGISTRY_FILE);
    ensure_registry_file(&registry_path)?;
    // A malformed registry aborts here, before the loop ever starts.
    let registry = Registry::load(&registry_path)?;
    if registry.is_empty() {
        warn!("Registry {registry_path:?} has no entries, nothing will be tracked");
    } else {
        info!("Tracking {} programs", registry.len());
    }

    let playtime_file = PlaytimeFile::new(dir.join(PLAYTIME_FILE));
    // Anything but a missing totals file is fatal: starting empty would
    // overwrite the recorded history on the next persist.
    let store = PlaytimeStore::from_totals(playtime_file.load()?);

    let shutdown_token = CancellationToken::new();
    let tracker = Arc::new(SessionTracker::new(registry, store));

    #[cfg(unix)]
    tokio::spawn(shutdown::watch_pause_toggle(
        tracker.clone(),
        shutdown_token.clone(),
    ));

    let module = create_tracking_module(
        tracker,
        Box::new(SystemSampler::new()),
        playtime_file,
        &shutdown_token,
        poll_interval,
        DefaultClock,
    );

    let (_, tracking_result) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token.clone()),
        module.run(),
    );

    if let Err(tracking_result) = tracking_result {
        error!("Tracking module got an error {:?}", tracking_result);
    }

    Ok(())
}

fn create_tracking_module(
    tracker: Arc<SessionTracker>,
    sampler: Box<dyn ProcessSampler>,
    playtime_file: PlaytimeFile,
    shutdown_token: &CancellationToken,
    poll_interval: Duration,
    clock: impl Clock,
) -> TrackingModule {
    TrackingModule::new(
        tracker,
        sampler,
        playtime_file,
        shutdown_token.clone(),
        poll_interval,
        Box::new(clock),
    )
}

#[cfg(test)]
mod daemon_tests {
    use std::{collections::HashSet, sync::Arc, time::Duration};

    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use tempfile::tempdir;
    use tokio::time::Instant;
    use tokio_util::sync::CancellationToken;

    use crate::{
        daemon::{
            create_tracking_module,
            persist::PlaytimeFile,
            registry::Registry,
            sampler::MockProcessSampler,
            store::PlaytimeStore,
            tracker::SessionTracker,
            PLAYTIME_FILE,
        },
        utils::{clock::Clock, logging::TEST_LOGGING},
    };

    #[derive(Clone)]
    struct TestClock {
        start_time: DateTime<Utc>,
        reference: Instant,
    }

    #[async_trait]
    impl Clock for TestClock {
        fn time(&self) -> DateTime<Utc> {
            self.start_time + self.reference.elapsed()
        }

        fn instant(&self) -> Instant {
            Instant::now()
        }

        async fn sleep_until(&self, instant: tokio::time::Instant) {
            tokio::time::sleep_until(instant).await;
        }
    }

    fn test_samples() -> Vec<HashSet<String>> {
        let game = HashSet::from(["game.exe".to_string(), "init".to_string()]);
        vec![game.clone(), game, HashSet::from(["init".to_string()])]
    }

    /// Very simple smoke test to check if the daemon pipeline is working
    /// properly: a tracked process appears for two cycles, disappears, and
    /// its session must end up in the persisted totals.
    #[tokio::test]
    async fn smoke_test_daemon() -> Result<()> {
        *TEST_LOGGING;
        let mut sampler = MockProcessSampler::new();
        let mut samples = test_samples().into_iter().cycle();
        sampler
            .expect_sample()
            .returning(move || Ok(samples.next().unwrap()))
            .times(..8);

        let shutdown_token = CancellationToken::new();
        let test_clock = TestClock {
            start_time: Utc::now(),
            reference: Instant::now(),
        };

        let dir = tempdir()?;
        let registry = Registry::from_entries([("game.exe".to_string(), "Game".to_string())]);
        let tracker = Arc::new(SessionTracker::new(registry, PlaytimeStore::new()));
        let playtime_file = PlaytimeFile::new(dir.path().join(PLAYTIME_FILE));

        let module = create_tracking_module(
            tracker.clone(),
            Box::new(sampler),
            playtime_file,
            &shutdown_token,
            Duration::from_millis(100),
            test_clock,
        );

        let (_, tracking_result) = tokio::join!(
            async {
                tokio::time::sleep(Duration::from_millis(550)).await;
                shutdown_token.cancel()
            },
            module.run(),
        );
        tracking_result?;

        let persisted = PlaytimeFile::new(dir.path().join(PLAYTIME_FILE)).load()?;
        assert_eq!(persisted.len(), 1);
        // Two complete appear/disappear rounds of ~200ms each, give or take
        // scheduling; anything positive proves the pipeline.
        assert!(persisted["Game"] > 0.0);
        assert_eq!(tracker.active_count(), 0);
        Ok(())
    }
}

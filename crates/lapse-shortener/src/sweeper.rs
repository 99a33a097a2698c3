use lapse_core::Shortener;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, TypedBuilder)]
pub struct SweeperSettings {
    /// Time between two sweeps. The first sweep runs immediately.
    #[builder(default = DEFAULT_SWEEP_INTERVAL)]
    pub interval: Duration,
}

impl Default for SweeperSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Periodically deletes expired records through a [`Shortener`].
///
/// A failed sweep is logged and retried on the next tick; the loop only ends
/// when its cancellation token is cancelled.
pub struct Sweeper<S> {
    shortener: S,
    settings: SweeperSettings,
    cancel: CancellationToken,
}

impl<S: Shortener> Sweeper<S> {
    pub fn new(shortener: S, settings: SweeperSettings) -> Self {
        Self {
            shortener,
            settings,
            cancel: CancellationToken::new(),
        }
    }

    /// Returns a token that stops the sweeper when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs until cancelled and returns the total number of records removed.
    pub async fn run(self) -> u64 {
        let mut ticker = tokio::time::interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut total = 0_u64;

        info!(interval = ?self.settings.interval, "sweeper started");
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => match self.shortener.cleanup(None).await {
                    Ok(removed) => {
                        total += removed;
                        debug!(removed, total, "sweep finished");
                    }
                    Err(err) => warn!(error = %err, "sweep failed"),
                },
            }
        }

        info!(total, "sweeper stopped");
        total
    }

    /// Runs the sweeper on the current tokio runtime.
    pub fn spawn(self) -> JoinHandle<u64> {
        tokio::spawn(self.run())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::ShortenerService;
    use async_trait::async_trait;
    use jiff::{SignedDuration, Timestamp};
    use lapse_core::{
        NewUrlRecord, Repository, ShortCode, ShortenParams, ShortenerError, UrlRecord,
    };
    use lapse_generator::SeqGenerator;
    use lapse_storage::InMemoryRepository;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// A shortener whose cleanup always fails, counting the calls.
    #[derive(Default)]
    struct FailingShortener {
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl Shortener for FailingShortener {
        async fn shorten(&self, _params: ShortenParams) -> Result<UrlRecord, ShortenerError> {
            Err(ShortenerError::Storage("unavailable".to_string()))
        }

        async fn resolve(&self, _code: &ShortCode) -> Result<Option<String>, ShortenerError> {
            Ok(None)
        }

        async fn list_active(&self) -> Result<Vec<UrlRecord>, ShortenerError> {
            Ok(vec![])
        }

        async fn cleanup(&self, _now: Option<Timestamp>) -> Result<u64, ShortenerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ShortenerError::Storage("unavailable".to_string()))
        }
    }

    fn fast() -> SweeperSettings {
        SweeperSettings::builder()
            .interval(Duration::from_millis(10))
            .build()
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_removes_expired_records_until_cancelled() {
        let service = ShortenerService::new(InMemoryRepository::new(), SeqGenerator::new());
        let past = Timestamp::now() - SignedDuration::from_secs(1);
        for i in 0..3_u64 {
            service
                .repository()
                .insert(NewUrlRecord {
                    code: SeqGenerator::encode(i),
                    original_url: format!("https://example.com/{i}"),
                    expire_at: past,
                })
                .await
                .unwrap();
        }
        let live = service
            .shorten(ShortenParams::new("https://live.example"))
            .await
            .unwrap();

        let sweeper = Sweeper::new(service.clone(), fast());
        let cancel = sweeper.cancellation_token();
        let handle = sweeper.spawn();

        tokio::time::sleep(Duration::from_millis(45)).await;
        cancel.cancel();
        let total = handle.await.unwrap();

        assert_eq!(total, 3);
        assert_eq!(service.repository().len(), 1);
        assert!(service.lookup(&live.code).await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_keeps_running_after_a_failed_sweep() {
        let shortener = FailingShortener::default();
        let calls = Arc::clone(&shortener.calls);

        let sweeper = Sweeper::new(shortener, fast());
        let cancel = sweeper.cancellation_token();
        let handle = sweeper.spawn();

        // ticks at 0, 10, ..., 90 ms on the paused clock
        tokio::time::sleep(Duration::from_millis(95)).await;
        cancel.cancel();

        assert_eq!(handle.await.unwrap(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_sweeper_stops_immediately() {
        let service = ShortenerService::new(InMemoryRepository::new(), SeqGenerator::new());
        let sweeper = Sweeper::new(service, SweeperSettings::default());
        sweeper.cancellation_token().cancel();

        assert_eq!(sweeper.run().await, 0);
    }
}

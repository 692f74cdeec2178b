//! Periodic refresh and the single source of truth for the current data.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use bon::bon;
use chrono::{DateTime, Local};
use serde_json::Value;
use tokio::{
    sync::watch,
    time::{MissedTickBehavior, interval},
};

use crate::{error::Result, prelude::*};

pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(120);

/// Shorter intervals get rounded up to this one.
pub const MIN_SCAN_INTERVAL: Duration = Duration::from_secs(1);

/// Most recent successful fetch: raw payloads plus the plant they belong to.
#[must_use]
#[derive(Clone, Debug)]
pub struct Snapshot {
    pub account_id: String,

    /// Instantaneous telemetry.
    pub flow: Value,

    /// Daily aggregate, if the upstream offers any.
    pub day: Option<Value>,

    pub fetched_at: DateTime<Local>,
}

/// Anything that can produce a fresh [`Snapshot`].
#[async_trait]
pub trait Source: Send + Sync {
    async fn fetch_snapshot(&self) -> Result<Snapshot>;
}

#[async_trait]
impl<S: Source + ?Sized> Source for Arc<S> {
    async fn fetch_snapshot(&self) -> Result<Snapshot> {
        S::fetch_snapshot(self).await
    }
}

/// What the readers observe.
///
/// The whole status gets replaced at once, so a reader never sees a snapshot
/// assembled from different refreshes.
#[must_use]
#[derive(Clone, Debug, Default)]
pub struct Status {
    pub snapshot: Option<Arc<Snapshot>>,

    /// Whether the snapshot is considered current.
    pub is_available: bool,

    pub consecutive_failures: u32,

    /// Message of the latest failed refresh, cleared on success.
    pub last_error: Option<String>,
}

pub struct Coordinator<S> {
    source: S,
    interval: Duration,

    /// Number of consecutive failed refreshes after which the source is marked unavailable.
    max_consecutive_failures: u32,

    status: watch::Sender<Status>,
}

#[bon]
impl<S: Source> Coordinator<S> {
    #[builder]
    pub fn new(
        source: S,
        #[builder(default = DEFAULT_SCAN_INTERVAL)] interval: Duration,

        #[builder(default = 1)]
        max_consecutive_failures: u32,
    ) -> Self {
        let (status, _) = watch::channel(Status::default());
        Self { source, interval: interval.max(MIN_SCAN_INTERVAL), max_consecutive_failures, status }
    }

    /// Perform the initial refresh.
    ///
    /// Without an initial snapshot there is nothing to serve, so the caller
    /// must treat the failure as fatal for the setup.
    #[instrument(skip_all)]
    pub async fn first_refresh(&self) -> Result<Arc<Snapshot>> {
        self.refresh().await.inspect_err(|error| {
            error!("first refresh failed: {error:#}");
        })
    }

    /// Fetch a new snapshot and publish it.
    ///
    /// On failure, the previous snapshot stays readable.
    #[instrument(skip_all)]
    pub async fn refresh(&self) -> Result<Arc<Snapshot>> {
        match self.source.fetch_snapshot().await {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                info!(account_id = %snapshot.account_id, has_day = snapshot.day.is_some(), "refreshed");
                self.status.send_replace(Status {
                    snapshot: Some(Arc::clone(&snapshot)),
                    is_available: true,
                    consecutive_failures: 0,
                    last_error: None,
                });
                Ok(snapshot)
            }
            Err(error) => {
                self.status.send_modify(|status| {
                    status.consecutive_failures = status.consecutive_failures.saturating_add(1);
                    status.last_error = Some(format!("{error:#}"));
                    if status.snapshot.is_none()
                        || status.consecutive_failures >= self.max_consecutive_failures
                    {
                        status.is_available = false;
                    }
                });
                warn!(is_auth = error.is_auth(), "update failed: {error:#}");
                Err(error)
            }
        }
    }

    /// Refresh on the fixed cadence, forever.
    ///
    /// The first tick is delayed by one interval: the initial refresh belongs to the setup.
    /// Failures are published via the status and otherwise ignored.
    pub async fn run(&self) {
        let mut interval = interval(self.interval);
        interval.reset_after(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            let _ = self.refresh().await;
        }
    }

    pub fn status(&self) -> Status {
        self.status.borrow().clone()
    }

    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.status.borrow().snapshot.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Status> {
        self.status.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{
            Mutex,
            atomic::{AtomicU64, Ordering},
        },
    };

    use serde_json::json;

    use super::*;
    use crate::error::Error;

    fn snapshot(account_id: &str) -> Snapshot {
        Snapshot {
            account_id: account_id.to_owned(),
            flow: json!({"pv": {"power": 1500}}),
            day: Some(json!({"eDay": 12.3})),
            fetched_at: Local::now(),
        }
    }

    /// Replays the prepared outcomes one by one.
    struct Scripted(Mutex<VecDeque<Result<Snapshot>>>);

    impl Scripted {
        fn new(outcomes: impl IntoIterator<Item = Result<Snapshot>>) -> Self {
            Self(Mutex::new(outcomes.into_iter().collect()))
        }
    }

    #[async_trait]
    impl Source for Scripted {
        async fn fetch_snapshot(&self) -> Result<Snapshot> {
            self.0
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Error::Api(anyhow!("script exhausted"))))
        }
    }

    fn api_error() -> Result<Snapshot> {
        Err(Error::Api(anyhow!("timed out")))
    }

    #[tokio::test]
    async fn first_refresh_ok() -> crate::prelude::Result {
        let coordinator = Coordinator::builder().source(Scripted::new([Ok(snapshot("1"))])).build();
        assert!(coordinator.snapshot().is_none());

        let snapshot = coordinator.first_refresh().await?;
        assert_eq!(snapshot.account_id, "1");

        let status = coordinator.status();
        assert!(status.is_available);
        assert_eq!(status.consecutive_failures, 0);
        assert!(Arc::ptr_eq(&status.snapshot.unwrap(), &snapshot));
        Ok(())
    }

    #[tokio::test]
    async fn first_refresh_auth_error() {
        let source = Scripted::new([Err(Error::Auth(anyhow!("bad credentials")))]);
        let coordinator = Coordinator::builder().source(source).build();

        let error = coordinator.first_refresh().await.unwrap_err();
        assert!(error.is_auth());

        let status = coordinator.status();
        assert!(status.snapshot.is_none());
        assert!(!status.is_available);
        assert_eq!(status.consecutive_failures, 1);
        assert!(status.last_error.unwrap().contains("bad credentials"));
    }

    #[tokio::test]
    async fn failure_keeps_stale_snapshot() -> crate::prelude::Result {
        let source = Scripted::new([Ok(snapshot("1")), api_error()]);
        let coordinator = Coordinator::builder().source(source).build();
        coordinator.first_refresh().await?;

        assert!(coordinator.refresh().await.is_err());
        let status = coordinator.status();
        assert!(!status.is_available);
        assert_eq!(status.snapshot.unwrap().account_id, "1");
        Ok(())
    }

    #[tokio::test]
    async fn failure_threshold() -> crate::prelude::Result {
        let source = Scripted::new([
            Ok(snapshot("1")),
            api_error(),
            api_error(),
            api_error(),
            Ok(snapshot("2")),
        ]);
        let coordinator =
            Coordinator::builder().source(source).max_consecutive_failures(3).build();
        coordinator.first_refresh().await?;

        for _ in 0..2 {
            assert!(coordinator.refresh().await.is_err());
            assert!(coordinator.status().is_available);
        }
        assert!(coordinator.refresh().await.is_err());
        assert!(!coordinator.status().is_available);
        assert_eq!(coordinator.status().consecutive_failures, 3);

        coordinator.refresh().await?;
        let status = coordinator.status();
        assert!(status.is_available);
        assert_eq!(status.consecutive_failures, 0);
        assert!(status.last_error.is_none());
        assert_eq!(status.snapshot.unwrap().account_id, "2");
        Ok(())
    }

    #[tokio::test]
    async fn zero_interval_is_rounded_up() {
        let coordinator = Coordinator::builder()
            .source(Scripted::new([Ok(snapshot("1"))]))
            .interval(Duration::ZERO)
            .build();
        assert_eq!(coordinator.interval, MIN_SCAN_INTERVAL);

        let result = tokio::time::timeout(Duration::from_millis(50), coordinator.run()).await;
        assert!(result.is_err(), "no refresh is expected before the first interval");
        assert_eq!(coordinator.status().consecutive_failures, 0);
    }

    /// Every snapshot carries its generation in both payloads.
    struct Generations(AtomicU64);

    #[async_trait]
    impl Source for Generations {
        async fn fetch_snapshot(&self) -> Result<Snapshot> {
            let generation = self.0.fetch_add(1, Ordering::Relaxed);
            tokio::task::yield_now().await;
            Ok(Snapshot {
                account_id: "1".to_owned(),
                flow: json!({"generation": generation}),
                day: Some(json!({"generation": generation})),
                fetched_at: Local::now(),
            })
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn readers_never_see_torn_snapshots() -> crate::prelude::Result {
        let coordinator =
            Arc::new(Coordinator::builder().source(Generations(AtomicU64::new(0))).build());
        coordinator.first_refresh().await?;

        let writer = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move {
                for _ in 0..500 {
                    let _ = coordinator.refresh().await;
                }
            })
        };

        let receiver = coordinator.subscribe();
        while !writer.is_finished() {
            let snapshot = receiver.borrow().snapshot.clone().unwrap();
            assert_eq!(Some(&snapshot.flow), snapshot.day.as_ref());
            tokio::task::yield_now().await;
        }
        writer.await?;

        assert_eq!(coordinator.snapshot().unwrap().flow, json!({"generation": 500}));
        Ok(())
    }
}

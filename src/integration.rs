//! One configured Sol-Ark account: the client, its coordinator, and the derived sensors.

use std::{sync::Arc, time::Duration};

use bon::Builder;

use crate::{
    coordinator::{Coordinator, DEFAULT_SCAN_INTERVAL, Source, Status},
    prelude::*,
    sensor::{self, Reading, Sensor},
};

#[derive(Copy, Clone, Builder)]
pub struct Options {
    #[builder(default = DEFAULT_SCAN_INTERVAL)]
    pub scan_interval: Duration,

    #[builder(default = 1)]
    pub max_consecutive_failures: u32,

    /// Flip the sign of the grid power.
    #[builder(default)]
    pub invert_grid_sign: bool,
}

/// The coordinator owns the client as its source.
pub struct Integration<S> {
    coordinator: Coordinator<Arc<S>>,
    sensors: Vec<Box<dyn Sensor>>,
}

impl<S: Source> Integration<S> {
    /// Build the coordinator and perform the first refresh.
    ///
    /// Nothing gets set up unless the first refresh succeeds.
    #[instrument(skip_all)]
    pub async fn setup(client: S, options: Options) -> Result<Self> {
        let coordinator = Coordinator::builder()
            .source(Arc::new(client))
            .interval(options.scan_interval)
            .max_consecutive_failures(options.max_consecutive_failures)
            .build();
        let snapshot = coordinator.first_refresh().await.context("setup failed")?;
        info!(account_id = %snapshot.account_id, "set up");
        Ok(Self { coordinator, sensors: sensor::all(options.invert_grid_sign) })
    }

    pub const fn coordinator(&self) -> &Coordinator<Arc<S>> {
        &self.coordinator
    }

    /// Read every sensor against the same status.
    pub fn readings<'a>(&'a self, status: &Status) -> Vec<(&'a dyn Sensor, Reading)> {
        self.sensors.iter().map(|sensor| (sensor.as_ref(), sensor.read(status))).collect()
    }

    pub async fn run(&self) {
        self.coordinator.run().await;
    }

    /// Tear down the instance and discard the cached snapshot.
    pub fn unload(self) {
        info!(has_snapshot = self.coordinator.snapshot().is_some(), "unloading…");
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::Local;
    use serde_json::json;

    use super::*;
    use crate::{
        coordinator::Snapshot,
        error::{Error, Result as ClientResult},
    };

    struct Healthy;

    #[async_trait]
    impl Source for Healthy {
        async fn fetch_snapshot(&self) -> ClientResult<Snapshot> {
            Ok(Snapshot {
                account_id: "4321".to_owned(),
                flow: json!({"data": {"pvPower": 1500, "gridOrMeterPower": -200}}),
                day: Some(json!({"data": {"eDay": {"value": 12.3}}})),
                fetched_at: Local::now(),
            })
        }
    }

    struct Rejecting;

    #[async_trait]
    impl Source for Rejecting {
        async fn fetch_snapshot(&self) -> ClientResult<Snapshot> {
            Err(Error::Auth(anyhow!("bad credentials")))
        }
    }

    #[tokio::test]
    async fn setup_ok() -> Result {
        let options = Options::builder().invert_grid_sign(true).build();
        let integration = Integration::setup(Healthy, options).await?;

        let status = integration.coordinator().status();
        let readings = integration
            .readings(&status)
            .into_iter()
            .map(|(sensor, reading)| (sensor.description().key, reading))
            .collect::<Vec<_>>();
        assert_eq!(
            readings,
            [
                ("pv_power", Reading::Available(1500.0)),
                ("pv_energy_today", Reading::Available(12.3)),
                ("grid_power", Reading::Available(200.0)),
            ]
        );
        integration.unload();
        Ok(())
    }

    #[tokio::test]
    async fn setup_fails_without_first_snapshot() {
        let error = Integration::setup(Rejecting, Options::builder().build()).await.err().unwrap();
        assert!(format!("{error:#}").contains("bad credentials"));
        assert!(error.root_cause().to_string().contains("bad credentials"));
    }
}

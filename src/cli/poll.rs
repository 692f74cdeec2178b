use clap::Parser;
use tokio::{select, signal, sync::watch};

use crate::{
    api::solark,
    cli::{
        heartbeat::HeartbeatArgs,
        solark::{PollingArgs, SolArkArgs},
    },
    coordinator::Status,
    integration::Integration,
    prelude::*,
    tables::build_readings_table,
};

#[derive(Parser)]
pub struct PollArgs {
    #[clap(flatten)]
    sol_ark: SolArkArgs,

    #[clap(flatten)]
    polling: PollingArgs,

    #[clap(flatten)]
    heartbeat: HeartbeatArgs,
}

impl PollArgs {
    pub async fn run(self) -> Result {
        let integration = Integration::setup(self.sol_ark.new_client()?, self.polling.into()).await?;
        let updates = integration.coordinator().subscribe();

        let result = select! {
            () = integration.run() => Ok(()),
            result = report(&integration, updates, &self.heartbeat) => result,
            result = signal::ctrl_c() => {
                info!("interrupted");
                result.context("failed to listen for Ctrl-C")
            }
        };
        integration.unload();
        result
    }
}

/// Print the sensors and report to the heartbeat after every refresh, starting with the current status.
async fn report(
    integration: &Integration<solark::Api>,
    mut updates: watch::Receiver<Status>,
    heartbeat: &HeartbeatArgs,
) -> Result {
    loop {
        let status = updates.borrow_and_update().clone();
        println!("{}", build_readings_table(integration.readings(&status), &status));
        heartbeat.send(&status).await;
        updates.changed().await.context("the coordinator has gone")?;
    }
}

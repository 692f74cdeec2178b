use clap::{Parser, Subcommand};
use serde_json::Value;

use crate::{cli::solark::SolArkArgs, prelude::*};

#[derive(Parser)]
pub struct BurrowArgs {
    #[clap(flatten)]
    sol_ark: SolArkArgs,

    #[command(subcommand)]
    command: BurrowCommand,
}

#[derive(Subcommand)]
enum BurrowCommand {
    /// List the plants in the raw format.
    Plants,

    /// Get the raw power flow.
    Flow,

    /// Get the raw day energy.
    Day,
}

impl BurrowArgs {
    #[instrument(skip_all)]
    pub async fn run(self) -> Result {
        let api = self.sol_ark.new_client()?;
        let response = match self.command {
            BurrowCommand::Plants => Value::Array(api.list_accounts().await?),
            BurrowCommand::Flow => {
                let account_id = api.resolve_default_account().await?;
                api.get_power_flow(account_id).await?
            }
            BurrowCommand::Day => {
                let account_id = api.resolve_default_account().await?;
                api.get_day_energy(account_id).await?.unwrap_or_default()
            }
        };
        info!("gotcha");
        println!("{}", serde_json::to_string_pretty(&response)?);
        Ok(())
    }
}

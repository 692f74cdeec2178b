use clap::Parser;

use crate::{
    cli::solark::{PollingArgs, SolArkArgs},
    integration::Integration,
    prelude::*,
    tables::build_readings_table,
};

#[derive(Parser)]
pub struct ReadArgs {
    #[clap(flatten)]
    sol_ark: SolArkArgs,

    #[clap(flatten)]
    polling: PollingArgs,
}

impl ReadArgs {
    pub async fn run(self) -> Result {
        let integration = Integration::setup(self.sol_ark.new_client()?, self.polling.into()).await?;
        let status = integration.coordinator().status();
        println!("{}", build_readings_table(integration.readings(&status), &status));
        integration.unload();
        Ok(())
    }
}

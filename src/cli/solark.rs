use std::time::Duration;

use clap::Parser;
use reqwest::Url;

use crate::{
    api::solark::{self, AuthMode},
    integration::Options,
};

#[derive(Parser)]
pub struct SolArkArgs {
    #[clap(long, env = "SOLARK_USERNAME")]
    pub username: String,

    #[clap(long, env = "SOLARK_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Plant ID. When omitted, the first plant of the account is used.
    #[clap(long = "account-id", alias = "plant-id", env = "SOLARK_PLANT_ID")]
    pub account_id: Option<String>,

    #[clap(long, env = "SOLARK_BASE_URL", default_value = solark::DEFAULT_BASE_URL)]
    pub base_url: Url,

    /// Headers sent along with the token requests.
    #[clap(long, env = "SOLARK_AUTH_MODE", value_enum, default_value = "auto")]
    pub auth_mode: AuthMode,
}

impl SolArkArgs {
    pub fn new_client(&self) -> crate::error::Result<solark::Api> {
        solark::Api::builder()
            .username(&self.username)
            .password(&self.password)
            .maybe_account_id(self.account_id.as_deref())
            .base_url(self.base_url.clone())
            .auth_mode(self.auth_mode)
            .build()
    }
}

#[derive(Copy, Clone, Parser)]
pub struct PollingArgs {
    #[clap(
        long = "scan-interval-seconds",
        env = "SCAN_INTERVAL_SECONDS",
        default_value = "120",
        value_parser = clap::value_parser!(u64).range(1..),
    )]
    pub scan_interval_seconds: u64,

    /// Consecutive failed refreshes after which the sensors are reported as stale.
    #[clap(
        long,
        env = "MAX_CONSECUTIVE_FAILURES",
        default_value = "1",
        value_parser = clap::value_parser!(u32).range(1..),
    )]
    pub max_consecutive_failures: u32,

    /// Report grid import as negative power.
    #[clap(long, env = "INVERT_GRID_SIGN")]
    pub invert_grid_sign: bool,
}

impl From<PollingArgs> for Options {
    fn from(args: PollingArgs) -> Self {
        Self::builder()
            .scan_interval(Duration::from_secs(args.scan_interval_seconds))
            .max_consecutive_failures(args.max_consecutive_failures)
            .invert_grid_sign(args.invert_grid_sign)
            .build()
    }
}

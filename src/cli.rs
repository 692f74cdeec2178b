mod burrow;
mod heartbeat;
mod poll;
mod read;
mod solark;

use clap::{Parser, Subcommand};

use crate::cli::{burrow::BurrowArgs, poll::PollArgs, read::ReadArgs};

#[derive(Parser)]
#[command(author, version, about, propagate_version = true)]
#[must_use]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Main command: refresh the sensors periodically until interrupted.
    #[clap(name = "poll")]
    Poll(Box<PollArgs>),

    /// Refresh once and print the sensors.
    #[clap(name = "read")]
    Read(Box<ReadArgs>),

    /// Development tools.
    #[clap(name = "burrow")]
    Burrow(Box<BurrowArgs>),
}

pub mod args;

pub use args::{Cli, Commands, LongreadType, RunArgs};

use clap::Parser;

pub fn parse() -> Cli {
    Cli::parse()
}

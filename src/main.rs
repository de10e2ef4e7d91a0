mod cli;
mod config;
mod pipelines;
mod utils;

use std::io::Write;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use env_logger::Builder;
use log::{error, info, LevelFilter};

use crate::cli::{parse, Commands};
use crate::config::defs::RunConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let run_start = Instant::now();

    let cli = parse();

    let log_level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    Builder::new()
        .filter_level(log_level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {}: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .init();

    println!("\n-------------\n Rookery\n-------------\n");

    let config = match RunConfig::from_cli(&cli.command) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            error!("Invalid run configuration: {}", e);
            std::process::exit(1);
        }
    };
    info!(
        "Run mode: {}; output directory: {}",
        config.mode,
        config.output_dir.display()
    );

    if let Err(e) = match cli.command {
        Commands::Assemble(_) => pipelines::assemble::run(config).await,
        Commands::Recover(_) => pipelines::recover::run(config).await,
    } {
        error!(
            "Pipeline failed: {} at {} milliseconds.",
            e,
            run_start.elapsed().as_millis()
        );
        std::process::exit(1);
    }

    println!("Run complete: {} milliseconds.", run_start.elapsed().as_millis());
    Ok(())
}

// src/pipelines/assemble.rs: the assembly-only pipeline

use std::sync::Arc;

use log::{debug, info};

use crate::config::defs::{PipelineError, RunConfig, ASSEMBLY_TARGET, SNAKEMAKE_TAG};
use crate::pipelines::{contract, link_final_contigs, run_engine_target, write_engine_config};
use crate::utils::command::check_version;
use crate::utils::file::ensure_dir;

pub async fn run(config: Arc<RunConfig>) -> Result<(), PipelineError> {
    let engine_version = check_version(SNAKEMAKE_TAG)
        .await
        .map_err(|e| PipelineError::ToolExecution {
            tool: SNAKEMAKE_TAG.to_string(),
            error: e.to_string(),
        })?;
    debug!("Found {} {}", SNAKEMAKE_TAG, engine_version);

    ensure_dir(&config.output_dir).map_err(|e| PipelineError::IOError(e.to_string()))?;
    let configfile = write_engine_config(&config)?;

    run_engine_target(&config, &configfile, ASSEMBLY_TARGET).await?;
    link_final_contigs(&config.output_dir)?;

    contract::check_run(&config.output_dir, config.mode)?;
    info!("Assembly finished: {}", config.output_dir.display());
    Ok(())
}

// src/pipelines/recover.rs: assembly + binning + diversity profiling

use std::fs;
use std::path::Path;
use std::sync::Arc;

use log::{debug, info};

use crate::config::defs::{
    PipelineError, RunConfig, APPRAISAL_PLOT, APPRAISAL_TABLE, ASSEMBLY_TARGET, DATA_DIR,
    DIVERSITY_DIR, RECOVERY_TARGET, SINGLEM_OUT_DIR, SINGLEM_TAG, SNAKEMAKE_TAG,
};
use crate::pipelines::profiling::{run_profiling, CombinedTable, ReadManifest};
use crate::pipelines::{contract, link_final_contigs, run_engine_target, write_engine_config};
use crate::utils::command::{check_version, singlem};
use crate::utils::file::{ensure_dir, force_symlink};
use crate::utils::process::{ensure_success, run_tool};

pub async fn run(config: Arc<RunConfig>) -> Result<(), PipelineError> {
    let engine_version = check_version(SNAKEMAKE_TAG)
        .await
        .map_err(|e| PipelineError::ToolExecution {
            tool: SNAKEMAKE_TAG.to_string(),
            error: e.to_string(),
        })?;
    debug!("Found {} {}", SNAKEMAKE_TAG, engine_version);
    if !config.skip_abundances {
        let profiler_version =
            check_version(SINGLEM_TAG)
                .await
                .map_err(|e| PipelineError::ToolExecution {
                    tool: SINGLEM_TAG.to_string(),
                    error: e.to_string(),
                })?;
        debug!("Found {} {}", SINGLEM_TAG, profiler_version);
    }

    ensure_dir(&config.output_dir).map_err(|e| PipelineError::IOError(e.to_string()))?;
    let configfile = write_engine_config(&config)?;

    match &config.assembly {
        Some(assembly) => {
            info!(
                "Using precomputed assembly {}; skipping the assembly stage",
                assembly.display()
            );
        }
        None => {
            run_engine_target(&config, &configfile, ASSEMBLY_TARGET).await?;
            link_final_contigs(&config.output_dir)?;
        }
    }

    run_engine_target(&config, &configfile, RECOVERY_TARGET).await?;

    if config.skip_abundances {
        info!("--skip-abundances given; skipping the diversity stage");
    } else {
        let manifest = ReadManifest::new(
            config.long_reads.clone(),
            config.short_reads_1.clone(),
            config.short_reads_2.clone(),
        )?;
        let combined = run_profiling(&config, &manifest, config.max_threads).await?;
        appraise(&config, &combined).await?;
        link_diversity(&config.output_dir)?;
    }

    contract::check_run(&config.output_dir, config.mode)?;
    info!("Recovery finished: {}", config.output_dir.display());
    Ok(())
}

/// Appraises the combined OTU table. The appraisal table arrives on the
/// profiler's stdout; the plot is written by the profiler itself.
async fn appraise(config: &RunConfig, combined: &CombinedTable) -> Result<(), PipelineError> {
    let singlem_dir = combined.path.parent().ok_or_else(|| {
        PipelineError::IOError(format!("{} has no parent directory", combined.path.display()))
    })?;
    let plot = singlem_dir.join(APPRAISAL_PLOT);

    let args = singlem::appraise_args(&combined.path, &plot);
    let output = run_tool(
        SINGLEM_TAG,
        &args,
        None,
        &config.child_env(),
        config.tool_timeout,
    )
    .await?;
    ensure_success(SINGLEM_TAG, &output)?;

    fs::write(singlem_dir.join(APPRAISAL_TABLE), output.stdout)
        .map_err(|e| PipelineError::IOError(e.to_string()))
}

/// Exposes the profiling output directory under its stable location,
/// `diversity/singlem_out`.
fn link_diversity(root: &Path) -> Result<(), PipelineError> {
    let target = Path::new("..").join(DATA_DIR).join(SINGLEM_OUT_DIR);
    let link = root.join(DIVERSITY_DIR).join(SINGLEM_OUT_DIR);
    force_symlink(&target, &link).map_err(|e| PipelineError::IOError(e.to_string()))
}

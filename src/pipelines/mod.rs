pub mod assemble;
pub mod contract;
pub mod profiling;
pub mod recover;

use std::fs::File;
use std::path::{Path, PathBuf};

use log::info;
use serde::Serialize;

use crate::config::defs::{
    PipelineError, RunConfig, ASSEMBLY_DIR, DATA_DIR, FINAL_CONTIGS, SNAKEMAKE_TAG,
};
use crate::utils::command::snakemake;
use crate::utils::file::{ensure_dir, force_symlink};
use crate::utils::process::{ensure_success, run_tool};

/// The parameter record handed to the workflow engine. Serialized next to
/// the engine's state so a run can be inspected or resumed by hand.
#[derive(Serialize)]
struct EngineConfig<'a> {
    short_reads_1: &'a Option<Vec<PathBuf>>,
    short_reads_2: &'a Option<Vec<PathBuf>>,
    long_reads: &'a Option<Vec<PathBuf>>,
    long_read_type: String,
    min_read_size: Option<usize>,
    min_mean_q: Option<f64>,
    assembly: &'a Option<PathBuf>,
    skip_binners: &'a [String],
    skip_qc: bool,
    refinery_max_iterations: u32,
    max_threads: usize,
}

pub(crate) fn write_engine_config(config: &RunConfig) -> Result<PathBuf, PipelineError> {
    ensure_dir(config.engine_dir()).map_err(|e| PipelineError::IOError(e.to_string()))?;

    let view = EngineConfig {
        short_reads_1: &config.short_reads_1,
        short_reads_2: &config.short_reads_2,
        long_reads: &config.long_reads,
        long_read_type: config.longread_type.to_string(),
        min_read_size: config.min_read_size,
        min_mean_q: config.min_mean_q,
        assembly: &config.assembly,
        skip_binners: &config.skip_binners,
        skip_qc: config.skip_qc,
        refinery_max_iterations: config.refinery_max_iterations,
        max_threads: config.max_threads,
    };

    let path = config.engine_configfile();
    let file = File::create(&path).map_err(|e| PipelineError::IOError(e.to_string()))?;
    serde_json::to_writer_pretty(file, &view)
        .map_err(|e| PipelineError::IOError(e.to_string()))?;
    Ok(path)
}

/// Runs one workflow engine target to completion, with the run output root
/// as the engine's working directory.
pub(crate) async fn run_engine_target(
    config: &RunConfig,
    configfile: &Path,
    target: &str,
) -> Result<(), PipelineError> {
    info!("Running workflow target: {}", target);
    let args = snakemake::arg_generator(config, configfile, target);
    let output = run_tool(
        SNAKEMAKE_TAG,
        &args,
        Some(&config.output_dir),
        &config.child_env(),
        config.tool_timeout,
    )
    .await?;
    ensure_success(SNAKEMAKE_TAG, &output)
}

/// Exposes the assembled contigs at their stable location,
/// `assembly/final_contigs.fasta`, without duplicating the data.
pub(crate) fn link_final_contigs(root: &Path) -> Result<(), PipelineError> {
    let target = Path::new("..").join(DATA_DIR).join(FINAL_CONTIGS);
    let link = root.join(ASSEMBLY_DIR).join(FINAL_CONTIGS);
    force_symlink(&target, &link).map_err(|e| PipelineError::IOError(e.to_string()))
}

// src/config/defs.rs: shared constants, run configuration, and error types

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use lazy_static::lazy_static;

use crate::cli::args::{Commands, LongreadType};

// External software
pub const SINGLEM_TAG: &str = "singlem";
pub const SNAKEMAKE_TAG: &str = "snakemake";

lazy_static! {
    /// Oldest tool versions the pipeline has been run against. Older
    /// versions are warned about, not rejected.
    pub static ref TOOL_VERSIONS: HashMap<&'static str, f32> = {
        let mut m = HashMap::new();
        m.insert(SINGLEM_TAG, 0.18);
        m.insert(SNAKEMAKE_TAG, 7.32);
        m
    };
}

// Output layout, relative to the run output root
pub const DATA_DIR: &str = "data";
pub const ASSEMBLY_DIR: &str = "assembly";
pub const BINS_DIR: &str = "bins";
pub const DIVERSITY_DIR: &str = "diversity";
pub const SINGLEM_OUT_DIR: &str = "singlem_out";

// Static filenames
pub const FINAL_CONTIGS: &str = "final_contigs.fasta";
pub const BIN_INFO: &str = "bin_info.tsv";
pub const LONGREAD_OTU_TABLE: &str = "metagenome.longread_otu_table.csv";
pub const SHORTREAD_OTU_TABLE: &str = "metagenome.shortread_otu_table.csv";
pub const COMBINED_OTU_TABLE: &str = "metagenome.combined_otu_table.csv";
pub const APPRAISAL_TABLE: &str = "singlem_appraisal.tsv";
pub const APPRAISAL_PLOT: &str = "singlem_appraise.svg";
pub const ENGINE_CONFIG: &str = "config.json";

// Workflow engine targets
pub const ASSEMBLY_TARGET: &str = "complete_assembly";
pub const RECOVERY_TARGET: &str = "recover_mags";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Assembly,
    Recovery,
    FastRecovery,
    QueuedRecovery,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Assembly => write!(f, "assembly"),
            RunMode::Recovery => write!(f, "recovery"),
            RunMode::FastRecovery => write!(f, "fast recovery"),
            RunMode::QueuedRecovery => write!(f, "queued recovery"),
        }
    }
}

#[derive(Debug)]
pub enum PipelineError {
    InvalidConfig(String),
    IOError(String),
    ToolExecution { tool: String, error: String },
    ToolFailed { tool: String, code: Option<i32>, stderr: String },
    ToolTimeout { tool: String, seconds: u64 },
    EmptyManifest,
    NoProfilingTables,
    ContractViolation(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
            PipelineError::IOError(msg) => write!(f, "I/O error: {}", msg),
            PipelineError::ToolExecution { tool, error } => {
                write!(f, "failed to execute {}: {}", tool, error)
            }
            PipelineError::ToolFailed { tool, code, stderr } => match code {
                Some(code) => write!(f, "{} exited with status {}: {}", tool, code, stderr),
                None => write!(f, "{} was killed by a signal: {}", tool, stderr),
            },
            PipelineError::ToolTimeout { tool, seconds } => {
                write!(f, "{} did not finish within {} seconds", tool, seconds)
            }
            PipelineError::EmptyManifest => {
                write!(f, "no read sets supplied; nothing to profile")
            }
            PipelineError::NoProfilingTables => {
                write!(f, "every profiling invocation failed; refusing to merge zero OTU tables")
            }
            PipelineError::ContractViolation(msg) => {
                write!(f, "run output contract violated: {}", msg)
            }
        }
    }
}

impl std::error::Error for PipelineError {}

/// Immutable, pipeline-wide run configuration. Built once from the parsed
/// CLI arguments and shared across stages; stages never read ambient state.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub mode: RunMode,
    pub output_dir: PathBuf,
    pub workdir: Option<PathBuf>,
    pub short_reads_1: Option<Vec<PathBuf>>,
    pub short_reads_2: Option<Vec<PathBuf>>,
    pub long_reads: Option<Vec<PathBuf>>,
    pub longread_type: LongreadType,
    pub conda_prefix: Option<PathBuf>,
    pub n_cores: usize,
    pub max_threads: usize,
    pub skip_abundances: bool,
    pub skip_binners: Vec<String>,
    pub skip_qc: bool,
    pub refinery_max_iterations: u32,
    pub assembly: Option<PathBuf>,
    pub min_read_size: Option<usize>,
    pub min_mean_q: Option<f64>,
    pub snakemake_profile: Option<String>,
    pub cluster_retries: u32,
    pub tool_timeout: Option<Duration>,
}

impl RunConfig {
    /// Validates the parsed CLI arguments and freezes them into a config.
    ///
    /// # Arguments
    /// * `command` - The parsed subcommand with its arguments.
    ///
    /// # Returns
    /// The run configuration, or the first preflight failure.
    pub fn from_cli(command: &Commands) -> Result<Self, PipelineError> {
        let (args, recover) = match command {
            Commands::Assemble(args) => (args, false),
            Commands::Recover(args) => (args, true),
        };

        let mode = if !recover {
            RunMode::Assembly
        } else if args.snakemake_profile.is_some() {
            RunMode::QueuedRecovery
        } else if args.assembly.is_some() {
            RunMode::FastRecovery
        } else {
            RunMode::Recovery
        };

        if args.n_cores == 0 || args.max_threads == 0 {
            return Err(PipelineError::InvalidConfig(
                "core and thread counts must be positive".to_string(),
            ));
        }
        if mode == RunMode::QueuedRecovery && args.workdir.is_none() {
            return Err(PipelineError::InvalidConfig(
                "--workdir is required with --snakemake-profile".to_string(),
            ));
        }
        // A queued run assembles on the cluster; a precomputed assembly would
        // skip the stage the queued contract requires output from.
        if mode == RunMode::QueuedRecovery && args.assembly.is_some() {
            return Err(PipelineError::InvalidConfig(
                "--assembly cannot be combined with --snakemake-profile".to_string(),
            ));
        }

        let short_reads_1 = resolve_read_files("-1", &args.pe1)?;
        let short_reads_2 = resolve_read_files("-2", &args.pe2)?;
        let long_reads = resolve_read_files("-l", &args.longreads)?;

        if short_reads_2.is_some() && short_reads_1.is_none() {
            return Err(PipelineError::InvalidConfig(
                "reverse reads (-2) given without forward reads (-1)".to_string(),
            ));
        }
        if let (Some(fwd), Some(rev)) = (&short_reads_1, &short_reads_2) {
            if fwd.len() != rev.len() {
                return Err(PipelineError::InvalidConfig(format!(
                    "paired read lists differ in length: {} forward vs {} reverse",
                    fwd.len(),
                    rev.len()
                )));
            }
        }
        if let Some(assembly) = &args.assembly {
            if !assembly.is_file() {
                return Err(PipelineError::InvalidConfig(format!(
                    "cannot find assembly {}",
                    assembly.display()
                )));
            }
        }

        Ok(RunConfig {
            mode,
            output_dir: absolutize(&args.output_dir)?,
            workdir: match &args.workdir {
                Some(dir) => Some(absolutize(dir)?),
                None => None,
            },
            short_reads_1,
            short_reads_2,
            long_reads,
            longread_type: args.longread_type.clone(),
            conda_prefix: args.conda_prefix.clone(),
            n_cores: args.n_cores,
            max_threads: args.max_threads,
            skip_abundances: args.skip_abundances,
            skip_binners: args.skip_binners.clone(),
            skip_qc: args.skip_qc,
            refinery_max_iterations: args.refinery_max_iterations,
            assembly: args.assembly.clone(),
            min_read_size: args.min_read_size,
            min_mean_q: args.min_mean_q,
            snakemake_profile: args.snakemake_profile.clone(),
            cluster_retries: args.cluster_retries,
            tool_timeout: args.tool_timeout.map(Duration::from_secs),
        })
    }

    /// Directory the workflow engine's state (config file, profile scratch)
    /// lives in: `--workdir` when given, otherwise the run output root.
    pub fn engine_dir(&self) -> &Path {
        self.workdir.as_deref().unwrap_or(&self.output_dir)
    }

    pub fn engine_configfile(&self) -> PathBuf {
        self.engine_dir().join(ENGINE_CONFIG)
    }

    /// Environment entries exported to every child process.
    pub fn child_env(&self) -> Vec<(&'static str, String)> {
        match &self.conda_prefix {
            Some(prefix) => vec![("CONDA_ENV_PATH", prefix.to_string_lossy().to_string())],
            None => Vec::new(),
        }
    }
}

fn absolutize(path: &Path) -> Result<PathBuf, PipelineError> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        let cwd = env::current_dir().map_err(|e| PipelineError::IOError(e.to_string()))?;
        Ok(cwd.join(path))
    }
}

fn resolve_read_files(flag: &str, files: &[PathBuf]) -> Result<Option<Vec<PathBuf>>, PipelineError> {
    if files.is_empty() {
        return Ok(None);
    }
    let mut resolved = Vec::with_capacity(files.len());
    for file in files {
        let file = absolutize(file)?;
        if !file.is_file() {
            return Err(PipelineError::InvalidConfig(format!(
                "cannot find read file {} ({})",
                file.display(),
                flag
            )));
        }
        resolved.push(file);
    }
    Ok(Some(resolved))
}

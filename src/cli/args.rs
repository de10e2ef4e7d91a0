use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Long-read chemistry. The CLI tokens are the same strings the workflow
/// engine config carries, so a run can be reproduced from its config file.
#[derive(Debug, Clone, ValueEnum, Default, PartialEq)]
pub enum LongreadType {
    #[default]
    Ont,
    #[value(name = "ont_hq")]
    OntHq,
    Pacbio,
    #[value(name = "pacbio_hifi")]
    PacbioHifi,
}

impl std::fmt::Display for LongreadType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LongreadType::Ont => write!(f, "ont"),
            LongreadType::OntHq => write!(f, "ont_hq"),
            LongreadType::Pacbio => write!(f, "pacbio"),
            LongreadType::PacbioHifi => write!(f, "pacbio_hifi"),
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "rookery", version, about = "Metagenome assembly and MAG recovery pipeline driver")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short = 'v', long = "verbose", global = true, action)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Assemble short and/or long reads into contigs
    Assemble(RunArgs),
    /// Assemble, bin and taxonomically profile a metagenome
    Recover(RunArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    #[arg(short = 'o', long = "output-dir", help = "Run output root; the pipeline tree is created here")]
    pub output_dir: PathBuf,

    #[arg(long = "workdir", help = "Separate directory for workflow engine state; required in queue mode")]
    pub workdir: Option<PathBuf>,

    #[arg(short = '1', long = "pe-1", num_args = 1.., help = "Forward short read files")]
    pub pe1: Vec<PathBuf>,

    #[arg(short = '2', long = "pe-2", num_args = 1.., help = "Reverse short read files, paired with -1")]
    pub pe2: Vec<PathBuf>,

    #[arg(short = 'l', long = "longreads", num_args = 1.., help = "Long read files")]
    pub longreads: Vec<PathBuf>,

    #[arg(long = "longread-type", default_value = "ont", value_enum)]
    pub longread_type: LongreadType,

    #[arg(long = "conda-prefix", help = "Exported to child processes as CONDA_ENV_PATH")]
    pub conda_prefix: Option<PathBuf>,

    #[arg(short = 'n', long = "n-cores", default_value_t = num_cpus::get(), help = "Cores handed to the workflow engine")]
    pub n_cores: usize,

    #[arg(short = 't', long = "max-threads", default_value_t = num_cpus::get(), help = "Threads handed to the taxonomic profiler")]
    pub max_threads: usize,

    #[arg(long = "skip-abundances", action, help = "Skip the diversity/profiling stage")]
    pub skip_abundances: bool,

    #[arg(long = "skip-binners", num_args = 1.., value_name = "NAME", help = "Binners the workflow engine must skip")]
    pub skip_binners: Vec<String>,

    #[arg(long = "skip-qc", action)]
    pub skip_qc: bool,

    #[arg(long = "refinery-max-iterations", default_value_t = 5)]
    pub refinery_max_iterations: u32,

    #[arg(long = "assembly", help = "Precomputed assembly; suppresses the assembly stage entirely")]
    pub assembly: Option<PathBuf>,

    #[arg(long = "min-read-size", help = "Minimum long read length kept by QC")]
    pub min_read_size: Option<usize>,

    #[arg(long = "min-mean-q", help = "Minimum mean long read quality kept by QC")]
    pub min_mean_q: Option<f64>,

    #[arg(long = "snakemake-profile", help = "Defer stage execution to this cluster queue profile")]
    pub snakemake_profile: Option<String>,

    #[arg(long = "cluster-retries", default_value_t = 0)]
    pub cluster_retries: u32,

    #[arg(long = "tool-timeout", value_name = "SECS", help = "Hard timeout for every external process; unlimited when absent")]
    pub tool_timeout: Option<u64>,
}

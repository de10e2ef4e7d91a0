// src/pipelines/profiling.rs: read-class dispatch for taxonomic profiling
//
// Long reads and short reads are profiled separately, never in one call.
// Paired and unpaired short reads are mutually exclusive by construction
// and write to the same table path, so downstream consumers cannot tell
// the two apart from the filename.

use std::fmt;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::config::defs::{
    PipelineError, RunConfig, COMBINED_OTU_TABLE, DATA_DIR, LONGREAD_OTU_TABLE,
    SHORTREAD_OTU_TABLE, SINGLEM_OUT_DIR, SINGLEM_TAG,
};
use crate::utils::command::singlem;
use crate::utils::file::ensure_dir;
use crate::utils::process::{ensure_success, run_tool};

/// Short read sets a run was given. One variant at a time, so a paired and
/// an unpaired invocation can never both be issued for the same run.
#[derive(Debug, Clone, PartialEq)]
pub enum ShortReads {
    Paired {
        forward: Vec<PathBuf>,
        reverse: Vec<PathBuf>,
    },
    Unpaired {
        forward: Vec<PathBuf>,
    },
    None,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadManifest {
    pub long_reads: Option<Vec<PathBuf>>,
    pub short_reads: ShortReads,
}

impl ReadManifest {
    /// Builds a manifest from optional read lists, enforcing the paired-end
    /// invariants: reverse reads require forward reads, and the two lists
    /// must be equal in length.
    pub fn new(
        long_reads: Option<Vec<PathBuf>>,
        forward: Option<Vec<PathBuf>>,
        reverse: Option<Vec<PathBuf>>,
    ) -> Result<Self, PipelineError> {
        let short_reads = match (forward, reverse) {
            (Some(forward), Some(reverse)) => {
                if forward.len() != reverse.len() {
                    return Err(PipelineError::InvalidConfig(format!(
                        "paired read lists differ in length: {} forward vs {} reverse",
                        forward.len(),
                        reverse.len()
                    )));
                }
                ShortReads::Paired { forward, reverse }
            }
            (Some(forward), None) => ShortReads::Unpaired { forward },
            (None, Some(_)) => {
                return Err(PipelineError::InvalidConfig(
                    "reverse reads given without forward reads".to_string(),
                ));
            }
            (None, None) => ShortReads::None,
        };
        Ok(ReadManifest {
            long_reads,
            short_reads,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.long_reads.is_none() && self.short_reads == ShortReads::None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadClass {
    Longread,
    ShortreadPaired,
    ShortreadUnpaired,
}

impl fmt::Display for ReadClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadClass::Longread => write!(f, "longread"),
            ReadClass::ShortreadPaired => write!(f, "shortread_paired"),
            ReadClass::ShortreadUnpaired => write!(f, "shortread_unpaired"),
        }
    }
}

/// One planned profiler call.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfilingInvocation {
    pub read_class: ReadClass,
    pub args: Vec<String>,
    pub otu_table: PathBuf,
}

/// Explicit per-invocation result; a failed call is recorded, not hidden.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfilingOutcome {
    pub read_class: ReadClass,
    pub otu_table: PathBuf,
    pub succeeded: bool,
}

/// The merged profile and the per-class outcomes that fed it.
#[derive(Debug)]
pub struct CombinedTable {
    pub path: PathBuf,
    pub outcomes: Vec<ProfilingOutcome>,
}

/// Plans the per-read-class profiler calls for a manifest. Pure: touches no
/// filesystem and spawns nothing.
///
/// # Arguments
/// * `manifest` - Which read sets are present.
/// * `threads` - Threads handed to each profiler call.
/// * `singlem_dir` - Directory the per-class tables are written into.
///
/// # Returns
/// Zero, one or two invocations: at most one per read class, long reads
/// independent of short reads.
pub fn plan_invocations(
    manifest: &ReadManifest,
    threads: usize,
    singlem_dir: &Path,
) -> Vec<ProfilingInvocation> {
    let mut plan = Vec::new();

    if let Some(long_reads) = &manifest.long_reads {
        let otu_table = singlem_dir.join(LONGREAD_OTU_TABLE);
        plan.push(ProfilingInvocation {
            read_class: ReadClass::Longread,
            args: singlem::pipe_single_args(threads, long_reads, &otu_table),
            otu_table,
        });
    }

    match &manifest.short_reads {
        ShortReads::Paired { forward, reverse } => {
            let otu_table = singlem_dir.join(SHORTREAD_OTU_TABLE);
            plan.push(ProfilingInvocation {
                read_class: ReadClass::ShortreadPaired,
                args: singlem::pipe_paired_args(threads, forward, reverse, &otu_table),
                otu_table,
            });
        }
        ShortReads::Unpaired { forward } => {
            let otu_table = singlem_dir.join(SHORTREAD_OTU_TABLE);
            plan.push(ProfilingInvocation {
                read_class: ReadClass::ShortreadUnpaired,
                args: singlem::pipe_single_args(threads, forward, &otu_table),
                otu_table,
            });
        }
        ShortReads::None => {}
    }

    plan
}

/// Runs every eligible per-read-class profiler call, strictly one after
/// another, then merges the successful tables into the combined table.
/// A failed per-class call is logged and excluded from the merge; the merge
/// itself runs exactly once, after all per-class calls have finished.
///
/// An empty manifest fails fast rather than merging zero tables, and so
/// does a run in which every per-class call failed.
pub async fn run_profiling(
    config: &RunConfig,
    manifest: &ReadManifest,
    threads: usize,
) -> Result<CombinedTable, PipelineError> {
    if threads == 0 {
        return Err(PipelineError::InvalidConfig(
            "profiler thread count must be positive".to_string(),
        ));
    }

    let singlem_dir = config.output_dir.join(DATA_DIR).join(SINGLEM_OUT_DIR);
    let plan = plan_invocations(manifest, threads, &singlem_dir);
    if plan.is_empty() {
        return Err(PipelineError::EmptyManifest);
    }

    ensure_dir(&singlem_dir).map_err(|e| PipelineError::IOError(e.to_string()))?;

    let env = config.child_env();
    let mut outcomes = Vec::with_capacity(plan.len());
    for invocation in plan {
        info!("Profiling {} reads", invocation.read_class);
        let output = run_tool(SINGLEM_TAG, &invocation.args, None, &env, config.tool_timeout).await?;
        if !output.success() {
            warn!(
                "singlem {} run exited with {:?}; excluding {} from the merge",
                invocation.read_class,
                output.code,
                invocation.otu_table.display()
            );
        }
        outcomes.push(ProfilingOutcome {
            read_class: invocation.read_class,
            otu_table: invocation.otu_table,
            succeeded: output.success(),
        });
    }

    let tables: Vec<PathBuf> = outcomes
        .iter()
        .filter(|outcome| outcome.succeeded)
        .map(|outcome| outcome.otu_table.clone())
        .collect();
    if tables.is_empty() {
        return Err(PipelineError::NoProfilingTables);
    }

    let combined = singlem_dir.join(COMBINED_OTU_TABLE);
    let merge_args = singlem::summarise_args(&tables, &combined);
    let output = run_tool(SINGLEM_TAG, &merge_args, None, &env, config.tool_timeout).await?;
    ensure_success(SINGLEM_TAG, &output)?;
    debug!("Combined OTU table written to {}", combined.display());

    Ok(CombinedTable {
        path: combined,
        outcomes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::args::LongreadType;
    use crate::config::defs::RunMode;
    use tempfile::tempdir;

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    fn test_config(output_dir: &Path) -> RunConfig {
        RunConfig {
            mode: RunMode::Recovery,
            output_dir: output_dir.to_path_buf(),
            workdir: None,
            short_reads_1: None,
            short_reads_2: None,
            long_reads: None,
            longread_type: LongreadType::Ont,
            conda_prefix: None,
            n_cores: 1,
            max_threads: 1,
            skip_abundances: false,
            skip_binners: Vec::new(),
            skip_qc: false,
            refinery_max_iterations: 5,
            assembly: None,
            min_read_size: None,
            min_mean_q: None,
            snakemake_profile: None,
            cluster_retries: 0,
            tool_timeout: None,
        }
    }

    #[test]
    fn manifest_rejects_mismatched_pair_lengths() {
        let result = ReadManifest::new(
            None,
            Some(paths(&["a.1.fq.gz", "b.1.fq.gz"])),
            Some(paths(&["a.2.fq.gz"])),
        );
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn manifest_rejects_reverse_without_forward() {
        let result = ReadManifest::new(None, None, Some(paths(&["a.2.fq.gz"])));
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn empty_manifest_plans_no_invocations() {
        let manifest = ReadManifest::new(None, None, None).unwrap();
        assert!(manifest.is_empty());
        assert!(plan_invocations(&manifest, 4, Path::new("out")).is_empty());
    }

    #[test]
    fn paired_reads_take_precedence_over_the_unpaired_branch() {
        // The forward list alone would satisfy the unpaired branch; paired
        // mode must win.
        let manifest = ReadManifest::new(
            None,
            Some(paths(&["wgsim.1.fq.gz"])),
            Some(paths(&["wgsim.2.fq.gz"])),
        )
        .unwrap();
        let plan = plan_invocations(&manifest, 4, Path::new("out"));
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].read_class, ReadClass::ShortreadPaired);
        assert!(plan[0].args.contains(&"--forward".to_string()));
        assert!(plan[0].args.contains(&"--reverse".to_string()));
    }

    #[test]
    fn unpaired_reads_use_single_sequence_mode() {
        let manifest =
            ReadManifest::new(None, Some(paths(&["wgsim.1.fq.gz"])), None).unwrap();
        let plan = plan_invocations(&manifest, 4, Path::new("out"));
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].read_class, ReadClass::ShortreadUnpaired);
        assert!(plan[0].args.contains(&"--sequences".to_string()));
    }

    #[test]
    fn paired_and_unpaired_share_the_shortread_table_path() {
        let paired = ReadManifest::new(
            None,
            Some(paths(&["r.1.fq.gz"])),
            Some(paths(&["r.2.fq.gz"])),
        )
        .unwrap();
        let unpaired = ReadManifest::new(None, Some(paths(&["r.1.fq.gz"])), None).unwrap();
        let dir = Path::new("out");
        assert_eq!(
            plan_invocations(&paired, 2, dir)[0].otu_table,
            plan_invocations(&unpaired, 2, dir)[0].otu_table
        );
    }

    #[test]
    fn long_read_invocation_is_independent_of_short_reads() {
        let dir = Path::new("out");
        let long = Some(paths(&["pbsim.fq.gz"]));
        let fwd = Some(paths(&["wgsim.1.fq.gz"]));
        let rev = Some(paths(&["wgsim.2.fq.gz"]));

        let both = ReadManifest::new(long.clone(), fwd.clone(), rev.clone()).unwrap();
        let long_only = ReadManifest::new(long.clone(), None, None).unwrap();
        let short_only = ReadManifest::new(None, fwd, rev).unwrap();

        let both_plan = plan_invocations(&both, 4, dir);
        assert_eq!(both_plan.len(), 2);
        assert_eq!(both_plan[0].read_class, ReadClass::Longread);
        assert_eq!(both_plan[1].read_class, ReadClass::ShortreadPaired);

        assert_eq!(plan_invocations(&long_only, 4, dir).len(), 1);
        assert_eq!(plan_invocations(&short_only, 4, dir).len(), 1);
        assert_eq!(
            plan_invocations(&long_only, 4, dir)[0].otu_table,
            both_plan[0].otu_table
        );
    }

    #[test]
    fn per_class_tables_have_distinct_names() {
        let manifest = ReadManifest::new(
            Some(paths(&["pbsim.fq.gz"])),
            Some(paths(&["wgsim.1.fq.gz"])),
            Some(paths(&["wgsim.2.fq.gz"])),
        )
        .unwrap();
        let plan = plan_invocations(&manifest, 4, Path::new("out"));
        assert_ne!(plan[0].otu_table, plan[1].otu_table);
    }

    #[tokio::test]
    async fn empty_manifest_fails_before_any_invocation() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let manifest = ReadManifest::new(None, None, None).unwrap();
        let result = run_profiling(&config, &manifest, 4).await;
        assert!(matches!(result, Err(PipelineError::EmptyManifest)));
        // Fail-fast means not even the output directory is created.
        assert!(!dir.path().join(DATA_DIR).exists());
    }

    #[tokio::test]
    async fn zero_threads_are_rejected() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path());
        let manifest =
            ReadManifest::new(None, Some(paths(&["r.1.fq.gz"])), None).unwrap();
        let result = run_profiling(&config, &manifest, 0).await;
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }
}

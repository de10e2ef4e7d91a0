// src/pipelines/contract.rs: the on-disk contract a finished run must satisfy
//
// Encodes, per run mode, which files, directories and symlinks a successful
// run leaves behind. The driver checks it after the last stage; the
// integration tests reuse the same machinery as executable specification.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::defs::{
    PipelineError, RunMode, APPRAISAL_PLOT, APPRAISAL_TABLE, ASSEMBLY_DIR, BINS_DIR, BIN_INFO,
    COMBINED_OTU_TABLE, DATA_DIR, DIVERSITY_DIR, FINAL_CONTIGS, SINGLEM_OUT_DIR,
};
use crate::utils::file::{count_lines, is_nonempty_file, is_symlink};

/// One filesystem predicate, relative to the run output root.
#[derive(Debug, Clone, PartialEq)]
pub enum Expectation {
    Dir(PathBuf),
    File(PathBuf),
    NonEmptyFile(PathBuf),
    MinLines(PathBuf, usize),
    ExactLines(PathBuf, usize),
    /// The entry must exist and be a symlink; where it points is the
    /// pipeline's business, not the contract's.
    Symlink(PathBuf),
    /// Negative assertion: the entry must not exist at all.
    Absent(PathBuf),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContractViolation {
    pub path: PathBuf,
    pub problem: String,
}

impl fmt::Display for ContractViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.problem)
    }
}

/// The state table: what each run mode must leave on disk. Long-read
/// presence never changes the table; profiling output location and shape
/// are read-class-invariant.
pub fn expectations(mode: RunMode) -> Vec<Expectation> {
    let contigs = Path::new(DATA_DIR).join(FINAL_CONTIGS);
    let contigs_link = Path::new(ASSEMBLY_DIR).join(FINAL_CONTIGS);
    let bin_info = Path::new(BINS_DIR).join(BIN_INFO);
    let diversity = Path::new(DIVERSITY_DIR).join(SINGLEM_OUT_DIR);

    match mode {
        RunMode::Assembly => vec![
            Expectation::NonEmptyFile(contigs),
            Expectation::Symlink(contigs_link),
        ],
        RunMode::Recovery => vec![
            Expectation::NonEmptyFile(contigs),
            Expectation::Symlink(contigs_link),
            // Header plus at least one recovered bin.
            Expectation::MinLines(bin_info, 2),
            Expectation::Symlink(diversity.clone()),
            Expectation::NonEmptyFile(diversity.join(COMBINED_OTU_TABLE)),
            Expectation::NonEmptyFile(diversity.join(APPRAISAL_TABLE)),
            Expectation::File(diversity.join(APPRAISAL_PLOT)),
        ],
        RunMode::FastRecovery => vec![
            Expectation::MinLines(bin_info, 1),
            // A precomputed assembly must never materialize in the run tree.
            Expectation::Absent(contigs),
        ],
        RunMode::QueuedRecovery => vec![
            Expectation::NonEmptyFile(contigs),
            Expectation::MinLines(bin_info, 1),
        ],
    }
}

/// Evaluates every expectation against a run root and returns all
/// violations, not just the first.
pub fn verify(root: &Path, expectations: &[Expectation]) -> Vec<ContractViolation> {
    let mut violations = Vec::new();
    for expectation in expectations {
        if let Some(violation) = check_one(root, expectation) {
            violations.push(violation);
        }
    }
    violations
}

/// Post-run self-check used by the pipelines.
pub fn check_run(root: &Path, mode: RunMode) -> Result<(), PipelineError> {
    let violations = verify(root, &expectations(mode));
    if violations.is_empty() {
        return Ok(());
    }
    let summary = violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    Err(PipelineError::ContractViolation(summary))
}

fn check_one(root: &Path, expectation: &Expectation) -> Option<ContractViolation> {
    let violation = |path: &Path, problem: String| {
        Some(ContractViolation {
            path: path.to_path_buf(),
            problem,
        })
    };

    match expectation {
        Expectation::Dir(rel) => {
            let path = root.join(rel);
            if !path.is_dir() {
                return violation(rel, "expected directory is missing".to_string());
            }
        }
        Expectation::File(rel) => {
            let path = root.join(rel);
            if !path.is_file() {
                return violation(rel, "expected file is missing".to_string());
            }
        }
        Expectation::NonEmptyFile(rel) => {
            let path = root.join(rel);
            if !is_nonempty_file(&path) {
                return violation(rel, "expected non-empty file is missing or empty".to_string());
            }
        }
        Expectation::MinLines(rel, min) => {
            let path = root.join(rel);
            match count_lines(&path) {
                Ok(lines) if lines >= *min => {}
                Ok(lines) => {
                    return violation(rel, format!("expected at least {} lines, found {}", min, lines));
                }
                Err(e) => return violation(rel, format!("unreadable: {}", e)),
            }
        }
        Expectation::ExactLines(rel, expected) => {
            let path = root.join(rel);
            match count_lines(&path) {
                Ok(lines) if lines == *expected => {}
                Ok(lines) => {
                    return violation(rel, format!("expected exactly {} lines, found {}", expected, lines));
                }
                Err(e) => return violation(rel, format!("unreadable: {}", e)),
            }
        }
        Expectation::Symlink(rel) => {
            let path = root.join(rel);
            if !is_symlink(&path) {
                // exists() follows links; only non-links reach this branch.
                let problem = if path.exists() {
                    "exists but is not a symlink"
                } else {
                    "expected symlink is missing"
                };
                return violation(rel, problem.to_string());
            }
        }
        Expectation::Absent(rel) => {
            let path = root.join(rel);
            match std::fs::symlink_metadata(&path) {
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                _ => return violation(rel, "must not exist in this run mode".to_string()),
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn touch(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn link(root: &Path, rel: &str, target: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::os::unix::fs::symlink(target, path).unwrap();
    }

    fn full_recovery_tree(root: &Path) {
        touch(root, "data/final_contigs.fasta", ">c1\nACGT\n");
        link(root, "assembly/final_contigs.fasta", "../data/final_contigs.fasta");
        touch(root, "bins/bin_info.tsv", "header\nbin_1\nbin_2\n");
        touch(root, "data/singlem_out/metagenome.combined_otu_table.csv", "gene\tsample\n");
        touch(root, "data/singlem_out/singlem_appraisal.tsv", "sample\tbinned\n");
        touch(root, "data/singlem_out/singlem_appraise.svg", "<svg/>");
        link(root, "diversity/singlem_out", "../data/singlem_out");
    }

    #[test]
    fn full_recovery_tree_satisfies_the_recovery_contract() {
        let dir = tempdir().unwrap();
        full_recovery_tree(dir.path());
        assert!(check_run(dir.path(), RunMode::Recovery).is_ok());
    }

    #[test]
    fn a_regular_file_does_not_satisfy_a_symlink_expectation() {
        let dir = tempdir().unwrap();
        full_recovery_tree(dir.path());
        fs::remove_file(dir.path().join("assembly/final_contigs.fasta")).unwrap();
        touch(dir.path(), "assembly/final_contigs.fasta", ">c1\nACGT\n");

        let violations = verify(dir.path(), &expectations(RunMode::Recovery));
        assert_eq!(violations.len(), 1);
        assert!(violations[0].problem.contains("not a symlink"));
    }

    #[test]
    fn fast_recovery_requires_contigs_to_be_absent() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "bins/bin_info.tsv", "header\nbin_1\nbin_2\n");
        assert!(check_run(dir.path(), RunMode::FastRecovery).is_ok());

        touch(dir.path(), "data/final_contigs.fasta", ">c1\nACGT\n");
        let violations = verify(dir.path(), &expectations(RunMode::FastRecovery));
        assert_eq!(violations.len(), 1);
        assert!(violations[0].problem.contains("must not exist"));
    }

    #[test]
    fn line_count_expectations() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "bins/bin_info.tsv", "header\nbin_1\nbin_2\n");
        let bin_info = PathBuf::from("bins/bin_info.tsv");

        assert!(verify(dir.path(), &[Expectation::ExactLines(bin_info.clone(), 3)]).is_empty());
        assert!(!verify(dir.path(), &[Expectation::ExactLines(bin_info.clone(), 2)]).is_empty());
        assert!(verify(dir.path(), &[Expectation::MinLines(bin_info.clone(), 2)]).is_empty());
        assert!(!verify(dir.path(), &[Expectation::MinLines(bin_info, 4)]).is_empty());
    }

    #[test]
    fn an_empty_combined_table_violates_the_recovery_contract() {
        let dir = tempdir().unwrap();
        full_recovery_tree(dir.path());
        touch(dir.path(), "data/singlem_out/metagenome.combined_otu_table.csv", "");

        let violations = verify(dir.path(), &expectations(RunMode::Recovery));
        assert_eq!(violations.len(), 1);
        assert!(violations[0].path.ends_with("metagenome.combined_otu_table.csv"));
    }

    #[test]
    fn every_violation_is_reported_not_just_the_first() {
        let dir = tempdir().unwrap();
        let violations = verify(dir.path(), &expectations(RunMode::Recovery));
        assert_eq!(violations.len(), expectations(RunMode::Recovery).len());
        assert!(matches!(
            check_run(dir.path(), RunMode::Recovery),
            Err(PipelineError::ContractViolation(_))
        ));
    }
}

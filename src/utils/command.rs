// src/utils/command.rs: argument builders and presence checks for the
// external tools

use anyhow::{anyhow, Result};
use log::warn;

use crate::config::defs::{SINGLEM_TAG, SNAKEMAKE_TAG, TOOL_VERSIONS};

pub(crate) fn path_arg(path: &std::path::Path) -> String {
    path.to_string_lossy().to_string()
}

pub mod singlem {
    use std::path::{Path, PathBuf};

    use anyhow::{anyhow, Result};

    use super::path_arg;
    use crate::config::defs::SINGLEM_TAG;
    use crate::utils::process::run_tool;

    /// `singlem pipe` over a single read set (long reads, or unpaired short
    /// reads).
    pub fn pipe_single_args(threads: usize, sequences: &[PathBuf], otu_table: &Path) -> Vec<String> {
        let mut args_vec: Vec<String> = Vec::new();
        args_vec.push("pipe".to_string());
        args_vec.push("--threads".to_string());
        args_vec.push(threads.to_string());
        args_vec.push("--sequences".to_string());
        args_vec.extend(sequences.iter().map(|p| path_arg(p)));
        args_vec.push("--otu_table".to_string());
        args_vec.push(path_arg(otu_table));
        args_vec
    }

    /// `singlem pipe` over paired short reads.
    pub fn pipe_paired_args(
        threads: usize,
        forward: &[PathBuf],
        reverse: &[PathBuf],
        otu_table: &Path,
    ) -> Vec<String> {
        let mut args_vec: Vec<String> = Vec::new();
        args_vec.push("pipe".to_string());
        args_vec.push("--threads".to_string());
        args_vec.push(threads.to_string());
        args_vec.push("--forward".to_string());
        args_vec.extend(forward.iter().map(|p| path_arg(p)));
        args_vec.push("--reverse".to_string());
        args_vec.extend(reverse.iter().map(|p| path_arg(p)));
        args_vec.push("--otu_table".to_string());
        args_vec.push(path_arg(otu_table));
        args_vec
    }

    /// `singlem summarise` over an explicit list of per-read-class tables.
    pub fn summarise_args(input_tables: &[PathBuf], output_table: &Path) -> Vec<String> {
        let mut args_vec: Vec<String> = Vec::new();
        args_vec.push("summarise".to_string());
        args_vec.push("--input_otu_tables".to_string());
        args_vec.extend(input_tables.iter().map(|p| path_arg(p)));
        args_vec.push("--output_otu_table".to_string());
        args_vec.push(path_arg(output_table));
        args_vec
    }

    /// `singlem appraise` against the combined table; the appraisal table
    /// itself arrives on stdout.
    pub fn appraise_args(combined_table: &Path, plot: &Path) -> Vec<String> {
        let mut args_vec: Vec<String> = Vec::new();
        args_vec.push("appraise".to_string());
        args_vec.push("--metagenome-otu-tables".to_string());
        args_vec.push(path_arg(combined_table));
        args_vec.push("--plot".to_string());
        args_vec.push(path_arg(plot));
        args_vec
    }

    pub async fn singlem_presence_check() -> Result<String> {
        let args = vec!["--version".to_string()];
        let output = run_tool(SINGLEM_TAG, &args, None, &[], None).await?;
        if !output.success() {
            return Err(anyhow!("singlem --version exited with {:?}", output.code));
        }
        let version = output
            .stdout
            .lines()
            .next()
            .map(|line| line.trim().to_string())
            .unwrap_or_default();
        if version.is_empty() {
            return Err(anyhow!("No output from singlem --version"));
        }
        Ok(version)
    }
}

pub mod snakemake {
    use std::path::Path;

    use anyhow::{anyhow, Result};

    use super::path_arg;
    use crate::config::defs::{RunConfig, SNAKEMAKE_TAG};
    use crate::utils::process::run_tool;

    /// Engine invocation for one workflow target. Queue submission adds the
    /// cluster profile and per-job retries.
    pub fn arg_generator(config: &RunConfig, configfile: &Path, target: &str) -> Vec<String> {
        let mut args_vec: Vec<String> = Vec::new();
        args_vec.push("--cores".to_string());
        args_vec.push(config.n_cores.to_string());
        args_vec.push("--configfile".to_string());
        args_vec.push(path_arg(configfile));
        args_vec.push("--nolock".to_string());
        args_vec.push("--rerun-incomplete".to_string());
        if let Some(profile) = &config.snakemake_profile {
            args_vec.push("--profile".to_string());
            args_vec.push(profile.clone());
            args_vec.push("--retries".to_string());
            args_vec.push(config.cluster_retries.to_string());
        }
        args_vec.push(target.to_string());
        args_vec
    }

    pub async fn snakemake_presence_check() -> Result<String> {
        let args = vec!["--version".to_string()];
        let output = run_tool(SNAKEMAKE_TAG, &args, None, &[], None).await?;
        if !output.success() {
            return Err(anyhow!("snakemake --version exited with {:?}", output.code));
        }
        let version = output
            .stdout
            .lines()
            .next()
            .map(|line| line.trim().to_string())
            .unwrap_or_default();
        if version.is_empty() {
            return Err(anyhow!("No output from snakemake --version"));
        }
        Ok(version)
    }
}

pub async fn check_version(tool: &str) -> Result<String> {
    let version = match tool {
        SINGLEM_TAG => singlem::singlem_presence_check().await?,
        SNAKEMAKE_TAG => snakemake::snakemake_presence_check().await?,
        _ => return Err(anyhow!("Unknown tool: {}", tool)),
    };
    if let (Some(min), Some(found)) = (TOOL_VERSIONS.get(tool), major_minor(&version)) {
        if found < *min {
            warn!("{} {} is older than the oldest tested version {}", tool, version, min);
        }
    }
    Ok(version)
}

fn major_minor(version: &str) -> Option<f32> {
    let mut parts = version.split('.');
    let major = parts.next()?;
    let minor = parts.next().unwrap_or("0");
    format!("{}.{}", major, minor).parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn pipe_single_args_shape() {
        let args = singlem::pipe_single_args(
            8,
            &paths(&["a.fq.gz", "b.fq.gz"]),
            &PathBuf::from("out/table.csv"),
        );
        assert_eq!(
            args,
            vec![
                "pipe",
                "--threads",
                "8",
                "--sequences",
                "a.fq.gz",
                "b.fq.gz",
                "--otu_table",
                "out/table.csv"
            ]
        );
    }

    #[test]
    fn pipe_paired_args_shape() {
        let args = singlem::pipe_paired_args(
            4,
            &paths(&["r.1.fq.gz"]),
            &paths(&["r.2.fq.gz"]),
            &PathBuf::from("out/table.csv"),
        );
        assert_eq!(
            args,
            vec![
                "pipe",
                "--threads",
                "4",
                "--forward",
                "r.1.fq.gz",
                "--reverse",
                "r.2.fq.gz",
                "--otu_table",
                "out/table.csv"
            ]
        );
    }

    #[test]
    fn summarise_args_list_tables_explicitly() {
        let args = singlem::summarise_args(
            &paths(&["long.csv", "short.csv"]),
            &PathBuf::from("combined.csv"),
        );
        assert_eq!(
            args,
            vec![
                "summarise",
                "--input_otu_tables",
                "long.csv",
                "short.csv",
                "--output_otu_table",
                "combined.csv"
            ]
        );
    }

    #[test]
    fn major_minor_parses_leading_components() {
        assert_eq!(major_minor("7.32.4"), Some(7.32));
        assert_eq!(major_minor("0.18"), Some(0.18));
        assert_eq!(major_minor("9"), Some(9.0));
        assert_eq!(major_minor("not-a-version"), None);
    }
}

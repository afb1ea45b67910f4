use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use crate::parser::Record;

/// A single pending calculation. `input` is the fully-rendered engine input,
/// which is opaque to the [crate::queue::Cluster]. Jobs are immutable once
/// enqueued
#[derive(Clone, Debug, PartialEq)]
pub struct Job {
    pub name: String,
    pub cores: usize,
    pub input: String,
    pub dir: PathBuf,
}

impl Job {
    pub fn new(
        name: impl Into<String>,
        cores: usize,
        input: impl Into<String>,
        dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            cores,
            input: input.into(),
            dir: dir.into(),
        }
    }

    /// `dir/name.inp`
    pub fn input_path(&self) -> PathBuf {
        self.with_ext("inp")
    }

    /// `dir/name.out`
    pub fn output_path(&self) -> PathBuf {
        self.with_ext("out")
    }

    /// `dir/name.xyz`, the final geometry written by the engine
    pub fn geometry_path(&self) -> PathBuf {
        self.with_ext("xyz")
    }

    fn with_ext(&self, ext: &str) -> PathBuf {
        self.dir.join(format!("{}.{ext}", self.name))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// The outcome of running a single [Job]. `success` reflects only the exit
/// status reported by the executor; a non-empty `stderr` alone is a warning.
#[derive(Clone, Debug, PartialEq)]
pub struct CalcResult {
    pub job: String,
    pub slot: usize,
    pub success: bool,
    pub stderr: String,
    pub record: Option<Record>,
    /// set when the executor itself failed or the output could not be parsed
    pub error: Option<String>,
    pub elapsed: Duration,
}

impl CalcResult {
    /// a result for a job that never ran
    pub fn cancelled(job: &Job) -> Self {
        Self {
            job: job.name.clone(),
            slot: 0,
            success: false,
            stderr: String::new(),
            record: None,
            error: Some(String::from("cancelled")),
            elapsed: Duration::ZERO,
        }
    }

    /// whether the result has any frequency data to judge
    pub fn has_frequencies(&self) -> bool {
        self.record
            .as_ref()
            .and_then(|r| r.frequencies.as_ref())
            .is_some_and(|f| !f.is_empty())
    }
}

//! The seam between the crate's control loops and the external quantum
//! chemistry engine

use std::{
    fs,
    path::PathBuf,
    process::{Command, Output},
    time::Instant,
};

use thiserror::Error;

use crate::{
    job::{CalcResult, Job},
    parser::Parser,
};

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
}

/// The raw result of running the engine once
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Execution {
    /// exit code, `None` if the process was killed by a signal
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// the engine's main output file
    pub output: PathBuf,
}

impl Execution {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// An Executor runs a single [Job] to completion. `slot` is a small integer
/// that is unique among concurrently running jobs, so implementations can use
/// it to avoid naming collisions. It has no other meaning.
pub trait Executor: Sync {
    fn execute(&self, job: &Job, slot: usize) -> Result<Execution, ExecError>;
}

impl<E: Executor + ?Sized> Executor for &E {
    fn execute(&self, job: &Job, slot: usize) -> Result<Execution, ExecError> {
        (**self).execute(job, slot)
    }
}

/// run `job` in `slot` with `executor` and parse its output with `parser`.
/// every failure is folded into the returned [CalcResult]
pub fn calculate<E, P>(
    executor: &E,
    parser: &P,
    job: &Job,
    slot: usize,
) -> CalcResult
where
    E: Executor + ?Sized,
    P: Parser + ?Sized,
{
    let start = Instant::now();
    let mut res = CalcResult {
        job: job.name.clone(),
        slot,
        success: false,
        stderr: String::new(),
        record: None,
        error: None,
        elapsed: Default::default(),
    };
    match executor.execute(job, slot) {
        Ok(exec) => {
            res.success = exec.success();
            if !res.success {
                res.error = Some(match exec.status {
                    Some(code) => format!("exited with status {code}"),
                    None => String::from("terminated by signal"),
                });
            }
            match parser.parse(&exec.output) {
                Ok(record) => res.record = Some(record),
                Err(e) => {
                    log::warn!("{}: {e}", job.name);
                    res.error.get_or_insert_with(|| e.to_string());
                }
            }
            res.stderr = exec.stderr;
        }
        Err(e) => {
            log::error!("failed to run {}: {e}", job.name);
            res.error = Some(e.to_string());
        }
    }
    res.elapsed = start.elapsed();
    res
}

/// create `job.dir` if needed and write the input file into it
pub(crate) fn write_input(job: &Job) -> Result<PathBuf, ExecError> {
    fs::create_dir_all(&job.dir)?;
    let path = job.input_path();
    fs::write(&path, &job.input)?;
    Ok(path)
}

/// run `cmd` to completion and package its output for `job`, warning if
/// anything was written to stderr
pub(crate) fn run(mut cmd: Command, job: &Job) -> Result<Execution, ExecError> {
    let Output {
        status,
        stdout,
        stderr,
    } = cmd.output().map_err(|source| ExecError::Spawn {
        command: format!("{cmd:?}"),
        source,
    })?;
    let stderr = String::from_utf8_lossy(&stderr).into_owned();
    if !stderr.trim().is_empty() {
        log::warn!("errors may have occurred in {}:\n{stderr}", job.name);
    }
    Ok(Execution {
        status: status.code(),
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr,
        output: job.output_path(),
    })
}

/// quote `s` for inclusion in a POSIX shell command line
pub(crate) fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

use std::{fs::File, process::Command};

use serde::Deserialize;

use crate::{
    job::Job,
    program::{run, write_input, ExecError, Execution, Executor},
};

/// Run ORCA directly on the host. `command` should be the full path to the
/// `orca` binary, since ORCA needs it to launch its parallel subprograms
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Local {
    pub command: String,
}

impl Local {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl Default for Local {
    fn default() -> Self {
        Self::new("orca")
    }
}

impl Executor for Local {
    fn execute(&self, job: &Job, _slot: usize) -> Result<Execution, ExecError> {
        let input = write_input(job)?;
        let out = File::create(job.output_path())?;
        let mut cmd = Command::new(&self.command);
        cmd.arg(input.file_name().unwrap_or(input.as_os_str()))
            .current_dir(&job.dir)
            .stdout(out);
        run(cmd, job)
    }
}

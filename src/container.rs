use std::process::{Command, Stdio};

use serde::Deserialize;

use crate::{
    job::Job,
    program::{run, shell_quote, write_input, ExecError, Execution, Executor},
};

/// Run ORCA inside a docker container. The job directory is mounted at
/// `/home/orca`, and each concurrently running job gets its own container
/// named after its slot
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Container {
    pub image: String,

    /// the container runtime binary, usually `docker` or `podman`
    pub runtime: String,
}

const MOUNT: &str = "/home/orca";
const ORCA: &str = "/Orca/orca";

impl Container {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            runtime: String::from("docker"),
        }
    }

    pub fn name(slot: usize) -> String {
        format!("qchemorca{slot}")
    }

    /// kill and remove any container left over in `slot`. failures here are
    /// expected when there is no such container
    fn clear(&self, slot: usize) {
        let name = Self::name(slot);
        for action in ["kill", "rm"] {
            let _ = Command::new(&self.runtime)
                .args([action, name.as_str()])
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status();
        }
    }

    fn command(&self, job: &Job, slot: usize) -> Command {
        let inp = shell_quote(&format!("{}.inp", job.name));
        let out = shell_quote(&format!("{}.out", job.name));
        let mut cmd = Command::new(&self.runtime);
        cmd.arg("run")
            .arg("--name")
            .arg(Self::name(slot))
            .arg("-v")
            .arg(format!("{}:{MOUNT}", job.dir.display()))
            .arg(&self.image)
            .args(["sh", "-c"])
            .arg(format!("cd {MOUNT} && {ORCA} {inp} > {out}"));
        cmd
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new("mrdnalex/orca")
    }
}

impl Executor for Container {
    fn execute(&self, job: &Job, slot: usize) -> Result<Execution, ExecError> {
        write_input(job)?;
        // docker needs an absolute path for bind mounts
        let mut job = job.clone();
        job.dir = std::fs::canonicalize(&job.dir)?;
        self.clear(slot);
        let res = run(self.command(&job, slot), &job);
        self.clear(slot);
        res
    }
}

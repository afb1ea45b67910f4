use serde::Deserialize;

use crate::queue::Admission;

use super::Engine;

/// The TOML form of a [super::Config], before any files it refers to are read
#[derive(Deserialize, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub(super) struct RawConfig {
    /// The maximum number of cores in use at one time
    pub cores: usize,

    /// The time in seconds between checks for cancellation while waiting for
    /// running jobs
    #[serde(default = "default_poll_interval")]
    pub poll_interval: f64,

    /// Directory that every job's files are written under
    pub workspace: Option<String>,

    #[serde(default)]
    pub admission: Admission,

    #[serde(default)]
    pub engine: Engine,

    /// a geometry optimization to run instead of the batch in `job`
    pub optimize: Option<RawOptimize>,

    /// independent calculations to run as a batch
    #[serde(default)]
    pub job: Vec<RawJob>,
}

fn default_poll_interval() -> f64 {
    0.5
}

#[derive(Deserialize, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub(super) struct RawOptimize {
    pub name: String,

    /// path to the XYZ file holding the starting geometry
    pub geometry: String,

    pub basis: Option<String>,

    pub functional: Option<String>,

    pub cores: Option<usize>,

    /// template for the first iteration. a built-in template name, a path to
    /// an `.inp` file, or the template text itself
    pub template: Option<String>,

    /// run a single pass instead of iterating to convergence
    #[serde(default)]
    pub single: bool,
}

#[derive(Deserialize, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub(super) struct RawJob {
    pub name: String,

    pub cores: usize,

    /// same forms as [RawOptimize::template]
    pub template: Option<String>,

    /// path to the XYZ file substituted into the template's `xyz`
    pub geometry: String,

    pub calculation: Option<String>,

    pub basis: Option<String>,

    pub functional: Option<String>,
}

impl RawConfig {
    pub fn load(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }
}

use std::{
    collections::{HashMap, HashSet},
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use thiserror::Error;

use crate::{
    container::Container,
    geom::{Geom, GeomError},
    job::Job,
    local::Local,
    optimize::{GeoOpt, Mode, OptSettings, Structure},
    parser::OrcaOutput,
    program::{ExecError, Execution, Executor},
    queue::{Admission, Cluster},
    template::{basis, functional, Calculation, Template},
    workspace::Workspace,
};

use self::raw::{RawConfig, RawJob, RawOptimize};

mod raw;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid geometry in {path}: {source}")]
    Geom { path: PathBuf, source: GeomError },

    #[error("job name {0} is used more than once")]
    DuplicateJob(String),

    #[error("poll_interval must be a positive number of seconds, got {0}")]
    PollInterval(f64),
}

/// The engine every job runs on
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Engine {
    Local(Local),
    Container(Container),
}

impl Default for Engine {
    fn default() -> Self {
        Self::Local(Local::default())
    }
}

impl Executor for Engine {
    fn execute(&self, job: &Job, slot: usize) -> Result<Execution, ExecError> {
        match self {
            Engine::Local(e) => e.execute(job, slot),
            Engine::Container(e) => e.execute(job, slot),
        }
    }
}

/// a named geometry optimization
#[derive(Clone, Debug, PartialEq)]
pub struct Optimization {
    pub name: String,
    pub settings: OptSettings,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub cores: usize,
    pub poll_interval: Duration,
    pub workspace: Workspace,
    pub admission: Admission,
    pub engine: Engine,
    pub optimize: Option<Optimization>,
    /// fully rendered jobs, ready for a [Cluster]
    pub jobs: Vec<Job>,
}

impl Config {
    pub fn load(filename: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = filename.as_ref();
        let contents =
            fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_owned(),
                source,
            })?;
        Self::from_raw(RawConfig::load(&contents)?)
    }

    fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        let poll_interval = if raw.poll_interval > 0.0 {
            Duration::try_from_secs_f64(raw.poll_interval)
                .map_err(|_| ConfigError::PollInterval(raw.poll_interval))?
        } else {
            return Err(ConfigError::PollInterval(raw.poll_interval));
        };
        let workspace = raw.workspace.map(Workspace::new).unwrap_or_default();
        let optimize = raw
            .optimize
            .map(|opt| Self::optimization(opt, raw.cores))
            .transpose()?;
        let mut names = HashSet::new();
        if let Some(dup) = raw.job.iter().find(|j| !names.insert(&j.name)) {
            return Err(ConfigError::DuplicateJob(dup.name.clone()));
        }
        let jobs = raw
            .job
            .into_iter()
            .map(|job| Self::job(job, &workspace))
            .collect::<Result<_, _>>()?;
        Ok(Self {
            cores: raw.cores,
            poll_interval,
            workspace,
            admission: raw.admission,
            engine: raw.engine,
            optimize,
            jobs,
        })
    }

    fn optimization(
        raw: RawOptimize,
        budget: usize,
    ) -> Result<Optimization, ConfigError> {
        let geom = load_geom(&raw.geometry)?;
        let mut settings = OptSettings::new(Structure::Xyz(geom));
        if let Some(basis) = raw.basis {
            settings.basis = basis;
        }
        if let Some(functional) = raw.functional {
            settings.functional = functional;
        }
        if let Some(template) = raw.template {
            settings.template = resolve(&template)?;
        }
        settings.cores = raw.cores.unwrap_or(budget);
        if raw.single {
            settings.mode = Mode::Single;
        }
        Ok(Optimization {
            name: raw.name,
            settings,
        })
    }

    /// render the input for `raw` and place it in its own directory under
    /// `workspace`
    fn job(raw: RawJob, workspace: &Workspace) -> Result<Job, ConfigError> {
        let geom = load_geom(&raw.geometry)?;
        let template = match &raw.template {
            Some(t) => resolve(t)?,
            None => Template::BASIC_XYZ_PARALLEL,
        };
        let calculation = raw
            .calculation
            .unwrap_or_else(|| Calculation::HartreeFock.to_string());
        let vars = HashMap::from([
            (String::from("calculation"), calculation),
            (
                String::from("basis"),
                raw.basis.unwrap_or_else(|| basis::DEF2_SVP.to_owned()),
            ),
            (
                String::from("functional"),
                raw.functional
                    .unwrap_or_else(|| functional::B3LYP.to_owned()),
            ),
            (String::from("cores"), raw.cores.to_string()),
            (String::from("xyz"), geom.xyz_body()),
        ]);
        let dir = workspace.dir(&raw.name);
        Ok(Job::new(raw.name, raw.cores, template.render(&vars), dir))
    }

    /// a [Cluster] running on the configured engine
    pub fn cluster(&self) -> Cluster<Engine, OrcaOutput> {
        Cluster::new(self.engine.clone(), OrcaOutput, self.cores)
            .with_policy(self.admission)
            .with_poll_interval(self.poll_interval)
    }

    /// the configured optimization, if there is one
    pub fn optimizer(&self) -> Option<GeoOpt<Engine, OrcaOutput>> {
        self.optimize.as_ref().map(|opt| {
            GeoOpt::new(
                opt.name.clone(),
                self.engine.clone(),
                OrcaOutput,
                opt.settings.clone(),
                self.workspace.clone(),
            )
        })
    }
}

fn load_geom(path: &str) -> Result<Geom, ConfigError> {
    Geom::load(path).map_err(|source| ConfigError::Geom {
        path: PathBuf::from(path),
        source,
    })
}

fn resolve(template: &str) -> Result<Template, ConfigError> {
    Template::resolve(template).map_err(|source| ConfigError::Io {
        path: PathBuf::from(template),
        source,
    })
}

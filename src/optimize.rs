//! Iterative geometry optimization: run an optimization + frequency job,
//! restart it from its own final geometry while any frequency is imaginary,
//! and give up after too many iterations in a row without frequencies

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use thiserror::Error;

use crate::{
    geom::Geom,
    job::Job,
    parser::{Parser, Record},
    program::{calculate, Executor},
    progress::{Event, Progress},
    template::{basis, functional, Calculation, Template},
    utils::clock_time,
    workspace::Workspace,
};


/// the number of consecutive iterations without frequency data after which
/// an optimization is abandoned
pub const MAX_FAILURES: usize = 3;

/// the optimizer only ever runs one job at a time
const SLOT: usize = 1;

#[derive(Debug, Error)]
pub enum OptError {
    #[error("optimization {0} must request at least 1 core")]
    ZeroCores(String),

    #[error("failed to prepare {name}: {source}")]
    Io {
        name: String,
        source: std::io::Error,
    },
}

/// whether every frequency in `freqs` is real. the sign check is exact, so
/// a frequency of `0.0` counts but `-0.01` doesn't
pub fn is_optimized(freqs: &[f64]) -> bool {
    freqs.iter().all(|&f| f >= 0.0)
}

/// the job name for the `iteration`th pass, starting from 1
pub fn iteration_name(name: &str, iteration: usize) -> String {
    if iteration <= 1 {
        name.to_owned()
    } else {
        format!("{name}_{iteration}")
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Mode {
    /// keep iterating until converged or aborted
    #[default]
    Full,

    /// run exactly one calculation and report what it found
    Single,
}

/// Where the starting geometry comes from
#[derive(Clone, Debug, PartialEq)]
pub enum Structure {
    /// coordinates pasted into the input through the `xyz` placeholder
    Xyz(Geom),

    /// an XYZ file copied into each job directory and referenced by file name
    /// through the `xyzfile` placeholder
    File(PathBuf),
}

#[derive(Clone, Debug, PartialEq)]
pub struct OptSettings {
    pub structure: Structure,
    pub calculation: String,
    pub basis: String,
    pub functional: String,
    pub cores: usize,
    /// the template for the first iteration
    pub template: Template,
    /// the template for every later iteration. it receives the previous
    /// iteration's final geometry in `xyz`
    pub continuation: Template,
    pub mode: Mode,
    pub max_failures: usize,
}

impl OptSettings {
    /// the default settings for `structure`: a DEF2-SVP B3LYP optimization
    /// and frequency calculation on a single core
    pub fn new(structure: Structure) -> Self {
        let template = match structure {
            Structure::Xyz(_) => Template::BASIC_XYZ_PARALLEL,
            Structure::File(_) => Template::BASIC_PARALLEL,
        };
        Self {
            structure,
            calculation: format!(
                "{} {}",
                Calculation::Optimization,
                Calculation::Frequency
            ),
            basis: basis::DEF2_SVP.to_owned(),
            functional: functional::B3LYP.to_owned(),
            cores: 1,
            template,
            continuation: Template::BASIC_XYZ_PARALLEL,
            mode: Mode::Full,
            max_failures: MAX_FAILURES,
        }
    }

    /// the placeholder values shared by every iteration
    fn vars(&self) -> HashMap<String, String> {
        HashMap::from([
            (String::from("calculation"), self.calculation.clone()),
            (String::from("basis"), self.basis.clone()),
            (String::from("functional"), self.functional.clone()),
            (String::from("cores"), self.cores.to_string()),
        ])
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum State {
    #[default]
    NotStarted,
    Running,
    Converged,
    Aborted,
}

/// A converged optimization
#[derive(Clone, Debug, PartialEq)]
pub struct Optimized {
    pub record: Record,
    /// the XYZ file written by the final iteration
    pub geometry: PathBuf,
    /// the contents of `geometry`, if it could be read
    pub geom: Option<Geom>,
    pub iterations: usize,
    pub elapsed: Duration,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Converged(Optimized),

    /// single mode only: the calculation finished with imaginary modes
    NotOptimized(Record),

    /// single mode only: the calculation produced no frequencies
    NoFrequencies,

    Aborted { iterations: usize, failures: usize },
}

pub struct GeoOpt<E, P> {
    name: String,
    executor: E,
    parser: P,
    settings: OptSettings,
    workspace: Workspace,
    state: State,
}

impl<E: Executor, P: Parser> GeoOpt<E, P> {
    pub fn new(
        name: impl Into<String>,
        executor: E,
        parser: P,
        settings: OptSettings,
        workspace: Workspace,
    ) -> Self {
        Self {
            name: name.into(),
            executor,
            parser,
            settings,
            workspace,
            state: State::NotStarted,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &OptSettings {
        &self.settings
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// the input for the first iteration
    fn first_input(&self) -> String {
        let mut vars = self.settings.vars();
        match &self.settings.structure {
            Structure::Xyz(geom) => {
                vars.insert(String::from("xyz"), geom.xyz_body());
            }
            Structure::File(path) => {
                let file = path.file_name().unwrap_or(path.as_os_str());
                vars.insert(
                    String::from("xyzfile"),
                    file.to_string_lossy().into_owned(),
                );
            }
        }
        self.settings.template.render(&vars)
    }

    /// the input continuing from the geometry in `path`, or `None` if it
    /// can't be read
    fn next_input(&self, path: &Path) -> Option<String> {
        let geom = match Geom::load(path) {
            Ok(geom) => geom,
            Err(e) => {
                log::warn!("unable to read {}: {e}", path.display());
                return None;
            }
        };
        let mut vars = self.settings.vars();
        vars.insert(String::from("xyz"), geom.xyz_body());
        Some(self.settings.continuation.render(&vars))
    }

    /// create the directory for `job` and put the starting geometry file in
    /// it if there is one
    fn prepare(&self, job: &Job) -> Result<(), OptError> {
        let io = |source| OptError::Io {
            name: job.name.clone(),
            source,
        };
        fs::create_dir_all(job.dir()).map_err(io)?;
        if let Structure::File(path) = &self.settings.structure {
            if let Some(file) = path.file_name() {
                fs::copy(path, job.dir().join(file)).map_err(io)?;
            }
        }
        Ok(())
    }

    /// Run the optimization to completion. Every iteration is a fresh job in
    /// its own workspace directory, and `progress` hears about each one as
    /// it starts and finishes. Failing to converge is reported through the
    /// returned [Outcome]; the only errors are failing to set up a job
    /// directory and a zero core count.
    pub fn run<G: Progress>(
        &mut self,
        progress: &mut G,
    ) -> Result<Outcome, OptError> {
        if self.settings.cores == 0 {
            return Err(OptError::ZeroCores(self.name.clone()));
        }
        self.state = State::Running;
        let start = Instant::now();
        let mut input = self.first_input();
        let mut failures = 0;
        let mut iteration = 1;
        loop {
            let name = iteration_name(&self.name, iteration);
            let job = Job::new(
                name.as_str(),
                self.settings.cores,
                input.as_str(),
                self.workspace.dir(&name),
            );
            if let Err(e) = self.prepare(&job) {
                log::error!("unable to set up {name}: {e}");
                self.state = State::Aborted;
                return Err(e);
            }
            progress.notify(Event::IterationStarted {
                name: name.clone(),
                iteration,
            });
            let res = calculate(&self.executor, &self.parser, &job, SLOT);
            progress.notify(Event::IterationFinished {
                name: name.clone(),
                iteration,
                elapsed: res.elapsed,
            });
            log::debug!("{name} finished in {}", clock_time(res.elapsed));

            let has_freqs = res.success && res.has_frequencies();
            let record = match res.record {
                Some(record) if has_freqs => record,
                record => {
                    failures += 1;
                    progress.notify(Event::NoFrequencies {
                        name,
                        iteration,
                        failures,
                    });
                    if self.settings.mode == Mode::Single {
                        log::error!("{} produced no frequencies", self.name);
                        progress.notify(Event::Aborted {
                            name: self.name.clone(),
                            failures,
                        });
                        self.state = State::Aborted;
                        return Ok(Outcome::NoFrequencies);
                    }
                    if failures >= self.settings.max_failures {
                        return Ok(self.abort(progress, iteration, failures));
                    }
                    let geometry = record
                        .map(|r| r.geometry)
                        .unwrap_or_else(|| job.geometry_path());
                    if let Some(next) = self.next_input(&geometry) {
                        input = next;
                    }
                    iteration += 1;
                    continue;
                }
            };
            failures = 0;

            let freqs = record.frequencies.as_deref().unwrap_or_default();
            if is_optimized(freqs) {
                let geometry = record.geometry.clone();
                let geom = Geom::load(&geometry)
                    .map_err(|e| {
                        log::warn!("unable to read {}: {e}", geometry.display())
                    })
                    .ok();
                let elapsed = start.elapsed();
                progress.notify(Event::Optimized {
                    name: self.name.clone(),
                    iterations: iteration,
                    elapsed,
                });
                self.state = State::Converged;
                return Ok(Outcome::Converged(Optimized {
                    record,
                    geometry,
                    geom,
                    iterations: iteration,
                    elapsed,
                }));
            }

            if self.settings.mode == Mode::Single {
                progress.notify(Event::NotOptimized {
                    name: self.name.clone(),
                });
                self.state = State::Aborted;
                return Ok(Outcome::NotOptimized(record));
            }

            match self.next_input(&record.geometry) {
                Some(next) => input = next,
                // nothing to continue from, so this counts against the
                // optimization like a missing frequency section
                None => {
                    failures += 1;
                    if failures >= self.settings.max_failures {
                        return Ok(self.abort(progress, iteration, failures));
                    }
                }
            }
            iteration += 1;
        }
    }

    fn abort<G: Progress>(
        &mut self,
        progress: &mut G,
        iterations: usize,
        failures: usize,
    ) -> Outcome {
        log::error!(
            "giving up on {} after {failures} failed iterations",
            self.name
        );
        progress.notify(Event::Aborted {
            name: self.name.clone(),
            failures,
        });
        self.state = State::Aborted;
        Outcome::Aborted {
            iterations,
            failures,
        }
    }
}

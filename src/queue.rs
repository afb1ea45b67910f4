//! Run a batch of independent [Job]s concurrently without ever using more than
//! a fixed number of cores

use std::{
    collections::{HashMap, HashSet, VecDeque},
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{self, RecvTimeoutError},
        Arc,
    },
    time::{Duration, Instant},
};

use rayon::ThreadPoolBuilder;
use serde::Deserialize;
use thiserror::Error;

use crate::{
    job::{CalcResult, Job},
    parser::Parser,
    program::{calculate, Executor},
    progress::{Event, Progress},
    slots::Slots,
    utils::clock_time,
};

#[cfg(test)]
mod tests;

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("the core budget must be at least 1")]
    ZeroBudget,

    #[error("job {job} must request at least 1 core")]
    ZeroCores { job: String },

    #[error(
        "job {job} requests {cores} cores but the cluster only has {budget}"
    )]
    ExceedsBudget {
        job: String,
        cores: usize,
        budget: usize,
    },

    #[error("job name {job} is used more than once")]
    DuplicateName { job: String },

    #[error("failed to start workers: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// How pending jobs are admitted when cores free up
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Admission {
    /// only the job at the head of the queue is considered. if it doesn't fit,
    /// nothing behind it is admitted either
    #[default]
    #[serde(alias = "head")]
    HeadOfQueue,

    /// admit every job that fits, in queue order, skipping over ones that
    /// don't. sort the jobs by decreasing core count first for something like
    /// bin packing
    FirstFit,
}

/// the default interval at which a blocked [Cluster] wakes up to check for
/// cancellation
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug)]
pub struct Cluster<E, P> {
    executor: E,
    parser: P,
    budget: usize,
    policy: Admission,
    poll_interval: Duration,
    cancel: Option<Arc<AtomicBool>>,
}

/// bookkeeping for an admitted job
struct Running {
    job: String,
    cores: usize,
}

impl<E: Executor, P: Parser> Cluster<E, P> {
    /// a Cluster running jobs with `executor`, parsing their output with
    /// `parser`, and using at most `budget` cores at once
    pub fn new(executor: E, parser: P, budget: usize) -> Self {
        Self {
            executor,
            parser,
            budget,
            policy: Admission::default(),
            poll_interval: POLL_INTERVAL,
            cancel: None,
        }
    }

    pub fn with_policy(mut self, policy: Admission) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// stop admitting jobs once `cancel` is set. jobs that are already running
    /// are allowed to finish
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    pub fn policy(&self) -> Admission {
        self.policy
    }

    /// make sure every job in `jobs` can eventually be admitted and that no
    /// two jobs share a name, and therefore a directory
    pub fn check(&self, jobs: &[Job]) -> Result<(), ClusterError> {
        if self.budget == 0 {
            return Err(ClusterError::ZeroBudget);
        }
        let mut names = HashSet::new();
        for job in jobs {
            if !names.insert(job.name.as_str()) {
                return Err(ClusterError::DuplicateName {
                    job: job.name.clone(),
                });
            }
            if job.cores == 0 {
                return Err(ClusterError::ZeroCores {
                    job: job.name.clone(),
                });
            }
            if job.cores > self.budget {
                return Err(ClusterError::ExceedsBudget {
                    job: job.name.clone(),
                    cores: job.cores,
                    budget: self.budget,
                });
            }
        }
        Ok(())
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|c| c.load(Ordering::Relaxed))
    }

    /// the index into `pending` of the next job to admit with `used` cores
    /// already taken
    fn next_fit(&self, pending: &VecDeque<Job>, used: usize) -> Option<usize> {
        let fits = |job: &Job| used + job.cores <= self.budget;
        match self.policy {
            Admission::HeadOfQueue => {
                pending.front().filter(|j| fits(*j)).map(|_| 0)
            }
            Admission::FirstFit => pending.iter().position(fits),
        }
    }

    /// run a single job on a worker thread. a panic in the executor or parser
    /// becomes a failed result so the job's slot and cores are still reaped
    fn run(&self, job: &Job, slot: usize) -> CalcResult {
        let start = Instant::now();
        let res = panic::catch_unwind(AssertUnwindSafe(|| {
            calculate(&self.executor, &self.parser, job, slot)
        }));
        res.unwrap_or_else(|payload| {
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| String::from("unknown cause"));
            log::error!("job {} panicked in slot {slot}: {msg}", job.name);
            CalcResult {
                job: job.name.clone(),
                slot,
                success: false,
                stderr: String::new(),
                record: None,
                error: Some(format!("panicked: {msg}")),
                elapsed: start.elapsed(),
            }
        })
    }

    /// Run every job in `jobs` to completion and return their results in the
    /// order they finished. Every job yields exactly one result, whether it
    /// succeeded or not. `progress` receives a [Event::Started] for each
    /// admission and a [Event::Completed] for each job reaped. A completed job
    /// is reported before its cores are handed to the next job.
    ///
    /// The only error is a configuration that could never finish, which is
    /// reported before any job is started.
    pub fn drain<G>(
        &self,
        jobs: Vec<Job>,
        progress: &mut G,
    ) -> Result<Vec<CalcResult>, ClusterError>
    where
        G: Progress + Send,
    {
        self.check(&jobs)?;
        let total = jobs.len();
        if total == 0 {
            return Ok(Vec::new());
        }
        // one extra thread for the control loop below, which spends its time
        // blocked on the channel
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.budget.min(total) + 1)
            .thread_name(|i| format!("cluster-{i}"))
            .build()?;
        let start = Instant::now();
        log::info!(
            "running {total} jobs on {} cores ({:?} admission)",
            self.budget,
            self.policy
        );

        let mut pending: VecDeque<Job> = jobs.into();
        let (tx, rx) = mpsc::channel::<CalcResult>();
        let completed = pool.scope(move |s| {
            let mut completed = Vec::with_capacity(total);
            let mut running: HashMap<usize, Running> = HashMap::new();
            let mut used = 0;
            let mut slots = Slots::new();
            loop {
                if self.cancelled() {
                    if !pending.is_empty() {
                        log::warn!(
                            "cancelled with {} jobs pending",
                            pending.len()
                        );
                    }
                    completed.extend(pending.drain(..).map(|job| {
                        CalcResult::cancelled(&job)
                    }));
                }
                while let Some(idx) = self.next_fit(&pending, used) {
                    let Some(job) = pending.remove(idx) else {
                        break;
                    };
                    let slot = slots.take();
                    used += job.cores;
                    progress.notify(Event::Started {
                        job: job.name.clone(),
                        slot,
                        cores: job.cores,
                        used,
                    });
                    running.insert(
                        slot,
                        Running {
                            job: job.name.clone(),
                            cores: job.cores,
                        },
                    );
                    let tx = tx.clone();
                    s.spawn(move |_| {
                        let res = self.run(&job, slot);
                        // the receiver outlives every worker
                        let _ = tx.send(res);
                    });
                }

                if running.is_empty() && pending.is_empty() {
                    break;
                }

                let res = match rx.recv_timeout(self.poll_interval) {
                    Ok(res) => res,
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                };
                match running.remove(&res.slot) {
                    Some(Running { job, cores }) => {
                        progress.notify(Event::Completed {
                            job,
                            slot: res.slot,
                            success: res.success,
                            elapsed: res.elapsed,
                            used,
                        });
                        used -= cores;
                        slots.give(res.slot);
                    }
                    None => {
                        log::error!("result for unknown slot {}", res.slot)
                    }
                }
                completed.push(res);
            }
            completed
        });
        log::info!(
            "finished {} jobs in {}",
            completed.len(),
            clock_time(start.elapsed())
        );
        Ok(completed)
    }
}

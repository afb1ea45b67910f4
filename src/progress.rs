//! Ordered, human-readable progress notifications emitted by [crate::queue]
//! and [crate::optimize]

use std::{fmt::Display, sync::mpsc::Sender, time::Duration};

use crate::utils::clock_time;

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// a job was admitted to the cluster. `used` is the number of cores in use
    /// after admission
    Started {
        job: String,
        slot: usize,
        cores: usize,
        used: usize,
    },

    /// a job finished, successfully or not. `used` is the number of cores
    /// still in use *before* this job's cores are released
    Completed {
        job: String,
        slot: usize,
        success: bool,
        elapsed: Duration,
        used: usize,
    },

    IterationStarted {
        name: String,
        iteration: usize,
    },

    IterationFinished {
        name: String,
        iteration: usize,
        elapsed: Duration,
    },

    /// an iteration produced output without usable frequency data
    NoFrequencies {
        name: String,
        iteration: usize,
        failures: usize,
    },

    /// single-pass optimization ended with imaginary modes remaining
    NotOptimized {
        name: String,
    },

    Optimized {
        name: String,
        iterations: usize,
        elapsed: Duration,
    },

    Aborted {
        name: String,
        failures: usize,
    },
}

impl Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Event::Started {
                job,
                slot,
                cores,
                used,
            } => write!(
                f,
                "Starting Calculation {job} in slot {slot} \
                 ({cores} cores, {used} in use)"
            ),
            Event::Completed {
                job,
                success,
                elapsed,
                ..
            } => {
                let status = if *success { "Completed" } else { "Failed" };
                write!(f, "{status} Calculation {job} ({})", clock_time(*elapsed))
            }
            Event::IterationStarted { name, iteration } => {
                write!(f, "Running OPT {iteration} on {name}...")
            }
            Event::IterationFinished {
                name,
                iteration,
                elapsed,
            } => write!(
                f,
                "Finished OPT {iteration} on {name} ({})",
                clock_time(*elapsed)
            ),
            Event::NoFrequencies {
                name,
                iteration,
                failures,
            } => write!(
                f,
                "No Frequencies Found for {name} on OPT {iteration}! \
                 ({failures} consecutive)"
            ),
            Event::NotOptimized { name } => {
                write!(f, "Molecule {name} is not Optimized!")
            }
            Event::Optimized {
                name,
                iterations,
                elapsed,
            } => write!(
                f,
                "Molecule {name} is Optimized after {iterations} \
                 iteration(s)! ({})",
                clock_time(*elapsed)
            ),
            Event::Aborted { name, failures } => write!(
                f,
                "Failed to Optimize {name} after {failures} Attempts! \
                 Aborting Optimization!"
            ),
        }
    }
}

/// A sink for [Event]s. Events are delivered in the order they occur
pub trait Progress {
    fn notify(&mut self, event: Event);
}

impl Progress for Vec<Event> {
    fn notify(&mut self, event: Event) {
        self.push(event);
    }
}

impl Progress for Sender<Event> {
    /// a disconnected receiver is not an error for the sender; the event is
    /// dropped
    fn notify(&mut self, event: Event) {
        let _ = self.send(event);
    }
}

/// Forward every event to the `log` facade at info level
#[derive(Clone, Copy, Debug, Default)]
pub struct LogProgress;

impl Progress for LogProgress {
    fn notify(&mut self, event: Event) {
        log::info!("{event}");
    }
}

/// Discard every event
#[derive(Clone, Copy, Debug, Default)]
pub struct Quiet;

impl Progress for Quiet {
    fn notify(&mut self, _event: Event) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_sink_preserves_order() {
        let (mut tx, rx) = std::sync::mpsc::channel::<Event>();
        for i in 1..=3 {
            tx.notify(Event::IterationStarted {
                name: "water".to_owned(),
                iteration: i,
            });
        }
        drop(tx);
        let got: Vec<_> = rx
            .iter()
            .map(|e| match e {
                Event::IterationStarted { iteration, .. } => iteration,
                _ => 0,
            })
            .collect();
        assert_eq!(got, vec![1, 2, 3]);
    }

    #[test]
    fn display() {
        let e = Event::Completed {
            job: "water".to_owned(),
            slot: 1,
            success: true,
            elapsed: Duration::from_secs(61),
            used: 2,
        };
        assert_eq!(
            e.to_string(),
            "Completed Calculation water (1 minute, 1 second)"
        );
    }
}

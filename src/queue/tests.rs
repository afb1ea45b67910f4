use std::{
    collections::HashSet,
    path::Path,
    sync::atomic::{AtomicUsize, Ordering},
    thread,
};

use crate::{
    parser::{ParseError, Record},
    program::{ExecError, Execution},
    progress::Quiet,
};

use super::*;

/// A fake engine. Each job sleeps for the number of milliseconds in its
/// input, jobs whose names start with `bad` exit with status 1, and jobs
/// whose names start with `boom` panic. The
/// number of cores in use is tracked so the budget can be checked from the
/// executor's side
#[derive(Default)]
struct Mock {
    calls: AtomicUsize,
    cores: AtomicUsize,
    max_cores: AtomicUsize,
    cancel_after_first: Option<Arc<AtomicBool>>,
}

impl Executor for Mock {
    fn execute(&self, job: &Job, _slot: usize) -> Result<Execution, ExecError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if job.name.starts_with("boom") {
            panic!("engine exploded");
        }
        let now = self.cores.fetch_add(job.cores, Ordering::SeqCst) + job.cores;
        self.max_cores.fetch_max(now, Ordering::SeqCst);
        if let Some(cancel) = &self.cancel_after_first {
            cancel.store(true, Ordering::SeqCst);
        }
        let ms = job.input.parse().unwrap_or(10);
        thread::sleep(Duration::from_millis(ms));
        self.cores.fetch_sub(job.cores, Ordering::SeqCst);
        if job.name.starts_with("broken") {
            return Err(ExecError::Io(std::io::Error::other("no engine")));
        }
        Ok(Execution {
            status: Some(if job.name.starts_with("bad") { 1 } else { 0 }),
            stdout: String::new(),
            stderr: if job.name.starts_with("noisy") {
                String::from("warning: something")
            } else {
                String::new()
            },
            output: job.output_path(),
        })
    }
}

struct MockParser;

impl Parser for MockParser {
    fn parse(&self, output: &Path) -> Result<Record, ParseError> {
        Ok(Record {
            frequencies: Some(vec![100.0]),
            geometry: output.with_extension("xyz"),
            ..Default::default()
        })
    }
}

fn job(name: &str, cores: usize, ms: u64) -> Job {
    Job::new(name, cores, ms.to_string(), Path::new("inp").join(name))
}

fn cluster(mock: &Mock, budget: usize) -> Cluster<&Mock, MockParser> {
    Cluster::new(mock, MockParser, budget)
        .with_poll_interval(Duration::from_millis(20))
}

/// the sequence of (job name, started?) pairs in `events`
fn sequence(events: &[Event]) -> Vec<(String, bool)> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Started { job, .. } => Some((job.clone(), true)),
            Event::Completed { job, .. } => Some((job.clone(), false)),
            _ => None,
        })
        .collect()
}

#[test]
fn core_budget_never_exceeded() {
    let mock = Mock::default();
    let jobs: Vec<_> = (0..12)
        .map(|i| job(&format!("job{i}"), 1 + i % 3, 5 + (i as u64 * 7) % 20))
        .collect();
    let mut events = Vec::new();
    let got = cluster(&mock, 4).drain(jobs, &mut events).unwrap();
    assert_eq!(got.len(), 12);
    assert!(mock.max_cores.load(Ordering::SeqCst) <= 4);
    // replay the accounting from the events as well
    let mut used = 0;
    for e in &events {
        match e {
            Event::Started { cores, used: u, .. } => {
                used += cores;
                assert_eq!(used, *u);
                assert!(used <= 4);
            }
            Event::Completed { job, used: u, .. } => {
                assert_eq!(used, *u);
                let n: usize = job[3..].parse().unwrap();
                used -= 1 + n % 3;
            }
            _ => {}
        }
    }
    assert_eq!(used, 0);
}

#[test]
fn no_job_lost() {
    let mock = Mock::default();
    let names = ["a", "bad1", "b", "broken", "c", "bad2", "d"];
    let jobs: Vec<_> = names.iter().map(|n| job(n, 1, 5)).collect();
    let got = cluster(&mock, 3).drain(jobs, &mut Quiet).unwrap();
    assert_eq!(got.len(), names.len());
    let seen: HashSet<_> = got.iter().map(|r| r.job.as_str()).collect();
    assert_eq!(seen, names.iter().copied().collect());
    for r in &got {
        let ok = !r.job.starts_with("bad") && !r.job.starts_with("broken");
        assert_eq!(r.success, ok, "{}", r.job);
        assert_eq!(r.error.is_some(), !ok, "{}", r.job);
    }
    let broken = got.iter().find(|r| r.job == "broken").unwrap();
    assert!(broken.record.is_none());
    // a failed exit still gets its output parsed
    let bad = got.iter().find(|r| r.job == "bad1").unwrap();
    assert!(bad.record.is_some());
}

#[test]
fn head_of_queue_blocks() {
    let mock = Mock::default();
    let jobs = vec![job("A", 5, 30), job("B", 3, 5)];
    let mut events = Vec::new();
    cluster(&mock, 5).drain(jobs, &mut events).unwrap();
    assert_eq!(
        sequence(&events),
        vec![
            ("A".to_owned(), true),
            ("A".to_owned(), false),
            ("B".to_owned(), true),
            ("B".to_owned(), false),
        ]
    );
}

#[test]
fn head_of_queue_does_not_skip() {
    let mock = Mock::default();
    let jobs = vec![job("A", 3, 40), job("B", 3, 5), job("C", 2, 5)];
    let mut events = Vec::new();
    cluster(&mock, 5).drain(jobs, &mut events).unwrap();
    let seq = sequence(&events);
    // C would fit next to A, but B is ahead of it
    assert_eq!(seq[0], ("A".to_owned(), true));
    assert_eq!(seq[1], ("A".to_owned(), false));
    assert_eq!(seq[2], ("B".to_owned(), true));
}

#[test]
fn first_fit_skips_ahead() {
    let mock = Mock::default();
    let jobs = vec![job("A", 3, 40), job("B", 3, 5), job("C", 2, 5)];
    let mut events = Vec::new();
    cluster(&mock, 5)
        .with_policy(Admission::FirstFit)
        .drain(jobs, &mut events)
        .unwrap();
    let seq = sequence(&events);
    assert_eq!(seq[0], ("A".to_owned(), true));
    assert_eq!(seq[1], ("C".to_owned(), true));
    assert_eq!(mock.calls.load(Ordering::SeqCst), 3);
}

#[test]
fn three_jobs_four_cores() {
    let mock = Mock::default();
    let jobs = vec![job("J1", 2, 50), job("J2", 2, 50), job("J3", 2, 5)];
    let mut events = Vec::new();
    let got = cluster(&mock, 4).drain(jobs, &mut events).unwrap();
    let seq = sequence(&events);
    assert_eq!(seq[0], ("J1".to_owned(), true));
    assert_eq!(seq[1], ("J2".to_owned(), true));
    // J3 waits for one of the others to finish
    assert!(!seq[2].1);
    assert_eq!(seq[3], ("J3".to_owned(), true));
    let mut names: Vec<_> = got.iter().map(|r| r.job.clone()).collect();
    names.sort();
    assert_eq!(names, vec!["J1", "J2", "J3"]);
    assert_eq!(mock.max_cores.load(Ordering::SeqCst), 4);
}

#[test]
fn oversized_job_fails_fast() {
    let mock = Mock::default();
    let jobs = vec![job("small", 1, 5), job("huge", 10, 5)];
    let err = cluster(&mock, 5).drain(jobs, &mut Quiet).unwrap_err();
    assert!(matches!(
        err,
        ClusterError::ExceedsBudget {
            cores: 10,
            budget: 5,
            ..
        }
    ));
    assert_eq!(mock.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn bad_configuration() {
    let mock = Mock::default();
    assert!(matches!(
        cluster(&mock, 0).drain(vec![job("a", 1, 5)], &mut Quiet),
        Err(ClusterError::ZeroBudget)
    ));
    assert!(matches!(
        cluster(&mock, 2).drain(vec![job("a", 0, 5)], &mut Quiet),
        Err(ClusterError::ZeroCores { .. })
    ));
    assert!(cluster(&mock, 2).drain(vec![], &mut Quiet).unwrap().is_empty());
    assert_eq!(mock.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn duplicate_names_rejected() {
    let mock = Mock::default();
    let jobs = vec![job("same", 1, 5), job("other", 1, 5), job("same", 1, 5)];
    let err = cluster(&mock, 2).drain(jobs, &mut Quiet).unwrap_err();
    let ClusterError::DuplicateName { job } = err else {
        panic!("expected a duplicate name error, got {err:?}");
    };
    assert_eq!(job, "same");
    assert_eq!(mock.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn panicking_job_is_reaped() {
    let mock = Mock::default();
    let jobs = vec![job("ok1", 1, 20), job("boom", 1, 5), job("ok2", 1, 20)];
    let (tx, rx) = mpsc::channel();
    // drain on its own thread so a hang fails the test instead of stalling it
    thread::spawn(move || {
        let mut events = Vec::new();
        let got = cluster(&mock, 2).drain(jobs, &mut events);
        let _ = tx.send((got.map_err(|e| e.to_string()), events));
    });
    let (got, events) = rx
        .recv_timeout(Duration::from_secs(10))
        .expect("drain never returned");
    let got = got.unwrap();
    assert_eq!(got.len(), 3);
    let boom = got.iter().find(|r| r.job == "boom").unwrap();
    assert!(!boom.success);
    assert!(boom.record.is_none());
    let error = boom.error.as_deref().unwrap();
    assert!(error.starts_with("panicked"), "{error}");
    assert!(error.contains("engine exploded"), "{error}");
    assert!(got
        .iter()
        .filter(|r| r.job != "boom")
        .all(|r| r.success && r.error.is_none()));
    // every admission was matched by a completion
    let seq = sequence(&events);
    assert_eq!(seq.iter().filter(|(_, started)| *started).count(), 3);
    assert_eq!(seq.iter().filter(|(_, started)| !*started).count(), 3);
}

#[test]
fn slots_are_reused() {
    let mock = Mock::default();
    let jobs: Vec<_> = (0..4).map(|i| job(&format!("j{i}"), 1, 5)).collect();
    let got = cluster(&mock, 1).drain(jobs, &mut Quiet).unwrap();
    assert!(got.iter().all(|r| r.slot == 1));
    // one at a time means completion order is submission order
    let names: Vec<_> = got.iter().map(|r| r.job.as_str()).collect();
    assert_eq!(names, vec!["j0", "j1", "j2", "j3"]);
}

#[test]
fn stderr_is_only_a_warning() {
    let mock = Mock::default();
    let got = cluster(&mock, 1)
        .drain(vec![job("noisy", 1, 5)], &mut Quiet)
        .unwrap();
    assert!(got[0].success);
    assert_eq!(got[0].stderr, "warning: something");
}

#[test]
fn cancel_stops_admission() {
    let cancel = Arc::new(AtomicBool::new(false));
    let mock = Mock {
        cancel_after_first: Some(cancel.clone()),
        ..Default::default()
    };
    let jobs: Vec<_> = (0..3).map(|i| job(&format!("j{i}"), 1, 20)).collect();
    let got = cluster(&mock, 1)
        .with_cancel(cancel)
        .drain(jobs, &mut Quiet)
        .unwrap();
    assert_eq!(got.len(), 3);
    assert_eq!(mock.calls.load(Ordering::SeqCst), 1);
    let cancelled: Vec<_> = got
        .iter()
        .filter(|r| r.error.as_deref() == Some("cancelled"))
        .map(|r| r.job.as_str())
        .collect();
    assert_eq!(cancelled, vec!["j1", "j2"]);
}

#[test]
fn progress_over_channel() {
    let mock = Mock::default();
    let (mut tx, rx) = mpsc::channel::<Event>();
    let jobs = vec![job("a", 1, 5), job("b", 1, 5)];
    cluster(&mock, 2).drain(jobs, &mut tx).unwrap();
    drop(tx);
    let events: Vec<Event> = rx.iter().collect();
    assert_eq!(events.len(), 4);
    assert!(matches!(events[0], Event::Started { .. }));
}

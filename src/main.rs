use std::{error::Error, process::exit};

use rust_qchem::{utils::clock_time, *};

fn main() {
    env_logger::init();
    let Some(path) = std::env::args().nth(1) else {
        eprintln!("usage: rust-qchem CONFIG");
        exit(1);
    };
    if let Err(e) = run(&path) {
        eprintln!("{e}");
        exit(1);
    }
}

fn run(path: &str) -> Result<(), Box<dyn Error>> {
    let config = Config::load(path)?;
    config.workspace.setup()?;

    if let Some(mut opt) = config.optimizer() {
        match opt.run(&mut LogProgress)? {
            Outcome::Converged(got) => {
                println!(
                    "{} optimized in {} iterations ({})",
                    opt.name(),
                    got.iterations,
                    clock_time(got.elapsed)
                );
                if let Some(energy) = got.record.energy {
                    println!("final energy = {energy:.12} Eh");
                }
                match got.geom {
                    Some(geom) => print!("{geom}"),
                    None => println!("geometry in {}", got.geometry.display()),
                }
            }
            Outcome::NotOptimized(record) => {
                let freqs = record.frequencies.unwrap_or_default();
                let imaginary = freqs.iter().filter(|&&f| f < 0.0).count();
                println!(
                    "{} is not optimized: {imaginary} imaginary modes",
                    opt.name()
                );
            }
            Outcome::NoFrequencies => {
                println!("{} produced no frequencies", opt.name());
            }
            Outcome::Aborted {
                iterations,
                failures,
            } => {
                println!(
                    "{} aborted after {iterations} iterations \
                     ({failures} consecutive failures)",
                    opt.name()
                );
                exit(2);
            }
        }
        return Ok(());
    }

    let results = config
        .cluster()
        .drain(config.jobs.clone(), &mut LogProgress)?;
    let mut failed = 0;
    println!("{:<20} {:>8} {:>20} {}", "Job", "Status", "Energy", "Time");
    for res in &results {
        if !res.success {
            failed += 1;
        }
        let energy = res
            .record
            .as_ref()
            .and_then(|r| r.energy)
            .map(|e| format!("{e:.12}"))
            .unwrap_or_else(|| String::from("-"));
        println!(
            "{:<20} {:>8} {:>20} {}",
            res.job,
            if res.success { "ok" } else { "failed" },
            energy,
            clock_time(res.elapsed)
        );
    }
    for res in &results {
        let Some(record) = &res.record else {
            continue;
        };
        if !record.ensemble_path().is_file() {
            continue;
        }
        match goat::conformers(&res.job, record) {
            Ok(conformers) => {
                println!("\n{} ensemble:", res.job);
                for c in conformers {
                    let contribution = c
                        .contribution
                        .map(|p| format!("{p:.2}%"))
                        .unwrap_or_else(|| String::from("-"));
                    println!("{:<20} {:>8}", c.name, contribution);
                }
            }
            Err(e) => log::warn!("unable to read {} ensemble: {e}", res.job),
        }
    }
    if failed > 0 {
        log::warn!("{failed} of {} jobs failed", results.len());
        exit(2);
    }
    Ok(())
}

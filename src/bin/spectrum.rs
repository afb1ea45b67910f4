//! Broaden the IR spectrum in an ORCA output file and write it next to the
//! output as `<name>_Spectra.csv`

use std::{path::Path, process::exit};

use rust_qchem::{
    parser::{OrcaOutput, Parser},
    spectrum::{Broadening, Spectrum},
};

fn main() {
    env_logger::init();
    let args: Vec<String> = std::env::args().skip(1).collect();
    let [output, rest @ ..] = args.as_slice() else {
        eprintln!("usage: spectrum OUTPUT [SIGMA]");
        exit(1);
    };
    let mut broadening = Broadening::default();
    if let Some(sigma) = rest.first() {
        match sigma.parse::<f64>() {
            Ok(s) => broadening.sigma = s,
            Err(e) => {
                eprintln!("invalid sigma `{sigma}`: {e}");
                exit(1);
            }
        }
        if let Err(e) = broadening.check() {
            eprintln!("usage: spectrum OUTPUT [SIGMA]\n{e}");
            exit(1);
        }
    }
    let record = match OrcaOutput.parse(Path::new(output)) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("{e}");
            exit(1);
        }
    };
    if record.ir_spectrum.is_empty() {
        eprintln!("no IR spectrum in {output}");
        exit(1);
    }
    let spectrum = match Spectrum::broaden(&record.ir_spectrum, broadening) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{e}");
            exit(1);
        }
    };
    let path = record.geometry.with_file_name(format!(
        "{}_Spectra.csv",
        record
            .geometry
            .file_stem()
            .map(|s| s.to_string_lossy())
            .unwrap_or_default()
    ));
    if let Err(e) = spectrum.write_csv(&path) {
        eprintln!("failed to write {}: {e}", path.display());
        exit(1);
    }
    if let Some(peak) = spectrum.peak() {
        log::info!("strongest band near {peak} cm-1");
    }
    println!("{}", path.display());
}

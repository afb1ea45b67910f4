//! Extraction of structured data from ORCA output files. Only the sections
//! listed in [Record] are parsed; everything else in the output is ignored

use std::{
    fs,
    path::{Path, PathBuf},
};

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// One line of the IR spectrum table
#[derive(Clone, Debug, PartialEq)]
pub struct IrMode {
    pub mode: usize,
    /// cm-1
    pub frequency: f64,
    /// km/mol
    pub intensity: f64,
}

/// A per-atom partial charge from a Mulliken or Loewdin table
#[derive(Clone, Debug, PartialEq)]
pub struct AtomCharge {
    pub atom: usize,
    pub label: String,
    pub charge: f64,
}

/// One row of the Mayer population analysis
#[derive(Clone, Debug, PartialEq)]
pub struct MayerAtom {
    pub atom: usize,
    pub label: String,
    /// Mulliken gross atomic population
    pub na: f64,
    /// total nuclear charge
    pub za: f64,
    /// Mulliken gross atomic charge
    pub qa: f64,
    /// total valence
    pub va: f64,
    /// bonded valence
    pub bva: f64,
    /// free valence
    pub fa: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScfIteration {
    pub iter: usize,
    pub energy: f64,
    pub delta: f64,
}

/// Wall time spent in one module, from the table at the end of the output
#[derive(Clone, Debug, PartialEq)]
pub struct Timing {
    pub module: String,
    pub seconds: f64,
}

/// One conformer in a GOAT ensemble summary
#[derive(Clone, Debug, PartialEq)]
pub struct EnsembleEntry {
    pub conformer: usize,
    /// relative to the lowest conformer, in kcal/mol
    pub energy: f64,
    pub degeneracy: usize,
    /// percentage of the Boltzmann population
    pub contribution: f64,
    pub cumulative: f64,
}

/// The data extracted from a single engine output. Energies are in Eh
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record {
    /// `None` if the output had no frequency section at all
    pub frequencies: Option<Vec<f64>>,
    pub ir_spectrum: Vec<IrMode>,
    pub energy: Option<f64>,
    pub gibbs: Option<f64>,
    pub dipole: Option<[f64; 3]>,
    pub dipole_magnitude: Option<f64>,
    /// total quadrupole moment in a.u., ordered XX, YY, ZZ, XY, XZ, YZ
    pub quadrupole: Option<[f64; 6]>,
    pub mulliken: Vec<AtomCharge>,
    pub loewdin: Vec<AtomCharge>,
    pub mayer: Vec<MayerAtom>,
    /// one entry per SCF run, in the order they appear
    pub scf: Vec<Vec<ScfIteration>>,
    pub timings: Vec<Timing>,
    pub ensemble: Vec<EnsembleEntry>,
    pub normal_termination: bool,
    /// the XYZ file holding the final geometry of the calculation
    pub geometry: PathBuf,
}

impl Record {
    /// the multi-structure XYZ file a GOAT run leaves next to its geometry
    pub fn ensemble_path(&self) -> PathBuf {
        self.geometry.with_extension("finalensemble.xyz")
    }
}

/// Turn an engine output file into a [Record]
pub trait Parser: Sync {
    fn parse(&self, output: &Path) -> Result<Record, ParseError>;
}

impl<P: Parser + ?Sized> Parser for &P {
    fn parse(&self, output: &Path) -> Result<Record, ParseError> {
        (**self).parse(output)
    }
}

lazy_static! {
    static ref FREQ: Regex =
        Regex::new(r"^\s*\d+:\s+(-?\d+\.\d+)\s+cm\*\*-1").unwrap();
    static ref IR: Regex = Regex::new(
        r"^\s*(\d+):\s+(-?\d+\.\d+)\s+-?\d+\.\d+\s+(-?\d+\.\d+)"
    )
    .unwrap();
    static ref FLOAT: Regex = Regex::new(r"-?\d+\.\d+(?:[eE][-+]?\d+)?").unwrap();
    static ref CHARGE: Regex =
        Regex::new(r"^\s*(\d+)\s+(\S+)\s*:\s+(-?\d+\.\d+)\s*$").unwrap();
    static ref MAYER: Regex = Regex::new(
        r"^\s*(\d+)\s+(\S+)((?:\s+-?\d+\.\d+){6})\s*$"
    )
    .unwrap();
    static ref SCF: Regex =
        Regex::new(r"^\s*(\d+)\s+(-?\d+\.\d+)\s+(-?\d+\.\d+)").unwrap();
    static ref TIMING: Regex =
        Regex::new(r"^(\S.*?)\s*\.\.\.\s*(\d+\.\d+)\s+sec").unwrap();
    static ref ENSEMBLE: Regex = Regex::new(
        r"^\s*(\d+)\s+(-?\d+\.\d+)\s+(\d+)\s+(\d+\.\d+)\s+(\d+\.\d+)\s*$"
    )
    .unwrap();
}

const FREQ_HEADER: &str = "VIBRATIONAL FREQUENCIES";
const IR_HEADER: &str = "IR SPECTRUM";
const ENERGY: &str = "FINAL SINGLE POINT ENERGY";
const GIBBS: &str = "Final Gibbs free energy";
const DIPOLE: &str = "Total Dipole Moment";
const MAGNITUDE: &str = "Magnitude (a.u.)";
const TERMINATED: &str = "ORCA TERMINATED NORMALLY";
const QUADRUPOLE: &str = "QUADRUPOLE MOMENT (A.U.)";
const MULLIKEN: &str = "MULLIKEN ATOMIC CHARGES";
const LOEWDIN: &str = "LOEWDIN ATOMIC CHARGES";
const SCF_HEADER: &str = "SCF ITERATIONS";
const TIMINGS: &str = "Timings for individual modules:";

/// Parser for ORCA text output
#[derive(Clone, Copy, Debug, Default)]
pub struct OrcaOutput;

impl OrcaOutput {
    /// parse the contents of an output file. `geometry` is stored in the
    /// [Record] as-is
    pub fn parse_str(contents: &str, geometry: PathBuf) -> Record {
        let lines: Vec<&str> = contents.lines().collect();
        let mut record = Record {
            geometry,
            ..Default::default()
        };
        // later sections replace earlier ones, so an optimization+frequency
        // job reports its final values
        for (i, line) in lines.iter().enumerate() {
            let trimmed = line.trim();
            if trimmed == FREQ_HEADER {
                record.frequencies = Some(table(&lines[i + 1..], &FREQ, |c| {
                    c[1].parse().ok()
                }));
            } else if trimmed == IR_HEADER {
                record.ir_spectrum = table(&lines[i + 1..], &IR, |c| {
                    Some(IrMode {
                        mode: c[1].parse().ok()?,
                        frequency: c[2].parse().ok()?,
                        intensity: c[3].parse().ok()?,
                    })
                });
            } else if trimmed.starts_with(ENERGY) {
                record.energy = last_float(trimmed).or(record.energy);
            } else if trimmed.starts_with(GIBBS) {
                record.gibbs = last_float(trimmed).or(record.gibbs);
            } else if trimmed.starts_with(DIPOLE) {
                let v: Vec<f64> = floats(trimmed);
                if let [x, y, z] = v.as_slice() {
                    record.dipole = Some([*x, *y, *z]);
                }
            } else if trimmed.starts_with(MAGNITUDE) {
                record.dipole_magnitude =
                    last_float(trimmed).or(record.dipole_magnitude);
            } else if trimmed == QUADRUPOLE {
                record.quadrupole = quadrupole(&lines[i + 1..]);
            } else if trimmed == MULLIKEN {
                record.mulliken = table(&lines[i + 1..], &CHARGE, charge);
            } else if trimmed == LOEWDIN {
                record.loewdin = table(&lines[i + 1..], &CHARGE, charge);
            } else if trimmed.starts_with("ATOM") && trimmed.ends_with("FA") {
                record.mayer = table(&lines[i + 1..], &MAYER, mayer);
            } else if trimmed == SCF_HEADER {
                record.scf.push(scf_iterations(&lines[i + 1..]));
            } else if trimmed == TIMINGS {
                record.timings = table(&lines[i + 1..], &TIMING, |c| {
                    Some(Timing {
                        module: c[1].to_owned(),
                        seconds: c[2].parse().ok()?,
                    })
                });
            } else if trimmed.starts_with("Conformer")
                && trimmed.contains("% total")
            {
                record.ensemble = table(&lines[i + 1..], &ENSEMBLE, |c| {
                    Some(EnsembleEntry {
                        conformer: c[1].parse().ok()?,
                        energy: c[2].parse().ok()?,
                        degeneracy: c[3].parse().ok()?,
                        contribution: c[4].parse().ok()?,
                        cumulative: c[5].parse().ok()?,
                    })
                });
            } else if trimmed.contains(TERMINATED) {
                record.normal_termination = true;
            }
        }
        record
    }
}

impl Parser for OrcaOutput {
    fn parse(&self, output: &Path) -> Result<Record, ParseError> {
        let contents =
            fs::read_to_string(output).map_err(|source| ParseError::Io {
                path: output.to_owned(),
                source,
            })?;
        Ok(Self::parse_str(&contents, output.with_extension("xyz")))
    }
}

/// collect `f` over the lines matching `re` in the first contiguous run of
/// matches in `lines`. lines before the first match (dashes, blank lines,
/// column headers) are skipped, but only up to the next section header
fn table<T>(
    lines: &[&str],
    re: &Regex,
    f: impl Fn(&regex::Captures) -> Option<T>,
) -> Vec<T> {
    let mut ret = Vec::new();
    for line in lines {
        match re.captures(line) {
            Some(c) => {
                if let Some(v) = f(&c) {
                    ret.push(v);
                }
            }
            None if !ret.is_empty() => break,
            None if is_header(line) => break,
            None => {}
        }
    }
    ret
}

fn charge(c: &regex::Captures) -> Option<AtomCharge> {
    Some(AtomCharge {
        atom: c[1].parse().ok()?,
        label: c[2].to_owned(),
        charge: c[3].parse().ok()?,
    })
}

fn mayer(c: &regex::Captures) -> Option<MayerAtom> {
    let [na, za, qa, va, bva, fa]: [f64; 6] =
        floats(&c[3]).try_into().ok()?;
    Some(MayerAtom {
        atom: c[1].parse().ok()?,
        label: c[2].to_owned(),
        na,
        za,
        qa,
        va,
        bva,
        fa,
    })
}

/// the iterations of a single SCF run. unlike [table], the rows are
/// interrupted by status lines like `***Turning on DIIS***` and a second
/// column header when SOSCF starts, so this keeps going until the next
/// section header
fn scf_iterations(lines: &[&str]) -> Vec<ScfIteration> {
    let mut ret = Vec::new();
    for line in lines {
        if is_header(line) {
            break;
        }
        let Some(c) = SCF.captures(line) else {
            continue;
        };
        if let (Ok(iter), Ok(energy), Ok(delta)) =
            (c[1].parse(), c[2].parse(), c[3].parse())
        {
            ret.push(ScfIteration {
                iter,
                energy,
                delta,
            });
        }
    }
    ret
}

/// the `TOT` row of the quadrupole table just below its header
fn quadrupole(lines: &[&str]) -> Option<[f64; 6]> {
    lines
        .iter()
        .take(8)
        .find(|l| l.trim_start().starts_with("TOT"))
        .and_then(|l| floats(l).try_into().ok())
}

/// ORCA section headers are all-caps lines between rows of dashes. this only
/// needs to recognize the line of text itself
fn is_header(line: &str) -> bool {
    let t = line.trim();
    t.len() > 3
        && t.chars().any(|c| c.is_ascii_alphabetic())
        && t.chars()
            .all(|c| !c.is_ascii_lowercase() && !c.is_ascii_digit())
}

fn floats(line: &str) -> Vec<f64> {
    FLOAT
        .find_iter(line)
        .filter_map(|m| m.as_str().parse().ok())
        .collect()
}

fn last_float(line: &str) -> Option<f64> {
    floats(line).pop()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn load() -> Record {
        OrcaOutput
            .parse(Path::new("test_files/water.out"))
            .expect("failed to parse water.out")
    }

    #[test]
    fn frequencies() {
        let got = load().frequencies.unwrap();
        assert_eq!(got.len(), 9);
        assert_abs_diff_eq!(got[6], 1625.38);
        assert_abs_diff_eq!(got[8], 3757.82);
        assert_eq!(got[..6], [0.0; 6]);
    }

    #[test]
    fn ir_spectrum() {
        let got = load().ir_spectrum;
        assert_eq!(got.len(), 3);
        assert_eq!(got[0].mode, 6);
        assert_abs_diff_eq!(got[0].frequency, 1625.38);
        assert_abs_diff_eq!(got[0].intensity, 62.39);
        assert_abs_diff_eq!(got[2].intensity, 48.05);
    }

    #[test]
    fn scalars() {
        let got = load();
        // the last energy in an optimization is the converged one
        assert_abs_diff_eq!(got.energy.unwrap(), -76.323619912271);
        assert_abs_diff_eq!(got.gibbs.unwrap(), -76.31111111);
        let dipole = got.dipole.unwrap();
        assert_abs_diff_eq!(dipole[2], 0.803011);
        assert_abs_diff_eq!(got.dipole_magnitude.unwrap(), 0.803011);
        assert!(got.normal_termination);
        assert_eq!(got.geometry, PathBuf::from("test_files/water.xyz"));
    }

    #[test]
    fn charges() {
        let got = load();
        assert_eq!(got.mulliken.len(), 3);
        assert_abs_diff_eq!(got.mulliken[0].charge, -0.337552);
        assert_eq!(got.loewdin.len(), 3);
        assert_eq!(got.loewdin[0].label, "O");
        assert_abs_diff_eq!(got.loewdin[0].charge, -0.262447);
        assert_eq!(got.loewdin[2].atom, 2);
        assert_abs_diff_eq!(got.loewdin[2].charge, 0.131224);
        let total: f64 = got.loewdin.iter().map(|c| c.charge).sum();
        assert_abs_diff_eq!(total, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn mayer_populations() {
        let got = load().mayer;
        assert_eq!(got.len(), 3);
        assert_eq!(got[0].label, "O");
        assert_abs_diff_eq!(got[0].na, 8.3376);
        assert_abs_diff_eq!(got[0].za, 8.0);
        assert_abs_diff_eq!(got[0].qa, -0.3376);
        assert_abs_diff_eq!(got[1].va, 0.9713);
        assert_abs_diff_eq!(got[1].bva, 0.9713);
        assert_abs_diff_eq!(got[2].fa, 0.0);
    }

    #[test]
    fn scf_runs() {
        let got = load().scf;
        assert_eq!(got.len(), 2);
        // status lines and the SOSCF column header don't end the first run
        assert_eq!(got[0].len(), 5);
        assert_eq!(got[0][4].iter, 4);
        assert_abs_diff_eq!(got[0][3].energy, -75.96061587);
        assert_abs_diff_eq!(got[0][1].delta, -0.014018304832);
        assert_eq!(got[1].len(), 3);
        assert_abs_diff_eq!(got[1][2].energy, -76.3236199123);
    }

    #[test]
    fn quadrupole_and_timings() {
        let got = load();
        let q = got.quadrupole.unwrap();
        assert_abs_diff_eq!(q[0], -5.340312);
        assert_abs_diff_eq!(q[1], -4.771565);
        assert_abs_diff_eq!(q[5], 0.0);
        assert_eq!(got.timings.len(), 6);
        assert_eq!(got.timings[0].module, "Sum of individual times");
        assert_abs_diff_eq!(got.timings[0].seconds, 11.876);
        assert_eq!(got.timings[5].module, "Analytical frequency calculation");
        assert_abs_diff_eq!(got.timings[5].seconds, 3.302);
    }

    #[test]
    fn goat_ensemble() {
        let got = OrcaOutput
            .parse(Path::new("test_files/goat/water.out"))
            .unwrap();
        assert_eq!(got.ensemble.len(), 3);
        assert_eq!(got.ensemble[1].conformer, 1);
        assert_abs_diff_eq!(got.ensemble[1].energy, 0.502);
        assert_eq!(got.ensemble[1].degeneracy, 1);
        assert_abs_diff_eq!(got.ensemble[0].contribution, 61.68);
        assert_abs_diff_eq!(got.ensemble[2].cumulative, 100.0);
        assert_eq!(
            got.ensemble_path(),
            PathBuf::from("test_files/goat/water.finalensemble.xyz")
        );
        // nothing else in a plain output looks like an ensemble table
        assert!(load().ensemble.is_empty());
    }

    #[test]
    fn imaginary() {
        let out = "
-----------------------
VIBRATIONAL FREQUENCIES
-----------------------

Scaling factor for frequencies =  1.000000000  (already applied!)

   0:         0.00 cm**-1
   1:      -212.43 cm**-1 ***imaginary mode***
   2:      1601.10 cm**-1

------------
NORMAL MODES
------------
";
        let got = OrcaOutput::parse_str(out, PathBuf::new());
        assert_eq!(got.frequencies.unwrap(), vec![0.0, -212.43, 1601.10]);
        assert!(!got.normal_termination);
    }

    #[test]
    fn no_frequencies() {
        let out = "FINAL SINGLE POINT ENERGY       -1.0\n";
        let got = OrcaOutput::parse_str(out, PathBuf::new());
        assert!(got.frequencies.is_none());
        assert_eq!(got.energy, Some(-1.0));
    }

    #[test]
    fn missing_file() {
        assert!(OrcaOutput.parse(Path::new("test_files/nope.out")).is_err());
    }
}

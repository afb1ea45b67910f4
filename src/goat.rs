//! Conformer ensembles left behind by GOAT runs

use crate::{
    geom::{Geom, GeomError},
    parser::Record,
};

#[derive(Clone, Debug, PartialEq)]
pub struct Conformer {
    pub name: String,
    pub geom: Geom,
    /// kcal/mol above the lowest conformer
    pub energy: Option<f64>,
    /// percentage of the Boltzmann population
    pub contribution: Option<f64>,
}

pub fn conformer_name(name: &str, i: usize) -> String {
    format!("{name}_Conf_{i}")
}

/// Load the ensemble written next to `record`'s geometry. The conformers are
/// named `{name}_Conf_{i}` counting from 0, and pick up their energy and
/// contribution from the ensemble table in `record` when it has a row for
/// them.
pub fn conformers(
    name: &str,
    record: &Record,
) -> Result<Vec<Conformer>, GeomError> {
    let path = record.ensemble_path();
    let geoms = Geom::load_all(&path)?;
    if !record.ensemble.is_empty() && record.ensemble.len() != geoms.len() {
        log::warn!(
            "{} holds {} conformers but the ensemble table lists {}",
            path.display(),
            geoms.len(),
            record.ensemble.len()
        );
    }
    Ok(geoms
        .into_iter()
        .enumerate()
        .map(|(i, geom)| {
            let entry = record.ensemble.iter().find(|e| e.conformer == i);
            Conformer {
                name: conformer_name(name, i),
                geom,
                energy: entry.map(|e| e.energy),
                contribution: entry.map(|e| e.contribution),
            }
        })
        .collect())
}

use std::time::Duration;

/// format `d` as a human readable clock time like `1 hour, 2 minutes, 3
/// seconds`. Sub-second remainders are truncated, and a zero duration is `0
/// seconds`
pub fn clock_time(d: Duration) -> String {
    let secs = d.as_secs();
    let days = secs / 86400;
    let hours = (secs % 86400) / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    let parts: Vec<_> = [
        (days, "day"),
        (hours, "hour"),
        (minutes, "minute"),
        (seconds, "second"),
    ]
    .into_iter()
    .filter(|(n, _)| *n > 0)
    .map(|(n, unit)| {
        let s = if n > 1 { "s" } else { "" };
        format!("{n} {unit}{s}")
    })
    .collect();
    if parts.is_empty() {
        return String::from("0 seconds");
    }
    parts.join(", ")
}

/// Energy units reported by the engine
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EnergyUnit {
    Eh,
    Ev,
    KjMol,
    KcalMol,
    JMol,
}

impl EnergyUnit {
    /// the value of one hartree in this unit
    fn per_hartree(self) -> f64 {
        match self {
            EnergyUnit::Eh => 1.0,
            EnergyUnit::Ev => 27.2107,
            EnergyUnit::KjMol => 2625.5,
            EnergyUnit::KcalMol => 627.503,
            EnergyUnit::JMol => 2_625_500.0,
        }
    }
}

/// the factor converting an energy in `from` into `to`
pub fn convert_energy(from: EnergyUnit, to: EnergyUnit) -> f64 {
    to.per_hartree() / from.per_hartree()
}

/// gas constant in J/(mol K)
const R: f64 = 8.314;

/// the log partition coefficient between two solvents, given the Gibbs free
/// energies (in Eh) of the same solute in each at temperature `temp` in K
pub fn partition(gibbs1: f64, gibbs2: f64, temp: f64) -> f64 {
    let delta =
        (gibbs1 - gibbs2) * convert_energy(EnergyUnit::Eh, EnergyUnit::JMol);
    -delta / (R * temp)
}

//! Broadened IR spectra built from the stick spectrum in a [Record]
//!
//! [Record]: crate::parser::Record

use std::{fmt::Write as _, fs, io, path::Path};

use nalgebra::DVector;
use thiserror::Error;

use crate::parser::IrMode;

#[derive(Debug, Error, PartialEq)]
pub enum SpectrumError {
    #[error("sigma must be a positive number of cm-1, got {0}")]
    Sigma(f64),
}

/// Broadening and grid parameters, all in cm-1
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Broadening {
    /// standard deviation of each Gaussian
    pub sigma: f64,
    /// the grid runs from 0 up to, but not including, `max`
    pub max: f64,
    pub spacing: f64,
}

impl Broadening {
    /// a zero, negative, or non-finite `sigma` has no Gaussian to place
    pub fn check(&self) -> Result<(), SpectrumError> {
        if self.sigma.is_finite() && self.sigma > 0.0 {
            Ok(())
        } else {
            Err(SpectrumError::Sigma(self.sigma))
        }
    }
}

impl Default for Broadening {
    fn default() -> Self {
        Self {
            sigma: 5.0,
            max: 4000.0,
            spacing: 10.0,
        }
    }
}

/// An intensity on a uniform wavenumber grid
#[derive(Clone, Debug, PartialEq)]
pub struct Spectrum {
    pub wavenumbers: DVector<f64>,
    pub intensities: DVector<f64>,
}

impl Spectrum {
    /// place a normalized Gaussian of width `b.sigma` at each mode, scaled by
    /// its intensity, and sum them on the grid described by `b`
    pub fn broaden(
        modes: &[IrMode],
        b: Broadening,
    ) -> Result<Self, SpectrumError> {
        b.check()?;
        let n = if b.spacing > 0.0 {
            (b.max / b.spacing).ceil().max(0.0) as usize
        } else {
            0
        };
        let wavenumbers = DVector::from_fn(n, |i, _| i as f64 * b.spacing);
        let norm = 1.0 / (b.sigma * (2.0 * std::f64::consts::PI).sqrt());
        let intensities = wavenumbers.map(|w| {
            modes
                .iter()
                .map(|m| {
                    let x = (w - m.frequency) / b.sigma;
                    m.intensity * norm * (-0.5 * x * x).exp()
                })
                .sum::<f64>()
        });
        Ok(Self {
            wavenumbers,
            intensities,
        })
    }

    pub fn len(&self) -> usize {
        self.wavenumbers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wavenumbers.is_empty()
    }

    /// the wavenumber of the most intense point, if any
    pub fn peak(&self) -> Option<f64> {
        if self.is_empty() {
            return None;
        }
        Some(self.wavenumbers[self.intensities.imax()])
    }

    /// `1 - I / max(I)`, the way spectra are usually plotted. an all-zero
    /// spectrum stays at 1
    pub fn transmittance(&self) -> DVector<f64> {
        let max = self.intensities.max();
        if max <= 0.0 {
            return DVector::from_element(self.len(), 1.0);
        }
        self.intensities.map(|i| 1.0 - i / max)
    }

    /// write the spectrum as `Wavenumber,IRIntensity` CSV, highest wavenumber
    /// first
    pub fn write_csv(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let mut out = String::from("Wavenumber,IRIntensity\n");
        for k in (0..self.len()).rev() {
            // writing to a String can't fail
            let _ = writeln!(
                out,
                "{},{}",
                self.wavenumbers[k], self.intensities[k]
            );
        }
        fs::write(path, out)
    }
}

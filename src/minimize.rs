/*!
# Minimizers

One dimensional searches for the distance minimizing a focus metric.

 - [`legacy`]: coarse grid followed by successively refined grids around the
   minimum. Kept to reproduce previous results.
 - [`least_squares`]: brute force grid with a step of a few wavelengths
   followed by a bounded Levenberg-Marquardt refinement. This is the
   `"lmfit"` minimizer and the default.

Both drive an objective `FnMut(f64) -> Result<f64, E>` so they are
independent of the way the metric is computed.
*/

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

pub mod least_squares;
pub mod legacy;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum MinimizeError {
    #[error("unknown minimizer: {0:?}")]
    Unknown(String),
    #[error("no convergence after {iterations} iterations (last distance: {distance})")]
    NotConverged { iterations: usize, distance: f64 },
    #[error("invalid minimizer option: {0}")]
    InvalidOption(String),
}

/// Available minimizers
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    EnumString,
    Display,
    EnumIter,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
pub enum Minimizer {
    #[strum(serialize = "legacy")]
    #[serde(rename = "legacy")]
    Legacy,
    #[default]
    #[strum(serialize = "lmfit")]
    #[serde(rename = "lmfit")]
    Lmfit,
}
impl Minimizer {
    pub fn from_name(name: &str) -> Result<Self, MinimizeError> {
        Self::from_str(name).map_err(|_| MinimizeError::Unknown(name.to_string()))
    }
    /// Minimizes `objective` over `interval`
    ///
    /// `scale` is the unit of the brute force step of the `lmfit` minimizer,
    /// the wavelength in the units of the interval.
    pub fn minimize<F, E>(
        &self,
        objective: F,
        interval: (f64, f64),
        scale: f64,
        legacy: &LegacyOptions,
        lmfit: &LmfitOptions,
    ) -> Result<Minimum, E>
    where
        F: FnMut(f64) -> Result<f64, E>,
        E: From<MinimizeError>,
    {
        match self {
            Minimizer::Legacy => legacy::minimize(objective, interval, legacy),
            Minimizer::Lmfit => least_squares::minimize(objective, interval, scale, lmfit),
        }
    }
}

/// Options of the [`legacy`] minimizer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegacyOptions {
    /// Coarse grid resolution: the grid has `100 / coarse_accuracy` samples
    pub coarse_accuracy: f64,
    /// Stops when the change of the minimum divided by 100 falls below
    pub fine_accuracy: f64,
    /// Maximum number of fine grid refinements
    pub max_iterations: usize,
}
impl Default for LegacyOptions {
    fn default() -> Self {
        Self {
            coarse_accuracy: 1.,
            fine_accuracy: 0.005,
            max_iterations: 1000,
        }
    }
}

/// Options of the [`least_squares`] minimizer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LmfitOptions {
    /// Brute force grid step, in wavelengths
    pub brute_step: f64,
    /// Half width of the refinement window around the brute force minimum, in wavelengths
    pub local_window: f64,
    /// Levenberg-Marquardt evaluation budget factor
    pub patience: usize,
}
impl Default for LmfitOptions {
    fn default() -> Self {
        Self {
            brute_step: 2.,
            local_window: 4.,
            patience: 100,
        }
    }
}

/// Distances and metric values of a search grid
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchGrid {
    pub distances: Vec<f64>,
    pub values: Vec<f64>,
}
impl SearchGrid {
    pub fn len(&self) -> usize {
        self.distances.len()
    }
    pub fn is_empty(&self) -> bool {
        self.distances.is_empty()
    }
    /// Sample with the lowest metric value
    pub fn minimum(&self) -> Option<(f64, f64)> {
        if self.is_empty() {
            None
        } else {
            let i = argmin(&self.values);
            Some((self.distances[i], self.values[i]))
        }
    }
}

/// Outcome of a minimization
#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    pub distance: f64,
    /// Coarse or brute force grid of the search
    pub grid: SearchGrid,
}

/// `n` evenly spaced samples over `[start, stop]`, both ends included
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => vec![],
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            let mut samples: Vec<f64> = (0..n).map(|i| i as f64 * step + start).collect();
            samples[n - 1] = stop;
            samples
        }
    }
}

/// Index of the first smallest value, or of the first NaN
///
/// `values` must not be empty.
pub(crate) fn argmin(values: &[f64]) -> usize {
    let mut index = 0;
    for (i, &value) in values.iter().enumerate() {
        if value.is_nan() {
            return i;
        }
        if value < values[index] {
            index = i;
        }
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linspace_like_numpy() {
        assert_eq!(linspace(0., 1., 5), vec![0., 0.25, 0.5, 0.75, 1.]);
        assert_eq!(linspace(2., 2., 3), vec![2., 2., 2.]);
        assert_eq!(linspace(-7.5, -2.5, 1), vec![-7.5]);
        let z = linspace(-7.5, -2.5, 100);
        assert_eq!(z.len(), 100);
        assert_eq!(z[99], -2.5);
    }

    #[test]
    fn argmin_first_occurrence() {
        assert_eq!(argmin(&[3., 1., 2., 1.]), 1);
        assert_eq!(argmin(&[3., f64::NAN, 0.]), 1);
        assert_eq!(argmin(&[5.]), 0);
    }

    #[test]
    fn names() {
        assert_eq!(Minimizer::from_name("legacy"), Ok(Minimizer::Legacy));
        assert_eq!(Minimizer::default().to_string(), "lmfit");
        assert_eq!(
            Minimizer::from_name("nelder-mead"),
            Err(MinimizeError::Unknown("nelder-mead".into()))
        );
    }

    #[test]
    fn options_from_partial_json() {
        let options: LegacyOptions = serde_json::from_str(r#"{"coarse_accuracy": 0.5}"#).unwrap();
        assert_eq!(options.coarse_accuracy, 0.5);
        assert_eq!(options.max_iterations, 1000);
    }
}

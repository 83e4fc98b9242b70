/*!
# Autofocus

Searches the distance that minimizes a focus metric of a [`Refocus`]
session.

```
use ndarray::Array1;
use num_complex::Complex64;
use refocus::{AutofocusConfig, Metric, RefocusConfig};

let field = Array1::linspace(0.1f64, 0.5, 256)
    .mapv(Complex64::cis)
    .into_shape((16, 16))
    .unwrap()
    .into_dyn();
let mut rf = RefocusConfig::new(8.25, 1.)
    .medium_index(1.533)
    .build(field)
    .unwrap();
let af = rf
    .autofocus(
        &AutofocusConfig::new((-7.5, -2.5))
            .metric(Metric::AverageGradient)
            .return_field(true),
    )
    .unwrap();
assert!(af.distance >= -7.5 && af.distance <= -2.5);
assert!(af.field.is_some() && af.grid.is_none());
```
*/

use ndarray::ArrayD;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::{
    metrics::Metric,
    minimize::{LegacyOptions, LmfitOptions, Minimizer, Minimum, SearchGrid},
    roi::Roi,
    Refocus, Result,
};

/// Autofocus settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutofocusConfig {
    pub metric: Metric,
    pub minimizer: Minimizer,
    /// Search interval, in the length unit of the session
    pub interval: (f64, f64),
    pub roi: Option<Roi>,
    pub legacy: LegacyOptions,
    pub lmfit: LmfitOptions,
    /// Returns the coarse search grid
    pub return_grid: bool,
    /// Returns the field refocused at the optimal distance
    pub return_field: bool,
}
impl AutofocusConfig {
    pub fn new(interval: (f64, f64)) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }
    pub fn metric(self, metric: Metric) -> Self {
        Self { metric, ..self }
    }
    pub fn minimizer(self, minimizer: Minimizer) -> Self {
        Self { minimizer, ..self }
    }
    pub fn interval(self, interval: (f64, f64)) -> Self {
        Self { interval, ..self }
    }
    pub fn roi(self, roi: Roi) -> Self {
        Self {
            roi: Some(roi),
            ..self
        }
    }
    pub fn legacy(self, legacy: LegacyOptions) -> Self {
        Self { legacy, ..self }
    }
    pub fn lmfit(self, lmfit: LmfitOptions) -> Self {
        Self { lmfit, ..self }
    }
    pub fn return_grid(self, return_grid: bool) -> Self {
        Self {
            return_grid,
            ..self
        }
    }
    pub fn return_field(self, return_field: bool) -> Self {
        Self {
            return_field,
            ..self
        }
    }
}

/// Autofocus outcome
#[derive(Debug, Clone, PartialEq)]
pub struct Autofocus {
    /// Distance of best focus
    pub distance: f64,
    /// Coarse search grid, if requested
    pub grid: Option<SearchGrid>,
    /// Field at the best focus, if requested
    pub field: Option<ArrayD<Complex64>>,
}

impl Refocus {
    /// Finds the distance of best focus with one of the built-in metrics
    ///
    /// The metric is checked against the region of interest before any
    /// propagation.
    pub fn autofocus(&mut self, config: &AutofocusConfig) -> Result<Autofocus> {
        config
            .metric
            .validate(config.roi.as_ref(), self.field_shape())?;
        self.autofocus_with(config.metric.function(), config)
    }
    /// Finds the distance of best focus with a user supplied metric
    ///
    /// `config.metric` is ignored.
    pub fn autofocus_with<M>(&mut self, mut metric: M, config: &AutofocusConfig) -> Result<Autofocus>
    where
        M: FnMut(&mut Refocus, f64, Option<&Roi>) -> Result<f64>,
    {
        let roi = config.roi.as_ref();
        if let Some(roi) = roi {
            roi.check(self.field_shape())?;
        }
        log::info!(
            "autofocus over {:?} with the {} minimizer",
            config.interval,
            config.minimizer
        );
        let scale = self.optics().wavelength;
        let Minimum { distance, grid } = config.minimizer.minimize(
            |d| -> Result<f64> {
                let value = metric(self, d, roi)?;
                log::trace!("metric at {d}: {value}");
                Ok(value)
            },
            config.interval,
            scale,
            &config.legacy,
            &config.lmfit,
        )?;
        log::info!("best focus at {distance}");
        Ok(Autofocus {
            distance,
            grid: config.return_grid.then_some(grid),
            field: config.return_field.then(|| self.propagate(distance)),
        })
    }
}

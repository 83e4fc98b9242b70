/*!
# Focus metrics

Scalar sharpness measures of a session field propagated to a distance. All
metrics are minimized at best focus.

| name               | measure                                              |
|--------------------|------------------------------------------------------|
| `average gradient` | mean squared gradient of the amplitude               |
| `std gradient`     | standard deviation of the gradient of the amplitude  |
| `med gradient`     | median squared gradient of the amplitude             |
| `rms contrast`     | RMS deviation of the phase from its mean             |
| `spectrum`         | log-sum of the band limited spectrum                 |

The gradient and contrast metrics can be restricted to a [`Roi`], the
spectrum metric works on the whole Fourier plane and rejects any region of
interest.
*/

use std::{collections::BTreeMap, f64::consts::PI, str::FromStr};

use ndarray::{ArrayD, ArrayViewD, Axis, Zip};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::{kernel::fftfreq, roi::Roi, Refocus, Result};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum MetricError {
    #[error("unknown metric: {0:?}")]
    Unknown(String),
    #[error("the spectrum metric does not support a region of interest")]
    SpectrumRoi,
    #[error("gradient needs at least 2 samples along axis {axis}, got {len}")]
    Gradient { axis: usize, len: usize },
}

/// Signature of a focus metric: session, distance and optional region of interest
pub type MetricFn = fn(&mut Refocus, f64, Option<&Roi>) -> Result<f64>;

/// Built-in focus metrics
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
pub enum Metric {
    #[default]
    #[strum(serialize = "average gradient")]
    #[serde(rename = "average gradient")]
    AverageGradient,
    #[strum(serialize = "std gradient")]
    #[serde(rename = "std gradient")]
    StdGradient,
    #[strum(serialize = "med gradient")]
    #[serde(rename = "med gradient")]
    MedGradient,
    #[strum(serialize = "rms contrast")]
    #[serde(rename = "rms contrast")]
    RmsContrast,
    #[strum(serialize = "spectrum")]
    #[serde(rename = "spectrum")]
    Spectrum,
}
impl Metric {
    pub fn from_name(name: &str) -> std::result::Result<Self, MetricError> {
        Self::from_str(name).map_err(|_| MetricError::Unknown(name.to_string()))
    }
    pub fn function(&self) -> MetricFn {
        match self {
            Metric::AverageGradient => average_gradient,
            Metric::StdGradient => std_gradient,
            Metric::MedGradient => med_gradient,
            Metric::RmsContrast => rms_contrast,
            Metric::Spectrum => spectrum,
        }
    }
    pub fn evaluate(&self, session: &mut Refocus, distance: f64, roi: Option<&Roi>) -> Result<f64> {
        (self.function())(session, distance, roi)
    }
    fn uses_gradient(&self) -> bool {
        matches!(
            self,
            Metric::AverageGradient | Metric::StdGradient | Metric::MedGradient
        )
    }
    /// Checks the metric against a field of the given `shape` without propagating
    pub fn validate(&self, roi: Option<&Roi>, shape: &[usize]) -> Result<()> {
        let window: Vec<usize> = match roi {
            Some(_) if *self == Metric::Spectrum => return Err(MetricError::SpectrumRoi.into()),
            Some(roi) => {
                roi.check(shape)?;
                roi.spans()
                    .iter()
                    .zip(shape)
                    .map(|(span, &len)| span.resolve(len).len())
                    .collect()
            }
            None => shape.to_vec(),
        };
        if self.uses_gradient() {
            if let Some((axis, &len)) = window.iter().enumerate().find(|&(_, &len)| len < 2) {
                return Err(MetricError::Gradient { axis, len }.into());
            }
        }
        Ok(())
    }
}

/// Built-in metrics by name
pub fn registry() -> BTreeMap<&'static str, MetricFn> {
    Metric::iter()
        .map(|metric| (metric.into(), metric.function()))
        .collect()
}

/// Amplitude of the propagated field within the region of interest
fn amplitude(session: &mut Refocus, distance: f64, roi: Option<&Roi>) -> Result<ArrayD<f64>> {
    let field = session.propagate(distance);
    let window = match roi {
        Some(roi) => roi.apply(field.view())?,
        None => field.view(),
    };
    Ok(window.mapv(|x| x.norm()))
}

pub fn average_gradient(session: &mut Refocus, distance: f64, roi: Option<&Roi>) -> Result<f64> {
    let gradient = gradient(&amplitude(session, distance, roi)?.view())?;
    Ok(mean(gradient.iter().map(|g| g * g)))
}

pub fn std_gradient(session: &mut Refocus, distance: f64, roi: Option<&Roi>) -> Result<f64> {
    let gradient = gradient(&amplitude(session, distance, roi)?.view())?;
    Ok(std_dev(&gradient))
}

pub fn med_gradient(session: &mut Refocus, distance: f64, roi: Option<&Roi>) -> Result<f64> {
    let gradient = gradient(&amplitude(session, distance, roi)?.view())?;
    Ok(median(gradient.into_iter().map(|g| g * g).collect()))
}

pub fn rms_contrast(session: &mut Refocus, distance: f64, roi: Option<&Roi>) -> Result<f64> {
    let field = session.propagate(distance);
    let window = match roi {
        Some(roi) => roi.apply(field.view())?,
        None => field.view(),
    };
    let phase: Vec<f64> = window.iter().map(|x| x.arg()).collect();
    Ok(std_dev(&phase))
}

/// Spectral contrast
///
/// Evaluated directly on the product of the session spectrum with the
/// kernel: the DC term and every frequency beyond `π/λ` (λ in pixels) are
/// discarded before summing `ln(1+|c|)`.
pub fn spectrum(session: &mut Refocus, distance: f64, roi: Option<&Roi>) -> Result<f64> {
    if roi.is_some() {
        return Err(MetricError::SpectrumRoi.into());
    }
    let product = session.fft_origin() * &session.kernel(distance);
    Ok(band_limited_log_sum(
        &product.view(),
        session.optics().wavelength_px(),
    ))
}

fn band_limited_log_sum(spectrum: &ArrayViewD<Complex64>, wavelength_px: f64) -> f64 {
    let freqs: Vec<Vec<f64>> = spectrum
        .shape()
        .iter()
        .map(|&n| fftfreq(n).into_iter().map(|f| 2. * PI * f).collect())
        .collect();
    let kmax2 = (PI / wavelength_px).powi(2);
    let sum: f64 = spectrum
        .indexed_iter()
        .filter(|(idx, _)| {
            let dc = (0..freqs.len()).all(|axis| idx[axis] == 0);
            let k2: f64 = freqs
                .iter()
                .enumerate()
                .map(|(axis, k)| k[idx[axis]].powi(2))
                .sum();
            !dc && k2 <= kmax2
        })
        .map(|(_, c)| (1. + c.norm()).ln())
        .sum();
    sum / (spectrum.len() as f64).sqrt()
}

/// Discrete gradient along every axis, all axes stacked in one vector
///
/// Central differences inside, one-sided differences at both ends.
fn gradient(data: &ArrayViewD<f64>) -> std::result::Result<Vec<f64>, MetricError> {
    let mut stacked = Vec::with_capacity(data.len() * data.ndim());
    for axis in 0..data.ndim() {
        let len = data.len_of(Axis(axis));
        if len < 2 {
            return Err(MetricError::Gradient { axis, len });
        }
        let mut g = ArrayD::<f64>::zeros(data.raw_dim());
        Zip::from(g.lanes_mut(Axis(axis)))
            .and(data.lanes(Axis(axis)))
            .for_each(|mut g, f| {
                g[0] = f[1] - f[0];
                g[len - 1] = f[len - 1] - f[len - 2];
                for i in 1..len - 1 {
                    g[i] = (f[i + 1] - f[i - 1]) / 2.;
                }
            });
        stacked.extend(g.iter());
    }
    Ok(stacked)
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0f64, 0usize), |(s, n), x| (s + x, n + 1));
    sum / n as f64
}

/// Population standard deviation
fn std_dev(values: &[f64]) -> f64 {
    let mean = mean(values.iter().copied());
    mean_sq(values.iter().map(|x| x - mean)).sqrt()
}
fn mean_sq(values: impl Iterator<Item = f64>) -> f64 {
    mean(values.map(|x| x * x))
}

fn median(mut values: Vec<f64>) -> f64 {
    if values.is_empty() || values.iter().any(|x| x.is_nan()) {
        return f64::NAN;
    }
    values.sort_by(f64::total_cmp);
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.
    }
}

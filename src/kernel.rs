/*!
# Propagation kernels

Transfer functions of free space propagation in the spatial frequency
domain. Distances are given in pixels relative to the reference plane of the
session and frequencies follow the FFT ordering of [`fftfreq`].
*/

use std::{f64::consts::PI, str::FromStr};

use ndarray::{ArrayD, IxDyn};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum KernelError {
    #[error("unknown propagation kernel: {0:?}")]
    Unknown(String),
}

/// Physical parameters of the imaging system
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Optics {
    /// Wavelength of the light (length units)
    pub wavelength: f64,
    /// Size of a pixel in the field plane (same length units)
    pub pixel_size: f64,
    /// Refractive index of the medium
    pub medium_index: f64,
}
impl Optics {
    pub fn new(wavelength: f64, pixel_size: f64, medium_index: f64) -> Self {
        Self {
            wavelength,
            pixel_size,
            medium_index,
        }
    }
    /// Wavelength in pixels
    pub fn wavelength_px(&self) -> f64 {
        self.wavelength / self.pixel_size
    }
    /// Wavenumber in the medium, in radians per pixel
    pub fn medium_wavenumber(&self) -> f64 {
        2. * PI * self.medium_index / self.wavelength_px()
    }
}

/// Propagation kernel
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
pub enum Kernel {
    /// Angular spectrum: `exp(i d (sqrt(km² - k²) - km))`, evanescent waves removed
    #[default]
    #[strum(serialize = "helmholtz")]
    #[serde(rename = "helmholtz")]
    Helmholtz,
    /// Paraxial approximation: `exp(-i d k² / 2km)`
    #[strum(serialize = "fresnel")]
    #[serde(rename = "fresnel")]
    Fresnel,
}
impl Kernel {
    pub fn from_name(name: &str) -> Result<Self, KernelError> {
        Self::from_str(name).map_err(|_| KernelError::Unknown(name.to_string()))
    }
    /// Transfer function for a field of the given transform `shape`
    ///
    /// `km` is the medium wavenumber and `d` the propagation distance, both
    /// in pixel units.
    pub fn transfer_function(&self, shape: &[usize], km: f64, d: f64) -> ArrayD<Complex64> {
        let freqs: Vec<Vec<f64>> = shape
            .iter()
            .map(|&n| fftfreq(n).into_iter().map(|f| 2. * PI * f).collect())
            .collect();
        let km2 = km * km;
        ArrayD::from_shape_fn(IxDyn(shape), |idx| {
            let k2 = freqs.iter().enumerate().map(|(axis, k)| k[idx[axis]].powi(2));
            match self {
                Kernel::Helmholtz => {
                    let root = k2.fold(km2, |root, k2| root - k2);
                    if root > 0. {
                        Complex64::cis(d * (root.sqrt() - km))
                    } else {
                        Complex64::new(0., 0.)
                    }
                }
                Kernel::Fresnel => Complex64::cis(-d * k2.sum::<f64>() / (2. * km)),
            }
        })
    }
}

/// Sample frequencies of a discrete Fourier transform of length `n`
///
/// Zero first, then the positive frequencies, then the negative ones, in
/// cycles per sample.
pub fn fftfreq(n: usize) -> Vec<f64> {
    let positive = (n + 1) / 2;
    let step = 1. / n as f64;
    (0..n)
        .map(|i| {
            if i < positive {
                i as f64 * step
            } else {
                (i as f64 - n as f64) * step
            }
        })
        .collect()
}

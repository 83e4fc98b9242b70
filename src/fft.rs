/*!
# Fourier transform backends

A refocusing session transforms its field once and then repeatedly applies
the inverse transform to the product of that spectrum with a propagation
kernel. The [`FourierTransform`] trait captures these two steps; [`PlainFft`]
plans every transform from scratch while [`PlannedFft`] keeps the plans and a
fixed output buffer for the lifetime of the session.

Forward transforms are unnormalized, inverse transforms are scaled by `1/N`.
*/

use std::sync::Arc;

use ndarray::{ArrayD, ArrayViewD, Axis, IxDyn, Zip};
use num_complex::Complex64;
use rustfft::{Fft, FftDirection, FftPlanner};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

/// Forward and kernel-weighted inverse transforms of a session
pub trait FourierTransform: Send {
    /// Forward transform of the (padded) field over every axis
    fn init_transform(&mut self, field: ArrayD<Complex64>) -> ArrayD<Complex64>;
    /// Inverse transform of `spectrum * kernel`
    ///
    /// The returned view borrows the backend output buffer and is only valid
    /// until the next call.
    fn propagate(
        &mut self,
        spectrum: &ArrayD<Complex64>,
        kernel: &ArrayD<Complex64>,
    ) -> ArrayViewD<'_, Complex64>;
}

/// Available [`FourierTransform`] implementations
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
pub enum Backend {
    #[strum(serialize = "plain")]
    #[serde(rename = "plain")]
    Plain,
    #[default]
    #[strum(serialize = "planned")]
    #[serde(rename = "planned")]
    Planned,
}
impl Backend {
    /// The fastest backend of this build
    pub fn best_available() -> Self {
        Backend::Planned
    }
    pub fn create(&self) -> Box<dyn FourierTransform> {
        log::debug!("FFT backend: {self}");
        match self {
            Backend::Plain => Box::new(PlainFft::default()),
            Backend::Planned => Box::new(PlannedFft::default()),
        }
    }
}

/// One transform plan per axis
struct Plans {
    forward: Vec<Arc<dyn Fft<f64>>>,
    inverse: Vec<Arc<dyn Fft<f64>>>,
}
impl Plans {
    fn new(shape: &[usize]) -> Self {
        let mut planner = FftPlanner::<f64>::new();
        let plan = |planner: &mut FftPlanner<f64>, direction| -> Vec<Arc<dyn Fft<f64>>> {
            shape
                .iter()
                .map(|&n| planner.plan_fft(n, direction))
                .collect()
        };
        Self {
            forward: plan(&mut planner, FftDirection::Forward),
            inverse: plan(&mut planner, FftDirection::Inverse),
        }
    }
}

/// Applies the per axis `plans` to every lane of `data`
///
/// `lane` and `scratch` are working buffers resized as needed.
fn transform_axes(
    data: &mut ArrayD<Complex64>,
    plans: &[Arc<dyn Fft<f64>>],
    lane: &mut Vec<Complex64>,
    scratch: &mut Vec<Complex64>,
) {
    let zero = Complex64::new(0., 0.);
    for (axis, fft) in plans.iter().enumerate() {
        lane.resize(fft.len(), zero);
        scratch.resize(fft.get_inplace_scratch_len(), zero);
        for mut data_lane in data.lanes_mut(Axis(axis)) {
            lane.iter_mut()
                .zip(data_lane.iter())
                .for_each(|(l, d)| *l = *d);
            fft.process_with_scratch(lane, scratch);
            data_lane
                .iter_mut()
                .zip(lane.iter())
                .for_each(|(d, l)| *d = *l);
        }
    }
}

fn normalize(data: &mut ArrayD<Complex64>) {
    let scale = 1. / data.len() as f64;
    data.mapv_inplace(|x| x * scale);
}

/// Transforms planned anew for every call
#[derive(Default)]
pub struct PlainFft {
    buffer: ArrayD<Complex64>,
}
impl FourierTransform for PlainFft {
    fn init_transform(&mut self, mut field: ArrayD<Complex64>) -> ArrayD<Complex64> {
        let plans = Plans::new(field.shape());
        transform_axes(&mut field, &plans.forward, &mut vec![], &mut vec![]);
        field
    }
    fn propagate(
        &mut self,
        spectrum: &ArrayD<Complex64>,
        kernel: &ArrayD<Complex64>,
    ) -> ArrayViewD<'_, Complex64> {
        let plans = Plans::new(spectrum.shape());
        self.buffer = spectrum * kernel;
        transform_axes(&mut self.buffer, &plans.inverse, &mut vec![], &mut vec![]);
        normalize(&mut self.buffer);
        self.buffer.view()
    }
}

/// Transforms planned once, with reusable working buffers
///
/// The plans are rebuilt only when the shape of the transformed array
/// changes, which never happens within a session.
pub struct PlannedFft {
    plans: Plans,
    buffer: ArrayD<Complex64>,
    lane: Vec<Complex64>,
    scratch: Vec<Complex64>,
}
impl Default for PlannedFft {
    fn default() -> Self {
        Self {
            plans: Plans::new(&[]),
            buffer: ArrayD::zeros(IxDyn(&[])),
            lane: vec![],
            scratch: vec![],
        }
    }
}
impl PlannedFft {
    fn plan(&mut self, shape: &[usize]) {
        if self.buffer.shape() != shape {
            log::debug!("planning FFTs for shape {shape:?}");
            self.plans = Plans::new(shape);
            self.buffer = ArrayD::zeros(IxDyn(shape));
        }
    }
}
impl FourierTransform for PlannedFft {
    fn init_transform(&mut self, mut field: ArrayD<Complex64>) -> ArrayD<Complex64> {
        self.plan(field.shape());
        transform_axes(
            &mut field,
            &self.plans.forward,
            &mut self.lane,
            &mut self.scratch,
        );
        field
    }
    fn propagate(
        &mut self,
        spectrum: &ArrayD<Complex64>,
        kernel: &ArrayD<Complex64>,
    ) -> ArrayViewD<'_, Complex64> {
        self.plan(spectrum.shape());
        Zip::from(&mut self.buffer)
            .and(spectrum)
            .and(kernel)
            .for_each(|b, &s, &k| *b = s * k);
        transform_axes(
            &mut self.buffer,
            &self.plans.inverse,
            &mut self.lane,
            &mut self.scratch,
        );
        normalize(&mut self.buffer);
        self.buffer.view()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use std::f64::consts::PI;

    fn random_field(shape: &[usize], seed: u64) -> ArrayD<Complex64> {
        let mut rng = StdRng::seed_from_u64(seed);
        ArrayD::from_shape_simple_fn(IxDyn(shape), || {
            Complex64::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0))
        })
    }

    fn max_diff(a: &ArrayViewD<Complex64>, b: &ArrayViewD<Complex64>) -> f64 {
        a.iter()
            .zip(b.iter())
            .map(|(a, b)| (a - b).norm())
            .fold(0., f64::max)
    }

    #[test]
    fn forward_matches_direct_dft() {
        let (nx, ny) = (6, 5);
        let field = random_field(&[nx, ny], 7);
        let spectrum = PlainFft::default().init_transform(field.clone());
        let mut dft = ArrayD::<Complex64>::zeros(IxDyn(&[nx, ny]));
        for u in 0..nx {
            for v in 0..ny {
                let mut sum = Complex64::new(0., 0.);
                for x in 0..nx {
                    for y in 0..ny {
                        let phase = -2. * PI
                            * ((u * x) as f64 / nx as f64 + (v * y) as f64 / ny as f64);
                        sum += field[[x, y]] * Complex64::cis(phase);
                    }
                }
                dft[[u, v]] = sum;
            }
        }
        assert!(max_diff(&spectrum.view(), &dft.view()) < 1e-10);
    }

    #[test]
    fn unit_kernel_is_identity() {
        for shape in [vec![17], vec![8, 12]] {
            let field = random_field(&shape, 3);
            let ones = ArrayD::from_elem(IxDyn(&shape), Complex64::new(1., 0.));
            for backend in [Backend::Plain, Backend::Planned] {
                let mut fft = backend.create();
                let spectrum = fft.init_transform(field.clone());
                let back = fft.propagate(&spectrum, &ones);
                assert!(max_diff(&back, &field.view()) < 1e-12);
            }
        }
    }

    #[test]
    fn planned_matches_plain() {
        let shape = [10, 14];
        let field = random_field(&shape, 11);
        let kernel = random_field(&shape, 12);
        let mut plain = PlainFft::default();
        let mut planned = PlannedFft::default();
        let s_plain = plain.init_transform(field.clone());
        let s_planned = planned.init_transform(field);
        assert!(max_diff(&s_plain.view(), &s_planned.view()) < 1e-12);
        let a = plain.propagate(&s_plain, &kernel).to_owned();
        // buffers are reused, repeated calls must not accumulate
        planned.propagate(&s_planned, &kernel);
        let b = planned.propagate(&s_planned, &kernel);
        assert!(max_diff(&a.view(), &b) < 1e-12);
    }

    #[test]
    fn best_available_is_planned() {
        assert_eq!(Backend::best_available(), Backend::Planned);
        assert_eq!("plain".parse::<Backend>(), Ok(Backend::Plain));
    }
}

/*!
# Refocusing session

A [`Refocus`] session owns one field and its optics. The (padded) field is
Fourier transformed once when the session is built, then every call to
[`Refocus::propagate`] only computes a kernel and an inverse transform.

```
use ndarray::Array2;
use num_complex::Complex64;
use refocus::RefocusConfig;

let field = Array2::from_shape_fn((32, 32), |(i, j)| {
    Complex64::from_polar(1., 0.01 * (i * j) as f64)
})
.into_dyn();
let mut rf = RefocusConfig::new(500e-9, 100e-9)
    .medium_index(1.335)
    .build(field)
    .unwrap();
let refocused = rf.propagate(1e-6);
assert_eq!(refocused.shape(), &[32, 32]);
```
*/

use ndarray::{ArrayD, Slice};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::{
    fft::{Backend, FourierTransform},
    kernel::{Kernel, Optics},
    metrics::Metric,
    minimize::{linspace, SearchGrid},
    pad::{pad_add, BORDER_WIDTH},
    roi::Roi,
    Error, Result,
};

fn water() -> f64 {
    1.3333
}
fn yes() -> bool {
    true
}

/// [`Refocus`] session builder
///
/// Lengths (wavelength, pixel size, distances) share the same unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefocusConfig {
    pub wavelength: f64,
    pub pixel_size: f64,
    /// Refractive index of the medium, water by default
    #[serde(default = "water")]
    pub medium_index: f64,
    /// Distance of the plane the field is given in
    #[serde(default)]
    pub distance: f64,
    #[serde(default)]
    pub kernel: Kernel,
    /// Linear ramp padding to twice the field size
    #[serde(default = "yes")]
    pub padding: bool,
    #[serde(default = "Backend::best_available")]
    pub backend: Backend,
}
impl RefocusConfig {
    pub fn new(wavelength: f64, pixel_size: f64) -> Self {
        Self {
            wavelength,
            pixel_size,
            medium_index: water(),
            distance: 0.,
            kernel: Kernel::default(),
            padding: true,
            backend: Backend::best_available(),
        }
    }
    pub fn wavelength(self, wavelength: f64) -> Self {
        Self { wavelength, ..self }
    }
    pub fn pixel_size(self, pixel_size: f64) -> Self {
        Self { pixel_size, ..self }
    }
    pub fn medium_index(self, medium_index: f64) -> Self {
        Self {
            medium_index,
            ..self
        }
    }
    pub fn distance(self, distance: f64) -> Self {
        Self { distance, ..self }
    }
    pub fn kernel(self, kernel: Kernel) -> Self {
        Self { kernel, ..self }
    }
    pub fn padding(self, padding: bool) -> Self {
        Self { padding, ..self }
    }
    pub fn backend(self, backend: Backend) -> Self {
        Self { backend, ..self }
    }
    pub fn optics(&self) -> Optics {
        Optics::new(self.wavelength, self.pixel_size, self.medium_index)
    }
    /// Pads and transforms `field`
    pub fn build(&self, field: ArrayD<Complex64>) -> Result<Refocus> {
        Refocus::new(field, self)
    }
}

/// Refocusing session of a 1D or 2D field
pub struct Refocus {
    origin: ArrayD<Complex64>,
    optics: Optics,
    distance: f64,
    kernel: Kernel,
    padding: bool,
    fft_origin: ArrayD<Complex64>,
    backend: Box<dyn FourierTransform>,
}
impl Refocus {
    pub fn new(field: ArrayD<Complex64>, config: &RefocusConfig) -> Result<Self> {
        let rank = field.ndim();
        if !(1..=2).contains(&rank) {
            return Err(Error::Dimensionality(rank));
        }
        if field.is_empty() {
            return Err(Error::EmptyField);
        }
        let mut backend = config.backend.create();
        let padded = if config.padding {
            pad_add(&field, None, BORDER_WIDTH)?
        } else {
            field.clone()
        };
        log::debug!(
            "refocus session: field {:?}, transform {:?}, {} kernel",
            field.shape(),
            padded.shape(),
            config.kernel
        );
        let fft_origin = backend.init_transform(padded);
        Ok(Self {
            origin: field,
            optics: config.optics(),
            distance: config.distance,
            kernel: config.kernel,
            padding: config.padding,
            fft_origin,
            backend,
        })
    }
    /// The field the session was built from
    pub fn origin(&self) -> &ArrayD<Complex64> {
        &self.origin
    }
    /// Shape of the refocused fields
    pub fn field_shape(&self) -> &[usize] {
        self.origin.shape()
    }
    /// Shape of the transformed (padded) field
    pub fn shape(&self) -> &[usize] {
        self.fft_origin.shape()
    }
    pub fn optics(&self) -> Optics {
        self.optics
    }
    /// Distance of the plane of the original field
    pub fn reference_distance(&self) -> f64 {
        self.distance
    }
    pub fn kernel_model(&self) -> Kernel {
        self.kernel
    }
    pub fn is_padded(&self) -> bool {
        self.padding
    }
    /// Fourier transform of the (padded) original field
    pub fn fft_origin(&self) -> &ArrayD<Complex64> {
        &self.fft_origin
    }
    /// Transfer function from the reference plane to `distance`
    pub fn kernel(&self, distance: f64) -> ArrayD<Complex64> {
        let d = (distance - self.distance) / self.optics.pixel_size;
        self.kernel
            .transfer_function(self.shape(), self.optics.medium_wavenumber(), d)
    }
    /// The field refocused at `distance`
    pub fn propagate(&mut self, distance: f64) -> ArrayD<Complex64> {
        let kernel = self.kernel(distance);
        let shape = self.origin.shape().to_vec();
        let field = self.backend.propagate(&self.fft_origin, &kernel);
        if self.padding {
            field
                .slice_each_axis(|axis| Slice::from(0..shape[axis.axis.index()]))
                .to_owned()
        } else {
            field.to_owned()
        }
    }
    /// Samples `metric` on `num_steps` distances evenly spread over `interval`
    pub fn compute_metric(
        &mut self,
        interval: (f64, f64),
        metric: Metric,
        roi: Option<&Roi>,
        num_steps: usize,
    ) -> Result<SearchGrid> {
        metric.validate(roi, self.field_shape())?;
        let distances = linspace(interval.0, interval.1, num_steps);
        let values = distances
            .iter()
            .map(|&d| metric.evaluate(self, d, roi))
            .collect::<Result<Vec<f64>>>()?;
        Ok(SearchGrid { distances, values })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pad::PadError;
    use ndarray::{Array1, Array2, IxDyn};
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn max_diff(a: &ArrayD<Complex64>, b: &ArrayD<Complex64>) -> f64 {
        a.iter()
            .zip(b.iter())
            .map(|(a, b)| (a - b).norm())
            .fold(0., f64::max)
    }

    fn test_field() -> ArrayD<Complex64> {
        Array1::linspace(0.1f64, 0.5, 256)
            .mapv(|x| Complex64::cis(x))
            .into_shape((16, 16))
            .unwrap()
            .into_dyn()
    }

    #[test]
    fn rejects_bad_fields() {
        let config = RefocusConfig::new(1., 1.);
        let cube = ArrayD::<Complex64>::zeros(IxDyn(&[2, 2, 2]));
        assert!(matches!(config.build(cube), Err(Error::Dimensionality(3))));
        let empty = ArrayD::<Complex64>::zeros(IxDyn(&[0, 4]));
        assert!(matches!(config.build(empty), Err(Error::EmptyField)));
        assert!(matches!(
            Error::from(PadError::Empty),
            Error::Pad(PadError::Empty)
        ));
    }

    #[test]
    fn zero_distance_without_padding() {
        let field = test_field();
        let mut rf = RefocusConfig::new(8.25, 1.)
            .medium_index(1.533)
            .padding(false)
            .build(field.clone())
            .unwrap();
        assert_eq!(rf.shape(), &[16, 16]);
        let back = rf.propagate(0.);
        let twice = rf.propagate(0.);
        assert!(max_diff(&back, &twice) < 1e-15);
        // at d = 0 the kernel only removes evanescent waves, so it is idempotent
        let mut again = RefocusConfig::new(8.25, 1.)
            .medium_index(1.533)
            .padding(false)
            .build(back.clone())
            .unwrap();
        assert!(max_diff(&again.propagate(0.), &back) < 1e-12);
    }

    #[test]
    fn padded_shape() {
        let rf = RefocusConfig::new(8.25, 1.).build(test_field()).unwrap();
        assert_eq!(rf.shape(), &[32, 32]);
        assert_eq!(rf.field_shape(), &[16, 16]);
    }

    #[test]
    fn forth_and_back() {
        let mut rng = StdRng::seed_from_u64(5);
        let field = Array2::from_shape_fn((24, 20), |_| {
            Complex64::from_polar(1. + 0.05 * rng.gen::<f64>(), 0.2 * rng.gen::<f64>())
        })
        .into_dyn();
        // below sqrt(2) px every frequency of the grid propagates
        let config = RefocusConfig::new(1.2, 1.).medium_index(1.).padding(false);
        let mut rf = config.build(field.clone()).unwrap();
        let forth = rf.propagate(3.);
        let mut rb = config.clone().distance(3.).build(forth).unwrap();
        let back = rb.propagate(0.);
        assert!(max_diff(&back, &field) < 1e-10);
    }

    #[test]
    fn reference_distance_and_pixel_size() {
        let field = test_field();
        let mut a = RefocusConfig::new(8.25, 1.)
            .medium_index(1.533)
            .build(field.clone())
            .unwrap();
        // same propagation expressed in other units and from another plane
        let mut b = RefocusConfig::new(8.25e-6, 1e-6)
            .medium_index(1.533)
            .distance(2e-6)
            .build(field)
            .unwrap();
        assert!(max_diff(&a.propagate(5.), &b.propagate(7e-6)) < 1e-9);
    }

    #[test]
    fn backends_agree() {
        let config = RefocusConfig::new(8.25, 1.).kernel(Kernel::Fresnel);
        let mut plain = config
            .clone()
            .backend(Backend::Plain)
            .build(test_field())
            .unwrap();
        let mut planned = config
            .backend(Backend::Planned)
            .build(test_field())
            .unwrap();
        for d in [-4., 0.5, 7.] {
            assert!(max_diff(&plain.propagate(d), &planned.propagate(d)) < 1e-12);
        }
    }

    #[test]
    fn one_dimensional_field() {
        let field = Array1::linspace(0f64, 1., 50)
            .mapv(|x| Complex64::from_polar(1. + 0.1 * x, x))
            .into_dyn();
        let mut rf = RefocusConfig::new(3., 1.).build(field).unwrap();
        assert_eq!(rf.shape(), &[100]);
        assert_eq!(rf.propagate(2.).shape(), &[50]);
    }

    #[test]
    fn metric_grid() {
        let mut rf = RefocusConfig::new(8.25, 1.)
            .medium_index(1.533)
            .build(test_field())
            .unwrap();
        let grid = rf
            .compute_metric((-5., 5.), Metric::AverageGradient, None, 11)
            .unwrap();
        assert_eq!(grid.len(), 11);
        assert_eq!(grid.distances[10], 5.);
        let direct = Metric::AverageGradient.evaluate(&mut rf, 1., None).unwrap();
        assert_eq!(grid.values[6], direct);
        let roi = Roi::Line(crate::roi::Span::range(0, 4));
        assert!(matches!(
            rf.compute_metric((-5., 5.), Metric::AverageGradient, Some(&roi), 11),
            Err(Error::Roi(_))
        ));
    }

    #[test]
    fn config_from_json() {
        let config: RefocusConfig =
            serde_json::from_str(r#"{"wavelength": 5e-7, "pixel_size": 1e-7, "kernel": "fresnel"}"#)
                .unwrap();
        assert_eq!(
            config,
            RefocusConfig::new(5e-7, 1e-7).kernel(Kernel::Fresnel)
        );
    }
}

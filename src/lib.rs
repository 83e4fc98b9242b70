/*!
# refocus

Numerical refocusing of complex optical wavefields (1D or 2D) and
autofocusing by minimization of a focus metric over the propagation
distance.

A [`Refocus`] session is built from a field and its optics with
[`RefocusConfig`]. The field is padded ([`pad`]) and Fourier transformed
once ([`fft`]), then it can be propagated ([`Refocus::propagate`]) to any
distance with one of the [`Kernel`]s, or autofocused
([`Refocus::autofocus`]) with one of the [`Metric`]s and [`Minimizer`]s,
optionally within a region of interest ([`Roi`]).

The [`stack`] module has the pixel unit API and processes stacks of fields
on a pool of workers.

```
use ndarray::Array1;
use num_complex::Complex64;
use refocus::{Kernel, RefocusConfig};

let field = Array1::linspace(0f64, 1., 64)
    .mapv(|x| Complex64::from_polar(1., x * x))
    .into_dyn();
let mut rf = RefocusConfig::new(0.633, 0.1)
    .kernel(Kernel::Fresnel)
    .padding(false)
    .build(field.clone())
    .unwrap();
let same = rf
    .propagate(0.)
    .iter()
    .zip(&field)
    .all(|(a, b)| (a - b).norm() < 1e-12);
assert!(same);
```
*/

pub mod autofocus;
pub mod config;
mod error;
pub mod fft;
pub mod io;
pub mod kernel;
pub mod metrics;
pub mod minimize;
pub mod pad;
mod refocus;
pub mod roi;
pub mod stack;

pub use autofocus::{Autofocus, AutofocusConfig};
pub use config::Settings;
pub use error::{Error, Result};
pub use fft::Backend;
pub use kernel::{Kernel, Optics};
pub use metrics::Metric;
pub use minimize::{LegacyOptions, LmfitOptions, Minimizer, SearchGrid};
pub use refocus::{Refocus, RefocusConfig};
pub use roi::{parse_roi, parse_roi_strict, Roi, Span};
pub use stack::{autofocus_stack, refocus_stack, refocus_stack_in_place, WorkerPool};

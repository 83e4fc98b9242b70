//! Brute force grid and bounded Levenberg-Marquardt refinement

use std::cell::RefCell;

use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt, TerminationReason};
use nalgebra::{storage::Owned, Matrix1, Vector1, U1};

use super::{argmin, LmfitOptions, MinimizeError, Minimum, SearchGrid};

/// Maps the unbounded solver parameter onto `[lo, hi]`
///
/// `x = lo + (sin θ + 1)(hi - lo)/2`
#[derive(Debug, Clone, Copy)]
struct Bounds {
    lo: f64,
    hi: f64,
}
impl Bounds {
    fn external(&self, theta: f64) -> f64 {
        self.lo + (theta.sin() + 1.) * (self.hi - self.lo) / 2.
    }
    fn internal(&self, x: f64) -> f64 {
        (2. * (x - self.lo) / (self.hi - self.lo) - 1.)
            .clamp(-1., 1.)
            .asin()
    }
}

/// The metric as a single residual of the bounded parameter
///
/// The solver only gets shared access to the problem while the objective
/// needs mutable access, hence the cells. The first objective error stops
/// every further evaluation.
struct Focus<F, E> {
    objective: RefCell<F>,
    error: RefCell<Option<E>>,
    theta: f64,
    bounds: Bounds,
    scale: f64,
}
impl<F, E> Focus<F, E>
where
    F: FnMut(f64) -> Result<f64, E>,
{
    fn distance(&self, theta: f64) -> f64 {
        self.bounds.external(theta) * self.scale
    }
    fn eval(&self, theta: f64) -> Option<f64> {
        if self.error.borrow().is_some() {
            return None;
        }
        let mut objective = self.objective.borrow_mut();
        match (*objective)(self.distance(theta)) {
            Ok(value) => Some(value),
            Err(e) => {
                self.error.replace(Some(e));
                None
            }
        }
    }
}
impl<F, E> LeastSquaresProblem<f64, U1, U1> for Focus<F, E>
where
    F: FnMut(f64) -> Result<f64, E>,
{
    type ResidualStorage = Owned<f64, U1>;
    type JacobianStorage = Owned<f64, U1, U1>;
    type ParameterStorage = Owned<f64, U1>;

    fn set_params(&mut self, x: &Vector1<f64>) {
        self.theta = x[0];
    }
    fn params(&self) -> Vector1<f64> {
        Vector1::new(self.theta)
    }
    fn residuals(&self) -> Option<Vector1<f64>> {
        self.eval(self.theta).map(Vector1::new)
    }
    fn jacobian(&self) -> Option<Matrix1<f64>> {
        let h = 1e-6 * self.theta.abs().max(1.);
        let forward = self.eval(self.theta + h)?;
        let backward = self.eval(self.theta - h)?;
        Some(Matrix1::new((forward - backward) / (2. * h)))
    }
}

/// Brute force and Levenberg-Marquardt minimization
///
/// Distances are normalized by `scale` (the wavelength). An interval wider
/// than the brute force step is first sampled with that step and the best
/// sample seeds the refinement, otherwise the refinement starts from the
/// middle of the interval. The refinement is bounded to the local window
/// around the seed, clipped to the interval. The returned grid is the brute
/// force grid, empty when it was skipped.
pub fn minimize<F, E>(
    mut objective: F,
    interval: (f64, f64),
    scale: f64,
    options: &LmfitOptions,
) -> Result<Minimum, E>
where
    F: FnMut(f64) -> Result<f64, E>,
    E: From<MinimizeError>,
{
    let LmfitOptions {
        brute_step,
        local_window,
        patience,
    } = *options;
    if !(brute_step > 0.) || !(local_window > 0.) || patience == 0 {
        return Err(MinimizeError::InvalidOption(format!("{options:?}")).into());
    }
    if !(scale > 0.) || !scale.is_finite() {
        return Err(
            MinimizeError::InvalidOption(format!("scale must be positive, got {scale}")).into(),
        );
    }
    let (lo, hi) = if interval.0 > interval.1 {
        (interval.1 / scale, interval.0 / scale)
    } else {
        (interval.0 / scale, interval.1 / scale)
    };

    let mut grid = SearchGrid::default();
    let start = if hi - lo > brute_step {
        let samples: Vec<f64> = (0..)
            .map(|k| lo + k as f64 * brute_step)
            .take_while(|x| *x < hi)
            .collect();
        for x in samples {
            let distance = x * scale;
            grid.values.push(objective(distance)?);
            grid.distances.push(distance);
        }
        let best = argmin(&grid.values);
        log::debug!(
            "brute force search: {} samples, minimum {} at {}",
            grid.len(),
            grid.values[best],
            grid.distances[best]
        );
        grid.distances[best] / scale
    } else {
        (lo + hi) / 2.
    };

    let bounds = Bounds {
        lo: lo.max(start - local_window),
        hi: hi.min(start + local_window),
    };
    if !(bounds.hi > bounds.lo) {
        return Ok(Minimum {
            distance: start * scale,
            grid,
        });
    }
    let problem = Focus {
        objective: RefCell::new(objective),
        error: RefCell::new(None),
        theta: bounds.internal(start),
        bounds,
        scale,
    };
    let (problem, report) = LevenbergMarquardt::new()
        .with_patience(patience)
        .minimize(problem);
    let distance = problem.distance(problem.theta);
    if let Some(e) = problem.error.into_inner() {
        return Err(e);
    }
    log::debug!(
        "Levenberg-Marquardt: {:?} after {} evaluations, minimum {} at {distance}",
        report.termination,
        report.number_of_evaluations,
        report.objective_function
    );
    match report.termination {
        TerminationReason::LostPatience | TerminationReason::Numerical(_) => {
            Err(MinimizeError::NotConverged {
                iterations: report.number_of_evaluations,
                distance,
            }
            .into())
        }
        _ => Ok(Minimum { distance, grid }),
    }
}

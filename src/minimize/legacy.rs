//! Coarse to fine grid search

use super::{argmin, linspace, LegacyOptions, MinimizeError, Minimum, SearchGrid};

/// Number of samples of every fine grid
pub const FINE_SAMPLES: usize = 10;

/// Moves the grid by one step away from the edge holding the minimum
///
/// Returns the index of the minimum within the moved grid, which always has
/// a neighbor on both sides.
fn shift_edges(grid: &mut [f64], mut index: usize) -> usize {
    let step = grid[1] - grid[0];
    if index == 0 {
        grid.iter_mut().for_each(|z| *z -= step);
        index += 1;
    }
    if index == grid.len() - 1 {
        grid.iter_mut().for_each(|z| *z += step);
        index -= 1;
    }
    index
}

/// Grid search minimization
///
/// The coarse grid samples `interval` with `100 / coarse_accuracy` points.
/// Each fine pass resamples the neighborhood of the current minimum with
/// [`FINE_SAMPLES`] points, until the minimum of a pass lies within
/// `100 * fine_accuracy` of the coarse minimum. A minimum on the edge of a grid
/// shifts that grid outwards by one step, so the result may lie slightly
/// outside of `interval`.
pub fn minimize<F, E>(
    mut objective: F,
    interval: (f64, f64),
    options: &LegacyOptions,
) -> Result<Minimum, E>
where
    F: FnMut(f64) -> Result<f64, E>,
    E: From<MinimizeError>,
{
    log::warn!(
        "the legacy minimizer is deprecated, it is slower and less accurate than lmfit; \
         only use it to reproduce previous results"
    );
    let LegacyOptions {
        coarse_accuracy,
        fine_accuracy,
        max_iterations,
    } = *options;
    let n = 100. / coarse_accuracy;
    if !(n >= 3.) || !n.is_finite() {
        return Err(MinimizeError::InvalidOption(format!(
            "coarse accuracy {coarse_accuracy} gives less than 3 coarse samples"
        ))
        .into());
    }
    if !(fine_accuracy > 0.) {
        return Err(MinimizeError::InvalidOption(format!(
            "fine accuracy must be positive, got {fine_accuracy}"
        ))
        .into());
    }
    let (lo, hi) = if interval.0 > interval.1 {
        (interval.1, interval.0)
    } else {
        interval
    };

    let mut coarse = linspace(lo, hi, n as usize);
    let values = coarse
        .iter()
        .map(|&z| objective(z))
        .collect::<Result<Vec<f64>, E>>()?;
    let mut index = shift_edges(&mut coarse, argmin(&values));
    let reference = values[index];
    log::debug!(
        "legacy coarse search: {} samples, minimum {reference} at {}",
        coarse.len(),
        coarse[index]
    );
    let grid = SearchGrid {
        distances: coarse.clone(),
        values,
    };

    let mut fine = coarse;
    for iteration in 1..=max_iterations {
        fine = linspace(fine[index - 1], fine[index + 1], FINE_SAMPLES);
        let values = fine
            .iter()
            .map(|&z| objective(z))
            .collect::<Result<Vec<f64>, E>>()?;
        let best = argmin(&values);
        index = shift_edges(&mut fine, best);
        let current = values[index];
        log::trace!("legacy fine pass #{iteration}: {current} at {}", fine[index]);
        // every pass is compared with the coarse minimum
        if (reference - current).abs() / 100. < fine_accuracy {
            let distance = fine[best];
            log::debug!("legacy minimizer converged in {iteration} passes: {distance}");
            return Ok(Minimum { distance, grid });
        }
    }
    Err(MinimizeError::NotConverged {
        iterations: max_iterations,
        distance: fine[index],
    }
    .into())
}

/*!
# Pixel unit API and field stacks

Convenience functions with distances and wavelength in pixels (the pixel
size is set to 1) and their batch counterparts for stacks of fields sharing
the same shape.

Stacks are processed on a dedicated [`WorkerPool`]: each field is an
independent session run by a single worker, results come back in the order
of the stack. There is no timeout, a session that never returns stalls the
whole batch.
*/

use indicatif::{ParallelProgressIterator, ProgressBar};
use ndarray::ArrayD;
use num_complex::Complex64;
use rayon::prelude::*;

use crate::{AutofocusConfig, Error, Kernel, RefocusConfig, Result, SearchGrid};

/// Thread pool for stack processing
pub struct WorkerPool {
    pool: rayon::ThreadPool,
    progress: bool,
}
impl WorkerPool {
    /// Creates a pool of `workers` threads, `0` uses every logical CPU
    pub fn new(workers: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("refocus-{i}"))
            .build()?;
        log::debug!("worker pool with {} threads", pool.current_num_threads());
        Ok(Self {
            pool,
            progress: false,
        })
    }
    /// Displays a progress bar while a stack is processed
    pub fn progress(self, progress: bool) -> Self {
        Self { progress, ..self }
    }
    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }
    fn bar(&self, len: usize) -> ProgressBar {
        if self.progress {
            ProgressBar::new(len as u64)
        } else {
            ProgressBar::hidden()
        }
    }
    /// Applies `op` to every item, preserving the order of `items`
    pub fn map<T, R, F>(&self, items: &[T], op: F) -> Result<Vec<R>>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> Result<R> + Sync + Send,
    {
        let bar = self.bar(items.len());
        self.pool
            .install(|| items.par_iter().progress_with(bar).map(op).collect())
    }
    /// Replaces every item by the outcome of `op`
    pub fn map_in_place<T, F>(&self, items: &mut [T], op: F) -> Result<()>
    where
        T: Send,
        F: Fn(&T) -> Result<T> + Sync + Send,
    {
        let bar = self.bar(items.len());
        self.pool.install(|| {
            items
                .par_iter_mut()
                .progress_with(bar)
                .try_for_each(|item| {
                    *item = op(&*item)?;
                    Ok(())
                })
        })
    }
}

/// Session in pixel units
fn config(medium_index: f64, wavelength_px: f64, kernel: Kernel, padding: bool) -> RefocusConfig {
    RefocusConfig::new(wavelength_px, 1.)
        .medium_index(medium_index)
        .kernel(kernel)
        .padding(padding)
}

fn check_stack(fields: &[ArrayD<Complex64>]) -> Result<()> {
    if let Some(first) = fields.first() {
        if let Some(other) = fields.iter().find(|f| f.shape() != first.shape()) {
            return Err(Error::StackShape(
                first.shape().to_vec(),
                other.shape().to_vec(),
            ));
        }
    }
    Ok(())
}

/// Refocuses `field` by `distance` pixels
pub fn refocus(
    field: ArrayD<Complex64>,
    distance: f64,
    medium_index: f64,
    wavelength_px: f64,
    kernel: Kernel,
    padding: bool,
) -> Result<ArrayD<Complex64>> {
    let mut rf = config(medium_index, wavelength_px, kernel, padding).build(field)?;
    Ok(rf.propagate(distance))
}

/// Best focus distance (pixels), refocused field and search grid
///
/// The search interval of `settings` is given in pixels and the kernel is
/// the Helmholtz kernel. The field is always returned, the grid only with
/// `settings.return_grid`.
pub fn autofocus(
    field: ArrayD<Complex64>,
    medium_index: f64,
    wavelength_px: f64,
    padding: bool,
    settings: &AutofocusConfig,
) -> Result<(f64, ArrayD<Complex64>, Option<SearchGrid>)> {
    let mut rf = config(medium_index, wavelength_px, Kernel::Helmholtz, padding).build(field)?;
    let af = rf.autofocus(&settings.clone().return_field(true))?;
    let field = match af.field {
        Some(field) => field,
        None => rf.propagate(af.distance),
    };
    Ok((af.distance, field, af.grid))
}

/// Refocuses every field of the stack by `distance` pixels
pub fn refocus_stack(
    pool: &WorkerPool,
    fields: &[ArrayD<Complex64>],
    distance: f64,
    medium_index: f64,
    wavelength_px: f64,
    kernel: Kernel,
    padding: bool,
) -> Result<Vec<ArrayD<Complex64>>> {
    check_stack(fields)?;
    log::info!("refocusing {} fields by {distance} px", fields.len());
    pool.map(fields, |field| {
        refocus(
            field.clone(),
            distance,
            medium_index,
            wavelength_px,
            kernel,
            padding,
        )
    })
}

/// Same as [`refocus_stack`] but overwrites the fields of the stack
pub fn refocus_stack_in_place(
    pool: &WorkerPool,
    fields: &mut [ArrayD<Complex64>],
    distance: f64,
    medium_index: f64,
    wavelength_px: f64,
    kernel: Kernel,
    padding: bool,
) -> Result<()> {
    check_stack(fields)?;
    log::info!("refocusing {} fields in place by {distance} px", fields.len());
    let config = config(medium_index, wavelength_px, kernel, padding);
    pool.map_in_place(fields, |field| {
        let mut rf = config.build(field.clone())?;
        Ok(rf.propagate(distance))
    })
}

/// Autofocus outcome of a stack
#[derive(Debug, Clone, PartialEq)]
pub struct StackFocus {
    /// Best focus distance of each field (pixels)
    pub distances: Vec<f64>,
    /// Average of `distances` when all fields are refocused to the same distance
    pub common: Option<f64>,
    /// Refocused fields
    pub fields: Vec<ArrayD<Complex64>>,
    /// Search grid of each field, with `return_grid`
    pub grids: Vec<Option<SearchGrid>>,
}

/// Autofocuses every field of the stack
///
/// With `same_dist`, every original field is refocused to the average of
/// the individual best focus distances.
pub fn autofocus_stack(
    pool: &WorkerPool,
    fields: &[ArrayD<Complex64>],
    medium_index: f64,
    wavelength_px: f64,
    padding: bool,
    settings: &AutofocusConfig,
    same_dist: bool,
) -> Result<StackFocus> {
    check_stack(fields)?;
    log::info!("autofocusing {} fields", fields.len());
    let results = pool.map(fields, |field| {
        autofocus(field.clone(), medium_index, wavelength_px, padding, settings)
    })?;
    let mut distances = Vec::with_capacity(results.len());
    let mut refocused = Vec::with_capacity(results.len());
    let mut grids = Vec::with_capacity(results.len());
    for (distance, field, grid) in results {
        distances.push(distance);
        refocused.push(field);
        grids.push(grid);
    }
    if !same_dist {
        return Ok(StackFocus {
            distances,
            common: None,
            fields: refocused,
            grids,
        });
    }
    if distances.is_empty() {
        return Err(Error::EmptyStack);
    }
    let average = distances.iter().sum::<f64>() / distances.len() as f64;
    log::info!("refocusing the stack to the average distance {average} px");
    let fields = refocus_stack(
        pool,
        fields,
        average,
        medium_index,
        wavelength_px,
        Kernel::Helmholtz,
        padding,
    )?;
    Ok(StackFocus {
        distances,
        common: Some(average),
        fields,
        grids,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn stack(n: usize) -> Vec<ArrayD<Complex64>> {
        (0..n)
            .map(|k| {
                Array2::from_shape_fn((12, 10), |(i, j)| {
                    Complex64::from_polar(1. + 0.05 * ((i * j + k) as f64).sin(), 0.02 * (i + k) as f64)
                })
                .into_dyn()
            })
            .collect()
    }

    #[test]
    fn pool_preserves_order() {
        let pool = WorkerPool::new(3).unwrap();
        assert_eq!(pool.workers(), 3);
        let items: Vec<usize> = (0..50).collect();
        let squares = pool.map(&items, |&i| Ok(i * i)).unwrap();
        assert_eq!(squares, items.iter().map(|i| i * i).collect::<Vec<_>>());
        let mut items = items;
        pool.map_in_place(&mut items, |&i| Ok(i + 1)).unwrap();
        assert_eq!(items[49], 50);
    }

    #[test]
    fn pool_reports_errors() {
        let pool = WorkerPool::new(2).unwrap();
        let items: Vec<usize> = (0..8).collect();
        let result = pool.map(&items, |&i| {
            if i == 5 {
                Err(Error::EmptyField)
            } else {
                Ok(i)
            }
        });
        assert!(matches!(result, Err(Error::EmptyField)));
    }

    #[test]
    fn stack_matches_single_fields() {
        let pool = WorkerPool::new(2).unwrap();
        let fields = stack(4);
        let refocused =
            refocus_stack(&pool, &fields, 2.5, 1.333, 4., Kernel::Fresnel, true).unwrap();
        for (field, stacked) in fields.iter().zip(&refocused) {
            let single = refocus(field.clone(), 2.5, 1.333, 4., Kernel::Fresnel, true).unwrap();
            assert_eq!(&single, stacked);
        }
        let mut in_place = fields.clone();
        refocus_stack_in_place(&pool, &mut in_place, 2.5, 1.333, 4., Kernel::Fresnel, true)
            .unwrap();
        assert_eq!(in_place, refocused);
    }

    #[test]
    fn stack_shapes_must_agree() {
        let pool = WorkerPool::new(1).unwrap();
        let mut fields = stack(2);
        fields.push(ArrayD::from_elem(ndarray::IxDyn(&[4, 4]), Complex64::new(1., 0.)));
        assert!(matches!(
            refocus_stack(&pool, &fields, 1., 1., 3., Kernel::Helmholtz, false),
            Err(Error::StackShape(a, b)) if a == vec![12, 10] && b == vec![4, 4]
        ));
    }

    #[test]
    fn stack_grids_on_request() {
        let pool = WorkerPool::new(2).unwrap();
        let fields = stack(3);
        let config = AutofocusConfig::new((-2., 2.)).minimizer(crate::Minimizer::Legacy);
        let focus = autofocus_stack(&pool, &fields, 1.333, 4., false, &config, false).unwrap();
        assert!(focus.grids.iter().all(Option::is_none));
        let focus =
            autofocus_stack(&pool, &fields, 1.333, 4., false, &config.return_grid(true), true)
                .unwrap();
        assert_eq!(focus.grids.len(), 3);
        for (grid, distance) in focus.grids.iter().zip(&focus.distances) {
            let grid = grid.as_ref().unwrap();
            assert_eq!(grid.len(), 100);
            let (best, _) = grid.minimum().unwrap();
            // the search stays within a few coarse steps of the grid minimum
            assert!((best - distance).abs() < 3. * 4. / 99., "{best} {distance}");
        }
    }

    #[test]
    fn empty_stack() {
        let pool = WorkerPool::new(1).unwrap();
        let config = AutofocusConfig::new((-1., 1.));
        let focus = autofocus_stack(&pool, &[], 1.333, 3., true, &config, false).unwrap();
        assert!(focus.distances.is_empty() && focus.fields.is_empty() && focus.grids.is_empty());
        assert!(matches!(
            autofocus_stack(&pool, &[], 1.333, 3., true, &config, true),
            Err(Error::EmptyStack)
        ));
    }
}

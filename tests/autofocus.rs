use ndarray::{Array1, ArrayD};
use num_complex::Complex64;
use refocus::{
    stack::{self, StackFocus},
    AutofocusConfig, Kernel, Metric, Minimizer, RefocusConfig, WorkerPool,
};

/// `exp(i linspace(0.1, 0.5, n^rank))` split into fields of `n x n`
fn phase_ramp(n_fields: usize, n: usize) -> Vec<ArrayD<Complex64>> {
    let samples = Array1::linspace(0.1f64, 0.5, n_fields * n * n).mapv(Complex64::cis);
    samples
        .into_shape((n_fields, n, n))
        .unwrap()
        .outer_iter()
        .map(|field| field.to_owned().into_dyn())
        .collect()
}

fn max_phase_and_amplitude_error(a: &ArrayD<Complex64>, b: &ArrayD<Complex64>) -> (f64, f64) {
    a.iter()
        .zip(b.iter())
        .map(|(a, b)| {
            let ratio = a / b;
            (ratio.arg().abs(), (ratio.norm() - 1.).abs())
        })
        .fold((0., 0.), |(p, m), (dp, dm)| (p.max(dp), m.max(dm)))
}

fn max_diff(a: &ArrayD<Complex64>, b: &ArrayD<Complex64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(a, b)| (a - b).norm())
        .fold(0., f64::max)
}

const NM: f64 = 1.533;
const RES: f64 = 8.25;

fn refocused_ramp(distance: f64, padding: bool) -> ArrayD<Complex64> {
    let field = phase_ramp(1, 16).remove(0);
    stack::refocus(field, distance, NM, RES, Kernel::Helmholtz, padding).unwrap()
}

#[test]
fn legacy_autofocus_recovers_distance() {
    let d = 5.;
    let rfield = refocused_ramp(d, true);
    let config = AutofocusConfig::new((-1.5 * d, -0.5 * d))
        .metric(Metric::AverageGradient)
        .minimizer(Minimizer::Legacy);
    let (distance, nfield, grid) =
        stack::autofocus(rfield.clone(), NM, RES, true, &config).unwrap();
    assert_eq!(grid, None);
    assert!(
        (distance + 3.263187429854096).abs() < 1e-3,
        "distance: {distance}"
    );
    let (phase, amplitude) = max_phase_and_amplitude_error(&nfield, &rfield);
    assert!(phase < 0.047, "phase error: {phase}");
    assert!(amplitude < 0.081, "amplitude error: {amplitude}");
}

#[test]
fn lmfit_autofocus_recovers_distance() {
    let d = 5.;
    let rfield = refocused_ramp(d, true);
    let config = AutofocusConfig::new((-1.5 * d, -0.5 * d));
    let (distance, nfield, _) = stack::autofocus(rfield.clone(), NM, RES, true, &config).unwrap();
    // within 5% of the legacy result
    assert!((distance + 3.26).abs() < 0.163, "distance: {distance}");
    let (phase, amplitude) = max_phase_and_amplitude_error(&nfield, &rfield);
    assert!(phase < 0.047, "phase error: {phase}");
    assert!(amplitude < 0.081, "amplitude error: {amplitude}");
}

#[test]
fn zero_distance_is_exact_without_padding() {
    let rfield = refocused_ramp(0., false);
    for minimizer in [Minimizer::Lmfit, Minimizer::Legacy] {
        let config = AutofocusConfig::new((0., 0.)).minimizer(minimizer);
        let (distance, nfield, _) =
            stack::autofocus(rfield.clone(), NM, RES, false, &config).unwrap();
        assert_eq!(distance, 0.);
        assert!(max_diff(&nfield, &rfield) < 1e-12);
    }
}

#[test]
fn session_autofocus_in_physical_units() {
    // same problem with a wavelength of 825 nm and 100 nm pixels
    let rfield = refocused_ramp(5., true);
    let mut rf = RefocusConfig::new(825e-9, 100e-9)
        .medium_index(NM)
        .build(rfield)
        .unwrap();
    let af = rf
        .autofocus(
            &AutofocusConfig::new((-750e-9, -250e-9))
                .minimizer(Minimizer::Legacy)
                .return_grid(true),
        )
        .unwrap();
    assert!((af.distance + 326.3187429854096e-9).abs() < 1e-10);
    let grid = af.grid.unwrap();
    assert_eq!(grid.len(), 100);
    let (best, _) = grid.minimum().unwrap();
    assert!((best - af.distance).abs() < 1e-8);
}

fn stack_focus(padding: bool, same_dist: bool) -> (Vec<ArrayD<Complex64>>, StackFocus) {
    let (d, nm, res) = (5.5, 1.5133, 6.25);
    let pool = WorkerPool::new(4).unwrap();
    let fields = phase_ramp(10, 10);
    let rstack = stack::refocus_stack(&pool, &fields, d, nm, res, Kernel::Helmholtz, true).unwrap();
    let config = AutofocusConfig::new((-1.5 * d, -0.5 * d)).minimizer(Minimizer::Legacy);
    let focus =
        stack::autofocus_stack(&pool, &rstack, nm, res, padding, &config, same_dist).unwrap();
    (rstack, focus)
}

#[test]
fn stack_same_distance_without_padding() {
    let (_, focus) = stack_focus(false, false);
    let (_, same) = stack_focus(false, true);
    let mean = focus.distances.iter().sum::<f64>() / focus.distances.len() as f64;
    assert!((mean + 4.867283950617284).abs() < 1e-3, "mean: {mean}");
    assert!(focus.distances.iter().all(|d| (d - mean).abs() < 1e-9));
    assert_eq!(focus.common, None);
    assert_eq!(same.distances, focus.distances);
    let common = same.common.unwrap();
    assert!((common - mean).abs() < 1e-12);
    for (a, b) in focus.fields.iter().zip(&same.fields) {
        assert!(max_diff(a, b) < 5.24e-4);
    }
}

#[test]
fn stack_same_distance_with_padding() {
    let (rstack, focus) = stack_focus(true, false);
    let (_, same) = stack_focus(true, true);
    let mean = focus.distances.iter().sum::<f64>() / focus.distances.len() as f64;
    assert!((mean + 4.8240740740740735).abs() < 1e-3, "mean: {mean}");
    for (a, b) in rstack.iter().zip(&focus.fields) {
        assert!(max_diff(a, b) < 0.013 * 2f64.sqrt());
    }
    // every field refocused individually at the common distance
    let common = same.common.unwrap();
    for (field, stacked) in rstack.iter().zip(&same.fields) {
        let single = stack::refocus(field.clone(), common, 1.5133, 6.25, Kernel::Helmholtz, true)
            .unwrap();
        assert!(max_diff(&single, stacked) < 1e-12);
    }
    for (a, b) in focus.fields.iter().zip(&same.fields) {
        assert!(max_diff(a, b) < 1e-6);
    }
}

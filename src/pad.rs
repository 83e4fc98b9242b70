/*!
# Linear-ramp padding

FFT based propagation treats the field as periodic, so the opposite edges of
the field leak into each other. [`pad_add`] extends every axis with a linear
ramp going from the edge samples to an average value of the field boundary,
which smooths the periodic wraparound. Pads are only appended: the original
samples stay at the front of each axis, contiguous, and [`pad_rem`] recovers
them bit for bit by truncation.
*/

use std::ops::{Add, Div, Mul, Sub};

use ndarray::{ArrayD, ArrayViewD, Axis, IxDyn, Slice, Zip};
use num_complex::Complex64;

/// Default thickness of the boundary band used for the pad value
pub const BORDER_WIDTH: usize = 10;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PadError {
    #[error("only 1D and 2D arrays can be padded, got {0} dimensions")]
    Dimensionality(usize),
    #[error("size has {size} entries but the array has {rank} dimensions")]
    SizeMismatch { rank: usize, size: usize },
    #[error("axis {axis}: can only pad when the new size ({to}) is larger than the old size ({from})")]
    NotLarger { axis: usize, from: usize, to: usize },
    #[error("axis {axis} has uneven length {len}, specify the unpadded size")]
    OddSize { axis: usize, len: usize },
    #[error("axis {axis}: cannot truncate length {len} to {size}")]
    Truncate { axis: usize, len: usize, size: usize },
    #[error("cannot pad an empty array")]
    Empty,
}
type Result<T> = std::result::Result<T, PadError>;

/// Element types that can be padded
///
/// The pad value is derived from the boundary band of the original array:
/// the arithmetic mean for real data, and for complex data the mean magnitude
/// recombined with the mean phase.
pub trait PadElement:
    Copy
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<f64, Output = Self>
    + Div<f64, Output = Self>
{
    fn border_value<'a, I>(border: I) -> Self
    where
        I: Iterator<Item = &'a Self>,
        Self: 'a;
}
impl PadElement for f64 {
    fn border_value<'a, I>(border: I) -> Self
    where
        I: Iterator<Item = &'a Self>,
    {
        let (sum, n) = border.fold((0f64, 0usize), |(s, n), x| (s + x, n + 1));
        sum / n as f64
    }
}
impl PadElement for Complex64 {
    fn border_value<'a, I>(border: I) -> Self
    where
        I: Iterator<Item = &'a Self>,
    {
        let (abs, arg, n) = border.fold((0f64, 0f64, 0usize), |(a, p, n), x| {
            (a + x.norm(), p + x.arg(), n + 1)
        });
        let n = n as f64;
        Complex64::from_polar(abs / n, arg / n)
    }
}

/// Splits a padding deficit into `(left, right)`
///
/// The even part goes to the left and the odd remainder to the right.
pub fn split_pad(small: usize, large: usize) -> (usize, usize) {
    let pad = large - small;
    let left = pad / 2;
    (left, pad - left)
}

/// Pads `field` with linear ramps towards the boundary average
///
/// `size` is the padded shape (defaults to twice the original shape) and
/// `border_width` the thickness of the boundary band the pad value is
/// averaged over.
pub fn pad_add<T: PadElement>(
    field: &ArrayD<T>,
    size: Option<&[usize]>,
    border_width: usize,
) -> Result<ArrayD<T>> {
    let rank = field.ndim();
    if !(1..=2).contains(&rank) {
        return Err(PadError::Dimensionality(rank));
    }
    if field.is_empty() {
        return Err(PadError::Empty);
    }
    let size: Vec<usize> = match size {
        Some(size) if size.len() != rank => {
            return Err(PadError::SizeMismatch {
                rank,
                size: size.len(),
            })
        }
        Some(size) => size.to_vec(),
        None => field.shape().iter().map(|n| 2 * n).collect(),
    };
    let widths = field
        .shape()
        .iter()
        .zip(&size)
        .enumerate()
        .map(|(axis, (&from, &to))| {
            if to > from {
                Ok(split_pad(from, to))
            } else {
                Err(PadError::NotLarger { axis, from, to })
            }
        })
        .collect::<Result<Vec<_>>>()?;

    let pad_value = T::border_value(border(field, border_width));
    let mut padded = field.clone();
    for (axis, &width) in widths.iter().enumerate() {
        padded = pad_axis(&padded.view(), axis, width, pad_value);
    }
    Ok(padded)
}

/// Removes the padding appended by [`pad_add`]
///
/// `size` defaults to half the padded shape, which requires every axis of
/// `padded` to have an even length.
pub fn pad_rem<T: Clone>(padded: &ArrayD<T>, size: Option<&[usize]>) -> Result<ArrayD<T>> {
    Ok(pad_rem_view(&padded.view(), size)?.to_owned())
}

fn pad_rem_view<'a, T>(
    padded: &ArrayViewD<'a, T>,
    size: Option<&[usize]>,
) -> Result<ArrayViewD<'a, T>> {
    let rank = padded.ndim();
    if !(1..=2).contains(&rank) {
        return Err(PadError::Dimensionality(rank));
    }
    let size: Vec<usize> = match size {
        Some(size) if size.len() != rank => {
            return Err(PadError::SizeMismatch {
                rank,
                size: size.len(),
            })
        }
        Some(size) => size.to_vec(),
        None => padded
            .shape()
            .iter()
            .enumerate()
            .map(|(axis, &len)| {
                if len % 2 == 0 {
                    Ok(len / 2)
                } else {
                    Err(PadError::OddSize { axis, len })
                }
            })
            .collect::<Result<Vec<_>>>()?,
    };
    let mut view = padded.clone();
    for (axis, &n) in size.iter().enumerate() {
        let len = view.len_of(Axis(axis));
        if n > len {
            return Err(PadError::Truncate { axis, len, size: n });
        }
        view.slice_axis_inplace(Axis(axis), Slice::from(0..n));
    }
    Ok(view)
}

/// Samples within `width` of any edge of `field`
///
/// A zero width selects the whole array.
fn border<T>(field: &ArrayD<T>, width: usize) -> impl Iterator<Item = &T> {
    let shape = field.shape().to_vec();
    field.indexed_iter().filter_map(move |(idx, value)| {
        let inner = width > 0
            && shape
                .iter()
                .enumerate()
                .all(|(axis, &n)| idx[axis] >= width && idx[axis] + width < n);
        (!inner).then_some(value)
    })
}

/// Linear ramp sample `i` out of `num`, going from `start` towards `stop`
fn ramp<T: PadElement>(start: T, stop: T, num: usize, i: usize) -> T {
    (stop - start) / num as f64 * i as f64 + start
}

/// Appends `right` ramp samples then `left` ramp samples along `axis`
///
/// The layout is the one of a symmetric `(left, right)` padding cyclically
/// rolled by `-left`: the data first, then the ramp leaving the last edge,
/// then the ramp coming back to the first edge.
fn pad_axis<T: PadElement>(
    data: &ArrayViewD<T>,
    axis: usize,
    (left, right): (usize, usize),
    pad_value: T,
) -> ArrayD<T> {
    let n = data.len_of(Axis(axis));
    let mut shape = data.shape().to_vec();
    shape[axis] = n + left + right;
    let mut padded = ArrayD::from_elem(IxDyn(&shape), pad_value);
    Zip::from(padded.lanes_mut(Axis(axis)))
        .and(data.lanes(Axis(axis)))
        .for_each(|mut dst, src| {
            let (first, last) = (src[0], src[n - 1]);
            dst.iter_mut().zip(src.iter()).for_each(|(d, s)| *d = *s);
            for j in 0..right {
                dst[n + j] = ramp(pad_value, last, right, right - 1 - j);
            }
            for i in 0..left {
                dst[n + right + i] = ramp(pad_value, first, left, i);
            }
        });
    padded
}

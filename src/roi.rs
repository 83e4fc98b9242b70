/*!
# Region of interest

Focus metrics can be restricted to a rectangular window of the field. A
window may be written in several ways:

 - a flat list of bounds, `[start, stop]` in 1D or
   `[start_0, start_1, stop_0, stop_1]` in 2D,
 - a list of `[start, stop]` pairs, one per axis,
 - a list of explicit [`Span`]s, one per axis.

Any bound may be `null`/`None` for an open end. Every form is normalized by
[`parse_roi`] into the canonical [`Roi`]. Bounds follow the slicing rules of
Python: negative values count from the end of the axis and out of range
values are clamped.

```
use refocus::roi::{Roi, Span};

let flat: Roi = "[2, 4, 5, 6]".parse().unwrap();
let pairs: Roi = "[[2, 5], [4, 6]]".parse().unwrap();
assert_eq!(flat, pairs);
assert_eq!(flat, Roi::Rect(Span::range(2, 5), Span::range(4, 6)));
```
*/

use std::{fmt, ops::Range, str::FromStr};

use ndarray::{ArrayViewD, Axis, Slice};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RoiError {
    #[error("expected 2 (1D) or 4 (2D) bounds, got {0}")]
    Length(usize),
    #[error("expected a (start, stop) pair, got {0} elements")]
    Pair(usize),
    #[error("expected one slice per axis")]
    NotSlices,
    #[error("{roi}D region of interest for a {field}D field")]
    Rank { roi: usize, field: usize },
    #[error("region of interest {roi} selects nothing along axis {axis}")]
    Empty { roi: String, axis: usize },
    #[error("{0}")]
    Parse(String),
}
type Result<T> = std::result::Result<T, RoiError>;

/// Half-open index range along one axis, `start..stop`
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    #[serde(default)]
    pub start: Option<isize>,
    #[serde(default)]
    pub stop: Option<isize>,
}
impl Span {
    pub fn new(start: Option<isize>, stop: Option<isize>) -> Self {
        Self { start, stop }
    }
    pub fn range(start: isize, stop: isize) -> Self {
        Self::new(Some(start), Some(stop))
    }
    /// The whole axis
    pub fn full() -> Self {
        Self::default()
    }
    /// Index range selected along an axis of length `len`
    pub fn resolve(&self, len: usize) -> Range<usize> {
        let len = len as isize;
        let bound = |index: isize| {
            if index < 0 {
                (index + len).max(0)
            } else {
                index.min(len)
            }
        };
        let start = self.start.map_or(0, bound);
        let stop = self.stop.map_or(len, bound).max(start);
        start as usize..stop as usize
    }
}
impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(start) = self.start {
            write!(f, "{start}")?;
        }
        write!(f, ":")?;
        if let Some(stop) = self.stop {
            write!(f, "{stop}")?;
        }
        Ok(())
    }
}

/// Accepted representations of a region of interest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RoiInput {
    /// `[start, stop]` or `[start_0, start_1, stop_0, stop_1]`
    Flat(Vec<Option<isize>>),
    /// `[[start_0, stop_0], [start_1, stop_1]]`
    Nested(Vec<Vec<Option<isize>>>),
    /// One [`Span`] per axis
    Slices(Vec<Span>),
}
impl FromStr for RoiInput {
    type Err = RoiError;

    fn from_str(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| RoiError::Parse(format!("{s:?} ({e})")))
    }
}
impl From<Roi> for RoiInput {
    fn from(roi: Roi) -> Self {
        match roi {
            Roi::Line(span) => RoiInput::Slices(vec![span]),
            Roi::Rect(s0, s1) => RoiInput::Slices(vec![s0, s1]),
        }
    }
}

/// Canonical region of interest: one [`Span`] per field axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RoiInput", into = "RoiInput")]
pub enum Roi {
    Line(Span),
    Rect(Span, Span),
}
impl Roi {
    pub fn rank(&self) -> usize {
        match self {
            Roi::Line(_) => 1,
            Roi::Rect(..) => 2,
        }
    }
    pub fn spans(&self) -> Vec<Span> {
        match *self {
            Roi::Line(span) => vec![span],
            Roi::Rect(s0, s1) => vec![s0, s1],
        }
    }
    /// Checks that the region selects a non-empty window of a field of the given shape
    pub fn check(&self, shape: &[usize]) -> Result<()> {
        if self.rank() != shape.len() {
            return Err(RoiError::Rank {
                roi: self.rank(),
                field: shape.len(),
            });
        }
        for (axis, (span, &len)) in self.spans().iter().zip(shape).enumerate() {
            if span.resolve(len).is_empty() {
                return Err(RoiError::Empty {
                    roi: self.to_string(),
                    axis,
                });
            }
        }
        Ok(())
    }
    /// Restricts `field` to the region
    pub fn apply<'a, T>(&self, mut field: ArrayViewD<'a, T>) -> Result<ArrayViewD<'a, T>> {
        self.check(field.shape())?;
        for (axis, span) in self.spans().iter().enumerate() {
            let range = span.resolve(field.len_of(Axis(axis)));
            field.slice_axis_inplace(Axis(axis), Slice::from(range));
        }
        Ok(field)
    }
}
impl fmt::Display for Roi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Roi::Line(span) => write!(f, "[{span}]"),
            Roi::Rect(s0, s1) => write!(f, "[{s0}, {s1}]"),
        }
    }
}
impl TryFrom<RoiInput> for Roi {
    type Error = RoiError;

    fn try_from(input: RoiInput) -> Result<Self> {
        parse_roi(input)
    }
}
impl FromStr for Roi {
    type Err = RoiError;

    fn from_str(s: &str) -> Result<Self> {
        parse_roi(s.parse()?)
    }
}

fn pair(bounds: &[Option<isize>]) -> Result<Span> {
    match bounds {
        &[start, stop] => Ok(Span::new(start, stop)),
        _ => Err(RoiError::Pair(bounds.len())),
    }
}

/// Normalizes any accepted representation into a [`Roi`]
pub fn parse_roi(input: RoiInput) -> Result<Roi> {
    match input {
        RoiInput::Flat(bounds) => match bounds.as_slice() {
            &[start, stop] => Ok(Roi::Line(Span::new(start, stop))),
            &[start_0, start_1, stop_0, stop_1] => Ok(Roi::Rect(
                Span::new(start_0, stop_0),
                Span::new(start_1, stop_1),
            )),
            _ => Err(RoiError::Length(bounds.len())),
        },
        RoiInput::Nested(pairs) => match pairs.as_slice() {
            [p] => Ok(Roi::Line(pair(p)?)),
            [p0, p1] => Ok(Roi::Rect(pair(p0)?, pair(p1)?)),
            _ => Err(RoiError::Length(2 * pairs.len())),
        },
        RoiInput::Slices(spans) => parse_slices(spans),
    }
}

/// Accepts only explicit per axis [`Span`]s
pub fn parse_roi_strict(input: RoiInput) -> Result<Roi> {
    match input {
        RoiInput::Slices(spans) => parse_slices(spans),
        _ => Err(RoiError::NotSlices),
    }
}

fn parse_slices(spans: Vec<Span>) -> Result<Roi> {
    match spans.as_slice() {
        &[span] => Ok(Roi::Line(span)),
        &[s0, s1] => Ok(Roi::Rect(s0, s1)),
        _ => Err(RoiError::Length(2 * spans.len())),
    }
}

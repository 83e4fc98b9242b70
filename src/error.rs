use crate::{
    kernel::KernelError, metrics::MetricError, minimize::MinimizeError, pad::PadError,
    roi::RoiError,
};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("field must be 1D or 2D, got {0} dimensions")]
    Dimensionality(usize),
    #[error("field is empty")]
    EmptyField,
    #[error("padding failed: {0}")]
    Pad(#[from] PadError),
    #[error(transparent)]
    Kernel(#[from] KernelError),
    #[error("invalid region of interest: {0}")]
    Roi(#[from] RoiError),
    #[error(transparent)]
    Metric(#[from] MetricError),
    #[error(transparent)]
    Minimize(#[from] MinimizeError),
    #[error("failed to build the worker pool")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
    #[error("cannot average the focus distances of an empty stack")]
    EmptyStack,
    #[error("stack fields do not share the same shape: {0:?} vs {1:?}")]
    StackShape(Vec<usize>, Vec<usize>),
}

pub type Result<T> = std::result::Result<T, Error>;

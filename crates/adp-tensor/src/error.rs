//! Tensor algebra errors.

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum TensorError {
    /// Operands minted their symbols under different factories.
    #[error("symbol factory mismatch: {left} vs {right}")]
    FactoryMismatch { left: Uuid, right: Uuid },

    /// Element shapes differ.
    #[error("shape mismatch: {left:?} vs {right:?}")]
    ShapeMismatch { left: Vec<usize>, right: Vec<usize> },

    /// Reduction axis beyond the element rank.
    #[error("axis {axis} out of range for {ndim} element dimensions")]
    AxisOutOfRange { axis: usize, ndim: usize },

    /// The term, coefficient and bias tensors disagree in shape.
    #[error("inconsistent component shapes: term {term:?}, coeff {coeff:?}, bias {bias:?}")]
    Inconsistent {
        term: Vec<usize>,
        coeff: Vec<usize>,
        bias: Vec<usize>,
    },

    #[error("shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// Evaluation met a symbol with no value.
    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),
}

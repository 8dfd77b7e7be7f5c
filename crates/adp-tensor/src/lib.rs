//! # adp-tensor — Array-Shaped Gamma Values
//!
//! [`IntermediateGammaTensor`] is the bulk counterpart of a derived gamma
//! scalar: every element is a polynomial over minted symbols, stored as
//! parallel term, coefficient and bias arrays (`ndarray`) so that whole
//! tensors evaluate in one pass.
//!
//! Symbols are minted by a [`SymbolFactory`]. Two tensors combine only when
//! they share a factory; mixing factories is a hard error.

pub mod error;
pub mod factory;
pub mod gamma;

pub use error::TensorError;
pub use factory::SymbolFactory;
pub use gamma::IntermediateGammaTensor;

//! # adp-scalar — Bound-Tracked Privacy Scalars
//!
//! A [`Scalar`] is a value derived from privacy-sensitive data that always
//! knows its range, which entities it depends on, and how far it can move
//! when one entity's data changes.
//!
//! ## Entities and Promotion
//!
//! Arithmetic between values of the same entity stays on the *phi* side and
//! keeps that entity. As soon as two entities mix, or a phi value meets a
//! gamma value, the phi operands are promoted to fresh gamma leaves and the
//! result is gamma-side. Entity identity is the only discriminator.
//!
//! ```text
//! PhiScalar(e) ─┬─ (+,-,*) PhiScalar(e)  → IntermediatePhiScalar(e)
//!               └─ (+,-,*) PhiScalar(f)  → IntermediateGammaScalar
//! ```
//!
//! ## Bounds and Sensitivity
//!
//! Leaves store their bounds. Derived bounds and Lipschitz constants are
//! computed on demand by `adp-search` over the boxes of the leaves a value
//! depends on. Searches are deterministic for a fixed configuration.
//!
//! ## Crate Policy
//!
//! - Leaves register in the process-wide [`SymbolTable`](adp_core::SymbolTable)
//!   at construction and are immutable.
//! - No `.unwrap()` outside tests.

pub mod ops;
pub mod publish;
pub mod scalar;
pub mod wire;

pub use publish::{publish, publish_with, Accountant, EntitySensitivity, Release, DEFAULT_SIGMA};
pub use scalar::{
    Bounds, GammaScalar, IntermediateGammaScalar, IntermediatePhiScalar, PhiScalar, Scalar,
};
pub use wire::{ScalarRecord, ScalarWire};

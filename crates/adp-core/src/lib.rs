//! # adp-core — Foundational Types for Bound-Tracked Scalars
//!
//! This crate is the leaf of the workspace DAG. It defines the primitives
//! every other `adp-*` crate builds on:
//!
//! - **Identities** (`identity.rs`): `EntityId`, `Entity`, `ScalarId`. An
//!   entity is a data subject whose individual influence must be bounded.
//!
//! - **Expressions** (`expr.rs`): a small immutable expression tree over
//!   leaf [`Symbol`]s with substitution, differentiation, and free-symbol
//!   collection.
//!
//! - **Polynomials** (`polynomial.rs`): the canonical expanded form of an
//!   [`Expr`], used for exact zero tests and fast repeated evaluation.
//!
//! - **Leaves** (`leaf.rs`): the immutable bound-box record of a leaf scalar.
//!
//! - **Symbol Table** (`registry.rs`): maps a [`Symbol`] back to its
//!   [`Leaf`]. The table holds non-owning references; leaves are owned by
//!   the scalars that created or depend on them.
//!
//! - **Configuration** (`config.rs`): [`SearchConfig`] for the global
//!   optimization routines in `adp-search`.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `adp-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod config;
pub mod error;
pub mod expr;
pub mod identity;
pub mod leaf;
pub mod polynomial;
pub mod registry;

// Re-export primary types for ergonomic imports.
pub use config::SearchConfig;
pub use error::{AdpError, BoundsError, RegistryError, SearchError};
pub use expr::{Expr, Symbol};
pub use identity::{Entity, EntityId, ScalarId};
pub use leaf::{Leaf, Origin};
pub use polynomial::{CompiledPolynomial, Monomial, Polynomial};
pub use registry::{SymbolResolver, SymbolTable};

// Copyright 2025 Irreducible Inc.

//! Circuit construction frontend for trellis.
//!
//! This crate provides the [`CircuitBuilder`] API for constructing arithmetic circuits over a
//! prime field that compile to generic-gate constraint systems. You describe your computation
//! as field operations and named assertions, and the frontend compiles it into rows of the form
//! `sl·l + sr·r + so·o + sm·l·r + sc = 0`.
//!
//! # Usage Flow
//!
//! Use [`CircuitBuilder`] to construct your circuit. Call `add_public_input()` and
//! `add_witness()` to create [`Expr`]s, handles to field values that will exist during proof
//! generation. Linear operations like `add()` and `scale()` are free; `mul()`, `inv()` and the
//! assertions record constraints.
//!
//! When you call `build()`, the builder optimizes the recorded constraints, checks the result
//! against the recording on random assignments and packs it into a [`Circuit`]. Its
//! [`ConstraintSystem`](trellis_core::ConstraintSystem) is deterministic: the same sequence of
//! operations always produces the same rows and digest.
//!
//! To generate a witness, create a [`WitnessFiller`] from the circuit, assign the inputs, then
//! call `populate_witness()` to solve for the internal values.
//!
//! Use [`CircuitStat`] to inspect gate counts and what the optimizer did, and
//! [`export::compare`] to diff the output of two compilers.

#![warn(missing_docs)]

mod compiler;
mod error;
pub mod stat;

pub use compiler::{
	CircuitBuilder, Expr, OptimizationLevel, Options, PassKind, VarKind,
	circuit::{Circuit, PopulateError, WitnessFiller},
	export,
	optimize::stat::{PassCounters, PipelineStat},
};
pub use error::CompileError;
pub use stat::CircuitStat;

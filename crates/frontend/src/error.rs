// Copyright 2025 Irreducible Inc.
//! Hosts error definitions for the frontend crate.

use trellis_core::ConstraintSystemError;

use crate::compiler::PassKind;

/// Failure of a circuit build.
#[allow(missing_docs)] // errors are self-documenting
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
	#[error("constraint '{name}' can never be satisfied")]
	UnsatisfiableConstraint { name: String },
	#[error("cannot unify variables through a non-alias difference: {shape}")]
	InvalidUnification { shape: String },
	#[error("pass {pass} changed the solution set of the circuit (gates {gates:?})")]
	OptimizerUnsoundness { pass: PassKind, gates: Vec<usize> },
	#[error("a bilinear relation over {n_vars} variables does not fit a single gate")]
	GateCapacityExceeded { n_vars: usize },
	#[error("constructed constraint system is malformed: {0}")]
	Malformed(#[from] ConstraintSystemError),
}

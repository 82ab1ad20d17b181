// Copyright 2025 Irreducible Inc.
//! Hosts error definitions for the core crate.

use trellis_utils::SerializationError;

/// Constraint system related error.
#[allow(missing_docs)] // errors are self-documenting
#[derive(Debug, thiserror::Error)]
pub enum ConstraintSystemError {
	#[error(
		"the public input prefix ({public_input_size}) exceeds the variable count ({variable_count})"
	)]
	PublicInputOverflow {
		public_input_size: usize,
		variable_count: usize,
	},
	#[error(
		"gate #{gate_index} half {half} refers to out-of-range variable in its {slot} wire (index {index} >= variable count {variable_count})"
	)]
	OutOfRangeWire {
		gate_index: usize,
		half: usize,
		slot: &'static str,
		index: u32,
		variable_count: usize,
	},
	#[error("gate #{gate_index} half {half} has a nonzero {coeff} coefficient on an empty wire")]
	DanglingCoefficient {
		gate_index: usize,
		half: usize,
		coeff: &'static str,
	},
	#[error("serialization failed: {0}")]
	Serialization(#[from] SerializationError),
}

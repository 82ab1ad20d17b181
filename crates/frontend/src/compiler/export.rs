// Copyright 2025 Irreducible Inc.
//! Implementation-agnostic export of a constraint system and gate-by-gate parity checks.
//!
//! Two compilers fed the same program should produce the same export. When they do not,
//! [`compare`] tells where the first differences are.

use std::fmt;

use ark_ff::PrimeField;
use serde::{Deserialize, Serialize};
use trellis_core::{ConstraintSystem, field::to_hex};

/// The only row type trellis emits.
pub const GENERIC_GATE_TYPE: &str = "Generic";

/// A constraint system as plain data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedSystem {
	/// Number of public inputs.
	pub public_input_size: usize,
	/// Number of variables.
	pub variable_count: usize,
	/// Hex encoded content digest.
	pub digest: String,
	/// Rows, in order.
	pub gates: Vec<ExportedGate>,
}

/// One row. A row holding two halves lists six wires and ten coefficients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedGate {
	/// Row type.
	#[serde(rename = "type")]
	pub typ: String,
	/// Wires as variable indices, `null` for an empty slot.
	pub wires: Vec<Option<u32>>,
	/// Coefficients as big-endian hex, in the order `sl, sr, so, sm, sc` per half.
	pub coeffs: Vec<String>,
}

impl ExportedSystem {
	/// Exports `cs`.
	pub fn from_constraint_system<F: PrimeField>(cs: &ConstraintSystem<F>) -> Self {
		let gates = cs
			.gates()
			.iter()
			.map(|gate| {
				let mut wires = Vec::new();
				let mut coeffs = Vec::new();
				for half in gate.halves() {
					wires.extend(half.wires.iter().map(|wire| wire.map(|index| index.0)));
					coeffs.extend(half.coeffs.iter().map(to_hex));
				}
				ExportedGate {
					typ: GENERIC_GATE_TYPE.to_string(),
					wires,
					coeffs,
				}
			})
			.collect();
		Self {
			public_input_size: cs.public_input_size(),
			variable_count: cs.variable_count(),
			digest: hex::encode(cs.digest()),
			gates,
		}
	}

	/// Pretty-printed JSON.
	pub fn to_json(&self) -> String {
		serde_json::to_string_pretty(self).expect("export is plain data")
	}

	/// Parses the output of [`to_json`](Self::to_json), possibly from another implementation.
	pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
		serde_json::from_str(json)
	}
}

/// One difference between two exports.
#[allow(missing_docs)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mismatch {
	/// Different number of public inputs.
	PublicInputSize { lhs: usize, rhs: usize },
	/// Different number of rows. Rows past the shorter list are not compared.
	GateCount { lhs: usize, rhs: usize },
	/// Different row type at `index`.
	GateType { index: usize, lhs: String, rhs: String },
	/// Different wiring at `index`.
	Wires {
		index: usize,
		lhs: Vec<Option<u32>>,
		rhs: Vec<Option<u32>>,
	},
	/// Different coefficients at `index`.
	Coeffs {
		index: usize,
		lhs: Vec<String>,
		rhs: Vec<String>,
	},
}

impl fmt::Display for Mismatch {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Mismatch::PublicInputSize { lhs, rhs } => {
				write!(f, "public input size: {lhs} vs {rhs}")
			}
			Mismatch::GateCount { lhs, rhs } => write!(f, "gate count: {lhs} vs {rhs}"),
			Mismatch::GateType { index, lhs, rhs } => {
				write!(f, "gate #{index} type: {lhs} vs {rhs}")
			}
			Mismatch::Wires { index, lhs, rhs } => {
				write!(f, "gate #{index} wires: {lhs:?} vs {rhs:?}")
			}
			Mismatch::Coeffs { index, lhs, rhs } => {
				write!(f, "gate #{index} coeffs: [{}] vs [{}]", lhs.join(", "), rhs.join(", "))
			}
		}
	}
}

/// Outcome of [`compare`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParityReport {
	/// Differences in the order they were found.
	pub mismatches: Vec<Mismatch>,
}

impl ParityReport {
	/// Whether the two exports describe the same rows.
	pub fn is_match(&self) -> bool {
		self.mismatches.is_empty()
	}
}

impl fmt::Display for ParityReport {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.is_match() {
			return writeln!(f, "constraint systems match");
		}
		writeln!(f, "{} mismatches:", self.mismatches.len())?;
		for mismatch in &self.mismatches {
			writeln!(f, "- {mismatch}")?;
		}
		Ok(())
	}
}

/// Compares two exports gate by gate.
pub fn compare(lhs: &ExportedSystem, rhs: &ExportedSystem) -> ParityReport {
	let mut mismatches = Vec::new();
	if lhs.public_input_size != rhs.public_input_size {
		mismatches.push(Mismatch::PublicInputSize {
			lhs: lhs.public_input_size,
			rhs: rhs.public_input_size,
		});
	}
	if lhs.gates.len() != rhs.gates.len() {
		mismatches.push(Mismatch::GateCount {
			lhs: lhs.gates.len(),
			rhs: rhs.gates.len(),
		});
	}
	for (index, (l, r)) in lhs.gates.iter().zip(&rhs.gates).enumerate() {
		if l.typ != r.typ {
			mismatches.push(Mismatch::GateType {
				index,
				lhs: l.typ.clone(),
				rhs: r.typ.clone(),
			});
			continue;
		}
		if l.wires != r.wires {
			mismatches.push(Mismatch::Wires {
				index,
				lhs: l.wires.clone(),
				rhs: r.wires.clone(),
			});
		}
		if l.coeffs != r.coeffs {
			mismatches.push(Mismatch::Coeffs {
				index,
				lhs: l.coeffs.clone(),
				rhs: r.coeffs.clone(),
			});
		}
	}
	ParityReport { mismatches }
}

// Copyright 2025 Irreducible Inc.
//! The generic-gate constraint system.
//!
//! A [`ConstraintSystem`] is an ordered list of [`GenericGate`] rows. Every row carries one or two
//! [`GenericHalf`] constraints of the shape
//!
//! ```text
//! sl·l + sr·r + so·o + sm·l·r + sc = 0
//! ```
//!
//! over at most three variables. The order of the rows, the public input prefix and the variable
//! count together define the identity of a circuit, summarized by [`ConstraintSystem::digest`].

use ark_ff::{PrimeField, Zero};
use bytes::{Buf, BufMut};
use sha2::{Digest, Sha256};
use trellis_utils::{DeserializeBytes, SerializationError, SerializeBytes};

use crate::{
	consts::{COEFF_M, COEFF_NAMES, GENERIC_COEFFS, GENERIC_WIRES, WIRE_L, WIRE_NAMES, WIRE_R},
	error::ConstraintSystemError,
	field::{deserialize_field, serialize_field},
};

/// Index of a variable within the assignment vector of a constraint system.
///
/// Public inputs occupy the prefix `[0, public_input_size)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarIndex(pub u32);

impl SerializeBytes for VarIndex {
	fn serialize(&self, write_buf: impl BufMut) -> Result<(), SerializationError> {
		self.0.serialize(write_buf)
	}
}

impl DeserializeBytes for VarIndex {
	fn deserialize(read_buf: impl Buf) -> Result<Self, SerializationError> {
		Ok(VarIndex(u32::deserialize(read_buf)?))
	}
}

/// One `sl·l + sr·r + so·o + sm·l·r + sc = 0` constraint.
///
/// A `None` wire is the constant-zero slot. Its coefficient must be zero as well, see
/// [`ConstraintSystem::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GenericHalf<F> {
	/// The `l`, `r` and `o` wires.
	pub wires: [Option<VarIndex>; GENERIC_WIRES],
	/// The `sl`, `sr`, `so`, `sm` and `sc` coefficients.
	pub coeffs: [F; GENERIC_COEFFS],
}

impl<F: PrimeField> GenericHalf<F> {
	/// Whether the product term is absent.
	pub fn is_linear(&self) -> bool {
		self.coeffs[COEFF_M].is_zero()
	}

	/// Distinct variables this half refers to, in slot order.
	pub fn vars(&self) -> impl Iterator<Item = VarIndex> + '_ {
		self.wires
			.iter()
			.enumerate()
			.filter_map(move |(slot, wire)| {
				let var = (*wire)?;
				let seen_before = self.wires[..slot].contains(&Some(var));
				(!seen_before).then_some(var)
			})
	}

	fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
		self.wires.serialize(&mut write_buf)?;
		for coeff in &self.coeffs {
			serialize_field(coeff, &mut write_buf)?;
		}
		Ok(())
	}

	fn deserialize(mut read_buf: impl Buf) -> Result<Self, SerializationError> {
		let wires = <[Option<VarIndex>; GENERIC_WIRES]>::deserialize(&mut read_buf)?;
		let mut coeffs = [F::zero(); GENERIC_COEFFS];
		for coeff in &mut coeffs {
			*coeff = deserialize_field(&mut read_buf)?;
		}
		Ok(GenericHalf { wires, coeffs })
	}
}

/// One row of the constraint system.
///
/// The second half is the spare slot of the row. It is occupied either by the continuation of a
/// chained relation or by an independent constraint that was batched alongside the first one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GenericGate<F> {
	#[allow(missing_docs)]
	pub first: GenericHalf<F>,
	#[allow(missing_docs)]
	pub second: Option<GenericHalf<F>>,
}

impl<F> GenericGate<F> {
	/// A row holding a single half.
	pub fn single(half: GenericHalf<F>) -> Self {
		GenericGate {
			first: half,
			second: None,
		}
	}

	/// A row holding two halves.
	pub fn double(first: GenericHalf<F>, second: GenericHalf<F>) -> Self {
		GenericGate {
			first,
			second: Some(second),
		}
	}

	/// Iterates over the occupied halves.
	pub fn halves(&self) -> impl Iterator<Item = &GenericHalf<F>> {
		std::iter::once(&self.first).chain(self.second.as_ref())
	}
}

impl<F: PrimeField> SerializeBytes for GenericGate<F> {
	fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
		self.first.serialize(&mut write_buf)?;
		match &self.second {
			Some(second) => {
				1u8.serialize(&mut write_buf)?;
				second.serialize(write_buf)
			}
			None => 0u8.serialize(write_buf),
		}
	}
}

impl<F: PrimeField> DeserializeBytes for GenericGate<F> {
	fn deserialize(mut read_buf: impl Buf) -> Result<Self, SerializationError> {
		let first = GenericHalf::deserialize(&mut read_buf)?;
		let second = match u8::deserialize(&mut read_buf)? {
			0 => None,
			1 => Some(GenericHalf::deserialize(read_buf)?),
			tag => {
				return Err(SerializationError::UnknownTag {
					name: "GenericGate::second",
					tag,
				});
			}
		};
		Ok(GenericGate { first, second })
	}
}

/// The compiled constraint system.
///
/// Immutable once constructed. The digest is computed at construction over the serialized form,
/// so two systems with equal digests are byte-for-byte identical.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintSystem<F> {
	gates: Vec<GenericGate<F>>,
	public_input_size: usize,
	variable_count: usize,
	digest: [u8; 32],
}

impl<F> ConstraintSystem<F> {
	/// Serialization format version, the first field of the binary layout.
	pub const SERIALIZATION_VERSION: u32 = 1;

	/// The gate rows in order.
	pub fn gates(&self) -> &[GenericGate<F>] {
		&self.gates
	}

	/// Number of gate rows.
	pub fn n_gates(&self) -> usize {
		self.gates.len()
	}

	/// Number of occupied halves across all rows.
	pub fn n_halves(&self) -> usize {
		self.gates.iter().map(|gate| gate.halves().count()).sum()
	}

	/// Length of the public input prefix.
	pub fn public_input_size(&self) -> usize {
		self.public_input_size
	}

	/// Total number of variables, including the ones no gate refers to anymore.
	pub fn variable_count(&self) -> usize {
		self.variable_count
	}

	/// SHA-256 over the serialized system.
	pub fn digest(&self) -> &[u8; 32] {
		&self.digest
	}
}

impl<F: PrimeField> ConstraintSystem<F> {
	/// Creates a new constraint system, validating it and computing its digest.
	pub fn new(
		gates: Vec<GenericGate<F>>,
		public_input_size: usize,
		variable_count: usize,
	) -> Result<Self, ConstraintSystemError> {
		let mut cs = ConstraintSystem {
			gates,
			public_input_size,
			variable_count,
			digest: [0; 32],
		};
		cs.validate()?;

		let mut bytes = Vec::new();
		cs.serialize(&mut bytes)?;
		cs.digest.copy_from_slice(&Sha256::digest(&bytes));
		Ok(cs)
	}

	/// Ensures that this constraint system is well-formed.
	///
	/// Specifically checks that:
	///
	/// - the public input prefix fits in the variable count,
	/// - every wire refers to an existing variable,
	/// - no nonzero coefficient is attached to an empty wire, including the product coefficient
	///   which needs both `l` and `r`.
	pub fn validate(&self) -> Result<(), ConstraintSystemError> {
		if self.public_input_size > self.variable_count {
			return Err(ConstraintSystemError::PublicInputOverflow {
				public_input_size: self.public_input_size,
				variable_count: self.variable_count,
			});
		}

		for (gate_index, gate) in self.gates.iter().enumerate() {
			for (half_index, half) in gate.halves().enumerate() {
				validate_half(half, gate_index, half_index, self.variable_count)?;
			}
		}

		return Ok(());

		fn validate_half<F: PrimeField>(
			half: &GenericHalf<F>,
			gate_index: usize,
			half_index: usize,
			variable_count: usize,
		) -> Result<(), ConstraintSystemError> {
			for (slot, wire) in half.wires.iter().enumerate() {
				match wire {
					Some(VarIndex(index)) if *index as usize >= variable_count => {
						return Err(ConstraintSystemError::OutOfRangeWire {
							gate_index,
							half: half_index,
							slot: WIRE_NAMES[slot],
							index: *index,
							variable_count,
						});
					}
					Some(_) => {}
					None if !half.coeffs[slot].is_zero() => {
						return Err(ConstraintSystemError::DanglingCoefficient {
							gate_index,
							half: half_index,
							coeff: COEFF_NAMES[slot],
						});
					}
					None => {}
				}
			}
			let has_operands = half.wires[WIRE_L].is_some() && half.wires[WIRE_R].is_some();
			if !half.is_linear() && !has_operands {
				return Err(ConstraintSystemError::DanglingCoefficient {
					gate_index,
					half: half_index,
					coeff: COEFF_NAMES[COEFF_M],
				});
			}
			Ok(())
		}
	}
}

impl<F: PrimeField> SerializeBytes for ConstraintSystem<F> {
	fn serialize(&self, mut write_buf: impl BufMut) -> Result<(), SerializationError> {
		Self::SERIALIZATION_VERSION.serialize(&mut write_buf)?;

		self.public_input_size.serialize(&mut write_buf)?;
		self.variable_count.serialize(&mut write_buf)?;
		self.gates.serialize(write_buf)
	}
}

impl<F: PrimeField> DeserializeBytes for ConstraintSystem<F> {
	fn deserialize(mut read_buf: impl Buf) -> Result<Self, SerializationError> {
		let version = u32::deserialize(&mut read_buf)?;
		if version != Self::SERIALIZATION_VERSION {
			return Err(SerializationError::InvalidConstruction {
				name: "ConstraintSystem::version",
			});
		}

		let public_input_size = usize::deserialize(&mut read_buf)?;
		let variable_count = usize::deserialize(&mut read_buf)?;
		let gates = Vec::<GenericGate<F>>::deserialize(read_buf)?;

		ConstraintSystem::new(gates, public_input_size, variable_count).map_err(|_| {
			SerializationError::InvalidConstruction {
				name: "ConstraintSystem",
			}
		})
	}
}

#[cfg(test)]
mod tests {
	use ark_bn254::Fr;
	use ark_ff::One;

	use super::*;

	fn half(wires: [Option<u32>; 3], coeffs: [i64; 5]) -> GenericHalf<Fr> {
		GenericHalf {
			wires: wires.map(|w| w.map(VarIndex)),
			coeffs: coeffs.map(Fr::from),
		}
	}

	fn sample_system() -> ConstraintSystem<Fr> {
		// x0 + x1 - x2 = 0 batched with x3 - 5 = 0, followed by x0·x1 - x2 = 0.
		ConstraintSystem::new(
			vec![
				GenericGate::double(
					half([Some(0), Some(1), Some(2)], [1, 1, -1, 0, 0]),
					half([Some(3), None, None], [1, 0, 0, 0, -5]),
				),
				GenericGate::single(half([Some(0), Some(1), Some(2)], [0, 0, -1, 1, 0])),
			],
			1,
			4,
		)
		.unwrap()
	}

	#[test]
	fn test_serialization_round_trip_preserves_digest() {
		let cs = sample_system();
		let mut buf = Vec::new();
		cs.serialize(&mut buf).unwrap();
		assert_eq!(&buf[..4], &ConstraintSystem::<Fr>::SERIALIZATION_VERSION.to_le_bytes());

		let decoded = ConstraintSystem::<Fr>::deserialize(buf.as_slice()).unwrap();
		assert_eq!(decoded, cs);
		assert_eq!(decoded.digest(), cs.digest());
		assert_eq!(cs.n_gates(), 2);
		assert_eq!(cs.n_halves(), 3);
	}

	#[test]
	fn test_digest_is_order_sensitive() {
		let cs = sample_system();
		let mut gates = cs.gates().to_vec();
		gates.reverse();
		let reversed = ConstraintSystem::new(gates, 1, 4).unwrap();
		assert_ne!(reversed.digest(), cs.digest());
	}

	#[test]
	fn test_rejects_out_of_range_wire() {
		let err = ConstraintSystem::new(
			vec![GenericGate::single(half([Some(0), Some(7), None], [1, 1, 0, 0, 0]))],
			0,
			2,
		)
		.unwrap_err();
		assert!(matches!(err, ConstraintSystemError::OutOfRangeWire { index: 7, slot: "r", .. }));
	}

	#[test]
	fn test_rejects_dangling_coefficient() {
		let err = ConstraintSystem::new(
			vec![GenericGate::single(half([Some(0), None, None], [1, 1, 0, 0, 0]))],
			0,
			1,
		)
		.unwrap_err();
		assert!(matches!(err, ConstraintSystemError::DanglingCoefficient { coeff: "sr", .. }));

		let err = ConstraintSystem::new(
			vec![GenericGate::single(GenericHalf {
				wires: [Some(VarIndex(0)), None, None],
				coeffs: [Fr::one(), Fr::zero(), Fr::zero(), Fr::one(), Fr::zero()],
			})],
			0,
			1,
		)
		.unwrap_err();
		assert!(matches!(err, ConstraintSystemError::DanglingCoefficient { coeff: "sm", .. }));
	}

	#[test]
	fn test_rejects_public_overflow() {
		assert!(matches!(
			ConstraintSystem::<Fr>::new(Vec::new(), 3, 2),
			Err(ConstraintSystemError::PublicInputOverflow { .. })
		));
	}

	#[test]
	fn test_rejects_wrong_version() {
		let mut buf = Vec::new();
		sample_system().serialize(&mut buf).unwrap();
		buf[0] = 9;
		assert_eq!(
			ConstraintSystem::<Fr>::deserialize(buf.as_slice()),
			Err(SerializationError::InvalidConstruction {
				name: "ConstraintSystem::version"
			})
		);
	}

	#[test]
	fn test_vars_are_distinct() {
		let square = half([Some(2), Some(2), Some(1)], [0, 0, -1, 1, 0]);
		assert_eq!(square.vars().collect::<Vec<_>>(), vec![VarIndex(2), VarIndex(1)]);
		assert!(!square.is_linear());
	}
}

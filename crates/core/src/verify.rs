// Copyright 2025 Irreducible Inc.
//! Routines for checking whether the
//! [constraint system][`crate::constraint_system::ConstraintSystem`] is satisfied by a given
//! assignment of values to its variables.

use ark_ff::{PrimeField, Zero};

use crate::{
	constraint_system::{ConstraintSystem, GenericHalf, VarIndex},
	consts::{COEFF_C, COEFF_L, COEFF_M, COEFF_O, COEFF_R, WIRE_L, WIRE_O, WIRE_R},
	field::to_hex,
};

/// Reads a wire from the assignment. The empty slot reads as zero.
#[inline]
fn wire_value<F: PrimeField>(values: &[F], wire: Option<VarIndex>) -> F {
	wire.map_or_else(F::zero, |VarIndex(index)| values[index as usize])
}

/// Evaluates `sl·l + sr·r + so·o + sm·l·r + sc` for a half.
///
/// # Panics
///
/// Panics if a wire refers past the end of `values`.
pub fn eval_half<F: PrimeField>(half: &GenericHalf<F>, values: &[F]) -> F {
	let l = wire_value(values, half.wires[WIRE_L]);
	let r = wire_value(values, half.wires[WIRE_R]);
	let o = wire_value(values, half.wires[WIRE_O]);
	let c = &half.coeffs;
	c[COEFF_L] * l + c[COEFF_R] * r + c[COEFF_O] * o + c[COEFF_M] * l * r + c[COEFF_C]
}

/// Verifies that a half evaluates to zero.
pub fn verify_half<F: PrimeField>(half: &GenericHalf<F>, values: &[F]) -> Result<(), String> {
	let residue = eval_half(half, values);
	if residue.is_zero() {
		Ok(())
	} else {
		Err(format!("generic constraint failed: residue 0x{} (expected 0)", to_hex(&residue)))
	}
}

/// Verifies all constraints in a constraint system are satisfied by the assignment.
///
/// `values` holds one element per variable, public inputs first.
pub fn verify_constraints<F: PrimeField>(
	cs: &ConstraintSystem<F>,
	values: &[F],
) -> Result<(), String> {
	if values.len() != cs.variable_count() {
		return Err(format!(
			"assignment length mismatch. Expected: {}, Actual: {}",
			cs.variable_count(),
			values.len()
		));
	}

	for (gate_index, gate) in cs.gates().iter().enumerate() {
		for (half_index, half) in gate.halves().enumerate() {
			verify_half(half, values).map_err(|e| format!("gate #{gate_index}.{half_index}: {e}"))?;
		}
	}
	Ok(())
}

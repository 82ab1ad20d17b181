// Copyright 2025 Irreducible Inc.
//! Packing of optimized halves into rows of the constraint system.

use ark_ff::PrimeField;
use trellis_core::GenericGate;

use crate::compiler::{
	gate::WireHalf,
	var_arena::{VarArena, VarKind},
};

/// Lays halves out in rows of at most two.
///
/// Consecutive halves that share an internal variable are links of one chain and always share a
/// row. With `batching`, a linear half over at most two variables that would otherwise sit alone
/// is paired with the next such half whose variables are disjoint from its own.
///
/// The order of halves within the result may differ from the input only by postponing a waiting
/// batch candidate; the set of halves is unchanged.
pub(crate) fn pack_rows<F: PrimeField>(
	halves: &[WireHalf<F>],
	arena: &VarArena,
	batching: bool,
) -> Vec<GenericGate<F>> {
	let mut rows = Vec::with_capacity(halves.len());
	let mut pending: Option<&WireHalf<F>> = None;

	let mut index = 0;
	while index < halves.len() {
		let half = &halves[index];
		if halves
			.get(index + 1)
			.is_some_and(|next| linked(half, next, arena))
		{
			rows.push(GenericGate::double(half.to_half(), halves[index + 1].to_half()));
			index += 2;
			continue;
		}
		index += 1;

		if !(batching && batchable(half)) {
			rows.push(GenericGate::single(half.to_half()));
			continue;
		}
		match pending.take() {
			Some(waiting) if disjoint(waiting, half) => {
				rows.push(GenericGate::double(waiting.to_half(), half.to_half()));
			}
			Some(waiting) => {
				rows.push(GenericGate::single(waiting.to_half()));
				pending = Some(half);
			}
			None => pending = Some(half),
		}
	}
	if let Some(waiting) = pending {
		rows.push(GenericGate::single(waiting.to_half()));
	}
	rows
}

fn linked<F: PrimeField>(a: &WireHalf<F>, b: &WireHalf<F>, arena: &VarArena) -> bool {
	a.vars()
		.iter()
		.any(|&var| arena.kind(var) == VarKind::Internal && b.vars().contains(&var))
}

fn batchable<F: PrimeField>(half: &WireHalf<F>) -> bool {
	half.is_linear() && half.vars().len() <= 2
}

fn disjoint<F: PrimeField>(a: &WireHalf<F>, b: &WireHalf<F>) -> bool {
	let b_vars = b.vars();
	a.vars().iter().all(|var| !b_vars.contains(var))
}

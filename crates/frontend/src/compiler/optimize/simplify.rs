// Copyright 2025 Irreducible Inc.
use ark_ff::PrimeField;
use rustc_hash::FxHashSet;

use super::{GateList, Pass, PassContext, PassKind, PassOutcome};
use crate::{compiler::gate::Relation, error::CompileError};

/// Drops `0 = 0` halves and halves that are a nonzero multiple of a half retained earlier in the
/// list, and re-lays out every remaining half canonically.
///
/// Both removals are certified: a tautology constrains nothing, and a scalar multiple of a
/// retained relation holds exactly when the retained relation holds.
pub(crate) struct AlgebraicSimplification;

impl<F: PrimeField> Pass<F> for AlgebraicSimplification {
	fn kind(&self) -> PassKind {
		PassKind::AlgebraicSimplification
	}

	fn run(&self, input: &GateList<F>, _cx: &PassContext<'_>) -> Result<PassOutcome<F>, CompileError> {
		simplify(input)
	}
}

pub(super) fn simplify<F: PrimeField>(input: &GateList<F>) -> Result<PassOutcome<F>, CompileError> {
	// Only used for membership, the output order follows the input order.
	let mut retained: FxHashSet<Relation<F>> = FxHashSet::default();
	let mut halves = Vec::with_capacity(input.halves.len());
	let mut changed = false;

	for (index, half) in input.halves.iter().enumerate() {
		let relation = half.relation();
		if relation.is_tautology() {
			changed = true;
			continue;
		}
		if relation.is_contradiction() {
			return Err(CompileError::UnsatisfiableConstraint {
				name: format!("gate #{index}"),
			});
		}
		if !retained.insert(relation.normalized()) {
			changed = true;
			continue;
		}
		let canonical = relation
			.to_half()
			.map_err(|n_vars| CompileError::GateCapacityExceeded { n_vars })?;
		changed |= canonical != *half;
		halves.push(canonical);
	}

	Ok(PassOutcome {
		output: GateList::new(halves, input.n_vars),
		changed,
	})
}

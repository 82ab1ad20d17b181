// Copyright 2025 Irreducible Inc.
//! Randomized cross-check of the optimizer.
//!
//! The recorded gate list and the optimized one must have the same solutions on the variables
//! they share. This is tested in both directions on random assignments:
//!
//! - a solution of the recorded list must extend to a solution of the optimized list,
//! - a solution of the optimized list must extend to a solution of the recorded list.
//!
//! A failure only counts when the failing half does not depend on a value guessed during the
//! extension, so an unlucky guess never produces a false alarm.

use ark_ff::PrimeField;
use rand::{SeedableRng, rngs::StdRng};

use crate::{
	compiler::{
		optimize::{GateList, PassContext, PassKind, Pipeline},
		solver::{Failures, Solver},
		var_arena::VarArena,
	},
	error::CompileError,
};

/// Parameters of the cross-check.
#[derive(Clone, Copy, Debug)]
pub(crate) struct SafetyCheck {
	pub samples: usize,
	pub seed: u64,
}

/// Compares `raw` with `optimized`. On a mismatch the pipeline is replayed and every pass that
/// changed the list is checked on its own, so the error names the first offending pass.
pub(crate) fn cross_check<F: PrimeField>(
	pipeline: &Pipeline<F>,
	raw: &GateList<F>,
	optimized: &GateList<F>,
	cx: &PassContext<'_>,
	check: SafetyCheck,
) -> Result<(), CompileError> {
	if raw == optimized || check.samples == 0 {
		return Ok(());
	}
	let Err(gates) = compare(raw, optimized, cx.arena, check) else {
		return Ok(());
	};
	tracing::debug!(?gates, "optimized gate list disagrees with the recorded one, replaying");

	let mut last_pass = PassKind::AlgebraicSimplification;
	let replay = pipeline.run_observed(raw.clone(), cx, &mut |pass, before, after| {
		last_pass = pass;
		compare(before, after, cx.arena, check)
			.map_err(|gates| CompileError::OptimizerUnsoundness { pass, gates })
	});
	match replay {
		Err(err) => Err(err),
		// Every individual step passed on its own samples. Blame the last step, with the gate
		// indices of the end-to-end comparison.
		Ok(_) => Err(CompileError::OptimizerUnsoundness {
			pass: last_pass,
			gates,
		}),
	}
}

/// Checks that `before` and `after` have the same solutions.
///
/// Returns the indices of the halves that failed, in whichever list they failed.
pub(crate) fn compare<F: PrimeField>(
	before: &GateList<F>,
	after: &GateList<F>,
	arena: &VarArena,
	check: SafetyCheck,
) -> Result<(), Vec<usize>> {
	let pre = Solver::new(&before.halves, arena);
	let post = Solver::new(&after.halves, arena);

	let mut conclusive = 0;
	for sample in 0..check.samples {
		let mut rng = StdRng::seed_from_u64(check.seed.wrapping_add(sample as u64));
		for (from, to) in [(&pre, &post), (&post, &pre)] {
			let Some(solution) = from.sample(&mut rng) else {
				continue;
			};
			let extended = to.extend(&solution, &mut rng);
			match to.failures(&extended) {
				Failures::None => conclusive += 1,
				Failures::Definite(gates) => return Err(gates),
				Failures::Inconclusive => {}
			}
		}
	}
	if conclusive == 0 && !(before.halves.is_empty() && after.halves.is_empty()) {
		tracing::warn!(
			samples = check.samples,
			"safety cross-check found no conclusive sample"
		);
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use ark_bn254::Fr;
	use ark_ff::One;

	use super::*;
	use crate::compiler::{
		gate::{Relation, WireHalf},
		lincom::LinearCombination,
		var_arena::{Var, VarKind},
	};

	const CHECK: SafetyCheck = SafetyCheck {
		samples: 4,
		seed: 42,
	};

	fn f(n: i64) -> Fr {
		Fr::from(n)
	}

	fn lin(terms: &[(Var, i64)], k: i64) -> WireHalf<Fr> {
		Relation::linear(LinearCombination::from_terms(terms.iter().map(|&(v, c)| (v, f(c))), f(k)))
			.to_half()
			.unwrap()
	}

	fn mul(x: Var, y: Var, z: &[(Var, i64)], k: i64) -> WireHalf<Fr> {
		Relation::bilinear(
			Fr::one(),
			x,
			y,
			LinearCombination::from_terms(z.iter().map(|&(v, c)| (v, f(c))), f(k)),
		)
		.to_half()
		.unwrap()
	}

	#[test]
	fn test_equivalent_lists_pass() {
		let mut arena = VarArena::new();
		let x = arena.allocate(VarKind::Witness);
		let y = arena.allocate(VarKind::Witness);
		let z = arena.allocate(VarKind::Internal);
		let before = GateList::new(vec![mul(x, y, &[(z, -1)], 0), lin(&[(z, 1)], -12)], 3);
		let after = GateList::new(vec![mul(x, y, &[], -12)], 3);
		assert_eq!(compare(&before, &after, &arena, CHECK), Ok(()));
	}

	#[test]
	fn test_changed_constant_is_caught() {
		let mut arena = VarArena::new();
		let x = arena.allocate(VarKind::Witness);
		let y = arena.allocate(VarKind::Witness);
		let z = arena.allocate(VarKind::Internal);
		let before = GateList::new(vec![mul(x, y, &[(z, -1)], 0), lin(&[(z, 1)], -12)], 3);
		let after = GateList::new(vec![mul(x, y, &[], -13)], 3);
		assert_eq!(compare(&before, &after, &arena, CHECK), Err(vec![0]));
	}

	#[test]
	fn test_dropped_public_constraint_is_caught() {
		let mut arena = VarArena::new();
		let p = arena.allocate(VarKind::Public);
		let before = GateList::new(vec![lin(&[(p, 1)], -5)], 1);
		let after = GateList::new(Vec::new(), 1);
		assert_eq!(compare(&before, &after, &arena, CHECK), Err(vec![0]));
	}

	#[test]
	fn test_dropped_witness_relation_is_caught() {
		// x + y - 3 = 0 removed while both variables stay referenced.
		let mut arena = VarArena::new();
		let x = arena.allocate(VarKind::Witness);
		let y = arena.allocate(VarKind::Witness);
		let before = GateList::new(vec![lin(&[(x, 1), (y, 1)], -3), mul(x, y, &[], -2)], 2);
		let after = GateList::new(vec![mul(x, y, &[], -2)], 2);
		assert_eq!(compare(&before, &after, &arena, CHECK), Err(vec![0]));
	}
}

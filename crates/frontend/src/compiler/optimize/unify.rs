// Copyright 2025 Irreducible Inc.
use ark_ff::PrimeField;

use super::{GateList, Pass, PassContext, PassKind, PassOutcome, simplify::simplify};
use crate::{compiler::var_arena::Var, error::CompileError};

/// Rewrites every non-public variable to the representative of its equivalence class, then
/// simplifies the result.
///
/// Halves that the rewrite would turn into `0 = 0` are the equalities that define the classes in
/// the first place. They are kept as they are, since every other rewritten half relies on them.
pub(crate) struct VariableUnification;

impl<F: PrimeField> Pass<F> for VariableUnification {
	fn kind(&self) -> PassKind {
		PassKind::VariableUnification
	}

	fn run(&self, input: &GateList<F>, cx: &PassContext<'_>) -> Result<PassOutcome<F>, CompileError> {
		let rewrite = |var: Var| {
			if cx.arena.is_public(var) {
				var
			} else {
				cx.classes.representative(var)
			}
		};

		let mut changed = false;
		let mut halves = Vec::with_capacity(input.halves.len());
		for half in &input.halves {
			let relation = half.relation();
			let rewritten = relation.map_vars(rewrite);
			if rewritten == relation || rewritten.is_tautology() {
				halves.push(*half);
				continue;
			}
			changed = true;
			halves.push(
				rewritten
					.to_half()
					.map_err(|n_vars| CompileError::GateCapacityExceeded { n_vars })?,
			);
		}

		let simplified = simplify(&GateList::new(halves, input.n_vars))?;
		Ok(PassOutcome {
			output: simplified.output,
			changed: changed || simplified.changed,
		})
	}
}

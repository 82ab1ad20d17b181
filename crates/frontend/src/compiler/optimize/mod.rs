// Copyright 2025 Irreducible Inc.
//! The optimization pipeline.
//!
//! Every pass is a pure function from one [`GateList`] to another. The pipeline runs the passes
//! in a fixed order until none of them reports a change or the iteration bound is reached. The
//! input list is never mutated, which lets the safety cross-check compare the recorded list with
//! the result and replay the pipeline pass by pass when they disagree.

use std::{fmt, str::FromStr};

use ark_ff::PrimeField;
use cranelift_entity::EntityRef;

use crate::{
	compiler::{
		Options,
		equivalence::Classes,
		gate::WireHalf,
		var_arena::{Var, VarArena},
	},
	error::CompileError,
};

mod chain;
mod simplify;
pub mod stat;
mod unify;

pub use stat::PipelineStat;

/// Identifies a pass in statistics and in [`CompileError::OptimizerUnsoundness`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PassKind {
	/// Removes tautologies and halves implied by an identical retained half.
	AlgebraicSimplification,
	/// Merges linear halves linked by single-use intermediates.
	AdditionChainCollapse,
	/// Rewrites variables to their equivalence class representative.
	VariableUnification,
}

impl fmt::Display for PassKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			PassKind::AlgebraicSimplification => "AlgebraicSimplification",
			PassKind::AdditionChainCollapse => "AdditionChainCollapse",
			PassKind::VariableUnification => "VariableUnification",
		};
		f.write_str(name)
	}
}

/// Which passes the pipeline runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OptimizationLevel {
	/// Emit the recorded halves as they are.
	None,
	/// Simplification and chain collapsing.
	Basic,
	/// Everything, including variable unification.
	#[default]
	Aggressive,
}

impl OptimizationLevel {
	fn passes(self) -> &'static [PassKind] {
		match self {
			OptimizationLevel::None => &[],
			OptimizationLevel::Basic => {
				&[PassKind::AlgebraicSimplification, PassKind::AdditionChainCollapse]
			}
			OptimizationLevel::Aggressive => &[
				PassKind::AlgebraicSimplification,
				PassKind::AdditionChainCollapse,
				PassKind::VariableUnification,
			],
		}
	}
}

impl FromStr for OptimizationLevel {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"none" | "0" => Ok(OptimizationLevel::None),
			"basic" | "1" => Ok(OptimizationLevel::Basic),
			"aggressive" | "2" => Ok(OptimizationLevel::Aggressive),
			other => Err(format!("unknown optimization level `{other}`")),
		}
	}
}

/// The unit the passes transform: an ordered list of halves plus the number of variables in use.
#[derive(Clone, PartialEq, Eq)]
pub(crate) struct GateList<F> {
	pub halves: Vec<WireHalf<F>>,
	pub n_vars: usize,
}

impl<F: PrimeField> fmt::Debug for GateList<F> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("GateList")
			.field("halves", &self.halves)
			.field("n_vars", &self.n_vars)
			.finish()
	}
}

impl<F> GateList<F> {
	pub fn new(halves: Vec<WireHalf<F>>, n_vars: usize) -> Self {
		Self { halves, n_vars }
	}

	/// Allocates an internal variable past every variable in use.
	pub fn fresh_var(&mut self) -> Var {
		let var = Var::new(self.n_vars);
		self.n_vars += 1;
		var
	}
}

/// Read-only facts about the build that the passes may rely on.
pub(crate) struct PassContext<'a> {
	pub arena: &'a VarArena,
	pub classes: &'a Classes,
}

pub(crate) struct PassOutcome<F> {
	pub output: GateList<F>,
	pub changed: bool,
}

/// A certified-equivalence rewrite of a gate list.
///
/// Implementations must keep the set of satisfying assignments, projected onto the variables
/// both lists share, exactly the same.
pub(crate) trait Pass<F: PrimeField> {
	fn kind(&self) -> PassKind;

	fn run(&self, input: &GateList<F>, cx: &PassContext<'_>) -> Result<PassOutcome<F>, CompileError>;
}

fn instantiate<F: PrimeField>(kind: PassKind) -> Box<dyn Pass<F>> {
	match kind {
		PassKind::AlgebraicSimplification => Box::new(simplify::AlgebraicSimplification),
		PassKind::AdditionChainCollapse => Box::new(chain::AdditionChainCollapse),
		PassKind::VariableUnification => Box::new(unify::VariableUnification),
	}
}

/// Callback invoked after every pass that changed the list, with the list before and after.
pub(crate) type Observer<'o, F> =
	dyn FnMut(PassKind, &GateList<F>, &GateList<F>) -> Result<(), CompileError> + 'o;

/// The optimization strategy, fixed when the builder is created.
pub(crate) struct Pipeline<F> {
	passes: Vec<Box<dyn Pass<F>>>,
	max_passes: usize,
}

impl<F: PrimeField> Pipeline<F> {
	pub fn new(opts: &Options) -> Self {
		Self {
			passes: opts.level.passes().iter().map(|&kind| instantiate(kind)).collect(),
			max_passes: opts.max_passes,
		}
	}

	pub fn run(
		&self,
		input: GateList<F>,
		cx: &PassContext<'_>,
	) -> Result<(GateList<F>, PipelineStat), CompileError> {
		self.run_observed(input, cx, &mut |_, _, _| Ok(()))
	}

	/// Runs the pipeline, calling `observer` after every pass that reported a change.
	pub fn run_observed(
		&self,
		input: GateList<F>,
		cx: &PassContext<'_>,
		observer: &mut Observer<'_, F>,
	) -> Result<(GateList<F>, PipelineStat), CompileError> {
		let mut stat = PipelineStat::new(input.halves.len());
		let mut current = input;

		for iteration in 0..self.max_passes {
			let mut changed = false;
			for pass in &self.passes {
				let outcome = pass.run(&current, cx)?;
				stat.note_run(pass.kind(), &current, &outcome);
				if !outcome.changed {
					continue;
				}
				tracing::debug!(
					pass = %pass.kind(),
					iteration,
					before = current.halves.len(),
					after = outcome.output.halves.len(),
					"pass changed the gate list"
				);
				observer(pass.kind(), &current, &outcome.output)?;
				current = outcome.output;
				changed = true;
			}
			stat.iterations = iteration + 1;
			if !changed {
				stat.reached_fixpoint = true;
				break;
			}
		}

		stat.halves_after = current.halves.len();
		Ok((current, stat))
	}
}

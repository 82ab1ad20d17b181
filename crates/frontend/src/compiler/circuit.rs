// Copyright 2025 Irreducible Inc.
use std::{error, fmt};

use ark_ff::PrimeField;
use cranelift_entity::{EntityRef, SecondaryMap};
use rand::{SeedableRng, rngs::StdRng};
use trellis_core::{ConstraintSystem, VarIndex, verify::verify_half};

use crate::compiler::{
	dump::{self, Recorded},
	export::ExportedSystem,
	expr::{Expr, ExprArena, ExprNode},
	gate::WireHalf,
	optimize::PipelineStat,
	solver::Solver,
	var_arena::{Var, VarArena},
};

/// Cap on the number of messages kept in a [`PopulateError`].
const MAX_ASSERTION_MESSAGES: usize = 100;

/// Error returned when populating the witness fails because some half is not satisfied.
#[derive(Debug)]
pub struct PopulateError {
	/// List of failure messages (limited to `MAX_ASSERTION_MESSAGES`).
	pub messages: Vec<String>,
	/// Total count of failing halves (may exceed messages.len()).
	pub total_count: usize,
}

impl fmt::Display for PopulateError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		writeln!(f, "constraints failed:")?;
		for message in &self.messages {
			writeln!(f, "{message}")?;
		}
		if self.total_count > self.messages.len() {
			writeln!(f, "(Some failures are omitted. Total: {})", self.total_count)?;
		}
		Ok(())
	}
}

impl error::Error for PopulateError {}

/// A helper struct for filling witness values in a circuit.
///
/// Assign the inputs with [`set`](Self::set), then call [`Circuit::populate_witness`] to solve
/// for everything else.
pub struct WitnessFiller<'a, F: PrimeField> {
	pub(crate) circuit: &'a Circuit<F>,
	values: SecondaryMap<Var, Option<F>>,
}

impl<'a, F: PrimeField> WitnessFiller<'a, F> {
	/// Assigns a value to a variable.
	///
	/// # Panics
	///
	/// Panics if `expr` is not a bare variable of this circuit.
	pub fn set(&mut self, expr: Expr, value: F) {
		let Some(var) = self.circuit.var_of(expr) else {
			panic!("{expr} is not a variable of this circuit");
		};
		self.values[var] = Some(value);
	}

	/// Evaluates an expression over the current values.
	///
	/// Returns `None` if the expression depends on a variable that has no value. After
	/// [`Circuit::populate_witness`] this includes variables the optimizer eliminated, since
	/// they are solved from the recorded halves.
	pub fn value(&self, expr: Expr) -> Option<F> {
		let lc = self.circuit.exprs.reduce(expr);
		lc.terms()
			.iter()
			.try_fold(lc.constant_term(), |acc, &(var, coeff)| Some(acc + coeff * self.get(var)?))
	}

	fn get(&self, var: Var) -> Option<F> {
		self.values.get(var).copied().flatten()
	}

	/// The assignment of the constraint system. Unassigned variables are zero.
	fn assignment(&self) -> Vec<F> {
		(0..self.circuit.constraint_system.variable_count())
			.map(|index| self.get(Var::new(index)).unwrap_or_else(F::zero))
			.collect()
	}

	/// Destructs the witness filler and extracts the assignment, one value per variable.
	pub fn into_values(self) -> Vec<F> {
		self.assignment()
	}
}

/// An artifact that represents a built circuit.
///
/// The difference from [`ConstraintSystem`] is that a circuit retains enough information to
/// solve for internal values, to map expressions to variable indices and to describe where
/// its gates come from.
pub struct Circuit<F: PrimeField> {
	constraint_system: ConstraintSystem<F>,
	halves: Vec<WireHalf<F>>,
	recorded_halves: Vec<WireHalf<F>>,
	arena: VarArena,
	exprs: ExprArena<F>,
	recorded: Recorded,
	pipeline_stat: PipelineStat,
}

impl<F: PrimeField> Circuit<F> {
	/// Only used during building by the circuit builder.
	pub(super) fn new(
		constraint_system: ConstraintSystem<F>,
		halves: Vec<WireHalf<F>>,
		recorded_halves: Vec<WireHalf<F>>,
		arena: VarArena,
		exprs: ExprArena<F>,
		recorded: Recorded,
		pipeline_stat: PipelineStat,
	) -> Self {
		Self {
			constraint_system,
			halves,
			recorded_halves,
			arena,
			exprs,
			recorded,
			pipeline_stat,
		}
	}

	fn var_of(&self, expr: Expr) -> Option<Var> {
		match self.exprs.get(expr)? {
			ExprNode::Var(var) => Some(*var),
			_ => None,
		}
	}

	/// For an expression that is a bare variable, returns its index in the assignment.
	pub fn var_index(&self, expr: Expr) -> Option<VarIndex> {
		self.var_of(expr).map(|var| VarIndex(var.as_u32()))
	}

	/// Creates a new witness filler for this circuit.
	pub fn new_witness_filler(&self) -> WitnessFiller<'_, F> {
		WitnessFiller {
			circuit: self,
			values: SecondaryMap::new(),
		}
	}

	/// Populates the values that were not assigned in the witness.
	///
	/// Every half with a single unknown is solved for it until nothing is left to solve.
	/// Variables that no half determines get an arbitrary value. The recorded halves are solved
	/// the same way afterwards, which assigns the variables the optimizer eliminated. Finally,
	/// every half of the constraint system is checked.
	///
	/// # Errors
	///
	/// In case the circuit is not satisfied by the result, this function will return an error
	/// with a list of failing halves.
	pub fn populate_witness(&self, w: &mut WitnessFiller<'_, F>) -> Result<(), PopulateError> {
		let mut rng = StdRng::seed_from_u64(0);
		let optimized = Solver::new(&self.halves, &self.arena).solve(w.values.clone(), &mut rng);
		let recorded =
			Solver::new(&self.recorded_halves, &self.arena).solve(optimized.values, &mut rng);
		w.values = recorded.values;

		let values = w.assignment();
		let mut messages = Vec::new();
		let mut total_count = 0;
		for (gate_index, gate) in self.constraint_system.gates().iter().enumerate() {
			for (half_index, half) in gate.halves().enumerate() {
				if let Err(err) = verify_half(half, &values) {
					total_count += 1;
					if messages.len() < MAX_ASSERTION_MESSAGES {
						messages.push(format!("gate #{gate_index}.{half_index}: {err}"));
					}
				}
			}
		}
		if total_count > 0 {
			return Err(PopulateError {
				messages,
				total_count,
			});
		}
		Ok(())
	}

	/// Returns the constraint system for this circuit.
	pub fn constraint_system(&self) -> &ConstraintSystem<F> {
		&self.constraint_system
	}

	/// Consumes the circuit, returning its constraint system.
	pub fn into_constraint_system(self) -> ConstraintSystem<F> {
		self.constraint_system
	}

	/// Returns the number of rows in this circuit.
	pub fn n_gates(&self) -> usize {
		self.constraint_system.n_gates()
	}

	/// Returns the number of halves over all rows.
	pub fn n_halves(&self) -> usize {
		self.constraint_system.n_halves()
	}

	/// Returns the number of halves recorded before optimization.
	pub fn n_recorded_halves(&self) -> usize {
		self.recorded.n_halves()
	}

	/// Returns the number of public inputs, which occupy the first variable indices.
	pub fn public_input_size(&self) -> usize {
		self.constraint_system.public_input_size()
	}

	/// The content digest of the constraint system.
	pub fn digest(&self) -> &[u8; 32] {
		self.constraint_system.digest()
	}

	/// What the optimization pipeline did.
	pub fn pipeline_stat(&self) -> &PipelineStat {
		&self.pipeline_stat
	}

	/// Exports the constraint system in an implementation-agnostic form.
	pub fn export(&self) -> ExportedSystem {
		ExportedSystem::from_constraint_system(&self.constraint_system)
	}

	/// [`export`](Self::export), as pretty-printed JSON.
	pub fn export_json(&self) -> String {
		self.export().to_json()
	}

	/// Returns a string with a JSON dump that is useful to profile the circuit.
	///
	/// The dump breaks the recorded halves down by subcircuit, cumulatively over children.
	pub fn simple_json_dump(&self) -> String {
		dump::dump_composition(&self.recorded)
	}
}

// Copyright 2025 Irreducible Inc.

//! Circuit statistics module for analyzing gate counts and optimizer behavior.

use std::{collections::BTreeMap, fmt};

use ark_ff::PrimeField;

use crate::compiler::{PassKind, circuit::Circuit};

/// Various stats of a circuit that affect the prover performance.
pub struct CircuitStat {
	/// Number of rows in the constraint system.
	///
	/// Directly proportional to the size of the proving key.
	pub n_gates: usize,
	/// Number of halves over all rows.
	pub n_halves: usize,
	/// Number of halves without a product term.
	pub n_linear_halves: usize,
	/// Number of halves with a product term.
	pub n_bilinear_halves: usize,
	/// Number of rows holding two halves.
	pub n_double_rows: usize,
	/// Number of halves recorded before optimization.
	pub n_recorded_halves: usize,
	/// Number of public input values in the circuit.
	pub public_input_size: usize,
	/// Length of the assignment vector.
	pub variable_count: usize,
	/// Iterations the optimization pipeline ran.
	pub iterations: usize,
	/// Whether the pipeline stopped at a fixpoint rather than at its iteration bound.
	pub reached_fixpoint: bool,
	/// `(removed, added)` halves per pass.
	pub by_pass: BTreeMap<PassKind, (usize, usize)>,
}

impl CircuitStat {
	/// Creates a new `CircuitStat` instance by collecting statistics from the given circuit.
	pub fn collect<F: PrimeField>(circuit: &Circuit<F>) -> Self {
		let cs = circuit.constraint_system();
		let mut n_linear_halves = 0;
		let mut n_double_rows = 0;
		for gate in cs.gates() {
			if gate.second.is_some() {
				n_double_rows += 1;
			}
			n_linear_halves += gate.halves().filter(|half| half.is_linear()).count();
		}

		let pipeline = circuit.pipeline_stat();
		Self {
			n_gates: cs.n_gates(),
			n_halves: cs.n_halves(),
			n_linear_halves,
			n_bilinear_halves: cs.n_halves() - n_linear_halves,
			n_double_rows,
			n_recorded_halves: circuit.n_recorded_halves(),
			public_input_size: cs.public_input_size(),
			variable_count: cs.variable_count(),
			iterations: pipeline.iterations,
			reached_fixpoint: pipeline.reached_fixpoint,
			by_pass: pipeline
				.by_pass
				.iter()
				.map(|(&pass, counters)| (pass, (counters.removed, counters.added)))
				.collect(),
		}
	}
}

impl fmt::Display for CircuitStat {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		// Helper to format numbers with commas
		fn fmt_num(n: usize) -> String {
			let s = n.to_string();
			let mut result = String::new();
			for (i, c) in s.chars().rev().enumerate() {
				if i > 0 && i % 3 == 0 {
					result.push(',');
				}
				result.push(c);
			}
			result.chars().rev().collect()
		}

		writeln!(f, "Gates")?;
		writeln!(f, "├─ Rows: {}", fmt_num(self.n_gates))?;
		writeln!(f, "│  └─ Holding two halves: {}", fmt_num(self.n_double_rows))?;
		writeln!(f, "└─ Halves: {}", fmt_num(self.n_halves))?;
		writeln!(f, "   ├─ Linear: {}", fmt_num(self.n_linear_halves))?;
		writeln!(f, "   └─ Bilinear: {}", fmt_num(self.n_bilinear_halves))?;
		writeln!(f)?;

		writeln!(f, "Variables")?;
		writeln!(f, "├─ Public inputs: {}", fmt_num(self.public_input_size))?;
		writeln!(f, "└─ Total: {}", fmt_num(self.variable_count))?;
		writeln!(f)?;

		let fixpoint = if self.reached_fixpoint {
			"fixpoint"
		} else {
			"iteration bound"
		};
		writeln!(f, "Optimization")?;
		writeln!(
			f,
			"├─ Halves: {} recorded, {} emitted",
			fmt_num(self.n_recorded_halves),
			fmt_num(self.n_halves)
		)?;
		writeln!(f, "├─ Iterations: {} (stopped at {fixpoint})", self.iterations)?;
		let n_passes = self.by_pass.len();
		for (i, (pass, (removed, added))) in self.by_pass.iter().enumerate() {
			let branch = if i + 1 == n_passes { "└─" } else { "├─" };
			writeln!(f, "{branch} {pass}: -{} +{}", fmt_num(*removed), fmt_num(*added))?;
		}
		if n_passes == 0 {
			writeln!(f, "└─ No passes ran")?;
		}
		Ok(())
	}
}

// Copyright 2025 Irreducible Inc.
use std::{collections::BTreeMap, fmt};

use super::{GateList, PassKind, PassOutcome};

/// Per-pass counters.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct PassCounters {
	/// How many times the pass ran.
	pub runs: usize,
	/// How many runs reported a change.
	pub changes: usize,
	/// Net number of halves removed over all runs.
	pub removed: usize,
	/// Net number of halves added over all runs.
	pub added: usize,
}

impl fmt::Debug for PassCounters {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("PassCounters")
			.field("runs", &self.runs)
			.field("changes", &self.changes)
			.field("removed", &self.removed)
			.field("added", &self.added)
			.finish()
	}
}

/// What the optimization pipeline did during one build.
#[derive(Clone, Default)]
pub struct PipelineStat {
	/// Halves recorded before optimization.
	pub halves_before: usize,
	/// Halves left after optimization.
	pub halves_after: usize,
	/// Number of iterations over the pass list.
	pub iterations: usize,
	/// Whether the last iteration made no change. `false` means the iteration bound was hit.
	pub reached_fixpoint: bool,
	/// Counters keyed by pass, in pipeline order.
	pub by_pass: BTreeMap<PassKind, PassCounters>,
}

impl PipelineStat {
	pub(crate) fn new(halves_before: usize) -> Self {
		Self {
			halves_before,
			halves_after: halves_before,
			..Self::default()
		}
	}

	pub(crate) fn note_run<F>(&mut self, kind: PassKind, input: &GateList<F>, outcome: &PassOutcome<F>) {
		let counters = self.by_pass.entry(kind).or_default();
		counters.runs += 1;
		if outcome.changed {
			counters.changes += 1;
			let before = input.halves.len();
			let after = outcome.output.halves.len();
			counters.removed += before.saturating_sub(after);
			counters.added += after.saturating_sub(before);
		}
	}
}

impl fmt::Debug for PipelineStat {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("PipelineStat")
			.field("halves_before", &self.halves_before)
			.field("halves_after", &self.halves_after)
			.field("iterations", &self.iterations)
			.field("reached_fixpoint", &self.reached_fixpoint)
			.field("by_pass", &self.by_pass)
			.finish()
	}
}

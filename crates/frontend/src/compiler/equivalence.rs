// Copyright 2025 Irreducible Inc.
//! Union-find over variables proven equal.
//!
//! The representative of a class is always its smallest variable. Public inputs are allocated
//! first, so a class that contains a public input is represented by one.

use ark_ff::PrimeField;
use cranelift_entity::{EntitySet, SecondaryMap};

use crate::{
	compiler::{
		lincom::{Binding, LinearCombination},
		var_arena::Var,
	},
	error::CompileError,
};

pub(crate) struct EquivalenceEngine<F: PrimeField> {
	parent: SecondaryMap<Var, Option<Var>>,
	/// Constant annotations, keyed by class representative.
	fixed: SecondaryMap<Var, Option<F>>,
	/// Representatives whose annotation has been disabled because a member was used as a
	/// multiplication operand.
	revoked: EntitySet<Var>,
	n_unions: usize,
}

impl<F: PrimeField> EquivalenceEngine<F> {
	pub fn new() -> Self {
		Self {
			parent: SecondaryMap::new(),
			fixed: SecondaryMap::new(),
			revoked: EntitySet::new(),
			n_unions: 0,
		}
	}

	/// Returns the representative of `var`, compressing the path on the way.
	pub fn find(&mut self, var: Var) -> Var {
		let mut root = var;
		while let Some(parent) = self.parent[root] {
			root = parent;
		}
		let mut current = var;
		while let Some(parent) = self.parent[current] {
			if parent != root {
				self.parent[current] = Some(root);
			}
			current = parent;
		}
		root
	}

	/// Merges the classes of `a` and `b` given the difference `d = a - b` that was asserted to be
	/// zero.
	///
	/// Only the pure alias shape `1·a + (−1)·b + 0` is accepted. Anything else relates the two
	/// variables in a way a class cannot express and is rejected with
	/// [`CompileError::InvalidUnification`].
	pub fn union(&mut self, d: &LinearCombination<F>) -> Result<Var, CompileError> {
		let Some((a, b)) = d.as_alias() else {
			return Err(CompileError::InvalidUnification {
				shape: format!("{d:?} = 0"),
			});
		};
		let ra = self.find(a);
		let rb = self.find(b);
		if ra == rb {
			return Ok(ra);
		}
		let (rep, child) = (ra.min(rb), ra.max(rb));
		self.parent[child] = Some(rep);
		self.n_unions += 1;

		if self.revoked.contains(child) {
			self.revoked.insert(rep);
		}
		if self.fixed[rep].is_none() {
			self.fixed[rep] = self.fixed[child];
		}
		Ok(rep)
	}

	/// Records `var = value`.
	///
	/// Returns `false` if the class already carries a different active annotation. Annotations
	/// on revoked classes are ignored.
	pub fn annotate(&mut self, var: Var, value: F) -> bool {
		let rep = self.find(var);
		if self.revoked.contains(rep) {
			return true;
		}
		match self.fixed[rep] {
			Some(existing) => existing == value,
			None => {
				self.fixed[rep] = Some(value);
				true
			}
		}
	}

	/// Disables the annotation of the class of `var` for the rest of the build.
	pub fn revoke(&mut self, var: Var) {
		let rep = self.find(var);
		self.revoked.insert(rep);
	}

	/// The constant `var` is known to equal, if the annotation is active.
	pub fn fixed_value(&mut self, var: Var) -> Option<F> {
		let rep = self.find(var);
		if self.revoked.contains(rep) {
			return None;
		}
		self.fixed[rep]
	}

	/// Rewrites every variable to its representative and folds in active constant annotations.
	pub fn canonicalize(&mut self, lc: &LinearCombination<F>) -> LinearCombination<F> {
		lc.substitute(|var| match self.fixed_value(var) {
			Some(value) => Binding::Constant(value),
			None => Binding::Var(self.find(var)),
		})
	}

	pub fn n_unions(&self) -> usize {
		self.n_unions
	}

	/// Freezes the current classes for use by the optimization passes.
	pub fn classes(&mut self, n_vars: usize) -> Classes {
		let mut rep = SecondaryMap::with_capacity(n_vars);
		for index in 0..n_vars {
			let var = Var::from_u32(index as u32);
			let root = self.find(var);
			if root != var {
				rep[var] = Some(root);
			}
		}
		Classes { rep }
	}
}

/// Read-only snapshot of the equivalence classes at the end of recording.
#[derive(Default)]
pub(crate) struct Classes {
	rep: SecondaryMap<Var, Option<Var>>,
}

impl Classes {
	pub fn representative(&self, var: Var) -> Var {
		self.rep.get(var).copied().flatten().unwrap_or(var)
	}
}

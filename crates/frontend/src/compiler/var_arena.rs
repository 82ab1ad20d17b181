// Copyright 2025 Irreducible Inc.
use cranelift_entity::{PrimaryMap, entity_impl};

/// A symbolic circuit variable.
///
/// Variables carry no value at compile time. Their identity is the id, which is also their index
/// in the assignment vector of the final constraint system.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Var(u32);
entity_impl!(Var, "v");

/// Who supplies the value of a variable.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VarKind {
	/// Part of the proven statement. Occupies the id prefix.
	Public,
	/// Private input of the prover.
	Witness,
	/// Auxiliary variable introduced by the compiler.
	Internal,
}

/// Monotonic allocator of variables for a single build.
pub(crate) struct VarArena {
	kinds: PrimaryMap<Var, VarKind>,
	n_public: usize,
}

impl VarArena {
	pub fn new() -> Self {
		Self {
			kinds: PrimaryMap::new(),
			n_public: 0,
		}
	}

	/// Assigns the next id.
	///
	/// # Panics
	///
	/// Panics when a public input is requested after any other variable, since that would break
	/// the public prefix.
	pub fn allocate(&mut self, kind: VarKind) -> Var {
		if kind == VarKind::Public {
			assert!(
				self.kinds.len() == self.n_public,
				"public inputs must be declared before any other variable (found {} variables)",
				self.kinds.len()
			);
			self.n_public += 1;
		}
		self.kinds.push(kind)
	}

	/// Kind of the given variable.
	///
	/// Variables past the end of the arena were allocated by an optimization pass and are
	/// internal.
	pub fn kind(&self, var: Var) -> VarKind {
		self.kinds.get(var).copied().unwrap_or(VarKind::Internal)
	}

	pub fn is_public(&self, var: Var) -> bool {
		self.kind(var) == VarKind::Public
	}

	pub fn len(&self) -> usize {
		self.kinds.len()
	}

	pub fn n_public(&self) -> usize {
		self.n_public
	}

	pub fn count(&self, kind: VarKind) -> usize {
		self.kinds.values().filter(|k| **k == kind).count()
	}
}

impl Default for VarArena {
	fn default() -> Self {
		Self::new()
	}
}

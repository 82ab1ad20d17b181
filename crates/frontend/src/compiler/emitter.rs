// Copyright 2025 Irreducible Inc.
use ark_ff::PrimeField;
use trellis_core::consts::GENERIC_WIRES;

use crate::{
	compiler::{
		gate::{Relation, WireHalf},
		lincom::LinearCombination,
		namespace::Namespace,
		var_arena::Var,
	},
	error::CompileError,
};

/// Append-only list of generic halves recorded during a build, along with the namespace each
/// half originates from.
pub(crate) struct GateEmitter<F> {
	halves: Vec<WireHalf<F>>,
	origins: Vec<Namespace>,
}

impl<F: PrimeField> GateEmitter<F> {
	pub fn new() -> Self {
		Self {
			halves: Vec::new(),
			origins: Vec::new(),
		}
	}

	/// Appends `sl·l + sr·r + so·o + sm·l·r + sc = 0`.
	///
	/// The half is laid out canonically, so the slot a variable is supplied in does not matter.
	/// A nonzero `sm` requires both `l` and `r`.
	pub fn emit_generic(
		&mut self,
		origin: Namespace,
		l: Option<Var>,
		r: Option<Var>,
		o: Option<Var>,
		[sl, sr, so, sm, sc]: [F; 5],
	) -> Result<(), CompileError> {
		let linear = LinearCombination::from_terms(
			[l.map(|l| (l, sl)), r.map(|r| (r, sr)), o.map(|o| (o, so))]
				.into_iter()
				.flatten(),
			sc,
		);
		let relation = match (l, r) {
			(Some(l), Some(r)) if !sm.is_zero() => Relation::bilinear(sm, l, r, linear),
			_ => {
				debug_assert!(sm.is_zero(), "product term requires both operands");
				Relation::linear(linear)
			}
		};
		let half = to_half(&relation)?;
		tracing::trace!(index = self.halves.len(), ?half, "emit");
		self.halves.push(half);
		self.origins.push(origin);
		Ok(())
	}

	/// Appends `x·y = z`. The constant of `z` lands in `sc`.
	pub fn emit_bilinear(
		&mut self,
		origin: Namespace,
		x: Var,
		y: Var,
		z: &LinearCombination<F>,
	) -> Result<(), CompileError> {
		let relation = Relation::bilinear(F::one(), x, y, z.scale(-F::one()));
		self.emit_half(origin, to_half(&relation)?)
	}

	/// Appends a relation, chaining it through fresh internal variables when it is linear and
	/// spans more variables than one half has wires.
	///
	/// Returns the number of halves appended.
	pub fn emit_relation(
		&mut self,
		origin: Namespace,
		relation: &Relation<F>,
		fresh: impl FnMut() -> Var,
	) -> Result<usize, CompileError> {
		if relation.fits() {
			self.emit_half(origin, to_half(relation)?)?;
			return Ok(1);
		}
		if relation.product.is_some() {
			return Err(CompileError::GateCapacityExceeded {
				n_vars: relation.vars().len(),
			});
		}
		let chain = chain_linear(&relation.linear, fresh);
		let n = chain.len();
		for link in &chain {
			self.emit_half(origin, to_half(link)?)?;
		}
		Ok(n)
	}

	fn emit_half(&mut self, origin: Namespace, half: WireHalf<F>) -> Result<(), CompileError> {
		let [l, r, o] = half.wires;
		self.emit_generic(origin, l, r, o, half.coeffs)
	}

	/// Consumes the emitter, returning the halves and their origins.
	pub fn into_parts(self) -> (Vec<WireHalf<F>>, Vec<Namespace>) {
		(self.halves, self.origins)
	}
}

impl<F: PrimeField> Default for GateEmitter<F> {
	fn default() -> Self {
		Self::new()
	}
}

fn to_half<F: PrimeField>(relation: &Relation<F>) -> Result<WireHalf<F>, CompileError> {
	relation
		.to_half()
		.map_err(|n_vars| CompileError::GateCapacityExceeded { n_vars })
}

/// Number of halves needed for a linear relation over `n_vars` variables.
pub(crate) fn chain_len(n_vars: usize) -> usize {
	if n_vars <= GENERIC_WIRES {
		1
	} else {
		n_vars - 2
	}
}

/// Splits `lc = 0` into relations of at most three variables each.
///
/// ```text
/// c0·v0 + c1·v1 + k - s1 = 0
/// s1 + c2·v2 - s2 = 0
/// ...
/// s(n-3) + c(n-2)·v(n-2) + c(n-1)·v(n-1) = 0
/// ```
///
/// Each link shares exactly one fresh variable with its successor.
pub(crate) fn chain_linear<F: PrimeField>(
	lc: &LinearCombination<F>,
	mut fresh: impl FnMut() -> Var,
) -> Vec<Relation<F>> {
	let terms = lc.terms();
	let k = terms.len();
	if k <= GENERIC_WIRES {
		return vec![Relation::linear(lc.clone())];
	}

	let mut links = Vec::with_capacity(chain_len(k));
	let mut acc = fresh();
	links.push(Relation::linear(LinearCombination::from_terms(
		[terms[0], terms[1], (acc, -F::one())],
		lc.constant_term(),
	)));
	for &term in &terms[2..k - 2] {
		let next = fresh();
		links.push(Relation::linear(LinearCombination::from_terms(
			[(acc, F::one()), term, (next, -F::one())],
			F::zero(),
		)));
		acc = next;
	}
	links.push(Relation::linear(LinearCombination::from_terms(
		[(acc, F::one()), terms[k - 2], terms[k - 1]],
		F::zero(),
	)));
	links
}

// Copyright 2025 Irreducible Inc.
//! Generic halves over compiler variables and the relations they encode.

use std::fmt;

use ark_ff::PrimeField;
use smallvec::SmallVec;
use trellis_core::{
	GenericHalf, VarIndex,
	consts::{COEFF_C, COEFF_L, COEFF_M, COEFF_O, COEFF_R, GENERIC_WIRES, WIRE_L, WIRE_O, WIRE_R},
};

use crate::compiler::{lincom::LinearCombination, var_arena::Var};

/// A generic half whose wires are still compiler variables.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct WireHalf<F> {
	pub wires: [Option<Var>; GENERIC_WIRES],
	pub coeffs: [F; 5],
}

impl<F: PrimeField> WireHalf<F> {
	pub fn is_linear(&self) -> bool {
		self.coeffs[COEFF_M].is_zero()
	}

	/// Distinct variables of the half, in slot order.
	pub fn vars(&self) -> SmallVec<[Var; GENERIC_WIRES]> {
		let mut vars = SmallVec::new();
		for var in self.wires.iter().flatten() {
			if !vars.contains(var) {
				vars.push(*var);
			}
		}
		vars
	}

	/// The operands of the product term.
	pub fn product_vars(&self) -> Option<(Var, Var)> {
		if self.is_linear() {
			return None;
		}
		Some((self.wires[WIRE_L]?, self.wires[WIRE_R]?))
	}

	/// The relation `sl·l + sr·r + so·o + sm·l·r + sc = 0` this half encodes.
	pub fn relation(&self) -> Relation<F> {
		let linear = LinearCombination::from_terms(
			[
				(self.wires[WIRE_L], self.coeffs[COEFF_L]),
				(self.wires[WIRE_R], self.coeffs[COEFF_R]),
				(self.wires[WIRE_O], self.coeffs[COEFF_O]),
			]
			.into_iter()
			.filter_map(|(wire, coeff)| Some((wire?, coeff))),
			self.coeffs[COEFF_C],
		);
		match self.product_vars() {
			Some((l, r)) => Relation::bilinear(self.coeffs[COEFF_M], l, r, linear),
			None => Relation::linear(linear),
		}
	}

	pub fn to_half(&self) -> GenericHalf<F> {
		GenericHalf {
			wires: self.wires.map(|wire| wire.map(|var| VarIndex(var.as_u32()))),
			coeffs: self.coeffs,
		}
	}
}

impl<F: PrimeField> fmt::Debug for WireHalf<F> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{:?} = 0", self.relation())
	}
}

/// `m·a·b + Σ cᵢ·vᵢ + k = 0` with at most one product term.
#[derive(Clone, PartialEq, Eq, Hash)]
pub(crate) struct Relation<F> {
	/// `(m, a, b)` with `m ≠ 0` and `a ≤ b`.
	pub product: Option<(F, Var, Var)>,
	pub linear: LinearCombination<F>,
}

impl<F: PrimeField> Relation<F> {
	pub fn linear(linear: LinearCombination<F>) -> Self {
		Self {
			product: None,
			linear,
		}
	}

	pub fn bilinear(m: F, a: Var, b: Var, linear: LinearCombination<F>) -> Self {
		Self {
			product: (!m.is_zero()).then_some((m, a.min(b), a.max(b))),
			linear,
		}
	}

	/// `0 = 0`.
	pub fn is_tautology(&self) -> bool {
		self.product.is_none() && self.linear.as_constant().is_some_and(|k| k.is_zero())
	}

	/// `k = 0` for a nonzero `k`.
	pub fn is_contradiction(&self) -> bool {
		self.product.is_none() && self.linear.as_constant().is_some_and(|k| !k.is_zero())
	}

	/// Distinct variables, product operands first.
	pub fn vars(&self) -> SmallVec<[Var; 4]> {
		let mut vars = SmallVec::new();
		if let Some((_, a, b)) = self.product {
			vars.push(a);
			if b != a {
				vars.push(b);
			}
		}
		for var in self.linear.vars() {
			if !vars.contains(&var) {
				vars.push(var);
			}
		}
		vars
	}

	/// Whether `var` appears in the product term.
	pub fn in_product(&self, var: Var) -> bool {
		self.product.is_some_and(|(_, a, b)| a == var || b == var)
	}

	/// `x·self + y·other`, or `None` when the product terms cannot be combined into one.
	pub fn combine(&self, x: F, other: &Self, y: F) -> Option<Self> {
		let linear = self.linear.scale(x).add(&other.linear.scale(y));
		let product = match (self.product, other.product) {
			(None, None) => None,
			(Some((m, a, b)), None) => Some((m * x, a, b)),
			(None, Some((m, a, b))) => Some((m * y, a, b)),
			(Some((m1, a1, b1)), Some((m2, a2, b2))) if (a1, b1) == (a2, b2) => {
				Some((m1 * x + m2 * y, a1, b1))
			}
			_ => return None,
		};
		Some(match product {
			Some((m, a, b)) => Self::bilinear(m, a, b, linear),
			None => Self::linear(linear),
		})
	}

	pub fn map_vars(&self, mut map: impl FnMut(Var) -> Var) -> Self {
		let linear = LinearCombination::from_terms(
			self.linear
				.terms()
				.iter()
				.map(|(var, coeff)| (map(*var), *coeff)),
			self.linear.constant_term(),
		);
		match self.product {
			Some((m, a, b)) => Self::bilinear(m, map(a), map(b), linear),
			None => Self::linear(linear),
		}
	}

	/// Scales the relation so that its leading coefficient is one. Scalar multiples of one
	/// relation normalize to the same value.
	pub fn normalized(&self) -> Self {
		let lead = match (self.product, self.linear.terms().first()) {
			(Some((m, _, _)), _) => m,
			(None, Some((_, c))) => *c,
			(None, None) => self.linear.constant_term(),
		};
		let Some(inv) = lead.inverse() else {
			return self.clone();
		};
		Self {
			product: self.product.map(|(m, a, b)| (m * inv, a, b)),
			linear: self.linear.scale(inv),
		}
	}

	/// Lays the relation out as a single generic half.
	///
	/// Fails with the number of distinct variables when they do not fit the three wires.
	pub fn to_half(&self) -> Result<WireHalf<F>, usize> {
		let mut wires = [None; GENERIC_WIRES];
		let mut coeffs = [F::zero(); 5];
		coeffs[COEFF_C] = self.linear.constant_term();

		let mut slots = [COEFF_L, COEFF_R, COEFF_O].into_iter();
		if let Some((m, a, b)) = self.product {
			coeffs[COEFF_M] = m;
			wires[WIRE_L] = Some(a);
			wires[WIRE_R] = Some(b);
			coeffs[COEFF_L] = self.linear.coeff(a);
			if b != a {
				coeffs[COEFF_R] = self.linear.coeff(b);
			}
			slots.nth(1);
		}
		for &(var, coeff) in self.linear.terms() {
			if self.in_product(var) {
				continue;
			}
			let Some(slot) = slots.next() else {
				return Err(self.vars().len());
			};
			wires[slot] = Some(var);
			coeffs[slot] = coeff;
		}
		Ok(WireHalf { wires, coeffs })
	}

	/// Whether the relation fits a single half.
	///
	/// A product takes the L and R wires even when it is a square, so the linear variables
	/// outside the product only have the remaining slots.
	pub fn fits(&self) -> bool {
		let product_slots = if self.product.is_some() { 2 } else { 0 };
		let free = self
			.linear
			.terms()
			.iter()
			.filter(|(var, _)| !self.in_product(*var))
			.count();
		product_slots + free <= GENERIC_WIRES
	}
}

impl<F: PrimeField> fmt::Debug for Relation<F> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if let Some((m, a, b)) = self.product {
			write!(f, "{m}·{a}·{b} + ")?;
		}
		write!(f, "{:?}", self.linear)
	}
}

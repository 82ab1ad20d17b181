// Copyright 2025 Irreducible Inc.
//! Canonical linear combinations.

use std::fmt;

use ark_ff::{One, PrimeField, Zero};
use smallvec::SmallVec;

use crate::compiler::var_arena::Var;

/// `Σ cᵢ·vᵢ + k` with the terms sorted by variable, at most one term per variable and no zero
/// coefficients.
///
/// Two combinations denoting the same affine form are therefore structurally equal.
#[derive(Clone, PartialEq, Eq, Hash)]
pub(crate) struct LinearCombination<F> {
	terms: SmallVec<[(Var, F); 4]>,
	constant: F,
}

/// What a variable is replaced with by [`LinearCombination::substitute`].
pub(crate) enum Binding<F> {
	Var(Var),
	Constant(F),
}

impl<F: PrimeField> LinearCombination<F> {
	pub fn zero() -> Self {
		Self::constant(F::zero())
	}

	pub fn constant(constant: F) -> Self {
		Self {
			terms: SmallVec::new(),
			constant,
		}
	}

	pub fn var(var: Var) -> Self {
		Self::from_terms([(var, F::one())], F::zero())
	}

	/// Canonicalizes an arbitrary list of terms: sorts, sums coefficients on collision and drops
	/// the terms that cancel out.
	pub fn from_terms(terms: impl IntoIterator<Item = (Var, F)>, constant: F) -> Self {
		let mut raw: SmallVec<[(Var, F); 4]> = terms.into_iter().collect();
		raw.sort_by_key(|(var, _)| *var);

		let mut merged: SmallVec<[(Var, F); 4]> = SmallVec::with_capacity(raw.len());
		for (var, coeff) in raw {
			match merged.last_mut() {
				Some((last, acc)) if *last == var => *acc += coeff,
				_ => merged.push((var, coeff)),
			}
		}
		merged.retain(|(_, coeff)| !coeff.is_zero());

		Self {
			terms: merged,
			constant,
		}
	}

	pub fn terms(&self) -> &[(Var, F)] {
		&self.terms
	}

	pub fn constant_term(&self) -> F {
		self.constant
	}

	pub fn n_vars(&self) -> usize {
		self.terms.len()
	}

	pub fn vars(&self) -> impl Iterator<Item = Var> + '_ {
		self.terms.iter().map(|(var, _)| *var)
	}

	/// Coefficient of `var`, zero when absent.
	pub fn coeff(&self, var: Var) -> F {
		self.terms
			.binary_search_by_key(&var, |(v, _)| *v)
			.map_or_else(|_| F::zero(), |i| self.terms[i].1)
	}

	/// The value of the combination if it has collapsed to a constant.
	pub fn as_constant(&self) -> Option<F> {
		self.terms.is_empty().then_some(self.constant)
	}

	/// Decomposes `c·v + k` into `(c, v, k)`.
	pub fn as_affine(&self) -> Option<(F, Var, F)> {
		match self.terms.as_slice() {
			[(var, coeff)] => Some((*coeff, *var, self.constant)),
			_ => None,
		}
	}

	/// Whether this is exactly `1·v`.
	pub fn as_var(&self) -> Option<Var> {
		match self.as_affine() {
			Some((coeff, var, constant)) if coeff.is_one() && constant.is_zero() => Some(var),
			_ => None,
		}
	}

	/// Recognizes the pure alias shape `1·a + (−1)·b + 0` and returns `(a, b)`.
	pub fn as_alias(&self) -> Option<(Var, Var)> {
		if !self.constant.is_zero() {
			return None;
		}
		match self.terms.as_slice() {
			[(x, cx), (y, cy)] if cx.is_one() && (-*cy).is_one() => Some((*x, *y)),
			[(x, cx), (y, cy)] if (-*cx).is_one() && cy.is_one() => Some((*y, *x)),
			_ => None,
		}
	}

	pub fn add(&self, other: &Self) -> Self {
		Self::from_terms(
			self.terms.iter().chain(other.terms.iter()).copied(),
			self.constant + other.constant,
		)
	}

	pub fn sub(&self, other: &Self) -> Self {
		self.add(&other.scale(-F::one()))
	}

	pub fn scale(&self, factor: F) -> Self {
		if factor.is_zero() {
			return Self::zero();
		}
		Self {
			terms: self
				.terms
				.iter()
				.map(|(var, coeff)| (*var, *coeff * factor))
				.collect(),
			constant: self.constant * factor,
		}
	}

	/// Scales the combination so that its leading coefficient is one.
	///
	/// Constants are left untouched.
	pub fn normalized(&self) -> Self {
		match self.terms.first() {
			// The leading coefficient is nonzero by the canonical form invariant.
			Some((_, lead)) => match lead.inverse() {
				Some(inv) => self.scale(inv),
				None => self.clone(),
			},
			None => self.clone(),
		}
	}

	/// Replaces every variable according to `bind`.
	pub fn substitute(&self, mut bind: impl FnMut(Var) -> Binding<F>) -> Self {
		let mut constant = self.constant;
		let mut terms: SmallVec<[(Var, F); 4]> = SmallVec::with_capacity(self.terms.len());
		for (var, coeff) in &self.terms {
			match bind(*var) {
				Binding::Var(var) => terms.push((var, *coeff)),
				Binding::Constant(value) => constant += *coeff * value,
			}
		}
		Self::from_terms(terms, constant)
	}
}

impl<F: PrimeField> fmt::Debug for LinearCombination<F> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for (var, coeff) in &self.terms {
			write!(f, "{coeff}·{var} + ")?;
		}
		write!(f, "{}", self.constant)
	}
}

// Copyright 2025 Irreducible Inc.
//! Hash-consed arena of linear expressions.
//!
//! Linear operations never emit gates. They only record nodes here, which are reduced to a
//! [`LinearCombination`] when an operation needs the canonical form.

use std::collections::BTreeMap;

use ark_ff::{One, PrimeField, Zero};
use cranelift_entity::{PrimaryMap, entity_impl};
use rustc_hash::FxHashMap;

use crate::compiler::{
	lincom::LinearCombination,
	var_arena::Var,
};

/// Handle to a field-valued expression recorded by a
/// [`CircuitBuilder`](crate::CircuitBuilder).
///
/// Handles are cheap to copy and only meaningful for the builder that produced them.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Expr(u32);
entity_impl!(Expr, "e");

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum ExprNode<F> {
	Constant(F),
	Var(Var),
	Add(Expr, Expr),
	Scale(F, Expr),
}

/// Every node only refers to nodes with smaller ids, which holds because a node can only be built
/// from handles that already exist.
pub(crate) struct ExprArena<F> {
	nodes: PrimaryMap<Expr, ExprNode<F>>,
	interned: FxHashMap<ExprNode<F>, Expr>,
}

impl<F: PrimeField> ExprArena<F> {
	pub fn new() -> Self {
		Self {
			nodes: PrimaryMap::new(),
			interned: FxHashMap::default(),
		}
	}

	fn intern(&mut self, node: ExprNode<F>) -> Expr {
		if let Some(&expr) = self.interned.get(&node) {
			return expr;
		}
		let expr = self.nodes.push(node);
		self.interned.insert(node, expr);
		expr
	}

	pub fn node(&self, expr: Expr) -> &ExprNode<F> {
		&self.nodes[expr]
	}

	/// Like [`node`](Self::node), but tolerates handles from another arena.
	pub fn get(&self, expr: Expr) -> Option<&ExprNode<F>> {
		self.nodes.get(expr)
	}

	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	pub fn constant(&mut self, value: F) -> Expr {
		self.intern(ExprNode::Constant(value))
	}

	pub fn var(&mut self, var: Var) -> Expr {
		self.intern(ExprNode::Var(var))
	}

	pub fn add(&mut self, a: Expr, b: Expr) -> Expr {
		match (self.nodes[a], self.nodes[b]) {
			(ExprNode::Constant(x), ExprNode::Constant(y)) => self.constant(x + y),
			(ExprNode::Constant(x), _) if x.is_zero() => b,
			(_, ExprNode::Constant(y)) if y.is_zero() => a,
			// Addition commutes, order the operands so that both spellings share a node.
			_ => self.intern(ExprNode::Add(a.min(b), a.max(b))),
		}
	}

	pub fn scale(&mut self, factor: F, a: Expr) -> Expr {
		if factor.is_one() {
			return a;
		}
		if factor.is_zero() {
			return self.constant(F::zero());
		}
		match self.nodes[a] {
			ExprNode::Constant(x) => self.constant(factor * x),
			ExprNode::Scale(inner, e) => self.scale(factor * inner, e),
			_ => self.intern(ExprNode::Scale(factor, a)),
		}
	}

	/// Rebuilds an expression denoting `lc`.
	pub fn from_lincom(&mut self, lc: &LinearCombination<F>) -> Expr {
		let mut acc = self.constant(lc.constant_term());
		for &(var, coeff) in lc.terms() {
			let term = self.var(var);
			let term = self.scale(coeff, term);
			acc = self.add(acc, term);
		}
		acc
	}

	/// Reduces the expression to its canonical linear combination.
	///
	/// The expression DAG is walked from the highest id down, accumulating the weight with which
	/// each node contributes to the root. A node is visited after all of its parents, since
	/// parents always have larger ids, so shared subexpressions are processed exactly once and
	/// no recursion is involved.
	pub fn reduce(&self, root: Expr) -> LinearCombination<F> {
		let mut weights: BTreeMap<Expr, F> = BTreeMap::new();
		weights.insert(root, F::one());

		let mut terms = Vec::new();
		let mut constant = F::zero();
		while let Some((expr, weight)) = weights.pop_last() {
			if weight.is_zero() {
				continue;
			}
			match self.nodes[expr] {
				ExprNode::Constant(value) => constant += weight * value,
				ExprNode::Var(var) => terms.push((var, weight)),
				ExprNode::Add(a, b) => {
					*weights.entry(a).or_insert_with(F::zero) += weight;
					*weights.entry(b).or_insert_with(F::zero) += weight;
				}
				ExprNode::Scale(factor, a) => {
					*weights.entry(a).or_insert_with(F::zero) += weight * factor;
				}
			}
		}
		LinearCombination::from_terms(terms, constant)
	}
}

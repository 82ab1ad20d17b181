// Copyright 2025 Irreducible Inc.
//! Elimination of single-use internal variables.
//!
//! An internal variable referenced by exactly two halves, and only linearly, can be eliminated by
//! combining the two halves: if `A` has coefficient `a` on `t` and `B` has coefficient `b`, then
//! `b·A - a·B` no longer mentions `t`, and since `t` appears nowhere else the pair is equivalent
//! to the combination for every assignment of the remaining variables.
//!
//! Three rewrites are built on this:
//!
//! 1. Linear halves connected through such variables form clusters. A cluster collapses into a
//!    single linear relation which is then re-chained with the fewest halves the wire bound
//!    allows, but only if that is strictly fewer than the cluster had.
//! 2. A single linear half defining a variable consumed linearly by a bilinear half is folded
//!    into it when the result still fits one half.
//! 3. A half that holds the only reference to an internal variable, linearly, only defines that
//!    variable and is dropped.

use std::collections::BTreeMap;

use ark_ff::PrimeField;
use cranelift_entity::{EntitySet, SecondaryMap};
use smallvec::SmallVec;

use super::{GateList, Pass, PassContext, PassKind, PassOutcome};
use crate::{
	compiler::{
		emitter::{chain_len, chain_linear},
		gate::{Relation, WireHalf},
		var_arena::{Var, VarKind},
	},
	error::CompileError,
};

pub(crate) struct AdditionChainCollapse;

impl<F: PrimeField> Pass<F> for AdditionChainCollapse {
	fn kind(&self) -> PassKind {
		PassKind::AdditionChainCollapse
	}

	fn run(&self, input: &GateList<F>, cx: &PassContext<'_>) -> Result<PassOutcome<F>, CompileError> {
		let mut list = input.clone();
		let mut changed = collapse_clusters(&mut list, cx)?;
		changed |= absorb_definitions(&mut list, cx);
		changed |= drop_dead_definitions(&mut list, cx);
		Ok(PassOutcome {
			output: list,
			changed,
		})
	}
}

/// Where every variable is referenced.
struct Uses {
	halves: SecondaryMap<Var, SmallVec<[usize; 2]>>,
	in_product: EntitySet<Var>,
}

impl Uses {
	fn index<F: PrimeField>(relations: &[Relation<F>]) -> Self {
		let mut halves: SecondaryMap<Var, SmallVec<[usize; 2]>> = SecondaryMap::new();
		let mut in_product = EntitySet::new();
		for (index, relation) in relations.iter().enumerate() {
			for var in relation.vars() {
				halves[var].push(index);
				if relation.in_product(var) {
					in_product.insert(var);
				}
			}
		}
		Self { halves, in_product }
	}

	/// The two halves referencing `var`, if it is an internal variable that can be eliminated.
	fn eliminable(&self, var: Var, cx: &PassContext<'_>) -> Option<(usize, usize)> {
		if cx.arena.kind(var) != VarKind::Internal || self.in_product.contains(var) {
			return None;
		}
		match self.halves.get(var)?.as_slice() {
			&[a, b] => Some((a, b)),
			_ => None,
		}
	}

	fn sole_use(&self, var: Var, cx: &PassContext<'_>) -> bool {
		cx.arena.kind(var) == VarKind::Internal
			&& !self.in_product.contains(var)
			&& self.halves.get(var).is_some_and(|uses| uses.len() == 1)
	}

	fn vars(&self) -> impl Iterator<Item = Var> + '_ {
		self.halves
			.iter()
			.filter(|(_, uses)| !uses.is_empty())
			.map(|(var, _)| var)
	}
}

/// `b·x - a·y`, where `a` and `b` are the coefficients of `var` in `x` and `y`.
fn eliminate<F: PrimeField>(x: &Relation<F>, y: &Relation<F>, var: Var) -> Option<Relation<F>> {
	let a = x.linear.coeff(var);
	let b = y.linear.coeff(var);
	x.combine(b, y, -a)
}

fn relations<F: PrimeField>(list: &GateList<F>) -> Vec<Relation<F>> {
	list.halves.iter().map(|half| half.relation()).collect()
}

/// Union-find over half indices. The root of a set is its smallest index.
struct Clusters {
	parent: Vec<usize>,
}

impl Clusters {
	fn new(n: usize) -> Self {
		Self {
			parent: (0..n).collect(),
		}
	}

	fn find(&mut self, mut x: usize) -> usize {
		while self.parent[x] != x {
			self.parent[x] = self.parent[self.parent[x]];
			x = self.parent[x];
		}
		x
	}

	/// Returns `false` if `a` and `b` already were in the same set.
	fn union(&mut self, a: usize, b: usize) -> bool {
		let (ra, rb) = (self.find(a), self.find(b));
		if ra == rb {
			return false;
		}
		let (root, child) = (ra.min(rb), ra.max(rb));
		self.parent[child] = root;
		true
	}
}

fn collapse_clusters<F: PrimeField>(
	list: &mut GateList<F>,
	cx: &PassContext<'_>,
) -> Result<bool, CompileError> {
	let relations = relations(list);
	let uses = Uses::index(&relations);

	// Spanning forest over linear halves. A variable closing a cycle is not eliminated and stays
	// an ordinary variable of the merged relation.
	let mut clusters = Clusters::new(relations.len());
	let mut edges: Vec<(Var, usize, usize)> = Vec::new();
	for var in uses.vars() {
		let Some((a, b)) = uses.eliminable(var, cx) else {
			continue;
		};
		if relations[a].product.is_some() || relations[b].product.is_some() {
			continue;
		}
		if clusters.union(a, b) {
			edges.push((var, a, b));
		}
	}
	if edges.is_empty() {
		return Ok(false);
	}

	let mut members: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
	for index in 0..relations.len() {
		let root = clusters.find(index);
		members.entry(root).or_default().push(index);
	}
	let mut cluster_edges: BTreeMap<usize, Vec<(Var, usize, usize)>> = BTreeMap::new();
	for &(var, a, b) in &edges {
		let root = clusters.find(a);
		cluster_edges.entry(root).or_default().push((var, a, b));
	}

	let mut replacements: BTreeMap<usize, Vec<Relation<F>>> = BTreeMap::new();
	let mut removed = vec![false; relations.len()];
	for (root, edges) in cluster_edges {
		let merged = merge_cluster(&relations, root, edges);
		let size = members[&root].len();
		let needed = if merged.is_tautology() {
			0
		} else {
			chain_len(merged.linear.n_vars())
		};
		if needed >= size {
			continue;
		}
		if merged.is_contradiction() {
			return Err(CompileError::UnsatisfiableConstraint {
				name: format!("gate #{root}"),
			});
		}
		let links = if merged.is_tautology() {
			Vec::new()
		} else {
			chain_linear(&merged.linear, || list.fresh_var())
		};
		for &member in &members[&root] {
			removed[member] = true;
		}
		replacements.insert(root, links);
	}
	if replacements.is_empty() {
		return Ok(false);
	}

	let mut halves = Vec::with_capacity(list.halves.len());
	for (index, half) in list.halves.iter().enumerate() {
		if let Some(links) = replacements.get(&index) {
			for link in links {
				halves.push(
					link.to_half()
						.map_err(|n_vars| CompileError::GateCapacityExceeded { n_vars })?,
				);
			}
		} else if !removed[index] {
			halves.push(*half);
		}
	}
	list.halves = halves;
	Ok(true)
}

/// Combines the halves of one cluster by eliminating along its spanning tree, starting from the
/// root half.
fn merge_cluster<F: PrimeField>(
	relations: &[Relation<F>],
	root: usize,
	mut edges: Vec<(Var, usize, usize)>,
) -> Relation<F> {
	let mut merged = relations[root].clone();
	let mut included = vec![root];
	while !edges.is_empty() {
		let Some(pos) = edges
			.iter()
			.position(|(_, a, b)| included.contains(a) != included.contains(b))
		else {
			break;
		};
		let (var, a, b) = edges.remove(pos);
		let next = if included.contains(&a) { b } else { a };
		// Both relations are linear, so the combination always exists.
		if let Some(combined) = eliminate(&merged, &relations[next], var) {
			merged = combined;
		}
		included.push(next);
	}
	merged
}

fn absorb_definitions<F: PrimeField>(list: &mut GateList<F>, cx: &PassContext<'_>) -> bool {
	let relations = relations(list);
	let uses = Uses::index(&relations);

	let mut consumed = vec![false; relations.len()];
	let mut replaced: BTreeMap<usize, WireHalf<F>> = BTreeMap::new();
	for (index, relation) in relations.iter().enumerate() {
		if relation.product.is_none() || consumed[index] {
			continue;
		}
		for var in relation.linear.vars() {
			let Some((a, b)) = uses.eliminable(var, cx) else {
				continue;
			};
			let def = if a == index { b } else { a };
			if consumed[def] || relations[def].product.is_some() {
				continue;
			}
			let Some(merged) = eliminate(relation, &relations[def], var) else {
				continue;
			};
			// Both halves stay when the merged relation has no layout.
			let Ok(half) = merged.to_half() else {
				continue;
			};
			consumed[index] = true;
			consumed[def] = true;
			replaced.insert(index.min(def), half);
			break;
		}
	}
	if replaced.is_empty() {
		return false;
	}

	let mut halves = Vec::with_capacity(list.halves.len());
	for (index, half) in list.halves.iter().enumerate() {
		if let Some(merged) = replaced.get(&index) {
			halves.push(*merged);
		} else if !consumed[index] {
			halves.push(*half);
		}
	}
	list.halves = halves;
	true
}

fn drop_dead_definitions<F: PrimeField>(list: &mut GateList<F>, cx: &PassContext<'_>) -> bool {
	let relations = relations(list);
	let uses = Uses::index(&relations);

	let dead = relations
		.iter()
		.map(|relation| {
			relation
				.linear
				.vars()
				.any(|var| uses.sole_use(var, cx))
		})
		.collect::<Vec<_>>();
	if !dead.contains(&true) {
		return false;
	}

	list.halves = list
		.halves
		.iter()
		.zip(&dead)
		.filter(|(_, dead)| !**dead)
		.map(|(half, _)| *half)
		.collect();
	true
}

// Copyright 2025 Irreducible Inc.
//! Assignment search by propagation.
//!
//! Halves with a single unknown are solved for it (linearly, or through a square root when the
//! unknown appears in the product). A square root picks one of two roots, so quadratic halves
//! wait until no linear half is solvable. When nothing can be solved, the next free variable
//! receives a random value and is marked as tainted. Anything solved from a tainted variable is tainted as
//! well, so a caller can tell a failure caused by an unlucky guess from a genuine one.

use std::collections::VecDeque;

use ark_ff::{PrimeField, Zero};
use cranelift_entity::{EntitySet, SecondaryMap};
use rand::{RngCore, rngs::StdRng};
use smallvec::SmallVec;

use crate::compiler::{
	gate::{Relation, WireHalf},
	var_arena::{Var, VarArena},
};

/// Attempts at finding one satisfying assignment before giving up on a sample.
const SAMPLE_ATTEMPTS: usize = 4;

pub(crate) enum Failures {
	None,
	/// Halves that fail regardless of any guessed value.
	Definite(Vec<usize>),
	Inconclusive,
}

pub(crate) struct Assignment<F: PrimeField> {
	pub values: SecondaryMap<Var, Option<F>>,
	/// Variables whose value was guessed or derived from a guess.
	pub tainted: EntitySet<Var>,
}

pub(crate) struct Solver<'a, F> {
	relations: Vec<Relation<F>>,
	uses: SecondaryMap<Var, SmallVec<[usize; 4]>>,
	/// Every referenced variable, public inputs first, then witnesses, then internals.
	order: Vec<Var>,
	arena: &'a VarArena,
}

impl<'a, F: PrimeField> Solver<'a, F> {
	pub fn new(halves: &[WireHalf<F>], arena: &'a VarArena) -> Self {
		let relations = halves
			.iter()
			.map(|half| half.relation())
			.collect::<Vec<_>>();
		let mut uses: SecondaryMap<Var, SmallVec<[usize; 4]>> = SecondaryMap::new();
		for (index, relation) in relations.iter().enumerate() {
			for var in relation.vars() {
				uses[var].push(index);
			}
		}
		let mut order = uses
			.iter()
			.filter(|(_, uses)| !uses.is_empty())
			.map(|(var, _)| var)
			.collect::<Vec<_>>();
		order.sort_by_key(|&var| (arena.kind(var), var));
		Self {
			relations,
			uses,
			order,
			arena,
		}
	}

	/// A random solution, if one is found within a few attempts.
	pub fn sample(&self, rng: &mut StdRng) -> Option<Assignment<F>> {
		(0..SAMPLE_ATTEMPTS).find_map(|_| {
			let mut assignment = self.solve(SecondaryMap::new(), rng);
			matches!(self.failures(&assignment), Failures::None).then(|| {
				// The sample is a fixed point of the check, not a guess.
				assignment.tainted.clear();
				assignment
			})
		})
	}

	/// Extends a solution of another list to this one.
	///
	/// Shared variables keep their value. Public inputs this list references but `solution`
	/// does not assign are unconstrained on the other side, so they get a fresh random value
	/// that does not count as a guess.
	pub fn extend(&self, solution: &Assignment<F>, rng: &mut StdRng) -> Assignment<F> {
		let mut seeds = SecondaryMap::new();
		for &var in &self.order {
			seeds[var] = match solution.values.get(var).copied().flatten() {
				Some(value) => Some(value),
				None if self.arena.is_public(var) => Some(random_element(rng)),
				None => None,
			};
		}
		self.solve(seeds, rng)
	}

	pub fn solve(&self, seeds: SecondaryMap<Var, Option<F>>, rng: &mut StdRng) -> Assignment<F> {
		let mut assignment = Assignment {
			values: seeds,
			tainted: EntitySet::new(),
		};
		let mut queue: VecDeque<usize> = (0..self.relations.len()).collect();
		let mut queued = vec![true; self.relations.len()];
		let mut cursor = 0;

		loop {
			while let Some(index) = queue.pop_front() {
				queued[index] = false;
				let Some((var, value)) = self.solve_half(index, &assignment.values, false, rng)
				else {
					continue;
				};
				self.assign(&mut assignment, index, var, value);
				self.enqueue(var, &mut queue, &mut queued);
			}

			let quadratic = (0..self.relations.len())
				.filter(|&index| self.relations[index].product.is_some())
				.find_map(|index| {
					let (var, value) = self.solve_half(index, &assignment.values, true, rng)?;
					Some((index, var, value))
				});
			if let Some((index, var, value)) = quadratic {
				self.assign(&mut assignment, index, var, value);
				self.enqueue(var, &mut queue, &mut queued);
				continue;
			}

			while cursor < self.order.len() && assignment.values[self.order[cursor]].is_some() {
				cursor += 1;
			}
			let Some(&var) = self.order.get(cursor) else {
				break;
			};
			assignment.values[var] = Some(random_element(rng));
			assignment.tainted.insert(var);
			self.enqueue(var, &mut queue, &mut queued);
		}
		assignment
	}

	/// Records a solved value. It is tainted if the half it was solved from mentions a tainted
	/// variable.
	fn assign(&self, assignment: &mut Assignment<F>, index: usize, var: Var, value: F) {
		assignment.values[var] = Some(value);
		if self.relations[index]
			.vars()
			.iter()
			.any(|&other| other != var && assignment.tainted.contains(other))
		{
			assignment.tainted.insert(var);
		}
	}

	fn enqueue(&self, var: Var, queue: &mut VecDeque<usize>, queued: &mut [bool]) {
		for &next in &self.uses[var] {
			if !queued[next] {
				queued[next] = true;
				queue.push_back(next);
			}
		}
	}

	/// Solves a half with exactly one unknown for it. With `quadratic` set, also handles the
	/// case `q·u² + a·u + b` when the discriminant is a square.
	fn solve_half(
		&self,
		index: usize,
		values: &SecondaryMap<Var, Option<F>>,
		quadratic: bool,
		rng: &mut StdRng,
	) -> Option<(Var, F)> {
		let relation = &self.relations[index];
		let mut unknowns = relation.vars().into_iter().filter(|&var| values[var].is_none());
		let unknown = unknowns.next()?;
		if unknowns.next().is_some() {
			return None;
		}
		let value = |var: Var| values[var].unwrap_or_else(F::zero);

		let (mut q, mut a, mut b) = (F::zero(), F::zero(), relation.linear.constant_term());
		for &(var, coeff) in relation.linear.terms() {
			if var == unknown {
				a += coeff;
			} else {
				b += coeff * value(var);
			}
		}
		if let Some((m, x, y)) = relation.product {
			match (x == unknown, y == unknown) {
				(true, true) => q += m,
				(true, false) => a += m * value(y),
				(false, true) => a += m * value(x),
				(false, false) => b += m * value(x) * value(y),
			}
		}

		if q.is_zero() {
			return Some((unknown, -b * a.inverse()?));
		}
		if !quadratic {
			return None;
		}
		let root = (a * a - (q + q + q + q) * b).sqrt()?;
		let root = if rng.next_u32() & 1 == 0 { root } else { -root };
		Some((unknown, (root - a) * (q + q).inverse()?))
	}

	pub fn failures(&self, assignment: &Assignment<F>) -> Failures {
		let mut definite = Vec::new();
		let mut inconclusive = false;
		for (index, relation) in self.relations.iter().enumerate() {
			if evaluate(relation, &assignment.values).is_some_and(|residue| residue.is_zero()) {
				continue;
			}
			if relation
				.vars()
				.iter()
				.any(|&var| assignment.tainted.contains(var))
			{
				inconclusive = true;
			} else {
				definite.push(index);
			}
		}
		if !definite.is_empty() {
			Failures::Definite(definite)
		} else if inconclusive {
			Failures::Inconclusive
		} else {
			Failures::None
		}
	}
}

/// The residue of a relation, or `None` if a variable is unassigned.
fn evaluate<F: PrimeField>(relation: &Relation<F>, values: &SecondaryMap<Var, Option<F>>) -> Option<F> {
	let mut acc = relation.linear.constant_term();
	for &(var, coeff) in relation.linear.terms() {
		acc += coeff * values[var]?;
	}
	if let Some((m, x, y)) = relation.product {
		acc += m * values[x]? * values[y]?;
	}
	Some(acc)
}

pub(crate) fn random_element<F: PrimeField>(rng: &mut StdRng) -> F {
	let mut bytes = [0u8; 64];
	rng.fill_bytes(&mut bytes);
	F::from_le_bytes_mod_order(&bytes)
}

#[cfg(test)]
mod tests {
	use ark_bn254::Fr;
	use ark_ff::One;
	use rand::SeedableRng;

	use super::*;
	use crate::compiler::{lincom::LinearCombination, var_arena::VarKind};

	#[test]
	fn test_boolean_constraint_is_sampled() {
		// b·b - b = 0 needs the quadratic case to find a solution at all.
		let mut arena = VarArena::new();
		let b = arena.allocate(VarKind::Witness);
		let half = Relation::bilinear(
			Fr::one(),
			b,
			b,
			LinearCombination::from_terms([(b, -Fr::one())], Fr::zero()),
		)
		.to_half()
		.unwrap();
		let halves = [half];
		let solver = Solver::new(&halves, &arena);
		let mut rng = StdRng::seed_from_u64(42);
		let sample = solver.sample(&mut rng).unwrap();
		let value = sample.values[b].unwrap();
		assert!(value.is_zero() || value.is_one());
	}

	#[test]
	fn test_linear_halves_come_before_square_roots() {
		// x·x - 9 = 0 listed before x - y = 0: the root must come from y.
		let mut arena = VarArena::new();
		let [x, y] = [(); 2].map(|_| arena.allocate(VarKind::Witness));
		let square = Relation::bilinear(Fr::one(), x, x, LinearCombination::constant(-Fr::from(9u64)))
			.to_half()
			.unwrap();
		let alias = Relation::linear(LinearCombination::from_terms(
			[(x, Fr::one()), (y, -Fr::one())],
			Fr::zero(),
		))
		.to_half()
		.unwrap();
		let halves = [square, alias];
		let solver = Solver::new(&halves, &arena);

		for seed in 0..8 {
			let mut seeds = SecondaryMap::new();
			seeds[y] = Some(-Fr::from(3u64));
			let mut rng = StdRng::seed_from_u64(seed);
			let assignment = solver.solve(seeds, &mut rng);
			assert_eq!(assignment.values[x], Some(-Fr::from(3u64)));
			assert!(matches!(solver.failures(&assignment), Failures::None));
		}
	}

	#[test]
	fn test_seeded_values_propagate_untainted() {
		// x + y - z = 0 with x and y given.
		let mut arena = VarArena::new();
		let [x, y, z] = [(); 3].map(|_| arena.allocate(VarKind::Witness));
		let half = Relation::linear(LinearCombination::from_terms(
			[(x, Fr::one()), (y, Fr::one()), (z, -Fr::one())],
			Fr::zero(),
		))
		.to_half()
		.unwrap();
		let halves = [half];
		let solver = Solver::new(&halves, &arena);

		let mut seeds = SecondaryMap::new();
		seeds[x] = Some(Fr::from(2u64));
		seeds[y] = Some(Fr::from(5u64));
		let mut rng = StdRng::seed_from_u64(42);
		let assignment = solver.solve(seeds, &mut rng);
		assert_eq!(assignment.values[z], Some(Fr::from(7u64)));
		assert!(!assignment.tainted.contains(z));
		assert!(matches!(solver.failures(&assignment), Failures::None));
	}
}

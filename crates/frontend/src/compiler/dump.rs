// Copyright 2025 Irreducible Inc.
use std::collections::{BTreeMap, BTreeSet};

use ark_ff::PrimeField;

use crate::compiler::{
	gate::WireHalf,
	namespace::{Namespace, NamespaceTree},
};

/// The halves recorded by every namespace before optimization, kept by the circuit for the
/// composition dump.
pub(crate) struct Recorded {
	namespaces: NamespaceTree,
	/// `(origin, is_linear)` per recorded half.
	halves: Vec<(Namespace, bool)>,
}

impl Recorded {
	pub fn new<F: PrimeField>(
		namespaces: NamespaceTree,
		halves: &[WireHalf<F>],
		origins: Vec<Namespace>,
	) -> Self {
		let halves = origins
			.into_iter()
			.zip(halves)
			.map(|(origin, half)| (origin, half.is_linear()))
			.collect();
		Self { namespaces, halves }
	}

	pub fn n_halves(&self) -> usize {
		self.halves.len()
	}
}

struct NamespaceData {
	name: String,
	children: Vec<Namespace>,
	breakdown: HalfBreakdown,
	cum_breakdown: Option<HalfBreakdown>,
}

#[derive(Clone, Default, serde::Serialize)]
struct HalfBreakdown {
	/// Recorded halves by kind, `linear` or `bilinear`.
	by_kind: BTreeMap<&'static str, usize>,
}

impl HalfBreakdown {
	fn note(&mut self, is_linear: bool) {
		let kind = if is_linear { "linear" } else { "bilinear" };
		*self.by_kind.entry(kind).or_insert(0) += 1;
	}

	fn merge(mut self, other: &HalfBreakdown) -> HalfBreakdown {
		for (kind, count) in &other.by_kind {
			*self.by_kind.entry(kind).or_insert(0) += count;
		}
		self
	}

	fn total(&self) -> usize {
		self.by_kind.values().sum()
	}
}

struct Cx<'a> {
	recorded: &'a Recorded,
	data: BTreeMap<Namespace, NamespaceData>,
	post_order: Vec<Namespace>,
}

impl<'a> Cx<'a> {
	fn new(recorded: &'a Recorded) -> Self {
		Self {
			recorded,
			data: BTreeMap::new(),
			post_order: Vec::new(),
		}
	}

	/// Creates an entry for every namespace with halves and for all of its ancestors, then
	/// counts the halves of each.
	fn bucket_halves(&mut self) {
		let tree = &self.recorded.namespaces;
		let mut needed = BTreeSet::new();
		needed.insert(tree.root());
		for &(origin, _) in &self.recorded.halves {
			let mut current = Some(origin);
			while let Some(ns) = current {
				if !needed.insert(ns) {
					break;
				}
				current = tree.parent(ns);
			}
		}
		for ns in needed {
			self.data.insert(
				ns,
				NamespaceData {
					name: tree.full_name(ns),
					children: Vec::new(),
					breakdown: HalfBreakdown::default(),
					cum_breakdown: None,
				},
			);
		}
		for &(origin, is_linear) in &self.recorded.halves {
			if let Some(data) = self.data.get_mut(&origin) {
				data.breakdown.note(is_linear);
			}
		}
	}

	fn recover_hierarchy(&mut self) {
		let tree = &self.recorded.namespaces;
		let namespaces = self.data.keys().copied().collect::<Vec<_>>();
		for ns in namespaces {
			let parent = tree.parent(ns);
			if let Some(data) = parent.and_then(|parent| self.data.get_mut(&parent)) {
				data.children.push(ns);
			}
		}
	}

	/// Computes the post-order of traversal: children first, then the parent.
	///
	/// Requires the hierarchy to be recovered.
	fn compute_postorder(&mut self) {
		// Explicit stack, namespaces nest as deep as the user's subcircuits do.
		let mut stack = vec![(self.recorded.namespaces.root(), false)];
		while let Some((ns, expanded)) = stack.pop() {
			if expanded {
				self.post_order.push(ns);
				continue;
			}
			stack.push((ns, true));
			if let Some(data) = self.data.get(&ns) {
				for &child in data.children.iter().rev() {
					stack.push((child, false));
				}
			}
		}
	}

	/// Traverses the namespaces in post-order and computes the cumulative breakdowns.
	fn compute_cum_breakdowns(&mut self) {
		for &ns in &self.post_order {
			let data = &self.data[&ns];
			let mut cum = data.breakdown.clone();
			for child in &data.children {
				if let Some(child_cum) = self.data[child].cum_breakdown.as_ref() {
					cum = cum.merge(child_cum);
				}
			}
			if let Some(data) = self.data.get_mut(&ns) {
				data.cum_breakdown = Some(cum);
			}
		}
	}

	fn build_subcircuit_info(&self, ns: Namespace) -> SubcircuitInfo {
		let data = &self.data[&ns];
		let breakdown = data.cum_breakdown.clone().unwrap_or_default();
		SubcircuitInfo {
			name: data.name.clone(),
			n_halves: breakdown.total(),
			children: data
				.children
				.iter()
				.map(|&child| self.build_subcircuit_info(child))
				.collect(),
			breakdown,
		}
	}
}

#[derive(serde::Serialize)]
struct SubcircuitInfo {
	name: String,
	n_halves: usize,
	children: Vec<SubcircuitInfo>,
	breakdown: HalfBreakdown,
}

/// Dumps a hierarchical JSON representation of where the recorded halves come from.
pub(crate) fn dump_composition(recorded: &Recorded) -> String {
	let mut cx = Cx::new(recorded);
	cx.bucket_halves();
	cx.recover_hierarchy();
	cx.compute_postorder();
	cx.compute_cum_breakdowns();

	let info = cx.build_subcircuit_info(recorded.namespaces.root());
	serde_json::to_string_pretty(&info).expect("composition is plain data")
}

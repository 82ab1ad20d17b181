// Copyright 2025 Irreducible Inc.
use cranelift_entity::{PrimaryMap, entity_impl};

/// A node of the subcircuit naming hierarchy.
///
/// Assertions are named by extending the namespace of the builder that records them, so the full
/// name of an assertion is the dotted path from the root.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Namespace(u32);
entity_impl!(Namespace);

struct Node {
	name: String,
	parent: Option<Namespace>,
}

/// Tree of namespaces created during one build.
pub(crate) struct NamespaceTree {
	root: Namespace,
	nodes: PrimaryMap<Namespace, Node>,
}

impl NamespaceTree {
	pub fn new() -> Self {
		let mut nodes = PrimaryMap::new();
		let root = nodes.push(Node {
			name: String::new(),
			parent: None,
		});
		Self { root, nodes }
	}

	/// Adds a child called `name` under `parent`.
	pub fn extend(&mut self, parent: Namespace, name: impl Into<String>) -> Namespace {
		self.nodes.push(Node {
			name: name.into(),
			parent: Some(parent),
		})
	}

	/// Dotted path from the root, e.g. `"hasher.round_3.range"`. The root is the empty string.
	pub fn full_name(&self, ns: Namespace) -> String {
		let mut segments = Vec::new();
		let mut current = ns;
		while let Some(parent) = self.nodes[current].parent {
			segments.push(self.nodes[current].name.as_str());
			current = parent;
		}
		segments.reverse();
		segments.join(".")
	}

	pub fn parent(&self, ns: Namespace) -> Option<Namespace> {
		self.nodes[ns].parent
	}

	pub fn root(&self) -> Namespace {
		self.root
	}
}

impl Default for NamespaceTree {
	fn default() -> Self {
		Self::new()
	}
}

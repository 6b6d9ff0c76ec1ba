//! The anatomy tree implants are bound to.
//!
//! Parts are stored in a [`petgraph`] graph with edges running from parent to child.
//! The engine only ever holds [`PartId`] handles into the tree and never mutates it
//! once a session is open.

use std::collections::HashMap;

use petgraph::prelude::*;
use serde::{Serialize, Deserialize};

/// Handle to a part inside an [`AnatomyTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartId(NodeIndex);

impl PartId {
	pub fn index(&self) -> usize {
		self.0.index()
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartNode {
	pub name: String,
}

/// Serializable description of a part and everything distal to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnatomyDef {
	pub name: String,
	#[serde(default)]
	pub children: Vec<AnatomyDef>,
}

#[derive(Debug, Clone, Default)]
pub struct AnatomyTree {
	graph: DiGraph<PartNode, ()>,
	by_name: HashMap<String, PartId>,
}

impl AnatomyTree {
	/// Builds a tree from a nested definition.
	///
	/// # Errors
	/// - [`Validation`](crate::Error::Validation) when two parts share a name.
	pub fn from_def(root: &AnatomyDef) -> crate::Result<Self> {
		let mut tree = Self::default();
		let mut pending = vec![(root, None)];
		while let Some((def, parent)) = pending.pop() {
			let id = tree.add_part(&def.name, parent)?;
			/* Reversed so children are added in declaration order */
			for child in def.children.iter().rev() {
				pending.push((child, Some(id)));
			}
		}
		Ok(tree)
	}

	/// Adds a part under `parent`, or as a root when `parent` is `None`.
	///
	/// # Errors
	/// - [`Validation`](crate::Error::Validation) when the name is already used.
	/// - [`UnknownPart`](crate::Error::UnknownPart) when `parent` is not in this tree.
	pub fn add_part(&mut self, name: impl Into<String>, parent: Option<PartId>) -> crate::Result<PartId> {
		let name = name.into();
		if self.by_name.contains_key(&name) {
			return Err(crate::Error::Validation(format!("duplicate part name `{}`", name)));
		}
		if let Some(parent) = parent {
			if !self.contains(parent) {
				return Err(crate::Error::UnknownPart(format!("#{}", parent.index())));
			}
		}

		let id = PartId(self.graph.add_node(PartNode { name: name.clone() }));
		if let Some(parent) = parent {
			self.graph.add_edge(parent.0, id.0, ());
		}
		self.by_name.insert(name, id);
		Ok(id)
	}

	pub fn contains(&self, part: PartId) -> bool {
		self.graph.node_weight(part.0).is_some()
	}

	pub fn find(&self, name: &str) -> Option<PartId> {
		self.by_name.get(name).copied()
	}

	pub fn part(&self, part: PartId) -> Option<&PartNode> {
		self.graph.node_weight(part.0)
	}

	/// Name of the part, or a placeholder for handles from another tree.
	pub fn name(&self, part: PartId) -> &str {
		self.part(part).map(|p| p.name.as_str()).unwrap_or("<unknown part>")
	}

	pub fn parent(&self, part: PartId) -> Option<PartId> {
		self.graph.neighbors_directed(part.0, Incoming).next().map(PartId)
	}

	pub fn children(&self, part: PartId) -> impl Iterator<Item = PartId> + '_ {
		self.graph.neighbors_directed(part.0, Outgoing).map(PartId)
	}

	/// Walks from the parent of `part` up to the root, nearest first.
	pub fn ancestors(&self, part: PartId) -> Ancestors<'_> {
		Ancestors { tree: self, next: self.parent(part) }
	}

	pub fn is_ancestor_of(&self, ancestor: PartId, part: PartId) -> bool {
		self.ancestors(part).any(|a| a == ancestor)
	}

	pub fn parts(&self) -> impl Iterator<Item = PartId> + '_ {
		self.graph.node_indices().map(PartId)
	}

	pub fn len(&self) -> usize {
		self.graph.node_count()
	}

	pub fn is_empty(&self) -> bool {
		self.graph.node_count() == 0
	}
}

/// Iterator returned by [`AnatomyTree::ancestors()`].
pub struct Ancestors<'a> {
	tree: &'a AnatomyTree,
	next: Option<PartId>,
}

impl<'a> Iterator for Ancestors<'a> {
	type Item = PartId;

	fn next(&mut self) -> Option<Self::Item> {
		let current = self.next?;
		self.next = self.tree.parent(current);
		Some(current)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn arm() -> AnatomyDef {
		serde_json::from_str(r#"{
			"name": "Torso",
			"children": [
				{ "name": "Arm", "children": [ { "name": "Hand", "children": [ { "name": "Finger" } ] } ] },
				{ "name": "Neck" }
			]
		}"#).unwrap()
	}

	#[test]
	fn ancestors_are_nearest_first() {
		let tree = AnatomyTree::from_def(&arm()).unwrap();
		let finger = tree.find("Finger").unwrap();
		let names: Vec<_> = tree.ancestors(finger).map(|p| tree.name(p)).collect();
		assert_eq!(names, ["Hand", "Arm", "Torso"]);
	}

	#[test]
	fn root_has_no_ancestors() {
		let tree = AnatomyTree::from_def(&arm()).unwrap();
		let torso = tree.find("Torso").unwrap();
		assert_eq!(tree.parent(torso), None);
		assert_eq!(tree.ancestors(torso).count(), 0);
	}

	#[test]
	fn children_keep_declaration_order() {
		let tree = AnatomyTree::from_def(&arm()).unwrap();
		let torso = tree.find("Torso").unwrap();
		let mut names: Vec<_> = tree.children(torso).map(|p| tree.name(p).to_string()).collect();
		names.sort();
		assert_eq!(names, ["Arm", "Neck"]);
		assert!(tree.find("Arm").unwrap().index() < tree.find("Neck").unwrap().index());
	}

	#[test]
	fn duplicate_names_are_rejected() {
		let def = AnatomyDef {
			name: "Torso".into(),
			children: vec![AnatomyDef { name: "Torso".into(), children: vec![] }],
		};
		assert!(matches!(AnatomyTree::from_def(&def), Err(crate::Error::Validation(_))));
	}

	#[test]
	fn sibling_is_not_an_ancestor() {
		let tree = AnatomyTree::from_def(&arm()).unwrap();
		let neck = tree.find("Neck").unwrap();
		let hand = tree.find("Hand").unwrap();
		assert!(!tree.is_ancestor_of(neck, hand));
		assert!(tree.is_ancestor_of(tree.find("Torso").unwrap(), hand));
	}
}

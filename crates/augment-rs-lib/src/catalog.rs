//! Implant option definitions and the dependency relation between them.
//!
//! # Usage
//! 1. Describe each option with an [`OptionRecord`].
//! 1. Add them to a [`CatalogBuilder`] created for the anatomy they target.
//! 1. [`CatalogBuilder::build()`] resolves part names and dependency keys once, giving an [`OptionCatalog`].

use std::collections::{HashMap, HashSet};

use petgraph::prelude::*;
use serde::{Serialize, Deserialize};

use crate::anatomy::{AnatomyTree, PartId};

/// Handle to an option inside an [`OptionCatalog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OptionId(pub(crate) usize);

impl OptionId {
	pub fn index(&self) -> usize {
		self.0
	}
}

/// Inclusive range an implant's intensity may take.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntensityRange {
	pub min: f32,
	pub max: f32,
}

impl IntensityRange {
	/// Bounds given in the wrong order are swapped.
	pub fn new(min: f32, max: f32) -> Self {
		if min <= max { Self { min, max } } else { Self { min: max, max: min } }
	}

	/// A range of width zero, the intensity can't be adjusted.
	pub fn fixed(value: f32) -> Self {
		Self { min: value, max: value }
	}

	pub fn is_adjustable(&self) -> bool {
		self.max > self.min
	}

	pub fn clamp(&self, value: f32) -> f32 {
		if value.is_nan() {
			return self.min;
		}
		value.max(self.min).min(self.max)
	}

	pub fn midpoint(&self) -> f32 {
		self.min + (self.max - self.min) / 2.0
	}

	pub fn contains(&self, value: f32) -> bool {
		self.min <= value && value <= self.max
	}
}

/// A resolved option definition.
#[derive(Debug, Clone)]
pub struct OptionDef {
	/// Stable key, unique within the catalog.
	pub key: String,
	pub label: String,
	/// Parts the option can be bound to. Empty for whole-body options.
	pub parts: Vec<PartId>,
	/// No part binding is needed, instances apply to the whole body.
	pub whole_body: bool,
	pub depends_on: Option<OptionId>,
	/// Instances of this option remove the part they are bound to.
	pub replaces_part: bool,
	pub intensity: IntensityRange,
}

impl OptionDef {
	/// The only part this option can target, if it has exactly one.
	pub fn sole_part(&self) -> Option<PartId> {
		if self.parts.len() == 1 { self.parts.first().copied() } else { None }
	}

	pub fn is_multi_part(&self) -> bool {
		self.parts.len() > 1
	}

	/// Whether an instance of this option may be bound to `part`.
	pub fn can_target(&self, part: Option<PartId>) -> bool {
		match part {
			None => self.whole_body,
			Some(p) => !self.whole_body && self.parts.contains(&p),
		}
	}

	/// Whether the closure engine can create an instance without asking which part to use.
	pub fn can_auto_select(&self) -> bool {
		self.whole_body || self.parts.len() == 1
	}
}

/// Name based description of an option used to build a catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionRecord {
	pub key: String,
	#[serde(default)]
	pub label: Option<String>,
	#[serde(default)]
	pub parts: Vec<String>,
	#[serde(default)]
	pub whole_body: bool,
	#[serde(default)]
	pub depends_on: Option<String>,
	#[serde(default)]
	pub replaces_part: bool,
	#[serde(default)]
	pub intensity: IntensityRange,
}

impl OptionRecord {
	pub fn new(key: impl Into<String>) -> Self {
		Self {
			key: key.into(),
			label: None,
			parts: Default::default(),
			whole_body: false,
			depends_on: None,
			replaces_part: false,
			intensity: Default::default(),
		}
	}

	pub fn label(mut self, label: impl Into<String>) -> Self {
		self.label = Some(label.into());
		self
	}

	pub fn part(mut self, part: impl Into<String>) -> Self {
		self.parts.push(part.into());
		self
	}

	pub fn whole_body(mut self) -> Self {
		self.whole_body = true;
		self
	}

	pub fn depends_on(mut self, key: impl Into<String>) -> Self {
		self.depends_on = Some(key.into());
		self
	}

	pub fn replaces_part(mut self) -> Self {
		self.replaces_part = true;
		self
	}

	pub fn intensity(mut self, min: f32, max: f32) -> Self {
		self.intensity = IntensityRange::new(min, max);
		self
	}
}

pub struct CatalogBuilder<'a> {
	anatomy: &'a AnatomyTree,
	records: Vec<OptionRecord>,
}

impl<'a> CatalogBuilder<'a> {
	pub fn new(anatomy: &'a AnatomyTree) -> Self {
		Self {
			anatomy,
			records: Default::default(),
		}
	}

	pub fn add_option(mut self, record: OptionRecord) -> Self {
		self.records.push(record);
		self
	}

	pub fn add_options(mut self, records: impl IntoIterator<Item = OptionRecord>) -> Self {
		self.records.extend(records);
		self
	}

	/// Resolves every record against the anatomy and the other records.
	///
	/// # Errors
	/// - [`Validation`](crate::Error::Validation) for duplicate keys or whole-body options that also list parts.
	/// - [`UnknownPart`](crate::Error::UnknownPart) when a part name is not in the anatomy.
	/// - [`UnknownOption`](crate::Error::UnknownOption) when `depends_on` names a key not in the records.
	pub fn build(self) -> crate::Result<OptionCatalog> {
		let mut by_key = HashMap::<String, OptionId>::with_capacity(self.records.len());
		for (i, record) in self.records.iter().enumerate() {
			if by_key.insert(record.key.clone(), OptionId(i)).is_some() {
				return Err(crate::Error::Validation(format!("duplicate option key `{}`", record.key)));
			}
		}

		let mut options = Vec::<OptionDef>::with_capacity(self.records.len());
		for record in self.records {
			if record.whole_body && !record.parts.is_empty() {
				return Err(crate::Error::Validation(format!("whole body option `{}` can't list parts", record.key)));
			}

			let mut parts = Vec::<PartId>::with_capacity(record.parts.len());
			for name in &record.parts {
				let part = self.anatomy.find(name).ok_or_else(|| crate::Error::UnknownPart(name.clone()))?;
				if !parts.contains(&part) {
					parts.push(part);
				}
			}

			if !record.intensity.min.is_finite() || !record.intensity.max.is_finite() {
				return Err(crate::Error::Validation(format!("option `{}` has a non-finite intensity bound", record.key)));
			}
			/* Deserialized ranges skip `IntensityRange::new` so the bounds may be inverted */
			let intensity = IntensityRange::new(record.intensity.min, record.intensity.max);

			let depends_on = match &record.depends_on {
				Some(key) => Some(*by_key.get(key).ok_or_else(|| crate::Error::UnknownOption(key.clone()))?),
				None => None,
			};

			options.push(OptionDef {
				label: record.label.unwrap_or_else(|| record.key.clone()),
				key: record.key,
				parts,
				whole_body: record.whole_body,
				depends_on,
				replaces_part: record.replaces_part,
				intensity,
			});
		}

		let mut dependency_graph = DiGraph::<OptionId, ()>::with_capacity(options.len(), options.len());
		for i in 0..options.len() {
			dependency_graph.add_node(OptionId(i));
		}
		for (i, def) in options.iter().enumerate() {
			if let Some(target) = def.depends_on {
				dependency_graph.add_edge(NodeIndex::new(i), NodeIndex::new(target.0), ());
			}
		}

		let mut seen = HashSet::<PartId>::new();
		let candidate_parts = options.iter()
			.flat_map(|o| o.parts.iter().copied())
			.filter(|p| seen.insert(*p))
			.collect();

		log::debug!("Built option catalog with {} options", options.len());

		Ok(OptionCatalog {
			options,
			by_key,
			dependency_graph,
			candidate_parts,
		})
	}
}

/// Read-only set of option definitions shared by every session over the same anatomy.
#[derive(Debug, Clone)]
pub struct OptionCatalog {
	options: Vec<OptionDef>,
	by_key: HashMap<String, OptionId>,
	/// Edges run from an option to the option it depends on.
	dependency_graph: DiGraph<OptionId, ()>,
	candidate_parts: Vec<PartId>,
}

impl OptionCatalog {
	/// Shorthand for a [`CatalogBuilder`] fed with `records`.
	pub fn from_records(anatomy: &AnatomyTree, records: impl IntoIterator<Item = OptionRecord>) -> crate::Result<Self> {
		CatalogBuilder::new(anatomy).add_options(records).build()
	}

	pub fn get(&self, option: OptionId) -> Option<&OptionDef> {
		self.options.get(option.0)
	}

	pub fn find(&self, key: &str) -> Option<OptionId> {
		self.by_key.get(key).copied()
	}

	pub fn options(&self) -> impl Iterator<Item = (OptionId, &OptionDef)> + '_ {
		self.options.iter().enumerate().map(|(i, o)| (OptionId(i), o))
	}

	pub fn ids(&self) -> impl Iterator<Item = OptionId> {
		(0..self.options.len()).map(OptionId)
	}

	pub fn len(&self) -> usize {
		self.options.len()
	}

	pub fn is_empty(&self) -> bool {
		self.options.is_empty()
	}

	/// Every part referenced by any option, without duplicates, in first reference order.
	pub fn candidate_parts(&self) -> &[PartId] {
		&self.candidate_parts
	}

	/// Options whose `depends_on` edge points at `option`.
	pub fn dependents_of(&self, option: OptionId) -> impl Iterator<Item = OptionId> + '_ {
		self.dependency_graph
			.neighbors_directed(NodeIndex::new(option.0), Incoming)
			.map(|n| self.dependency_graph[n])
	}

	/// Groups of options whose dependency edges form a loop.
	///
	/// An option depending on itself is reported as a group of one.
	pub fn dependency_cycles(&self) -> Vec<Vec<OptionId>> {
		petgraph::algo::tarjan_scc(&self.dependency_graph)
			.into_iter()
			.filter(|scc| scc.len() > 1 || self.dependency_graph.contains_edge(scc[0], scc[0]))
			.map(|scc| {
				let mut ids: Vec<_> = scc.into_iter().map(|n| self.dependency_graph[n]).collect();
				ids.sort();
				ids
			})
			.collect()
	}
}

impl std::ops::Index<OptionId> for OptionCatalog {
	type Output = OptionDef;

	fn index(&self, option: OptionId) -> &Self::Output {
		&self.options[option.0]
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::anatomy::AnatomyDef;

	fn anatomy() -> AnatomyTree {
		AnatomyTree::from_def(&AnatomyDef {
			name: "Torso".into(),
			children: vec![
				AnatomyDef { name: "LeftEye".into(), children: vec![] },
				AnatomyDef { name: "RightEye".into(), children: vec![] },
				AnatomyDef { name: "Brain".into(), children: vec![] },
			],
		}).unwrap()
	}

	#[test]
	fn intensity_clamps_to_range() {
		let range = IntensityRange::new(1.0, 6.0);
		assert_eq!(range.clamp(9.0), 6.0);
		assert_eq!(range.clamp(0.0), 1.0);
		assert_eq!(range.clamp(3.5), 3.5);
		assert_eq!(range.clamp(f32::NAN), 1.0);
		assert!(!IntensityRange::fixed(1.0).is_adjustable());
	}

	#[test]
	fn candidate_parts_are_deduplicated() {
		let anatomy = anatomy();
		let catalog = CatalogBuilder::new(&anatomy)
			.add_option(OptionRecord::new("Eye").part("LeftEye").part("RightEye"))
			.add_option(OptionRecord::new("Lens").part("RightEye"))
			.add_option(OptionRecord::new("Chip").part("Brain"))
			.build()
			.unwrap();
		let names: Vec<_> = catalog.candidate_parts().iter().map(|p| anatomy.name(*p)).collect();
		assert_eq!(names, ["LeftEye", "RightEye", "Brain"]);
	}

	#[test]
	fn unknown_references_are_rejected() {
		let anatomy = anatomy();
		let missing_part = CatalogBuilder::new(&anatomy)
			.add_option(OptionRecord::new("Tail").part("Tail"))
			.build();
		assert!(matches!(missing_part, Err(crate::Error::UnknownPart(p)) if p == "Tail"));

		let missing_dep = CatalogBuilder::new(&anatomy)
			.add_option(OptionRecord::new("Eye").part("LeftEye").depends_on("Interface"))
			.build();
		assert!(matches!(missing_dep, Err(crate::Error::UnknownOption(k)) if k == "Interface"));
	}

	#[test]
	fn duplicate_keys_are_rejected() {
		let anatomy = anatomy();
		let result = CatalogBuilder::new(&anatomy)
			.add_option(OptionRecord::new("Eye").part("LeftEye"))
			.add_option(OptionRecord::new("Eye").part("RightEye"))
			.build();
		assert!(matches!(result, Err(crate::Error::Validation(_))));
	}

	#[test]
	fn dependency_cycles_are_found() {
		let anatomy = anatomy();
		let catalog = CatalogBuilder::new(&anatomy)
			.add_option(OptionRecord::new("A").part("LeftEye").depends_on("B"))
			.add_option(OptionRecord::new("B").part("RightEye").depends_on("A"))
			.add_option(OptionRecord::new("C").part("Brain").depends_on("C"))
			.add_option(OptionRecord::new("D").whole_body().depends_on("A"))
			.build()
			.unwrap();
		let mut cycles = catalog.dependency_cycles();
		cycles.sort();
		let a = catalog.find("A").unwrap();
		let b = catalog.find("B").unwrap();
		let c = catalog.find("C").unwrap();
		assert_eq!(cycles, vec![vec![a, b], vec![c]]);

		let d = catalog.find("D").unwrap();
		let mut dependents: Vec<_> = catalog.dependents_of(a).collect();
		dependents.sort();
		assert_eq!(dependents, vec![b, d]);
	}

	#[test]
	fn inverted_intensity_from_json_is_normalised() {
		let anatomy = anatomy();
		let record: OptionRecord = serde_json::from_str(r#"{ "key": "Chip", "parts": ["Brain"], "intensity": { "min": 6.0, "max": 1.0 } }"#).unwrap();
		let catalog = CatalogBuilder::new(&anatomy).add_option(record).build().unwrap();
		let range = catalog[catalog.find("Chip").unwrap()].intensity;
		assert_eq!(range, IntensityRange::new(1.0, 6.0));
		assert_eq!(range.clamp(3.0), 3.0);
		assert_eq!(range.clamp(9.0), 6.0);
	}

	#[test]
	fn non_finite_intensity_is_rejected() {
		let anatomy = anatomy();
		let result = CatalogBuilder::new(&anatomy)
			.add_option(OptionRecord::new("Chip").part("Brain").intensity(f32::NAN, 1.0))
			.build();
		assert!(matches!(result, Err(crate::Error::Validation(_))));
	}

	#[test]
	fn records_deserialize_with_defaults() {
		let record: OptionRecord = serde_json::from_str(r#"{ "key": "Heart", "parts": ["Torso"], "replaces_part": true }"#).unwrap();
		assert_eq!(record, OptionRecord::new("Heart").part("Torso").replaces_part());
	}
}

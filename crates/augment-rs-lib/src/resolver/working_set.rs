use std::collections::HashMap;

use crate::anatomy::PartId;
use crate::catalog::{OptionCatalog, OptionId};
use crate::implant::{ImplantInstance, InstanceId};

use super::SelectionState;

/// The mutable half of a session: instances in insertion order and how each option was selected.
///
/// Cloning it is how a session keeps its cancel snapshot.
#[derive(Debug, Clone, Default)]
pub struct WorkingSet {
	instances: Vec<ImplantInstance>,
	states: HashMap<OptionId, SelectionState>,
	next_id: u64,
}

impl WorkingSet {
	pub fn instances(&self) -> &[ImplantInstance] {
		&self.instances
	}

	pub fn state(&self, option: OptionId) -> SelectionState {
		self.states.get(&option).copied().unwrap_or_default()
	}

	/// Options currently selected in any way, sorted by id.
	pub fn selected_options(&self) -> Vec<OptionId> {
		let mut selected: Vec<_> = self.states.iter()
			.filter(|(_, s)| s.is_selected())
			.map(|(o, _)| *o)
			.collect();
		selected.sort();
		selected
	}

	/// Whether at least one instance of `option` exists.
	pub fn is_represented(&self, option: OptionId) -> bool {
		self.instances.iter().any(|i| i.option == option)
	}

	pub fn find(&self, option: OptionId, part: Option<PartId>) -> Option<&ImplantInstance> {
		self.instances.iter().find(|i| i.option == option && i.part == part)
	}

	/// Appends a new instance of `option`.
	///
	/// A direct selection always wins over a dependency selection, a dependency selection
	/// never demotes a direct one.
	/// # Panics
	/// - If `option` is not in `catalog`.
	pub fn add_instance(&mut self, catalog: &OptionCatalog, option: OptionId, part: Option<PartId>, intensity: f32, state: SelectionState) -> InstanceId {
		self.next_id += 1;
		let id = InstanceId(self.next_id);
		self.instances.push(ImplantInstance::new(id, option, &catalog[option], part, intensity));

		let current = self.states.entry(option).or_default();
		if state == SelectionState::Selected || *current == SelectionState::Unselected {
			*current = state;
		}
		id
	}

	/// Removes the instance of `option` on `part`, clearing the option's state if it was the last one.
	pub fn remove_instance(&mut self, option: OptionId, part: Option<PartId>) -> Option<ImplantInstance> {
		let index = self.instances.iter().position(|i| i.option == option && i.part == part)?;
		let removed = self.instances.remove(index);
		if !self.is_represented(option) {
			self.states.remove(&option);
		}
		Some(removed)
	}

	/// Removes every instance of `option` and clears its state.
	pub fn remove_option(&mut self, option: OptionId) -> Vec<ImplantInstance> {
		let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.instances)
			.into_iter()
			.partition(|i| i.option == option);
		self.instances = kept;
		self.states.remove(&option);
		removed
	}

	/// Replaces the instances and states with `snapshot`'s.
	///
	/// The id counter never moves backwards so ids stay unique for the whole session.
	pub fn restore(&mut self, snapshot: &WorkingSet) {
		let next_id = self.next_id.max(snapshot.next_id);
		*self = snapshot.clone();
		self.next_id = next_id;
	}

	/// Sets the intensity of every instance of `option`, returning how many changed.
	pub fn set_intensity(&mut self, option: OptionId, intensity: f32) -> usize {
		let mut count = 0;
		for instance in self.instances.iter_mut().filter(|i| i.option == option) {
			instance.intensity = intensity;
			count += 1;
		}
		count
	}
}

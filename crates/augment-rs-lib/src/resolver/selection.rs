//! Per option and per part enablement derived from validity and blocking.

use std::collections::HashMap;

use crate::anatomy::PartId;
use crate::catalog::{OptionCatalog, OptionId};
use crate::implant::{ImplantInstance, InstanceId};

use super::validity::Validity;

/// How an option came to be selected.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectionState {
	#[default] Unselected,
	/// Chosen directly by the user.
	Selected,
	/// Added by the dependency closure, removed again once nothing needs it.
	SelectedAsDependency,
}

impl SelectionState {
	pub fn is_selected(&self) -> bool {
		!matches!(self, SelectionState::Unselected)
	}
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OptionSelection {
	pub selected: bool,
	pub selected_as_dependency: bool,
	/// Selected, but none of the option's enabled parts carry one of its instances.
	pub partially_selected: bool,
	pub disabled: bool,
	pub blocking_instance: Option<InstanceId>,
}

impl OptionSelection {
	pub fn is_selected(&self) -> bool {
		self.selected || self.selected_as_dependency
	}
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PartSelection {
	pub selected: bool,
	pub disabled: bool,
	pub blocking_instance: Option<InstanceId>,
}

/// Everything the presentation layer needs to draw option and part rows.
#[derive(Debug, Clone, Default)]
pub struct SelectionView {
	options: HashMap<OptionId, OptionSelection>,
	parts: HashMap<(OptionId, PartId), PartSelection>,
}

impl SelectionView {
	pub fn option(&self, option: OptionId) -> OptionSelection {
		self.options.get(&option).copied().unwrap_or_default()
	}

	pub fn part(&self, option: OptionId, part: PartId) -> PartSelection {
		self.parts.get(&(option, part)).copied().unwrap_or_default()
	}

	pub fn options(&self) -> &HashMap<OptionId, OptionSelection> {
		&self.options
	}

	pub fn parts(&self) -> &HashMap<(OptionId, PartId), PartSelection> {
		&self.parts
	}
}

/// Works out the row state of every option in `catalog`.
///
/// A part is disabled when it is blocked and the option's own instance there, if it has one,
/// isn't valid. Single part options mirror their part, options with several parts stay
/// available until every part is disabled.
pub fn evaluate_selection(
	catalog: &OptionCatalog,
	working: &[ImplantInstance],
	states: impl Fn(OptionId) -> SelectionState,
	validity: &Validity,
	blocked: &HashMap<PartId, InstanceId>)
	-> SelectionView
{
	/* First instance of each option per part, later duplicates don't change what a row shows */
	let mut occupants = HashMap::<(OptionId, PartId), InstanceId>::with_capacity(working.len());
	for instance in working {
		if let Some(part) = instance.part {
			occupants.entry((instance.option, part)).or_insert(instance.id);
		}
	}

	let mut view = SelectionView::default();
	for (option, def) in catalog.options() {
		let state = states(option);

		let mut first_disabled_blocker = None;
		let mut disabled_count = 0;
		let mut occupied_enabled = false;
		for &part in &def.parts {
			let occupant = occupants.get(&(option, part)).copied();
			let blocker = blocked.get(&part).copied();
			let disabled = blocker.is_some() && !occupant.is_some_and(|i| validity.is_valid(i));

			if disabled {
				disabled_count += 1;
				if first_disabled_blocker.is_none() {
					first_disabled_blocker = blocker;
				}
			} else if occupant.is_some() {
				occupied_enabled = true;
			}

			view.parts.insert((option, part), PartSelection {
				selected: occupant.is_some(),
				disabled,
				blocking_instance: if disabled { blocker } else { None },
			});
		}

		/* Whole body options have no parts to be blocked. An option with no parts at all can never be placed */
		let disabled = !def.whole_body && disabled_count == def.parts.len();

		view.options.insert(option, OptionSelection {
			selected: state == SelectionState::Selected,
			selected_as_dependency: state == SelectionState::SelectedAsDependency,
			partially_selected: state.is_selected() && !def.whole_body && !occupied_enabled,
			disabled,
			blocking_instance: if disabled { first_disabled_blocker } else { None },
		});
	}

	view
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::anatomy::{AnatomyDef, AnatomyTree};
	use crate::catalog::{CatalogBuilder, OptionRecord};
	use crate::resolver::{blocking, validity};

	struct Fixture {
		anatomy: AnatomyTree,
		catalog: OptionCatalog,
	}

	fn fixture() -> Fixture {
		let anatomy = AnatomyTree::from_def(&serde_json::from_str::<AnatomyDef>(r#"{
			"name": "Torso",
			"children": [
				{ "name": "LeftArm", "children": [ { "name": "LeftHand" } ] },
				{ "name": "RightArm", "children": [ { "name": "RightHand" } ] }
			]
		}"#).unwrap()).unwrap();
		let catalog = CatalogBuilder::new(&anatomy)
			.add_option(OptionRecord::new("BionicArm").part("LeftArm").part("RightArm").replaces_part())
			.add_option(OptionRecord::new("PowerClaw").part("LeftHand").part("RightHand"))
			.add_option(OptionRecord::new("Talon").part("LeftHand"))
			.add_option(OptionRecord::new("Painstopper").whole_body())
			.add_option(OptionRecord::new("Gill"))
			.build()
			.unwrap();
		Fixture { anatomy, catalog }
	}

	impl Fixture {
		fn instance(&self, id: u64, option: &str, part: Option<&str>) -> ImplantInstance {
			let option = self.catalog.find(option).unwrap();
			ImplantInstance::new(InstanceId(id), option, &self.catalog[option], part.map(|p| self.anatomy.find(p).unwrap()), 0.0)
		}

		fn evaluate(&self, working: &[ImplantInstance]) -> SelectionView {
			let validity = validity::resolve_validity(working, &self.anatomy);
			let blocked = blocking::compute_blocked(self.catalog.candidate_parts(), validity.replaced_parts(), &self.anatomy);
			let selected: Vec<_> = working.iter().map(|i| i.option).collect();
			evaluate_selection(&self.catalog, working, |o| if selected.contains(&o) { SelectionState::Selected } else { SelectionState::Unselected }, &validity, &blocked)
		}
	}

	#[test]
	fn replacing_instance_does_not_disable_its_own_part() {
		let f = fixture();
		let arm = f.instance(1, "BionicArm", Some("LeftArm"));
		let view = f.evaluate(&[arm]);
		let bionic = f.catalog.find("BionicArm").unwrap();
		let left_arm = f.anatomy.find("LeftArm").unwrap();
		assert_eq!(view.part(bionic, left_arm), PartSelection { selected: true, disabled: false, blocking_instance: None });
		assert!(!view.option(bionic).disabled);
		assert!(!view.option(bionic).partially_selected);
	}

	#[test]
	fn single_part_option_mirrors_its_part() {
		let f = fixture();
		let view = f.evaluate(&[f.instance(1, "BionicArm", Some("LeftArm"))]);
		let talon = f.catalog.find("Talon").unwrap();
		let left_hand = f.anatomy.find("LeftHand").unwrap();
		assert!(view.part(talon, left_hand).disabled);
		assert_eq!(view.option(talon), OptionSelection { disabled: true, blocking_instance: Some(InstanceId(1)), ..Default::default() });
	}

	#[test]
	fn multi_part_option_needs_every_part_disabled() {
		let f = fixture();
		let claw = f.catalog.find("PowerClaw").unwrap();

		let one_arm = f.evaluate(&[f.instance(1, "BionicArm", Some("LeftArm"))]);
		assert!(one_arm.part(claw, f.anatomy.find("LeftHand").unwrap()).disabled);
		assert!(!one_arm.part(claw, f.anatomy.find("RightHand").unwrap()).disabled);
		assert!(!one_arm.option(claw).disabled);

		let both_arms = f.evaluate(&[f.instance(1, "BionicArm", Some("LeftArm")), f.instance(2, "BionicArm", Some("RightArm"))]);
		assert!(both_arms.option(claw).disabled);
		assert_eq!(both_arms.option(claw).blocking_instance, Some(InstanceId(1)));
	}

	#[test]
	fn selection_on_blocked_part_is_partial() {
		let f = fixture();
		let view = f.evaluate(&[f.instance(1, "Talon", Some("LeftHand")), f.instance(2, "BionicArm", Some("LeftArm"))]);
		let talon = f.catalog.find("Talon").unwrap();
		let selection = view.option(talon);
		assert!(selection.selected);
		assert!(selection.disabled);
		assert!(selection.partially_selected);
		assert_eq!(selection.blocking_instance, Some(InstanceId(2)));
	}

	#[test]
	fn whole_body_is_never_disabled_and_partless_always_is() {
		let f = fixture();
		let view = f.evaluate(&[f.instance(1, "Painstopper", None)]);
		let painstopper = view.option(f.catalog.find("Painstopper").unwrap());
		assert!(painstopper.selected && !painstopper.disabled && !painstopper.partially_selected);

		let gill = view.option(f.catalog.find("Gill").unwrap());
		assert!(gill.disabled);
		assert_eq!(gill.blocking_instance, None);
	}
}

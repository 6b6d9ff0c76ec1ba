//! Structural validity of the working instances.
//!
//! Three passes, each only looking at what the previous pass accepted:
//! 1. Same part collisions. Walking the list in order, an instance is dropped if an earlier
//! replacing instance already claimed its part. Earlier entries win.
//! 1. Ancestor invalidation. An instance is invalid if it sits on a replaced part without
//! replacing it itself, or if any part above it was replaced.
//! 1. Whatever survives is valid, and the replacing survivors make up the replaced map.
//!
//! Collisions are settled before ancestors are checked so an ancestor's own winner is
//! stable by the time its descendants are measured against it.

use std::collections::{HashMap, HashSet};

use crate::anatomy::{AnatomyTree, PartId};
use crate::implant::{ImplantInstance, InstanceId};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Validity {
	valid: HashSet<InstanceId>,
	replaced: HashMap<PartId, InstanceId>,
}

impl Validity {
	pub fn is_valid(&self, instance: InstanceId) -> bool {
		self.valid.contains(&instance)
	}

	pub fn valid_count(&self) -> usize {
		self.valid.len()
	}

	/// Parts removed by a valid replacing instance. At most one entry per part.
	pub fn replaced_parts(&self) -> &HashMap<PartId, InstanceId> {
		&self.replaced
	}

	/// The valid subset of `working`, in working order.
	pub fn valid_instances<'i>(&'i self, working: &'i [ImplantInstance]) -> impl Iterator<Item = &'i ImplantInstance> + 'i {
		working.iter().filter(move |i| self.valid.contains(&i.id))
	}
}

pub fn resolve_validity(working: &[ImplantInstance], anatomy: &AnatomyTree) -> Validity {
	/* Pass 1: first writer wins on each part */
	let mut pass1_replaced = HashMap::<PartId, InstanceId>::new();
	let mut pass1_accepted = Vec::<&ImplantInstance>::with_capacity(working.len());
	for instance in working {
		if let Some(part) = instance.part {
			if let Some(winner) = pass1_replaced.get(&part) {
				log::trace!("Implant {} dropped, part {} already replaced by {}", instance.id, anatomy.name(part), winner);
				continue;
			}
			if instance.replaces_part {
				pass1_replaced.insert(part, instance.id);
			}
		}
		pass1_accepted.push(instance);
	}

	/* Pass 2: nothing may sit on or below a replaced part */
	let mut validity = Validity::default();
	for instance in pass1_accepted {
		/* Whole body implants are never filtered */
		if let Some(part) = instance.part {
			if !instance.replaces_part && pass1_replaced.contains_key(&part) {
				log::trace!("Implant {} invalid, part {} is replaced", instance.id, anatomy.name(part));
				continue;
			}
			if let Some(ancestor) = anatomy.ancestors(part).find(|a| pass1_replaced.contains_key(a)) {
				log::trace!("Implant {} invalid, ancestor {} is replaced", instance.id, anatomy.name(ancestor));
				continue;
			}
			if instance.replaces_part {
				validity.replaced.insert(part, instance.id);
			}
		}
		validity.valid.insert(instance.id);
	}

	validity
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::anatomy::AnatomyDef;
	use crate::catalog::OptionId;

	struct Fixture {
		anatomy: AnatomyTree,
		next: u64,
	}

	impl Fixture {
		fn new() -> Self {
			let anatomy = AnatomyTree::from_def(&serde_json::from_str::<AnatomyDef>(r#"{
				"name": "Torso",
				"children": [ { "name": "Arm", "children": [ { "name": "Hand", "children": [ { "name": "Finger" } ] } ] } ]
			}"#).unwrap()).unwrap();
			Self { anatomy, next: 0 }
		}

		fn implant(&mut self, part: Option<&str>, replaces_part: bool) -> ImplantInstance {
			self.next += 1;
			ImplantInstance {
				id: InstanceId(self.next),
				/* Validity never looks at the option */
				option: OptionId(0),
				part: part.map(|p| self.anatomy.find(p).unwrap()),
				replaces_part,
				intensity: 0.0,
			}
		}
	}

	#[test]
	fn earliest_replacement_wins() {
		let mut f = Fixture::new();
		let first = f.implant(Some("Arm"), true);
		let second = f.implant(Some("Arm"), true);
		let validity = resolve_validity(&[first.clone(), second.clone()], &f.anatomy);
		assert!(validity.is_valid(first.id));
		assert!(!validity.is_valid(second.id));
		assert_eq!(validity.replaced_parts().len(), 1);
		assert_eq!(validity.replaced_parts()[&f.anatomy.find("Arm").unwrap()], first.id);
	}

	#[test]
	fn non_replacing_on_replaced_part_is_invalid_regardless_of_order() {
		let mut f = Fixture::new();
		let addon = f.implant(Some("Hand"), false);
		let hand = f.implant(Some("Hand"), true);
		let validity = resolve_validity(&[addon.clone(), hand.clone()], &f.anatomy);
		assert!(!validity.is_valid(addon.id));
		assert!(validity.is_valid(hand.id));
	}

	#[test]
	fn descendants_of_replaced_parts_are_invalid() {
		let mut f = Fixture::new();
		let finger = f.implant(Some("Finger"), true);
		let arm = f.implant(Some("Arm"), true);
		let validity = resolve_validity(&[finger.clone(), arm.clone()], &f.anatomy);
		assert!(!validity.is_valid(finger.id));
		assert!(validity.is_valid(arm.id));
		let arm_part = f.anatomy.find("Arm").unwrap();
		assert_eq!(validity.replaced_parts().iter().collect::<Vec<_>>(), vec![(&arm_part, &arm.id)]);
	}

	#[test]
	fn invalid_ancestor_replacement_still_blocks_descendants() {
		let mut f = Fixture::new();
		let torso = f.implant(Some("Torso"), true);
		let arm = f.implant(Some("Arm"), true);
		let finger = f.implant(Some("Finger"), false);
		let validity = resolve_validity(&[torso.clone(), arm.clone(), finger.clone()], &f.anatomy);
		assert!(validity.is_valid(torso.id));
		assert!(!validity.is_valid(arm.id));
		assert!(!validity.is_valid(finger.id));
		assert_eq!(validity.replaced_parts().len(), 1);
	}

	#[test]
	fn whole_body_is_never_filtered() {
		let mut f = Fixture::new();
		let torso = f.implant(Some("Torso"), true);
		let whole = f.implant(None, false);
		let validity = resolve_validity(&[torso, whole.clone()], &f.anatomy);
		assert!(validity.is_valid(whole.id));
		assert_eq!(validity.valid_count(), 2);
	}

	#[test]
	fn valid_instances_keep_working_order() {
		let mut f = Fixture::new();
		let working = vec![f.implant(Some("Finger"), false), f.implant(None, false), f.implant(Some("Hand"), false)];
		let validity = resolve_validity(&working, &f.anatomy);
		let ids: Vec<_> = validity.valid_instances(&working).map(|i| i.id).collect();
		assert_eq!(ids, working.iter().map(|i| i.id).collect::<Vec<_>>());
	}
}

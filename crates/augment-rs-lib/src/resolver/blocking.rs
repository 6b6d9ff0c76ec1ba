//! Which implant is blocking each candidate part.

use std::collections::HashMap;

use crate::anatomy::{AnatomyTree, PartId};
use crate::implant::InstanceId;

/// Maps every blocked part in `candidate_parts` to the instance blocking it.
///
/// Unblocked parts are left out. Parts listed more than once are only resolved once.
pub fn compute_blocked(candidate_parts: &[PartId], replaced: &HashMap<PartId, InstanceId>, anatomy: &AnatomyTree) -> HashMap<PartId, InstanceId> {
	let mut resolved = HashMap::<PartId, Option<InstanceId>>::with_capacity(candidate_parts.len());
	for &part in candidate_parts {
		resolved.entry(part).or_insert_with(|| find_blocker(part, replaced, anatomy));
	}
	resolved.into_iter()
		.filter_map(|(part, blocker)| blocker.map(|b| (part, b)))
		.collect()
}

/// The instance replacing `part` itself, otherwise the one replacing its nearest replaced ancestor.
pub fn find_blocker(part: PartId, replaced: &HashMap<PartId, InstanceId>, anatomy: &AnatomyTree) -> Option<InstanceId> {
	replaced.get(&part)
		.or_else(|| anatomy.ancestors(part).find_map(|a| replaced.get(&a)))
		.copied()
}

//! Keeping `depends_on` edges satisfied.
//!
//! After a selection run [`add_missing_dependencies()`]. After a deselection run
//! [`remove_unneeded_dependencies()`] followed by [`add_missing_dependencies()`].
//!
//! Dependencies can chain (A → B → C) so both functions loop until nothing changes.
//! Each loop is capped by [`SessionOptions::closure_iteration_cap()`], hitting the cap
//! stops the loop where it is and is reported through [`ClosureReport::cycle_guard_triggered`].

use crate::catalog::{OptionCatalog, OptionId};
use crate::config::SessionOptions;

use super::{SelectionState, WorkingSet};

/// What a closure pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClosureReport {
	pub iterations: usize,
	pub added: Vec<OptionId>,
	pub removed: Vec<OptionId>,
	/// Required options that couldn't be added without choosing a part.
	pub unresolvable: Vec<OptionId>,
	pub cycle_guard_triggered: bool,
}

impl ClosureReport {
	pub fn merge(&mut self, other: ClosureReport) {
		self.iterations += other.iterations;
		self.added.extend(other.added);
		self.removed.extend(other.removed);
		for option in other.unresolvable {
			if !self.unresolvable.contains(&option) {
				self.unresolvable.push(option);
			}
		}
		self.cycle_guard_triggered |= other.cycle_guard_triggered;
	}
}

/// Options some instance depends on that have no instance of their own, in working order.
pub fn missing_dependencies(working: &WorkingSet, catalog: &OptionCatalog) -> Vec<OptionId> {
	let mut missing = Vec::<OptionId>::new();
	for instance in working.instances() {
		if let Some(target) = catalog.get(instance.option).and_then(|o| o.depends_on) {
			if !missing.contains(&target) && !working.is_represented(target) {
				missing.push(target);
			}
		}
	}
	missing
}

/// Options selected as a dependency that no instance depends on any more.
pub fn unneeded_dependencies(working: &WorkingSet, catalog: &OptionCatalog) -> Vec<OptionId> {
	working.selected_options()
		.into_iter()
		.filter(|option| working.state(*option) == SelectionState::SelectedAsDependency)
		.filter(|option| {
			!working.instances().iter().any(|i| catalog.get(i.option).and_then(|o| o.depends_on) == Some(*option))
		})
		.collect()
}

/// Creates instances for required options until every dependency is represented.
///
/// Only options with a single eligible part, or whole-body options, can be added. The rest
/// are listed in [`ClosureReport::unresolvable`] and left for the user.
pub fn add_missing_dependencies(working: &mut WorkingSet, catalog: &OptionCatalog, options: &SessionOptions) -> ClosureReport {
	let mut report = ClosureReport::default();
	loop {
		let missing = missing_dependencies(working, catalog);
		if missing.is_empty() {
			break;
		}
		if report.iterations >= options.closure_iteration_cap() {
			log::warn!("Adding dependencies stopped after {} iterations with {} still missing", report.iterations, missing.len());
			report.cycle_guard_triggered = true;
			break;
		}
		report.iterations += 1;

		let (addable, unresolvable): (Vec<_>, Vec<_>) = missing.into_iter().partition(|o| catalog[*o].can_auto_select());
		for option in unresolvable {
			if !report.unresolvable.contains(&option) {
				log::debug!("Dependency {} has {} eligible parts, leaving it for the user", catalog[option].key, catalog[option].parts.len());
				report.unresolvable.push(option);
			}
		}
		if addable.is_empty() {
			break;
		}

		for option in addable {
			let def = &catalog[option];
			log::trace!("Adding {} as a dependency", def.key);
			let intensity = options.default_intensity().for_range(&def.intensity);
			working.add_instance(catalog, option, def.sole_part(), intensity, SelectionState::SelectedAsDependency);
			report.added.push(option);
		}
	}
	report
}

/// Removes options that were only selected as a dependency and are no longer required.
pub fn remove_unneeded_dependencies(working: &mut WorkingSet, catalog: &OptionCatalog, options: &SessionOptions) -> ClosureReport {
	let mut report = ClosureReport::default();
	loop {
		let unneeded = unneeded_dependencies(working, catalog);
		if unneeded.is_empty() {
			break;
		}
		if report.iterations >= options.closure_iteration_cap() {
			log::warn!("Removing dependencies stopped after {} iterations with {} still unneeded", report.iterations, unneeded.len());
			report.cycle_guard_triggered = true;
			break;
		}
		report.iterations += 1;

		for option in unneeded {
			log::trace!("Removing dependency {}, nothing requires it", catalog[option].key);
			working.remove_option(option);
			report.removed.push(option);
		}
	}
	report
}

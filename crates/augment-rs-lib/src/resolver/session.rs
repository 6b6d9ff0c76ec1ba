//! The editing session the presentation layer drives.

use std::cell::OnceCell;
use std::collections::HashMap;

use crate::anatomy::{AnatomyTree, PartId};
use crate::catalog::{OptionCatalog, OptionId};
use crate::config::SessionOptions;
use crate::implant::{ImplantInstance, ImplantRecord, InstanceId, SavedImplant};

use super::*;
use super::selection::SelectionView;
use super::validity::Validity;

/// Refusals from [`ResolutionSession::commit()`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommitError {
	/// The confirmation gate rejected the commit, the message is meant for the user.
	#[error("{0}")]
	ValidationFailure(String),
}

/// Hook that may veto a commit. Returning `Some(message)` refuses it.
pub type ConfirmationGate<'a> = Box<dyn Fn(&[ImplantInstance]) -> Option<String> + 'a>;

/// A selection that is present but won't survive a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockedSelection {
	pub instance: InstanceId,
	pub option: OptionId,
	pub part: Option<PartId>,
	/// The replacing instance responsible, when there is one.
	pub blocker: Option<InstanceId>,
}

/// Derived state, rebuilt from the working set whenever it is read after a mutation.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
	validity: Validity,
	blocked_parts: HashMap<PartId, InstanceId>,
	selection: SelectionView,
}

impl SessionState {
	pub fn is_valid(&self, instance: InstanceId) -> bool {
		self.validity.is_valid(instance)
	}

	pub fn validity(&self) -> &Validity {
		&self.validity
	}

	pub fn replaced_parts(&self) -> &HashMap<PartId, InstanceId> {
		self.validity.replaced_parts()
	}

	pub fn blocked_parts(&self) -> &HashMap<PartId, InstanceId> {
		&self.blocked_parts
	}

	pub fn selection(&self) -> &SelectionView {
		&self.selection
	}
}

/// Holds a character's implant selections while they are being edited.
///
/// # Usage
/// See the [`resolver`](crate::resolver) module documentation.
///
/// Mutations only mark the derived state stale, it is rebuilt on the next read.
pub struct ResolutionSession<'a> {
	anatomy: &'a AnatomyTree,
	catalog: &'a OptionCatalog,
	options: SessionOptions,

	working: WorkingSet,
	/// Working set as it was when the session opened, restored by `cancel()`.
	snapshot: WorkingSet,
	state: OnceCell<SessionState>,

	gate: Option<ConfirmationGate<'a>>,
	warnings: Vec<ResolveWarning>,
}

impl<'a> ResolutionSession<'a> {
	/// Opens a session over the character's current implants.
	///
	/// Records that don't fit the providers are skipped with a warning, see [`warnings()`](Self::warnings).
	/// # Errors
	/// - [`MissingCatalog`](crate::Error::MissingCatalog) when the catalog has no options.
	pub fn new(anatomy: &'a AnatomyTree, catalog: &'a OptionCatalog, implants: impl IntoIterator<Item = ImplantRecord>, options: SessionOptions) -> crate::Result<Self> {
		Self::open(anatomy, catalog, implants.into_iter().map(Ok), options)
	}

	/// Opens a session from persisted records, looking up option and part names.
	///
	/// # Errors
	/// - [`MissingCatalog`](crate::Error::MissingCatalog) when the catalog has no options.
	pub fn from_saved<'s>(anatomy: &'a AnatomyTree, catalog: &'a OptionCatalog, saved: impl IntoIterator<Item = &'s SavedImplant>, options: SessionOptions) -> crate::Result<Self> {
		Self::open(anatomy, catalog, saved.into_iter().map(|s| s.resolve(catalog, anatomy)), options)
	}

	fn open(anatomy: &'a AnatomyTree, catalog: &'a OptionCatalog, records: impl Iterator<Item = Result<ImplantRecord, ResolveWarning>>, options: SessionOptions) -> crate::Result<Self> {
		if catalog.is_empty() {
			return Err(crate::Error::MissingCatalog);
		}

		let mut warnings = Vec::<ResolveWarning>::new();
		if options.report_dependency_cycles() {
			for cycle in catalog.dependency_cycles() {
				let keys: Vec<_> = cycle.into_iter().map(|o| catalog[o].key.clone()).collect();
				log::warn!("Options {:?} depend on each other in a cycle", keys);
				warnings.push(ResolveWarning::DependencyCycle(keys));
			}
		}

		let mut working = WorkingSet::default();
		for record in records {
			let record = match record.and_then(|r| r.validate(catalog, anatomy).map(|_| r)) {
				Ok(r) => r,
				Err(w) => {
					log::warn!("Skipping implant: {}", w);
					warnings.push(w);
					continue;
				},
			};
			let def = &catalog[record.option];
			let intensity = record.intensity.unwrap_or_else(|| options.default_intensity().for_range(&def.intensity));
			working.add_instance(catalog, record.option, record.part, intensity, SelectionState::Selected);
		}

		log::debug!("Opened implant session with {} implants", working.instances().len());

		Ok(Self {
			anatomy,
			catalog,
			options,
			snapshot: working.clone(),
			working,
			state: OnceCell::new(),
			gate: None,
			warnings,
		})
	}

	/// Installs a hook that can refuse [`commit()`](Self::commit) with a message for the user.
	pub fn with_confirmation_gate(mut self, gate: impl Fn(&[ImplantInstance]) -> Option<String> + 'a) -> Self {
		self.gate = Some(Box::new(gate));
		self
	}

	/* Fields */

	pub fn anatomy(&self) -> &'a AnatomyTree {
		self.anatomy
	}

	pub fn catalog(&self) -> &'a OptionCatalog {
		self.catalog
	}

	pub fn options(&self) -> &SessionOptions {
		&self.options
	}

	pub fn working_instances(&self) -> &[ImplantInstance] {
		self.working.instances()
	}

	/// Non-fatal conditions, in the order they were found.
	///
	/// Lookup misses and dependency cycles from opening the session stay for its lifetime.
	/// Cycle guard and unresolvable dependency warnings only describe the latest dependency
	/// closure, they are replaced by each selection change and cleared by `cancel()`.
	pub fn warnings(&self) -> &[ResolveWarning] {
		&self.warnings
	}

	/* Derived state */

	/// Whether the next read will rebuild the derived state.
	pub fn is_dirty(&self) -> bool {
		self.state.get().is_none()
	}

	pub fn state(&self) -> &SessionState {
		self.state.get_or_init(|| self.compute_state())
	}

	/// Rebuilds the derived state now instead of on the next read.
	pub fn recompute(&mut self) -> &SessionState {
		self.invalidate();
		self.state()
	}

	pub fn option_selection(&self, option: OptionId) -> OptionSelection {
		self.state().selection().option(option)
	}

	pub fn part_selection(&self, option: OptionId, part: PartId) -> PartSelection {
		self.state().selection().part(option, part)
	}

	/// Valid instances in working order.
	pub fn valid_instances(&self) -> Vec<&ImplantInstance> {
		self.state().validity().valid_instances(self.working.instances()).collect()
	}

	/// Selections that are present but blocked, in working order, for warning the user before a commit.
	pub fn blocked_selections(&self) -> Vec<BlockedSelection> {
		let state = self.state();
		self.working.instances().iter()
			.filter(|i| !state.is_valid(i.id))
			.map(|i| BlockedSelection {
				instance: i.id,
				option: i.option,
				part: i.part,
				blocker: i.part.and_then(|p| blocking::find_blocker(p, state.replaced_parts(), self.anatomy)),
			})
			.collect()
	}

	fn compute_state(&self) -> SessionState {
		let instances = self.working.instances();
		let validity = validity::resolve_validity(instances, self.anatomy);
		let blocked_parts = blocking::compute_blocked(self.catalog.candidate_parts(), validity.replaced_parts(), self.anatomy);
		let selection = selection::evaluate_selection(self.catalog, instances, |o| self.working.state(o), &validity, &blocked_parts);
		log::debug!("Recomputed implant state: {} of {} valid, {} parts blocked", validity.valid_count(), instances.len(), blocked_parts.len());
		SessionState {
			validity,
			blocked_parts,
			selection,
		}
	}

	fn invalidate(&mut self) {
		self.state = OnceCell::new();
	}

	/* Mutations */

	/// Selects or deselects an option row.
	///
	/// Deselecting removes every instance of the option. Selecting only works for options with a
	/// single part or no part at all, use [`toggle_part()`](Self::toggle_part) for the rest.
	/// # Errors
	/// - [`UnknownOption`](crate::Error::UnknownOption) when `option` is not in the catalog.
	/// - [`PartSelectionRequired`](crate::Error::PartSelectionRequired) when selecting an option with several parts.
	/// - [`Blocked`](crate::Error::Blocked) when selecting a disabled option.
	pub fn toggle_option(&mut self, option: OptionId) -> crate::Result<()> {
		let catalog = self.catalog;
		let def = catalog.get(option).ok_or_else(|| crate::Error::UnknownOption(format!("#{}", option.index())))?;

		if self.working.state(option).is_selected() {
			log::trace!("Deselecting option {}", def.key);
			self.working.remove_option(option);
			self.after_deselect();
			return Ok(());
		}

		if def.is_multi_part() {
			return Err(crate::Error::PartSelectionRequired(def.key.clone()));
		}
		let selection = self.option_selection(option);
		if selection.disabled {
			return Err(crate::Error::Blocked { option: def.key.clone(), blocker: selection.blocking_instance });
		}

		log::trace!("Selecting option {}", def.key);
		let intensity = self.options.default_intensity().for_range(&def.intensity);
		self.working.add_instance(catalog, option, def.sole_part(), intensity, SelectionState::Selected);
		self.after_select();
		Ok(())
	}

	/// Adds or removes the option's instance on one specific part.
	///
	/// # Errors
	/// - [`UnknownOption`](crate::Error::UnknownOption) when `option` is not in the catalog.
	/// - [`PartNotEligible`](crate::Error::PartNotEligible) when the option can't target `part`.
	/// - [`Blocked`](crate::Error::Blocked) when adding to a disabled part.
	pub fn toggle_part(&mut self, option: OptionId, part: PartId) -> crate::Result<()> {
		let catalog = self.catalog;
		let def = catalog.get(option).ok_or_else(|| crate::Error::UnknownOption(format!("#{}", option.index())))?;
		if !def.can_target(Some(part)) {
			return Err(crate::Error::PartNotEligible { option: def.key.clone(), part: self.anatomy.name(part).to_string() });
		}

		if self.working.find(option, Some(part)).is_some() {
			log::trace!("Removing {} from {}", def.key, self.anatomy.name(part));
			self.working.remove_instance(option, Some(part));
			self.after_deselect();
			return Ok(());
		}

		let selection = self.part_selection(option, part);
		if selection.disabled {
			return Err(crate::Error::Blocked { option: def.key.clone(), blocker: selection.blocking_instance });
		}

		log::trace!("Adding {} to {}", def.key, self.anatomy.name(part));
		let intensity = self.options.default_intensity().for_range(&def.intensity);
		self.working.add_instance(catalog, option, Some(part), intensity, SelectionState::Selected);
		self.after_select();
		Ok(())
	}

	/// Sets the intensity of the option's instances, clamped to its range.
	///
	/// Does nothing for unselected or disabled options. Returns whether anything changed.
	/// # Errors
	/// - [`UnknownOption`](crate::Error::UnknownOption) when `option` is not in the catalog.
	pub fn set_intensity(&mut self, option: OptionId, value: f32) -> crate::Result<bool> {
		let def = self.catalog.get(option).ok_or_else(|| crate::Error::UnknownOption(format!("#{}", option.index())))?;
		let selection = self.option_selection(option);
		if !selection.is_selected() || selection.disabled {
			log::trace!("Ignoring intensity change for {}", def.key);
			return Ok(false);
		}
		let value = def.intensity.clamp(value);
		/* Intensity doesn't feed into any derived state so nothing is invalidated */
		Ok(self.working.set_intensity(option, value) > 0)
	}

	/// The valid instances, ready to persist.
	///
	/// Blocked selections are left out. The session is untouched either way so a refused
	/// commit can be retried.
	/// # Errors
	/// - [`ValidationFailure`](CommitError::ValidationFailure) when the confirmation gate refuses.
	pub fn commit(&self) -> Result<Vec<ImplantInstance>, CommitError> {
		let valid: Vec<ImplantInstance> = self.valid_instances().into_iter().cloned().collect();
		if let Some(gate) = &self.gate {
			if let Some(message) = gate(&valid) {
				log::info!("Commit refused: {}", message);
				return Err(CommitError::ValidationFailure(message));
			}
		}
		log::info!("Committing {} implants, {} blocked selections dropped", valid.len(), self.working.instances().len() - valid.len());
		Ok(valid)
	}

	/// Same as [`commit()`](Self::commit) but in the persisted record form.
	pub fn commit_saved(&self) -> Result<Vec<SavedImplant>, CommitError> {
		Ok(self.commit()?.iter().map(|i| i.to_saved(self.catalog, self.anatomy)).collect())
	}

	/// Throws away every change since the session opened.
	pub fn cancel(&mut self) {
		log::trace!("Cancelling implant session");
		self.working.restore(&self.snapshot);
		self.warnings.retain(|w| !is_closure_warning(w));
		self.invalidate();
	}

	fn after_select(&mut self) {
		let report = dependency_closure::add_missing_dependencies(&mut self.working, self.catalog, &self.options);
		self.record_closure(report);
		self.invalidate();
	}

	fn after_deselect(&mut self) {
		let mut report = dependency_closure::remove_unneeded_dependencies(&mut self.working, self.catalog, &self.options);
		report.merge(dependency_closure::add_missing_dependencies(&mut self.working, self.catalog, &self.options));
		self.record_closure(report);
		self.invalidate();
	}

	/// Replaces the closure warnings with those of the latest closure run.
	fn record_closure(&mut self, report: ClosureReport) {
		self.warnings.retain(|w| !is_closure_warning(w));
		if report.cycle_guard_triggered {
			self.warnings.push(ResolveWarning::CycleGuardTriggered(report.iterations));
		}
		for option in report.unresolvable {
			let warning = ResolveWarning::UnresolvableDependency(self.catalog[option].key.clone());
			if !self.warnings.contains(&warning) {
				self.warnings.push(warning);
			}
		}
	}
}

/// Warnings describing the current closure state rather than the session's inputs.
fn is_closure_warning(warning: &ResolveWarning) -> bool {
	matches!(warning, ResolveWarning::CycleGuardTriggered(_) | ResolveWarning::UnresolvableDependency(_))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::anatomy::AnatomyDef;
	use crate::catalog::{CatalogBuilder, OptionRecord};

	fn anatomy() -> AnatomyTree {
		AnatomyTree::from_def(&serde_json::from_str::<AnatomyDef>(r#"{
			"name": "Torso",
			"children": [
				{ "name": "Arm", "children": [ { "name": "Hand", "children": [ { "name": "Finger" } ] } ] },
				{ "name": "Head", "children": [ { "name": "Brain" }, { "name": "LeftEye" }, { "name": "RightEye" } ] }
			]
		}"#).unwrap()).unwrap()
	}

	fn catalog(anatomy: &AnatomyTree) -> OptionCatalog {
		CatalogBuilder::new(anatomy)
			.add_option(OptionRecord::new("BionicArm").part("Arm").replaces_part().intensity(1.0, 6.0))
			.add_option(OptionRecord::new("FingerProsthetic").part("Finger").replaces_part())
			.add_option(OptionRecord::new("AdvancedEye").part("LeftEye").depends_on("NeuralInterface"))
			.add_option(OptionRecord::new("NeuralInterface").part("Brain"))
			.add_option(OptionRecord::new("Lens").part("LeftEye").part("RightEye"))
			.build()
			.unwrap()
	}

	#[test]
	fn mutations_are_recomputed_lazily() {
		let anatomy = anatomy();
		let catalog = catalog(&anatomy);
		let mut session = ResolutionSession::new(&anatomy, &catalog, Vec::new(), SessionOptions::default()).unwrap();
		assert!(session.is_dirty());
		session.state();
		assert!(!session.is_dirty());

		session.toggle_option(catalog.find("BionicArm").unwrap()).unwrap();
		assert!(session.is_dirty());
		assert_eq!(session.valid_instances().len(), 1);
		assert!(!session.is_dirty());
	}

	#[test]
	fn multi_part_option_needs_a_part() {
		let anatomy = anatomy();
		let catalog = catalog(&anatomy);
		let mut session = ResolutionSession::new(&anatomy, &catalog, Vec::new(), SessionOptions::default()).unwrap();
		let lens = catalog.find("Lens").unwrap();
		assert!(matches!(session.toggle_option(lens), Err(crate::Error::PartSelectionRequired(_))));

		let right = anatomy.find("RightEye").unwrap();
		session.toggle_part(lens, right).unwrap();
		session.toggle_part(lens, anatomy.find("LeftEye").unwrap()).unwrap();
		assert_eq!(session.working_instances().len(), 2);
		assert!(session.option_selection(lens).selected);

		/* Deselecting the row drops every part */
		session.toggle_option(lens).unwrap();
		assert!(session.working_instances().is_empty());
		assert!(!session.option_selection(lens).is_selected());
	}

	#[test]
	fn ineligible_part_is_refused() {
		let anatomy = anatomy();
		let catalog = catalog(&anatomy);
		let mut session = ResolutionSession::new(&anatomy, &catalog, Vec::new(), SessionOptions::default()).unwrap();
		let result = session.toggle_part(catalog.find("Lens").unwrap(), anatomy.find("Brain").unwrap());
		assert!(matches!(result, Err(crate::Error::PartNotEligible { .. })));
	}

	#[test]
	fn disabled_option_cannot_be_selected() {
		let anatomy = anatomy();
		let catalog = catalog(&anatomy);
		let arm = catalog.find("BionicArm").unwrap();
		let record = ImplantRecord { option: arm, part: anatomy.find("Arm"), intensity: None };
		let mut session = ResolutionSession::new(&anatomy, &catalog, [record], SessionOptions::default()).unwrap();
		let arm_instance = session.working_instances()[0].id;

		let result = session.toggle_option(catalog.find("FingerProsthetic").unwrap());
		assert!(matches!(result, Err(crate::Error::Blocked { blocker: Some(b), .. }) if b == arm_instance));
		assert_eq!(session.working_instances().len(), 1);
	}

	#[test]
	fn empty_catalog_is_fatal() {
		let anatomy = anatomy();
		let catalog = CatalogBuilder::new(&anatomy).build().unwrap();
		assert!(matches!(ResolutionSession::new(&anatomy, &catalog, Vec::new(), SessionOptions::default()), Err(crate::Error::MissingCatalog)));
	}

	#[test]
	fn initial_records_are_validated() {
		let anatomy = anatomy();
		let catalog = catalog(&anatomy);
		let arm = catalog.find("BionicArm").unwrap();
		let records = [
			ImplantRecord { option: arm, part: anatomy.find("Finger"), intensity: None },
			ImplantRecord { option: arm, part: anatomy.find("Arm"), intensity: Some(12.0) },
		];
		let session = ResolutionSession::new(&anatomy, &catalog, records, SessionOptions::default()).unwrap();
		assert_eq!(session.working_instances().len(), 1);
		assert_eq!(session.working_instances()[0].intensity, 6.0);
		assert_eq!(session.warnings().len(), 1);
		assert!(session.warnings()[0].is_lookup_miss());
	}
}

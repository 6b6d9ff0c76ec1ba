//! Concrete implant selections and their persisted form.

use serde::{Serialize, Deserialize};

use crate::anatomy::{AnatomyTree, PartId};
use crate::catalog::{OptionCatalog, OptionDef, OptionId};
use crate::resolver::ResolveWarning;

/// Session unique identity of an [`ImplantInstance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(pub u64);

impl std::fmt::Display for InstanceId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "#{}", self.0)
	}
}

/// An option bound to a part, or to the whole body.
#[derive(Debug, Clone, PartialEq)]
pub struct ImplantInstance {
	pub id: InstanceId,
	pub option: OptionId,
	/// `None` only for whole-body options.
	pub part: Option<PartId>,
	/// Copied from the option when the instance is created.
	pub replaces_part: bool,
	pub intensity: f32,
}

impl ImplantInstance {
	/// Creates an instance of `def`, clamping `intensity` to the option's range.
	pub fn new(id: InstanceId, option: OptionId, def: &OptionDef, part: Option<PartId>, intensity: f32) -> Self {
		Self {
			id,
			option,
			part,
			replaces_part: def.replaces_part,
			intensity: def.intensity.clamp(intensity),
		}
	}

	/// Converts back into the name based record used for persistence.
	pub fn to_saved(&self, catalog: &OptionCatalog, anatomy: &AnatomyTree) -> SavedImplant {
		SavedImplant {
			option: catalog.get(self.option).map(|o| o.key.clone()).unwrap_or_default(),
			part: self.part.map(|p| anatomy.name(p).to_string()),
			intensity: Some(self.intensity),
		}
	}
}

/// Request for an instance using catalog and anatomy handles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImplantRecord {
	pub option: OptionId,
	pub part: Option<PartId>,
	/// `None` uses the session's default intensity.
	pub intensity: Option<f32>,
}

impl ImplantRecord {
	/// Checks the record against the providers before it becomes an instance.
	pub fn validate(&self, catalog: &OptionCatalog, anatomy: &AnatomyTree) -> Result<(), ResolveWarning> {
		let def = catalog.get(self.option).ok_or_else(|| ResolveWarning::UnknownOption(format!("#{}", self.option.index())))?;
		if let Some(part) = self.part {
			if !anatomy.contains(part) {
				return Err(ResolveWarning::UnknownPart { option: def.key.clone(), part: format!("#{}", part.index()) });
			}
		}
		if !def.can_target(self.part) {
			return Err(ResolveWarning::IneligiblePart {
				option: def.key.clone(),
				part: self.part.map(|p| anatomy.name(p).to_string()),
			});
		}
		Ok(())
	}
}

/// Persisted body modification record, keyed by names so it survives catalog reordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedImplant {
	pub option: String,
	#[serde(default)]
	pub part: Option<String>,
	#[serde(default)]
	pub intensity: Option<f32>,
}

impl SavedImplant {
	/// Looks up the option and part names.
	///
	/// Stale records that name a removed option or part give a warning instead of an error
	/// so the caller can skip them and carry on.
	pub fn resolve(&self, catalog: &OptionCatalog, anatomy: &AnatomyTree) -> Result<ImplantRecord, ResolveWarning> {
		let option = catalog.find(&self.option).ok_or_else(|| ResolveWarning::UnknownOption(self.option.clone()))?;
		let part = match &self.part {
			Some(name) => Some(anatomy.find(name).ok_or_else(|| ResolveWarning::UnknownPart { option: self.option.clone(), part: name.clone() })?),
			None => None,
		};
		let record = ImplantRecord { option, part, intensity: self.intensity };
		record.validate(catalog, anatomy)?;
		Ok(record)
	}
}

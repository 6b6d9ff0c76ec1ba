//! Library error type.

pub type Result<T> = std::result::Result<T, Error>;

use thiserror::Error;

use crate::implant::InstanceId;

#[derive(Debug, Error)]
pub enum Error {
	#[error("IO error: {0}")]
	IO(#[from] std::io::Error),
	#[error("JSON error: {0}")]
	SerdeJSON(#[from] serde_json::Error),
	#[error("validation error: {0}")]
	Validation(String),
	/// A definition names a part the anatomy does not contain.
	#[error("unknown part `{0}`")]
	UnknownPart(String),
	/// A definition or request names an option the catalog does not contain.
	#[error("unknown option `{0}`")]
	UnknownOption(String),
	/// Sessions can't be opened without any options to choose from.
	#[error("option catalog is missing or empty")]
	MissingCatalog,
	#[error("option `{option}` can't be bound to part `{part}`")]
	PartNotEligible {
		option: String,
		part: String,
	},
	/// Option has several eligible parts so a specific part must be toggled instead.
	#[error("option `{0}` requires a part to be chosen")]
	PartSelectionRequired(String),
	/// Selection refused because the target is disabled by an existing replacement.
	#[error("`{option}` is blocked by implant {blocker:?}")]
	Blocked {
		option: String,
		blocker: Option<InstanceId>,
	},
}

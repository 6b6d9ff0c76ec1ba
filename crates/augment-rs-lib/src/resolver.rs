//! Working out which implant selections are valid and keeping their dependencies satisfied.
//!
//! # Usage
//! 1. Build an [`AnatomyTree`](crate::AnatomyTree) and an [`OptionCatalog`](crate::OptionCatalog) for it.
//! 1. Open a [`ResolutionSession`] with the character's current implants, [`ResolutionSession::from_saved()`] for persisted records.
//! 1. Forward user actions to [`ResolutionSession::toggle_option()`], [`ResolutionSession::toggle_part()`] and [`ResolutionSession::set_intensity()`].
//! 1. Read [`ResolutionSession::option_selection()`] / [`ResolutionSession::part_selection()`] to draw rows,
//! and [`ResolutionSession::blocked_selections()`] to warn about selections that will be dropped.
//! 1. [`ResolutionSession::commit()`] to get the valid implants, or [`ResolutionSession::cancel()`] to start over.
//!
//! Derived state is rebuilt from scratch whenever it is read after a mutation:
//! [`validity`] → [`blocking`] → [`selection`].
//!
//! # Threading
//! A session expects a single writer. It does no locking and its cached state lives in a
//! [`std::cell::OnceCell`] so it can't be shared between threads.

pub mod validity;
pub mod blocking;
pub mod selection;
pub mod dependency_closure;

mod working_set;
pub use working_set::WorkingSet;

mod session;
pub use session::ResolutionSession;
pub use session::SessionState;
pub use session::BlockedSelection;
pub use session::CommitError;
pub use session::ConfirmationGate;

pub use selection::{OptionSelection, PartSelection, SelectionState};
pub use dependency_closure::ClosureReport;

/// Non-fatal conditions collected while loading or resolving.
///
/// None of these stop the session, they are kept so the caller can surface them.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResolveWarning {
	/// A record names an option that isn't in the catalog.
	#[error("unknown option `{0}`, implant skipped")]
	UnknownOption(String),
	/// A record names a part that isn't in the anatomy.
	#[error("unknown part `{part}` for option `{option}`, implant skipped")]
	UnknownPart {
		option: String,
		part: String,
	},
	/// The option exists but can't be bound where the record puts it.
	#[error("option `{option}` can't be bound to {part:?}, implant skipped")]
	IneligiblePart {
		option: String,
		part: Option<String>,
	},
	/// A dependency closure loop gave up after this many iterations.
	#[error("dependency closure stopped after {0} iterations")]
	CycleGuardTriggered(usize),
	/// A required option has several eligible parts so it couldn't be added automatically.
	#[error("dependency `{0}` needs a part chosen and wasn't added")]
	UnresolvableDependency(String),
	/// These options depend on each other in a loop.
	#[error("options {0:?} form a dependency cycle")]
	DependencyCycle(Vec<String>),
}

impl ResolveWarning {
	/// Whether the warning came from a stale reference that was skipped.
	pub fn is_lookup_miss(&self) -> bool {
		matches!(self, Self::UnknownOption(_) | Self::UnknownPart { .. } | Self::IneligiblePart { .. })
	}
}

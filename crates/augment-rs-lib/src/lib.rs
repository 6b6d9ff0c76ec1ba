pub mod error;
pub use error::Result;
pub use error::Error;

pub mod config;
pub use config::SessionOptions;
pub use config::DefaultIntensity;

pub mod anatomy;
pub use anatomy::AnatomyTree;
pub use anatomy::PartId;

pub mod catalog;
pub use catalog::OptionCatalog;
pub use catalog::OptionId;

pub mod implant;
pub use implant::ImplantInstance;
pub use implant::SavedImplant;

pub mod resolver;
pub use resolver::ResolutionSession;
pub use resolver::ResolveWarning;

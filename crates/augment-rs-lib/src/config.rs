use serde::{Serialize, Deserialize};

use crate::catalog::IntensityRange;

/// Starting intensity for newly created implant instances.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DefaultIntensity {
	/// The lowest value of the option's range.
	#[default] Minimum,
	/// Halfway between the option's minimum and maximum.
	Midpoint,
}

impl DefaultIntensity {
	pub fn for_range(&self, range: &IntensityRange) -> f32 {
		match self {
			DefaultIntensity::Minimum => range.min,
			DefaultIntensity::Midpoint => range.midpoint(),
		}
	}
}

/// Tunables for a [`ResolutionSession`](crate::resolver::ResolutionSession).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
	closure_iteration_cap: usize,
	default_intensity: DefaultIntensity,
	report_dependency_cycles: bool,
}

impl Default for SessionOptions {
	fn default() -> Self {
		Self {
			closure_iteration_cap: 100,
			default_intensity: DefaultIntensity::Minimum,
			report_dependency_cycles: true,
		}
	}
}

impl SessionOptions {
	/// Maximum passes a dependency closure loop may take before giving up.
	pub fn closure_iteration_cap(&self) -> usize {
		self.closure_iteration_cap
	}
	/// returns if the value is valid or not, a cap of zero would never let the closure run.
	pub fn set_closure_iteration_cap(&mut self, cap: usize) -> bool {
		if cap > 0 {
			self.closure_iteration_cap = cap;
			true
		} else {
			false
		}
	}

	pub fn default_intensity(&self) -> DefaultIntensity {
		self.default_intensity
	}
	pub fn set_default_intensity(&mut self, default_intensity: DefaultIntensity) {
		self.default_intensity = default_intensity;
	}

	pub fn report_dependency_cycles(&self) -> bool {
		self.report_dependency_cycles
	}
	pub fn set_report_dependency_cycles(&mut self, report: bool) {
		self.report_dependency_cycles = report;
	}

	/// Loads options from a JSON file at `path`.
	///
	/// Missing fields take their default value.
	/// # Errors
	/// - [`IO`](crate::error::Error::IO) when opening or reading from the file.
	/// - [`SerdeJSON`](crate::error::Error::SerdeJSON) when deserializing the file.
	/// - [`Validation`](crate::error::Error::Validation) when the iteration cap is zero.
	pub fn load_from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
		let file = std::fs::File::open(path)?;
		let options: Self = serde_json::from_reader(std::io::BufReader::new(file))?;
		if options.closure_iteration_cap == 0 {
			return Err(crate::Error::Validation("closure_iteration_cap must be greater than zero".to_string()));
		}
		Ok(options)
	}

	/// Saves the options to a JSON file, creating parent directories as needed.
	pub fn save_to_file(&self, path: impl AsRef<std::path::Path>) -> crate::Result<()> {
		let path = path.as_ref();
		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent)?;
		}
		let file = std::fs::File::create(path)?;
		serde_json::to_writer_pretty(file, self)?;
		Ok(())
	}
}

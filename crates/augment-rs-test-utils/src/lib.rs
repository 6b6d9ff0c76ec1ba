//! Various helper functions for testing
//!
//! functions in this module should use results and not use any panics to avoid confusion in callers

use augment_rs::anatomy::AnatomyDef;
use augment_rs::catalog::{CatalogBuilder, OptionRecord};
use augment_rs::{AnatomyTree, OptionCatalog};

/// Starts logging for a test, safe to call more than once.
pub fn init_logger() {
	let _ = env_logger::builder().is_test(true).try_init();
}

/// Torso with an arm chain and a head holding the brain and both eyes.
///
/// ```text
/// Torso
/// ├── Arm ── Hand ── Finger
/// └── Head
///     ├── Brain
///     ├── LeftEye
///     └── RightEye
/// ```
pub fn humanoid_anatomy() -> augment_rs::Result<AnatomyTree> {
	let def: AnatomyDef = serde_json::from_str(r#"{
		"name": "Torso",
		"children": [
			{ "name": "Arm", "children": [
				{ "name": "Hand", "children": [ { "name": "Finger" } ] }
			] },
			{ "name": "Head", "children": [
				{ "name": "Brain" },
				{ "name": "LeftEye" },
				{ "name": "RightEye" }
			] }
		]
	}"#)?;
	AnatomyTree::from_def(&def)
}

/// Options for [`humanoid_anatomy()`].
///
/// - `BionicArm` replaces `Arm`, intensity 1 to 6.
/// - `PowerClaw` on `Hand`.
/// - `FingerProsthetic` replaces `Finger`.
/// - `AdvancedEye` on `LeftEye`, depends on `NeuralInterface`.
/// - `NeuralInterface` on `Brain`, depends on `Cortex`.
/// - `Cortex` whole body.
/// - `Lens` on either eye.
/// - `EyeImplant` on `LeftEye`, depends on `Lens` which needs a part chosen.
pub fn humanoid_catalog(anatomy: &AnatomyTree) -> augment_rs::Result<OptionCatalog> {
	CatalogBuilder::new(anatomy)
		.add_option(OptionRecord::new("BionicArm").label("Bionic arm").part("Arm").replaces_part().intensity(1.0, 6.0))
		.add_option(OptionRecord::new("PowerClaw").label("Power claw").part("Hand"))
		.add_option(OptionRecord::new("FingerProsthetic").label("Finger prosthetic").part("Finger").replaces_part())
		.add_option(OptionRecord::new("AdvancedEye").label("Advanced eye").part("LeftEye").depends_on("NeuralInterface"))
		.add_option(OptionRecord::new("NeuralInterface").label("Neural interface").part("Brain").depends_on("Cortex"))
		.add_option(OptionRecord::new("Cortex").label("Cortex booster").whole_body())
		.add_option(OptionRecord::new("Lens").part("LeftEye").part("RightEye"))
		.add_option(OptionRecord::new("EyeImplant").label("Eye implant").part("LeftEye").depends_on("Lens"))
		.build()
}

/// Writes `contents` to a fresh file inside a temporary directory.
///
/// The directory is removed when the returned handle is dropped.
pub fn temp_file(name: &str, contents: &str) -> std::io::Result<(tempfile::TempDir, std::path::PathBuf)> {
	let dir = tempfile::tempdir()?;
	let path = dir.path().join(name);
	std::fs::write(&path, contents)?;
	Ok((dir, path))
}

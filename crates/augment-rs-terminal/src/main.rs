use std::io::Write;

use augment_rs::anatomy::AnatomyDef;
use augment_rs::catalog::OptionRecord;
use augment_rs::{AnatomyTree, OptionCatalog, ResolutionSession, SavedImplant, SessionOptions};

fn main() {
	let mut opts;

	/* Parse console input */
	let parsed_options = {
		let args: Vec<String> = std::env::args().collect();

		opts = getopts::Options::new();
		opts.optflag( "h", "help",       "Show help");
		opts.optflag( "v", "verbose",    "Increased vebosity");
		opts.optopt(  "s", "saved",      "Current implants to start from", "FILE");
		opts.optopt(  "c", "config",     "Session options", "FILE");
		opts.optopt(  "o", "output",     "Where to write committed implants, stdout when absent", "FILE");
		opts.parsing_style(getopts::ParsingStyle::FloatingFrees);

		let parsed_options = match opts.parse(&args[1..]) {
			Ok(m)  => { m }
			Err(e) => { println!("Unable to parse options: {}", e); return }
		};

		if parsed_options.opt_present("h") {
			eprintln!("{}", opts.usage("Usage: augment-rs-terminal [options] ANATOMY CATALOG"));
			return;
		}

		parsed_options
	};

	let mut logger = env_logger::Builder::from_default_env();
	if parsed_options.opt_present("v") {
		logger.filter_level(log::LevelFilter::Debug);
	}
	logger.init();

	let options = match parsed_options.opt_str("c") {
		Some(path) => SessionOptions::load_from_file(&path).unwrap_or_else(|e| {
			log::warn!("Failed to read config file {}: {}", path, e);
			log::warn!("Using default config.");
			SessionOptions::default()
		}),
		None => SessionOptions::default(),
	};

	let (anatomy_path, catalog_path) = match (parsed_options.free.get(0), parsed_options.free.get(1)) {
		(Some(a), Some(c)) => (a, c),
		_ => {
			log::error!("Anatomy and catalog files not provided.");
			eprintln!("{}", opts.usage("Usage: augment-rs-terminal [options] ANATOMY CATALOG"));
			return;
		},
	};

	let anatomy = match load_anatomy(anatomy_path) {
		Ok(a) => a,
		Err(e) => { log::error!("Failed to load anatomy: {}", e); return },
	};
	let catalog = match load_catalog(catalog_path, &anatomy) {
		Ok(c) => c,
		Err(e) => { log::error!("Failed to load option catalog: {}", e); return },
	};
	let saved = match parsed_options.opt_str("s") {
		Some(path) => match read_json::<Vec<SavedImplant>>(&path) {
			Ok(s) => s,
			Err(e) => { log::error!("Failed to load saved implants: {}", e); return },
		},
		None => Vec::new(),
	};

	let mut session = match ResolutionSession::from_saved(&anatomy, &catalog, &saved, options) {
		Ok(s) => s,
		Err(e) => { log::error!("Failed to open session: {}", e); return },
	};
	for warning in session.warnings() {
		println!("Warning: {}", warning);
	}

	match run(&mut session) {
		Ok(Some(implants)) => {
			if let Err(e) = write_output(parsed_options.opt_str("o"), &implants) {
				log::error!("Failed to write implants: {}", e);
			} else {
				log::info!("Saved {} implants.", implants.len());
			}
		},
		Ok(None) => log::info!("Quit without committing."),
		Err(e) => log::error!("Session ended with error: {}", e),
	}
}

fn load_anatomy(path: &str) -> Result<AnatomyTree, Error> {
	let def: AnatomyDef = read_json(path)?;
	Ok(AnatomyTree::from_def(&def)?)
}

fn load_catalog(path: &str, anatomy: &AnatomyTree) -> Result<OptionCatalog, Error> {
	let records: Vec<OptionRecord> = read_json(path)?;
	Ok(OptionCatalog::from_records(anatomy, records)?)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, Error> {
	let file = std::fs::File::open(path)?;
	Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
}

fn write_output(path: Option<String>, implants: &[SavedImplant]) -> Result<(), Error> {
	match path {
		Some(path) => serde_json::to_writer_pretty(std::fs::File::create(path)?, implants)?,
		None => {
			serde_json::to_writer_pretty(std::io::stdout(), implants)?;
			println!();
		},
	}
	Ok(())
}

const HELP: &str = "\
list                       show every option
toggle OPTION              select or deselect an option
part OPTION PART           add or remove an option on one part
intensity OPTION VALUE     set an option's intensity
blocked                    show selections that won't be kept
warnings                   show problems found so far
cancel                     discard every change
commit                     save the valid implants and exit
quit                       exit without saving";

/// Reads commands until the user commits or quits. `None` means nothing should be saved.
fn run(session: &mut ResolutionSession) -> Result<Option<Vec<SavedImplant>>, Error> {
	let stdin = std::io::stdin();
	println!("{}", HELP);
	loop {
		print!("> ");
		let _ = std::io::stdout().flush();
		let mut line = String::new();
		if stdin.read_line(&mut line)? == 0 {
			return Ok(None);
		}
		let words: Vec<&str> = line.split_whitespace().collect();

		let result = match words.as_slice() {
			[] => Ok(()),
			["list"] => { print_options(session); Ok(()) },
			["toggle", option] => find_option(session, option).and_then(|o| Ok(session.toggle_option(o)?)),
			["part", option, part] => find_option(session, option).and_then(|o| {
				let part = session.anatomy().find(part).ok_or_else(|| Error::UnknownName(part.to_string()))?;
				Ok(session.toggle_part(o, part)?)
			}),
			["intensity", option, value] => find_option(session, option).and_then(|o| {
				let value = value.parse::<f32>().map_err(|_| Error::UnknownName(value.to_string()))?;
				if !session.set_intensity(o, value)? {
					println!("Intensity unchanged, option is not selected or is disabled.");
				}
				Ok(())
			}),
			["blocked"] => { print_blocked(session); Ok(()) },
			["warnings"] => {
				for warning in session.warnings() {
					println!("{}", warning);
				}
				Ok(())
			},
			["cancel"] => { session.cancel(); Ok(()) },
			["commit"] => match commit(session) {
				Ok(implants) => return Ok(Some(implants)),
				Err(Error::UserCancelled) => Ok(()),
				Err(e) => Err(e),
			},
			["quit"] => return Ok(None),
			_ => { println!("{}", HELP); Ok(()) },
		};

		if let Err(e) = result {
			println!("{}", e);
		}
	}
}

fn find_option(session: &ResolutionSession, key: &str) -> Result<augment_rs::OptionId, Error> {
	session.catalog().find(key).ok_or_else(|| Error::UnknownName(key.to_string()))
}

fn print_options(session: &ResolutionSession) {
	let catalog = session.catalog();
	let anatomy = session.anatomy();
	for (id, def) in catalog.options() {
		let selection = session.option_selection(id);
		let mark = match (selection.selected, selection.selected_as_dependency, selection.partially_selected) {
			(_, _, true) => "[~]",
			(true, _, _) => "[x]",
			(_, true, _) => "[d]",
			_ => "[ ]",
		};
		let intensity = session.working_instances().iter()
			.find(|i| i.option == id)
			.map(|i| format!(" intensity {}", i.intensity))
			.unwrap_or_default();
		let disabled = if selection.disabled { " (disabled)" } else { "" };
		println!("{} {} {}{}{}", mark, def.key, def.label, disabled, intensity);

		if def.is_multi_part() {
			for &part in &def.parts {
				let p = session.part_selection(id, part);
				println!("      {} {}{}", if p.selected { "[x]" } else { "[ ]" }, anatomy.name(part), if p.disabled { " (disabled)" } else { "" });
			}
		}
	}
}

fn print_blocked(session: &ResolutionSession) {
	let catalog = session.catalog();
	let anatomy = session.anatomy();
	for blocked in session.blocked_selections() {
		let part = blocked.part.map(|p| anatomy.name(p)).unwrap_or("whole body");
		match blocked.blocker {
			Some(b) => println!("\t{} on {} is blocked by implant {}", catalog[blocked.option].key, part, b),
			None => println!("\t{} on {} is blocked", catalog[blocked.option].key, part),
		}
	}
}

fn commit(session: &ResolutionSession) -> Result<Vec<SavedImplant>, Error> {
	if !session.blocked_selections().is_empty() {
		println!("These selections are blocked and will be dropped:");
		print_blocked(session);

		let stdin = std::io::stdin();
		print!("Commit changes? [(y)/n] ");
		let _ = std::io::stdout().flush();
		loop {
			let mut input = String::new();
			let _ = stdin.read_line(&mut input);
			let input = input.trim().to_lowercase();
			if input == "y" || input.is_empty() {
				break;
			} else if input == "n" {
				return Err(Error::UserCancelled);
			} else {
				println!("\nInput invalid.")
			}
		}
	}
	Ok(session.commit_saved()?)
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("augment-rs error: {0}")]
	Augment(#[from] augment_rs::Error),
	#[error("commit refused: {0}")]
	Commit(#[from] augment_rs::resolver::CommitError),
	#[error("IO error: {0}")]
	IO(#[from] std::io::Error),
	#[error("JSON error: {0}")]
	SerdeJSON(#[from] serde_json::Error),
	#[error("Unknown name `{0}`")]
	UnknownName(String),
	#[error("User cancelled an action")]
	UserCancelled,
}

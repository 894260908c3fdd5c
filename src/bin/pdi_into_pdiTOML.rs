#![warn(clippy::pedantic, elided_lifetimes_in_paths, explicit_outlives_requirements)]
#![allow(non_snake_case)]

/*
	stdin : a .pdi container (anything before a "Playdate IMG" tag is skipped)
	stdout : its header, metadata and cell as TOML
*/

use {
	const_format::formatcp,
	log::error,
	pdi2png::{pdi, Container, DecodeOptions},
	std::{
		io::{self, Read, Write},
		process::ExitCode,
	},
};

fn main() -> ExitCode {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

	let buffer = &mut Vec::<u8>::new();
	if let Err(err) = io::stdin().lock().read_to_end(buffer) {
		error!("stdin: {err}");
		return ExitCode::FAILURE;
	}
	let container = match Container::read(pdi::locateContainer(buffer), &DecodeOptions::default()) {
		Ok(container) => container,
		Err(err) => {
			error!("{err}");
			return ExitCode::FAILURE;
		}
	};
	let toml = match toml::to_string(&container.layout()) {
		Ok(toml) => toml,
		Err(err) => {
			error!("{err}");
			return ExitCode::FAILURE;
		}
	};
	let stdout = &mut io::stdout().lock();
	if let Err(err) = write!(stdout, "{}\n{toml}", formatcp!("# {}", pdi::MAGIC)).and_then(|()| stdout.flush()) {
		error!("stdout: {err}");
		return ExitCode::FAILURE;
	}
	ExitCode::SUCCESS
}

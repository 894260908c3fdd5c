#![warn(clippy::pedantic, elided_lifetimes_in_paths, explicit_outlives_requirements)]
#![allow(non_snake_case)]

use {
	clap::Parser,
	const_format::concatcp,
	log::{error, info, LevelFilter},
	pdi2png::{
		pdi::{self, DEFAULT_MAX_PIXELS},
		readContainerFile, writePngFile, ConvertOptions, DecodeOptions, Error, MagicPolicy,
	},
	std::{path::PathBuf, process::ExitCode},
};

const ABOUT: &str = concatcp!("Converts a \"", pdi::MAGIC, "\" (.pdi) container into an RGBA PNG");

#[derive(Parser)]
#[clap(version, about = ABOUT)]
struct Args {
	/// .pdi file to decode
	input: PathBuf,

	/// PNG file to write
	output: PathBuf,

	/// Refuse containers whose magic tag is not the expected one
	#[clap(long)]
	strictMagic: bool,

	/// Skip any bytes in front of the magic tag, e.g. a saved HTTP response
	#[clap(long)]
	seekMagic: bool,

	/// Refuse images with more pixels than this, clip margins included
	#[clap(long, default_value_t = DEFAULT_MAX_PIXELS)]
	maxPixels: u64,

	/// Log more (-v header and sizes, -vv every parsed record)
	#[clap(short, long, parse(from_occurrences))]
	verbose: usize,
}

fn main() -> ExitCode {
	let args = Args::parse();
	env_logger::Builder::new()
		.filter_level(match args.verbose {
			0 => LevelFilter::Warn,
			1 => LevelFilter::Info,
			2 => LevelFilter::Debug,
			_ => LevelFilter::Trace,
		})
		.parse_default_env()
		.init();

	match run(&args) {
		Ok(()) => ExitCode::SUCCESS,
		Err(err) => {
			error!("{err}");
			ExitCode::FAILURE
		}
	}
}

fn run(args: &Args) -> Result<(), Error> {
	let options = ConvertOptions {
		decode: DecodeOptions {
			magicPolicy: if args.strictMagic { MagicPolicy::Strict } else { MagicPolicy::Permissive },
			maxPixels: args.maxPixels,
		},
		seekMagic: args.seekMagic,
	};
	let container = readContainerFile(&args.input, &options)?;
	let layout = container.layout();
	info!(
		"{:?}: magic {:?}, {}compressed, {}x{}{}",
		args.input,
		layout.header.magic,
		if container.header.isCompressed() { "" } else { "un" },
		layout.fullWidth,
		layout.fullHeight,
		if layout.hasTransparency { ", with transparency" } else { "" },
	);
	writePngFile(&args.output, &container.toRaster())?;
	info!("wrote {:?}", args.output);
	Ok(())
}

#![warn(clippy::pedantic, elided_lifetimes_in_paths, explicit_outlives_requirements)]
#![allow(non_snake_case)]

pub mod error;
pub mod pdi;
pub mod raster;

pub use {
	error::{DecodeError, Error, ErrorKind, Stage},
	pdi::{Container, DecodeOptions, MagicPolicy},
	raster::{DrawDestination, PngEmitter, RasterEmitter, RasterImage},
};

use std::{
	fs::File,
	io::{BufReader, BufWriter, Read},
	path::Path,
};

/// Decodes with [`DecodeOptions::default`], which refuses rasters over
/// [`pdi::DEFAULT_MAX_PIXELS`]; use [`decodeWith`] and a larger `maxPixels` for those.
pub fn decode<R: Read>(source: R) -> Result<RasterImage, DecodeError> {
	decodeWith(source, &DecodeOptions::default())
}

pub fn decodeWith<R: Read>(source: R, options: &DecodeOptions) -> Result<RasterImage, DecodeError> {
	Ok(Container::read(source, options)?.toRaster())
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConvertOptions {
	pub decode: DecodeOptions,
	/// Ignore anything in front of the magic tag. Needs the whole file in memory.
	pub seekMagic: bool,
}

pub fn readContainerFile(path: &Path, options: &ConvertOptions) -> Result<Container, Error> {
	let file = File::open(path).map_err(|source| Error::Read { path: path.to_owned(), source })?;
	let container = if options.seekMagic {
		let buffer = &mut Vec::new();
		BufReader::new(file)
			.read_to_end(buffer)
			.map_err(|source| Error::Read { path: path.to_owned(), source })?;
		pdi::findContainer(buffer).and_then(|bytes| Container::read(bytes, &options.decode))
	} else {
		Container::read(BufReader::new(file), &options.decode)
	};
	container.map_err(|source| Error::Decode { path: path.to_owned(), source })
}

pub fn writePngFile(path: &Path, image: &RasterImage) -> Result<(), Error> {
	let file = File::create(path).map_err(|source| Error::Create { path: path.to_owned(), source })?;
	PngEmitter::new(BufWriter::new(file))
		.emit(image)
		.map_err(|source| Error::Encode { path: path.to_owned(), source })
}

use {
	crate::pdi::{Bitplanes, Cell},
	log::warn,
	png::{BitDepth, ColorType},
	std::io::Write,
};

pub type Rgba = [u8; 4];

pub const TRANSPARENT: Rgba = [0, 0, 0, 0];

/// Row-major RGBA8 raster.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RasterImage {
	width: u32,
	height: u32,
	data: Vec<u8>,
}

impl RasterImage {
	/// A fully transparent black raster.
	#[must_use]
	pub fn new(width: u32, height: u32) -> Self {
		Self { width, height, data: vec![0; width as usize * height as usize * 4] }
	}

	#[must_use]
	pub fn width(&self) -> u32 {
		self.width
	}

	#[must_use]
	pub fn height(&self) -> u32 {
		self.height
	}

	#[must_use]
	pub fn data(&self) -> &[u8] {
		&self.data
	}

	#[must_use]
	pub fn texel(&self, x: u32, y: u32) -> Option<Rgba> {
		let i = self.index(x, y)?;
		let mut texel = TRANSPARENT;
		texel.copy_from_slice(&self.data[i..i + 4]);
		Some(texel)
	}

	fn index(&self, x: u32, y: u32) -> Option<usize> {
		(x < self.width && y < self.height).then(|| (y as usize * self.width as usize + x as usize) * 4)
	}
}

/// Bit `bitPos` (0 = least significant) of `plane[bytePos]`, or `None` past the end of the plane.
#[inline(always)]
#[must_use]
pub fn readBit(plane: &[u8], bytePos: usize, bitPos: u32) -> Option<bool> {
	plane.get(bytePos).map(|byte| (byte >> bitPos) & 1 != 0)
}

pub trait DrawDestination {
	fn width(&self) -> u32;
	fn height(&self) -> u32;
	fn putTexel(&mut self, x: u32, y: u32, texel: Rgba);

	/*
		Cell compositing :

		each row of a plane is `stride` bytes, pixel x lives in byte x / 8 at bit 7 - x % 8.
		color bit set = white, clear = black; missing color bytes read as black.
		alpha bit set = opaque, clear = transparent; missing alpha bytes read as opaque.
		the decoded pixel lands at (clipLeft + x, clipTop + y); anything outside the
		destination is dropped.
	*/
	fn drawCell(&mut self, cell: &Cell, planes: &Bitplanes) {
		let (width, height, stride) = (self.width(), self.height(), usize::from(cell.stride));
		let mut dropped = 0_usize;
		for y in 0..cell.clipHeight {
			let imgY = u32::from(cell.clipTop) + u32::from(y);
			for x in 0..cell.clipWidth {
				let (bytePos, bitPos) = (usize::from(y) * stride + usize::from(x / 8), 7 - u32::from(x % 8));
				let imgX = u32::from(cell.clipLeft) + u32::from(x);
				if imgX >= width || imgY >= height {
					dropped += 1;
					continue;
				}
				let value = if readBit(&planes.color, bytePos, bitPos).unwrap_or(false) { 255 } else { 0 };
				let opaque = planes.alpha.as_deref().map_or(true, |alpha| readBit(alpha, bytePos, bitPos).unwrap_or(true));
				self.putTexel(imgX, imgY, [value, value, value, if opaque { 255 } else { 0 }]);
			}
		}
		if dropped != 0 {
			warn!("{dropped} pixels fell outside the {width}x{height} raster and were dropped");
		}
	}
}

impl DrawDestination for RasterImage {
	#[inline(always)]
	fn width(&self) -> u32 {
		self.width
	}
	#[inline(always)]
	fn height(&self) -> u32 {
		self.height
	}
	#[inline(always)]
	fn putTexel(&mut self, x: u32, y: u32, texel: Rgba) {
		if let Some(i) = self.index(x, y) {
			self.data[i..i + 4].copy_from_slice(&texel);
		}
	}
}

/// Hands a finished raster to whatever persists it.
pub trait RasterEmitter {
	type Error;
	fn emit(&mut self, image: &RasterImage) -> Result<(), Self::Error>;
}

pub struct PngEmitter<W: Write> {
	writer: W,
}

impl<W: Write> PngEmitter<W> {
	pub fn new(writer: W) -> Self {
		Self { writer }
	}

	pub fn into_inner(self) -> W {
		self.writer
	}
}

impl<W: Write> RasterEmitter for PngEmitter<W> {
	type Error = png::EncodingError;

	fn emit(&mut self, image: &RasterImage) -> Result<(), Self::Error> {
		let mut png = png::Encoder::new(&mut self.writer, image.width(), image.height());
		png.set_color(ColorType::Rgba);
		png.set_depth(BitDepth::Eight);
		let mut png = png.write_header()?;
		png.write_image_data(image.data())?;
		png.finish()?;
		self.writer.flush()?;
		Ok(())
	}
}

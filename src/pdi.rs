/*
	Playdate IMG container :

	header (16 bytes) : 12-byte ASCII magic, u32 flags (bit 31 = compressed)
	if compressed : metadata (16 bytes) then a zlib stream holding everything below
	cell (16 bytes) : clip width/height, stride, clip left/right/top/bottom, flags
	color plane : stride * clipHeight bytes, 1 bit per pixel, MSB first
	alpha plane : same size, present only when both cell transparency bits are set

	All integers are little-endian.
*/

use {
	crate::{
		error::{DecodeError, Stage},
		raster::{DrawDestination, RasterImage},
	},
	byteorder::{ByteOrder, LE},
	flate2::read::ZlibDecoder,
	log::{debug, warn},
	memchr::memmem,
	serde::Serialize,
	std::io::{self, Read},
};

pub const MAGIC: &str = "Playdate IMG";
pub const MAGIC_LEN: usize = 12;
pub const HEADER_LEN: usize = MAGIC_LEN + 4;
pub const METADATA_LEN: usize = 16;
pub const CELL_LEN: usize = 16;

pub const FLAG_COMPRESSED: u32 = 0x8000_0000;
pub const CELL_FLAG_TRANSPARENCY: u16 = 0x3;

pub const DEFAULT_MAX_PIXELS: u64 = 1 << 26;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MagicPolicy {
	/// Any ASCII tag is accepted.
	#[default]
	Permissive,
	/// The tag must read exactly [`MAGIC`].
	Strict,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodeOptions {
	pub magicPolicy: MagicPolicy,
	/// Upper bound on fullWidth * fullHeight, checked once the cell is known.
	pub maxPixels: u64,
}

impl Default for DecodeOptions {
	fn default() -> Self {
		Self { magicPolicy: MagicPolicy::default(), maxPixels: DEFAULT_MAX_PIXELS }
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ContainerHeader {
	pub magic: String,
	pub flags: u32,
}

impl ContainerHeader {
	pub fn read<R: Read>(source: &mut R, policy: MagicPolicy) -> Result<Self, DecodeError> {
		let record = readRecord::<_, HEADER_LEN>(source, Stage::Header)?;
		let mut magicField = [0; MAGIC_LEN];
		magicField.copy_from_slice(&record[..MAGIC_LEN]);
		if !magicField.is_ascii() {
			return Err(DecodeError::MagicNotAscii(magicField));
		}
		let magic = magicField.iter().map(|&byte| char::from(byte)).collect::<String>();
		let magic = magic.trim_end_matches('\0').to_owned();
		if policy == MagicPolicy::Strict && magic != MAGIC {
			return Err(DecodeError::MagicMismatch { found: magic, expected: MAGIC });
		}
		let flags = LE::read_u32(&record[MAGIC_LEN..]);
		if flags & !FLAG_COMPRESSED != 0 {
			warn!("header: ignoring unrecognized flag bits {:#010X}", flags & !FLAG_COMPRESSED);
		}
		Ok(Self { magic, flags })
	}

	#[must_use]
	pub fn isCompressed(&self) -> bool {
		self.flags & FLAG_COMPRESSED != 0
	}
}

/// Present only in compressed containers. `width` and `height` are informational;
/// the cell is authoritative for geometry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct CompressionMetadata {
	pub compressedSize: u32,
	pub width: u32,
	pub height: u32,
	pub reserved: u32,
}

impl CompressionMetadata {
	pub fn read<R: Read>(source: &mut R) -> Result<Self, DecodeError> {
		let record = readRecord::<_, METADATA_LEN>(source, Stage::Metadata)?;
		Ok(Self {
			compressedSize: LE::read_u32(&record[0..]),
			width: LE::read_u32(&record[4..]),
			height: LE::read_u32(&record[8..]),
			reserved: LE::read_u32(&record[12..]),
		})
	}
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Cell {
	pub clipWidth: u16,
	pub clipHeight: u16,
	pub stride: u16,
	pub clipLeft: u16,
	pub clipRight: u16,
	pub clipTop: u16,
	pub clipBottom: u16,
	pub flags: u16,
}

impl Cell {
	pub fn read<R: Read>(source: &mut R) -> Result<Self, DecodeError> {
		let record = readRecord::<_, CELL_LEN>(source, Stage::Cell)?;
		let field = |index: usize| LE::read_u16(&record[index * 2..]);
		Ok(Self {
			clipWidth: field(0),
			clipHeight: field(1),
			stride: field(2),
			clipLeft: field(3),
			clipRight: field(4),
			clipTop: field(5),
			clipBottom: field(6),
			flags: field(7),
		})
	}

	#[must_use]
	pub fn hasTransparency(&self) -> bool {
		self.flags & CELL_FLAG_TRANSPARENCY == CELL_FLAG_TRANSPARENCY
	}

	#[must_use]
	pub fn fullWidth(&self) -> u32 {
		u32::from(self.clipLeft) + u32::from(self.clipWidth) + u32::from(self.clipRight)
	}

	#[must_use]
	pub fn fullHeight(&self) -> u32 {
		u32::from(self.clipTop) + u32::from(self.clipHeight) + u32::from(self.clipBottom)
	}

	/// Bytes one bitplane is expected to hold.
	#[must_use]
	pub fn planeLen(&self) -> usize {
		usize::from(self.stride) * usize::from(self.clipHeight)
	}
}

/// Color plane (bit set = white) and, for transparent cells, alpha plane (bit set = opaque).
/// Either may be shorter than [`Cell::planeLen`] when the input was cut off.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Bitplanes {
	pub color: Vec<u8>,
	pub alpha: Option<Vec<u8>>,
}

impl Bitplanes {
	pub fn read<R: Read>(source: &mut R, cell: &Cell) -> Result<Self, DecodeError> {
		let planeLen = cell.planeLen();
		let color = readPlane(source, planeLen, "color")?;
		let alpha = if cell.hasTransparency() { Some(readPlane(source, planeLen, "alpha")?) } else { None };
		Ok(Self { color, alpha })
	}
}

fn readPlane<R: Read>(source: &mut R, planeLen: usize, name: &str) -> Result<Vec<u8>, DecodeError> {
	let mut plane = Vec::new();
	source
		.by_ref()
		.take(planeLen as u64)
		.read_to_end(&mut plane)
		.map_err(|source| DecodeError::Io { stage: Stage::Bitplane, source })?;
	if plane.len() < planeLen {
		warn!("bitplane: {name} plane holds {} of {planeLen} bytes, missing pixels use defaults", plane.len());
	}
	Ok(plane)
}

pub struct Container {
	pub header: ContainerHeader,
	pub metadata: Option<CompressionMetadata>,
	pub cell: Cell,
	pub planes: Bitplanes,
}

impl Container {
	/// Reads a whole container from `source`, strictly forward.
	///
	/// For compressed containers the cell and bitplanes are read through a zlib
	/// decoder over the payload instead of from `source`; only as much is inflated
	/// as the cell asks for.
	pub fn read<R: Read>(mut source: R, options: &DecodeOptions) -> Result<Self, DecodeError> {
		let header = ContainerHeader::read(&mut source, options.magicPolicy)?;
		debug!("header: magic {:?}, flags {:#010X}", header.magic, header.flags);
		if !header.isCompressed() {
			let (cell, planes) = readBody(&mut source, options)?;
			return Ok(Self { header, metadata: None, cell, planes });
		}

		let metadata = CompressionMetadata::read(&mut source)?;
		debug!("metadata: {metadata:?}");
		let compressed = readPayload(&mut source, &metadata)?;
		let payload = &mut ZlibDecoder::new(compressed.as_slice());
		let (cell, planes) = readBody(payload, options).map_err(|err| match err {
			DecodeError::Io { source, .. } => DecodeError::Inflate(source),
			err => err,
		})?;
		debug!("decompression: {} compressed bytes inflated to {}", payload.total_in(), payload.total_out());
		if (metadata.width, metadata.height) != (u32::from(cell.clipWidth), u32::from(cell.clipHeight)) {
			debug!(
				"metadata declares {}x{}, cell clips {}x{}",
				metadata.width, metadata.height, cell.clipWidth, cell.clipHeight
			);
		}
		Ok(Self { header, metadata: Some(metadata), cell, planes })
	}

	#[must_use]
	pub fn toRaster(&self) -> RasterImage {
		let mut image = RasterImage::new(self.cell.fullWidth(), self.cell.fullHeight());
		image.drawCell(&self.cell, &self.planes);
		image
	}

	#[must_use]
	pub fn layout(&self) -> Layout<'_> {
		Layout {
			fullWidth: self.cell.fullWidth(),
			fullHeight: self.cell.fullHeight(),
			hasTransparency: self.cell.hasTransparency(),
			colorPlaneLen: self.planes.color.len(),
			alphaPlaneLen: self.planes.alpha.as_ref().map(Vec::len),
			header: &self.header,
			metadata: self.metadata.as_ref(),
			cell: &self.cell,
		}
	}
}

/// Everything about a container except its pixels.
/// Plain values come before the tables so the TOML serializer accepts it.
#[derive(Serialize)]
pub struct Layout<'a> {
	pub fullWidth: u32,
	pub fullHeight: u32,
	pub hasTransparency: bool,
	pub colorPlaneLen: usize,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub alphaPlaneLen: Option<usize>,
	pub header: &'a ContainerHeader,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub metadata: Option<&'a CompressionMetadata>,
	pub cell: &'a Cell,
}

/// Like [`findContainer`], but hands back all of `bytes` when the tag is absent,
/// leaving the magic check to [`MagicPolicy`].
#[must_use]
pub fn locateContainer(bytes: &[u8]) -> &[u8] {
	findContainer(bytes).unwrap_or(bytes)
}

/// Skips whatever precedes the magic tag, e.g. an HTTP preamble left on a downloaded file.
pub fn findContainer(bytes: &[u8]) -> Result<&[u8], DecodeError> {
	match memmem::find(bytes, MAGIC.as_bytes()) {
		Some(offset) => {
			if offset != 0 {
				debug!("skipping {offset} bytes before the magic tag");
			}
			Ok(&bytes[offset..])
		}
		None => Err(DecodeError::MagicNotFound(MAGIC)),
	}
}

fn readBody<R: Read>(body: &mut R, options: &DecodeOptions) -> Result<(Cell, Bitplanes), DecodeError> {
	let cell = Cell::read(body)?;
	debug!("cell: {cell:?}, transparency {}", cell.hasTransparency());
	let (fullWidth, fullHeight) = (cell.fullWidth(), cell.fullHeight());
	if u64::from(fullWidth) * u64::from(fullHeight) > options.maxPixels {
		return Err(DecodeError::TooLarge { fullWidth, fullHeight, maxPixels: options.maxPixels });
	}
	// a plane byte holds 8 pixels, so only a stride far wider than the raster gets here
	if cell.planeLen() as u64 > options.maxPixels {
		return Err(DecodeError::PlaneTooLarge { planeLen: cell.planeLen(), maxBytes: options.maxPixels });
	}
	let planes = Bitplanes::read(body, &cell)?;
	Ok((cell, planes))
}

/// The compressed bytes; inflating happens as the body is read from them.
fn readPayload<R: Read>(source: &mut R, metadata: &CompressionMetadata) -> Result<Vec<u8>, DecodeError> {
	let declared = metadata.compressedSize;
	let mut compressed = Vec::new();
	source
		.by_ref()
		.take(u64::from(declared))
		.read_to_end(&mut compressed)
		.map_err(|source| DecodeError::Io { stage: Stage::Decompression, source })?;
	if compressed.len() < declared as usize {
		return Err(DecodeError::PayloadTruncated { declared, available: compressed.len() });
	}
	Ok(compressed)
}

/// Fills a fixed-size record, reporting how much was there if the source runs dry.
fn readRecord<R: Read, const N: usize>(source: &mut R, stage: Stage) -> Result<[u8; N], DecodeError> {
	let mut record = [0; N];
	let mut filled = 0;
	while filled < N {
		match source.read(&mut record[filled..]) {
			Ok(0) => return Err(DecodeError::Truncated { stage, expected: N, available: filled }),
			Ok(count) => filled += count,
			Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
			Err(source) => return Err(DecodeError::Io { stage, source }),
		}
	}
	Ok(record)
}

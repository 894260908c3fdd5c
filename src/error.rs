use {
	crate::pdi::MAGIC_LEN,
	core::fmt,
	std::{io, path::PathBuf},
};

/// Pipeline stage a decode failure is attributed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
	Header,
	Metadata,
	Decompression,
	Cell,
	Bitplane,
}

impl fmt::Display for Stage {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::Header => "header",
			Self::Metadata => "metadata",
			Self::Decompression => "decompression",
			Self::Cell => "cell",
			Self::Bitplane => "bitplane",
		})
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
	Format,
	Decompression,
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
	#[error("{stage}: truncated record, expected {expected} bytes but only {available} remain")]
	Truncated { stage: Stage, expected: usize, available: usize },

	#[error("header: magic {0:02X?} is not ASCII")]
	MagicNotAscii([u8; MAGIC_LEN]),

	#[error("header: magic {found:?} does not match {expected:?}")]
	MagicMismatch { found: String, expected: &'static str },

	#[error("header: no {0:?} tag found in input")]
	MagicNotFound(&'static str),

	#[error("cell: {fullWidth}x{fullHeight} raster exceeds the limit of {maxPixels} pixels")]
	TooLarge { fullWidth: u32, fullHeight: u32, maxPixels: u64 },

	#[error("cell: {planeLen}-byte bitplanes exceed the limit of {maxBytes} bytes")]
	PlaneTooLarge { planeLen: usize, maxBytes: u64 },

	#[error("decompression: payload declares {declared} bytes but only {available} follow the metadata")]
	PayloadTruncated { declared: u32, available: usize },

	#[error("decompression: {0}")]
	Inflate(#[source] io::Error),

	#[error("{stage}: {source}")]
	Io { stage: Stage, source: io::Error },
}

impl DecodeError {
	#[must_use]
	pub fn stage(&self) -> Stage {
		match self {
			Self::Truncated { stage, .. } | Self::Io { stage, .. } => *stage,
			Self::MagicNotAscii(_) | Self::MagicMismatch { .. } | Self::MagicNotFound(_) => Stage::Header,
			Self::TooLarge { .. } | Self::PlaneTooLarge { .. } => Stage::Cell,
			Self::PayloadTruncated { .. } | Self::Inflate(_) => Stage::Decompression,
		}
	}

	#[must_use]
	pub fn kind(&self) -> ErrorKind {
		match self.stage() {
			Stage::Decompression => ErrorKind::Decompression,
			_ => ErrorKind::Format,
		}
	}
}

/// File-level failures of the conversion tools.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("{path:?}: {source}")]
	Read { path: PathBuf, source: io::Error },

	#[error("{path:?}: {source}")]
	Decode { path: PathBuf, source: DecodeError },

	#[error("{path:?}: {source}")]
	Create { path: PathBuf, source: io::Error },

	#[error("{path:?}: {source}")]
	Encode { path: PathBuf, source: png::EncodingError },
}

#![allow(non_snake_case)]

use {
	flate2::{write::ZlibEncoder, Compression},
	pdi2png::{
		decode, decodeWith,
		pdi::{self, DEFAULT_MAX_PIXELS, FLAG_COMPRESSED, HEADER_LEN},
		raster::TRANSPARENT,
		readContainerFile, writePngFile, ConvertOptions, DecodeError, DecodeOptions, ErrorKind, MagicPolicy, RasterImage,
		Stage,
	},
	proptest::prelude::*,
	std::{env, fs, io::Write, process},
};

/// A cell worth of pixels, laid out the way the console tooling writes it.
#[derive(Clone, Debug)]
struct Fixture {
	width: u16,
	height: u16,
	/// left, right, top, bottom
	margins: [u16; 4],
	transparency: bool,
	/// (white, opaque), row-major
	pixels: Vec<(bool, bool)>,
}

impl Fixture {
	fn stride(&self) -> u16 {
		(self.width + 31) / 32 * 4
	}

	fn body(&self) -> Vec<u8> {
		let [left, right, top, bottom] = self.margins;
		let flags = if self.transparency { pdi::CELL_FLAG_TRANSPARENCY } else { 0 };
		let mut bytes = [self.width, self.height, self.stride(), left, right, top, bottom, flags]
			.iter()
			.flat_map(|field| field.to_le_bytes())
			.collect::<Vec<_>>();
		let stride = usize::from(self.stride());
		let mut color = vec![0; stride * usize::from(self.height)];
		let mut alpha = color.clone();
		for (i, &(white, opaque)) in self.pixels.iter().enumerate() {
			let (x, y) = (i % usize::from(self.width), i / usize::from(self.width));
			let (bytePos, mask) = (y * stride + x / 8, 0x80 >> (x % 8));
			if white {
				color[bytePos] |= mask;
			}
			if opaque {
				alpha[bytePos] |= mask;
			}
		}
		bytes.extend(color);
		if self.transparency {
			bytes.extend(alpha);
		}
		bytes
	}

	fn uncompressed(&self) -> Vec<u8> {
		let mut bytes = header(0);
		bytes.extend(self.body());
		bytes
	}

	fn compressed(&self) -> Vec<u8> {
		let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
		encoder.write_all(&self.body()).unwrap();
		let payload = encoder.finish().unwrap();
		let mut bytes = header(FLAG_COMPRESSED);
		// metadata size is informational, and never matches the cell here
		for field in [payload.len() as u32, u32::from(self.width) + 1, u32::from(self.height) * 2 + 3, 0] {
			bytes.extend_from_slice(&field.to_le_bytes());
		}
		bytes.extend(payload);
		bytes
	}

	fn expected(&self, x: u32, y: u32) -> [u8; 4] {
		let [left, _, top, _] = self.margins.map(u32::from);
		let (width, height) = (u32::from(self.width), u32::from(self.height));
		if x < left || y < top || x >= left + width || y >= top + height {
			return TRANSPARENT;
		}
		let (white, opaque) = self.pixels[((y - top) * width + (x - left)) as usize];
		let value = if white { 255 } else { 0 };
		[value, value, value, if opaque || !self.transparency { 255 } else { 0 }]
	}

	fn assertMatches(&self, image: &RasterImage) {
		let [left, right, top, bottom] = self.margins.map(u32::from);
		assert_eq!(image.width(), left + u32::from(self.width) + right);
		assert_eq!(image.height(), top + u32::from(self.height) + bottom);
		for y in 0..image.height() {
			for x in 0..image.width() {
				assert_eq!(image.texel(x, y), Some(self.expected(x, y)), "({x}, {y})");
			}
		}
	}
}

fn header(flags: u32) -> Vec<u8> {
	let mut bytes = pdi::MAGIC.as_bytes().to_vec();
	bytes.extend_from_slice(&flags.to_le_bytes());
	bytes
}

fn fixtures() -> impl Strategy<Value = Fixture> {
	(1..70_u16, 1..24_u16, [0..6_u16, 0..6_u16, 0..6_u16, 0..6_u16], any::<bool>()).prop_flat_map(
		|(width, height, margins, transparency)| {
			prop::collection::vec(any::<(bool, bool)>(), usize::from(width) * usize::from(height))
				.prop_map(move |pixels| Fixture { width, height, margins, transparency, pixels })
		},
	)
}

proptest! {
	#[test]
	fn uncompressed_round_trip(fixture in fixtures()) {
		fixture.assertMatches(&decode(fixture.uncompressed().as_slice()).unwrap());
	}

	#[test]
	fn compressed_decodes_like_uncompressed(fixture in fixtures()) {
		let compressed = decode(fixture.compressed().as_slice()).unwrap();
		prop_assert_eq!(&compressed, &decode(fixture.uncompressed().as_slice()).unwrap());
		fixture.assertMatches(&compressed);
	}

	#[test]
	fn opaque_cells_have_no_alpha(fixture in fixtures()) {
		let fixture = Fixture { transparency: false, ..fixture };
		let image = decode(fixture.uncompressed().as_slice()).unwrap();
		let [left, _, top, _] = fixture.margins.map(u32::from);
		for y in top..top + u32::from(fixture.height) {
			for x in left..left + u32::from(fixture.width) {
				prop_assert_eq!(image.texel(x, y).map(|texel| texel[3]), Some(255));
			}
		}
	}

	#[test]
	fn truncated_header_is_a_format_error(len in 0..HEADER_LEN) {
		let err = decode(&header(0)[..len]).unwrap_err();
		prop_assert_eq!(err.kind(), ErrorKind::Format);
		prop_assert_eq!(err.stage(), Stage::Header);
	}
}

#[test]
fn single_row() {
	let mut bytes = header(0);
	bytes.extend_from_slice(&[8, 0, 1, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0b1011_0000]);
	let image = decode(bytes.as_slice()).unwrap();
	assert_eq!((image.width(), image.height()), (8, 1));
	let whites = (0..8).map(|x| image.texel(x, 0).unwrap()).map(|texel| (texel[0] == 255, texel[3])).collect::<Vec<_>>();
	assert_eq!(
		whites,
		[(true, 255), (false, 255), (true, 255), (true, 255), (false, 255), (false, 255), (false, 255), (false, 255)]
	);
}

#[test]
fn single_row_with_alpha() {
	let mut bytes = header(0);
	bytes.extend_from_slice(&[8, 0, 1, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 3, 0, 0b1011_0000, 0b1111_0000]);
	let image = decode(bytes.as_slice()).unwrap();
	let alphas = (0..8).map(|x| image.texel(x, 0).unwrap()[3]).collect::<Vec<_>>();
	assert_eq!(alphas, [255, 255, 255, 255, 0, 0, 0, 0]);
}

#[test]
fn metadata_size_does_not_override_the_cell() {
	let body = vec![8, 0, 1, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0b1011_0000];
	let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
	encoder.write_all(&body).unwrap();
	let payload = encoder.finish().unwrap();
	let mut bytes = header(FLAG_COMPRESSED);
	for field in [payload.len() as u32, 3, 99, 0] {
		bytes.extend_from_slice(&field.to_le_bytes());
	}
	bytes.extend(payload);

	let image = decode(bytes.as_slice()).unwrap();
	assert_eq!((image.width(), image.height()), (8, 1));
	assert_eq!(image, decode([header(0), body].concat().as_slice()).unwrap());
	let whites = (0..8).map(|x| image.texel(x, 0).unwrap()[0] == 255).collect::<Vec<_>>();
	assert_eq!(whites, [true, false, true, true, false, false, false, false]);
}

#[test]
fn pixel_limit_is_configurable() {
	let huge =
		Fixture { width: 1, height: 1, margins: [8192, 0, 8192, 0], transparency: false, pixels: vec![(true, true)] };
	assert!(8193 * 8193 > DEFAULT_MAX_PIXELS);
	let err = decode(huge.uncompressed().as_slice()).unwrap_err();
	assert!(matches!(err, DecodeError::TooLarge { fullWidth: 8193, fullHeight: 8193, .. }));

	let small =
		Fixture { width: 10, height: 10, margins: [1, 0, 0, 0], transparency: false, pixels: vec![(false, true); 100] };
	assert!(decode(small.uncompressed().as_slice()).is_ok());
	let tight = DecodeOptions { maxPixels: 100, ..DecodeOptions::default() };
	assert!(matches!(decodeWith(small.uncompressed().as_slice(), &tight), Err(DecodeError::TooLarge { .. })));
	let roomy = DecodeOptions { maxPixels: 110, ..DecodeOptions::default() };
	small.assertMatches(&decodeWith(small.uncompressed().as_slice(), &roomy).unwrap());
}

#[test]
fn header_without_cell() {
	let err = decode(header(0).as_slice()).unwrap_err();
	assert!(matches!(err, DecodeError::Truncated { stage: Stage::Cell, available: 0, .. }));
}

#[test]
fn missing_planes_give_a_best_effort_image() {
	let fixture =
		Fixture { width: 4, height: 2, margins: [1, 0, 0, 0], transparency: true, pixels: vec![(true, true); 8] };
	let mut bytes = fixture.uncompressed();
	bytes.truncate(HEADER_LEN + 16 + 1);
	let image = decode(bytes.as_slice()).unwrap();
	assert_eq!(image.texel(0, 0), Some(TRANSPARENT));
	assert_eq!(image.texel(1, 0), Some([255, 255, 255, 255]));
	assert_eq!(image.texel(1, 1), Some([0, 0, 0, 255]));
}

#[test]
fn files_convert_to_png() {
	let dir = env::temp_dir().join(format!("pdi2png-test-{}", process::id()));
	fs::create_dir_all(&dir).unwrap();
	let (input, output) = (dir.join("cover.pdi"), dir.join("cover.png"));

	let fixture = Fixture {
		width: 10,
		height: 3,
		margins: [2, 1, 0, 1],
		transparency: true,
		pixels: (0..30).map(|i| (i % 3 == 0, i % 2 == 0)).collect(),
	};
	let mut bytes = b"HTTP/1.1 200 OK\r\nContent-Type: application/octet-stream\r\n\r\n".to_vec();
	bytes.extend(fixture.compressed());
	fs::write(&input, &bytes).unwrap();

	let strict = ConvertOptions {
		decode: DecodeOptions { magicPolicy: MagicPolicy::Strict, ..DecodeOptions::default() },
		seekMagic: false,
	};
	let err = readContainerFile(&input, &strict).err().unwrap();
	assert!(err.to_string().contains("header: magic \"HTTP/1.1 200\""), "{err}");

	let options = ConvertOptions { seekMagic: true, ..ConvertOptions::default() };
	let image = readContainerFile(&input, &options).unwrap().toRaster();
	fixture.assertMatches(&image);
	writePngFile(&output, &image).unwrap();

	let mut reader = png::Decoder::new(fs::File::open(&output).unwrap()).read_info().unwrap();
	let mut pixels = vec![0; reader.output_buffer_size()];
	let info = reader.next_frame(&mut pixels).unwrap();
	assert_eq!((info.width, info.height), (13, 4));
	assert_eq!(&pixels[..info.buffer_size()], image.data());

	fs::remove_dir_all(&dir).unwrap();
}

//! The ENPG indexed-image format used by the level-preview screens.
//!
//! An ENPG is a 256x256 image stored as one palette index byte per pixel,
//! followed by a 256 entry palette of little endian [`Rgb555`] colors:
//!
//! | Byte Num      | Description |
//! | :-----------: | ----------- |
//! | 0..65536      | palette indices, row major |
//! | 65536..66048  | palette, 256 x u16 |
//!
//! Palette index 0 is reserved for fully transparent pixels, so an image can
//! use at most 255 real colors. Color reduction itself is delegated to a
//! [`Quantizer`] implementation; this module only fixes the format.

use crate::errors::PakError;
use byteorder::{ByteOrder, LittleEndian};

/// Width and height of an ENPG image.
pub const IMG_DIM: usize = 256;

/// Number of palette-index bytes in an ENPG.
pub const ENPG_PIXELS: usize = IMG_DIM * IMG_DIM;

/// Total serialized size of an ENPG: indices plus the 512 byte palette.
pub const ENPG_LEN: usize = ENPG_PIXELS + 2 * 256;

/// Palette slot reserved for transparent pixels.
pub const TRANSPARENT_INDEX: u8 = 0;

/// A 15-bit color: five bits per channel, red in the low bits, plus a
/// transparency flag in the top bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb555(pub u16);

impl Rgb555 {
    pub const TRANSPARENT: Self = Self(0x8000);

    /// Quantize an 8-bit RGB color, rounding each channel to 5 bits.
    pub fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        let shrink = |c: u8| ((c as u16 + 4) >> 3).min(0x1F);
        Self(shrink(b) << 10 | shrink(g) << 5 | shrink(r))
    }

    pub fn is_transparent(self) -> bool {
        self.0 >> 15 != 0
    }

    /// Expand back to 8-bit RGBA. A set transparency bit maps to alpha 0.
    pub fn to_rgba8(self) -> [u8; 4] {
        let expand = |c: u16| (c * 0xFF / 0x1F) as u8;
        let (r, g, b) = (self.0 & 0x1F, (self.0 >> 5) & 0x1F, (self.0 >> 10) & 0x1F);
        let a = if self.is_transparent() { 0 } else { 0xFF };
        [expand(r), expand(g), expand(b), a]
    }
}

/// A plain RGBA8 pixel buffer, the interchange type between the renderer,
/// the quantizer, and [`Enpg`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// A fully transparent buffer.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height * 4],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixel(&self, x: usize, y: usize) -> [u8; 4] {
        let at = (y * self.width + x) * 4;
        [
            self.data[at],
            self.data[at + 1],
            self.data[at + 2],
            self.data[at + 3],
        ]
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, rgba: [u8; 4]) {
        let at = (y * self.width + x) * 4;
        self.data[at..at + 4].copy_from_slice(&rgba);
    }

    /// Copy all of `src` into `self` with its top-left corner at `(x, y)`.
    pub fn blit(&mut self, x: usize, y: usize, src: &PixelBuffer) {
        assert!(x + src.width <= self.width && y + src.height <= self.height);
        for row in 0..src.height {
            let from = row * src.width * 4;
            let to = ((y + row) * self.width + x) * 4;
            self.data[to..to + src.width * 4].copy_from_slice(&src.data[from..from + src.width * 4]);
        }
    }
}

/// The result of palette-reducing a [`PixelBuffer`]: one 0-based palette
/// index per pixel and the RGB888 palette those indices refer to.
#[derive(Debug, Clone)]
pub struct Quantized {
    pub indices: Vec<u8>,
    pub palette: Vec<[u8; 3]>,
}

/// Palette-constrained color reduction.
///
/// Implemented outside this crate (the build scripts bind libimagequant);
/// only the contract lives here. `quantize` must return one index per input
/// pixel and at most `max_colors` palette entries.
pub trait Quantizer {
    fn quantize(&self, image: &PixelBuffer, max_colors: usize) -> Quantized;
}

/// A 256x256 indexed image plus its RGB555 palette.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enpg {
    pixels: Vec<u8>,
    palette: [Rgb555; 256],
}

impl Enpg {
    /// A blank, fully transparent image.
    pub fn new() -> Self {
        let mut palette = [Rgb555::default(); 256];
        palette[TRANSPARENT_INDEX as usize] = Rgb555::TRANSPARENT;
        Self {
            pixels: vec![TRANSPARENT_INDEX; ENPG_PIXELS],
            palette,
        }
    }

    pub fn pixel(&self, x: usize, y: usize) -> u8 {
        self.pixels[y * IMG_DIM + x]
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, index: u8) {
        self.pixels[y * IMG_DIM + x] = index;
    }

    pub fn palette(&self) -> &[Rgb555; 256] {
        &self.palette
    }

    /// Set a palette entry. Slot 0 is reserved for transparency.
    pub fn set_color(&mut self, slot: u8, color: Rgb555) {
        assert_ne!(slot, TRANSPARENT_INDEX, "palette slot 0 is reserved");
        self.palette[slot as usize] = color;
    }

    /// Serialize to the on-cartridge layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = vec![0u8; ENPG_LEN];
        out[..ENPG_PIXELS].copy_from_slice(&self.pixels);
        for (i, color) in self.palette.iter().enumerate() {
            LittleEndian::write_u16(&mut out[ENPG_PIXELS + 2 * i..], color.0);
        }
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PakError> {
        if bytes.len() != ENPG_LEN {
            return Err(PakError::BadImageSize(bytes.len()));
        }
        let mut palette = [Rgb555::default(); 256];
        for (i, slot) in palette.iter_mut().enumerate() {
            *slot = Rgb555(LittleEndian::read_u16(&bytes[ENPG_PIXELS + 2 * i..]));
        }
        Ok(Self {
            pixels: bytes[..ENPG_PIXELS].to_vec(),
            palette,
        })
    }

    /// Expand to RGBA8 for quality inspection output.
    pub fn to_rgba8(&self) -> PixelBuffer {
        let mut out = PixelBuffer::new(IMG_DIM, IMG_DIM);
        for y in 0..IMG_DIM {
            for x in 0..IMG_DIM {
                let color = self.palette[self.pixel(x, y) as usize];
                out.set_pixel(x, y, color.to_rgba8());
            }
        }
        out
    }
}

impl Default for Enpg {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert a main/aux image pair to two ENPGs sharing one palette.
///
/// The hardware loads both images of a preview against a single palette, so
/// the pair is laid side by side into one 512x256 buffer, quantized once to
/// at most 255 colors, then split again. Pixels that are not fully opaque
/// become index 0; everything else shifts up one slot past the reserved
/// transparent entry.
pub fn encode_pair(
    main: &PixelBuffer,
    aux: &PixelBuffer,
    quantizer: &dyn Quantizer,
) -> (Enpg, Enpg) {
    assert!(main.width() == IMG_DIM && main.height() == IMG_DIM);
    assert!(aux.width() == IMG_DIM && aux.height() == IMG_DIM);

    let mut combined = PixelBuffer::new(2 * IMG_DIM, IMG_DIM);
    combined.blit(0, 0, main);
    combined.blit(IMG_DIM, 0, aux);

    let quantized = quantizer.quantize(&combined, 255);
    debug_assert!(quantized.palette.len() <= 255);
    debug_assert_eq!(quantized.indices.len(), 2 * ENPG_PIXELS);

    let mut first = Enpg::new();
    let mut second = Enpg::new();
    for enpg in [&mut first, &mut second] {
        for (slot, &[r, g, b]) in quantized.palette.iter().enumerate() {
            enpg.set_color(slot as u8 + 1, Rgb555::from_rgb8(r, g, b));
        }
    }

    for y in 0..IMG_DIM {
        for x in 0..2 * IMG_DIM {
            let alpha = combined.pixel(x, y)[3];
            let index = if alpha < 0xFF {
                TRANSPARENT_INDEX
            } else {
                quantized.indices[y * 2 * IMG_DIM + x] + 1
            };
            let enpg = if x < IMG_DIM { &mut first } else { &mut second };
            enpg.set_pixel(x % IMG_DIM, y, index);
        }
    }

    (first, second)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb555_packing() {
        // pure red lands in the low five bits
        assert_eq!(Rgb555::from_rgb8(0xFF, 0, 0).0, 0x001F);
        assert_eq!(Rgb555::from_rgb8(0, 0xFF, 0).0, 0x03E0);
        assert_eq!(Rgb555::from_rgb8(0, 0, 0xFF).0, 0x7C00);

        // rounding: (0xFC + 4) >> 3 would hit 0x20, clamped to 0x1F
        assert_eq!(Rgb555::from_rgb8(0xFC, 0, 0).0, 0x001F);
    }

    #[test]
    fn rgb555_expansion() {
        assert_eq!(Rgb555(0x001F).to_rgba8(), [0xFF, 0, 0, 0xFF]);
        assert_eq!(Rgb555::TRANSPARENT.to_rgba8()[3], 0);
    }

    #[test]
    fn enpg_serialization_roundtrip() {
        let mut img = Enpg::new();
        img.set_color(1, Rgb555::from_rgb8(10, 200, 30));
        img.set_pixel(0, 0, 1);
        img.set_pixel(255, 255, 1);

        let bytes = img.to_bytes();
        assert_eq!(bytes.len(), ENPG_LEN);
        assert_eq!(bytes[0], 1);
        // palette slot 0 is the transparent sentinel
        assert_eq!(&bytes[ENPG_PIXELS..ENPG_PIXELS + 2], &[0x00, 0x80]);

        assert_eq!(Enpg::from_bytes(&bytes).unwrap(), img);
    }

    #[test]
    fn enpg_rejects_wrong_length() {
        match Enpg::from_bytes(&[0; 100]) {
            Err(PakError::BadImageSize(100)) => {}
            other => panic!("expected BadImageSize, got {:?}", other.is_ok()),
        }
    }

    /// Maps every opaque pixel to a single palette color.
    struct OneColor([u8; 3]);

    impl Quantizer for OneColor {
        fn quantize(&self, image: &PixelBuffer, _max_colors: usize) -> Quantized {
            Quantized {
                indices: vec![0; image.width() * image.height()],
                palette: vec![self.0],
            }
        }
    }

    #[test]
    fn pair_shares_palette_and_maps_alpha() {
        let mut main = PixelBuffer::new(IMG_DIM, IMG_DIM);
        let mut aux = PixelBuffer::new(IMG_DIM, IMG_DIM);
        main.set_pixel(3, 4, [0xFF, 0, 0, 0xFF]);
        main.set_pixel(5, 4, [0xFF, 0, 0, 0x80]); // not fully opaque
        aux.set_pixel(7, 8, [0xFF, 0, 0, 0xFF]);

        let (first, second) = encode_pair(&main, &aux, &OneColor([0xFF, 0, 0]));

        assert_eq!(first.pixel(3, 4), 1);
        assert_eq!(first.pixel(5, 4), TRANSPARENT_INDEX);
        assert_eq!(second.pixel(7, 8), 1);
        assert_eq!(first.palette()[1], second.palette()[1]);
        assert_eq!(first.palette()[1], Rgb555::from_rgb8(0xFF, 0, 0));
    }

    #[test]
    fn blank_enpg_decodes_to_transparent_rgba() {
        let rgba = Enpg::new().to_rgba8();
        assert_eq!(rgba.pixel(128, 128)[3], 0);
    }
}

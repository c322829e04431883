//! Information and structures for LZ10 (type-0x10 "LZ77") streams.
//!
//! An LZ10 stream starts with a four byte header, optionally preceded by the
//! four magic bytes `"LZ77"` (some of the game's on-cartridge files carry the
//! magic, most do not):
//!
//! | Byte Num | Description |
//! | :------: | ----------- |
//! | 0        | compression type tag (always `0x10`) |
//! | 1..4     | size in little endian bytes of decompressed data |
//!
//! The three byte length field caps the decompressed size at `2^24 - 1`.
//!
//! ## Blocks
//! After the header comes a sequence of blocks. Each block is a flag byte
//! followed by exactly eight tokens. Flag bit *i*, counted from the most
//! significant bit, describes token *i*: `0` for a one byte literal, `1` for
//! a two byte back-reference. A back-reference copies `length` bytes from
//! `displacement` bytes behind the current output position and packs as:
//!
//! ```text
//! byte 0: llll dddd   l = length - 3, d = high 4 bits of displacement - 1
//! byte 1: dddd dddd   low 8 bits of displacement - 1
//! ```
//!
//! `length` is in `3..=18` and `displacement` in `1..=4096`. The firmware
//! decompressor reads all eight token slots of a flag byte, so the encoder
//! pads the final block with zero literals when the input runs out mid-block.
//!
//! ## An Example
//! Twenty `'A'` bytes encode as one block: a literal `0x41`, a
//! back-reference of length 18 at displacement 1 (the copy overlaps the
//! bytes it is producing), a final literal `0x41`, and five pad literals:
//!
//! ```text
//! 10 14 00 00  <- header: tag 0x10, length 20
//! 40           <- flags: token 1 is a back-reference
//! 41           <- literal 'A'
//! F0 00        <- length 18, displacement 1
//! 41           <- literal 'A'
//! 00 00 00 00 00 <- pad
//! ```

use crate::errors::PakError;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// Type tag identifying this LZ variant to the firmware decompressor.
pub const COMPRESSION_TYPE: u8 = 0x10;

/// Optional stream magic, preceding the header when present.
pub const MAGIC: &[u8; 4] = b"LZ77";

/// Size of the sliding look-back window.
pub const WINDOW_SIZE: usize = 4096;

/// Shortest match worth a two byte back-reference.
pub const MIN_MATCH: usize = 3;

/// Longest match a back-reference can encode.
pub const MAX_MATCH: usize = 18;

/// Tokens per flag byte.
pub const TOKENS_PER_BLOCK: usize = 8;

/// Largest input the three byte length field can describe, exclusive.
pub const MAX_INPUT: usize = 1 << 24;

/// The information stored at the start of an LZ10 stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LzHeader {
    /// size of decompressed data
    pub size: u32,
}

impl LzHeader {
    pub(crate) fn new(size: usize) -> Result<Self, PakError> {
        if size >= MAX_INPUT {
            return Err(PakError::InputTooLarge(size));
        }
        Ok(Self { size: size as u32 })
    }

    /// Read the header from `rdr`, skipping the `"LZ77"` magic if present.
    ///
    /// The first byte disambiguates: a conforming stream starts with either
    /// `0x10` or `b'L'`.
    pub(crate) fn from_reader<R: Read>(rdr: &mut R) -> Result<Self, PakError> {
        let mut tag = rdr.read_u8()?;
        if tag == MAGIC[0] {
            let mut rest = [0u8; 3];
            rdr.read_exact(&mut rest)?;
            if rest != MAGIC[1..] {
                return Err(PakError::BadMagic([tag, rest[0], rest[1], rest[2]]));
            }
            tag = rdr.read_u8()?;
        }
        if tag != COMPRESSION_TYPE {
            return Err(PakError::BadCompressionType(tag));
        }
        let size = rdr.read_u24::<LittleEndian>()?;

        Ok(Self { size })
    }

    /// Write out `self`, preceded by the magic bytes if `magic` is set.
    pub(crate) fn write<W: Write>(&self, wtr: &mut W, magic: bool) -> Result<(), PakError> {
        if magic {
            wtr.write_all(MAGIC)?;
        }
        wtr.write_u8(COMPRESSION_TYPE)?;
        wtr.write_u24::<LittleEndian>(self.size)?;

        Ok(())
    }
}

/// A copy of `length` previously decoded bytes, starting `displacement`
/// bytes behind the current output position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackReference {
    /// bytes to copy, `3..=18`
    pub length: u8,
    /// distance back to the copy source, `1..=4096`
    pub displacement: u16,
}

impl BackReference {
    pub(crate) fn new(length: usize, displacement: usize) -> Self {
        debug_assert!((MIN_MATCH..=MAX_MATCH).contains(&length));
        debug_assert!((1..=WINDOW_SIZE).contains(&displacement));

        Self {
            length: length as u8,
            displacement: displacement as u16,
        }
    }

    pub(crate) fn to_bytes(self) -> [u8; 2] {
        let len = (self.length as u16 - MIN_MATCH as u16) & 0xF;
        let disp = self.displacement - 1;
        [((len << 4) | (disp >> 8)) as u8, (disp & 0xFF) as u8]
    }

    pub(crate) fn from_bytes(bytes: [u8; 2]) -> Self {
        let length = (bytes[0] >> 4) + MIN_MATCH as u8;
        let displacement = (((bytes[0] as u16 & 0xF) << 8) | bytes[1] as u16) + 1;

        Self {
            length,
            displacement,
        }
    }
}

/// One slot of a block: a raw byte or a copy from the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Token {
    Literal(u8),
    Reference(BackReference),
}

impl Token {
    /// Number of decompressed bytes this token expands to.
    pub(crate) fn expanded_len(self) -> usize {
        match self {
            Self::Literal(_) => 1,
            Self::Reference(r) => r.length as usize,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn backref_packing() {
        let r = BackReference::new(18, 1);
        assert_eq!(r.to_bytes(), [0xF0, 0x00]);

        let r = BackReference::new(3, 4096);
        assert_eq!(r.to_bytes(), [0x0F, 0xFF]);

        let r = BackReference::new(10, 0x123);
        let bytes = r.to_bytes();
        assert_eq!(bytes, [0x71, 0x22]);
        assert_eq!(BackReference::from_bytes(bytes), r);
    }

    #[test]
    fn backref_unpacking_covers_full_range() {
        for length in MIN_MATCH..=MAX_MATCH {
            for &disp in &[1usize, 2, 255, 256, 4095, 4096] {
                let r = BackReference::new(length, disp);
                assert_eq!(BackReference::from_bytes(r.to_bytes()), r);
            }
        }
    }

    #[test]
    fn header_roundtrip_with_and_without_magic() {
        let hdr = LzHeader::new(0x0504).unwrap();

        let mut plain = Vec::new();
        hdr.write(&mut plain, false).unwrap();
        assert_eq!(plain, [0x10, 0x04, 0x05, 0x00]);
        let read = LzHeader::from_reader(&mut Cursor::new(&plain)).unwrap();
        assert_eq!(read, hdr);

        let mut magic = Vec::new();
        hdr.write(&mut magic, true).unwrap();
        assert_eq!(&magic[..4], b"LZ77");
        let read = LzHeader::from_reader(&mut Cursor::new(&magic)).unwrap();
        assert_eq!(read, hdr);
    }

    #[test]
    fn header_rejects_wrong_tag() {
        let data = [0x11u8, 0x00, 0x00, 0x00];
        match LzHeader::from_reader(&mut Cursor::new(&data)) {
            Err(PakError::BadCompressionType(0x11)) => {}
            other => panic!("expected BadCompressionType, got {:?}", other),
        }
    }

    #[test]
    fn header_rejects_oversized_input() {
        assert!(LzHeader::new(MAX_INPUT).is_err());
        assert!(LzHeader::new(MAX_INPUT - 1).is_ok());
    }
}

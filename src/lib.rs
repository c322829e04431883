//! Compression and packing for DS level-preview graphics.
//!
//! `previewpak` implements the pieces of the preview-screen asset pipeline
//! that have to be bit-exact with the console: the LZ10 (type-0x10 "LZ77")
//! codec the firmware decompresses in hardware, the ENPG indexed-image
//! format the preview screens are stored in, and the file-ID-addressed
//! archive plus slot lookup table the game reads them from.
//!
//! Compress and decompress with the convenience functions, or with the
//! [`Encoder`] and [`Decoder`] builders when you need the `"LZ77"` magic or
//! diagnostic logging:
//!
//! ```
//! let data = b"ABBACABBACD";
//! let packed = previewpak::compress(&data[..]).unwrap();
//! let unpacked = previewpak::decompress(&packed[..]).unwrap();
//! assert_eq!(&data[..], unpacked);
//! ```
//!
//! A whole archive is assembled through a [`BuildContext`]:
//!
//! ```
//! use previewpak::{BuildContext, Enpg};
//!
//! let mut build = BuildContext::new(2127, 2128);
//! let (main, aux) = (Enpg::new(), Enpg::new());
//! let ids = build.write_pair("1-1", &main, &aux).unwrap();
//! build.register(0, ids);
//! let archive = build.finish().unwrap();
//! assert!(archive.contains(2127));
//! ```

mod archive;
mod build;
mod decode;
mod encode;
mod errors;
mod enpg;
pub mod format;

pub use archive::{build_index_table, persist_atomic, Archive};
pub use build::BuildContext;
pub use decode::{decompress, lz10_info, Decoder};
pub use encode::{compress, Encoder};
pub use enpg::{encode_pair, Enpg, PixelBuffer, Quantized, Quantizer, Rgb555};
pub use errors::PakError;
pub use format::{BackReference, LzHeader};

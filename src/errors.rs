use std::io;
use thiserror::Error;

/// Possible errors from compressing or decompressing LZ10 data, or from
/// assembling the preview archive.
///
/// Duplicate logical-slot registration is a programming error and panics
/// instead of surfacing here; see [`BuildContext::register`].
///
/// [`BuildContext::register`]: crate::BuildContext::register
#[derive(Error, Debug)]
pub enum PakError {
    #[error("input of {0} bytes cannot fit the 24-bit length field")]
    InputTooLarge(usize),

    #[error("bad stream magic {0:02x?}, expected \"LZ77\"")]
    BadMagic([u8; 4]),

    #[error("compression type {0:#04x} is not LZ10 (0x10)")]
    BadCompressionType(u8),

    #[error("back-reference reaches {displacement} bytes back with only {produced} produced")]
    BadLookback { displacement: usize, produced: usize },

    #[error("back-reference overruns the declared length of {declared} bytes")]
    LengthOverrun { declared: usize },

    #[error("ENPG data is {0} bytes, expected {expected}", expected = crate::enpg::ENPG_LEN)]
    BadImageSize(usize),

    #[error("index table references file ID {0}, which is not in the archive")]
    MissingAsset(u16),

    #[error("{0}")]
    Io(#[from] io::Error),
}

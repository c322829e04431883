use crate::errors::PakError;
use crate::format::{BackReference, LzHeader, TOKENS_PER_BLOCK};
use byteorder::ReadBytesExt;
use std::{
    fs::File,
    io::{BufReader, Cursor, Read, Write},
    path::Path,
};

type LogWtr<'a> = &'a mut dyn Write;

/// Specify the decoding settings, such as logging, input, and output.
///
/// To create a new `Decoder`, use [`for_reader()`], [`for_bytes()`], or
/// [`for_file()`]. Then, change any of the decoder settings.
/// Finally, decode the input data with [`decode()`].
/// ```
/// # use previewpak::{Encoder, Decoder};
/// let original = b"ABBACABBACD";
/// let compressed = Encoder::for_bytes(original)
///     .encode_to_vec()
///     .unwrap();
/// let decompressed = Decoder::for_bytes(&compressed)
///     .decode()
///     .unwrap();
/// assert_eq!(&original[..], decompressed);
/// ```
/// You can use a `Decoder` to get the [`LzHeader`] with [`header()`]:
/// ```
/// # use previewpak::{Encoder, Decoder};
/// # let original = b"ABBACABBACD";
/// # let compressed = Encoder::for_bytes(original).encode_to_vec().unwrap();
/// let mut decoder = Decoder::for_bytes(&compressed);
/// let size = decoder.header().unwrap().size as usize;
/// assert_eq!(size, original.len());
/// ```
/// [`for_reader()`]: Decoder::for_reader
/// [`for_bytes()`]: Decoder::for_bytes
/// [`for_file()`]: Decoder::for_file
/// [`decode()`]: Decoder::decode
/// [`header()`]: Decoder::header
pub struct Decoder<'a, R: Read> {
    src: R,
    log: Option<LogWtr<'a>>,
    header: Option<LzHeader>,
}

impl<'a, R: Read> Decoder<'a, R> {
    #[inline]
    pub fn for_reader(rdr: R) -> Self {
        Self {
            src: rdr,
            log: None,
            header: None,
        }
    }

    /// Write per-token diagnostic information to `wtr` while decoding.
    #[inline]
    pub fn with_logging<W: Write>(&mut self, wtr: &'a mut W) -> &mut Self {
        self.log = Some(wtr as LogWtr);
        self
    }

    /// Read the stream header, without decoding the block data.
    #[inline]
    pub fn header(&mut self) -> Result<LzHeader, PakError> {
        if let Some(header) = self.header {
            Ok(header)
        } else {
            let header = LzHeader::from_reader(&mut self.src)?;
            self.header = Some(header);
            Ok(header)
        }
    }

    /// Decompress the stream into a `Vec<u8>`.
    #[inline]
    pub fn decode(&mut self) -> Result<Vec<u8>, PakError> {
        do_decode(self)
    }
}

impl<'a> Decoder<'a, Cursor<&'a [u8]>> {
    #[inline]
    pub fn for_bytes(bytes: &'a [u8]) -> Self {
        Self::for_reader(Cursor::new(bytes))
    }
}

impl<'a> Decoder<'a, BufReader<File>> {
    #[inline]
    pub fn for_file<P: AsRef<Path>>(p: P) -> Result<Self, PakError> {
        File::open(p)
            .map(BufReader::new)
            .map(Self::for_reader)
            .map_err(Into::into)
    }
}

/// Decompress LZ10 data into a `Vec<u8>`
///
/// This is a convenience function to decode a `Read`er without having to
/// import and set up a [`Decoder`].
pub fn decompress<R: Read>(rdr: R) -> Result<Vec<u8>, PakError> {
    Decoder::for_reader(rdr).decode()
}

/// Extract the [`LzHeader`] from LZ10 data
///
/// This is a convenience function to inspect a stream without having to set
/// up a [`Decoder`].
pub fn lz10_info<R: Read>(rdr: R) -> Result<LzHeader, PakError> {
    Decoder::for_reader(rdr).header()
}

fn do_decode<R: Read>(opt: &mut Decoder<R>) -> Result<Vec<u8>, PakError> {
    let header = opt.header()?;
    let Decoder { src, log, .. } = opt;

    if let Some(wtr) = log.as_mut() {
        writeln!(wtr, "# Header\n{:?}", &header)?;
    }

    let declared = header.size as usize;
    let mut output: Vec<u8> = Vec::with_capacity(declared);

    'blocks: while output.len() < declared {
        let flags = src.read_u8()?;

        for slot in 0..TOKENS_PER_BLOCK {
            // trailing pad tokens of the final block are never read
            if output.len() == declared {
                break 'blocks;
            }

            let coded = flags & (0x80 >> slot) != 0;
            if coded {
                let mut raw = [0u8; 2];
                src.read_exact(&mut raw)?;
                let BackReference {
                    length,
                    displacement,
                } = BackReference::from_bytes(raw);
                let (length, displacement) = (length as usize, displacement as usize);

                if displacement > output.len() {
                    return Err(PakError::BadLookback {
                        displacement,
                        produced: output.len(),
                    });
                }
                if output.len() + length > declared {
                    return Err(PakError::LengthOverrun { declared });
                }

                let start = output.len() - displacement;
                if let Some(wtr) = log.as_mut() {
                    writeln!(
                        wtr,
                        "{:04x} - Encoded [Copyback]: size: {} disp: {} | start: {:04x}",
                        output.len(),
                        length,
                        displacement,
                        start
                    )?;
                }

                // byte at a time: the source range may overlap the bytes
                // this copy is itself producing
                for i in start..start + length {
                    let byte = output[i];
                    output.push(byte);
                }
            } else {
                let byte = src.read_u8()?;
                output.push(byte);

                if let Some(wtr) = log.as_mut() {
                    writeln!(wtr, "{:04x} - Uncoded: {:02x}", output.len() - 1, byte)?;
                }
            }
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_reference_stream() {
        let stream = [
            0x10, 0x14, 0x00, 0x00, // header, length 20
            0x40, 0x41, 0xF0, 0x00, 0x41, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];
        assert_eq!(decompress(&stream[..]).unwrap(), [0x41; 20]);
    }

    #[test]
    fn decode_empty_stream() {
        let stream = [0x10, 0x00, 0x00, 0x00];
        assert_eq!(decompress(&stream[..]).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn decode_skips_magic() {
        let stream = [
            b'L', b'Z', b'7', b'7', 0x10, 0x02, 0x00, 0x00, 0x00, b'h', b'i', 0, 0, 0, 0, 0, 0,
        ];
        assert_eq!(decompress(&stream[..]).unwrap(), b"hi");
    }

    #[test]
    fn lookback_past_start_is_corrupt() {
        // back-reference at position 1 claiming displacement 2
        let stream = [
            0x10, 0x14, 0x00, 0x00, 0x40, 0x41, 0xF0, 0x01,
        ];
        match decompress(&stream[..]) {
            Err(PakError::BadLookback {
                displacement: 2,
                produced: 1,
            }) => {}
            other => panic!("expected BadLookback, got {:?}", other),
        }
    }

    #[test]
    fn copy_past_declared_length_is_corrupt() {
        // declared length 4, but the back-reference expands to 18 bytes
        let stream = [0x10, 0x04, 0x00, 0x00, 0x40, 0x41, 0xF0, 0x00];
        match decompress(&stream[..]) {
            Err(PakError::LengthOverrun { declared: 4 }) => {}
            other => panic!("expected LengthOverrun, got {:?}", other),
        }
    }

    #[test]
    fn truncated_stream_is_an_io_error() {
        let stream = [0x10, 0x14, 0x00, 0x00, 0x00, 0x41];
        match decompress(&stream[..]) {
            Err(PakError::Io(e)) => {
                assert_eq!(e.kind(), std::io::ErrorKind::UnexpectedEof)
            }
            other => panic!("expected Io, got {:?}", other),
        }
    }

    #[test]
    fn header_without_decode() {
        let hdr = lz10_info(&[0x10u8, 0x2A, 0x00, 0x00][..]).unwrap();
        assert_eq!(hdr.size, 42);
    }
}

use crate::{
    errors::PakError,
    format::{
        BackReference, LzHeader, Token, MAX_MATCH, MIN_MATCH, TOKENS_PER_BLOCK, WINDOW_SIZE,
    },
};
use smallvec::SmallVec;
use std::{
    fs::File,
    io::{BufReader, BufWriter, Cursor, Read, Write},
    path::Path,
};

type LogWtr<'a> = &'a mut dyn Write;

/// A block's worth of token bytes: at most eight two byte back-references.
type BlockBuf = SmallVec<[u8; 2 * TOKENS_PER_BLOCK]>;

/// Specify the encoding settings, such as the stream magic, logging, input,
/// and output.
///
/// To create a new `Encoder`, use [`for_reader()`], [`for_bytes()`], or
/// [`for_file()`]. Then, change any of the encoder settings.
/// Finally, compress the input data with [`encode_to_vec()`],
/// [`encode_to_writer()`], or [`encode_to_file()`].
/// ```
/// # use previewpak::Encoder;
/// let compressed = Encoder::for_bytes(b"ABBACABBACD")
///     .encode_to_vec()
///     .unwrap();
/// ```
/// The title screen files expect the `"LZ77"` magic in front of the header;
/// enable it with [`with_magic()`]:
/// ```
/// # use previewpak::Encoder;
/// let compressed = Encoder::for_bytes(b"ABBACABBACD")
///     .with_magic(true)
///     .encode_to_vec()
///     .unwrap();
/// assert_eq!(&compressed[..4], b"LZ77");
/// ```
///
/// [`for_reader()`]: Encoder::for_reader
/// [`for_bytes()`]: Encoder::for_bytes
/// [`for_file()`]: Encoder::for_file
/// [`with_magic()`]: Encoder::with_magic
/// [`encode_to_vec()`]: Encoder::encode_to_vec
/// [`encode_to_writer()`]: Encoder::encode_to_writer
/// [`encode_to_file()`]: Encoder::encode_to_file
pub struct Encoder<'a, R> {
    rdr: R,
    magic: bool,
    log: Option<LogWtr<'a>>,
}

impl<'a, R: Read> Encoder<'a, R> {
    /// Create a new `Encoder` for the data in `rdr`.
    #[inline]
    pub fn for_reader(rdr: R) -> Self {
        Self {
            rdr,
            magic: false,
            log: None,
        }
    }

    /// Prefix the output with the `"LZ77"` magic bytes.
    #[inline]
    pub fn with_magic(&mut self, magic: bool) -> &mut Self {
        self.magic = magic;
        self
    }

    /// Write per-token diagnostic information to `log` while encoding.
    #[inline]
    pub fn with_logging<L: Write>(&mut self, log: &'a mut L) -> &mut Self {
        self.log = Some(log as LogWtr);
        self
    }

    /// Start the encoding and write the compressed stream out to `wtr`.
    #[inline]
    pub fn encode_to_writer<W: Write>(&mut self, wtr: W) -> Result<(), PakError> {
        do_encode(self, wtr)
    }

    /// Start the encoding and write the compressed stream out to the newly
    /// created `File` `f`.
    #[inline]
    pub fn encode_to_file<P: AsRef<Path>>(&mut self, f: P) -> Result<(), PakError> {
        let wtr = BufWriter::new(File::create(f)?);
        self.encode_to_writer(wtr)
    }

    /// Start the encoding and return the compressed stream in a `Vec<u8>`.
    #[inline]
    pub fn encode_to_vec(&mut self) -> Result<Vec<u8>, PakError> {
        let mut out = Vec::new();
        self.encode_to_writer(&mut out).map(|_| out)
    }
}

impl<'a> Encoder<'a, BufReader<File>> {
    /// Create a new `Encoder` for the file at `p`.
    #[inline]
    pub fn for_file<P: AsRef<Path>>(p: P) -> Result<Self, PakError> {
        let rdr = BufReader::new(File::open(p)?);
        Ok(Self::for_reader(rdr))
    }
}

impl<'a> Encoder<'a, Cursor<&'a [u8]>> {
    /// Create a new `Encoder` for the data in the `bytes` slice.
    #[inline]
    pub fn for_bytes(bytes: &'a [u8]) -> Self {
        Self::for_reader(Cursor::new(bytes))
    }
}

/// Compress data into an LZ10 `Vec<u8>`
///
/// This is a convenience function to encode a `Read`er without having to
/// import and set up an [`Encoder`].
pub fn compress<R: Read>(rdr: R) -> Result<Vec<u8>, PakError> {
    Encoder::for_reader(rdr).encode_to_vec()
}

fn do_encode<R: Read, W: Write>(opts: &mut Encoder<'_, R>, mut wtr: W) -> Result<(), PakError> {
    let Encoder { rdr, magic, log } = opts;

    // The search window looks back into already-consumed input, so the
    // whole buffer has to be resident before the first block is emitted.
    let mut data = Vec::new();
    rdr.read_to_end(&mut data)?;

    let header = LzHeader::new(data.len())?;
    header.write(&mut wtr, *magic)?;

    let mut pos = 0;
    while pos < data.len() {
        let mut flags = 0u8;
        let mut block = BlockBuf::new();

        for slot in 0..TOKENS_PER_BLOCK {
            let token = match next_token(&data, pos) {
                // the firmware reads all eight slots of every flag byte
                None => Token::Literal(0),
                Some(t) => {
                    if let Token::Reference(_) = t {
                        flags |= 1 << (TOKENS_PER_BLOCK - 1 - slot);
                    }
                    t
                }
            };

            if let Some(wtr) = log.as_mut() {
                log_token(wtr, pos, token)?;
            }

            match token {
                Token::Literal(byte) => block.push(byte),
                Token::Reference(r) => block.extend_from_slice(&r.to_bytes()),
            }
            pos += token.expanded_len();
        }

        wtr.write_all(&[flags])?;
        wtr.write_all(&block)?;
    }

    Ok(())
}

/// Pick the token for position `pos`, or `None` once the input is exhausted.
fn next_token(data: &[u8], pos: usize) -> Option<Token> {
    if pos >= data.len() {
        return None;
    }
    Some(match find_match(data, pos) {
        Some((length, displacement)) => Token::Reference(BackReference::new(length, displacement)),
        None => Token::Literal(data[pos]),
    })
}

/// Greedy search of the window behind `pos` for the longest match, returned
/// as `(length, displacement)`.
///
/// Candidates are scanned from the far end of the window, and a candidate
/// only replaces the best on a strictly greater length. Among equal-length
/// matches the first one found wins, which keeps the largest displacement;
/// the firmware's own tools behave the same way and the output must stay
/// byte-identical to theirs.
///
/// The match may run past `pos` into the bytes it will itself produce
/// (`displacement < length`); the decoder copies byte by byte, so such
/// matches expand correctly.
pub(crate) fn find_match(data: &[u8], pos: usize) -> Option<(usize, usize)> {
    let start = pos.saturating_sub(WINDOW_SIZE);
    let mut best: Option<(usize, usize)> = None;

    for candidate in start..pos {
        let mut length = 0;
        while length < MAX_MATCH
            && pos + length < data.len()
            && data[pos + length] == data[candidate + length]
        {
            length += 1;
        }

        if length > best.map_or(0, |(l, _)| l) {
            best = Some((length, pos - candidate));
            // can't improve on the max match length
            if length == MAX_MATCH {
                break;
            }
        }
    }

    best.filter(|&(length, _)| length >= MIN_MATCH)
}

fn log_token(wtr: &mut dyn Write, pos: usize, token: Token) -> Result<(), PakError> {
    match token {
        Token::Literal(b) => writeln!(wtr, "{:04x} - Uncoded: {:02x}", pos, b)?,
        Token::Reference(r) => writeln!(
            wtr,
            "{:04x} - Encoded [Copyback]: size: {} disp: {}",
            pos, r.length, r.displacement
        )?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_header_only() {
        let out = compress(&b""[..]).unwrap();
        assert_eq!(out, [0x10, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn short_input_stays_literal() {
        // nothing repeats, so every token is a literal
        let out = compress(&b"abc"[..]).unwrap();
        assert_eq!(
            out,
            [0x10, 0x03, 0x00, 0x00, 0x00, b'a', b'b', b'c', 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn run_of_a_matches_reference_stream() {
        let out = compress(&[0x41u8; 20][..]).unwrap();
        assert_eq!(
            out,
            [
                0x10, 0x14, 0x00, 0x00, // header, length 20
                0x40, // second token is a back-reference
                0x41, // literal 'A'
                0xF0, 0x00, // length 18, displacement 1
                0x41, // literal 'A'
                0x00, 0x00, 0x00, 0x00, 0x00, // pad to eight tokens
            ]
        );
    }

    #[test]
    fn magic_precedes_header() {
        let out = Encoder::for_bytes(b"xyz").with_magic(true).encode_to_vec().unwrap();
        assert_eq!(&out[..5], [b'L', b'Z', b'7', b'7', 0x10]);
    }

    #[test]
    fn search_finds_nothing_below_min_match() {
        // "ab" recurs but two bytes are cheaper as literals
        assert_eq!(find_match(b"abcabd", 3), None);
    }

    #[test]
    fn search_is_greedy_within_window() {
        // at pos 6 both "abc" (len 3) and "abcd" (len 4) are available
        let data = b"abcxabcdabcd";
        assert_eq!(find_match(data, 8), Some((4, 4)));
    }

    #[test]
    fn search_caps_length_at_max_match() {
        let data = [7u8; 64];
        assert_eq!(find_match(&data, 1), Some((MAX_MATCH, 1)));
    }

    #[test]
    fn equal_length_ties_keep_largest_displacement() {
        // "abcZ" at 0 and again at 4; matching at 8 must pick the copy at 0
        let data = b"abcZabcZabcZ";
        assert_eq!(find_match(data, 8), Some((4, 8)));
    }

    #[test]
    fn overlapping_match_is_allowed() {
        // displacement 1, length capped only by the end of input
        let data = [9u8; 10];
        assert_eq!(find_match(&data, 1), Some((9, 1)));
    }

    #[test]
    fn oversized_input_is_rejected() {
        let data = vec![0u8; crate::format::MAX_INPUT];
        match compress(&data[..]) {
            Err(PakError::InputTooLarge(n)) => assert_eq!(n, data.len()),
            other => panic!("expected InputTooLarge, got {:?}", other.map(|v| v.len())),
        }
    }

    #[test]
    fn encode_log_lists_every_token() {
        let mut log = Vec::new();
        Encoder::for_bytes(&[0x41; 20])
            .with_logging(&mut log)
            .encode_to_vec()
            .unwrap();
        let log = String::from_utf8(log).unwrap();
        assert!(log.contains("0000 - Uncoded: 41"));
        assert!(log.contains("0001 - Encoded [Copyback]: size: 18 disp: 1"));
    }
}

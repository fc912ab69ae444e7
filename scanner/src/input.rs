//! Input adaption: encoding detection, transcoding and newline normalization.
//!
//! YAML streams may arrive as bytes in any common Unicode encoding, as typed
//! UTF-16/UTF-32 code units, or as characters. Everything is funneled into an
//! [`InputBuffer`]: a fully materialized, validated UTF-8 buffer whose line
//! breaks have been normalized to `\n`. The scanner only ever works on that
//! buffer; no further I/O or decoding happens once it exists.

use std::borrow::Cow;

use encoding_rs::{Decoder, DecoderResult, UTF_16BE, UTF_16LE};

use crate::scanner::{Marker, ScanError, ScanErrorKind};

/// The character encoding detected on a byte input.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Encoding {
    /// UTF-8.
    Utf8,
    /// UTF-16, big endian.
    Utf16Be,
    /// UTF-16, little endian.
    Utf16Le,
    /// UTF-32, big endian.
    Utf32Be,
    /// UTF-32, little endian.
    Utf32Le,
}

/// A normalized, validated UTF-8 view of the input.
///
/// Line breaks are normalized (`\r\n` and lone `\r` both become `\n`) and a
/// leading byte order mark is removed. The buffer lives for the duration of
/// the parse; position reporting is relative to it.
#[derive(Clone, Debug)]
pub struct InputBuffer {
    text: String,
}

impl InputBuffer {
    /// Build a buffer from an UTF-8 string slice.
    ///
    /// Validity is given by the type; only BOM stripping and newline
    /// normalization are performed.
    #[must_use]
    pub fn from_str(source: &str) -> InputBuffer {
        let source = source.strip_prefix('\u{feff}').unwrap_or(source);
        InputBuffer {
            text: normalize_newlines(source).into_owned(),
        }
    }

    /// Build a buffer from raw bytes, detecting the encoding first.
    ///
    /// The encoding is inferred from a leading BOM when present, otherwise
    /// from the pattern of NUL bytes among the first four bytes (the first
    /// character of a YAML stream is mandated to be ASCII, which makes the
    /// pattern unambiguous), and defaults to UTF-8.
    ///
    /// # Errors
    /// Returns a [`ScanError`] of kind [`ScanErrorKind::InvalidEncoding`] if
    /// the bytes are ill-formed in the detected encoding (overlong UTF-8
    /// forms, lone surrogates, code points beyond U+10FFFF, truncated
    /// units).
    pub fn from_bytes(source: &[u8]) -> Result<InputBuffer, ScanError> {
        let (encoding, bom_len) = detect_encoding(source);
        let body = &source[bom_len..];
        let text = match encoding {
            Encoding::Utf8 => decode_utf8(body)?,
            Encoding::Utf16Be => decode_utf16_bytes(body, true)?,
            Encoding::Utf16Le => decode_utf16_bytes(body, false)?,
            Encoding::Utf32Be => decode_utf32_bytes(body, true)?,
            Encoding::Utf32Le => decode_utf32_bytes(body, false)?,
        };
        Ok(InputBuffer {
            text: normalize_newlines(&text).into_owned(),
        })
    }

    /// Build a buffer from UTF-16 code units.
    ///
    /// A leading BOM unit decides the byte order: `0xFEFF` means the units
    /// are already in the right order, `0xFFFE` that each unit must be
    /// swapped. Without a BOM the units are taken as-is (native order).
    ///
    /// # Errors
    /// Returns a [`ScanError`] of kind [`ScanErrorKind::InvalidEncoding`] on
    /// a lone or mis-ordered surrogate.
    pub fn from_utf16(source: &[u16]) -> Result<InputBuffer, ScanError> {
        let (swap, body) = match source.first() {
            Some(&0xFEFF) => (false, &source[1..]),
            Some(&0xFFFE) => (true, &source[1..]),
            _ => (false, source),
        };
        let swapped;
        let units = if swap {
            swapped = body.iter().map(|u| u.swap_bytes()).collect::<Vec<u16>>();
            &swapped[..]
        } else {
            body
        };

        let mut text = String::with_capacity(units.len());
        for decoded in char::decode_utf16(units.iter().copied()) {
            match decoded {
                Ok(c) => text.push(c),
                Err(e) => {
                    return Err(encoding_error(
                        &text,
                        format!(
                            "invalid UTF-16 input: lone surrogate U+{:04X}",
                            e.unpaired_surrogate()
                        ),
                    ));
                }
            }
        }
        Ok(InputBuffer {
            text: normalize_newlines(&text).into_owned(),
        })
    }

    /// Build a buffer from UTF-32 code units.
    ///
    /// BOM handling mirrors [`InputBuffer::from_utf16`]: a leading `0xFEFF`
    /// is consumed, a leading `0xFFFE0000` additionally byte-swaps every
    /// unit.
    ///
    /// # Errors
    /// Returns a [`ScanError`] of kind [`ScanErrorKind::InvalidEncoding`] if
    /// a unit is in the surrogate range or beyond U+10FFFF.
    pub fn from_utf32(source: &[u32]) -> Result<InputBuffer, ScanError> {
        let (swap, body) = match source.first() {
            Some(&0xFEFF) => (false, &source[1..]),
            Some(&0xFFFE_0000) => (true, &source[1..]),
            _ => (false, source),
        };

        let mut text = String::with_capacity(body.len());
        for &unit in body {
            let unit = if swap { unit.swap_bytes() } else { unit };
            match char::from_u32(unit) {
                Some(c) => text.push(c),
                None => {
                    return Err(encoding_error(
                        &text,
                        format!("invalid UTF-32 input: illegal code unit 0x{unit:08X}"),
                    ));
                }
            }
        }
        Ok(InputBuffer {
            text: normalize_newlines(&text).into_owned(),
        })
    }

    /// Build a buffer from an iterator over characters.
    pub fn from_chars<I: Iterator<Item = char>>(source: I) -> InputBuffer {
        let text: String = source.collect();
        InputBuffer::from_str(&text)
    }

    /// Return the normalized text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Consume the buffer and return the normalized text.
    #[must_use]
    pub fn into_string(self) -> String {
        self.text
    }
}

/// A type from which an [`InputBuffer`] can be built.
///
/// This is the parameter accepted by the parsing entry points of the
/// `garnet` crate. It is implemented for string slices, owned strings, byte
/// slices and vectors, UTF-16 and UTF-32 unit slices, and for an already
/// built [`InputBuffer`]. Readers (files, streams) go through the dedicated
/// reader entry points instead, so that I/O errors stay distinguishable from
/// encoding errors.
pub trait Source {
    /// Normalize `self` into an [`InputBuffer`].
    ///
    /// # Errors
    /// Returns a [`ScanError`] of kind [`ScanErrorKind::InvalidEncoding`]
    /// when the input is ill-formed in its detected encoding.
    fn into_buffer(self) -> Result<InputBuffer, ScanError>;
}

impl Source for &str {
    fn into_buffer(self) -> Result<InputBuffer, ScanError> {
        Ok(InputBuffer::from_str(self))
    }
}

impl Source for String {
    fn into_buffer(self) -> Result<InputBuffer, ScanError> {
        Ok(InputBuffer::from_str(&self))
    }
}

impl Source for &[u8] {
    fn into_buffer(self) -> Result<InputBuffer, ScanError> {
        InputBuffer::from_bytes(self)
    }
}

impl Source for Vec<u8> {
    fn into_buffer(self) -> Result<InputBuffer, ScanError> {
        InputBuffer::from_bytes(&self)
    }
}

impl Source for &[u16] {
    fn into_buffer(self) -> Result<InputBuffer, ScanError> {
        InputBuffer::from_utf16(self)
    }
}

impl Source for &[u32] {
    fn into_buffer(self) -> Result<InputBuffer, ScanError> {
        InputBuffer::from_utf32(self)
    }
}

impl Source for InputBuffer {
    fn into_buffer(self) -> Result<InputBuffer, ScanError> {
        Ok(self)
    }
}

/// Inspect the first four bytes and detect the stream encoding.
///
/// Returns the encoding and the number of BOM bytes to skip.
fn detect_encoding(b: &[u8]) -> (Encoding, usize) {
    // BOM forms first; the four-byte patterns must win over their two-byte
    // prefixes (`FF FE 00 00` vs `FF FE`).
    if b.len() >= 4 && b[0] == 0x00 && b[1] == 0x00 && b[2] == 0xFE && b[3] == 0xFF {
        return (Encoding::Utf32Be, 4);
    }
    if b.len() >= 4 && b[0] == 0xFF && b[1] == 0xFE && b[2] == 0x00 && b[3] == 0x00 {
        return (Encoding::Utf32Le, 4);
    }
    if b.len() >= 2 && b[0] == 0xFE && b[1] == 0xFF {
        return (Encoding::Utf16Be, 2);
    }
    if b.len() >= 2 && b[0] == 0xFF && b[1] == 0xFE {
        return (Encoding::Utf16Le, 2);
    }
    if b.len() >= 3 && b[0] == 0xEF && b[1] == 0xBB && b[2] == 0xBF {
        return (Encoding::Utf8, 3);
    }

    // No BOM. The first character of a YAML stream is ASCII, so the pattern
    // of NUL bytes in the first four bytes gives the unit width and order
    // away.
    if b.len() >= 4 && b[0] == 0x00 && b[1] == 0x00 && b[2] == 0x00 && b[3] != 0x00 {
        return (Encoding::Utf32Be, 0);
    }
    if b.len() >= 4 && b[0] != 0x00 && b[1] == 0x00 && b[2] == 0x00 && b[3] == 0x00 {
        return (Encoding::Utf32Le, 0);
    }
    if b.len() >= 2 && b[0] == 0x00 && b[1] != 0x00 {
        return (Encoding::Utf16Be, 0);
    }
    if b.len() >= 2 && b[0] != 0x00 && b[1] == 0x00 {
        return (Encoding::Utf16Le, 0);
    }
    (Encoding::Utf8, 0)
}

/// Validate UTF-8 input.
///
/// `std::str::from_utf8` enforces exactly what is required here: minimal
/// length encoding, no surrogate code points, nothing above U+10FFFF, and
/// well-placed continuation bytes.
fn decode_utf8(body: &[u8]) -> Result<String, ScanError> {
    match std::str::from_utf8(body) {
        Ok(s) => Ok(s.to_owned()),
        Err(e) => {
            let valid_up_to = e.valid_up_to();
            let bad_len = e.error_len().unwrap_or(body.len() - valid_up_to);
            let bad = &body[valid_up_to..valid_up_to + bad_len.min(4)];
            // Safe: everything before `valid_up_to` has been validated.
            let prefix = std::str::from_utf8(&body[..valid_up_to]).unwrap_or_default();
            Err(encoding_error(
                prefix,
                format!("invalid character sequence at byte {valid_up_to}: {bad:?}"),
            ))
        }
    }
}

/// Decode UTF-16 bytes through `encoding_rs` with a strict trap.
fn decode_utf16_bytes(body: &[u8], big_endian: bool) -> Result<String, ScanError> {
    let encoding = if big_endian { UTF_16BE } else { UTF_16LE };
    let mut decoder = encoding.new_decoder_without_bom_handling();
    let mut output = String::new();
    decode_loop(body, &mut output, &mut decoder)?;
    Ok(output)
}

/// Perform a loop of [`Decoder::decode_to_string_without_replacement`],
/// reallocating `output` if needed, and failing on the first malformation.
fn decode_loop(input: &[u8], output: &mut String, decoder: &mut Decoder) -> Result<(), ScanError> {
    output.reserve(input.len());
    let mut total_bytes_read = 0;

    loop {
        match decoder.decode_to_string_without_replacement(&input[total_bytes_read..], output, true)
        {
            // If the input is empty, we processed the whole input.
            (DecoderResult::InputEmpty, _) => break Ok(()),
            // If the output is full, we must reallocate.
            (DecoderResult::OutputFull, bytes_read) => {
                total_bytes_read += bytes_read;
                // The output is already reserved to the size of the input. We slowly resize. Here,
                // we're expecting that 10% of bytes will double in size when converting to UTF-8.
                output.reserve(input.len() / 10);
            }
            (DecoderResult::Malformed(malformed_len, bytes_after_malformed), bytes_read) => {
                total_bytes_read += bytes_read;
                let malformed_len = malformed_len as usize;
                let bytes_after_malformed = bytes_after_malformed as usize;
                let byte_idx = total_bytes_read - (malformed_len + bytes_after_malformed);
                let malformed_sequence = &input[byte_idx..byte_idx + malformed_len];

                break Err(encoding_error(
                    output,
                    format!("invalid character sequence at byte {byte_idx}: {malformed_sequence:?}"),
                ));
            }
        }
    }
}

/// Decode UTF-32 bytes, validating every unit.
fn decode_utf32_bytes(body: &[u8], big_endian: bool) -> Result<String, ScanError> {
    if body.len() % 4 != 0 {
        return Err(encoding_error(
            "",
            format!("invalid UTF-32 input: length {} is not a multiple of 4", body.len()),
        ));
    }
    let mut text = String::with_capacity(body.len() / 4);
    for chunk in body.chunks_exact(4) {
        let unit = if big_endian {
            u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]])
        } else {
            u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]])
        };
        match char::from_u32(unit) {
            Some(c) => text.push(c),
            None => {
                return Err(encoding_error(
                    &text,
                    format!("invalid UTF-32 input: illegal code unit 0x{unit:08X}"),
                ));
            }
        }
    }
    Ok(text)
}

/// Replace every `\r\n` pair and every lone `\r` with `\n`.
///
/// Performed after transcoding so the scanner only ever sees `\n`. Borrows
/// when the input contains no carriage return.
fn normalize_newlines(text: &str) -> Cow<'_, str> {
    if !text.contains('\r') {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\r' {
            if chars.peek() == Some(&'\n') {
                chars.next();
            }
            out.push('\n');
        } else {
            out.push(c);
        }
    }
    Cow::Owned(out)
}

/// Build an encoding error positioned at the end of the decoded prefix.
fn encoding_error(decoded_prefix: &str, info: String) -> ScanError {
    ScanError::new(
        ScanErrorKind::InvalidEncoding,
        position_in(decoded_prefix, decoded_prefix.len()),
        info,
    )
}

/// Compute the marker for a byte offset of a buffer.
///
/// Lines are separated by `\n`; the column is the byte offset within the
/// line, which is exact for indentation since leading indent is always an
/// ASCII space.
#[must_use]
pub(crate) fn position_in(text: &str, index: usize) -> Marker {
    let index = index.min(text.len());
    let prefix = &text.as_bytes()[..index];
    let line = prefix.iter().filter(|&&b| b == b'\n').count();
    let col = index - prefix.iter().rposition(|&b| b == b'\n').map_or(0, |p| p + 1);
    Marker::new(index, line, col)
}

#[cfg(test)]
mod test {
    use super::{detect_encoding, position_in, Encoding, InputBuffer};

    #[test]
    fn test_detect_bom() {
        assert_eq!(detect_encoding(b"\x00\x00\xfe\xffx"), (Encoding::Utf32Be, 4));
        assert_eq!(detect_encoding(b"\xff\xfe\x00\x00x"), (Encoding::Utf32Le, 4));
        assert_eq!(detect_encoding(b"\xfe\xff\x00a"), (Encoding::Utf16Be, 2));
        assert_eq!(detect_encoding(b"\xff\xfea\x00"), (Encoding::Utf16Le, 2));
        assert_eq!(detect_encoding(b"\xef\xbb\xbfa"), (Encoding::Utf8, 3));
    }

    #[test]
    fn test_detect_nul_pattern() {
        assert_eq!(detect_encoding(b"\x00\x00\x00a"), (Encoding::Utf32Be, 0));
        assert_eq!(detect_encoding(b"a\x00\x00\x00"), (Encoding::Utf32Le, 0));
        assert_eq!(detect_encoding(b"\x00a\x00b"), (Encoding::Utf16Be, 0));
        assert_eq!(detect_encoding(b"a\x00b\x00"), (Encoding::Utf16Le, 0));
        assert_eq!(detect_encoding(b"a: 1"), (Encoding::Utf8, 0));
        assert_eq!(detect_encoding(b""), (Encoding::Utf8, 0));
    }

    #[test]
    fn test_utf16le_bytes() {
        let s = b"\xff\xfea\x00:\x00 \x001\x00";
        let buffer = InputBuffer::from_bytes(s as &[u8]).unwrap();
        assert_eq!(buffer.as_str(), "a: 1");
    }

    #[test]
    fn test_utf16be_bytes() {
        let s = b"\xfe\xff\x00a\x00:\x00 \x001";
        let buffer = InputBuffer::from_bytes(s as &[u8]).unwrap();
        assert_eq!(buffer.as_str(), "a: 1");
    }

    #[test]
    fn test_utf32_bytes_with_surrogate_pair_equivalent() {
        // U+1F600 as UTF-32LE without BOM.
        let s = b"a\x00\x00\x00\x00\xf6\x01\x00";
        let buffer = InputBuffer::from_bytes(s as &[u8]).unwrap();
        assert_eq!(buffer.as_str(), "a\u{1f600}");
    }

    #[test]
    fn test_invalid_utf8() {
        let err = InputBuffer::from_bytes(b"a: \xc3\x28" as &[u8]).unwrap_err();
        assert!(err.info().contains("invalid character sequence"));
    }

    #[test]
    fn test_lone_surrogate_utf16() {
        let err = InputBuffer::from_utf16(&[0x0061, 0xD800, 0x0062]).unwrap_err();
        assert!(err.info().contains("surrogate"));
    }

    #[test]
    fn test_out_of_range_utf32() {
        let err = InputBuffer::from_utf32(&[0x0061, 0x0011_0000]).unwrap_err();
        assert!(err.info().contains("0x00110000"));
    }

    #[test]
    fn test_swapped_bom_units() {
        let buffer = InputBuffer::from_utf16(&[0xFFFE, 0x6100, 0x3A00, 0x2000, 0x3100]).unwrap();
        assert_eq!(buffer.as_str(), "a: 1");
        let buffer = InputBuffer::from_utf32(&[0xFFFE_0000, 0x6100_0000]).unwrap();
        assert_eq!(buffer.as_str(), "a");
    }

    #[test]
    fn test_newline_normalization() {
        let buffer = InputBuffer::from_str("a: 1\r\nb: 2\rc: 3\n");
        assert_eq!(buffer.as_str(), "a: 1\nb: 2\nc: 3\n");
    }

    #[test]
    fn test_position_in() {
        let text = "ab\ncde\nf";
        let mark = position_in(text, 0);
        assert_eq!((mark.line(), mark.col()), (0, 0));
        let mark = position_in(text, 4);
        assert_eq!((mark.line(), mark.col()), (1, 1));
        let mark = position_in(text, 7);
        assert_eq!((mark.line(), mark.col()), (2, 0));
    }
}

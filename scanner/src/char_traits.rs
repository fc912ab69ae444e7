//! Holds functions to determine if a character belongs to a specific character set.

/// Check whether the byte is an ASCII whitespace (` ` or `\t`).
#[inline]
pub(crate) fn is_blank(b: u8) -> bool {
    b == b' ' || b == b'\t'
}

/// Check whether the byte is a line feed.
///
/// The input buffer is newline-normalized, so `\n` is the only line break
/// the scanner ever sees.
#[inline]
pub(crate) fn is_break(b: u8) -> bool {
    b == b'\n'
}

/// Check whether the byte is a whitespace or a line feed.
#[inline]
pub(crate) fn is_blank_or_break(b: u8) -> bool {
    is_blank(b) || is_break(b)
}

/// Check whether the byte is a YAML flow indicator (one of `,[]{}`).
#[inline]
pub(crate) fn is_flow(b: u8) -> bool {
    matches!(b, b',' | b'[' | b']' | b'{' | b'}')
}

/// Check whether the byte is an ASCII digit.
#[inline]
pub(crate) fn is_digit(b: u8) -> bool {
    b.is_ascii_digit()
}

/// Check whether the byte is a hexadecimal digit (case insensitive).
#[inline]
pub(crate) fn is_hex(b: u8) -> bool {
    b.is_ascii_hexdigit()
}

/// Convert a hexadecimal digit to its value.
#[inline]
pub(crate) fn as_hex(b: u8) -> u32 {
    match b {
        b'0'..=b'9' => u32::from(b - b'0'),
        b'a'..=b'f' => u32::from(b - b'a') + 10,
        b'A'..=b'F' => u32::from(b - b'A') + 10,
        _ => unreachable!(),
    }
}

/// Check whether the byte may appear in a tag handle (`[A-Za-z0-9-]`).
#[inline]
pub(crate) fn is_word_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-'
}

/// Check whether the byte is a valid URI character.
///
/// Percent signs are accepted here; the full `%HH` shape is validated
/// separately.
#[inline]
pub(crate) fn is_uri_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"#;/?:@&=+$,-_.!~*'()[]%".contains(&b)
}

/// Check whether the byte may appear in a tag shorthand suffix.
///
/// Unlike verbatim tag URIs, shorthand suffixes exclude flow indicators and
/// `!`.
#[inline]
pub(crate) fn is_tag_char(b: u8) -> bool {
    is_uri_char(b) && !is_flow(b) && b != b'!'
}

/// Check whether the string is a run of valid, percent-encoded URI characters.
pub(crate) fn is_valid_uri(s: &str) -> bool {
    is_percent_encoded(s, is_uri_char)
}

/// Check whether the string is a valid, percent-encoded tag shorthand suffix.
pub(crate) fn is_valid_tag_suffix(s: &str) -> bool {
    is_percent_encoded(s, is_tag_char)
}

/// Check every byte against `allowed`, with `%` introducing two hex digits.
fn is_percent_encoded(s: &str, allowed: fn(u8) -> bool) -> bool {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'%' {
            if i + 2 >= bytes.len() || !is_hex(bytes[i + 1]) || !is_hex(bytes[i + 2]) {
                return false;
            }
            i += 3;
            continue;
        }
        if !allowed(b) {
            return false;
        }
        i += 1;
    }
    true
}

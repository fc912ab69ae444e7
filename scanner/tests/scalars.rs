//! Quoted and block scalar scanning.

use garnet_scanner::{InputBuffer, ScalarStyle, ScanError, Scanner, TokenKind};

/// Scan the first token of the input and return the scalar's text.
fn scalar(input: &str) -> (ScalarStyle, String) {
    try_scalar(input).unwrap()
}

fn try_scalar(input: &str) -> Result<(ScalarStyle, String), ScanError> {
    let buffer = InputBuffer::from_str(input);
    let mut scanner = Scanner::new(&buffer);
    match scanner.next_token()?.kind {
        TokenKind::Scalar(s) => Ok((s.style, s.text)),
        other => panic!("expected a scalar, got {other:?}"),
    }
}

fn scalar_error(input: &str) -> ScanError {
    try_scalar(input).unwrap_err()
}

#[test]
fn test_single_quoted() {
    assert_eq!(scalar("'foo'"), (ScalarStyle::SingleQuoted, "foo".to_owned()));
    assert_eq!(scalar("''").1, "");
    // A doubled quote is an escaped quote.
    assert_eq!(scalar("'foo''s bar'").1, "foo's bar");
    // Colons and flow indicators are plain content inside quotes.
    assert_eq!(scalar("'a: [b, c]'").1, "a: [b, c]");
}

#[test]
fn test_single_quoted_folding() {
    assert_eq!(scalar("'a\nb'").1, "a b");
    assert_eq!(scalar("'a \n  b'").1, "a b");
    assert_eq!(scalar("'a\n\nb'").1, "a\nb");
    assert_eq!(scalar("'a\n\n\nb'").1, "a\n\nb");
}

#[test]
fn test_single_quoted_unterminated() {
    let err = scalar_error("'abc");
    assert!(err
        .info()
        .contains("Invalid end of input buffer in a single-quoted string token."));
}

#[test]
fn test_double_quoted_escapes() {
    assert_eq!(scalar("\"a\\tb\"").1, "a\tb");
    assert_eq!(scalar("\"a\\nb\"").1, "a\nb");
    assert_eq!(scalar("\"\\0\\a\\b\\v\\f\\r\\e\"").1, "\0\u{7}\u{8}\u{b}\u{c}\r\u{1b}");
    assert_eq!(scalar("\"\\\"\\\\\\/\"").1, "\"\\/");
    assert_eq!(scalar("\"\\N\\_\\L\\P\"").1, "\u{85}\u{a0}\u{2028}\u{2029}");
    assert_eq!(scalar("\"\\x41\\u0042\\U00000043\"").1, "ABC");
    assert_eq!(scalar("\"\\u00e9t\\u00e9\"").1, "été");
}

#[test]
fn test_double_quoted_folding() {
    assert_eq!(scalar("\"a\nb\"").1, "a b");
    assert_eq!(scalar("\"a\n\nb\"").1, "a\nb");
    // An escaped line break suppresses the fold.
    assert_eq!(scalar("\"a\\\nb\"").1, "ab");
    // Tabs around a fold are separation white space.
    assert_eq!(scalar("\"a\t\n\tb\"").1, "a b");
}

#[test]
fn test_double_quoted_errors() {
    assert!(scalar_error("\"\\q\"")
        .info()
        .contains("Unsupported escape sequence"));
    assert!(scalar_error("\"\\x4g\"")
        .info()
        .contains("Non-hexadecimal character"));
    assert!(scalar_error("\"\\uD800\"")
        .info()
        .contains("invalid Unicode code point"));
    assert!(scalar_error("\"abc")
        .info()
        .contains("Invalid end of input buffer in a double-quoted string token."));
}

#[test]
fn test_control_characters_must_be_escaped() {
    let err = scalar_error("\"a\x07b\"");
    assert_eq!(
        err.info(),
        "Control character U+0007 (BEL) must be escaped to \\a or \\u0007."
    );
    let err = scalar_error("a\x1fb");
    assert_eq!(
        err.info(),
        "Control character U+001F (US) must be escaped to \\u001F."
    );
}

#[test]
fn test_literal_block_scalar() {
    assert_eq!(scalar("|\n  a\n  b\n").1, "a\nb\n");
    // Clip keeps exactly one trailing line feed.
    assert_eq!(scalar("|\n  a\n\n\n").1, "a\n");
    // Strip removes them all.
    assert_eq!(scalar("|-\n  a\n  b\n").1, "a\nb");
    // Keep preserves them all.
    assert_eq!(scalar("|+\n  a\n\n\n").1, "a\n\n\n");
    // Leading blank lines are content.
    assert_eq!(scalar("|\n\n  a\n").1, "\na\n");
    // Inner blank lines are kept verbatim.
    assert_eq!(scalar("|\n  a\n\n  b\n").1, "a\n\nb\n");
    // More indented lines keep their extra indentation.
    assert_eq!(scalar("|\n  a\n    b\n").1, "a\n  b\n");
}

#[test]
fn test_folded_block_scalar() {
    assert_eq!(scalar(">\n  a\n  b\n").1, "a b\n");
    assert_eq!(scalar(">\n  a\n  b\n\n  c\n").1, "a b\nc\n");
    // More indented lines are not folded.
    assert_eq!(scalar(">\n  a\n   b\n  c\n").1, "a\n b\nc\n");
    assert_eq!(scalar(">-\n  a\n  b\n").1, "a b");
}

#[test]
fn test_block_scalar_header() {
    // Explicit indentation indicator.
    assert_eq!(scalar("|2\n   a\n").1, " a\n");
    // Chomping and indentation in either order.
    assert_eq!(scalar("|-2\n   a\n").1, " a");
    assert_eq!(scalar("|2-\n   a\n").1, " a");
    // A comment may follow the header.
    assert_eq!(scalar("| # comment\n  a\n").1, "a\n");

    assert!(scalar_error("|0\n  a\n")
        .info()
        .contains("cannot be '0'"));
    assert!(scalar_error("|2\n a\n")
        .info()
        .contains("less indented than the indicated level"));
}

#[test]
fn test_block_scalar_only_whitespace() {
    assert_eq!(scalar("|-\n   \n\n").1, "");
    assert_eq!(scalar("|\n\n").1, "");
    assert_eq!(scalar("|+\n\n\n").1, "\n\n");
}

#[test]
fn test_block_scalar_ends_at_dedent() {
    let buffer = InputBuffer::from_str("a: |\n  x\nb: 2\n");
    let mut scanner = Scanner::new(&buffer);
    let kinds: Vec<_> = std::iter::from_fn(|| {
        let tok = scanner.next_token().unwrap();
        if matches!(tok.kind, TokenKind::StreamEnd) {
            None
        } else {
            Some(tok.kind)
        }
    })
    .collect();
    assert!(matches!(&kinds[2], TokenKind::Scalar(s) if s.text == "x\n"));
    assert!(matches!(&kinds[3], TokenKind::Scalar(s) if s.text == "b"));
    assert_eq!(kinds.len(), 6);
}

//! Home to the YAML scanner.
//!
//! The scanner is the lowest-level parsing utility. It is the lexer /
//! tokenizer, reading the normalized input buffer and emitting tokens that
//! the deserializer interprets with more context. One call to
//! [`Scanner::next_token`] skips insignificant whitespace and comments and
//! returns exactly one token, together with the positions at which it starts
//! and ends.
//!
//! Scalar tokens are decoded eagerly: the token carries the textual content
//! (escapes resolved, folding applied) and its typed interpretation under
//! the core schema. Consumers that need a different interpretation (e.g.
//! because a tag forces one) re-read the textual content.

#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]

use std::{error::Error, fmt};

use crate::char_traits::{
    as_hex, is_blank, is_blank_or_break, is_break, is_digit, is_flow, is_hex, is_valid_tag_suffix,
    is_valid_uri, is_word_char,
};
use crate::input::InputBuffer;

/// The YAML specification version a document declares.
///
/// Defaults to 1.2 when no `%YAML` directive is present. Version 1.1
/// documents are accepted; other versions are rejected at scan time.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Default)]
pub enum YamlVersion {
    /// YAML 1.1.
    V1_1,
    /// YAML 1.2.
    #[default]
    V1_2,
}

impl fmt::Display for YamlVersion {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        match self {
            YamlVersion::V1_1 => write!(formatter, "1.1"),
            YamlVersion::V1_2 => write!(formatter, "1.2"),
        }
    }
}

/// The style as which the scalar was written in the YAML document.
#[derive(Clone, Copy, PartialEq, Debug, Eq, Hash, PartialOrd, Ord)]
pub enum ScalarStyle {
    /// A YAML plain scalar.
    Plain,
    /// A YAML single quoted scalar.
    SingleQuoted,
    /// A YAML double quoted scalar.
    DoubleQuoted,
    /// A YAML literal block (`|` block).
    Literal,
    /// A YAML folded block (`>` block).
    Folded,
}

/// A location in a yaml document.
#[derive(Clone, Copy, PartialEq, Debug, Eq, Default)]
pub struct Marker {
    /// The byte index in the input buffer.
    index: usize,
    /// The line (0-indexed).
    line: usize,
    /// The column (0-indexed, in bytes within the line).
    col: usize,
}

impl Marker {
    /// Create a new [`Marker`] at the given position.
    #[must_use]
    pub fn new(index: usize, line: usize, col: usize) -> Marker {
        Marker { index, line, col }
    }

    /// Return the byte index of the marker in the source.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Return the line (0-indexed) of the marker in the source.
    #[must_use]
    pub fn line(&self) -> usize {
        self.line
    }

    /// Return the column (0-indexed) of the marker in the source.
    #[must_use]
    pub fn col(&self) -> usize {
        self.col
    }
}

/// A range of locations in a Yaml document.
#[derive(Clone, Copy, PartialEq, Debug, Eq, Default)]
pub struct Span {
    /// The start (inclusive) of the range.
    pub start: Marker,
    /// The end (exclusive) of the range.
    pub end: Marker,
}

impl Span {
    /// Create a new [`Span`] for the given range.
    #[must_use]
    pub fn new(start: Marker, end: Marker) -> Span {
        Span { start, end }
    }

    /// Create a empty [`Span`] at a given location.
    #[must_use]
    pub fn empty(mark: Marker) -> Span {
        Span {
            start: mark,
            end: mark,
        }
    }

    /// Return the length of the span (in bytes).
    #[must_use]
    pub fn len(&self) -> usize {
        self.end.index - self.start.index
    }

    /// Return whether the [`Span`] has a length of zero.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The category of a [`ScanError`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ScanErrorKind {
    /// The input is ill-formed in its detected Unicode encoding.
    InvalidEncoding,
    /// The input violates YAML syntax.
    Parse,
    /// A numeric literal cannot be represented in the target scalar width.
    OutOfRange,
}

/// An error that occurred while scanning.
#[derive(Clone, PartialEq, Debug, Eq)]
pub struct ScanError {
    /// The category of the error.
    kind: ScanErrorKind,
    /// The position at which the error happened in the source.
    mark: Marker,
    /// Human-readable details about the error.
    info: String,
}

impl ScanError {
    /// Create a new error from a location and an error string.
    #[must_use]
    pub fn new(kind: ScanErrorKind, loc: Marker, info: String) -> ScanError {
        ScanError {
            kind,
            mark: loc,
            info,
        }
    }

    /// Convenience alias for string slices.
    #[must_use]
    pub fn new_str(kind: ScanErrorKind, loc: Marker, info: &str) -> ScanError {
        ScanError {
            kind,
            mark: loc,
            info: info.to_owned(),
        }
    }

    /// Return the category of the error.
    #[must_use]
    pub fn kind(&self) -> ScanErrorKind {
        self.kind
    }

    /// Return the marker pointing to the error in the source.
    #[must_use]
    pub fn marker(&self) -> &Marker {
        &self.mark
    }

    /// Return the information string describing the error that happened.
    #[must_use]
    pub fn info(&self) -> &str {
        self.info.as_ref()
    }
}

impl Error for ScanError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        None
    }
}

impl fmt::Display for ScanError {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(
            formatter,
            "{} at line {} column {}",
            self.info,
            self.mark.line + 1,
            self.mark.col + 1,
        )
    }
}

/// The typed interpretation of a scalar token under the core schema.
#[derive(Clone, PartialEq, Debug)]
pub enum ScalarValue {
    /// A null value (`~`, `null`, `Null`, `NULL`, plain style only).
    Null,
    /// A boolean value (`true`/`false` and their capitalized forms).
    Boolean(bool),
    /// A signed 64-bit integer (decimal, `0o` octal or `0x` hexadecimal).
    Integer(i64),
    /// An IEEE-754 double, including `.inf`, `-.inf` and `.nan`.
    FloatingPoint(f64),
    /// Anything else; the content is the token's text.
    String,
}

/// A scalar token.
///
/// `text` always carries the decoded textual content of the scalar; `value`
/// is its typed interpretation. Quoted and block scalars are always
/// [`ScalarValue::String`]; plain scalars are classified eagerly.
#[derive(Clone, PartialEq, Debug)]
pub struct ScalarToken {
    /// The style the scalar was written as.
    pub style: ScalarStyle,
    /// The decoded textual content.
    pub text: String,
    /// The typed interpretation of the content.
    pub value: ScalarValue,
}

/// The contents of a scanner token.
#[derive(Clone, PartialEq, Debug)]
pub enum TokenKind {
    /// The end of the input buffer, EOF.
    StreamEnd,
    /// A `%YAML` directive with its version operand.
    VersionDirective(YamlVersion),
    /// A `%TAG` directive binding a handle to a prefix.
    TagDirective {
        /// The handle (`!`, `!!` or `!name!`).
        handle: String,
        /// The prefix the handle expands to.
        prefix: String,
    },
    /// A directive this implementation does not know. Skipped over.
    InvalidDirective,
    /// The end of directives / start of a document (`---`).
    DocumentStart,
    /// The end of a YAML document (`...`).
    DocumentEnd,
    /// An entry in a block sequence (`- `).
    BlockEntry,
    /// Start of an inline sequence (`[ a, b ]`).
    FlowSequenceStart,
    /// End of an inline sequence.
    FlowSequenceEnd,
    /// Start of an inline mapping (`{ a: b, c: d }`).
    FlowMappingStart,
    /// End of an inline mapping.
    FlowMappingEnd,
    /// An explicit key prefix (`? `).
    Key,
    /// The key separator in a mapping (`:`).
    Value,
    /// The value separator in flow containers (`,`).
    FlowEntry,
    /// An anchor definition (`&name`).
    Anchor(String),
    /// A reference to an anchor (`*name`).
    Alias(String),
    /// A YAML tag in its verbatim source form (e.g. `!!str`, `!<tag:...>`).
    Tag(String),
    /// A scalar with its decoded value.
    Scalar(ScalarToken),
}

/// A scanner token.
#[derive(Clone, PartialEq, Debug)]
pub struct Token {
    /// The range of the token in the source.
    pub span: Span,
    /// The contents of the token.
    pub kind: TokenKind,
}

/// A convenience alias for scanner functions that may fail without returning a value.
pub type ScanResult = Result<(), ScanError>;

/// The chomping behavior requested by a block scalar header.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Chomping {
    /// Remove all trailing line feeds (`-`).
    Strip,
    /// Keep exactly one trailing line feed (no indicator).
    Clip,
    /// Keep all trailing line feeds (`+`).
    Keep,
}

/// The YAML scanner.
///
/// This corresponds to the low-level interface when reading YAML. The
/// scanner emits tokens as they are read, keeping just enough context
/// (column, flow nesting) to disambiguate indicators from scalar content.
/// Indentation semantics are the deserializer's job; the scanner only
/// reports where every token begins.
#[derive(Debug)]
pub struct Scanner<'input> {
    /// The normalized input text.
    text: &'input str,
    /// The position of the cursor within the input.
    mark: Marker,
    /// Level of nesting of flow containers.
    flow_level: u32,
    /// Whether all characters encountered since the last newline were whitespace.
    leading_whitespace: bool,
    /// In some flow contexts, the value of a mapping is allowed to be adjacent to the `:`. When it
    /// is, the index at which the `:` may be must be stored in `adjacent_value_allowed_at`.
    adjacent_value_allowed_at: usize,
    /// Whether the `StreamEnd` token has been emitted.
    stream_ended: bool,
}

impl<'input> Scanner<'input> {
    /// Creates the YAML tokenizer over a normalized buffer.
    #[must_use]
    pub fn new(input: &'input InputBuffer) -> Scanner<'input> {
        Scanner {
            text: input.as_str(),
            mark: Marker::new(0, 0, 0),
            flow_level: 0,
            leading_whitespace: true,
            adjacent_value_allowed_at: usize::MAX,
            stream_ended: false,
        }
    }

    /// Get the current position in the input stream.
    #[inline]
    #[must_use]
    pub fn mark(&self) -> Marker {
        self.mark
    }

    /// Return whether the `StreamEnd` token has been emitted.
    #[inline]
    #[must_use]
    pub fn stream_ended(&self) -> bool {
        self.stream_ended
    }

    /// Return the next token in the stream.
    ///
    /// After the end of the input has been reached, every subsequent call
    /// returns [`TokenKind::StreamEnd`] again.
    ///
    /// # Errors
    /// Returns `ScanError` when the input violates YAML syntax. Any error is
    /// fatal for the current document; the scanner must not be used further.
    pub fn next_token(&mut self) -> Result<Token, ScanError> {
        self.skip_to_next_token()?;

        let start = self.mark;
        let kind = self.dispatch()?;
        debug_print!("  \u{21B3} {:?} {:?}", kind, start);
        Ok(Token {
            span: Span::new(start, self.mark),
            kind,
        })
    }

    /// Scan one token, the cursor sitting on its first byte.
    fn dispatch(&mut self) -> Result<TokenKind, ScanError> {
        let Some(b) = self.peek() else {
            self.stream_ended = true;
            return Ok(TokenKind::StreamEnd);
        };

        match b {
            b'%' => {
                if self.mark.col == 0 {
                    self.scan_directive()
                } else {
                    Err(self.error_here("directives must not appear in the middle of a line"))
                }
            }
            b'-' if self.mark.col == 0 && self.next_is_document_marker(b"---") => {
                if self.flow_level > 0 {
                    return Err(
                        self.error_here("a document start marker must not appear in a flow context")
                    );
                }
                self.skip_ascii(3);
                Ok(TokenKind::DocumentStart)
            }
            b'.' if self.mark.col == 0 && self.next_is_document_marker(b"...") => {
                if self.flow_level > 0 {
                    return Err(
                        self.error_here("a document end marker must not appear in a flow context")
                    );
                }
                self.skip_ascii(3);
                Ok(TokenKind::DocumentEnd)
            }
            b'-' if self.peek_nth(1).map_or(true, is_blank_or_break) => {
                self.skip_ascii(1);
                Ok(TokenKind::BlockEntry)
            }
            b'[' => {
                self.flow_level += 1;
                self.skip_ascii(1);
                Ok(TokenKind::FlowSequenceStart)
            }
            b']' => {
                if self.flow_level == 0 {
                    return Err(self.error_here("An invalid flow sequence ending."));
                }
                self.flow_level -= 1;
                self.skip_ascii(1);
                self.adjacent_value_allowed_at = self.mark.index;
                Ok(TokenKind::FlowSequenceEnd)
            }
            b'{' => {
                self.flow_level += 1;
                self.skip_ascii(1);
                Ok(TokenKind::FlowMappingStart)
            }
            b'}' => {
                if self.flow_level == 0 {
                    return Err(self.error_here("An invalid flow mapping ending."));
                }
                self.flow_level -= 1;
                self.skip_ascii(1);
                self.adjacent_value_allowed_at = self.mark.index;
                Ok(TokenKind::FlowMappingEnd)
            }
            b',' => {
                self.skip_ascii(1);
                Ok(TokenKind::FlowEntry)
            }
            b'?' if self.peek_nth(1) == Some(b' ') => {
                self.skip_ascii(1);
                Ok(TokenKind::Key)
            }
            b':' if self.peek_nth(1).map_or(true, is_blank_or_break)
                || (self.flow_level > 0
                    && (self.peek_nth(1).is_some_and(is_flow)
                        || self.mark.index == self.adjacent_value_allowed_at)) =>
            {
                self.skip_ascii(1);
                Ok(TokenKind::Value)
            }
            b'&' => self.scan_anchor(false),
            b'*' => self.scan_anchor(true),
            b'!' => self.scan_tag(),
            b'@' => Err(self.error_here(
                "Any token cannot start with at(@). It is a reserved indicator for YAML.",
            )),
            b'`' => Err(self.error_here(
                "Any token cannot start with grave accent(`). It is a reserved indicator for YAML.",
            )),
            b'"' => self.scan_double_quoted(),
            b'\'' => self.scan_single_quoted(),
            b'|' if self.flow_level == 0 => self.scan_block_scalar(true),
            b'>' if self.flow_level == 0 => self.scan_block_scalar(false),
            _ => self.scan_plain(),
        }
    }

    // ------------------------------------------------------------------
    // Cursor primitives.

    /// Return the byte under the cursor, if any.
    #[inline]
    fn peek(&self) -> Option<u8> {
        self.text.as_bytes().get(self.mark.index).copied()
    }

    /// Return the `n`-th byte after the cursor, if any.
    #[inline]
    fn peek_nth(&self, n: usize) -> Option<u8> {
        self.text.as_bytes().get(self.mark.index + n).copied()
    }

    /// Consume `n` ASCII bytes. None of them may be a line feed.
    #[inline]
    fn skip_ascii(&mut self, n: usize) {
        self.mark.index += n;
        self.mark.col += n;
        self.leading_whitespace = false;
    }

    /// Consume one blank without clearing the leading-whitespace flag.
    #[inline]
    fn skip_blank(&mut self) {
        self.mark.index += 1;
        self.mark.col += 1;
    }

    /// Consume a line feed.
    #[inline]
    fn skip_nl(&mut self) {
        self.mark.index += 1;
        self.mark.col = 0;
        self.mark.line += 1;
        self.leading_whitespace = true;
    }

    /// Consume one character of any width, appending it to `out`.
    fn read_char(&mut self, out: &mut String) {
        let len = utf8_len(self.text.as_bytes()[self.mark.index]);
        out.push_str(&self.text[self.mark.index..self.mark.index + len]);
        self.mark.index += len;
        self.mark.col += len;
        self.leading_whitespace = false;
    }

    /// Whether the next 3 bytes form the given document marker, at a token boundary.
    fn next_is_document_marker(&self, marker: &[u8; 3]) -> bool {
        let bytes = self.text.as_bytes();
        bytes[self.mark.index..].starts_with(marker)
            && self.peek_nth(3).map_or(true, is_blank_or_break)
    }

    /// Build an error of kind [`ScanErrorKind::Parse`] at the cursor.
    fn error_here(&self, info: &str) -> ScanError {
        ScanError::new_str(ScanErrorKind::Parse, self.mark, info)
    }

    // ------------------------------------------------------------------
    // Whitespace and comments.

    /// Skip over all insignificant whitespace, line breaks and comments.
    ///
    /// # Errors
    /// This function returns an error if a tabulation is used where
    /// indentation is expected.
    fn skip_to_next_token(&mut self) -> ScanResult {
        loop {
            match self.peek() {
                Some(b'\t')
                    if self.flow_level == 0 && self.leading_whitespace =>
                {
                    // Tabs may pad a blank or comment-only line but must not
                    // indent content.
                    let tab_mark = self.mark;
                    while self.peek().is_some_and(is_blank) {
                        self.skip_blank();
                    }
                    if !self.peek().map_or(true, |b| is_break(b) || b == b'#') {
                        return Err(ScanError::new_str(
                            ScanErrorKind::Parse,
                            tab_mark,
                            "tab characters must not be used as indentation",
                        ));
                    }
                }
                Some(b' ' | b'\t') => self.skip_blank(),
                Some(b'\n') => self.skip_nl(),
                Some(b'#') => {
                    while self.peek().is_some_and(|b| !is_break(b)) {
                        let len = utf8_len(self.text.as_bytes()[self.mark.index]);
                        self.mark.index += len;
                        self.mark.col += len;
                    }
                }
                _ => break,
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Directives.

    /// Scan a `%` directive, the cursor sitting on the `%`.
    fn scan_directive(&mut self) -> Result<TokenKind, ScanError> {
        self.skip_ascii(1);

        let start = self.mark.index;
        while self.peek().is_some_and(|b| !is_blank_or_break(b)) {
            self.skip_ascii(1);
        }
        let name = &self.text[start..self.mark.index];

        match name {
            "YAML" => {
                if !self.peek().is_some_and(is_blank) {
                    return Err(self.error_here(
                        "There must be at least one white space between \"%YAML\" and a version number.",
                    ));
                }
                self.skip_blanks();
                self.scan_version_directive()
            }
            "TAG" => {
                if !self.peek().is_some_and(is_blank) {
                    return Err(self.error_here(
                        "There must be at least one white space between \"%TAG\" and tag info.",
                    ));
                }
                self.skip_blanks();
                self.scan_tag_directive()
            }
            _ => {
                self.skip_until_line_end();
                Ok(TokenKind::InvalidDirective)
            }
        }
    }

    /// Scan the version operand of a `%YAML` directive.
    fn scan_version_directive(&mut self) -> Result<TokenKind, ScanError> {
        if self.peek() != Some(b'1') {
            return Err(self.error_here("Invalid YAML major version found."));
        }
        self.skip_ascii(1);
        if self.peek() != Some(b'.') {
            return Err(self.error_here("A period must be followed after the YAML major version."));
        }
        self.skip_ascii(1);
        let version = match self.peek() {
            Some(b'1') => YamlVersion::V1_1,
            Some(b'2') => YamlVersion::V1_2,
            Some(b'0' | b'3'..=b'9') => {
                return Err(self.error_here("Unsupported YAML version."));
            }
            _ => {
                return Err(
                    self.error_here("YAML version must be specified with digits and periods.")
                );
            }
        };
        self.skip_ascii(1);
        if !self.peek().map_or(true, is_blank_or_break) {
            return Err(self.error_here("Only YAML version 1.1/1.2 are supported."));
        }
        Ok(TokenKind::VersionDirective(version))
    }

    /// Scan the handle and prefix operands of a `%TAG` directive.
    fn scan_tag_directive(&mut self) -> Result<TokenKind, ScanError> {
        if self.peek() != Some(b'!') {
            return Err(self.error_here("Tag handle must start with '!'."));
        }
        let mut handle = String::from("!");
        self.skip_ascii(1);

        match self.peek() {
            Some(b' ' | b'\t') => {} // primary handle (!)
            Some(b'!') => {
                self.skip_ascii(1);
                if !self.peek().is_some_and(is_blank) {
                    return Err(self.error_here("invalid tag handle is found."));
                }
                handle.push('!');
            }
            _ => {
                // named handle (!name!)
                loop {
                    match self.peek() {
                        Some(b'!') => {
                            self.skip_ascii(1);
                            if !self.peek().is_some_and(is_blank) {
                                return Err(self.error_here("invalid tag handle is found."));
                            }
                            handle.push('!');
                            break;
                        }
                        Some(b) if is_word_char(b) => {
                            handle.push(b as char);
                            self.skip_ascii(1);
                        }
                        Some(b' ' | b'\t') | None => {
                            return Err(self.error_here("invalid tag handle is found."));
                        }
                        Some(_) => {
                            return Err(self.error_here(
                                "named handle can contain only numbers(0-9), alphabets(A-Z,a-z) and hyphens(-).",
                            ));
                        }
                    }
                }
            }
        }

        self.skip_blanks();

        let mut prefix = String::new();
        match self.peek() {
            Some(b',' | b'[' | b']' | b'{' | b'}') => {
                return Err(
                    self.error_here("tag prefix must not start with flow indicators (',', [], {}).")
                );
            }
            None | Some(b'\n') => {
                return Err(self.error_here("invalid TAG directive is found."));
            }
            _ => {}
        }
        while self.peek().is_some_and(|b| !is_blank_or_break(b)) {
            self.read_char(&mut prefix);
        }

        if !is_valid_uri(prefix.strip_prefix('!').unwrap_or(&prefix)) {
            return Err(self.error_here("invalid URI character is found in a tag prefix."));
        }

        Ok(TokenKind::TagDirective { handle, prefix })
    }

    /// Skip blanks (spaces and tabs).
    fn skip_blanks(&mut self) {
        while self.peek().is_some_and(is_blank) {
            self.skip_blank();
        }
    }

    /// Skip the rest of the current line, consuming the terminating line feed.
    fn skip_until_line_end(&mut self) {
        while let Some(b) = self.peek() {
            if is_break(b) {
                self.skip_nl();
                break;
            }
            let len = utf8_len(b);
            self.mark.index += len;
            self.mark.col += len;
        }
    }

    // ------------------------------------------------------------------
    // Anchors, aliases and tags.

    /// Scan an anchor or alias name, the cursor sitting on the `&` or `*`.
    fn scan_anchor(&mut self, alias: bool) -> Result<TokenKind, ScanError> {
        self.skip_ascii(1);

        let mut name = String::new();
        loop {
            match self.peek() {
                None => break,
                Some(b) if is_blank_or_break(b) || is_flow(b) => break,
                // A colon ends the name when it is itself a key separator.
                Some(b':') if self.peek_nth(1).map_or(true, is_blank_or_break) => break,
                Some(_) => self.read_char(&mut name),
            }
        }

        if name.is_empty() {
            return Err(self.error_here("anchor name must not be empty."));
        }

        Ok(if alias {
            TokenKind::Alias(name)
        } else {
            TokenKind::Anchor(name)
        })
    }

    /// Scan a tag property, the cursor sitting on the `!`.
    ///
    /// The returned token carries the tag exactly as written; handle
    /// expansion is the consumer's business since it needs the document's
    /// directives.
    fn scan_tag(&mut self) -> Result<TokenKind, ScanError> {
        let mut text = String::from("!");
        self.skip_ascii(1);

        match self.peek() {
            // Just "!" is a non-specific tag.
            None => return Ok(TokenKind::Tag(text)),
            Some(b) if is_blank_or_break(b) => return Ok(TokenKind::Tag(text)),
            Some(b'<') => return self.scan_verbatim_tag(),
            Some(b'!') => {
                // Secondary handle (!!suffix).
                text.push('!');
                self.skip_ascii(1);
            }
            Some(_) => {}
        }

        // Either a local tag (!suffix) or a named handle (!tag!suffix).
        let mut seen_second_bang = text.len() == 2;
        while let Some(b) = self.peek() {
            if is_blank_or_break(b) {
                break;
            }
            // A flow indicator ends the tag inside a flow container
            // (`[!!str, a]`); it is never part of a shorthand suffix.
            if self.flow_level > 0 && is_flow(b) {
                break;
            }
            if b == b'!' {
                if seen_second_bang {
                    return Err(self.error_here("invalid tag prefix (!) is found."));
                }
                seen_second_bang = true;
            }
            self.read_char(&mut text);
        }

        if let Some(handle_end) = text.rfind('!').filter(|&p| p > 0) {
            let suffix = &text[handle_end + 1..];
            if suffix.is_empty() {
                return Err(self.error_here("named handle has no suffix."));
            }
            if !is_valid_tag_suffix(suffix) {
                return Err(self.error_here("Invalid URI character is found in a named tag handle."));
            }
        } else if !is_valid_tag_suffix(&text[1..]) {
            return Err(self.error_here("invalid URI character is found in a tag suffix."));
        }

        Ok(TokenKind::Tag(text))
    }

    /// Scan a verbatim tag (`!<URI>`), the cursor sitting on the `<`.
    fn scan_verbatim_tag(&mut self) -> Result<TokenKind, ScanError> {
        let mut text = String::from("!<");
        self.skip_ascii(1);

        while let Some(b) = self.peek() {
            if is_blank_or_break(b) {
                break;
            }
            self.read_char(&mut text);
            if b == b'>' {
                break;
            }
        }

        if !text.ends_with('>') {
            return Err(self.error_here("verbatim tag (!<TAG>) must be ended with '>'."));
        }
        let uri = &text[2..text.len() - 1];
        if uri.is_empty() {
            return Err(self.error_here("verbatim tag(!<TAG>) must not be empty."));
        }
        if !is_valid_uri(uri) {
            return Err(self.error_here("invalid URI character is found in a verbatim tag."));
        }

        Ok(TokenKind::Tag(text))
    }

    // ------------------------------------------------------------------
    // Plain scalars.

    /// Scan a plain (unquoted) scalar and classify it.
    ///
    /// Plain scalars never span lines. The scan ends at a newline, at a `: `
    /// key separator, at a `#` preceded by whitespace, or at a flow
    /// indicator when inside a flow container. Trailing whitespace is
    /// trimmed.
    fn scan_plain(&mut self) -> Result<TokenKind, ScanError> {
        let mut text = String::new();
        let mut pending_blanks = String::new();

        while let Some(b) = self.peek() {
            match b {
                b'\n' => break,
                b':' if self.peek_nth(1).map_or(true, is_blank_or_break)
                    || (self.flow_level > 0 && self.peek_nth(1).is_some_and(is_flow)) =>
                {
                    break
                }
                _ if self.flow_level > 0 && is_flow(b) => break,
                b' ' | b'\t' => {
                    pending_blanks.push(b as char);
                    self.skip_blank();
                }
                b'#' if !pending_blanks.is_empty() => break,
                _ if b < 0x20 => return Err(self.control_char_error(b)),
                _ => {
                    if !pending_blanks.is_empty() {
                        text.push_str(&pending_blanks);
                        pending_blanks.clear();
                    }
                    self.read_char(&mut text);
                }
            }
        }

        let value = self.classify_plain(&text)?;
        Ok(TokenKind::Scalar(ScalarToken {
            style: ScalarStyle::Plain,
            text,
            value,
        }))
    }

    /// Give a plain scalar its typed interpretation under the core schema.
    fn classify_plain(&self, text: &str) -> Result<ScalarValue, ScanError> {
        match text {
            "~" | "null" | "Null" | "NULL" => return Ok(ScalarValue::Null),
            "true" | "True" | "TRUE" => return Ok(ScalarValue::Boolean(true)),
            "false" | "False" | "FALSE" => return Ok(ScalarValue::Boolean(false)),
            ".inf" | ".Inf" | ".INF" | "+.inf" | "+.Inf" | "+.INF" => {
                return Ok(ScalarValue::FloatingPoint(f64::INFINITY));
            }
            "-.inf" | "-.Inf" | "-.INF" => {
                return Ok(ScalarValue::FloatingPoint(f64::NEG_INFINITY));
            }
            ".nan" | ".NaN" | ".NAN" => return Ok(ScalarValue::FloatingPoint(f64::NAN)),
            _ => {}
        }

        let bytes = text.as_bytes();
        if let Some(number) = text.strip_prefix("0x") {
            if !number.is_empty() && number.bytes().all(is_hex) {
                return match i64::from_str_radix(number, 16) {
                    Ok(i) => Ok(ScalarValue::Integer(i)),
                    Err(_) => Err(self.out_of_range_error(text)),
                };
            }
        } else if let Some(number) = text.strip_prefix("0o") {
            if !number.is_empty() && number.bytes().all(|b| (b'0'..=b'7').contains(&b)) {
                return match i64::from_str_radix(number, 8) {
                    Ok(i) => Ok(ScalarValue::Integer(i)),
                    Err(_) => Err(self.out_of_range_error(text)),
                };
            }
        } else if is_integer_shaped(bytes) {
            return match text.parse::<i64>() {
                Ok(i) => Ok(ScalarValue::Integer(i)),
                Err(_) => Err(self.out_of_range_error(text)),
            };
        } else if is_float_shaped(bytes) {
            if let Ok(f) = text.parse::<f64>() {
                return Ok(ScalarValue::FloatingPoint(f));
            }
        }

        Ok(ScalarValue::String)
    }

    /// Build the error for an integer literal that does not fit an `i64`.
    fn out_of_range_error(&self, text: &str) -> ScanError {
        ScanError::new(
            ScanErrorKind::OutOfRange,
            self.mark,
            format!("integer value out of range of 64-bit signed integers: {text}"),
        )
    }

    // ------------------------------------------------------------------
    // Quoted scalars.

    /// Scan a single-quoted scalar, the cursor sitting on the opening quote.
    fn scan_single_quoted(&mut self) -> Result<TokenKind, ScanError> {
        self.skip_ascii(1);
        let mut text = String::new();

        loop {
            match self.peek() {
                None => {
                    return Err(self.error_here(
                        "Invalid end of input buffer in a single-quoted string token.",
                    ));
                }
                Some(b'\'') => {
                    if self.peek_nth(1) == Some(b'\'') {
                        // '' is an escaped single quote.
                        text.push('\'');
                        self.skip_ascii(2);
                    } else {
                        self.skip_ascii(1);
                        break;
                    }
                }
                Some(b'\n') => self.fold_quoted_break(&mut text),
                Some(b'\t') => self.read_char(&mut text),
                Some(b) if b < 0x20 => return Err(self.control_char_error(b)),
                Some(_) => self.read_char(&mut text),
            }
        }

        if self.flow_level > 0 {
            self.adjacent_value_allowed_at = self.mark.index;
        }
        Ok(TokenKind::Scalar(ScalarToken {
            style: ScalarStyle::SingleQuoted,
            text,
            value: ScalarValue::String,
        }))
    }

    /// Scan a double-quoted scalar, the cursor sitting on the opening quote.
    fn scan_double_quoted(&mut self) -> Result<TokenKind, ScanError> {
        self.skip_ascii(1);
        let mut text = String::new();

        loop {
            match self.peek() {
                None => {
                    return Err(self.error_here(
                        "Invalid end of input buffer in a double-quoted string token.",
                    ));
                }
                Some(b'"') => {
                    self.skip_ascii(1);
                    break;
                }
                Some(b'\n') => self.fold_quoted_break(&mut text),
                Some(b'\\') => {
                    if self.peek_nth(1) == Some(b'\n') {
                        // An escaped line break suppresses the fold.
                        self.skip_ascii(1);
                        self.skip_nl();
                        while self.peek().is_some_and(is_blank) {
                            self.skip_blank();
                        }
                    } else {
                        self.scan_escape_sequence(&mut text)?;
                    }
                }
                Some(b'\t') => self.read_char(&mut text),
                Some(b) if b < 0x20 => return Err(self.control_char_error(b)),
                Some(_) => self.read_char(&mut text),
            }
        }

        if self.flow_level > 0 {
            self.adjacent_value_allowed_at = self.mark.index;
        }
        Ok(TokenKind::Scalar(ScalarToken {
            style: ScalarStyle::DoubleQuoted,
            text,
            value: ScalarValue::String,
        }))
    }

    /// Fold a line break inside a quoted scalar.
    ///
    /// A single break becomes a space, blank lines are preserved as
    /// newlines, and whitespace around the fold is trimmed.
    fn fold_quoted_break(&mut self, text: &mut String) {
        while text.ends_with(' ') || text.ends_with('\t') {
            text.pop();
        }
        self.skip_nl();

        let mut extra_breaks = 0;
        loop {
            match self.peek() {
                Some(b' ' | b'\t') => self.skip_blank(),
                Some(b'\n') => {
                    extra_breaks += 1;
                    self.skip_nl();
                }
                _ => break,
            }
        }

        if extra_breaks == 0 {
            text.push(' ');
        } else {
            for _ in 0..extra_breaks {
                text.push('\n');
            }
        }
    }

    /// Scan one escape sequence, the cursor sitting on the backslash.
    ///
    /// See the escaped characters section of the YAML specification for the
    /// recognized sequences.
    fn scan_escape_sequence(&mut self, text: &mut String) -> ScanResult {
        self.skip_ascii(1);
        let Some(b) = self.peek() else {
            return Err(
                self.error_here("Invalid end of input buffer in a double-quoted string token.")
            );
        };

        let simple = match b {
            b'0' => Some('\0'),
            b'a' => Some('\u{07}'),
            b'b' => Some('\u{08}'),
            b't' => Some('\t'),
            b'n' => Some('\n'),
            b'v' => Some('\u{0B}'),
            b'f' => Some('\u{0C}'),
            b'r' => Some('\r'),
            b'e' => Some('\u{1B}'),
            b' ' => Some(' '),
            b'"' => Some('"'),
            b'/' => Some('/'),
            b'\\' => Some('\\'),
            b'N' => Some('\u{85}'),
            b'_' => Some('\u{A0}'),
            b'L' => Some('\u{2028}'),
            b'P' => Some('\u{2029}'),
            _ => None,
        };
        if let Some(c) = simple {
            text.push(c);
            self.skip_ascii(1);
            return Ok(());
        }

        let digits = match b {
            b'x' => 2,
            b'u' => 4,
            b'U' => 8,
            _ => {
                return Err(self.error_here("Unsupported escape sequence is found in a string token."));
            }
        };
        self.skip_ascii(1);

        let mut code_point: u32 = 0;
        for _ in 0..digits {
            let Some(d) = self.peek().filter(|&d| is_hex(d)) else {
                return Err(self.error_here("Non-hexadecimal character has been given."));
            };
            code_point = (code_point << 4) | as_hex(d);
            self.skip_ascii(1);
        }

        match char::from_u32(code_point) {
            Some(c) => {
                text.push(c);
                Ok(())
            }
            None => Err(ScanError::new(
                ScanErrorKind::Parse,
                self.mark,
                format!("an invalid Unicode code point U+{code_point:X} is found in an escape sequence"),
            )),
        }
    }

    /// Build the error for an unescaped control character in a scalar.
    fn control_char_error(&self, b: u8) -> ScanError {
        let info = match b {
            0x00 => "Control character U+0000 (NUL) must be escaped to \\0 or \\u0000.",
            0x01 => "Control character U+0001 (SOH) must be escaped to \\u0001.",
            0x02 => "Control character U+0002 (STX) must be escaped to \\u0002.",
            0x03 => "Control character U+0003 (ETX) must be escaped to \\u0003.",
            0x04 => "Control character U+0004 (EOT) must be escaped to \\u0004.",
            0x05 => "Control character U+0005 (ENQ) must be escaped to \\u0005.",
            0x06 => "Control character U+0006 (ACK) must be escaped to \\u0006.",
            0x07 => "Control character U+0007 (BEL) must be escaped to \\a or \\u0007.",
            0x08 => "Control character U+0008 (BS) must be escaped to \\b or \\u0008.",
            0x0B => "Control character U+000B (VT) must be escaped to \\v or \\u000B.",
            0x0C => "Control character U+000C (FF) must be escaped to \\f or \\u000C.",
            0x0E => "Control character U+000E (SO) must be escaped to \\u000E.",
            0x0F => "Control character U+000F (SI) must be escaped to \\u000F.",
            0x10 => "Control character U+0010 (DLE) must be escaped to \\u0010.",
            0x11 => "Control character U+0011 (DC1) must be escaped to \\u0011.",
            0x12 => "Control character U+0012 (DC2) must be escaped to \\u0012.",
            0x13 => "Control character U+0013 (DC3) must be escaped to \\u0013.",
            0x14 => "Control character U+0014 (DC4) must be escaped to \\u0014.",
            0x15 => "Control character U+0015 (NAK) must be escaped to \\u0015.",
            0x16 => "Control character U+0016 (SYN) must be escaped to \\u0016.",
            0x17 => "Control character U+0017 (ETB) must be escaped to \\u0017.",
            0x18 => "Control character U+0018 (CAN) must be escaped to \\u0018.",
            0x19 => "Control character U+0019 (EM) must be escaped to \\u0019.",
            0x1A => "Control character U+001A (SUB) must be escaped to \\u001A.",
            0x1B => "Control character U+001B (ESC) must be escaped to \\e or \\u001B.",
            0x1C => "Control character U+001C (FS) must be escaped to \\u001C.",
            0x1D => "Control character U+001D (GS) must be escaped to \\u001D.",
            0x1E => "Control character U+001E (RS) must be escaped to \\u001E.",
            0x1F => "Control character U+001F (US) must be escaped to \\u001F.",
            _ => unreachable!("not a bare control character"),
        };
        self.error_here(info)
    }

    // ------------------------------------------------------------------
    // Block scalars.

    /// Scan a block scalar, the cursor sitting on the `|` or `>`.
    fn scan_block_scalar(&mut self, literal: bool) -> Result<TokenKind, ScanError> {
        self.skip_ascii(1);

        // Header: chomping indicator and explicit indentation width, in
        // either order, at most one of each.
        let mut chomping = None;
        let mut explicit_indent: Option<usize> = None;
        loop {
            match self.peek() {
                Some(b'-') if chomping.is_none() => {
                    chomping = Some(Chomping::Strip);
                    self.skip_ascii(1);
                }
                Some(b'+') if chomping.is_none() => {
                    chomping = Some(Chomping::Keep);
                    self.skip_ascii(1);
                }
                Some(b'0') if explicit_indent.is_none() => {
                    return Err(self.error_here(
                        "An indentation level for a block style scalar cannot be '0'",
                    ));
                }
                Some(b @ b'1'..=b'9') if explicit_indent.is_none() => {
                    explicit_indent = Some(usize::from(b - b'0'));
                    self.skip_ascii(1);
                }
                _ => break,
            }
        }
        let chomping = chomping.unwrap_or(Chomping::Clip);

        // The rest of the header line may hold blanks and a comment.
        self.skip_until_line_end();

        let text = self.scan_block_scalar_content(literal, chomping, explicit_indent)?;
        Ok(TokenKind::Scalar(ScalarToken {
            style: if literal {
                ScalarStyle::Literal
            } else {
                ScalarStyle::Folded
            },
            text,
            value: ScalarValue::String,
        }))
    }

    /// Scan the content lines of a block scalar.
    fn scan_block_scalar_content(
        &mut self,
        literal: bool,
        chomping: Chomping,
        explicit_indent: Option<usize>,
    ) -> Result<String, ScanError> {
        let mut text = String::new();
        let mut indent = explicit_indent.unwrap_or(0);
        let mut seen_content = false;
        let mut prev_extra = false;
        // Line breaks since the last content line; before the first content
        // line this counts the leading blank lines.
        let mut breaks = 0usize;

        loop {
            if self.peek().is_none() {
                break;
            }

            // Measure the leading spaces of this line without consuming.
            let bytes = self.text.as_bytes();
            let mut n = 0;
            while bytes.get(self.mark.index + n) == Some(&b' ') {
                n += 1;
            }
            match bytes.get(self.mark.index + n) {
                // A line of spaces only belongs to the block whatever its width.
                Some(b'\n') => {
                    self.mark.index += n + 1;
                    self.mark.col = 0;
                    self.mark.line += 1;
                    breaks += 1;
                    continue;
                }
                None => {
                    self.mark.index += n;
                    self.mark.col += n;
                    break;
                }
                Some(_) => {}
            }

            if !seen_content {
                if let Some(required) = explicit_indent {
                    if n < required {
                        // The block held nothing but blank lines; the next
                        // token starts here.
                        if n == 0 && breaks > 0 {
                            break;
                        }
                        return Err(self.error_here(
                            "A block style scalar is less indented than the indicated level.",
                        ));
                    }
                } else {
                    indent = n;
                }
            } else if n < indent {
                // Less indented content ends the block.
                break;
            }

            // Consume the indentation; the rest of the line, including any
            // extra indentation, is content.
            self.mark.index += indent.min(n);
            self.mark.col += indent.min(n);
            let extra = n > indent;

            let line_start = self.mark.index;
            while self.peek().is_some_and(|b| !is_break(b)) {
                let len = utf8_len(bytes[self.mark.index]);
                self.mark.index += len;
                self.mark.col += len;
            }
            let line = &self.text[line_start..self.mark.index];

            if seen_content {
                if literal {
                    for _ in 0..breaks {
                        text.push('\n');
                    }
                } else if breaks == 1 && !prev_extra && !extra {
                    text.push(' ');
                } else {
                    let folded = if prev_extra || extra { breaks } else { breaks - 1 };
                    for _ in 0..folded {
                        text.push('\n');
                    }
                }
            } else {
                // Leading blank lines are preserved as line feeds.
                for _ in 0..breaks {
                    text.push('\n');
                }
                if !literal && extra {
                    // A first line more indented than the indicated level
                    // keeps its extra indent behind a line feed.
                    text.push('\n');
                }
            }
            text.push_str(line);
            seen_content = true;
            prev_extra = extra;
            breaks = 0;

            if self.peek() == Some(b'\n') {
                self.skip_nl();
                breaks = 1;
            }
        }

        if !seen_content {
            // Only blank lines: strip and clip yield an empty scalar.
            return Ok(match chomping {
                Chomping::Keep => "\n".repeat(breaks),
                Chomping::Strip | Chomping::Clip => String::new(),
            });
        }

        match chomping {
            Chomping::Strip => {}
            Chomping::Clip => {
                if breaks > 0 {
                    text.push('\n');
                }
            }
            Chomping::Keep => {
                for _ in 0..breaks {
                    text.push('\n');
                }
            }
        }
        Ok(text)
    }
}

/// The width of the UTF-8 sequence introduced by this byte.
#[inline]
fn utf8_len(b: u8) -> usize {
    match b {
        0x00..=0x7F => 1,
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        _ => 4,
    }
}

/// Whether the bytes form a signed decimal integer literal.
fn is_integer_shaped(bytes: &[u8]) -> bool {
    let digits = match bytes.first() {
        Some(b'-' | b'+') => &bytes[1..],
        _ => bytes,
    };
    !digits.is_empty() && digits.iter().copied().all(is_digit)
}

/// Whether the bytes form a decimal float literal: an optional sign, digits,
/// an optional fraction and an optional exponent, with at least one of the
/// fraction or exponent present.
fn is_float_shaped(bytes: &[u8]) -> bool {
    let mut rest = match bytes.first() {
        Some(b'-' | b'+') => &bytes[1..],
        _ => bytes,
    };
    let digits = rest.iter().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        return false;
    }
    rest = &rest[digits..];

    let mut saw_fraction_or_exponent = false;
    if rest.first() == Some(&b'.') {
        saw_fraction_or_exponent = true;
        rest = &rest[1..];
        let frac = rest.iter().take_while(|b| b.is_ascii_digit()).count();
        rest = &rest[frac..];
    }
    if let Some(b'e' | b'E') = rest.first() {
        saw_fraction_or_exponent = true;
        rest = &rest[1..];
        if let Some(b'-' | b'+') = rest.first() {
            rest = &rest[1..];
        }
        let exp = rest.iter().take_while(|b| b.is_ascii_digit()).count();
        if exp == 0 {
            return false;
        }
        rest = &rest[exp..];
    }
    rest.is_empty() && saw_fraction_or_exponent
}

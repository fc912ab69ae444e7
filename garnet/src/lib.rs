// Copyright 2015, Yuheng Chen.
// Copyright 2023, Ethiraric.
// See the LICENSE file at the top-level directory of this distribution.

//! A YAML 1.2 reader producing an owned, typed node tree.
//!
//! garnet ingests byte sequences in any common Unicode form and produces a
//! tree of typed scalar, sequence and mapping [`Node`]s. It accepts input as
//! strings, bytes (UTF-8/16/32, with or without BOM), UTF-16/UTF-32 code
//! units, character iterators and readers.
//!
//! # Usage
//!
//! This crate is [on github](https://github.com/garnet-rs/garnet) and can be
//! used by adding `garnet` to the dependencies in your project's
//! `Cargo.toml`.
//!
//! ```toml
//! [dependencies]
//! garnet = "0.1.0"
//! ```
//!
//! # Examples
//!
//! ```
//! let doc = garnet::parse("foo: [1, 2, 3]").unwrap();
//! assert_eq!(doc["foo"][0].as_integer().unwrap(), 1);
//!
//! let docs = garnet::parse_all("---\nfirst\n---\nsecond\n").unwrap();
//! assert_eq!(docs.len(), 2);
//! assert_eq!(docs[1].as_str().unwrap(), "second");
//! ```

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod loader;
mod node;
mod tag;

pub use crate::error::LoadError;
pub use crate::node::{Anchor, AnchorRole, Mapping, Node, NodeIter, NodeValue, Sequence};

// Re-export the scanner-level types that are part of our public API, so
// consumers can inspect errors and positions without naming the lower crate.
pub use garnet_scanner::{
    InputBuffer, Marker, ScalarStyle, ScanError, ScanErrorKind, Source, Span, YamlVersion,
};

/// Parse an input holding exactly one YAML document.
///
/// The `source` may be a string, a byte slice or vector in any common
/// Unicode encoding, a slice of UTF-16 or UTF-32 code units, or an already
/// normalized [`InputBuffer`]. Empty input parses to a null node.
///
/// # Examples
/// ```
/// let doc = garnet::parse("a: 1").unwrap();
/// assert_eq!(doc["a"].as_integer().unwrap(), 1);
/// ```
///
/// # Errors
/// Returns [`LoadError::Decode`] when the input is ill-formed in its
/// detected encoding, and [`LoadError::Parse`] when it violates YAML syntax
/// or holds more than one document.
pub fn parse<S: Source>(source: S) -> Result<Node, LoadError> {
    let mut docs = parse_all(source)?;
    single_document(&mut docs)
}

/// Parse an input holding any number of YAML documents.
///
/// Returns one node per document, in order. Empty input parses to a single
/// null document.
///
/// # Examples
/// ```
/// let docs = garnet::parse_all("---\nfoo: 1\n...\n---\nbar: 2\n").unwrap();
/// assert_eq!(docs[0]["foo"].as_integer().unwrap(), 1);
/// assert_eq!(docs[1]["bar"].as_integer().unwrap(), 2);
/// ```
///
/// # Errors
/// Returns [`LoadError::Decode`] when the input is ill-formed in its
/// detected encoding, and [`LoadError::Parse`] when any document violates
/// YAML syntax. An error in a latter document prevents the former from being
/// returned.
pub fn parse_all<S: Source>(source: S) -> Result<Vec<Node>, LoadError> {
    let buffer = source.into_buffer().map_err(LoadError::Decode)?;
    loader::load_documents(&buffer).map_err(|(document, e)| LoadError::Parse(document, e))
}

/// Parse a single YAML document from a reader (a file handle or any byte
/// stream).
///
/// The reader is consumed to its end up front; no further reads happen
/// during parsing.
///
/// # Errors
/// Returns [`LoadError::Io`] when reading fails, otherwise as [`parse`].
pub fn parse_reader<R: std::io::Read>(mut reader: R) -> Result<Node, LoadError> {
    let mut buffer = Vec::new();
    reader.read_to_end(&mut buffer)?;
    parse(buffer)
}

/// Parse any number of YAML documents from a reader.
///
/// # Errors
/// Returns [`LoadError::Io`] when reading fails, otherwise as [`parse_all`].
pub fn parse_all_reader<R: std::io::Read>(mut reader: R) -> Result<Vec<Node>, LoadError> {
    let mut buffer = Vec::new();
    reader.read_to_end(&mut buffer)?;
    parse_all(buffer)
}

/// Reduce a parsed document list to the single expected document.
fn single_document(docs: &mut Vec<Node>) -> Result<Node, LoadError> {
    match docs.len() {
        1 => Ok(docs.pop().expect("length checked")),
        n => Err(LoadError::Parse(
            1,
            ScanError::new(
                ScanErrorKind::Parse,
                Marker::default(),
                format!("expected a single document in the input, but found {n} documents"),
            ),
        )),
    }
}

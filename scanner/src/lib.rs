// Copyright 2015, Yuheng Chen.
// Copyright 2023, Ethiraric.
// See the LICENSE file at the top-level directory of this distribution.

//! Input adaption and lexical analysis for YAML 1.2 documents.
//!
//! **If you want to load YAML into a node tree, use `garnet` instead of
//! `garnet-scanner`. This crate contains only the low-level machinery.**
//!
//! This crate turns raw input (bytes in any common Unicode encoding, UTF-16
//! or UTF-32 code units, characters, or an `std::io::Read` stream) into a
//! normalized UTF-8 buffer, and scans that buffer into a stream of YAML
//! tokens. Scalar tokens carry both their textual content and their typed
//! interpretation (null, boolean, integer, float or string), so consumers do
//! not re-derive the core schema.
//!
//! # Features
//!
//! #### `debug_prints`
//! Enables debug prints in the scanner. Do not enable if you are consuming
//! the crate rather than working on it as this can significantly decrease
//! performance.

#![warn(missing_docs, clippy::pedantic)]

mod char_traits;
#[macro_use]
mod debug;
pub mod input;
mod scanner;

pub use crate::input::{InputBuffer, Source};
pub use crate::scanner::{
    Marker, ScalarStyle, ScalarToken, ScalarValue, ScanError, ScanErrorKind, Scanner, Span, Token,
    TokenKind, YamlVersion,
};

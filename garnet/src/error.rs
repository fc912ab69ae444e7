//! The error type returned by the parsing entry points.

use std::fmt;
use std::sync::Arc;

use garnet_scanner::{Marker, ScanError};

/// An error that happened when loading a YAML document.
#[derive(Debug, Clone)]
pub enum LoadError {
    /// An I/O error while reading the source.
    Io(Arc<std::io::Error>),
    /// The input is ill-formed in its detected Unicode encoding.
    Decode(ScanError),
    /// The input violates YAML syntax. The `usize` is the index of the
    /// document in which the error occurred.
    Parse(usize, ScanError),
}

impl LoadError {
    /// Return the position of the error in the source, when one exists.
    #[must_use]
    pub fn marker(&self) -> Option<&Marker> {
        match self {
            LoadError::Io(_) => None,
            LoadError::Decode(e) | LoadError::Parse(_, e) => Some(e.marker()),
        }
    }

    /// Return the index of the document the error occurred in.
    ///
    /// Encoding and I/O errors happen before any document is read and report
    /// document 0.
    #[must_use]
    pub fn document(&self) -> usize {
        match self {
            LoadError::Parse(document, _) => *document,
            LoadError::Io(_) | LoadError::Decode(_) => 0,
        }
    }
}

impl From<std::io::Error> for LoadError {
    fn from(error: std::io::Error) -> Self {
        LoadError::Io(Arc::new(error))
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(match &self {
            LoadError::Io(e) => e,
            LoadError::Decode(e) | LoadError::Parse(_, e) => e,
        })
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Io(e) => e.fmt(f),
            LoadError::Decode(e) => e.fmt(f),
            LoadError::Parse(document, e) => write!(f, "{e} in document {document}"),
        }
    }
}

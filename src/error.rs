//! Error types for editing-session operations.

use std::fmt;

/// Layer that must exist before an operation can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prerequisite {
    Base,
    Replacement,
    MaskContent,
}

impl fmt::Display for Prerequisite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prerequisite::Base => write!(f, "a base image"),
            Prerequisite::Replacement => write!(f, "a replacement image"),
            Prerequisite::MaskContent => write!(f, "a painted mask"),
        }
    }
}

/// Errors reported by the editor core. None of them is fatal: the layer set is
/// left in its last valid state whenever one is returned.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorError {
    /// Bytes are not a readable png/jpeg/gif/webp image.
    Decode(String),
    /// Operation attempted before the layer it depends on exists.
    Precedence(Prerequisite),
    /// Upload rejected by type or size constraints.
    Validation(String),
    /// No base image loaded yet.
    NotReady,
    /// Surface dimensions of zero.
    InvalidDimensions { width: u32, height: u32 },
    /// PNG encoding failed.
    Encode(String),
}

impl fmt::Display for EditorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditorError::Decode(msg) => write!(f, "could not decode image: {}", msg),
            EditorError::Precedence(req) => write!(f, "this operation requires {} first", req),
            EditorError::Validation(msg) => write!(f, "upload rejected: {}", msg),
            EditorError::NotReady => write!(f, "no base image loaded"),
            EditorError::InvalidDimensions { width, height } => {
                write!(f, "invalid surface size {}x{}", width, height)
            }
            EditorError::Encode(msg) => write!(f, "could not encode image: {}", msg),
        }
    }
}

impl std::error::Error for EditorError {}

pub type Result<T> = std::result::Result<T, EditorError>;

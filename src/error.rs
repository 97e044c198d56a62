//! # Error standards
//!
//! This module provides a standardised error enum and result type for this crate.

// -----------------------------------------------------------------------------------------------
// TYPES
// -----------------------------------------------------------------------------------------------

/// Standard result type used in the cost volume crate.
pub type Result<T> = std::result::Result<T, Error>;

// -----------------------------------------------------------------------------------------------
// ENUMERATIONS
// -----------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Image has no pixels ({width}x{height}, {bands} bands)")]
    EmptyImage {
        width: usize,
        height: usize,
        bands: usize
    },

    #[error("Image extents differ: {left_width}x{left_height} vs {right_width}x{right_height}")]
    ExtentMismatch {
        left_width: usize,
        left_height: usize,
        right_width: usize,
        right_height: usize
    },

    #[error("Band count mismatch: expected {expected}, found {found}")]
    BandMismatch {
        expected: usize,
        found: usize
    },

    #[error("Buffer of {len} values cannot hold a {width}x{height} image with {bands} bands")]
    BufferSize {
        len: usize,
        width: usize,
        height: usize,
        bands: usize
    },

    #[error("Invalid disparity range: minimum {min} is greater than maximum {max}")]
    InvalidRange {
        min: i32,
        max: i32
    },

    #[error("Invalid parameter `{name}`: {reason}")]
    InvalidParam {
        name: &'static str,
        reason: String
    },

    #[error("Could not read the parameter file")]
    Io(#[from] std::io::Error),

    #[error("Could not parse the parameter file")]
    Config(#[from] toml::de::Error)
}

impl Error {
    /// Shorthand for building an [`Error::InvalidParam`].
    pub(crate) fn param<S: Into<String>>(name: &'static str, reason: S) -> Self {
        Error::InvalidParam {
            name,
            reason: reason.into()
        }
    }
}

//! Error handling and custom error types
//!
//! Provides unified error handling across the media pipeline using thiserror.

use crate::models::VariantKind;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Failed to decode source image {path:?}: {message}")]
    Decode { path: PathBuf, message: String },

    #[error("Encoding error: {0}")]
    Encode(String),

    #[error("Invalid variant options: {0}")]
    InvalidOptions(String),

    #[error("Failed to generate {variant} variant: {source}")]
    Variant {
        variant: VariantKind,
        #[source]
        source: Box<Error>,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invariant violated: {0}")]
    Invariant(String),
}

impl Error {
    /// Wrap an error with the variant that was being generated when it occurred.
    pub fn in_variant(self, variant: VariantKind) -> Self {
        Error::Variant {
            variant,
            source: Box::new(self),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

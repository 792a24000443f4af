//! Media pipeline for the storefront - turns uploaded product and post images
//! into a fixed set of size-capped WebP variants.
//!
//! Each variant is resized to its profile's bounding box and re-encoded,
//! lowering quality and then scale until the file fits the byte budget.

pub mod app;
pub mod error;
pub mod image;
pub mod models;
pub mod policy;

pub use error::{Error, Result};

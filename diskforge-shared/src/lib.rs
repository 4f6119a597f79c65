//! diskforge shared - common types for the core library and its front-ends.
//!
//! This crate carries the error taxonomy and the constants that the image
//! lifecycle, the CLI and the sandbox side all have to agree on.

pub mod constants;
pub mod errors;

pub use errors::{ImageError, ImageResult};

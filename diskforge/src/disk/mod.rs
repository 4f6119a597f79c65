//! Backing image files.
//!
//! This module provides image file allocation:
//! - `allocate` - Create or resize a sparse image file to an exact size
//! - `ImageFile` - Handle describing an allocated image

mod image;

pub use image::{ImageFile, allocate};

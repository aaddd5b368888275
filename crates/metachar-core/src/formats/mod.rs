//! # Formats Module
//!
//! Text persistence for MetaChar sheets.
//!
//! - `tagged`: the angle-bracket markup reader and writer helpers
//! - `document`: whole-sheet documents built on top of it

pub mod document;
pub mod tagged;

pub use document::{Document, read_document, write_document};
pub use tagged::{Content, Element, parse_elements};

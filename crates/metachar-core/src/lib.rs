//! # metachar-core
//!
//! The stat graph engine for MetaChar character sheets - THE MODEL.
//!
//! A sheet is a set of nodes ("stats") grouped onto coloured pages. Some
//! nodes hold plain values, others are computed from the nodes they
//! reference: sums, ability modifiers and fractions.
//!
//! ## Architectural Constraints
//!
//! - The set of node kinds is closed and dispatched with `match`
//! - Node identity is an append-only registry index, never reused
//! - Values are computed on demand and never cached
//! - Integer arithmetic only, saturating on overflow
//! - No rendering, no screen state; a presentation layer reads
//!   `Sheet::published_text` and calls the mutation methods

// =============================================================================
// MODULES
// =============================================================================

pub mod edit;
pub mod engine;
pub mod formats;
pub mod primitives;
pub mod registry;
pub mod shared;
pub mod sheet;
pub mod template;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    ButtonLabel, FractionBody, MetaCharError, NodeBody, NodeId, NodeKind, Page, PageId, Rgb,
    StatNode, SumBody, sanitize_text,
};

// =============================================================================
// RE-EXPORTS: Engine and Sheet
// =============================================================================

pub use edit::{Decode, Field};
pub use engine::{Component, ValueEngine};
pub use registry::Registry;
pub use shared::SharedSheet;
pub use sheet::{Direction, Sheet};

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{Document, read_document, write_document};

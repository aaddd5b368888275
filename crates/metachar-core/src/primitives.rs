//! # Innate Primitives
//!
//! Hardcoded constants for the MetaChar core: document markers, factory
//! defaults and evaluation limits. They are compiled in and immutable at
//! runtime.

use std::num::NonZeroI64;

/// Version string written into the document header.
pub const FORMAT_VERSION: &str = "0.0";

/// Prefix of the document's first line, followed by the version string.
pub const HEADER_PREFIX: &str = "#MetaChar version ";

/// Section tag holding every node in registry order.
pub const REGISTRY_TAG: &str = "masterstatlist";

/// Section tag holding the pages.
pub const PAGES_TAG: &str = "MCpages";

/// Tag of a single page block.
pub const PAGE_TAG: &str = "BoxOfStats";

/// Literal written for an absent optional reference.
pub const NONE_LITERAL: &str = "None";

/// Boolean literals of the document format.
pub const TRUE_LITERAL: &str = "True";
pub const FALSE_LITERAL: &str = "False";

/// Share of the bar taken by a node's name button.
pub const DEFAULT_BUTTON_WIDTH: f64 = 0.5;

/// Width of a header bar's button, which spans the whole bar.
pub const WIDE_BUTTON_WIDTH: f64 = 1.0;

/// Background colour of a new page.
pub const DEFAULT_PAGE_COLOR: (f64, f64, f64) = (0.0, 0.5, 0.55);

/// Divisor of a newly created fraction.
pub const DEFAULT_DIVISOR: NonZeroI64 = nonzero(2);

/// Divisor used when an edited divisor is not a number.
pub const FALLBACK_DIVISOR: NonZeroI64 = nonzero(1);

/// Ability score that yields a modifier of zero.
pub const ABILITY_BASELINE: i64 = 10;

/// Score points per modifier step.
pub const ABILITY_STEP: i64 = 2;

/// Base score of the owned child a new ability bar starts with.
pub const ABILITY_BASE_SCORE: i64 = 10;

/// Description given to a new ability bar.
pub const ABILITY_DESCRIPTION: &str =
    "Ability score is listed first, followed by the roll modifier in parentheses.";

/// Name and description of the owned child a new ability bar starts with.
pub const BASE_SCORE_NAME: &str = "Base score";
pub const BASE_SCORE_DESCRIPTION: &str = "Score assigned at level 1 before racial modifiers";

/// Deepest element nesting the document reader accepts.
///
/// Sheet documents nest three levels; anything far deeper is corrupt.
pub const MAX_ELEMENT_DEPTH: usize = 32;

const fn nonzero(value: i64) -> NonZeroI64 {
    match NonZeroI64::new(value) {
        Some(v) => v,
        None => NonZeroI64::MIN,
    }
}

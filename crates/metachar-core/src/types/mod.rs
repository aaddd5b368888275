//! # Core Type Definitions
//!
//! This module contains all core types for the MetaChar stat graph:
//! - Identifiers (`NodeId`, `PageId`)
//! - The closed set of node kinds (`NodeKind`) and their bodies (`NodeBody`)
//! - The node itself (`StatNode`) and page grouping (`Page`, `Rgb`)
//! - Error types (`MetaCharError`)
//!
//! ## Reference Discipline
//!
//! Nodes never hold other nodes. Every cross reference is a `NodeId`, which
//! is a plain index into the owning `Registry`. A reference may outlive the
//! node it points at; the engine reads such a dangling reference as zero.

use crate::primitives::{DEFAULT_BUTTON_WIDTH, DEFAULT_DIVISOR, DEFAULT_PAGE_COLOR, WIDE_BUTTON_WIDTH};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroI64;
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Stable identity of a node: its creation index in the registry.
///
/// Indices are never reused or compacted while the registry lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub usize);

/// Position of a page in the sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PageId(pub usize);

// =============================================================================
// NODE KIND
// =============================================================================

/// The closed set of node kinds.
///
/// Each kind maps to exactly one tag in the document format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// A bare button with a name and description.
    Plain,
    /// A single integer value.
    Simple,
    /// Total of referenced and owned nodes.
    Sum,
    /// A sum whose value is the ability modifier of its total.
    Ability,
    /// Another node's value divided by a constant.
    Fraction,
    /// A button with free text next to it.
    Text,
    /// A value with increment, decrement and reset.
    Counter,
    /// A row of two buttons.
    TwoButtons,
    /// A row of three buttons.
    ThreeButtons,
}

impl NodeKind {
    /// Every kind, in tag-table order.
    pub const ALL: [Self; 9] = [
        Self::Plain,
        Self::Simple,
        Self::Sum,
        Self::Ability,
        Self::Fraction,
        Self::Text,
        Self::Counter,
        Self::TwoButtons,
        Self::ThreeButtons,
    ];

    /// The document tag for this kind.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Plain => "StatBar",
            Self::Simple => "StatBarSimple",
            Self::Sum => "StatBarSum",
            Self::Ability => "DDAbilityBar",
            Self::Fraction => "StatBarFraction",
            Self::Text => "StatBarText",
            Self::Counter => "StatBarCounter",
            Self::TwoButtons => "StatBarTwoButtons",
            Self::ThreeButtons => "StatBarThreeButtons",
        }
    }

    /// Short lowercase name used on the command line.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Plain => "bar",
            Self::Simple => "simple",
            Self::Sum => "sum",
            Self::Ability => "ability",
            Self::Fraction => "fraction",
            Self::Text => "text",
            Self::Counter => "counter",
            Self::TwoButtons => "two-buttons",
            Self::ThreeButtons => "three-buttons",
        }
    }

    /// Look up a kind by its document tag.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }

    /// Whether nodes of this kind carry a numeric value worth publishing.
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(
            self,
            Self::Simple | Self::Sum | Self::Ability | Self::Fraction | Self::Counter
        )
    }

    /// Whether nodes of this kind hold external references and owned children.
    #[must_use]
    pub const fn is_sum(self) -> bool {
        matches!(self, Self::Sum | Self::Ability)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for NodeKind {
    type Err = MetaCharError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.label() == s || kind.tag() == s)
            .ok_or_else(|| MetaCharError::UnknownNodeKind(s.to_string()))
    }
}

// =============================================================================
// NODE BODIES
// =============================================================================

/// Extra name/description pair of a multi-button bar.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonLabel {
    pub name: String,
    pub description: String,
}

impl ButtonLabel {
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Reference lists of a Sum or Ability node.
///
/// `external_refs` are weak: the referenced nodes live elsewhere.
/// `owned_children` belong to this node and are only created or removed
/// through the sheet, so they cannot be set from outside the crate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SumBody {
    pub external_refs: Vec<NodeId>,
    pub(crate) owned_children: Vec<NodeId>,
    pub signed: bool,
}

impl SumBody {
    #[must_use]
    pub fn new(external_refs: Vec<NodeId>) -> Self {
        Self {
            external_refs,
            owned_children: Vec::new(),
            signed: false,
        }
    }

    /// Nodes owned exclusively by this sum, in display order.
    #[must_use]
    pub fn owned_children(&self) -> &[NodeId] {
        &self.owned_children
    }

    /// External references followed by owned children.
    pub fn components(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.external_refs
            .iter()
            .chain(self.owned_children.iter())
            .copied()
    }
}

/// A node divided by a constant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FractionBody {
    pub dividend: Option<NodeId>,
    pub divisor: NonZeroI64,
    pub round_down: bool,
    pub signed: bool,
}

impl Default for FractionBody {
    fn default() -> Self {
        Self {
            dividend: None,
            divisor: DEFAULT_DIVISOR,
            round_down: true,
            signed: false,
        }
    }
}

/// Kind-specific payload of a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeBody {
    Plain,
    Simple { value: i64, signed: bool },
    Sum(SumBody),
    Ability(SumBody),
    Fraction(FractionBody),
    Text { text: String },
    Counter { default_value: i64, current_value: i64 },
    TwoButtons { second: ButtonLabel },
    ThreeButtons { second: ButtonLabel, third: ButtonLabel },
}

impl NodeBody {
    /// The empty body a freshly created node of `kind` starts with.
    #[must_use]
    pub fn default_for(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Plain => Self::Plain,
            NodeKind::Simple => Self::Simple {
                value: 0,
                signed: false,
            },
            NodeKind::Sum => Self::Sum(SumBody::default()),
            NodeKind::Ability => Self::Ability(SumBody::default()),
            NodeKind::Fraction => Self::Fraction(FractionBody::default()),
            NodeKind::Text => Self::Text {
                text: String::new(),
            },
            NodeKind::Counter => Self::Counter {
                default_value: 0,
                current_value: 0,
            },
            NodeKind::TwoButtons => Self::TwoButtons {
                second: ButtonLabel::default(),
            },
            NodeKind::ThreeButtons => Self::ThreeButtons {
                second: ButtonLabel::default(),
                third: ButtonLabel::default(),
            },
        }
    }

    #[must_use]
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Plain => NodeKind::Plain,
            Self::Simple { .. } => NodeKind::Simple,
            Self::Sum(_) => NodeKind::Sum,
            Self::Ability(_) => NodeKind::Ability,
            Self::Fraction(_) => NodeKind::Fraction,
            Self::Text { .. } => NodeKind::Text,
            Self::Counter { .. } => NodeKind::Counter,
            Self::TwoButtons { .. } => NodeKind::TwoButtons,
            Self::ThreeButtons { .. } => NodeKind::ThreeButtons,
        }
    }

    /// Reference lists, for Sum and Ability nodes.
    #[must_use]
    pub fn as_sum(&self) -> Option<&SumBody> {
        match self {
            Self::Sum(body) | Self::Ability(body) => Some(body),
            _ => None,
        }
    }

    pub(crate) fn as_sum_mut(&mut self) -> Option<&mut SumBody> {
        match self {
            Self::Sum(body) | Self::Ability(body) => Some(body),
            _ => None,
        }
    }

    /// Every node this body reads its value from.
    pub fn dependencies(&self) -> Vec<NodeId> {
        match self {
            Self::Sum(body) | Self::Ability(body) => body.components().collect(),
            Self::Fraction(body) => body.dividend.into_iter().collect(),
            _ => Vec::new(),
        }
    }

    /// Whether nonnegative values are shown with a leading `+`.
    #[must_use]
    pub fn is_signed(&self) -> bool {
        match self {
            Self::Simple { signed, .. } => *signed,
            Self::Sum(body) | Self::Ability(body) => body.signed,
            Self::Fraction(body) => body.signed,
            _ => false,
        }
    }

    fn set_signed(&mut self, on: bool) -> bool {
        match self {
            Self::Simple { signed, .. } => *signed = on,
            Self::Sum(body) | Self::Ability(body) => body.signed = on,
            Self::Fraction(body) => body.signed = on,
            _ => return false,
        }
        true
    }
}

// =============================================================================
// STAT NODE
// =============================================================================

/// One data cell on the sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatNode {
    pub name: String,
    pub description: String,
    /// Whether other sums and fractions may reference this node.
    pub calc_eligible: bool,
    /// Horizontal share of the name button (`statbtn.size_hint_x`).
    pub button_width: f64,
    pub body: NodeBody,
}

impl StatNode {
    /// Create a node with the given body and default flags.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>, body: NodeBody) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            calc_eligible: false,
            button_width: DEFAULT_BUTTON_WIDTH,
            body,
        }
    }

    #[must_use]
    pub fn plain(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(name, description, NodeBody::Plain)
    }

    #[must_use]
    pub fn simple(name: impl Into<String>, description: impl Into<String>, value: i64) -> Self {
        Self::new(
            name,
            description,
            NodeBody::Simple {
                value,
                signed: false,
            },
        )
    }

    #[must_use]
    pub fn sum(
        name: impl Into<String>,
        description: impl Into<String>,
        external_refs: Vec<NodeId>,
    ) -> Self {
        Self::new(name, description, NodeBody::Sum(SumBody::new(external_refs)))
    }

    /// Ability bars are calc-eligible from the start; their modifier is
    /// what other sums usually want.
    #[must_use]
    pub fn ability(
        name: impl Into<String>,
        description: impl Into<String>,
        external_refs: Vec<NodeId>,
    ) -> Self {
        Self::new(
            name,
            description,
            NodeBody::Ability(SumBody::new(external_refs)),
        )
        .for_calc()
    }

    #[must_use]
    pub fn fraction(
        name: impl Into<String>,
        description: impl Into<String>,
        dividend: Option<NodeId>,
        divisor: NonZeroI64,
        round_down: bool,
    ) -> Self {
        Self::new(
            name,
            description,
            NodeBody::Fraction(FractionBody {
                dividend,
                divisor,
                round_down,
                signed: false,
            }),
        )
    }

    #[must_use]
    pub fn counter(
        name: impl Into<String>,
        description: impl Into<String>,
        default_value: i64,
    ) -> Self {
        Self::new(
            name,
            description,
            NodeBody::Counter {
                default_value,
                current_value: default_value,
            },
        )
    }

    #[must_use]
    pub fn text(
        name: impl Into<String>,
        description: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self::new(name, description, NodeBody::Text { text: text.into() })
    }

    #[must_use]
    pub fn two_buttons(
        name: impl Into<String>,
        description: impl Into<String>,
        second: ButtonLabel,
    ) -> Self {
        Self::new(name, description, NodeBody::TwoButtons { second })
    }

    #[must_use]
    pub fn three_buttons(
        name: impl Into<String>,
        description: impl Into<String>,
        second: ButtonLabel,
        third: ButtonLabel,
    ) -> Self {
        Self::new(name, description, NodeBody::ThreeButtons { second, third })
    }

    /// Show a leading `+` on nonnegative values. No effect on kinds without a sign.
    #[must_use]
    pub fn signed(mut self) -> Self {
        self.body.set_signed(true);
        self
    }

    /// Make this node available to other sums and fractions.
    #[must_use]
    pub fn for_calc(mut self) -> Self {
        self.calc_eligible = true;
        self
    }

    /// Stretch the name button across the whole bar (section headers).
    #[must_use]
    pub fn full_width(mut self) -> Self {
        self.button_width = WIDE_BUTTON_WIDTH;
        self
    }

    #[must_use]
    pub fn kind(&self) -> NodeKind {
        self.body.kind()
    }

    /// Strip `<` and `>` from every user-entered string of this node.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        self.name = sanitize_text(&self.name);
        self.description = sanitize_text(&self.description);
        match &mut self.body {
            NodeBody::Text { text } => *text = sanitize_text(text),
            NodeBody::TwoButtons { second } => sanitize_label(second),
            NodeBody::ThreeButtons { second, third } => {
                sanitize_label(second);
                sanitize_label(third);
            }
            _ => {}
        }
        self
    }

    pub(crate) fn set_signed(&mut self, on: bool) -> bool {
        self.body.set_signed(on)
    }
}

fn sanitize_label(label: &mut ButtonLabel) {
    label.name = sanitize_text(&label.name);
    label.description = sanitize_text(&label.description);
}

/// Remove the two characters the document format cannot carry.
#[must_use]
pub fn sanitize_text(text: &str) -> String {
    text.chars().filter(|c| *c != '<' && *c != '>').collect()
}

// =============================================================================
// PAGES
// =============================================================================

/// Background colour of a page, each channel in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgb {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
}

impl Rgb {
    /// Create a colour, clamping each channel into `[0, 1]`.
    /// A NaN channel becomes 0.
    #[must_use]
    pub fn new(red: f64, green: f64, blue: f64) -> Self {
        Self {
            red: clamp_unit(red),
            green: clamp_unit(green),
            blue: clamp_unit(blue),
        }
    }
}

impl Default for Rgb {
    fn default() -> Self {
        let (red, green, blue) = DEFAULT_PAGE_COLOR;
        Self { red, green, blue }
    }
}

fn clamp_unit(channel: f64) -> f64 {
    if channel.is_nan() {
        0.0
    } else {
        channel.clamp(0.0, 1.0)
    }
}

/// An ordered group of top-level nodes shown together.
///
/// A page references its nodes; it does not own them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub(crate) nodes: Vec<NodeId>,
    pub color: Rgb,
}

impl Page {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_color(color: Rgb) -> Self {
        Self {
            nodes: Vec::new(),
            color,
        }
    }

    /// Member nodes in display order.
    #[must_use]
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains(&id)
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the MetaChar core.
///
/// - Every failure is local and synchronous; nothing is retried
/// - A failed load leaves the previous sheet untouched
/// - The core never panics; all errors are recoverable
#[derive(Debug, Error)]
pub enum MetaCharError {
    /// A document names a node kind that is not in the tag table.
    #[error("Unknown node kind: {0}")]
    UnknownNodeKind(String),

    /// A document index points outside the registry.
    #[error("Dangling reference to index {index} (registry holds {len} nodes)")]
    DanglingReference { index: usize, len: usize },

    /// A field holds text that cannot be decoded as the expected type.
    #[error("Corrupt field <{field}>: {value:?}")]
    CorruptField { field: String, value: String },

    /// A requested page order is not a permutation of the current order.
    #[error("Invalid permutation for page {0:?}")]
    InvalidPermutation(PageId),

    /// A fraction was given a divisor of zero.
    #[error("Fraction divisor must be nonzero")]
    ZeroDivisor,

    /// The node does not exist (never created, or removed).
    #[error("Node not found: {0:?}")]
    NotFound(NodeId),

    /// An index lookup past the end of the registry.
    #[error("Index {index} out of range (registry holds {len} nodes)")]
    OutOfRange { index: usize, len: usize },

    /// The page does not exist.
    #[error("Page not found: {0:?}")]
    PageNotFound(PageId),

    /// A field name that no node kind has.
    #[error("Unknown field: {0}")]
    UnknownField(String),

    /// A field that exists, but not on this kind of node.
    #[error("Field {field} does not apply to {kind} nodes")]
    FieldNotApplicable { field: String, kind: NodeKind },

    /// A reference target that is not marked as available for calculations.
    #[error("Node {0:?} is not available for calculations")]
    NotCalcEligible(NodeId),

    /// A reference-list operation on a node that is not a sum.
    #[error("Node {0:?} is not a sum")]
    NotASum(NodeId),

    /// A reference that would make a node depend on itself.
    #[error("Reference from {from:?} to {to:?} would create a cycle")]
    CyclicReference { from: NodeId, to: NodeId },

    /// The document is not well-formed tagged text.
    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    /// A thread panicked while holding the shared sheet.
    #[error("Sheet lock poisoned")]
    LockPoisoned,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

// =============================================================================
// TESTS
// =============================================================================

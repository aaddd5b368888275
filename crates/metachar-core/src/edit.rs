//! # Field Editing
//!
//! Named node attributes and the decoding of their text form.
//!
//! Every attribute of the document format is a `Field`. The same table
//! serves two callers with different tolerance:
//! - `Decode::Strict` (document loading): malformed text is an error
//! - `Decode::Lenient` (interactive edits): malformed numbers fall back to
//!   a neutral value, as a text box would

use crate::primitives::{DEFAULT_BUTTON_WIDTH, FALLBACK_DIVISOR, FALSE_LITERAL, TRUE_LITERAL};
use crate::{MetaCharError, NodeBody, NodeKind, StatNode, sanitize_text};
use std::fmt;
use std::num::NonZeroI64;
use std::str::FromStr;

/// How forgiving to be with malformed attribute text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decode {
    Strict,
    Lenient,
}

/// A named attribute of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Name,
    Description,
    CalcEligible,
    ButtonWidth,
    Value,
    Signed,
    ExternalRefs,
    OwnedChildren,
    Dividend,
    Divisor,
    RoundDown,
    Text,
    DefaultValue,
    CurrentValue,
    Name2,
    Description2,
    Name3,
    Description3,
}

impl Field {
    pub const ALL: [Self; 18] = [
        Self::Name,
        Self::Description,
        Self::CalcEligible,
        Self::ButtonWidth,
        Self::Value,
        Self::Signed,
        Self::ExternalRefs,
        Self::OwnedChildren,
        Self::Dividend,
        Self::Divisor,
        Self::RoundDown,
        Self::Text,
        Self::DefaultValue,
        Self::CurrentValue,
        Self::Name2,
        Self::Description2,
        Self::Name3,
        Self::Description3,
    ];

    /// Tag of this attribute in the document format.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Name => "statname",
            Self::Description => "statdesc",
            Self::CalcEligible => "calcavail",
            Self::ButtonWidth => "statbtn.size_hint_x",
            Self::Value => "statval",
            Self::Signed => "showplus",
            Self::ExternalRefs => "statlist_existing",
            Self::OwnedChildren => "childstats.statlist",
            Self::Dividend => "stat_to_div",
            Self::Divisor => "divisor",
            Self::RoundDown => "rounddown",
            Self::Text => "stattext",
            Self::DefaultValue => "defaultval",
            Self::CurrentValue => "currentval",
            Self::Name2 => "statname2",
            Self::Description2 => "statdesc2",
            Self::Name3 => "statname3",
            Self::Description3 => "statdesc3",
        }
    }

    /// Short name accepted on the command line.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Description => "description",
            Self::CalcEligible => "calc",
            Self::ButtonWidth => "width",
            Self::Value => "value",
            Self::Signed => "signed",
            Self::ExternalRefs => "refs",
            Self::OwnedChildren => "children",
            Self::Dividend => "dividend",
            Self::Divisor => "divisor",
            Self::RoundDown => "round-down",
            Self::Text => "text",
            Self::DefaultValue => "default",
            Self::CurrentValue => "current",
            Self::Name2 => "name2",
            Self::Description2 => "description2",
            Self::Name3 => "name3",
            Self::Description3 => "description3",
        }
    }

    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.tag() == tag)
    }

    /// Whether nodes of `kind` carry this attribute.
    #[must_use]
    pub const fn applies_to(self, kind: NodeKind) -> bool {
        match self {
            Self::Name | Self::Description | Self::CalcEligible | Self::ButtonWidth => true,
            Self::Value => matches!(kind, NodeKind::Simple),
            Self::Signed => matches!(
                kind,
                NodeKind::Simple | NodeKind::Sum | NodeKind::Ability | NodeKind::Fraction
            ),
            Self::ExternalRefs | Self::OwnedChildren => kind.is_sum(),
            Self::Dividend | Self::Divisor | Self::RoundDown => matches!(kind, NodeKind::Fraction),
            Self::Text => matches!(kind, NodeKind::Text),
            Self::DefaultValue | Self::CurrentValue => matches!(kind, NodeKind::Counter),
            Self::Name2 | Self::Description2 => {
                matches!(kind, NodeKind::TwoButtons | NodeKind::ThreeButtons)
            }
            Self::Name3 | Self::Description3 => matches!(kind, NodeKind::ThreeButtons),
        }
    }

    /// Attributes whose value names other nodes.
    #[must_use]
    pub const fn is_reference(self) -> bool {
        matches!(
            self,
            Self::ExternalRefs | Self::OwnedChildren | Self::Dividend
        )
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Field {
    type Err = MetaCharError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|field| field.label() == s || field.tag() == s)
            .ok_or_else(|| MetaCharError::UnknownField(s.to_string()))
    }
}

// =============================================================================
// APPLY
// =============================================================================

/// Decode `raw` and store it in `node`.
///
/// Reference fields are resolved by the caller and rejected here.
pub fn apply_scalar(
    node: &mut StatNode,
    field: Field,
    raw: &str,
    decode: Decode,
) -> Result<(), MetaCharError> {
    let kind = node.kind();
    if !field.applies_to(kind) || field.is_reference() {
        return Err(MetaCharError::FieldNotApplicable {
            field: field.tag().to_string(),
            kind,
        });
    }

    match field {
        Field::Name => node.name = sanitize_text(raw),
        Field::Description => node.description = sanitize_text(raw),
        Field::CalcEligible => node.calc_eligible = decode_bool(field, raw, decode)?,
        Field::ButtonWidth => node.button_width = decode_width(raw, decode)?,
        Field::Signed => {
            let on = decode_bool(field, raw, decode)?;
            node.set_signed(on);
        }
        _ => apply_body(&mut node.body, field, raw, decode)?,
    }
    Ok(())
}

fn apply_body(
    body: &mut NodeBody,
    field: Field,
    raw: &str,
    decode: Decode,
) -> Result<(), MetaCharError> {
    match (body, field) {
        (NodeBody::Simple { value, .. }, Field::Value) => *value = decode_int(field, raw, decode)?,
        (NodeBody::Fraction(fraction), Field::Divisor) => {
            fraction.divisor = decode_divisor(raw, decode)?;
        }
        (NodeBody::Fraction(fraction), Field::RoundDown) => {
            fraction.round_down = decode_bool(field, raw, decode)?;
        }
        (NodeBody::Text { text }, Field::Text) => *text = sanitize_text(raw),
        (
            NodeBody::Counter {
                default_value,
                current_value,
            },
            Field::DefaultValue,
        ) => {
            *default_value = decode_int(field, raw, decode)?;
            if decode == Decode::Lenient {
                *current_value = *default_value;
            }
        }
        (NodeBody::Counter { current_value, .. }, Field::CurrentValue) => {
            *current_value = decode_int(field, raw, decode)?;
        }
        (NodeBody::TwoButtons { second } | NodeBody::ThreeButtons { second, .. }, Field::Name2) => {
            second.name = sanitize_text(raw);
        }
        (
            NodeBody::TwoButtons { second } | NodeBody::ThreeButtons { second, .. },
            Field::Description2,
        ) => second.description = sanitize_text(raw),
        (NodeBody::ThreeButtons { third, .. }, Field::Name3) => third.name = sanitize_text(raw),
        (NodeBody::ThreeButtons { third, .. }, Field::Description3) => {
            third.description = sanitize_text(raw);
        }
        (body, field) => {
            return Err(MetaCharError::FieldNotApplicable {
                field: field.tag().to_string(),
                kind: body.kind(),
            });
        }
    }
    Ok(())
}

// =============================================================================
// DECODERS
// =============================================================================

fn corrupt(field: Field, raw: &str) -> MetaCharError {
    MetaCharError::CorruptField {
        field: field.tag().to_string(),
        value: raw.to_string(),
    }
}

/// Decode an integer attribute.
pub fn decode_int(field: Field, raw: &str, decode: Decode) -> Result<i64, MetaCharError> {
    match (raw.trim().parse::<i64>(), decode) {
        (Ok(value), _) => Ok(value),
        (Err(_), Decode::Lenient) => Ok(0),
        (Err(_), Decode::Strict) => Err(corrupt(field, raw)),
    }
}

/// Decode a boolean attribute.
///
/// Strict decoding accepts the document literals in any case; lenient
/// decoding also takes `1` and `yes` as true and anything else as false.
pub fn decode_bool(field: Field, raw: &str, decode: Decode) -> Result<bool, MetaCharError> {
    let text = raw.trim();
    if text.eq_ignore_ascii_case(TRUE_LITERAL) {
        return Ok(true);
    }
    if text.eq_ignore_ascii_case(FALSE_LITERAL) {
        return Ok(false);
    }
    match decode {
        Decode::Lenient => Ok(text == "1" || text.eq_ignore_ascii_case("yes")),
        Decode::Strict => Err(corrupt(field, raw)),
    }
}

/// Decode a finite float attribute.
pub fn decode_float(field: Field, raw: &str) -> Result<f64, MetaCharError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| corrupt(field, raw))
}

/// Clamp a button width into [0, 1]. A width that is not finite becomes the default.
#[must_use]
pub fn normalize_width(width: f64) -> f64 {
    if width.is_finite() {
        width.clamp(0.0, 1.0)
    } else {
        DEFAULT_BUTTON_WIDTH
    }
}

fn decode_width(raw: &str, decode: Decode) -> Result<f64, MetaCharError> {
    match (decode_float(Field::ButtonWidth, raw), decode) {
        (Ok(width), Decode::Strict) => Ok(width),
        (Ok(width), Decode::Lenient) => Ok(normalize_width(width)),
        (Err(_), Decode::Lenient) => Ok(DEFAULT_BUTTON_WIDTH),
        (Err(err), Decode::Strict) => Err(err),
    }
}

/// Decode a fraction divisor. Zero is always an error.
pub fn decode_divisor(raw: &str, decode: Decode) -> Result<NonZeroI64, MetaCharError> {
    let value = match (raw.trim().parse::<i64>(), decode) {
        (Ok(value), _) => value,
        (Err(_), Decode::Lenient) => return Ok(FALLBACK_DIVISOR),
        (Err(_), Decode::Strict) => return Err(corrupt(Field::Divisor, raw)),
    };
    NonZeroI64::new(value).ok_or(MetaCharError::ZeroDivisor)
}

/// Text form of a node attribute, as written to a document.
///
/// Reference fields are written by the document writer, which knows the
/// compacted indices; they yield `None` here.
#[must_use]
pub fn field_text(node: &StatNode, field: Field) -> Option<String> {
    let text = match (field, &node.body) {
        (Field::Name, _) => node.name.clone(),
        (Field::Description, _) => node.description.clone(),
        (Field::CalcEligible, _) => bool_literal(node.calc_eligible).to_string(),
        (Field::ButtonWidth, _) => node.button_width.to_string(),
        (Field::Value, NodeBody::Simple { value, .. }) => value.to_string(),
        (Field::Signed, body) if field.applies_to(body.kind()) => {
            bool_literal(body.is_signed()).to_string()
        }
        (Field::Divisor, NodeBody::Fraction(fraction)) => fraction.divisor.to_string(),
        (Field::RoundDown, NodeBody::Fraction(fraction)) => {
            bool_literal(fraction.round_down).to_string()
        }
        (Field::Text, NodeBody::Text { text }) => text.clone(),
        (Field::DefaultValue, NodeBody::Counter { default_value, .. }) => {
            default_value.to_string()
        }
        (Field::CurrentValue, NodeBody::Counter { current_value, .. }) => {
            current_value.to_string()
        }
        (
            Field::Name2,
            NodeBody::TwoButtons { second } | NodeBody::ThreeButtons { second, .. },
        ) => second.name.clone(),
        (
            Field::Description2,
            NodeBody::TwoButtons { second } | NodeBody::ThreeButtons { second, .. },
        ) => second.description.clone(),
        (Field::Name3, NodeBody::ThreeButtons { third, .. }) => third.name.clone(),
        (Field::Description3, NodeBody::ThreeButtons { third, .. }) => third.description.clone(),
        _ => return None,
    };
    Some(text)
}

#[must_use]
pub const fn bool_literal(value: bool) -> &'static str {
    if value { TRUE_LITERAL } else { FALSE_LITERAL }
}

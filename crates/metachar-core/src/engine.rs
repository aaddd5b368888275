//! # Value Engine
//!
//! Computes node values on demand. Nothing is cached: every call walks the
//! reference graph from scratch, so a value is always current with respect
//! to the registry it is given.
//!
//! Evaluation rules:
//! - A removed node contributes 0
//! - A node reached again while it is being evaluated contributes 0
//! - Reference chains of any length are followed, without recursion
//! - All arithmetic saturates

use crate::primitives::{ABILITY_BASELINE, ABILITY_STEP};
use crate::registry::Registry;
use crate::{MetaCharError, NodeBody, NodeId, SumBody};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::num::NonZeroI64;

/// One line of a sum's breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Component {
    pub id: NodeId,
    pub name: String,
    pub text: String,
    /// True for an owned child, false for an external reference.
    pub owned: bool,
}

/// Stateless evaluator over a `Registry`.
pub struct ValueEngine;

impl ValueEngine {
    /// The number a node contributes when another node reads it.
    ///
    /// Returns 0 for removed nodes and for kinds without a value.
    #[must_use]
    pub fn value_for_sum(registry: &Registry, id: NodeId) -> i64 {
        Self::walk(registry, id).get(&id).copied().unwrap_or(0)
    }

    /// The text a presentation layer shows next to a node's name.
    #[must_use]
    pub fn display_text(registry: &Registry, id: NodeId) -> String {
        let Some(node) = registry.get(id) else {
            return String::new();
        };

        match &node.body {
            NodeBody::Simple { signed, .. } => {
                format_value(Self::value_for_sum(registry, id), *signed)
            }
            NodeBody::Sum(body) => format_value(Self::value_for_sum(registry, id), body.signed),
            NodeBody::Fraction(body) => {
                format_value(Self::value_for_sum(registry, id), body.signed)
            }
            NodeBody::Ability(body) => {
                let score = Self::total(body, &Self::walk(registry, id));
                format!("{} ({})", score, format_value(ability_modifier(score), true))
            }
            NodeBody::Counter { current_value, .. } => current_value.to_string(),
            NodeBody::Text { text } => text.clone(),
            NodeBody::Plain | NodeBody::TwoButtons { .. } | NodeBody::ThreeButtons { .. } => {
                String::new()
            }
        }
    }

    /// Display text of every node that carries a value, in registry order.
    #[must_use]
    pub fn refresh_all(registry: &Registry) -> Vec<(NodeId, String)> {
        registry
            .iter()
            .filter(|(_, node)| node.kind().is_numeric())
            .map(|(id, _)| (id, Self::display_text(registry, id)))
            .collect()
    }

    /// Breakdown of a sum: external references first, then owned children.
    ///
    /// References to removed nodes are skipped.
    pub fn components(registry: &Registry, id: NodeId) -> Result<Vec<Component>, MetaCharError> {
        let body = registry
            .node(id)?
            .body
            .as_sum()
            .ok_or(MetaCharError::NotASum(id))?;

        let external = body.external_refs.iter().map(|r| (*r, false));
        let owned = body.owned_children().iter().map(|c| (*c, true));

        Ok(external
            .chain(owned)
            .filter_map(|(component, owned)| {
                registry.get(component).map(|node| Component {
                    id: component,
                    name: node.name.clone(),
                    text: Self::display_text(registry, component),
                    owned,
                })
            })
            .collect())
    }

    /// Values of `root` and everything it reads, computed bottom-up with an
    /// explicit stack.
    ///
    /// `active` holds the nodes whose dependencies are still being
    /// evaluated; reaching one of them again closes a loop, and the
    /// back reference reads as 0.
    fn walk(registry: &Registry, root: NodeId) -> BTreeMap<NodeId, i64> {
        let mut values = BTreeMap::new();
        let mut active = BTreeSet::new();
        let mut stack = vec![(root, false)];

        while let Some((id, dependencies_done)) = stack.pop() {
            if dependencies_done {
                active.remove(&id);
                let value = Self::combine(registry, id, &values);
                values.insert(id, value);
                continue;
            }
            if values.contains_key(&id) || active.contains(&id) {
                continue;
            }
            let Some(node) = registry.get(id) else {
                values.insert(id, 0);
                continue;
            };

            active.insert(id);
            stack.push((id, true));
            for dependency in node.body.dependencies() {
                if !values.contains_key(&dependency) && !active.contains(&dependency) {
                    stack.push((dependency, false));
                }
            }
        }

        values
    }

    /// Value of `id` once every node it reads has a value (or is on a loop).
    fn combine(registry: &Registry, id: NodeId, values: &BTreeMap<NodeId, i64>) -> i64 {
        let Some(node) = registry.get(id) else {
            return 0;
        };

        match &node.body {
            NodeBody::Simple { value, .. } => *value,
            NodeBody::Sum(body) => Self::total(body, values),
            NodeBody::Ability(body) => ability_modifier(Self::total(body, values)),
            NodeBody::Fraction(body) => body.dividend.map_or(0, |dividend| {
                divide(read(values, dividend), body.divisor, body.round_down)
            }),
            NodeBody::Counter { current_value, .. } => *current_value,
            NodeBody::Plain
            | NodeBody::Text { .. }
            | NodeBody::TwoButtons { .. }
            | NodeBody::ThreeButtons { .. } => 0,
        }
    }

    fn total(body: &SumBody, values: &BTreeMap<NodeId, i64>) -> i64 {
        body.components()
            .fold(0i64, |total, component| total.saturating_add(read(values, component)))
    }
}

fn read(values: &BTreeMap<NodeId, i64>, id: NodeId) -> i64 {
    values.get(&id).copied().unwrap_or(0)
}

// =============================================================================
// ARITHMETIC
// =============================================================================

/// Quotient rounded toward negative infinity.
#[must_use]
pub fn floor_div(numerator: i64, denominator: NonZeroI64) -> i64 {
    let d = denominator.get();
    let quotient = numerator.checked_div(d).unwrap_or(i64::MAX);
    let remainder = numerator.checked_rem(d).unwrap_or(0);
    if remainder != 0 && (remainder < 0) != (d < 0) {
        quotient.saturating_sub(1)
    } else {
        quotient
    }
}

/// Remainder carrying the sign of the denominator.
#[must_use]
pub fn floor_mod(numerator: i64, denominator: NonZeroI64) -> i64 {
    let d = denominator.get();
    let remainder = numerator.checked_rem(d).unwrap_or(0);
    if remainder != 0 && (remainder < 0) != (d < 0) {
        remainder.saturating_add(d)
    } else {
        remainder
    }
}

/// Fraction value: floored quotient, bumped by one when rounding up and the
/// floored remainder is positive.
#[must_use]
pub fn divide(numerator: i64, divisor: NonZeroI64, round_down: bool) -> i64 {
    let quotient = floor_div(numerator, divisor);
    if !round_down && floor_mod(numerator, divisor) > 0 {
        quotient.saturating_add(1)
    } else {
        quotient
    }
}

/// Roll modifier of an ability score.
#[must_use]
pub fn ability_modifier(score: i64) -> i64 {
    let step = NonZeroI64::new(ABILITY_STEP).unwrap_or(NonZeroI64::MIN);
    floor_div(score.saturating_sub(ABILITY_BASELINE), step)
}

fn format_value(value: i64, signed: bool) -> String {
    if signed && value >= 0 {
        format!("+{value}")
    } else {
        value.to_string()
    }
}

// =============================================================================
// TESTS
// =============================================================================

//! # Sheet
//!
//! The aggregate a presentation layer works against: registry, pages and
//! the published display text of every valued node.
//!
//! Every mutation goes through a `Sheet` method and ends by republishing
//! display text, so `published_text` never lags behind the graph.
//! Loading builds a complete replacement first and swaps it in only on
//! success.

use crate::edit::{Decode, Field, apply_scalar, normalize_width};
use crate::engine::{Component, ValueEngine};
use crate::formats::{Document, read_document, write_document};
use crate::primitives::{
    ABILITY_BASE_SCORE, ABILITY_DESCRIPTION, BASE_SCORE_DESCRIPTION, BASE_SCORE_NAME,
    NONE_LITERAL,
};
use crate::registry::Registry;
use crate::{MetaCharError, NodeBody, NodeId, NodeKind, Page, PageId, Rgb, StatNode};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Direction for moving a node among its siblings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl FromStr for Direction {
    type Err = MetaCharError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            other => Err(MetaCharError::UnknownField(other.to_string())),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Up => "up",
            Self::Down => "down",
        })
    }
}

/// A character sheet.
#[derive(Debug, Clone)]
pub struct Sheet {
    registry: Registry,
    pages: Vec<Page>,
    published: BTreeMap<NodeId, String>,
    source_version: Option<String>,
}

impl Default for Sheet {
    fn default() -> Self {
        Self::new()
    }
}

impl Sheet {
    /// An empty sheet with one empty page.
    #[must_use]
    pub fn new() -> Self {
        Self::from_parts(Registry::new(), vec![Page::new()], None)
    }

    fn from_parts(registry: Registry, pages: Vec<Page>, source_version: Option<String>) -> Self {
        let mut sheet = Self {
            registry,
            pages,
            published: BTreeMap::new(),
            source_version,
        };
        sheet.refresh();
        sheet
    }

    /// Build a sheet from a parsed document.
    #[must_use]
    pub fn from_document(document: Document) -> Self {
        Self::from_parts(document.registry, document.pages, document.version)
    }

    /// Parse a sheet from document text.
    pub fn from_text(text: &str) -> Result<Self, MetaCharError> {
        read_document(text).map(Self::from_document)
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    #[must_use]
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn page(&self, page: PageId) -> Result<&Page, MetaCharError> {
        self.pages
            .get(page.0)
            .ok_or(MetaCharError::PageNotFound(page))
    }

    pub fn node(&self, id: NodeId) -> Result<&StatNode, MetaCharError> {
        self.registry.node(id)
    }

    /// Version string of the document this sheet was loaded from.
    #[must_use]
    pub fn source_version(&self) -> Option<&str> {
        self.source_version.as_deref()
    }

    /// The page listing `id` as a top-level member.
    #[must_use]
    pub fn page_of(&self, id: NodeId) -> Option<PageId> {
        self.pages
            .iter()
            .position(|page| page.contains(id))
            .map(PageId)
    }

    /// Display text as of the last mutation.
    #[must_use]
    pub fn published_text(&self, id: NodeId) -> Option<&str> {
        self.published.get(&id).map(String::as_str)
    }

    /// Display text computed now.
    #[must_use]
    pub fn render_text(&self, id: NodeId) -> String {
        ValueEngine::display_text(&self.registry, id)
    }

    #[must_use]
    pub fn value(&self, id: NodeId) -> i64 {
        ValueEngine::value_for_sum(&self.registry, id)
    }

    pub fn components(&self, id: NodeId) -> Result<Vec<Component>, MetaCharError> {
        ValueEngine::components(&self.registry, id)
    }

    /// Nodes a sum or fraction may reference.
    #[must_use]
    pub fn calc_candidates(&self) -> Vec<NodeId> {
        self.registry.calc_candidates()
    }

    // =========================================================================
    // NODE LIFECYCLE
    // =========================================================================

    /// Register a top-level node at the end of `page`.
    ///
    /// References carried by `node` must name live, calc-eligible nodes.
    /// Owned children are never carried over; use `add_owned_child`.
    pub fn create_node(&mut self, page: PageId, node: StatNode) -> Result<NodeId, MetaCharError> {
        self.page(page)?;
        let node = self.prepare(node)?;

        let id = self.registry.create(node);
        if let Some(target) = self.pages.get_mut(page.0) {
            target.nodes.push(id);
        }
        self.refresh();
        Ok(id)
    }

    /// Register a node of `kind` with factory defaults at the end of `page`.
    ///
    /// An ability bar starts with an owned base score child.
    pub fn create_default(&mut self, kind: NodeKind, page: PageId) -> Result<NodeId, MetaCharError> {
        self.create_with_fields(kind, page, &[])
    }

    /// Like `create_default`, with initial attribute values in text form.
    ///
    /// Fields are decoded as `set_field` would. Nothing is registered if
    /// any of them is rejected.
    pub fn create_with_fields(
        &mut self,
        kind: NodeKind,
        page: PageId,
        fields: &[(Field, String)],
    ) -> Result<NodeId, MetaCharError> {
        let mut node = match kind {
            NodeKind::Plain => StatNode::plain("", "").full_width(),
            NodeKind::Ability => StatNode::ability("", ABILITY_DESCRIPTION, Vec::new()),
            other => StatNode::new("", "", NodeBody::default_for(other)),
        };
        for (field, raw) in fields {
            self.apply_detached(&mut node, *field, raw)?;
        }
        let id = self.create_node(page, node)?;

        if kind == NodeKind::Ability {
            self.add_owned_child(
                id,
                StatNode::simple(BASE_SCORE_NAME, BASE_SCORE_DESCRIPTION, ABILITY_BASE_SCORE),
            )?;
        }
        Ok(id)
    }

    /// Register `node` as an owned child of a sum, after its other children.
    pub fn add_owned_child(&mut self, owner: NodeId, node: StatNode) -> Result<NodeId, MetaCharError> {
        if !self.registry.node(owner)?.kind().is_sum() {
            return Err(MetaCharError::NotASum(owner));
        }
        let node = self.prepare(node)?;

        let child = self.registry.create_owned(node, owner);
        if let Some(body) = self.registry.node_mut(owner)?.body.as_sum_mut() {
            body.owned_children.push(child);
        }
        self.refresh();
        Ok(child)
    }

    /// Delete a node together with every node it owns, directly or not.
    ///
    /// External references to deleted nodes are left dangling and read as 0.
    pub fn delete_node(&mut self, id: NodeId) -> Result<(), MetaCharError> {
        self.registry.node(id)?;

        let mut doomed = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            doomed.push(current);
            if let Some(body) = self.registry.get(current).and_then(|n| n.body.as_sum()) {
                stack.extend(body.owned_children().iter().copied());
            }
        }

        for page in &mut self.pages {
            page.nodes.retain(|member| *member != id);
        }
        for node in doomed.iter().rev() {
            self.registry.remove(*node)?;
        }

        tracing::debug!(node = id.0, removed = doomed.len(), "deleted node");
        self.refresh();
        Ok(())
    }

    /// Wipe the sheet back to one empty page.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    // =========================================================================
    // ORDERING
    // =========================================================================

    /// Rearrange a page: position `i` receives the node previously at `order[i]`.
    pub fn reorder_page(&mut self, page: PageId, order: &[usize]) -> Result<(), MetaCharError> {
        let current = self.page(page)?.nodes.clone();

        let mut seen = vec![false; current.len()];
        if order.len() != current.len() {
            return Err(MetaCharError::InvalidPermutation(page));
        }
        for position in order {
            match seen.get_mut(*position) {
                Some(slot) if !*slot => *slot = true,
                _ => return Err(MetaCharError::InvalidPermutation(page)),
            }
        }

        let reordered: Vec<NodeId> = order.iter().filter_map(|i| current.get(*i).copied()).collect();
        if let Some(target) = self.pages.get_mut(page.0) {
            target.nodes = reordered;
        }
        Ok(())
    }

    /// Swap a node with its neighbour on its page, or among its owner's
    /// children. Moving past either end does nothing.
    pub fn move_node(&mut self, id: NodeId, direction: Direction) -> Result<(), MetaCharError> {
        self.registry.node(id)?;

        let siblings = match (self.page_of(id), self.registry.owner(id)) {
            (Some(page), _) => self.pages.get_mut(page.0).map(|p| &mut p.nodes),
            (None, Some(owner)) => self
                .registry
                .node_mut(owner)?
                .body
                .as_sum_mut()
                .map(|body| &mut body.owned_children),
            (None, None) => None,
        }
        .ok_or(MetaCharError::NotFound(id))?;

        let Some(position) = siblings.iter().position(|member| *member == id) else {
            return Err(MetaCharError::NotFound(id));
        };
        let neighbour = match direction {
            Direction::Up => position.checked_sub(1),
            Direction::Down => position.checked_add(1).filter(|n| *n < siblings.len()),
        };
        if let Some(neighbour) = neighbour {
            siblings.swap(position, neighbour);
        }
        Ok(())
    }

    // =========================================================================
    // FIELDS AND REFERENCES
    // =========================================================================

    /// Set one attribute from its text form, as an edit dialog would.
    ///
    /// Reference fields take registry indices (`0,3` or `None`).
    pub fn set_field(&mut self, id: NodeId, field: Field, raw: &str) -> Result<(), MetaCharError> {
        let kind = self.registry.node(id)?.kind();
        if !field.applies_to(kind) {
            return Err(MetaCharError::FieldNotApplicable {
                field: field.tag().to_string(),
                kind,
            });
        }

        match field {
            Field::ExternalRefs => {
                let targets = self.live_indices(raw)?;
                self.set_external_refs(id, targets)?;
            }
            Field::Dividend => {
                let target = match raw.trim() {
                    "" | NONE_LITERAL => None,
                    index => self.live_indices(index)?.into_iter().next(),
                };
                self.set_dividend(id, target)?;
            }
            Field::OwnedChildren => {
                return Err(MetaCharError::FieldNotApplicable {
                    field: field.tag().to_string(),
                    kind,
                });
            }
            _ => apply_scalar(self.registry.node_mut(id)?, field, raw, Decode::Lenient)?,
        }

        self.refresh();
        Ok(())
    }

    /// Append `target` to a sum's external references.
    pub fn add_external_ref(&mut self, sum: NodeId, target: NodeId) -> Result<(), MetaCharError> {
        self.check_sum(sum)?;
        self.check_target(sum, target)?;

        if let Some(body) = self.registry.node_mut(sum)?.body.as_sum_mut() {
            body.external_refs.push(target);
        }
        self.refresh();
        Ok(())
    }

    /// Drop the first occurrence of `target` from a sum's external references.
    pub fn remove_external_ref(&mut self, sum: NodeId, target: NodeId) -> Result<(), MetaCharError> {
        self.check_sum(sum)?;

        let body = self
            .registry
            .node_mut(sum)?
            .body
            .as_sum_mut()
            .ok_or(MetaCharError::NotASum(sum))?;
        let position = body
            .external_refs
            .iter()
            .position(|r| *r == target)
            .ok_or(MetaCharError::NotFound(target))?;
        body.external_refs.remove(position);

        self.refresh();
        Ok(())
    }

    /// Point a fraction at a new dividend, or at nothing.
    pub fn set_dividend(
        &mut self,
        fraction: NodeId,
        target: Option<NodeId>,
    ) -> Result<(), MetaCharError> {
        let kind = self.registry.node(fraction)?.kind();
        if kind != NodeKind::Fraction {
            return Err(MetaCharError::FieldNotApplicable {
                field: Field::Dividend.tag().to_string(),
                kind,
            });
        }
        if let Some(target) = target {
            self.check_target(fraction, target)?;
        }

        if let NodeBody::Fraction(body) = &mut self.registry.node_mut(fraction)?.body {
            body.dividend = target;
        }
        self.refresh();
        Ok(())
    }

    fn set_external_refs(&mut self, sum: NodeId, targets: Vec<NodeId>) -> Result<(), MetaCharError> {
        self.check_sum(sum)?;
        for target in &targets {
            self.check_target(sum, *target)?;
        }
        if let Some(body) = self.registry.node_mut(sum)?.body.as_sum_mut() {
            body.external_refs = targets;
        }
        Ok(())
    }

    // =========================================================================
    // COUNTERS
    // =========================================================================

    /// Add `delta` to a counter's current value and return the result.
    pub fn adjust_counter(&mut self, id: NodeId, delta: i64) -> Result<i64, MetaCharError> {
        let value = match &mut self.registry.node_mut(id)?.body {
            NodeBody::Counter { current_value, .. } => {
                *current_value = current_value.saturating_add(delta);
                *current_value
            }
            body => return Err(not_a_counter(body.kind())),
        };
        self.refresh();
        Ok(value)
    }

    /// Restore a counter to its default value and return it.
    pub fn reset_counter(&mut self, id: NodeId) -> Result<i64, MetaCharError> {
        let value = match &mut self.registry.node_mut(id)?.body {
            NodeBody::Counter {
                default_value,
                current_value,
            } => {
                *current_value = *default_value;
                *current_value
            }
            body => return Err(not_a_counter(body.kind())),
        };
        self.refresh();
        Ok(value)
    }

    // =========================================================================
    // PAGES
    // =========================================================================

    /// Append an empty page with the default colour.
    pub fn add_page(&mut self) -> PageId {
        self.pages.push(Page::new());
        PageId(self.pages.len().saturating_sub(1))
    }

    pub fn set_page_color(&mut self, page: PageId, color: Rgb) -> Result<(), MetaCharError> {
        let target = self
            .pages
            .get_mut(page.0)
            .ok_or(MetaCharError::PageNotFound(page))?;
        target.color = Rgb::new(color.red, color.green, color.blue);
        Ok(())
    }

    // =========================================================================
    // PERSISTENCE
    // =========================================================================

    /// The whole sheet as document text.
    #[must_use]
    pub fn save(&self) -> String {
        write_document(&self.registry, &self.pages)
    }

    /// Replace this sheet with the one in `text`.
    ///
    /// On error the sheet is left exactly as it was.
    pub fn load(&mut self, text: &str) -> Result<(), MetaCharError> {
        *self = Self::from_text(text)?;
        Ok(())
    }

    pub fn write_file(&self, path: impl AsRef<Path>) -> Result<(), MetaCharError> {
        std::fs::write(path, self.save()).map_err(|e| MetaCharError::IoError(e.to_string()))
    }

    pub fn read_file(path: impl AsRef<Path>) -> Result<Self, MetaCharError> {
        let text =
            std::fs::read_to_string(path).map_err(|e| MetaCharError::IoError(e.to_string()))?;
        Self::from_text(&text)
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    fn refresh(&mut self) {
        self.published = ValueEngine::refresh_all(&self.registry).into_iter().collect();
    }

    /// Sanitize an incoming node and validate the references it carries.
    fn prepare(&self, node: StatNode) -> Result<StatNode, MetaCharError> {
        let mut node = node.sanitized();
        node.button_width = normalize_width(node.button_width);
        match &mut node.body {
            NodeBody::Sum(body) | NodeBody::Ability(body) => {
                if !body.owned_children.is_empty() {
                    tracing::debug!(
                        dropped = body.owned_children.len(),
                        "ignoring owned children of an inserted node"
                    );
                    body.owned_children.clear();
                }
                for target in &body.external_refs {
                    self.check_live_target(*target)?;
                }
            }
            NodeBody::Fraction(body) => {
                if let Some(target) = body.dividend {
                    self.check_live_target(target)?;
                }
            }
            _ => {}
        }
        Ok(node)
    }

    /// Apply a field to a node that is not registered yet.
    fn apply_detached(
        &self,
        node: &mut StatNode,
        field: Field,
        raw: &str,
    ) -> Result<(), MetaCharError> {
        let kind = node.kind();
        match field {
            Field::ExternalRefs if kind.is_sum() => {
                let targets = self.live_indices(raw)?;
                if let Some(body) = node.body.as_sum_mut() {
                    body.external_refs = targets;
                }
            }
            Field::Dividend if kind == NodeKind::Fraction => {
                let target = match raw.trim() {
                    "" | NONE_LITERAL => None,
                    index => self.live_indices(index)?.into_iter().next(),
                };
                if let NodeBody::Fraction(body) = &mut node.body {
                    body.dividend = target;
                }
            }
            _ => apply_scalar(node, field, raw, Decode::Lenient)?,
        }
        Ok(())
    }

    fn check_sum(&self, id: NodeId) -> Result<(), MetaCharError> {
        if self.registry.node(id)?.kind().is_sum() {
            Ok(())
        } else {
            Err(MetaCharError::NotASum(id))
        }
    }

    fn check_live_target(&self, target: NodeId) -> Result<(), MetaCharError> {
        if self.registry.node(target)?.calc_eligible {
            Ok(())
        } else {
            Err(MetaCharError::NotCalcEligible(target))
        }
    }

    /// A reference from `from` to `target` must be to a live, calc-eligible
    /// node and must not close a loop.
    fn check_target(&self, from: NodeId, target: NodeId) -> Result<(), MetaCharError> {
        self.check_live_target(target)?;
        if self.registry.would_cycle(from, target) {
            return Err(MetaCharError::CyclicReference { from, to: target });
        }
        Ok(())
    }

    /// Resolve a comma-joined list of registry indices to live nodes.
    fn live_indices(&self, raw: &str) -> Result<Vec<NodeId>, MetaCharError> {
        raw.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                let index = part.parse::<usize>().map_err(|_| MetaCharError::CorruptField {
                    field: Field::ExternalRefs.tag().to_string(),
                    value: part.to_string(),
                })?;
                self.registry.by_index(index)
            })
            .collect()
    }

    /// Live graph with dense indices and pages translated to match.
    fn canonical(&self) -> (Registry, Vec<Page>) {
        let (registry, remap) = self.registry.compact();
        let pages = self
            .pages
            .iter()
            .map(|page| {
                let mut canonical = Page::with_color(page.color);
                canonical.nodes = page
                    .nodes
                    .iter()
                    .filter_map(|id| remap.get(id.0).copied().flatten())
                    .collect();
                canonical
            })
            .collect();
        (registry, pages)
    }
}

fn not_a_counter(kind: NodeKind) -> MetaCharError {
    MetaCharError::FieldNotApplicable {
        field: Field::CurrentValue.tag().to_string(),
        kind,
    }
}

/// Structural equality over the live graph.
///
/// Raw slot numbers, tombstones, published text and the source version do
/// not take part.
impl PartialEq for Sheet {
    fn eq(&self, other: &Self) -> bool {
        self.canonical() == other.canonical()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::DEFAULT_BUTTON_WIDTH;
    use std::num::NonZeroI64;

    const FIRST: PageId = PageId(0);

    #[test]
    fn new_sheet_has_one_page() {
        let sheet = Sheet::new();
        assert_eq!(sheet.pages().len(), 1);
        assert_eq!(sheet.registry().len(), 0);
        assert_eq!(sheet.pages()[0].color, Rgb::default());
    }

    #[test]
    fn mutations_republish_text() {
        let mut sheet = Sheet::new();
        let prof = sheet
            .create_node(FIRST, StatNode::simple("Prof", "", 2).signed().for_calc())
            .expect("create");
        let skill = sheet
            .create_node(FIRST, StatNode::sum("Skill", "", vec![prof]).signed())
            .expect("create");
        assert_eq!(sheet.published_text(skill), Some("+2"));

        sheet.set_field(prof, Field::Value, "3").expect("set");
        assert_eq!(sheet.published_text(skill), Some("+3"));
        assert_eq!(sheet.render_text(skill), "+3");
    }

    #[test]
    fn create_default_ability_has_base_score() {
        let mut sheet = Sheet::new();
        let ability = sheet
            .create_default(NodeKind::Ability, FIRST)
            .expect("create");

        let node = sheet.node(ability).expect("node");
        assert!(node.calc_eligible);
        assert_eq!(node.description, ABILITY_DESCRIPTION);
        assert_eq!(sheet.published_text(ability), Some("10 (+0)"));

        let parts = sheet.components(ability).expect("components");
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].name, BASE_SCORE_NAME);
        assert!(parts[0].owned);
    }

    #[test]
    fn create_default_plain_is_full_width() {
        let mut sheet = Sheet::new();
        let header = sheet.create_default(NodeKind::Plain, FIRST).expect("create");
        assert_eq!(sheet.node(header).expect("node").button_width, 1.0);
    }

    #[test]
    fn create_with_fields_applies_text_values() {
        let mut sheet = Sheet::new();
        let hp = sheet
            .create_with_fields(
                NodeKind::Counter,
                FIRST,
                &[
                    (Field::Name, "HP".to_string()),
                    (Field::DefaultValue, "9".to_string()),
                    (Field::CalcEligible, "True".to_string()),
                ],
            )
            .expect("counter");
        let half = sheet
            .create_with_fields(
                NodeKind::Fraction,
                FIRST,
                &[(Field::Dividend, hp.0.to_string())],
            )
            .expect("fraction");

        assert_eq!(sheet.published_text(hp), Some("9"));
        assert_eq!(sheet.published_text(half), Some("4"));

        let before = sheet.registry().len();
        assert!(matches!(
            sheet.create_with_fields(NodeKind::Text, FIRST, &[(Field::Value, "1".to_string())]),
            Err(MetaCharError::FieldNotApplicable { .. })
        ));
        assert_eq!(sheet.registry().len(), before);
    }

    #[test]
    fn create_node_checks_page_and_references() {
        let mut sheet = Sheet::new();
        assert!(matches!(
            sheet.create_node(PageId(4), StatNode::plain("x", "")),
            Err(MetaCharError::PageNotFound(PageId(4)))
        ));

        let hidden = sheet
            .create_node(FIRST, StatNode::simple("hidden", "", 1))
            .expect("create");
        assert!(matches!(
            sheet.create_node(FIRST, StatNode::sum("s", "", vec![hidden])),
            Err(MetaCharError::NotCalcEligible(_))
        ));
        assert!(matches!(
            sheet.create_node(FIRST, StatNode::sum("s", "", vec![NodeId(40)])),
            Err(MetaCharError::NotFound(NodeId(40)))
        ));
    }

    #[test]
    fn create_node_sanitizes_text() {
        let mut sheet = Sheet::new();
        let id = sheet
            .create_node(FIRST, StatNode::text("<Notes>", "", "a<b>c"))
            .expect("create");
        assert_eq!(sheet.node(id).expect("node").name, "Notes");
        assert_eq!(sheet.render_text(id), "abc");
    }

    #[test]
    fn delete_cascades_to_owned_children() {
        let mut sheet = Sheet::new();
        let outer = sheet
            .create_node(FIRST, StatNode::sum("outer", "", Vec::new()))
            .expect("create");
        let inner = sheet
            .add_owned_child(outer, StatNode::sum("inner", "", Vec::new()))
            .expect("child");
        let leaf = sheet
            .add_owned_child(inner, StatNode::simple("leaf", "", 3))
            .expect("grandchild");

        sheet.delete_node(outer).expect("delete");

        for id in [outer, inner, leaf] {
            assert!(sheet.node(id).is_err());
        }
        assert!(sheet.pages()[0].nodes().is_empty());
        assert_eq!(sheet.registry().live_count(), 0);
    }

    #[test]
    fn delete_owned_child_detaches_from_owner() {
        let mut sheet = Sheet::new();
        let total = sheet
            .create_node(FIRST, StatNode::sum("total", "", Vec::new()))
            .expect("create");
        let part = sheet
            .add_owned_child(total, StatNode::simple("part", "", 3))
            .expect("child");
        assert_eq!(sheet.value(total), 3);

        sheet.delete_node(part).expect("delete");
        assert_eq!(sheet.value(total), 0);
        assert!(sheet.components(total).expect("components").is_empty());
    }

    #[test]
    fn reorder_requires_permutation() {
        let mut sheet = Sheet::new();
        let ids: Vec<_> = ["a", "b", "c"]
            .into_iter()
            .map(|n| sheet.create_node(FIRST, StatNode::plain(n, "")).expect("create"))
            .collect();

        sheet.reorder_page(FIRST, &[2, 0, 1]).expect("reorder");
        assert_eq!(sheet.pages()[0].nodes(), &[ids[2], ids[0], ids[1]]);

        for bad in [&[0, 0, 1][..], &[0, 1][..], &[0, 1, 3][..]] {
            assert!(matches!(
                sheet.reorder_page(FIRST, bad),
                Err(MetaCharError::InvalidPermutation(FIRST))
            ));
        }
        assert_eq!(sheet.pages()[0].nodes(), &[ids[2], ids[0], ids[1]]);
    }

    #[test]
    fn move_swaps_with_neighbour() {
        let mut sheet = Sheet::new();
        let a = sheet.create_node(FIRST, StatNode::plain("a", "")).expect("a");
        let b = sheet.create_node(FIRST, StatNode::plain("b", "")).expect("b");

        sheet.move_node(a, Direction::Up).expect("noop");
        assert_eq!(sheet.pages()[0].nodes(), &[a, b]);
        sheet.move_node(a, Direction::Down).expect("move");
        assert_eq!(sheet.pages()[0].nodes(), &[b, a]);
        sheet.move_node(a, Direction::Down).expect("noop");
        assert_eq!(sheet.pages()[0].nodes(), &[b, a]);
    }

    #[test]
    fn move_within_owner() {
        let mut sheet = Sheet::new();
        let total = sheet
            .create_node(FIRST, StatNode::sum("total", "", Vec::new()))
            .expect("create");
        let x = sheet.add_owned_child(total, StatNode::simple("x", "", 1)).expect("x");
        let y = sheet.add_owned_child(total, StatNode::simple("y", "", 2)).expect("y");

        sheet.move_node(y, Direction::Up).expect("move");
        let body = sheet.node(total).expect("node").body.as_sum().expect("sum");
        assert_eq!(body.owned_children(), &[y, x]);
    }

    #[test]
    fn external_refs_reject_cycles_and_ineligible_targets() {
        let mut sheet = Sheet::new();
        let a = sheet
            .create_node(FIRST, StatNode::sum("a", "", Vec::new()).for_calc())
            .expect("a");
        let b = sheet
            .create_node(FIRST, StatNode::sum("b", "", vec![a]).for_calc())
            .expect("b");
        let plain = sheet.create_node(FIRST, StatNode::simple("p", "", 1)).expect("p");

        assert!(matches!(
            sheet.add_external_ref(a, b),
            Err(MetaCharError::CyclicReference { .. })
        ));
        assert!(matches!(
            sheet.add_external_ref(a, a),
            Err(MetaCharError::CyclicReference { .. })
        ));
        assert!(matches!(
            sheet.add_external_ref(a, plain),
            Err(MetaCharError::NotCalcEligible(_))
        ));
        assert!(matches!(
            sheet.add_external_ref(plain, a),
            Err(MetaCharError::NotASum(_))
        ));
    }

    #[test]
    fn remove_external_ref_takes_first_occurrence() {
        let mut sheet = Sheet::new();
        let prof = sheet
            .create_node(FIRST, StatNode::simple("prof", "", 2).for_calc())
            .expect("prof");
        let total = sheet
            .create_node(FIRST, StatNode::sum("total", "", vec![prof, prof]))
            .expect("total");
        assert_eq!(sheet.value(total), 4);

        sheet.remove_external_ref(total, prof).expect("remove");
        assert_eq!(sheet.value(total), 2);
        sheet.remove_external_ref(total, prof).expect("remove");
        assert!(matches!(
            sheet.remove_external_ref(total, prof),
            Err(MetaCharError::NotFound(_))
        ));
    }

    #[test]
    fn set_field_reference_fields_take_indices() {
        let mut sheet = Sheet::new();
        let hp = sheet
            .create_node(FIRST, StatNode::counter("HP", "", 9).for_calc())
            .expect("hp");
        let half = sheet
            .create_node(
                FIRST,
                StatNode::fraction("half", "", None, NonZeroI64::MIN, true),
            )
            .expect("half");

        sheet.set_field(half, Field::Divisor, "2").expect("divisor");
        sheet.set_field(half, Field::Dividend, "0").expect("dividend");
        assert_eq!(sheet.value(half), 4);
        sheet.set_field(half, Field::Dividend, "None").expect("clear");
        assert_eq!(sheet.value(half), 0);

        let total = sheet
            .create_node(FIRST, StatNode::sum("total", "", Vec::new()))
            .expect("total");
        sheet.set_field(total, Field::ExternalRefs, "0,0").expect("refs");
        assert_eq!(sheet.value(total), 18);
        assert_eq!(hp, NodeId(0));
    }

    #[test]
    fn set_field_errors() {
        let mut sheet = Sheet::new();
        let half = sheet
            .create_default(NodeKind::Fraction, FIRST)
            .expect("fraction");
        assert!(matches!(
            sheet.set_field(half, Field::Divisor, "0"),
            Err(MetaCharError::ZeroDivisor)
        ));
        assert!(matches!(
            sheet.set_field(half, Field::Text, "hello"),
            Err(MetaCharError::FieldNotApplicable { .. })
        ));
        sheet.set_field(half, Field::Divisor, "many").expect("lenient");
        if let NodeBody::Fraction(body) = &sheet.node(half).expect("node").body {
            assert_eq!(body.divisor.get(), 1);
        }
    }

    #[test]
    fn counter_adjust_and_reset() {
        let mut sheet = Sheet::new();
        let hp = sheet
            .create_node(FIRST, StatNode::counter("HP", "", 8))
            .expect("hp");

        assert_eq!(sheet.adjust_counter(hp, -3).expect("dec"), 5);
        assert_eq!(sheet.published_text(hp), Some("5"));
        assert_eq!(sheet.reset_counter(hp).expect("reset"), 8);

        let plain = sheet.create_node(FIRST, StatNode::plain("p", "")).expect("p");
        assert!(sheet.adjust_counter(plain, 1).is_err());
    }

    #[test]
    fn pages_and_colors() {
        let mut sheet = Sheet::new();
        let second = sheet.add_page();
        assert_eq!(second, PageId(1));

        sheet
            .set_page_color(second, Rgb { red: 2.0, green: 0.5, blue: -1.0 })
            .expect("color");
        assert_eq!(sheet.pages()[1].color, Rgb::new(1.0, 0.5, 0.0));
        assert!(sheet.set_page_color(PageId(9), Rgb::default()).is_err());
    }

    #[test]
    fn failed_load_keeps_sheet() {
        let mut sheet = Sheet::new();
        sheet
            .create_node(FIRST, StatNode::simple("Prof", "", 2))
            .expect("create");
        let before = sheet.clone();

        assert!(sheet.load("<masterstatlist><Bogus></Bogus></masterstatlist><MCpages></MCpages>").is_err());
        assert_eq!(sheet, before);
        assert_eq!(sheet.registry().len(), 1);
    }

    #[test]
    fn deeply_nested_document_is_rejected() {
        let mut sheet = Sheet::new();
        sheet
            .create_node(FIRST, StatNode::simple("Prof", "", 2))
            .expect("create");
        let before = sheet.clone();

        let nested = format!(
            "<masterstatlist></masterstatlist><MCpages>{}</MCpages>",
            "<BoxOfStats>".repeat(100_000)
        );
        assert!(matches!(
            sheet.load(&nested),
            Err(MetaCharError::MalformedDocument(_))
        ));
        assert_eq!(sheet, before);
    }

    #[test]
    fn long_reference_chain_survives_reload() {
        let mut sheet = Sheet::new();
        let mut previous = sheet
            .create_node(FIRST, StatNode::simple("Base", "", 3).for_calc())
            .expect("base");
        for step in 0..1000 {
            previous = sheet
                .create_node(
                    FIRST,
                    StatNode::sum(format!("Step {step}"), "", vec![previous]).for_calc(),
                )
                .expect("step");
        }

        assert_eq!(sheet.value(previous), 3);
        assert_eq!(sheet.published_text(previous), Some("3"));

        let reloaded = Sheet::from_text(&sheet.save()).expect("reload");
        assert_eq!(reloaded.value(previous), 3);
        assert_eq!(reloaded, sheet);
    }

    #[test]
    fn non_finite_width_is_normalized() {
        let mut sheet = Sheet::new();
        let mut wide = StatNode::simple("Wide", "", 1);
        wide.button_width = f64::INFINITY;
        let blank = sheet.create_node(FIRST, wide).expect("wide");

        let mut owner = StatNode::sum("Total", "", Vec::new());
        owner.button_width = 4.0;
        let total = sheet.create_node(FIRST, owner).expect("total");

        let mut broken = StatNode::simple("Broken", "", 1);
        broken.button_width = f64::NAN;
        let child = sheet.add_owned_child(total, broken).expect("child");

        assert_eq!(sheet.node(blank).expect("node").button_width, DEFAULT_BUTTON_WIDTH);
        assert_eq!(sheet.node(total).expect("node").button_width, 1.0);
        assert_eq!(sheet.node(child).expect("node").button_width, DEFAULT_BUTTON_WIDTH);

        let reloaded = Sheet::from_text(&sheet.save()).expect("reload");
        assert_eq!(reloaded, sheet);
    }

    #[test]
    fn equality_ignores_tombstones() {
        let mut left = Sheet::new();
        let gone = left.create_node(FIRST, StatNode::plain("gone", "")).expect("gone");
        left.create_node(FIRST, StatNode::simple("kept", "", 1)).expect("kept");
        left.delete_node(gone).expect("delete");

        let mut right = Sheet::new();
        right.create_node(FIRST, StatNode::simple("kept", "", 1)).expect("kept");

        assert_eq!(left, right);
        assert_eq!(Sheet::from_text(&left.save()).expect("reload"), right);
    }

    #[test]
    fn clear_resets_everything() {
        let mut sheet = Sheet::new();
        sheet.add_page();
        sheet.create_node(FIRST, StatNode::plain("x", "")).expect("x");
        sheet.clear();
        assert_eq!(sheet, Sheet::new());
        assert_eq!(sheet.registry().len(), 0);
    }
}

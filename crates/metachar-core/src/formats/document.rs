//! # Sheet Documents
//!
//! Whole-sheet text format: a header line, the registry in index order,
//! then the pages.
//!
//! ```text
//! #MetaChar version 0.0
//!
//! <masterstatlist>
//!
//! <StatBarSimple>
//! <statname>Proficiency bonus</statname>
//! ...
//! </StatBarSimple>
//!
//! </masterstatlist>
//!
//! <MCpages>
//!
//! <BoxOfStats>
//! ...
//! <statlist>0,1</statlist>
//! </BoxOfStats>
//!
//! </MCpages>
//! ```
//!
//! References are written as registry indices. Loading runs in two passes
//! so that an index may point forward or backward: first every node is
//! constructed with its scalar attributes, then reference lists are
//! resolved against the complete registry.

use super::tagged::{Element, close_tag, open_tag, parse_elements, write_leaf};
use crate::edit::{Decode, Field, apply_scalar, decode_float, field_text};
use crate::primitives::{
    FORMAT_VERSION, HEADER_PREFIX, NONE_LITERAL, PAGE_TAG, PAGES_TAG, REGISTRY_TAG,
};
use crate::registry::Registry;
use crate::{MetaCharError, NodeBody, NodeId, NodeKind, Page, Rgb, StatNode};
use std::collections::BTreeMap;

/// Registry and pages read from a document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub registry: Registry,
    pub pages: Vec<Page>,
    /// Version string from the header line, if present.
    pub version: Option<String>,
}

// =============================================================================
// WRITER
// =============================================================================

/// Serialize the live part of a registry and its pages.
///
/// Removed nodes are skipped and the rest renumbered densely, so the output
/// always loads back.
#[must_use]
pub fn write_document(registry: &Registry, pages: &[Page]) -> String {
    let (compact, remap) = registry.compact();
    let translate = |id: &NodeId| remap.get(id.0).copied().flatten();

    let mut out = format!("{HEADER_PREFIX}{FORMAT_VERSION}\n\n");

    out.push_str(&format!("<{REGISTRY_TAG}>\n\n"));
    for (_, node) in compact.iter() {
        write_node(&mut out, node);
        out.push('\n');
    }
    out.push_str(&format!("</{REGISTRY_TAG}>\n\n"));

    out.push_str(&format!("<{PAGES_TAG}>\n\n"));
    for page in pages {
        let members: Vec<NodeId> = page.nodes().iter().filter_map(translate).collect();
        open_tag(&mut out, PAGE_TAG);
        write_leaf(&mut out, "red_bg", &page.color.red.to_string());
        write_leaf(&mut out, "green_bg", &page.color.green.to_string());
        write_leaf(&mut out, "blue_bg", &page.color.blue.to_string());
        write_leaf(&mut out, "statlist", &join_indices(&members));
        close_tag(&mut out, PAGE_TAG);
        out.push('\n');
    }
    out.push_str(&format!("</{PAGES_TAG}>\n\n"));

    out
}

fn write_node(out: &mut String, node: &StatNode) {
    let kind = node.kind();
    open_tag(out, kind.tag());

    for field in [
        Field::Name,
        Field::Description,
        Field::CalcEligible,
        Field::ButtonWidth,
    ] {
        write_field(out, node, field);
    }

    match &node.body {
        NodeBody::Sum(body) | NodeBody::Ability(body) => {
            write_leaf(out, Field::ExternalRefs.tag(), &join_indices(&body.external_refs));
            write_leaf(
                out,
                Field::OwnedChildren.tag(),
                &join_indices(body.owned_children()),
            );
            write_field(out, node, Field::Signed);
        }
        NodeBody::Fraction(body) => {
            let dividend = body
                .dividend
                .map_or_else(|| NONE_LITERAL.to_string(), |id| id.0.to_string());
            write_leaf(out, Field::Dividend.tag(), &dividend);
            for field in [Field::Divisor, Field::RoundDown, Field::Signed] {
                write_field(out, node, field);
            }
        }
        _ => {
            for field in body_fields(kind) {
                write_field(out, node, *field);
            }
        }
    }

    close_tag(out, kind.tag());
}

fn write_field(out: &mut String, node: &StatNode, field: Field) {
    if let Some(text) = field_text(node, field) {
        write_leaf(out, field.tag(), &text);
    }
}

/// Scalar attributes written after the common ones, per kind.
const fn body_fields(kind: NodeKind) -> &'static [Field] {
    match kind {
        NodeKind::Simple => &[Field::Value, Field::Signed],
        NodeKind::Text => &[Field::Text],
        NodeKind::Counter => &[Field::DefaultValue, Field::CurrentValue],
        NodeKind::TwoButtons => &[Field::Name2, Field::Description2],
        NodeKind::ThreeButtons => &[
            Field::Name2,
            Field::Description2,
            Field::Name3,
            Field::Description3,
        ],
        NodeKind::Plain | NodeKind::Sum | NodeKind::Ability | NodeKind::Fraction => &[],
    }
}

fn join_indices(ids: &[NodeId]) -> String {
    ids.iter()
        .map(|id| id.0.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

// =============================================================================
// READER
// =============================================================================

/// Reference attributes held back until every node exists.
#[derive(Debug, Default)]
struct Deferred {
    external_refs: Option<String>,
    owned_children: Option<String>,
    dividend: Option<String>,
}

/// Parse a whole document.
///
/// Nothing outside the returned value is touched, so a failed read leaves
/// the caller's state as it was.
pub fn read_document(text: &str) -> Result<Document, MetaCharError> {
    let (version, body) = split_header(text);
    let elements = parse_elements(body)?;

    let mut registry_section = None;
    let mut pages_section = None;
    for element in &elements {
        match element.name.as_str() {
            REGISTRY_TAG if registry_section.is_none() => registry_section = Some(element),
            PAGES_TAG if pages_section.is_none() => pages_section = Some(element),
            other => tracing::warn!(tag = other, "skipping unexpected top-level element"),
        }
    }
    let registry_section = registry_section.ok_or_else(|| {
        MetaCharError::MalformedDocument(format!("missing <{REGISTRY_TAG}> section"))
    })?;
    let pages_section = pages_section.ok_or_else(|| {
        MetaCharError::MalformedDocument(format!("missing <{PAGES_TAG}> section"))
    })?;

    // Pass 1: construct nodes with scalar attributes.
    let mut registry = Registry::new();
    let mut deferred = Vec::new();
    for element in registry_section.children()? {
        let (node, refs) = construct_node(element)?;
        registry.create(node);
        deferred.push(refs);
    }

    // Pass 2: resolve references against the full registry.
    let mut claimed: BTreeMap<NodeId, NodeId> = BTreeMap::new();
    for (index, refs) in deferred.into_iter().enumerate() {
        resolve_node(&mut registry, NodeId(index), refs, &mut claimed)?;
    }
    reject_cycles(&registry)?;

    let mut pages = Vec::new();
    let mut on_page: BTreeMap<NodeId, usize> = BTreeMap::new();
    for element in pages_section.children()? {
        if element.name != PAGE_TAG {
            tracing::warn!(tag = %element.name, "skipping unexpected page element");
            continue;
        }
        let page = read_page(element, &registry, &claimed, &mut on_page, pages.len())?;
        pages.push(page);
    }

    tracing::debug!(
        nodes = registry.len(),
        pages = pages.len(),
        "document loaded"
    );

    Ok(Document {
        registry,
        pages,
        version,
    })
}

/// Split off an optional `#...` first line, capturing the version it names.
fn split_header(text: &str) -> (Option<String>, &str) {
    let trimmed = text.trim_start();
    if !trimmed.starts_with('#') {
        return (None, text);
    }
    let (line, rest) = trimmed.split_once('\n').unwrap_or((trimmed, ""));
    let version = line
        .strip_prefix(HEADER_PREFIX)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    (version, rest)
}

fn construct_node(element: &Element) -> Result<(StatNode, Deferred), MetaCharError> {
    let kind = NodeKind::from_tag(&element.name)
        .ok_or_else(|| MetaCharError::UnknownNodeKind(element.name.clone()))?;

    let mut node = StatNode::new("", "", NodeBody::default_for(kind));
    let mut deferred = Deferred::default();

    for attribute in element.children()? {
        let Some(field) = Field::from_tag(&attribute.name) else {
            tracing::warn!(tag = %attribute.name, kind = %kind, "skipping unknown attribute");
            continue;
        };
        if !field.applies_to(kind) {
            tracing::warn!(field = field.tag(), kind = %kind, "skipping attribute of another kind");
            continue;
        }

        let raw = attribute.text()?;
        match field {
            Field::ExternalRefs => deferred.external_refs = Some(raw.to_string()),
            Field::OwnedChildren => deferred.owned_children = Some(raw.to_string()),
            Field::Dividend => deferred.dividend = Some(raw.to_string()),
            _ => apply_scalar(&mut node, field, raw, Decode::Strict)?,
        }
    }

    Ok((node, deferred))
}

fn resolve_node(
    registry: &mut Registry,
    id: NodeId,
    refs: Deferred,
    claimed: &mut BTreeMap<NodeId, NodeId>,
) -> Result<(), MetaCharError> {
    let len = registry.len();

    let external = match &refs.external_refs {
        Some(raw) => parse_indices(Field::ExternalRefs.tag(), raw, len)?,
        None => Vec::new(),
    };
    let children = match &refs.owned_children {
        Some(raw) => parse_indices(Field::OwnedChildren.tag(), raw, len)?,
        None => Vec::new(),
    };
    let dividend = match refs.dividend.as_deref().map(str::trim) {
        None | Some(NONE_LITERAL) | Some("") => None,
        Some(raw) => Some(parse_index(Field::Dividend.tag(), raw, len)?),
    };

    for child in &children {
        if claimed.insert(*child, id).is_some() {
            return Err(MetaCharError::CorruptField {
                field: Field::OwnedChildren.tag().to_string(),
                value: child.0.to_string(),
            });
        }
        registry.set_owner(*child, Some(id));
    }

    match &mut registry.node_mut(id)?.body {
        NodeBody::Sum(body) | NodeBody::Ability(body) => {
            body.external_refs = external;
            body.owned_children = children;
        }
        NodeBody::Fraction(body) => body.dividend = dividend,
        _ => {}
    }
    Ok(())
}

fn reject_cycles(registry: &Registry) -> Result<(), MetaCharError> {
    for (id, node) in registry.iter() {
        for dependency in node.body.dependencies() {
            if registry.would_cycle(id, dependency) {
                return Err(MetaCharError::CyclicReference {
                    from: id,
                    to: dependency,
                });
            }
        }
    }
    Ok(())
}

fn read_page(
    element: &Element,
    registry: &Registry,
    claimed: &BTreeMap<NodeId, NodeId>,
    on_page: &mut BTreeMap<NodeId, usize>,
    page_index: usize,
) -> Result<Page, MetaCharError> {
    let mut color = Rgb::default();
    let mut members = Vec::new();

    for attribute in element.children()? {
        let raw = attribute.text()?;
        match attribute.name.as_str() {
            "red_bg" => color.red = decode_channel(&attribute.name, raw)?,
            "green_bg" => color.green = decode_channel(&attribute.name, raw)?,
            "blue_bg" => color.blue = decode_channel(&attribute.name, raw)?,
            "statlist" => members = parse_indices(&attribute.name, raw, registry.len())?,
            other => tracing::warn!(tag = other, "skipping unknown page attribute"),
        }
    }

    for member in &members {
        if claimed.contains_key(member) || on_page.insert(*member, page_index).is_some() {
            return Err(MetaCharError::CorruptField {
                field: "statlist".to_string(),
                value: member.0.to_string(),
            });
        }
    }

    let mut page = Page::with_color(Rgb::new(color.red, color.green, color.blue));
    page.nodes = members;
    Ok(page)
}

fn decode_channel(tag: &str, raw: &str) -> Result<f64, MetaCharError> {
    decode_float(Field::ButtonWidth, raw).map_err(|_| MetaCharError::CorruptField {
        field: tag.to_string(),
        value: raw.to_string(),
    })
}

/// Parse a comma-joined index list. Empty entries are ignored.
fn parse_indices(tag: &str, raw: &str, len: usize) -> Result<Vec<NodeId>, MetaCharError> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| parse_index(tag, part, len))
        .collect()
}

fn parse_index(tag: &str, raw: &str, len: usize) -> Result<NodeId, MetaCharError> {
    let index = raw
        .trim()
        .parse::<usize>()
        .map_err(|_| MetaCharError::CorruptField {
            field: tag.to_string(),
            value: raw.to_string(),
        })?;
    if index >= len {
        return Err(MetaCharError::DanglingReference { index, len });
    }
    Ok(NodeId(index))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ValueEngine;

    const SMALL: &str = "#MetaChar version 0.0

<masterstatlist>

<StatBarSimple>
<statname>Prof</statname>
<statdesc>Proficiency bonus</statdesc>
<calcavail>True</calcavail>
<statbtn.size_hint_x>0.5</statbtn.size_hint_x>
<statval>2</statval>
<showplus>True</showplus>
</StatBarSimple>

<StatBarSum>
<statname>Athletics</statname>
<statdesc></statdesc>
<calcavail>False</calcavail>
<statbtn.size_hint_x>0.5</statbtn.size_hint_x>
<statlist_existing>0</statlist_existing>
<childstats.statlist>2</childstats.statlist>
<showplus>True</showplus>
</StatBarSum>

<StatBarSimple>
<statname>Trained</statname>
<statdesc></statdesc>
<calcavail>False</calcavail>
<statbtn.size_hint_x>0.5</statbtn.size_hint_x>
<statval>1</statval>
<showplus>False</showplus>
</StatBarSimple>

</masterstatlist>

<MCpages>

<BoxOfStats>
<red_bg>0.25</red_bg>
<green_bg>0.5</green_bg>
<blue_bg>1</blue_bg>
<statlist>0,1</statlist>
</BoxOfStats>

</MCpages>

";

    #[test]
    fn reads_small_document() {
        let doc = read_document(SMALL).expect("read");

        assert_eq!(doc.version.as_deref(), Some("0.0"));
        assert_eq!(doc.registry.len(), 3);
        assert_eq!(doc.pages.len(), 1);
        assert_eq!(doc.pages[0].nodes(), &[NodeId(0), NodeId(1)]);
        assert_eq!(doc.pages[0].color, Rgb::new(0.25, 0.5, 1.0));
        assert_eq!(doc.registry.owner(NodeId(2)), Some(NodeId(1)));
        assert_eq!(ValueEngine::display_text(&doc.registry, NodeId(1)), "+3");
    }

    #[test]
    fn writer_reproduces_document() {
        let doc = read_document(SMALL).expect("read");
        assert_eq!(write_document(&doc.registry, &doc.pages), SMALL);
    }

    #[test]
    fn forward_references_resolve() {
        let text = "<masterstatlist>
<StatBarSum><statname>Total</statname><statlist_existing>1</statlist_existing></StatBarSum>
<StatBarCounter><statname>HP</statname><defaultval>8</defaultval><currentval>5</currentval></StatBarCounter>
</masterstatlist>
<MCpages></MCpages>";
        let doc = read_document(text).expect("read");

        assert_eq!(doc.version, None);
        assert_eq!(ValueEngine::value_for_sum(&doc.registry, NodeId(0)), 5);
        assert!(doc.pages.is_empty());
    }

    #[test]
    fn missing_attributes_take_defaults() {
        let text = "<masterstatlist><StatBarFraction><statname>Half</statname></StatBarFraction>\
                    </masterstatlist><MCpages></MCpages>";
        let doc = read_document(text).expect("read");
        let node = doc.registry.get(NodeId(0)).expect("node");

        assert_eq!(node.body, NodeBody::default_for(NodeKind::Fraction));
        assert!(!node.calc_eligible);
    }

    #[test]
    fn unknown_attribute_is_skipped() {
        let text = "<masterstatlist><StatBarSimple><statname>A</statname><glow>yes</glow>\
                    <statval>4</statval></StatBarSimple></masterstatlist><MCpages></MCpages>";
        let doc = read_document(text).expect("read");
        assert_eq!(ValueEngine::value_for_sum(&doc.registry, NodeId(0)), 4);
    }

    #[test]
    fn unknown_kind_fails() {
        let text = "<masterstatlist><StatBarWizard></StatBarWizard></masterstatlist><MCpages></MCpages>";
        assert!(matches!(
            read_document(text),
            Err(MetaCharError::UnknownNodeKind(tag)) if tag == "StatBarWizard"
        ));
    }

    #[test]
    fn out_of_range_reference_fails() {
        let text = "<masterstatlist><StatBarSum><statlist_existing>0,7</statlist_existing>\
                    </StatBarSum></masterstatlist><MCpages></MCpages>";
        assert!(matches!(
            read_document(text),
            Err(MetaCharError::DanglingReference { index: 7, len: 1 })
        ));
    }

    #[test]
    fn zero_divisor_fails() {
        let text = "<masterstatlist><StatBarFraction><divisor>0</divisor></StatBarFraction>\
                    </masterstatlist><MCpages></MCpages>";
        assert!(matches!(read_document(text), Err(MetaCharError::ZeroDivisor)));
    }

    #[test]
    fn malformed_scalar_fails() {
        let text = "<masterstatlist><StatBarCounter><defaultval>lots</defaultval></StatBarCounter>\
                    </masterstatlist><MCpages></MCpages>";
        assert!(matches!(
            read_document(text),
            Err(MetaCharError::CorruptField { field, .. }) if field == "defaultval"
        ));
    }

    #[test]
    fn doubly_owned_child_fails() {
        let text = "<masterstatlist>\
                    <StatBarSum><childstats.statlist>2</childstats.statlist></StatBarSum>\
                    <StatBarSum><childstats.statlist>2</childstats.statlist></StatBarSum>\
                    <StatBarSimple></StatBarSimple>\
                    </masterstatlist><MCpages></MCpages>";
        assert!(matches!(
            read_document(text),
            Err(MetaCharError::CorruptField { .. })
        ));
    }

    #[test]
    fn owned_child_on_page_fails() {
        let text = "<masterstatlist>\
                    <StatBarSum><childstats.statlist>1</childstats.statlist></StatBarSum>\
                    <StatBarSimple></StatBarSimple>\
                    </masterstatlist><MCpages><BoxOfStats><statlist>0,1</statlist></BoxOfStats></MCpages>";
        assert!(matches!(
            read_document(text),
            Err(MetaCharError::CorruptField { field, .. }) if field == "statlist"
        ));
    }

    #[test]
    fn corrupt_page_list_names_its_tag() {
        let text = "<masterstatlist><StatBarSimple></StatBarSimple></masterstatlist>\
                    <MCpages><BoxOfStats><statlist>0,x</statlist></BoxOfStats></MCpages>";
        assert!(matches!(
            read_document(text),
            Err(MetaCharError::CorruptField { field, value }) if field == "statlist" && value == "x"
        ));
    }

    #[test]
    fn cycle_fails() {
        let text = "<masterstatlist>\
                    <StatBarSum><statlist_existing>1</statlist_existing></StatBarSum>\
                    <StatBarSum><statlist_existing>0</statlist_existing></StatBarSum>\
                    </masterstatlist><MCpages></MCpages>";
        assert!(matches!(
            read_document(text),
            Err(MetaCharError::CyclicReference { .. })
        ));
    }

    #[test]
    fn missing_sections_fail() {
        assert!(matches!(
            read_document("<MCpages></MCpages>"),
            Err(MetaCharError::MalformedDocument(_))
        ));
        assert!(matches!(
            read_document("<masterstatlist></masterstatlist>"),
            Err(MetaCharError::MalformedDocument(_))
        ));
    }

    #[test]
    fn writer_drops_removed_nodes() {
        let mut registry = Registry::new();
        let gone = registry.create(StatNode::simple("gone", "", 1).for_calc());
        let kept = registry.create(StatNode::simple("kept", "", 2).for_calc());
        let total = registry.create(StatNode::sum("total", "", vec![gone, kept]));
        registry.remove(gone).expect("remove");
        let mut page = Page::new();
        page.nodes = vec![kept, total];

        let text = write_document(&registry, &[page]);
        let doc = read_document(&text).expect("read");

        assert_eq!(doc.registry.len(), 2);
        assert_eq!(doc.pages[0].nodes(), &[NodeId(0), NodeId(1)]);
        assert_eq!(ValueEngine::value_for_sum(&doc.registry, NodeId(1)), 2);
    }
}

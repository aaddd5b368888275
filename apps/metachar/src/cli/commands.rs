//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.
//! Mutating commands load the sheet file, apply one change through the
//! `Sheet` API and write the file back only if the change succeeded.

use super::CounterAction;
use crate::config::TemplateChoice;
use metachar_core::{
    Component, Direction, Field, MetaCharError, NodeBody, NodeId, NodeKind, PageId, Rgb, Sheet,
    StatNode, edit::field_text,
};
use serde::Serialize;
use std::path::Path;

// =============================================================================
// OUTPUT
// =============================================================================

/// How results are printed.
#[derive(Debug, Clone, Copy, Default)]
pub struct Output {
    pub json: bool,
    pub quiet: bool,
}

impl Output {
    fn info(self, message: &str) {
        if !self.quiet && !self.json {
            println!("{message}");
        }
    }

    fn json(self, value: &serde_json::Value) {
        println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
    }
}

/// A node as printed by `show`, with owned children nested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeView {
    pub id: usize,
    pub kind: &'static str,
    pub name: String,
    pub text: String,
    pub children: Vec<NodeView>,
}

impl NodeView {
    fn build(sheet: &Sheet, id: NodeId) -> Result<Self, MetaCharError> {
        let node = sheet.node(id)?;
        let children = node
            .body
            .as_sum()
            .map(|body| body.owned_children().to_vec())
            .unwrap_or_default()
            .into_iter()
            .map(|child| Self::build(sheet, child))
            .collect::<Result<Vec<_>, _>>()?;

        let text = match &node.body {
            NodeBody::TwoButtons { second } => second.name.clone(),
            NodeBody::ThreeButtons { second, third } => {
                format!("{} | {}", second.name, third.name)
            }
            _ => sheet.render_text(id),
        };

        Ok(Self {
            id: id.0,
            kind: node.kind().label(),
            name: node.name.clone(),
            text,
            children,
        })
    }

    fn write(&self, out: &mut String, depth: usize) {
        let indent = "    ".repeat(depth + 1);
        if self.text.is_empty() {
            out.push_str(&format!("{indent}[{}] {}\n", self.id, self.name));
        } else {
            out.push_str(&format!("{indent}[{}] {}  {}\n", self.id, self.name, self.text));
        }
        for child in &self.children {
            child.write(out, depth + 1);
        }
    }
}

/// A page as printed by `show`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageView {
    pub page: usize,
    pub color: Rgb,
    pub nodes: Vec<NodeView>,
}

/// Views of one page, or of every page.
pub fn page_views(sheet: &Sheet, only: Option<PageId>) -> Result<Vec<PageView>, MetaCharError> {
    if let Some(page) = only {
        sheet.page(page)?;
    }

    sheet
        .pages()
        .iter()
        .enumerate()
        .filter(|(index, _)| only.is_none_or(|page| page.0 == *index))
        .map(|(index, page)| -> Result<PageView, MetaCharError> {
            let nodes = page
                .nodes()
                .iter()
                .map(|id| NodeView::build(sheet, *id))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(PageView {
                page: index,
                color: page.color,
                nodes,
            })
        })
        .collect()
}

/// Plain-text rendering of page views.
pub fn render_pages(pages: &[PageView]) -> String {
    let mut out = String::new();
    for view in pages {
        out.push_str(&format!(
            "Page {} ({:.2}, {:.2}, {:.2})\n",
            view.page, view.color.red, view.color.green, view.color.blue
        ));
        if view.nodes.is_empty() {
            out.push_str("    (empty)\n");
        }
        for node in &view.nodes {
            node.write(&mut out, 0);
        }
    }
    out
}

// =============================================================================
// NEW COMMAND
// =============================================================================

/// Create a sheet file from a template.
pub fn cmd_new(
    path: &Path,
    out: Output,
    template: TemplateChoice,
    force: bool,
) -> Result<(), MetaCharError> {
    if path.exists() && !force {
        return Err(MetaCharError::IoError(format!(
            "Sheet '{}' already exists. Use --force to overwrite.",
            path.display()
        )));
    }

    let sheet = template.build()?;
    sheet.write_file(path)?;
    tracing::info!(path = %path.display(), %template, "sheet created");

    if out.json {
        out.json(&serde_json::json!({
            "sheet": path.to_string_lossy(),
            "template": template.to_string(),
            "nodes": sheet.registry().live_count(),
            "pages": sheet.pages().len(),
        }));
    } else {
        out.info(&format!(
            "Created {} sheet at {}",
            template,
            path.display()
        ));
    }
    Ok(())
}

// =============================================================================
// READ-ONLY COMMANDS
// =============================================================================

/// Print pages, or a single node with its fields and breakdown.
pub fn cmd_show(
    path: &Path,
    out: Output,
    page: Option<usize>,
    node: Option<usize>,
) -> Result<(), MetaCharError> {
    let sheet = load_sheet(path)?;

    if let Some(index) = node {
        let id = node_id(&sheet, index)?;
        return show_node(&sheet, out, id);
    }

    let views = page_views(&sheet, page.map(PageId))?;
    if out.json {
        out.json(&serde_json::json!({ "pages": views }));
    } else {
        print!("{}", render_pages(&views));
    }
    Ok(())
}

fn show_node(sheet: &Sheet, out: Output, id: NodeId) -> Result<(), MetaCharError> {
    let node = sheet.node(id)?;
    let kind = node.kind();
    let fields: Vec<(Field, String)> = Field::ALL
        .into_iter()
        .filter(|field| field.applies_to(kind))
        .filter_map(|field| field_text(node, field).map(|text| (field, text)))
        .collect();

    let components = if kind.is_sum() {
        sheet.components(id)?
    } else {
        Vec::new()
    };
    let dividend = match &node.body {
        NodeBody::Fraction(body) => body.dividend,
        _ => None,
    };

    if out.json {
        let field_map: serde_json::Map<String, serde_json::Value> = fields
            .iter()
            .map(|(field, text)| (field.label().to_string(), serde_json::json!(text)))
            .collect();
        out.json(&serde_json::json!({
            "id": id.0,
            "kind": kind.label(),
            "owner": sheet.registry().owner(id).map(|owner| owner.0),
            "page": sheet.page_of(id).map(|page| page.0),
            "text": sheet.render_text(id),
            "fields": field_map,
            "dividend": dividend.map(|d| d.0),
            "components": components,
        }));
        return Ok(());
    }

    println!("[{}] {} ({})", id.0, node.name, kind.label());
    println!("Value: {}", sheet.render_text(id));
    if let Some(owner) = sheet.registry().owner(id) {
        println!("Owner: [{}]", owner.0);
    }
    if let Some(page) = sheet.page_of(id) {
        println!("Page:  {}", page.0);
    }
    println!();
    for (field, text) in &fields {
        println!("  {:<14} {}", field.label(), text);
    }
    if let Some(target) = dividend {
        println!("  {:<14} [{}]", Field::Dividend.label(), target.0);
    }
    if !components.is_empty() {
        println!();
        println!("Breakdown:");
        for Component {
            id,
            name,
            text,
            owned,
        } in &components
        {
            let marker = if *owned { "owned" } else { "ref" };
            println!("  [{}] {:<20} {:>8}  ({})", id.0, name, text, marker);
        }
    }
    Ok(())
}

/// Show sheet counts.
pub fn cmd_status(path: &Path, out: Output) -> Result<(), MetaCharError> {
    let sheet = load_sheet(path)?;
    let counts = kind_counts(&sheet);

    if out.json {
        let by_kind: serde_json::Map<String, serde_json::Value> = counts
            .iter()
            .map(|(kind, count)| (kind.label().to_string(), serde_json::json!(count)))
            .collect();
        out.json(&serde_json::json!({
            "sheet": path.to_string_lossy(),
            "version": sheet.source_version(),
            "nodes": sheet.registry().live_count(),
            "pages": sheet.pages().len(),
            "calc_candidates": sheet.calc_candidates().len(),
            "kinds": by_kind,
        }));
        return Ok(());
    }

    println!("MetaChar Sheet Status");
    println!("=====================");
    println!("Sheet:   {}", path.display());
    println!("Version: {}", sheet.source_version().unwrap_or("unknown"));
    println!();
    println!("Nodes:             {}", sheet.registry().live_count());
    println!("Pages:             {}", sheet.pages().len());
    println!("Calc candidates:   {}", sheet.calc_candidates().len());
    for (kind, count) in &counts {
        println!("  {:<16} {}", kind.label(), count);
    }
    Ok(())
}

/// Live node count per kind, skipping kinds with none.
pub fn kind_counts(sheet: &Sheet) -> Vec<(NodeKind, usize)> {
    NodeKind::ALL
        .into_iter()
        .map(|kind| {
            let count = sheet
                .registry()
                .iter()
                .filter(|(_, node)| node.kind() == kind)
                .count();
            (kind, count)
        })
        .filter(|(_, count)| *count > 0)
        .collect()
}

/// Load a sheet and confirm that saving it reproduces the same sheet.
pub fn cmd_check(path: &Path, out: Output) -> Result<(), MetaCharError> {
    let sheet = load_sheet(path)?;
    let reloaded = Sheet::from_text(&sheet.save())?;
    if reloaded != sheet {
        return Err(MetaCharError::MalformedDocument(
            "sheet does not survive a save and reload".to_string(),
        ));
    }

    if out.json {
        out.json(&serde_json::json!({
            "sheet": path.to_string_lossy(),
            "ok": true,
            "nodes": sheet.registry().live_count(),
            "pages": sheet.pages().len(),
        }));
    } else {
        out.info(&format!(
            "{}: OK ({} nodes on {} pages)",
            path.display(),
            sheet.registry().live_count(),
            sheet.pages().len()
        ));
    }
    Ok(())
}

/// List nodes that sums and fractions may reference.
pub fn cmd_candidates(path: &Path, out: Output) -> Result<(), MetaCharError> {
    let sheet = load_sheet(path)?;
    let candidates = sheet
        .calc_candidates()
        .into_iter()
        .map(|id| NodeView::build(&sheet, id))
        .collect::<Result<Vec<_>, _>>()?;

    if out.json {
        out.json(&serde_json::json!({ "candidates": candidates }));
        return Ok(());
    }
    for candidate in &candidates {
        println!("[{}] {}  {}", candidate.id, candidate.name, candidate.text);
    }
    Ok(())
}

/// List the editable fields of a node kind.
pub fn cmd_fields(out: Output, kind: NodeKind) -> Result<(), MetaCharError> {
    let fields: Vec<Field> = Field::ALL
        .into_iter()
        .filter(|field| field.applies_to(kind))
        .collect();

    if out.json {
        let list: Vec<serde_json::Value> = fields
            .iter()
            .map(|field| serde_json::json!({ "name": field.label(), "tag": field.tag() }))
            .collect();
        out.json(&serde_json::json!({ "kind": kind.label(), "fields": list }));
        return Ok(());
    }
    for field in &fields {
        println!("{:<14} <{}>", field.label(), field.tag());
    }
    Ok(())
}

// =============================================================================
// NODE COMMANDS
// =============================================================================

/// Add a node to a page, or as an owned child of a sum.
pub fn cmd_add(
    path: &Path,
    out: Output,
    kind: NodeKind,
    page: usize,
    owner: Option<usize>,
    fields: &[(Field, String)],
) -> Result<(), MetaCharError> {
    let mut sheet = load_sheet(path)?;

    let id = match owner {
        Some(index) => {
            let owner = node_id(&sheet, index)?;
            let child = sheet
                .add_owned_child(owner, StatNode::new("", "", NodeBody::default_for(kind)))?;
            for (field, raw) in fields {
                sheet.set_field(child, *field, raw)?;
            }
            child
        }
        None => sheet.create_with_fields(kind, PageId(page), fields)?,
    };

    store_sheet(&sheet, path)?;
    tracing::debug!(id = id.0, %kind, "node added");
    report(out, &sheet, id, "Added")
}

/// Delete a node and everything it owns.
pub fn cmd_delete(path: &Path, out: Output, index: usize) -> Result<(), MetaCharError> {
    let mut sheet = load_sheet(path)?;
    let id = node_id(&sheet, index)?;
    let name = sheet.node(id)?.name.clone();
    let before = sheet.registry().live_count();

    sheet.delete_node(id)?;
    store_sheet(&sheet, path)?;
    let removed = before.saturating_sub(sheet.registry().live_count());

    if out.json {
        out.json(&serde_json::json!({ "deleted": index, "removed": removed }));
    } else {
        out.info(&format!("Deleted [{index}] {name} ({removed} nodes removed)"));
    }
    Ok(())
}

/// Set one field of a node from text.
pub fn cmd_set(
    path: &Path,
    out: Output,
    index: usize,
    field: Field,
    value: &str,
) -> Result<(), MetaCharError> {
    let mut sheet = load_sheet(path)?;
    let id = node_id(&sheet, index)?;
    sheet.set_field(id, field, value)?;
    store_sheet(&sheet, path)?;
    report(out, &sheet, id, "Updated")
}

pub fn cmd_link(path: &Path, out: Output, sum: usize, target: usize) -> Result<(), MetaCharError> {
    let mut sheet = load_sheet(path)?;
    let sum = node_id(&sheet, sum)?;
    let target = node_id(&sheet, target)?;
    sheet.add_external_ref(sum, target)?;
    store_sheet(&sheet, path)?;
    report(out, &sheet, sum, "Linked")
}

pub fn cmd_unlink(
    path: &Path,
    out: Output,
    sum: usize,
    target: usize,
) -> Result<(), MetaCharError> {
    let mut sheet = load_sheet(path)?;
    let sum = node_id(&sheet, sum)?;
    // A dangling reference can still be unlinked by index.
    sheet.remove_external_ref(sum, NodeId(target))?;
    store_sheet(&sheet, path)?;
    report(out, &sheet, sum, "Unlinked")
}

pub fn cmd_dividend(
    path: &Path,
    out: Output,
    fraction: usize,
    target: Option<usize>,
) -> Result<(), MetaCharError> {
    let mut sheet = load_sheet(path)?;
    let fraction = node_id(&sheet, fraction)?;
    let target = target.map(|index| node_id(&sheet, index)).transpose()?;
    sheet.set_dividend(fraction, target)?;
    store_sheet(&sheet, path)?;
    report(out, &sheet, fraction, "Updated")
}

/// Increment, decrement or reset a counter.
pub fn cmd_counter(
    path: &Path,
    out: Output,
    index: usize,
    action: CounterAction,
    by: i64,
) -> Result<(), MetaCharError> {
    let mut sheet = load_sheet(path)?;
    let id = node_id(&sheet, index)?;
    let value = match action {
        CounterAction::Inc => sheet.adjust_counter(id, by)?,
        CounterAction::Dec => sheet.adjust_counter(id, by.saturating_neg())?,
        CounterAction::Reset => sheet.reset_counter(id)?,
    };
    store_sheet(&sheet, path)?;

    if out.json {
        out.json(&serde_json::json!({ "id": index, "value": value }));
    } else {
        out.info(&format!("[{index}] {}  {value}", sheet.node(id)?.name));
    }
    Ok(())
}

// =============================================================================
// PAGE COMMANDS
// =============================================================================

pub fn cmd_add_page(path: &Path, out: Output, color: Option<Rgb>) -> Result<(), MetaCharError> {
    let mut sheet = load_sheet(path)?;
    let page = sheet.add_page();
    if let Some(color) = color {
        sheet.set_page_color(page, color)?;
    }
    store_sheet(&sheet, path)?;

    if out.json {
        out.json(&serde_json::json!({ "page": page.0 }));
    } else {
        out.info(&format!("Added page {}", page.0));
    }
    Ok(())
}

/// Move a node one place up or down among its siblings.
pub fn cmd_move(
    path: &Path,
    out: Output,
    index: usize,
    direction: Direction,
) -> Result<(), MetaCharError> {
    let mut sheet = load_sheet(path)?;
    let id = node_id(&sheet, index)?;
    sheet.move_node(id, direction)?;
    store_sheet(&sheet, path)?;

    if out.json {
        out.json(&serde_json::json!({ "id": index, "moved": direction.to_string() }));
    } else {
        out.info(&format!("Moved [{index}] {direction}"));
    }
    Ok(())
}

pub fn cmd_reorder(
    path: &Path,
    out: Output,
    page: usize,
    order: &[usize],
) -> Result<(), MetaCharError> {
    let mut sheet = load_sheet(path)?;
    sheet.reorder_page(PageId(page), order)?;
    store_sheet(&sheet, path)?;

    let nodes: Vec<usize> = sheet
        .page(PageId(page))?
        .nodes()
        .iter()
        .map(|id| id.0)
        .collect();
    if out.json {
        out.json(&serde_json::json!({ "page": page, "nodes": nodes }));
    } else {
        out.info(&format!("Page {page} reordered"));
    }
    Ok(())
}

pub fn cmd_color(path: &Path, out: Output, page: usize, color: Rgb) -> Result<(), MetaCharError> {
    let mut sheet = load_sheet(path)?;
    sheet.set_page_color(PageId(page), color)?;
    store_sheet(&sheet, path)?;

    if out.json {
        out.json(&serde_json::json!({ "page": page, "color": sheet.page(PageId(page))?.color }));
    } else {
        out.info(&format!("Page {page} colour set"));
    }
    Ok(())
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Read the sheet file, with a hint when it does not exist yet.
pub fn load_sheet(path: &Path) -> Result<Sheet, MetaCharError> {
    if !path.is_file() {
        return Err(MetaCharError::IoError(format!(
            "Sheet '{}' not found. Create one with `metachar new`.",
            path.display()
        )));
    }
    let sheet = Sheet::read_file(path)?;
    tracing::debug!(
        path = %path.display(),
        nodes = sheet.registry().live_count(),
        "sheet loaded"
    );
    Ok(sheet)
}

fn store_sheet(sheet: &Sheet, path: &Path) -> Result<(), MetaCharError> {
    sheet.write_file(path)?;
    tracing::debug!(path = %path.display(), "sheet saved");
    Ok(())
}

/// Resolve a user-supplied index to a live node.
fn node_id(sheet: &Sheet, index: usize) -> Result<NodeId, MetaCharError> {
    sheet.registry().by_index(index)
}

/// Print the node an edit touched, with its current display text.
fn report(out: Output, sheet: &Sheet, id: NodeId, verb: &str) -> Result<(), MetaCharError> {
    let view = NodeView::build(sheet, id)?;
    if out.json {
        out.json(&serde_json::json!({ "node": view }));
    } else if view.text.is_empty() {
        out.info(&format!("{verb} [{}] {}", view.id, view.name));
    } else {
        out.info(&format!("{verb} [{}] {}  {}", view.id, view.name, view.text));
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

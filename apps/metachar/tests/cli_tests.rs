//! Integration tests for the MetaChar CLI.
//!
//! Each test drives commands against a sheet file in a temporary directory
//! and inspects the file afterwards through `metachar_core`.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use clap::Parser;
use metachar::cli::{self, Cli, CounterAction, Output};
use metachar::config::{Config, TemplateChoice};
use metachar_core::{Direction, Field, MetaCharError, NodeId, NodeKind, PageId, Rgb, Sheet};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const QUIET: Output = Output {
    json: false,
    quiet: true,
};

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// A temp dir holding a freshly created sheet file.
fn new_sheet(template: TemplateChoice) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sheet.txt");
    cli::cmd_new(&path, QUIET, template, false).unwrap();
    (dir, path)
}

fn run(args: &[&str], path: &Path) -> Result<(), MetaCharError> {
    let mut argv = vec!["metachar", "--quiet", "--sheet"];
    let path = path.to_str().unwrap();
    argv.push(path);
    argv.extend_from_slice(args);
    let cli = Cli::try_parse_from(argv).unwrap();
    cli::execute(cli, &Config::default())
}

fn find(sheet: &Sheet, name: &str) -> NodeId {
    sheet
        .registry()
        .iter()
        .find(|(_, node)| node.name == name)
        .map(|(id, _)| id)
        .unwrap()
}

// =============================================================================
// NEW
// =============================================================================

#[test]
fn test_new_writes_template() {
    let (_dir, path) = new_sheet(TemplateChoice::Dnd5e);
    let sheet = Sheet::read_file(&path).unwrap();

    assert_eq!(sheet.pages().len(), 8);
    assert_eq!(sheet.source_version(), Some("0.0"));
    let strength = find(&sheet, "STR");
    assert_eq!(sheet.published_text(strength), Some("11 (+0)"));
}

#[test]
fn test_new_refuses_to_overwrite() {
    let (_dir, path) = new_sheet(TemplateChoice::Empty);
    let result = cli::cmd_new(&path, QUIET, TemplateChoice::Dnd5e, false);
    assert!(matches!(result, Err(MetaCharError::IoError(_))));

    // Still the empty sheet.
    assert_eq!(Sheet::read_file(&path).unwrap().registry().live_count(), 0);

    cli::cmd_new(&path, QUIET, TemplateChoice::Dnd5e, true).unwrap();
    assert!(Sheet::read_file(&path).unwrap().registry().live_count() > 0);
}

#[test]
fn test_commands_need_existing_sheet() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.txt");
    let result = cli::cmd_status(&path, QUIET);
    assert!(matches!(result, Err(MetaCharError::IoError(ref m)) if m.contains("metachar new")));
}

// =============================================================================
// EDITING
// =============================================================================

#[test]
fn test_add_set_and_link() {
    let (_dir, path) = new_sheet(TemplateChoice::Empty);

    cli::cmd_add(
        &path,
        QUIET,
        NodeKind::Simple,
        0,
        None,
        &[
            (Field::Name, "Seven".to_string()),
            (Field::Value, "7".to_string()),
            (Field::CalcEligible, "True".to_string()),
        ],
    )
    .unwrap();
    cli::cmd_add(
        &path,
        QUIET,
        NodeKind::Sum,
        0,
        None,
        &[(Field::Name, "Total".to_string())],
    )
    .unwrap();
    cli::cmd_link(&path, QUIET, 1, 0).unwrap();
    cli::cmd_add(
        &path,
        QUIET,
        NodeKind::Simple,
        0,
        Some(1),
        &[(Field::Value, "2".to_string())],
    )
    .unwrap();

    let sheet = Sheet::read_file(&path).unwrap();
    assert_eq!(sheet.value(NodeId(1)), 9);
    assert_eq!(sheet.registry().owner(NodeId(2)), Some(NodeId(1)));
    assert_eq!(sheet.page(PageId(0)).unwrap().nodes(), &[NodeId(0), NodeId(1)]);

    cli::cmd_set(&path, QUIET, 0, Field::Value, "10").unwrap();
    cli::cmd_unlink(&path, QUIET, 1, 0).unwrap();
    let sheet = Sheet::read_file(&path).unwrap();
    assert_eq!(sheet.value(NodeId(0)), 10);
    assert_eq!(sheet.value(NodeId(1)), 2);
}

#[test]
fn test_failed_edit_leaves_file_untouched() {
    let (_dir, path) = new_sheet(TemplateChoice::Empty);
    cli::cmd_add(&path, QUIET, NodeKind::Fraction, 0, None, &[]).unwrap();
    let before = std::fs::read_to_string(&path).unwrap();

    let result = cli::cmd_set(&path, QUIET, 0, Field::Divisor, "0");
    assert!(matches!(result, Err(MetaCharError::ZeroDivisor)));
    let result = cli::cmd_set(&path, QUIET, 0, Field::Text, "words");
    assert!(matches!(
        result,
        Err(MetaCharError::FieldNotApplicable { .. })
    ));
    let result = cli::cmd_link(&path, QUIET, 0, 0);
    assert!(matches!(result, Err(MetaCharError::NotASum(_))));

    assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
}

#[test]
fn test_dividend_and_counter() {
    let (_dir, path) = new_sheet(TemplateChoice::Empty);
    cli::cmd_add(
        &path,
        QUIET,
        NodeKind::Simple,
        0,
        None,
        &[
            (Field::Value, "15".to_string()),
            (Field::CalcEligible, "True".to_string()),
        ],
    )
    .unwrap();
    cli::cmd_add(
        &path,
        QUIET,
        NodeKind::Fraction,
        0,
        None,
        &[(Field::Divisor, "2".to_string())],
    )
    .unwrap();
    cli::cmd_dividend(&path, QUIET, 1, Some(0)).unwrap();
    assert_eq!(Sheet::read_file(&path).unwrap().value(NodeId(1)), 7);

    cli::cmd_set(&path, QUIET, 1, Field::RoundDown, "False").unwrap();
    assert_eq!(Sheet::read_file(&path).unwrap().value(NodeId(1)), 8);

    cli::cmd_dividend(&path, QUIET, 1, None).unwrap();
    assert_eq!(Sheet::read_file(&path).unwrap().value(NodeId(1)), 0);

    cli::cmd_add(
        &path,
        QUIET,
        NodeKind::Counter,
        0,
        None,
        &[(Field::DefaultValue, "5".to_string())],
    )
    .unwrap();
    cli::cmd_counter(&path, QUIET, 2, CounterAction::Dec, 3).unwrap();
    cli::cmd_counter(&path, QUIET, 2, CounterAction::Inc, 1).unwrap();
    assert_eq!(Sheet::read_file(&path).unwrap().value(NodeId(2)), 3);
    cli::cmd_counter(&path, QUIET, 2, CounterAction::Reset, 1).unwrap();
    assert_eq!(Sheet::read_file(&path).unwrap().value(NodeId(2)), 5);
}

#[test]
fn test_delete_cascades_and_renumbers_on_save() {
    let (_dir, path) = new_sheet(TemplateChoice::Empty);
    cli::cmd_add(
        &path,
        QUIET,
        NodeKind::Simple,
        0,
        None,
        &[(Field::Name, "Keep".to_string())],
    )
    .unwrap();
    cli::cmd_add(&path, QUIET, NodeKind::Ability, 0, None, &[]).unwrap();
    cli::cmd_add(
        &path,
        QUIET,
        NodeKind::Simple,
        0,
        None,
        &[(Field::Name, "Last".to_string())],
    )
    .unwrap();

    let sheet = Sheet::read_file(&path).unwrap();
    assert_eq!(sheet.registry().live_count(), 4);
    assert_eq!(find(&sheet, "Base score"), NodeId(2));
    assert_eq!(find(&sheet, "Last"), NodeId(3));

    // The ability and its base score go together.
    cli::cmd_delete(&path, QUIET, 1).unwrap();
    let sheet = Sheet::read_file(&path).unwrap();
    assert_eq!(sheet.registry().live_count(), 2);
    assert_eq!(find(&sheet, "Keep"), NodeId(0));
    assert_eq!(find(&sheet, "Last"), NodeId(1));

    let result = cli::cmd_delete(&path, QUIET, 5);
    assert!(matches!(result, Err(MetaCharError::OutOfRange { index: 5, .. })));
}

// =============================================================================
// PAGES
// =============================================================================

#[test]
fn test_pages_move_reorder_and_color() {
    let (_dir, path) = new_sheet(TemplateChoice::Empty);
    for name in ["A", "B", "C"] {
        cli::cmd_add(
            &path,
            QUIET,
            NodeKind::Plain,
            0,
            None,
            &[(Field::Name, name.to_string())],
        )
        .unwrap();
    }

    cli::cmd_move(&path, QUIET, 2, Direction::Up).unwrap();
    let sheet = Sheet::read_file(&path).unwrap();
    let names: Vec<&str> = sheet
        .page(PageId(0))
        .unwrap()
        .nodes()
        .iter()
        .map(|id| sheet.node(*id).unwrap().name.as_str())
        .collect();
    assert_eq!(names, vec!["A", "C", "B"]);

    cli::cmd_reorder(&path, QUIET, 0, &[2, 1, 0]).unwrap();
    let sheet = Sheet::read_file(&path).unwrap();
    let names: Vec<&str> = sheet
        .page(PageId(0))
        .unwrap()
        .nodes()
        .iter()
        .map(|id| sheet.node(*id).unwrap().name.as_str())
        .collect();
    assert_eq!(names, vec!["B", "C", "A"]);

    let result = cli::cmd_reorder(&path, QUIET, 0, &[0, 0, 1]);
    assert!(matches!(
        result,
        Err(MetaCharError::InvalidPermutation(PageId(0)))
    ));

    cli::cmd_add_page(&path, QUIET, Some(Rgb::new(0.25, 0.5, 1.0))).unwrap();
    cli::cmd_color(&path, QUIET, 0, Rgb::new(1.0, 0.0, 0.0)).unwrap();
    let sheet = Sheet::read_file(&path).unwrap();
    assert_eq!(sheet.pages().len(), 2);
    assert_eq!(sheet.pages()[0].color, Rgb::new(1.0, 0.0, 0.0));
    assert_eq!(sheet.pages()[1].color, Rgb::new(0.25, 0.5, 1.0));
    assert!(sheet.pages()[1].nodes().is_empty());
}

// =============================================================================
// ARGUMENT PARSING END TO END
// =============================================================================

#[test]
fn test_execute_parsed_commands() {
    let (_dir, path) = new_sheet(TemplateChoice::Empty);

    run(&["add", "simple", "-f", "name=Dex", "-f", "value=-1", "-f", "calc=True"], &path).unwrap();
    run(&["add", "sum", "-f", "name=Init", "-f", "signed=True"], &path).unwrap();
    run(&["link", "1", "0"], &path).unwrap();
    run(&["set", "0", "value", "-3"], &path).unwrap();

    let sheet = Sheet::read_file(&path).unwrap();
    assert_eq!(sheet.published_text(NodeId(1)), Some("-3"));

    run(&["set", "0", "value", "2"], &path).unwrap();
    let sheet = Sheet::read_file(&path).unwrap();
    assert_eq!(sheet.published_text(NodeId(1)), Some("+2"));

    run(&["check"], &path).unwrap();
    run(&["show", "--node", "1"], &path).unwrap();
    run(&["show", "--page", "0"], &path).unwrap();
    run(&["status"], &path).unwrap();
    run(&["candidates"], &path).unwrap();
    run(&["fields", "fraction"], &path).unwrap();
    run(&[], &path).unwrap();

    let result = run(&["show", "--page", "3"], &path);
    assert!(matches!(result, Err(MetaCharError::PageNotFound(PageId(3)))));
}

#[test]
fn test_config_supplies_sheet_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("from-config.txt");
    let config = Config::from_toml(&format!(
        "sheet = {:?}\ntemplate = \"empty\"\n",
        path.to_str().unwrap()
    ))
    .unwrap();

    let cli = Cli::try_parse_from(["metachar", "--quiet", "new"]).unwrap();
    cli::execute(cli, &config).unwrap();

    let sheet = Sheet::read_file(&path).unwrap();
    assert_eq!(sheet.registry().live_count(), 0);
    assert_eq!(sheet.pages().len(), 1);
}

#[test]
fn test_sheet_written_by_cli_loads_unchanged() {
    let (_dir, path) = new_sheet(TemplateChoice::Dnd5e);
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("#MetaChar version 0.0\n\n<masterstatlist>\n\n"));

    cli::cmd_check(&path, QUIET).unwrap();
    let sheet = Sheet::read_file(&path).unwrap();
    assert_eq!(sheet.save(), text);
}

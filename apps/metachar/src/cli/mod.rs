//! # MetaChar CLI Module
//!
//! This module implements the CLI interface for MetaChar.
//!
//! ## Available Commands
//!
//! - `new` - Create a sheet file from a template
//! - `show` - Print pages, or one node with its breakdown
//! - `status` - Show sheet counts
//! - `check` - Load a sheet and confirm it saves back unchanged
//! - `add` / `add-page` / `delete` - Change the set of nodes and pages
//! - `set` / `link` / `unlink` / `dividend` - Edit node attributes and references
//! - `counter` - Increment, decrement or reset a counter
//! - `move` / `reorder` / `color` - Arrange pages
//! - `candidates` / `fields` - List reference targets and editable fields

mod commands;

use crate::config::{Config, TemplateChoice};
use clap::{Parser, Subcommand, ValueEnum};
use metachar_core::{Direction, Field, MetaCharError, NodeKind, Rgb};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// MetaChar - character sheets as a graph of stats
///
/// Every command reads the sheet file, applies one change and writes it back.
#[derive(Parser, Debug)]
#[command(name = "metachar")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress informational output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the sheet file
    #[arg(short, long, global = true)]
    pub sheet: Option<PathBuf>,

    /// Path to a config file (default: ./metachar.toml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a new sheet file
    New {
        /// Starting layout (dnd5e, empty)
        #[arg(short, long)]
        template: Option<TemplateChoice>,

        /// Overwrite an existing sheet file
        #[arg(short, long)]
        force: bool,
    },

    /// Print the sheet
    Show {
        /// Only this page
        #[arg(short, long)]
        page: Option<usize>,

        /// Only this node, with its fields and breakdown
        #[arg(short, long, conflicts_with = "page")]
        node: Option<usize>,
    },

    /// Show sheet status
    Status,

    /// Verify that the sheet loads and saves back unchanged
    Check,

    /// Add a node
    Add {
        /// Node kind (bar, simple, sum, ability, fraction, text, counter,
        /// two-buttons, three-buttons)
        kind: NodeKind,

        /// Page to append the node to
        #[arg(short, long, default_value = "0")]
        page: usize,

        /// Add as an owned child of this sum instead of to a page
        #[arg(short, long, conflicts_with = "page")]
        owner: Option<usize>,

        /// Initial field value, as field=value (repeatable)
        #[arg(short, long = "field", value_parser = parse_assignment)]
        fields: Vec<(Field, String)>,
    },

    /// Append an empty page
    AddPage {
        /// Background colour as r,g,b in [0, 1]
        #[arg(long, value_parser = parse_color)]
        color: Option<Rgb>,
    },

    /// Delete a node and everything it owns
    Delete {
        /// Node index
        id: usize,
    },

    /// Set one field of a node
    Set {
        /// Node index
        id: usize,

        /// Field name (see `metachar fields`)
        field: Field,

        /// New value in text form
        #[arg(allow_hyphen_values = true)]
        value: String,
    },

    /// Add an external reference to a sum
    Link {
        /// Sum node index
        sum: usize,

        /// Referenced node index
        target: usize,
    },

    /// Remove an external reference from a sum
    Unlink {
        /// Sum node index
        sum: usize,

        /// Referenced node index
        target: usize,
    },

    /// Point a fraction at a dividend, or clear it
    Dividend {
        /// Fraction node index
        fraction: usize,

        /// Dividend node index; omit to clear
        target: Option<usize>,
    },

    /// Change a counter
    Counter {
        /// Counter node index
        id: usize,

        /// What to do
        action: CounterAction,

        /// Step for inc and dec
        #[arg(short, long, default_value = "1")]
        by: i64,
    },

    /// Move a node one place among its siblings
    Move {
        /// Node index
        id: usize,

        /// up or down
        direction: Direction,
    },

    /// Rearrange a page; the order lists current positions
    Reorder {
        /// Page index
        page: usize,

        /// New order as comma-separated positions, e.g. 2,0,1
        #[arg(value_delimiter = ',', required = true)]
        order: Vec<usize>,
    },

    /// Set a page's background colour
    Color {
        /// Page index
        page: usize,

        /// Colour as r,g,b in [0, 1]
        #[arg(value_parser = parse_color)]
        color: Rgb,
    },

    /// List nodes that sums and fractions may reference
    Candidates,

    /// List the fields of a node kind
    Fields {
        /// Node kind
        kind: NodeKind,
    },
}

/// Counter operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CounterAction {
    Inc,
    Dec,
    Reset,
}

// =============================================================================
// ARGUMENT PARSERS
// =============================================================================

/// Parse `field=value`. The value may be empty or contain `=`.
pub fn parse_assignment(raw: &str) -> Result<(Field, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected field=value, got {raw:?}"))?;
    let field = name.trim().parse::<Field>().map_err(|e| e.to_string())?;
    Ok((field, value.to_string()))
}

/// Parse `r,g,b` with each channel a decimal number.
pub fn parse_color(raw: &str) -> Result<Rgb, String> {
    let channels = raw
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid colour {raw:?}: {e}"))?;

    match channels.as_slice() {
        [red, green, blue] => Ok(Rgb::new(*red, *green, *blue)),
        _ => Err(format!("expected three channels r,g,b, got {raw:?}")),
    }
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli, config: &Config) -> Result<(), MetaCharError> {
    let path = config.sheet_path(cli.sheet.as_deref());
    let out = Output {
        json: cli.json_mode,
        quiet: cli.quiet,
    };

    match cli.command {
        Some(Commands::New { template, force }) => {
            cmd_new(&path, out, config.template(template), force)
        }
        Some(Commands::Show { page, node }) => cmd_show(&path, out, page, node),
        Some(Commands::Status) => cmd_status(&path, out),
        Some(Commands::Check) => cmd_check(&path, out),
        Some(Commands::Add {
            kind,
            page,
            owner,
            fields,
        }) => cmd_add(&path, out, kind, page, owner, &fields),
        Some(Commands::AddPage { color }) => cmd_add_page(&path, out, color),
        Some(Commands::Delete { id }) => cmd_delete(&path, out, id),
        Some(Commands::Set { id, field, value }) => cmd_set(&path, out, id, field, &value),
        Some(Commands::Link { sum, target }) => cmd_link(&path, out, sum, target),
        Some(Commands::Unlink { sum, target }) => cmd_unlink(&path, out, sum, target),
        Some(Commands::Dividend { fraction, target }) => {
            cmd_dividend(&path, out, fraction, target)
        }
        Some(Commands::Counter { id, action, by }) => cmd_counter(&path, out, id, action, by),
        Some(Commands::Move { id, direction }) => cmd_move(&path, out, id, direction),
        Some(Commands::Reorder { page, order }) => cmd_reorder(&path, out, page, &order),
        Some(Commands::Color { page, color }) => cmd_color(&path, out, page, color),
        Some(Commands::Candidates) => cmd_candidates(&path, out),
        Some(Commands::Fields { kind }) => cmd_fields(out, kind),
        None => {
            // No subcommand - show the sheet by default
            cmd_show(&path, out, None, None)
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

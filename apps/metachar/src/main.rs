//! # MetaChar - Character Sheet Tool
//!
//! The main binary for MetaChar sheets.
//!
//! This application provides:
//! - CLI interface for sheet operations
//! - Optional `metachar.toml` configuration
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │            apps/metachar (THE BINARY)        │
//! │                                              │
//! │   ┌─────────────┐        ┌──────────────┐    │
//! │   │    CLI      │        │    Config    │    │
//! │   │   (clap)    │        │    (toml)    │    │
//! │   └──────┬──────┘        └──────┬───────┘    │
//! │          └──────────┬───────────┘            │
//! │                     ▼                        │
//! │            ┌────────────────┐                │
//! │            │ metachar-core  │                │
//! │            │  (THE MODEL)   │                │
//! │            └────────────────┘                │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! metachar new --template dnd5e
//! metachar show
//! metachar set 3 value 14
//! metachar counter 40 dec --by 2
//! ```

use clap::Parser;
use metachar::cli::{self, Cli};
use metachar::config::{Config, LOG_FORMAT_ENV, LogFormat};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // The config may choose the log format, so it is read before logging
    // starts and any error is reported once logging is up.
    let config = Config::load(cli.config.as_deref());
    let env_format = std::env::var(LOG_FORMAT_ENV).ok();
    let log_format = match &config {
        Ok(config) => config.log_format(env_format.as_deref()),
        Err(_) => Config::default().log_format(env_format.as_deref()),
    };

    let default_filter = if cli.verbose {
        "metachar=debug,metachar_core=debug"
    } else {
        "metachar=info,metachar_core=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    match log_format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let result = config.and_then(|config| cli::execute(cli, &config));
    if let Err(e) = result {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

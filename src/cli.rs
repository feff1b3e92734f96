//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation.

use clap::Parser;
use std::path::PathBuf;

/// Formguide - weekly league form guide
///
/// Scrapes standings and fixtures for each configured division, builds a
/// per-team form guide and emails it as HTML.
///
/// Examples:
///   formguide
///   formguide --no-email --output form.html
///   formguide --snapshot ./saved --json report.json
///   formguide --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to configuration file
    ///
    /// If not specified, looks for .formguide.toml in the current directory
    #[arg(short, long, value_name = "FILE", env = "FORMGUIDE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output file path for the full HTML report
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Read saved portal pages from DIR instead of the live portal
    ///
    /// One sub-directory per division id, holding standings and fixtures.
    #[arg(long, value_name = "DIR")]
    pub snapshot: Option<PathBuf>,

    /// Build the report but do not send it
    #[arg(long)]
    pub no_email: bool,

    /// Abort on the first division that fails
    #[arg(long)]
    pub fail_fast: bool,

    /// Also write the report model as JSON
    #[arg(long, value_name = "FILE")]
    pub json: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .formguide.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref dir) = self.snapshot {
            if !dir.exists() {
                return Err(format!(
                    "Snapshot directory does not exist: {}",
                    dir.display()
                ));
            }
            if !dir.is_dir() {
                return Err(format!("Snapshot path is not a directory: {}", dir.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

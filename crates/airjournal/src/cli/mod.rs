//! Command-line interface for airjournal.
//!
//! This module provides the CLI structure for the `airj` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    ActivityAddArgs, ActivityCommand, AqiArgs, CategoryArg, ConfigCommand, ListArgs,
    PlaceAddArgs, PlaceCommand, PlaceEditArgs, StatsCommand,
};

/// airj - Log outdoor activities and places with the air you breathed
///
/// Records live in a local database; every entry carries an AQI reading
/// and its health category.
#[derive(Debug, Parser)]
#[command(name = "airj")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short = 'C', long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Log, list and delete activities
    #[command(subcommand)]
    Activity(ActivityCommand),

    /// Pin, edit, list and delete places
    #[command(subcommand)]
    Place(PlaceCommand),

    /// Show journal statistics
    Stats(StatsCommand),

    /// Classify an AQI reading
    Classify {
        /// The reading; out-of-range values are clamped
        #[arg(allow_negative_numbers = true)]
        aqi: i64,
    },

    /// List the AQI categories
    Categories {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// View or check configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        crate::logging::Verbosity::from_flags(self.quiet, self.verbose)
    }
}

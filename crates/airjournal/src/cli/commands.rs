//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::aqi::Category;
use crate::form::AqiField;

/// Activity entry commands.
#[derive(Debug, Subcommand)]
pub enum ActivityCommand {
    /// Log a new activity
    Add(ActivityAddArgs),

    /// List activities, newest first
    List(ListArgs),

    /// Delete an activity
    Delete {
        /// Record id
        #[arg(allow_hyphen_values = true)]
        id: String,
    },
}

/// Arguments for logging an activity.
#[derive(Debug, Args)]
pub struct ActivityAddArgs {
    /// What you did (Running, Cycling, Walking, Yoga, Swimming, Gym, ...)
    #[arg(short, long)]
    pub kind: String,

    /// Duration in minutes
    #[arg(short, long)]
    pub duration: String,

    /// Where it happened
    #[arg(short, long)]
    pub location: String,

    /// Air quality reading
    #[command(flatten)]
    pub aqi: AqiArgs,

    /// Mood emoji
    #[arg(short, long)]
    pub mood: Option<String>,

    /// Free-form notes
    #[arg(short, long)]
    pub notes: Option<String>,

    /// Photo reference (path or URI)
    #[arg(long)]
    pub photo: Option<String>,

    /// Calories burned
    #[arg(long)]
    pub calories: Option<String>,

    /// Distance in kilometres
    #[arg(long)]
    pub distance: Option<String>,
}

/// Place marker commands.
#[derive(Debug, Subcommand)]
pub enum PlaceCommand {
    /// Pin a new place
    Add(PlaceAddArgs),

    /// Edit a place, keeping unspecified fields
    Edit(PlaceEditArgs),

    /// List places, newest first
    List(ListArgs),

    /// Delete a place
    Delete {
        /// Record id
        #[arg(allow_hyphen_values = true)]
        id: String,
    },
}

/// Arguments for pinning a place.
#[derive(Debug, Args)]
pub struct PlaceAddArgs {
    /// Place name
    #[arg(short, long)]
    pub name: String,

    /// Coordinates as "lat, lon"
    #[arg(short, long, allow_hyphen_values = true)]
    pub coordinates: String,

    /// Location accuracy, e.g. "12.50 meter"
    #[arg(long)]
    pub accuracy: Option<String>,

    /// Air quality reading
    #[command(flatten)]
    pub aqi: AqiArgs,
}

/// Arguments for editing a place.
#[derive(Debug, Args)]
pub struct PlaceEditArgs {
    /// Record id
    #[arg(allow_hyphen_values = true)]
    pub id: String,

    /// New name
    #[arg(short, long)]
    pub name: Option<String>,

    /// New coordinates
    #[arg(short, long, allow_hyphen_values = true)]
    pub coordinates: Option<String>,

    /// New accuracy; an empty value clears it
    #[arg(long)]
    pub accuracy: Option<String>,

    /// New air quality reading
    #[command(flatten)]
    pub aqi: AqiArgs,
}

/// The AQI inputs: a number or a category, never both.
#[derive(Debug, Args)]
pub struct AqiArgs {
    /// AQI reading (0-500); unreadable values count as 50
    #[arg(short, long, allow_hyphen_values = true, conflicts_with = "category")]
    pub aqi: Option<String>,

    /// Pick a category instead of a number (uses its midpoint)
    #[arg(long, value_enum)]
    pub category: Option<CategoryArg>,
}

impl AqiArgs {
    /// Apply whichever input was given. Returns false when neither was.
    pub fn apply(&self, field: &mut AqiField) -> bool {
        if let Some(text) = &self.aqi {
            field.set_text(text.as_str());
            true
        } else if let Some(category) = self.category {
            field.select_category(category.into());
            true
        } else {
            false
        }
    }
}

/// Arguments for listing records.
#[derive(Debug, Args)]
pub struct ListArgs {
    /// Maximum number of records
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Statistics command arguments.
#[derive(Debug, Args)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,

    /// Override the recent-activity window
    #[arg(short, long, value_name = "DAYS", value_parser = clap::value_parser!(u32).range(1..))]
    pub window_days: Option<u32>,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Check only this file, without environment overrides
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Category argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CategoryArg {
    /// 0-50
    Excellent,
    /// 51-100
    Good,
    /// 101-150
    Moderate,
    /// 151-200
    Unhealthy,
    /// 201-500
    Hazardous,
}

impl From<CategoryArg> for Category {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Excellent => Self::Excellent,
            CategoryArg::Good => Self::Good,
            CategoryArg::Moderate => Self::Moderate,
            CategoryArg::Unhealthy => Self::Unhealthy,
            CategoryArg::Hazardous => Self::Hazardous,
        }
    }
}

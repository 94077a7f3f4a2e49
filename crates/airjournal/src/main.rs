//! `airj` - CLI for airjournal
//!
//! This binary logs activities and places into a local journal database and
//! reports air-quality statistics over them.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::Parser;
use tracing::warn;

use airjournal::aqi::{classify, Aqi, Category};
use airjournal::cli::{
    ActivityCommand, Cli, Command, ConfigCommand, ListArgs, PlaceCommand, StatsCommand,
};
use airjournal::record::{activity_emoji, ActivityEntry, PlaceMarker, DEFAULT_MOOD};
use airjournal::{
    init_logging, ActivityDraft, Config, Journal, PlaceDraft, RecordKey, RecordStore,
    SqliteStore,
};

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> CliResult {
    match cli.command {
        Command::Classify { aqi } => {
            handle_classify(aqi);
            Ok(())
        }
        Command::Categories { json } => handle_categories(json),
        Command::Config(config_cmd) => handle_config(cli.config, config_cmd),
        Command::Activity(activity_cmd) => {
            let config = Config::load_from(cli.config)?;
            let (_, journal) = open_journal(&config)?;
            runtime()?.block_on(handle_activity(&journal, activity_cmd))
        }
        Command::Place(place_cmd) => {
            let config = Config::load_from(cli.config)?;
            let (_, journal) = open_journal(&config)?;
            runtime()?.block_on(handle_place(&journal, place_cmd))
        }
        Command::Stats(stats_cmd) => {
            let config = Config::load_from(cli.config)?;
            let (store, journal) = open_journal(&config)?;
            handle_stats(&store, &journal, &stats_cmd)
        }
    }
}

fn runtime() -> airjournal::Result<tokio::runtime::Runtime> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(runtime)
}

fn open_journal(config: &Config) -> airjournal::Result<(Arc<SqliteStore>, Journal)> {
    let store = Arc::new(SqliteStore::open(config.database_path())?);
    let journal = Journal::open(Arc::clone(&store) as Arc<dyn RecordStore>, config);
    Ok((store, journal))
}

async fn handle_activity(journal: &Journal, cmd: ActivityCommand) -> CliResult {
    match cmd {
        ActivityCommand::Add(args) => {
            if activity_emoji(&args.kind).is_none() {
                warn!("'{}' is not one of the usual activity kinds", args.kind);
            }
            let mut draft = ActivityDraft {
                activity_kind: args.kind,
                duration: args.duration,
                location_label: args.location,
                notes: args.notes.unwrap_or_default(),
                photo_ref: args.photo,
                calories: args.calories.unwrap_or_default(),
                distance: args.distance.unwrap_or_default(),
                ..ActivityDraft::default()
            };
            if let Some(mood) = args.mood {
                draft.mood = mood;
            }
            args.aqi.apply(&mut draft.aqi);

            let key = journal.submit_activity(&draft).await?;
            println!("Saved activity {key}");
        }
        ActivityCommand::List(args) => {
            print_activities(journal.activities().snapshot().records(), &args)?;
        }
        ActivityCommand::Delete { id } => {
            let key = RecordKey::new(id);
            journal.delete_activity(&key).await?;
            println!("Deleted activity {key}");
        }
    }
    Ok(())
}

async fn handle_place(journal: &Journal, cmd: PlaceCommand) -> CliResult {
    match cmd {
        PlaceCommand::Add(args) => {
            let mut draft = PlaceDraft {
                name: args.name,
                coordinates: args.coordinates,
                accuracy_meters: args.accuracy.unwrap_or_default(),
                ..PlaceDraft::default()
            };
            args.aqi.apply(&mut draft.aqi);

            let key = journal.submit_place(&draft).await?;
            println!("Saved place {key}");
        }
        PlaceCommand::Edit(args) => {
            let key = RecordKey::new(args.id);
            let (name, coordinates, accuracy, aqi) =
                (args.name, args.coordinates, args.accuracy, args.aqi);
            journal
                .edit_place_with(&key, |draft| {
                    if let Some(name) = name {
                        draft.name = name;
                    }
                    if let Some(coordinates) = coordinates {
                        draft.coordinates = coordinates;
                    }
                    if let Some(accuracy) = accuracy {
                        draft.accuracy_meters = accuracy;
                    }
                    aqi.apply(&mut draft.aqi);
                })
                .await?;
            println!("Updated place {key}");
        }
        PlaceCommand::List(args) => {
            print_places(journal.places().snapshot().records(), &args)?;
        }
        PlaceCommand::Delete { id } => {
            let key = RecordKey::new(id);
            journal.delete_place(&key).await?;
            println!("Deleted place {key}");
        }
    }
    Ok(())
}

fn limited<T>(records: &[T], limit: Option<usize>) -> &[T] {
    let end = limit.map_or(records.len(), |n| n.min(records.len()));
    &records[..end]
}

fn format_time(timestamp: Option<DateTime<Utc>>) -> String {
    timestamp.map_or_else(
        || "undated".to_string(),
        |ts| ts.format("%Y-%m-%d %H:%M UTC").to_string(),
    )
}

fn print_activities(records: &[ActivityEntry], args: &ListArgs) -> CliResult {
    let records = limited(records, args.limit);
    if args.json {
        println!("{}", serde_json::to_string_pretty(records)?);
        return Ok(());
    }
    if records.is_empty() {
        println!("No activities yet.");
        return Ok(());
    }

    for entry in records {
        let category = entry.aqi.category();
        let duration = entry
            .duration_minutes
            .map_or_else(|| "?".to_string(), |m| m.to_string());
        println!(
            "{}  {}  {} {}  {} min  @ {}",
            entry.id,
            format_time(entry.timestamp),
            entry.activity_emoji().unwrap_or("•"),
            entry.activity_kind,
            duration,
            entry.location_label
        );
        println!(
            "    AQI {} {} {}  mood {}",
            entry.aqi,
            category.emoji(),
            category.label(),
            entry.mood.as_deref().unwrap_or(DEFAULT_MOOD)
        );
        if let Some(distance) = entry.distance_km {
            println!("    {distance} km");
        }
        if let Some(calories) = entry.calories {
            println!("    {calories} kcal");
        }
        if let Some(notes) = &entry.notes {
            println!("    {notes}");
        }
    }
    Ok(())
}

fn print_places(records: &[PlaceMarker], args: &ListArgs) -> CliResult {
    let records = limited(records, args.limit);
    if args.json {
        println!("{}", serde_json::to_string_pretty(records)?);
        return Ok(());
    }
    if records.is_empty() {
        println!("No places yet.");
        return Ok(());
    }

    for marker in records {
        println!(
            "{}  {} {}  AQI {} {}",
            marker.id,
            marker.emoji,
            marker.name,
            marker.aqi,
            marker.aqi_category.label()
        );
        match &marker.accuracy_meters {
            Some(accuracy) => println!("    {} ({accuracy})", marker.coordinates),
            None => println!("    {}", marker.coordinates),
        }
        println!("    added {}", format_time(marker.timestamp));
        if let Some(updated) = marker.updated_at {
            println!("    edited {}", format_time(Some(updated)));
        }
        if let Some(url) = marker.directions_url() {
            println!("    {url}");
        }
    }
    Ok(())
}

fn handle_stats(store: &SqliteStore, journal: &Journal, cmd: &StatsCommand) -> CliResult {
    let mut params = journal.stats_config().clone();
    if let Some(days) = cmd.window_days {
        params.window_days = days;
    }
    let summary = journal.summary_with(&params);

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let storage = store.stats()?;
    let activities = &summary.activities;
    let places = &summary.places;

    println!("airj stats");
    println!("----------");
    println!("Activities:         {}", activities.total_count);
    println!(
        "  Last {} days:     {}",
        params.window_days, activities.window_count
    );
    println!(
        "  Total time:       {} min ({} h)",
        activities.total_duration_minutes,
        activities.total_hours()
    );
    println!(
        "  Clean air (<= {}): {}",
        params.best_air_threshold, activities.best_air_count
    );
    println!("Places:             {}", places.total_count);
    println!(
        "  Clean air (<= {}): {}",
        params.best_air_threshold, places.best_air_count
    );
    if let Some(average) = places.average_aqi {
        println!("  Average AQI:      {average:.0}");
    }
    println!();
    println!("Database:           {}", store.path().display());
    println!("  Records:          {}", storage.total_records);
    println!("  Size:             {} bytes", storage.db_size_bytes);
    Ok(())
}

fn handle_classify(aqi: i64) {
    let reading = Aqi::clamped(aqi);
    let category = classify(aqi);
    let (min, max) = category.range();
    println!(
        "AQI {reading}: {} {} ({min}-{max})",
        category.emoji(),
        category.label()
    );
    println!("  {}", category.description());
    if i64::from(reading.value()) != aqi {
        println!("  (clamped from {aqi})");
    }
}

fn handle_categories(json: bool) -> CliResult {
    if json {
        let categories: Vec<_> = Category::ALL
            .iter()
            .map(|category| {
                let (min, max) = category.range();
                serde_json::json!({
                    "label": category.label(),
                    "min": min,
                    "max": max,
                    "midpoint": category.midpoint(),
                    "emoji": category.emoji(),
                    "color": category.color(),
                    "gradient": category.gradient(),
                    "description": category.description(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&categories)?);
        return Ok(());
    }

    for category in Category::ALL {
        let (min, max) = category.range();
        println!(
            "{} {:<10} {:>3}-{:<3}  {}  {}",
            category.emoji(),
            category.label(),
            min,
            max,
            category.color(),
            category.description()
        );
    }
    Ok(())
}

fn handle_config(config_path: Option<PathBuf>, cmd: ConfigCommand) -> CliResult {
    match cmd {
        ConfigCommand::Show { json } => {
            let config = Config::load_from(config_path)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Store]");
                println!("  Database path:       {}", config.database_path().display());
                println!(
                    "  Activity collection: {}",
                    config.store.activity_collection
                );
                println!("  Place collection:    {}", config.store.place_collection);
                println!();
                println!("[Stats]");
                println!("  Window (days):       {}", config.stats.window_days);
                println!("  Best air threshold:  {}", config.stats.best_air_threshold);
            }
        }
        ConfigCommand::Path => {
            let path = config_path.unwrap_or_else(Config::default_config_path);
            println!("{}", path.display());
        }
        ConfigCommand::Validate { file: Some(file) } => {
            println!("Validating configuration file: {}", file.display());
            Config::load_file(&file)?;
            println!("Configuration is valid.");
        }
        ConfigCommand::Validate { file: None } => {
            let path = config_path.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            Config::load_from(Some(path))?;
            println!("Configuration is valid.");
        }
    }
    Ok(())
}

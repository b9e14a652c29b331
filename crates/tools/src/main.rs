use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use catalog::{SignalFilter, Taxonomy};
use clap::{Parser, Subcommand};
use foundation::{LatLon, TimeWindow, Timestamp};
use serde::Serialize;
use tools::commands::{
    cells_report, load_signals, near_report, parse_category, parse_lat_lon, parse_timestamp,
    resolve_rows, run_camera,
};
use tools::config::Config;
use tracing::info;
use tracing_subscriber::EnvFilter;
use viewport::ViewportEvent;

#[derive(Parser, Debug)]
#[command(author, version, about = "Outbreak signal map core: taxonomy, aggregation, proximity and camera policy")]
struct Args {
    /// JSON config file (default: $OUTBREAK_CONFIG, then built-in defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve raw category strings to canonical categories
    Resolve {
        /// Raw category strings, e.g. "Food-borne, Zoonotic"
        #[arg(required = true)]
        inputs: Vec<String>,
    },

    /// Aggregate signals into markers and cluster glyphs at a zoom level
    Cells {
        /// JSON array of raw signal records
        #[arg(long)]
        signals: PathBuf,

        #[arg(long)]
        zoom: f64,

        /// Only signals implying this category
        #[arg(long)]
        category: Option<String>,

        /// Only signals whose disease or title contains this text
        #[arg(long)]
        disease: Option<String>,

        /// Only signals at or after this time (epoch ms, RFC 3339 or YYYY-MM-DD)
        #[arg(long, value_parser = parse_timestamp)]
        since: Option<Timestamp>,

        /// Only signals at or before this time
        #[arg(long, value_parser = parse_timestamp)]
        until: Option<Timestamp>,
    },

    /// Signals within a radius of a point, nearest first
    Near {
        #[arg(long)]
        signals: PathBuf,

        /// Center as LAT,LON
        #[arg(long, value_parser = parse_lat_lon, allow_hyphen_values = true)]
        at: LatLon,

        #[arg(long, default_value_t = 500.0)]
        radius_km: f64,

        #[arg(long)]
        category: Option<String>,
    },

    /// Drive the camera controller against a simulated renderer
    Camera {
        /// Signals loaded before anything else happens
        #[arg(long)]
        signals: Option<PathBuf>,

        /// User location as LAT,LON, resolved after the signals
        #[arg(long, value_parser = parse_lat_lon, allow_hyphen_values = true)]
        user: Option<LatLon>,

        /// JSON array of viewport events played last
        #[arg(long)]
        script: Option<PathBuf>,

        /// Number of camera commands the renderer drops
        #[arg(long, default_value_t = 0)]
        lag: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;
    let taxonomy = Taxonomy::with_config(&config.taxonomy);

    match args.command {
        Command::Resolve { inputs } => print_json(&resolve_rows(&taxonomy, &inputs))?,
        Command::Cells {
            signals,
            zoom,
            category,
            disease,
            since,
            until,
        } => {
            let batch = load_signals(&signals, &taxonomy)?;
            let mut filter = match category {
                Some(c) => SignalFilter::category(parse_category(&taxonomy, &c)?),
                None => SignalFilter::all(),
            };
            if let Some(text) = disease {
                filter = filter.with_disease_text(text);
            }
            filter.window = TimeWindow { since, until };
            let report = cells_report(&batch.signals, &filter, zoom, &config, &taxonomy);
            info!(
                signals = batch.signals.len(),
                items = report.items.len(),
                "aggregated"
            );
            print_json(&report)?;
        }
        Command::Near {
            signals,
            at,
            radius_km,
            category,
        } => {
            let batch = load_signals(&signals, &taxonomy)?;
            let category = category
                .map(|c| parse_category(&taxonomy, &c))
                .transpose()?;
            print_json(&near_report(&batch.signals, at, radius_km, category))?;
        }
        Command::Camera {
            signals,
            user,
            script,
            lag,
        } => {
            let mut events = Vec::new();
            if let Some(path) = signals {
                let batch = load_signals(&path, &taxonomy)?;
                events.push(ViewportEvent::SignalsChanged {
                    positions: batch.positions(),
                });
            }
            if let Some(position) = user {
                events.push(ViewportEvent::UserLocated { position });
            }
            if let Some(path) = script {
                let text = fs::read_to_string(&path)
                    .with_context(|| format!("reading script {}", path.display()))?;
                let scripted: Vec<ViewportEvent> = serde_json::from_str(&text)
                    .with_context(|| format!("parsing script {}", path.display()))?;
                events.extend(scripted);
            }
            print_json(&run_camera(&config, events, lag).await?)?;
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

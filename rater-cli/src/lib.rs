//! # Rater CLI
//!
//! Command-line front end for `rater-core`.
//!
//! ## Usage
//!
//! ```bash
//! # Score consistency of rating files
//! rater consistency a.json b.json c.json
//!
//! # Turn a detector response into session elements
//! rater reconcile detection.json
//!
//! # Shape the scoring request for a saved session
//! rater request session.json
//!
//! # Manage saved ratings
//! rater --data-dir ./ratings ratings add rating.json --name "Checkout"
//! rater --data-dir ./ratings ratings list
//! rater --data-dir ./ratings ratings consistency <ID> <ID>
//! ```
//!
//! ## Architecture
//!
//! - `CliArgs` - Command-line arguments parsed with clap
//! - `run` - Executes a command and returns its rendered output

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use rater_core::config::is_valid_noise_threshold;
use rater_core::{
    consistency_report, reconcile_detected_regions, AnnotationSession, ConsistencyReport,
    Detection, RaterConfig, Rating, RatingId, RatingMetadata, RatingStore, Rgb, SessionDocument,
};

/// Command-line arguments for rater.
#[derive(Debug, Clone, Parser)]
#[command(name = "rater")]
#[command(about = "Annotate UI elements and score heuristic consistency")]
#[command(version)]
pub struct CliArgs {
    /// Directory where saved ratings live
    #[arg(long, global = true, env = "RATER_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Detected boxes smaller than this are discarded as noise
    #[arg(long, global = true, env = "RATER_NOISE_THRESHOLD", value_parser = parse_noise_threshold)]
    pub noise_threshold: Option<f64>,

    /// Minimum elements for a rating request
    #[arg(long, global = true, env = "RATER_MIN_ELEMENTS")]
    pub min_elements: Option<usize>,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Command to run
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Score how consistent a set of rating files is
    Consistency {
        /// Rating JSON files
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Convert a detector response into session elements
    Reconcile {
        /// Detection JSON file (`{"boxes": [...], "transform_height": ...}`)
        file: PathBuf,
    },
    /// Shape the scoring request for a saved session
    Request {
        /// Session JSON file
        file: PathBuf,
    },
    /// Manage saved ratings
    Ratings {
        /// Ratings action
        #[command(subcommand)]
        action: RatingsCommand,
    },
}

/// Saved-rating actions.
#[derive(Debug, Clone, Subcommand)]
pub enum RatingsCommand {
    /// List saved ratings, newest first
    List,
    /// Save a rating file
    Add {
        /// Rating JSON file
        file: PathBuf,
        /// Display name
        #[arg(long)]
        name: String,
        /// Path of the rated screenshot
        #[arg(long)]
        image: Option<String>,
        /// Main colour as `#rrggbb`
        #[arg(long)]
        color: Option<String>,
    },
    /// Delete a saved rating
    Remove {
        /// Rating ID
        id: String,
    },
    /// Score consistency of saved ratings
    Consistency {
        /// Rating IDs
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

impl CliArgs {
    /// Build the effective configuration: environment first, flags on top.
    #[must_use]
    pub fn config(&self) -> RaterConfig {
        let mut config = RaterConfig::from_env();
        if let Some(threshold) = self.noise_threshold {
            config.noise_threshold = threshold;
        }
        if let Some(min) = self.min_elements {
            config.min_elements = min;
        }
        if let Some(ref dir) = self.data_dir {
            config.data_dir = Some(dir.clone());
        }
        config
    }
}

fn parse_noise_threshold(raw: &str) -> Result<f64, String> {
    let threshold: f64 = raw.parse().map_err(|e| format!("{e}"))?;
    if is_valid_noise_threshold(threshold) {
        Ok(threshold)
    } else {
        Err(format!("{threshold} is not a finite, non-negative threshold"))
    }
}

/// Run the parsed command and return what should be printed.
///
/// # Errors
///
/// Returns an error if an input file can't be read or parsed, the rating
/// store is unavailable, or the command itself is refused.
pub fn run(args: &CliArgs) -> anyhow::Result<String> {
    let config = args.config();
    match &args.command {
        Command::Consistency { files } => {
            let ratings = files
                .iter()
                .map(|path| read_json::<Rating>(path))
                .collect::<anyhow::Result<Vec<_>>>()?;
            render_report(&consistency_report(&ratings), args.json)
        }
        Command::Reconcile { file } => {
            let detection: Detection = read_json(file)?;
            let result = reconcile_detected_regions(
                &detection.boxes,
                detection.transform_height,
                config.noise_threshold,
            )?;
            tracing::info!(
                "Kept {} of {} detected box(es)",
                result.elements.len(),
                detection.boxes.len()
            );
            if args.json {
                Ok(serde_json::to_string_pretty(&serde_json::json!({
                    "elements": result.elements,
                    "discarded": result.discarded,
                    "rejected": result.rejected,
                }))?)
            } else {
                let mut out = String::new();
                for element in &result.elements {
                    writeln!(out, "{element}")?;
                }
                write!(
                    out,
                    "{} kept, {} discarded as noise, {} rejected",
                    result.elements.len(),
                    result.discarded,
                    result.rejected
                )?;
                Ok(out)
            }
        }
        Command::Request { file } => {
            let document: SessionDocument = read_json(file)?;
            let session = AnnotationSession::from_document(document, &config);
            let request = session.submission()?;
            Ok(serde_json::to_string_pretty(&request)?)
        }
        Command::Ratings { action } => run_ratings(action, &config, args.json),
    }
}

fn run_ratings(action: &RatingsCommand, config: &RaterConfig, json: bool) -> anyhow::Result<String> {
    let data_dir = config
        .data_dir
        .as_ref()
        .context("no data directory; pass --data-dir or set RATER_DATA_DIR")?;
    let store = RatingStore::with_data_dir(data_dir)?;
    store.load_all_from_disk()?;

    match action {
        RatingsCommand::List => {
            let entries = store.list();
            if json {
                return Ok(serde_json::to_string_pretty(&entries)?);
            }
            let mut out = String::new();
            for entry in &entries {
                writeln!(
                    out,
                    "{}  {:>3}  {}",
                    entry.id,
                    entry.rating.score,
                    entry.rating.name.as_deref().unwrap_or("(unnamed)")
                )?;
            }
            Ok(out.trim_end().to_string())
        }
        RatingsCommand::Add {
            file,
            name,
            image,
            color,
        } => {
            let rating: Rating = read_json(file)?;
            let main_color = color
                .as_deref()
                .map(|hex| Rgb::from_hex(hex).with_context(|| format!("invalid colour {hex:?}")))
                .transpose()?;
            let elements = rating.elements.clone();
            let id = store.add(
                rating,
                RatingMetadata {
                    name: name.clone(),
                    image_path: image.clone(),
                    main_color,
                    elements,
                },
            )?;
            Ok(id.to_string())
        }
        RatingsCommand::Remove { id } => {
            let removed = store.remove(RatingId::parse(id)?)?;
            Ok(format!(
                "Removed {}",
                removed.name.as_deref().unwrap_or(id.as_str())
            ))
        }
        RatingsCommand::Consistency { ids } => {
            let ids = ids
                .iter()
                .map(|id| RatingId::parse(id))
                .collect::<Result<Vec<_>, _>>()?;
            let ratings = store.select(&ids)?;
            render_report(&consistency_report(&ratings), json)
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("failed to parse {}", path.display()))
}

fn render_report(report: &ConsistencyReport, json: bool) -> anyhow::Result<String> {
    if json {
        return Ok(serde_json::to_string_pretty(report)?);
    }
    let mut out = format!("Consistency: {}", report.score);
    if let Some(reason) = report.undefined {
        write!(out, " ({reason})")?;
    }
    for spread in &report.spreads {
        write!(
            out,
            "\n  {:<24} scores {:?}  std dev {:.2}  inconsistency {:.3}",
            spread.metric_type.human_readable(),
            spread.scores,
            spread.std_dev,
            spread.relative_inconsistency
        )?;
    }
    Ok(out)
}

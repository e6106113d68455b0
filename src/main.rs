//! Fragmap CLI - overlay per-round combat statistics on a game map
//!
//! Usage:
//!   cargo run -- --map Icebox --type diff --label "Aspas Attack"
//!   cargo run -- --map Ascent --type engage
//!   cargo run -- --map Bind --type diff --precomputed --data rounds.csv
//!   cargo run -- --map Icebox --type diff --unclamped --grid-lines --cell-labels
//!
//! Outputs land in the output directory as:
//!   heatmap_<type>_<label>.png        composited figure
//!   heatmap_<type>_<label>.txt        per-cell data (row,col,value)
//!   heatmap_<type>_<label>.stats.json run summary

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use fragmap::{ClampPolicy, IngestMode, RunConfig, StatKind};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Overlay per-round combat statistics on a game map as a 10x10 heatmap"
)]
struct Args {
    /// Map name; the image is loaded from <MAPS_DIR>/<MAP>.png
    #[arg(long)]
    map: String,

    /// Free-text match label used in the title and output filename
    #[arg(long, default_value = "")]
    label: String,

    /// Heatmap statistic
    #[arg(long = "type", value_enum)]
    stat: StatArg,

    /// Per-round statistics CSV
    #[arg(long, default_value = "demo_data.csv")]
    data: PathBuf,

    /// Directory holding map images
    #[arg(long, default_value = "maps")]
    maps_dir: PathBuf,

    /// Output directory
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Read the precomputed Differential column instead of Kills/Deaths
    #[arg(long)]
    precomputed: bool,

    /// Keep raw differential values instead of clamping to [-3, +3]
    #[arg(long)]
    unclamped: bool,

    /// Light canvas styling instead of the default dark
    #[arg(long)]
    light: bool,

    /// Draw grid lines over the map
    #[arg(long)]
    grid_lines: bool,

    /// Draw "row,col" labels in each cell
    #[arg(long)]
    cell_labels: bool,

    /// Font for the title and labels
    #[arg(long, default_value = fragmap::DEFAULT_FONT_FILE)]
    font: PathBuf,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StatArg {
    /// Kill differential per map region
    Diff,
    /// Kills + deaths per map region
    Engage,
}

impl From<StatArg> for StatKind {
    fn from(value: StatArg) -> Self {
        match value {
            StatArg::Diff => StatKind::Differential,
            StatArg::Engage => StatKind::Engagements,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = RunConfig::new(&args.map, args.stat.into());
    config.match_label = args.label;
    config.data_path = args.data;
    config.maps_dir = args.maps_dir;
    config.out_dir = args.out_dir;
    config.ingest = if args.precomputed {
        IngestMode::PrecomputedDifferential
    } else {
        IngestMode::DeriveFromKillsDeaths
    };
    config.clamp = if args.unclamped {
        ClampPolicy::Unclamped
    } else {
        ClampPolicy::Clamped
    };
    config.dark_mode = !args.light;
    config.grid_lines = args.grid_lines;
    config.cell_labels = args.cell_labels;
    config.font_path = args.font;

    let artifacts = fragmap::run(&config)
        .with_context(|| format!("failed to render heatmap for map '{}'", args.map))?;

    println!("Saved {}", artifacts.image_path.display());
    println!(
        "Rows used: {}, skipped: {}",
        artifacts.rows_used, artifacts.rows_skipped
    );
    Ok(())
}

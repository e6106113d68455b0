//! End-to-end heatmap run: load, aggregate, render, save
//!
//! One `RunConfig` describes a whole invocation: statistic, ingestion
//! mode, clamp policy, styling, and output locations.

use std::fmt::Write as FmtWrite;
use std::fs;
use std::path::PathBuf;

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use crate::colors::{ScaleBounds, differential_scale, engagement_scale};
use crate::error::{HeatmapError, Result};
use crate::grid::{AggregatedGrids, ClampPolicy, GRID_SIZE, IngestMode, StatGrid, aggregate};
use crate::render::{
    DEFAULT_OUTPUT_LONG_EDGE, LegendSpec, RenderOptions, Style, compose, load_font, load_map,
};
use crate::rounds::load_rounds;

/// Default font location for titles and labels.
pub const DEFAULT_FONT_FILE: &str = "assets/fonts/label.ttf";

/// Which statistic the run renders.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatKind {
    Differential,
    Engagements,
}

impl StatKind {
    /// Short tag used in output filenames.
    pub fn file_tag(self) -> &'static str {
        match self {
            StatKind::Differential => "diff",
            StatKind::Engagements => "engage",
        }
    }

    /// Colorbar caption.
    pub fn axis_label(self) -> &'static str {
        match self {
            StatKind::Differential => "Kill Differential",
            StatKind::Engagements => "Engagements (Kills + Deaths)",
        }
    }

    /// Title fragment.
    pub fn title_label(self) -> &'static str {
        match self {
            StatKind::Differential => "Kill Differential Heatmap",
            StatKind::Engagements => "Engagement Heatmap",
        }
    }
}

/// Everything one run needs.
#[derive(Debug)]
pub struct RunConfig {
    /// Map name; the image is loaded from `<maps_dir>/<map_name>.png`.
    pub map_name: String,
    /// Free-text match label, used only for the title and filename.
    pub match_label: String,
    pub stat: StatKind,
    pub data_path: PathBuf,
    pub maps_dir: PathBuf,
    pub out_dir: PathBuf,
    pub ingest: IngestMode,
    pub clamp: ClampPolicy,
    pub dark_mode: bool,
    pub grid_lines: bool,
    pub cell_labels: bool,
    pub font_path: PathBuf,
    /// Long-side pixel target for the composited map.
    pub output_long_edge: u32,
}

impl RunConfig {
    pub fn new(map_name: &str, stat: StatKind) -> Self {
        Self {
            map_name: map_name.to_string(),
            match_label: String::new(),
            stat,
            data_path: PathBuf::from("demo_data.csv"),
            maps_dir: PathBuf::from("maps"),
            out_dir: PathBuf::from("."),
            ingest: IngestMode::default(),
            clamp: ClampPolicy::default(),
            dark_mode: true,
            grid_lines: false,
            cell_labels: false,
            font_path: PathBuf::from(DEFAULT_FONT_FILE),
            output_long_edge: DEFAULT_OUTPUT_LONG_EDGE,
        }
    }
}

/// Output paths and row counts from a completed run.
#[derive(Clone, Debug)]
pub struct RunArtifacts {
    pub image_path: PathBuf,
    pub data_path: PathBuf,
    pub stats_path: PathBuf,
    pub rows_used: usize,
    pub rows_skipped: usize,
}

#[derive(Serialize)]
struct RunSummary<'a> {
    map: &'a str,
    label: &'a str,
    statistic: &'a str,
    rows_used: usize,
    rows_skipped: usize,
    cells_with_data: usize,
    value_min: Option<f32>,
    value_max: Option<f32>,
    scale_min: f32,
    scale_max: f32,
    generated_at: String,
}

/// Execute one full run. Fatal conditions are a missing map image, an
/// unreadable CSV, an incompatible option combination, and output write
/// failures; everything row-level is skipped with a warning.
pub fn run(config: &RunConfig) -> Result<RunArtifacts> {
    if config.stat == StatKind::Engagements && config.ingest == IngestMode::PrecomputedDifferential
    {
        return Err(HeatmapError::Config(
            "engagement heatmaps need the Kills/Deaths columns; \
             precomputed differential input only supports the diff statistic"
                .to_string(),
        ));
    }

    let records = load_rounds(&config.data_path)?;
    let grids = aggregate(&records, config.ingest, config.clamp);

    let map_path = config.maps_dir.join(format!("{}.png", config.map_name));
    let mut map = load_map(&map_path)?;
    map.upscale_for_output(config.output_long_edge);

    let grid = match config.stat {
        StatKind::Differential => &grids.differential,
        StatKind::Engagements => &grids.engagements,
    };
    let scale = match config.stat {
        StatKind::Differential => differential_scale(),
        StatKind::Engagements => engagement_scale(),
    };
    let bounds = match config.stat {
        StatKind::Differential => ScaleBounds::differential(),
        StatKind::Engagements => ScaleBounds::engagement(grid),
    };

    let title = compose_title(&config.match_label, &config.map_name, config.stat);
    let legend = LegendSpec {
        scale: &scale,
        bounds,
        axis_label: config.stat.axis_label(),
        title: &title,
    };
    let options = RenderOptions {
        style: if config.dark_mode {
            Style::dark()
        } else {
            Style::light()
        },
        grid_lines: config.grid_lines,
        cell_labels: config.cell_labels,
        font: load_font(&config.font_path),
    };

    let figure = compose(&map, grid, &legend, &options);

    fs::create_dir_all(&config.out_dir)?;
    let base = output_base_name(config.stat, &config.match_label);
    let image_path = config.out_dir.join(format!("{base}.png"));
    let data_path = config.out_dir.join(format!("{base}.txt"));
    let stats_path = config.out_dir.join(format!("{base}.stats.json"));

    figure.save(&image_path)?;
    fs::write(&data_path, grid_data_sidecar(grid))?;
    fs::write(&stats_path, summary_json(config, &grids, grid, bounds)?)?;

    info!("Saved {}", image_path.display());
    Ok(RunArtifacts {
        image_path,
        data_path,
        stats_path,
        rows_used: grids.rows_used,
        rows_skipped: grids.rows_skipped,
    })
}

/// Reduce a free-text match label to a filesystem-safe token: ASCII
/// alphanumerics lowercased, any other run of characters collapsed into a
/// single underscore.
pub fn sanitize_match_label(label: &str) -> String {
    let mut out = String::new();
    let mut last_was_underscore = false;

    for ch in label.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
            last_was_underscore = false;
        } else if !last_was_underscore {
            out.push('_');
            last_was_underscore = true;
        }
    }

    out.trim_matches('_').to_string()
}

fn output_base_name(stat: StatKind, label: &str) -> String {
    let safe = sanitize_match_label(label);
    if safe.is_empty() {
        format!("heatmap_{}", stat.file_tag())
    } else {
        format!("heatmap_{}_{}", stat.file_tag(), safe)
    }
}

fn compose_title(label: &str, map_name: &str, stat: StatKind) -> String {
    if label.trim().is_empty() {
        format!("{} – {}", map_name, stat.title_label())
    } else {
        format!("{} – {} – {}", label, map_name, stat.title_label())
    }
}

/// Per-cell data sidecar, one `row,col,value` line per cell with data.
fn grid_data_sidecar(grid: &StatGrid) -> String {
    let mut data = String::from("row,col,value\n");
    for row in 0..GRID_SIZE {
        for col in 0..GRID_SIZE {
            let value = grid.get(row, col);
            if value.is_nan() {
                continue;
            }
            let _ = writeln!(&mut data, "{row},{col},{value:.3}");
        }
    }
    data
}

fn summary_json(
    config: &RunConfig,
    grids: &AggregatedGrids,
    grid: &StatGrid,
    bounds: ScaleBounds,
) -> Result<String> {
    let summary = RunSummary {
        map: &config.map_name,
        label: &config.match_label,
        statistic: config.stat.file_tag(),
        rows_used: grids.rows_used,
        rows_skipped: grids.rows_skipped,
        cells_with_data: grid.data_count(),
        value_min: grid.min_finite(),
        value_max: grid.max_finite(),
        scale_min: bounds.min,
        scale_max: bounds.max,
        generated_at: Utc::now().to_rfc3339(),
    };
    Ok(serde_json::to_string_pretty(&summary)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::time::{SystemTime, UNIX_EPOCH};

    use image::{Rgba, RgbaImage};

    fn temp_workspace() -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("fragmap_test_{}", nanos));
        fs::create_dir_all(&dir).expect("create test workspace");
        dir
    }

    fn write_test_map(dir: &Path, name: &str) {
        let maps = dir.join("maps");
        fs::create_dir_all(&maps).expect("create maps dir");
        let img = RgbaImage::from_pixel(20, 20, Rgba([90, 90, 90, 255]));
        img.save(maps.join(format!("{name}.png"))).expect("save test map");
    }

    fn test_config(dir: &Path, stat: StatKind) -> RunConfig {
        let mut config = RunConfig::new("Testmap", stat);
        config.data_path = dir.join("rounds.csv");
        config.maps_dir = dir.join("maps");
        config.out_dir = dir.join("out");
        config.font_path = dir.join("missing.ttf");
        // Keep test renders at native map resolution.
        config.output_long_edge = 0;
        config
    }

    #[test]
    fn sanitize_keeps_alphanumerics_and_collapses_the_rest() {
        assert_eq!(sanitize_match_label("Aspas Attack"), "aspas_attack");
        assert_eq!(sanitize_match_label("Grand Final!! (Map 3)"), "grand_final_map_3");
        assert_eq!(sanitize_match_label("___"), "");
        assert_eq!(sanitize_match_label(""), "");
    }

    #[test]
    fn output_names_distinguish_statistics_and_labels() {
        let diff = output_base_name(StatKind::Differential, "Aspas Attack");
        let engage = output_base_name(StatKind::Engagements, "Aspas Attack");
        assert_ne!(diff, engage);
        assert_eq!(diff, "heatmap_diff_aspas_attack");

        // Identical label and statistic collide, and overwrite.
        assert_eq!(diff, output_base_name(StatKind::Differential, "Aspas Attack"));
        assert_eq!(output_base_name(StatKind::Differential, ""), "heatmap_diff");
    }

    #[test]
    fn title_skips_an_empty_label() {
        assert_eq!(
            compose_title("", "Icebox", StatKind::Engagements),
            "Icebox – Engagement Heatmap"
        );
        assert_eq!(
            compose_title("Scrim 4", "Icebox", StatKind::Differential),
            "Scrim 4 – Icebox – Kill Differential Heatmap"
        );
    }

    #[test]
    fn data_sidecar_lists_only_cells_with_data() {
        let mut grid = StatGrid::new();
        grid.set(3, 7, 3.0);
        grid.set(0, 0, -1.0);

        let sidecar = grid_data_sidecar(&grid);
        assert_eq!(sidecar, "row,col,value\n0,0,-1.000\n3,7,3.000\n");
    }

    #[test]
    fn run_renders_image_and_sidecars() {
        let dir = temp_workspace();
        write_test_map(&dir, "Testmap");
        fs::write(
            dir.join("rounds.csv"),
            "Coordinate,Kills,Deaths\n\
             \"3,7\",5 kills,2 deaths\n\
             \"3,7\",1,1\n\
             \"10,0\",4,0\n\
             bad,1,1\n",
        )
        .expect("write test csv");

        let mut config = test_config(&dir, StatKind::Differential);
        config.match_label = "Unit Test".to_string();

        let artifacts = run(&config).expect("run pipeline");
        assert!(artifacts.image_path.exists());
        assert!(artifacts.data_path.exists());
        assert_eq!(artifacts.rows_used, 2);
        assert_eq!(artifacts.rows_skipped, 2);

        // Last write to (3,7) wins: 1 kill, 1 death -> differential 0.
        let sidecar = fs::read_to_string(&artifacts.data_path).expect("read sidecar");
        assert!(sidecar.contains("3,7,0.000"));

        let stats: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&artifacts.stats_path).expect("read stats"))
                .expect("parse stats");
        assert_eq!(stats["rows_used"], 2);
        assert_eq!(stats["cells_with_data"], 1);
        assert_eq!(stats["statistic"], "diff");

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn run_fails_without_the_map_image() {
        let dir = temp_workspace();
        fs::write(dir.join("rounds.csv"), "Coordinate,Kills,Deaths\n").expect("write test csv");

        let config = test_config(&dir, StatKind::Differential);
        assert!(run(&config).is_err());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn run_rejects_engagements_with_precomputed_input() {
        let dir = temp_workspace();
        write_test_map(&dir, "Testmap");
        fs::write(dir.join("rounds.csv"), "Coordinate,Differential\n\"1,1\",+2\n")
            .expect("write test csv");

        let mut config = test_config(&dir, StatKind::Engagements);
        config.ingest = IngestMode::PrecomputedDifferential;

        assert!(matches!(run(&config), Err(HeatmapError::Config(_))));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn run_handles_an_entirely_invalid_dataset() {
        let dir = temp_workspace();
        write_test_map(&dir, "Testmap");
        fs::write(
            dir.join("rounds.csv"),
            "Coordinate,Kills,Deaths\nnowhere,1,1\n\"12,12\",2,2\n",
        )
        .expect("write test csv");

        let config = test_config(&dir, StatKind::Engagements);
        let artifacts = run(&config).expect("run pipeline");
        assert_eq!(artifacts.rows_used, 0);
        assert_eq!(artifacts.rows_skipped, 2);

        let stats: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&artifacts.stats_path).expect("read stats"))
                .expect("parse stats");
        assert_eq!(stats["cells_with_data"], 0);
        // Empty engagement grids still normalize over a non-degenerate range.
        assert_eq!(stats["scale_max"], 1.0);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn repeated_runs_overwrite_matching_outputs() {
        let dir = temp_workspace();
        write_test_map(&dir, "Testmap");
        fs::write(
            dir.join("rounds.csv"),
            "Coordinate,Kills,Deaths\n\"2,2\",3,1\n",
        )
        .expect("write test csv");

        let mut config = test_config(&dir, StatKind::Differential);
        config.match_label = "same label".to_string();

        let first = run(&config).expect("first run");
        let second = run(&config).expect("second run");
        assert_eq!(first.image_path, second.image_path);

        // A different label lands in a different file.
        config.match_label = "other label".to_string();
        let third = run(&config).expect("third run");
        assert_ne!(first.image_path, third.image_path);

        let _ = fs::remove_dir_all(&dir);
    }
}

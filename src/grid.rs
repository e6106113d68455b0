//! Fixed 10x10 statistic grids and per-round aggregation

use tracing::warn;

use crate::rounds::{RoundRecord, leading_count, leading_signed, parse_coordinate};

/// Cells per axis; every map is divided into GRID_SIZE x GRID_SIZE regions.
pub const GRID_SIZE: usize = 10;

/// How raw differential values are treated before color mapping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClampPolicy {
    /// Clamp each cell's differential to [-3, +3].
    #[default]
    Clamped,
    /// Keep raw differentials; colors still saturate at the scale endpoints.
    Unclamped,
}

/// Where the differential statistic comes from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IngestMode {
    /// Derive differential and engagements from the Kills/Deaths columns.
    #[default]
    DeriveFromKillsDeaths,
    /// Read the precomputed signed Differential column; engagements are
    /// not available in this mode.
    PrecomputedDifferential,
}

/// GRID_SIZE x GRID_SIZE grid of f32 cells; NaN marks "no data".
#[derive(Clone, Debug)]
pub struct StatGrid {
    values: Vec<f32>,
}

impl Default for StatGrid {
    fn default() -> Self {
        Self::new()
    }
}

impl StatGrid {
    pub fn new() -> Self {
        Self {
            values: vec![f32::NAN; GRID_SIZE * GRID_SIZE],
        }
    }

    fn index(row: usize, col: usize) -> usize {
        row * GRID_SIZE + col
    }

    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.values[Self::index(row, col)]
    }

    /// Overwrite the cell at (row, col). Last write wins.
    pub fn set(&mut self, row: usize, col: usize, value: f32) {
        let idx = Self::index(row, col);
        self.values[idx] = value;
    }

    /// Iterate all cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = f32> + '_ {
        self.values.iter().copied()
    }

    /// Largest finite value, or None when every cell is "no data".
    pub fn max_finite(&self) -> Option<f32> {
        self.cells()
            .filter(|v| v.is_finite())
            .fold(None, |best, v| Some(best.map_or(v, |b: f32| b.max(v))))
    }

    /// Smallest finite value, or None when every cell is "no data".
    pub fn min_finite(&self) -> Option<f32> {
        self.cells()
            .filter(|v| v.is_finite())
            .fold(None, |best, v| Some(best.map_or(v, |b: f32| b.min(v))))
    }

    /// Number of cells holding data.
    pub fn data_count(&self) -> usize {
        self.cells().filter(|v| v.is_finite()).count()
    }
}

/// Result of one aggregation pass over the CSV records.
#[derive(Clone, Debug)]
pub struct AggregatedGrids {
    pub differential: StatGrid,
    pub engagements: StatGrid,
    pub rows_used: usize,
    pub rows_skipped: usize,
}

/// Aggregate records into the differential and engagement grids.
///
/// Last write wins per cell; rows mapping to the same cell overwrite, with
/// no averaging. Malformed or out-of-range rows are skipped with a warning
/// and never abort the pass.
pub fn aggregate(records: &[RoundRecord], mode: IngestMode, clamp: ClampPolicy) -> AggregatedGrids {
    let mut grids = AggregatedGrids {
        differential: StatGrid::new(),
        engagements: StatGrid::new(),
        rows_used: 0,
        rows_skipped: 0,
    };

    for record in records {
        match aggregate_row(&mut grids, record, mode, clamp) {
            Ok(()) => grids.rows_used += 1,
            Err(reason) => {
                warn!("Skipping row: {reason}");
                grids.rows_skipped += 1;
            }
        }
    }

    grids
}

fn aggregate_row(
    grids: &mut AggregatedGrids,
    record: &RoundRecord,
    mode: IngestMode,
    clamp: ClampPolicy,
) -> std::result::Result<(), String> {
    let raw_coord = record
        .coordinate
        .as_deref()
        .ok_or_else(|| "missing Coordinate field".to_string())?;
    let (row, col) = parse_coordinate(raw_coord)
        .ok_or_else(|| format!("invalid coordinate '{}'", raw_coord.trim()))?;

    let range = 0..GRID_SIZE as i32;
    if !range.contains(&row) || !range.contains(&col) {
        return Err(format!(
            "coordinate ({row},{col}) outside the {GRID_SIZE}x{GRID_SIZE} grid"
        ));
    }
    let (row, col) = (row as usize, col as usize);

    match mode {
        IngestMode::DeriveFromKillsDeaths => {
            let kills = record
                .kills
                .as_deref()
                .and_then(leading_count)
                .ok_or_else(|| "unparsable Kills field".to_string())?;
            let deaths = record
                .deaths
                .as_deref()
                .and_then(leading_count)
                .ok_or_else(|| "unparsable Deaths field".to_string())?;

            let diff = apply_clamp(kills as i32 - deaths as i32, clamp);
            grids.differential.set(row, col, diff as f32);
            grids.engagements.set(row, col, (kills + deaths) as f32);
        }
        IngestMode::PrecomputedDifferential => {
            let diff = record
                .differential
                .as_deref()
                .and_then(leading_signed)
                .ok_or_else(|| "unparsable Differential field".to_string())?;
            grids
                .differential
                .set(row, col, apply_clamp(diff, clamp) as f32);
        }
    }

    Ok(())
}

fn apply_clamp(diff: i32, clamp: ClampPolicy) -> i32 {
    match clamp {
        ClampPolicy::Clamped => diff.clamp(-3, 3),
        ClampPolicy::Unclamped => diff,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(coord: &str, kills: &str, deaths: &str) -> RoundRecord {
        RoundRecord {
            coordinate: Some(coord.to_string()),
            kills: Some(kills.to_string()),
            deaths: Some(deaths.to_string()),
            differential: None,
        }
    }

    fn diff_record(coord: &str, differential: &str) -> RoundRecord {
        RoundRecord {
            coordinate: Some(coord.to_string()),
            kills: None,
            deaths: None,
            differential: Some(differential.to_string()),
        }
    }

    fn cells_equal(a: &StatGrid, b: &StatGrid) -> bool {
        a.cells()
            .zip(b.cells())
            .all(|(x, y)| (x.is_nan() && y.is_nan()) || x == y)
    }

    #[test]
    fn derives_differential_and_engagements() {
        let records = vec![record("3,7", "5 kills", "2 deaths")];
        let grids = aggregate(&records, IngestMode::default(), ClampPolicy::default());

        assert_eq!(grids.differential.get(3, 7), 3.0);
        assert_eq!(grids.engagements.get(3, 7), 7.0);
        assert_eq!(grids.rows_used, 1);
        assert_eq!(grids.rows_skipped, 0);
    }

    #[test]
    fn last_write_wins_per_cell() {
        let records = vec![record("2,2", "1", "0"), record("2,2", "0", "4")];
        let grids = aggregate(&records, IngestMode::default(), ClampPolicy::default());

        assert_eq!(grids.differential.get(2, 2), -3.0);
        assert_eq!(grids.engagements.get(2, 2), 4.0);
    }

    #[test]
    fn aggregation_is_idempotent() {
        let records = vec![
            record("0,0", "2", "1"),
            record("9,9", "0 kills", "3 deaths"),
            record("bad", "1", "1"),
        ];
        let first = aggregate(&records, IngestMode::default(), ClampPolicy::default());
        let second = aggregate(&records, IngestMode::default(), ClampPolicy::default());

        assert!(cells_equal(&first.differential, &second.differential));
        assert!(cells_equal(&first.engagements, &second.engagements));
    }

    #[test]
    fn out_of_range_coordinate_is_skipped() {
        let records = vec![record("10,0", "4", "1"), record("0,-1", "4", "1")];
        let grids = aggregate(&records, IngestMode::default(), ClampPolicy::default());

        assert_eq!(grids.rows_used, 0);
        assert_eq!(grids.rows_skipped, 2);
        assert_eq!(grids.differential.data_count(), 0);
    }

    #[test]
    fn malformed_counts_are_skipped() {
        let records = vec![
            record("1,1", "many kills", "2"),
            record("1,2", "3", ""),
            RoundRecord {
                coordinate: Some("1,3".to_string()),
                ..RoundRecord::default()
            },
        ];
        let grids = aggregate(&records, IngestMode::default(), ClampPolicy::default());

        assert_eq!(grids.rows_used, 0);
        assert_eq!(grids.rows_skipped, 3);
    }

    #[test]
    fn clamp_policy_bounds_differential() {
        let records = vec![record("0,0", "9", "1"), record("0,1", "0", "9")];

        let clamped = aggregate(&records, IngestMode::default(), ClampPolicy::Clamped);
        assert_eq!(clamped.differential.get(0, 0), 3.0);
        assert_eq!(clamped.differential.get(0, 1), -3.0);

        let raw = aggregate(&records, IngestMode::default(), ClampPolicy::Unclamped);
        assert_eq!(raw.differential.get(0, 0), 8.0);
        assert_eq!(raw.differential.get(0, 1), -9.0);
    }

    #[test]
    fn engagements_are_never_clamped() {
        let records = vec![record("5,5", "9", "9")];
        let grids = aggregate(&records, IngestMode::default(), ClampPolicy::Clamped);

        assert_eq!(grids.engagements.get(5, 5), 18.0);
    }

    #[test]
    fn precomputed_mode_reads_differential_column() {
        let records = vec![diff_record("4,6", "-2 rounds"), diff_record("4,7", "+5")];
        let grids = aggregate(
            &records,
            IngestMode::PrecomputedDifferential,
            ClampPolicy::Clamped,
        );

        assert_eq!(grids.differential.get(4, 6), -2.0);
        assert_eq!(grids.differential.get(4, 7), 3.0);
        // Engagements cannot be derived in this mode.
        assert_eq!(grids.engagements.data_count(), 0);
    }

    #[test]
    fn untouched_cells_stay_no_data() {
        let records = vec![record("3,3", "1", "1")];
        let grids = aggregate(&records, IngestMode::default(), ClampPolicy::default());

        assert!(grids.differential.get(0, 0).is_nan());
        assert_eq!(grids.differential.data_count(), 1);
    }

    #[test]
    fn empty_grid_reports_no_extremes() {
        let grid = StatGrid::new();
        assert_eq!(grid.max_finite(), None);
        assert_eq!(grid.min_finite(), None);
        assert_eq!(grid.data_count(), 0);
    }
}

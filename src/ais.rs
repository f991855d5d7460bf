use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};

use crate::error::{HazardError, Result};
use crate::spatial::PointIndex;
use crate::utils;

/// Vessel types as reflected in the AIS raster file names.
pub const VESSEL_TYPES: [&str; 4] = [
    "cargoShips",
    "passengerShips",
    "otherShips",
    "tankerShips",
];

const AIS_NAME_TEMPLATE: &str = "{vessel_type}_{YYYYMMDD}-{YYYYMMDD}_total.tif";

/// One raster cell with a nonzero historical vessel count.
#[derive(Debug, Clone, Copy)]
pub struct AisCell {
    pub lon: f64,
    pub lat: f64,
    pub count: u32,
}

/// External raster reader: opens one AIS GeoTIFF and returns its cells
/// with nonzero vessel counts, positioned via the raster's affine
/// transform. Raster I/O and reprojection live behind this seam.
pub trait RasterSource {
    fn read_cells(&self, path: &Path) -> Result<Vec<AisCell>>;
}

/// One AIS density snapshot: one vessel type, one month.
///
/// Exposes the nonzero cells of the underlying raster as a spatial index
/// so release points can be mapped to historical vessel counts.
pub struct Ais {
    pub vessel_type: String,
    /// First day of the month the raster covers.
    pub date: NaiveDate,
    counts: Vec<u32>,
    index: PointIndex,
}

impl Ais {
    /// Build a snapshot from pre-read raster cells.
    pub fn from_cells(vessel_type: &str, date: NaiveDate, cells: Vec<AisCell>) -> Result<Self> {
        let mut points = Vec::with_capacity(cells.len());
        let mut counts = Vec::with_capacity(cells.len());
        for cell in &cells {
            if cell.count == 0 {
                return Err(HazardError::InvalidData(
                    "AIS snapshot cells must have nonzero counts".to_string(),
                ));
            }
            points.push([cell.lon, cell.lat]);
            counts.push(cell.count);
        }

        let index = PointIndex::build(points)
            .map_err(|_| HazardError::EmptyCatalog("AIS snapshot has no nonzero cells"))?;

        Ok(Self {
            vessel_type: vessel_type.to_string(),
            date,
            counts,
            index,
        })
    }

    /// Open the raster at `path`, deriving vessel type and month from the
    /// file name convention.
    pub fn from_raster(path: &Path, source: &dyn RasterSource) -> Result<Self> {
        let (vessel_type, date) = parse_ais_filename(path)?;
        let cells = source.read_cells(path)?;
        Self::from_cells(&vessel_type, date, cells)
    }

    /// Number of nonzero cells.
    pub fn ncells(&self) -> usize {
        self.counts.len()
    }

    /// Vessel count of the nearest nonzero cell, per query point.
    pub fn counts_at(&self, points: &[[f64; 2]]) -> Vec<u32> {
        self.index
            .nearest_batch(points)
            .into_iter()
            .map(|ix| self.counts[ix])
            .collect()
    }

    /// Days in the month this snapshot covers.
    pub fn days_in_month(&self) -> u32 {
        utils::days_in_month(self.date)
    }
}

/// The set of AIS rasters available in a directory, keyed by
/// (vessel type, month).
///
/// Snapshots are discovered by scanning the directory for files matching
/// the AIS naming convention; a lookup for a month with no file on disk
/// is a `MissingAisSnapshot` error, never a silently substituted month.
pub struct AisSet {
    pub dir: PathBuf,
    pub year: i32,
    paths: HashMap<(String, u32), PathBuf>,
}

impl AisSet {
    pub fn new(dir: impl Into<PathBuf>, year: i32) -> Result<Self> {
        let dir = dir.into();
        let mut paths = HashMap::new();

        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            let name = match path.file_name().and_then(|n| n.to_str()) {
                Some(name) => name,
                None => continue,
            };
            if !name.ends_with("_total.tif") {
                continue;
            }
            let (vessel_type, date) = parse_ais_filename(&path)?;
            if date.year() == year {
                paths.insert((vessel_type, date.month()), path);
            }
        }

        Ok(Self { dir, year, paths })
    }

    /// Number of discovered snapshots.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Path to the AIS raster matching a vessel type and the month of a
    /// simulation start date.
    ///
    /// The AIS year is fixed by the set; only the month of `sim_date` is
    /// used to select the snapshot, so simulations from any year match
    /// against the same historical density fields.
    pub fn ais_path(&self, vessel_type: &str, sim_date: NaiveDate) -> Result<&Path> {
        self.paths
            .get(&(vessel_type.to_string(), sim_date.month()))
            .map(|p| p.as_path())
            .ok_or_else(|| HazardError::MissingAisSnapshot {
                vessel_type: vessel_type.to_string(),
                date: sim_date,
            })
    }

    /// Load the snapshot for a vessel type and simulation start date.
    pub fn load(
        &self,
        vessel_type: &str,
        sim_date: NaiveDate,
        source: &dyn RasterSource,
    ) -> Result<Ais> {
        let path = self.ais_path(vessel_type, sim_date)?;
        Ais::from_raster(path, source)
    }
}

/// Parse `"{vessel_type}_{YYYYMMDD}-{YYYYMMDD}_total.tif"`; the start
/// date of the interval selects the month.
pub fn parse_ais_filename(path: &Path) -> Result<(String, NaiveDate)> {
    let invalid = || HazardError::InvalidFilename {
        path: path.to_path_buf(),
        expected: AIS_NAME_TEMPLATE,
    };

    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(invalid)?;
    let stem = name.strip_suffix("_total.tif").ok_or_else(invalid)?;
    let (vessel_type, interval) = stem.split_once('_').ok_or_else(invalid)?;
    let (start, _end) = interval.split_once('-').ok_or_else(invalid)?;
    let date = NaiveDate::parse_from_str(start, "%Y%m%d").map_err(|_| invalid())?;

    if vessel_type.is_empty() {
        return Err(invalid());
    }
    Ok((vessel_type.to_string(), date))
}

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use polars::prelude::*;
use tracing::{info, warn};

use crate::drift_results::{collect_nc_paths, concat_run_frames, tag_run};
use crate::error::{HazardError, Result};
use crate::esi::{region_of, Esi};
use crate::schema::spill;
use crate::trajectory::{TrajectoryData, TrajectorySource};
use crate::utils;

const SPILL_NAME_TEMPLATE: &str = "oilspill_{vessel_type}_{YYYY-MM-DD}.nc";

/// Container for the results of a single oil-spill simulation.
///
/// `data` holds one row per ESI segment that received at least one
/// beached particle: summed `oil_mass`, `particle_hits`, `pb` (fraction
/// of this run's beached particles that hit the segment), and `cs` (mean
/// beached mass normalized by the run's maximum mean mass). Segments
/// with no hits are absent; the combiner fills them in as explicit
/// zeros.
pub struct SpillResult {
    pub path: PathBuf,
    pub start_date: NaiveDate,
    pub vessel_type: String,
    pub data: DataFrame,
}

impl SpillResult {
    pub fn new(
        path: impl Into<PathBuf>,
        traj: &TrajectoryData,
        esi: &Esi,
        vessel_type: &str,
    ) -> Result<Self> {
        let data = calc_concentration_index(traj, esi)?;
        Ok(Self {
            path: path.into(),
            start_date: traj.start_time,
            vessel_type: vessel_type.to_string(),
            data,
        })
    }

    /// Persist the per-segment table to parquet.
    pub fn to_parquet(&self, path: &Path) -> Result<()> {
        utils::write_parquet(&self.data, path)
    }
}

/// Per-segment accumulation of one spill run.
#[derive(Default)]
struct SegmentHits {
    oil_mass: f64,
    hits: u32,
}

/// Concentration index and spill-hit probability per hit segment.
///
/// `cs` follows Sepp Neves (2016): the mean concentration of beached oil
/// at each coastal site, normalized by the maximum mean concentration in
/// the domain, so the most-loaded segment of a run sits at exactly 1.0.
fn calc_concentration_index(traj: &TrajectoryData, esi: &Esi) -> Result<DataFrame> {
    let stranding = traj.stranding_points()?;
    let masses = traj.stranded_oil_mass()?;

    let stranded_points: Vec<[f64; 2]> = stranding.iter().filter_map(|p| *p).collect();
    let segment_ids = esi.segment_for_points(&stranded_points);

    // BTreeMap keeps per-segment rows in a stable order across runs
    let mut by_segment: BTreeMap<&str, SegmentHits> = BTreeMap::new();
    let mut next = 0;
    for (point, mass) in stranding.iter().zip(&masses) {
        if point.is_none() {
            continue;
        }
        let entry = by_segment.entry(segment_ids[next]).or_default();
        entry.oil_mass += mass.unwrap_or(0.0);
        entry.hits += 1;
        next += 1;
    }

    let total_hits: u32 = by_segment.values().map(|s| s.hits).sum();
    let max_mean_mass = by_segment
        .values()
        .map(|s| s.oil_mass / s.hits as f64)
        .fold(0.0_f64, f64::max);

    let nsegments = by_segment.len();
    let mut esi_id = Vec::with_capacity(nsegments);
    let mut region = Vec::with_capacity(nsegments);
    let mut oil_mass = Vec::with_capacity(nsegments);
    let mut particle_hits = Vec::with_capacity(nsegments);
    let mut pb = Vec::with_capacity(nsegments);
    let mut cs = Vec::with_capacity(nsegments);

    for (id, segment) in &by_segment {
        let mean_mass = segment.oil_mass / segment.hits as f64;
        esi_id.push(id.to_string());
        region.push(region_of(id).to_string());
        oil_mass.push(segment.oil_mass);
        particle_hits.push(segment.hits);
        pb.push(segment.hits as f64 / total_hits as f64);
        // an all-zero-mass run carries no concentration signal
        cs.push(if max_mean_mass > 0.0 {
            mean_mass / max_mean_mass
        } else {
            0.0
        });
    }

    let df = DataFrame::new(vec![
        Column::new(spill::OIL_MASS.into(), oil_mass),
        Column::new(spill::CS.into(), cs),
        Column::new(spill::PB.into(), pb),
        Column::new(spill::PARTICLE_HITS.into(), particle_hits),
        Column::new(spill::ESI_ID.into(), esi_id),
        Column::new(spill::REGION.into(), region),
    ])?;

    Ok(df)
}

/// Interact with a directory of oil-spill simulation results.
pub struct SpillResultsSet {
    pub dir: PathBuf,
    pub paths: Vec<PathBuf>,
}

impl SpillResultsSet {
    /// Collect result paths from a directory of `.nc` files; a single
    /// `.nc` path is accepted as a one-element set.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let dir = path.into();
        let paths = collect_nc_paths(&dir)?;
        Ok(Self { dir, paths })
    }

    /// Distinct vessel types present in the set, from the file names.
    /// Any malformed name in the set fails the scan.
    pub fn vessel_types(&self) -> Result<BTreeSet<String>> {
        self.paths
            .iter()
            .map(|path| parse_spill_filename(path).map(|(vessel_type, _)| vessel_type))
            .collect()
    }

    /// Load all results for one vessel type into a single long table,
    /// tagging each run's rows with `date` and `vessel_type`.
    ///
    /// Malformed result file names always fail the load. With
    /// `skip_failed_runs`, a run that fails mid-computation is logged
    /// and skipped; otherwise the first failure aborts the whole load.
    pub fn load_results(
        &self,
        vessel_type: &str,
        trajectories: &dyn TrajectorySource,
        esi: &Esi,
        skip_failed_runs: bool,
    ) -> Result<DataFrame> {
        let prefix = format!("oilspill_{vessel_type}_");
        let mut frames = Vec::new();

        for path in &self.paths {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            if !name.starts_with(&prefix) {
                continue;
            }
            parse_spill_filename(path)?;

            let run = (|| -> Result<DataFrame> {
                let traj = trajectories.read(path)?;
                let result = SpillResult::new(path.clone(), &traj, esi, vessel_type)?;
                tag_run(result.data, result.start_date, vessel_type)
            })();

            match run {
                Ok(df) => frames.push(df),
                Err(err) if skip_failed_runs => {
                    warn!(path = %path.display(), error = %err, "skipping failed spill run");
                }
                Err(err) => return Err(err),
            }
        }

        info!(
            vessel_type,
            nruns = frames.len(),
            "loaded spill results"
        );
        concat_run_frames(frames)
    }
}

/// Parse `"oilspill_{vessel_type}_{YYYY-MM-DD}.nc"`.
pub fn parse_spill_filename(path: &Path) -> Result<(String, NaiveDate)> {
    let invalid = || HazardError::InvalidFilename {
        path: path.to_path_buf(),
        expected: SPILL_NAME_TEMPLATE,
    };

    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(invalid)?;
    let stem = name.strip_suffix(".nc").ok_or_else(invalid)?;
    let rest = stem.strip_prefix("oilspill_").ok_or_else(invalid)?;
    let (vessel_type, date_str) = rest.rsplit_once('_').ok_or_else(invalid)?;
    let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|_| invalid())?;

    if vessel_type.is_empty() {
        return Err(invalid());
    }
    Ok((vessel_type.to_string(), date))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::esi::EsiSegment;

    fn fixture_esi() -> Esi {
        Esi::from_segments(vec![
            EsiSegment {
                esi_id: "w-001".into(),
                esi: "7".into(),
                lines: vec![vec![[-160.0, 59.0]]],
            },
            EsiSegment {
                esi_id: "se-002".into(),
                esi: "3".into(),
                lines: vec![vec![[-150.0, 58.0]]],
            },
        ])
        .unwrap()
    }

    /// Two particles beach at w-001 with masses 10 and 30, one at se-002
    /// with mass 10, one stays adrift.
    fn fixture_run() -> TrajectoryData {
        let lon = vec![
            205.0, 200.0, // -> w-001
            205.0, 200.0, // -> w-001
            205.0, 210.0, // -> se-002
            205.0, 206.0, // adrift
        ];
        let lat = vec![58.5, 59.0, 58.5, 59.0, 58.5, 58.0, 58.5, 58.6];
        let status = vec![0, 1, 0, 1, 0, 1, 0, 0];
        let mass = vec![0.0, 10.0, 0.0, 30.0, 0.0, 10.0, 0.0, 0.0];
        TrajectoryData::new(
            NaiveDate::from_ymd_opt(2019, 12, 5).unwrap(),
            "active stranded",
            4,
            2,
            lon,
            lat,
            status,
            Some(mass),
        )
        .unwrap()
    }

    #[test]
    fn concentration_index_per_segment() {
        let result = SpillResult::new(
            "oilspill_tanker_2019-12-05.nc",
            &fixture_run(),
            &fixture_esi(),
            "tanker",
        )
        .unwrap();

        let df = &result.data;
        assert_eq!(df.height(), 2);

        // rows are ordered by segment id: se-002, w-001
        let oil = df
            .column(spill::OIL_MASS)
            .unwrap()
            .as_materialized_series()
            .f64()
            .unwrap();
        assert_eq!(oil.get(0), Some(10.0)); // se-002
        assert_eq!(oil.get(1), Some(40.0)); // w-001

        let hits = df
            .column(spill::PARTICLE_HITS)
            .unwrap()
            .as_materialized_series()
            .u32()
            .unwrap();
        assert_eq!(hits.get(0), Some(1));
        assert_eq!(hits.get(1), Some(2));

        // pb partitions the beached particles
        let pb = df
            .column(spill::PB)
            .unwrap()
            .as_materialized_series()
            .f64()
            .unwrap();
        assert!((pb.get(0).unwrap() - 1.0 / 3.0).abs() < 1e-12);
        assert!((pb.get(1).unwrap() - 2.0 / 3.0).abs() < 1e-12);

        // w-001 mean mass 20 is the run maximum -> cs exactly 1.0
        let cs = df
            .column(spill::CS)
            .unwrap()
            .as_materialized_series()
            .f64()
            .unwrap();
        assert_eq!(cs.get(1), Some(1.0));
        assert!((cs.get(0).unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn run_with_no_hits_yields_empty_table() {
        let traj = TrajectoryData::new(
            NaiveDate::from_ymd_opt(2019, 12, 5).unwrap(),
            "active stranded",
            2,
            1,
            vec![205.0, 206.0],
            vec![58.5, 58.6],
            vec![0, 0],
            Some(vec![0.0, 0.0]),
        )
        .unwrap();

        let result = SpillResult::new("run.nc", &traj, &fixture_esi(), "tanker").unwrap();
        assert_eq!(result.data.height(), 0);
        assert_eq!(result.data.width(), 6);
    }

    #[test]
    fn zero_mass_run_has_zero_cs() {
        let traj = TrajectoryData::new(
            NaiveDate::from_ymd_opt(2019, 12, 5).unwrap(),
            "active stranded",
            1,
            2,
            vec![205.0, 200.0],
            vec![58.5, 59.0],
            vec![0, 1],
            Some(vec![0.0, 0.0]),
        )
        .unwrap();

        let result = SpillResult::new("run.nc", &traj, &fixture_esi(), "tanker").unwrap();
        let cs = result
            .data
            .column(spill::CS)
            .unwrap()
            .as_materialized_series()
            .f64()
            .unwrap();
        assert_eq!(cs.get(0), Some(0.0));
    }

    #[test]
    fn parse_spill_name() {
        let (vessel_type, date) =
            parse_spill_filename(Path::new("oilspill_tanker_2019-12-05.nc")).unwrap();
        assert_eq!(vessel_type, "tanker");
        assert_eq!(date, NaiveDate::from_ymd_opt(2019, 12, 5).unwrap());
    }

    #[test]
    fn vessel_types_found_from_file_names() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["oilspill_tanker_2019-12-05.nc", "oilspill_cargo_2019-12-05.nc"] {
            std::fs::File::create(dir.path().join(name)).unwrap();
        }
        let set = SpillResultsSet::new(dir.path()).unwrap();
        let types: Vec<String> = set.vessel_types().unwrap().into_iter().collect();
        assert_eq!(types, vec!["cargo".to_string(), "tanker".to_string()]);
    }

    #[test]
    fn parse_spill_name_rejects_malformed() {
        assert!(parse_spill_filename(Path::new("tanker_2019-12-05.nc")).is_err());
        assert!(parse_spill_filename(Path::new("oilspill_tanker.nc")).is_err());
        assert!(parse_spill_filename(Path::new("oilspill_tanker_20191205.nc")).is_err());
        assert!(parse_spill_filename(Path::new("oilspill__2019-12-05.nc")).is_err());
    }
}

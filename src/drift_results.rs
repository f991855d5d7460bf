use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::ais::{Ais, AisSet, RasterSource};
use crate::error::{HazardError, Result};
use crate::esi::{region_of, Esi};
use crate::schema::{drift, run};
use crate::shorezone::{BreachProbConfig, ShoreZone};
use crate::trajectory::{TrajectoryData, TrajectorySource};
use crate::utils;

const DRIFT_NAME_TEMPLATE: &str = "{vessel_type}_alaska_drift_{YYYY-MM-DD}.nc";

/// Calibration for the drift-hazard composition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftHazardConfig {
    /// Daily probability of a vessel losing propulsion and drifting,
    /// derived from Vessels of Concern and AIS data from 2015-2019.
    pub prob_drift: f64,
    pub breach: BreachProbConfig,
}

impl Default for DriftHazardConfig {
    fn default() -> Self {
        Self {
            prob_drift: 0.0006,
            breach: BreachProbConfig::default(),
        }
    }
}

/// Container for the results of a single vessel drift simulation.
///
/// `data` holds one row per particle: `pt`, `pb`, `stranding_hazard`,
/// `breach_prob`, `esi_id`, and `region`, with `esi_id`/`region` null
/// for particles that never stranded. The simulation date and vessel
/// type are run-level attributes; they are added as columns when runs
/// are concatenated by `DriftResultsSet`.
pub struct DriftResult {
    pub path: PathBuf,
    pub start_date: NaiveDate,
    pub vessel_type: String,
    pub data: DataFrame,
}

impl DriftResult {
    /// Compute the per-particle drift hazard terms for one run.
    ///
    /// The AIS snapshot must match the run's vessel type and start
    /// month; resolving the right snapshot is the caller's job (see
    /// `DriftResultsSet::load_results`).
    pub fn new(
        path: impl Into<PathBuf>,
        traj: &TrajectoryData,
        ais: &Ais,
        esi: &Esi,
        shorezone: &ShoreZone,
        config: &DriftHazardConfig,
    ) -> Result<Self> {
        let data = calc_drift_hazard(traj, ais, esi, shorezone, config)?;
        Ok(Self {
            path: path.into(),
            start_date: traj.start_time,
            vessel_type: ais.vessel_type.clone(),
            data,
        })
    }

    /// Persist the per-particle table to parquet.
    pub fn to_parquet(&self, path: &Path) -> Result<()> {
        utils::write_parquet(&self.data, path)
    }
}

/// Probability that a vessel was present at each particle's release
/// point, from the AIS density snapshot of the run's start month.
///
/// A raw monthly presence count is converted to a daily occupancy
/// probability; a cell visited more often than there are days in the
/// month is treated as certainly occupied.
fn calc_pt_per_particle(traj: &TrajectoryData, ais: &Ais) -> Vec<f64> {
    let starting_points = traj.starting_points();
    let counts = ais.counts_at(&starting_points);
    let ndays = ais.days_in_month() as f64;

    counts
        .into_iter()
        .map(|count| (count as f64 / ndays).min(1.0))
        .collect()
}

/// ESI segment id of each particle's stranding location; `None` for
/// particles that never stranded. One vectorized index query for the
/// whole run.
fn esi_per_particle(traj: &TrajectoryData, esi: &Esi) -> Result<Vec<Option<String>>> {
    let stranding = traj.stranding_points()?;
    let stranded_points: Vec<[f64; 2]> = stranding.iter().filter_map(|p| *p).collect();
    let segment_ids = esi.segment_for_points(&stranded_points);

    let mut ids = vec![None; stranding.len()];
    let mut next = 0;
    for (particle, point) in stranding.iter().enumerate() {
        if point.is_some() {
            ids[particle] = Some(segment_ids[next].to_string());
            next += 1;
        }
    }
    Ok(ids)
}

/// `pb` of the segment where each particle stranded.
///
/// `pb` partitions the stranded particles: per segment it is the count
/// of strandings there over the run's total strandings, so it sums to 1
/// across hit segments. Broadcasting back to particles goes through an
/// explicit zero entry for the never-stranded key, which also covers a
/// run with zero strandings without dividing by zero.
fn pb_per_particle(esi_ids: &[Option<String>]) -> Vec<f64> {
    let mut counts: HashMap<&str, u32> = HashMap::new();
    for id in esi_ids.iter().flatten() {
        *counts.entry(id.as_str()).or_insert(0) += 1;
    }
    let total: u32 = counts.values().sum();
    if total == 0 {
        return vec![0.0; esi_ids.len()];
    }

    esi_ids
        .iter()
        .map(|id| match id {
            Some(id) => counts.get(id.as_str()).copied().unwrap_or(0) as f64 / total as f64,
            None => 0.0,
        })
        .collect()
}

/// Probability of each particle breaching at its stranding location;
/// zero for particles that never stranded.
fn breach_prob_per_particle(
    traj: &TrajectoryData,
    shorezone: &ShoreZone,
    config: &BreachProbConfig,
) -> Result<Vec<f64>> {
    let stranding = traj.stranding_points()?;
    let stranded_points: Vec<[f64; 2]> = stranding.iter().filter_map(|p| *p).collect();
    let probs = shorezone.breach_prob(&stranded_points, config);

    let mut per_particle = vec![0.0; stranding.len()];
    let mut next = 0;
    for (particle, point) in stranding.iter().enumerate() {
        if point.is_some() {
            per_particle[particle] = probs[next];
            next += 1;
        }
    }
    Ok(per_particle)
}

fn calc_drift_hazard(
    traj: &TrajectoryData,
    ais: &Ais,
    esi: &Esi,
    shorezone: &ShoreZone,
    config: &DriftHazardConfig,
) -> Result<DataFrame> {
    let pt = calc_pt_per_particle(traj, ais);
    let esi_ids = esi_per_particle(traj, esi)?;
    let pb = pb_per_particle(&esi_ids);

    let stranding_hazard: Vec<f64> = pt
        .iter()
        .zip(&pb)
        .map(|(pt, pb)| pt * pb * config.prob_drift)
        .collect();

    let breach_prob = breach_prob_per_particle(traj, shorezone, &config.breach)?;

    let region: Vec<Option<String>> = esi_ids
        .iter()
        .map(|id| id.as_deref().map(|id| region_of(id).to_string()))
        .collect();

    let df = DataFrame::new(vec![
        Column::new(drift::PT.into(), pt),
        Column::new(drift::PB.into(), pb),
        Column::new(drift::STRANDING_HAZARD.into(), stranding_hazard),
        Column::new(drift::BREACH_PROB.into(), breach_prob),
        Column::new(drift::ESI_ID.into(), esi_ids),
        Column::new(drift::REGION.into(), region),
    ])?;

    Ok(df)
}

/// Interact with a directory of drift simulation results.
pub struct DriftResultsSet {
    pub dir: PathBuf,
    pub paths: Vec<PathBuf>,
}

impl DriftResultsSet {
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
            .map(|path| parse_drift_filename(path).map(|(vessel_type, _)| vessel_type))
            .collect()
    }

    /// Load all results for one vessel type into a single long table.
    ///
    /// Per matching file: parse the start date from the file name,
    /// resolve and read the AIS snapshot for the run's start month,
    /// compute the per-particle hazard terms, then tag rows with `date`
    /// and `vessel_type` and concatenate across runs.
    ///
    /// A malformed result file name always fails the load. With
    /// `skip_failed_runs`, a run that fails mid-computation (including a
    /// missing AIS snapshot, which is fatal for that run) is logged and
    /// skipped; otherwise the first failure aborts the whole load.
    #[allow(clippy::too_many_arguments)]
    pub fn load_results(
        &self,
        vessel_type: &str,
        ais_set: &AisSet,
        rasters: &dyn RasterSource,
        trajectories: &dyn TrajectorySource,
        esi: &Esi,
        shorezone: &ShoreZone,
        config: &DriftHazardConfig,
        skip_failed_runs: bool,
    ) -> Result<DataFrame> {
        let prefix = format!("{vessel_type}_");
        let mut frames = Vec::new();

        for path in &self.paths {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            if !name.starts_with(&prefix) {
                continue;
            }
            let (_, start_date) = parse_drift_filename(path)?;

            let run = (|| -> Result<DataFrame> {
                let ais = ais_set.load(vessel_type, start_date, rasters)?;
                let traj = trajectories.read(path)?;
                let result = DriftResult::new(path.clone(), &traj, &ais, esi, shorezone, config)?;
                tag_run(result.data, result.start_date, vessel_type)
            })();

            match run {
                Ok(df) => frames.push(df),
                Err(err) if skip_failed_runs => {
                    warn!(path = %path.display(), error = %err, "skipping failed drift run");
                }
                Err(err) => return Err(err),
            }
        }

        info!(
            vessel_type,
            nruns = frames.len(),
            "loaded drift results"
        );
        concat_run_frames(frames)
    }
}

/// Append run-level `date` and `vessel_type` columns to a per-run table.
pub(crate) fn tag_run(
    mut df: DataFrame,
    date: NaiveDate,
    vessel_type: &str,
) -> Result<DataFrame> {
    let height = df.height();
    df.with_column(utils::date_column(run::DATE, date, height)?)?;
    df.with_column(Column::new(
        run::VESSEL_TYPE.into(),
        vec![vessel_type.to_string(); height],
    ))?;
    Ok(df)
}

/// Row-union of per-run tables; empty input yields an empty table with
/// no columns (nothing matched the vessel type).
pub(crate) fn concat_run_frames(frames: Vec<DataFrame>) -> Result<DataFrame> {
    match frames.len() {
        0 => Ok(DataFrame::empty()),
        1 => Ok(frames.into_iter().next().unwrap_or_default()),
        _ => {
            let lazy: Vec<LazyFrame> = frames.into_iter().map(|df| df.lazy()).collect();
            Ok(concat(lazy, UnionArgs::default())?.collect()?)
        }
    }
}

/// Collect `.nc` file paths from a directory, sorted by name; a single
/// `.nc` path passes through as-is.
pub(crate) fn collect_nc_paths(path: &Path) -> Result<Vec<PathBuf>> {
    if !path.is_dir() {
        if path.extension().and_then(|e| e.to_str()) == Some("nc") {
            return Ok(vec![path.to_path_buf()]);
        }
        return Err(HazardError::InvalidData(format!(
            "{} is not a directory or a .nc file",
            path.display()
        )));
    }

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(path)? {
        let entry = entry?.path();
        if entry.extension().and_then(|e| e.to_str()) == Some("nc") {
            paths.push(entry);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Parse `"{vessel_type}_alaska_drift_{YYYY-MM-DD}.nc"`.
pub fn parse_drift_filename(path: &Path) -> Result<(String, NaiveDate)> {
    let invalid = || HazardError::InvalidFilename {
        path: path.to_path_buf(),
        expected: DRIFT_NAME_TEMPLATE,
    };

    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(invalid)?;
    let stem = name.strip_suffix(".nc").ok_or_else(invalid)?;
    let (vessel_type, rest) = stem.split_once("_alaska_drift_").ok_or_else(invalid)?;
    let date = NaiveDate::parse_from_str(rest, "%Y-%m-%d").map_err(|_| invalid())?;

    if vessel_type.is_empty() {
        return Err(invalid());
    }
    Ok((vessel_type.to_string(), date))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ais::AisCell;
    use crate::esi::EsiSegment;
    use crate::shorezone::ShoreZoneFeature;

    // Segment A near (-160, 59), segment B near (-150, 58).
    fn fixture_esi() -> Esi {
        Esi::from_segments(vec![
            EsiSegment {
                esi_id: "w-001".into(),
                esi: "7A".into(),
                lines: vec![vec![[-160.0, 59.0], [-160.1, 59.1]]],
            },
            EsiSegment {
                esi_id: "se-002".into(),
                esi: "3".into(),
                lines: vec![vec![[-150.0, 58.0], [-150.1, 58.1]]],
            },
        ])
        .unwrap()
    }

    fn fixture_shorezone() -> ShoreZone {
        ShoreZone::from_features(vec![
            // rocky near segment A
            ShoreZoneFeature {
                bc_class: 5,
                lines: vec![vec![[-160.0, 59.0]]],
            },
            // sheltered near segment B
            ShoreZoneFeature {
                bc_class: 30,
                lines: vec![vec![[-150.0, 58.0]]],
            },
        ])
        .unwrap()
    }

    fn fixture_ais(count: u32) -> Ais {
        Ais::from_cells(
            "tanker",
            NaiveDate::from_ymd_opt(2019, 1, 1).unwrap(),
            vec![AisCell {
                lon: -155.0,
                lat: 58.5,
                count,
            }],
        )
        .unwrap()
    }

    /// Run with `stranded_a` particles stranding at segment A,
    /// `stranded_b` at segment B, and `adrift` never stranding.
    fn fixture_run(stranded_a: usize, stranded_b: usize, adrift: usize) -> TrajectoryData {
        let n = stranded_a + stranded_b + adrift;
        let mut lon = Vec::new();
        let mut lat = Vec::new();
        let mut status = Vec::new();
        for p in 0..n {
            // all particles release near the AIS cell, in [0, 360)
            lon.push(205.0);
            lat.push(58.5);
            status.push(0);
            if p < stranded_a {
                lon.push(200.0); // -160
                lat.push(59.0);
                status.push(1);
            } else if p < stranded_a + stranded_b {
                lon.push(210.0); // -150
                lat.push(58.0);
                status.push(1);
            } else {
                lon.push(206.0);
                lat.push(58.6);
                status.push(0);
            }
        }
        TrajectoryData::new(
            NaiveDate::from_ymd_opt(2019, 1, 17).unwrap(),
            "active stranded",
            n,
            2,
            lon,
            lat,
            status,
            None,
        )
        .unwrap()
    }

    #[test]
    fn pt_is_clipped_daily_occupancy() {
        // 255 visits over a 31-day month saturates to certainty
        let pt = calc_pt_per_particle(&fixture_run(1, 0, 0), &fixture_ais(255));
        assert_eq!(pt, vec![1.0]);

        let pt = calc_pt_per_particle(&fixture_run(1, 0, 0), &fixture_ais(16));
        assert!((pt[0] - 16.0 / 31.0).abs() < 1e-12);
    }

    #[test]
    fn pb_partitions_stranded_particles() {
        let esi = fixture_esi();
        let traj = fixture_run(10, 5, 3);
        let ids = esi_per_particle(&traj, &esi).unwrap();

        let stranded: Vec<&str> = ids.iter().flatten().map(|s| s.as_str()).collect();
        assert_eq!(stranded.len(), 15);
        assert_eq!(stranded.iter().filter(|id| **id == "w-001").count(), 10);
        assert_eq!(stranded.iter().filter(|id| **id == "se-002").count(), 5);

        let pb = pb_per_particle(&ids);
        for (id, pb) in ids.iter().zip(&pb) {
            match id.as_deref() {
                Some("w-001") => assert!((pb - 10.0 / 15.0).abs() < 1e-12),
                Some("se-002") => assert!((pb - 5.0 / 15.0).abs() < 1e-12),
                _ => assert_eq!(*pb, 0.0),
            }
        }
    }

    #[test]
    fn zero_stranded_run_is_all_zero_pb() {
        let esi = fixture_esi();
        let traj = fixture_run(0, 0, 4);
        let ids = esi_per_particle(&traj, &esi).unwrap();
        assert!(ids.iter().all(|id| id.is_none()));

        let pb = pb_per_particle(&ids);
        assert_eq!(pb, vec![0.0; 4]);
    }

    #[test]
    fn hazard_terms_stay_in_unit_interval() {
        let result = DriftResult::new(
            "tanker_alaska_drift_2019-01-17.nc",
            &fixture_run(10, 5, 3),
            &fixture_ais(255),
            &fixture_esi(),
            &fixture_shorezone(),
            &DriftHazardConfig::default(),
        )
        .unwrap();

        assert_eq!(result.data.height(), 18);
        for column in [drift::PT, drift::PB, drift::STRANDING_HAZARD, drift::BREACH_PROB] {
            let values = result.data.column(column).unwrap().as_materialized_series().f64().unwrap();
            for value in values.into_no_null_iter() {
                assert!((0.0..=1.0).contains(&value), "{column} out of range: {value}");
            }
        }
    }

    #[test]
    fn breach_prob_follows_stranding_shoreline() {
        let result = DriftResult::new(
            "run.nc",
            &fixture_run(2, 1, 1),
            &fixture_ais(10),
            &fixture_esi(),
            &fixture_shorezone(),
            &DriftHazardConfig::default(),
        )
        .unwrap();

        let breach = result.data.column(drift::BREACH_PROB).unwrap().as_materialized_series().f64().unwrap();
        let values: Vec<f64> = breach.into_no_null_iter().collect();
        assert_eq!(values, vec![0.7, 0.7, 0.44, 0.0]);
    }

    #[test]
    fn region_is_split_from_esi_id() {
        let result = DriftResult::new(
            "run.nc",
            &fixture_run(1, 1, 1),
            &fixture_ais(10),
            &fixture_esi(),
            &fixture_shorezone(),
            &DriftHazardConfig::default(),
        )
        .unwrap();

        let region = result.data.column(drift::REGION).unwrap().as_materialized_series().str().unwrap();
        assert_eq!(region.get(0), Some("w"));
        assert_eq!(region.get(1), Some("se"));
        assert_eq!(region.get(2), None);
    }

    #[test]
    fn parse_drift_name() {
        let (vessel_type, date) =
            parse_drift_filename(Path::new("tanker_alaska_drift_2019-01-17.nc")).unwrap();
        assert_eq!(vessel_type, "tanker");
        assert_eq!(date, NaiveDate::from_ymd_opt(2019, 1, 17).unwrap());
    }

    #[test]
    fn parse_drift_name_rejects_malformed() {
        assert!(parse_drift_filename(Path::new("tanker_2019-01-17.nc")).is_err());
        assert!(parse_drift_filename(Path::new("tanker_alaska_drift_20190117.nc")).is_err());
        assert!(parse_drift_filename(Path::new("tanker_alaska_drift_2019-01-17.tif")).is_err());
        assert!(parse_drift_filename(Path::new("_alaska_drift_2019-01-17.nc")).is_err());
    }

    #[test]
    fn vessel_types_found_from_file_names() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "tanker_alaska_drift_2019-01-17.nc",
            "tanker_alaska_drift_2019-02-14.nc",
            "cargo_alaska_drift_2019-01-17.nc",
        ] {
            std::fs::File::create(dir.path().join(name)).unwrap();
        }
        let set = DriftResultsSet::new(dir.path()).unwrap();
        let types: Vec<String> = set.vessel_types().unwrap().into_iter().collect();
        assert_eq!(types, vec!["cargo".to_string(), "tanker".to_string()]);
    }

    #[test]
    fn results_set_rejects_non_nc_path() {
        let dir = tempfile::tempdir().unwrap();
        let stray = dir.path().join("notes.txt");
        std::fs::File::create(&stray).unwrap();
        assert!(DriftResultsSet::new(&stray).is_err());
        assert!(DriftResultsSet::new(dir.path()).unwrap().paths.is_empty());
    }
}

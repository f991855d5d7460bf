use std::collections::HashSet;

use polars::prelude::*;

use crate::error::{HazardError, Result};
use crate::schema::{hazard, locs};
use crate::spatial::PointIndex;

/// One coastal segment as delivered by the external vector reader:
/// a raw sensitivity string and the segment geometry decomposed into
/// simple line parts.
#[derive(Debug, Clone)]
pub struct EsiSegment {
    /// Globally unique `<region>-<local-id>` identifier.
    pub esi_id: String,
    /// Raw sensitivity string, e.g. `"7"`, `"7A"`, `"3/8B"`, `"None"`.
    pub esi: String,
    /// Line parts; every vertex becomes one lookup point.
    pub lines: Vec<Vec<[f64; 2]>>,
}

/// ESI data container.
///
/// Holds a point sampling of every segment vertex, tagged with the
/// segment id and cleaned sensitivity code, plus the spatial index used
/// to map stranding locations onto segments.
pub struct Esi {
    segments: Vec<(String, i32)>,
    lon: Vec<f64>,
    lat: Vec<f64>,
    esi_id: Vec<String>,
    esi_code: Vec<i32>,
    index: PointIndex,
}

impl Esi {
    /// Build the catalog from segment geometries.
    ///
    /// Every vertex of every line part is sampled into the lookup table.
    /// Sensitivity strings are cleaned on the way in; a code outside
    /// [1, 10] after cleaning aborts construction.
    pub fn from_segments(segments: Vec<EsiSegment>) -> Result<Self> {
        let mut lon = Vec::new();
        let mut lat = Vec::new();
        let mut esi_id = Vec::new();
        let mut esi_code = Vec::new();
        let mut catalog = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for segment in &segments {
            let code = clean_esi_code(&segment.esi)?;
            if seen.insert(segment.esi_id.clone()) {
                catalog.push((segment.esi_id.clone(), code));
            }
            for line in &segment.lines {
                for point in line {
                    lon.push(point[0]);
                    lat.push(point[1]);
                    esi_id.push(segment.esi_id.clone());
                    esi_code.push(code);
                }
            }
        }

        let points: Vec<[f64; 2]> = lon.iter().zip(&lat).map(|(x, y)| [*x, *y]).collect();
        let index = PointIndex::build(points)
            .map_err(|_| HazardError::EmptyCatalog("ESI segments contain no points"))?;

        Ok(Self {
            segments: catalog,
            lon,
            lat,
            esi_id,
            esi_code,
            index,
        })
    }

    /// Number of sampled points.
    pub fn npoints(&self) -> usize {
        self.lon.len()
    }

    /// Segment id of the nearest sampled point, for each query point.
    pub fn segment_for_points(&self, points: &[[f64; 2]]) -> Vec<&str> {
        self.index
            .nearest_batch(points)
            .into_iter()
            .map(|ix| self.esi_id[ix].as_str())
            .collect()
    }

    /// Cleaned sensitivity code of the nearest sampled point, for each query point.
    pub fn code_for_points(&self, points: &[[f64; 2]]) -> Vec<i32> {
        self.index
            .nearest_batch(points)
            .into_iter()
            .map(|ix| self.esi_code[ix])
            .collect()
    }

    /// Point sampling as a DataFrame, one row per sampled vertex.
    pub fn locs_frame(&self) -> Result<DataFrame> {
        let df = DataFrame::new(vec![
            Column::new(locs::LON.into(), &self.lon),
            Column::new(locs::LAT.into(), &self.lat),
            Column::new(locs::ESI_ID.into(), &self.esi_id),
            Column::new(locs::ESI_CODE.into(), &self.esi_code),
        ])?;
        Ok(df)
    }

    /// One row per segment: `esi_id` and the cleaned sensitivity code.
    /// Joined onto the combined hazard table to weight risk by sensitivity.
    pub fn sensitivity_frame(&self) -> Result<DataFrame> {
        let ids: Vec<&str> = self.segments.iter().map(|(id, _)| id.as_str()).collect();
        let codes: Vec<i32> = self.segments.iter().map(|(_, code)| *code).collect();
        let df = DataFrame::new(vec![
            Column::new(locs::ESI_ID.into(), ids),
            Column::new(hazard::ESI.into(), codes),
        ])?;
        Ok(df)
    }
}

/// Given an ESI sensitivity string, return a single cleaned code.
///
/// - a missing value (`"None"`) is treated as medium sensitivity (5)
/// - trailing letters marking sub-types are stripped (`"7A"` -> 7)
/// - `/`-separated multi-codes resolve to the maximum (`"3/8B"` -> 8),
///   worst case wins
///
/// Any cleaned value outside [1, 10] is an input-data error.
pub fn clean_esi_code(esi: &str) -> Result<i32> {
    let mut max_code: Option<i32> = None;

    for part in esi.split('/') {
        let value = if part == "None" {
            5
        } else {
            let digits = part.trim_end_matches(|c: char| !c.is_ascii_digit());
            digits.parse::<i32>().map_err(|_| {
                HazardError::InvalidData(format!("Unparsable ESI code part {part:?} in {esi:?}"))
            })?
        };
        if !(1..=10).contains(&value) {
            return Err(HazardError::EsiCodeOutOfRange {
                raw: esi.to_string(),
                value: value as i64,
            });
        }
        max_code = Some(max_code.map_or(value, |m: i32| m.max(value)));
    }

    max_code.ok_or_else(|| HazardError::InvalidData(format!("Empty ESI code string {esi:?}")))
}

/// Region prefix of an `<region>-<local-id>` segment id.
pub fn region_of(esi_id: &str) -> &str {
    esi_id.split('-').next().unwrap_or(esi_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_segments() -> Vec<EsiSegment> {
        vec![
            EsiSegment {
                esi_id: "cookinlet-001".into(),
                esi: "7A".into(),
                lines: vec![vec![[-151.5, 59.6], [-151.4, 59.7]]],
            },
            EsiSegment {
                esi_id: "kodiak-002".into(),
                esi: "3/8B".into(),
                lines: vec![vec![[-152.8, 57.6], [-152.7, 57.7], [-152.6, 57.8]]],
            },
            EsiSegment {
                esi_id: "kodiak-003".into(),
                esi: "None".into(),
                lines: vec![vec![[-153.5, 57.0]]],
            },
        ]
    }

    #[test]
    fn clean_code_handles_plain_numerals() {
        assert_eq!(clean_esi_code("7").unwrap(), 7);
        assert_eq!(clean_esi_code("10").unwrap(), 10);
        assert_eq!(clean_esi_code("1").unwrap(), 1);
    }

    #[test]
    fn clean_code_missing_value_is_medium() {
        assert_eq!(clean_esi_code("None").unwrap(), 5);
    }

    #[test]
    fn clean_code_strips_subtype_letters() {
        assert_eq!(clean_esi_code("7A").unwrap(), 7);
        assert_eq!(clean_esi_code("10A").unwrap(), 10);
    }

    #[test]
    fn clean_code_multi_code_takes_worst_case() {
        assert_eq!(clean_esi_code("3/8B").unwrap(), 8);
        assert_eq!(clean_esi_code("None/2").unwrap(), 5);
        assert_eq!(clean_esi_code("6A/6B").unwrap(), 6);
    }

    #[test]
    fn clean_code_rejects_out_of_range() {
        assert!(matches!(
            clean_esi_code("11"),
            Err(HazardError::EsiCodeOutOfRange { value: 11, .. })
        ));
        assert!(matches!(
            clean_esi_code("0"),
            Err(HazardError::EsiCodeOutOfRange { value: 0, .. })
        ));
        assert!(clean_esi_code("3/12").is_err());
    }

    #[test]
    fn clean_code_rejects_garbage() {
        assert!(clean_esi_code("ABC").is_err());
        assert!(clean_esi_code("").is_err());
    }

    #[test]
    fn catalog_samples_every_vertex() {
        let esi = Esi::from_segments(sample_segments()).unwrap();
        assert_eq!(esi.npoints(), 6);
        let locs = esi.locs_frame().unwrap();
        assert_eq!(locs.height(), 6);
    }

    #[test]
    fn lookup_returns_owning_segment() {
        let esi = Esi::from_segments(sample_segments()).unwrap();
        let ids = esi.segment_for_points(&[[-151.5, 59.6], [-152.75, 57.65]]);
        assert_eq!(ids, vec!["cookinlet-001", "kodiak-002"]);
        let codes = esi.code_for_points(&[[-153.5, 57.0]]);
        assert_eq!(codes, vec![5]);
    }

    #[test]
    fn sensitivity_frame_has_one_row_per_segment() {
        let esi = Esi::from_segments(sample_segments()).unwrap();
        let frame = esi.sensitivity_frame().unwrap();
        assert_eq!(frame.height(), 3);
    }

    #[test]
    fn empty_segments_are_rejected() {
        assert!(Esi::from_segments(Vec::new()).is_err());
    }

    #[test]
    fn bad_code_aborts_construction() {
        let mut segments = sample_segments();
        segments[0].esi = "42".into();
        assert!(Esi::from_segments(segments).is_err());
    }

    #[test]
    fn region_is_id_prefix() {
        assert_eq!(region_of("cookinlet-001"), "cookinlet");
        assert_eq!(region_of("w-17"), "w");
    }
}

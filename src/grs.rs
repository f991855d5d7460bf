use crate::error::{HazardError, Result};
use crate::spatial::PointIndex;

/// One GRS region as delivered by the external vector reader: an integer
/// region code and the region's polygon boundaries as line parts.
#[derive(Debug, Clone)]
pub struct GrsRegion {
    pub grs_code: i32,
    pub boundaries: Vec<Vec<[f64; 2]>>,
}

/// GRS data container.
///
/// Coarse geographic region partition used for regional rollups; the
/// boundary vertices of every region polygon back a nearest-neighbor
/// lookup from coordinates to region code.
pub struct Grs {
    codes: Vec<i32>,
    index: PointIndex,
}

impl Grs {
    pub fn from_regions(regions: Vec<GrsRegion>) -> Result<Self> {
        let mut points = Vec::new();
        let mut codes = Vec::new();

        for region in &regions {
            if region.grs_code == 0 {
                return Err(HazardError::InvalidData(
                    "GRS region code must be nonzero".to_string(),
                ));
            }
            for boundary in &region.boundaries {
                for point in boundary {
                    points.push(*point);
                    codes.push(region.grs_code);
                }
            }
        }

        let index = PointIndex::build(points)
            .map_err(|_| HazardError::EmptyCatalog("GRS regions contain no boundary points"))?;

        Ok(Self { codes, index })
    }

    /// Number of sampled boundary points.
    pub fn npoints(&self) -> usize {
        self.codes.len()
    }

    /// Region code of the nearest boundary point, per query point.
    pub fn region_for_points(&self, points: &[[f64; 2]]) -> Vec<i32> {
        self.index
            .nearest_batch(points)
            .into_iter()
            .map(|ix| self.codes[ix])
            .collect()
    }
}

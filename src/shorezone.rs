use serde::{Deserialize, Serialize};

use crate::error::{HazardError, Result};
use crate::spatial::PointIndex;

/// Calibration for the shoreline-class to breach-probability mapping.
///
/// The defaults are derived from NOAA incident reports (2005-2015);
/// kept as configuration so the mapping can be recalibrated without a
/// code change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreachProbConfig {
    /// Probability of breaching on rocky / exposed coast.
    pub rocky_prob: f64,
    /// Probability of breaching on sheltered, non-rocky coast.
    pub sheltered_prob: f64,
    /// Highest beach class still counted as rocky coast.
    pub rocky_max_class: i32,
}

impl Default for BreachProbConfig {
    fn default() -> Self {
        Self {
            rocky_prob: 0.7,
            sheltered_prob: 0.44,
            rocky_max_class: 20,
        }
    }
}

/// One shoreline feature as delivered by the external vector reader.
#[derive(Debug, Clone)]
pub struct ShoreZoneFeature {
    /// Beach classification code in [1, 39].
    pub bc_class: i32,
    /// Line parts; every vertex becomes one lookup point.
    pub lines: Vec<Vec<[f64; 2]>>,
}

/// ShoreZone data container.
///
/// Point sampling of the shoreline-type classification, used to convert
/// stranding locations into breach probabilities.
pub struct ShoreZone {
    bc_class: Vec<i32>,
    index: PointIndex,
}

impl ShoreZone {
    /// Build the catalog from shoreline features.
    ///
    /// Every point must carry a classification in [1, 39]; a zero or
    /// out-of-range class aborts construction.
    pub fn from_features(features: Vec<ShoreZoneFeature>) -> Result<Self> {
        let mut points = Vec::new();
        let mut bc_class = Vec::new();

        for feature in &features {
            if !(1..=39).contains(&feature.bc_class) {
                return Err(HazardError::InvalidData(format!(
                    "ShoreZone bc_class {} outside valid range [1, 39]",
                    feature.bc_class
                )));
            }
            for line in &feature.lines {
                for point in line {
                    points.push(*point);
                    bc_class.push(feature.bc_class);
                }
            }
        }

        let index = PointIndex::build(points)
            .map_err(|_| HazardError::EmptyCatalog("ShoreZone features contain no points"))?;

        Ok(Self { bc_class, index })
    }

    /// Number of sampled points.
    pub fn npoints(&self) -> usize {
        self.bc_class.len()
    }

    /// Beach classification of the nearest sampled point, per query point.
    pub fn class_for_points(&self, points: &[[f64; 2]]) -> Vec<i32> {
        self.index
            .nearest_batch(points)
            .into_iter()
            .map(|ix| self.bc_class[ix])
            .collect()
    }

    /// Probability of a stranded vessel breaching, per query point.
    ///
    /// Rocky/exposed coast classes (`<= rocky_max_class`) breach at
    /// `rocky_prob`; everything else at `sheltered_prob`.
    pub fn breach_prob(&self, points: &[[f64; 2]], config: &BreachProbConfig) -> Vec<f64> {
        self.class_for_points(points)
            .into_iter()
            .map(|class| {
                if class <= config.rocky_max_class {
                    config.rocky_prob
                } else {
                    config.sheltered_prob
                }
            })
            .collect()
    }
}

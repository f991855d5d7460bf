//! Probabilistic hazard and risk of oil-spill contamination along the
//! Alaskan coastline from vessels that drift, run aground, and breach.
//!
//! Four geospatial sources back the calculation: historical
//! vessel-traffic density rasters (AIS), the coastline
//! sensitivity-segment catalog (ESI), the shoreline-type classification
//! (ShoreZone), and simulated particle trajectories from vessel-drift
//! and oil-spill runs. This crate is the hazard-composition engine that
//! joins them: nearest-neighbor lookups from particle positions into the
//! catalogs, the per-run probability terms (`pt`, `pb`,
//! `stranding_hazard`, `breach_prob`, `cs`), and the combination into
//! per-segment hazard (`hz_s`) and sensitivity-scaled risk
//! (`spill_risk`).
//!
//! Reading the simulation and raster files themselves is delegated to
//! the host through the [`trajectory::TrajectorySource`] and
//! [`ais::RasterSource`] seams; every catalog is an explicit immutable
//! value object passed by reference into the computations.

pub mod ais;
pub mod drift_results;
pub mod error;
pub mod esi;
pub mod grs;
pub mod hazard;
pub mod schema;
pub mod shorezone;
pub mod spatial;
pub mod spill_results;
pub mod trajectory;
pub mod utils;

pub use ais::{Ais, AisCell, AisSet, RasterSource};
pub use drift_results::{DriftHazardConfig, DriftResult, DriftResultsSet};
pub use error::{HazardError, Result};
pub use esi::{clean_esi_code, Esi, EsiSegment};
pub use grs::{Grs, GrsRegion};
pub use hazard::{combine_hazard, monthly_rollup, regional_rollup};
pub use shorezone::{BreachProbConfig, ShoreZone, ShoreZoneFeature};
pub use spatial::PointIndex;
pub use spill_results::{SpillResult, SpillResultsSet};
pub use trajectory::{TrajectoryData, TrajectorySource};

use std::path::Path;

use chrono::NaiveDate;

use crate::error::{HazardError, Result};
use crate::utils::lon360_to_lon180;

/// External trajectory reader: opens one simulation result file and
/// returns its particle time series fully read into memory. File format
/// decoding lives behind this seam.
pub trait TrajectorySource {
    fn read(&self, path: &Path) -> Result<TrajectoryData>;
}

/// Particle trajectories of one simulation run.
///
/// `lon`, `lat`, and `status` are row-major `nparticles x ntimes`
/// series in the simulation's native [0, 360) longitude convention.
/// The integer meaning of "stranded" varies between result files and is
/// resolved per file from `flag_meanings`.
pub struct TrajectoryData {
    /// Simulation start date (first time step in the file).
    pub start_time: NaiveDate,
    /// Space-delimited status-flag meanings embedded in the file.
    pub flag_meanings: String,
    nparticles: usize,
    ntimes: usize,
    lon: Vec<f64>,
    lat: Vec<f64>,
    status: Vec<i32>,
    oil_mass: Option<Vec<f64>>,
}

impl TrajectoryData {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        start_time: NaiveDate,
        flag_meanings: impl Into<String>,
        nparticles: usize,
        ntimes: usize,
        lon: Vec<f64>,
        lat: Vec<f64>,
        status: Vec<i32>,
        oil_mass: Option<Vec<f64>>,
    ) -> Result<Self> {
        let expected = nparticles * ntimes;
        if ntimes == 0 || nparticles == 0 {
            return Err(HazardError::InvalidData(
                "Trajectory run must have at least one particle and one time step".to_string(),
            ));
        }
        for (name, len) in [("lon", lon.len()), ("lat", lat.len()), ("status", status.len())] {
            if len != expected {
                return Err(HazardError::InvalidData(format!(
                    "Trajectory '{name}' has {len} values, expected {nparticles} x {ntimes} = {expected}"
                )));
            }
        }
        if let Some(mass) = &oil_mass {
            if mass.len() != expected {
                return Err(HazardError::InvalidData(format!(
                    "Trajectory 'oil_mass' has {} values, expected {expected}",
                    mass.len()
                )));
            }
        }

        Ok(Self {
            start_time,
            flag_meanings: flag_meanings.into(),
            nparticles,
            ntimes,
            lon,
            lat,
            status,
            oil_mass,
        })
    }

    pub fn nparticles(&self) -> usize {
        self.nparticles
    }

    pub fn ntimes(&self) -> usize {
        self.ntimes
    }

    /// Integer status code meaning "stranded" for this file.
    ///
    /// Resolved from the position of `"stranded"` in the embedded
    /// flag-meaning list; the code is not constant across result files
    /// and is never hardcoded.
    pub fn stranded_code(&self) -> Result<i32> {
        self.flag_meanings
            .split_whitespace()
            .position(|meaning| meaning == "stranded")
            .map(|ix| ix as i32)
            .ok_or_else(|| HazardError::MissingStrandedFlag(self.flag_meanings.clone()))
    }

    /// Release position of every particle (time step 0), longitude
    /// converted to [-180, 180).
    pub fn starting_points(&self) -> Vec<[f64; 2]> {
        (0..self.nparticles)
            .map(|p| {
                let ix = p * self.ntimes;
                [lon360_to_lon180(self.lon[ix]), self.lat[ix]]
            })
            .collect()
    }

    /// First time index at which each particle is stranded, if ever.
    fn stranding_index(&self, stranded_code: i32) -> Vec<Option<usize>> {
        (0..self.nparticles)
            .map(|p| {
                let row = &self.status[p * self.ntimes..(p + 1) * self.ntimes];
                row.iter().position(|status| *status == stranded_code)
            })
            .collect()
    }

    /// Stranding position of every particle, longitude converted to
    /// [-180, 180); `None` for particles that never strand.
    pub fn stranding_points(&self) -> Result<Vec<Option<[f64; 2]>>> {
        let code = self.stranded_code()?;
        let points = self
            .stranding_index(code)
            .into_iter()
            .enumerate()
            .map(|(p, t)| {
                t.map(|t| {
                    let ix = p * self.ntimes + t;
                    [lon360_to_lon180(self.lon[ix]), self.lat[ix]]
                })
            })
            .collect();
        Ok(points)
    }

    /// Beached oil mass of every particle at its stranding time step;
    /// `None` for particles that never strand.
    ///
    /// Errors if the run carries no oil-mass series (a drift-only run).
    pub fn stranded_oil_mass(&self) -> Result<Vec<Option<f64>>> {
        let mass = self.oil_mass.as_ref().ok_or_else(|| {
            HazardError::InvalidData("Trajectory run carries no oil-mass series".to_string())
        })?;
        let code = self.stranded_code()?;
        let masses = self
            .stranding_index(code)
            .into_iter()
            .enumerate()
            .map(|(p, t)| t.map(|t| mass[p * self.ntimes + t]))
            .collect();
        Ok(masses)
    }
}

use crate::clock::SimTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sub-satellite point at a given SimTime. Immutable once published.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroundPosition {
    pub longitude_deg: f64,
    pub latitude_deg: f64,
    pub altitude_km: f64,
    pub time: SimTime,
}

#[derive(Debug, Clone, Error)]
#[error("propagator failure: {0}")]
pub struct PropagatorError(pub String);

/// Orbit propagation seam. Implementations are pure over the simulated
/// timestamp; failures are reported, never silently defaulted.
pub trait Propagator: Send {
    fn position(&self, at: SimTime) -> Result<GroundPosition, PropagatorError>;
}

const SIDEREAL_DAY_SECONDS: f64 = 86_164.0;

/// Closed-form ground track of an inclined circular orbit. Stands in for a
/// full SGP4 propagator in the simulator binary and in tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircularOrbit {
    pub inclination_deg: f64,
    pub period_seconds: f64,
    pub altitude_km: f64,
    pub ascending_node_lon_deg: f64,
}

impl Default for CircularOrbit {
    fn default() -> Self {
        // Sun-synchronous LEO, roughly 15.02 revolutions per day.
        Self {
            inclination_deg: 97.67,
            period_seconds: 5_752.0,
            altitude_km: 560.0,
            ascending_node_lon_deg: 0.0,
        }
    }
}

impl Propagator for CircularOrbit {
    fn position(&self, at: SimTime) -> Result<GroundPosition, PropagatorError> {
        if self.period_seconds <= 0.0 {
            return Err(PropagatorError("orbital period must be positive".into()));
        }

        let phase = std::f64::consts::TAU * at.epoch_seconds / self.period_seconds;
        let inclination = self.inclination_deg.to_radians();

        let latitude_deg = (inclination.sin() * phase.sin()).asin().to_degrees();
        let track_lon = (inclination.cos() * phase.sin())
            .atan2(phase.cos())
            .to_degrees();
        let earth_rotation = 360.0 * at.epoch_seconds / SIDEREAL_DAY_SECONDS;
        let longitude_deg =
            normalize_longitude(self.ascending_node_lon_deg + track_lon - earth_rotation);

        Ok(GroundPosition {
            longitude_deg,
            latitude_deg,
            altitude_km: self.altitude_km,
            time: at,
        })
    }
}

fn normalize_longitude(lon_deg: f64) -> f64 {
    (lon_deg + 180.0).rem_euclid(360.0) - 180.0
}

//! Viewing geometry: turns a satellite position and a ground target into the
//! oblique-camera parameters (bearing, tilt, zoom) a static-imagery provider
//! expects. Pure and stateless; safe to call from any number of threads.

use crate::propagator::GroundPosition;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Targets below this elevation angle are too oblique to image.
pub const MIN_ELEVATION_DEG: f64 = 30.0;

// Empirical zoom mapping: a satellite directly overhead at the 560 km
// reference altitude yields the baseline zoom level.
const BASE_ZOOM: f64 = 13.92;
const REFERENCE_SLANT_KM: f64 = 560.0;

const DEGENERATE_PROJECTION: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroundTarget {
    pub longitude_deg: f64,
    pub latitude_deg: f64,
}

impl GroundTarget {
    pub fn new(longitude_deg: f64, latitude_deg: f64) -> Result<Self, GeometryError> {
        let target = Self {
            longitude_deg,
            latitude_deg,
        };
        target.validate()?;
        Ok(target)
    }

    pub fn validate(&self) -> Result<(), GeometryError> {
        if (-180.0..=180.0).contains(&self.longitude_deg)
            && (-90.0..=90.0).contains(&self.latitude_deg)
        {
            Ok(())
        } else {
            Err(GeometryError::InvalidTarget {
                longitude_deg: self.longitude_deg,
                latitude_deg: self.latitude_deg,
            })
        }
    }
}

/// Camera parameters for viewing a ground target from the satellite's
/// current position. Computed on demand, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointingSolution {
    pub bearing_deg: f64,
    pub tilt_deg: f64,
    pub zoom: f64,
    pub elevation_deg: f64,
    pub slant_range_km: f64,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("target coordinates out of range: lon {longitude_deg}, lat {latitude_deg}")]
    InvalidTarget {
        longitude_deg: f64,
        latitude_deg: f64,
    },
    #[error("target not visible from satellite position (elevation angle: {elevation_deg:.2} degrees)")]
    TargetNotVisible { elevation_deg: f64 },
}

/// Compute the pointing solution for a target, or a visibility failure when
/// the target sits below the minimum elevation angle. The visibility failure
/// is a legitimate negative answer, not a degraded solution.
pub fn pointing_solution(
    satellite: &GroundPosition,
    target: &GroundTarget,
) -> Result<PointingSolution, GeometryError> {
    target.validate()?;

    let sat = spherical_to_cartesian(
        satellite.longitude_deg,
        satellite.latitude_deg,
        EARTH_RADIUS_KM + satellite.altitude_km,
    );
    let tgt = spherical_to_cartesian(target.longitude_deg, target.latitude_deg, EARTH_RADIUS_KM);

    let line_of_sight = sat - tgt;
    let slant_range_km = line_of_sight.norm();
    let los_unit = line_of_sight / slant_range_km;
    let target_up = tgt.normalize();

    // Angle between local vertical and the line of sight: the camera tilt
    // away from nadir, and the complement of the elevation angle.
    let theta = target_up.dot(&los_unit).clamp(-1.0, 1.0).acos();
    let elevation_deg = 90.0 - theta.to_degrees();
    if elevation_deg < MIN_ELEVATION_DEG {
        return Err(GeometryError::TargetNotVisible { elevation_deg });
    }

    Ok(PointingSolution {
        bearing_deg: bearing(&target_up, &los_unit),
        tilt_deg: theta.to_degrees(),
        zoom: BASE_ZOOM + (REFERENCE_SLANT_KM / slant_range_km).log2(),
        elevation_deg,
        slant_range_km,
    })
}

/// Bearing of the satellite as seen from the target, measured from the
/// projections of the polar axis and the line of sight onto the target's
/// tangent plane. Normalized into [0, 360).
fn bearing(target_up: &Vector3<f64>, los_unit: &Vector3<f64>) -> f64 {
    let polar_axis = Vector3::z();
    let (Some(reference), Some(toward_satellite)) = (
        tangent_projection(&polar_axis, target_up),
        tangent_projection(los_unit, target_up),
    ) else {
        // Target at the sub-satellite point or at a pole: bearing undefined.
        return 0.0;
    };

    let mut bearing_deg = 180.0
        - reference
            .dot(&toward_satellite)
            .clamp(-1.0, 1.0)
            .acos()
            .to_degrees();
    if reference.cross(&toward_satellite).dot(target_up) < 0.0 {
        bearing_deg = -bearing_deg;
    }
    bearing_deg.rem_euclid(360.0)
}

fn tangent_projection(v: &Vector3<f64>, up: &Vector3<f64>) -> Option<Vector3<f64>> {
    let projected = v - up * v.dot(up);
    let norm = projected.norm();
    if norm > DEGENERATE_PROJECTION {
        Some(projected / norm)
    } else {
        None
    }
}

fn spherical_to_cartesian(lon_deg: f64, lat_deg: f64, radius_km: f64) -> Vector3<f64> {
    let lon = lon_deg.to_radians();
    let lat = lat_deg.to_radians();
    Vector3::new(
        radius_km * lat.cos() * lon.cos(),
        radius_km * lat.cos() * lon.sin(),
        radius_km * lat.sin(),
    )
}

use crate::geometry::{GroundTarget, PointingSolution};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_IMAGE_SIZE_PX: u32 = 1280;

#[derive(Debug, Clone, Error)]
pub enum ImageryError {
    #[error("imagery fetch failed: {0}")]
    Fetch(String),
}

/// Imagery collaborator seam: consumes pointing parameters, returns raw
/// image bytes. The core never interprets the bytes.
pub trait ImageryProvider: Send {
    fn fetch(&self, request: &StaticMapRequest) -> Result<Vec<u8>, ImageryError>;
}

/// Parameters of an oblique static-tile request. Built from a pointing
/// solution, so the visibility gate has already run by construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StaticMapRequest {
    pub longitude_deg: f64,
    pub latitude_deg: f64,
    pub zoom: f64,
    pub bearing_deg: f64,
    pub tilt_deg: f64,
    pub width_px: u32,
    pub height_px: u32,
}

impl StaticMapRequest {
    pub fn new(target: &GroundTarget, solution: &PointingSolution) -> Self {
        Self {
            longitude_deg: target.longitude_deg,
            latitude_deg: target.latitude_deg,
            zoom: solution.zoom,
            bearing_deg: solution.bearing_deg,
            tilt_deg: solution.tilt_deg,
            width_px: DEFAULT_IMAGE_SIZE_PX,
            height_px: DEFAULT_IMAGE_SIZE_PX,
        }
    }

    /// Positional path segment of the static-tile URL:
    /// `{lon},{lat},{zoom},{bearing},{tilt}/{w}x{h}@2x`.
    pub fn path_segment(&self) -> String {
        format!(
            "{},{},{},{},{}/{}x{}@2x",
            self.longitude_deg,
            self.latitude_deg,
            self.zoom,
            self.bearing_deg,
            self.tilt_deg,
            self.width_px,
            self.height_px
        )
    }

    pub fn url(&self, base: &str, access_token: &str) -> String {
        format!(
            "{}/{}?access_token={}",
            base.trim_end_matches('/'),
            self.path_segment(),
            access_token
        )
    }
}

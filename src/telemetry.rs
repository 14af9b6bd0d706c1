//! Telemetry forwarding: converts published ground positions into the
//! dashboard ingest schema and hands them to an injected sink.

use crate::bus::{EventBus, Subscription};
use crate::propagator::GroundPosition;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One telemetry record, field names matching the dashboard ingest API.
/// `altitude` is kilometers; `timestamp` serializes as ISO-8601 UTC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryFrame {
    pub satellite: String,
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

impl TelemetryFrame {
    pub fn from_position(satellite: &str, position: &GroundPosition) -> Self {
        Self {
            satellite: satellite.to_owned(),
            timestamp: utc_from_epoch(position.time.epoch_seconds),
            latitude: position.latitude_deg,
            longitude: position.longitude_deg,
            altitude: position.altitude_km,
        }
    }
}

fn utc_from_epoch(epoch_seconds: f64) -> DateTime<Utc> {
    let secs = epoch_seconds.floor();
    let nanos = ((epoch_seconds - secs) * 1e9) as u32;
    DateTime::from_timestamp(secs as i64, nanos).unwrap_or(DateTime::UNIX_EPOCH)
}

#[derive(Debug, Clone, Error)]
#[error("telemetry delivery failed: {0}")]
pub struct SinkError(pub String);

/// Telemetry destination seam. Delivery failures are collaborator errors:
/// the bus logs them and the step loop carries on.
pub trait TelemetrySink: Send {
    fn deliver(&mut self, frame: &TelemetryFrame) -> Result<(), SinkError>;
}

/// Subscribe a telemetry forwarder for the named satellite.
pub fn attach_telemetry_forwarder<S>(
    bus: &mut EventBus,
    satellite: String,
    mut sink: S,
) -> Subscription
where
    S: TelemetrySink + 'static,
{
    bus.subscribe_ground_position(move |position| {
        let frame = TelemetryFrame::from_position(&satellite, position);
        sink.deliver(&frame)?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SimTime;
    use std::sync::{Arc, Mutex};

    struct RecordingSink(Arc<Mutex<Vec<TelemetryFrame>>>);

    impl TelemetrySink for RecordingSink {
        fn deliver(&mut self, frame: &TelemetryFrame) -> Result<(), SinkError> {
            self.0.lock().unwrap().push(frame.clone());
            Ok(())
        }
    }

    fn position() -> GroundPosition {
        GroundPosition {
            longitude_deg: 9.18,
            latitude_deg: 48.78,
            altitude_km: 560.0,
            time: SimTime {
                epoch_seconds: 1_700_000_000.0,
                elapsed_seconds: 120.0,
            },
        }
    }

    #[test]
    fn test_frame_matches_ingest_schema() {
        let frame = TelemetryFrame::from_position("SAT-1", &position());
        let json = serde_json::to_value(&frame).unwrap();

        assert_eq!(json["satellite"], "SAT-1");
        assert_eq!(json["latitude"], 48.78);
        assert_eq!(json["longitude"], 9.18);
        assert_eq!(json["altitude"], 560.0);
        // ISO-8601 UTC timestamp.
        assert_eq!(json["timestamp"], "2023-11-14T22:13:20Z");
    }

    #[test]
    fn test_forwarder_delivers_each_publication() {
        let mut bus = EventBus::new();
        let frames = Arc::new(Mutex::new(Vec::new()));
        attach_telemetry_forwarder(
            &mut bus,
            "SAT-1".to_owned(),
            RecordingSink(Arc::clone(&frames)),
        );

        bus.publish_ground_position(&position());
        bus.publish_ground_position(&position());

        let frames = frames.lock().unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].satellite, "SAT-1");
    }
}

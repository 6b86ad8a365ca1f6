//! # Lidar Equipment Interface

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::{serde::ts_milliseconds, DateTime, Utc};
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A single range measurement, in the sensor frame.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LidarPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// A batch of measurements delivered by one sensor callback.
///
/// A frame is not necessarily a complete scan, scans are built up by accumulating frames until
/// enough points are available.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LidarFrame {
    /// UTC timestamp at which the frame was acquired
    #[serde(with = "ts_milliseconds")]
    pub timestamp: DateTime<Utc>,

    /// Points in the frame
    pub points: Vec<LidarPoint>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl LidarPoint {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Squared distance of the point from the sensor origin.
    pub fn range_sq(&self) -> f64 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }
}

impl LidarFrame {
    /// Create a new frame stamped with the current time.
    pub fn now(points: Vec<LidarPoint>) -> Self {
        Self {
            timestamp: Utc::now(),
            points,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_range_sq() {
        assert_eq!(LidarPoint::new(1.0, 2.0, 2.0).range_sq(), 9.0);
        assert_eq!(LidarPoint::default().range_sq(), 0.0);
    }

    #[test]
    fn test_frame_json() {
        let frame = LidarFrame::now(vec![LidarPoint::new(1.0, 0.0, -1.0)]);
        let json = serde_json::to_string(&frame).unwrap();
        let back: LidarFrame = serde_json::from_str(&json).unwrap();

        assert_eq!(back.points, frame.points);
        assert_eq!(
            back.timestamp.timestamp_millis(),
            frame.timestamp.timestamp_millis()
        );
    }
}

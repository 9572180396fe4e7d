use chrono::{NaiveDateTime, Timelike};
use serde_derive::{Deserialize, Serialize};

use crate::error::Result;
use crate::math::round_to;
use crate::Detection;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const CONFIDENCE_PLACES: i32 = 3;
const GEOMETRY_PLACES: i32 = 1;
const TIME_PLACES: i32 = 2;

/// Run-level geolocation, as sent by the upload form (`{"lat": .., "lng": ..}`)
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn from_json(src: &str) -> Result<Self> {
        Ok(serde_json::from_str(src)?)
    }
}

/// First sighting of a track. Numeric fields are already normalised.
#[derive(Debug, Clone, PartialEq)]
pub struct SightingEvent {
    pub track_id: u32,
    pub timestamp: NaiveDateTime,
    pub frame_number: u64,
    pub time_seconds: f64,
    pub object_class: String,
    pub confidence: f32,
    pub bbox_x1: f32,
    pub bbox_y1: f32,
    pub bbox_x2: f32,
    pub bbox_y2: f32,
    pub bbox_width: f32,
    pub bbox_height: f32,
    pub bbox_center_x: f32,
    pub bbox_center_y: f32,
    pub location: Option<Location>,
}

impl SightingEvent {
    /// The only place where rounding is applied: confidence to 3 places,
    /// geometry to 1, time to 2, timestamp to whole seconds.
    pub fn new(
        track_id: u32,
        det: &Detection,
        frame_number: u64,
        fps: f64,
        timestamp: NaiveDateTime,
    ) -> Self {
        let bbox = det.bbox();
        let xywh = bbox.as_xywh();
        let geom = |v: f32| round_to(v, GEOMETRY_PLACES);

        let time_seconds = if fps > 0.0 {
            round_to(frame_number as f64 / fps, TIME_PLACES)
        } else {
            0.0
        };

        Self {
            track_id,
            timestamp: timestamp.with_nanosecond(0).unwrap_or(timestamp),
            frame_number,
            time_seconds,
            object_class: det.class_name.clone(),
            confidence: round_to(det.confidence, CONFIDENCE_PLACES),
            bbox_x1: geom(bbox.left()),
            bbox_y1: geom(bbox.top()),
            bbox_x2: geom(bbox.right()),
            bbox_y2: geom(bbox.bottom()),
            bbox_width: geom(xywh.width()),
            bbox_height: geom(xywh.height()),
            bbox_center_x: geom(xywh.cx()),
            bbox_center_y: geom(xywh.cy()),
            location: None,
        }
    }

    pub fn with_location(mut self, location: Option<Location>) -> Self {
        self.location = location;
        self
    }

    #[inline]
    pub fn timestamp_string(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }
}

use nalgebra as na;
use serde_derive::{Deserialize, Serialize};

use crate::bbox::{BBox, Ltrb};
use crate::error::{Error, Result};

/// One detector output for one frame: corners of the bbox in pixels, class label and score
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Detection {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    #[serde(rename = "p")]
    pub confidence: f32,
    #[serde(rename = "c")]
    pub class_name: String,
}

impl Detection {
    /// Builds a detection, rejecting boxes and scores the tracker cannot use.
    pub fn new<S: Into<String>>(
        class_name: S,
        confidence: f32,
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
    ) -> Result<Self> {
        let det = Self {
            x1,
            y1,
            x2,
            y2,
            confidence,
            class_name: class_name.into(),
        };

        det.validate()?;

        Ok(det)
    }

    pub fn validate(&self) -> Result<()> {
        if self.class_name.is_empty() {
            return Err(Error::malformed("empty class name"));
        }

        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(Error::malformed(format!(
                "confidence {} of `{}` is outside [0, 1]",
                self.confidence, self.class_name
            )));
        }

        if !self.bbox().is_well_formed() {
            return Err(Error::malformed(format!(
                "bbox ({}, {}, {}, {}) of `{}` is degenerate",
                self.x1, self.y1, self.x2, self.y2, self.class_name
            )));
        }

        Ok(())
    }

    #[inline(always)]
    pub fn bbox(&self) -> BBox<Ltrb> {
        BBox::ltrb(self.x1, self.y1, self.x2, self.y2)
    }

    #[inline(always)]
    pub fn center(&self) -> na::Point2<f32> {
        self.bbox().center()
    }

    #[inline(always)]
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    #[inline(always)]
    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_derived_geometry() {
        let det = Detection::new("car", 0.8, 80.0, 90.0, 120.0, 110.0).unwrap();

        assert_abs_diff_eq!(det.center().x, 100.0);
        assert_abs_diff_eq!(det.center().y, 100.0);
        assert_abs_diff_eq!(det.width(), 40.0);
        assert_abs_diff_eq!(det.height(), 20.0);
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(matches!(
            Detection::new("car", 0.8, 120.0, 90.0, 80.0, 110.0),
            Err(Error::MalformedDetection(_))
        ));
        assert!(matches!(
            Detection::new("car", 1.5, 0.0, 0.0, 10.0, 10.0),
            Err(Error::MalformedDetection(_))
        ));
        assert!(matches!(
            Detection::new("", 0.5, 0.0, 0.0, 10.0, 10.0),
            Err(Error::MalformedDetection(_))
        ));
    }

    #[test]
    fn test_dump_format() {
        let det: Detection =
            serde_json::from_str(r#"{"x1":1.0,"y1":2.0,"x2":3.0,"y2":4.0,"p":0.5,"c":"bus"}"#)
                .unwrap();

        assert_eq!(det.class_name, "bus");
        assert!(det.validate().is_ok());
    }
}

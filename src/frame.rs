use serde_derive::{Deserialize, Serialize};

use crate::detection::Detection;

/// Detections reported for one frame; numbering starts at 1
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Frame {
    pub number: u64,
    pub detections: Vec<Detection>,
}

impl Frame {
    pub fn new(number: u64, detections: Vec<Detection>) -> Self {
        Self { number, detections }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.detections.len()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Detection> {
        self.detections.iter()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}

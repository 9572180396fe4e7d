use nalgebra as na;

#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub id: u32,
    // fixed at creation
    pub class_name: String,
    pub last_center: na::Point2<f32>,
    // frames since the last match
    pub frames_disappeared: u32,
    pub first_frame: u64,
    pub last_frame: u64,
}

impl Track {
    pub fn new(id: u32, class_name: &str, center: na::Point2<f32>, frame_number: u64) -> Self {
        Self {
            id,
            class_name: class_name.to_string(),
            last_center: center,
            frames_disappeared: 0,
            first_frame: frame_number,
            last_frame: frame_number,
        }
    }

    #[inline]
    pub fn hit(&mut self, center: na::Point2<f32>, frame_number: u64) {
        self.last_center = center;
        self.frames_disappeared = 0;
        self.last_frame = frame_number;
    }

    #[inline]
    pub fn distance_to(&self, center: &na::Point2<f32>) -> f32 {
        na::distance(&self.last_center, center)
    }
}

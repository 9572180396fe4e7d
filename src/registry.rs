use std::collections::BTreeMap;

use nalgebra as na;

use crate::track::Track;

/// Active tracks of one run, keyed by id.
///
/// Ids come from a per-run counter starting at 1 and are never reused, so
/// iteration order over the map is also creation order.
#[derive(Debug, Clone)]
pub struct TrackRegistry {
    tracks: BTreeMap<u32, Track>,
    next_id: u32,
}

impl TrackRegistry {
    pub fn new() -> Self {
        Self {
            tracks: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Marks every track as missed for one more frame and drops the ones
    /// that have been missing for longer than `max_frames_disappeared`.
    ///
    /// Returns the ids that were dropped.
    pub fn age(&mut self, max_frames_disappeared: u32) -> Vec<u32> {
        let mut expired = Vec::new();

        self.tracks.retain(|&id, t| {
            t.frames_disappeared += 1;

            if t.frames_disappeared > max_frames_disappeared {
                expired.push(id);
                false
            } else {
                true
            }
        });

        expired
    }

    pub fn create(&mut self, class_name: &str, center: na::Point2<f32>, frame_number: u64) -> u32 {
        let id = self.next_id;
        self.next_id += 1;

        self.tracks
            .insert(id, Track::new(id, class_name, center, frame_number));

        id
    }

    #[inline]
    pub fn get(&self, id: u32) -> Option<&Track> {
        self.tracks.get(&id)
    }

    #[inline]
    pub fn get_mut(&mut self, id: u32) -> Option<&mut Track> {
        self.tracks.get_mut(&id)
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.tracks.values()
    }

    #[inline]
    pub fn iter_class<'a>(&'a self, class_name: &'a str) -> impl Iterator<Item = &'a Track> + 'a {
        self.tracks
            .values()
            .filter(move |t| t.class_name == class_name)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    #[inline]
    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    /// Number of tracks ever created in this registry.
    #[inline]
    pub fn created(&self) -> u32 {
        self.next_id - 1
    }
}

impl Default for TrackRegistry {
    fn default() -> Self {
        Self::new()
    }
}

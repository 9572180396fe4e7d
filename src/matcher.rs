use std::collections::HashSet;

use serde_derive::{Deserialize, Serialize};

use crate::registry::TrackRegistry;
use crate::Detection;

/// How many detections of one frame may land on the same track.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// A track is claimed by at most one detection per frame, including the
    /// detection that created it.
    #[default]
    Reserved,
    /// Every detection is matched on its own; a later detection may land on a
    /// track already updated (or created) earlier in the same frame and
    /// overwrite its position.
    Legacy,
}

/// Chooses the track a detection belongs to.
///
/// The tracker calls `begin_frame` once per frame, then `select` for each
/// detection in input order, and `claim` with the id that detection ended up
/// on (matched or newly created). A batch matcher can solve the whole frame in
/// `begin_frame` and answer `select` from its result.
pub trait Matcher {
    fn begin_frame(&mut self, _registry: &TrackRegistry, _detections: &[Detection]) {}

    fn select(&mut self, registry: &TrackRegistry, det: &Detection, max_distance: f32)
        -> Option<u32>;

    fn claim(&mut self, _track_id: u32) {}
}

/// Nearest same-class centroid strictly inside `max_distance`.
#[derive(Debug, Clone, Default)]
pub struct GreedyMatcher {
    policy: MatchPolicy,
    claimed: HashSet<u32>,
}

impl GreedyMatcher {
    pub fn new(policy: MatchPolicy) -> Self {
        Self {
            policy,
            claimed: HashSet::new(),
        }
    }
}

impl Matcher for GreedyMatcher {
    fn begin_frame(&mut self, _registry: &TrackRegistry, _detections: &[Detection]) {
        self.claimed.clear();
    }

    fn select(
        &mut self,
        registry: &TrackRegistry,
        det: &Detection,
        max_distance: f32,
    ) -> Option<u32> {
        let center = det.center();
        let mut best: Option<(u32, f32)> = None;

        for t in registry.iter_class(&det.class_name) {
            if self.policy == MatchPolicy::Reserved && self.claimed.contains(&t.id) {
                continue;
            }

            let dist = t.distance_to(&center);
            if dist >= max_distance {
                continue;
            }

            // strict comparison keeps the lowest id on ties
            match best {
                Some((_, d)) if d <= dist => {}
                _ => best = Some((t.id, dist)),
            }
        }

        best.map(|(id, _)| id)
    }

    fn claim(&mut self, track_id: u32) {
        if self.policy == MatchPolicy::Reserved {
            self.claimed.insert(track_id);
        }
    }
}

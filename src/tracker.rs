use chrono::{Local, NaiveDateTime};
use log::{debug, warn};

use crate::config::TrackerConfig;
use crate::event::{Location, SightingEvent};
use crate::matcher::{GreedyMatcher, Matcher};
use crate::registry::TrackRegistry;
use crate::track::Track;
use crate::{Detection, Frame};

/// Online association engine for one run.
///
/// Frames must be fed in order. Each frame first ages every track and drops
/// the ones that were missing for too long, then assigns detections to tracks
/// through the matcher. A detection that finds no track starts a new one and
/// yields exactly one [`SightingEvent`]; matches and expiries yield nothing.
pub struct Tracker<M: Matcher = GreedyMatcher> {
    registry: TrackRegistry,
    matcher: M,
    max_distance_threshold: f32,
    max_frames_disappeared: u32,
    fps: f64,
    location: Option<Location>,
    rejected: u64,
}

impl Tracker<GreedyMatcher> {
    pub fn new(config: &TrackerConfig) -> Self {
        Self::with_matcher(config, GreedyMatcher::new(config.policy))
    }
}

impl Default for Tracker<GreedyMatcher> {
    fn default() -> Self {
        Self::new(&TrackerConfig::default())
    }
}

impl<M: Matcher> Tracker<M> {
    pub fn with_matcher(config: &TrackerConfig, matcher: M) -> Self {
        Self {
            registry: TrackRegistry::new(),
            matcher,
            max_distance_threshold: config.max_distance_threshold,
            max_frames_disappeared: config.max_frames_disappeared,
            fps: config.default_fps,
            location: None,
            rejected: 0,
        }
    }

    /// Frame rate used to derive `time_seconds`; ignored unless positive.
    pub fn with_fps(mut self, fps: f64) -> Self {
        if fps > 0.0 {
            self.fps = fps;
        }
        self
    }

    /// Location stamped on every event of this run.
    pub fn with_location(mut self, location: Option<Location>) -> Self {
        self.location = location;
        self
    }

    #[inline]
    pub fn update(&mut self, frame: &Frame) -> Vec<SightingEvent> {
        self.process_frame(frame.number, &frame.detections)
    }

    #[inline]
    pub fn process_frame(
        &mut self,
        frame_number: u64,
        detections: &[Detection],
    ) -> Vec<SightingEvent> {
        self.process_frame_at(frame_number, detections, Local::now().naive_local())
    }

    /// Same as [`Tracker::process_frame`] with an explicit wall-clock time for the events.
    pub fn process_frame_at(
        &mut self,
        frame_number: u64,
        detections: &[Detection],
        now: NaiveDateTime,
    ) -> Vec<SightingEvent> {
        for id in self.registry.age(self.max_frames_disappeared) {
            debug!("frame {}: track {} expired", frame_number, id);
        }

        let accepted: Vec<Detection> = detections
            .iter()
            .filter(|det| match det.validate() {
                Ok(()) => true,
                Err(err) => {
                    warn!("frame {}: skipping detection: {}", frame_number, err);
                    self.rejected += 1;
                    false
                }
            })
            .cloned()
            .collect();

        self.matcher.begin_frame(&self.registry, &accepted);

        let mut events = Vec::new();

        for det in &accepted {
            let center = det.center();
            let matched = self
                .matcher
                .select(&self.registry, det, self.max_distance_threshold)
                .and_then(|id| self.registry.get_mut(id));

            let id = match matched {
                Some(track) => {
                    track.hit(center, frame_number);
                    track.id
                }
                None => {
                    let id = self.registry.create(&det.class_name, center, frame_number);
                    debug!(
                        "frame {}: new {} track {} at ({:.1}, {:.1})",
                        frame_number, det.class_name, id, center.x, center.y
                    );

                    events.push(
                        SightingEvent::new(id, det, frame_number, self.fps, now)
                            .with_location(self.location),
                    );

                    id
                }
            };

            self.matcher.claim(id);
        }

        events
    }

    #[inline]
    pub fn active_tracks(&self) -> impl Iterator<Item = &Track> {
        self.registry.iter()
    }

    #[inline]
    pub fn track(&self, id: u32) -> Option<&Track> {
        self.registry.get(id)
    }

    #[inline]
    pub fn registry(&self) -> &TrackRegistry {
        &self.registry
    }

    #[inline]
    pub fn next_id(&self) -> u32 {
        self.registry.next_id()
    }

    /// Total sighting events returned so far; always `next_id() - 1`.
    #[inline]
    pub fn events_emitted(&self) -> u32 {
        self.registry.created()
    }

    #[inline]
    pub fn rejected_detections(&self) -> u64 {
        self.rejected
    }

    #[inline]
    pub fn fps(&self) -> f64 {
        self.fps
    }
}

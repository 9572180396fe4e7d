use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDateTime;
use log::{info, warn};
use serde_derive::Serialize;

use crate::config::{PipelineConfig, TrackerConfig};
use crate::error::Result;
use crate::event::Location;
use crate::source::DetectionSource;
use crate::stats::{RangeStats, Stats};
use crate::store::EventSink;
use crate::summary::RunSummary;
use crate::tracker::Tracker;

/// Result of one analysed video, as handed to the web layer
#[derive(Serialize, Debug, Clone, PartialEq, Default)]
pub struct AnalysisReport {
    pub total_frames: u64,
    /// New sightings per class
    pub detections_by_class: BTreeMap<String, usize>,
    pub total_events: usize,
    /// Sightings of the filtered class
    pub car_events: usize,
}

/// Query surface for the web layer: runs videos through a fresh tracker each
/// and funnels every run into one shared sink.
#[derive(Clone)]
pub struct Pipeline {
    tracker: TrackerConfig,
    sink: Arc<EventSink>,
}

impl Pipeline {
    pub fn new(config: &PipelineConfig) -> Self {
        Self::with_sink(config.tracker.clone(), Arc::new(EventSink::new(&config.sink)))
    }

    pub fn with_sink(tracker: TrackerConfig, sink: Arc<EventSink>) -> Self {
        Self { tracker, sink }
    }

    #[inline]
    pub fn sink(&self) -> &Arc<EventSink> {
        &self.sink
    }

    /// Tracks every frame of `source` and appends the sightings to the sink.
    ///
    /// A frame the source fails to deliver abandons the run: the error is
    /// returned and nothing from this run is written.
    pub fn analyze<S: DetectionSource>(
        &self,
        source: &mut S,
        location: Option<Location>,
    ) -> Result<AnalysisReport> {
        let fps = source.fps().unwrap_or(self.tracker.default_fps);
        let mut tracker = Tracker::new(&self.tracker)
            .with_fps(fps)
            .with_location(location);

        info!("analysing video at {} fps", tracker.fps());

        let mut events = Vec::new();
        let mut frames = 0u64;

        while let Some(frame) = source.next_frame() {
            let frame = match frame {
                Ok(frame) => frame,
                Err(err) => {
                    warn!("run abandoned after {} frames: {}", frames, err);
                    return Err(err);
                }
            };

            frames += 1;
            events.extend(tracker.update(&frame));

            if frames % 300 == 0 {
                info!(
                    "{} frames processed, {} objects so far",
                    frames,
                    tracker.events_emitted()
                );
            }
        }

        if tracker.rejected_detections() > 0 {
            warn!(
                "{} malformed detections were skipped",
                tracker.rejected_detections()
            );
        }

        self.sink.append(&events, location)?;

        let summary = RunSummary::from_events(&events, self.sink.filtered_class());
        summary.log();

        let mut detections_by_class = BTreeMap::new();
        for ev in &events {
            *detections_by_class
                .entry(ev.object_class.clone())
                .or_insert(0) += 1;
        }

        Ok(AnalysisReport {
            total_frames: source.total_frames().unwrap_or(frames),
            car_events: summary.filtered.as_ref().map_or(0, |f| f.count),
            total_events: events.len(),
            detections_by_class,
        })
    }

    #[inline]
    pub fn stats(&self, day_filter: Option<u32>) -> Result<Stats> {
        self.sink.stats(day_filter)
    }

    #[inline]
    pub fn stats_range(
        &self,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Result<RangeStats> {
        self.sink.stats_range(start, end)
    }
}

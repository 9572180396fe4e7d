use std::collections::BTreeMap;

use log::info;
use serde_derive::Serialize;

use crate::event::SightingEvent;
use crate::math::mean;

#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceRange {
    pub min: f32,
    pub max: f32,
    pub mean: f64,
}

impl ConfidenceRange {
    fn of<'a>(events: impl Iterator<Item = &'a SightingEvent> + Clone) -> Option<Self> {
        let mean = mean(events.clone().map(|e| e.confidence))?;
        let (min, max) = events.fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), e| {
            (lo.min(e.confidence), hi.max(e.confidence))
        });

        Some(Self { min, max, mean })
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ClassSummary {
    pub class_name: String,
    pub count: usize,
    pub avg_confidence: f64,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct FilteredSummary {
    pub class_name: String,
    pub count: usize,
    pub confidence: ConfidenceRange,
    pub frames_with_sightings: usize,
    pub avg_per_frame: f64,
    /// Earliest frame with the most sightings, and that count
    pub busiest_frame: (u64, usize),
    pub time_range: (f64, f64),
}

/// What one run counted, for the operator log
#[derive(Serialize, Debug, Clone, PartialEq, Default)]
pub struct RunSummary {
    pub total: usize,
    /// Most frequent class first
    pub by_class: Vec<ClassSummary>,
    pub confidence: Option<ConfidenceRange>,
    pub frame_range: Option<(u64, u64)>,
    pub time_range: Option<(f64, f64)>,
    pub filtered: Option<FilteredSummary>,
}

impl RunSummary {
    pub fn from_events(events: &[SightingEvent], filtered_class: &str) -> Self {
        let mut classes: BTreeMap<&str, (usize, f64)> = BTreeMap::new();
        for e in events {
            let entry = classes.entry(e.object_class.as_str()).or_insert((0, 0.0));
            entry.0 += 1;
            entry.1 += f64::from(e.confidence);
        }

        let mut by_class: Vec<ClassSummary> = classes
            .into_iter()
            .map(|(name, (count, sum))| ClassSummary {
                class_name: name.to_string(),
                count,
                avg_confidence: sum / count as f64,
            })
            .collect();
        by_class.sort_by(|a, b| b.count.cmp(&a.count));

        let first = events.first();
        let last = events.last();

        Self {
            total: events.len(),
            by_class,
            confidence: ConfidenceRange::of(events.iter()),
            frame_range: first.zip(last).map(|(f, l)| (f.frame_number, l.frame_number)),
            time_range: first.zip(last).map(|(f, l)| (f.time_seconds, l.time_seconds)),
            filtered: Self::filtered(events, filtered_class),
        }
    }

    fn filtered(events: &[SightingEvent], class_name: &str) -> Option<FilteredSummary> {
        let selected = events.iter().filter(|e| e.object_class == class_name);
        let confidence = ConfidenceRange::of(selected.clone())?;

        let mut per_frame: BTreeMap<u64, usize> = BTreeMap::new();
        for e in selected.clone() {
            *per_frame.entry(e.frame_number).or_insert(0) += 1;
        }

        let mut busiest_frame = (0, 0);
        for (&frame, &count) in &per_frame {
            if count > busiest_frame.1 {
                busiest_frame = (frame, count);
            }
        }

        let count = selected.clone().count();
        let first = selected.clone().next()?;
        let last = selected.last()?;

        Some(FilteredSummary {
            class_name: class_name.to_string(),
            count,
            confidence,
            frames_with_sightings: per_frame.len(),
            avg_per_frame: count as f64 / per_frame.len() as f64,
            busiest_frame,
            time_range: (first.time_seconds, last.time_seconds),
        })
    }

    pub fn log(&self) {
        if self.total == 0 {
            info!("no objects counted in this run");
            return;
        }

        info!("{} objects counted", self.total);
        for c in &self.by_class {
            info!(
                "  {}: {} (avg confidence {:.3})",
                c.class_name, c.count, c.avg_confidence
            );
        }

        if let (Some((f0, f1)), Some((t0, t1))) = (self.frame_range, self.time_range) {
            info!("frames {} - {}, time {}s - {}s", f0, f1, t0, t1);
        }

        if let Some(c) = &self.confidence {
            info!(
                "confidence min {:.3} max {:.3} avg {:.3}",
                c.min, c.max, c.mean
            );
        }

        if let Some(f) = &self.filtered {
            info!(
                "{}: {} in {} frames ({:.2} per frame), busiest frame {} with {}, time {}s - {}s",
                f.class_name,
                f.count,
                f.frames_with_sightings,
                f.avg_per_frame,
                f.busiest_frame.0,
                f.busiest_frame.1,
                f.time_range.0,
                f.time_range.1
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Detection;
    use approx::assert_abs_diff_eq;
    use chrono::NaiveDate;

    fn event(class: &str, frame: u64, confidence: f32) -> SightingEvent {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        let det = Detection::new(class, confidence, 0.0, 0.0, 10.0, 10.0).unwrap();

        SightingEvent::new(frame as u32, &det, frame, 10.0, ts)
    }

    #[test]
    fn test_summary() {
        let events = vec![
            event("car", 3, 0.5),
            event("car", 3, 0.7),
            event("truck", 4, 0.9),
            event("car", 8, 0.6),
            event("car", 9, 0.8),
            event("car", 9, 0.8),
        ];
        let s = RunSummary::from_events(&events, "car");

        assert_eq!(s.total, 6);
        assert_eq!(s.by_class[0].class_name, "car");
        assert_eq!(s.by_class[0].count, 5);
        assert_eq!(s.frame_range, Some((3, 9)));
        assert_abs_diff_eq!(s.confidence.unwrap().max, 0.9);

        let f = s.filtered.unwrap();
        assert_eq!(f.count, 5);
        assert_eq!(f.frames_with_sightings, 3);
        assert_eq!(f.busiest_frame, (3, 2));
        assert_abs_diff_eq!(f.avg_per_frame, 5.0 / 3.0);
        assert_abs_diff_eq!(f.time_range.1, 0.9);
    }

    #[test]
    fn test_empty_run() {
        let s = RunSummary::from_events(&[], "car");

        assert_eq!(s.total, 0);
        assert!(s.confidence.is_none());
        assert!(s.filtered.is_none());
    }
}

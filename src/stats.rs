//! Aggregates over the filtered sighting log.
//!
//! Everything is recomputed from the rows on each call; nothing is cached.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_derive::Serialize;
use serde_json::json;

use crate::error::{Error, Result};
use crate::event::{Location, TIMESTAMP_FORMAT};
use crate::math::{mean, round_to};
use crate::store::LogRecord;

pub const DAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Counts per weekday, Monday first. Serialises as a map holding all seven names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ByDay([usize; 7]);

impl ByDay {
    /// Count for `day` (0 = Monday).
    #[inline]
    pub fn get(&self, day: usize) -> usize {
        self.0.get(day).copied().unwrap_or(0)
    }

    #[inline]
    pub fn get_by_name(&self, name: &str) -> Option<usize> {
        DAY_NAMES.iter().position(|d| *d == name).map(|i| self.0[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, usize)> + '_ {
        DAY_NAMES.iter().copied().zip(self.0.iter().copied())
    }

    #[inline]
    pub fn total(&self) -> usize {
        self.0.iter().sum()
    }

    fn bump(&mut self, ts: &NaiveDateTime) {
        self.0[ts.weekday().num_days_from_monday() as usize] += 1;
    }
}

impl Serialize for ByDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(DAY_NAMES.len()))?;
        for (name, count) in self.iter() {
            map.serialize_entry(name, &count)?;
        }
        map.end()
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct HeatPoint {
    pub lat: f64,
    pub lng: f64,
    pub intensity: usize,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Stats {
    pub by_day: ByDay,
    /// Only hours that occur
    pub by_hour: BTreeMap<u32, usize>,
    pub total_cars: usize,
    /// `None` when the filter leaves no rows
    pub avg_confidence: Option<f64>,
    pub heatmap: Vec<HeatPoint>,
}

impl Stats {
    /// Heatmap as a GeoJSON feature collection, coordinates in `[lng, lat]` order.
    pub fn heatmap_geojson(&self) -> serde_json::Value {
        let features: Vec<_> = self
            .heatmap
            .iter()
            .map(|p| {
                json!({
                    "type": "Feature",
                    "geometry": {
                        "type": "Point",
                        "coordinates": [p.lng, p.lat]
                    },
                    "properties": { "intensity": p.intensity }
                })
            })
            .collect();

        json!({
            "type": "FeatureCollection",
            "features": features
        })
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RangeStats {
    pub by_day: ByDay,
    pub total_cars: usize,
}

struct Row {
    ts: NaiveDateTime,
    confidence: f32,
    location: Option<Location>,
}

/// Parses a log timestamp, `YYYY-MM-DD HH:MM:SS` or the ISO `T` form.
pub fn parse_timestamp(src: &str) -> Result<NaiveDateTime> {
    let src = src.trim();

    NaiveDateTime::parse_from_str(src, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(src, "%Y-%m-%dT%H:%M:%S"))
        .map_err(Error::from)
}

/// A range bound: a full timestamp, or a bare date meaning its midnight.
pub fn parse_bound(src: &str) -> Result<NaiveDateTime> {
    if let Ok(date) = NaiveDate::parse_from_str(src.trim(), "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| Error::invalid_filter(format!("bad date `{}`", src)));
    }

    parse_timestamp(src)
}

pub fn validate_day(day: u32) -> Result<u32> {
    if day < 7 {
        Ok(day)
    } else {
        Err(Error::invalid_filter(format!("day {} is outside 0..=6", day)))
    }
}

/// Web-layer day argument: empty or `all` means no filter.
pub fn parse_day_filter(src: &str) -> Result<Option<u32>> {
    let src = src.trim();

    if src.is_empty() || src.eq_ignore_ascii_case("all") {
        return Ok(None);
    }

    let day = src
        .parse::<u32>()
        .map_err(|_| Error::invalid_filter(format!("`{}` is not a day number", src)))?;

    validate_day(day).map(Some)
}

fn rows(records: &[LogRecord]) -> Result<Vec<Row>> {
    if records.is_empty() {
        return Err(Error::NoDataAvailable);
    }

    records
        .iter()
        .map(|r| {
            Ok(Row {
                ts: parse_timestamp(&r.timestamp)?,
                confidence: r.confidence,
                location: r.location(),
            })
        })
        .collect()
}

fn heatmap<'a>(rows: impl Iterator<Item = &'a Row>) -> Vec<HeatPoint> {
    let mut points: Vec<(f64, f64)> = rows
        .filter_map(|r| r.location.map(|l| (l.lat, l.lng)))
        .collect();

    points.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));

    let mut out: Vec<HeatPoint> = Vec::new();
    for (lat, lng) in points {
        if let Some(p) = out.last_mut() {
            if p.lat == lat && p.lng == lng {
                p.intensity += 1;
                continue;
            }
        }

        out.push(HeatPoint {
            lat,
            lng,
            intensity: 1,
        });
    }

    out
}

pub fn compute_stats(records: &[LogRecord], day_filter: Option<u32>) -> Result<Stats> {
    let day_filter = day_filter.map(validate_day).transpose()?;
    let rows = rows(records)?;

    let selected: Vec<&Row> = rows
        .iter()
        .filter(|r| match day_filter {
            Some(day) => r.ts.weekday().num_days_from_monday() == day,
            None => true,
        })
        .collect();

    let mut by_day = ByDay::default();
    let mut by_hour = BTreeMap::new();

    for r in &selected {
        by_day.bump(&r.ts);
        *by_hour.entry(r.ts.hour()).or_insert(0) += 1;
    }

    Ok(Stats {
        by_day,
        by_hour,
        total_cars: selected.len(),
        avg_confidence: mean(selected.iter().map(|r| r.confidence)).map(|m| round_to(m, 3)),
        heatmap: heatmap(selected.iter().copied()),
    })
}

pub fn compute_range(
    records: &[LogRecord],
    start: Option<NaiveDateTime>,
    end: Option<NaiveDateTime>,
) -> Result<RangeStats> {
    let rows = rows(records)?;

    let mut by_day = ByDay::default();
    let mut total_cars = 0;

    for r in rows
        .iter()
        .filter(|r| start.map_or(true, |s| r.ts >= s))
        .filter(|r| end.map_or(true, |e| r.ts <= e))
    {
        by_day.bump(&r.ts);
        total_cars += 1;
    }

    Ok(RangeStats { by_day, total_cars })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn record(ts: &str, confidence: f32, loc: Option<(f64, f64)>) -> LogRecord {
        LogRecord {
            timestamp: ts.to_string(),
            frame_number: 1,
            time_seconds: 0.03,
            object_class: "car".to_string(),
            confidence,
            bbox_x1: 0.0,
            bbox_y1: 0.0,
            bbox_x2: 10.0,
            bbox_y2: 10.0,
            bbox_width: 10.0,
            bbox_height: 10.0,
            bbox_center_x: 5.0,
            bbox_center_y: 5.0,
            location_lat: loc.map(|l| l.0),
            location_lng: loc.map(|l| l.1),
        }
    }

    fn sample() -> Vec<LogRecord> {
        vec![
            // Monday
            record("2024-05-06 08:10:00", 0.9, Some((-17.37, -66.16))),
            record("2024-05-06 08:40:00", 0.8, Some((-17.37, -66.16))),
            // Wednesday
            record("2024-05-08 17:00:00", 0.7, Some((-16.5, -68.15))),
            // Sunday
            record("2024-05-12 23:59:59", 0.6, None),
        ]
    }

    #[test]
    fn test_unfiltered() {
        let stats = compute_stats(&sample(), None).unwrap();

        assert_eq!(stats.total_cars, 4);
        assert_eq!(stats.by_day.get(0), 2);
        assert_eq!(stats.by_day.get(2), 1);
        assert_eq!(stats.by_day.get_by_name("Sunday"), Some(1));
        assert_eq!(stats.by_day.get_by_name("Friday"), Some(0));
        assert_eq!(stats.by_hour.get(&8), Some(&2));
        assert_eq!(stats.by_hour.get(&12), None);
        assert_abs_diff_eq!(stats.avg_confidence.unwrap(), 0.75);

        assert_eq!(stats.heatmap.len(), 2);
        assert_eq!(
            stats.heatmap[1],
            HeatPoint {
                lat: -16.5,
                lng: -68.15,
                intensity: 1
            }
        );
        assert_eq!(stats.heatmap[0].intensity, 2);
    }

    #[test]
    fn test_day_filter() {
        let stats = compute_stats(&sample(), Some(2)).unwrap();

        assert_eq!(stats.total_cars, 1);
        assert_eq!(stats.by_day.total(), 1);
        assert_eq!(stats.by_day.iter().count(), 7);
        assert_eq!(stats.by_hour.keys().copied().collect::<Vec<_>>(), vec![17]);

        let empty = compute_stats(&sample(), Some(4)).unwrap();
        assert_eq!(empty.total_cars, 0);
        assert_eq!(empty.avg_confidence, None);
        assert!(empty.heatmap.is_empty());
    }

    #[test]
    fn test_errors() {
        assert!(matches!(compute_stats(&[], None), Err(Error::NoDataAvailable)));
        assert!(matches!(
            compute_stats(&sample(), Some(9)),
            Err(Error::InvalidFilter(_))
        ));
        assert!(matches!(
            compute_range(&[], None, None),
            Err(Error::NoDataAvailable)
        ));
    }

    #[test]
    fn test_range_bounds_are_inclusive() {
        let start = parse_bound("2024-05-06 08:40:00").unwrap();
        let end = parse_bound("2024-05-08").unwrap();
        let range = compute_range(&sample(), Some(start), Some(end)).unwrap();

        // 17:00 on the 8th is after midnight of the end date
        assert_eq!(range.total_cars, 1);
        assert_eq!(range.by_day.get(0), 1);

        let open = compute_range(&sample(), None, Some(parse_bound("2024-05-12 23:59:59").unwrap()))
            .unwrap();
        assert_eq!(open.total_cars, 4);
    }

    #[test]
    fn test_parse_day_filter() {
        assert_eq!(parse_day_filter("all").unwrap(), None);
        assert_eq!(parse_day_filter("").unwrap(), None);
        assert_eq!(parse_day_filter("3").unwrap(), Some(3));
        assert!(matches!(parse_day_filter("7"), Err(Error::InvalidFilter(_))));
        assert!(matches!(parse_day_filter("monday"), Err(Error::InvalidFilter(_))));
    }

    #[test]
    fn test_serialised_shape() {
        let stats = compute_stats(&sample(), None).unwrap();
        let value = serde_json::to_value(&stats).unwrap();

        assert_eq!(value["by_day"]["Monday"], 2);
        assert_eq!(value["by_day"]["Thursday"], 0);
        assert_eq!(value["by_hour"]["23"], 1);

        let geo = stats.heatmap_geojson();
        assert_eq!(geo["features"].as_array().map(|f| f.len()), Some(2));
        assert_eq!(geo["features"][0]["geometry"]["coordinates"][0], -66.16);
        assert_eq!(geo["features"][0]["properties"]["intensity"], 2);
    }
}

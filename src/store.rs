use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use log::{debug, info};
use parking_lot::{Mutex, RwLock};
use serde_derive::Deserialize;

use crate::config::SinkConfig;
use crate::error::{Error, Result};
use crate::event::{Location, SightingEvent};
use crate::stats::{self, RangeStats, Stats};

pub const HEADER: [&str; 15] = [
    "timestamp",
    "frame_number",
    "time_seconds",
    "object_class",
    "confidence",
    "bbox_x1",
    "bbox_y1",
    "bbox_x2",
    "bbox_y2",
    "bbox_width",
    "bbox_height",
    "bbox_center_x",
    "bbox_center_y",
    "location_lat",
    "location_lng",
];

// logs written before location support stop after `bbox_center_y`
const COLUMNS_WITHOUT_LOCATION: usize = 13;

/// One row of a sighting log
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub timestamp: String,
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
    #[serde(default)]
    pub location_lat: Option<f64>,
    #[serde(default)]
    pub location_lng: Option<f64>,
}

impl LogRecord {
    pub fn from_event(ev: &SightingEvent, location: Option<Location>) -> Self {
        let location = location.or(ev.location);

        Self {
            timestamp: ev.timestamp_string(),
            frame_number: ev.frame_number,
            time_seconds: ev.time_seconds,
            object_class: ev.object_class.clone(),
            confidence: ev.confidence,
            bbox_x1: ev.bbox_x1,
            bbox_y1: ev.bbox_y1,
            bbox_x2: ev.bbox_x2,
            bbox_y2: ev.bbox_y2,
            bbox_width: ev.bbox_width,
            bbox_height: ev.bbox_height,
            bbox_center_x: ev.bbox_center_x,
            bbox_center_y: ev.bbox_center_y,
            location_lat: location.map(|l| l.lat),
            location_lng: location.map(|l| l.lng),
        }
    }

    #[inline]
    pub fn location(&self) -> Option<Location> {
        match (self.location_lat, self.location_lng) {
            (Some(lat), Some(lng)) => Some(Location::new(lat, lng)),
            _ => None,
        }
    }

    fn fields(&self, with_location: bool) -> Vec<String> {
        let mut fields = vec![
            self.timestamp.clone(),
            self.frame_number.to_string(),
            self.time_seconds.to_string(),
            self.object_class.clone(),
            self.confidence.to_string(),
            self.bbox_x1.to_string(),
            self.bbox_y1.to_string(),
            self.bbox_x2.to_string(),
            self.bbox_y2.to_string(),
            self.bbox_width.to_string(),
            self.bbox_height.to_string(),
            self.bbox_center_x.to_string(),
            self.bbox_center_y.to_string(),
        ];

        if with_location {
            fields.push(self.location_lat.map(|v| v.to_string()).unwrap_or_default());
            fields.push(self.location_lng.map(|v| v.to_string()).unwrap_or_default());
        }

        fields
    }
}

/// Append-only CSV log.
///
/// The header goes in only while the file is empty or missing. Every append
/// buffers its rows completely and commits them with one write under the
/// writer lock; readers take the read lock and never see a partial row.
pub struct EventLog {
    path: PathBuf,
    lock: RwLock<()>,
}

impl EventLog {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            lock: RwLock::new(()),
        }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends `records` and returns how many rows were written.
    pub fn append(&self, records: &[LogRecord]) -> Result<usize> {
        let _guard = self.lock.write();

        let with_location = self.accepts(records)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let fresh = file.metadata()?.len() == 0;

        let mut buf = Vec::new();
        {
            let mut wtr = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(&mut buf);

            if fresh {
                wtr.write_record(HEADER.iter())?;
                debug!("{}: new log, header written", self.path.display());
            }

            for rec in records {
                wtr.write_record(&rec.fields(with_location))?;
            }

            wtr.flush()?;
        }

        file.write_all(&buf)?;
        file.flush()?;

        Ok(records.len())
    }

    /// Every row of the log; `NoDataAvailable` if the log is missing or has no rows.
    pub fn read_all(&self) -> Result<Vec<LogRecord>> {
        let _guard = self.lock.read();

        if !self.path.exists() {
            return Err(Error::NoDataAvailable);
        }

        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&self.path)?;

        let rows = rdr
            .deserialize()
            .collect::<std::result::Result<Vec<LogRecord>, _>>()?;

        if rows.is_empty() {
            return Err(Error::NoDataAvailable);
        }

        Ok(rows)
    }

    /// Checks that `records` fit the layout of the log and tells whether rows
    /// get the location columns. A located row against a log without them is
    /// `NoLocationColumns`.
    pub fn check_layout(&self, records: &[LogRecord]) -> Result<bool> {
        let _guard = self.lock.read();

        self.accepts(records)
    }

    fn accepts(&self, records: &[LogRecord]) -> Result<bool> {
        let fresh = match std::fs::metadata(&self.path) {
            Ok(meta) => meta.len() == 0,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => true,
            Err(err) => return Err(err.into()),
        };

        if fresh || self.header_has_location()? {
            return Ok(true);
        }

        if records.iter().any(|r| r.location().is_some()) {
            return Err(Error::NoLocationColumns(self.path.clone()));
        }

        Ok(false)
    }

    fn header_has_location(&self) -> Result<bool> {
        let mut rdr = csv::Reader::from_path(&self.path)?;
        let headers = rdr.headers()?;

        Ok(headers.len() > COLUMNS_WITHOUT_LOCATION
            && headers.iter().any(|h| h == "location_lat"))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppendSummary {
    pub full: usize,
    pub filtered: usize,
}

/// Process-wide destination of sighting events: the full log plus the log of
/// the filtered class. Shared between runs behind an `Arc`.
pub struct EventSink {
    full: EventLog,
    filtered: EventLog,
    filtered_class: String,
    append_lock: Mutex<()>,
}

impl EventSink {
    pub fn new(config: &SinkConfig) -> Self {
        Self {
            full: EventLog::new(&config.full_log),
            filtered: EventLog::new(&config.filtered_log),
            filtered_class: config.filtered_class.clone(),
            append_lock: Mutex::new(()),
        }
    }

    #[inline]
    pub fn full_log(&self) -> &EventLog {
        &self.full
    }

    #[inline]
    pub fn filtered_log(&self) -> &EventLog {
        &self.filtered
    }

    #[inline]
    pub fn filtered_class(&self) -> &str {
        &self.filtered_class
    }

    /// Writes every event to the full log and the events of the filtered
    /// class to the filtered log. A given `location` is stamped on every row.
    ///
    /// Nothing is written if either log cannot take the rows.
    /// Re-appending the same events duplicates them; callers retrying after
    /// an error must drop the events already written (by track id).
    pub fn append(
        &self,
        events: &[SightingEvent],
        location: Option<Location>,
    ) -> Result<AppendSummary> {
        let records: Vec<LogRecord> = events
            .iter()
            .map(|ev| LogRecord::from_event(ev, location))
            .collect();
        let filtered: Vec<LogRecord> = records
            .iter()
            .filter(|r| r.object_class == self.filtered_class)
            .cloned()
            .collect();

        let _guard = self.append_lock.lock();

        self.full.check_layout(&records)?;
        self.filtered.check_layout(&filtered)?;

        let full = self.full.append(&records)?;
        let filtered = if filtered.is_empty() {
            0
        } else {
            self.filtered.append(&filtered)?
        };

        info!(
            "appended {} sightings ({} {}) to {}",
            full,
            filtered,
            self.filtered_class,
            self.full.path().display()
        );

        Ok(AppendSummary { full, filtered })
    }

    /// Statistics over the filtered log, optionally restricted to one weekday (0 = Monday).
    pub fn stats(&self, day_filter: Option<u32>) -> Result<Stats> {
        let day_filter = day_filter.map(stats::validate_day).transpose()?;
        let records = self.filtered.read_all()?;

        stats::compute_stats(&records, day_filter)
    }

    /// Weekday histogram over the filtered log between inclusive bounds.
    pub fn stats_range(
        &self,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Result<RangeStats> {
        let records = self.filtered.read_all()?;

        stats::compute_range(&records, start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Detection;
    use chrono::NaiveDate;

    fn event(class: &str, id: u32) -> SightingEvent {
        let ts = NaiveDate::from_ymd_opt(2024, 5, 6)
            .and_then(|d| d.and_hms_opt(8, 30, 0))
            .unwrap();
        let det = Detection::new(class, 0.91, 10.0, 20.0, 110.0, 60.0).unwrap();

        SightingEvent::new(id, &det, u64::from(id), 30.0, ts)
    }

    #[test]
    fn test_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::new(dir.path().join("log.csv"));

        log.append(&[]).unwrap();
        log.append(&[]).unwrap();
        log.append(&[LogRecord::from_event(&event("car", 1), None)]).unwrap();

        let text = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(text.matches("timestamp,frame_number").count(), 1);
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn test_row_layout() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::new(dir.path().join("log.csv"));

        log.append(&[LogRecord::from_event(&event("car", 1), None)]).unwrap();
        let located = LogRecord::from_event(&event("car", 2), Some(Location::new(-17.37, -66.16)));
        log.append(&[located]).unwrap();

        let text = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], HEADER.join(","));
        assert_eq!(
            lines[1],
            "2024-05-06 08:30:00,1,0.03,car,0.91,10,20,110,60,100,40,60,40,,"
        );
        assert!(lines[2].ends_with(",-17.37,-66.16"));

        let rows = log.read_all().unwrap();
        assert_eq!(rows[0].location(), None);
        assert_eq!(rows[1].location(), Some(Location::new(-17.37, -66.16)));
    }

    fn legacy_log(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("legacy.csv");
        let header = HEADER[..COLUMNS_WITHOUT_LOCATION].join(",");
        let row = "2024-05-06 08:30:00,1,0.03,car,0.5,1,2,3,4,2,2,2,3";
        std::fs::write(&path, format!("{}\n{}\n", header, row)).unwrap();

        path
    }

    #[test]
    fn test_legacy_log_keeps_its_layout() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::new(legacy_log(&dir));

        log.append(&[LogRecord::from_event(&event("car", 2), None)]).unwrap();

        let text = std::fs::read_to_string(log.path()).unwrap();
        assert!(text.lines().all(|l| l.split(',').count() == COLUMNS_WITHOUT_LOCATION));

        let rows = log.read_all().unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.location().is_none()));
    }

    #[test]
    fn test_legacy_log_refuses_location() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::new(legacy_log(&dir));
        let before = std::fs::read_to_string(log.path()).unwrap();

        let located = LogRecord::from_event(&event("car", 2), Some(Location::new(-17.37, -66.16)));
        let res = log.append(&[located]);

        assert!(matches!(res, Err(Error::NoLocationColumns(ref p)) if p == log.path()));
        assert_eq!(std::fs::read_to_string(log.path()).unwrap(), before);
    }

    #[test]
    fn test_sink_refuses_location_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SinkConfig::in_dir(dir.path());
        config.filtered_log = legacy_log(&dir);
        let sink = EventSink::new(&config);

        let res = sink.append(&[event("car", 1)], Some(Location::new(1.0, 2.0)));

        assert!(matches!(res, Err(Error::NoLocationColumns(_))));
        assert!(!sink.full_log().path().exists());
        assert_eq!(sink.filtered_log().read_all().unwrap().len(), 1);
    }

    #[test]
    fn test_log_path_is_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SinkConfig::in_dir(dir.path());
        config.full_log = dir.path().to_path_buf();
        let sink = EventSink::new(&config);

        let res = sink.append(&[event("car", 1)], None);

        assert!(matches!(res, Err(Error::Io(_)) | Err(Error::Csv(_))));
        assert!(!sink.filtered_log().path().exists());
        assert!(matches!(sink.full_log().read_all(), Err(Error::Io(_)) | Err(Error::Csv(_))));
    }

    #[test]
    fn test_unparseable_row_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let sink = EventSink::new(&SinkConfig::in_dir(dir.path()));
        sink.append(&[event("car", 1)], None).unwrap();

        let mut text = std::fs::read_to_string(sink.filtered_log().path()).unwrap();
        text.push_str("2024-05-06 08:31:00,abc,0.03,car,0.9,1,2,3,4,2,2,2,3,,\n");
        std::fs::write(sink.filtered_log().path(), text).unwrap();

        assert!(matches!(sink.stats(None), Err(Error::Csv(_))));
        assert!(matches!(sink.stats_range(None, None), Err(Error::Csv(_))));
    }

    #[test]
    fn test_missing_or_empty_log() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::new(dir.path().join("nothing.csv"));
        assert!(matches!(log.read_all(), Err(Error::NoDataAvailable)));

        log.append(&[]).unwrap();
        assert!(matches!(log.read_all(), Err(Error::NoDataAvailable)));
    }

    #[test]
    fn test_sink_splits_by_class() {
        let dir = tempfile::tempdir().unwrap();
        let sink = EventSink::new(&SinkConfig::in_dir(dir.path()));

        let summary = sink
            .append(&[event("car", 1), event("truck", 2), event("car", 3)], None)
            .unwrap();

        assert_eq!(summary, AppendSummary { full: 3, filtered: 2 });
        assert_eq!(sink.full_log().read_all().unwrap().len(), 3);
        assert!(sink
            .filtered_log()
            .read_all()
            .unwrap()
            .iter()
            .all(|r| r.object_class == "car"));
    }

    #[test]
    fn test_stats_rejects_bad_day() {
        let dir = tempfile::tempdir().unwrap();
        let sink = EventSink::new(&SinkConfig::in_dir(dir.path()));

        assert!(matches!(sink.stats(None), Err(Error::NoDataAvailable)));
        assert!(matches!(sink.stats(Some(7)), Err(Error::InvalidFilter(_))));
    }
}

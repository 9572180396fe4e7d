use std::path::{Path, PathBuf};

use serde_derive::{Deserialize, Serialize};

use crate::error::Result;
use crate::matcher::MatchPolicy;

/// Parameters of the association engine
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct TrackerConfig {
    /// Largest center distance (in bbox units) that still counts as the same object
    pub max_distance_threshold: f32,
    /// Frames a track may go unmatched before it is dropped
    pub max_frames_disappeared: u32,
    pub policy: MatchPolicy,
    /// Used for `time_seconds` when the source does not report a frame rate
    pub default_fps: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_distance_threshold: 100.0,
            max_frames_disappeared: 30,
            policy: MatchPolicy::Reserved,
            default_fps: 30.0,
        }
    }
}

/// Where the sighting logs live and which class gets its own log
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SinkConfig {
    pub full_log: PathBuf,
    pub filtered_log: PathBuf,
    pub filtered_class: String,
}

impl SinkConfig {
    /// Both logs under `dir` with their default file names.
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
        let defaults = Self::default();
        let dir = dir.as_ref();

        Self {
            full_log: dir.join(defaults.full_log),
            filtered_log: dir.join(defaults.filtered_log),
            filtered_class: defaults.filtered_class,
        }
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            full_log: PathBuf::from("detecciones_completas.csv"),
            filtered_log: PathBuf::from("autos_solo.csv"),
            filtered_class: "car".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub tracker: TrackerConfig,
    pub sink: SinkConfig,
}

impl PipelineConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path)?;

        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }
}

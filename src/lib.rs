pub mod bbox;
pub mod config;
pub mod detection;
pub mod error;
pub mod event;
pub mod frame;
pub mod math;
pub mod matcher;
pub mod pipeline;
pub mod registry;
pub mod source;
pub mod stats;
pub mod store;
pub mod summary;
pub mod tracker;

mod track;

pub use config::{PipelineConfig, SinkConfig, TrackerConfig};
pub use detection::Detection;
pub use error::{Error, Result};
pub use event::{Location, SightingEvent};
pub use frame::Frame;
pub use matcher::{GreedyMatcher, MatchPolicy, Matcher};
pub use pipeline::{AnalysisReport, Pipeline};
pub use registry::TrackRegistry;
pub use source::{DetectionSource, DumpSource, VecSource};
pub use stats::{RangeStats, Stats};
pub use store::EventSink;
pub use track::Track;
pub use tracker::Tracker;

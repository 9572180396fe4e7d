use std::collections::VecDeque;
use std::io::BufRead;
use std::path::Path;

use crate::error::{Error, Result};
use crate::{Detection, Frame};

/// Adapter seam towards the detector: yields frames in order, numbered from 1.
pub trait DetectionSource {
    fn fps(&self) -> Option<f64> {
        None
    }

    fn total_frames(&self) -> Option<u64> {
        None
    }

    /// `None` once the video is exhausted.
    fn next_frame(&mut self) -> Option<Result<Frame>>;
}

/// Frames already held in memory.
#[derive(Debug, Clone, Default)]
pub struct VecSource {
    frames: VecDeque<Frame>,
    fps: Option<f64>,
    total: u64,
}

impl VecSource {
    /// Frame `i` of the iterator becomes frame number `i + 1`.
    pub fn new<I>(frames: I) -> Self
    where
        I: IntoIterator<Item = Vec<Detection>>,
    {
        let frames: VecDeque<_> = frames
            .into_iter()
            .enumerate()
            .map(|(idx, dets)| Frame::new(idx as u64 + 1, dets))
            .collect();
        let total = frames.len() as u64;

        Self {
            frames,
            fps: None,
            total,
        }
    }

    pub fn with_fps(mut self, fps: f64) -> Self {
        self.fps = Some(fps);
        self
    }
}

impl DetectionSource for VecSource {
    fn fps(&self) -> Option<f64> {
        self.fps
    }

    fn total_frames(&self) -> Option<u64> {
        Some(self.total)
    }

    fn next_frame(&mut self) -> Option<Result<Frame>> {
        self.frames.pop_front().map(Ok)
    }
}

/// Detection dump, one line per frame: `<frame_number>:<json array of detections>`.
///
/// Frames missing from the dump are yielded as empty frames so the tracker
/// still ages its tracks across them. Blank lines and lines starting with `#`
/// are ignored.
pub struct DumpSource<R: BufRead> {
    lines: std::io::Lines<R>,
    line_no: usize,
    expected: u64,
    pending: Option<Frame>,
    fps: Option<f64>,
}

impl DumpSource<std::io::BufReader<std::fs::File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path)?;

        Ok(Self::new(std::io::BufReader::new(file)))
    }
}

impl<R: BufRead> DumpSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
            expected: 1,
            pending: None,
            fps: None,
        }
    }

    pub fn with_fps(mut self, fps: f64) -> Self {
        self.fps = Some(fps);
        self
    }

    fn parse_line(&self, line: &str) -> Result<Frame> {
        let idx = line.find(':').ok_or_else(|| {
            Error::source(format!("line {}: expected `:`", self.line_no))
        })?;
        let (number, vector) = line.split_at(idx);

        let number = number.trim().parse::<u64>().map_err(|_| {
            Error::source(format!("line {}: parse frame number failed", self.line_no))
        })?;
        let detections: Vec<Detection> = serde_json::from_str(&vector[1..]).map_err(|e| {
            Error::source(format!("line {}: parse json failed: {}", self.line_no, e))
        })?;

        Ok(Frame::new(number, detections))
    }

    fn read_frame(&mut self) -> Option<Result<Frame>> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(err) => return Some(Err(err.into())),
            };
            self.line_no += 1;

            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            return Some(self.parse_line(line));
        }
    }
}

impl<R: BufRead> DetectionSource for DumpSource<R> {
    fn fps(&self) -> Option<f64> {
        self.fps
    }

    fn next_frame(&mut self) -> Option<Result<Frame>> {
        let frame = match self.pending.take() {
            Some(frame) => frame,
            None => match self.read_frame()? {
                Ok(frame) => frame,
                Err(err) => return Some(Err(err)),
            },
        };

        if frame.number < self.expected {
            return Some(Err(Error::source(format!(
                "frame {} out of order, expected {}",
                frame.number, self.expected
            ))));
        }

        let number = self.expected;
        self.expected += 1;

        if frame.number > number {
            self.pending = Some(frame);
            return Some(Ok(Frame::new(number, Vec::new())));
        }

        Some(Ok(frame))
    }
}

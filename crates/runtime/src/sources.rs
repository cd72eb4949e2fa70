//! Sample source implementations.

use std::collections::VecDeque;
use std::path::Path;

use gazelink_common::error::{GazelinkError, GazelinkResult};
use gazelink_tracking_model::sample::{parse_header, parse_samples, RawSample, SampleStreamHeader};

use crate::SampleSource;

/// Stub source for testing: delivers pre-loaded samples, then finishes.
pub struct StubSource {
    samples: VecDeque<RawSample>,
    available: bool,
}

impl StubSource {
    pub fn new(samples: Vec<RawSample>) -> Self {
        Self {
            samples: samples.into(),
            available: true,
        }
    }

    /// A source that reports no tracking hardware.
    pub fn unavailable() -> Self {
        Self {
            samples: VecDeque::new(),
            available: false,
        }
    }
}

impl SampleSource for StubSource {
    fn poll(&mut self) -> GazelinkResult<Option<RawSample>> {
        Ok(self.samples.pop_front())
    }

    fn name(&self) -> &str {
        "stub"
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn is_finished(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Replays a recorded JSONL stream.
#[derive(Debug)]
pub struct ReplaySource {
    header: Option<SampleStreamHeader>,
    samples: Vec<RawSample>,
    index: usize,
}

impl ReplaySource {
    pub fn open(path: &Path) -> GazelinkResult<Self> {
        if !path.exists() {
            return Err(GazelinkError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        let source = Self::parse(&content)?;
        tracing::info!(
            path = %path.display(),
            samples = source.samples.len(),
            "Loaded recorded sample stream"
        );
        Ok(source)
    }

    pub fn parse(jsonl: &str) -> GazelinkResult<Self> {
        let header = parse_header(jsonl);
        if header.is_none() {
            tracing::debug!("Sample stream has no header line");
        }
        let mut samples = parse_samples(jsonl)?;
        if samples.windows(2).any(|w| w[1].timestamp_ns < w[0].timestamp_ns) {
            tracing::warn!("Sample stream is out of order; sorting by timestamp");
            samples.sort_by_key(|s| s.timestamp_ns);
        }
        Ok(Self {
            header,
            samples,
            index: 0,
        })
    }

    pub fn header(&self) -> Option<&SampleStreamHeader> {
        self.header.as_ref()
    }

    pub fn samples(&self) -> &[RawSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl SampleSource for ReplaySource {
    fn poll(&mut self) -> GazelinkResult<Option<RawSample>> {
        let sample = self.samples.get(self.index).copied();
        if sample.is_some() {
            self.index += 1;
        }
        Ok(sample)
    }

    fn name(&self) -> &str {
        "replay"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn is_finished(&self) -> bool {
        self.index >= self.samples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STREAM: &str = r#"# {"schema_version":"1.0","epoch_wall":"2026-01-01T00:00:00Z","sample_rate_hz":60}
{"t":33333333,"gaze":{"x":0.1,"y":0.0},"eye_blink_left":0.0,"eye_blink_right":0.0,"jaw_open":0.0,"head_position":{"x":0.0,"y":0.0,"z":0.5}}
{"t":16666666,"gaze":{"x":0.0,"y":0.0},"eye_blink_left":0.0,"eye_blink_right":0.0,"jaw_open":0.0,"head_position":{"x":0.0,"y":0.0,"z":0.5}}
"#;

    #[test]
    fn test_replay_sorts_and_drains() {
        let mut source = ReplaySource::parse(STREAM).unwrap();
        assert_eq!(source.header().unwrap().sample_rate_hz, 60);
        assert_eq!(source.header().unwrap().source, "");
        assert_eq!(source.len(), 2);

        assert_eq!(source.poll().unwrap().unwrap().timestamp_ns, 16_666_666);
        assert!(!source.is_finished());
        assert_eq!(source.poll().unwrap().unwrap().timestamp_ns, 33_333_333);
        assert!(source.is_finished());
        assert!(source.poll().unwrap().is_none());
    }

    #[test]
    fn test_replay_missing_file() {
        let err = ReplaySource::open(Path::new("/nonexistent/gazelink/stream.jsonl")).unwrap_err();
        assert!(matches!(err, GazelinkError::FileNotFound { .. }));
    }

    #[test]
    fn test_stub_source() {
        let mut stub = StubSource::new(vec![]);
        assert!(stub.is_finished());
        assert!(stub.poll().unwrap().is_none());
        assert!(!StubSource::unavailable().is_available());
    }
}

//! Face-tracking sample types and the JSONL sample stream format.
//!
//! One [`RawSample`] is produced per tracking frame by the face-tracking
//! collaborator. Streams are stored append-only, one JSON object per line,
//! with an optional `# {header}` comment as the first line.

use serde::{Deserialize, Serialize};

use crate::geometry::{Vec2, Vec3};

/// Monotonic timestamp in nanoseconds since the session epoch.
pub type TimestampNs = u64;

/// Current schema version of recorded sample streams.
pub const SAMPLE_SCHEMA_VERSION: &str = "1.0";

/// A single face-tracking measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    /// Monotonic nanoseconds since session start.
    #[serde(rename = "t")]
    pub timestamp_ns: TimestampNs,

    /// Gaze direction in face-relative units (unbounded).
    pub gaze: Vec2,

    /// Left eye closure blend shape `[0, 1]`.
    pub eye_blink_left: f32,

    /// Right eye closure blend shape `[0, 1]`.
    pub eye_blink_right: f32,

    /// Jaw opening blend shape `[0, 1]`.
    pub jaw_open: f32,

    /// Head translation in meters.
    pub head_position: Vec3,
}

impl RawSample {
    /// Create a sample with open eyes and a closed mouth.
    pub fn new(timestamp_ns: TimestampNs, gaze: Vec2, head_position: Vec3) -> Self {
        Self {
            timestamp_ns,
            gaze,
            eye_blink_left: 0.0,
            eye_blink_right: 0.0,
            jaw_open: 0.0,
            head_position,
        }
    }

    /// Set both eye-closure channels.
    pub fn with_blink(mut self, left: f32, right: f32) -> Self {
        self.eye_blink_left = left;
        self.eye_blink_right = right;
        self
    }

    /// Set the jaw-open channel.
    pub fn with_jaw_open(mut self, jaw_open: f32) -> Self {
        self.jaw_open = jaw_open;
        self
    }

    /// Both eyes closed past `threshold`. A single occluded eye never counts.
    pub fn eyes_closed(&self, threshold: f32) -> bool {
        self.eye_blink_left > threshold && self.eye_blink_right > threshold
    }

    /// Jaw opened past `threshold`.
    pub fn mouth_open(&self, threshold: f32) -> bool {
        self.jaw_open > threshold
    }

    /// Timestamp as fractional seconds since session start.
    pub fn timestamp_secs(&self) -> f64 {
        self.timestamp_ns as f64 / 1_000_000_000.0
    }
}

/// Metadata written as the first line of a recorded stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleStreamHeader {
    /// Schema version for forward compatibility.
    pub schema_version: String,

    /// Wall-clock time at session start (ISO 8601).
    pub epoch_wall: String,

    /// Nominal sample rate (Hz).
    pub sample_rate_hz: u32,

    /// Name of the source that produced the samples.
    #[serde(default)]
    pub source: String,
}

impl SampleStreamHeader {
    pub fn new(epoch_wall: impl Into<String>, sample_rate_hz: u32, source: impl Into<String>) -> Self {
        Self {
            schema_version: SAMPLE_SCHEMA_VERSION.to_string(),
            epoch_wall: epoch_wall.into(),
            sample_rate_hz,
            source: source.into(),
        }
    }
}

/// Parse the `# {header}` comment line of a recorded stream, if present.
pub fn parse_header(jsonl: &str) -> Option<SampleStreamHeader> {
    let first = jsonl.lines().map(str::trim).find(|line| !line.is_empty())?;
    let json = first.strip_prefix('#')?.trim();
    serde_json::from_str(json).ok()
}

/// Parse samples from JSONL content (one JSON object per line).
/// Blank lines and `#` comment lines are skipped.
pub fn parse_samples(jsonl: &str) -> Result<Vec<RawSample>, serde_json::Error> {
    jsonl
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(serde_json::from_str)
        .collect()
}

/// Serialize samples to JSONL format.
pub fn serialize_samples(samples: &[RawSample]) -> Result<String, serde_json::Error> {
    let mut output = String::new();
    for sample in samples {
        output.push_str(&serde_json::to_string(sample)?);
        output.push('\n');
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eyes_closed_requires_both_channels() {
        let both = RawSample::new(0, Vec2::ZERO, Vec3::ZERO).with_blink(0.95, 0.92);
        assert!(both.eyes_closed(0.9));

        let one = RawSample::new(0, Vec2::ZERO, Vec3::ZERO).with_blink(1.0, 0.5);
        assert!(!one.eyes_closed(0.9));

        // Average would be 0.925 but the right eye is not past the threshold.
        let avg = RawSample::new(0, Vec2::ZERO, Vec3::ZERO).with_blink(0.96, 0.89);
        assert!(!avg.eyes_closed(0.9));
    }

    #[test]
    fn test_mouth_open_threshold() {
        let sample = RawSample::new(0, Vec2::ZERO, Vec3::ZERO).with_jaw_open(0.6);
        assert!(sample.mouth_open(0.5));
        assert!(!sample.mouth_open(0.7));
    }

    #[test]
    fn test_json_format_uses_short_timestamp_key() {
        let sample = RawSample::new(1_000_000_000, Vec2::new(0.1, -0.05), Vec3::ZERO);
        let json = serde_json::to_string(&sample).unwrap();
        assert!(json.contains("\"t\":1000000000"));
        assert!(json.contains("\"gaze\":{\"x\":0.1,\"y\":-0.05}"));
    }

    #[test]
    fn test_parse_samples_skips_header_comment() {
        let header = SampleStreamHeader::new("2026-01-01T00:00:00Z", 60, "synthetic");
        let mut jsonl = format!("# {}\n", serde_json::to_string(&header).unwrap());
        jsonl.push_str(
            &serialize_samples(&[
                RawSample::new(0, Vec2::ZERO, Vec3::ZERO),
                RawSample::new(16_666_666, Vec2::new(0.2, 0.1), Vec3::ZERO).with_jaw_open(0.8),
            ])
            .unwrap(),
        );

        let parsed = parse_samples(&jsonl).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].jaw_open, 0.8);

        let parsed_header = parse_header(&jsonl).unwrap();
        assert_eq!(parsed_header.sample_rate_hz, 60);
        assert_eq!(parsed_header.source, "synthetic");
    }

    #[test]
    fn test_parse_header_absent() {
        let jsonl = serialize_samples(&[RawSample::new(0, Vec2::ZERO, Vec3::ZERO)]).unwrap();
        assert!(parse_header(&jsonl).is_none());
    }

    #[test]
    fn test_timestamp_secs() {
        let sample = RawSample::new(1_500_000_000, Vec2::ZERO, Vec3::ZERO);
        assert!((sample.timestamp_secs() - 1.5).abs() < 1e-9);
    }
}

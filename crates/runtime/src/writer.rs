//! Append-only sample recorder.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use gazelink_common::error::{GazelinkError, GazelinkResult};
use gazelink_tracking_model::sample::{RawSample, SampleStreamHeader};

/// Writes samples to a JSONL file, header first.
pub struct SampleWriter {
    writer: BufWriter<File>,
    path: PathBuf,
    samples_written: u64,
}

impl SampleWriter {
    /// Create (or truncate) `path` and write the header line.
    pub fn create(path: impl Into<PathBuf>, header: &SampleStreamHeader) -> GazelinkResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;
        let mut writer = BufWriter::new(file);

        let header_json = serde_json::to_string(header)?;
        writeln!(writer, "# {header_json}")
            .map_err(|e| GazelinkError::tracking(format!("Failed to write header: {e}")))?;

        Ok(Self {
            writer,
            path,
            samples_written: 0,
        })
    }

    pub fn write_sample(&mut self, sample: &RawSample) -> GazelinkResult<()> {
        let json = serde_json::to_string(sample)?;
        writeln!(self.writer, "{json}")
            .map_err(|e| GazelinkError::tracking(format!("Failed to write sample: {e}")))?;
        self.samples_written += 1;

        if self.samples_written % 1000 == 0 {
            self.flush()?;
        }
        Ok(())
    }

    pub fn write_all(&mut self, samples: &[RawSample]) -> GazelinkResult<()> {
        samples.iter().try_for_each(|s| self.write_sample(s))
    }

    pub fn flush(&mut self) -> GazelinkResult<()> {
        self.writer
            .flush()
            .map_err(|e| GazelinkError::tracking(format!("Failed to flush samples: {e}")))
    }

    pub fn samples_written(&self) -> u64 {
        self.samples_written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SampleWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

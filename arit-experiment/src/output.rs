use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use arit_core::TrialRecord;
use chrono::{DateTime, Local};
use tracing::info;

use crate::config::OutputFormat;
use crate::error::OutputError;

/// Destination for per-trial records
pub trait RecordSink {
    fn write_record(&mut self, record: &TrialRecord) -> Result<(), OutputError>;
}

impl RecordSink for Vec<TrialRecord> {
    fn write_record(&mut self, record: &TrialRecord) -> Result<(), OutputError> {
        self.push(record.clone());
        Ok(())
    }
}

/// Append-only delimited trial log. Each record is flushed as it is written.
pub struct OutputWriter {
    path: PathBuf,
    writer: csv::Writer<File>,
}

impl OutputWriter {
    /// `<dir>/<participant>_ARIT_<yyyy_mm_dd_HHMM>.<ext>`
    pub fn session_path(
        dir: &Path,
        participant_id: &str,
        format: OutputFormat,
        started: DateTime<Local>,
    ) -> PathBuf {
        dir.join(format!(
            "{}_ARIT_{}.{}",
            participant_id,
            started.format("%Y_%m_%d_%H%M"),
            format.extension()
        ))
    }

    /// Opens `path` for appending, writing the header only if the file is new.
    pub fn open<P: AsRef<Path>>(path: P, format: OutputFormat) -> Result<Self, OutputError> {
        let path = path.as_ref().to_path_buf();
        let open_err = |source| OutputError::Open {
            path: path.clone(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(open_err)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(open_err)?;
        let is_new = file.metadata().map_err(open_err)?.len() == 0;

        let mut writer = csv::WriterBuilder::new()
            .delimiter(format.delimiter())
            .has_headers(false)
            .from_writer(file);
        if is_new {
            writer.write_record(TrialRecord::HEADER)?;
            writer.flush()?;
        }
        info!(path = %path.display(), "writing trial records");
        Ok(Self { path, writer })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSink for OutputWriter {
    fn write_record(&mut self, record: &TrialRecord) -> Result<(), OutputError> {
        self.writer.serialize(record)?;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arit_core::{OutcomeCategory, Signal, TrialOutcome};
    use chrono::TimeZone;

    fn record(signal: Signal, category: OutcomeCategory, ssd: Option<f64>, rt: Option<f64>) -> TrialRecord {
        let outcome = TrialOutcome {
            signal,
            category,
            response_lifted: rt.is_some(),
            reaction_time: rt,
            effective_stop_delay: ssd,
            proximity: None,
        };
        TrialRecord::new("P01", 2, "testBlocks", 5, &outcome)
    }

    #[test]
    fn writes_header_once_and_nan_sentinels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("P01.txt");

        let mut writer = OutputWriter::open(&path, OutputFormat::Tsv).unwrap();
        writer
            .write_record(&record(Signal::Go, OutcomeCategory::CorrectGo, None, Some(0.812)))
            .unwrap();
        drop(writer);

        let mut writer = OutputWriter::open(&path, OutputFormat::Tsv).unwrap();
        writer
            .write_record(&record(Signal::Stop, OutcomeCategory::CorrectStop, Some(0.525), None))
            .unwrap();
        drop(writer);

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "id\tblock\ttrialType\ttrial\tsignal\tresponse\tcorrect\toutcome\tssd\trt",
                "P01\t2\ttestBlocks\t5\t0\t1\t1\tcorrectGo\tNaN\t0.812",
                "P01\t2\ttestBlocks\t5\t1\t0\t2\tcorrectStop\t0.525\tNaN",
            ]
        );
    }

    #[test]
    fn csv_format_uses_commas() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("P01.csv");
        let mut writer = OutputWriter::open(&path, OutputFormat::Csv).unwrap();
        writer
            .write_record(&record(Signal::Go, OutcomeCategory::Omission, None, None))
            .unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(
            text.lines().nth(1),
            Some("P01,2,testBlocks,5,0,0,-1,omission,NaN,NaN")
        );
    }

    #[test]
    fn session_path_names_participant_and_time() {
        let started = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap();
        let path = OutputWriter::session_path(Path::new("data"), "0042", OutputFormat::Tsv, started);
        assert_eq!(path, Path::new("data").join("0042_ARIT_2024_03_09_1405.txt"));
    }
}

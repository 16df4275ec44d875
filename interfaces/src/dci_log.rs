//! DCI Record Sinks
//!
//! Finalized grants leave the core through a [`DciSink`]; the file sink writes
//! one tab-separated line per record.

use crate::message_types::DciRecord;
use crate::InterfaceError;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Destination for finalized DCI records
pub trait DciSink: Send {
    /// Append one record
    fn write_record(&mut self, record: &DciRecord) -> Result<(), InterfaceError>;

    /// Flush buffered records
    fn flush(&mut self) -> Result<(), InterfaceError> {
        Ok(())
    }
}

/// Tab-separated file sink
pub struct TsvFileSink {
    path: PathBuf,
    writer: BufWriter<File>,
    records: u64,
}

impl TsvFileSink {
    /// Create (truncate) the file and write the column header
    pub fn create(path: impl AsRef<Path>) -> Result<Self, InterfaceError> {
        let path = path.as_ref().to_path_buf();
        let mut writer = BufWriter::new(File::create(&path)?);
        writeln!(writer, "{}", DciRecord::HEADER)?;
        info!("Writing DCI records to {}", path.display());

        Ok(Self {
            path,
            writer,
            records: 0,
        })
    }

    /// Records written so far
    pub fn records(&self) -> u64 {
        self.records
    }
}

impl DciSink for TsvFileSink {
    fn write_record(&mut self, record: &DciRecord) -> Result<(), InterfaceError> {
        writeln!(self.writer, "{}", record.to_tsv())?;
        self.records += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), InterfaceError> {
        self.writer.flush()?;
        debug!("Flushed {} DCI records to {}", self.records, self.path.display());
        Ok(())
    }
}

impl Drop for TsvFileSink {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

/// In-memory sink, handy for tests and offline analysis
#[derive(Debug, Default)]
pub struct MemorySink {
    pub records: Vec<DciRecord>,
}

impl DciSink for MemorySink {
    fn write_record(&mut self, record: &DciRecord) -> Result<(), InterfaceError> {
        self.records.push(record.clone());
        Ok(())
    }
}

/// Forwards every record to each inner sink; with no sinks records are dropped
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Box<dyn DciSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Box<dyn DciSink>>) -> Self {
        Self { sinks }
    }

    pub fn push(&mut self, sink: Box<dyn DciSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl DciSink for FanoutSink {
    /// Writes to every sink, reporting the first failure
    fn write_record(&mut self, record: &DciRecord) -> Result<(), InterfaceError> {
        let mut first_error = None;
        for sink in &mut self.sinks {
            if let Err(e) = sink.write_record(record) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn flush(&mut self) -> Result<(), InterfaceError> {
        for sink in &mut self.sinks {
            sink.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(tti: u32) -> DciRecord {
        DciRecord {
            tti,
            rnti: 100,
            nof_prb: 6,
            mcs_tb1: 4,
            mcs_tb2: 0,
            tbs_tb1: 336,
            tbs_tb2: 0,
            tbs_hm_tb1: 480,
            tbs_hm_tb2: 0,
            decode_prob: 100.0,
            l: 0,
            ncce: 3,
            max_freq_rnti: 100,
            max_dl_freq_rnti: 100,
            max_ul_freq_rnti: 0,
            nof_active_ue: 1,
            active: true,
            my_dl_cnt: 1,
            my_ul_cnt: 0,
            format: "1A".to_string(),
        }
    }

    #[test]
    fn test_tsv_file_sink() {
        let path = std::env::temp_dir().join(format!("dci_sink_{}.tsv", std::process::id()));
        {
            let mut sink = TsvFileSink::create(&path).unwrap();
            sink.write_record(&record(10)).unwrap();
            sink.write_record(&record(11)).unwrap();
            sink.flush().unwrap();
            assert_eq!(sink.records(), 2);
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], DciRecord::HEADER);
        assert!(lines[2].starts_with("11\t100\t6\t"));
        let _ = std::fs::remove_file(&path);
    }

    struct FailingSink;

    impl DciSink for FailingSink {
        fn write_record(&mut self, _record: &DciRecord) -> Result<(), InterfaceError> {
            Err(InterfaceError::NotInitialized)
        }
    }

    #[test]
    fn test_fanout_reaches_every_sink() {
        let sinks: Vec<Box<dyn DciSink>> =
            vec![Box::new(FailingSink), Box::new(MemorySink::default())];
        let mut fanout = FanoutSink::new(sinks);
        assert_eq!(fanout.len(), 2);
        assert!(fanout.write_record(&record(3)).is_err());
        assert!(fanout.flush().is_ok());

        let mut empty = FanoutSink::default();
        assert!(empty.is_empty());
        assert!(empty.write_record(&record(4)).is_ok());
    }
}

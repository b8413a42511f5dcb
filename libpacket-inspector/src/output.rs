use crate::tcp_reassembly::StreamReport;
use libinspector_tools::{Config, Error};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Mutex;

/// Name of the stream summary written on teardown
pub const STREAMS_FILE: &str = "streams.json";

/// Get the base prefix of output directory (or "." if not specified)
pub fn get_output_dir(config: &Config) -> &str {
    config.get("output_dir").unwrap_or(".")
}

/// Create a file to output data
pub fn create_file<P: AsRef<str>>(base: &str, filename: P) -> Result<File, io::Error> {
    let mut path = PathBuf::from(base);
    path.push(filename.as_ref());
    File::create(path)
}

/// Write all stream reports as a JSON array in `<base>/streams.json`
pub fn write_stream_reports(base: &str, reports: &[StreamReport]) -> Result<(), Error> {
    let file = create_file(base, STREAMS_FILE)?;
    let mut w = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut w, reports).map_err(io::Error::from)?;
    w.flush()?;
    info!("wrote {} stream reports to {}/{}", reports.len(), base, STREAMS_FILE);
    Ok(())
}

/// Destination of readable dumps
///
/// Implementations are called concurrently by workers, each call carrying a
/// complete dump which must not be interleaved with another one.
pub trait ReportSink: Send + Sync {
    /// Dump of one captured frame
    fn frame(&self, index: usize, text: &str);

    /// Dump of one reassembled stream
    fn stream(&self, report: &StreamReport, text: &str);
}

/// Print dumps on standard output, separated by an empty line
#[derive(Default)]
pub struct StdoutSink;

impl StdoutSink {
    fn print(text: &str) {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        if let Err(e) = writeln!(out, "{}", text) {
            debug!("could not write to stdout: {}", e);
        }
    }
}

impl ReportSink for StdoutSink {
    fn frame(&self, _index: usize, text: &str) {
        StdoutSink::print(text);
    }

    fn stream(&self, _report: &StreamReport, text: &str) {
        StdoutSink::print(text);
    }
}

/// Keep every dump in memory
#[derive(Default)]
pub struct CollectingSink {
    frames: Mutex<Vec<(usize, String)>>,
    streams: Mutex<Vec<(StreamReport, String)>>,
}

impl CollectingSink {
    /// Frame dumps, sorted by frame index
    pub fn frames(&self) -> Vec<(usize, String)> {
        let mut v = match self.frames.lock() {
            Ok(v) => v.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        v.sort_by_key(|(i, _)| *i);
        v
    }

    /// Stream dumps, in flush order
    pub fn streams(&self) -> Vec<(StreamReport, String)> {
        match self.streams.lock() {
            Ok(v) => v.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ReportSink for CollectingSink {
    fn frame(&self, index: usize, text: &str) {
        if let Ok(mut v) = self.frames.lock() {
            v.push((index, text.to_owned()));
        }
    }

    fn stream(&self, report: &StreamReport, text: &str) {
        if let Ok(mut v) = self.streams.lock() {
            v.push((report.clone(), text.to_owned()));
        }
    }
}

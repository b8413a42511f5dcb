use crate::dissector::{render_frame, render_stream, Dissector};
use crate::layer::Layer;
use crate::output::{write_stream_reports, ReportSink};
use crate::registry::Registry;
use crate::segment::extract_tcp_segment;
use crate::tcp_reassembly::{CompletedStream, StreamReport, TcpStreamReassembly};
use libinspector_tools::{Config, Duration, Error, Frame, FrameAnalyzer};
use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// `[reassembly]` section of the configuration
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReassemblyConfig {
    pub enabled: bool,
    /// Seconds without segment before a stream is flushed
    pub idle_timeout: u32,
    /// Seconds of capture time between two idle sweeps
    pub flush_interval: u32,
}

impl Default for ReassemblyConfig {
    fn default() -> Self {
        ReassemblyConfig {
            enabled: true,
            idle_timeout: 30 * 60,
            flush_interval: 30,
        }
    }
}

impl ReassemblyConfig {
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let section = config
            .get_section::<ReassemblyConfig, _>("reassembly")
            .map_err(|e| Error::Config(format!("invalid [reassembly] section: {}", e)))?;
        Ok(section.unwrap_or_default())
    }
}

/// Schedules idle sweeps on capture time
#[derive(Debug)]
pub(crate) struct IdleSweep {
    interval: Duration,
    next: Option<Duration>,
}

impl IdleSweep {
    pub(crate) fn new(interval: Duration) -> Self {
        IdleSweep {
            interval,
            next: None,
        }
    }

    /// Returns true if a sweep must run at time `now`
    pub(crate) fn due(&mut self, now: Duration) -> bool {
        match self.next {
            None => {
                self.next = Some(now + self.interval);
                false
            }
            Some(next) if now >= next => {
                self.next = Some(now + self.interval);
                true
            }
            Some(_) => false,
        }
    }
}

#[derive(Default)]
struct Stats {
    frames: AtomicUsize,
    unresolved_frames: AtomicUsize,
    streams: AtomicUsize,
    unresolved_streams: AtomicUsize,
}

/// Frame processing shared by the analyzers
///
/// Dissects frames and prints them, feeds TCP segments to the reassembly
/// table, and dissects every stream it flushes. The table is behind a mutex,
/// so an `Inspector` can be shared by worker threads; application probing of a
/// flushed stream runs outside the lock.
pub struct Inspector {
    dissector: Dissector,
    sink: Arc<dyn ReportSink>,
    reassembly: Option<Mutex<TcpStreamReassembly>>,
    reports: Mutex<Vec<StreamReport>>,
    stats: Stats,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // a panic in a worker is caught and logged, keep using the data
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl Inspector {
    pub fn new(
        registry: Arc<Registry>,
        reassembly: &ReassemblyConfig,
        sink: Arc<dyn ReportSink>,
    ) -> Self {
        let reassembly = if reassembly.enabled {
            let timeout = Duration::from_secs(reassembly.idle_timeout);
            Some(Mutex::new(TcpStreamReassembly::new(timeout)))
        } else {
            None
        };
        Inspector {
            dissector: Dissector::new(registry),
            sink,
            reassembly,
            reports: Mutex::new(Vec::new()),
            stats: Stats::default(),
        }
    }

    pub fn dissector(&self) -> &Dissector {
        &self.dissector
    }

    /// Dissect and print one frame, then merge its TCP segment (if any)
    pub fn process(&self, frame: &Frame) {
        self.stats.frames.fetch_add(1, Ordering::Relaxed);
        let datalink = self.dissector.dissect_frame(frame.link_type, &frame.data);
        match datalink {
            Some(ref d) => trace!("idx={}: {}", frame.index, d.innermost_name()),
            None => {
                debug!("idx={}: data-link layer not resolved", frame.index);
                self.stats.unresolved_frames.fetch_add(1, Ordering::Relaxed);
            }
        }
        let text = render_frame(&frame.data, datalink.as_ref());
        self.sink.frame(frame.index, &text);

        if let Some(ref table) = self.reassembly {
            if let Some(segment) = extract_tcp_segment(frame) {
                let done = lock(table).update(&segment);
                self.finish_streams(done);
            }
        }
    }

    /// Flush streams idle at capture time `now`
    pub fn flush_idle(&self, now: Duration) {
        if let Some(ref table) = self.reassembly {
            let done = lock(table).flush_older_than(now);
            self.finish_streams(done);
        }
    }

    /// Flush every remaining stream
    pub fn flush_all(&self) {
        if let Some(ref table) = self.reassembly {
            let done = lock(table).flush_all();
            self.finish_streams(done);
        }
    }

    fn finish_streams(&self, done: Vec<CompletedStream>) {
        for stream in done {
            self.finish_stream(stream);
        }
    }

    /// Probe a flushed stream, print it and record its report
    fn finish_stream(&self, stream: CompletedStream) {
        self.stats.streams.fetch_add(1, Ordering::Relaxed);
        if stream.data.is_empty() {
            debug!("stream {} closed ({}) without payload", stream.key, stream.reason);
            lock(&self.reports).push(StreamReport::new(&stream, None));
            return;
        }
        let application = self.dissector.dissect_stream(&stream.data);
        if application.is_none() {
            self.stats.unresolved_streams.fetch_add(1, Ordering::Relaxed);
        }
        let report = StreamReport::new(&stream, application.as_ref().map(|a| a.name()));
        debug!(
            "stream {} closed ({}): {} bytes, {} segments",
            stream.key,
            stream.reason,
            stream.data.len(),
            stream.segments
        );
        let text = render_stream(&stream.data, application.as_ref());
        self.sink.stream(&report, &text);
        lock(&self.reports).push(report);
    }

    /// Reports of all streams flushed so far, in flush order
    pub fn reports(&self) -> Vec<StreamReport> {
        lock(&self.reports).clone()
    }

    /// Number of streams still open
    pub fn open_streams(&self) -> usize {
        self.reassembly.as_ref().map_or(0, |t| lock(t).len())
    }

    pub(crate) fn log_stats(&self) {
        info!(
            "{} frames ({} unresolved), {} streams ({} unresolved)",
            self.stats.frames.load(Ordering::Relaxed),
            self.stats.unresolved_frames.load(Ordering::Relaxed),
            self.stats.streams.load(Ordering::Relaxed),
            self.stats.unresolved_streams.load(Ordering::Relaxed),
        );
    }

    /// Final flush, then write `streams.json` if `output_dir` is set
    pub(crate) fn finish(&self, output_dir: Option<&str>) {
        self.flush_all();
        self.log_stats();
        if let (Some(dir), Some(_)) = (output_dir, self.reassembly.as_ref()) {
            if let Err(e) = write_stream_reports(dir, &self.reports()) {
                warn!("could not write stream reports: {}", e);
            }
        }
    }
}

/// Single-threaded analyzer
///
/// Frames are handled in capture order on the calling thread.
pub struct Analyzer {
    inspector: Inspector,
    sweep: IdleSweep,
    output_dir: Option<String>,
}

impl Analyzer {
    pub fn new(
        registry: Arc<Registry>,
        config: &Config,
        sink: Arc<dyn ReportSink>,
    ) -> Result<Self, Error> {
        let reassembly = ReassemblyConfig::from_config(config)?;
        let sweep = IdleSweep::new(Duration::from_secs(reassembly.flush_interval));
        Ok(Analyzer {
            inspector: Inspector::new(registry, &reassembly, sink),
            sweep,
            output_dir: config.get("output_dir").map(String::from),
        })
    }

    pub fn inspector(&self) -> &Inspector {
        &self.inspector
    }
}

impl FrameAnalyzer for Analyzer {
    fn handle_frame(&mut self, frame: Frame) -> Result<(), Error> {
        if self.sweep.due(frame.ts) {
            trace!("idle sweep at {}", frame.ts);
            self.inspector.flush_idle(frame.ts);
        }
        self.inspector.process(&frame);
        Ok(())
    }

    fn teardown(&mut self) {
        self.inspector.finish(self.output_dir.as_deref());
    }
}

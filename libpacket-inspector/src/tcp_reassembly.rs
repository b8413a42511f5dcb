use crate::segment::TcpSegment;
use fnv::FnvHashMap;
use libinspector_tools::{Duration, FlowKey};
use serde::Serialize;
use std::fmt;

/// Default delay after which an inactive stream is flushed
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Why a stream was flushed
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CloseReason {
    Fin,
    Rst,
    /// No segment for longer than the idle timeout
    Idle,
    /// End of capture
    Teardown,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CloseReason::Fin => "FIN",
            CloseReason::Rst => "RST",
            CloseReason::Idle => "idle",
            CloseReason::Teardown => "teardown",
        };
        f.write_str(s)
    }
}

/// Reassembly state of one direction of a connection
#[derive(Debug)]
struct StreamState {
    data: Vec<u8>,
    first_seen: Duration,
    last_seen: Duration,
    first_index: usize,
    segments: usize,
}

impl StreamState {
    fn new(segment: &TcpSegment) -> Self {
        StreamState {
            data: Vec::new(),
            first_seen: segment.ts,
            last_seen: segment.ts,
            first_index: segment.index,
            segments: 0,
        }
    }

    fn push(&mut self, segment: &TcpSegment) {
        // arrival order, no resequencing
        self.data.extend_from_slice(&segment.data);
        if segment.ts > self.last_seen {
            self.last_seen = segment.ts;
        } else if segment.ts < self.last_seen {
            debug!("segment received in past of stream idx={}", segment.index);
        }
        self.segments += 1;
    }

    fn complete(self, key: FlowKey, reason: CloseReason) -> CompletedStream {
        CompletedStream {
            key,
            data: self.data,
            first_seen: self.first_seen,
            last_seen: self.last_seen,
            first_index: self.first_index,
            segments: self.segments,
            reason,
        }
    }
}

/// A flushed stream: all payload bytes of one direction, in arrival order
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletedStream {
    pub key: FlowKey,
    pub data: Vec<u8>,
    pub first_seen: Duration,
    pub last_seen: Duration,
    /// Index of the frame which opened the stream
    pub first_index: usize,
    pub segments: usize,
    pub reason: CloseReason,
}

/// Summary of a flushed stream, as written to `streams.json`
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StreamReport {
    pub flow: FlowKey,
    pub first_seen: Duration,
    pub last_seen: Duration,
    pub bytes: usize,
    pub segments: usize,
    pub close_reason: CloseReason,
    /// Application protocol recognized in the stream, if any
    pub protocol: Option<&'static str>,
}

impl StreamReport {
    pub fn new(stream: &CompletedStream, protocol: Option<&'static str>) -> Self {
        StreamReport {
            flow: stream.key,
            first_seen: stream.first_seen,
            last_seen: stream.last_seen,
            bytes: stream.data.len(),
            segments: stream.segments,
            close_reason: stream.reason,
            protocol,
        }
    }
}

/// Table of open TCP streams
///
/// Every stream is returned exactly once: on FIN or RST, when idle for longer
/// than `timeout`, or by `flush_all`. Once returned, its state is gone and a
/// later segment with the same key opens a new stream.
pub struct TcpStreamReassembly {
    m: FnvHashMap<FlowKey, StreamState>,
    pub timeout: Duration,
}

impl Default for TcpStreamReassembly {
    fn default() -> Self {
        TcpStreamReassembly::new(DEFAULT_IDLE_TIMEOUT)
    }
}

impl TcpStreamReassembly {
    pub fn new(timeout: Duration) -> Self {
        TcpStreamReassembly {
            m: FnvHashMap::default(),
            timeout,
        }
    }

    /// Number of open streams
    pub fn len(&self) -> usize {
        self.m.len()
    }

    pub fn is_empty(&self) -> bool {
        self.m.is_empty()
    }

    pub fn contains(&self, key: &FlowKey) -> bool {
        self.m.contains_key(key)
    }

    /// Merge a segment into its stream
    ///
    /// Returns the streams completed by this segment: the previous stream for
    /// the same key if it had already expired, and the current one if the
    /// segment carries FIN or RST.
    pub fn update(&mut self, segment: &TcpSegment) -> Vec<CompletedStream> {
        trace!("stream {} idx={} len={}", segment.key, segment.index, segment.data.len());
        let mut done = Vec::new();
        let expired = self
            .m
            .get(&segment.key)
            .map_or(false, |s| segment.ts - s.last_seen > self.timeout);
        if expired {
            warn!("TCP stream received packet after timeout ({})", segment.key);
            if let Some(stream) = self.m.remove(&segment.key) {
                done.push(stream.complete(segment.key, CloseReason::Idle));
            }
        }
        let stream = self
            .m
            .entry(segment.key)
            .or_insert_with(|| StreamState::new(segment));
        stream.push(segment);
        debug_print_close_flags(segment);
        if segment.is_closing() {
            let reason = if segment.rst {
                CloseReason::Rst
            } else {
                CloseReason::Fin
            };
            if let Some(stream) = self.m.remove(&segment.key) {
                done.push(stream.complete(segment.key, reason));
            }
        }
        done
    }

    /// Flush every stream without activity for longer than `timeout`, at time `now`
    pub fn flush_older_than(&mut self, now: Duration) -> Vec<CompletedStream> {
        let timeout = self.timeout;
        let expired: Vec<FlowKey> = self
            .m
            .iter()
            .filter(|(_, s)| now - s.last_seen > timeout)
            .map(|(k, _)| *k)
            .collect();
        let mut done: Vec<_> = expired
            .into_iter()
            .filter_map(|k| {
                warn!("TCP stream timeout reached for flow {}", k);
                self.m.remove(&k).map(|s| s.complete(k, CloseReason::Idle))
            })
            .collect();
        done.sort_by_key(|s| s.first_index);
        done
    }

    /// Flush every open stream, in the order they were opened
    pub fn flush_all(&mut self) -> Vec<CompletedStream> {
        if !self.m.is_empty() {
            debug!("expiring all {} TCP streams", self.m.len());
        }
        let mut done: Vec<_> = self
            .m
            .drain()
            .map(|(k, s)| s.complete(k, CloseReason::Teardown))
            .collect();
        done.sort_by_key(|s| s.first_index);
        done
    }
}

fn debug_print_close_flags(segment: &TcpSegment) {
    if log::Level::Trace <= log::STATIC_MAX_LEVEL && segment.is_closing() {
        let mut s = String::from("tcp_flags: [");
        if segment.fin {
            s += "F"
        }
        if segment.rst {
            s += "R"
        }
        s += "]";
        trace!("{}", s);
    }
}

use crate::analyzer::{IdleSweep, Inspector, ReassemblyConfig};
use crate::output::ReportSink;
use crate::registry::Registry;
use crossbeam_channel::{bounded, Receiver, Sender};
use fnv::FnvHasher;
use libinspector_tools::{Config, Duration, Error, Frame, FrameAnalyzer, Linktype};
use pnet_packet::ethernet::{EtherType, EtherTypes};
use std::hash::Hasher;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Barrier};
use std::thread;

/// Default capacity of each worker's job queue
pub const DEFAULT_JOB_QUEUE_SIZE: usize = 1024;

pub enum Job {
    Exit,
    PrintDebug,
    New(Frame),
    Wait,
}

pub struct Worker {
    pub(crate) _id: usize,
    pub(crate) handler: thread::JoinHandle<()>,
}

/// Multi-threaded analyzer
///
/// Frames are dispatched to a fixed pool of workers, each owning a bounded
/// job queue. The worker is chosen from the IP address pair regardless of
/// direction, so every segment of a connection is handled by the same worker,
/// in capture order.
pub struct ThreadedAnalyzer {
    inspector: Arc<Inspector>,
    n_workers: usize,
    queue_size: usize,
    sweep: IdleSweep,
    output_dir: Option<String>,

    local_jobs: Vec<Sender<Job>>,
    workers: Vec<Worker>,
    barrier: Arc<Barrier>,
    /// some workers are parked on a barrier which will never be released
    desynchronized: bool,
}

impl ThreadedAnalyzer {
    pub fn new(
        registry: Arc<Registry>,
        config: &Config,
        sink: Arc<dyn ReportSink>,
    ) -> Result<Self, Error> {
        let reassembly = ReassemblyConfig::from_config(config)?;
        let n_workers = match config.get_usize("num_threads") {
            Some(0) | None => num_cpus::get(),
            Some(n) => n,
        };
        let queue_size = config
            .get_usize("job_queue_size")
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_JOB_QUEUE_SIZE);
        let barrier = Arc::new(Barrier::new(n_workers + 1));
        Ok(ThreadedAnalyzer {
            inspector: Arc::new(Inspector::new(registry, &reassembly, sink)),
            n_workers,
            queue_size,
            sweep: IdleSweep::new(Duration::from_secs(reassembly.flush_interval)),
            output_dir: config.get("output_dir").map(String::from),
            local_jobs: Vec::new(),
            workers: Vec::new(),
            barrier,
            desynchronized: false,
        })
    }

    pub fn inspector(&self) -> &Inspector {
        &self.inspector
    }

    pub fn num_workers(&self) -> usize {
        self.n_workers
    }

    /// Block until every worker has processed all of its queued jobs
    ///
    /// If a worker is gone, the barrier can not be filled: job queues are
    /// closed, and the pool stops accepting frames.
    fn wait_for_empty_jobs(&mut self) {
        if self.local_jobs.len() < self.n_workers {
            // not started, or already desynchronized
            return;
        }
        trace!("waiting for threads to finish processing");
        let lost = self
            .local_jobs
            .iter()
            .position(|job| job.send(Job::Wait).is_err());
        if let Some(i) = lost {
            warn!("could not synchronize workers: worker {} is gone", i);
            // workers before `i` are parked on the barrier
            self.desynchronized |= i > 0;
            // the others see their queue closed and exit
            self.local_jobs.clear();
            return;
        }
        self.barrier.wait();
    }

    fn dispatch(&self, frame: Frame) -> Result<(), Error> {
        let i = fan_out(&frame, self.n_workers);
        debug_assert!(i < self.n_workers);
        trace!("idx={} -> worker {}", frame.index, i);
        let job = self
            .local_jobs
            .get(i)
            .ok_or(Error::Generic("worker pool is not running"))?;
        job.send(Job::New(frame))
            .or(Err(Error::Generic("worker job queue closed")))
    }
}

fn worker_loop(i: usize, r: Receiver<Job>, inspector: Arc<Inspector>, barrier: Arc<Barrier>) {
    let _span = tracing::debug_span!("worker", id = i).entered();
    debug!("worker thread {} starting", i);
    let mut handled = 0usize;
    while let Ok(msg) = r.recv() {
        match msg {
            Job::Exit => break,
            Job::PrintDebug => {
                debug!("thread {}: {} frames handled", i, handled);
            }
            Job::New(frame) => {
                handled += 1;
                let index = frame.index;
                let res = panic::catch_unwind(AssertUnwindSafe(|| inspector.process(&frame)));
                if let Err(panic) = res {
                    let msg = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_default();
                    warn!("thread {} panicked (idx={}): {}", i, index, msg);
                }
            }
            Job::Wait => {
                trace!("Thread {}: waiting at barrier", i);
                barrier.wait();
            }
        }
    }
    debug!("worker thread {} exiting", i);
}

impl FrameAnalyzer for ThreadedAnalyzer {
    fn init(&mut self) -> Result<(), Error> {
        self.local_jobs.reserve(self.n_workers);
        for i in 0..self.n_workers {
            let (sender, receiver) = bounded(self.queue_size);
            let inspector = self.inspector.clone();
            let barrier = self.barrier.clone();
            let handler = thread::Builder::new()
                .name(format!("worker {}", i))
                .spawn(move || worker_loop(i, receiver, inspector, barrier))?;
            self.local_jobs.push(sender);
            self.workers.push(Worker { _id: i, handler });
        }
        debug!("{} workers started", self.n_workers);
        Ok(())
    }

    fn handle_frame(&mut self, frame: Frame) -> Result<(), Error> {
        if self.sweep.due(frame.ts) {
            // no segment may be in flight while streams are flushed
            self.wait_for_empty_jobs();
            trace!("threads synchronized, idle sweep at {}", frame.ts);
            self.inspector.flush_idle(frame.ts);
        }
        self.dispatch(frame)
    }

    fn teardown(&mut self) {
        debug!("main: exit");
        self.wait_for_empty_jobs();
        for job in self.local_jobs.iter() {
            let _ = job.send(Job::PrintDebug);
            let _ = job.send(Job::Exit);
        }
        if self.desynchronized {
            // parked workers would never return, do not join them
            warn!("{} worker threads left detached", self.workers.len());
            self.workers.clear();
        }
        while let Some(w) = self.workers.pop() {
            if w.handler.join().is_err() {
                warn!("panic occurred in a worker thread");
            }
        }
        self.local_jobs.clear();
        debug!("main: all workers ended");
        self.inspector.finish(self.output_dir.as_deref());
    }
}

/// Select a worker from the XOR of source and destination addresses
fn fan_out(frame: &Frame, n_workers: usize) -> usize {
    let data = &frame.data;
    if frame.link_type != Linktype::ETHERNET || data.len() < 14 {
        return 0;
    }
    let ethertype = EtherType(u16::from_be_bytes([data[12], data[13]]));
    let l3 = &data[14..];
    let mut buf = [0u8; 16];
    let sz = match ethertype {
        EtherTypes::Ipv4 if l3.len() >= 20 => {
            for i in 0..4 {
                buf[i] = l3[12 + i] ^ l3[16 + i];
            }
            4
        }
        EtherTypes::Ipv6 if l3.len() >= 40 => {
            for i in 0..16 {
                buf[i] = l3[8 + i] ^ l3[24 + i];
            }
            16
        }
        _ => return 0,
    };
    let mut hasher = FnvHasher::default();
    hasher.write(&buf[..sz]);
    hasher.finish() as usize % n_workers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::CollectingSink;
    use crate::tcp_reassembly::CloseReason;
    use crate::test_frames::{tcp_frame, tcp_frame_from};

    fn threaded(n: u32) -> (ThreadedAnalyzer, Arc<CollectingSink>) {
        let mut config = Config::default();
        config.set("num_threads", n);
        config.set("job_queue_size", 2_u32);
        let sink = Arc::new(CollectingSink::default());
        let a = ThreadedAnalyzer::new(Arc::new(Registry::default()), &config, sink.clone())
            .expect("analyzer");
        (a, sink)
    }

    #[test]
    fn fan_out_is_symmetric() {
        let fwd = Frame::ethernet(1, Duration::default(), tcp_frame(1, 2, 0x18, b"x"));
        let mut rev = fwd.clone();
        // swap IPv4 addresses
        for i in 0..4 {
            rev.data.swap(26 + i, 30 + i);
        }
        for n in 1..8 {
            assert_eq!(fan_out(&fwd, n), fan_out(&rev, n));
            assert!(fan_out(&fwd, n) < n);
        }
        let short = Frame::ethernet(1, Duration::default(), vec![0; 10]);
        assert_eq!(fan_out(&short, 4), 0);
    }

    #[test]
    fn threaded_streams() {
        let (mut a, sink) = threaded(3);
        a.init().expect("init");
        assert_eq!(a.num_workers(), 3);
        let mut index = 0;
        for host in 1..=4u8 {
            for payload in [&b"GET / HTTP/1.1\r\n"[..], &b"Host: x\r\n\r\n"[..]] {
                index += 1;
                let data = tcp_frame_from(host, 40000, 80, 0x18, payload);
                a.handle_frame(Frame::ethernet(index, Duration::from_secs(1), data))
                    .expect("frame");
            }
        }
        a.teardown();
        let frames = sink.frames();
        assert_eq!(frames.len(), 8);
        assert_eq!(frames[0].0, 1);
        let streams = sink.streams();
        assert_eq!(streams.len(), 4);
        for (report, text) in streams.iter() {
            assert_eq!(report.close_reason, CloseReason::Teardown);
            assert_eq!(report.protocol, Some("HTTP"));
            assert_eq!(report.segments, 2);
            assert!(text.starts_with("Protocol: HTTP (Application)\n"));
        }
        assert_eq!(a.inspector().open_streams(), 0);
    }

    #[test]
    fn threaded_teardown_with_lost_worker() {
        let (mut a, sink) = threaded(2);
        a.init().expect("init");
        // stop the last worker behind the pool's back
        a.local_jobs[1].send(Job::Exit).expect("send");
        let w = a.workers.pop().expect("worker");
        w.handler.join().expect("join");
        // worker 0 gets parked on the barrier, teardown must still return
        a.teardown();
        assert!(a.desynchronized);
        assert!(a.local_jobs.is_empty() && a.workers.is_empty());
        let data = tcp_frame(1, 2, 0x18, b"late");
        let res = a.handle_frame(Frame::ethernet(1, Duration::from_secs(1), data));
        assert!(matches!(res, Err(Error::Generic(_))));
        assert!(sink.frames().is_empty());
    }

    #[test]
    fn threaded_idle_sweep() {
        let mut config = Config::default();
        config.set("num_threads", 2_u32);
        config.set("reassembly.idle_timeout", 10_u32);
        config.set("reassembly.flush_interval", 5_u32);
        let sink = Arc::new(CollectingSink::default());
        let mut a = ThreadedAnalyzer::new(Arc::new(Registry::default()), &config, sink.clone())
            .expect("analyzer");
        a.init().expect("init");
        let data = tcp_frame(1, 2, 0x18, b"idle");
        a.handle_frame(Frame::ethernet(1, Duration::from_secs(0), data))
            .expect("frame");
        let data = tcp_frame(3, 4, 0x18, b"");
        a.handle_frame(Frame::ethernet(2, Duration::from_secs(20), data))
            .expect("frame");
        // the sweep ran before frame 2 was dispatched
        let streams = sink.streams();
        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].0.close_reason, CloseReason::Idle);
        a.teardown();
        assert_eq!(a.inspector().reports().len(), 2);
    }
}

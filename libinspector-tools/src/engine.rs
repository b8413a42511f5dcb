use crate::analyzer::FrameAnalyzer;
use crate::capture::CaptureSource;
use crate::config::Config;
use crate::duration::Duration;
use crate::error::Error;

/// Capture analysis engine
///
/// `CaptureEngine` pulls frames from a `CaptureSource` and hands them to a
/// `FrameAnalyzer`, calling `init` before the first frame and `teardown` once
/// the source is exhausted.
///
/// ## example
///
/// ```
/// use libinspector_tools::{CaptureEngine, Config, Duration, Error, Frame, FrameAnalyzer};
///
/// #[derive(Default)]
/// pub struct CountingAnalyzer {
///     frames: usize,
/// }
///
/// impl FrameAnalyzer for CountingAnalyzer {
///     fn handle_frame(&mut self, _frame: Frame) -> Result<(), Error> {
///         self.frames += 1;
///         Ok(())
///     }
/// }
///
/// let config = Config::default();
/// let mut engine = CaptureEngine::new(CountingAnalyzer::default(), &config);
/// let frames = vec![Frame::ethernet(1, Duration::from_secs(1), vec![0; 60])];
/// engine.run(&mut frames.into_iter()).expect("run");
/// assert_eq!(engine.analyzer().frames, 1);
/// ```
pub struct CaptureEngine<A: FrameAnalyzer> {
    analyzer: A,
    skip_index: usize,
}

impl<A: FrameAnalyzer> CaptureEngine<A> {
    pub fn new(analyzer: A, config: &Config) -> Self {
        let skip_index = config.get_usize("skip_index").unwrap_or(0);
        CaptureEngine {
            analyzer,
            skip_index,
        }
    }

    pub fn analyzer(&self) -> &A {
        &self.analyzer
    }

    pub fn analyzer_mut(&mut self) -> &mut A {
        &mut self.analyzer
    }

    pub fn into_analyzer(self) -> A {
        self.analyzer
    }

    /// Main function: read all frames from source and call analyzer for each of them
    ///
    /// A source error stops the run and is returned; `teardown` is not called in
    /// that case.
    pub fn run<S: CaptureSource + ?Sized>(&mut self, source: &mut S) -> Result<(), Error> {
        self.analyzer.init()?;
        let mut first_ts = Duration::default();
        while let Some(frame) = source.next_frame()? {
            if frame.index <= self.skip_index {
                trace!("skipping frame {}", frame.index);
                continue;
            }
            if first_ts.is_null() {
                first_ts = frame.ts;
            }
            trace!("**************************************************************");
            trace!("    frame   : {}", frame.index);
            trace!("    reltime : {}", frame.ts - first_ts);
            self.analyzer.handle_frame(frame)?;
        }
        self.analyzer.teardown();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::Frame;

    #[derive(Default)]
    struct Recorder {
        init: bool,
        seen: Vec<usize>,
        teardown: bool,
    }

    impl FrameAnalyzer for Recorder {
        fn init(&mut self) -> Result<(), Error> {
            self.init = true;
            Ok(())
        }
        fn handle_frame(&mut self, frame: Frame) -> Result<(), Error> {
            self.seen.push(frame.index);
            Ok(())
        }
        fn teardown(&mut self) {
            self.teardown = true;
        }
    }

    struct FailingSource(usize);

    impl CaptureSource for FailingSource {
        fn next_frame(&mut self) -> Result<Option<Frame>, Error> {
            if self.0 == 0 {
                return Err(Error::Generic("read failure"));
            }
            self.0 -= 1;
            Ok(Some(Frame::ethernet(1, Duration::default(), Vec::new())))
        }
    }

    fn frames(n: usize) -> Vec<Frame> {
        (1..=n)
            .map(|i| Frame::ethernet(i, Duration::from_secs(i as u32), vec![0; 14]))
            .collect()
    }

    #[test]
    fn engine_lifecycle() {
        let mut engine = CaptureEngine::new(Recorder::default(), &Config::default());
        engine.run(&mut frames(3).into_iter()).expect("run");
        let r = engine.into_analyzer();
        assert!(r.init && r.teardown);
        assert_eq!(r.seen, vec![1, 2, 3]);
    }

    #[test]
    fn engine_skip() {
        let mut config = Config::default();
        config.set("skip_index", 2_u32);
        let mut engine = CaptureEngine::new(Recorder::default(), &config);
        engine.run(&mut frames(4).into_iter()).expect("run");
        assert_eq!(engine.analyzer().seen, vec![3, 4]);
    }

    #[test]
    fn engine_source_error() {
        let mut engine = CaptureEngine::new(Recorder::default(), &Config::default());
        let res = engine.run(&mut FailingSource(2));
        assert!(matches!(res, Err(Error::Generic(_))));
        assert_eq!(engine.analyzer().seen.len(), 2);
        assert!(!engine.analyzer().teardown);
    }
}

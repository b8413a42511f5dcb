use crate::capture::Frame;
use crate::error::Error;

/// Common trait for frame analyzers
pub trait FrameAnalyzer {
    /// Initialization function, call before reading capture data (optional)
    fn init(&mut self) -> Result<(), Error> {
        Ok(())
    }

    /// Callback function for every captured frame
    fn handle_frame(&mut self, frame: Frame) -> Result<(), Error>;

    /// Teardown function, called after reading capture data (optional)
    fn teardown(&mut self) {}
}

impl<A: FrameAnalyzer + ?Sized> FrameAnalyzer for Box<A> {
    fn init(&mut self) -> Result<(), Error> {
        (**self).init()
    }

    fn handle_frame(&mut self, frame: Frame) -> Result<(), Error> {
        (**self).handle_frame(frame)
    }

    fn teardown(&mut self) {
        (**self).teardown()
    }
}

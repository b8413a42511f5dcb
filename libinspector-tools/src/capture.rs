use crate::duration::Duration;
use crate::error::Error;
use pcap_parser::Linktype;

/// A captured frame, owning its bytes
#[derive(Clone, Debug)]
pub struct Frame {
    /// Index of the frame in the capture (starting at 1)
    pub index: usize,
    /// Capture timestamp
    pub ts: Duration,
    /// Link type of the interface the frame was captured on
    pub link_type: Linktype,
    /// Original length of the frame on the wire
    pub origlen: u32,
    /// Captured bytes (at most `origlen`)
    pub data: Vec<u8>,
}

impl Frame {
    /// Build an Ethernet frame, mostly useful to feed analyzers directly
    pub fn ethernet(index: usize, ts: Duration, data: Vec<u8>) -> Self {
        Frame {
            index,
            ts,
            link_type: Linktype::ETHERNET,
            origlen: data.len() as u32,
            data,
        }
    }
}

/// Something producing captured frames, one at a time
///
/// `Ok(None)` marks the end of the capture. An error is fatal to the current
/// read only: it is returned to the caller, and no frame is produced.
pub trait CaptureSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, Error>;
}

impl CaptureSource for std::vec::IntoIter<Frame> {
    fn next_frame(&mut self) -> Result<Option<Frame>, Error> {
        Ok(self.next())
    }
}

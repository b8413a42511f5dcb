use crate::capture::{CaptureSource, Frame};
use crate::duration::{Duration, MICROS_PER_SEC};
use crate::error::Error;
use pcap_parser::traits::PcapReaderIterator;
use pcap_parser::{Block, Linktype, PcapBlockOwned, PcapError};
use std::cmp::min;
use std::io::Read;

#[derive(Debug)]
struct InterfaceInfo {
    link_type: Linktype,
    ts_resol: u8,
    ts_offset: i64,
}

/// Capture source reading a pcap or pcap-ng stream
///
/// The format is detected from the file header. pcap-ng inputs may carry
/// several sections and interfaces; every packet is tagged with the link type
/// of its interface.
pub struct PcapFileSource<'a> {
    reader: Box<dyn PcapReaderIterator + 'a>,
    interfaces: Vec<InterfaceInfo>,
    /// index of the last produced frame
    index: usize,
    /// number of blocks read, to detect lack of progress
    blocks: usize,
    last_incomplete: Option<usize>,
    eof: bool,
}

impl<'a> PcapFileSource<'a> {
    /// Build a source from any reader, using an internal buffer of `capacity` bytes
    pub fn new<R: Read + Send + 'a>(input: R, capacity: usize) -> Result<Self, Error> {
        let reader = pcap_parser::create_reader(capacity, input)?;
        Ok(PcapFileSource {
            reader,
            interfaces: Vec::new(),
            index: 0,
            blocks: 0,
            last_incomplete: None,
            eof: false,
        })
    }

    /// Number of frames produced so far
    pub fn frames_read(&self) -> usize {
        self.index
    }
}

impl<'a> CaptureSource for PcapFileSource<'a> {
    fn next_frame(&mut self) -> Result<Option<Frame>, Error> {
        loop {
            if self.eof {
                return Ok(None);
            }
            match self.reader.next() {
                Ok((offset, block)) => {
                    self.blocks += 1;
                    let frame = block_to_frame(block, &mut self.interfaces, &mut self.index)?;
                    self.reader.consume(offset);
                    if frame.is_some() {
                        return Ok(frame);
                    }
                }
                Err(PcapError::Eof) => {
                    self.eof = true;
                }
                Err(PcapError::Incomplete(_)) => {
                    if self.last_incomplete == Some(self.blocks) {
                        warn!("Could not read complete data block.");
                        warn!("Hint: the reader buffer size may be too small, or the input file may be truncated.");
                        self.eof = true;
                        continue;
                    }
                    self.last_incomplete = Some(self.blocks);
                    trace!("refill");
                    self.reader.refill()?;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn block_to_frame(
    block: PcapBlockOwned,
    interfaces: &mut Vec<InterfaceInfo>,
    index: &mut usize,
) -> Result<Option<Frame>, Error> {
    let frame = match block {
        PcapBlockOwned::NG(Block::SectionHeader(_)) => {
            debug!("pcap-ng: new section");
            interfaces.clear();
            return Ok(None);
        }
        PcapBlockOwned::NG(Block::InterfaceDescription(ref idb)) => {
            debug!(
                "pcap-ng: interface {}, link type: {}",
                interfaces.len(),
                idb.linktype
            );
            interfaces.push(InterfaceInfo {
                link_type: idb.linktype,
                ts_resol: idb.if_tsresol,
                ts_offset: idb.if_tsoffset,
            });
            return Ok(None);
        }
        PcapBlockOwned::NG(Block::EnhancedPacket(ref epb)) => {
            let if_info = interfaces
                .get(epb.if_id as usize)
                .ok_or(Error::Generic("EnhancedPacket refers to an unknown interface"))?;
            *index += 1;
            let len = min(epb.caplen as usize, epb.data.len());
            Frame {
                index: *index,
                ts: build_ts(epb.ts_high, epb.ts_low, if_info.ts_offset, if_info.ts_resol),
                link_type: if_info.link_type,
                origlen: epb.origlen,
                data: epb.data[..len].to_vec(),
            }
        }
        PcapBlockOwned::NG(Block::SimplePacket(ref spb)) => {
            let if_info = interfaces
                .first()
                .ok_or(Error::Generic("SimplePacket without interface"))?;
            *index += 1;
            let len = min(spb.origlen as usize, spb.data.len());
            Frame {
                index: *index,
                ts: Duration::default(),
                link_type: if_info.link_type,
                origlen: spb.origlen,
                data: spb.data[..len].to_vec(),
            }
        }
        PcapBlockOwned::LegacyHeader(ref hdr) => {
            let ts_resol = if hdr.is_nanosecond_precision() { 9 } else { 6 };
            debug!("Legacy pcap, link type: {}", hdr.network);
            interfaces.push(InterfaceInfo {
                link_type: hdr.network,
                ts_resol,
                ts_offset: 0,
            });
            return Ok(None);
        }
        PcapBlockOwned::Legacy(ref b) => {
            let if_info = interfaces
                .first()
                .ok_or(Error::Generic("Legacy packet without file header"))?;
            *index += 1;
            let ts = if if_info.ts_resol == 9 {
                Duration::new(b.ts_sec, b.ts_usec / 1000)
            } else {
                Duration::new(b.ts_sec, b.ts_usec)
            };
            let len = min(b.caplen as usize, b.data.len());
            Frame {
                index: *index,
                ts,
                link_type: if_info.link_type,
                origlen: b.origlen,
                data: b.data[..len].to_vec(),
            }
        }
        PcapBlockOwned::NG(Block::InterfaceStatistics(_))
        | PcapBlockOwned::NG(Block::NameResolution(_)) => {
            return Ok(None);
        }
        _ => {
            warn!("unsupported block");
            return Ok(None);
        }
    };
    trace!("frame {}: time {}, {} bytes", frame.index, frame.ts, frame.data.len());
    Ok(Some(frame))
}

/// Convert a pcap-ng timestamp to a `Duration`
///
/// `ts_resol` follows the `if_tsresol` option encoding: if the most significant
/// bit is set, the unit is a negative power of 2, otherwise a negative power of 10.
pub(crate) fn build_ts(ts_high: u32, ts_low: u32, ts_offset: i64, ts_resol: u8) -> Duration {
    let ts = ((ts_high as u64) << 32) | (ts_low as u64);
    let exp = (ts_resol & 0x7f) as u32;
    let unit = if ts_resol & 0x80 != 0 {
        2u64.checked_pow(exp)
    } else {
        10u64.checked_pow(exp)
    };
    let unit = match unit {
        Some(u) if u > 0 => u,
        _ => {
            warn!("invalid timestamp resolution {:#x}", ts_resol);
            MICROS_PER_SEC as u64
        }
    };
    let secs = (ts / unit) as i64 + ts_offset;
    let frac = (ts % unit) as u128;
    let micros = (frac * MICROS_PER_SEC as u128 / unit as u128) as u32;
    let secs = secs.clamp(0, u32::MAX as i64) as u32;
    Duration::new(secs, micros)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn legacy_pcap(records: &[(u32, u32, &[u8])]) -> Vec<u8> {
        let mut v = Vec::new();
        v.extend_from_slice(&0xa1b2_c3d4_u32.to_le_bytes());
        v.extend_from_slice(&2u16.to_le_bytes());
        v.extend_from_slice(&4u16.to_le_bytes());
        v.extend_from_slice(&0i32.to_le_bytes());
        v.extend_from_slice(&0u32.to_le_bytes());
        v.extend_from_slice(&65535u32.to_le_bytes());
        v.extend_from_slice(&1u32.to_le_bytes());
        for (sec, usec, data) in records {
            v.extend_from_slice(&sec.to_le_bytes());
            v.extend_from_slice(&usec.to_le_bytes());
            v.extend_from_slice(&(data.len() as u32).to_le_bytes());
            v.extend_from_slice(&(data.len() as u32).to_le_bytes());
            v.extend_from_slice(data);
        }
        v
    }

    fn ng_block(block_type: u32, body: &[u8]) -> Vec<u8> {
        let mut body = body.to_vec();
        while body.len() % 4 != 0 {
            body.push(0);
        }
        let len = (body.len() + 12) as u32;
        let mut v = Vec::new();
        v.extend_from_slice(&block_type.to_le_bytes());
        v.extend_from_slice(&len.to_le_bytes());
        v.extend_from_slice(&body);
        v.extend_from_slice(&len.to_le_bytes());
        v
    }

    fn pcapng(ts: u64, data: &[u8]) -> Vec<u8> {
        let mut shb = Vec::new();
        shb.extend_from_slice(&0x1a2b_3c4d_u32.to_le_bytes());
        shb.extend_from_slice(&1u16.to_le_bytes());
        shb.extend_from_slice(&0u16.to_le_bytes());
        shb.extend_from_slice(&(-1i64).to_le_bytes());
        let mut idb = Vec::new();
        idb.extend_from_slice(&1u16.to_le_bytes());
        idb.extend_from_slice(&0u16.to_le_bytes());
        idb.extend_from_slice(&65535u32.to_le_bytes());
        let mut epb = Vec::new();
        epb.extend_from_slice(&0u32.to_le_bytes());
        epb.extend_from_slice(&((ts >> 32) as u32).to_le_bytes());
        epb.extend_from_slice(&(ts as u32).to_le_bytes());
        epb.extend_from_slice(&(data.len() as u32).to_le_bytes());
        epb.extend_from_slice(&(data.len() as u32).to_le_bytes());
        epb.extend_from_slice(data);
        let mut v = ng_block(0x0a0d_0d0a, &shb);
        v.extend(ng_block(1, &idb));
        v.extend(ng_block(6, &epb));
        v
    }

    #[test]
    fn legacy_pcap_frames() {
        let input = legacy_pcap(&[(10, 500, b"abcdef"), (11, 0, b"\x01\x02\x03")]);
        let mut source = PcapFileSource::new(&input[..], 65536).expect("pcap header");
        let f1 = source.next_frame().expect("read").expect("frame 1");
        assert_eq!(f1.index, 1);
        assert_eq!(f1.ts, Duration::new(10, 500));
        assert_eq!(f1.link_type, Linktype::ETHERNET);
        assert_eq!(f1.data, b"abcdef");
        let f2 = source.next_frame().expect("read").expect("frame 2");
        assert_eq!(f2.index, 2);
        assert_eq!(f2.data, &[1, 2, 3]);
        assert!(source.next_frame().expect("eof").is_none());
        assert!(source.next_frame().expect("eof").is_none());
        assert_eq!(source.frames_read(), 2);
    }

    #[test]
    fn legacy_pcap_small_buffer() {
        let payload = [0x55u8; 300];
        let records: Vec<(u32, u32, &[u8])> = (0..20).map(|i| (i, 0, &payload[..])).collect();
        let input = legacy_pcap(&records);
        let mut source = PcapFileSource::new(&input[..], 1024).expect("pcap header");
        let mut count = 0;
        while let Some(f) = source.next_frame().expect("read") {
            assert_eq!(f.data.len(), 300);
            count += 1;
        }
        assert_eq!(count, 20);
    }

    #[test]
    fn legacy_pcap_truncated() {
        let mut input = legacy_pcap(&[(1, 0, b"abcdef"), (2, 0, b"ghijkl")]);
        input.truncate(input.len() - 3);
        let mut source = PcapFileSource::new(&input[..], 65536).expect("pcap header");
        assert!(source.next_frame().expect("read").is_some());
        // the second record is incomplete: either an error or the end of capture
        assert!(!matches!(source.next_frame(), Ok(Some(_))));
    }

    #[test]
    fn pcapng_frame() {
        let input = pcapng(1_500_000_123, b"\xaa\xbb\xcc");
        let mut source = PcapFileSource::new(&input[..], 65536).expect("pcap-ng header");
        let f = source.next_frame().expect("read").expect("frame");
        assert_eq!(f.index, 1);
        assert_eq!(f.ts, Duration::new(1500, 123));
        assert_eq!(f.data, &[0xaa, 0xbb, 0xcc]);
        assert!(source.next_frame().expect("eof").is_none());
    }

    #[test]
    fn not_a_capture() {
        let input = b"definitely not a capture file, but long enough to be examined";
        assert!(PcapFileSource::new(&input[..], 65536).is_err());
    }

    #[test]
    fn timestamp_resolution() {
        // nanoseconds
        assert_eq!(build_ts(0, 2_000_001_000, 0, 9), Duration::new(2, 1));
        // 2^-10 units
        assert_eq!(build_ts(0, 1024 + 512, 0, 0x80 | 10), Duration::new(1, 500_000));
        // offset in seconds
        assert_eq!(build_ts(0, 1_000_000, 100, 6), Duration::new(101, 0));
    }
}

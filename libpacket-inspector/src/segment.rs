//! Lenient TCP segment extraction, feeding stream reassembly
//!
//! This path does not go through the registries: it only needs the flow key,
//! the payload and the closing flags, and it tolerates Ethernet padding after
//! the IPv4 packet.

use libinspector_tools::{Duration, FlowKey, Frame, Linktype, NetworkFlow, TransportFlow};
use pnet_packet::ethernet::{EtherTypes, EthernetPacket};
use pnet_packet::ip::IpNextHeaderProtocols;
use pnet_packet::ipv4::Ipv4Packet;
use pnet_packet::ipv6::Ipv6Packet;
use pnet_packet::tcp::{TcpFlags, TcpPacket};
use pnet_packet::Packet;
use std::net::IpAddr;

/// Payload and metadata of one TCP segment
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TcpSegment {
    pub key: FlowKey,
    pub ts: Duration,
    /// Index of the frame carrying this segment
    pub index: usize,
    pub fin: bool,
    pub rst: bool,
    pub data: Vec<u8>,
}

impl TcpSegment {
    /// Whether this segment ends the stream in its direction
    pub fn is_closing(&self) -> bool {
        self.fin || self.rst
    }
}

/// Locate the TCP segment carried by an Ethernet frame, if any
pub fn extract_tcp_segment(frame: &Frame) -> Option<TcpSegment> {
    if frame.link_type != Linktype::ETHERNET {
        return None;
    }
    let eth = EthernetPacket::new(&frame.data)?;
    let (src, dst, l4) = match eth.get_ethertype() {
        EtherTypes::Ipv4 => ipv4_payload(eth.payload())?,
        EtherTypes::Ipv6 => ipv6_payload(eth.payload())?,
        _ => return None,
    };
    let tcp = TcpPacket::new(l4)?;
    let hlen = tcp.get_data_offset() as usize * 4;
    if hlen < 20 || hlen > l4.len() {
        trace!("idx={}: invalid TCP data offset {}", frame.index, hlen);
        return None;
    }
    let flags = tcp.get_flags();
    Some(TcpSegment {
        key: FlowKey::new(
            NetworkFlow::new(src, dst),
            TransportFlow::new(tcp.get_source(), tcp.get_destination()),
        ),
        ts: frame.ts,
        index: frame.index,
        fin: flags & TcpFlags::FIN != 0,
        rst: flags & TcpFlags::RST != 0,
        data: l4[hlen..].to_vec(),
    })
}

fn ipv4_payload(data: &[u8]) -> Option<(IpAddr, IpAddr, &[u8])> {
    let ip = Ipv4Packet::new(data)?;
    if ip.get_version() != 4 || ip.get_next_level_protocol() != IpNextHeaderProtocols::Tcp {
        return None;
    }
    let hlen = ip.get_header_length() as usize * 4;
    // trim link-layer padding
    let total = ip.get_total_length() as usize;
    if hlen < 20 || hlen > total || total > data.len() {
        return None;
    }
    if ip.get_fragment_offset() != 0 || ip.get_flags() & 0b001 != 0 {
        debug!("IPv4 fragment, not reassembled");
        return None;
    }
    Some((
        IpAddr::V4(ip.get_source()),
        IpAddr::V4(ip.get_destination()),
        &data[hlen..total],
    ))
}

fn ipv6_payload(data: &[u8]) -> Option<(IpAddr, IpAddr, &[u8])> {
    let ip = Ipv6Packet::new(data)?;
    if ip.get_version() != 6 || ip.get_next_header() != IpNextHeaderProtocols::Tcp {
        return None;
    }
    let end = 40 + ip.get_payload_length() as usize;
    if end > data.len() {
        return None;
    }
    Some((
        IpAddr::V6(ip.get_source()),
        IpAddr::V6(ip.get_destination()),
        &data[40..end],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 10.0.0.1:40000 -> 10.0.0.2:80, FIN|ACK, no payload, padded to 60 bytes
    const ETH_TCP_FIN_PADDED: &[u8] = b"\
\x00\x11\x22\x33\x44\x55\x66\x77\x88\x99\xaa\xbb\x08\x00\
\x45\x00\x00\x28\x00\x01\x40\x00\x40\x06\x00\x00\x0a\x00\x00\x01\x0a\x00\x00\x02\
\x9c\x40\x00\x50\x00\x00\x00\x01\x00\x00\x00\x01\x50\x11\x10\x00\x00\x00\x00\x00\
\x00\x00\x00\x00\x00\x00";

    #[test]
    fn segment_padded_fin() {
        let frame = Frame::ethernet(7, Duration::from_secs(3), ETH_TCP_FIN_PADDED.to_vec());
        let seg = extract_tcp_segment(&frame).expect("segment");
        assert_eq!(seg.key.to_string(), "10.0.0.1:40000 -> 10.0.0.2:80");
        assert_eq!(seg.index, 7);
        assert_eq!(seg.ts, Duration::from_secs(3));
        assert!(seg.fin && !seg.rst && seg.is_closing());
        assert!(seg.data.is_empty());
    }

    #[test]
    fn segment_payload() {
        let mut data = ETH_TCP_FIN_PADDED[..54].to_vec();
        data[17] = 0x2b; // total length 43
        data[47] = 0x18; // PSH|ACK
        data.extend_from_slice(b"abc");
        let frame = Frame::ethernet(1, Duration::default(), data);
        let seg = extract_tcp_segment(&frame).expect("segment");
        assert_eq!(seg.data, b"abc");
        assert!(!seg.is_closing());
    }

    #[test]
    fn segment_not_tcp() {
        let mut data = ETH_TCP_FIN_PADDED.to_vec();
        data[23] = 17;
        assert!(extract_tcp_segment(&Frame::ethernet(1, Duration::default(), data)).is_none());
        let mut frame = Frame::ethernet(1, Duration::default(), ETH_TCP_FIN_PADDED.to_vec());
        frame.link_type = Linktype::RAW;
        assert!(extract_tcp_segment(&frame).is_none());
        let short = Frame::ethernet(1, Duration::default(), ETH_TCP_FIN_PADDED[..40].to_vec());
        assert!(extract_tcp_segment(&short).is_none());
    }
}

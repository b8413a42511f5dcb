use crate::extract::{read_u16, read_u32, read_u8};
use crate::layer::{Layer, LayerKind, Renderer};
use crate::layers::Transport;
use crate::protocols::{TCP, UDP};
use crate::registry::Registry;
use pnet_packet::ip::{IpNextHeaderProtocol, IpNextHeaderProtocols};
use std::net::Ipv4Addr;

pub const IPV4_MIN_HEADER_LEN: usize = 20;
pub const IPV4_MAX_LEN: usize = 65535;

/// Name of the transport protocol for an IP protocol number, if known
pub fn ip_protocol_name(proto: u8) -> Option<&'static str> {
    match IpNextHeaderProtocol(proto) {
        IpNextHeaderProtocols::Tcp => Some(TCP),
        IpNextHeaderProtocols::Udp => Some(UDP),
        _ => None,
    }
}

/// IPv4 packet
#[derive(Clone, Debug, PartialEq)]
pub struct Ipv4 {
    raw: Vec<u8>,
    pub version: u8,
    /// Header length, in 32-bit words
    pub header_length: u8,
    pub type_of_service: u8,
    pub total_length: u16,
    pub identification: u16,
    /// Reserved, DF and MF bits
    pub flags: u8,
    pub fragment_offset: u16,
    pub ttl: u8,
    pub protocol: u8,
    pub checksum: u16,
    pub source: Ipv4Addr,
    pub destination: Ipv4Addr,
    pub options: Vec<u8>,
    pub data: Option<Transport>,
}

impl Ipv4 {
    pub fn decode(data: &[u8], registry: &Registry) -> Option<Self> {
        let len = data.len();
        if !(IPV4_MIN_HEADER_LEN..=IPV4_MAX_LEN).contains(&len) {
            return None;
        }
        let b0 = read_u8(data, 0);
        let version = b0 >> 4;
        if version != 4 {
            return None;
        }
        let header_length = b0 & 0x0f;
        let hlen = header_length as usize * 4;
        if hlen < IPV4_MIN_HEADER_LEN || hlen > len {
            return None;
        }
        let total_length = read_u16(data, 2);
        if total_length as usize != len {
            trace!("IPv4: total length {} for {} bytes", total_length, len);
            return None;
        }
        let flags_frag = read_u16(data, 6);
        let protocol = read_u8(data, 9);
        let next = ip_protocol_name(protocol)
            .and_then(|name| registry.decode_transport(name, &data[hlen..len]));
        Some(Ipv4 {
            raw: data.to_vec(),
            version,
            header_length,
            type_of_service: read_u8(data, 1),
            total_length,
            identification: read_u16(data, 4),
            flags: (flags_frag >> 13) as u8,
            fragment_offset: flags_frag & 0x1fff,
            ttl: read_u8(data, 8),
            protocol,
            checksum: read_u16(data, 10),
            source: Ipv4Addr::from(read_u32(data, 12)),
            destination: Ipv4Addr::from(read_u32(data, 16)),
            options: data[IPV4_MIN_HEADER_LEN..hlen].to_vec(),
            data: next,
        })
    }

    pub fn dont_fragment(&self) -> bool {
        self.flags & 0b010 != 0
    }

    pub fn more_fragments(&self) -> bool {
        self.flags & 0b001 != 0
    }
}

impl Layer for Ipv4 {
    fn name(&self) -> &'static str {
        "IPv4"
    }

    fn kind(&self) -> LayerKind {
        LayerKind::Network
    }

    fn raw(&self) -> &[u8] {
        &self.raw
    }

    fn payload(&self) -> &[u8] {
        &self.raw[self.header_length as usize * 4..]
    }

    fn render(&self, r: &mut Renderer<'_>) {
        r.protocol(self.name(), self.kind());
        r.field("Version", self.version);
        r.field("Header length", format_args!("{} (* 4 byte)", self.header_length));
        r.field("Service type", format_args!("0x{:02X}", self.type_of_service));
        r.field("Total length", self.total_length);
        r.field("Identification", format_args!("0x{:04X}", self.identification));
        r.field("Flags", format_args!("0b{:03b}", self.flags));
        r.field("Fragment offset", self.fragment_offset);
        r.field("Live time", self.ttl);
        r.field(
            "Protocol",
            format_args!(
                "{} ({})",
                self.protocol,
                ip_protocol_name(self.protocol).unwrap_or("Unknown")
            ),
        );
        r.field("Header check sum", format_args!("0x{:04X}", self.checksum));
        r.field("Source address", self.source);
        r.field("Destination address", self.destination);
        r.hex_field("Options", &self.options, "(No options)");
        r.data(self.data.as_ref(), self.payload());
        r.raw(&self.raw);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// IPv4 with one option word (NOP x3 + EOL), UDP 53 -> 53 with 4 bytes payload
    const IPV4_OPTS_UDP: &[u8] = b"\
\x46\x00\x00\x24\xbe\xef\x40\x00\x3f\x11\x12\x34\xc0\xa8\x00\x01\xc0\xa8\x00\xfe\
\x01\x01\x01\x00\
\x00\x35\x00\x35\x00\x0c\x00\x00\xde\xad\xbe\xef";

    #[test]
    fn ipv4_fields() {
        let registry = Registry::default();
        let ip = Ipv4::decode(IPV4_OPTS_UDP, &registry).expect("ipv4");
        assert_eq!(ip.raw(), IPV4_OPTS_UDP);
        assert_eq!(ip.header_length, 6);
        assert_eq!(ip.total_length, 36);
        assert_eq!(ip.identification, 0xbeef);
        assert_eq!(ip.flags, 0b010);
        assert!(ip.dont_fragment() && !ip.more_fragments());
        assert_eq!(ip.fragment_offset, 0);
        assert_eq!(ip.ttl, 63);
        assert_eq!(ip.protocol, 17);
        assert_eq!(ip.source, Ipv4Addr::new(192, 168, 0, 1));
        assert_eq!(ip.destination, Ipv4Addr::new(192, 168, 0, 254));
        assert_eq!(ip.options, &[1, 1, 1, 0]);
        assert_eq!(ip.payload(), &IPV4_OPTS_UDP[24..]);
        match ip.data {
            Some(Transport::Udp(ref udp)) => assert_eq!(udp.destination_port, 53),
            ref other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn ipv4_fragment_offset() {
        let registry = Registry::default();
        let mut data = IPV4_OPTS_UDP.to_vec();
        data[6] = 0x21;
        data[7] = 0x02;
        let ip = Ipv4::decode(&data, &registry).expect("ipv4");
        assert_eq!(ip.flags, 0b001);
        assert_eq!(ip.fragment_offset, 0x0102);
    }

    #[test]
    fn ipv4_total_length_mismatch() {
        let registry = Registry::default();
        // declares 25 bytes, 24 available
        let mut data = IPV4_OPTS_UDP[..24].to_vec();
        data[0] = 0x45;
        data[2] = 0;
        data[3] = 25;
        assert!(Ipv4::decode(&data, &registry).is_none());
        // trailing padding is not tolerated
        let mut padded = IPV4_OPTS_UDP.to_vec();
        padded.push(0);
        assert!(Ipv4::decode(&padded, &registry).is_none());
    }

    #[test]
    fn ipv4_invalid_header() {
        let registry = Registry::default();
        for len in 0..20 {
            assert!(Ipv4::decode(&IPV4_OPTS_UDP[..len], &registry).is_none());
        }
        let mut data = IPV4_OPTS_UDP.to_vec();
        data[0] = 0x66;
        assert!(Ipv4::decode(&data, &registry).is_none());
        data[0] = 0x44;
        assert!(Ipv4::decode(&data, &registry).is_none());
        // header longer than the packet
        data[0] = 0x4f;
        assert!(Ipv4::decode(&data, &registry).is_none());
    }

    #[test]
    fn ipv4_unknown_protocol() {
        let registry = Registry::default();
        let mut data = IPV4_OPTS_UDP.to_vec();
        data[9] = 1; // ICMP
        let ip = Ipv4::decode(&data, &registry).expect("ipv4");
        assert!(ip.data.is_none());
        let s = ip.to_readable_string(0);
        assert!(s.contains("Protocol: 1 (Unknown)\n"));
        assert!(s.contains("\t(NOT RESOLVED)\n\tRaw: 00350035000C0000DEADBEEF\n"));
    }

    #[test]
    fn ipv4_render() {
        let registry = Registry::default();
        let ip = Ipv4::decode(IPV4_OPTS_UDP, &registry).expect("ipv4");
        let s = ip.to_readable_string(1);
        assert!(s.starts_with("\tProtocol: IPv4 (Network)\n\tVersion: 4\n\tHeader length: 6 (* 4 byte)\n"));
        assert!(s.contains("\tFlags: 0b010\n"));
        assert!(s.contains("\tProtocol: 17 (UDP)\n"));
        assert!(s.contains("\tSource address: 192.168.0.1\n"));
        assert!(s.contains("\tDestination address: 192.168.0.254\n"));
        assert!(s.contains("\tOptions: 01010100\n"));
        assert!(s.contains("\t\tProtocol: UDP (Transport)\n"));
    }
}

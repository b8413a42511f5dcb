use crate::extract::{read_u16, read_u32, read_u8};
use crate::layer::{Layer, LayerKind, Renderer};
use crate::layers::Transport;
use crate::protocols::ipv4::ip_protocol_name;
use crate::registry::Registry;
use std::net::Ipv6Addr;

pub const IPV6_HEADER_LEN: usize = 40;
pub const IPV6_MAX_LEN: usize = IPV6_HEADER_LEN + 65535;

/// IPv6 packet
///
/// Extension headers are not walked: only a TCP or UDP next header is decoded.
#[derive(Clone, Debug, PartialEq)]
pub struct Ipv6 {
    raw: Vec<u8>,
    pub version: u8,
    pub traffic_class: u8,
    pub flow_label: u32,
    pub payload_length: u16,
    pub next_header: u8,
    pub hop_limit: u8,
    pub source: Ipv6Addr,
    pub destination: Ipv6Addr,
    pub data: Option<Transport>,
}

fn read_addr(data: &[u8], offset: usize) -> Ipv6Addr {
    let mut b = [0u8; 16];
    b.copy_from_slice(&data[offset..offset + 16]);
    Ipv6Addr::from(b)
}

impl Ipv6 {
    pub fn decode(data: &[u8], registry: &Registry) -> Option<Self> {
        let len = data.len();
        if !(IPV6_HEADER_LEN..=IPV6_MAX_LEN).contains(&len) {
            return None;
        }
        let word0 = read_u32(data, 0);
        let version = (word0 >> 28) as u8;
        if version != 6 {
            return None;
        }
        let payload_length = read_u16(data, 4);
        if IPV6_HEADER_LEN + payload_length as usize != len {
            trace!("IPv6: payload length {} for {} bytes", payload_length, len);
            return None;
        }
        let next_header = read_u8(data, 6);
        let next = ip_protocol_name(next_header)
            .and_then(|name| registry.decode_transport(name, &data[IPV6_HEADER_LEN..]));
        Some(Ipv6 {
            raw: data.to_vec(),
            version,
            traffic_class: ((word0 >> 20) & 0xff) as u8,
            flow_label: word0 & 0x000f_ffff,
            payload_length,
            next_header,
            hop_limit: read_u8(data, 7),
            source: read_addr(data, 8),
            destination: read_addr(data, 24),
            data: next,
        })
    }
}

impl Layer for Ipv6 {
    fn name(&self) -> &'static str {
        "IPv6"
    }

    fn kind(&self) -> LayerKind {
        LayerKind::Network
    }

    fn raw(&self) -> &[u8] {
        &self.raw
    }

    fn payload(&self) -> &[u8] {
        &self.raw[IPV6_HEADER_LEN..]
    }

    fn render(&self, r: &mut Renderer<'_>) {
        r.protocol(self.name(), self.kind());
        r.field("Version", self.version);
        r.field("Traffic type", format_args!("0x{:02X}", self.traffic_class));
        r.field("Flow label", format_args!("0x{:05X}", self.flow_label));
        r.field("Payload length", self.payload_length);
        r.field(
            "Next header",
            format_args!(
                "{} ({})",
                self.next_header,
                ip_protocol_name(self.next_header).unwrap_or("Unknown")
            ),
        );
        r.field("Hop limit", self.hop_limit);
        r.field("Source address", self.source);
        r.field("Destination address", self.destination);
        r.data(self.data.as_ref(), self.payload());
        r.raw(&self.raw);
    }
}

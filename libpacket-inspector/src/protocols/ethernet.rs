use crate::address::LinkAddress;
use crate::extract::{read_u16, read_u8};
use crate::layer::{Layer, LayerKind, Renderer};
use crate::layers::{Datalink, Network};
use crate::protocols::{ARP, IPV4, IPV6};
use crate::registry::Registry;
use pnet_packet::ethernet::{EtherType, EtherTypes};

pub const ETHERNET_HEADER_LEN: usize = 14;
/// Largest frame accepted: 1518 bytes plus an 802.1Q tag
pub const MAX_FRAME_LEN: usize = 1522;
/// Largest value of the type/length field read as a length (802.3)
pub const MAX_8023_LENGTH: u16 = 1500;
/// Smallest value of the type/length field read as an EtherType (Ethernet II)
pub const MIN_ETHERTYPE: u16 = 0x0600;

const SNAP_HEADER_END: usize = 22;
const LLC_SNAP_LEN: u16 = 8;

/// Name of the network protocol for an EtherType, if known
pub fn ethertype_name(ethertype: u16) -> Option<&'static str> {
    match EtherType(ethertype) {
        EtherTypes::Ipv4 => Some(IPV4),
        EtherTypes::Arp => Some(ARP),
        EtherTypes::Ipv6 => Some(IPV6),
        _ => None,
    }
}

/// Fields shared by Ethernet II and IEEE 802.3 frames
#[derive(Clone, Debug, PartialEq)]
pub struct EthernetHeader {
    pub destination: LinkAddress,
    pub source: LinkAddress,
    /// EtherType (Ethernet II) or length (802.3)
    pub type_length: u16,
}

impl EthernetHeader {
    fn read(data: &[u8]) -> Self {
        EthernetHeader {
            destination: LinkAddress::read(data, 0),
            source: LinkAddress::read(data, 6),
            type_length: read_u16(data, 12),
        }
    }

    fn render(&self, r: &mut Renderer<'_>) {
        r.field(
            "Source MAC address",
            format_args!("{} ({}, {})", self.source, self.source.kind(), self.source.scope()),
        );
        r.field(
            "Destination MAC address",
            format_args!(
                "{} ({}, {})",
                self.destination,
                self.destination.kind(),
                self.destination.scope()
            ),
        );
    }
}

fn render_type(r: &mut Renderer<'_>, label: &str, ethertype: u16) {
    r.field(
        label,
        format_args!("0x{:04X} ({})", ethertype, ethertype_name(ethertype).unwrap_or("Unknown")),
    );
}

/// Ethernet II frame
#[derive(Clone, Debug, PartialEq)]
pub struct EthernetII {
    raw: Vec<u8>,
    pub header: EthernetHeader,
    pub data: Option<Network>,
}

/// IEEE 802.3 frame with LLC/SNAP encapsulation
#[derive(Clone, Debug, PartialEq)]
pub struct Ieee8023Snap {
    raw: Vec<u8>,
    pub header: EthernetHeader,
    pub dsap: u8,
    pub ssap: u8,
    pub control: u8,
    pub oui: [u8; 3],
    /// Protocol identifier; an EtherType when `oui` is zero
    pub protocol_id: u16,
    pub data: Option<Network>,
}

/// Decode an Ethernet frame, selecting the framing from the type/length field
pub fn decode(data: &[u8], registry: &Registry) -> Option<Datalink> {
    let len = data.len();
    if !(ETHERNET_HEADER_LEN..=MAX_FRAME_LEN).contains(&len) {
        return None;
    }
    let type_length = read_u16(data, 12);
    if type_length >= MIN_ETHERTYPE {
        Some(Datalink::EthernetII(EthernetII::decode(data, registry)))
    } else if type_length <= MAX_8023_LENGTH {
        Ieee8023Snap::decode(data, registry).map(Datalink::Ieee8023Snap)
    } else {
        trace!("invalid Ethernet type/length field 0x{:04x}", type_length);
        None
    }
}

impl EthernetII {
    /// Decode an Ethernet II frame. The caller checked the length and the type field.
    fn decode(data: &[u8], registry: &Registry) -> Self {
        let header = EthernetHeader::read(data);
        let payload = &data[ETHERNET_HEADER_LEN..];
        let next = ethertype_name(header.type_length)
            .and_then(|name| registry.decode_network(name, payload));
        EthernetII {
            raw: data.to_vec(),
            header,
            data: next,
        }
    }
}

impl Ieee8023Snap {
    fn decode(data: &[u8], registry: &Registry) -> Option<Self> {
        if data.len() < SNAP_HEADER_END {
            return None;
        }
        let header = EthernetHeader::read(data);
        let dsap = read_u8(data, 14);
        let ssap = read_u8(data, 15);
        let control = read_u8(data, 16);
        if dsap != 0xaa || ssap != 0xaa || control != 0x03 {
            return None;
        }
        // the length field covers LLC + SNAP + payload, and excludes padding
        let end = ETHERNET_HEADER_LEN + header.type_length as usize;
        if header.type_length < LLC_SNAP_LEN || end > data.len() {
            return None;
        }
        let oui = [data[17], data[18], data[19]];
        let protocol_id = read_u16(data, 20);
        let next = if oui == [0, 0, 0] {
            ethertype_name(protocol_id)
                .and_then(|name| registry.decode_network(name, &data[SNAP_HEADER_END..end]))
        } else {
            None
        };
        Some(Ieee8023Snap {
            raw: data.to_vec(),
            header,
            dsap,
            ssap,
            control,
            oui,
            protocol_id,
            data: next,
        })
    }

    fn payload_end(&self) -> usize {
        ETHERNET_HEADER_LEN + self.header.type_length as usize
    }
}

impl Layer for EthernetII {
    fn name(&self) -> &'static str {
        "Ethernet"
    }

    fn kind(&self) -> LayerKind {
        LayerKind::Datalink
    }

    fn raw(&self) -> &[u8] {
        &self.raw
    }

    fn payload(&self) -> &[u8] {
        &self.raw[ETHERNET_HEADER_LEN..]
    }

    fn render(&self, r: &mut Renderer<'_>) {
        r.protocol(self.name(), self.kind());
        self.header.render(r);
        render_type(r, "Protocol type", self.header.type_length);
        r.data(self.data.as_ref(), self.payload());
        r.raw(&self.raw);
    }
}

impl Layer for Ieee8023Snap {
    fn name(&self) -> &'static str {
        "IEEE 802.3 SNAP"
    }

    fn kind(&self) -> LayerKind {
        LayerKind::Datalink
    }

    fn raw(&self) -> &[u8] {
        &self.raw
    }

    fn payload(&self) -> &[u8] {
        &self.raw[SNAP_HEADER_END..self.payload_end()]
    }

    fn render(&self, r: &mut Renderer<'_>) {
        r.protocol(self.name(), self.kind());
        self.header.render(r);
        r.field("Length", self.header.type_length);
        r.field("DSAP", format_args!("0x{:02X}", self.dsap));
        r.field("SSAP", format_args!("0x{:02X}", self.ssap));
        r.field("Control", format_args!("0x{:02X}", self.control));
        r.field(
            "Organization code",
            format_args!("0x{:02X}{:02X}{:02X}", self.oui[0], self.oui[1], self.oui[2]),
        );
        if self.oui == [0, 0, 0] {
            render_type(r, "Protocol type", self.protocol_id);
        } else {
            r.field("Protocol type", format_args!("0x{:04X}", self.protocol_id));
        }
        r.data(self.data.as_ref(), self.payload());
        r.raw(&self.raw);
    }
}

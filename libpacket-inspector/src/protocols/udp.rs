use crate::extract::read_u16;
use crate::layer::{Layer, LayerKind, Renderer};
use crate::layers::Application;
use crate::registry::Registry;

pub const UDP_HEADER_LEN: usize = 8;

/// UDP datagram
#[derive(Clone, Debug, PartialEq)]
pub struct Udp {
    raw: Vec<u8>,
    pub source_port: u16,
    pub destination_port: u16,
    pub length: u16,
    pub checksum: u16,
    pub data: Option<Application>,
}

impl Udp {
    pub fn decode(data: &[u8], registry: &Registry) -> Option<Self> {
        if data.len() < UDP_HEADER_LEN {
            return None;
        }
        let length = read_u16(data, 4);
        if length as usize != data.len() {
            trace!("UDP: length {} for {} bytes", length, data.len());
            return None;
        }
        let next = if data.len() > UDP_HEADER_LEN {
            registry.probe_application(&data[UDP_HEADER_LEN..])
        } else {
            None
        };
        Some(Udp {
            raw: data.to_vec(),
            source_port: read_u16(data, 0),
            destination_port: read_u16(data, 2),
            length,
            checksum: read_u16(data, 6),
            data: next,
        })
    }
}

impl Layer for Udp {
    fn name(&self) -> &'static str {
        "UDP"
    }

    fn kind(&self) -> LayerKind {
        LayerKind::Transport
    }

    fn raw(&self) -> &[u8] {
        &self.raw
    }

    fn payload(&self) -> &[u8] {
        &self.raw[UDP_HEADER_LEN..]
    }

    fn render(&self, r: &mut Renderer<'_>) {
        r.protocol(self.name(), self.kind());
        r.field("Source port", self.source_port);
        r.field("Destination port", self.destination_port);
        r.field("Length", self.length);
        r.field("Checksum", format_args!("0x{:04X}", self.checksum));
        r.data(self.data.as_ref(), self.payload());
        r.raw(&self.raw);
    }
}

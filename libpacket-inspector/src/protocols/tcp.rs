use crate::extract::{read_u16, read_u32, read_u8};
use crate::layer::{Layer, LayerKind, Renderer};
use crate::layers::Application;
use crate::registry::Registry;

pub const TCP_MIN_HEADER_LEN: usize = 20;

/// TCP segment
#[derive(Clone, Debug, PartialEq)]
pub struct Tcp {
    raw: Vec<u8>,
    pub source_port: u16,
    pub destination_port: u16,
    pub sequence: u32,
    pub acknowledgment: u32,
    /// Header length, in 32-bit words
    pub data_offset: u8,
    pub reserved: u8,
    pub cwr: bool,
    pub ece: bool,
    pub urg: bool,
    pub ack: bool,
    pub psh: bool,
    pub rst: bool,
    pub syn: bool,
    pub fin: bool,
    pub window: u16,
    pub checksum: u16,
    pub urgent_pointer: u16,
    pub options: Vec<u8>,
    pub data: Option<Application>,
}

impl Tcp {
    pub fn decode(data: &[u8], registry: &Registry) -> Option<Self> {
        let len = data.len();
        if len < TCP_MIN_HEADER_LEN {
            return None;
        }
        let b12 = read_u8(data, 12);
        let data_offset = b12 >> 4;
        let hlen = data_offset as usize * 4;
        if hlen < TCP_MIN_HEADER_LEN || hlen > len {
            return None;
        }
        let flags = read_u8(data, 13);
        Some(Tcp {
            raw: data.to_vec(),
            source_port: read_u16(data, 0),
            destination_port: read_u16(data, 2),
            sequence: read_u32(data, 4),
            acknowledgment: read_u32(data, 8),
            data_offset,
            reserved: b12 & 0x0f,
            cwr: flags & 0x80 != 0,
            ece: flags & 0x40 != 0,
            urg: flags & 0x20 != 0,
            ack: flags & 0x10 != 0,
            psh: flags & 0x08 != 0,
            rst: flags & 0x04 != 0,
            syn: flags & 0x02 != 0,
            fin: flags & 0x01 != 0,
            window: read_u16(data, 14),
            checksum: read_u16(data, 16),
            urgent_pointer: read_u16(data, 18),
            options: data[TCP_MIN_HEADER_LEN..hlen].to_vec(),
            data: registry.probe_application(&data[hlen..]),
        })
    }

    /// Whether this segment ends the stream in its direction
    pub fn is_closing(&self) -> bool {
        self.fin || self.rst
    }
}

impl Layer for Tcp {
    fn name(&self) -> &'static str {
        "TCP"
    }

    fn kind(&self) -> LayerKind {
        LayerKind::Transport
    }

    fn raw(&self) -> &[u8] {
        &self.raw
    }

    fn payload(&self) -> &[u8] {
        &self.raw[self.data_offset as usize * 4..]
    }

    fn render(&self, r: &mut Renderer<'_>) {
        r.protocol(self.name(), self.kind());
        r.field("Source port", self.source_port);
        r.field("Destination port", self.destination_port);
        r.field("Sequence number", format_args!("0x{:08X}", self.sequence));
        r.field("Acknowledgment number", format_args!("0x{:08X}", self.acknowledgment));
        r.field("Data offset", format_args!("{} (* 4 byte)", self.data_offset));
        r.field("Reserved", format_args!("0b{:04b}", self.reserved));
        r.flag("CWR", self.cwr);
        r.flag("ECE", self.ece);
        r.flag("URG", self.urg);
        r.flag("ACK", self.ack);
        r.flag("PSH", self.psh);
        r.flag("RST", self.rst);
        r.flag("SYN", self.syn);
        r.flag("FIN", self.fin);
        r.field("Window", self.window);
        r.field("Checksum", format_args!("0x{:04X}", self.checksum));
        r.field("Urgent pointer", self.urgent_pointer);
        r.hex_field("Options(HEX)", &self.options, "(No options)");
        r.data(self.data.as_ref(), self.payload());
        r.raw(&self.raw);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 443 -> 51000, PSH|ACK, no options
    const TCP_BARE: &[u8] = b"\
\x01\xbb\xc7\x38\x00\x00\x10\x00\x00\x00\x20\x00\x50\x18\xff\xff\x12\x34\x00\x00";

    /// SYN with MSS option
    const TCP_SYN_MSS: &[u8] = b"\
\xc7\x38\x00\x50\x11\x22\x33\x44\x00\x00\x00\x00\x60\x02\x72\x10\x00\x00\x00\x00\
\x02\x04\x05\xb4";

    #[test]
    fn tcp_no_options() {
        let registry = Registry::default();
        let tcp = Tcp::decode(TCP_BARE, &registry).expect("tcp");
        assert_eq!(tcp.raw(), TCP_BARE);
        assert_eq!(tcp.source_port, 443);
        assert_eq!(tcp.destination_port, 51000);
        assert_eq!(tcp.sequence, 0x1000);
        assert_eq!(tcp.acknowledgment, 0x2000);
        assert_eq!(tcp.data_offset, 5);
        assert!(tcp.options.is_empty());
        assert!(tcp.psh && tcp.ack);
        assert!(!(tcp.syn || tcp.fin || tcp.rst || tcp.urg || tcp.cwr || tcp.ece));
        assert!(tcp.payload().is_empty());
        assert!(tcp.data.is_none());
        let s = tcp.to_readable_string(0);
        assert!(s.contains("Options(HEX): (No options)\n"));
        assert!(s.contains("Data: {\n\t(NOT RESOLVED)\n}\n"));
    }

    #[test]
    fn tcp_options_and_flags() {
        let registry = Registry::default();
        let tcp = Tcp::decode(TCP_SYN_MSS, &registry).expect("tcp");
        assert_eq!(tcp.data_offset, 6);
        assert_eq!(tcp.options, &[0x02, 0x04, 0x05, 0xb4]);
        assert!(tcp.syn && !tcp.ack && !tcp.is_closing());
        let s = tcp.to_readable_string(0);
        assert!(s.contains("SYN: 1\n"));
        assert!(s.contains("ACK: 0\n"));
        assert!(s.contains("Sequence number: 0x11223344\n"));
        assert!(s.contains("Options(HEX): 020405B4\n"));
    }

    #[test]
    fn tcp_http_payload() {
        let registry = Registry::default();
        let mut data = TCP_BARE.to_vec();
        data.extend_from_slice(b"HTTP/1.1 404 NotFound\r\nServer: t\r\n\r\n");
        let tcp = Tcp::decode(&data, &registry).expect("tcp");
        match tcp.data {
            Some(Application::Http(ref http)) => assert_eq!(http.status_code(), Some(404)),
            ref other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn tcp_invalid() {
        let registry = Registry::default();
        for len in 0..20 {
            assert!(Tcp::decode(&TCP_BARE[..len], &registry).is_none());
        }
        // data offset beyond the buffer
        let mut data = TCP_BARE.to_vec();
        data[12] = 0x60;
        assert!(Tcp::decode(&data, &registry).is_none());
        // data offset smaller than the fixed header
        data[12] = 0x40;
        assert!(Tcp::decode(&data, &registry).is_none());
    }

    #[test]
    fn tcp_closing_flags() {
        let registry = Registry::default();
        let mut data = TCP_BARE.to_vec();
        data[13] = 0x11;
        assert!(Tcp::decode(&data, &registry).expect("fin").is_closing());
        data[13] = 0x04;
        assert!(Tcp::decode(&data, &registry).expect("rst").is_closing());
    }
}

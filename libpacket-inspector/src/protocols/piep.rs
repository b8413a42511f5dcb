use crate::extract::{read_u32, read_u8};
use crate::layer::{Layer, LayerKind, Renderer};

pub const PIEP_HEADER_LEN: usize = 7;

/// PIEP frame: fixed 7-byte header followed by `data_length` bytes
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Piep {
    raw: Vec<u8>,
    pub start_bit: u8,
    pub address: u32,
    pub frame_type: u8,
    pub data_length: u8,
    pub payload: Option<Vec<u8>>,
}

impl Piep {
    pub fn decode(data: &[u8]) -> Option<Self> {
        if data.len() < PIEP_HEADER_LEN {
            return None;
        }
        let data_length = read_u8(data, 6);
        if PIEP_HEADER_LEN + data_length as usize != data.len() {
            return None;
        }
        let payload = if data_length > 0 {
            Some(data[PIEP_HEADER_LEN..].to_vec())
        } else {
            None
        };
        Some(Piep {
            raw: data.to_vec(),
            start_bit: read_u8(data, 0),
            address: read_u32(data, 1),
            frame_type: read_u8(data, 5),
            data_length,
            payload,
        })
    }
}

impl Layer for Piep {
    fn name(&self) -> &'static str {
        "PIEP"
    }

    fn kind(&self) -> LayerKind {
        LayerKind::Application
    }

    fn raw(&self) -> &[u8] {
        &self.raw
    }

    fn payload(&self) -> &[u8] {
        &self.raw[PIEP_HEADER_LEN..]
    }

    fn render(&self, r: &mut Renderer<'_>) {
        r.protocol(self.name(), self.kind());
        r.field("Start bit", format_args!("0x{:02X}", self.start_bit));
        r.field("Address", format_args!("0x{:08X}", self.address));
        r.field("Frame type", format_args!("0x{:02X}", self.frame_type));
        r.field("Data length", self.data_length);
        r.hex_field("Payload", self.payload(), "(No payload)");
        r.raw(&self.raw);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn piep_with_payload() {
        let data = b"\x01\xc0\xa8\x00\x01\x07\x02\xca\xfe";
        let p = Piep::decode(data).expect("piep");
        assert_eq!(p.raw(), data);
        assert_eq!(p.start_bit, 1);
        assert_eq!(p.address, 0xc0a8_0001);
        assert_eq!(p.frame_type, 7);
        assert_eq!(p.data_length, 2);
        assert_eq!(p.payload.as_deref(), Some(&b"\xca\xfe"[..]));
        assert_eq!(
            p.to_readable_string(0),
            "Protocol: PIEP (Application)\n\
             Start bit: 0x01\n\
             Address: 0xC0A80001\n\
             Frame type: 0x07\n\
             Data length: 2\n\
             Payload: CAFE\n\
             Raw: 01C0A800010702CAFE\n"
        );
    }

    #[test]
    fn piep_empty_payload() {
        let p = Piep::decode(b"\xff\x00\x00\x00\x00\x00\x00").expect("piep");
        assert!(p.payload.is_none());
        assert!(p.to_readable_string(0).contains("Payload: (No payload)\n"));
    }

    #[test]
    fn piep_length_mismatch() {
        assert!(Piep::decode(b"\x01\x00\x00\x00\x00\x00\x02\xca").is_none());
        assert!(Piep::decode(b"\x01\x00\x00\x00\x00\x00\x00\xca").is_none());
        for len in 0..7 {
            assert!(Piep::decode(&[0u8; 7][..len]).is_none());
        }
    }
}

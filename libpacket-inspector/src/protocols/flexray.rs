use crate::extract::read_u8;
use crate::layer::{Layer, LayerKind, Renderer};

pub const FLEXRAY_MIN_LEN: usize = 8;
const PAYLOAD_OFFSET: usize = 5;
const TRAILER_LEN: usize = 3;

/// FlexRay frame
///
/// `payload_length` counts 16-bit words; the frame is exactly
/// `payload_length * 2 + 8` bytes long.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlexRay {
    raw: Vec<u8>,
    pub reserved: bool,
    pub payload_indicator: bool,
    pub null_indicator: bool,
    pub sync_indicator: bool,
    pub startup_indicator: bool,
    /// 11-bit frame identifier
    pub id: u16,
    pub payload_length: u8,
    /// 11-bit header CRC
    pub checksum: u16,
    pub cycle_count: u8,
    /// 24-bit trailer
    pub trailer: u32,
}

impl FlexRay {
    pub fn decode(data: &[u8]) -> Option<Self> {
        let len = data.len();
        if len < FLEXRAY_MIN_LEN {
            return None;
        }
        let b0 = read_u8(data, 0);
        let b5 = read_u8(data, 5);
        let payload_length = read_u8(data, 2) >> 1;
        let payload_indicator = b0 & 0x40 != 0;
        if len != payload_length as usize * 2 + FLEXRAY_MIN_LEN {
            return None;
        }
        if payload_length != 0 && !payload_indicator {
            return None;
        }
        Some(FlexRay {
            raw: data.to_vec(),
            reserved: b0 & 0x80 != 0,
            payload_indicator,
            null_indicator: b0 & 0x20 != 0,
            sync_indicator: b0 & 0x10 != 0,
            startup_indicator: b0 & 0x08 != 0,
            id: (u16::from(b0 & 0x07) << 8) | u16::from(read_u8(data, 1)),
            payload_length,
            checksum: (u16::from(read_u8(data, 3) & 0x01) << 10)
                | (u16::from(read_u8(data, 4)) << 2)
                | u16::from(b5 >> 6),
            cycle_count: b5 & 0x3f,
            trailer: (u32::from(read_u8(data, len - 3)) << 16)
                | (u32::from(read_u8(data, len - 2)) << 8)
                | u32::from(read_u8(data, len - 1)),
        })
    }
}

impl Layer for FlexRay {
    fn name(&self) -> &'static str {
        "FlexRay"
    }

    fn kind(&self) -> LayerKind {
        LayerKind::Application
    }

    fn raw(&self) -> &[u8] {
        &self.raw
    }

    fn payload(&self) -> &[u8] {
        &self.raw[PAYLOAD_OFFSET..self.raw.len() - TRAILER_LEN]
    }

    fn render(&self, r: &mut Renderer<'_>) {
        r.protocol(self.name(), self.kind());
        r.flag("Reserved bit", self.reserved);
        r.flag("Payload valid indicator", self.payload_indicator);
        r.flag("Null frame indicator", self.null_indicator);
        r.flag("Sync indicator", self.sync_indicator);
        r.flag("Startup indicator", self.startup_indicator);
        r.field("ID", format_args!("0x{:03X}", self.id));
        r.field("Payload length", self.payload_length);
        r.field("Header CRC", format_args!("0x{:03X}", self.checksum));
        r.field("Cycle count", self.cycle_count);
        r.hex_field("Payload", self.payload(), "(No payload)");
        r.field("Frame tail", format_args!("0x{:06X}", self.trailer));
        r.raw(&self.raw);
    }
}

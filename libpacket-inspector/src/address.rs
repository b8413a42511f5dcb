use std::fmt;

/// Link-layer (MAC) address
///
/// The first three octets are the maker (OUI), the last three the device id.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct LinkAddress {
    pub maker: [u8; 3],
    pub device: [u8; 3],
}

impl LinkAddress {
    pub fn from_bytes(b: [u8; 6]) -> Self {
        LinkAddress {
            maker: [b[0], b[1], b[2]],
            device: [b[3], b[4], b[5]],
        }
    }

    /// Read an address at `offset`. The caller must have checked the buffer length.
    pub(crate) fn read(buf: &[u8], offset: usize) -> Self {
        let mut b = [0u8; 6];
        b.copy_from_slice(&buf[offset..offset + 6]);
        LinkAddress::from_bytes(b)
    }

    pub fn octets(&self) -> [u8; 6] {
        [
            self.maker[0],
            self.maker[1],
            self.maker[2],
            self.device[0],
            self.device[1],
            self.device[2],
        ]
    }

    /// Group address (I/G bit set)
    #[inline]
    pub fn is_multicast(&self) -> bool {
        self.maker[0] & 0x01 != 0
    }

    #[inline]
    pub fn is_unicast(&self) -> bool {
        !self.is_multicast()
    }

    /// Locally administered address (U/L bit set)
    #[inline]
    pub fn is_locally_administered(&self) -> bool {
        self.maker[0] & 0x02 != 0
    }

    #[inline]
    pub fn is_universal(&self) -> bool {
        !self.is_locally_administered()
    }

    pub fn is_broadcast(&self) -> bool {
        self.octets().iter().fold(0xff, |acc, b| acc & b) == 0xff
    }

    pub fn is_zero(&self) -> bool {
        self.octets().iter().fold(0, |acc, b| acc | b) == 0
    }

    /// Short classification, used when rendering
    pub(crate) fn kind(&self) -> &'static str {
        if self.is_broadcast() {
            "broadcast"
        } else if self.is_multicast() {
            "multicast"
        } else {
            "unicast"
        }
    }

    pub(crate) fn scope(&self) -> &'static str {
        if self.is_locally_administered() {
            "local"
        } else {
            "global"
        }
    }
}

impl fmt::Display for LinkAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = self.octets();
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            o[0], o[1], o[2], o[3], o[4], o[5]
        )
    }
}

//! Big-endian field readers
//!
//! These functions do not check bounds: callers must validate the buffer
//! length against the largest offset they read. Reading out of range panics.

#[inline]
pub fn read_u8(buf: &[u8], offset: usize) -> u8 {
    buf[offset]
}

#[inline]
pub fn read_u16(buf: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([buf[offset], buf[offset + 1]])
}

#[inline]
pub fn read_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}

#[inline]
pub fn read_u64(buf: &[u8], offset: usize) -> u64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&buf[offset..offset + 8]);
    u64::from_be_bytes(b)
}

/// Upper-case hexadecimal rendering, without separators
pub fn to_hex(data: &[u8]) -> String {
    base16ct::upper::encode_string(data)
}

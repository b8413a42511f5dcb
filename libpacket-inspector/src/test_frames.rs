//! Frames shared by unit tests

const MAC_HEADER: &[u8] = b"\x00\x11\x22\x33\x44\x55\x66\x77\x88\x99\xaa\xbb\x08\x00";

/// Ethernet + IPv4 + TCP frame from 10.0.0.1 to 10.0.0.2
pub(crate) fn tcp_frame(sport: u16, dport: u16, flags: u8, payload: &[u8]) -> Vec<u8> {
    tcp_frame_from(1, sport, dport, flags, payload)
}

/// Same as `tcp_frame`, with source address 10.0.0.`host`
pub(crate) fn tcp_frame_from(
    host: u8,
    sport: u16,
    dport: u16,
    flags: u8,
    payload: &[u8],
) -> Vec<u8> {
    let total = (40 + payload.len()) as u16;
    let mut v = MAC_HEADER.to_vec();
    v.extend_from_slice(&[0x45, 0x00]);
    v.extend_from_slice(&total.to_be_bytes());
    v.extend_from_slice(&[0, 1, 0x40, 0, 64, 6, 0, 0, 10, 0, 0, host, 10, 0, 0, 2]);
    v.extend_from_slice(&sport.to_be_bytes());
    v.extend_from_slice(&dport.to_be_bytes());
    v.extend_from_slice(&[0, 0, 0, 1, 0, 0, 0, 1, 0x50, flags, 0x10, 0, 0, 0, 0, 0]);
    v.extend_from_slice(payload);
    v
}

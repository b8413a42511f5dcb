//! Protocol decoders
//!
//! Every decoder is a pure function from bytes to a validated entity. A decoder
//! checks the buffer length before reading any field, and returns `None` when
//! the input is not its protocol.

pub mod ethernet;
pub mod flexray;
pub mod http;
pub mod ipv4;
pub mod ipv6;
pub mod piep;
pub mod tcp;
pub mod udp;

use crate::layers::{Application, Network, Transport};
use crate::registry::Registry;

pub const IPV4: &str = "IPv4";
pub const IPV6: &str = "IPv6";
pub const ARP: &str = "ARP";
pub const TCP: &str = "TCP";
pub const UDP: &str = "UDP";

/// Register all built-in decoders. The application layer order is part of the
/// observable behavior: HTTP, then PIEP, then FlexRay.
pub(crate) fn register_builtin(r: &mut Registry) -> Result<(), &'static str> {
    r.register_datalink("Ethernet", |d, r| ethernet::decode(d, r))?;
    r.register_network(IPV4, |d, r| ipv4::Ipv4::decode(d, r).map(Network::Ipv4))?;
    r.register_network(IPV6, |d, r| ipv6::Ipv6::decode(d, r).map(Network::Ipv6))?;
    r.register_transport(TCP, |d, r| tcp::Tcp::decode(d, r).map(Transport::Tcp))?;
    r.register_transport(UDP, |d, r| udp::Udp::decode(d, r).map(Transport::Udp))?;
    r.register_application("HTTP", |d| http::Http::decode(d).map(Application::Http))?;
    r.register_application("PIEP", |d| piep::Piep::decode(d).map(Application::Piep))?;
    r.register_application("FlexRay", |d| {
        flexray::FlexRay::decode(d).map(Application::FlexRay)
    })?;
    Ok(())
}

//! Decoded packet tree: one sum type per layer
//!
//! Each layer owns the next one (if it could be decoded), so a dissected frame
//! is a strictly downward chain `Datalink -> Network -> Transport -> Application`.

use crate::layer::{Layer, LayerKind, Renderer};
use crate::protocols::ethernet::{EthernetHeader, EthernetII, Ieee8023Snap};
use crate::protocols::flexray::FlexRay;
use crate::protocols::http::Http;
use crate::protocols::ipv4::Ipv4;
use crate::protocols::ipv6::Ipv6;
use crate::protocols::piep::Piep;
use crate::protocols::tcp::Tcp;
use crate::protocols::udp::Udp;
use std::net::IpAddr;

macro_rules! impl_layer_enum {
    ($name:ident { $($variant:ident),+ $(,)? }) => {
        impl Layer for $name {
            fn name(&self) -> &'static str {
                match self { $($name::$variant(l) => l.name(),)+ }
            }
            fn kind(&self) -> LayerKind {
                match self { $($name::$variant(l) => l.kind(),)+ }
            }
            fn raw(&self) -> &[u8] {
                match self { $($name::$variant(l) => l.raw(),)+ }
            }
            fn payload(&self) -> &[u8] {
                match self { $($name::$variant(l) => l.payload(),)+ }
            }
            fn render(&self, r: &mut Renderer<'_>) {
                match self { $($name::$variant(l) => l.render(r),)+ }
            }
        }
    };
}

#[derive(Clone, Debug, PartialEq)]
pub enum Datalink {
    EthernetII(EthernetII),
    Ieee8023Snap(Ieee8023Snap),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Network {
    Ipv4(Ipv4),
    Ipv6(Ipv6),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Transport {
    Tcp(Tcp),
    Udp(Udp),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Application {
    Http(Http),
    Piep(Piep),
    FlexRay(FlexRay),
}

impl_layer_enum!(Datalink { EthernetII, Ieee8023Snap });
impl_layer_enum!(Network { Ipv4, Ipv6 });
impl_layer_enum!(Transport { Tcp, Udp });
impl_layer_enum!(Application { Http, Piep, FlexRay });

impl Datalink {
    /// Addresses and type/length field, common to both framings
    pub fn header(&self) -> &EthernetHeader {
        match self {
            Datalink::EthernetII(e) => &e.header,
            Datalink::Ieee8023Snap(e) => &e.header,
        }
    }

    pub fn network(&self) -> Option<&Network> {
        match self {
            Datalink::EthernetII(e) => e.data.as_ref(),
            Datalink::Ieee8023Snap(e) => e.data.as_ref(),
        }
    }

    pub fn transport(&self) -> Option<&Transport> {
        self.network().and_then(Network::transport)
    }

    pub fn application(&self) -> Option<&Application> {
        self.transport().and_then(Transport::application)
    }

    /// Name of the deepest decoded layer
    pub fn innermost_name(&self) -> &'static str {
        if let Some(a) = self.application() {
            a.name()
        } else if let Some(t) = self.transport() {
            t.name()
        } else if let Some(n) = self.network() {
            n.name()
        } else {
            self.name()
        }
    }
}

impl Network {
    pub fn transport(&self) -> Option<&Transport> {
        match self {
            Network::Ipv4(ip) => ip.data.as_ref(),
            Network::Ipv6(ip) => ip.data.as_ref(),
        }
    }

    pub fn source(&self) -> IpAddr {
        match self {
            Network::Ipv4(ip) => IpAddr::V4(ip.source),
            Network::Ipv6(ip) => IpAddr::V6(ip.source),
        }
    }

    pub fn destination(&self) -> IpAddr {
        match self {
            Network::Ipv4(ip) => IpAddr::V4(ip.destination),
            Network::Ipv6(ip) => IpAddr::V6(ip.destination),
        }
    }
}

impl Transport {
    pub fn application(&self) -> Option<&Application> {
        match self {
            Transport::Tcp(tcp) => tcp.data.as_ref(),
            Transport::Udp(udp) => udp.data.as_ref(),
        }
    }

    pub fn source_port(&self) -> u16 {
        match self {
            Transport::Tcp(tcp) => tcp.source_port,
            Transport::Udp(udp) => udp.source_port,
        }
    }

    pub fn destination_port(&self) -> u16 {
        match self {
            Transport::Tcp(tcp) => tcp.destination_port,
            Transport::Udp(udp) => udp.destination_port,
        }
    }
}

use serde::Serialize;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};

/// Network-layer endpoints of a flow (source, destination)
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
pub struct NetworkFlow {
    pub src: IpAddr,
    pub dst: IpAddr,
}

/// Transport-layer endpoints of a flow (source port, destination port)
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize)]
pub struct TransportFlow {
    pub src_port: u16,
    pub dst_port: u16,
}

/// Identity of one direction of a connection, used to key reassembly state
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize)]
pub struct FlowKey {
    pub network: NetworkFlow,
    pub transport: TransportFlow,
}

impl NetworkFlow {
    pub fn new(src: IpAddr, dst: IpAddr) -> Self {
        NetworkFlow { src, dst }
    }

    pub fn get_reverse(&self) -> NetworkFlow {
        NetworkFlow {
            src: self.dst,
            dst: self.src,
        }
    }
}

impl Default for NetworkFlow {
    fn default() -> Self {
        NetworkFlow {
            src: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            dst: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        }
    }
}

impl TransportFlow {
    pub fn new(src_port: u16, dst_port: u16) -> Self {
        TransportFlow { src_port, dst_port }
    }

    pub fn get_reverse(&self) -> TransportFlow {
        TransportFlow {
            src_port: self.dst_port,
            dst_port: self.src_port,
        }
    }
}

impl FlowKey {
    pub fn new(network: NetworkFlow, transport: TransportFlow) -> Self {
        FlowKey { network, transport }
    }

    /// The key of the opposite direction
    pub fn get_reverse(&self) -> FlowKey {
        FlowKey {
            network: self.network.get_reverse(),
            transport: self.transport.get_reverse(),
        }
    }
}

fn fmt_endpoint(f: &mut fmt::Formatter<'_>, addr: &IpAddr, port: u16) -> fmt::Result {
    match addr {
        IpAddr::V4(ip) => write!(f, "{}:{}", ip, port),
        IpAddr::V6(ip) => write!(f, "[{}]:{}", ip, port),
    }
}

impl fmt::Display for NetworkFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.src, self.dst)
    }
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_endpoint(f, &self.network.src, self.transport.src_port)?;
        f.write_str(" -> ")?;
        fmt_endpoint(f, &self.network.dst, self.transport.dst_port)
    }
}

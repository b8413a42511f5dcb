use crate::layer::LayerKind;
use crate::layers::{Application, Datalink, Network, Transport};
use crate::protocols;
use indexmap::IndexMap;
use libinspector_tools::{Config, Error};

pub type DatalinkDecoder = fn(&[u8], &Registry) -> Option<Datalink>;
pub type NetworkDecoder = fn(&[u8], &Registry) -> Option<Network>;
pub type TransportDecoder = fn(&[u8], &Registry) -> Option<Transport>;
pub type ApplicationDecoder = fn(&[u8]) -> Option<Application>;

/// Decoders for every layer, keyed by protocol name
///
/// The network and transport layers are looked up by the name the parent layer
/// declares. The data-link and application layers are probed exhaustively, in
/// registration order, and the first decoder accepting the input wins.
///
/// A registry is populated once, then shared read-only (usually in an `Arc`).
/// `Registry::default()` contains all built-in decoders; the application layer
/// order is HTTP, PIEP, FlexRay.
#[derive(Clone)]
pub struct Registry {
    datalink: IndexMap<&'static str, DatalinkDecoder>,
    network: IndexMap<&'static str, NetworkDecoder>,
    transport: IndexMap<&'static str, TransportDecoder>,
    application: IndexMap<&'static str, ApplicationDecoder>,
}

fn register<F>(
    m: &mut IndexMap<&'static str, F>,
    name: &'static str,
    f: F,
) -> Result<(), &'static str> {
    if m.contains_key(name) {
        return Err("decoder already registered");
    }
    m.insert(name, f);
    Ok(())
}

impl Default for Registry {
    fn default() -> Self {
        let mut registry = Registry::new();
        if let Err(e) = protocols::register_builtin(&mut registry) {
            warn!("could not register built-in decoders: {}", e);
        }
        registry
    }
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Registry {
            datalink: IndexMap::new(),
            network: IndexMap::new(),
            transport: IndexMap::new(),
            application: IndexMap::new(),
        }
    }

    pub fn register_datalink(
        &mut self,
        name: &'static str,
        f: DatalinkDecoder,
    ) -> Result<(), &'static str> {
        register(&mut self.datalink, name, f)
    }

    pub fn register_network(
        &mut self,
        name: &'static str,
        f: NetworkDecoder,
    ) -> Result<(), &'static str> {
        register(&mut self.network, name, f)
    }

    pub fn register_transport(
        &mut self,
        name: &'static str,
        f: TransportDecoder,
    ) -> Result<(), &'static str> {
        register(&mut self.transport, name, f)
    }

    pub fn register_application(
        &mut self,
        name: &'static str,
        f: ApplicationDecoder,
    ) -> Result<(), &'static str> {
        register(&mut self.application, name, f)
    }

    /// Try every data-link decoder, return the first match
    pub fn probe_datalink(&self, data: &[u8]) -> Option<Datalink> {
        self.datalink.iter().find_map(|(name, f)| {
            let res = f(data, self);
            if res.is_some() {
                trace!("datalink: matched {}", name);
            }
            res
        })
    }

    /// Decode `data` with the network decoder registered as `name`
    pub fn decode_network(&self, name: &str, data: &[u8]) -> Option<Network> {
        let f = self.network.get(name)?;
        f(data, self)
    }

    /// Decode `data` with the transport decoder registered as `name`
    pub fn decode_transport(&self, name: &str, data: &[u8]) -> Option<Transport> {
        let f = self.transport.get(name)?;
        f(data, self)
    }

    /// Try every application decoder in registration order, return the first match
    pub fn probe_application(&self, data: &[u8]) -> Option<Application> {
        if data.is_empty() {
            return None;
        }
        self.application.iter().find_map(|(name, f)| {
            let res = f(data);
            if res.is_some() {
                trace!("application: matched {}", name);
            }
            res
        })
    }

    /// Built-in decoders, restricted by the configuration
    ///
    /// `application.decoders` is a comma-separated list of application decoder
    /// names. Registration order is kept, whatever the order of the list.
    pub fn from_config(config: &Config) -> Result<Registry, Error> {
        let registry = Registry::default();
        let list = match config.get("application.decoders") {
            Some(list) => list,
            None => return Ok(registry),
        };
        let wanted: Vec<&str> = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        for name in &wanted {
            if !registry.application.contains_key(name) {
                return Err(Error::Config(format!("unknown application decoder '{}'", name)));
            }
        }
        Ok(registry.filter_application(|name| wanted.contains(&name)))
    }

    /// Build a copy of this registry, keeping only the application decoders
    /// accepted by `predicate` (order is preserved)
    pub fn filter_application<P: Fn(&str) -> bool>(&self, predicate: P) -> Registry {
        let mut r = self.clone();
        r.application.retain(|name, _| predicate(name));
        r
    }

    /// Names of the decoders registered for a layer, in registration order
    pub fn names(&self, kind: LayerKind) -> Vec<&'static str> {
        match kind {
            LayerKind::Datalink => self.datalink.keys().copied().collect(),
            LayerKind::Network => self.network.keys().copied().collect(),
            LayerKind::Transport => self.transport.keys().copied().collect(),
            LayerKind::Application => self.application.keys().copied().collect(),
        }
    }

    pub fn num_decoders(&self, kind: LayerKind) -> usize {
        match kind {
            LayerKind::Datalink => self.datalink.len(),
            LayerKind::Network => self.network.len(),
            LayerKind::Transport => self.transport.len(),
            LayerKind::Application => self.application.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::piep::Piep;

    #[test]
    fn registry_builtin_order() {
        let r = Registry::default();
        assert_eq!(r.names(LayerKind::Datalink), vec!["Ethernet"]);
        assert_eq!(r.names(LayerKind::Network), vec!["IPv4", "IPv6"]);
        assert_eq!(r.names(LayerKind::Transport), vec!["TCP", "UDP"]);
        assert_eq!(r.names(LayerKind::Application), vec!["HTTP", "PIEP", "FlexRay"]);
    }

    #[test]
    fn registry_duplicate() {
        let mut r = Registry::default();
        let res = r.register_application("PIEP", |d| Piep::decode(d).map(Application::Piep));
        assert!(res.is_err());
        assert_eq!(r.num_decoders(LayerKind::Application), 3);
    }

    #[test]
    fn registry_unknown_names() {
        let r = Registry::default();
        // ARP has a name, but no decoder
        assert!(r.decode_network("ARP", &[0; 28]).is_none());
        assert!(r.decode_transport("SCTP", &[0; 28]).is_none());
    }

    #[test]
    fn registry_filter() {
        let r = Registry::default().filter_application(|n| n != "HTTP");
        assert_eq!(r.names(LayerKind::Application), vec!["PIEP", "FlexRay"]);
        let http = b"GET / HTTP/1.1\r\nHost: x\r\n\r\n";
        assert!(r.probe_application(http).is_none());
        assert!(Registry::default().probe_application(http).is_some());
        let empty = Registry::new();
        assert!(empty.probe_datalink(&[0; 64]).is_none());
        assert!(empty.probe_application(b"\x01\x00\x00\x00\x01\x02\x00").is_none());
    }

    #[test]
    fn registry_from_config() {
        let mut config = Config::default();
        let r = Registry::from_config(&config).expect("registry");
        assert_eq!(r.num_decoders(LayerKind::Application), 3);
        config.set("application.decoders", "FlexRay, HTTP");
        let r = Registry::from_config(&config).expect("registry");
        assert_eq!(r.names(LayerKind::Application), vec!["HTTP", "FlexRay"]);
        assert_eq!(r.names(LayerKind::Transport), vec!["TCP", "UDP"]);
        config.set("application.decoders", "HTTP,SMTP");
        assert!(matches!(Registry::from_config(&config), Err(Error::Config(_))));
    }

    #[test]
    fn registry_first_match_wins() {
        // valid both as PIEP (7 + 1 bytes) and as an empty FlexRay frame
        let data = b"\x68\x00\x00\x00\x01\x10\x01\xff";
        match Registry::default().probe_application(data) {
            Some(Application::Piep(p)) => assert_eq!(p.data_length, 1),
            other => panic!("unexpected result {:?}", other),
        }
    }
}

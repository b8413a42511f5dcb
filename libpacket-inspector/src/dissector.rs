use crate::extract::to_hex;
use crate::layer::Layer;
use crate::layers::{Application, Datalink};
use crate::registry::Registry;
use libinspector_tools::Linktype;
use std::sync::Arc;

/// Drives frames and reassembled streams through the registries
///
/// Dissection is stateless: a `Dissector` can be shared between threads.
#[derive(Clone)]
pub struct Dissector {
    registry: Arc<Registry>,
}

impl Dissector {
    pub fn new(registry: Arc<Registry>) -> Self {
        Dissector { registry }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Dissect one captured frame, starting at the data-link layer
    ///
    /// Only Ethernet captures are probed. Deeper layers are decoded by the
    /// data-link decoder itself, so the returned tree stops at the first layer
    /// which could not be resolved.
    pub fn dissect_frame(&self, link_type: Linktype, data: &[u8]) -> Option<Datalink> {
        if link_type != Linktype::ETHERNET {
            trace!("unsupported link type {:?}", link_type);
            return None;
        }
        self.registry.probe_datalink(data)
    }

    /// Probe a reassembled stream against every application decoder
    pub fn dissect_stream(&self, data: &[u8]) -> Option<Application> {
        self.registry.probe_application(data)
    }
}

/// Readable dump of a frame, or the data-link failure line
pub fn render_frame(data: &[u8], datalink: Option<&Datalink>) -> String {
    match datalink {
        Some(d) => d.to_readable_string(0),
        None => format!("[Datalink Layer] Can not resolve {}\n", to_hex(data)),
    }
}

/// Readable dump of a reassembled stream, or the application failure line
pub fn render_stream(data: &[u8], application: Option<&Application>) -> String {
    match application {
        Some(a) => a.to_readable_string(0),
        None => format!("[Application Layer] Can not resolve {}\n", to_hex(data)),
    }
}

//! Packet dissection engine
//!
//! Frames are decoded layer by layer (data-link, network, transport,
//! application) through a [`Registry`] of decoders, and rendered as indented
//! text. TCP payloads are reassembled per direction of each connection and
//! probed against the application decoders once the stream completes.

#[macro_use]
extern crate log;

mod address;
pub mod extract;
mod layer;
mod layers;
pub mod protocols;
mod registry;

mod dissector;
mod segment;
mod tcp_reassembly;

mod analyzer;
mod output;
mod threaded_analyzer;

#[cfg(test)]
mod test_frames;

pub use address::*;
pub use analyzer::*;
pub use dissector::*;
pub use layer::*;
pub use layers::*;
pub use output::*;
pub use registry::*;
pub use segment::*;
pub use tcp_reassembly::*;
pub use threaded_analyzer::*;

#[macro_use]
extern crate log;

mod analyzer;
mod capture;
mod config;
mod duration;
mod engine;
mod error;
mod flow;
mod pcap_source;

pub use analyzer::*;
pub use capture::*;
pub use config::Config;
pub use duration::Duration;
pub use engine::*;
pub use error::*;
pub use flow::*;
pub use pcap_source::*;

pub use pcap_parser::Linktype;

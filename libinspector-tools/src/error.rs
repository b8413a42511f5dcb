use pcap_parser::PcapError;
use std::fmt;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Generic(&'static str),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("pcap error: {0}")]
    Pcap(String),
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<&'static str> for Error {
    fn from(s: &'static str) -> Self {
        Error::Generic(s)
    }
}

// pcap-parser errors borrow the reader buffer, keep only their description
impl<I: fmt::Debug> From<PcapError<I>> for Error {
    fn from(e: PcapError<I>) -> Self {
        Error::Pcap(format!("{:?}", e))
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

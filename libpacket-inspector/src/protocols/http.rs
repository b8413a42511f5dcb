use crate::extract::to_hex;
use crate::layer::{Layer, LayerKind, Renderer};
use std::str;

const HEADER_END: &[u8] = b"\r\n\r\n";
const VERSION_PREFIX: &str = "HTTP/";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StartLine {
    Request {
        method: String,
        target: String,
        version: String,
    },
    Response {
        version: String,
        status_code: u16,
        status_message: String,
    },
}

/// HTTP/1.x message (start line, headers and body)
///
/// Only the part before the first blank line is parsed. The body is kept as-is,
/// chunked or compressed bodies are not decoded.
#[derive(Clone, Debug, PartialEq)]
pub struct Http {
    raw: Vec<u8>,
    pub start_line: StartLine,
    /// Header fields, in message order
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn parse_start_line(line: &str) -> Option<StartLine> {
    let tokens: Vec<&str> = line.split(' ').collect();
    if tokens.len() != 3 {
        return None;
    }
    if tokens[0].starts_with(VERSION_PREFIX) {
        let status_code = tokens[1].parse::<u16>().ok()?;
        Some(StartLine::Response {
            version: tokens[0].to_owned(),
            status_code,
            status_message: tokens[2].to_owned(),
        })
    } else {
        Some(StartLine::Request {
            method: tokens[0].to_owned(),
            target: tokens[1].to_owned(),
            version: tokens[2].to_owned(),
        })
    }
}

impl Http {
    pub fn decode(data: &[u8]) -> Option<Self> {
        let end = find_subslice(data, HEADER_END)?;
        let head = str::from_utf8(&data[..end]).ok()?;
        let mut lines = head.split("\r\n");
        let start_line = parse_start_line(lines.next()?)?;
        let headers = lines
            .map(|line| {
                let (key, value) = line.split_once(':')?;
                Some((key.to_owned(), value.trim_matches(' ').to_owned()))
            })
            .collect::<Option<Vec<_>>>()?;
        Some(Http {
            raw: data.to_vec(),
            start_line,
            headers,
            body: data[end + HEADER_END.len()..].to_vec(),
        })
    }

    pub fn is_request(&self) -> bool {
        matches!(self.start_line, StartLine::Request { .. })
    }

    pub fn status_code(&self) -> Option<u16> {
        match self.start_line {
            StartLine::Response { status_code, .. } => Some(status_code),
            StartLine::Request { .. } => None,
        }
    }

    /// First header with this name (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl Layer for Http {
    fn name(&self) -> &'static str {
        "HTTP"
    }

    fn kind(&self) -> LayerKind {
        LayerKind::Application
    }

    fn raw(&self) -> &[u8] {
        &self.raw
    }

    fn payload(&self) -> &[u8] {
        &self.body
    }

    fn render(&self, r: &mut Renderer<'_>) {
        r.protocol(self.name(), self.kind());
        match &self.start_line {
            StartLine::Request {
                method,
                target,
                version,
            } => {
                r.field("Method", method);
                r.field("URL", target);
                r.field("Version", version);
            }
            StartLine::Response {
                version,
                status_code,
                status_message,
            } => {
                r.field("Version", version);
                r.field("Status code", status_code);
                r.field("Status message", status_message);
            }
        }
        r.block("Headers", |r| {
            for (k, v) in &self.headers {
                r.field(k, v);
            }
        });
        if self.body.is_empty() {
            r.field("Payload", "(No Body)");
        } else {
            r.block("Payload", |r| {
                r.field("Raw", to_hex(&self.body));
                match str::from_utf8(&self.body) {
                    Ok(text) => r.field("Readable text", text),
                    Err(_) => r.field("Readable text", String::from_utf8_lossy(&self.body)),
                }
            });
        }
        r.raw(&self.raw);
    }
}

use crate::extract::to_hex;
use std::fmt;
use std::fmt::Write;

/// Position of a protocol in the dissection stack
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LayerKind {
    Datalink,
    Network,
    Transport,
    Application,
}

impl LayerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LayerKind::Datalink => "Datalink",
            LayerKind::Network => "Network",
            LayerKind::Transport => "Transport",
            LayerKind::Application => "Application",
        }
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capabilities shared by every decoded protocol layer
pub trait Layer {
    /// Protocol name, as used in registries
    fn name(&self) -> &'static str;

    fn kind(&self) -> LayerKind;

    /// The exact bytes this layer was decoded from
    fn raw(&self) -> &[u8];

    /// Upper-case hexadecimal rendering of `raw`
    fn hex(&self) -> String {
        to_hex(self.raw())
    }

    /// Bytes following this layer's header, whether they were decoded or not
    fn payload(&self) -> &[u8];

    /// Write the human-readable dump of this layer (and nested layers)
    fn render(&self, r: &mut Renderer<'_>);

    /// Tree-shaped, line-oriented dump, each line prefixed by `indent` tabs
    fn to_readable_string(&self, indent: usize) -> String {
        let mut s = String::new();
        self.render(&mut Renderer::new(&mut s, indent));
        s
    }
}

/// Line-oriented writer for readable dumps
///
/// Every line is prefixed by one tab per indentation level. Blocks open a
/// nested renderer one level deeper.
pub struct Renderer<'a> {
    out: &'a mut String,
    indent: usize,
}

impl<'a> Renderer<'a> {
    pub fn new(out: &'a mut String, indent: usize) -> Self {
        Renderer { out, indent }
    }

    pub fn indent(&self) -> usize {
        self.indent
    }

    fn tabs(&mut self, extra: usize) {
        for _ in 0..self.indent + extra {
            self.out.push('\t');
        }
    }

    pub fn line(&mut self, text: &str) {
        self.tabs(0);
        self.out.push_str(text);
        self.out.push('\n');
    }

    pub fn field<V: fmt::Display>(&mut self, label: &str, value: V) {
        self.tabs(0);
        let _ = writeln!(self.out, "{}: {}", label, value);
    }

    pub fn flag(&mut self, label: &str, value: bool) {
        self.field(label, if value { 1 } else { 0 });
    }

    pub fn hex_field(&mut self, label: &str, data: &[u8], if_empty: &str) {
        if data.is_empty() {
            self.field(label, if_empty);
        } else {
            self.field(label, to_hex(data));
        }
    }

    /// First line of every layer
    pub fn protocol(&mut self, name: &str, kind: LayerKind) {
        self.tabs(0);
        let _ = writeln!(self.out, "Protocol: {} ({})", name, kind);
    }

    /// Open a `label: {` block; nested lines are written through the returned renderer
    pub fn block<F: FnOnce(&mut Renderer<'_>)>(&mut self, label: &str, f: F) {
        self.tabs(0);
        let _ = writeln!(self.out, "{}: {{", label);
        let mut nested = Renderer {
            out: &mut *self.out,
            indent: self.indent + 1,
        };
        f(&mut nested);
        self.line("}");
    }

    /// `Data: { ... }` block holding the next layer, or the unresolved marker
    pub fn data<L: Layer>(&mut self, next: Option<&L>, undecoded: &[u8]) {
        self.block("Data", |r| match next {
            Some(layer) => layer.render(r),
            None => {
                r.line("(NOT RESOLVED)");
                if !undecoded.is_empty() {
                    r.field("Raw", to_hex(undecoded));
                }
            }
        });
    }

    /// Trailing `Raw:` line of every layer
    pub fn raw(&mut self, raw: &[u8]) {
        self.field("Raw", to_hex(raw));
    }
}

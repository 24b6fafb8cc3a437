//! Rendering of part bytes for the cache: indented XML, everything else verbatim.

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::borrow::Cow;

/// Default ceiling above which XML is written unformatted.
pub const DEFAULT_FORMAT_LIMIT: usize = 100_000;

/// Formatting options for cached parts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Character count above which XML is left as-is
    pub format_limit: usize,
    /// Spaces per nesting level
    pub indent: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            format_limit: DEFAULT_FORMAT_LIMIT,
            indent: 2,
        }
    }
}

/// Bytes to write to a cache file for the given entry content.
///
/// Only whitespace between elements is rewritten. Text content, mixed content
/// and anything under `xml:space="preserve"` is kept byte for byte.
pub fn render<'a>(bytes: &'a [u8], options: &RenderOptions) -> Cow<'a, [u8]> {
    let Some((bom, text)) = as_xml_text(bytes) else {
        return Cow::Borrowed(bytes);
    };
    if text.chars().count() > options.format_limit {
        return Cow::Borrowed(bytes);
    }
    match pretty_print(text, options.indent) {
        Ok(formatted) => {
            let mut out = bom.to_vec();
            out.extend_from_slice(&formatted);
            Cow::Owned(out)
        }
        Err(reason) => {
            tracing::debug!(%reason, "Leaving malformed XML unformatted");
            Cow::Borrowed(bytes)
        }
    }
}

const BOM: &[u8] = b"\xEF\xBB\xBF";

/// UTF-8 text whose first non-blank character opens a tag, with its BOM split off.
fn as_xml_text(bytes: &[u8]) -> Option<(&[u8], &str)> {
    let (bom, body) = match bytes.strip_prefix(BOM) {
        Some(body) => (BOM, body),
        None => (&b""[..], bytes),
    };
    let text = std::str::from_utf8(body).ok()?;
    text.trim_start().starts_with('<').then_some((bom, text))
}

/// A parsed element with its content, or any other single event.
enum Item<'a> {
    Element {
        start: BytesStart<'a>,
        children: Vec<Item<'a>>,
        end: BytesEnd<'a>,
    },
    Leaf(Event<'a>),
}

impl Item<'_> {
    fn is_blank_text(&self) -> bool {
        matches!(self, Item::Leaf(Event::Text(t)) if t.iter().all(u8::is_ascii_whitespace))
    }

    fn is_element(&self) -> bool {
        matches!(self, Item::Element { .. } | Item::Leaf(Event::Empty(_)))
    }
}

fn parse(text: &str) -> Result<Vec<Item<'_>>, String> {
    let mut reader = Reader::from_str(text);
    let mut top = Vec::new();
    let mut open: Vec<(BytesStart<'_>, Vec<Item<'_>>)> = Vec::new();

    loop {
        let item = match reader.read_event().map_err(|e| e.to_string())? {
            Event::Eof => break,
            Event::Start(start) => {
                open.push((start, Vec::new()));
                continue;
            }
            Event::End(end) => {
                let (start, children) = open.pop().ok_or("unbalanced end tag")?;
                Item::Element {
                    start,
                    children,
                    end,
                }
            }
            other => Item::Leaf(other),
        };
        match open.last_mut() {
            Some((_, children)) => children.push(item),
            None => top.push(item),
        }
    }
    if !open.is_empty() {
        return Err("unclosed element".to_string());
    }
    Ok(top)
}

fn preserves_space(start: &BytesStart<'_>) -> bool {
    matches!(
        start.try_get_attribute("xml:space"),
        Ok(Some(attr)) if attr.value.as_ref() == b"preserve"
    )
}

/// Element-only content: at least one child element and no text apart from
/// whitespace between them.
fn indentable(start: &BytesStart<'_>, children: &[Item<'_>]) -> bool {
    !preserves_space(start)
        && children.iter().any(Item::is_element)
        && children.iter().all(|child| match child {
            Item::Leaf(Event::Text(_)) => child.is_blank_text(),
            Item::Leaf(Event::CData(_)) => false,
            _ => true,
        })
}

struct Printer {
    writer: Writer<Vec<u8>>,
    indent: usize,
}

impl Printer {
    fn newline(&mut self, depth: usize) {
        let out = self.writer.get_mut();
        out.push(b'\n');
        out.resize(out.len() + depth * self.indent, b' ');
    }

    fn write(&mut self, item: Item<'_>, depth: usize) -> Result<(), String> {
        match item {
            Item::Element {
                start,
                children,
                end,
            } if indentable(&start, &children) => {
                self.emit(Event::Start(start))?;
                for child in children.into_iter().filter(|c| !c.is_blank_text()) {
                    self.newline(depth + 1);
                    self.write(child, depth + 1)?;
                }
                self.newline(depth);
                self.emit(Event::End(end))
            }
            other => self.write_verbatim(other),
        }
    }

    fn write_verbatim(&mut self, item: Item<'_>) -> Result<(), String> {
        match item {
            Item::Element {
                start,
                children,
                end,
            } => {
                self.emit(Event::Start(start))?;
                for child in children {
                    self.write_verbatim(child)?;
                }
                self.emit(Event::End(end))
            }
            Item::Leaf(event) => self.emit(event),
        }
    }

    fn emit(&mut self, event: Event<'_>) -> Result<(), String> {
        self.writer.write_event(event).map_err(|e| e.to_string())
    }
}

fn pretty_print(text: &str, indent: usize) -> Result<Vec<u8>, String> {
    let items = parse(text)?;
    let mut printer = Printer {
        writer: Writer::new(Vec::with_capacity(text.len())),
        indent,
    };
    let mut first = true;
    for item in items.into_iter().filter(|i| !i.is_blank_text()) {
        if !first {
            printer.newline(0);
        }
        first = false;
        printer.write(item, 0)?;
    }
    Ok(printer.writer.into_inner())
}

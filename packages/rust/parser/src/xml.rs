//! Streaming XML reader.
//!
//! Only one `proceeding-entry` subtree is materialized at a time, so memory
//! stays flat no matter how large the archive document is.

use std::io::BufRead;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use ttabkit_shared::{Result, TtabError};

/// Element name that delimits one proceeding.
pub const ENTRY_TAG: &str = "proceeding-entry";

// ---------------------------------------------------------------------------
// Element
// ---------------------------------------------------------------------------

/// A small owned element tree: name, trimmed text, and children in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// First direct child with this name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All direct children with this name.
    pub fn children_named<'a, 'n>(
        &'a self,
        name: &'n str,
    ) -> impl Iterator<Item = &'a Element> + use<'a, 'n> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Non-empty trimmed text of the first direct child with this name.
    pub fn child_text<'a>(&'a self, name: &str) -> Option<&'a str> {
        self.children_named(name)
            .map(|c| c.text.trim())
            .find(|t| !t.is_empty())
    }

    /// Follow a `/`-separated path of direct children, fanning out at every step.
    pub fn select<'a>(&'a self, path: &str) -> Vec<&'a Element> {
        let mut current = vec![self];
        for step in path.split('/').filter(|s| !s.is_empty()) {
            current = current
                .into_iter()
                .flat_map(|e| e.children.iter().filter(move |c| c.name == step))
                .collect();
        }
        current
    }

    /// Every descendant with this name, depth-first in document order.
    pub fn descendants_named<'a>(&'a self, name: &str) -> Vec<&'a Element> {
        let mut found = Vec::new();
        collect_named(self, name, &mut found);
        found
    }

    /// All text in the subtree, space separated.
    pub fn text_content(&self) -> String {
        let mut parts = Vec::new();
        collect_text(self, &mut parts);
        parts.join(" ")
    }
}

fn collect_named<'a>(element: &'a Element, name: &str, out: &mut Vec<&'a Element>) {
    for child in &element.children {
        if child.name == name {
            out.push(child);
        }
        collect_named(child, name, out);
    }
}

fn collect_text<'a>(element: &'a Element, out: &mut Vec<&'a str>) {
    let text = element.text.trim();
    if !text.is_empty() {
        out.push(text);
    }
    for child in &element.children {
        collect_text(child, out);
    }
}

// ---------------------------------------------------------------------------
// EntryReader
// ---------------------------------------------------------------------------

/// Iterator over the `proceeding-entry` elements of one document.
///
/// A syntax error is yielded once and ends the iteration; entries read
/// before the error have already been handed out.
pub struct EntryReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    done: bool,
}

impl<R: BufRead> EntryReader<R> {
    pub fn new(source: R) -> Self {
        Self {
            reader: Reader::from_reader(source),
            buf: Vec::new(),
            done: false,
        }
    }

    fn next_entry(&mut self) -> Result<Option<Element>> {
        let mut stack: Vec<Element> = Vec::new();
        loop {
            self.buf.clear();
            let event = self.reader.read_event_into(&mut self.buf).map_err(|e| {
                TtabError::parse(format!(
                    "XML error at byte {}: {e}",
                    self.reader.buffer_position()
                ))
            })?;

            match event {
                Event::Start(start) => {
                    let name = local_name(&start);
                    if !stack.is_empty() || name == ENTRY_TAG {
                        stack.push(Element::new(name));
                    }
                }
                Event::Empty(start) => {
                    let name = local_name(&start);
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(Element::new(name));
                    } else if name == ENTRY_TAG {
                        return Ok(Some(Element::new(name)));
                    }
                }
                Event::Text(text) => {
                    if let Some(current) = stack.last_mut() {
                        let decoded = text
                            .unescape()
                            .map(|c| c.into_owned())
                            .unwrap_or_else(|_| String::from_utf8_lossy(&text).into_owned());
                        push_text(current, &decoded);
                    }
                }
                Event::CData(data) => {
                    if let Some(current) = stack.last_mut() {
                        push_text(current, &String::from_utf8_lossy(&data.into_inner()));
                    }
                }
                Event::End(_) => {
                    if let Some(finished) = stack.pop() {
                        match stack.last_mut() {
                            Some(parent) => parent.children.push(finished),
                            None => return Ok(Some(finished)),
                        }
                    }
                }
                Event::Eof => {
                    if stack.is_empty() {
                        return Ok(None);
                    }
                    return Err(TtabError::parse("unexpected end of document inside an entry"));
                }
                _ => {}
            }
        }
    }
}

impl<R: BufRead> Iterator for EntryReader<R> {
    type Item = Result<Element>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

fn local_name(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.local_name().as_ref()).into_owned()
}

fn push_text(element: &mut Element, raw: &str) {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return;
    }
    if !element.text.is_empty() {
        element.text.push(' ');
    }
    element.text.push_str(trimmed);
}

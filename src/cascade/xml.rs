//! Minimal element tree over OpenCV `FileStorage` XML.
//!
//! Cascade files only use elements and text (no meaningful attributes or mixed
//! content), so the tree keeps element names, concatenated text and children.

use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

#[derive(Debug, Default)]
pub(crate) struct XmlNode {
    pub name: String,
    pub text: String,
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    fn open(start: &BytesStart<'_>) -> Self {
        Self {
            name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            ..Self::default()
        }
    }

    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn require(&self, name: &str) -> Result<&XmlNode> {
        self.child(name)
            .ok_or_else(|| anyhow!("<{}> is missing <{}>", self.name, name))
    }

    /// Sequence entries (`<_>` elements).
    pub fn items(&self) -> impl Iterator<Item = &XmlNode> {
        self.children.iter().filter(|c| c.name == "_")
    }

    pub fn value<T: FromStr>(&self) -> Result<T> {
        let text = self.text.trim();
        text.parse()
            .map_err(|_| anyhow!("<{}>: cannot parse '{}'", self.name, text))
    }

    /// Whitespace-separated numeric list.
    pub fn values<T: FromStr>(&self) -> Result<Vec<T>> {
        self.text
            .split_whitespace()
            .map(|tok| {
                tok.parse()
                    .map_err(|_| anyhow!("<{}>: cannot parse '{}'", self.name, tok))
            })
            .collect()
    }
}

/// Parse a whole document. The returned node is a synthetic root whose children are
/// the document's top-level elements.
pub(crate) fn parse_document(doc: &str) -> Result<XmlNode> {
    let mut reader = Reader::from_str(doc);
    reader.trim_text(true);

    let mut stack = vec![XmlNode::default()];
    loop {
        let event = reader
            .read_event()
            .with_context(|| format!("malformed XML near byte {}", reader.buffer_position()))?;
        match event {
            Event::Start(start) => stack.push(XmlNode::open(&start)),
            Event::Empty(start) => {
                let node = XmlNode::open(&start);
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(node);
                }
            }
            Event::End(_) => {
                let node = stack
                    .pop()
                    .ok_or_else(|| anyhow!("unbalanced closing tag"))?;
                let parent = stack
                    .last_mut()
                    .ok_or_else(|| anyhow!("unbalanced closing tag </{}>", node.name))?;
                parent.children.push(node);
            }
            Event::Text(text) => {
                let text = text.unescape().context("invalid XML text")?;
                if let Some(node) = stack.last_mut() {
                    if !node.text.is_empty() {
                        node.text.push(' ');
                    }
                    node.text.push_str(&text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if stack.len() != 1 {
        bail!("unclosed element <{}>", stack.last().map(|n| n.name.as_str()).unwrap_or(""));
    }
    stack.pop().ok_or_else(|| anyhow!("empty document"))
}

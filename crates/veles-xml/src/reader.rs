//! Parse XML text into an [`XmlDocument`].

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::document::{NodeId, XmlDocument};
use crate::name::{XName, XML_NAMESPACE};
use crate::{Error, Result};

/// An element being read, with the namespace declarations it introduced.
struct OpenElement {
    node: NodeId,
    declarations: Vec<(String, String)>,
    preserve_space: bool,
    /// Whether anything at all was read between the start and end tags.
    has_content: bool,
}

impl XmlDocument {
    /// Parse XML text into a document.
    ///
    /// # Example
    ///
    /// ```
    /// use veles_xml::{XName, XmlDocument};
    ///
    /// let xml = r#"<?xml version="1.0"?>
    /// <Person xmlns:p="urn:people" p:id="7">
    ///     <Name>Ada</Name>
    /// </Person>"#;
    ///
    /// let doc = XmlDocument::parse(xml).unwrap();
    /// let root = doc.root().unwrap();
    /// assert_eq!(doc.attribute(root, &XName::qualified("urn:people", "id")), Some("7"));
    /// ```
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        let mut doc = XmlDocument::new();
        let mut stack: Vec<OpenElement> = Vec::new();

        loop {
            let position = reader.buffer_position() as u64;
            let event = reader.read_event().map_err(|e| Error::Syntax {
                position,
                message: e.to_string(),
            })?;

            match event {
                Event::Start(e) => {
                    let open = open_element(&mut doc, &stack, &e, position)?;
                    attach(&mut doc, &mut stack, open.node)?;
                    stack.push(open);
                }
                Event::Empty(e) => {
                    let open = open_element(&mut doc, &stack, &e, position)?;
                    attach(&mut doc, &mut stack, open.node)?;
                }
                Event::End(_) => {
                    // `<a></a>` keeps an empty text node so it differs from `<a/>`.
                    if let Some(open) = stack.pop().filter(|open| !open.has_content) {
                        doc.add_text(open.node, String::new());
                    }
                }
                Event::Text(e) => {
                    if let Some(open) = stack.last_mut() {
                        open.has_content = true;
                        let text = e.unescape().map_err(|e| Error::Syntax {
                            position,
                            message: e.to_string(),
                        })?;
                        if open.preserve_space || !text.trim().is_empty() {
                            doc.add_text(open.node, text.into_owned());
                        }
                    }
                }
                Event::CData(e) => {
                    if let Some(open) = stack.last_mut() {
                        open.has_content = true;
                        let text = std::str::from_utf8(&e.into_inner())?.to_string();
                        doc.add_cdata(open.node, text);
                    }
                }
                Event::Comment(e) => {
                    let text = String::from_utf8_lossy(&e).into_owned();
                    match stack.last_mut() {
                        Some(open) => {
                            open.has_content = true;
                            doc.add_comment(open.node, text);
                        }
                        None if doc.root().is_none() => doc.add_prolog_comment(text),
                        None => {}
                    }
                }
                Event::Eof => {
                    if let Some(name) = stack.last().and_then(|open| doc.name(open.node)) {
                        return Err(Error::Syntax {
                            position,
                            message: format!("element {} is not closed", name),
                        });
                    }
                    break;
                }
                _ => {} // Declarations, processing instructions, doctype
            }
        }

        if doc.root().is_none() {
            return Err(Error::NoRoot);
        }
        Ok(doc)
    }

    /// Parse XML bytes into a document.
    pub fn parse_bytes(xml: &[u8]) -> Result<Self> {
        let xml_str = std::str::from_utf8(xml)?;
        Self::parse(xml_str)
    }

    /// Read and parse an XML document from a reader.
    pub fn read_from<R: std::io::Read>(mut reader: R) -> Result<Self> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        Self::parse(&text)
    }
}

fn attach(doc: &mut XmlDocument, stack: &mut [OpenElement], node: NodeId) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => {
            parent.has_content = true;
            doc.append_child(parent.node, node);
        }
        None if doc.root().is_none() => doc.set_root(node),
        None => {
            return Err(Error::Syntax {
                position: 0,
                message: "multiple root elements".to_string(),
            })
        }
    }
    Ok(())
}

fn open_element(
    doc: &mut XmlDocument,
    stack: &[OpenElement],
    start: &BytesStart<'_>,
    position: u64,
) -> Result<OpenElement> {
    let mut raw_attributes = Vec::new();
    let mut declarations = Vec::new();

    for attr in start.attributes() {
        let attr = attr.map_err(|e| Error::Syntax {
            position,
            message: e.to_string(),
        })?;
        let key = std::str::from_utf8(attr.key.as_ref())?.to_string();
        let value = attr
            .unescape_value()
            .map_err(|e| Error::Syntax {
                position,
                message: e.to_string(),
            })?
            .into_owned();

        if key == "xmlns" {
            declarations.push((String::new(), value.clone()));
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            declarations.push((prefix.to_string(), value.clone()));
        }
        raw_attributes.push((key, value));
    }

    let lookup = |prefix: &str| -> Option<String> {
        if prefix == "xml" {
            return Some(XML_NAMESPACE.to_string());
        }
        declarations
            .iter()
            .rev()
            .chain(stack.iter().rev().flat_map(|o| o.declarations.iter().rev()))
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.clone())
            .filter(|uri| !uri.is_empty())
    };

    let raw_name = std::str::from_utf8(start.name().as_ref())?.to_string();
    let name = match raw_name.split_once(':') {
        Some((prefix, local)) => {
            let ns = lookup(prefix).ok_or_else(|| Error::UnboundPrefix(prefix.to_string()))?;
            XName::qualified(ns, local)
        }
        None => XName::new(raw_name.as_str()).with_namespace(lookup("")),
    };

    let mut preserve_space = stack.last().map(|o| o.preserve_space).unwrap_or(false);
    let mut attributes = Vec::with_capacity(raw_attributes.len());
    for (key, value) in raw_attributes {
        let attr_name = if key == "xmlns" {
            XName::new("xmlns")
        } else {
            match key.split_once(':') {
                Some(("xmlns", prefix)) => XName::xmlns(prefix),
                Some((prefix, local)) => {
                    let ns = lookup(prefix).ok_or_else(|| Error::UnboundPrefix(prefix.to_string()))?;
                    XName::qualified(ns, local)
                }
                None => XName::new(key.as_str()),
            }
        };
        if attr_name == XName::xml_space() {
            preserve_space = value == "preserve";
        }
        attributes.push((attr_name, value));
    }

    let node = doc.create_element(name);
    for (attr_name, value) in attributes {
        doc.set_attribute(node, attr_name, value);
    }

    Ok(OpenElement {
        node,
        declarations,
        preserve_space,
        has_content: false,
    })
}

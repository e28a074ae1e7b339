//! Write an [`XmlDocument`] as XML text.

use std::io::Write;

use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::document::{NodeId, NodeKind, XmlDocument};
use crate::name::{XName, XMLNS_NAMESPACE, XML_NAMESPACE};
use crate::{Error, Result};

impl XmlDocument {
    /// Convert to an indented XML string.
    pub fn to_xml_string(&self) -> Result<String> {
        self.to_string_with(true)
    }

    /// Convert to an XML string without indentation.
    pub fn to_xml_string_compact(&self) -> Result<String> {
        self.to_string_with(false)
    }

    fn to_string_with(&self, indent: bool) -> Result<String> {
        let mut output = Vec::new();
        self.write_xml(&mut output, indent)?;
        String::from_utf8(output).map_err(|e| Error::Write(e.to_string()))
    }

    /// Write XML to a writer.
    pub fn write_xml<W: Write>(&self, writer: W, indent: bool) -> Result<()> {
        let mut xml_writer = if indent {
            Writer::new_with_indent(writer, b' ', 2)
        } else {
            Writer::new(writer)
        };

        xml_writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
            .map_err(write_error)?;

        for comment in self.prolog_comments() {
            xml_writer
                .write_event(Event::Comment(BytesText::from_escaped(comment.as_str())))
                .map_err(write_error)?;
        }

        if let Some(root) = self.root() {
            let mut scope = NamespaceScope::default();
            self.write_element(&mut xml_writer, root, &mut scope)?;
        }

        Ok(())
    }

    /// Write a single element and its children.
    fn write_element<W: Write>(
        &self,
        writer: &mut Writer<W>,
        node: NodeId,
        scope: &mut NamespaceScope,
    ) -> Result<()> {
        let Some(data) = self.element(node) else {
            return Ok(());
        };

        scope.enter();
        for attr in &data.attributes {
            if attr.name.namespace.as_deref() == Some(XMLNS_NAMESPACE) {
                scope.declare(&attr.name.local, &attr.value);
            } else if attr.name == XName::new("xmlns") {
                scope.declare("", &attr.value);
            }
        }

        let mut extra = Vec::new();
        let tag_name = scope.element_name(&data.name, &mut extra);

        let mut attributes = Vec::with_capacity(data.attributes.len());
        for attr in &data.attributes {
            let key = if attr.name.is_xmlns() {
                if attr.name.local == "xmlns" && attr.name.namespace.is_none() {
                    "xmlns".to_string()
                } else {
                    format!("xmlns:{}", attr.name.local)
                }
            } else {
                scope.attribute_name(&attr.name, &mut extra)
            };
            attributes.push((key, attr.value.as_str()));
        }

        let mut elem = BytesStart::new(tag_name.as_str());
        for (key, value) in &extra {
            elem.push_attribute((key.as_str(), value.as_str()));
        }
        for (key, value) in &attributes {
            elem.push_attribute((key.as_str(), *value));
        }

        if data.children.is_empty() {
            writer.write_event(Event::Empty(elem)).map_err(write_error)?;
        } else {
            writer.write_event(Event::Start(elem)).map_err(write_error)?;

            for &child in &data.children {
                match self.kind(child) {
                    NodeKind::Element(_) => self.write_element(writer, child, scope)?,
                    NodeKind::Text(text) => writer
                        .write_event(Event::Text(BytesText::new(text)))
                        .map_err(write_error)?,
                    NodeKind::CData(text) => writer
                        .write_event(Event::CData(BytesCData::new(text.as_str())))
                        .map_err(write_error)?,
                    NodeKind::Comment(text) => writer
                        .write_event(Event::Comment(BytesText::from_escaped(text.as_str())))
                        .map_err(write_error)?,
                }
            }

            writer
                .write_event(Event::End(BytesEnd::new(tag_name.as_str())))
                .map_err(write_error)?;
        }

        scope.leave();
        Ok(())
    }
}

fn write_error(e: impl std::fmt::Display) -> Error {
    Error::Write(e.to_string())
}

/// Prefix bindings in scope while writing.
#[derive(Default)]
struct NamespaceScope {
    frames: Vec<Vec<(String, String)>>,
    generated: usize,
}

impl NamespaceScope {
    fn enter(&mut self) {
        self.frames.push(Vec::new());
    }

    fn leave(&mut self) {
        self.frames.pop();
    }

    fn declare(&mut self, prefix: &str, uri: &str) {
        if let Some(frame) = self.frames.last_mut() {
            frame.push((prefix.to_string(), uri.to_string()));
        }
    }

    fn bindings(&self) -> impl Iterator<Item = &(String, String)> {
        self.frames.iter().rev().flat_map(|f| f.iter().rev())
    }

    fn uri_of(&self, prefix: &str) -> Option<&str> {
        self.bindings()
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.as_str())
    }

    /// Find a prefix bound to `uri` whose binding is not shadowed.
    fn prefix_of(&self, uri: &str, allow_default: bool) -> Option<String> {
        self.bindings()
            .filter(|(p, u)| u == uri && (allow_default || !p.is_empty()))
            .find(|(p, _)| self.uri_of(p) == Some(uri))
            .map(|(p, _)| p.clone())
    }

    fn generate(&mut self, uri: &str, extra: &mut Vec<(String, String)>) -> String {
        loop {
            self.generated += 1;
            let prefix = format!("ns{}", self.generated);
            if self.uri_of(&prefix).is_none() {
                self.declare(&prefix, uri);
                extra.push((format!("xmlns:{}", prefix), uri.to_string()));
                return prefix;
            }
        }
    }

    fn element_name(&mut self, name: &XName, extra: &mut Vec<(String, String)>) -> String {
        match &name.namespace {
            None => {
                if self.uri_of("").is_some_and(|u| !u.is_empty()) {
                    self.declare("", "");
                    extra.push(("xmlns".to_string(), String::new()));
                }
                name.local.clone()
            }
            Some(uri) if uri == XML_NAMESPACE => format!("xml:{}", name.local),
            Some(uri) => {
                let prefix = match self.prefix_of(uri, true) {
                    Some(p) => p,
                    None => self.generate(uri, extra),
                };
                qualify(&prefix, &name.local)
            }
        }
    }

    fn attribute_name(&mut self, name: &XName, extra: &mut Vec<(String, String)>) -> String {
        match &name.namespace {
            None => name.local.clone(),
            Some(uri) if uri == XML_NAMESPACE => format!("xml:{}", name.local),
            Some(uri) => {
                let prefix = match self.prefix_of(uri, false) {
                    Some(p) => p,
                    None => self.generate(uri, extra),
                };
                qualify(&prefix, &name.local)
            }
        }
    }
}

fn qualify(prefix: &str, local: &str) -> String {
    if prefix.is_empty() {
        local.to_string()
    } else {
        format!("{}:{}", prefix, local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_simple() {
        let mut doc = XmlDocument::with_root("Root");
        let root = doc.root().unwrap();
        doc.set_attribute(root, "version", "1.0");
        let child = doc.add_element(root, "Child");
        doc.add_text(child, "a < b");

        let xml = doc.to_xml_string_compact().unwrap();
        assert_eq!(
            xml,
            r#"<?xml version="1.0" encoding="utf-8"?><Root version="1.0"><Child>a &lt; b</Child></Root>"#
        );
    }

    #[test]
    fn test_write_declared_prefix() {
        let mut doc = XmlDocument::with_root(XName::qualified("urn:a", "Root"));
        let root = doc.root().unwrap();
        doc.set_attribute(root, XName::xmlns("a"), "urn:a");
        doc.set_attribute(root, XName::qualified("urn:a", "id"), "1");

        let xml = doc.to_xml_string_compact().unwrap();
        assert!(xml.contains(r#"<a:Root xmlns:a="urn:a" a:id="1"/>"#), "{}", xml);
    }

    #[test]
    fn test_write_generates_prefix() {
        let mut doc = XmlDocument::with_root("Root");
        let root = doc.root().unwrap();
        doc.add_element(root, XName::qualified("urn:x", "Item"));

        let xml = doc.to_xml_string_compact().unwrap();
        assert!(xml.contains(r#"<ns1:Item xmlns:ns1="urn:x"/>"#), "{}", xml);
    }

    #[test]
    fn test_write_then_read() {
        let mut doc = XmlDocument::with_root(XName::qualified("urn:a", "Root"));
        let root = doc.root().unwrap();
        doc.set_attribute(root, XName::xmlns("a"), "urn:a");
        let child = doc.add_element(root, XName::qualified("urn:a", "Child"));
        doc.add_cdata(child, "<raw/>");
        doc.add_comment(root, "note");
        doc.add_prolog_comment("generated");

        let xml = doc.to_xml_string().unwrap();
        let parsed = XmlDocument::parse(&xml).unwrap();
        let parsed_root = parsed.root().unwrap();
        assert_eq!(parsed.name(parsed_root), Some(&XName::qualified("urn:a", "Root")));

        let parsed_child = parsed
            .first_child(parsed_root, &XName::qualified("urn:a", "Child"))
            .unwrap();
        assert_eq!(parsed.text(parsed_child), "<raw/>");
        assert_eq!(parsed.prolog_comments(), ["generated"]);
    }
}

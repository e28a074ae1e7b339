//! Namespace-qualified XML names.

use std::fmt;

/// Namespace URI reserved for `xmlns` declarations.
pub const XMLNS_NAMESPACE: &str = "http://www.w3.org/2000/xmlns/";

/// Namespace URI bound to the `xml` prefix.
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// A qualified XML name: an optional namespace URI plus a local name.
///
/// Prefixes are not part of the name. They are a serialization concern and
/// are resolved from `xmlns` declarations when writing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct XName {
    /// Namespace URI, if any.
    pub namespace: Option<String>,
    /// Local part of the name.
    pub local: String,
}

impl XName {
    /// Create a name without a namespace.
    pub fn new(local: impl Into<String>) -> Self {
        Self {
            namespace: None,
            local: local.into(),
        }
    }

    /// Create a name in the given namespace.
    pub fn qualified(namespace: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            local: local.into(),
        }
    }

    /// Parse a name in Clark notation (`{uri}local`), or a plain local name.
    pub fn parse(s: &str) -> Self {
        if let Some(rest) = s.strip_prefix('{') {
            if let Some(end) = rest.find('}') {
                let namespace = &rest[..end];
                let local = &rest[end + 1..];
                if namespace.is_empty() {
                    return Self::new(local);
                }
                return Self::qualified(namespace, local);
            }
        }
        Self::new(s)
    }

    /// Name of an `xmlns:prefix` declaration attribute.
    pub fn xmlns(prefix: &str) -> Self {
        Self::qualified(XMLNS_NAMESPACE, prefix)
    }

    /// Name of the `xml:space` attribute.
    pub fn xml_space() -> Self {
        Self::qualified(XML_NAMESPACE, "space")
    }

    /// Return the same local name moved into `namespace`.
    pub fn with_namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace;
        self
    }

    /// Check whether this is a namespace declaration attribute name.
    pub fn is_xmlns(&self) -> bool {
        self.namespace.as_deref() == Some(XMLNS_NAMESPACE)
            || (self.namespace.is_none() && self.local == "xmlns")
    }

    /// Check whether the name has no namespace.
    #[inline]
    pub fn is_local(&self) -> bool {
        self.namespace.is_none()
    }
}

impl fmt::Display for XName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{}}}{}", ns, self.local),
            None => write!(f, "{}", self.local),
        }
    }
}

impl From<&str> for XName {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl From<String> for XName {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

/// Encode a string as a valid XML element name.
///
/// Characters that are not allowed in names are replaced with underscores.
pub fn encode_xml_name(name: &str) -> String {
    let mut result = String::with_capacity(name.len());

    for (i, c) in name.chars().enumerate() {
        if i == 0 {
            // First character must be letter or underscore
            if c.is_alphabetic() || c == '_' {
                result.push(c);
            } else {
                result.push('_');
                if c.is_alphanumeric() {
                    result.push(c);
                }
            }
        } else if c.is_alphanumeric() || c == '_' || c == '-' || c == '.' {
            result.push(c);
        } else {
            result.push('_');
        }
    }

    if result.is_empty() {
        result.push_str("Element");
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_clark_notation() {
        let name = XName::parse("{urn:test}Item");
        assert_eq!(name.namespace.as_deref(), Some("urn:test"));
        assert_eq!(name.local, "Item");
        assert_eq!(name.to_string(), "{urn:test}Item");
    }

    #[test]
    fn test_parse_local() {
        let name = XName::parse("Item");
        assert!(name.is_local());
        assert_eq!(name, XName::new("Item"));
        assert_eq!(XName::parse("{}Item"), XName::new("Item"));
    }

    #[test]
    fn test_xmlns_names() {
        assert!(XName::xmlns("p").is_xmlns());
        assert!(XName::new("xmlns").is_xmlns());
        assert!(!XName::new("xmlnsfoo").is_xmlns());
    }

    #[test]
    fn test_encode_xml_name() {
        assert_eq!(encode_xml_name("Valid_Name"), "Valid_Name");
        assert_eq!(encode_xml_name("1abc"), "_1abc");
        assert_eq!(encode_xml_name("a<b>"), "a_b_");
        assert_eq!(encode_xml_name(""), "Element");
    }
}

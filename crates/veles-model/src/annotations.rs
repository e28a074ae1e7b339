//! Declarative annotations attached to types and members.
//!
//! Annotations are applied to a freshly derived descriptor in priority
//! order, so that later annotations can depend on earlier ones: a custom
//! serializer or collection style decides whether a member may be placed in
//! an attribute at all.

use veles_xml::XName;

use crate::{Severity, Value};

/// Where a member is placed relative to its owner's element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SerializationTarget {
    /// A child element.
    #[default]
    Element,
    /// An attribute of the element at the member's location.
    Attribute,
    /// The text content of the element at the member's location.
    Value,
}

/// How a collection is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CollectionStyle {
    /// One child element per item inside a containing element.
    #[default]
    Recursive,
    /// One element per item, directly under the owner's element.
    RecursiveWithNoContainingElement,
    /// All items joined in a single text value.
    Serially,
}

/// Layout of a collection member or collection type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionAttr {
    /// Item layout.
    pub style: CollectionStyle,
    /// Element name for each item; defaults to the item type's alias.
    pub each_element_name: Option<XName>,
    /// Separator for [`CollectionStyle::Serially`].
    pub separator: String,
    /// Also split on any whitespace when reading serial items.
    pub whitespace_is_separator: bool,
}

impl Default for CollectionAttr {
    fn default() -> Self {
        Self {
            style: CollectionStyle::Recursive,
            each_element_name: None,
            separator: " ".to_string(),
            whitespace_is_separator: true,
        }
    }
}

impl CollectionAttr {
    /// Create with the given style.
    pub fn new(style: CollectionStyle) -> Self {
        Self {
            style,
            ..Self::default()
        }
    }

    /// Items joined in text with `separator`.
    pub fn serially(separator: impl Into<String>) -> Self {
        Self {
            style: CollectionStyle::Serially,
            separator: separator.into(),
            ..Self::default()
        }
    }

    /// Set the per-item element name.
    pub fn each_element(mut self, name: impl Into<XName>) -> Self {
        self.each_element_name = Some(name.into());
        self
    }

    /// Set whether whitespace also separates serial items.
    pub fn whitespace_separator(mut self, enabled: bool) -> Self {
        self.whitespace_is_separator = enabled;
        self
    }
}

/// Placement of a dictionary key or value within its pair element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Placement {
    /// An attribute of the pair element.
    Attribute,
    /// The text content of the pair element.
    Content,
    /// A child element of the pair element.
    #[default]
    Element,
}

/// Layout of a dictionary member.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct DictionaryAttr {
    /// Element name of each pair; defaults to the pair type's alias.
    pub each_pair_name: Option<XName>,
    /// Name of the key node; defaults to `Key`.
    pub key_name: Option<XName>,
    /// Name of the value node; defaults to `Value`.
    pub value_name: Option<XName>,
    /// Where the key goes.
    pub key_placement: Placement,
    /// Where the value goes.
    pub value_placement: Placement,
    /// Format string for keys.
    pub key_format: Option<String>,
    /// Format string for values.
    pub value_format: Option<String>,
}

impl DictionaryAttr {
    /// Set the pair element name.
    pub fn each_pair(mut self, name: impl Into<XName>) -> Self {
        self.each_pair_name = Some(name.into());
        self
    }

    /// Set the key node name and placement.
    pub fn key(mut self, name: impl Into<XName>, placement: Placement) -> Self {
        self.key_name = Some(name.into());
        self.key_placement = placement;
        self
    }

    /// Set the value node name and placement.
    pub fn value(mut self, name: impl Into<XName>, placement: Placement) -> Self {
        self.value_name = Some(name.into());
        self.value_placement = placement;
        self
    }

    /// Set key and value format strings.
    pub fn formats(mut self, key: Option<&str>, value: Option<&str>) -> Self {
        self.key_format = key.map(str::to_string);
        self.value_format = value.map(str::to_string);
        self
    }

    /// Effective key node name.
    pub fn key_name(&self) -> XName {
        self.key_name.clone().unwrap_or_else(|| XName::new("Key"))
    }

    /// Effective value node name.
    pub fn value_name(&self) -> XName {
        self.value_name.clone().unwrap_or_else(|| XName::new("Value"))
    }
}

/// How text values are embedded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextEmbedding {
    /// Escaped character data.
    #[default]
    None,
    /// A CDATA section.
    CData,
    /// Base64 of the UTF-8 bytes.
    Base64,
}

/// What to do when an object graph references itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CyclePolicy {
    /// Write an empty element at the repeated reference.
    Skip,
    /// Fail the operation.
    Throw,
}

/// A namespace URI with an optional preferred prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamespaceDecl {
    /// Preferred prefix; a default namespace when `None`.
    pub prefix: Option<String>,
    /// Namespace URI.
    pub uri: String,
}

/// Annotation on a member.
#[derive(Debug, Clone, PartialEq)]
pub enum MemberAttr {
    /// Use the custom serializer registered under this key.
    CustomSerializer(String),
    /// Collection layout.
    Collection(CollectionAttr),
    /// Dictionary layout.
    Dictionary(DictionaryAttr),
    /// Treat a collection-typed member as a plain composite.
    NotCollection,
    /// Rename the member's node.
    Alias(XName),
    /// Put the member's node in a namespace.
    Namespace(NamespaceDecl),
    /// Serialize as an attribute of the element at this location.
    AttributeFor(String),
    /// Serialize as the text of the element at this location.
    ValueFor(String),
    /// Serialize as an element under this location.
    ElementFor(String),
    /// Ordering key; lower keys are written first.
    Order(i32),
    /// Severity when missing, with an optional default to assign instead.
    ErrorIfMissed {
        treatment: Severity,
        default: Option<Value>,
    },
    /// Format string for the member's text.
    Format(String),
    /// Comment written before the member's element.
    Comment(String),
    /// Never serialize this member.
    DontSerialize,
    /// Skip this member when it is null.
    DontSerializeIfNull,
    /// Use `alias` as element name when the runtime type is `type_name`.
    RealType { type_name: String, alias: XName },
    /// Mark the element `xml:space="preserve"`.
    PreserveWhitespace,
    /// Text embedding of the member's value.
    TextEmbedding(TextEmbedding),
}

impl MemberAttr {
    /// Application priority; lower applies first.
    pub fn priority(&self) -> u8 {
        match self {
            Self::CustomSerializer(_) => 0,
            Self::Collection(_) | Self::Dictionary(_) | Self::NotCollection => 1,
            Self::AttributeFor(_) | Self::ValueFor(_) | Self::ElementFor(_) => 2,
            _ => 3,
        }
    }
}

/// Annotation on a type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeAttr {
    /// Rename the type's element.
    Alias(XName),
    /// Put the type's element in a namespace.
    Namespace(NamespaceDecl),
    /// Comment written in the document prolog.
    Comment(String),
    /// Use the custom serializer registered under this key.
    CustomSerializer(String),
    /// Collection layout for a collection type.
    Collection(CollectionAttr),
    /// Treat a collection subclass as a plain composite.
    NotCollection,
    /// Behavior on self-references.
    CyclePolicy(CyclePolicy),
    /// Override null serialization for this type's members.
    SerializeNullObjects(bool),
    /// Never write metadata attributes for this type.
    SuppressMetadata,
    /// Mark the element `xml:space="preserve"`.
    PreserveWhitespace,
}

impl TypeAttr {
    /// Application priority; lower applies first.
    pub fn priority(&self) -> u8 {
        match self {
            Self::CustomSerializer(_) => 0,
            Self::Collection(_) | Self::NotCollection => 1,
            _ => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_priority_order() {
        let mut attrs = vec![
            MemberAttr::Order(1),
            MemberAttr::AttributeFor(".".into()),
            MemberAttr::Collection(CollectionAttr::serially(",")),
            MemberAttr::CustomSerializer("x".into()),
        ];
        attrs.sort_by_key(MemberAttr::priority);
        assert!(matches!(attrs[0], MemberAttr::CustomSerializer(_)));
        assert!(matches!(attrs[1], MemberAttr::Collection(_)));
        assert!(matches!(attrs[2], MemberAttr::AttributeFor(_)));
    }

    #[test]
    fn test_dictionary_defaults() {
        let attr = DictionaryAttr::default().key("Name", Placement::Attribute);
        assert_eq!(attr.key_name(), XName::new("Name"));
        assert_eq!(attr.value_name(), XName::new("Value"));
        assert_eq!(attr.value_placement, Placement::Element);
    }
}

//! Type definitions registered with a [`TypeRegistry`](crate::TypeRegistry).
//!
//! Definitions are the reflection data the engine works from: which members
//! a class has, their declared types, and the annotations on both.
//!
//! # Example
//!
//! ```
//! use veles_model::{ClassDef, MemberDef};
//!
//! let person = ClassDef::new("Person")
//!     .member(MemberDef::new("Name", "string").attribute_for("."))
//!     .member(MemberDef::new("Age", "i32"))
//!     .member(MemberDef::new("Tags", "List<string>").serially(","));
//! assert_eq!(person.members.len(), 3);
//! ```

use veles_xml::XName;

use crate::annotations::{
    CollectionAttr, CyclePolicy, DictionaryAttr, MemberAttr, NamespaceDecl, TextEmbedding, TypeAttr,
};
use crate::{Severity, Value};

/// A member (field or property) of a class.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberDef {
    /// Member name.
    pub name: String,
    /// Declared type name.
    pub type_name: String,
    /// Whether the member has a getter.
    pub readable: bool,
    /// Whether the member has a setter.
    pub writable: bool,
    /// Annotations in declaration order.
    pub annotations: Vec<MemberAttr>,
}

impl MemberDef {
    /// Create a readable and writable member.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            readable: true,
            writable: true,
            annotations: Vec::new(),
        }
    }

    /// Add an annotation.
    pub fn with(mut self, attr: MemberAttr) -> Self {
        self.annotations.push(attr);
        self
    }

    /// Mark the member as having no setter.
    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    /// Mark the member as having no getter.
    pub fn write_only(mut self) -> Self {
        self.readable = false;
        self
    }

    /// Rename the member's node.
    pub fn alias(self, alias: impl Into<XName>) -> Self {
        self.with(MemberAttr::Alias(alias.into()))
    }

    /// Serialize as an attribute of the element at `location`.
    pub fn attribute_for(self, location: impl Into<String>) -> Self {
        self.with(MemberAttr::AttributeFor(location.into()))
    }

    /// Serialize as the text of the element at `location`.
    pub fn value_for(self, location: impl Into<String>) -> Self {
        self.with(MemberAttr::ValueFor(location.into()))
    }

    /// Serialize as an element under `location`.
    pub fn element_for(self, location: impl Into<String>) -> Self {
        self.with(MemberAttr::ElementFor(location.into()))
    }

    /// Set the ordering key.
    pub fn order(self, order: i32) -> Self {
        self.with(MemberAttr::Order(order))
    }

    /// Set the missing-member treatment and default.
    pub fn error_if_missed(self, treatment: Severity, default: Option<Value>) -> Self {
        self.with(MemberAttr::ErrorIfMissed { treatment, default })
    }

    /// Assign `default` without reporting when the member is missing.
    pub fn default_value(self, default: impl Into<Value>) -> Self {
        self.error_if_missed(Severity::Ignore, Some(default.into()))
    }

    /// Set a format string.
    pub fn format(self, format: impl Into<String>) -> Self {
        self.with(MemberAttr::Format(format.into()))
    }

    /// Add a comment line.
    pub fn comment(self, text: impl Into<String>) -> Self {
        self.with(MemberAttr::Comment(text.into()))
    }

    /// Never serialize the member.
    pub fn dont_serialize(self) -> Self {
        self.with(MemberAttr::DontSerialize)
    }

    /// Skip the member when null.
    pub fn dont_serialize_if_null(self) -> Self {
        self.with(MemberAttr::DontSerializeIfNull)
    }

    /// Use a custom serializer.
    pub fn custom_serializer(self, key: impl Into<String>) -> Self {
        self.with(MemberAttr::CustomSerializer(key.into()))
    }

    /// Set the collection layout.
    pub fn collection(self, attr: CollectionAttr) -> Self {
        self.with(MemberAttr::Collection(attr))
    }

    /// Lay out the collection as a single separated text value.
    pub fn serially(self, separator: impl Into<String>) -> Self {
        self.collection(CollectionAttr::serially(separator))
    }

    /// Set the dictionary layout.
    pub fn dictionary(self, attr: DictionaryAttr) -> Self {
        self.with(MemberAttr::Dictionary(attr))
    }

    /// Treat a collection-typed member as a composite.
    pub fn not_collection(self) -> Self {
        self.with(MemberAttr::NotCollection)
    }

    /// Put the member in a namespace.
    pub fn namespace(self, prefix: Option<&str>, uri: impl Into<String>) -> Self {
        self.with(MemberAttr::Namespace(NamespaceDecl {
            prefix: prefix.map(str::to_string),
            uri: uri.into(),
        }))
    }

    /// Use `alias` as element name for runtime type `type_name`.
    pub fn real_type(self, type_name: impl Into<String>, alias: impl Into<XName>) -> Self {
        self.with(MemberAttr::RealType {
            type_name: type_name.into(),
            alias: alias.into(),
        })
    }

    /// Preserve whitespace in the member's element.
    pub fn preserve_whitespace(self) -> Self {
        self.with(MemberAttr::PreserveWhitespace)
    }

    /// Embed text as CDATA or Base64.
    pub fn embed(self, embedding: TextEmbedding) -> Self {
        self.with(MemberAttr::TextEmbedding(embedding))
    }
}

/// A class: a composite type, or a collection subclass when its base chain
/// ends in a container type.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDef {
    /// Type name.
    pub name: String,
    /// Base type name.
    pub base: Option<String>,
    /// Implemented interfaces.
    pub interfaces: Vec<String>,
    /// Value types are copied, so they never form cycles.
    pub value_type: bool,
    /// Abstract types cannot be instantiated during deserialization.
    pub is_abstract: bool,
    /// Declared members, excluding inherited ones.
    pub members: Vec<MemberDef>,
    /// Type annotations.
    pub annotations: Vec<TypeAttr>,
}

impl ClassDef {
    /// Create a class without members.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base: None,
            interfaces: Vec::new(),
            value_type: false,
            is_abstract: false,
            members: Vec::new(),
            annotations: Vec::new(),
        }
    }

    /// Set the base type.
    pub fn extends(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    /// Add an implemented interface.
    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    /// Mark as a value type.
    pub fn value_type(mut self) -> Self {
        self.value_type = true;
        self
    }

    /// Mark as abstract.
    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Add a member.
    pub fn member(mut self, member: MemberDef) -> Self {
        self.members.push(member);
        self
    }

    /// Add a type annotation.
    pub fn with(mut self, attr: TypeAttr) -> Self {
        self.annotations.push(attr);
        self
    }

    /// Rename the type's element.
    pub fn alias(self, alias: impl Into<XName>) -> Self {
        self.with(TypeAttr::Alias(alias.into()))
    }

    /// Put the type's element in a namespace.
    pub fn namespace(self, prefix: Option<&str>, uri: impl Into<String>) -> Self {
        self.with(TypeAttr::Namespace(NamespaceDecl {
            prefix: prefix.map(str::to_string),
            uri: uri.into(),
        }))
    }

    /// Add a prolog comment line.
    pub fn comment(self, text: impl Into<String>) -> Self {
        self.with(TypeAttr::Comment(text.into()))
    }

    /// Use a custom serializer for the whole type.
    pub fn custom_serializer(self, key: impl Into<String>) -> Self {
        self.with(TypeAttr::CustomSerializer(key.into()))
    }

    /// Set the cycle policy.
    pub fn cycles(self, policy: CyclePolicy) -> Self {
        self.with(TypeAttr::CyclePolicy(policy))
    }
}

/// An enum with optional per-variant aliases.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumDef {
    /// Type name.
    pub name: String,
    /// Variants with their XML alias, if any.
    pub variants: Vec<(String, Option<String>)>,
    /// Type annotations.
    pub annotations: Vec<TypeAttr>,
}

impl EnumDef {
    /// Create an enum from variant names.
    pub fn new<I, S>(name: impl Into<String>, variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            variants: variants.into_iter().map(|v| (v.into(), None)).collect(),
            annotations: Vec::new(),
        }
    }

    /// Give a variant an alias.
    pub fn variant_alias(mut self, variant: &str, alias: impl Into<String>) -> Self {
        if let Some(entry) = self.variants.iter_mut().find(|(v, _)| v == variant) {
            entry.1 = Some(alias.into());
        }
        self
    }

    /// Add a type annotation.
    pub fn with(mut self, attr: TypeAttr) -> Self {
        self.annotations.push(attr);
        self
    }
}

/// An interface: an abstract type that classes implement.
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceDef {
    /// Type name.
    pub name: String,
    /// Interfaces this one extends.
    pub extends: Vec<String>,
    /// Type annotations.
    pub annotations: Vec<TypeAttr>,
}

impl InterfaceDef {
    /// Create an interface.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extends: Vec::new(),
            annotations: Vec::new(),
        }
    }

    /// Extend another interface.
    pub fn extends(mut self, interface: impl Into<String>) -> Self {
        self.extends.push(interface.into());
        self
    }
}

/// Any registered definition.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDefinition {
    /// A class.
    Class(ClassDef),
    /// An enum.
    Enum(EnumDef),
    /// An interface.
    Interface(InterfaceDef),
}

impl TypeDefinition {
    /// Type name.
    pub fn name(&self) -> &str {
        match self {
            Self::Class(c) => &c.name,
            Self::Enum(e) => &e.name,
            Self::Interface(i) => &i.name,
        }
    }

    /// Type annotations.
    pub fn annotations(&self) -> &[TypeAttr] {
        match self {
            Self::Class(c) => &c.annotations,
            Self::Enum(e) => &e.annotations,
            Self::Interface(i) => &i.annotations,
        }
    }

    /// Direct supertypes (base class and interfaces).
    pub fn supertypes(&self) -> Vec<&str> {
        match self {
            Self::Class(c) => c
                .base
                .iter()
                .chain(c.interfaces.iter())
                .map(String::as_str)
                .collect(),
            Self::Interface(i) => i.extends.iter().map(String::as_str).collect(),
            Self::Enum(_) => Vec::new(),
        }
    }
}

//! Cached descriptions of types and members.
//!
//! A descriptor is the fully resolved view the engines work from: the
//! type's classification, its XML name, its members in serialization order,
//! and every annotation folded into plain fields.

use std::fmt;
use std::sync::Arc;

use veles_xml::XName;

use crate::annotations::{
    CollectionAttr, CollectionStyle, CyclePolicy, DictionaryAttr, NamespaceDecl, SerializationTarget,
    TextEmbedding,
};
use crate::{BasicType, ContainerKind, EnumValue, KnownType, ModelError, Result, SerializerHandle, Severity, Value};

/// Coarse classification of a type, available without deriving a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeShape {
    /// A scalar.
    Basic(BasicType),
    /// A registered enum.
    Enum,
    /// A type with a known-type codec.
    Known,
    /// A collection type or collection subclass.
    Collection,
    /// A dictionary type or dictionary subclass.
    Dictionary,
    /// Anything else.
    Composite,
}

impl TypeShape {
    /// Whether values of this shape fit into a single text value.
    pub fn is_textual(&self) -> bool {
        matches!(self, Self::Basic(_) | Self::Enum | Self::Known)
    }
}

/// Shared known-type codec.
#[derive(Clone)]
pub struct KnownHandle(Arc<dyn KnownType>);

impl KnownHandle {
    /// Wrap a codec.
    pub fn new(codec: Arc<dyn KnownType>) -> Self {
        Self(codec)
    }
}

impl std::ops::Deref for KnownHandle {
    type Target = dyn KnownType;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl fmt::Debug for KnownHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KnownHandle({})", self.0.type_name())
    }
}

/// Variants of an enum with their XML spellings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumInfo {
    /// `(variant, alias)` pairs; the alias is the variant name when none is given.
    pub variants: Vec<(String, String)>,
}

impl EnumInfo {
    /// XML spelling of a variant.
    pub fn alias_of(&self, variant: &str) -> Option<&str> {
        self.variants
            .iter()
            .find(|(v, _)| v == variant)
            .map(|(_, alias)| alias.as_str())
    }

    /// Variant spelled by `text`, matching aliases first and then variant names.
    pub fn variant_of(&self, text: &str) -> Option<&str> {
        let text = text.trim();
        self.variants
            .iter()
            .find(|(_, alias)| alias == text)
            .or_else(|| self.variants.iter().find(|(v, _)| v == text))
            .map(|(v, _)| v.as_str())
    }
}

/// Item type and kind of a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionInfo {
    /// Container kind.
    pub kind: ContainerKind,
    /// Declared item type.
    pub item_type: String,
}

/// Key and value types of a dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictionaryInfo {
    /// Declared key type.
    pub key_type: String,
    /// Declared value type.
    pub value_type: String,
}

/// Classification of a type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    /// A scalar.
    Basic(BasicType),
    /// A registered enum.
    Enum(EnumInfo),
    /// A collection or collection subclass.
    Collection(CollectionInfo),
    /// A dictionary or dictionary subclass.
    Dictionary(DictionaryInfo),
    /// A composite with members.
    Composite,
}

/// Resolved description of a type.
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    /// Type name.
    pub name: String,
    /// Element name for values of this type.
    pub alias: XName,
    /// Namespace declared for the type's element.
    pub namespace: Option<NamespaceDecl>,
    /// Classification.
    pub kind: TypeKind,
    /// Known-type codec, if any.
    pub known: Option<KnownHandle>,
    /// Type-level custom serializer, if any.
    pub custom_serializer: Option<SerializerHandle>,
    /// Value types never take part in cycle detection.
    pub is_value_type: bool,
    /// Abstract types and interfaces cannot be instantiated.
    pub is_abstract: bool,
    /// Behavior on self-references.
    pub cycle_policy: CyclePolicy,
    /// Whether null members of this type are written.
    pub serialize_null_objects: bool,
    /// Never write metadata attributes for this type.
    pub suppress_metadata: bool,
    /// Mark the element `xml:space="preserve"`.
    pub preserve_whitespace: bool,
    /// Prolog comment lines.
    pub comments: Vec<String>,
    /// Collection layout declared on the type.
    pub collection: Option<CollectionAttr>,
    /// Members in serialization order.
    pub members: Vec<Arc<MemberDescriptor>>,
}

impl TypeDescriptor {
    /// Check if this is a basic type.
    pub fn is_basic(&self) -> bool {
        matches!(self.kind, TypeKind::Basic(_))
    }

    /// The basic type, if this is one.
    pub fn basic(&self) -> Option<BasicType> {
        match self.kind {
            TypeKind::Basic(b) => Some(b),
            _ => None,
        }
    }

    /// Check if this is an enum.
    pub fn is_enum(&self) -> bool {
        matches!(self.kind, TypeKind::Enum(_))
    }

    /// Enum variants, if this is an enum.
    pub fn enum_info(&self) -> Option<&EnumInfo> {
        match &self.kind {
            TypeKind::Enum(info) => Some(info),
            _ => None,
        }
    }

    /// Check if this is a collection.
    pub fn is_collection(&self) -> bool {
        matches!(self.kind, TypeKind::Collection(_))
    }

    /// Collection info, if this is a collection.
    pub fn collection_info(&self) -> Option<&CollectionInfo> {
        match &self.kind {
            TypeKind::Collection(info) => Some(info),
            _ => None,
        }
    }

    /// Check if this is a dictionary.
    pub fn is_dictionary(&self) -> bool {
        matches!(self.kind, TypeKind::Dictionary(_))
    }

    /// Dictionary info, if this is a dictionary.
    pub fn dictionary_info(&self) -> Option<&DictionaryInfo> {
        match &self.kind {
            TypeKind::Dictionary(info) => Some(info),
            _ => None,
        }
    }

    /// Check if this is a composite.
    pub fn is_composite(&self) -> bool {
        matches!(self.kind, TypeKind::Composite)
    }

    /// Check if this type has a known-type codec.
    pub fn is_known(&self) -> bool {
        self.known.is_some()
    }

    /// Check if this is a `KeyValuePair<K, V>` instantiation.
    pub fn is_key_value_pair(&self) -> bool {
        self.name.starts_with("KeyValuePair<")
    }

    /// Container kind for collections and dictionaries.
    pub fn container_kind(&self) -> Option<ContainerKind> {
        match &self.kind {
            TypeKind::Collection(info) => Some(info.kind),
            TypeKind::Dictionary(_) => Some(ContainerKind::Dictionary),
            _ => None,
        }
    }

    /// Whether values of this type are containers with extra fields.
    pub fn is_container_subclass(&self) -> bool {
        self.container_kind().is_some() && !self.members.is_empty()
    }

    /// Coarse classification.
    pub fn shape(&self) -> TypeShape {
        if self.known.is_some() {
            return TypeShape::Known;
        }
        match &self.kind {
            TypeKind::Basic(b) => TypeShape::Basic(*b),
            TypeKind::Enum(_) => TypeShape::Enum,
            TypeKind::Collection(_) => TypeShape::Collection,
            TypeKind::Dictionary(_) => TypeShape::Dictionary,
            TypeKind::Composite => TypeShape::Composite,
        }
    }

    /// XML spelling of an enum value of this type.
    pub fn enum_to_text(&self, value: &EnumValue) -> Result<String> {
        self.enum_info()
            .and_then(|info| info.alias_of(&value.variant))
            .map(str::to_string)
            .ok_or_else(|| ModelError::UnknownVariant {
                type_name: self.name.clone(),
                value: value.variant.clone(),
            })
    }

    /// Parse an enum value of this type from its XML spelling.
    pub fn enum_from_text(&self, text: &str) -> Result<Value> {
        self.enum_info()
            .and_then(|info| info.variant_of(text))
            .map(|variant| Value::Enum(EnumValue::new(self.name.clone(), variant)))
            .ok_or_else(|| ModelError::UnknownVariant {
                type_name: self.name.clone(),
                value: text.to_string(),
            })
    }

    /// Find a member by name.
    pub fn member(&self, name: &str) -> Option<&Arc<MemberDescriptor>> {
        self.members.iter().find(|m| m.name == name)
    }
}

/// Resolved description of a member.
#[derive(Debug, Clone)]
pub struct MemberDescriptor {
    /// Member name.
    pub name: String,
    /// Declared type name.
    pub type_name: String,
    /// Classification of the declared type.
    pub shape: TypeShape,
    /// Position in discovery order, base class members first.
    pub index: usize,
    /// Ordering key; `i32::MAX` when not given.
    pub order: i32,
    /// Name of the member's node.
    pub alias: XName,
    /// Namespace declared for the member's node.
    pub namespace: Option<NamespaceDecl>,
    /// Relative path of the element the member is placed under or on.
    pub location: String,
    target: SerializationTarget,
    /// Whether the member has a getter.
    pub can_read: bool,
    /// Whether the member has a setter.
    pub can_write: bool,
    /// Severity when missing during deserialization.
    pub treatment: Option<Severity>,
    /// Value to assign when missing.
    pub default_value: Option<Value>,
    /// Format string.
    pub format: Option<String>,
    /// Collection layout.
    pub collection: Option<CollectionAttr>,
    /// Dictionary layout.
    pub dictionary: Option<DictionaryAttr>,
    /// Treat a collection-typed member as composite.
    pub not_collection: bool,
    /// Element names by runtime type.
    pub real_types: Vec<(String, XName)>,
    /// Never serialize.
    pub dont_serialize: bool,
    /// Skip when null.
    pub dont_serialize_if_null: bool,
    /// Member-level custom serializer.
    pub custom_serializer: Option<SerializerHandle>,
    /// Comment lines written before the element.
    pub comments: Vec<String>,
    /// Mark the element `xml:space="preserve"`.
    pub preserve_whitespace: bool,
    /// Text embedding of the value.
    pub text_embedding: TextEmbedding,
}

impl MemberDescriptor {
    /// Create a descriptor with default placement: an element named after
    /// the member, directly under the owner.
    pub fn new(name: &str, type_name: &str, shape: TypeShape, index: usize) -> Self {
        Self {
            name: name.to_string(),
            type_name: type_name.to_string(),
            shape,
            index,
            order: i32::MAX,
            alias: XName::new(veles_xml::encode_xml_name(name)),
            namespace: None,
            location: ".".to_string(),
            target: SerializationTarget::Element,
            can_read: true,
            can_write: true,
            treatment: None,
            default_value: None,
            format: None,
            collection: None,
            dictionary: None,
            not_collection: false,
            real_types: Vec::new(),
            dont_serialize: false,
            dont_serialize_if_null: false,
            custom_serializer: None,
            comments: Vec::new(),
            preserve_whitespace: false,
            text_embedding: TextEmbedding::None,
        }
    }

    /// Where the member is placed.
    #[inline]
    pub fn target(&self) -> SerializationTarget {
        self.target
    }

    /// Place the member. Exactly one target is active at a time.
    pub fn set_target(&mut self, target: SerializationTarget, location: impl Into<String>) {
        self.target = target;
        self.location = location.into();
    }

    /// Check if the member is written as an attribute.
    pub fn is_attribute(&self) -> bool {
        self.target == SerializationTarget::Attribute
    }

    /// Check if the member is written as element text.
    pub fn is_value(&self) -> bool {
        self.target == SerializationTarget::Value
    }

    /// Check if the member is written as a child element.
    pub fn is_element(&self) -> bool {
        self.target == SerializationTarget::Element
    }

    /// Whether the member may be placed in an attribute or text value.
    pub fn fits_in_text(&self) -> bool {
        self.custom_serializer.is_some()
            || self.shape.is_textual()
            || (self.shape == TypeShape::Collection
                && !self.not_collection
                && self
                    .collection
                    .as_ref()
                    .is_some_and(|c| c.style == CollectionStyle::Serially))
    }

    /// Whether the member's declared type is treated as a collection.
    pub fn is_collection(&self) -> bool {
        self.shape == TypeShape::Collection && !self.not_collection
    }

    /// Whether the member's declared type is treated as a dictionary.
    pub fn is_dictionary(&self) -> bool {
        self.shape == TypeShape::Dictionary && !self.not_collection
    }

    /// Collection layout in effect.
    pub fn collection_style(&self) -> CollectionStyle {
        self.collection.as_ref().map(|c| c.style).unwrap_or_default()
    }

    /// Element name configured for a runtime type.
    pub fn real_type_alias(&self, runtime: &str) -> Option<&XName> {
        self.real_types
            .iter()
            .find(|(t, _)| t == runtime)
            .map(|(_, alias)| alias)
    }

    /// Runtime type configured for an element name.
    pub fn real_type_for(&self, name: &XName) -> Option<&str> {
        self.real_types
            .iter()
            .find(|(_, alias)| alias == name)
            .map(|(t, _)| t.as_str())
    }
}

//! User-supplied serializers for types and members.

use std::fmt;
use std::sync::Arc;

use veles_xml::{NodeId, XmlDocument};

use crate::{MemberDescriptor, Result, SerializerOptions, TypeDescriptor, Value};

/// What a custom serializer is being invoked for.
#[derive(Clone, Copy)]
pub struct SerializationContext<'a> {
    /// Descriptor of the value's declared type.
    pub type_descriptor: &'a TypeDescriptor,
    /// The member being processed, if invoked for a member.
    pub member: Option<&'a MemberDescriptor>,
    /// Options of the running serializer.
    pub options: &'a SerializerOptions,
}

/// A serializer that takes over a type or member entirely.
///
/// Which pair of methods is called depends on where the member is placed:
/// element members use the element methods, attribute members the attribute
/// methods, and value members the value methods. Attribute methods default to
/// the value methods.
pub trait CustomSerializer: Send + Sync {
    /// Fill an element with the value.
    fn serialize_to_element(
        &self,
        value: &Value,
        doc: &mut XmlDocument,
        element: NodeId,
        ctx: &SerializationContext<'_>,
    ) -> Result<()>;

    /// Render the value for an attribute.
    fn serialize_to_attribute(&self, value: &Value, ctx: &SerializationContext<'_>) -> Result<String> {
        self.serialize_to_value(value, ctx)
    }

    /// Render the value for element text.
    fn serialize_to_value(&self, value: &Value, ctx: &SerializationContext<'_>) -> Result<String>;

    /// Read the value from an element.
    fn deserialize_from_element(
        &self,
        doc: &XmlDocument,
        element: NodeId,
        ctx: &SerializationContext<'_>,
    ) -> Result<Value>;

    /// Read the value from attribute text.
    fn deserialize_from_attribute(&self, text: &str, ctx: &SerializationContext<'_>) -> Result<Value> {
        self.deserialize_from_value(text, ctx)
    }

    /// Read the value from element text.
    fn deserialize_from_value(&self, text: &str, ctx: &SerializationContext<'_>) -> Result<Value>;
}

/// A registered custom serializer together with its registration key.
#[derive(Clone)]
pub struct SerializerHandle {
    key: String,
    inner: Arc<dyn CustomSerializer>,
}

impl SerializerHandle {
    /// Create a handle.
    pub fn new(key: impl Into<String>, inner: Arc<dyn CustomSerializer>) -> Self {
        Self {
            key: key.into(),
            inner,
        }
    }

    /// Registration key.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl std::ops::Deref for SerializerHandle {
    type Target = dyn CustomSerializer;

    fn deref(&self) -> &Self::Target {
        self.inner.as_ref()
    }
}

impl fmt::Debug for SerializerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SerializerHandle({})", self.key)
    }
}

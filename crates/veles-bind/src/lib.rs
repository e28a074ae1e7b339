//! XML serializer and deserializer for Veles object graphs.
//!
//! [`XmlSerializer`] turns a [`Value`](veles_model::Value) of a registered
//! type into an [`XmlDocument`](veles_xml::XmlDocument) and back, following
//! the member placement, collection layout and error treatment described by
//! the type's [`TypeDescriptor`](veles_model::TypeDescriptor).
//!
//! Problems in the input are recorded in [`ParsingErrors`]; the
//! [`ExceptionPolicy`](veles_model::ExceptionPolicy) in the serializer's
//! options decides which of them also abort the operation.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use veles_bind::XmlSerializer;
//! use veles_model::{ClassDef, MemberDef, Object, TypeRegistry, Value};
//!
//! let mut registry = TypeRegistry::new();
//! registry.add_class(
//!     ClassDef::new("Person")
//!         .member(MemberDef::new("Name", "string").attribute_for("."))
//!         .member(MemberDef::new("Age", "i32")),
//! );
//!
//! let mut serializer = XmlSerializer::new("Person", Arc::new(registry));
//! let person = Value::from(Object::new("Person").with("Name", "Ada").with("Age", 36));
//!
//! let xml = serializer.serialize_to_string(&person)?;
//! assert!(xml.contains(r#"<Person Name="Ada">"#));
//!
//! let back = serializer.deserialize_from_str(&xml)?;
//! let back = back.as_object().unwrap();
//! assert_eq!(back.get("Age"), Some(Value::Int32(36)));
//! # Ok::<(), veles_bind::Error>(())
//! ```

mod context;
mod de;
mod error;
mod ser;
mod serializer;
mod text;

#[cfg(test)]
mod tests;

pub use context::{
    dimensions_attribute, real_type_attribute, DIMENSIONS_ATTRIBUTE, META_NAMESPACE, META_PREFIX,
    REAL_TYPE_ATTRIBUTE,
};
pub use error::{Error, ParsingError, ParsingErrors, Result};
pub use serializer::XmlSerializer;

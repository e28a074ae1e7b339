//! Veles - reflection-driven object to XML data binding.
//!
//! Types are described once in a [`TypeRegistry`](model::TypeRegistry);
//! an [`XmlSerializer`] then writes values of those types as XML and reads
//! them back, honoring member placement, collection layout, polymorphism and
//! per-member error treatment.
//!
//! # Crates
//!
//! - [`veles_xml`] - Arena XML tree with location paths and namespaces
//! - [`veles_model`] - Dynamic values, type definitions and descriptors
//! - [`veles_bind`] - The serializer and deserializer
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use veles::prelude::*;
//!
//! let mut registry = TypeRegistry::new();
//! registry.add_class(
//!     ClassDef::new("Book")
//!         .member(MemberDef::new("Title", "string").attribute_for("."))
//!         .member(MemberDef::new("Chapters", "List<string>").serially("|")),
//! );
//!
//! let chapters = Object::with_container(
//!     "List<string>",
//!     Container::List(vec!["Start".into(), "End".into()]),
//! );
//! let book = Value::from(Object::new("Book").with("Title", "Rust").with("Chapters", chapters));
//!
//! let mut serializer = XmlSerializer::new("Book", Arc::new(registry));
//! let xml = serializer.serialize_to_string(&book)?;
//! assert!(xml.contains("<Chapters>Start|End</Chapters>"));
//!
//! let back = serializer.deserialize_from_str(&xml)?;
//! assert_eq!(back.as_object().unwrap().get("Title"), Some(Value::from("Rust")));
//! # Ok::<(), veles::Error>(())
//! ```

pub use veles_bind as bind;
pub use veles_model as model;
pub use veles_xml as xml;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use veles_bind::{ParsingErrors, XmlSerializer};
    pub use veles_model::{
        ClassDef, CollectionAttr, CollectionStyle, Container, DictionaryAttr, EnumDef, EnumValue,
        ExceptionPolicy, InterfaceDef, MemberDef, Object, ObjectRef, Placement, SerializerOptions,
        Severity, TypeRegistry, Value,
    };
    pub use veles_xml::{XName, XmlDocument};
}

// Re-export commonly used types at the crate root
pub use veles_bind::{Error, Result, XmlSerializer};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

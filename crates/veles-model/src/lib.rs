//! Type model for the Veles XML data-binding engine.
//!
//! This crate provides:
//! - [`Value`], [`Object`] and [`Container`]: the dynamic object graph that is
//!   serialized and deserialized
//! - [`ClassDef`], [`EnumDef`] and [`InterfaceDef`]: reflection data, with
//!   annotations from [`annotations`]
//! - [`TypeRegistry`]: derives and caches [`TypeDescriptor`]s
//! - [`KnownType`] and [`CustomSerializer`]: pluggable conversions
//! - [`SerializerOptions`]: per-serializer configuration
//!
//! # Example
//!
//! ```
//! use veles_model::{ClassDef, MemberDef, Object, SerializerOptions, TypeRegistry, Value};
//!
//! let mut registry = TypeRegistry::new();
//! registry.add_class(ClassDef::new("Point").member(MemberDef::new("X", "i32")));
//!
//! let point = Object::new("Point").with("X", 3);
//! assert_eq!(point.get("X"), Some(&Value::Int32(3)));
//!
//! let desc = registry.descriptor("Point", &SerializerOptions::default()).unwrap();
//! assert_eq!(desc.members.len(), 1);
//! ```

use std::hash::BuildHasherDefault;

use hashbrown::HashMap as FastHashMap;
use rustc_hash::FxHasher;

pub mod annotations;
mod custom;
mod definition;
mod descriptor;
mod error;
mod guid;
mod known;
mod options;
mod registry;
pub mod scalar;
mod types;
mod value;

/// HashMap with the Fx hasher.
pub(crate) type FxHashMap<K, V> = FastHashMap<K, V, BuildHasherDefault<FxHasher>>;

pub use annotations::{
    CollectionAttr, CollectionStyle, CyclePolicy, DictionaryAttr, MemberAttr, NamespaceDecl, Placement,
    SerializationTarget, TextEmbedding, TypeAttr,
};
pub use custom::{CustomSerializer, SerializationContext, SerializerHandle};
pub use definition::{ClassDef, EnumDef, InterfaceDef, MemberDef, TypeDefinition};
pub use descriptor::{
    CollectionInfo, DictionaryInfo, EnumInfo, KnownHandle, MemberDescriptor, TypeDescriptor, TypeKind,
    TypeShape,
};
pub use error::{ModelError, Result};
pub use guid::Guid;
pub use known::{parse_date_time, DateTimeCodec, GuidCodec, KnownType, KnownTypes, TimeSpanCodec};
pub use options::{ExceptionPolicy, SerializerOptions, Severity};
pub use registry::{default_alias, TypeRegistry};
pub use types::{canonical_name, names, BasicType, TypeExpr, OBJECT_TYPE};
pub use value::{ArrayValue, Container, ContainerKind, EnumValue, Object, ObjectRef, Value};

//! Type registry and descriptor cache.
//!
//! The registry holds the reflection data (definitions, custom serializers,
//! known-type codecs) and derives [`TypeDescriptor`]s from it on demand.
//! Descriptors are cached per `(type name, options fingerprint)` and shared
//! between threads; a descriptor is derived at most once per key even when
//! several threads ask for it at the same time, because insertion re-checks
//! the cache under the write lock.
//!
//! # Example
//!
//! ```
//! use veles_model::{ClassDef, MemberDef, SerializerOptions, TypeRegistry};
//!
//! let mut registry = TypeRegistry::new();
//! registry.add_class(
//!     ClassDef::new("Person")
//!         .member(MemberDef::new("Name", "string").attribute_for("."))
//!         .member(MemberDef::new("Age", "i32")),
//! );
//!
//! let options = SerializerOptions::default();
//! let person = registry.descriptor("Person", &options)?;
//! assert!(person.is_composite());
//! assert!(person.members[0].is_attribute());
//!
//! let list = registry.descriptor("List<Person>", &options)?;
//! assert_eq!(list.alias.local, "ListOfPerson");
//! # Ok::<(), veles_model::ModelError>(())
//! ```

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use veles_xml::{encode_xml_name, XName};

use crate::annotations::{CyclePolicy, MemberAttr, SerializationTarget, TypeAttr};
use crate::definition::{ClassDef, EnumDef, InterfaceDef, MemberDef, TypeDefinition};
use crate::descriptor::{
    CollectionInfo, DictionaryInfo, EnumInfo, KnownHandle, MemberDescriptor, TypeDescriptor, TypeKind,
    TypeShape,
};
use crate::types::{canonical_name, names, TypeExpr, OBJECT_TYPE};
use crate::{
    BasicType, ContainerKind, CustomSerializer, FxHashMap, KnownType, KnownTypes, ModelError, Result,
    SerializerHandle, SerializerOptions,
};

/// Limit on base-class and interface chains, guarding against cyclic definitions.
const MAX_HIERARCHY_DEPTH: usize = 64;

type CacheKey = (String, u64);

/// Registry of type definitions with a thread-safe descriptor cache.
pub struct TypeRegistry {
    definitions: FxHashMap<String, TypeDefinition>,
    serializers: FxHashMap<String, Arc<dyn CustomSerializer>>,
    known: KnownTypes,
    cache: RwLock<FxHashMap<CacheKey, Arc<TypeDescriptor>>>,
}

impl TypeRegistry {
    /// Create a registry with the built-in known types.
    pub fn new() -> Self {
        Self {
            definitions: FxHashMap::default(),
            serializers: FxHashMap::default(),
            known: KnownTypes::new(),
            cache: RwLock::new(FxHashMap::default()),
        }
    }

    fn insert(&mut self, def: TypeDefinition) -> &mut Self {
        let name = canonical_name(def.name());
        self.definitions.insert(name, def);
        self.cache.get_mut().clear();
        self
    }

    /// Register a class.
    pub fn add_class(&mut self, def: ClassDef) -> &mut Self {
        self.insert(TypeDefinition::Class(def))
    }

    /// Register an enum.
    pub fn add_enum(&mut self, def: EnumDef) -> &mut Self {
        self.insert(TypeDefinition::Enum(def))
    }

    /// Register an interface.
    pub fn add_interface(&mut self, def: InterfaceDef) -> &mut Self {
        self.insert(TypeDefinition::Interface(def))
    }

    /// Register a custom serializer under `key`.
    pub fn register_serializer(
        &mut self,
        key: impl Into<String>,
        serializer: Arc<dyn CustomSerializer>,
    ) -> &mut Self {
        self.serializers.insert(key.into(), serializer);
        self.cache.get_mut().clear();
        self
    }

    /// Register a known-type codec.
    pub fn register_known_type(&mut self, codec: Arc<dyn KnownType>) -> &mut Self {
        self.known.register(codec);
        self.cache.get_mut().clear();
        self
    }

    /// Look up a definition.
    pub fn definition(&self, name: &str) -> Option<&TypeDefinition> {
        self.definitions.get(&canonical_name(name))
    }

    /// Check whether a type name resolves to a type.
    pub fn contains(&self, name: &str) -> bool {
        self.shape_of(name).is_ok()
    }

    /// Number of cached descriptors.
    pub fn cached_descriptors(&self) -> usize {
        self.cache.read().len()
    }

    /// Get the descriptor of a type, deriving and caching it on first use.
    pub fn descriptor(&self, name: &str, options: &SerializerOptions) -> Result<Arc<TypeDescriptor>> {
        let key = (canonical_name(name), options.fingerprint());

        if let Some(found) = self.cache.read().get(&key) {
            return Ok(Arc::clone(found));
        }

        let built = Arc::new(self.build(&key.0, options)?);
        tracing::trace!(type_name = %key.0, members = built.members.len(), "derived type descriptor");

        let mut cache = self.cache.write();
        Ok(Arc::clone(cache.entry(key).or_insert(built)))
    }

    fn serializer(&self, key: &str) -> Result<SerializerHandle> {
        self.serializers
            .get(key)
            .map(|s| SerializerHandle::new(key, Arc::clone(s)))
            .ok_or_else(|| ModelError::UnknownSerializer(key.to_string()))
    }

    /// Classify a type without deriving its descriptor.
    pub fn shape_of(&self, name: &str) -> Result<TypeShape> {
        let name = canonical_name(name);

        if let Some(basic) = BasicType::from_name(&name) {
            return Ok(TypeShape::Basic(basic));
        }
        if self.known.contains(&name) {
            return Ok(TypeShape::Known);
        }

        match self.definitions.get(&name) {
            Some(TypeDefinition::Class(def)) => {
                let not_collection = def
                    .annotations
                    .iter()
                    .any(|a| matches!(a, TypeAttr::NotCollection));
                Ok(match self.container_base(def)? {
                    Some(TypeKind::Collection(_)) if !not_collection => TypeShape::Collection,
                    Some(TypeKind::Dictionary(_)) if !not_collection => TypeShape::Dictionary,
                    _ => TypeShape::Composite,
                })
            }
            Some(TypeDefinition::Enum(_)) => Ok(TypeShape::Enum),
            Some(TypeDefinition::Interface(_)) => Ok(TypeShape::Composite),
            None => match self.builtin_container(&name)? {
                Some(TypeKind::Dictionary(_)) => Ok(TypeShape::Dictionary),
                Some(_) => Ok(TypeShape::Collection),
                None if name == OBJECT_TYPE || key_value_args(&name).is_some() => Ok(TypeShape::Composite),
                None => Err(ModelError::UnknownType(name)),
            },
        }
    }

    /// Container kind of a built-in container type name.
    fn builtin_container(&self, name: &str) -> Result<Option<TypeKind>> {
        let collection = |kind, item: &str| {
            Some(TypeKind::Collection(CollectionInfo {
                kind,
                item_type: canonical_name(item),
            }))
        };

        Ok(match TypeExpr::parse(name)? {
            TypeExpr::Named(n) if n == names::BIT_ARRAY => collection(ContainerKind::BitArray, "bool"),
            TypeExpr::Named(_) => None,
            TypeExpr::Array { item, rank } => collection(ContainerKind::Array { rank }, &item),
            TypeExpr::Generic { base, args } => match (base.as_str(), args.as_slice()) {
                ("List", [item]) => collection(ContainerKind::List, item),
                ("HashSet", [item]) => collection(ContainerKind::Set, item),
                ("Stack", [item]) => collection(ContainerKind::Stack, item),
                ("Queue", [item]) => collection(ContainerKind::Queue, item),
                ("LinkedList", [item]) => collection(ContainerKind::LinkedList, item),
                ("Dictionary", [key, value]) => Some(TypeKind::Dictionary(DictionaryInfo {
                    key_type: canonical_name(key),
                    value_type: canonical_name(value),
                })),
                _ => None,
            },
        })
    }

    /// Find the container type a class derives from, if any.
    fn container_base(&self, def: &ClassDef) -> Result<Option<TypeKind>> {
        let mut current = def;
        for _ in 0..MAX_HIERARCHY_DEPTH {
            let Some(base) = current.base.as_deref().map(canonical_name) else {
                return Ok(None);
            };
            match self.definitions.get(&base) {
                Some(TypeDefinition::Class(parent)) => current = parent,
                Some(_) => return Ok(None),
                None => return self.builtin_container(&base),
            }
        }
        Ok(None)
    }

    /// Classes from the root of the base chain down to `def`.
    fn class_chain<'a>(&'a self, def: &'a ClassDef) -> Vec<&'a ClassDef> {
        let mut chain = vec![def];
        let mut current = def;
        while chain.len() < MAX_HIERARCHY_DEPTH {
            let Some(base) = current.base.as_deref() else {
                break;
            };
            match self.definitions.get(&canonical_name(base)) {
                Some(TypeDefinition::Class(parent)) => {
                    chain.push(parent);
                    current = parent;
                }
                _ => break,
            }
        }
        chain.reverse();
        chain
    }

    /// Element name for a type, with its declared namespace.
    pub fn alias_of(&self, name: &str) -> XName {
        let name = canonical_name(name);
        let Some(def) = self.definitions.get(&name) else {
            return XName::new(default_alias(&name));
        };

        let mut alias = def
            .annotations()
            .iter()
            .find_map(|a| match a {
                TypeAttr::Alias(alias) => Some(alias.clone()),
                _ => None,
            })
            .unwrap_or_else(|| XName::new(default_alias(&name)));

        if alias.namespace.is_none() {
            alias.namespace = def.annotations().iter().find_map(|a| match a {
                TypeAttr::Namespace(decl) => Some(decl.uri.clone()),
                _ => None,
            });
        }
        alias
    }

    /// Find the type whose element name is `alias`.
    ///
    /// Registered types are searched first, then basic and known types.
    pub fn type_for_alias(&self, alias: &XName) -> Option<String> {
        let mut matches: Vec<&String> = self
            .definitions
            .keys()
            .filter(|name| self.alias_of(name) == *alias)
            .collect();
        matches.sort();
        if let Some(name) = matches.first() {
            return Some((*name).clone());
        }

        if !alias.is_local() {
            return None;
        }
        BasicType::ALL
            .iter()
            .find(|b| b.as_str() == alias.local)
            .map(|b| b.type_name().to_string())
            .or_else(|| self.known.contains(&alias.local).then(|| alias.local.clone()))
    }

    /// Check whether a value of type `runtime` may be stored where `declared` is expected.
    pub fn is_assignable(&self, runtime: &str, declared: &str) -> bool {
        self.assignable_at(&canonical_name(runtime), &canonical_name(declared), 0)
    }

    fn assignable_at(&self, runtime: &str, declared: &str, depth: usize) -> bool {
        if runtime == declared || declared == OBJECT_TYPE {
            return true;
        }
        if depth >= MAX_HIERARCHY_DEPTH {
            return false;
        }
        self.definitions.get(runtime).is_some_and(|def| {
            def.supertypes()
                .into_iter()
                .any(|s| self.assignable_at(&canonical_name(s), declared, depth + 1))
        })
    }

    fn build(&self, name: &str, options: &SerializerOptions) -> Result<TypeDescriptor> {
        let mut desc = TypeDescriptor {
            name: name.to_string(),
            alias: self.alias_of(name),
            namespace: None,
            kind: TypeKind::Composite,
            known: self.known.get(name).map(KnownHandle::new),
            custom_serializer: None,
            is_value_type: false,
            is_abstract: false,
            cycle_policy: if options.throw_on_cycles {
                CyclePolicy::Throw
            } else {
                CyclePolicy::Skip
            },
            serialize_null_objects: options.serialize_null_objects,
            suppress_metadata: options.suppress_metadata,
            preserve_whitespace: false,
            comments: Vec::new(),
            collection: None,
            members: Vec::new(),
        };

        if let Some(basic) = BasicType::from_name(name) {
            desc.kind = TypeKind::Basic(basic);
            desc.is_value_type = basic.is_value_type();
            return Ok(desc);
        }

        match self.definitions.get(name) {
            Some(TypeDefinition::Class(def)) => {
                desc.is_value_type = def.value_type;
                desc.is_abstract = def.is_abstract;
                if let Some(kind) = self.container_base(def)? {
                    desc.kind = kind;
                }
                let mut members = Vec::new();
                for class in self.class_chain(def) {
                    for member in &class.members {
                        members.push(self.build_member(member, members.len())?);
                    }
                }
                members.sort_by_key(|m| m.order);
                desc.members = members.into_iter().map(Arc::new).collect();
                self.apply_type_annotations(&mut desc, &def.annotations)?;
            }
            Some(TypeDefinition::Enum(def)) => {
                desc.is_value_type = true;
                desc.kind = TypeKind::Enum(EnumInfo {
                    variants: def
                        .variants
                        .iter()
                        .map(|(v, alias)| (v.clone(), alias.clone().unwrap_or_else(|| v.clone())))
                        .collect(),
                });
                self.apply_type_annotations(&mut desc, &def.annotations)?;
            }
            Some(TypeDefinition::Interface(def)) => {
                desc.is_abstract = true;
                self.apply_type_annotations(&mut desc, &def.annotations)?;
            }
            None if desc.known.is_some() => desc.is_value_type = true,
            None if name == OBJECT_TYPE => {}
            None => {
                if let Some(kind) = self.builtin_container(name)? {
                    desc.kind = kind;
                } else if let Some((key, value)) = key_value_args(name) {
                    desc.is_value_type = true;
                    desc.members = vec![
                        Arc::new(self.build_member(&MemberDef::new("Key", key), 0)?),
                        Arc::new(self.build_member(&MemberDef::new("Value", value), 1)?),
                    ];
                } else {
                    return Err(ModelError::UnknownType(name.to_string()));
                }
            }
        }

        Ok(desc)
    }

    fn apply_type_annotations(&self, desc: &mut TypeDescriptor, annotations: &[TypeAttr]) -> Result<()> {
        let mut sorted: Vec<&TypeAttr> = annotations.iter().collect();
        sorted.sort_by_key(|a| a.priority());

        for attr in sorted {
            match attr {
                // Folded into the alias by `alias_of`.
                TypeAttr::Alias(_) => {}
                TypeAttr::Namespace(decl) => desc.namespace = Some(decl.clone()),
                TypeAttr::Comment(text) => desc.comments.push(text.clone()),
                TypeAttr::CustomSerializer(key) => desc.custom_serializer = Some(self.serializer(key)?),
                TypeAttr::Collection(layout) => {
                    if desc.is_collection() {
                        desc.collection = Some(layout.clone());
                    }
                }
                TypeAttr::NotCollection => {
                    if desc.container_kind().is_some() {
                        desc.kind = TypeKind::Composite;
                    }
                }
                TypeAttr::CyclePolicy(policy) => desc.cycle_policy = *policy,
                TypeAttr::SerializeNullObjects(enabled) => desc.serialize_null_objects = *enabled,
                TypeAttr::SuppressMetadata => desc.suppress_metadata = true,
                TypeAttr::PreserveWhitespace => desc.preserve_whitespace = true,
            }
        }
        Ok(())
    }

    fn build_member(&self, def: &MemberDef, index: usize) -> Result<MemberDescriptor> {
        let type_name = canonical_name(&def.type_name);
        let shape = self.shape_of(&type_name)?;
        let mut member = MemberDescriptor::new(&def.name, &type_name, shape, index);
        member.can_read = def.readable;
        member.can_write = def.writable;

        let mut sorted: Vec<&MemberAttr> = def.annotations.iter().collect();
        sorted.sort_by_key(|a| a.priority());

        for attr in sorted {
            match attr {
                MemberAttr::CustomSerializer(key) => member.custom_serializer = Some(self.serializer(key)?),
                MemberAttr::Collection(layout) => member.collection = Some(layout.clone()),
                MemberAttr::Dictionary(layout) => member.dictionary = Some(layout.clone()),
                MemberAttr::NotCollection => member.not_collection = true,
                MemberAttr::Alias(alias) => {
                    let namespace = member.alias.namespace.take();
                    member.alias = alias.clone();
                    if member.alias.namespace.is_none() {
                        member.alias.namespace = namespace;
                    }
                }
                MemberAttr::Namespace(decl) => {
                    member.alias.namespace = Some(decl.uri.clone());
                    member.namespace = Some(decl.clone());
                }
                MemberAttr::AttributeFor(location) | MemberAttr::ValueFor(location) => {
                    let target = if matches!(attr, MemberAttr::AttributeFor(_)) {
                        SerializationTarget::Attribute
                    } else {
                        SerializationTarget::Value
                    };
                    if member.fits_in_text() {
                        member.set_target(target, location.clone());
                    } else {
                        tracing::debug!(
                            member = %def.name,
                            member_type = %type_name,
                            ?target,
                            "member cannot be written as text, keeping it as an element"
                        );
                    }
                }
                MemberAttr::ElementFor(location) => {
                    member.set_target(SerializationTarget::Element, location.clone())
                }
                MemberAttr::Order(order) => member.order = *order,
                MemberAttr::ErrorIfMissed { treatment, default } => {
                    member.treatment = Some(*treatment);
                    member.default_value = default.clone();
                }
                MemberAttr::Format(format) => member.format = Some(format.clone()),
                MemberAttr::Comment(text) => member.comments.push(text.clone()),
                MemberAttr::DontSerialize => member.dont_serialize = true,
                MemberAttr::DontSerializeIfNull => member.dont_serialize_if_null = true,
                MemberAttr::RealType { type_name, alias } => {
                    member.real_types.push((canonical_name(type_name), alias.clone()))
                }
                MemberAttr::PreserveWhitespace => member.preserve_whitespace = true,
                MemberAttr::TextEmbedding(embedding) => member.text_embedding = *embedding,
            }
        }

        Ok(member)
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("definitions", &self.definitions.len())
            .field("serializers", &self.serializers.len())
            .field("known", &self.known)
            .field("cached", &self.cached_descriptors())
            .finish()
    }
}

/// Key and value type of a `KeyValuePair<K, V>` name.
fn key_value_args(name: &str) -> Option<(String, String)> {
    match TypeExpr::parse(name).ok()? {
        TypeExpr::Generic { base, args } if base == "KeyValuePair" && args.len() == 2 => {
            Some((canonical_name(&args[0]), canonical_name(&args[1])))
        }
        _ => None,
    }
}

/// Default element name of a type.
///
/// Basic types use their .NET-style names (`Int32`), generic types spell
/// out their arguments (`ListOfInt32`, `DictionaryOfStringInt32`) and arrays
/// their rank (`ArrayOfInt32`, `Array2OfDouble`).
pub fn default_alias(name: &str) -> String {
    match TypeExpr::parse(name) {
        Ok(TypeExpr::Named(n)) => match BasicType::from_name(&n) {
            Some(basic) => basic.as_str().to_string(),
            None if n == OBJECT_TYPE => "Object".to_string(),
            None => encode_xml_name(&n),
        },
        Ok(TypeExpr::Generic { base, args }) => {
            let args: String = args.iter().map(|a| default_alias(a)).collect();
            encode_xml_name(&format!("{}Of{}", base, args))
        }
        Ok(TypeExpr::Array { item, rank }) => {
            let item = default_alias(&item);
            if rank == 1 {
                format!("ArrayOf{}", item)
            } else {
                format!("Array{}Of{}", rank, item)
            }
        }
        Err(_) => encode_xml_name(name),
    }
}

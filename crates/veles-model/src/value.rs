//! Dynamic values handled by the serializer.
//!
//! A [`Value`] is either a scalar, a well-known value type, or a shared
//! reference to an [`Object`]. Objects are reference types: two members may
//! point at the same object, and an object may (directly or indirectly)
//! reference itself. Containers live inside objects so that collection and
//! dictionary subclasses can carry extra fields next to their items.

use std::collections::{LinkedList, VecDeque};
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, TimeDelta};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::{FxHashMap, Guid};

/// A dynamically typed value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Single character.
    Char(char),
    /// Signed 8-bit integer.
    Int8(i8),
    /// Signed 16-bit integer.
    Int16(i16),
    /// Signed 32-bit integer.
    Int32(i32),
    /// Signed 64-bit integer.
    Int64(i64),
    /// Unsigned 8-bit integer.
    UInt8(u8),
    /// Unsigned 16-bit integer.
    UInt16(u16),
    /// Unsigned 32-bit integer.
    UInt32(u32),
    /// Unsigned 64-bit integer.
    UInt64(u64),
    /// 32-bit floating point.
    Float(f32),
    /// 64-bit floating point.
    Double(f64),
    /// String value.
    String(String),
    /// Enum variant.
    Enum(EnumValue),
    /// GUID value.
    Guid(Guid),
    /// Point in time with offset.
    DateTime(DateTime<FixedOffset>),
    /// Signed duration.
    TimeSpan(TimeDelta),
    /// Reference to an object.
    Object(ObjectRef),
}

/// A variant of a registered enum.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumValue {
    /// Enum type name.
    pub type_name: String,
    /// Variant name (not its alias).
    pub variant: String,
}

impl EnumValue {
    /// Create a new enum value.
    pub fn new(type_name: impl Into<String>, variant: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            variant: variant.into(),
        }
    }
}

impl Value {
    /// Check if this value is null.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Runtime type name of this value, `None` for null.
    pub fn type_name(&self) -> Option<String> {
        let name = match self {
            Value::Null => return None,
            Value::Bool(_) => "bool",
            Value::Char(_) => "char",
            Value::Int8(_) => "i8",
            Value::Int16(_) => "i16",
            Value::Int32(_) => "i32",
            Value::Int64(_) => "i64",
            Value::UInt8(_) => "u8",
            Value::UInt16(_) => "u16",
            Value::UInt32(_) => "u32",
            Value::UInt64(_) => "u64",
            Value::Float(_) => "f32",
            Value::Double(_) => "f64",
            Value::String(_) => "string",
            Value::Enum(e) => return Some(e.type_name.clone()),
            Value::Guid(_) => "Guid",
            Value::DateTime(_) => "DateTime",
            Value::TimeSpan(_) => "TimeSpan",
            Value::Object(o) => return Some(o.type_name()),
        };
        Some(name.to_string())
    }

    /// Try to get this value as a boolean.
    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get this value as an i32.
    #[inline]
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int8(v) => Some(*v as i32),
            Value::Int16(v) => Some(*v as i32),
            Value::Int32(v) => Some(*v),
            Value::UInt8(v) => Some(*v as i32),
            Value::UInt16(v) => Some(*v as i32),
            _ => None,
        }
    }

    /// Try to get this value as an i64.
    #[inline]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int8(v) => Some(*v as i64),
            Value::Int16(v) => Some(*v as i64),
            Value::Int32(v) => Some(*v as i64),
            Value::Int64(v) => Some(*v),
            Value::UInt8(v) => Some(*v as i64),
            Value::UInt16(v) => Some(*v as i64),
            Value::UInt32(v) => Some(*v as i64),
            _ => None,
        }
    }

    /// Try to get this value as an f64.
    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get this value as a string.
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get this value as an object reference.
    #[inline]
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<char> for Value {
    fn from(v: char) -> Self {
        Value::Char(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::UInt32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Guid> for Value {
    fn from(v: Guid) -> Self {
        Value::Guid(v)
    }
}

impl From<EnumValue> for Value {
    fn from(v: EnumValue) -> Self {
        Value::Enum(v)
    }
}

impl From<ObjectRef> for Value {
    fn from(v: ObjectRef) -> Self {
        Value::Object(v)
    }
}

impl From<Object> for Value {
    fn from(v: Object) -> Self {
        Value::Object(ObjectRef::new(v))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Shared, mutable handle to an [`Object`].
///
/// Cloning the handle shares the object. Identity (for cycle detection) is
/// the address of the shared allocation.
#[derive(Clone)]
pub struct ObjectRef(Arc<RwLock<Object>>);

impl ObjectRef {
    /// Wrap an object in a new shared handle.
    pub fn new(object: Object) -> Self {
        Self(Arc::new(RwLock::new(object)))
    }

    /// Lock the object for reading.
    #[inline]
    pub fn read(&self) -> RwLockReadGuard<'_, Object> {
        self.0.read()
    }

    /// Lock the object for writing.
    #[inline]
    pub fn write(&self) -> RwLockWriteGuard<'_, Object> {
        self.0.write()
    }

    /// Check whether two handles point at the same object.
    #[inline]
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Identity of the referenced object.
    #[inline]
    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    /// Runtime type name of the referenced object.
    pub fn type_name(&self) -> String {
        self.read().type_name.clone()
    }

    /// Read a field.
    pub fn get(&self, field: &str) -> Option<Value> {
        self.read().get(field).cloned()
    }

    /// Write a field.
    pub fn set(&self, field: impl Into<String>, value: impl Into<Value>) {
        self.write().set(field, value);
    }
}

impl PartialEq for ObjectRef {
    /// Structural equality; identical handles compare equal without locking.
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || *self.read() == *other.read()
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Fields are not printed: the graph may be cyclic.
        match self.0.try_read() {
            Some(object) => write!(f, "ObjectRef({} @ {:#x})", object.type_name, self.id()),
            None => write!(f, "ObjectRef(<locked> @ {:#x})", self.id()),
        }
    }
}

/// An instance of a composite type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Object {
    /// Runtime type name.
    pub type_name: String,
    fields: FxHashMap<String, Value>,
    /// Items of a collection or dictionary type.
    pub container: Option<Container>,
}

impl Object {
    /// Create an empty object of the given type.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: FxHashMap::default(),
            container: None,
        }
    }

    /// Create a container object.
    pub fn with_container(type_name: impl Into<String>, container: Container) -> Self {
        Self {
            container: Some(container),
            ..Self::new(type_name)
        }
    }

    /// Builder-style field setter.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    /// Read a field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Write a field.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Remove a field.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    /// Iterate over fields in arbitrary order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Wrap into a shared handle.
    pub fn into_ref(self) -> ObjectRef {
        ObjectRef::new(self)
    }
}

/// Kind of a collection or dictionary type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    /// Ordered, growable list.
    List,
    /// Set without duplicates; insertion order is kept.
    Set,
    /// Last-in first-out stack. Enumerates from the top.
    Stack,
    /// First-in first-out queue.
    Queue,
    /// Doubly linked list.
    LinkedList,
    /// Fixed-size array of the given rank.
    Array { rank: usize },
    /// Packed booleans.
    BitArray,
    /// Key/value map.
    Dictionary,
}

impl ContainerKind {
    /// Create an empty container of this kind.
    ///
    /// Arrays are created with zero length in every dimension.
    pub fn empty(&self) -> Container {
        match self {
            Self::List => Container::List(Vec::new()),
            Self::Set => Container::Set(Vec::new()),
            Self::Stack => Container::Stack(Vec::new()),
            Self::Queue => Container::Queue(VecDeque::new()),
            Self::LinkedList => Container::LinkedList(LinkedList::new()),
            Self::Array { rank } => Container::Array(ArrayValue {
                dims: vec![0; *rank],
                items: Vec::new(),
            }),
            Self::BitArray => Container::BitArray(Vec::new()),
            Self::Dictionary => Container::Map(Vec::new()),
        }
    }
}

/// Items held by a collection or dictionary object.
#[derive(Debug, Clone, PartialEq)]
pub enum Container {
    /// List items in order.
    List(Vec<Value>),
    /// Distinct items in insertion order.
    Set(Vec<Value>),
    /// Stack items, bottom first.
    Stack(Vec<Value>),
    /// Queue items, front first.
    Queue(VecDeque<Value>),
    /// Linked list items in order.
    LinkedList(LinkedList<Value>),
    /// Array with dimensions.
    Array(ArrayValue),
    /// Bits in order.
    BitArray(Vec<bool>),
    /// Key/value pairs in insertion order.
    Map(Vec<(Value, Value)>),
}

impl Container {
    /// Kind of this container.
    pub fn kind(&self) -> ContainerKind {
        match self {
            Self::List(_) => ContainerKind::List,
            Self::Set(_) => ContainerKind::Set,
            Self::Stack(_) => ContainerKind::Stack,
            Self::Queue(_) => ContainerKind::Queue,
            Self::LinkedList(_) => ContainerKind::LinkedList,
            Self::Array(a) => ContainerKind::Array { rank: a.rank() },
            Self::BitArray(_) => ContainerKind::BitArray,
            Self::Map(_) => ContainerKind::Dictionary,
        }
    }

    /// Number of items (or pairs).
    pub fn len(&self) -> usize {
        match self {
            Self::List(v) | Self::Set(v) | Self::Stack(v) => v.len(),
            Self::Queue(v) => v.len(),
            Self::LinkedList(v) => v.len(),
            Self::Array(a) => a.items.len(),
            Self::BitArray(v) => v.len(),
            Self::Map(v) => v.len(),
        }
    }

    /// Check if the container holds nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Items in enumeration order. Stacks enumerate from the top; arrays in
    /// row-major order. Maps yield no items (see [`Container::entries`]).
    pub fn items(&self) -> Vec<Value> {
        match self {
            Self::List(v) | Self::Set(v) => v.clone(),
            Self::Stack(v) => v.iter().rev().cloned().collect(),
            Self::Queue(v) => v.iter().cloned().collect(),
            Self::LinkedList(v) => v.iter().cloned().collect(),
            Self::Array(a) => a.items.clone(),
            Self::BitArray(v) => v.iter().map(|&b| Value::Bool(b)).collect(),
            Self::Map(_) => Vec::new(),
        }
    }

    /// Key/value pairs of a map.
    pub fn entries(&self) -> &[(Value, Value)] {
        match self {
            Self::Map(v) => v,
            _ => &[],
        }
    }

    /// Add an item using the container's own insertion rule.
    ///
    /// Lists, queues and linked lists append; stacks push onto the top;
    /// sets add only absent items. Returns the item back when it cannot be
    /// added (arrays are fixed-size, bit arrays only take booleans, maps
    /// take pairs).
    pub fn push(&mut self, item: Value) -> Result<(), Value> {
        match self {
            Self::List(v) | Self::Stack(v) => v.push(item),
            Self::Set(v) => {
                if !v.contains(&item) {
                    v.push(item);
                }
            }
            Self::Queue(v) => v.push_back(item),
            Self::LinkedList(v) => v.push_back(item),
            Self::BitArray(v) => match item {
                Value::Bool(b) => v.push(b),
                other => return Err(other),
            },
            Self::Array(_) | Self::Map(_) => return Err(item),
        }
        Ok(())
    }

    /// Add a key/value pair to a map. Fails on duplicate keys and non-maps.
    pub fn insert_entry(&mut self, key: Value, value: Value) -> Result<(), (Value, Value)> {
        match self {
            Self::Map(entries) if !entries.iter().any(|(k, _)| *k == key) => {
                entries.push((key, value));
                Ok(())
            }
            _ => Err((key, value)),
        }
    }
}

/// A rectangular array of any rank stored in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayValue {
    dims: Vec<usize>,
    items: Vec<Value>,
}

impl ArrayValue {
    /// Create an array of the given dimensions filled with nulls.
    ///
    /// Returns `None` if the element count overflows.
    pub fn new(dims: Vec<usize>) -> Option<Self> {
        let len = Self::element_count(&dims)?;
        Some(Self {
            dims,
            items: vec![Value::Null; len],
        })
    }

    /// Number of elements of an array with the given dimensions, `None` on overflow.
    pub fn element_count(dims: &[usize]) -> Option<usize> {
        dims.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
    }

    /// Create a one-dimensional array.
    pub fn from_items(items: Vec<Value>) -> Self {
        Self {
            dims: vec![items.len()],
            items,
        }
    }

    /// Create an array with dimensions from row-major items.
    ///
    /// Gives the items back if their count does not match the dimensions.
    pub fn from_parts(dims: Vec<usize>, items: Vec<Value>) -> Result<Self, Vec<Value>> {
        if Self::element_count(&dims) == Some(items.len()) {
            Ok(Self { dims, items })
        } else {
            Err(items)
        }
    }

    /// Number of dimensions.
    #[inline]
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Length of each dimension.
    #[inline]
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Items in row-major order.
    #[inline]
    pub fn items(&self) -> &[Value] {
        &self.items
    }

    /// Convert a row-major linear position to a per-dimension index.
    pub fn index_of(&self, mut linear: usize) -> Vec<usize> {
        let mut index = vec![0; self.dims.len()];
        for (slot, &dim) in index.iter_mut().zip(&self.dims).rev() {
            if dim == 0 {
                continue;
            }
            *slot = linear % dim;
            linear /= dim;
        }
        index
    }

    fn linear(&self, index: &[usize]) -> Option<usize> {
        if index.len() != self.dims.len() {
            return None;
        }
        let mut linear = 0;
        for (&i, &dim) in index.iter().zip(&self.dims) {
            if i >= dim {
                return None;
            }
            linear = linear * dim + i;
        }
        Some(linear)
    }

    /// Get the item at a multi-dimensional index.
    pub fn get(&self, index: &[usize]) -> Option<&Value> {
        self.linear(index).and_then(|i| self.items.get(i))
    }

    /// Set the item at a multi-dimensional index. Returns `false` when out of bounds.
    pub fn set(&mut self, index: &[usize], value: Value) -> bool {
        match self.linear(index) {
            Some(i) => {
                self.items[i] = value;
                true
            }
            None => false,
        }
    }
}

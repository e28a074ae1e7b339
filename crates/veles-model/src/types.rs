//! Built-in scalar types and the shape of generic type names.

use crate::{ModelError, Result, Value};

/// Name of the root type every other type is assignable to.
pub const OBJECT_TYPE: &str = "object";

/// Scalar types that serialize as a single text value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasicType {
    /// Boolean value.
    Boolean,
    /// Single Unicode scalar value.
    Char,
    /// Signed 8-bit integer.
    SByte,
    /// Signed 16-bit integer.
    Int16,
    /// Signed 32-bit integer.
    Int32,
    /// Signed 64-bit integer.
    Int64,
    /// Unsigned 8-bit integer.
    Byte,
    /// Unsigned 16-bit integer.
    UInt16,
    /// Unsigned 32-bit integer.
    UInt32,
    /// Unsigned 64-bit integer.
    UInt64,
    /// 32-bit floating point.
    Single,
    /// 64-bit floating point.
    Double,
    /// String value.
    String,
}

impl BasicType {
    /// All basic types.
    pub const ALL: [BasicType; 13] = [
        Self::Boolean,
        Self::Char,
        Self::SByte,
        Self::Int16,
        Self::Int32,
        Self::Int64,
        Self::Byte,
        Self::UInt16,
        Self::UInt32,
        Self::UInt64,
        Self::Single,
        Self::Double,
        Self::String,
    ];

    /// Look up a basic type by its type name (`i32`, `string`, ...).
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "bool" => Some(Self::Boolean),
            "char" => Some(Self::Char),
            "i8" => Some(Self::SByte),
            "i16" => Some(Self::Int16),
            "i32" => Some(Self::Int32),
            "i64" => Some(Self::Int64),
            "u8" => Some(Self::Byte),
            "u16" => Some(Self::UInt16),
            "u32" => Some(Self::UInt32),
            "u64" => Some(Self::UInt64),
            "f32" => Some(Self::Single),
            "f64" => Some(Self::Double),
            "string" => Some(Self::String),
            _ => None,
        }
    }

    /// The type name used in registries and member declarations.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Boolean => "bool",
            Self::Char => "char",
            Self::SByte => "i8",
            Self::Int16 => "i16",
            Self::Int32 => "i32",
            Self::Int64 => "i64",
            Self::Byte => "u8",
            Self::UInt16 => "u16",
            Self::UInt32 => "u32",
            Self::UInt64 => "u64",
            Self::Single => "f32",
            Self::Double => "f64",
            Self::String => "string",
        }
    }

    /// Get the XML element name for this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Boolean => "Boolean",
            Self::Char => "Char",
            Self::SByte => "SByte",
            Self::Int16 => "Int16",
            Self::Int32 => "Int32",
            Self::Int64 => "Int64",
            Self::Byte => "Byte",
            Self::UInt16 => "UInt16",
            Self::UInt32 => "UInt32",
            Self::UInt64 => "UInt64",
            Self::Single => "Single",
            Self::Double => "Double",
            Self::String => "String",
        }
    }

    /// Check if this is an integer type.
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Self::SByte
                | Self::Int16
                | Self::Int32
                | Self::Int64
                | Self::Byte
                | Self::UInt16
                | Self::UInt32
                | Self::UInt64
        )
    }

    /// Check if this is a floating point type.
    pub fn is_float(&self) -> bool {
        matches!(self, Self::Single | Self::Double)
    }

    /// Basic types are value types except `string`.
    pub fn is_value_type(&self) -> bool {
        !matches!(self, Self::String)
    }

    /// The zero value of this type.
    pub fn default_value(&self) -> Value {
        match self {
            Self::Boolean => Value::Bool(false),
            Self::Char => Value::Char('\0'),
            Self::SByte => Value::Int8(0),
            Self::Int16 => Value::Int16(0),
            Self::Int32 => Value::Int32(0),
            Self::Int64 => Value::Int64(0),
            Self::Byte => Value::UInt8(0),
            Self::UInt16 => Value::UInt16(0),
            Self::UInt32 => Value::UInt32(0),
            Self::UInt64 => Value::UInt64(0),
            Self::Single => Value::Float(0.0),
            Self::Double => Value::Double(0.0),
            Self::String => Value::String(String::new()),
        }
    }
}

impl std::fmt::Display for BasicType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_name())
    }
}

/// The syntactic shape of a type name.
///
/// Generic names use angle brackets (`List<i32>`, `Dictionary<string, Person>`)
/// and arrays use trailing brackets with one comma per extra dimension
/// (`i32[]`, `f64[,]`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExpr {
    /// A plain name.
    Named(String),
    /// A generic instantiation.
    Generic { base: String, args: Vec<String> },
    /// An array of `item` with the given rank.
    Array { item: String, rank: usize },
}

impl TypeExpr {
    /// Parse a type name.
    pub fn parse(name: &str) -> Result<Self> {
        let name = name.trim();
        let malformed = || ModelError::MalformedTypeName(name.to_string());

        if name.is_empty() {
            return Err(malformed());
        }

        if let Some(inner) = name.strip_suffix(']') {
            let open = inner.rfind('[').ok_or_else(malformed)?;
            let dims = &inner[open + 1..];
            if !dims.chars().all(|c| c == ',' || c.is_whitespace()) {
                return Err(malformed());
            }
            let item = inner[..open].trim();
            if item.is_empty() {
                return Err(malformed());
            }
            return Ok(Self::Array {
                item: item.to_string(),
                rank: dims.matches(',').count() + 1,
            });
        }

        if let Some(inner) = name.strip_suffix('>') {
            let open = inner.find('<').ok_or_else(malformed)?;
            let base = inner[..open].trim();
            let args = split_top_level(&inner[open + 1..]).ok_or_else(malformed)?;
            if base.is_empty() || args.iter().any(|a| a.is_empty()) {
                return Err(malformed());
            }
            return Ok(Self::Generic {
                base: base.to_string(),
                args,
            });
        }

        if name.contains(['<', '>', '[', ']', ',']) {
            return Err(malformed());
        }
        Ok(Self::Named(name.to_string()))
    }
}

/// Normalize spacing in a type name so equal types compare equal.
///
/// `Dictionary<string,List<i32>>` becomes `Dictionary<string, List<i32>>`
/// and `f64 [ , ]` becomes `f64[,]`. Malformed names are returned trimmed.
pub fn canonical_name(name: &str) -> String {
    match TypeExpr::parse(name) {
        Ok(TypeExpr::Named(n)) => n,
        Ok(TypeExpr::Generic { base, args }) => {
            let args: Vec<String> = args.iter().map(|a| canonical_name(a)).collect();
            format!("{}<{}>", base, args.join(", "))
        }
        Ok(TypeExpr::Array { item, rank }) => names::array(&canonical_name(&item), rank),
        Err(_) => name.trim().to_string(),
    }
}

/// Split generic arguments on commas that are not nested in brackets.
fn split_top_level(s: &str) -> Option<Vec<String>> {
    let mut args = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;

    for (i, c) in s.char_indices() {
        match c {
            '<' | '[' => depth += 1,
            '>' | ']' => {
                depth -= 1;
                if depth < 0 {
                    return None;
                }
            }
            ',' if depth == 0 => {
                args.push(s[start..i].trim().to_string());
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return None;
    }
    args.push(s[start..].trim().to_string());
    Some(args)
}

/// Helpers for spelling container type names.
pub mod names {
    /// `List<item>`
    pub fn list(item: &str) -> String {
        format!("List<{}>", item)
    }

    /// `HashSet<item>`
    pub fn set(item: &str) -> String {
        format!("HashSet<{}>", item)
    }

    /// `Stack<item>`
    pub fn stack(item: &str) -> String {
        format!("Stack<{}>", item)
    }

    /// `Queue<item>`
    pub fn queue(item: &str) -> String {
        format!("Queue<{}>", item)
    }

    /// `LinkedList<item>`
    pub fn linked_list(item: &str) -> String {
        format!("LinkedList<{}>", item)
    }

    /// `Dictionary<key, value>`
    pub fn dictionary(key: &str, value: &str) -> String {
        format!("Dictionary<{}, {}>", key, value)
    }

    /// `KeyValuePair<key, value>`
    pub fn key_value_pair(key: &str, value: &str) -> String {
        format!("KeyValuePair<{}, {}>", key, value)
    }

    /// `item[]`, `item[,]`, ...
    pub fn array(item: &str, rank: usize) -> String {
        format!("{}[{}]", item, ",".repeat(rank.saturating_sub(1)))
    }

    /// Name of the bit array type.
    pub const BIT_ARRAY: &str = "BitArray";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_names() {
        for basic in BasicType::ALL {
            assert_eq!(BasicType::from_name(basic.type_name()), Some(basic));
        }
        assert_eq!(BasicType::Int32.as_str(), "Int32");
        assert!(BasicType::from_name("Person").is_none());
    }

    #[test]
    fn test_parse_named() {
        assert_eq!(TypeExpr::parse("Person").unwrap(), TypeExpr::Named("Person".into()));
    }

    #[test]
    fn test_parse_generic() {
        let expr = TypeExpr::parse("Dictionary<string, List<i32>>").unwrap();
        assert_eq!(
            expr,
            TypeExpr::Generic {
                base: "Dictionary".into(),
                args: vec!["string".into(), "List<i32>".into()],
            }
        );
    }

    #[test]
    fn test_parse_array() {
        assert_eq!(
            TypeExpr::parse("i32[,]").unwrap(),
            TypeExpr::Array { item: "i32".into(), rank: 2 }
        );
        assert_eq!(
            TypeExpr::parse("List<i32>[]").unwrap(),
            TypeExpr::Array { item: "List<i32>".into(), rank: 1 }
        );
    }

    #[test]
    fn test_parse_malformed() {
        assert!(TypeExpr::parse("").is_err());
        assert!(TypeExpr::parse("List<i32").is_err());
        assert!(TypeExpr::parse("List<>").is_err());
        assert!(TypeExpr::parse("i32[x]").is_err());
        assert!(TypeExpr::parse("Map<a, <b>").is_err());
    }

    #[test]
    fn test_canonical_name() {
        assert_eq!(canonical_name("Dictionary<string,List<i32>>"), "Dictionary<string, List<i32>>");
        assert_eq!(canonical_name(" f64[ , ] "), "f64[,]");
        assert_eq!(canonical_name("Person"), "Person");
    }

    #[test]
    fn test_names() {
        assert_eq!(names::array("i32", 2), "i32[,]");
        assert_eq!(names::array("i32", 1), "i32[]");
        assert_eq!(names::dictionary("string", "i32"), "Dictionary<string, i32>");
    }
}

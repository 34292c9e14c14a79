//! Type grammar for interface descriptions.
//!
//! ```text
//! type := bool | i8 | i16 | i32 | i64 | u8 | u16 | u32 | u64 | i128 | u128
//!       | f32 | f64 | string | bytes
//!       | optional<type> | sequence<type> | map<type, type>
//!       | union<type, type, ...> | Identifier
//! ```
//!
//! Every form in the grammar parses, so a description can be loaded and
//! reported on in full. Whether a type is representable in the host
//! languages is a separate question answered by
//! [`TypeRef::first_unrepresentable`].

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error raised for text that does not match the type grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid type \"{value}\": {reason}")]
pub struct TypeParseError {
    /// The rejected text.
    pub value: String,
    /// What went wrong.
    pub reason: String,
}

/// Scalar types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    /// Boolean.
    Bool,
    /// Signed 8-bit integer.
    I8,
    /// Signed 16-bit integer.
    I16,
    /// Signed 32-bit integer.
    I32,
    /// Signed 64-bit integer.
    I64,
    /// Unsigned 8-bit integer.
    U8,
    /// Unsigned 16-bit integer.
    U16,
    /// Unsigned 32-bit integer.
    U32,
    /// Unsigned 64-bit integer.
    U64,
    /// Signed 128-bit integer. Parses but has no host representation.
    I128,
    /// Unsigned 128-bit integer. Parses but has no host representation.
    U128,
    /// 32-bit float.
    F32,
    /// 64-bit float.
    F64,
    /// UTF-8 string.
    String,
    /// Byte buffer.
    Bytes,
}

impl Primitive {
    const ALL: [Self; 15] = [
        Self::Bool,
        Self::I8,
        Self::I16,
        Self::I32,
        Self::I64,
        Self::U8,
        Self::U16,
        Self::U32,
        Self::U64,
        Self::I128,
        Self::U128,
        Self::F32,
        Self::F64,
        Self::String,
        Self::Bytes,
    ];

    /// Return the grammar keyword.
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::I128 => "i128",
            Self::U128 => "u128",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::String => "string",
            Self::Bytes => "bytes",
        }
    }

    fn from_keyword(word: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.keyword() == word)
    }
}

/// A parsed type reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRef {
    /// A scalar.
    Primitive(Primitive),
    /// A nullable value.
    Optional(Box<TypeRef>),
    /// An ordered list.
    Sequence(Box<TypeRef>),
    /// A map. Only string keys are representable.
    Map(Box<TypeRef>, Box<TypeRef>),
    /// An untagged union. Never representable.
    Union(Vec<TypeRef>),
    /// A reference to a declared record, enum, object, or callback.
    Named(String),
}

impl TypeRef {
    /// Return the first part of this type that the host languages cannot
    /// represent, ignoring named references (those are resolved against the
    /// declaring description).
    #[must_use]
    pub fn first_unrepresentable(&self) -> Option<&Self> {
        match self {
            Self::Primitive(Primitive::I128 | Primitive::U128) | Self::Union(_) => Some(self),
            Self::Primitive(_) | Self::Named(_) => None,
            Self::Optional(inner) | Self::Sequence(inner) => inner.first_unrepresentable(),
            Self::Map(key, value) => {
                if **key == Self::Primitive(Primitive::String) {
                    value.first_unrepresentable()
                } else {
                    Some(self)
                }
            }
        }
    }

    /// Visit every named reference in this type.
    pub fn named_refs<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Primitive(_) => {}
            Self::Named(name) => out.push(name),
            Self::Optional(inner) | Self::Sequence(inner) => inner.named_refs(out),
            Self::Map(key, value) => {
                key.named_refs(out);
                value.named_refs(out);
            }
            Self::Union(members) => members.iter().for_each(|m| m.named_refs(out)),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(p) => f.write_str(p.keyword()),
            Self::Optional(inner) => write!(f, "optional<{inner}>"),
            Self::Sequence(inner) => write!(f, "sequence<{inner}>"),
            Self::Map(key, value) => write!(f, "map<{key},{value}>"),
            Self::Union(members) => {
                f.write_str("union<")?;
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{member}")?;
                }
                f.write_str(">")
            }
            Self::Named(name) => f.write_str(name),
        }
    }
}

impl FromStr for TypeRef {
    type Err = TypeParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut parser = Parser {
            source: value,
            rest: value,
            depth: 0,
        };
        let parsed = parser.parse_type()?;
        parser.skip_ws();
        if !parser.rest.is_empty() {
            return Err(parser.error(format!("unexpected trailing input \"{}\"", parser.rest)));
        }
        Ok(parsed)
    }
}

impl Serialize for TypeRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TypeRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Deepest nesting of type constructors a description may use.
pub const MAX_TYPE_DEPTH: usize = 32;

struct Parser<'a> {
    source: &'a str,
    rest: &'a str,
    depth: usize,
}

impl Parser<'_> {
    fn error(&self, reason: impl Into<String>) -> TypeParseError {
        TypeParseError {
            value: self.source.to_owned(),
            reason: reason.into(),
        }
    }

    fn skip_ws(&mut self) {
        self.rest = self.rest.trim_start();
    }

    fn eat(&mut self, token: char) -> bool {
        self.skip_ws();
        if let Some(rest) = self.rest.strip_prefix(token) {
            self.rest = rest;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: char) -> Result<(), TypeParseError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{token}'")))
        }
    }

    fn ident(&mut self) -> Result<&str, TypeParseError> {
        self.skip_ws();
        let end = self
            .rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(self.rest.len());
        if end == 0 {
            return Err(self.error("expected a type name"));
        }
        let (word, rest) = self.rest.split_at(end);
        if word.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(self.error(format!("type name \"{word}\" starts with a digit")));
        }
        self.rest = rest;
        Ok(word)
    }

    fn parse_type(&mut self) -> Result<TypeRef, TypeParseError> {
        if self.depth == MAX_TYPE_DEPTH {
            return Err(self.error(format!("nested deeper than {MAX_TYPE_DEPTH} levels")));
        }
        self.depth += 1;
        let parsed = self.parse_type_at_depth();
        self.depth -= 1;
        parsed
    }

    fn parse_type_at_depth(&mut self) -> Result<TypeRef, TypeParseError> {
        let word = self.ident()?.to_owned();
        if let Some(primitive) = Primitive::from_keyword(&word) {
            return Ok(TypeRef::Primitive(primitive));
        }
        match word.as_str() {
            "optional" => Ok(TypeRef::Optional(Box::new(self.single_argument()?))),
            "sequence" => Ok(TypeRef::Sequence(Box::new(self.single_argument()?))),
            "map" => {
                self.expect('<')?;
                let key = self.parse_type()?;
                self.expect(',')?;
                let value = self.parse_type()?;
                self.expect('>')?;
                Ok(TypeRef::Map(Box::new(key), Box::new(value)))
            }
            "union" => {
                self.expect('<')?;
                let mut members = vec![self.parse_type()?];
                while self.eat(',') {
                    members.push(self.parse_type()?);
                }
                self.expect('>')?;
                Ok(TypeRef::Union(members))
            }
            _ => Ok(TypeRef::Named(word)),
        }
    }

    fn single_argument(&mut self) -> Result<TypeRef, TypeParseError> {
        self.expect('<')?;
        let inner = self.parse_type()?;
        self.expect('>')?;
        Ok(inner)
    }
}

//! # Interface values and types
//!
//! The subset of the interface description language that crosses the agent
//! boundary. Encoding these on the wire is the agent's business; this module
//! only describes shapes and checks that values fit them.

use std::fmt;

use crate::principal::Principal;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Null,
    Bool,
    Nat64,
    Int64,
    Text,
    Blob,
    Principal,
    Opt(Box<Type>),
    Vec(Box<Type>),
    /// Named fields. Order is not significant.
    Record(Vec<(String, Type)>),
    /// Named cases. Payload-less cases carry `Type::Null`.
    Variant(Vec<(String, Type)>),
}

impl Type {
    pub fn opt(inner: Type) -> Self {
        Self::Opt(Box::new(inner))
    }

    pub fn vec(inner: Type) -> Self {
        Self::Vec(Box::new(inner))
    }

    pub fn record<'a>(fields: impl IntoIterator<Item = (&'a str, Type)>) -> Self {
        Self::Record(fields.into_iter().map(|(k, t)| (k.to_string(), t)).collect())
    }

    pub fn variant<'a>(cases: impl IntoIterator<Item = (&'a str, Type)>) -> Self {
        Self::Variant(cases.into_iter().map(|(k, t)| (k.to_string(), t)).collect())
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool => write!(f, "bool"),
            Self::Nat64 => write!(f, "nat64"),
            Self::Int64 => write!(f, "int64"),
            Self::Text => write!(f, "text"),
            Self::Blob => write!(f, "blob"),
            Self::Principal => write!(f, "principal"),
            Self::Opt(t) => write!(f, "opt {}", t),
            Self::Vec(t) => write!(f, "vec {}", t),
            Self::Record(fields) => {
                write!(f, "record {{")?;
                for (name, ty) in fields {
                    write!(f, " {}: {};", name, ty)?;
                }
                write!(f, " }}")
            }
            Self::Variant(cases) => {
                write!(f, "variant {{")?;
                for (name, ty) in cases {
                    match ty {
                        Type::Null => write!(f, " {};", name)?,
                        ty => write!(f, " {}: {};", name, ty)?,
                    }
                }
                write!(f, " }}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Null,
    Bool(bool),
    Nat64(u64),
    Int64(i64),
    Text(String),
    Blob(Vec<u8>),
    Principal(Principal),
    Opt(Option<Box<Value>>),
    Vec(Vec<Value>),
    Record(Vec<(String, Value)>),
    Variant(String, Box<Value>),
}

/// A value did not have the shape the caller asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    Mismatch { expected: &'static str, found: String },
    MissingField(String),
    UnknownCase(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mismatch { expected, found } => write!(f, "expected {}, found {}", expected, found),
            Self::MissingField(name) => write!(f, "missing record field '{}'", name),
            Self::UnknownCase(name) => write!(f, "unknown variant case '{}'", name),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn some(v: Value) -> Self {
        Self::Opt(Some(Box::new(v)))
    }

    pub fn none() -> Self {
        Self::Opt(None)
    }

    pub fn record<'a>(fields: impl IntoIterator<Item = (&'a str, Value)>) -> Self {
        Self::Record(fields.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    pub fn variant(case: impl Into<String>, payload: Value) -> Self {
        Self::Variant(case.into(), Box::new(payload))
    }

    /// Short name of the value's kind, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Nat64(_) => "nat64",
            Self::Int64(_) => "int64",
            Self::Text(_) => "text",
            Self::Blob(_) => "blob",
            Self::Principal(_) => "principal",
            Self::Opt(_) => "opt",
            Self::Vec(_) => "vec",
            Self::Record(_) => "record",
            Self::Variant(..) => "variant",
        }
    }

    /// Checks that this value has the shape described by `ty`.
    pub fn conforms_to(&self, ty: &Type) -> bool {
        match (self, ty) {
            (Value::Null, Type::Null)
            | (Value::Bool(_), Type::Bool)
            | (Value::Nat64(_), Type::Nat64)
            | (Value::Int64(_), Type::Int64)
            | (Value::Text(_), Type::Text)
            | (Value::Blob(_), Type::Blob)
            | (Value::Principal(_), Type::Principal) => true,

            (Value::Opt(None), Type::Opt(_)) => true,
            (Value::Opt(Some(v)), Type::Opt(t)) => v.conforms_to(t),
            (Value::Vec(items), Type::Vec(t)) => items.iter().all(|v| v.conforms_to(t)),

            (Value::Record(fields), Type::Record(field_types)) => {
                fields.len() == field_types.len()
                    && field_types.iter().all(|(name, t)| {
                        fields
                            .iter()
                            .find(|(n, _)| n == name)
                            .is_some_and(|(_, v)| v.conforms_to(t))
                    })
            }
            (Value::Variant(case, payload), Type::Variant(cases)) => cases
                .iter()
                .find(|(n, _)| n == case)
                .is_some_and(|(_, t)| payload.conforms_to(t)),

            _ => false,
        }
    }

    pub fn as_text(&self) -> Result<&str> {
        match self {
            Self::Text(s) => Ok(s),
            other => Err(mismatch("text", other)),
        }
    }

    pub fn as_blob(&self) -> Result<&[u8]> {
        match self {
            Self::Blob(b) => Ok(b),
            other => Err(mismatch("blob", other)),
        }
    }

    pub fn as_nat64(&self) -> Result<u64> {
        match self {
            Self::Nat64(n) => Ok(*n),
            other => Err(mismatch("nat64", other)),
        }
    }

    pub fn as_int64(&self) -> Result<i64> {
        match self {
            Self::Int64(n) => Ok(*n),
            other => Err(mismatch("int64", other)),
        }
    }

    pub fn as_opt(&self) -> Result<Option<&Value>> {
        match self {
            Self::Opt(v) => Ok(v.as_deref()),
            other => Err(mismatch("opt", other)),
        }
    }

    pub fn as_vec(&self) -> Result<&[Value]> {
        match self {
            Self::Vec(items) => Ok(items),
            other => Err(mismatch("vec", other)),
        }
    }

    pub fn as_variant(&self) -> Result<(&str, &Value)> {
        match self {
            Self::Variant(case, payload) => Ok((case, payload)),
            other => Err(mismatch("variant", other)),
        }
    }

    /// Looks up a record field by name.
    pub fn field(&self, name: &str) -> Result<&Value> {
        match self {
            Self::Record(fields) => fields
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v)
                .ok_or_else(|| Error::MissingField(name.to_string())),
            other => Err(mismatch("record", other)),
        }
    }
}

fn mismatch(expected: &'static str, found: &Value) -> Error {
    Error::Mismatch {
        expected,
        found: found.kind().to_string(),
    }
}

//! # Interface descriptions
//!
//! The catalog of methods a canister exposes: for each method its call mode
//! and the types of its arguments and results. An `Actor` consults it on
//! every call, before and after the round trip.

use std::collections::BTreeMap;
use std::fmt;

use crate::idl::Type;
use crate::idl::Value;

/// How a method is invoked on the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Read-only, answered by a single replica.
    Query,
    /// State-changing, goes through consensus.
    Update,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Query => write!(f, "query"),
            Self::Update => write!(f, "update"),
        }
    }
}

/// The signature of a single method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Method {
    pub mode: Mode,
    pub params: Vec<Type>,
    pub results: Vec<Type>,
}

/// Reasons a list of values does not fit a signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    Arity { expected: usize, found: usize },
    Type { index: usize, expected: Type, found: &'static str },
}

impl fmt::Display for SignatureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Arity { expected, found } => write!(f, "expected {} values, found {}", expected, found),
            Self::Type { index, expected, found } => {
                write!(f, "value {} should be {}, found {}", index, expected, found)
            }
        }
    }
}

impl std::error::Error for SignatureError {}

impl Method {
    pub fn check_args(&self, args: &[Value]) -> Result<(), SignatureError> {
        check(&self.params, args)
    }

    pub fn check_results(&self, results: &[Value]) -> Result<(), SignatureError> {
        check(&self.results, results)
    }
}

fn check(types: &[Type], values: &[Value]) -> Result<(), SignatureError> {
    if types.len() != values.len() {
        return Err(SignatureError::Arity {
            expected: types.len(),
            found: values.len(),
        });
    }

    for (index, (ty, value)) in types.iter().zip(values).enumerate() {
        if !value.conforms_to(ty) {
            return Err(SignatureError::Type {
                index,
                expected: ty.clone(),
                found: value.kind(),
            });
        }
    }
    Ok(())
}

/// A named set of method signatures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    name: String,
    methods: BTreeMap<String, Method>,
}

impl Interface {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: BTreeMap::new(),
        }
    }

    pub fn query(
        self,
        method: impl Into<String>,
        params: impl IntoIterator<Item = Type>,
        results: impl IntoIterator<Item = Type>,
    ) -> Self {
        self.method(method, Mode::Query, params, results)
    }

    pub fn update(
        self,
        method: impl Into<String>,
        params: impl IntoIterator<Item = Type>,
        results: impl IntoIterator<Item = Type>,
    ) -> Self {
        self.method(method, Mode::Update, params, results)
    }

    /// Adds (or replaces) a method.
    pub fn method(
        mut self,
        method: impl Into<String>,
        mode: Mode,
        params: impl IntoIterator<Item = Type>,
        results: impl IntoIterator<Item = Type>,
    ) -> Self {
        self.methods.insert(
            method.into(),
            Method {
                mode,
                params: params.into_iter().collect(),
                results: results.into_iter().collect(),
            },
        );
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, method: &str) -> Option<&Method> {
        self.methods.get(method)
    }

    /// Method names in sorted order.
    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }
}

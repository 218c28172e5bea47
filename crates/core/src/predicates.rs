//! Capability predicates over dynamic values.
//!
//! Free functions over both the object graph ([`Value`]) and loosely-typed
//! JSON arguments. Nothing here is attached to the values themselves.

use crate::object::Value;

/// Coarse runtime kind of a dynamic value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Null,
    Bool,
    Number,
    String,
    Array,
    Object,
    Method,
}

/// Anything the predicates can inspect.
pub trait Shape {
    fn kind(&self) -> Kind;

    fn has_own_property(&self, key: &str) -> bool;
}

impl Shape for Value {
    fn kind(&self) -> Kind {
        match self {
            Value::Null => Kind::Null,
            Value::Bool(_) => Kind::Bool,
            Value::Number(_) => Kind::Number,
            Value::String(_) => Kind::String,
            Value::Array(_) => Kind::Array,
            Value::Object(_) => Kind::Object,
            Value::Method(_) => Kind::Method,
        }
    }

    fn has_own_property(&self, key: &str) -> bool {
        match self {
            Value::Object(obj) => obj.has_own(key),
            _ => false,
        }
    }
}

impl Shape for serde_json::Value {
    fn kind(&self) -> Kind {
        match self {
            serde_json::Value::Null => Kind::Null,
            serde_json::Value::Bool(_) => Kind::Bool,
            serde_json::Value::Number(_) => Kind::Number,
            serde_json::Value::String(_) => Kind::String,
            serde_json::Value::Array(_) => Kind::Array,
            serde_json::Value::Object(_) => Kind::Object,
        }
    }

    fn has_own_property(&self, key: &str) -> bool {
        self.as_object().is_some_and(|map| map.contains_key(key))
    }
}

/// Arrays count as objects, null does not.
pub fn is_object<T: Shape + ?Sized>(value: &T) -> bool {
    matches!(value.kind(), Kind::Object | Kind::Array)
}

/// A keyed object that is not an array.
pub fn is_plain_object<T: Shape + ?Sized>(value: &T) -> bool {
    value.kind() == Kind::Object
}

pub fn is_array<T: Shape + ?Sized>(value: &T) -> bool {
    value.kind() == Kind::Array
}

pub fn is_string<T: Shape + ?Sized>(value: &T) -> bool {
    value.kind() == Kind::String
}

pub fn is_null<T: Shape + ?Sized>(value: &T) -> bool {
    value.kind() == Kind::Null
}

pub fn is_callable<T: Shape + ?Sized>(value: &T) -> bool {
    value.kind() == Kind::Method
}

/// Iterable collections other than strings.
pub fn is_non_string_iterable<T: Shape + ?Sized>(value: &T) -> bool {
    value.kind() == Kind::Array
}

pub fn has_own_property<T: Shape + ?Sized>(value: &T, key: &str) -> bool {
    value.has_own_property(key)
}

//! Dynamic object graph the ward layer operates on.
//!
//! [`Obj`] is a shared handle: cloning it clones the reference, so every ward
//! built over an object observes (and writes through to) the same storage.

use crate::types::{ClassId, PropertyKey};
use smallvec::SmallVec;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// A property value. Missing properties are `Option::None`, not a variant.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Object(Obj),
    Method(Method),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Method(_) => "method",
        }
    }

    pub fn as_object(&self) -> Option<&Obj> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Converts parsed JSON into the object graph. JSON objects become fresh,
    /// class-less [`Obj`]s.
    pub fn from_json(json: &serde_json::Value) -> Self {
        Self::from_json_inner(json, None)
    }

    fn from_json_inner(json: &serde_json::Value, tag: Option<&str>) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            // Out-of-range u64/i64 degrade to f64 precision, same as the host.
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => {
                Value::Array(items.iter().map(|v| Self::from_json_inner(v, tag)).collect())
            }
            serde_json::Value::Object(map) => Value::Object(Obj::from_map(map, tag)),
        }
    }

    /// Renders the value as JSON. Methods are dropped; cyclic references
    /// render as `"[Circular]"`.
    pub fn to_json(&self) -> serde_json::Value {
        let mut stack = Vec::new();
        self.to_json_inner(&mut stack)
    }

    fn to_json_inner(&self, stack: &mut Vec<*const ()>) -> serde_json::Value {
        match self {
            Value::Null | Value::Method(_) => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => number_to_json(*n),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(|v| v.to_json_inner(stack)).collect())
            }
            Value::Object(obj) => obj.to_json_inner(stack),
        }
    }
}

/// Integral numbers within the exact `f64` range serialize as integers.
fn number_to_json(n: f64) -> serde_json::Value {
    const EXACT: f64 = 9_007_199_254_740_992.0;
    if n.fract() == 0.0 && n.abs() < EXACT {
        return serde_json::Value::from(n as i64);
    }
    serde_json::Number::from_f64(n)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Method(a), Value::Method(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl PartialEq<&str> for Value {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == Some(*other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Array(items) => f.debug_tuple("Array").field(items).finish(),
            Value::Object(obj) => fmt::Debug::fmt(obj, f),
            Value::Method(_) => f.write_str("Method"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<Obj> for Value {
    fn from(obj: Obj) -> Self {
        Value::Object(obj)
    }
}

impl From<Method> for Value {
    fn from(method: Method) -> Self {
        Value::Method(method)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

// ---------------------------------------------------------------------------
// Methods
// ---------------------------------------------------------------------------

type MethodFn = dyn Fn(&Obj, &[Value]) -> Value;

/// A callable property. Always invoked with the object that owns it as
/// receiver, never with a ward.
#[derive(Clone)]
pub struct Method(Rc<MethodFn>);

impl Method {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Obj, &[Value]) -> Value + 'static,
    {
        Self(Rc::new(f))
    }

    pub fn invoke(&self, receiver: &Obj, args: &[Value]) -> Value {
        (self.0)(receiver, args)
    }

    pub fn ptr_eq(&self, other: &Method) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

// ---------------------------------------------------------------------------
// Objects
// ---------------------------------------------------------------------------

/// Insertion-ordered property table. Most objects carry a handful of keys.
type Props = SmallVec<[(PropertyKey, Value); 8]>;

#[derive(Default)]
struct ObjData {
    class: Option<ClassId>,
    props: Props,
}

impl ObjData {
    fn position(&self, key: &str) -> Option<usize> {
        self.props.iter().position(|(k, _)| k.as_str() == key)
    }
}

/// Shared, interior-mutable object handle.
#[derive(Clone, Default)]
pub struct Obj(Rc<RefCell<ObjData>>);

impl Obj {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_class(class: impl Into<ClassId>) -> Self {
        Self(Rc::new(RefCell::new(ObjData {
            class: Some(class.into()),
            props: Props::new(),
        })))
    }

    /// Builder-style `set`, for literals in tests and fixtures.
    pub fn prop(self, key: impl Into<PropertyKey>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn class(&self) -> Option<ClassId> {
        self.0.borrow().class.clone()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        let data = self.0.borrow();
        data.position(key).map(|i| data.props[i].1.clone())
    }

    /// Writes `key`, returning the previous value if there was one.
    pub fn set(&self, key: impl Into<PropertyKey>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        let mut data = self.0.borrow_mut();
        match data.position(key.as_str()) {
            Some(i) => Some(std::mem::replace(&mut data.props[i].1, value)),
            None => {
                data.props.push((key, value));
                None
            }
        }
    }

    pub fn has_own(&self, key: &str) -> bool {
        self.0.borrow().position(key).is_some()
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        let mut data = self.0.borrow_mut();
        let i = data.position(key)?;
        Some(data.props.remove(i).1)
    }

    pub fn keys(&self) -> Vec<PropertyKey> {
        self.0.borrow().props.iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().props.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().props.is_empty()
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &Obj) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Invokes the method stored under `key` with `self` as receiver.
    /// Returns `None` if the property is missing or not a method.
    pub fn call(&self, key: &str, args: &[Value]) -> Option<Value> {
        // Clone out first: the method is free to mutate `self`.
        let method = match self.get(key)? {
            Value::Method(m) => m,
            _ => return None,
        };
        Some(method.invoke(self, args))
    }

    /// Builds an object from a JSON object. Non-objects yield `None`.
    pub fn from_json(json: &serde_json::Value) -> Option<Obj> {
        json.as_object().map(|map| Self::from_map(map, None))
    }

    /// Like [`Obj::from_json`], but every nested JSON object carrying a
    /// string member named `tag` becomes an instance of that class. The tag
    /// member itself is not stored as a property.
    pub fn from_json_tagged(json: &serde_json::Value, tag: &str) -> Option<Obj> {
        json.as_object().map(|map| Self::from_map(map, Some(tag)))
    }

    fn from_map(map: &serde_json::Map<String, serde_json::Value>, tag: Option<&str>) -> Obj {
        let class = tag
            .and_then(|t| map.get(t))
            .and_then(serde_json::Value::as_str)
            .map(ClassId::from);

        let props = map
            .iter()
            .filter(|(k, _)| Some(k.as_str()) != tag || class.is_none())
            .map(|(k, v)| (PropertyKey::from(k.as_str()), Value::from_json_inner(v, tag)))
            .collect();

        Obj(Rc::new(RefCell::new(ObjData { class, props })))
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut stack = Vec::new();
        self.to_json_inner(&mut stack)
    }

    fn to_json_inner(&self, stack: &mut Vec<*const ()>) -> serde_json::Value {
        let ptr = self.as_ptr();
        if stack.contains(&ptr) {
            return serde_json::Value::String("[Circular]".into());
        }
        stack.push(ptr);

        let mut map = serde_json::Map::new();
        for (key, value) in self.0.borrow().props.iter() {
            if matches!(value, Value::Method(_)) {
                continue;
            }
            map.insert(key.to_string(), value.to_json_inner(stack));
        }

        stack.pop();
        serde_json::Value::Object(map)
    }

    /// Stable address of the shared allocation, for cycle detection.
    pub fn as_ptr(&self) -> *const () {
        Rc::as_ptr(&self.0) as *const ()
    }
}

/// Shallow on purpose: object graphs may be cyclic.
impl fmt::Debug for Obj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.0.borrow();
        f.debug_struct("Obj")
            .field("class", &data.class)
            .field(
                "keys",
                &data.props.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn clones_share_storage() {
        let a = Obj::new().prop("contents", "one");
        let b = a.clone();
        b.set("contents", "two");
        assert_eq!(a.get("contents"), Some(Value::from("two")));
        assert!(a.ptr_eq(&b));
    }

    #[test]
    fn set_returns_previous_and_keeps_order() {
        let obj = Obj::new().prop("a", 1).prop("b", 2);
        assert_eq!(obj.set("a", 3), Some(Value::from(1)));
        assert_eq!(obj.keys(), vec![PropertyKey::from("a"), PropertyKey::from("b")]);
        assert_eq!(obj.remove("a"), Some(Value::from(3)));
        assert!(!obj.has_own("a"));
        assert_eq!(obj.len(), 1);
    }

    #[test]
    fn method_receives_owner() {
        let obj = Obj::new().prop("count", 0).prop(
            "bump",
            Method::new(|this, _| {
                let next = this.get("count").and_then(|v| v.as_f64()).unwrap_or(0.0) + 1.0;
                this.set("count", next);
                Value::Number(next)
            }),
        );
        assert_eq!(obj.call("bump", &[]), Some(Value::Number(1.0)));
        assert_eq!(obj.get("count"), Some(Value::Number(1.0)));
        assert_eq!(obj.call("count", &[]), None);
    }

    #[test]
    fn tagged_json_assigns_classes() {
        let doc = json!({
            "bag": { "$class": "Bag", "contents": "one" },
            "plain": { "$class": 7 }
        });
        let root = Obj::from_json_tagged(&doc, "$class").unwrap();
        let bag = root.get("bag").unwrap();
        let bag = bag.as_object().unwrap();
        assert_eq!(bag.class(), Some(ClassId::from("Bag")));
        assert!(!bag.has_own("$class"));

        // Non-string tags are ordinary properties.
        let plain = root.get("plain").unwrap();
        assert!(plain.as_object().unwrap().has_own("$class"));
        assert_eq!(root.class(), None);
    }

    #[test]
    fn to_json_breaks_cycles_and_drops_methods() {
        let obj = Obj::new()
            .prop("name", "loop")
            .prop("noop", Method::new(|_, _| Value::Null));
        obj.set("me", obj.clone());
        assert_eq!(obj.to_json(), json!({ "name": "loop", "me": "[Circular]" }));
    }

    #[test]
    fn integral_numbers_serialize_as_integers() {
        assert_eq!(Value::from(3).to_json(), json!(3));
        assert_eq!(Value::from(-1.5).to_json(), json!(-1.5));
        assert_eq!(Value::from(f64::NAN).to_json(), json!(null));
    }

    #[test]
    fn from_json_rejects_non_objects() {
        assert!(Obj::from_json(&json!([1, 2])).is_none());
        assert!(Obj::from_json(&json!({})).is_some());
    }
}

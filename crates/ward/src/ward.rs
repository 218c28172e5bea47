//! The ward facade: restricted views over an [`Obj`].
//!
//! A [`View`] is either the bare target (nothing to enforce) or a [`Ward`].
//! Reads and writes go through explicit accessors:
//!
//! ```ignore
//! let view = wardkit_ward::ward(&bag, WardOptions::new().protected(["contents"]));
//! assert_eq!(view.get("contents")?.unwrap(), "one");
//! assert!(view.set("contents", "two").is_err());
//! ```

use crate::config::{resolve, WardConfig, WardOptions};
use crate::registry::ClassRegistry;
use crate::tryer::{TryOutcome, TryRequest, TryResult, TryResults, Tryer};
use serde::ser::Error as _;
use serde::{Serialize, Serializer};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use wardkit_core::{Access, Obj, PropertyKey, Value, WardError, WardResult};

// ---------------------------------------------------------------------------
// Fields
// ---------------------------------------------------------------------------

/// What a view hands out for a key: a plain value, or a warded child.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Value(Value),
    View(View),
}

impl Field {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Field::Value(v) => Some(v),
            Field::View(_) => None,
        }
    }

    pub fn as_view(&self) -> Option<&View> {
        match self {
            Field::View(v) => Some(v),
            Field::Value(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_value().and_then(Value::as_str)
    }

    /// JSON as seen through any ward this field carries.
    pub fn to_json(&self) -> WardResult<serde_json::Value> {
        match self {
            Field::Value(v) => Ok(v.to_json()),
            Field::View(view) => view.snapshot(),
        }
    }
}

impl PartialEq<&str> for Field {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == Some(*other)
    }
}

impl PartialEq<Value> for Field {
    fn eq(&self, other: &Value) -> bool {
        self.as_value() == Some(other)
    }
}

impl Serialize for Field {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json()
            .map_err(S::Error::custom)?
            .serialize(serializer)
    }
}

// ---------------------------------------------------------------------------
// Ward
// ---------------------------------------------------------------------------

struct WardInner {
    target: Obj,
    config: WardConfig,
    registry: ClassRegistry,
    /// Child views built so far, keyed by property.
    children: RefCell<HashMap<PropertyKey, View>>,
}

/// A restricted view bound to one target and one immutable config.
///
/// Cloning is cheap and preserves identity (see [`View::ptr_eq`]).
#[derive(Clone)]
pub struct Ward(Rc<WardInner>);

impl Ward {
    fn new(target: Obj, config: WardConfig, registry: ClassRegistry) -> Self {
        Self(Rc::new(WardInner {
            target,
            config,
            registry,
            children: RefCell::new(HashMap::new()),
        }))
    }

    pub(crate) fn target(&self) -> &Obj {
        &self.0.target
    }

    pub fn config(&self) -> &WardConfig {
        &self.0.config
    }

    pub fn ptr_eq(&self, other: &Ward) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn get(&self, key: &str) -> WardResult<Option<Field>> {
        let config = self.config();
        if config.is_hidden(key) {
            return Ok(None);
        }
        if let Some(options) = config.child_options(key) {
            return Ok(self.child(key, options)?.map(Field::View));
        }
        Ok(self.target().get(key).map(Field::Value))
    }

    fn set(&self, key: PropertyKey, value: Value) -> WardResult<()> {
        if !self.config().access_of(key.as_str()).contains(Access::SET) {
            return Err(WardError::ProtectedWriteRejected { key });
        }
        if !self.accepts(key.as_str(), &value) {
            return Err(WardError::ChildNotWardable { key });
        }
        // The next read wards whatever object now sits under the key.
        self.0.children.borrow_mut().remove(key.as_str());
        self.target().set(key, value);
        Ok(())
    }

    /// A child-ward key only ever holds objects.
    fn accepts(&self, key: &str, value: &Value) -> bool {
        self.config().child_options(key).is_none() || matches!(value, Value::Object(_))
    }

    /// Returns the cached child view for `key`, building it on first access.
    ///
    /// A cached view is reused only while the property still holds the same
    /// object.
    fn child(&self, key: &str, options: &WardOptions) -> WardResult<Option<View>> {
        let obj = match self.target().get(key) {
            None => {
                self.0.children.borrow_mut().remove(key);
                return Ok(None);
            }
            Some(Value::Object(obj)) => obj,
            Some(_) => {
                return Err(WardError::ChildNotWardable { key: key.into() });
            }
        };

        if let Some(view) = self.0.children.borrow().get(key) {
            if view.target().ptr_eq(&obj) {
                return Ok(Some(view.clone()));
            }
        }

        let config = resolve(&obj, options, &self.0.registry);
        let view = create(obj, config, self.0.registry.clone());
        tracing::trace!(key, warded = view.is_ward(), "built child ward");

        self.0
            .children
            .borrow_mut()
            .insert(PropertyKey::from(key), view.clone());
        Ok(Some(view))
    }
}

impl fmt::Debug for Ward {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ward")
            .field("target", &self.0.target)
            .field("config", &self.0.config)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// View
// ---------------------------------------------------------------------------

/// The result of warding a target.
#[derive(Debug, Clone)]
pub enum View {
    /// Nothing was configured; the target itself.
    Target(Obj),
    Ward(Ward),
}

/// Builds the view for an already-resolved config.
///
/// An empty config yields [`View::Target`] holding the same object.
pub fn create(target: Obj, config: WardConfig, registry: ClassRegistry) -> View {
    if config.is_empty() {
        return View::Target(target);
    }
    View::Ward(Ward::new(target, config, registry))
}

impl View {
    /// The real object behind the view. Never handed out: writes to it would
    /// skip the ward.
    pub(crate) fn target(&self) -> &Obj {
        match self {
            View::Target(obj) => obj,
            View::Ward(ward) => ward.target(),
        }
    }

    /// Whether the view stands for `obj`.
    pub fn is_view_of(&self, obj: &Obj) -> bool {
        self.target().ptr_eq(obj)
    }

    /// Whether `set(key, value)` would pass the child-ward shape check.
    pub(crate) fn accepts(&self, key: &str, value: &Value) -> bool {
        self.as_ward().is_none_or(|ward| ward.accepts(key, value))
    }

    pub fn as_ward(&self) -> Option<&Ward> {
        match self {
            View::Ward(ward) => Some(ward),
            View::Target(_) => None,
        }
    }

    pub fn is_ward(&self) -> bool {
        matches!(self, View::Ward(_))
    }

    pub fn config(&self) -> Option<&WardConfig> {
        self.as_ward().map(Ward::config)
    }

    /// Identity: same ward instance, or same bare object.
    pub fn ptr_eq(&self, other: &View) -> bool {
        match (self, other) {
            (View::Target(a), View::Target(b)) => a.ptr_eq(b),
            (View::Ward(a), View::Ward(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Configured access for `key`, ignoring presence on the target.
    pub fn access_of(&self, key: &str) -> Access {
        self.config()
            .map_or(Access::GET | Access::SET, |config| config.access_of(key))
    }

    /// Reads `key`. Hidden and missing keys read as `None`.
    pub fn get(&self, key: &str) -> WardResult<Option<Field>> {
        match self {
            View::Target(obj) => Ok(obj.get(key).map(Field::Value)),
            View::Ward(ward) => ward.get(key),
        }
    }

    /// Ordinary assignment: fails loudly on hidden or protected keys.
    pub fn set(&self, key: impl Into<PropertyKey>, value: impl Into<Value>) -> WardResult<()> {
        match self {
            View::Target(obj) => {
                obj.set(key, value);
                Ok(())
            }
            View::Ward(ward) => ward.set(key.into(), value.into()),
        }
    }

    /// Calls the method stored under `key` with the real target as receiver.
    pub fn call(&self, key: &str, args: &[Value]) -> WardResult<Value> {
        match self.get(key)? {
            Some(Field::Value(Value::Method(method))) => Ok(method.invoke(self.target(), args)),
            _ => Err(WardError::NotCallable { key: key.into() }),
        }
    }

    /// Own keys that are visible through the view.
    pub fn keys(&self) -> Vec<PropertyKey> {
        let keys = self.target().keys();
        match self.config() {
            None => keys,
            Some(config) => keys
                .into_iter()
                .filter(|k| !config.is_hidden(k.as_str()))
                .collect(),
        }
    }

    // -- try-accessor -------------------------------------------------------

    /// The non-throwing speculative accessor.
    pub fn tryer(&self) -> Tryer<'_> {
        Tryer::new(self)
    }

    pub fn try_get(&self, key: &str) -> WardResult<TryResult> {
        self.tryer().get(key)
    }

    pub fn try_can_set(&self, key: &str) -> WardResult<TryResult> {
        self.tryer().can_set(key)
    }

    pub fn try_set(&self, key: &str, value: impl Into<Value>) -> WardResult<TryResult> {
        self.tryer().set(key, value.into())
    }

    pub fn try_op(&self, access: Access, key: &str, value: Option<Value>) -> WardResult<TryResult> {
        self.tryer().op(access, key, value)
    }

    pub fn try_batch(&self, request: &TryRequest) -> WardResult<TryResults> {
        self.tryer().batch(request)
    }

    /// Loosely-typed `try(...)`: see [`crate::args::classify_try_args`].
    pub fn try_dynamic(&self, args: &[serde_json::Value]) -> WardResult<TryOutcome> {
        self.tryer().dynamic(args)
    }

    // -- rendering ----------------------------------------------------------

    /// JSON of the object as seen through the view: hidden keys omitted,
    /// child wards applied, methods dropped, cycles as `"[Circular]"`.
    pub fn snapshot(&self) -> WardResult<serde_json::Value> {
        let mut stack = Vec::new();
        self.snapshot_inner(&mut stack)
    }

    fn snapshot_inner(&self, stack: &mut Vec<*const ()>) -> WardResult<serde_json::Value> {
        let ptr = self.target().as_ptr();
        if stack.contains(&ptr) {
            return Ok(serde_json::Value::String("[Circular]".into()));
        }
        stack.push(ptr);

        let mut map = serde_json::Map::new();
        for key in self.keys() {
            let rendered = match self.get(key.as_str())? {
                None | Some(Field::Value(Value::Method(_))) => continue,
                Some(Field::Value(value)) => value.to_json(),
                Some(Field::View(child)) => child.snapshot_inner(stack)?,
            };
            map.insert(key.to_string(), rendered);
        }

        stack.pop();
        Ok(serde_json::Value::Object(map))
    }
}

impl PartialEq for View {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

// ---------------------------------------------------------------------------
// Introspection
// ---------------------------------------------------------------------------

/// `view` is a ward hiding every key of `with_hidden` and protecting every
/// key of `with_protected`. `None` places no constraint on that dimension.
pub fn is_warded(view: &View, with_hidden: Option<&[&str]>, with_protected: Option<&[&str]>) -> bool {
    let Some(config) = view.config() else {
        return false;
    };
    with_hidden.map_or(true, |keys| keys.iter().all(|k| config.is_hidden(k)))
        && with_protected.map_or(true, |keys| keys.iter().all(|k| config.is_protected(k)))
}

/// `view` leaves the given keys unhidden and unprotected.
///
/// A bare target is never warded. For a ward, each non-empty dimension is
/// checked against its own key list; passing `None` for a dimension that has
/// keys counts as warded.
pub fn is_not_warded(
    view: &View,
    with_unhidden: Option<&[&str]>,
    with_unprotected: Option<&[&str]>,
) -> bool {
    let Some(config) = view.config() else {
        return true;
    };

    let unhidden = config.hidden_keys().is_empty()
        || with_unhidden.is_some_and(|keys| !keys.iter().any(|k| config.is_hidden(k)));
    let unprotected = config.protected_keys().is_empty()
        || with_unprotected.is_some_and(|keys| !keys.iter().any(|k| config.is_protected(k)));

    unhidden && unprotected
}

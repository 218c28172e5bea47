//! Ward configuration: caller options, class defaults and their resolution
//! into one effective [`WardConfig`].

use crate::registry::ClassRegistry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use wardkit_core::{key_set, Access, KeySet, Obj, PropertyKey};

/// Nested options per child key.
pub type ChildWards = BTreeMap<PropertyKey, WardOptions>;

// ---------------------------------------------------------------------------
// Options (unresolved)
// ---------------------------------------------------------------------------

/// Caller-supplied ward options. Doubles as the shape of class defaults.
///
/// Each dimension is tri-state: `None` falls back to the class default,
/// `Some(empty)` explicitly clears it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WardOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden_keys: Option<KeySet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protected_keys: Option<KeySet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_wards: Option<ChildWards>,
}

impl WardOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// The positional `(hidden, protected, children)` form.
    pub fn positional(
        hidden_keys: Option<KeySet>,
        protected_keys: Option<KeySet>,
        child_wards: Option<ChildWards>,
    ) -> Self {
        Self {
            hidden_keys,
            protected_keys,
            child_wards,
        }
    }

    pub fn hidden<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<PropertyKey>,
    {
        self.hidden_keys
            .get_or_insert_with(KeySet::new)
            .extend(key_set(keys));
        self
    }

    pub fn protected<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<PropertyKey>,
    {
        self.protected_keys
            .get_or_insert_with(KeySet::new)
            .extend(key_set(keys));
        self
    }

    pub fn child(mut self, key: impl Into<PropertyKey>, options: WardOptions) -> Self {
        self.child_wards
            .get_or_insert_with(ChildWards::new)
            .insert(key.into(), options);
        self
    }

    /// No dimension supplied at all.
    pub fn is_unset(&self) -> bool {
        self.hidden_keys.is_none() && self.protected_keys.is_none() && self.child_wards.is_none()
    }
}

// ---------------------------------------------------------------------------
// Effective configuration
// ---------------------------------------------------------------------------

/// Resolved, immutable configuration of one ward.
///
/// `hidden_keys` and `protected_keys` never intersect.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WardConfig {
    hidden_keys: KeySet,
    protected_keys: KeySet,
    child_wards: ChildWards,
}

impl WardConfig {
    pub fn new(hidden_keys: KeySet, protected_keys: KeySet, child_wards: ChildWards) -> Self {
        let protected_keys = protected_keys
            .into_iter()
            .filter(|key| !hidden_keys.contains(key))
            .collect();
        Self {
            hidden_keys,
            protected_keys,
            child_wards,
        }
    }

    /// Nothing to enforce: the target is handed back unwrapped.
    pub fn is_empty(&self) -> bool {
        self.hidden_keys.is_empty() && self.protected_keys.is_empty() && self.child_wards.is_empty()
    }

    pub fn hidden_keys(&self) -> &KeySet {
        &self.hidden_keys
    }

    pub fn protected_keys(&self) -> &KeySet {
        &self.protected_keys
    }

    pub fn child_wards(&self) -> &ChildWards {
        &self.child_wards
    }

    pub fn is_hidden(&self, key: &str) -> bool {
        self.hidden_keys.contains(key)
    }

    pub fn is_protected(&self, key: &str) -> bool {
        self.protected_keys.contains(key)
    }

    pub fn child_options(&self, key: &str) -> Option<&WardOptions> {
        self.child_wards.get(key)
    }

    /// What the configuration allows for `key`, ignoring whether the target
    /// actually has it.
    pub fn access_of(&self, key: &str) -> Access {
        if self.is_hidden(key) {
            Access::NONE
        } else if self.is_protected(key) {
            Access::GET
        } else {
            Access::GET | Access::SET
        }
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Merges caller options with the target's class defaults.
///
/// Each dimension independently: caller value if supplied (even empty), else
/// the class default, else empty.
pub fn resolve(target: &Obj, options: &WardOptions, registry: &ClassRegistry) -> WardConfig {
    let defaults = registry.defaults_of(target).unwrap_or_default();

    let hidden_keys = options
        .hidden_keys
        .clone()
        .or(defaults.hidden_keys)
        .unwrap_or_default();
    let protected_keys = options
        .protected_keys
        .clone()
        .or(defaults.protected_keys)
        .unwrap_or_default();
    let child_wards = options
        .child_wards
        .clone()
        .or(defaults.child_wards)
        .unwrap_or_default();

    let config = WardConfig::new(hidden_keys, protected_keys, child_wards);

    tracing::debug!(
        class = ?target.class(),
        hidden = config.hidden_keys.len(),
        protected = config.protected_keys.len(),
        children = config.child_wards.len(),
        "resolved ward config"
    );

    config
}

//! Class default registry.
//!
//! Maps a [`ClassId`] to the default ward configuration every instance of
//! that class receives (`DEFAULT_HIDDEN_KEYS`, `DEFAULT_PROTECTED_KEYS`,
//! `DEFAULT_CHILD_WARDS`). Populated explicitly at startup; the resolver only
//! reads it.

use crate::config::WardOptions;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};
use wardkit_core::{ClassId, Obj, WardError, WardResult};

/// Shared handle to a class -> defaults table. Clones share the table.
#[derive(Debug, Clone, Default)]
pub struct ClassRegistry {
    entries: Arc<RwLock<HashMap<ClassId, WardOptions>>>,
}

static GLOBAL: LazyLock<ClassRegistry> = LazyLock::new(ClassRegistry::new);

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry used by [`crate::ward`].
    pub fn global() -> ClassRegistry {
        GLOBAL.clone()
    }

    /// Declares defaults for `class`, replacing earlier ones.
    ///
    /// At least one dimension must be supplied.
    pub fn register(
        &self,
        class: impl Into<ClassId>,
        defaults: WardOptions,
    ) -> WardResult<Option<WardOptions>> {
        let class = class.into();
        if defaults.is_unset() {
            return Err(WardError::InvalidConfigShape(format!(
                "class `{class}` declares no default hidden keys, protected keys or child wards"
            )));
        }

        tracing::debug!(%class, "registered class ward defaults");

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.insert(class, defaults))
    }

    pub fn unregister(&self, class: &ClassId) -> Option<WardOptions> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(class)
    }

    pub fn defaults_for(&self, class: &ClassId) -> Option<WardOptions> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(class)
            .cloned()
    }

    /// Defaults declared for the object's class, if it has one.
    pub fn defaults_of(&self, obj: &Obj) -> Option<WardOptions> {
        obj.class().and_then(|class| self.defaults_for(&class))
    }

    /// Whether the object's class declares a default ward configuration.
    pub fn has_config(&self, obj: &Obj) -> bool {
        self.defaults_of(obj).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Registers defaults in the global registry.
pub fn register_class_defaults(
    class: impl Into<ClassId>,
    defaults: WardOptions,
) -> WardResult<Option<WardOptions>> {
    GLOBAL.register(class, defaults)
}

/// Checks the global registry for the object's class.
pub fn has_ward_config(obj: &Obj) -> bool {
    GLOBAL.has_config(obj)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_instance_class() {
        let registry = ClassRegistry::new();
        registry
            .register("Bag", WardOptions::new().protected(["contents"]))
            .unwrap();

        let bag = Obj::with_class("Bag").prop("contents", "one");
        assert!(registry.has_config(&bag));
        assert_eq!(
            registry.defaults_of(&bag),
            Some(WardOptions::new().protected(["contents"]))
        );
        assert!(!registry.has_config(&Obj::new()));
        assert!(!registry.has_config(&Obj::with_class("Box")));
    }

    #[test]
    fn empty_defaults_are_rejected() {
        let registry = ClassRegistry::new();
        let err = registry.register("Bag", WardOptions::new()).unwrap_err();
        assert!(matches!(err, WardError::InvalidConfigShape(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn clones_share_entries() {
        let registry = ClassRegistry::new();
        let other = registry.clone();
        registry
            .register("Bag", WardOptions::new().hidden(["secret"]))
            .unwrap();
        assert_eq!(other.len(), 1);
        assert!(other.unregister(&ClassId::from("Bag")).is_some());
        assert!(registry.is_empty());
    }

    #[test]
    fn re_registering_returns_previous() {
        let registry = ClassRegistry::new();
        registry
            .register("Bag", WardOptions::new().hidden(["a"]))
            .unwrap();
        let previous = registry
            .register("Bag", WardOptions::new().hidden(["b"]))
            .unwrap();
        assert_eq!(previous, Some(WardOptions::new().hidden(["a"])));
    }
}

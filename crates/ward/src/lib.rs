//! Property warding: restricted views over dynamic objects.
//!
//! Pipeline: options -> [`config::resolve`] (merge with class defaults from the
//! [`ClassRegistry`]) -> [`ward::create`] -> get/set/call or the try-accessor.

pub mod args;
pub mod config;
pub mod registry;
pub mod tryer;
pub mod ward;

pub use args::{classify_try_args, classify_ward_args, TryCall};
pub use config::{resolve, ChildWards, WardConfig, WardOptions};
pub use registry::{has_ward_config, register_class_defaults, ClassRegistry};
pub use tryer::{SetEntry, TryOutcome, TryRequest, TryResult, TryResults, Tryer};
pub use ward::{create, is_not_warded, is_warded, Field, View, Ward};

use wardkit_core::{Obj, WardResult};

/// Wards `target` using the global class registry.
pub fn ward(target: &Obj, options: WardOptions) -> View {
    ward_with(target, &options, &ClassRegistry::global())
}

/// Wards `target` against an explicit registry.
pub fn ward_with(target: &Obj, options: &WardOptions, registry: &ClassRegistry) -> View {
    let config = resolve(target, options, registry);
    create(target.clone(), config, registry.clone())
}

/// Wards `target` from loosely-typed arguments; see [`classify_ward_args`].
pub fn ward_args(
    target: &Obj,
    args: &[serde_json::Value],
    registry: &ClassRegistry,
) -> WardResult<View> {
    let options = classify_ward_args(args)?;
    Ok(ward_with(target, &options, registry))
}

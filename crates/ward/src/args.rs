//! Classification of loosely-typed arguments.
//!
//! Hosts that receive ward and `try` calls as JSON (scripts, the CLI) go
//! through here to get typed [`WardOptions`] / [`TryCall`] values, or the
//! matching shape error.

use crate::config::WardOptions;
use crate::tryer::{SetEntry, TryRequest};
use serde_json::Value as Json;
use smallvec::SmallVec;
use wardkit_core::predicates::{
    has_own_property, is_array, is_non_string_iterable, is_null, is_plain_object, Kind, Shape,
};
use wardkit_core::{Access, KeySet, PropertyKey, Value, WardError, WardResult};

const OPTION_FIELDS: [&str; 3] = ["hiddenKeys", "protectedKeys", "childWards"];

// ---------------------------------------------------------------------------
// Ward construction arguments
// ---------------------------------------------------------------------------

/// Classifies the arguments following the target in a ward call.
///
/// - `[]` / `[null]`: class defaults only
/// - `[keys, keys?, children?]`: positional (hidden, protected, child wards);
///   `null` skips a position
/// - `[{ hiddenKeys?, protectedKeys?, childWards? }]`: options object
pub fn classify_ward_args(args: &[Json]) -> WardResult<WardOptions> {
    match args {
        [] => Ok(WardOptions::new()),
        [only] if is_null(only) => Ok(WardOptions::new()),
        [options] if is_plain_object(options) => parse_options(options),
        [first, ..] if is_array(first) || is_null(first) => parse_positional(args),
        [first, ..] => Err(WardError::InvalidConfigShape(format!(
            "expected key arrays or an options object, got {}",
            kind_name(first)
        ))),
    }
}

fn parse_positional(args: &[Json]) -> WardResult<WardOptions> {
    if args.len() > 3 {
        return Err(WardError::InvalidConfigShape(format!(
            "expected at most 3 positional arguments, got {}",
            args.len()
        )));
    }

    let hidden = args.first().map(|j| optional_keys(j, "hidden keys")).transpose()?;
    let protected = args.get(1).map(|j| optional_keys(j, "protected keys")).transpose()?;
    let children = match args.get(2) {
        None => None,
        Some(json) if is_null(json) => None,
        Some(json) if is_plain_object(json) => Some(
            serde_json::from_value(json.clone())
                .map_err(|e| WardError::InvalidConfigShape(format!("child wards: {e}")))?,
        ),
        Some(json) => {
            return Err(WardError::InvalidConfigShape(format!(
                "child wards must be an object, got {}",
                kind_name(json)
            )))
        }
    };

    Ok(WardOptions::positional(
        hidden.flatten(),
        protected.flatten(),
        children,
    ))
}

fn optional_keys(json: &Json, what: &str) -> WardResult<Option<KeySet>> {
    if is_null(json) {
        return Ok(None);
    }
    let items = json.as_array().ok_or_else(|| {
        WardError::InvalidConfigShape(format!("{what} must be an array, got {}", kind_name(json)))
    })?;
    items
        .iter()
        .map(|item| {
            item.as_str().map(PropertyKey::from).ok_or_else(|| {
                WardError::InvalidConfigShape(format!(
                    "{what} must be strings, got {}",
                    kind_name(item)
                ))
            })
        })
        .collect::<WardResult<KeySet>>()
        .map(Some)
}

fn parse_options(json: &Json) -> WardResult<WardOptions> {
    let named = OPTION_FIELDS
        .iter()
        .any(|field| has_own_property(json, field));
    let is_empty = json.as_object().is_some_and(|map| map.is_empty());

    if !named && !is_empty {
        return Err(WardError::InvalidConfigShape(format!(
            "options object names none of {}",
            OPTION_FIELDS.join(", ")
        )));
    }

    serde_json::from_value(json.clone())
        .map_err(|e| WardError::InvalidConfigShape(format!("options object: {e}")))
}

// ---------------------------------------------------------------------------
// try(...) arguments
// ---------------------------------------------------------------------------

/// A classified `try(...)` call.
#[derive(Debug, Clone, PartialEq)]
pub enum TryCall {
    Single {
        access: Access,
        key: PropertyKey,
        value: Option<Value>,
    },
    Batch(TryRequest),
}

/// Classifies `try(...)` arguments.
///
/// - `[level, key]` / `[level, key, value]` with `level` a non-zero access
///   level (`1` get, `2` set, `3` both)
/// - `[{ get?: [key..], set?: [key | {key: value}..] | {key: value} }]`
pub fn classify_try_args(args: &[Json]) -> WardResult<TryCall> {
    let Some(first) = args.first() else {
        return Err(WardError::InvalidTryOperation("missing operation".into()));
    };

    match first.kind() {
        Kind::Number => classify_single(first, &args[1..]),
        Kind::Object => {
            if args.len() > 1 {
                return Err(WardError::InvalidTryArguments(
                    "a batch request takes no further arguments".into(),
                ));
            }
            parse_batch(first).map(TryCall::Batch)
        }
        _ => Err(WardError::InvalidTryOperation(first.to_string())),
    }
}

fn classify_single(level: &Json, rest: &[Json]) -> WardResult<TryCall> {
    let access = level
        .as_u64()
        .and_then(|bits| u8::try_from(bits).ok())
        .and_then(Access::from_bits)
        .filter(|access| !access.is_none())
        .ok_or_else(|| WardError::InvalidTryOperation(level.to_string()))?;

    let (key, value) = match rest {
        [key] => (key, None),
        [key, value] => (key, Some(Value::from_json(value))),
        _ => {
            return Err(WardError::InvalidTryArguments(format!(
                "expected a key and an optional value, got {} arguments",
                rest.len()
            )))
        }
    };
    let key = key.as_str().map(PropertyKey::from).ok_or_else(|| {
        WardError::InvalidTryArguments(format!("key must be a string, got {}", kind_name(key)))
    })?;

    Ok(TryCall::Single { access, key, value })
}

fn parse_batch(json: &Json) -> WardResult<TryRequest> {
    let has_get = has_own_property(json, "get");
    let has_set = has_own_property(json, "set");
    if !has_get && !has_set {
        return Err(WardError::InvalidTryArguments(
            "batch request needs `get` or `set`".into(),
        ));
    }

    let mut request = TryRequest::new();

    if let Some(set) = json.get("set") {
        let entries: SmallVec<[SetEntry; 8]> = if is_non_string_iterable(set) {
            let mut entries = SmallVec::new();
            for item in set.as_array().into_iter().flatten() {
                match item {
                    Json::String(key) => entries.push(SetEntry::Check(key.as_str().into())),
                    Json::Object(_) => entries.extend(assignments(item)),
                    other => {
                        return Err(WardError::InvalidTryArguments(format!(
                            "`set` entries must be keys or key/value objects, got {}",
                            kind_name(other)
                        )))
                    }
                }
            }
            entries
        } else if is_plain_object(set) {
            assignments(set).collect()
        } else {
            return Err(WardError::InvalidTryArguments(format!(
                "`set` must be an array or an object, got {}",
                kind_name(set)
            )));
        };
        request.set.extend(entries);
    }

    if let Some(get) = json.get("get") {
        let keys = get.as_array().ok_or_else(|| {
            WardError::InvalidTryArguments(format!(
                "`get` must be an array of keys, got {}",
                kind_name(get)
            ))
        })?;
        for key in keys {
            let key = key.as_str().ok_or_else(|| {
                WardError::InvalidTryArguments(format!(
                    "`get` keys must be strings, got {}",
                    kind_name(key)
                ))
            })?;
            request.get.push(key.into());
        }
    }

    Ok(request)
}

fn assignments(json: &Json) -> impl Iterator<Item = SetEntry> + '_ {
    json.as_object()
        .into_iter()
        .flatten()
        .map(|(key, value)| SetEntry::Assign(key.as_str().into(), Value::from_json(value)))
}

fn kind_name(json: &Json) -> &'static str {
    match json.kind() {
        Kind::Null => "null",
        Kind::Bool => "a boolean",
        Kind::Number => "a number",
        Kind::String => "a string",
        Kind::Array => "an array",
        Kind::Object => "an object",
        Kind::Method => "a method",
    }
}

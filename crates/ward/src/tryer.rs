//! Speculative, non-throwing access through a view.
//!
//! Every attempt produces a [`TryResult`] instead of failing: disallowed
//! access reports `success: false`, and so does a child-ward key holding a
//! non-object. Only malformed usage (bad operation, bad batch shape) is an
//! error.

use crate::args::{classify_try_args, TryCall};
use crate::ward::{Field, View};
use serde::Serialize;
use std::collections::BTreeMap;
use std::ops::Index;
use wardkit_core::{Access, PropertyKey, Value, WardError, WardResult};

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Outcome of one attempt.
///
/// A single operation sets exactly one of `can_get` / `can_set` / `was_set`;
/// merged batch results may carry several.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TryResult {
    pub value: Option<Field>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub can_get: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub can_set: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub was_set: Option<bool>,
}

#[derive(Debug, Clone, Copy)]
enum Tag {
    CanGet,
    CanSet,
    WasSet,
}

impl TryResult {
    fn tagged(tag: Tag, success: bool, value: Option<Field>) -> Self {
        let mut result = TryResult {
            value: if success { value } else { None },
            success,
            ..Default::default()
        };
        let slot = match tag {
            Tag::CanGet => &mut result.can_get,
            Tag::CanSet => &mut result.can_set,
            Tag::WasSet => &mut result.was_set,
        };
        *slot = Some(success);
        result
    }

    fn denied(tag: Tag) -> Self {
        Self::tagged(tag, false, None)
    }

    /// The `(value, success)` pair view.
    pub fn as_pair(&self) -> (Option<&Field>, bool) {
        (self.value.as_ref(), self.success)
    }

    pub fn into_pair(self) -> (Option<Field>, bool) {
        (self.value, self.success)
    }

    /// Combines two results for the same key. `self` is the earlier one.
    ///
    /// The earlier value wins when present; `success` and every tag both
    /// sides declare are AND-ed; a tag only one side declares is inherited.
    pub fn merge(self, later: TryResult) -> TryResult {
        fn tag(a: Option<bool>, b: Option<bool>) -> Option<bool> {
            match (a, b) {
                (Some(a), Some(b)) => Some(a && b),
                (a, b) => a.or(b),
            }
        }

        TryResult {
            value: self.value.or(later.value),
            success: self.success && later.success,
            can_get: tag(self.can_get, later.can_get),
            can_set: tag(self.can_set, later.can_set),
            was_set: tag(self.was_set, later.was_set),
        }
    }
}

impl PartialEq<(&str, bool)> for TryResult {
    fn eq(&self, (value, success): &(&str, bool)) -> bool {
        self.success == *success && self.value.as_ref().and_then(Field::as_str) == Some(*value)
    }
}

/// Per-key results of a batch attempt.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TryResults(BTreeMap<PropertyKey, TryResult>);

impl TryResults {
    fn record(&mut self, key: &PropertyKey, result: TryResult) {
        let merged = match self.0.remove(key.as_str()) {
            Some(earlier) => earlier.merge(result),
            None => result,
        };
        self.0.insert(key.clone(), merged);
    }

    pub fn get(&self, key: &str) -> Option<&TryResult> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PropertyKey, &TryResult)> {
        self.0.iter()
    }

    /// All attempts succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.0.values().all(|r| r.success)
    }
}

impl Index<&str> for TryResults {
    type Output = TryResult;

    fn index(&self, key: &str) -> &TryResult {
        &self.0[key]
    }
}

impl IntoIterator for TryResults {
    type Item = (PropertyKey, TryResult);
    type IntoIter = std::collections::btree_map::IntoIter<PropertyKey, TryResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Result of a loosely-typed `try(...)` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TryOutcome {
    Single(TryResult),
    Batch(TryResults),
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// One `set` entry of a batch: check only, or attempt an assignment.
#[derive(Debug, Clone, PartialEq)]
pub enum SetEntry {
    Check(PropertyKey),
    Assign(PropertyKey, Value),
}

impl SetEntry {
    pub fn key(&self) -> &PropertyKey {
        match self {
            SetEntry::Check(key) | SetEntry::Assign(key, _) => key,
        }
    }
}

/// A normalized batch request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TryRequest {
    pub get: Vec<PropertyKey>,
    pub set: Vec<SetEntry>,
}

impl TryRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<PropertyKey>,
    {
        self.get.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Adds check-only `set` entries.
    pub fn check<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<PropertyKey>,
    {
        self.set
            .extend(keys.into_iter().map(|k| SetEntry::Check(k.into())));
        self
    }

    pub fn assign(mut self, key: impl Into<PropertyKey>, value: impl Into<Value>) -> Self {
        self.set.push(SetEntry::Assign(key.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.get.is_empty() && self.set.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Accessor
// ---------------------------------------------------------------------------

/// The try-accessor of a view.
#[derive(Debug, Clone, Copy)]
pub struct Tryer<'a> {
    view: &'a View,
}

impl<'a> Tryer<'a> {
    pub fn new(view: &'a View) -> Self {
        Self { view }
    }

    /// Keys the target does not own are treated exactly like hidden keys.
    fn allows(&self, key: &str, access: Access) -> bool {
        self.view.target().has_own(key) && self.view.access_of(key).contains(access)
    }

    /// Reads `key` for a result. A child-ward key holding a non-object reads
    /// as unavailable instead of failing.
    fn read(&self, key: &str) -> WardResult<Option<Option<Field>>> {
        match self.view.get(key) {
            Ok(field) => Ok(Some(field)),
            Err(WardError::ChildNotWardable { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Convenience read: own, visible properties only.
    pub fn peek(&self, key: &str) -> WardResult<Option<Field>> {
        if !self.allows(key, Access::GET) {
            return Ok(None);
        }
        self.view.get(key)
    }

    /// `try(Get, key)`.
    pub fn get(&self, key: &str) -> WardResult<TryResult> {
        if !self.allows(key, Access::GET) {
            return Ok(TryResult::denied(Tag::CanGet));
        }
        Ok(match self.read(key)? {
            Some(value) => TryResult::tagged(Tag::CanGet, true, value),
            None => TryResult::denied(Tag::CanGet),
        })
    }

    /// `try(Set, key)`: would a write succeed? Never mutates.
    pub fn can_set(&self, key: &str) -> WardResult<TryResult> {
        if !self.allows(key, Access::SET) {
            return Ok(TryResult::denied(Tag::CanSet));
        }
        Ok(match self.read(key)? {
            Some(value) => TryResult::tagged(Tag::CanSet, true, value),
            None => TryResult::denied(Tag::CanSet),
        })
    }

    /// `try(Set, key, value)`: writes only if allowed.
    pub fn set(&self, key: &str, value: Value) -> WardResult<TryResult> {
        if !self.allows(key, Access::SET) || !self.view.accepts(key, &value) {
            return Ok(TryResult::denied(Tag::WasSet));
        }
        self.view.set(key, value)?;
        let stored = self.read(key)?.flatten();
        Ok(TryResult::tagged(Tag::WasSet, true, stored))
    }

    /// Dispatches on the access level: `SET` wins over `GET`.
    pub fn op(&self, access: Access, key: &str, value: Option<Value>) -> WardResult<TryResult> {
        if access.contains(Access::SET) {
            return match value {
                Some(value) => self.set(key, value),
                None => self.can_set(key),
            };
        }
        if access.contains(Access::GET) {
            return self.get(key);
        }
        Err(WardError::InvalidTryOperation(format!(
            "access level `{access}` permits nothing"
        )))
    }

    /// Evaluates every `set` entry, then every `get` key, merging repeats.
    pub fn batch(&self, request: &TryRequest) -> WardResult<TryResults> {
        let mut results = TryResults::default();

        for entry in &request.set {
            let result = match entry {
                SetEntry::Check(key) => self.can_set(key.as_str())?,
                SetEntry::Assign(key, value) => self.set(key.as_str(), value.clone())?,
            };
            results.record(entry.key(), result);
        }

        for key in &request.get {
            results.record(key, self.get(key.as_str())?);
        }

        tracing::trace!(
            keys = results.len(),
            succeeded = results.all_succeeded(),
            "evaluated try batch"
        );

        Ok(results)
    }

    /// Loosely-typed entry point; see [`classify_try_args`].
    pub fn dynamic(&self, args: &[serde_json::Value]) -> WardResult<TryOutcome> {
        match classify_try_args(args)? {
            TryCall::Single { access, key, value } => {
                self.op(access, key.as_str(), value).map(TryOutcome::Single)
            }
            TryCall::Batch(request) => self.batch(&request).map(TryOutcome::Batch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve, WardOptions};
    use crate::registry::ClassRegistry;
    use crate::ward::create;
    use wardkit_core::Obj;

    fn protected_bag() -> (Obj, View) {
        let bag = Obj::new().prop("contents", "one").prop("label", "tag");
        let registry = ClassRegistry::new();
        let options = WardOptions::new().protected(["contents"]).hidden(["secret"]);
        let view = create(bag.clone(), resolve(&bag, &options, &registry), registry);
        (bag, view)
    }

    #[test]
    fn get_on_protected_key_succeeds() {
        let (_, view) = protected_bag();
        let result = view.try_get("contents").unwrap();
        assert_eq!(result.can_get, Some(true));
        assert_eq!(result.can_set, None);
        assert_eq!(result.was_set, None);
        assert_eq!(result, ("one", true));
    }

    #[test]
    fn set_check_on_protected_key_fails_without_value() {
        let (_, view) = protected_bag();
        let result = view.try_can_set("contents").unwrap();
        assert_eq!(result.can_set, Some(false));
        assert_eq!(result.as_pair(), (None, false));
        assert_eq!(result.can_get, None);
    }

    #[test]
    fn set_attempt_mutates_only_when_allowed() {
        let (bag, view) = protected_bag();

        let rejected = view.try_set("contents", "two").unwrap();
        assert_eq!(rejected.was_set, Some(false));
        assert_eq!(rejected.can_set, None);
        assert_eq!(bag.get("contents"), Some(Value::from("one")));

        let accepted = view.try_set("label", "new").unwrap();
        assert_eq!(accepted.was_set, Some(true));
        assert_eq!(accepted, ("new", true));
        assert_eq!(bag.get("label"), Some(Value::from("new")));
    }

    #[test]
    fn can_set_reports_current_value() {
        let (bag, view) = protected_bag();
        let result = view.try_can_set("label").unwrap();
        assert_eq!(result, ("tag", true));
        assert_eq!(bag.get("label"), Some(Value::from("tag")));
    }

    #[test]
    fn missing_keys_behave_like_hidden() {
        let (_, view) = protected_bag();
        for result in [
            view.try_get("nope").unwrap(),
            view.try_can_set("nope").unwrap(),
            view.try_set("nope", 1).unwrap(),
        ] {
            assert!(!result.success);
            assert!(result.value.is_none());
        }
        assert_eq!(view.try_get("nope").unwrap().can_get, Some(false));
    }

    #[test]
    fn bare_target_still_requires_own_properties() {
        let bag = Obj::new().prop("contents", "one");
        let view = View::Target(bag.clone());
        assert!(view.try_set("contents", "two").unwrap().success);
        assert!(!view.try_set("other", "x").unwrap().success);
        assert!(!bag.has_own("other"));
    }

    #[test]
    fn op_dispatches_on_access_bits() {
        let (_, view) = protected_bag();
        assert_eq!(
            view.try_op(Access::GET, "contents", None).unwrap().can_get,
            Some(true)
        );
        assert_eq!(
            view.try_op(Access::GET | Access::SET, "contents", None)
                .unwrap()
                .can_set,
            Some(false)
        );
        assert!(matches!(
            view.try_op(Access::NONE, "contents", None),
            Err(WardError::InvalidTryOperation(_))
        ));
    }

    #[test]
    fn batch_merges_get_and_set_for_same_key() {
        let (_, view) = protected_bag();
        let results = view
            .try_batch(&TryRequest::new().get(["contents"]).check(["contents"]))
            .unwrap();

        let merged = &results["contents"];
        assert!(!merged.success);
        assert_eq!(merged.can_get, Some(true));
        assert_eq!(merged.can_set, Some(false));
        assert_eq!(merged.was_set, None);
        assert_eq!(merged.value.as_ref().and_then(Field::as_str), Some("one"));
    }

    #[test]
    fn batch_assignments_apply_before_reads() {
        let (bag, view) = protected_bag();
        let results = view
            .try_batch(
                &TryRequest::new()
                    .get(["label", "secret"])
                    .assign("label", "fresh")
                    .assign("contents", "nope"),
            )
            .unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results["label"], ("fresh", true));
        assert_eq!(results["label"].was_set, Some(true));
        assert_eq!(results["label"].can_get, Some(true));
        assert_eq!(results["contents"].was_set, Some(false));
        assert_eq!(results["secret"].can_get, Some(false));
        assert!(!results.all_succeeded());
        assert_eq!(bag.get("label"), Some(Value::from("fresh")));
    }

    #[test]
    fn merge_prefers_earlier_value() {
        let earlier = TryResult::tagged(Tag::CanSet, true, Some(Field::Value("a".into())));
        let later = TryResult::tagged(Tag::CanGet, true, Some(Field::Value("b".into())));
        let merged = earlier.merge(later);
        assert_eq!(merged, ("a", true));
        assert_eq!(merged.can_set, Some(true));
        assert_eq!(merged.can_get, Some(true));

        let denied = TryResult::denied(Tag::CanGet);
        let granted = TryResult::tagged(Tag::CanGet, true, Some(Field::Value("c".into())));
        let merged = denied.merge(granted);
        assert_eq!(merged.can_get, Some(false));
        assert!(!merged.success);
        assert_eq!(merged.value.as_ref().and_then(Field::as_str), Some("c"));
    }

    #[test]
    fn peek_respects_hidden_and_missing() {
        let bag = Obj::new().prop("contents", "one").prop("secret", "s");
        let registry = ClassRegistry::new();
        let options = WardOptions::new().hidden(["secret"]);
        let view = create(bag.clone(), resolve(&bag, &options, &registry), registry);
        let tryer = view.tryer();
        assert_eq!(tryer.peek("contents").unwrap().unwrap(), "one");
        assert_eq!(tryer.peek("secret").unwrap(), None);
        assert_eq!(tryer.peek("missing").unwrap(), None);
    }

    fn parent_with_child_bag(bag: Value) -> (Obj, View) {
        let parent = Obj::new().prop("bag", bag).prop("label", "shelf");
        let registry = ClassRegistry::new();
        let options = WardOptions::new().child("bag", WardOptions::new().protected(["contents"]));
        let view = create(parent.clone(), resolve(&parent, &options, &registry), registry);
        (parent, view)
    }

    #[test]
    fn non_object_on_child_key_is_refused_before_writing() {
        let bag = Obj::new().prop("contents", "one");
        let (parent, view) = parent_with_child_bag(bag.clone().into());

        let result = view.try_set("bag", "oops").unwrap();
        assert!(!result.success);
        assert_eq!(result.was_set, Some(false));
        assert!(result.value.is_none());
        assert!(parent.get("bag").unwrap().as_object().unwrap().ptr_eq(&bag));

        let replacement = Obj::new().prop("contents", "two");
        let result = view.try_set("bag", replacement.clone()).unwrap();
        assert_eq!(result.was_set, Some(true));
        assert!(result.value.unwrap().as_view().unwrap().is_view_of(&replacement));
    }

    #[test]
    fn batch_keeps_applied_writes_when_a_child_key_is_unreadable() {
        let (parent, view) = parent_with_child_bag("not an object".into());

        let request = TryRequest::new().assign("label", "mutated").get(["bag"]);
        let results = view.try_batch(&request).unwrap();

        assert_eq!(results["label"], ("mutated", true));
        assert!(!results["bag"].success);
        assert_eq!(results["bag"].can_get, Some(false));
        assert_eq!(parent.get("label"), Some(Value::from("mutated")));

        // A plain read still reports the shape error.
        assert!(view.get("bag").is_err());
    }

    #[test]
    fn results_serialize_without_absent_tags() {
        let (_, view) = protected_bag();
        let json = serde_json::to_value(view.try_get("contents").unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "value": "one", "success": true, "canGet": true })
        );
    }
}

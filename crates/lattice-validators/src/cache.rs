//! Memoised model schemas
//!
//! The cache maps `(uid, mode)` to a [`SharedSchema`]. The first lookup of a
//! key installs an empty placeholder which the caller fills once the model
//! is mapped; lookups made while the placeholder is still empty (a model
//! reaching itself through relations or components) reuse it, so recursive
//! schemas terminate.

use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::debug;

use crate::rule::{Mode, SharedSchema};

pub type CacheKey = (String, Mode);

#[derive(Debug, Default)]
pub struct SchemaCache {
	entries: Mutex<HashMap<CacheKey, SharedSchema>>,
}

impl SchemaCache {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn get(&self, uid: &str, mode: Mode) -> Option<SharedSchema> {
		self.entries.lock().get(&(uid.to_string(), mode)).cloned()
	}

	/// Existing entry, or a freshly installed placeholder.
	///
	/// The flag is `true` when the placeholder was installed by this call and
	/// the caller is responsible for filling it.
	pub fn lookup_or_install(&self, uid: &str, mode: Mode) -> (SharedSchema, bool) {
		let mut entries = self.entries.lock();
		let key = (uid.to_string(), mode);
		if let Some(existing) = entries.get(&key) {
			return (existing.clone(), false);
		}
		let placeholder = SharedSchema::placeholder(uid);
		entries.insert(key, placeholder.clone());
		(placeholder, true)
	}

	/// Drop entries installed by a failed build pass
	pub fn discard(&self, keys: &[CacheKey]) {
		let mut entries = self.entries.lock();
		for key in keys {
			if let Some(schema) = entries.remove(key) {
				schema.clear();
			}
		}
	}

	/// Forget every memoised schema, typically after the registry was reloaded
	///
	/// Slots are emptied as they are dropped: schemas that reach each other
	/// hold handles on one another's slots and would otherwise never be freed.
	/// Schemas obtained before the call report their shared parts as
	/// unresolved afterwards.
	pub fn invalidate(&self) {
		let mut entries = self.entries.lock();
		debug!(entries = entries.len(), "validator schema cache invalidated");
		for (_, schema) in entries.drain() {
			schema.clear();
		}
	}

	pub fn len(&self) -> usize {
		self.entries.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.lock().is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::rule::{FieldRule, ObjectRule, Rule, UnknownKeys};
	use rstest::rstest;

	#[rstest]
	fn test_second_lookup_reuses_placeholder() {
		let cache = SchemaCache::new();
		let (first, fresh) = cache.lookup_or_install("default.a", Mode::Read);
		assert!(fresh);
		let (second, fresh) = cache.lookup_or_install("default.a", Mode::Read);
		assert!(!fresh);
		assert!(first.same_as(&second));

		first.fill(ObjectRule::new(UnknownKeys::Strip));
		assert!(second.is_filled());
	}

	#[rstest]
	fn test_modes_are_cached_separately() {
		let cache = SchemaCache::new();
		cache.lookup_or_install("default.a", Mode::Read);
		let (_, fresh) = cache.lookup_or_install("default.a", Mode::Input);
		assert!(fresh);
		assert_eq!(cache.len(), 2);
	}

	#[rstest]
	fn test_invalidate_and_discard() {
		let cache = SchemaCache::new();
		cache.lookup_or_install("default.a", Mode::Read);
		cache.lookup_or_install("default.b", Mode::Read);

		cache.discard(&[("default.a".to_string(), Mode::Read)]);
		assert!(cache.get("default.a", Mode::Read).is_none());
		assert_eq!(cache.len(), 1);

		cache.invalidate();
		assert!(cache.is_empty());
	}

	#[rstest]
	fn test_invalidate_releases_mutually_recursive_schemas() {
		let cache = SchemaCache::new();
		let (a, _) = cache.lookup_or_install("default.a", Mode::Read);
		let (b, _) = cache.lookup_or_install("default.b", Mode::Read);
		a.fill(ObjectRule::new(UnknownKeys::Strip).field("b", FieldRule::optional(Rule::Shared(b.clone()))));
		b.fill(ObjectRule::new(UnknownKeys::Strip).field("a", FieldRule::optional(Rule::Shared(a.clone()))));
		// local handle, cache entry, link from the other schema
		assert_eq!(a.handle_count(), 3);

		cache.invalidate();
		assert!(!a.is_filled());
		assert!(!b.is_filled());
		assert_eq!(a.handle_count(), 1);
		assert_eq!(b.handle_count(), 1);
	}

	#[rstest]
	fn test_discard_empties_the_dropped_slot() {
		let cache = SchemaCache::new();
		let (a, _) = cache.lookup_or_install("default.a", Mode::Read);
		a.fill(ObjectRule::new(UnknownKeys::Strip).field("a", FieldRule::optional(Rule::Shared(a.clone()))));
		assert_eq!(a.handle_count(), 3);

		cache.discard(&[("default.a".to_string(), Mode::Read)]);
		assert_eq!(a.handle_count(), 1);
	}
}

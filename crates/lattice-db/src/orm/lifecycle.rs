//! Typed lifecycle hooks
//!
//! Implement [`Lifecycle`] and register it for a model UID in a
//! [`LifecycleRegistry`]. The relation mutator calls every registered hook
//! in registration order; the first `Abort` stops the operation.
//!
//! ## Example
//!
//! ```
//! use async_trait::async_trait;
//! use lattice_db::orm::lifecycle::{Lifecycle, LifecycleRegistry, LifecycleResult};
//! use lattice_db::orm::record::Record;
//! use std::sync::Arc;
//!
//! struct RequireTitle;
//!
//! #[async_trait]
//! impl Lifecycle for RequireTitle {
//!     async fn before_create(&self, _model: &str, data: &mut Record) -> LifecycleResult {
//!         if data.contains_key("title") {
//!             LifecycleResult::Continue
//!         } else {
//!             LifecycleResult::abort("title is required")
//!         }
//!     }
//! }
//!
//! let registry = LifecycleRegistry::new();
//! registry.register("api::article.article", Arc::new(RequireTitle));
//! assert_eq!(registry.hooks_for("api::article.article").len(), 1);
//! ```

use async_trait::async_trait;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use super::record::Record;

/// Outcome of a hook
#[derive(Debug)]
pub enum LifecycleResult {
	Continue,
	Abort(anyhow::Error),
}

impl LifecycleResult {
	pub fn abort(reason: impl fmt::Display) -> Self {
		LifecycleResult::Abort(anyhow::anyhow!(reason.to_string()))
	}
}

/// Points at which hooks run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPoint {
	BeforeCreate,
	AfterCreate,
	BeforeUpdate,
	AfterUpdate,
	BeforeDelete,
	AfterDelete,
	AfterFetch,
}

impl HookPoint {
	pub fn as_str(&self) -> &'static str {
		match self {
			HookPoint::BeforeCreate => "beforeCreate",
			HookPoint::AfterCreate => "afterCreate",
			HookPoint::BeforeUpdate => "beforeUpdate",
			HookPoint::AfterUpdate => "afterUpdate",
			HookPoint::BeforeDelete => "beforeDelete",
			HookPoint::AfterDelete => "afterDelete",
			HookPoint::AfterFetch => "afterFetch",
		}
	}
}

impl fmt::Display for HookPoint {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Model lifecycle hooks; every method defaults to `Continue`
///
/// `before_*` hooks may rewrite the incoming data. An abort from an
/// `after_*` hook is reported to the caller, but the write it follows has
/// already happened.
#[async_trait]
pub trait Lifecycle: Send + Sync {
	async fn before_create(&self, _model: &str, _data: &mut Record) -> LifecycleResult {
		LifecycleResult::Continue
	}

	async fn after_create(&self, _model: &str, _record: &Record) -> LifecycleResult {
		LifecycleResult::Continue
	}

	async fn before_update(&self, _model: &str, _id: &str, _data: &mut Record) -> LifecycleResult {
		LifecycleResult::Continue
	}

	async fn after_update(&self, _model: &str, _record: &Record) -> LifecycleResult {
		LifecycleResult::Continue
	}

	async fn before_delete(&self, _model: &str, _id: &str) -> LifecycleResult {
		LifecycleResult::Continue
	}

	async fn after_delete(&self, _model: &str, _id: &str) -> LifecycleResult {
		LifecycleResult::Continue
	}

	async fn after_fetch(&self, _model: &str, _record: &mut Record) -> LifecycleResult {
		LifecycleResult::Continue
	}
}

/// A hook stopped the operation
#[derive(Debug)]
pub struct HookAbort {
	pub hook: HookPoint,
	pub reason: anyhow::Error,
}

type HookOutcome = std::result::Result<(), HookAbort>;

fn check(hook: HookPoint, result: LifecycleResult) -> HookOutcome {
	match result {
		LifecycleResult::Continue => Ok(()),
		LifecycleResult::Abort(reason) => Err(HookAbort { hook, reason }),
	}
}

/// Hooks per model UID
#[derive(Default)]
pub struct LifecycleRegistry {
	hooks: DashMap<String, Vec<Arc<dyn Lifecycle>>>,
}

impl LifecycleRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn register(&self, model: impl Into<String>, hook: Arc<dyn Lifecycle>) {
		let model = model.into();
		debug!(model = %model, "lifecycle hook registered");
		self.hooks.entry(model).or_default().push(hook);
	}

	/// Hooks for `model`, copied out so no map guard is held across awaits
	pub fn hooks_for(&self, model: &str) -> Vec<Arc<dyn Lifecycle>> {
		self.hooks
			.get(model)
			.map(|hooks| hooks.clone())
			.unwrap_or_default()
	}

	pub fn clear(&self, model: &str) {
		self.hooks.remove(model);
	}

	pub async fn before_create(&self, model: &str, data: &mut Record) -> HookOutcome {
		for hook in self.hooks_for(model) {
			check(HookPoint::BeforeCreate, hook.before_create(model, data).await)?;
		}
		Ok(())
	}

	pub async fn after_create(&self, model: &str, record: &Record) -> HookOutcome {
		for hook in self.hooks_for(model) {
			check(HookPoint::AfterCreate, hook.after_create(model, record).await)?;
		}
		Ok(())
	}

	pub async fn before_update(&self, model: &str, id: &str, data: &mut Record) -> HookOutcome {
		for hook in self.hooks_for(model) {
			check(HookPoint::BeforeUpdate, hook.before_update(model, id, data).await)?;
		}
		Ok(())
	}

	pub async fn after_update(&self, model: &str, record: &Record) -> HookOutcome {
		for hook in self.hooks_for(model) {
			check(HookPoint::AfterUpdate, hook.after_update(model, record).await)?;
		}
		Ok(())
	}

	pub async fn before_delete(&self, model: &str, id: &str) -> HookOutcome {
		for hook in self.hooks_for(model) {
			check(HookPoint::BeforeDelete, hook.before_delete(model, id).await)?;
		}
		Ok(())
	}

	pub async fn after_delete(&self, model: &str, id: &str) -> HookOutcome {
		for hook in self.hooks_for(model) {
			check(HookPoint::AfterDelete, hook.after_delete(model, id).await)?;
		}
		Ok(())
	}

	pub async fn after_fetch(&self, model: &str, record: &mut Record) -> HookOutcome {
		for hook in self.hooks_for(model) {
			check(HookPoint::AfterFetch, hook.after_fetch(model, record).await)?;
		}
		Ok(())
	}
}

impl fmt::Debug for LifecycleRegistry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("LifecycleRegistry")
			.field("models", &self.hooks.len())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use parking_lot::Mutex;
	use rstest::rstest;
	use serde_json::json;

	struct Stamp(&'static str, Arc<Mutex<Vec<&'static str>>>);

	#[async_trait]
	impl Lifecycle for Stamp {
		async fn before_create(&self, _model: &str, data: &mut Record) -> LifecycleResult {
			self.1.lock().push(self.0);
			data.insert("stamped".into(), json!(self.0));
			LifecycleResult::Continue
		}
	}

	struct Veto;

	#[async_trait]
	impl Lifecycle for Veto {
		async fn before_delete(&self, _model: &str, id: &str) -> LifecycleResult {
			LifecycleResult::abort(format!("{} is locked", id))
		}
	}

	#[rstest]
	#[tokio::test]
	async fn test_hooks_run_in_registration_order() {
		let calls = Arc::new(Mutex::new(Vec::new()));
		let registry = LifecycleRegistry::new();
		registry.register("api::tag.tag", Arc::new(Stamp("first", calls.clone())));
		registry.register("api::tag.tag", Arc::new(Stamp("second", calls.clone())));

		let mut data = Record::new();
		registry.before_create("api::tag.tag", &mut data).await.unwrap();

		assert_eq!(*calls.lock(), vec!["first", "second"]);
		assert_eq!(data["stamped"], json!("second"));
		// hooks of other models are not involved
		registry.before_create("api::post.post", &mut data).await.unwrap();
		assert_eq!(calls.lock().len(), 2);
	}

	#[rstest]
	#[tokio::test]
	async fn test_abort_names_the_hook() {
		let registry = LifecycleRegistry::new();
		registry.register("api::tag.tag", Arc::new(Veto));

		let abort = registry.before_delete("api::tag.tag", "7").await.unwrap_err();
		assert_eq!(abort.hook, HookPoint::BeforeDelete);
		assert_eq!(abort.reason.to_string(), "7 is locked");
		assert!(registry.after_delete("api::tag.tag", "7").await.is_ok());

		registry.clear("api::tag.tag");
		assert!(registry.before_delete("api::tag.tag", "7").await.is_ok());
	}
}

//! Fallback parameter suppliers.
//!
//! The last link of the resolution chain. A session registers suppliers for
//! the framework's own objects (the session, its undo coordinator, the scope
//! manager) that never live in the delegate container. Event dispatch pushes
//! the current event as a transient supplier for the duration of the call.

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use folio_primitives::{TypeKey, Value};
use parking_lot::RwLock;

use crate::param::ParamDesc;
use crate::resolver::Resolution;

/// A supplier function, asked in registration order.
pub type SupplierFn = Arc<dyn Fn(&ParamDesc) -> Resolution + Send + Sync>;

/// Registration key. Registering again under the same key replaces the
/// supplier in place, which keeps repeated built-in registration idempotent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SupplierKey {
	/// Supplier bound to parameters of exactly this type.
	Exact(TypeKey),
	/// Free-form supplier identified by name.
	Named(&'static str),
}

struct Transient {
	id: u64,
	ty: TypeKey,
	value: Value,
}

/// Ordered set of fallback suppliers plus a stack of transient values.
#[derive(Default)]
pub struct SupplierRegistry {
	entries: RwLock<Vec<(SupplierKey, SupplierFn)>>,
	transient: RwLock<Vec<Transient>>,
	next_transient: AtomicU64,
}

impl SupplierRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers `supplier` under `key`. Returns `true` if an existing
	/// supplier was replaced; its position is kept.
	pub fn register(&self, key: SupplierKey, supplier: SupplierFn) -> bool {
		let mut entries = self.entries.write();
		if let Some(slot) = entries.iter_mut().find(|(k, _)| *k == key) {
			slot.1 = supplier;
			return true;
		}
		entries.push((key, supplier));
		false
	}

	/// Registers a supplier for parameters declared exactly as `T`.
	///
	/// `get` returning `None` leaves the parameter unresolved.
	pub fn register_exact<T, F>(&self, get: F) -> bool
	where
		T: Any + Send + Sync,
		F: Fn() -> Option<Arc<T>> + Send + Sync + 'static,
	{
		let ty = TypeKey::of::<T>();
		self.register(
			SupplierKey::Exact(ty),
			Arc::new(move |param: &ParamDesc| {
				if param.ty() != ty || param.is_variadic() {
					return Resolution::Unresolved;
				}
				match get() {
					Some(bean) => Resolution::Resolved(Some(bean)),
					None => Resolution::Unresolved,
				}
			}),
		)
	}

	pub fn unregister(&self, key: &SupplierKey) -> bool {
		let mut entries = self.entries.write();
		let before = entries.len();
		entries.retain(|(k, _)| k != key);
		entries.len() != before
	}

	pub fn len(&self) -> usize {
		self.entries.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.read().is_empty()
	}

	/// Exposes `bean` to parameters of type `T` until the guard drops.
	pub fn push_transient<T: Any + Send + Sync>(&self, bean: Arc<T>) -> TransientGuard<'_> {
		self.push_transient_value(TypeKey::of::<T>(), bean)
	}

	/// Untyped variant of [`push_transient`](Self::push_transient); `ty` must
	/// be the concrete type of `value`.
	pub fn push_transient_value(&self, ty: TypeKey, value: Value) -> TransientGuard<'_> {
		let id = self.next_transient.fetch_add(1, Ordering::Relaxed);
		self.transient.write().push(Transient { id, ty, value });
		TransientGuard { registry: self, id }
	}

	/// Asks registered suppliers in order, then transient values from the
	/// most recently pushed. The first resolved answer wins.
	pub fn resolve(&self, param: &ParamDesc) -> Resolution {
		// Snapshot so suppliers may touch the registry themselves.
		let entries: Vec<SupplierFn> = self.entries.read().iter().map(|(_, f)| f.clone()).collect();
		for supplier in entries {
			let resolution = supplier(param);
			if resolution.is_resolved() {
				return resolution;
			}
		}

		if param.is_variadic() {
			return Resolution::Unresolved;
		}
		self.transient
			.read()
			.iter()
			.rev()
			.find(|t| t.ty == param.ty())
			.map_or(Resolution::Unresolved, |t| Resolution::Resolved(Some(t.value.clone())))
	}
}

/// Removes a transient value when dropped.
pub struct TransientGuard<'a> {
	registry: &'a SupplierRegistry,
	id: u64,
}

impl Drop for TransientGuard<'_> {
	fn drop(&mut self) {
		self.registry.transient.write().retain(|t| t.id != self.id);
	}
}

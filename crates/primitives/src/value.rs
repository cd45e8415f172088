use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A type-erased, shareable value.
///
/// Beans, resolved arguments and invocation results all travel as `Value`.
/// A bean of type `T` is stored as an `Arc<T>` coerced to `Value`, so
/// [`Arc::downcast`] recovers the concrete handle without copying.
pub type Value = Arc<dyn Any + Send + Sync>;

/// Wraps `v` into a [`Value`].
pub fn value<T: Any + Send + Sync>(v: T) -> Value {
	Arc::new(v)
}

/// Identity of a declared type, with its name kept for diagnostics.
///
/// Equality and hashing only consider the [`TypeId`].
#[derive(Clone, Copy)]
pub struct TypeKey {
	id: TypeId,
	name: &'static str,
}

impl TypeKey {
	/// Returns the key for `T`.
	pub fn of<T: ?Sized + 'static>() -> Self {
		Self {
			id: TypeId::of::<T>(),
			name: std::any::type_name::<T>(),
		}
	}

	pub fn id(&self) -> TypeId {
		self.id
	}

	/// Fully qualified type name.
	pub fn name(&self) -> &'static str {
		self.name
	}

	/// Type name without module path, e.g. `PathBuf` for `std::path::PathBuf`.
	pub fn short_name(&self) -> &'static str {
		let base = self.name.split('<').next().unwrap_or(self.name);
		let start = base.rfind("::").map_or(0, |pos| pos + 2);
		&self.name[start..]
	}

	/// Returns `true` if `value` holds exactly this type.
	pub fn matches(&self, value: &Value) -> bool {
		Any::type_id(&**value) == self.id
	}
}

impl PartialEq for TypeKey {
	fn eq(&self, other: &Self) -> bool {
		self.id == other.id
	}
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.id.hash(state);
	}
}

impl fmt::Debug for TypeKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name)
	}
}

impl fmt::Display for TypeKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.short_name())
	}
}

/// All beans matched for a variadic parameter, in container order.
///
/// An empty list is a valid resolution, not a failure.
#[derive(Clone, Default)]
pub struct BeanList(Vec<Value>);

impl BeanList {
	pub fn new(values: Vec<Value>) -> Self {
		Self(values)
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn values(&self) -> &[Value] {
		&self.0
	}

	/// Downcasts every element to `T`, skipping elements of another type.
	pub fn downcast_all<T: Any + Send + Sync>(&self) -> Vec<Arc<T>> {
		self.0.iter().filter_map(|v| v.clone().downcast::<T>().ok()).collect()
	}
}

impl fmt::Debug for BeanList {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("BeanList").field("len", &self.0.len()).finish()
	}
}

#[cfg(test)]
mod tests {
	use std::path::PathBuf;

	use super::*;

	#[test]
	fn short_name_strips_module_path() {
		assert_eq!(TypeKey::of::<PathBuf>().short_name(), "PathBuf");
		assert_eq!(TypeKey::of::<u32>().short_name(), "u32");
	}

	#[test]
	fn matches_checks_concrete_type() {
		let v = value(String::from("x"));
		assert!(TypeKey::of::<String>().matches(&v));
		assert!(!TypeKey::of::<&str>().matches(&v));
	}

	#[test]
	fn bean_list_downcasts_matching_elements() {
		let list = BeanList::new(vec![value(1u32), value("skip"), value(2u32)]);
		let nums: Vec<u32> = list.downcast_all::<u32>().iter().map(|n| **n).collect();
		assert_eq!(nums, vec![1, 2]);
	}
}

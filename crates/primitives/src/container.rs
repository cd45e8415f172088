//! The delegate bean container.
//!
//! Folio does not own non-document beans. It talks to an external container
//! through [`BeanContainer`] for type lookups, name lookups, scoped
//! registration, post-construction processing and expression evaluation.
//! [`MemoryContainer`] is the in-process implementation used when no other
//! container is embedded.

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;
use rustc_hash::FxHashMap as HashMap;
use tracing::{trace, warn};

use crate::expr::{self, ExpressionError};
use crate::value::{TypeKey, Value};

/// Scope name under which the active document's beans are pushed.
pub const DOCUMENT_SCOPE: &str = "document";

/// Runs against objects created outside the container's normal path.
pub type PostProcessor = Arc<dyn Fn(&str, &Value) + Send + Sync>;

/// A named bean and every type it can be looked up as.
///
/// The first view is the bean's own type. Extra views expose the same bean
/// under another type, typically an `Arc<dyn Trait>` handle, since a
/// [`Value`] can only be downcast to its concrete type.
#[derive(Clone)]
pub struct BeanDefinition {
	name: String,
	views: Vec<(TypeKey, Value)>,
}

impl BeanDefinition {
	pub fn new<T: Any + Send + Sync>(name: impl Into<String>, bean: Arc<T>) -> Self {
		Self {
			name: name.into(),
			views: vec![(TypeKey::of::<T>(), bean)],
		}
	}

	/// Builds a definition from an already type-erased value.
	///
	/// `ty` must be the concrete type held by `value`.
	pub fn from_value(name: impl Into<String>, ty: TypeKey, value: Value) -> Self {
		debug_assert!(ty.matches(&value), "bean value does not hold {ty:?}");
		Self {
			name: name.into(),
			views: vec![(ty, value)],
		}
	}

	/// Exposes the bean under the additional type `V`.
	pub fn with_view<V: Any + Send + Sync>(mut self, view: V) -> Self {
		self.views.push((TypeKey::of::<V>(), Arc::new(view)));
		self
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn primary_type(&self) -> TypeKey {
		self.views[0].0
	}

	pub fn primary_value(&self) -> &Value {
		&self.views[0].1
	}

	/// Returns the view registered for `ty`, if any.
	pub fn view(&self, ty: TypeKey) -> Option<&Value> {
		self.views.iter().find(|(key, _)| *key == ty).map(|(_, v)| v)
	}

	fn as_named(&self, ty: TypeKey) -> Option<NamedBean> {
		self.view(ty).map(|value| NamedBean {
			name: self.name.clone(),
			ty,
			value: value.clone(),
		})
	}
}

impl std::fmt::Debug for BeanDefinition {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("BeanDefinition")
			.field("name", &self.name)
			.field("views", &self.views.iter().map(|(k, _)| *k).collect::<Vec<_>>())
			.finish()
	}
}

/// A lookup result: the bean's name, the type it matched as, and the value.
#[derive(Clone)]
pub struct NamedBean {
	pub name: String,
	pub ty: TypeKey,
	pub value: Value,
}

impl std::fmt::Debug for NamedBean {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("NamedBean").field("name", &self.name).field("ty", &self.ty).finish()
	}
}

/// Operations folio needs from the embedding bean container.
pub trait BeanContainer: Send + Sync {
	/// All beans that can be looked up as `ty`, in registration order.
	fn beans_of_type(&self, ty: TypeKey) -> Vec<NamedBean>;

	/// The bean registered under `name`, matched as its own type.
	fn bean(&self, name: &str) -> Option<NamedBean>;

	/// Registers a bean in the named scope namespace.
	fn register_scoped(&self, scope: &str, definition: BeanDefinition);

	/// Removes a bean from the named scope namespace.
	fn remove_scoped(&self, scope: &str, name: &str) -> Option<BeanDefinition>;

	/// Applies post-construction processing to an object the container did
	/// not create itself.
	fn post_process(&self, name: &str, bean: &Value);

	/// Evaluates an embedded expression against the container.
	fn evaluate(&self, expression: &str) -> Result<Option<Value>, ExpressionError>;
}

/// In-memory [`BeanContainer`] with singleton beans, scoped namespaces,
/// string properties and post-processors.
#[derive(Default)]
pub struct MemoryContainer {
	singletons: RwLock<Vec<BeanDefinition>>,
	scoped: RwLock<HashMap<String, Vec<BeanDefinition>>>,
	properties: RwLock<HashMap<String, String>>,
	post_processors: RwLock<Vec<PostProcessor>>,
	scoped_collisions: AtomicUsize,
}

impl MemoryContainer {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a process-wide bean, replacing any bean with the same name.
	pub fn register(&self, definition: BeanDefinition) {
		let mut singletons = self.singletons.write();
		singletons.retain(|d| d.name != definition.name);
		trace!(bean = %definition.name, ty = ?definition.primary_type(), "singleton registered");
		singletons.push(definition);
	}

	/// Shorthand for registering `bean` under its own type.
	pub fn register_bean<T: Any + Send + Sync>(&self, name: impl Into<String>, bean: T) -> Arc<T> {
		let bean = Arc::new(bean);
		self.register(BeanDefinition::new(name, bean.clone()));
		bean
	}

	pub fn set_property(&self, key: impl Into<String>, value: impl Into<String>) {
		self.properties.write().insert(key.into(), value.into());
	}

	pub fn property(&self, key: &str) -> Option<String> {
		self.properties.read().get(key).cloned()
	}

	pub fn add_post_processor(&self, processor: PostProcessor) {
		self.post_processors.write().push(processor);
	}

	/// Names currently registered in `scope`, in registration order.
	pub fn scoped_names(&self, scope: &str) -> Vec<String> {
		self.scoped
			.read()
			.get(scope)
			.map(|defs| defs.iter().map(|d| d.name.clone()).collect())
			.unwrap_or_default()
	}

	/// Number of scoped registrations that replaced a live bean of the same name.
	pub fn scoped_collisions(&self) -> usize {
		self.scoped_collisions.load(Ordering::Relaxed)
	}
}

impl BeanContainer for MemoryContainer {
	fn beans_of_type(&self, ty: TypeKey) -> Vec<NamedBean> {
		let mut found: Vec<NamedBean> = self.singletons.read().iter().filter_map(|d| d.as_named(ty)).collect();
		for defs in self.scoped.read().values() {
			found.extend(defs.iter().filter_map(|d| d.as_named(ty)));
		}
		found
	}

	fn bean(&self, name: &str) -> Option<NamedBean> {
		let scoped = self.scoped.read();
		let in_scope = scoped.values().flat_map(|defs| defs.iter()).find(|d| d.name == name);
		if let Some(def) = in_scope {
			return def.as_named(def.primary_type());
		}
		drop(scoped);

		self.singletons
			.read()
			.iter()
			.find(|d| d.name == name)
			.and_then(|d| d.as_named(d.primary_type()))
	}

	fn register_scoped(&self, scope: &str, definition: BeanDefinition) {
		let mut scoped = self.scoped.write();
		let defs = scoped.entry(scope.to_string()).or_default();
		if let Some(pos) = defs.iter().position(|d| d.name == definition.name) {
			self.scoped_collisions.fetch_add(1, Ordering::Relaxed);
			warn!(scope, bean = %definition.name, "scoped bean replaced a live bean of the same name");
			defs.remove(pos);
		}
		trace!(scope, bean = %definition.name, "scoped bean registered");
		defs.push(definition);
	}

	fn remove_scoped(&self, scope: &str, name: &str) -> Option<BeanDefinition> {
		let mut scoped = self.scoped.write();
		let defs = scoped.get_mut(scope)?;
		let pos = defs.iter().position(|d| d.name == name)?;
		trace!(scope, bean = name, "scoped bean removed");
		Some(defs.remove(pos))
	}

	fn post_process(&self, name: &str, bean: &Value) {
		let processors = self.post_processors.read().clone();
		for processor in processors {
			processor(name, bean);
		}
	}

	fn evaluate(&self, expression: &str) -> Result<Option<Value>, ExpressionError> {
		expr::evaluate(expression, |key| self.property(key), |name| self.bean(name).map(|b| b.value))
	}
}

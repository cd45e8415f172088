//! Handler objects and their method descriptors.

use std::any::Any;
use std::sync::Arc;

use folio_invocation::Callable;

/// Explicit classification of a method, overriding the naming convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodMarker {
	/// Handles the named command.
	Handles(String),
	/// Enables the named command.
	Enables(String),
	/// Listens for `event`, optionally on a named component.
	Listens { target: Option<String>, event: String },
}

/// One method a handler object exposes.
#[derive(Debug, Clone)]
pub struct MethodDescriptor {
	callable: Callable,
	marker: Option<MethodMarker>,
}

impl MethodDescriptor {
	pub fn new(callable: Callable) -> Self {
		Self { callable, marker: None }
	}

	pub fn handles(mut self, command: impl Into<String>) -> Self {
		self.marker = Some(MethodMarker::Handles(command.into()));
		self
	}

	pub fn enables(mut self, command: impl Into<String>) -> Self {
		self.marker = Some(MethodMarker::Enables(command.into()));
		self
	}

	pub fn listens(mut self, event: impl Into<String>) -> Self {
		self.marker = Some(MethodMarker::Listens {
			target: None,
			event: event.into(),
		});
		self
	}

	pub fn listens_on(mut self, target: impl Into<String>, event: impl Into<String>) -> Self {
		self.marker = Some(MethodMarker::Listens {
			target: Some(target.into()),
			event: event.into(),
		});
		self
	}

	pub fn name(&self) -> &str {
		self.callable.name()
	}

	pub fn callable(&self) -> &Callable {
		&self.callable
	}

	pub fn marker(&self) -> Option<&MethodMarker> {
		self.marker.as_ref()
	}
}

impl From<Callable> for MethodDescriptor {
	fn from(callable: Callable) -> Self {
		Self::new(callable)
	}
}

/// An object eligible to contribute command handlers, enablers and listeners.
///
/// Methods take `self: Arc<Self>` so descriptors can capture the handler.
pub trait Handler: Any + Send + Sync {
	/// Name used in diagnostics.
	fn handler_name(&self) -> &str {
		std::any::type_name::<Self>()
	}

	/// Every method this handler exposes.
	fn methods(self: Arc<Self>) -> Vec<MethodDescriptor>;

	/// Sub-handlers owned by this handler that contribute methods too.
	fn embedded_handlers(&self) -> Vec<Arc<dyn Handler>> {
		Vec::new()
	}
}

/// Priority-ordered handler objects; later entries override earlier ones.
///
/// A handler instance appears at most once.
#[derive(Clone, Default)]
pub struct HandlerStack {
	handlers: Vec<Arc<dyn Handler>>,
}

impl HandlerStack {
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends `handler` unless the same instance is already present.
	pub fn push(&mut self, handler: Arc<dyn Handler>) -> bool {
		if self.contains(&handler) {
			return false;
		}
		self.handlers.push(handler);
		true
	}

	pub fn remove(&mut self, handler: &Arc<dyn Handler>) -> bool {
		let before = self.handlers.len();
		self.handlers.retain(|h| !same_instance(h, handler));
		self.handlers.len() != before
	}

	pub fn contains(&self, handler: &Arc<dyn Handler>) -> bool {
		self.handlers.iter().any(|h| same_instance(h, handler))
	}

	pub fn len(&self) -> usize {
		self.handlers.len()
	}

	pub fn is_empty(&self) -> bool {
		self.handlers.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Handler>> {
		self.handlers.iter()
	}

	pub fn names(&self) -> Vec<String> {
		self.handlers.iter().map(|h| h.handler_name().to_string()).collect()
	}
}

impl std::fmt::Debug for HandlerStack {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_list().entries(self.handlers.iter().map(|h| h.handler_name())).finish()
	}
}

/// Compares data pointers only; vtable pointers may differ for one instance.
fn same_instance(a: &Arc<dyn Handler>, b: &Arc<dyn Handler>) -> bool {
	std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

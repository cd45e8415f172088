//! Event listener targets.
//!
//! Toolkit components are reached through [`EventAdapter`]s keyed by
//! component name. Events no adapter understands are document events and go
//! to the session's [`DocumentEventDispatcher`].

use std::fmt;
use std::sync::Arc;

use folio_invocation::{InvokeError, Invoker, SupplierRegistry};
use folio_primitives::Value;
use parking_lot::RwLock;
use rustc_hash::FxHashMap as HashMap;
use tracing::{debug, trace};

use crate::naming::case_variants;

/// Toolkit-side event source for one component.
pub trait EventAdapter: Send + Sync {
	fn component_name(&self) -> &str;

	/// Whether this component emits `event`.
	fn understands(&self, event: &str) -> bool;

	fn attach_listener(&self, event: &str, listener: Arc<Invoker>);

	/// Drops every listener attached through this adapter.
	fn detach_listeners(&self);
}

/// The adapters known to a document scope, in registration order.
#[derive(Default)]
pub struct EventAdapters {
	adapters: RwLock<Vec<Arc<dyn EventAdapter>>>,
}

impl EventAdapters {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers `adapter`, replacing one with the same component name.
	pub fn register(&self, adapter: Arc<dyn EventAdapter>) {
		let mut adapters = self.adapters.write();
		adapters.retain(|a| a.component_name() != adapter.component_name());
		trace!(component = adapter.component_name(), "event adapter registered");
		adapters.push(adapter);
	}

	pub fn unregister(&self, component: &str) -> bool {
		let mut adapters = self.adapters.write();
		let before = adapters.len();
		adapters.retain(|a| a.component_name() != component);
		adapters.len() != before
	}

	pub fn len(&self) -> usize {
		self.adapters.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.adapters.read().is_empty()
	}

	/// Finds a component by name, tolerating a different case of the first letter.
	pub fn component(&self, name: &str) -> Option<Arc<dyn EventAdapter>> {
		let adapters = self.adapters.read();
		case_variants(name)
			.iter()
			.find_map(|variant| adapters.iter().find(|a| a.component_name() == variant).cloned())
	}

	/// The spelling of `event` that `adapter` understands, if any.
	pub fn event_variant(adapter: &dyn EventAdapter, event: &str) -> Option<String> {
		case_variants(event).into_iter().find(|v| adapter.understands(v))
	}

	/// The first adapter that understands some spelling of `event`.
	pub fn first_understanding(&self, event: &str) -> Option<(Arc<dyn EventAdapter>, String)> {
		let adapters = self.adapters.read();
		adapters
			.iter()
			.find_map(|a| Self::event_variant(a.as_ref(), event).map(|v| (a.clone(), v)))
	}

	/// The first adapter that understands `event` as spelled.
	pub fn first_understanding_exact(&self, event: &str) -> Option<(Arc<dyn EventAdapter>, String)> {
		let adapters = self.adapters.read();
		adapters
			.iter()
			.find(|a| a.understands(event))
			.map(|a| (a.clone(), event.to_string()))
	}

	pub fn detach_all(&self) {
		for adapter in self.adapters.read().iter() {
			adapter.detach_listeners();
		}
	}
}

type ListenerMap = HashMap<String, Vec<Arc<Invoker>>>;

/// A generic [`EventAdapter`] for a component with a fixed event vocabulary.
///
/// The toolkit binding calls [`fire`](Self::fire) when the component emits.
pub struct ComponentAdapter {
	name: String,
	events: Vec<String>,
	listeners: RwLock<ListenerMap>,
}

impl ComponentAdapter {
	pub fn new<I, S>(name: impl Into<String>, events: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			name: name.into(),
			events: events.into_iter().map(Into::into).collect(),
			listeners: RwLock::new(HashMap::default()),
		}
	}

	pub fn listener_count(&self, event: &str) -> usize {
		self.listeners.read().get(event).map_or(0, Vec::len)
	}

	/// Invokes every listener attached to `event`; returns how many ran.
	pub fn fire(&self, event: &str) -> Result<usize, InvokeError> {
		let listeners = self.listeners.read().get(event).cloned().unwrap_or_default();
		for listener in &listeners {
			listener.invoke_value()?;
		}
		Ok(listeners.len())
	}
}

impl EventAdapter for ComponentAdapter {
	fn component_name(&self) -> &str {
		&self.name
	}

	fn understands(&self, event: &str) -> bool {
		self.events.iter().any(|e| e == event)
	}

	fn attach_listener(&self, event: &str, listener: Arc<Invoker>) {
		self.listeners.write().entry(event.to_string()).or_default().push(listener);
	}

	fn detach_listeners(&self) {
		self.listeners.write().clear();
	}
}

/// A document event as seen by listeners that declare a `DocumentEvent` parameter.
#[derive(Clone)]
pub struct DocumentEvent {
	pub name: String,
	pub payload: Option<Value>,
}

impl fmt::Debug for DocumentEvent {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("DocumentEvent")
			.field("name", &self.name)
			.field("payload", &self.payload.is_some())
			.finish()
	}
}

/// Per-session dispatcher for custom document events.
pub struct DocumentEventDispatcher {
	listeners: RwLock<ListenerMap>,
	suppliers: Arc<SupplierRegistry>,
}

impl DocumentEventDispatcher {
	/// `suppliers` must be the registry the listeners' resolver consults; the
	/// event being fired is exposed through it.
	pub fn new(suppliers: Arc<SupplierRegistry>) -> Self {
		Self {
			listeners: RwLock::new(HashMap::default()),
			suppliers,
		}
	}

	pub fn add_listener(&self, event: impl Into<String>, listener: Arc<Invoker>) {
		self.listeners.write().entry(event.into()).or_default().push(listener);
	}

	pub fn clear(&self) {
		self.listeners.write().clear();
	}

	pub fn listener_count(&self, event: &str) -> usize {
		self.listeners.read().get(event).map_or(0, Vec::len)
	}

	pub fn event_names(&self) -> Vec<String> {
		let mut names: Vec<String> = self.listeners.read().keys().cloned().collect();
		names.sort();
		names
	}

	/// Invokes every listener of `event` in registration order.
	///
	/// Stops at the first listener error. Returns how many listeners ran.
	pub fn fire(&self, event: &str, payload: Option<Value>) -> Result<usize, InvokeError> {
		let listeners = self.listeners.read().get(event).cloned().unwrap_or_default();
		if listeners.is_empty() {
			trace!(event, "document event without listeners");
			return Ok(0);
		}

		let current = Arc::new(DocumentEvent {
			name: event.to_string(),
			payload,
		});
		let _guard = self.suppliers.push_transient(current);
		debug!(event, listeners = listeners.len(), "firing document event");
		for listener in &listeners {
			listener.invoke_value()?;
		}
		Ok(listeners.len())
	}
}

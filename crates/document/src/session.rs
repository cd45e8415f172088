//! Per-document state.
//!
//! A [`DocumentSession`] owns everything scoped to one open document: the
//! model and controller, scoped beans, the handler stack, the command table
//! scanned from it, event bindings and the undo coordinator. Nothing here is
//! shared with other sessions.

use std::any::Any;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use folio_invocation::{ArgumentResolver, BuiltinSuppliers, InvokeError, SupplierRegistry};
use folio_primitives::{BeanContainer, BeanDefinition, DOCUMENT_SCOPE, DocumentId, Value};
use folio_registry::{
	CommandScanner, CommandTable, DispatchError, DocumentEventDispatcher, EventAdapter, EventAdapters, Handler, HandlerStack, ScanTargets,
};
use indexmap::IndexMap;
use parking_lot::{ReentrantMutex, RwLock};
use tracing::{debug, trace};

use crate::scope::{DocumentScopeManager, ScopeOptions};
use crate::undo::UndoCoordinator;

/// Bean name of the model.
pub const MODEL_BEAN: &str = "model";
/// Bean name of the controller.
pub const CONTROLLER_BEAN: &str = "controller";

#[derive(Clone)]
struct Slot {
	handler: Arc<dyn Handler>,
	value: Value,
}

#[derive(Default)]
struct SessionState {
	model: Option<Slot>,
	controller: Option<Slot>,
	file: Option<PathBuf>,
	beans: IndexMap<String, BeanDefinition>,
	handlers: HandlerStack,
	/// Beans are mirrored into the container's document scope while set.
	attached: bool,
}

/// Scanned command table plus what is needed to tell whether it is current.
struct CommandCache {
	/// `None` until the handler stack is next scanned.
	current: Option<Arc<CommandTable>>,
	/// Most recent scan result, served to calls made from inside a scan.
	last: Arc<CommandTable>,
	/// Bumped whenever the handler stack or the adapters change.
	generation: u64,
}

impl Default for CommandCache {
	fn default() -> Self {
		Self {
			current: None,
			last: Arc::new(CommandTable::new()),
			generation: 0,
		}
	}
}

#[derive(Clone, Copy)]
enum Role {
	Model,
	Controller,
}

impl Role {
	fn bean_name(self) -> &'static str {
		match self {
			Role::Model => MODEL_BEAN,
			Role::Controller => CONTROLLER_BEAN,
		}
	}
}

pub struct DocumentSession {
	id: DocumentId,
	container: Arc<dyn BeanContainer>,
	resolver: Arc<ArgumentResolver>,
	scanner: Arc<CommandScanner>,
	builtins: BuiltinSuppliers,
	undo: Arc<UndoCoordinator>,
	adapters: EventAdapters,
	document_events: DocumentEventDispatcher,
	state: RwLock<SessionState>,
	commands: RwLock<CommandCache>,
	/// Serializes scans. Held without the cache lock so handler code run by
	/// a scan may read the command table.
	scan_gate: ReentrantMutex<()>,
	scanning: AtomicBool,
	disposed: AtomicBool,
}

impl DocumentSession {
	pub(crate) fn new(
		id: DocumentId,
		container: Arc<dyn BeanContainer>,
		options: &ScopeOptions,
		scanner: Arc<CommandScanner>,
		base_handlers: &[Arc<dyn Handler>],
		scopes: Weak<DocumentScopeManager>,
	) -> Arc<Self> {
		let mut resolver = ArgumentResolver::new(container.clone());
		if let Some(adapter) = &options.adapter {
			resolver = resolver.with_adapter(adapter.clone());
		}
		if let Some(names) = &options.names {
			resolver = resolver.with_name_discoverer(names.clone());
		}
		let resolver = Arc::new(resolver);
		let undo = Arc::new(UndoCoordinator::new(options.config.undo.limit));

		let mut handlers = HandlerStack::new();
		for handler in base_handlers {
			handlers.push(handler.clone());
		}

		Arc::new_cyclic(|this: &Weak<Self>| Self {
			id,
			document_events: DocumentEventDispatcher::new(resolver.suppliers().clone()),
			builtins: builtin_suppliers(id, this.clone(), undo.clone(), scopes),
			container,
			resolver,
			scanner,
			undo,
			adapters: EventAdapters::new(),
			state: RwLock::new(SessionState {
				handlers,
				..SessionState::default()
			}),
			commands: RwLock::new(CommandCache::default()),
			scan_gate: ReentrantMutex::new(()),
			scanning: AtomicBool::new(false),
			disposed: AtomicBool::new(false),
		})
	}

	pub fn id(&self) -> DocumentId {
		self.id
	}

	pub fn undo(&self) -> &Arc<UndoCoordinator> {
		&self.undo
	}

	pub fn resolver(&self) -> &Arc<ArgumentResolver> {
		&self.resolver
	}

	pub fn document_events(&self) -> &DocumentEventDispatcher {
		&self.document_events
	}

	pub fn is_active(&self) -> bool {
		self.state.read().attached
	}

	pub fn is_disposed(&self) -> bool {
		self.disposed.load(Ordering::Acquire)
	}

	pub fn file(&self) -> Option<PathBuf> {
		self.state.read().file.clone()
	}

	pub fn set_file(&self, file: impl Into<PathBuf>) {
		self.state.write().file = Some(file.into());
	}

	/// File name, or `Untitled <n>` for a document never saved.
	pub fn display_name(&self) -> String {
		let state = self.state.read();
		state
			.file
			.as_deref()
			.and_then(Path::file_name)
			.map(|name| name.to_string_lossy().into_owned())
			.unwrap_or_else(|| format!("Untitled {}", self.id.0))
	}

	/// Installs the model: registers it as the `model` bean, runs container
	/// post-processing on it and adds it and its embedded handlers to the
	/// handler stack. A previous model leaves the stack.
	pub fn set_model<M: Handler>(&self, model: Arc<M>) {
		self.install(Role::Model, model);
	}

	/// Installs the controller, like [`set_model`](Self::set_model).
	pub fn set_controller<C: Handler>(&self, controller: Arc<C>) {
		self.install(Role::Controller, controller);
	}

	pub fn model<M: Any + Send + Sync>(&self) -> Option<Arc<M>> {
		let slot = self.state.read().model.clone()?;
		slot.value.downcast::<M>().ok()
	}

	pub fn controller<C: Any + Send + Sync>(&self) -> Option<Arc<C>> {
		let slot = self.state.read().controller.clone()?;
		slot.value.downcast::<C>().ok()
	}

	pub fn model_handler(&self) -> Option<Arc<dyn Handler>> {
		self.state.read().model.as_ref().map(|slot| slot.handler.clone())
	}

	pub fn controller_handler(&self) -> Option<Arc<dyn Handler>> {
		self.state.read().controller.as_ref().map(|slot| slot.handler.clone())
	}

	fn install<H: Handler>(&self, role: Role, bean: Arc<H>) {
		let name = role.bean_name();
		let handler: Arc<dyn Handler> = bean.clone();
		let definition = BeanDefinition::new(name, bean).with_view(handler.clone());
		let value = definition.primary_value().clone();

		let slot = Slot {
			handler: handler.clone(),
			value: value.clone(),
		};
		let previous = {
			let mut state = self.state.write();
			match role {
				Role::Model => state.model.replace(slot),
				Role::Controller => state.controller.replace(slot),
			}
		};
		self.put_bean(definition);
		if let Some(previous) = previous {
			if !std::ptr::addr_eq(Arc::as_ptr(&previous.handler), Arc::as_ptr(&handler)) {
				self.remove_handler(&previous.handler);
			}
		}

		self.container.post_process(name, &value);
		self.add_handler(handler);
		debug!(doc = %self.id, bean = name, "handler object installed");
	}

	/// Appends `handler` and, recursively, the handlers it embeds. Instances
	/// already on the stack are skipped. Returns `false` if `handler` was.
	pub fn add_handler(&self, handler: Arc<dyn Handler>) -> bool {
		let added = self.push_handler(handler);
		if added {
			self.invalidate_commands();
		}
		added
	}

	fn push_handler(&self, handler: Arc<dyn Handler>) -> bool {
		if !self.state.write().handlers.push(handler.clone()) {
			return false;
		}
		trace!(doc = %self.id, handler = handler.handler_name(), "handler added");
		for embedded in handler.embedded_handlers() {
			self.push_handler(embedded);
		}
		true
	}

	pub fn remove_handler(&self, handler: &Arc<dyn Handler>) -> bool {
		let removed = self.state.write().handlers.remove(handler);
		if removed {
			trace!(doc = %self.id, handler = handler.handler_name(), "handler removed");
			self.invalidate_commands();
		}
		removed
	}

	/// Snapshot of the handler stack.
	pub fn handlers(&self) -> HandlerStack {
		self.state.read().handlers.clone()
	}

	/// Registers an event adapter; listeners are rebound on the next scan.
	pub fn register_event_adapter(&self, adapter: Arc<dyn EventAdapter>) {
		self.adapters.register(adapter);
		self.invalidate_commands();
	}

	pub fn event_adapters(&self) -> &EventAdapters {
		&self.adapters
	}

	fn invalidate_commands(&self) {
		let mut cache = self.commands.write();
		cache.current = None;
		cache.generation += 1;
	}

	/// The command table, scanning the handler stack if it changed.
	///
	/// A call made by handler code while a scan runs gets the previous table.
	pub fn command_table(&self) -> Arc<CommandTable> {
		if let Some(table) = self.commands.read().current.clone() {
			return table;
		}

		let _gate = self.scan_gate.lock();
		let generation = {
			let cache = self.commands.read();
			if let Some(table) = cache.current.clone() {
				return table;
			}
			if self.scanning.load(Ordering::Acquire) {
				trace!(doc = %self.id, "command table read during scan");
				return cache.last.clone();
			}
			cache.generation
		};

		self.scanning.store(true, Ordering::Release);
		let handlers = self.handlers();
		let targets = ScanTargets {
			resolver: self.resolver.clone(),
			adapters: &self.adapters,
			document_events: &self.document_events,
			builtins: Some(self.builtins.clone()),
		};
		let table = Arc::new(self.scanner.scan(&handlers, &targets));
		self.scanning.store(false, Ordering::Release);
		debug!(doc = %self.id, commands = table.len(), "command table rebuilt");

		let mut cache = self.commands.write();
		cache.last = table.clone();
		if cache.generation == generation {
			cache.current = Some(table.clone());
		}
		table
	}

	pub fn is_enabled(&self, command: &str) -> bool {
		!self.is_disposed() && self.command_table().is_enabled(command)
	}

	pub fn execute(&self, command: &str) -> Result<Option<Value>, DispatchError> {
		if self.is_disposed() {
			return Err(DispatchError::UnknownCommand(command.to_string()));
		}
		self.command_table().execute(command)
	}

	/// Fires a document event. `event` may be given with or without the
	/// document event prefix.
	pub fn fire_document_event(&self, event: &str, payload: Option<Value>) -> Result<usize, InvokeError> {
		if self.is_disposed() {
			return Ok(0);
		}
		self.command_table();
		let name = self.scanner.document_event_naming().document_event_name(event);
		self.document_events.fire(&name, payload)
	}

	pub fn bean(&self, name: &str) -> Option<Value> {
		self.state.read().beans.get(name).map(|d| d.primary_value().clone())
	}

	pub fn bean_as<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
		self.bean(name)?.downcast::<T>().ok()
	}

	pub fn bean_names(&self) -> Vec<String> {
		self.state.read().beans.keys().cloned().collect()
	}

	/// Stores a scoped bean, replacing one of the same name. While the
	/// session is active the bean is visible through the container at once.
	pub fn put_bean(&self, definition: BeanDefinition) {
		let mut state = self.state.write();
		if state.attached {
			self.container.remove_scoped(DOCUMENT_SCOPE, definition.name());
			self.container.register_scoped(DOCUMENT_SCOPE, definition.clone());
		}
		trace!(doc = %self.id, bean = definition.name(), "scoped bean stored");
		state.beans.insert(definition.name().to_string(), definition);
	}

	pub fn insert_bean<T: Any + Send + Sync>(&self, name: impl Into<String>, bean: Arc<T>) {
		self.put_bean(BeanDefinition::new(name, bean));
	}

	pub fn remove_bean(&self, name: &str) -> Option<BeanDefinition> {
		let mut state = self.state.write();
		let removed = state.beans.shift_remove(name)?;
		if state.attached {
			self.container.remove_scoped(DOCUMENT_SCOPE, name);
		}
		trace!(doc = %self.id, bean = name, "scoped bean removed");
		Some(removed)
	}

	/// Pushes every scoped bean into the container.
	pub(crate) fn attach(&self) {
		let mut state = self.state.write();
		if state.attached {
			return;
		}
		for definition in state.beans.values() {
			self.container.register_scoped(DOCUMENT_SCOPE, definition.clone());
		}
		state.attached = true;
	}

	/// Removes every scoped bean from the container.
	pub(crate) fn detach(&self) {
		let mut state = self.state.write();
		if !state.attached {
			return;
		}
		for name in state.beans.keys() {
			self.container.remove_scoped(DOCUMENT_SCOPE, name);
		}
		state.attached = false;
	}

	/// Tears the session down. Must already be detached.
	pub(crate) fn dispose(&self) {
		if self.disposed.swap(true, Ordering::AcqRel) {
			return;
		}
		self.adapters.detach_all();
		self.document_events.clear();
		self.undo.discard_all_edits();
		{
			let mut state = self.state.write();
			state.handlers = HandlerStack::new();
			state.beans.clear();
			state.model = None;
			state.controller = None;
		}
		{
			let mut cache = self.commands.write();
			let empty = Arc::new(CommandTable::new());
			cache.current = Some(empty.clone());
			cache.last = empty;
			cache.generation += 1;
		}
		debug!(doc = %self.id, "session disposed");
	}
}

impl fmt::Debug for DocumentSession {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let state = self.state.read();
		f.debug_struct("DocumentSession")
			.field("id", &self.id)
			.field("file", &state.file)
			.field("handlers", &state.handlers)
			.field("attached", &state.attached)
			.finish()
	}
}

/// Suppliers for the session's own framework objects.
fn builtin_suppliers(
	id: DocumentId,
	session: Weak<DocumentSession>,
	undo: Arc<UndoCoordinator>,
	scopes: Weak<DocumentScopeManager>,
) -> BuiltinSuppliers {
	Arc::new(move |suppliers: &SupplierRegistry| {
		let session = session.clone();
		suppliers.register_exact(move || session.upgrade());
		let undo = undo.clone();
		suppliers.register_exact(move || Some(undo.clone()));
		let scopes = scopes.clone();
		suppliers.register_exact(move || scopes.upgrade());
		suppliers.register_exact(move || Some(Arc::new(id)));
	})
}

#[cfg(test)]
mod tests;

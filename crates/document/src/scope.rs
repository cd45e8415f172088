//! Active document tracking.
//!
//! The [`DocumentScopeManager`] is process wide. It owns every live
//! [`DocumentSession`] and knows which one is active. At most one session is
//! active and its beans are the only ones in the container's document
//! scope; switching fully deactivates the old session before the new one is
//! activated.
//!
//! Reads of the active session are lock free. Mutations and reads with side
//! effects go through one re-entrant gate, so a bean factory may call back
//! into the manager.

use std::any::Any;
use std::sync::{Arc, Weak};

use arc_swap::ArcSwapOption;
use folio_invocation::{FrameworkAdapter, ParameterNameDiscoverer};
use folio_primitives::{BeanContainer, BeanDefinition, DocumentId, Value};
use folio_registry::{CommandScanner, DispatchError, DocumentEventNaming, Handler, HandlerStack, NamingConvention, PrefixEventNaming};
use indexmap::IndexMap;
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use rustc_hash::FxHashSet as HashSet;
use thiserror::Error;
use tracing::{debug, trace};

use crate::config::FrameworkConfig;
use crate::session::DocumentSession;

#[derive(Debug, Error)]
pub enum ScopeError {
	#[error("unknown document {0}")]
	UnknownDocument(DocumentId),
	#[error("document {0} was disposed")]
	Disposed(DocumentId),
	#[error("no active document")]
	NoActiveDocument,
	#[error("bean `{name}` is not a {expected}")]
	BeanType { name: String, expected: &'static str },
	#[error(transparent)]
	Dispatch(#[from] DispatchError),
}

/// The application object hosting the document windows.
pub trait ApplicationHost: Send + Sync {
	/// The active handler stack changed; `None` while no document is active.
	/// Hosts rebuild menus and toolbars from it.
	fn handlers_changed(&self, handlers: Option<&HandlerStack>);
}

/// Settings shared by every session a manager creates.
#[derive(Clone, Default)]
pub struct ScopeOptions {
	pub config: FrameworkConfig,
	/// Consulted first when resolving handler arguments.
	pub adapter: Option<Arc<dyn FrameworkAdapter>>,
	pub names: Option<Arc<dyn ParameterNameDiscoverer>>,
	/// Overrides the configured document event prefix.
	pub document_events: Option<Arc<dyn DocumentEventNaming>>,
}

impl ScopeOptions {
	pub fn new(config: FrameworkConfig) -> Self {
		Self {
			config,
			..Self::default()
		}
	}

	fn scanner(&self) -> CommandScanner {
		let naming = NamingConvention::new(self.config.naming.command_prefix.clone());
		let events = self
			.document_events
			.clone()
			.unwrap_or_else(|| Arc::new(PrefixEventNaming::new(self.config.naming.document_event_prefix.clone())));
		CommandScanner::new(naming, events).strict(self.config.invocation.strict)
	}
}

pub struct DocumentScopeManager {
	this: Weak<Self>,
	container: Arc<dyn BeanContainer>,
	options: ScopeOptions,
	scanner: Arc<CommandScanner>,
	active: ArcSwapOption<DocumentSession>,
	sessions: RwLock<IndexMap<DocumentId, Arc<DocumentSession>>>,
	disposed: Mutex<HashSet<DocumentId>>,
	gate: ReentrantMutex<()>,
	base_handlers: RwLock<Vec<Arc<dyn Handler>>>,
	host: RwLock<Option<Arc<dyn ApplicationHost>>>,
}

impl DocumentScopeManager {
	pub fn new(container: Arc<dyn BeanContainer>, options: ScopeOptions) -> Arc<Self> {
		let scanner = Arc::new(options.scanner());
		Arc::new_cyclic(|this| Self {
			this: this.clone(),
			container,
			options,
			scanner,
			active: ArcSwapOption::empty(),
			sessions: RwLock::new(IndexMap::new()),
			disposed: Mutex::new(HashSet::default()),
			gate: ReentrantMutex::new(()),
			base_handlers: RwLock::new(Vec::new()),
			host: RwLock::new(None),
		})
	}

	pub fn container(&self) -> &Arc<dyn BeanContainer> {
		&self.container
	}

	pub fn options(&self) -> &ScopeOptions {
		&self.options
	}

	pub fn set_host(&self, host: Arc<dyn ApplicationHost>) {
		*self.host.write() = Some(host);
	}

	/// Adds a handler placed at the bottom of every session established
	/// from now on.
	pub fn add_base_handler(&self, handler: Arc<dyn Handler>) {
		self.base_handlers.write().push(handler);
	}

	/// Creates a session and makes it the active one.
	pub fn establish_session(&self) -> Arc<DocumentSession> {
		let _gate = self.gate.lock();
		let id = DocumentId::next();
		let base = self.base_handlers.read().clone();
		let session = DocumentSession::new(id, self.container.clone(), &self.options, self.scanner.clone(), &base, self.this.clone());
		self.sessions.write().insert(id, session.clone());
		debug!(doc = %id, "session established");
		self.switch_to(Some(session.clone()));
		session
	}

	/// Makes `id` the active document. A no-op if it already is.
	pub fn activate_scope(&self, id: DocumentId) -> Result<(), ScopeError> {
		let _gate = self.gate.lock();
		if self.disposed.lock().contains(&id) {
			return Err(ScopeError::Disposed(id));
		}
		let session = self.session(id).ok_or(ScopeError::UnknownDocument(id))?;
		if self.active_document() == Some(id) {
			trace!(doc = %id, "scope already active");
			return Ok(());
		}
		self.switch_to(Some(session));
		Ok(())
	}

	/// Removes the session of `id`, deactivating it first if it is active.
	/// Returns `false` if there was no such session.
	pub fn dispose_document_scope(&self, id: DocumentId) -> bool {
		let _gate = self.gate.lock();
		if !self.sessions.read().contains_key(&id) {
			return false;
		}
		if self.active_document() == Some(id) {
			self.switch_to(None);
		}
		self.disposed.lock().insert(id);
		let Some(session) = self.sessions.write().shift_remove(&id) else {
			return false;
		};
		session.dispose();
		debug!(doc = %id, remaining = self.sessions.read().len(), "scope disposed");
		true
	}

	/// Deactivates the current session, then activates `next`. Gate held.
	fn switch_to(&self, next: Option<Arc<DocumentSession>>) {
		let host = self.host.read().clone();
		if let Some(previous) = self.active.swap(None) {
			if let Some(host) = &host {
				host.handlers_changed(None);
			}
			previous.detach();
			debug!(doc = %previous.id(), "scope deactivated");
		}

		let Some(next) = next else {
			return;
		};
		next.attach();
		self.active.store(Some(next.clone()));
		if let Some(host) = &host {
			host.handlers_changed(Some(&next.handlers()));
		}
		debug!(doc = %next.id(), "scope activated");
	}

	pub fn active_document(&self) -> Option<DocumentId> {
		(*self.active.load()).as_ref().map(|session| session.id())
	}

	pub fn active_session(&self) -> Option<Arc<DocumentSession>> {
		self.active.load_full()
	}

	pub fn session(&self, id: DocumentId) -> Option<Arc<DocumentSession>> {
		self.sessions.read().get(&id).cloned()
	}

	/// Live documents in the order they were established.
	pub fn document_ids(&self) -> Vec<DocumentId> {
		self.sessions.read().keys().copied().collect()
	}

	pub fn is_disposed(&self, id: DocumentId) -> bool {
		self.disposed.lock().contains(&id)
	}

	pub fn active_model<M: Any + Send + Sync>(&self) -> Option<Arc<M>> {
		self.active_session()?.model()
	}

	pub fn active_controller<C: Any + Send + Sync>(&self) -> Option<Arc<C>> {
		self.active_session()?.controller()
	}

	/// Returns the active document's bean `name`, creating it with `create`
	/// and storing it in the session if absent.
	///
	/// Creation happens at most once per name and session.
	pub fn bean_from_active_document_bean_store<T, F>(&self, name: &str, create: F) -> Result<Arc<T>, ScopeError>
	where
		T: Any + Send + Sync,
		F: FnOnce() -> T,
	{
		if let Some(bean) = self.active_session().and_then(|session| session.bean(name)) {
			return downcast_bean(name, bean);
		}

		let _gate = self.gate.lock();
		let session = self.active_session().ok_or(ScopeError::NoActiveDocument)?;
		if let Some(bean) = session.bean(name) {
			return downcast_bean(name, bean);
		}
		let bean = Arc::new(create());
		session.insert_bean(name, bean.clone());
		debug!(doc = %session.id(), bean = name, "scoped bean created");
		Ok(bean)
	}

	pub fn remove_bean_from_active_document(&self, name: &str) -> Result<Option<BeanDefinition>, ScopeError> {
		let _gate = self.gate.lock();
		let session = self.active_session().ok_or(ScopeError::NoActiveDocument)?;
		Ok(session.remove_bean(name))
	}

	/// Runs `command` against the active document.
	pub fn execute(&self, command: &str) -> Result<Option<Value>, ScopeError> {
		let session = self.active_session().ok_or(ScopeError::NoActiveDocument)?;
		Ok(session.execute(command)?)
	}

	pub fn is_enabled(&self, command: &str) -> bool {
		self.active_session().is_some_and(|session| session.is_enabled(command))
	}
}

fn downcast_bean<T: Any + Send + Sync>(name: &str, bean: Value) -> Result<Arc<T>, ScopeError> {
	bean.downcast::<T>().map_err(|_| ScopeError::BeanType {
		name: name.to_string(),
		expected: std::any::type_name::<T>(),
	})
}

//! Application lifecycle: creating, opening, saving and closing documents.
//!
//! [`Application`] drives the [`DocumentScopeManager`] through pluggable
//! collaborators: a [`DocumentFactory`] builds model and controller, a
//! [`DocumentIo`] reads and writes files, and [`Dialogs`] asks the user. A
//! close that the user cancels, or whose save fails, stops a quit-all loop.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use folio_invocation::{CallError, Callable, ParamDesc};
use folio_primitives::DocumentId;
use folio_registry::{Handler, MethodDescriptor};
use thiserror::Error;
use tracing::{debug, warn};

use crate::scope::{DocumentScopeManager, ScopeError};
use crate::session::DocumentSession;
use crate::undo::{BoxError, UndoCoordinator};

/// Document event fired after a document was opened.
pub const OPENED_EVENT: &str = "Opened";
/// Document event fired after a document was saved.
pub const SAVED_EVENT: &str = "Saved";
/// Document event fired right before a document is disposed.
pub const CLOSING_EVENT: &str = "Closing";

#[derive(Debug, Error)]
pub enum LifecycleError {
	#[error(transparent)]
	Scope(#[from] ScopeError),
	#[error("failed to create document")]
	Create {
		#[source]
		source: BoxError,
	},
	#[error("failed to open {}", path.display())]
	Open {
		path: PathBuf,
		#[source]
		source: BoxError,
	},
	#[error("failed to save {}", path.display())]
	Save {
		path: PathBuf,
		#[source]
		source: BoxError,
	},
}

/// Builds the content of a new session.
pub trait DocumentFactory: Send + Sync {
	/// Installs the model and controller into `session`.
	fn create(&self, session: &Arc<DocumentSession>) -> anyhow::Result<()>;
}

/// Reads and writes document files.
pub trait DocumentIo: Send + Sync {
	fn open(&self, session: &DocumentSession, path: &Path) -> anyhow::Result<()>;

	fn save(&self, session: &DocumentSession, path: &Path) -> anyhow::Result<()>;
}

/// Answer to "save changes before closing?".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveChoice {
	Save,
	Discard,
	Cancel,
}

/// User prompts needed by the lifecycle.
pub trait Dialogs: Send + Sync {
	fn confirm_save(&self, document: &str) -> SaveChoice;

	/// Asks where to save a document that has no file yet; `None` cancels.
	fn choose_save_path(&self, document: &str) -> Option<PathBuf>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
	Closed,
	/// The user cancelled; nothing further should be closed.
	Cancelled,
}

pub struct Application {
	scopes: Arc<DocumentScopeManager>,
	factory: Arc<dyn DocumentFactory>,
	io: Arc<dyn DocumentIo>,
	dialogs: Arc<dyn Dialogs>,
}

impl Application {
	/// Creates the application and registers [`BuiltinCommands`] as a base
	/// handler of `scopes`.
	pub fn new(
		scopes: Arc<DocumentScopeManager>,
		factory: Arc<dyn DocumentFactory>,
		io: Arc<dyn DocumentIo>,
		dialogs: Arc<dyn Dialogs>,
	) -> Arc<Self> {
		Arc::new_cyclic(|this| {
			scopes.add_base_handler(Arc::new(BuiltinCommands { app: this.clone() }));
			Self {
				scopes,
				factory,
				io,
				dialogs,
			}
		})
	}

	pub fn scopes(&self) -> &Arc<DocumentScopeManager> {
		&self.scopes
	}

	/// Establishes a session and fills it through the factory. Edits made
	/// while building do not count as changes.
	pub fn new_document(&self) -> Result<Arc<DocumentSession>, LifecycleError> {
		let session = self.scopes.establish_session();
		if let Err(error) = self.factory.create(&session) {
			self.scopes.dispose_document_scope(session.id());
			return Err(LifecycleError::Create { source: error.into() });
		}
		session.undo().discard_all_edits();
		debug!(doc = %session.id(), "document created");
		Ok(session)
	}

	pub fn open_document(&self, path: impl Into<PathBuf>) -> Result<Arc<DocumentSession>, LifecycleError> {
		let path = path.into();
		let session = self.new_document()?;
		if let Err(error) = self.io.open(&session, &path) {
			self.scopes.dispose_document_scope(session.id());
			return Err(LifecycleError::Open {
				path,
				source: error.into(),
			});
		}
		session.set_file(&path);
		session.undo().discard_all_edits();
		debug!(doc = %session.id(), path = %path.display(), "document opened");
		fire(&session, OPENED_EVENT);
		Ok(session)
	}

	/// Saves `id` to its file, asking for one if it has none. Returns
	/// `false` if the user cancelled.
	pub fn save(&self, id: DocumentId) -> Result<bool, LifecycleError> {
		let session = self.live_session(id)?;
		let path = match session.file() {
			Some(path) => path,
			None => match self.dialogs.choose_save_path(&session.display_name()) {
				Some(path) => path,
				None => return Ok(false),
			},
		};
		self.save_as(id, path)?;
		Ok(true)
	}

	pub fn save_as(&self, id: DocumentId, path: impl Into<PathBuf>) -> Result<(), LifecycleError> {
		let path = path.into();
		let session = self.live_session(id)?;
		if let Err(error) = self.io.save(&session, &path) {
			return Err(LifecycleError::Save {
				path,
				source: error.into(),
			});
		}
		session.set_file(&path);
		session.undo().checkpoint();
		debug!(doc = %id, path = %path.display(), "document saved");
		fire(&session, SAVED_EVENT);
		Ok(())
	}

	/// Closes `id`, asking to save unsaved changes first. A failed save
	/// keeps the document open and is returned as an error.
	pub fn close(&self, id: DocumentId) -> Result<CloseOutcome, LifecycleError> {
		let session = self.live_session(id)?;
		if session.undo().changes_have_occurred_since_last_checkpoint() {
			self.scopes.activate_scope(id)?;
			match self.dialogs.confirm_save(&session.display_name()) {
				SaveChoice::Save => {
					if !self.save(id)? {
						return Ok(CloseOutcome::Cancelled);
					}
				}
				SaveChoice::Discard => {}
				SaveChoice::Cancel => return Ok(CloseOutcome::Cancelled),
			}
		}

		fire(&session, CLOSING_EVENT);
		let was_active = self.scopes.active_document() == Some(id);
		self.scopes.dispose_document_scope(id);
		if was_active {
			if let Some(next) = self.scopes.document_ids().last().copied() {
				self.scopes.activate_scope(next)?;
			}
		}
		debug!(doc = %id, "document closed");
		Ok(CloseOutcome::Closed)
	}

	/// Closes every document in the order they were opened, stopping at
	/// the first cancellation or failure.
	pub fn quit_all(&self) -> Result<CloseOutcome, LifecycleError> {
		for id in self.scopes.document_ids() {
			if self.close(id)? == CloseOutcome::Cancelled {
				debug!(doc = %id, "quit cancelled");
				return Ok(CloseOutcome::Cancelled);
			}
		}
		Ok(CloseOutcome::Closed)
	}

	fn live_session(&self, id: DocumentId) -> Result<Arc<DocumentSession>, ScopeError> {
		if self.scopes.is_disposed(id) {
			return Err(ScopeError::Disposed(id));
		}
		self.scopes.session(id).ok_or(ScopeError::UnknownDocument(id))
	}
}

fn fire(session: &DocumentSession, event: &str) {
	if let Err(error) = session.fire_document_event(event, None) {
		warn!(doc = %session.id(), event, %error, "document event listener failed");
	}
}

/// Framework commands present in every document: undo, redo, save and close.
pub struct BuiltinCommands {
	app: Weak<Application>,
}

impl BuiltinCommands {
	fn app(&self) -> Result<Arc<Application>, CallError> {
		self.app.upgrade().ok_or_else(|| anyhow::anyhow!("application was dropped").into())
	}
}

impl Handler for BuiltinCommands {
	fn handler_name(&self) -> &str {
		"BuiltinCommands"
	}

	fn methods(self: Arc<Self>) -> Vec<MethodDescriptor> {
		let undo = || ParamDesc::of::<UndoCoordinator>("undo");
		let session = || ParamDesc::of::<DocumentSession>("session");
		let (save, close) = (self.clone(), self);

		vec![
			MethodDescriptor::from(Callable::method("handleUndo").param(undo()).run(|args| {
				args.get::<UndoCoordinator>(0)?.undo().map_err(anyhow::Error::from)?;
				Ok(())
			})),
			MethodDescriptor::from(
				Callable::method("enableUndo")
					.param(undo())
					.returning(|args| Ok(Some(args.get::<UndoCoordinator>(0)?.can_undo()))),
			),
			MethodDescriptor::from(Callable::method("handleRedo").param(undo()).run(|args| {
				args.get::<UndoCoordinator>(0)?.redo().map_err(anyhow::Error::from)?;
				Ok(())
			})),
			MethodDescriptor::from(
				Callable::method("enableRedo")
					.param(undo())
					.returning(|args| Ok(Some(args.get::<UndoCoordinator>(0)?.can_redo()))),
			),
			MethodDescriptor::from(Callable::method("handleSave").param(session()).returning(move |args| {
				let id = args.get::<DocumentSession>(0)?.id();
				Ok(Some(save.app()?.save(id).map_err(anyhow::Error::from)?))
			})),
			MethodDescriptor::from(Callable::method("enableSave").param(session()).returning(|args| {
				let session = args.get::<DocumentSession>(0)?;
				Ok(Some(session.file().is_none() || session.undo().changes_have_occurred_since_last_checkpoint()))
			})),
			MethodDescriptor::from(Callable::method("handleClose").param(session()).returning(move |args| {
				let id = args.get::<DocumentSession>(0)?.id();
				Ok(Some(close.app()?.close(id).map_err(anyhow::Error::from)?))
			})),
		]
	}
}


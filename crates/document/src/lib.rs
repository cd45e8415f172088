//! Document scopes for folio applications.
//!
//! Each open document gets a [`DocumentSession`]: model, controller, scoped
//! beans, a handler stack with its command table, event bindings and an
//! [`UndoCoordinator`]. The [`DocumentScopeManager`] tracks which session is
//! active and keeps the delegate container's document scope in sync with
//! it. [`Application`] adds the new/open/save/close lifecycle on top.

pub mod app;
pub mod config;
pub mod scope;
pub mod session;
pub mod undo;

pub use app::{
	Application, BuiltinCommands, CLOSING_EVENT, CloseOutcome, Dialogs, DocumentFactory, DocumentIo, LifecycleError, OPENED_EVENT, SAVED_EVENT,
	SaveChoice,
};
pub use config::{ConfigError, ConfigLoadReport, FrameworkConfig, load_config_from_dir};
pub use scope::{ApplicationHost, DocumentScopeManager, ScopeError, ScopeOptions};
pub use session::{CONTROLLER_BEAN, DocumentSession, MODEL_BEAN};
pub use undo::{AddOutcome, CompoundEdit, FnEdit, UndoCoordinator, UndoError, UndoableEdit};

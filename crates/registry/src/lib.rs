//! Command registry for document scopes.
//!
//! Handler objects describe their command handlers, enablers and event
//! listeners as [`MethodDescriptor`] lists. The [`CommandScanner`] walks a
//! priority-ordered [`HandlerStack`], classifies each descriptor by explicit
//! marker or naming convention, and produces a [`CommandTable`]. Listener
//! descriptors are bound straight onto [`EventAdapter`]s or the
//! [`DocumentEventDispatcher`].
//!
//! # Naming
//!
//! | method name           | role                                   |
//! |-----------------------|----------------------------------------|
//! | `handleSave`          | handler for `cmdSave`                  |
//! | `enableSave`          | enabler for `cmdSave`                  |
//! | `onMouseMoved`        | listener for toolkit event `mouseMoved`, or document event `evtMouseMoved` when no adapter knows it |
//! | `onSaveButton_action` | listener for `action` on component `saveButton` |

pub mod commands;
pub mod events;
pub mod handler;
pub mod naming;
pub mod scanner;

pub use commands::{CommandEntry, CommandTable, DispatchError};
pub use events::{ComponentAdapter, DocumentEvent, DocumentEventDispatcher, EventAdapter, EventAdapters};
pub use handler::{Handler, HandlerStack, MethodDescriptor, MethodMarker};
pub use naming::{DocumentEventNaming, MethodRole, NamingConvention, PrefixEventNaming};
pub use scanner::{CommandScanner, ScanTargets};

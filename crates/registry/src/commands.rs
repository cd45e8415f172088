//! The command table built by a scan.

use std::sync::Arc;

use folio_invocation::{InvokeError, Invoker};
use folio_primitives::Value;
use rustc_hash::FxHashMap as HashMap;
use tracing::{debug, warn};

/// Handler and enabler bound to one command name.
#[derive(Debug, Clone, Default)]
pub struct CommandEntry {
	pub handler: Option<Arc<Invoker>>,
	pub enabler: Option<Arc<Invoker>>,
}

/// Command dispatch failure.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
	#[error("unknown command: {0}")]
	UnknownCommand(String),
	#[error("command {0} has an enabler but no handler")]
	NoHandler(String),
	#[error(transparent)]
	Invoke(#[from] InvokeError),
}

/// Command name to [`CommandEntry`].
#[derive(Debug, Default)]
pub struct CommandTable {
	entries: HashMap<String, CommandEntry>,
}

impl CommandTable {
	pub fn new() -> Self {
		Self::default()
	}

	/// Binds the handler of `command`, returning the one it replaced.
	pub fn set_handler(&mut self, command: impl Into<String>, invoker: Arc<Invoker>) -> Option<Arc<Invoker>> {
		self.entries.entry(command.into()).or_default().handler.replace(invoker)
	}

	/// Binds the enabler of `command`, returning the one it replaced.
	pub fn set_enabler(&mut self, command: impl Into<String>, invoker: Arc<Invoker>) -> Option<Arc<Invoker>> {
		self.entries.entry(command.into()).or_default().enabler.replace(invoker)
	}

	pub fn get(&self, command: &str) -> Option<&CommandEntry> {
		self.entries.get(command)
	}

	pub fn contains(&self, command: &str) -> bool {
		self.entries.contains_key(command)
	}

	/// Command names in sorted order.
	pub fn names(&self) -> Vec<String> {
		let mut names: Vec<String> = self.entries.keys().cloned().collect();
		names.sort();
		names
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Whether `command` can run now.
	///
	/// A command with an enabler is enabled only if the enabler yields
	/// `true`; failures count as disabled. Without an enabler a command is
	/// enabled iff it has a handler.
	pub fn is_enabled(&self, command: &str) -> bool {
		let Some(entry) = self.entries.get(command) else {
			return false;
		};
		let Some(enabler) = &entry.enabler else {
			return entry.handler.is_some();
		};
		match enabler.invoke::<bool>() {
			Ok(Some(enabled)) => *enabled,
			Ok(None) => false,
			Err(error) => {
				warn!(command, %error, "enabler failed, treating command as disabled");
				false
			}
		}
	}

	/// Runs the handler of `command` and returns its result.
	pub fn execute(&self, command: &str) -> Result<Option<Value>, DispatchError> {
		let entry = self
			.entries
			.get(command)
			.ok_or_else(|| DispatchError::UnknownCommand(command.to_string()))?;
		let handler = entry
			.handler
			.as_ref()
			.ok_or_else(|| DispatchError::NoHandler(command.to_string()))?;
		debug!(command, handler = %handler.qualified_name(), "executing command");
		Ok(handler.invoke_value()?)
	}
}

//! Handler stack scanning.
//!
//! A scan walks the [`HandlerStack`] in priority order and binds every
//! classified method. Handlers and enablers land in the returned
//! [`CommandTable`], later handlers replacing earlier ones per command name
//! and role. Listeners are attached to an [`EventAdapter`] or, when no
//! adapter understands the event, to the [`DocumentEventDispatcher`] under a
//! document event name.

use std::sync::Arc;

use folio_invocation::{ArgumentResolver, BuiltinSuppliers, Invoker};
use tracing::{debug, trace, warn};

use crate::commands::CommandTable;
use crate::events::{DocumentEventDispatcher, EventAdapters};
use crate::handler::{HandlerStack, MethodDescriptor};
use crate::naming::{DocumentEventNaming, MethodRole, NamingConvention, PrefixEventNaming};

/// Where a scan binds what it finds.
pub struct ScanTargets<'a> {
	pub resolver: Arc<ArgumentResolver>,
	pub adapters: &'a EventAdapters,
	pub document_events: &'a DocumentEventDispatcher,
	/// Suppliers re-registered before every invocation of a bound method.
	pub builtins: Option<BuiltinSuppliers>,
}

/// Classifies handler methods and binds them.
pub struct CommandScanner {
	naming: NamingConvention,
	events: Arc<dyn DocumentEventNaming>,
	strict: bool,
}

impl Default for CommandScanner {
	fn default() -> Self {
		Self::new(NamingConvention::default(), Arc::new(PrefixEventNaming::default()))
	}
}

impl CommandScanner {
	pub fn new(naming: NamingConvention, events: Arc<dyn DocumentEventNaming>) -> Self {
		Self {
			naming,
			events,
			strict: false,
		}
	}

	/// Makes bound invokers fail on unresolved parameters.
	pub fn strict(mut self, strict: bool) -> Self {
		self.strict = strict;
		self
	}

	pub fn naming(&self) -> &NamingConvention {
		&self.naming
	}

	pub fn document_event_naming(&self) -> &Arc<dyn DocumentEventNaming> {
		&self.events
	}

	/// Scans `handlers` and returns the command table.
	///
	/// Listeners bound by a previous scan are detached first.
	pub fn scan(&self, handlers: &HandlerStack, targets: &ScanTargets<'_>) -> CommandTable {
		targets.adapters.detach_all();
		targets.document_events.clear();

		let mut table = CommandTable::new();
		for handler in handlers.iter() {
			let owner = handler.handler_name().to_string();
			for method in handler.clone().methods() {
				let Some(role) = self.naming.classify(&method) else {
					trace!(handler = %owner, method = method.name(), "not a command method");
					continue;
				};
				let invoker = Arc::new(self.bind(&owner, &method, targets));
				match role {
					MethodRole::Handler { command } => {
						if let Some(previous) = table.set_handler(command.as_str(), invoker) {
							debug!(%command, overridden = %previous.qualified_name(), by = %owner, "handler overridden");
						}
					}
					MethodRole::Enabler { command } => {
						if let Some(previous) = table.set_enabler(command.as_str(), invoker) {
							debug!(%command, overridden = %previous.qualified_name(), by = %owner, "enabler overridden");
						}
					}
					MethodRole::Listener { target, event } => {
						let exact = method.marker().is_some();
						self.attach(target.as_deref(), &event, exact, invoker, targets);
					}
				}
			}
		}

		debug!(handlers = handlers.len(), commands = table.len(), "handler stack scanned");
		table
	}

	fn bind(&self, owner: &str, method: &MethodDescriptor, targets: &ScanTargets<'_>) -> Invoker {
		Invoker::new(method.callable().clone(), targets.resolver.clone())
			.with_owner(owner)
			.with_builtins(targets.builtins.clone())
			.strict(self.strict)
	}

	/// Attaches a listener. Marker-declared events (`exact`) are matched by
	/// their declared spelling only.
	fn attach(&self, target: Option<&str>, event: &str, exact: bool, invoker: Arc<Invoker>, targets: &ScanTargets<'_>) {
		let adapters = targets.adapters;
		if let Some(target) = target {
			let Some(component) = adapters.component(target) else {
				warn!(target, event, listener = %invoker.qualified_name(), "unknown listener target, skipped");
				return;
			};
			let matched = if exact {
				component.understands(event).then(|| event.to_string())
			} else {
				EventAdapters::event_variant(component.as_ref(), event)
			};
			match matched {
				Some(event) => {
					trace!(component = component.component_name(), %event, "listener attached");
					component.attach_listener(&event, invoker);
				}
				None => warn!(
					component = component.component_name(),
					event,
					listener = %invoker.qualified_name(),
					"component does not emit this event, listener skipped"
				),
			}
			return;
		}

		let found = if exact {
			adapters.first_understanding_exact(event)
		} else {
			adapters.first_understanding(event)
		};
		if let Some((adapter, event)) = found {
			trace!(component = adapter.component_name(), %event, "listener attached");
			adapter.attach_listener(&event, invoker);
			return;
		}

		let name = if exact {
			event.to_string()
		} else {
			self.events.document_event_name(event)
		};
		trace!(event = %name, "document event listener attached");
		targets.document_events.add_listener(name, invoker);
	}
}

#[cfg(test)]
mod tests;

//! Method classification by naming convention.

use std::sync::LazyLock;

use regex::Regex;

use crate::handler::{MethodDescriptor, MethodMarker};

/// Default prefix of command names.
pub const DEFAULT_COMMAND_PREFIX: &str = "cmd";

/// Default prefix of document (non-toolkit) event names.
pub const DEFAULT_DOCUMENT_EVENT_PREFIX: &str = "evt";

static METHOD_PATTERN: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^(enable|handle|on)(\p{Lu}[\p{L}\p{N}_]*)$").expect("method naming pattern"));

/// What a method does once classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodRole {
	Handler { command: String },
	Enabler { command: String },
	/// `event` is as written; the scanner normalizes it against adapters.
	Listener { target: Option<String>, event: String },
}

/// Maps method names to roles: `handleX`/`enableX` to command `<prefix>X`,
/// `onX` and `onTarget_X` to listeners.
#[derive(Debug, Clone)]
pub struct NamingConvention {
	command_prefix: String,
}

impl Default for NamingConvention {
	fn default() -> Self {
		Self::new(DEFAULT_COMMAND_PREFIX)
	}
}

impl NamingConvention {
	pub fn new(command_prefix: impl Into<String>) -> Self {
		Self {
			command_prefix: command_prefix.into(),
		}
	}

	pub fn command_prefix(&self) -> &str {
		&self.command_prefix
	}

	pub fn command_name(&self, suffix: &str) -> String {
		format!("{}{suffix}", self.command_prefix)
	}

	/// Classifies `method`; an explicit marker takes precedence over the name.
	pub fn classify(&self, method: &MethodDescriptor) -> Option<MethodRole> {
		if let Some(marker) = method.marker() {
			return Some(match marker {
				MethodMarker::Handles(command) => MethodRole::Handler { command: command.clone() },
				MethodMarker::Enables(command) => MethodRole::Enabler { command: command.clone() },
				MethodMarker::Listens { target, event } => MethodRole::Listener {
					target: target.clone(),
					event: event.clone(),
				},
			});
		}
		self.classify_name(method.name())
	}

	pub fn classify_name(&self, name: &str) -> Option<MethodRole> {
		let caps = METHOD_PATTERN.captures(name)?;
		let suffix = caps.get(2)?.as_str();
		match caps.get(1)?.as_str() {
			"handle" => Some(MethodRole::Handler {
				command: self.command_name(suffix),
			}),
			"enable" => Some(MethodRole::Enabler {
				command: self.command_name(suffix),
			}),
			_ => Some(match suffix.split_once('_') {
				Some((target, event)) if !target.is_empty() && !event.is_empty() => MethodRole::Listener {
					target: Some(target.to_string()),
					event: event.to_string(),
				},
				_ => MethodRole::Listener {
					target: None,
					event: suffix.to_string(),
				},
			}),
		}
	}
}

/// Names events that no toolkit adapter understands.
pub trait DocumentEventNaming: Send + Sync {
	/// The document event name for a listener suffix like `Saved`.
	fn document_event_name(&self, event: &str) -> String;

	/// Whether `event` is already a document event name.
	fn is_document_event(&self, event: &str) -> bool;
}

/// Prefixes document events, `Saved` becoming `evtSaved`.
#[derive(Debug, Clone)]
pub struct PrefixEventNaming {
	prefix: String,
}

impl Default for PrefixEventNaming {
	fn default() -> Self {
		Self::new(DEFAULT_DOCUMENT_EVENT_PREFIX)
	}
}

impl PrefixEventNaming {
	pub fn new(prefix: impl Into<String>) -> Self {
		Self { prefix: prefix.into() }
	}
}

impl DocumentEventNaming for PrefixEventNaming {
	fn document_event_name(&self, event: &str) -> String {
		if self.is_document_event(event) {
			return event.to_string();
		}
		format!("{}{}", self.prefix, upper_first(event))
	}

	fn is_document_event(&self, event: &str) -> bool {
		event
			.strip_prefix(self.prefix.as_str())
			.and_then(|rest| rest.chars().next())
			.is_some_and(char::is_uppercase)
	}
}

pub(crate) fn upper_first(s: &str) -> String {
	let mut chars = s.chars();
	match chars.next() {
		Some(first) => first.to_uppercase().chain(chars).collect(),
		None => String::new(),
	}
}

pub(crate) fn lower_first(s: &str) -> String {
	let mut chars = s.chars();
	match chars.next() {
		Some(first) => first.to_lowercase().chain(chars).collect(),
		None => String::new(),
	}
}

/// `s` with its first letter lowered and raised, deduplicated.
pub(crate) fn case_variants(s: &str) -> Vec<String> {
	let mut variants = vec![s.to_string()];
	for v in [lower_first(s), upper_first(s)] {
		if !variants.contains(&v) {
			variants.push(v);
		}
	}
	variants
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn handle_and_enable_map_to_commands() {
		let naming = NamingConvention::default();
		assert_eq!(
			naming.classify_name("handleSave"),
			Some(MethodRole::Handler { command: "cmdSave".into() })
		);
		assert_eq!(
			naming.classify_name("enableSaveAs"),
			Some(MethodRole::Enabler { command: "cmdSaveAs".into() })
		);
	}

	#[test]
	fn on_prefix_maps_to_listeners() {
		let naming = NamingConvention::default();
		assert_eq!(
			naming.classify_name("onMouseMoved"),
			Some(MethodRole::Listener {
				target: None,
				event: "MouseMoved".into()
			})
		);
		assert_eq!(
			naming.classify_name("onSaveButton_actionPerformed"),
			Some(MethodRole::Listener {
				target: Some("SaveButton".into()),
				event: "actionPerformed".into()
			})
		);
	}

	#[test]
	fn lowercase_suffix_is_not_a_match() {
		let naming = NamingConvention::default();
		assert_eq!(naming.classify_name("online"), None);
		assert_eq!(naming.classify_name("handler"), None);
		assert_eq!(naming.classify_name("save"), None);
	}

	#[test]
	fn custom_command_prefix() {
		let naming = NamingConvention::new("do");
		assert_eq!(
			naming.classify_name("handlePrint"),
			Some(MethodRole::Handler { command: "doPrint".into() })
		);
	}

	#[test]
	fn document_event_names_are_prefixed_once() {
		let naming = PrefixEventNaming::default();
		assert_eq!(naming.document_event_name("Saved"), "evtSaved");
		assert_eq!(naming.document_event_name("saved"), "evtSaved");
		assert_eq!(naming.document_event_name("evtSaved"), "evtSaved");
		assert!(!naming.is_document_event("event"));
	}
}

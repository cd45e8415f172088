//! Validated invocation of callables.
//!
//! [`Invoker::invoke`] resolves every parameter first and refuses to call the
//! target when a required one is missing. Unresolved parameters are collected
//! and reported together, one log entry each, so a single failed attempt
//! carries the full diagnostic picture.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use folio_primitives::{TypeKey, Value};
use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::callable::{Args, CallError, Callable};
use crate::resolver::{ArgumentResolver, Resolution};
use crate::supplier::SupplierRegistry;

/// Re-registers framework-provided suppliers before each invocation.
pub type BuiltinSuppliers = Arc<dyn Fn(&SupplierRegistry) + Send + Sync>;

/// A required parameter nothing could resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedParam {
	pub index: usize,
	pub name: String,
	pub ty: TypeKey,
}

impl fmt::Display for UnresolvedParam {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "#{} {}: {}", self.index, self.name, self.ty)
	}
}

/// Invocation failure.
#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
	/// Strict mode only; lenient invokers return `Ok(None)` instead.
	#[error("cannot invoke {callable}: {} unresolved parameter(s)", params.len())]
	Unresolved { callable: String, params: Vec<UnresolvedParam> },
	/// The returned value is not of the type the caller expected.
	#[error("{callable} returned a value that is not a {expected} (declared {declared})")]
	ReturnType {
		callable: String,
		expected: &'static str,
		declared: &'static str,
	},
	/// The target itself failed.
	#[error("{callable} failed")]
	Target {
		callable: String,
		#[source]
		source: CallError,
	},
}

/// Binds a [`Callable`] to the [`ArgumentResolver`].
pub struct Invoker {
	callable: Callable,
	owner: Option<String>,
	resolver: Arc<ArgumentResolver>,
	builtins: Option<BuiltinSuppliers>,
	strict: bool,
	unresolved: Mutex<Vec<UnresolvedParam>>,
}

impl Invoker {
	pub fn new(callable: Callable, resolver: Arc<ArgumentResolver>) -> Self {
		Self {
			callable,
			owner: None,
			resolver,
			builtins: None,
			strict: false,
			unresolved: Mutex::new(Vec::new()),
		}
	}

	/// Names the handler object the callable belongs to, for diagnostics.
	pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
		self.owner = Some(owner.into());
		self
	}

	pub fn with_builtins(mut self, builtins: Option<BuiltinSuppliers>) -> Self {
		self.builtins = builtins;
		self
	}

	/// In strict mode unresolved parameters are an error instead of a null result.
	pub fn strict(mut self, strict: bool) -> Self {
		self.strict = strict;
		self
	}

	pub fn callable(&self) -> &Callable {
		&self.callable
	}

	pub fn owner(&self) -> Option<&str> {
		self.owner.as_deref()
	}

	/// Parameters left unresolved by the most recent invocation attempt.
	pub fn unresolved(&self) -> Vec<UnresolvedParam> {
		self.unresolved.lock().clone()
	}

	/// `owner.callable` for log lines.
	pub fn qualified_name(&self) -> String {
		match &self.owner {
			Some(owner) => format!("{owner}.{}", self.callable.name()),
			None => self.callable.name().to_string(),
		}
	}

	/// Invokes expecting a result of type `R`.
	///
	/// Returns `Ok(None)` for a null result, or for unresolved parameters in
	/// lenient mode. A non-null result of another type is
	/// [`InvokeError::ReturnType`].
	pub fn invoke<R: Any + Send + Sync>(&self) -> Result<Option<Arc<R>>, InvokeError> {
		let Some(value) = self.invoke_value()? else {
			return Ok(None);
		};
		value.downcast::<R>().map(Some).map_err(|_| InvokeError::ReturnType {
			callable: self.qualified_name(),
			expected: std::any::type_name::<R>(),
			declared: self.callable.returns().name(),
		})
	}

	/// Invokes accepting any result.
	pub fn invoke_value(&self) -> Result<Option<Value>, InvokeError> {
		if let Some(builtins) = &self.builtins {
			builtins(self.resolver.suppliers());
		}
		self.unresolved.lock().clear();

		let name = self.qualified_name();
		let mut values = Vec::with_capacity(self.callable.params().len());
		let mut unresolved = Vec::new();
		for param in self.callable.params() {
			match self.resolver.resolve(&name, param) {
				Resolution::Resolved(value) => values.push(value),
				Resolution::Unresolved => {
					unresolved.push(UnresolvedParam {
						index: param.index(),
						name: self.resolver.parameter_name(&name, param).text,
						ty: param.ty(),
					});
					values.push(None);
				}
			}
		}

		if !unresolved.is_empty() {
			for param in &unresolved {
				warn!(
					callable = %name,
					index = param.index,
					param = %param.name,
					ty = %param.ty,
					"unresolved parameter, invocation refused"
				);
			}
			*self.unresolved.lock() = unresolved.clone();
			if self.strict {
				return Err(InvokeError::Unresolved {
					callable: name,
					params: unresolved,
				});
			}
			return Ok(None);
		}

		trace!(callable = %name, args = values.len(), "invoking");
		self.callable
			.call(&Args::new(values))
			.map_err(|source| InvokeError::Target { callable: name, source })
	}

	/// Invokes accepting any result and routes a non-null result through
	/// `handlers`. Returns `true` if some handler consumed it.
	pub fn invoke_routed(&self, handlers: &ResultHandlers) -> Result<bool, InvokeError> {
		match self.invoke_value()? {
			Some(value) => Ok(handlers.dispatch(value)),
			None => Ok(false),
		}
	}
}

impl fmt::Debug for Invoker {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Invoker")
			.field("callable", &self.qualified_name())
			.field("strict", &self.strict)
			.finish()
	}
}

type Sink = Box<dyn Fn(Value) + Send + Sync>;

/// Result consumers keyed by the runtime type they accept.
///
/// The first handler whose type matches the result wins. Otherwise the
/// result goes to the catch-all handler, if one was declared, and then to the
/// default consumer.
#[derive(Default)]
pub struct ResultHandlers {
	typed: Vec<(TypeKey, Sink)>,
	any: Option<Sink>,
	fallback: Option<Sink>,
}

impl ResultHandlers {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn on<T, F>(mut self, handler: F) -> Self
	where
		T: Any + Send + Sync,
		F: Fn(Arc<T>) + Send + Sync + 'static,
	{
		let sink: Sink = Box::new(move |value: Value| {
			if let Ok(v) = value.downcast::<T>() {
				handler(v);
			}
		});
		self.typed.push((TypeKey::of::<T>(), sink));
		self
	}

	/// Catch-all handler declared for any type.
	pub fn on_any<F>(mut self, handler: F) -> Self
	where
		F: Fn(Value) + Send + Sync + 'static,
	{
		self.any = Some(Box::new(handler));
		self
	}

	/// Consumer for results no other handler takes.
	pub fn or_else<F>(mut self, consumer: F) -> Self
	where
		F: Fn(Value) + Send + Sync + 'static,
	{
		self.fallback = Some(Box::new(consumer));
		self
	}

	pub fn dispatch(&self, value: Value) -> bool {
		if let Some((_, sink)) = self.typed.iter().find(|(ty, _)| ty.matches(&value)) {
			sink(value);
			return true;
		}
		match self.any.as_ref().or(self.fallback.as_ref()) {
			Some(sink) => {
				sink(value);
				true
			}
			None => false,
		}
	}
}

#[cfg(test)]
mod tests;

//! The argument resolution chain.
//!
//! Strategies are tried in a fixed order and the first one that reports
//! [`Resolution::Resolved`] wins, even when the resolved value is null:
//!
//! 1. the [`FrameworkAdapter`] hook, if one was supplied at construction;
//! 2. the parameter's embedded expression, evaluated by the container;
//! 3. type-based lookup in the delegate container;
//! 4. the session's fallback [`SupplierRegistry`].

use std::fmt;
use std::sync::Arc;

use folio_primitives::{BeanContainer, BeanList, Value};
use tracing::{debug, trace, warn};

use crate::naming::{ParamName, ParameterNameDiscoverer};
use crate::param::ParamDesc;
use crate::supplier::SupplierRegistry;

/// Outcome of resolving one parameter.
///
/// `Resolved(None)` is a legitimate null answer and stops the chain;
/// `Unresolved` lets the next strategy try.
#[derive(Clone)]
pub enum Resolution {
	Resolved(Option<Value>),
	Unresolved,
}

impl Resolution {
	/// A resolved null.
	pub fn null() -> Self {
		Self::Resolved(None)
	}

	pub fn is_resolved(&self) -> bool {
		matches!(self, Self::Resolved(_))
	}

	/// The resolved value, flattening null and unresolved to `None`.
	pub fn into_value(self) -> Option<Value> {
		match self {
			Self::Resolved(v) => v,
			Self::Unresolved => None,
		}
	}
}

impl fmt::Debug for Resolution {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Resolved(Some(_)) => f.write_str("Resolved(<value>)"),
			Self::Resolved(None) => f.write_str("Resolved(null)"),
			Self::Unresolved => f.write_str("Unresolved"),
		}
	}
}

/// Hook that bridges resolution to an embedding application framework.
///
/// Gets first refusal on every parameter.
pub trait FrameworkAdapter: Send + Sync {
	fn resolve(&self, callable: &str, param: &ParamDesc) -> Resolution;
}

/// Supplies runtime values for declared parameters.
pub struct ArgumentResolver {
	adapter: Option<Arc<dyn FrameworkAdapter>>,
	container: Arc<dyn BeanContainer>,
	names: Option<Arc<dyn ParameterNameDiscoverer>>,
	suppliers: Arc<SupplierRegistry>,
}

impl ArgumentResolver {
	pub fn new(container: Arc<dyn BeanContainer>) -> Self {
		Self {
			adapter: None,
			container,
			names: None,
			suppliers: Arc::new(SupplierRegistry::new()),
		}
	}

	pub fn with_adapter(mut self, adapter: Arc<dyn FrameworkAdapter>) -> Self {
		self.adapter = Some(adapter);
		self
	}

	pub fn with_name_discoverer(mut self, names: Arc<dyn ParameterNameDiscoverer>) -> Self {
		self.names = Some(names);
		self
	}

	pub fn with_suppliers(mut self, suppliers: Arc<SupplierRegistry>) -> Self {
		self.suppliers = suppliers;
		self
	}

	pub fn suppliers(&self) -> &Arc<SupplierRegistry> {
		&self.suppliers
	}

	pub fn container(&self) -> &Arc<dyn BeanContainer> {
		&self.container
	}

	pub fn parameter_name(&self, callable: &str, param: &ParamDesc) -> ParamName {
		ParamName::resolve(callable, param, self.names.as_deref())
	}

	/// Resolves `param` of `callable`.
	///
	/// An optional parameter that nothing resolves comes back as a resolved
	/// null so it never blocks invocation.
	pub fn resolve(&self, callable: &str, param: &ParamDesc) -> Resolution {
		let resolution = self.resolve_chain(callable, param);
		if !resolution.is_resolved() && param.is_optional() {
			trace!(callable, index = param.index(), ty = %param.ty(), "optional parameter unresolved, passing null");
			return Resolution::null();
		}
		resolution
	}

	fn resolve_chain(&self, callable: &str, param: &ParamDesc) -> Resolution {
		if let Some(adapter) = &self.adapter {
			let resolution = adapter.resolve(callable, param);
			if resolution.is_resolved() {
				trace!(callable, index = param.index(), "resolved by framework adapter");
				return resolution;
			}
		}

		if let Some(expression) = param.expression_marker() {
			return self.resolve_expression(callable, param, expression);
		}

		let resolution = self.resolve_by_type(callable, param);
		if resolution.is_resolved() {
			return resolution;
		}

		self.suppliers.resolve(param)
	}

	/// An expression marker always resolves; a failed evaluation yields null.
	fn resolve_expression(&self, callable: &str, param: &ParamDesc, expression: &str) -> Resolution {
		match self.container.evaluate(expression) {
			Ok(value) => {
				trace!(callable, index = param.index(), expression, "resolved by expression");
				Resolution::Resolved(value)
			}
			Err(error) => {
				warn!(callable, index = param.index(), expression, %error, "expression evaluation failed, passing null");
				Resolution::null()
			}
		}
	}

	fn resolve_by_type(&self, callable: &str, param: &ParamDesc) -> Resolution {
		let candidates = self.container.beans_of_type(param.ty());

		if param.is_variadic() {
			trace!(callable, index = param.index(), matches = candidates.len(), "variadic lookup");
			let values = candidates.into_iter().map(|b| b.value).collect();
			return Resolution::Resolved(Some(Arc::new(BeanList::new(values))));
		}

		match candidates.len() {
			0 => Resolution::Unresolved,
			1 => Resolution::Resolved(candidates.into_iter().next().map(|b| b.value)),
			_ => {
				let name = self.parameter_name(callable, param);
				let chosen = if name.synthetic {
					None
				} else {
					candidates.iter().find(|b| b.name == name.text)
				};
				match chosen {
					Some(bean) => Resolution::Resolved(Some(bean.value.clone())),
					None => {
						debug!(
							callable,
							param = %name,
							ty = %param.ty(),
							candidates = ?candidates.iter().map(|b| b.name.as_str()).collect::<Vec<_>>(),
							"ambiguous bean lookup, no candidate matches the parameter name"
						);
						Resolution::Unresolved
					}
				}
			}
		}
	}
}

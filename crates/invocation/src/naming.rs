//! Parameter naming.
//!
//! Names matter twice: in diagnostics, and when several beans of the
//! parameter's type exist and one has to be picked by name.

use std::fmt;

use crate::param::ParamDesc;

/// Pluggable discovery of parameter names the declaration did not carry.
pub trait ParameterNameDiscoverer: Send + Sync {
	fn parameter_name(&self, callable: &str, param: &ParamDesc) -> Option<String>;
}

/// A parameter name and whether it was made up for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamName {
	pub text: String,
	pub synthetic: bool,
}

impl ParamName {
	/// Resolves a name by priority: qualifier, discoverer, declared name,
	/// then a synthetic `arg{index}` placeholder.
	pub fn resolve(callable: &str, param: &ParamDesc, discoverer: Option<&dyn ParameterNameDiscoverer>) -> Self {
		let real = param
			.qualifier_marker()
			.map(str::to_string)
			.or_else(|| discoverer.and_then(|d| d.parameter_name(callable, param)))
			.or_else(|| param.declared_name().map(str::to_string));

		match real {
			Some(text) => Self { text, synthetic: false },
			None => Self {
				text: format!("arg{}", param.index()),
				synthetic: true,
			},
		}
	}
}

impl fmt::Display for ParamName {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.text)
	}
}

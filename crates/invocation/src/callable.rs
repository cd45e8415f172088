//! Callables with a literal parameter list.
//!
//! A [`Callable`] pairs a parameter description list with a body that
//! receives the resolved values as [`Args`]. Handler objects describe their
//! methods this way instead of being inspected at runtime.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use folio_primitives::{BeanList, TypeKey, Value};

use crate::param::ParamDesc;

/// What a callable stands for. Only used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallableKind {
	/// A method bound to a handler object.
	Method,
	/// Creates a new object.
	Constructor,
	/// A free-standing function.
	Direct,
}

/// Error raised by a callable body.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
	#[error("argument {index} is null")]
	MissingArgument { index: usize },
	#[error("argument {index} is not a {expected}")]
	ArgumentType { index: usize, expected: &'static str },
	#[error(transparent)]
	Failed(#[from] anyhow::Error),
}

type Body = dyn Fn(&Args) -> Result<Option<Value>, CallError> + Send + Sync;

/// A named callable with declared parameters and return type.
#[derive(Clone)]
pub struct Callable {
	name: String,
	kind: CallableKind,
	params: Vec<ParamDesc>,
	returns: TypeKey,
	body: Arc<Body>,
}

impl Callable {
	pub fn method(name: impl Into<String>) -> CallableBuilder {
		CallableBuilder::new(name.into(), CallableKind::Method)
	}

	pub fn constructor(name: impl Into<String>) -> CallableBuilder {
		CallableBuilder::new(name.into(), CallableKind::Constructor)
	}

	pub fn direct(name: impl Into<String>) -> CallableBuilder {
		CallableBuilder::new(name.into(), CallableKind::Direct)
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn kind(&self) -> CallableKind {
		self.kind
	}

	pub fn params(&self) -> &[ParamDesc] {
		&self.params
	}

	/// Declared return type; `()` when the body returns nothing.
	pub fn returns(&self) -> TypeKey {
		self.returns
	}

	/// Runs the body with already resolved arguments.
	pub fn call(&self, args: &Args) -> Result<Option<Value>, CallError> {
		(self.body)(args)
	}
}

impl fmt::Debug for Callable {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Callable")
			.field("name", &self.name)
			.field("kind", &self.kind)
			.field("params", &self.params.len())
			.field("returns", &self.returns)
			.finish()
	}
}

/// Builds a [`Callable`]; parameter indices follow declaration order.
pub struct CallableBuilder {
	name: String,
	kind: CallableKind,
	params: Vec<ParamDesc>,
}

impl CallableBuilder {
	fn new(name: String, kind: CallableKind) -> Self {
		Self {
			name,
			kind,
			params: Vec::new(),
		}
	}

	pub fn param(mut self, param: ParamDesc) -> Self {
		let index = self.params.len();
		self.params.push(param.at(index));
		self
	}

	/// Finishes with a body that returns nothing.
	pub fn run<F>(self, body: F) -> Callable
	where
		F: Fn(&Args) -> Result<(), CallError> + Send + Sync + 'static,
	{
		self.finish(TypeKey::of::<()>(), Arc::new(move |args: &Args| body(args).map(|()| None::<Value>)))
	}

	/// Finishes with a body returning an optional `R`.
	pub fn returning<R, F>(self, body: F) -> Callable
	where
		R: Any + Send + Sync,
		F: Fn(&Args) -> Result<Option<R>, CallError> + Send + Sync + 'static,
	{
		self.finish(
			TypeKey::of::<R>(),
			Arc::new(move |args: &Args| body(args).map(|r| r.map(|v| Arc::new(v) as Value))),
		)
	}

	/// Finishes with an untyped body. The value it returns is checked against
	/// the caller's expected type at invocation, not against `returns`.
	pub fn returning_value<F>(self, returns: TypeKey, body: F) -> Callable
	where
		F: Fn(&Args) -> Result<Option<Value>, CallError> + Send + Sync + 'static,
	{
		self.finish(returns, Arc::new(body))
	}

	fn finish(self, returns: TypeKey, body: Arc<Body>) -> Callable {
		Callable {
			name: self.name,
			kind: self.kind,
			params: self.params,
			returns,
			body,
		}
	}
}

/// Resolved argument values, indexed like the declared parameters.
pub struct Args {
	values: Vec<Option<Value>>,
}

impl Args {
	pub fn new(values: Vec<Option<Value>>) -> Self {
		Self { values }
	}

	pub fn len(&self) -> usize {
		self.values.len()
	}

	pub fn is_empty(&self) -> bool {
		self.values.is_empty()
	}

	/// The raw value at `index`; `None` for null or out of range.
	pub fn raw(&self, index: usize) -> Option<&Value> {
		self.values.get(index).and_then(Option::as_ref)
	}

	/// Required argument of type `T`.
	pub fn get<T: Any + Send + Sync>(&self, index: usize) -> Result<Arc<T>, CallError> {
		self.opt(index)?.ok_or(CallError::MissingArgument { index })
	}

	/// Argument of type `T` that may be null.
	pub fn opt<T: Any + Send + Sync>(&self, index: usize) -> Result<Option<Arc<T>>, CallError> {
		match self.raw(index) {
			None => Ok(None),
			Some(v) => v.clone().downcast::<T>().map(Some).map_err(|_| CallError::ArgumentType {
				index,
				expected: std::any::type_name::<T>(),
			}),
		}
	}

	/// Every element of a variadic argument, downcast to `T`.
	pub fn all<T: Any + Send + Sync>(&self, index: usize) -> Result<Vec<Arc<T>>, CallError> {
		Ok(self.get::<BeanList>(index)?.downcast_all::<T>())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn builder_indexes_parameters_in_order() {
		let callable = Callable::method("handleMerge")
			.param(ParamDesc::of::<String>("left"))
			.param(ParamDesc::of::<String>("right"))
			.run(|_| Ok(()));

		let indices: Vec<usize> = callable.params().iter().map(ParamDesc::index).collect();
		assert_eq!(indices, vec![0, 1]);
		assert_eq!(callable.returns(), TypeKey::of::<()>());
	}

	#[test]
	fn args_report_type_mismatch() {
		let args = Args::new(vec![Some(Arc::new(1u8) as Value), None]);
		assert_eq!(*args.get::<u8>(0).unwrap(), 1);
		assert!(matches!(args.get::<u16>(0), Err(CallError::ArgumentType { index: 0, .. })));
		assert!(matches!(args.get::<u8>(1), Err(CallError::MissingArgument { index: 1 })));
		assert!(args.opt::<u8>(1).unwrap().is_none());
	}

	#[test]
	fn returning_boxes_the_result() {
		let callable = Callable::direct("answer").returning(|_| Ok(Some(42u32)));
		let out = callable.call(&Args::new(Vec::new())).unwrap().unwrap();
		assert_eq!(*out.downcast::<u32>().unwrap(), 42);
	}
}

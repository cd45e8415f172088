//! Declared parameters of a callable.

use std::any::Any;

use folio_primitives::TypeKey;

/// Metadata attached to a parameter declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Marker {
	/// Evaluate this expression instead of looking the parameter up by type.
	Expression(String),
	/// Explicit name hint, used for naming and bean disambiguation.
	Qualifier(String),
}

/// Describes one formal parameter of a callable.
///
/// For variadic parameters `ty` is the element type; the resolved value is a
/// [`folio_primitives::BeanList`].
#[derive(Debug, Clone)]
pub struct ParamDesc {
	index: usize,
	name: Option<String>,
	ty: TypeKey,
	variadic: bool,
	optional: bool,
	markers: Vec<Marker>,
}

impl ParamDesc {
	/// A required parameter of type `T`.
	pub fn of<T: Any + Send + Sync>(name: impl Into<String>) -> Self {
		Self::with_type(TypeKey::of::<T>(), Some(name.into()))
	}

	/// A required parameter of type `T` that carries no declared name.
	pub fn unnamed<T: Any + Send + Sync>() -> Self {
		Self::with_type(TypeKey::of::<T>(), None)
	}

	/// A variadic parameter collecting every bean of type `T`.
	pub fn all<T: Any + Send + Sync>(name: impl Into<String>) -> Self {
		Self {
			variadic: true,
			..Self::with_type(TypeKey::of::<T>(), Some(name.into()))
		}
	}

	pub fn with_type(ty: TypeKey, name: Option<String>) -> Self {
		Self {
			index: 0,
			name,
			ty,
			variadic: false,
			optional: false,
			markers: Vec::new(),
		}
	}

	/// Marks the parameter optional: when nothing resolves it, null is passed.
	pub fn optional(mut self) -> Self {
		self.optional = true;
		self
	}

	/// Attaches an embedded expression.
	pub fn expression(mut self, expression: impl Into<String>) -> Self {
		self.markers.push(Marker::Expression(expression.into()));
		self
	}

	/// Attaches a qualifier name hint.
	pub fn qualifier(mut self, name: impl Into<String>) -> Self {
		self.markers.push(Marker::Qualifier(name.into()));
		self
	}

	pub(crate) fn at(mut self, index: usize) -> Self {
		self.index = index;
		self
	}

	pub fn index(&self) -> usize {
		self.index
	}

	/// The name as declared, if the declaration kept one.
	pub fn declared_name(&self) -> Option<&str> {
		self.name.as_deref()
	}

	pub fn ty(&self) -> TypeKey {
		self.ty
	}

	pub fn is_variadic(&self) -> bool {
		self.variadic
	}

	pub fn is_optional(&self) -> bool {
		self.optional
	}

	pub fn markers(&self) -> &[Marker] {
		&self.markers
	}

	pub fn expression_marker(&self) -> Option<&str> {
		self.markers.iter().find_map(|m| match m {
			Marker::Expression(e) => Some(e.as_str()),
			Marker::Qualifier(_) => None,
		})
	}

	pub fn qualifier_marker(&self) -> Option<&str> {
		self.markers.iter().find_map(|m| match m {
			Marker::Qualifier(q) => Some(q.as_str()),
			Marker::Expression(_) => None,
		})
	}
}

//! Core types shared by every folio crate: type keys, type-erased values,
//! document identifiers, and the delegate bean container contract.

/// Delegate bean container contract and an in-memory implementation.
pub mod container;
/// Embedded expression evaluation (`${property}` and `#{bean}`).
pub mod expr;
/// Identifier types for document scopes.
pub mod ids;
/// Type keys and type-erased values.
pub mod value;

pub use container::{BeanContainer, BeanDefinition, DOCUMENT_SCOPE, MemoryContainer, NamedBean};
pub use expr::ExpressionError;
pub use ids::DocumentId;
pub use value::{BeanList, TypeKey, Value, value};

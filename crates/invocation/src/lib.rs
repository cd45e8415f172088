//! Argument resolution and invocation for handler callables.
//!
//! Every entry point that runs user code (command handlers, enablers, event
//! listeners, constructors) goes through an [`Invoker`]. The invoker asks the
//! [`ArgumentResolver`] for a value per declared parameter and only calls the
//! target once every required parameter resolved.

pub mod callable;
pub mod invoker;
pub mod naming;
pub mod param;
pub mod resolver;
pub mod supplier;

pub use callable::{Args, CallError, Callable, CallableBuilder, CallableKind};
pub use invoker::{BuiltinSuppliers, InvokeError, Invoker, ResultHandlers, UnresolvedParam};
pub use naming::{ParamName, ParameterNameDiscoverer};
pub use param::{Marker, ParamDesc};
pub use resolver::{ArgumentResolver, FrameworkAdapter, Resolution};
pub use supplier::{SupplierFn, SupplierKey, SupplierRegistry, TransientGuard};

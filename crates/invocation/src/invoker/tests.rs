use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use folio_primitives::MemoryContainer;
use pretty_assertions::assert_eq;

use super::*;
use crate::param::ParamDesc;

fn resolver(container: MemoryContainer) -> Arc<ArgumentResolver> {
	Arc::new(ArgumentResolver::new(Arc::new(container)))
}

fn open_file() -> Callable {
	Callable::method("handleOpen")
		.param(ParamDesc::of::<PathBuf>("file"))
		.returning(|args| Ok(Some(args.get::<PathBuf>(0)?.display().to_string())))
}

#[test]
fn unresolved_parameter_refuses_invocation() {
	let calls = Arc::new(AtomicUsize::new(0));
	let counter = calls.clone();
	let callable = Callable::method("handleOpen")
		.param(ParamDesc::of::<PathBuf>("file"))
		.run(move |_| {
			counter.fetch_add(1, Ordering::SeqCst);
			Ok(())
		});
	let invoker = Invoker::new(callable, resolver(MemoryContainer::new()));

	assert!(invoker.invoke_value().unwrap().is_none());
	assert_eq!(calls.load(Ordering::SeqCst), 0);
	assert_eq!(
		invoker.unresolved(),
		vec![UnresolvedParam {
			index: 0,
			name: "file".into(),
			ty: TypeKey::of::<PathBuf>(),
		}]
	);
}

#[test]
fn strict_mode_raises_unresolved() {
	let invoker = Invoker::new(open_file(), resolver(MemoryContainer::new())).strict(true);
	match invoker.invoke::<String>() {
		Err(InvokeError::Unresolved { params, .. }) => assert_eq!(params.len(), 1),
		other => panic!("expected unresolved error, got {other:?}"),
	}
}

#[test]
fn unresolved_list_is_cleared_on_success() {
	let container = Arc::new(MemoryContainer::new());
	let invoker = Invoker::new(open_file(), Arc::new(ArgumentResolver::new(container.clone())));
	assert!(invoker.invoke::<String>().unwrap().is_none());
	assert_eq!(invoker.unresolved().len(), 1);

	container.register_bean("file", PathBuf::from("/tmp/a.txt"));
	assert_eq!(*invoker.invoke::<String>().unwrap().unwrap(), "/tmp/a.txt");
	assert!(invoker.unresolved().is_empty());
}

#[test]
fn return_type_mismatch_is_an_error() {
	let container = MemoryContainer::new();
	container.register_bean("file", PathBuf::from("/tmp/a.txt"));
	let invoker = Invoker::new(open_file(), resolver(container)).with_owner("Model");

	match invoker.invoke::<bool>() {
		Err(InvokeError::ReturnType { callable, expected, .. }) => {
			assert_eq!(callable, "Model.handleOpen");
			assert_eq!(expected, "bool");
		}
		other => panic!("expected return type error, got {other:?}"),
	}
}

#[test]
fn target_failure_is_wrapped() {
	let callable = Callable::method("handleExplode").run(|_| Err(anyhow::anyhow!("boom").into()));
	let invoker = Invoker::new(callable, resolver(MemoryContainer::new()));
	assert!(matches!(invoker.invoke_value(), Err(InvokeError::Target { .. })));
}

#[test]
fn builtins_are_registered_before_resolution() {
	struct Session(u32);

	let registrations = Arc::new(AtomicUsize::new(0));
	let seen = registrations.clone();
	let builtins: BuiltinSuppliers = Arc::new(move |suppliers: &SupplierRegistry| {
		seen.fetch_add(1, Ordering::SeqCst);
		suppliers.register_exact(|| Some(Arc::new(Session(7))));
	});
	let callable = Callable::method("handleInfo")
		.param(ParamDesc::of::<Session>("session"))
		.returning(|args| Ok(Some(args.get::<Session>(0)?.0)));
	let resolver = resolver(MemoryContainer::new());
	let invoker = Invoker::new(callable, resolver.clone()).with_builtins(Some(builtins));

	assert_eq!(*invoker.invoke::<u32>().unwrap().unwrap(), 7);
	assert_eq!(*invoker.invoke::<u32>().unwrap().unwrap(), 7);
	assert_eq!(registrations.load(Ordering::SeqCst), 2);
	assert_eq!(resolver.suppliers().len(), 1);
}

#[test]
fn routed_results_go_to_the_matching_handler() {
	let strings = Arc::new(AtomicUsize::new(0));
	let others = Arc::new(AtomicUsize::new(0));
	let (s, o) = (strings.clone(), others.clone());
	let handlers = ResultHandlers::new()
		.on::<String, _>(move |_| {
			s.fetch_add(1, Ordering::SeqCst);
		})
		.or_else(move |_| {
			o.fetch_add(1, Ordering::SeqCst);
		});

	let text = Invoker::new(
		Callable::direct("text").returning(|_| Ok(Some(String::from("x")))),
		resolver(MemoryContainer::new()),
	);
	let number = Invoker::new(
		Callable::direct("number").returning(|_| Ok(Some(1u8))),
		resolver(MemoryContainer::new()),
	);
	let nothing = Invoker::new(
		Callable::direct("nothing").returning(|_| Ok(None::<u8>)),
		resolver(MemoryContainer::new()),
	);

	assert!(text.invoke_routed(&handlers).unwrap());
	assert!(number.invoke_routed(&handlers).unwrap());
	assert!(!nothing.invoke_routed(&handlers).unwrap());
	assert_eq!(strings.load(Ordering::SeqCst), 1);
	assert_eq!(others.load(Ordering::SeqCst), 1);
}

#[test]
fn optional_parameter_does_not_block() {
	let callable = Callable::method("handlePrint")
		.param(ParamDesc::of::<PathBuf>("file").optional())
		.returning(|args| Ok(Some(args.opt::<PathBuf>(0)?.is_none())));
	let invoker = Invoker::new(callable, resolver(MemoryContainer::new()));
	assert!(*invoker.invoke::<bool>().unwrap().unwrap());
}

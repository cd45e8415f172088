use std::sync::atomic::{AtomicUsize, Ordering};

use folio_invocation::{Callable, ParamDesc};
use folio_primitives::MemoryContainer;
use pretty_assertions::assert_eq;

use super::*;
use crate::events::{ComponentAdapter, DocumentEvent, EventAdapter};
use crate::handler::Handler;

/// Handler whose methods all return the handler's name.
struct Named {
	name: &'static str,
	methods: Vec<&'static str>,
}

impl Named {
	fn new(name: &'static str, methods: &[&'static str]) -> Arc<Self> {
		Arc::new(Self {
			name,
			methods: methods.to_vec(),
		})
	}
}

impl Handler for Named {
	fn handler_name(&self) -> &str {
		self.name
	}

	fn methods(self: Arc<Self>) -> Vec<MethodDescriptor> {
		self.methods
			.iter()
			.map(|method| {
				let owner = self.name;
				MethodDescriptor::from(Callable::method(*method).returning(move |_| Ok(Some(owner.to_string()))))
			})
			.collect()
	}
}

struct Fixture {
	resolver: Arc<ArgumentResolver>,
	adapters: EventAdapters,
	documents: DocumentEventDispatcher,
}

impl Fixture {
	fn new() -> Self {
		let resolver = Arc::new(ArgumentResolver::new(Arc::new(MemoryContainer::new())));
		let documents = DocumentEventDispatcher::new(resolver.suppliers().clone());
		Self {
			resolver,
			adapters: EventAdapters::new(),
			documents,
		}
	}

	fn targets(&self) -> ScanTargets<'_> {
		ScanTargets {
			resolver: self.resolver.clone(),
			adapters: &self.adapters,
			document_events: &self.documents,
			builtins: None,
		}
	}

	fn scan(&self, handlers: &HandlerStack) -> CommandTable {
		CommandScanner::default().scan(handlers, &self.targets())
	}
}

fn stack(handlers: &[Arc<dyn Handler>]) -> HandlerStack {
	let mut stack = HandlerStack::new();
	for handler in handlers {
		stack.push(handler.clone());
	}
	stack
}

fn run(table: &CommandTable, command: &str) -> String {
	let value = table.execute(command).unwrap().unwrap();
	value.downcast::<String>().unwrap().to_string()
}

#[test]
fn later_handlers_override_earlier_ones() {
	let fixture = Fixture::new();
	let handlers = stack(&[
		Named::new("Base", &["handleSave", "handleQuit"]),
		Named::new("Model", &["handleOpen"]),
		Named::new("Controller", &["handleSave"]),
	]);

	let table = fixture.scan(&handlers);
	assert_eq!(table.names(), vec!["cmdOpen", "cmdQuit", "cmdSave"]);
	assert_eq!(run(&table, "cmdSave"), "Controller");
	assert_eq!(run(&table, "cmdQuit"), "Base");
	assert_eq!(run(&table, "cmdOpen"), "Model");
}

#[test]
fn handler_without_enabler_is_enabled_until_removed() {
	let fixture = Fixture::new();
	let builtins: Arc<dyn Handler> = Named::new("Builtins", &["handleUndo"]);
	let model: Arc<dyn Handler> = Named::new("M", &["handleSave"]);
	let mut handlers = stack(&[builtins, model.clone()]);

	assert!(fixture.scan(&handlers).is_enabled("cmdSave"));

	handlers.remove(&model);
	let table = fixture.scan(&handlers);
	assert!(!table.is_enabled("cmdSave"));
	assert!(table.is_enabled("cmdUndo"));
}

#[test]
fn enabler_decides_availability() {
	struct Toggle;

	impl Handler for Toggle {
		fn methods(self: Arc<Self>) -> Vec<MethodDescriptor> {
			vec![
				MethodDescriptor::from(Callable::method("handlePrint").run(|_| Ok(()))),
				MethodDescriptor::from(Callable::method("enablePrint").returning(|_| Ok(Some(false)))),
				MethodDescriptor::from(Callable::method("enableExport").returning(|_| Ok(Some(true)))),
			]
		}
	}

	let fixture = Fixture::new();
	let table = fixture.scan(&stack(&[Arc::new(Toggle)]));
	assert!(!table.is_enabled("cmdPrint"));
	// An enabler alone may enable a command nothing handles.
	assert!(table.is_enabled("cmdExport"));
	assert!(matches!(table.execute("cmdExport"), Err(crate::DispatchError::NoHandler(_))));
	assert!(matches!(table.execute("cmdNope"), Err(crate::DispatchError::UnknownCommand(_))));
}

#[test]
fn markers_take_precedence_over_names() {
	struct Marked;

	impl Handler for Marked {
		fn methods(self: Arc<Self>) -> Vec<MethodDescriptor> {
			vec![
				MethodDescriptor::new(Callable::method("saveEverything").returning(|_| Ok(Some(String::from("all")))))
					.handles("cmdSaveAll"),
				MethodDescriptor::new(Callable::method("handleRevert").run(|_| Ok(()))).handles("cmdRestore"),
			]
		}
	}

	let fixture = Fixture::new();
	let table = fixture.scan(&stack(&[Arc::new(Marked)]));
	assert_eq!(table.names(), vec!["cmdRestore", "cmdSaveAll"]);
	assert_eq!(run(&table, "cmdSaveAll"), "all");
}

struct Listeners {
	hits: Arc<AtomicUsize>,
	events: Arc<parking_lot::Mutex<Vec<String>>>,
}

impl Handler for Listeners {
	fn methods(self: Arc<Self>) -> Vec<MethodDescriptor> {
		let counted = |name: &'static str| {
			let hits = self.hits.clone();
			MethodDescriptor::from(Callable::method(name).run(move |_| {
				hits.fetch_add(1, Ordering::SeqCst);
				Ok(())
			}))
		};
		let events = self.events.clone();
		vec![
			counted("onSaveButton_actionPerformed"),
			counted("onMouseMoved"),
			counted("onMissing_click"),
			counted("onSaveButton_resized"),
			MethodDescriptor::from(
				Callable::method("onSaved")
					.param(ParamDesc::of::<DocumentEvent>("event"))
					.run(move |args| {
						events.lock().push(args.get::<DocumentEvent>(0)?.name.clone());
						Ok(())
					}),
			),
		]
	}
}

#[test]
fn listeners_bind_to_components_or_document_events() {
	let fixture = Fixture::new();
	let button = Arc::new(ComponentAdapter::new("saveButton", ["actionPerformed"]));
	let editor = Arc::new(ComponentAdapter::new("editor", ["mouseMoved", "keyTyped"]));
	fixture.adapters.register(button.clone());
	fixture.adapters.register(editor.clone());

	let listeners = Arc::new(Listeners {
		hits: Arc::new(AtomicUsize::new(0)),
		events: Arc::default(),
	});
	let handlers = stack(&[listeners.clone()]);
	let table = fixture.scan(&handlers);
	assert!(table.is_empty());

	assert_eq!(button.listener_count("actionPerformed"), 1);
	assert_eq!(editor.listener_count("mouseMoved"), 1);
	assert_eq!(fixture.documents.event_names(), vec!["evtSaved"]);

	assert_eq!(button.fire("actionPerformed").unwrap(), 1);
	assert_eq!(editor.fire("mouseMoved").unwrap(), 1);
	assert_eq!(listeners.hits.load(Ordering::SeqCst), 2);

	assert_eq!(fixture.documents.fire("evtSaved", None).unwrap(), 1);
	assert_eq!(*listeners.events.lock(), vec!["evtSaved".to_string()]);
}

#[test]
fn rescanning_replaces_listeners() {
	let fixture = Fixture::new();
	let editor = Arc::new(ComponentAdapter::new("editor", ["mouseMoved"]));
	fixture.adapters.register(editor.clone());
	let handlers = stack(&[Arc::new(Listeners {
		hits: Arc::default(),
		events: Arc::default(),
	})]);

	fixture.scan(&handlers);
	fixture.scan(&handlers);
	assert_eq!(editor.listener_count("mouseMoved"), 1);
	assert_eq!(fixture.documents.listener_count("evtSaved"), 1);
	assert!(editor.understands("mouseMoved"));
}

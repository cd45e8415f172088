use std::sync::atomic::AtomicUsize;

use folio_invocation::{Callable, ParamDesc};
use folio_primitives::MemoryContainer;
use folio_registry::{ComponentAdapter, DocumentEvent, MethodDescriptor};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

use super::*;

fn session_with(container: &Arc<MemoryContainer>) -> Arc<DocumentSession> {
	DocumentSession::new(
		DocumentId::next(),
		container.clone(),
		&ScopeOptions::default(),
		Arc::new(CommandScanner::default()),
		&[],
		Weak::new(),
	)
}

struct Toolbar;

impl Handler for Toolbar {
	fn handler_name(&self) -> &str {
		"Toolbar"
	}

	fn methods(self: Arc<Self>) -> Vec<MethodDescriptor> {
		vec![MethodDescriptor::from(Callable::method("handleBold").run(|_| Ok(())))]
	}
}

struct Model {
	toolbar: Arc<Toolbar>,
	saves: AtomicUsize,
}

impl Model {
	fn new(toolbar: Arc<Toolbar>) -> Arc<Self> {
		Arc::new(Self {
			toolbar,
			saves: AtomicUsize::new(0),
		})
	}
}

impl Handler for Model {
	fn handler_name(&self) -> &str {
		"Model"
	}

	fn methods(self: Arc<Self>) -> Vec<MethodDescriptor> {
		vec![MethodDescriptor::from(Callable::method("handleSave").run(move |_| {
			self.saves.fetch_add(1, Ordering::SeqCst);
			Ok(())
		}))]
	}

	fn embedded_handlers(&self) -> Vec<Arc<dyn Handler>> {
		vec![self.toolbar.clone()]
	}
}

#[test]
fn set_model_installs_bean_handler_and_embedded_handlers() {
	let container = Arc::new(MemoryContainer::new());
	let processed = Arc::new(Mutex::new(Vec::new()));
	let seen = processed.clone();
	container.add_post_processor(Arc::new(move |name: &str, _: &Value| seen.lock().push(name.to_string())));
	let session = session_with(&container);

	let toolbar = Arc::new(Toolbar);
	let model = Model::new(toolbar.clone());
	session.set_model(model.clone());
	session.set_controller(Model::new(toolbar));

	assert_eq!(session.handlers().names(), vec!["Model", "Toolbar", "Model"]);
	assert_eq!(*processed.lock(), vec!["model", "controller"]);
	assert!(Arc::ptr_eq(&session.model::<Model>().unwrap(), &model));
	assert_eq!(session.bean_names(), vec![MODEL_BEAN, CONTROLLER_BEAN]);

	session.execute("cmdSave").unwrap();
	assert_eq!(model.saves.load(Ordering::SeqCst), 0, "controller overrides the model");
	assert!(session.is_enabled("cmdBold"));
}

#[test]
fn replacing_the_model_drops_the_old_handler() {
	let container = Arc::new(MemoryContainer::new());
	let session = session_with(&container);
	let first = Model::new(Arc::new(Toolbar));
	let second = Model::new(Arc::new(Toolbar));

	session.set_model(first.clone());
	session.set_model(second.clone());
	session.execute("cmdSave").unwrap();

	assert_eq!(first.saves.load(Ordering::SeqCst), 0);
	assert_eq!(second.saves.load(Ordering::SeqCst), 1);
	assert_eq!(session.bean_names(), vec![MODEL_BEAN]);
}

#[test]
fn command_table_follows_handler_changes() {
	let container = Arc::new(MemoryContainer::new());
	let session = session_with(&container);
	let model: Arc<dyn Handler> = Model::new(Arc::new(Toolbar));

	assert!(!session.is_enabled("cmdSave"));
	assert!(session.add_handler(model.clone()));
	assert!(!session.add_handler(model.clone()));
	assert!(session.is_enabled("cmdSave"));

	assert!(session.remove_handler(&model));
	assert!(!session.is_enabled("cmdSave"));
}

#[test]
fn builtin_suppliers_expose_session_objects() {
	struct Inspector;

	impl Handler for Inspector {
		fn methods(self: Arc<Self>) -> Vec<MethodDescriptor> {
			vec![MethodDescriptor::from(
				Callable::method("handleInspect")
					.param(ParamDesc::of::<DocumentSession>("session"))
					.param(ParamDesc::of::<UndoCoordinator>("undo"))
					.param(ParamDesc::of::<DocumentId>("id"))
					.returning(|args| {
						let session = args.get::<DocumentSession>(0)?;
						let undo = args.get::<UndoCoordinator>(1)?;
						let id = args.get::<DocumentId>(2)?;
						Ok(Some(session.id() == *id && Arc::ptr_eq(session.undo(), &undo)))
					}),
			)]
		}
	}

	let container = Arc::new(MemoryContainer::new());
	let session = session_with(&container);
	session.add_handler(Arc::new(Inspector));

	let result = session.execute("cmdInspect").unwrap().unwrap();
	assert!(*result.downcast::<bool>().unwrap());
}

#[test]
fn beans_are_mirrored_only_while_attached() {
	let container = Arc::new(MemoryContainer::new());
	let session = session_with(&container);
	session.insert_bean("selection", Arc::new(String::from("1:4")));
	assert!(container.scoped_names(DOCUMENT_SCOPE).is_empty());

	session.attach();
	assert!(session.is_active());
	assert_eq!(container.scoped_names(DOCUMENT_SCOPE), vec!["selection"]);

	session.insert_bean("zoom", Arc::new(1.5f32));
	assert_eq!(container.scoped_names(DOCUMENT_SCOPE), vec!["selection", "zoom"]);
	session.remove_bean("selection");
	assert_eq!(container.scoped_names(DOCUMENT_SCOPE), vec!["zoom"]);

	session.detach();
	assert!(container.scoped_names(DOCUMENT_SCOPE).is_empty());
	assert_eq!(*session.bean_as::<f32>("zoom").unwrap(), 1.5);
	assert_eq!(container.scoped_collisions(), 0);
}

#[test]
fn document_events_reach_listeners_with_payload() {
	struct Watcher {
		seen: Mutex<Vec<(String, Option<String>)>>,
	}

	impl Handler for Watcher {
		fn methods(self: Arc<Self>) -> Vec<MethodDescriptor> {
			vec![MethodDescriptor::from(
				Callable::method("onSaved")
					.param(ParamDesc::of::<DocumentEvent>("event"))
					.run(move |args| {
						let event = args.get::<DocumentEvent>(0)?;
						let payload = event
							.payload
							.clone()
							.and_then(|p| p.downcast::<String>().ok())
							.map(|p| p.to_string());
						self.seen.lock().push((event.name.clone(), payload));
						Ok(())
					}),
			)]
		}
	}

	let container = Arc::new(MemoryContainer::new());
	let session = session_with(&container);
	let watcher = Arc::new(Watcher { seen: Mutex::new(Vec::new()) });
	session.add_handler(watcher.clone());

	assert_eq!(session.fire_document_event("Saved", Some(Arc::new(String::from("a.txt")))).unwrap(), 1);
	assert_eq!(session.fire_document_event("evtSaved", None).unwrap(), 1);
	assert_eq!(session.fire_document_event("Closed", None).unwrap(), 0);
	assert_eq!(
		*watcher.seen.lock(),
		vec![("evtSaved".to_string(), Some("a.txt".to_string())), ("evtSaved".to_string(), None)]
	);
}

#[test]
fn adapters_registered_later_are_bound_on_rescan() {
	struct Clicker(AtomicUsize);

	impl Handler for Clicker {
		fn methods(self: Arc<Self>) -> Vec<MethodDescriptor> {
			vec![MethodDescriptor::from(Callable::method("onOkButton_clicked").run(move |_| {
				self.0.fetch_add(1, Ordering::SeqCst);
				Ok(())
			}))]
		}
	}

	let container = Arc::new(MemoryContainer::new());
	let session = session_with(&container);
	let clicker = Arc::new(Clicker(AtomicUsize::new(0)));
	session.add_handler(clicker.clone());
	session.command_table();

	let button = Arc::new(ComponentAdapter::new("okButton", ["clicked"]));
	session.register_event_adapter(button.clone());
	session.command_table();

	assert_eq!(button.fire("clicked").unwrap(), 1);
	assert_eq!(clicker.0.load(Ordering::SeqCst), 1);
}

#[test]
fn disposed_session_refuses_commands() {
	let container = Arc::new(MemoryContainer::new());
	let session = session_with(&container);
	session.set_model(Model::new(Arc::new(Toolbar)));
	session.undo().add_edit(Arc::new(crate::undo::FnEdit::new("x", || Ok(()), || Ok(())))).unwrap();

	session.dispose();
	assert!(session.is_disposed());
	assert!(!session.is_enabled("cmdSave"));
	assert!(matches!(session.execute("cmdSave"), Err(DispatchError::UnknownCommand(_))));
	assert!(session.bean_names().is_empty());
	assert!(!session.undo().can_undo());
}

#[test]
fn handler_code_may_read_commands_during_a_scan() {
	struct Peeker {
		session: Mutex<Weak<DocumentSession>>,
		seen: Mutex<Vec<bool>>,
	}

	impl Handler for Peeker {
		fn methods(self: Arc<Self>) -> Vec<MethodDescriptor> {
			if let Some(session) = self.session.lock().upgrade() {
				self.seen.lock().push(session.is_enabled("cmdPeek"));
			}
			vec![MethodDescriptor::from(Callable::method("handlePeek").run(|_| Ok(())))]
		}
	}

	let container = Arc::new(MemoryContainer::new());
	let session = session_with(&container);
	let peeker = Arc::new(Peeker {
		session: Mutex::new(Arc::downgrade(&session)),
		seen: Mutex::new(Vec::new()),
	});
	session.add_handler(peeker.clone());

	assert!(session.is_enabled("cmdPeek"));
	assert_eq!(*peeker.seen.lock(), vec![false]);

	session.add_handler(Model::new(Arc::new(Toolbar)));
	assert!(session.is_enabled("cmdSave"));
	assert_eq!(*peeker.seen.lock(), vec![false, true]);
}

//! Command-aware undo coordination.
//!
//! The [`UndoCoordinator`] keeps one undo stack per document. High level
//! "change commands" run under a suppression guard: any edit reported while
//! a change command executes is a side effect of it and never reaches the
//! stack. The coordinator also answers whether the document changed since
//! the last checkpoint (save or open).
//!
//! Timestamps come from a logical clock owned by the coordinator. Each
//! stacked edit remembers the last-change timestamp from before it ran, so
//! undoing it restores the previous dirty state exactly.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap as HashMap;
use thiserror::Error;
use tracing::{debug, trace};

use crate::config::DEFAULT_UNDO_LIMIT;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum UndoError {
	#[error("nothing to undo")]
	CannotUndo,
	#[error("nothing to redo")]
	CannotRedo,
	#[error("edit `{name}` failed")]
	Edit {
		name: String,
		#[source]
		source: BoxError,
	},
}

/// A reversible change.
///
/// Edits use interior mutability; the coordinator only holds shared handles.
pub trait UndoableEdit: Send + Sync {
	/// Short description shown as "Undo <name>".
	fn presentation_name(&self) -> String;

	fn undo(&self) -> anyhow::Result<()>;

	fn redo(&self) -> anyhow::Result<()>;

	/// Change commands run under the suppression guard.
	fn is_change_command(&self) -> bool {
		false
	}

	/// Runs once when a change command is added, under the guard.
	fn added(&self) -> anyhow::Result<()> {
		self.redo()
	}
}

type Action = Box<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

/// An edit built from a pair of closures.
pub struct FnEdit {
	name: String,
	undo: Action,
	redo: Action,
	change_command: bool,
}

impl FnEdit {
	pub fn new<U, R>(name: impl Into<String>, undo: U, redo: R) -> Self
	where
		U: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
		R: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
	{
		Self {
			name: name.into(),
			undo: Box::new(undo),
			redo: Box::new(redo),
			change_command: false,
		}
	}

	/// A change command; `redo` performs the change when it is added.
	pub fn change_command<U, R>(name: impl Into<String>, undo: U, redo: R) -> Self
	where
		U: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
		R: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
	{
		Self {
			change_command: true,
			..Self::new(name, undo, redo)
		}
	}
}

impl UndoableEdit for FnEdit {
	fn presentation_name(&self) -> String {
		self.name.clone()
	}

	fn undo(&self) -> anyhow::Result<()> {
		(self.undo)()
	}

	fn redo(&self) -> anyhow::Result<()> {
		(self.redo)()
	}

	fn is_change_command(&self) -> bool {
		self.change_command
	}
}

/// Edits undone and redone as one unit.
///
/// A compound holding a change command is itself a change command, so its
/// children's side effects stay off the stack on undo and redo.
pub struct CompoundEdit {
	name: String,
	edits: Vec<Arc<dyn UndoableEdit>>,
	change_command: bool,
}

impl CompoundEdit {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			edits: Vec::new(),
			change_command: false,
		}
	}

	pub fn push(&mut self, edit: Arc<dyn UndoableEdit>) {
		self.change_command |= edit.is_change_command();
		self.edits.push(edit);
	}

	pub fn len(&self) -> usize {
		self.edits.len()
	}

	pub fn is_empty(&self) -> bool {
		self.edits.is_empty()
	}
}

impl UndoableEdit for CompoundEdit {
	fn presentation_name(&self) -> String {
		if !self.name.is_empty() {
			return self.name.clone();
		}
		self.edits.last().map(|e| e.presentation_name()).unwrap_or_default()
	}

	fn undo(&self) -> anyhow::Result<()> {
		self.edits.iter().rev().try_for_each(|e| e.undo())
	}

	fn redo(&self) -> anyhow::Result<()> {
		self.edits.iter().try_for_each(|e| e.redo())
	}

	fn is_change_command(&self) -> bool {
		self.change_command
	}
}

/// What [`UndoCoordinator::add_edit`] did with an edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
	/// Pushed onto the stack.
	Added,
	/// Collected into the open edit group.
	Grouped,
	/// Discarded as a side effect of a running change command.
	Suppressed,
}

type EditId = u64;

struct Record {
	id: EditId,
	edit: Arc<dyn UndoableEdit>,
}

struct OpenGroup {
	depth: usize,
	edit: CompoundEdit,
	/// Last change before the group's first edit.
	before: Option<u64>,
}

struct UndoState {
	edits: Vec<Record>,
	/// Number of edits currently applied; `edits[cursor..]` are redoable.
	cursor: usize,
	limit: usize,
	clock: u64,
	next_id: EditId,
	last_change: Option<u64>,
	last_checkpoint: u64,
	/// Last-change timestamp from before each stacked edit ran.
	before: HashMap<EditId, Option<u64>>,
	group: Option<OpenGroup>,
}

impl UndoState {
	fn tick(&mut self) -> u64 {
		self.clock += 1;
		self.clock
	}

	fn push(&mut self, edit: Arc<dyn UndoableEdit>, before: Option<u64>) {
		for dropped in self.edits.drain(self.cursor..) {
			self.before.remove(&dropped.id);
		}
		let id = self.next_id;
		self.next_id += 1;
		self.before.insert(id, before);
		self.edits.push(Record { id, edit });
		self.cursor = self.edits.len();
		self.trim();
	}

	/// Evicts edits beyond the limit, oldest undoable first, then the
	/// furthest redoable.
	fn trim(&mut self) {
		if self.limit == 0 {
			return;
		}
		while self.edits.len() > self.limit {
			let dropped = if self.cursor > 0 {
				self.cursor -= 1;
				self.edits.remove(0)
			} else {
				match self.edits.pop() {
					Some(record) => record,
					None => break,
				}
			};
			self.before.remove(&dropped.id);
			trace!(edit = %dropped.edit.presentation_name(), "undo stack trimmed");
		}
	}
}

/// Undo/redo stack with change-command suppression and dirty tracking.
pub struct UndoCoordinator {
	in_change_command: AtomicBool,
	state: Mutex<UndoState>,
}

impl Default for UndoCoordinator {
	fn default() -> Self {
		Self::new(DEFAULT_UNDO_LIMIT)
	}
}

impl UndoCoordinator {
	/// `limit` of `0` means unbounded.
	pub fn new(limit: usize) -> Self {
		Self {
			in_change_command: AtomicBool::new(false),
			state: Mutex::new(UndoState {
				edits: Vec::new(),
				cursor: 0,
				limit,
				clock: 0,
				next_id: 0,
				last_change: None,
				last_checkpoint: 0,
				before: HashMap::default(),
				group: None,
			}),
		}
	}

	/// Reports an edit.
	///
	/// Inside a running change command the edit is discarded. A change
	/// command is first run under the guard so the edits it triggers are
	/// discarded too.
	pub fn add_edit(&self, edit: Arc<dyn UndoableEdit>) -> Result<AddOutcome, UndoError> {
		if self.in_change_command.load(Ordering::Acquire) {
			trace!(edit = %edit.presentation_name(), "edit suppressed inside change command");
			return Ok(AddOutcome::Suppressed);
		}
		if edit.is_change_command() {
			self.guarded(edit.as_ref(), |e| e.added())?;
		}

		let mut state = self.state.lock();
		let before = state.last_change;
		let now = state.tick();
		state.last_change = Some(now);
		if let Some(group) = state.group.as_mut() {
			group.edit.push(edit);
			return Ok(AddOutcome::Grouped);
		}
		trace!(edit = %edit.presentation_name(), "edit added");
		state.push(edit, before);
		Ok(AddOutcome::Added)
	}

	pub fn undo(&self) -> Result<(), UndoError> {
		let record = {
			let state = self.state.lock();
			if state.cursor == 0 {
				return Err(UndoError::CannotUndo);
			}
			let record = &state.edits[state.cursor - 1];
			(record.id, record.edit.clone())
		};
		let (id, edit) = record;
		self.run(edit.as_ref(), |e| e.undo())?;

		let mut state = self.state.lock();
		if let Some(pos) = state.edits.iter().position(|r| r.id == id) {
			state.cursor = pos;
		}
		state.last_change = state.before.get(&id).copied().flatten();
		debug!(edit = %edit.presentation_name(), "undone");
		Ok(())
	}

	pub fn redo(&self) -> Result<(), UndoError> {
		let (id, edit) = {
			let state = self.state.lock();
			let record = state.edits.get(state.cursor).ok_or(UndoError::CannotRedo)?;
			(record.id, record.edit.clone())
		};
		self.run(edit.as_ref(), |e| e.redo())?;

		let mut state = self.state.lock();
		if let Some(pos) = state.edits.iter().position(|r| r.id == id) {
			state.cursor = pos + 1;
		}
		let before = state.last_change;
		state.before.insert(id, before);
		let now = state.tick();
		state.last_change = Some(now);
		debug!(edit = %edit.presentation_name(), "redone");
		Ok(())
	}

	/// Marks now as the save/open point.
	///
	/// Undoable edits get their pre-edit timestamp moved past the
	/// checkpoint, so undoing across it still reads as a change.
	pub fn checkpoint(&self) {
		let mut state = self.state.lock();
		let now = state.tick();
		state.last_checkpoint = now;
		let after = state.tick();
		let applied: Vec<EditId> = state.edits[..state.cursor].iter().map(|r| r.id).collect();
		for id in applied {
			state.before.insert(id, Some(after));
		}
		trace!(checkpoint = now, "undo checkpoint");
	}

	pub fn changes_have_occurred_since_last_checkpoint(&self) -> bool {
		let state = self.state.lock();
		state.last_change.is_some_and(|t| t > state.last_checkpoint)
	}

	/// Checkpoints, then forgets every edit.
	pub fn discard_all_edits(&self) {
		self.checkpoint();
		let mut state = self.state.lock();
		state.edits.clear();
		state.before.clear();
		state.cursor = 0;
		state.group = None;
		debug!("undo history discarded");
	}

	pub fn can_undo(&self) -> bool {
		self.state.lock().cursor > 0
	}

	pub fn can_redo(&self) -> bool {
		let state = self.state.lock();
		state.cursor < state.edits.len()
	}

	pub fn undo_presentation_name(&self) -> String {
		let state = self.state.lock();
		let name = state.cursor.checked_sub(1).map(|i| state.edits[i].edit.presentation_name());
		presentation("Undo", name)
	}

	pub fn redo_presentation_name(&self) -> String {
		let state = self.state.lock();
		let name = state.edits.get(state.cursor).map(|r| r.edit.presentation_name());
		presentation("Redo", name)
	}

	pub fn limit(&self) -> usize {
		self.state.lock().limit
	}

	/// Changes the capacity, trimming right away. `0` means unbounded.
	pub fn set_limit(&self, limit: usize) {
		let mut state = self.state.lock();
		state.limit = limit;
		state.trim();
	}

	/// Number of edits on the stack, undoable and redoable.
	pub fn edit_count(&self) -> usize {
		self.state.lock().edits.len()
	}

	/// Number of pre-edit timestamps held.
	pub fn tracked_timestamps(&self) -> usize {
		self.state.lock().before.len()
	}

	pub fn is_in_change_command(&self) -> bool {
		self.in_change_command.load(Ordering::Acquire)
	}

	/// Opens an edit group; edits added until the matching
	/// [`end_group`](Self::end_group) undo as one. Groups nest.
	pub fn begin_group(&self, name: impl Into<String>) {
		let mut state = self.state.lock();
		if let Some(group) = state.group.as_mut() {
			group.depth += 1;
			return;
		}
		let before = state.last_change;
		state.group = Some(OpenGroup {
			depth: 1,
			edit: CompoundEdit::new(name),
			before,
		});
	}

	/// Closes the innermost group. Closing the outermost one stacks the
	/// collected edits; returns `true` if anything was stacked.
	pub fn end_group(&self) -> bool {
		let mut state = self.state.lock();
		let Some(group) = state.group.as_mut() else {
			return false;
		};
		group.depth -= 1;
		if group.depth > 0 {
			return false;
		}
		let Some(group) = state.group.take() else {
			return false;
		};
		if group.edit.is_empty() {
			return false;
		}
		trace!(edits = group.edit.len(), "edit group closed");
		state.push(Arc::new(group.edit), group.before);
		true
	}

	/// Runs `action` under the guard for change commands, directly otherwise.
	fn run(&self, edit: &dyn UndoableEdit, action: impl FnOnce(&dyn UndoableEdit) -> anyhow::Result<()>) -> Result<(), UndoError> {
		if edit.is_change_command() {
			return self.guarded(edit, action);
		}
		action(edit).map_err(|error| edit_error(edit, error))
	}

	fn guarded(&self, edit: &dyn UndoableEdit, action: impl FnOnce(&dyn UndoableEdit) -> anyhow::Result<()>) -> Result<(), UndoError> {
		let _guard = ChangeCommandGuard::enter(&self.in_change_command);
		action(edit).map_err(|error| edit_error(edit, error))
	}
}

fn edit_error(edit: &dyn UndoableEdit, error: anyhow::Error) -> UndoError {
	UndoError::Edit {
		name: edit.presentation_name(),
		source: error.into(),
	}
}

fn presentation(verb: &str, name: Option<String>) -> String {
	match name {
		Some(name) if !name.is_empty() => format!("{verb} {name}"),
		_ => verb.to_string(),
	}
}

/// Holds the change-command flag; restores the previous value on drop.
struct ChangeCommandGuard<'a> {
	flag: &'a AtomicBool,
	previous: bool,
}

impl<'a> ChangeCommandGuard<'a> {
	fn enter(flag: &'a AtomicBool) -> Self {
		let previous = flag.swap(true, Ordering::AcqRel);
		Self { flag, previous }
	}
}

impl Drop for ChangeCommandGuard<'_> {
	fn drop(&mut self) {
		self.flag.store(self.previous, Ordering::Release);
	}
}

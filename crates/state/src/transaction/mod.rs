//! The transaction contract observed by the engine.
//!
//! The engine does not model document edits itself; it observes a
//! transaction's change flags (did the document change, was the
//! selection set, is a reconfiguration attached) plus the state the
//! transaction starts from. Producing the next state evaluates every
//! dynamic slot at most once.

use crate::error::StateError;
use crate::extension::Extension;
use crate::state::EditorState;

/// A description of one state transition.
#[derive(Clone)]
pub struct Transaction {
	start: EditorState,
	doc_changed: bool,
	selection_set: bool,
	reconfigure: Option<Extension>,
}

impl Transaction {
	/// Creates an empty transaction starting from `start`.
	pub fn new(start: EditorState) -> Self {
		Self {
			start,
			doc_changed: false,
			selection_set: false,
			reconfigure: None,
		}
	}

	/// Marks the document as changed.
	pub fn with_doc_change(mut self) -> Self {
		self.doc_changed = true;
		self
	}

	/// Marks the selection as explicitly set.
	pub fn with_selection_change(mut self) -> Self {
		self.selection_set = true;
		self
	}

	/// Attaches a full reconfiguration to this transaction.
	pub fn with_reconfigure(mut self, extension: impl Into<Extension>) -> Self {
		self.reconfigure = Some(extension.into());
		self
	}

	pub fn doc_changed(&self) -> bool {
		self.doc_changed
	}

	pub fn selection_set(&self) -> bool {
		self.selection_set
	}

	/// True when this transaction replaces the configuration.
	pub fn reconfigured(&self) -> bool {
		self.reconfigure.is_some()
	}

	/// The state this transaction starts from.
	pub fn start_state(&self) -> &EditorState {
		&self.start
	}

	/// Produces the next state.
	pub fn apply(self) -> Result<EditorState, StateError> {
		EditorState::apply_transaction(self)
	}

	pub(crate) fn reconfigure_extension(&self) -> Option<&Extension> {
		self.reconfigure.as_ref()
	}
}

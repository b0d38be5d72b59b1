//! State fields: values carried from state to state.
//!
//! A field is initialised once per state tree and updated from its
//! previous value whenever a transaction is applied. Fields can
//! additionally feed facets through [`StateField::provide`] and
//! [`StateField::provide_n`], which attach computed providers that
//! re-run only when the field itself reports a change.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::StateError;
use crate::extension::{Extension, Prec};
use crate::facet::{CompareFn, Dep, Facet, erased_cmp};
use crate::id::{Id, next_id};
use crate::state::EditorState;
use crate::transaction::Transaction;
use crate::value::DynValue;


pub(crate) type CreateFn = Arc<dyn Fn(&EditorState) -> Result<DynValue, StateError> + Send + Sync>;
pub(crate) type UpdateFn =
	Arc<dyn Fn(&DynValue, &Transaction, &EditorState) -> Result<DynValue, StateError> + Send + Sync>;

/// The identity backing a field handle.
///
/// Decorated variants produced by `provide` share the same `id` and core
/// functions; a field identity occupies exactly one slot per
/// configuration no matter how many variants decorate it.
pub(crate) struct FieldData {
	pub(crate) id: Id,
	pub(crate) create: CreateFn,
	pub(crate) update: UpdateFn,
	pub(crate) compare: CompareFn,
	/// Facet providers derived from this field, in attachment order.
	pub(crate) provides: Vec<Extension>,
}

pub(crate) type AnyField = Arc<FieldData>;

/// Definition of a state field.
///
/// `compare` defaults to referential equality of the stored cells, which
/// treats every freshly built value as changed; supply a comparison to
/// suppress no-op updates.
pub struct FieldConfig<V> {
	create: Box<dyn Fn(&EditorState) -> Result<V, StateError> + Send + Sync>,
	update: Box<dyn Fn(&V, &Transaction, &EditorState) -> Result<V, StateError> + Send + Sync>,
	compare: Option<Box<dyn Fn(&V, &V) -> bool + Send + Sync>>,
}

impl<V> FieldConfig<V> {
	pub fn new(
		create: impl Fn(&EditorState) -> Result<V, StateError> + Send + Sync + 'static,
		update: impl Fn(&V, &Transaction, &EditorState) -> Result<V, StateError>
		+ Send
		+ Sync
		+ 'static,
	) -> Self {
		Self {
			create: Box::new(create),
			update: Box::new(update),
			compare: None,
		}
	}

	/// Compares old and new values to suppress change propagation.
	pub fn compare(mut self, compare: impl Fn(&V, &V) -> bool + Send + Sync + 'static) -> Self {
		self.compare = Some(Box::new(compare));
		self
	}
}

/// A handle to a defined state field.
pub struct StateField<V> {
	data: AnyField,
	_value: PhantomData<fn() -> V>,
}

impl<V> Clone for StateField<V> {
	fn clone(&self) -> Self {
		Self { data: self.data.clone(), _value: PhantomData }
	}
}

impl<V> fmt::Debug for StateField<V> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("StateField").field("id", &self.data.id).finish()
	}
}

impl<V> StateField<V>
where
	V: Send + Sync + 'static,
{
	/// Defines a new field with an empty attached-extension list.
	pub fn define(config: FieldConfig<V>) -> Self {
		let FieldConfig { create, update, compare } = config;
		let create: CreateFn = Arc::new(move |state: &EditorState| {
			let value: DynValue = Arc::new(create(state)?);
			Ok(value)
		});
		let update: UpdateFn =
			Arc::new(move |old: &DynValue, tr: &Transaction, state: &EditorState| {
				let old = old.downcast_ref::<V>().ok_or(StateError::MissingFieldData)?;
				let value: DynValue = Arc::new(update(old, tr, state)?);
				Ok(value)
			});
		Self {
			data: Arc::new(FieldData {
				id: next_id(),
				create,
				update,
				compare: erased_cmp(compare),
				provides: Vec::new(),
			}),
			_value: PhantomData,
		}
	}

	/// Attaches a provider deriving one facet input from this field.
	///
	/// Returns a new handle sharing this field's identity. The provider
	/// inherits the precedence of wherever the field sits in the
	/// extension tree unless `prec` overrides it.
	pub fn provide<I, O>(
		&self,
		facet: &Facet<I, O>,
		get: impl Fn(&V) -> I + Send + Sync + 'static,
		prec: Option<Prec>,
	) -> Result<StateField<V>, StateError>
	where
		I: Clone + Send + Sync + 'static,
		O: Send + Sync + 'static,
	{
		let ext = facet.from_field(self, get)?;
		Ok(self.with_attached(wrap_prec(ext, prec)))
	}

	/// Attaches a provider deriving zero or more facet inputs from this field.
	pub fn provide_n<I, O>(
		&self,
		facet: &Facet<I, O>,
		get: impl Fn(&V) -> Vec<I> + Send + Sync + 'static,
		prec: Option<Prec>,
	) -> Result<StateField<V>, StateError>
	where
		I: Clone + Send + Sync + 'static,
		O: Send + Sync + 'static,
	{
		let handle = self.clone();
		let ext = facet
			.compute_n([Dep::field(self)], move |state| Ok(get(&*state.field(&handle)?)))?;
		Ok(self.with_attached(wrap_prec(ext, prec)))
	}

	fn with_attached(&self, ext: Extension) -> Self {
		let mut provides = self.data.provides.clone();
		provides.push(ext);
		Self {
			data: Arc::new(FieldData {
				id: self.data.id,
				create: self.data.create.clone(),
				update: self.data.update.clone(),
				compare: self.data.compare.clone(),
				provides,
			}),
			_value: PhantomData,
		}
	}
}

impl<V> StateField<V> {
	pub(crate) fn handle(&self) -> AnyField {
		self.data.clone()
	}

	pub(crate) fn data(&self) -> &AnyField {
		&self.data
	}
}

fn wrap_prec(ext: Extension, prec: Option<Prec>) -> Extension {
	match prec {
		Some(prec) => prec.set(ext),
		None => ext,
	}
}

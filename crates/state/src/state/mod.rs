//! Editor states and demand-driven slot evaluation.
//!
//! A state binds a [`Configuration`] to one value cell and one status
//! word per dynamic slot. Construction (from scratch, from a
//! transaction, or from a reconfiguration) fills every slot exactly
//! once, on demand: a slot's evaluator runs when something first asks
//! for its value, and its dependencies are pulled in recursively. A slot
//! observed in the `COMPUTING` state has been re-entered, which is a
//! dependency cycle.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::sync::Arc;

use crate::config::{Addr, Configuration, DynamicSlot, SlotStatus};
use crate::error::StateError;
use crate::extension::Extension;
use crate::facet::{AnyFacet, Facet, Provider, ProviderKind};
use crate::field::{AnyField, StateField};
use crate::id::Id;
use crate::transaction::Transaction;
use crate::value::DynValue;


struct SlotCell {
	value: RefCell<Option<DynValue>>,
	status: Cell<SlotStatus>,
}

impl SlotCell {
	fn new() -> Self {
		Self {
			value: RefCell::new(None),
			status: Cell::new(SlotStatus::empty()),
		}
	}
}

struct StateInner {
	config: Arc<Configuration>,
	slots: Vec<SlotCell>,
	/// The in-flight transaction; `None` outside construction.
	applying: RefCell<Option<Transaction>>,
}

/// An immutable snapshot of all field and facet values.
///
/// States are cheap to clone and never mutated after construction. They
/// are not `Sync`: one engine runs on one thread, though independent
/// engines may run on distinct threads.
#[derive(Clone)]
pub struct EditorState {
	inner: Arc<StateInner>,
}

impl EditorState {
	/// Creates a state from an extension tree.
	pub fn new(extension: impl Into<Extension>) -> Result<Self, StateError> {
		let config = Configuration::resolve(extension, None)?;
		Self::instantiate(config, None)
	}

	/// Replaces the configuration, reusing values where possible.
	pub fn reconfigure(&self, extension: impl Into<Extension>) -> Result<Self, StateError> {
		Transaction::new(self.clone()).with_reconfigure(extension).apply()
	}

	pub(crate) fn apply_transaction(tr: Transaction) -> Result<Self, StateError> {
		let config = match tr.reconfigure_extension() {
			Some(ext) => Configuration::resolve(ext.clone(), Some(tr.start_state()))?,
			None => tr.start_state().config_arc().clone(),
		};
		Self::instantiate(config, Some(tr))
	}

	fn instantiate(
		config: Arc<Configuration>,
		tr: Option<Transaction>,
	) -> Result<Self, StateError> {
		let slots = (0..config.dynamic_slots.len()).map(|_| SlotCell::new()).collect();
		let state = Self {
			inner: Arc::new(StateInner {
				config,
				slots,
				applying: RefCell::new(tr),
			}),
		};
		let outcome = state.ensure_all();
		state.inner.applying.replace(None);
		outcome?;
		Ok(state)
	}

	/// Evaluates every dynamic slot. Slots already pulled in as
	/// dependencies are not re-run.
	fn ensure_all(&self) -> Result<(), StateError> {
		for index in 0..self.inner.slots.len() {
			self.ensure_slot(index)?;
		}
		Ok(())
	}

	/// Reads a facet's aggregated output.
	///
	/// A facet with no providers in this configuration yields its
	/// default, the reduction of the empty input list.
	pub fn facet<I, O>(&self, facet: &Facet<I, O>) -> Result<Arc<O>, StateError>
	where
		I: Clone + Send + Sync + 'static,
		O: Send + Sync + 'static,
	{
		let data = facet.data();
		let value = match self.inner.config.addr_of(data.id) {
			None => data.default.clone(),
			Some(addr) => {
				self.ensure_addr(addr)?;
				self.read_addr(addr)
			}
		};
		value.downcast::<O>().map_err(|_| StateError::MissingFacetData)
	}

	/// Reads a field's value.
	pub fn field<V>(&self, field: &StateField<V>) -> Result<Arc<V>, StateError>
	where
		V: Send + Sync + 'static,
	{
		let addr = self
			.inner
			.config
			.addr_of(field.data().id)
			.ok_or(StateError::MissingField)?;
		self.ensure_addr(addr)?;
		self.read_addr(addr).downcast::<V>().map_err(|_| StateError::MissingFieldData)
	}

	/// The configuration this state is bound to.
	pub fn config(&self) -> &Configuration {
		&self.inner.config
	}

	pub(crate) fn config_arc(&self) -> &Arc<Configuration> {
		&self.inner.config
	}

	/// The fully computed value stored for `id`, if this state's
	/// configuration contains it.
	pub(crate) fn value_of(&self, id: Id) -> Option<DynValue> {
		let addr = self.inner.config.addr_of(id)?;
		Some(self.read_addr(addr))
	}

	/// Makes the slot behind `addr` current, evaluating it if needed.
	/// Static addresses are always current.
	pub(crate) fn ensure_addr(&self, addr: Addr) -> Result<SlotStatus, StateError> {
		if addr.is_static() {
			return Ok(SlotStatus::COMPUTED);
		}
		self.ensure_slot(addr.index())
	}

	/// Reads the value behind `addr` without forcing evaluation.
	pub(crate) fn read_addr(&self, addr: Addr) -> DynValue {
		if addr.is_static() {
			self.inner.config.static_values[addr.index()].clone()
		} else {
			self.inner.slots[addr.index()]
				.value
				.borrow()
				.clone()
				.expect("slot read before evaluation")
		}
	}

	fn ensure_slot(&self, index: usize) -> Result<SlotStatus, StateError> {
		let cell = &self.inner.slots[index];
		let status = cell.status.get();
		if status.contains(SlotStatus::COMPUTED) {
			return Ok(status);
		}
		if status.contains(SlotStatus::COMPUTING) {
			return Err(StateError::CyclicDependency);
		}
		cell.status.set(SlotStatus::COMPUTING);
		match self.run_slot(index) {
			Ok(changed) => {
				let status = if changed {
					SlotStatus::COMPUTED | SlotStatus::CHANGED
				} else {
					SlotStatus::COMPUTED
				};
				cell.status.set(status);
				Ok(status)
			}
			Err(err) => {
				cell.status.set(SlotStatus::empty());
				Err(err)
			}
		}
	}

	fn run_slot(&self, index: usize) -> Result<bool, StateError> {
		let applying = self.inner.applying.borrow();
		let tr = applying.as_ref();
		match &self.inner.config.dynamic_slots[index] {
			DynamicSlot::Field(field) => self.run_field(index, field, tr),
			DynamicSlot::Provider { provider, dep_doc, dep_selection, dep_addrs } => {
				self.run_provider(index, provider, *dep_doc, *dep_selection, dep_addrs, tr)
			}
			DynamicSlot::Aggregate { facet, providers } => {
				self.run_aggregate(index, facet, providers, tr)
			}
		}
	}

	/// A field is created when its identity has no prior address,
	/// otherwise updated from its previous value.
	fn run_field(
		&self,
		index: usize,
		field: &AnyField,
		tr: Option<&Transaction>,
	) -> Result<bool, StateError> {
		let prior = tr.and_then(|tr| {
			let old_value = tr.start_state().value_of(field.id)?;
			Some((tr, old_value))
		});
		let Some((tr, old_value)) = prior else {
			let value = (field.create)(self)?;
			self.store(index, value);
			return Ok(true);
		};
		let new_value = (field.update)(&old_value, tr, self)?;
		if (field.compare)(&old_value, &new_value) {
			self.store(index, old_value);
			return Ok(false);
		}
		self.store(index, new_value);
		Ok(true)
	}

	fn run_provider(
		&self,
		index: usize,
		provider: &Arc<Provider>,
		dep_doc: bool,
		dep_selection: bool,
		dep_addrs: &[Addr],
		tr: Option<&Transaction>,
	) -> Result<bool, StateError> {
		// Fresh states and reconfigurations recompute unconditionally.
		let Some(tr) = tr.filter(|tr| !tr.reconfigured()) else {
			let value = self.call_provider(provider)?;
			self.store(index, value);
			return Ok(true);
		};
		let mut dep_changed = (dep_doc && tr.doc_changed())
			|| (dep_selection && (tr.doc_changed() || tr.selection_set()));
		if !dep_changed {
			for &addr in dep_addrs {
				if self.ensure_addr(addr)?.contains(SlotStatus::CHANGED) {
					dep_changed = true;
					break;
				}
			}
		}
		let old_value = tr
			.start_state()
			.value_of(provider.id)
			.expect("provider evaluated in the previous state");
		if !dep_changed {
			self.store(index, old_value);
			return Ok(false);
		}
		let new_value = self.call_provider(provider)?;
		if self.inputs_equal(provider, &new_value, &old_value) {
			self.store(index, old_value);
			return Ok(false);
		}
		self.store(index, new_value);
		Ok(true)
	}

	fn run_aggregate(
		&self,
		index: usize,
		facet: &AnyFacet,
		providers: &[(Addr, bool)],
		tr: Option<&Transaction>,
	) -> Result<bool, StateError> {
		let update = tr.filter(|tr| !tr.reconfigured());
		let mut changed = update.is_none();
		for &(addr, _) in providers {
			let status = self.ensure_addr(addr)?;
			changed |= status.contains(SlotStatus::CHANGED);
		}
		if let Some(tr) = update {
			if !changed {
				let old_value = tr
					.start_state()
					.value_of(facet.id)
					.expect("facet aggregated in the previous state");
				self.store(index, old_value);
				return Ok(false);
			}
		}
		let mut inputs = Vec::new();
		for &(addr, multi) in providers {
			let value = self.read_addr(addr);
			if multi {
				let items = value
					.downcast::<Vec<DynValue>>()
					.ok()
					.expect("multi provider stores an input list");
				inputs.extend(items.iter().cloned());
			} else {
				inputs.push(value);
			}
		}
		let new_value = (facet.combine)(&inputs);
		if let Some(tr) = tr {
			if let Some(old_value) = tr.start_state().value_of(facet.id) {
				if (facet.compare_output)(&new_value, &old_value) {
					self.store(index, old_value);
					return Ok(false);
				}
			}
		}
		self.store(index, new_value);
		Ok(true)
	}

	fn call_provider(&self, provider: &Provider) -> Result<DynValue, StateError> {
		match &provider.kind {
			ProviderKind::Single { get, .. } => get(self),
			ProviderKind::Multi { get, .. } => {
				let values: DynValue = Arc::new(get(self)?);
				Ok(values)
			}
			ProviderKind::Static(_) => {
				unreachable!("static providers resolve at configuration time")
			}
		}
	}

	fn inputs_equal(&self, provider: &Provider, new: &DynValue, old: &DynValue) -> bool {
		let compare = &provider.facet.compare_input;
		if provider.is_multi() {
			let (Some(new), Some(old)) = (
				new.downcast_ref::<Vec<DynValue>>(),
				old.downcast_ref::<Vec<DynValue>>(),
			) else {
				return false;
			};
			new.len() == old.len() && new.iter().zip(old).all(|(a, b)| compare(a, b))
		} else {
			compare(new, old)
		}
	}

	fn store(&self, index: usize, value: DynValue) {
		*self.inner.slots[index].value.borrow_mut() = Some(value);
	}
}

impl fmt::Debug for EditorState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("EditorState")
			.field("slots", &self.inner.slots.len())
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
impl EditorState {
	/// Status word of the dynamic slot at `index`.
	pub(crate) fn slot_status(&self, index: usize) -> SlotStatus {
		self.inner.slots[index].status.get()
	}

	pub(crate) fn slot_count(&self) -> usize {
		self.inner.slots.len()
	}
}

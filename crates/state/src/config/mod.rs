//! Compiled configurations: addresses, slot descriptors, and resolution.
//!
//! Resolution flattens an extension tree, partitions the leaves into
//! fields and per-facet provider groups, and lays out an addressable
//! plan: facets whose providers are all literal collapse into the static
//! value list, everything else becomes a dynamic slot evaluated per
//! state transition.

use std::sync::Arc;

use bitflags::bitflags;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::error::StateError;
use crate::extension::{Extension, FlatItem, flatten};
use crate::facet::{AnyFacet, DepKind, Provider, ProviderKind};
use crate::field::AnyField;
use crate::id::Id;
use crate::state::EditorState;
use crate::value::DynValue;


bitflags! {
	/// Evaluation state of one dynamic slot.
	#[derive(Debug, Clone, Copy, PartialEq, Eq)]
	pub(crate) struct SlotStatus: u8 {
		/// The slot's value differs from the previous state's.
		const CHANGED = 1;
		/// The slot's value is present and current.
		const COMPUTED = 1 << 1;
		/// The slot's evaluator is on the stack; observing this at
		/// entry signals a dependency cycle.
		const COMPUTING = 1 << 2;
	}
}

/// A compiled slot address.
///
/// The low bit tags the kind: even addresses index the per-state value
/// and status vectors, odd addresses index the configuration's static
/// value list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Addr(u32);

impl Addr {
	pub(crate) fn dynamic(index: usize) -> Self {
		Self((index as u32) << 1)
	}

	pub(crate) fn static_value(index: usize) -> Self {
		Self(((index as u32) << 1) | 1)
	}

	pub(crate) fn is_static(self) -> bool {
		self.0 & 1 == 1
	}

	pub(crate) fn index(self) -> usize {
		(self.0 >> 1) as usize
	}
}

/// One dynamic slot's evaluator, bound to resolved addresses.
pub(crate) enum DynamicSlot {
	/// A state field: created once, then updated per transaction.
	Field(AnyField),
	/// A computed facet provider.
	Provider {
		provider: Arc<Provider>,
		dep_doc: bool,
		dep_selection: bool,
		/// Dynamic dependency slots only; static deps never change
		/// within a configuration.
		dep_addrs: SmallVec<[Addr; 4]>,
	},
	/// A facet's aggregation over its providers.
	Aggregate {
		facet: AnyFacet,
		/// Provider addresses with their multi-input flag, in input order.
		providers: SmallVec<[(Addr, bool); 4]>,
	},
}

enum PendingSlot {
	Field(AnyField),
	Provider(Arc<Provider>),
	Aggregate { facet: AnyFacet, providers: Vec<Arc<Provider>> },
}

/// A compiled extension tree.
///
/// Immutable after construction and shared by every state bound to it.
pub struct Configuration {
	pub(crate) address: FxHashMap<Id, Addr>,
	pub(crate) static_values: Vec<DynValue>,
	pub(crate) dynamic_slots: Vec<DynamicSlot>,
}

impl Configuration {
	/// Compiles an extension tree.
	///
	/// When `old_state` is given (a reconfiguration), statically resolved
	/// facet values equal to the previous state's under the facet's
	/// output comparison are carried over as the same allocation, so
	/// downstream consumers keep referential equality.
	pub fn resolve(
		extension: impl Into<Extension>,
		old_state: Option<&EditorState>,
	) -> Result<Arc<Configuration>, StateError> {
		let extension = extension.into();
		let flat = flatten(&extension);

		// Partition into fields and per-facet provider groups, both in
		// flattened order. A field identity occupies one slot no matter
		// how many decorated variants of it appear.
		let mut fields: Vec<AnyField> = Vec::new();
		let mut field_ids: FxHashSet<Id> = FxHashSet::default();
		let mut facets: Vec<(AnyFacet, Vec<Arc<Provider>>)> = Vec::new();
		let mut facet_index: FxHashMap<Id, usize> = FxHashMap::default();
		for item in flat {
			match item {
				FlatItem::Field(field) => {
					if field_ids.insert(field.id) {
						fields.push(field);
					}
				}
				FlatItem::Provider(provider) => {
					let slot = match facet_index.get(&provider.facet.id) {
						Some(&slot) => slot,
						None => {
							facet_index.insert(provider.facet.id, facets.len());
							facets.push((provider.facet.clone(), Vec::new()));
							facets.len() - 1
						}
					};
					facets[slot].1.push(provider);
				}
			}
		}

		let mut address: FxHashMap<Id, Addr> = FxHashMap::default();
		let mut static_values: Vec<DynValue> = Vec::new();
		let mut pending: Vec<PendingSlot> = Vec::new();

		for field in &fields {
			address.insert(field.id, Addr::dynamic(pending.len()));
			pending.push(PendingSlot::Field(field.clone()));
		}

		for (facet, providers) in facets {
			if providers.iter().all(|p| p.is_static()) {
				// All-static fast path: fold the aggregation away now.
				let inputs: Vec<DynValue> = providers
					.iter()
					.map(|p| match &p.kind {
						ProviderKind::Static(value) => value.clone(),
						_ => unreachable!("provider checked static above"),
					})
					.collect();
				let mut value = (facet.combine)(&inputs);
				if let Some(old) = old_state {
					if let Some(old_value) = old.value_of(facet.id) {
						if (facet.compare_output)(&value, &old_value) {
							trace!(facet = facet.id, "reusing static facet value");
							value = old_value;
						}
					}
				}
				address.insert(facet.id, Addr::static_value(static_values.len()));
				static_values.push(value);
			} else {
				debug_assert!(
					!facet.is_static,
					"static facet resolved with computed providers"
				);
				for provider in &providers {
					match &provider.kind {
						ProviderKind::Static(value) => {
							address
								.insert(provider.id, Addr::static_value(static_values.len()));
							static_values.push(value.clone());
						}
						_ => {
							address.insert(provider.id, Addr::dynamic(pending.len()));
							pending.push(PendingSlot::Provider(provider.clone()));
						}
					}
				}
				// The aggregate slot sits after every provider slot.
				address.insert(facet.id, Addr::dynamic(pending.len()));
				pending.push(PendingSlot::Aggregate { facet, providers });
			}
		}

		// Addresses are complete; bind each slot to the addresses it reads.
		let dynamic_slots: Vec<DynamicSlot> = pending
			.into_iter()
			.map(|slot| match slot {
				PendingSlot::Field(field) => DynamicSlot::Field(field),
				PendingSlot::Provider(provider) => {
					let mut dep_doc = false;
					let mut dep_selection = false;
					let mut dep_addrs = SmallVec::new();
					for dep in provider.deps() {
						match &dep.0 {
							DepKind::Doc => dep_doc = true,
							DepKind::Selection => dep_selection = true,
							DepKind::Facet(facet) => {
								push_dynamic_dep(&address, facet.id, &mut dep_addrs);
							}
							DepKind::Field(field) => {
								push_dynamic_dep(&address, field.id, &mut dep_addrs);
							}
						}
					}
					DynamicSlot::Provider { provider, dep_doc, dep_selection, dep_addrs }
				}
				PendingSlot::Aggregate { facet, providers } => {
					let providers = providers
						.iter()
						.map(|p| {
							let addr = *address
								.get(&p.id)
								.expect("provider address assigned before aggregate");
							(addr, p.is_multi())
						})
						.collect();
					DynamicSlot::Aggregate { facet, providers }
				}
			})
			.collect();

		debug!(
			fields = fields.len(),
			dynamic = dynamic_slots.len(),
			static_values = static_values.len(),
			"resolved configuration"
		);
		Ok(Arc::new(Configuration { address, static_values, dynamic_slots }))
	}

	pub(crate) fn addr_of(&self, id: Id) -> Option<Addr> {
		self.address.get(&id).copied()
	}
}

/// Records a dependency's address when it is dynamic. Absent entities
/// and static slots contribute nothing to change detection.
fn push_dynamic_dep(
	address: &FxHashMap<Id, Addr>,
	id: Id,
	dep_addrs: &mut SmallVec<[Addr; 4]>,
) {
	if let Some(&addr) = address.get(&id) {
		if !addr.is_static() {
			dep_addrs.push(addr);
		}
	}
}

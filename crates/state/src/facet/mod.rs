//! Facets: named aggregation points for extension-provided values.
//!
//! A facet collects inputs from any number of providers and reduces them
//! to a single output with its `combine` function. Providers are either
//! literal values ([`Facet::of`]) or computed from other state
//! ([`Facet::compute`], [`Facet::compute_n`]), and the resolver decides
//! per configuration which of them can be folded away statically.

use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::error::StateError;
use crate::extension::Extension;
use crate::field::{AnyField, StateField};
use crate::id::{Id, next_id};
use crate::state::EditorState;
use crate::value::{DynValue, same_value};

#[cfg(test)]
mod tests;

pub(crate) type CombineFn = Arc<dyn Fn(&[DynValue]) -> DynValue + Send + Sync>;
pub(crate) type CompareFn = Arc<dyn Fn(&DynValue, &DynValue) -> bool + Send + Sync>;
pub(crate) type GetFn = Arc<dyn Fn(&EditorState) -> Result<DynValue, StateError> + Send + Sync>;
pub(crate) type GetManyFn =
	Arc<dyn Fn(&EditorState) -> Result<Vec<DynValue>, StateError> + Send + Sync>;

/// The identity backing a facet handle.
///
/// Holds the erased reduction and comparison functions plus the memoised
/// default output, which is `combine` applied to the empty input list and
/// computed once at definition time.
pub(crate) struct FacetData {
	pub(crate) id: Id,
	pub(crate) combine: CombineFn,
	/// Suppresses provider recomputation when inputs are equal.
	pub(crate) compare_input: CompareFn,
	/// Suppresses change propagation when outputs are equal.
	pub(crate) compare_output: CompareFn,
	pub(crate) is_static: bool,
	pub(crate) default: DynValue,
}

pub(crate) type AnyFacet = Arc<FacetData>;

/// Definition of a facet: the reduction rule plus optional comparisons.
///
/// `compare` and `compare_input` default to referential equality of the
/// stored values, which is always safe and never suppresses a real
/// change. A facet marked [`static_only`](Self::static_only) rejects
/// computed providers at construction time.
pub struct FacetConfig<I, O> {
	combine: Box<dyn Fn(&[I]) -> O + Send + Sync>,
	compare: Option<Box<dyn Fn(&O, &O) -> bool + Send + Sync>>,
	compare_input: Option<Box<dyn Fn(&I, &I) -> bool + Send + Sync>>,
	is_static: bool,
}

impl<I, O> FacetConfig<I, O> {
	/// Starts a definition from the reduction function.
	pub fn new(combine: impl Fn(&[I]) -> O + Send + Sync + 'static) -> Self {
		Self {
			combine: Box::new(combine),
			compare: None,
			compare_input: None,
			is_static: false,
		}
	}

	/// Compares outputs to suppress downstream recomputation.
	pub fn compare(mut self, compare: impl Fn(&O, &O) -> bool + Send + Sync + 'static) -> Self {
		self.compare = Some(Box::new(compare));
		self
	}

	/// Compares a provider's inputs to suppress re-aggregation.
	pub fn compare_input(
		mut self,
		compare: impl Fn(&I, &I) -> bool + Send + Sync + 'static,
	) -> Self {
		self.compare_input = Some(Box::new(compare));
		self
	}

	/// Restricts the facet to literal providers.
	pub fn static_only(mut self) -> Self {
		self.is_static = true;
		self
	}
}

/// A handle to a defined facet.
///
/// The handle is cheap to clone and can live in a `static`; its identity
/// is the underlying [`FacetData`], so clones address the same slot in
/// every configuration.
pub struct Facet<I, O> {
	data: AnyFacet,
	_types: PhantomData<fn(I) -> O>,
}

impl<I, O> Clone for Facet<I, O> {
	fn clone(&self) -> Self {
		Self { data: self.data.clone(), _types: PhantomData }
	}
}

impl<I, O> fmt::Debug for Facet<I, O> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Facet").field("id", &self.data.id).finish()
	}
}

impl<I, O> Facet<I, O>
where
	I: Clone + Send + Sync + 'static,
	O: Send + Sync + 'static,
{
	/// Defines a new facet.
	pub fn define(config: FacetConfig<I, O>) -> Self {
		let FacetConfig { combine, compare, compare_input, is_static } = config;
		let combine: CombineFn = Arc::new(move |inputs: &[DynValue]| {
			let inputs: Vec<I> = inputs.iter().map(typed_input::<I>).collect();
			let output: DynValue = Arc::new(combine(&inputs));
			output
		});
		let default = combine(&[]);
		Self {
			data: Arc::new(FacetData {
				id: next_id(),
				combine,
				compare_input: erased_cmp(compare_input),
				compare_output: erased_cmp(compare),
				is_static,
				default,
			}),
			_types: PhantomData,
		}
	}

	/// A literal provider for this facet.
	pub fn of(&self, value: I) -> Extension {
		let value: DynValue = Arc::new(value);
		Extension::provider(Provider {
			id: next_id(),
			facet: self.data.clone(),
			kind: ProviderKind::Static(value),
		})
	}

	/// A provider computing one input from the state.
	///
	/// `deps` lists the slots the getter reads; the getter only re-runs
	/// when one of them changed. Fails with
	/// [`StateError::StaticFacetViolation`] on a static facet.
	pub fn compute(
		&self,
		deps: impl IntoIterator<Item = Dep>,
		get: impl Fn(&EditorState) -> Result<I, StateError> + Send + Sync + 'static,
	) -> Result<Extension, StateError> {
		if self.data.is_static {
			return Err(StateError::StaticFacetViolation);
		}
		let get: GetFn = Arc::new(move |state: &EditorState| {
			let value: DynValue = Arc::new(get(state)?);
			Ok(value)
		});
		Ok(Extension::provider(Provider {
			id: next_id(),
			facet: self.data.clone(),
			kind: ProviderKind::Single { deps: deps.into_iter().collect(), get },
		}))
	}

	/// A provider computing zero or more inputs from the state.
	pub fn compute_n(
		&self,
		deps: impl IntoIterator<Item = Dep>,
		get: impl Fn(&EditorState) -> Result<Vec<I>, StateError> + Send + Sync + 'static,
	) -> Result<Extension, StateError> {
		if self.data.is_static {
			return Err(StateError::StaticFacetViolation);
		}
		let get: GetManyFn = Arc::new(move |state: &EditorState| {
			let values = get(state)?;
			Ok(values
				.into_iter()
				.map(|value| {
					let value: DynValue = Arc::new(value);
					value
				})
				.collect())
		});
		Ok(Extension::provider(Provider {
			id: next_id(),
			facet: self.data.clone(),
			kind: ProviderKind::Multi { deps: deps.into_iter().collect(), get },
		}))
	}

	/// A provider deriving this facet's input from a field's value.
	pub fn from_field<V>(
		&self,
		field: &StateField<V>,
		get: impl Fn(&V) -> I + Send + Sync + 'static,
	) -> Result<Extension, StateError>
	where
		V: Send + Sync + 'static,
	{
		let handle = field.clone();
		self.compute([Dep::field(field)], move |state| Ok(get(&*state.field(&handle)?)))
	}

	pub(crate) fn data(&self) -> &AnyFacet {
		&self.data
	}
}

impl<I> Facet<I, Vec<I>>
where
	I: Clone + PartialEq + Send + Sync + 'static,
{
	/// Defines a facet whose output is the list of its inputs.
	///
	/// Inputs appear in flattened configuration order; outputs compare
	/// pointwise, so re-aggregating identical inputs propagates no change.
	pub fn list() -> Self {
		Self::define(
			FacetConfig::new(|inputs: &[I]| inputs.to_vec()).compare(|a, b| a == b),
		)
	}
}

fn typed_input<I: Clone + Send + Sync + 'static>(value: &DynValue) -> I {
	value.downcast_ref::<I>().cloned().expect("facet input carries the wrong type")
}

pub(crate) fn erased_cmp<T: Send + Sync + 'static>(
	compare: Option<Box<dyn Fn(&T, &T) -> bool + Send + Sync>>,
) -> CompareFn {
	match compare {
		Some(compare) => Arc::new(move |a: &DynValue, b: &DynValue| {
			match (a.downcast_ref::<T>(), b.downcast_ref::<T>()) {
				(Some(a), Some(b)) => compare(a, b),
				_ => false,
			}
		}),
		None => Arc::new(same_value),
	}
}

/// A single contribution to a facet.
pub(crate) struct Provider {
	pub(crate) id: Id,
	pub(crate) facet: AnyFacet,
	pub(crate) kind: ProviderKind,
}

pub(crate) enum ProviderKind {
	/// A literal input, resolved at configuration time.
	Static(DynValue),
	/// One input computed from state.
	Single { deps: SmallVec<[Dep; 4]>, get: GetFn },
	/// Zero or more inputs computed from state.
	Multi { deps: SmallVec<[Dep; 4]>, get: GetManyFn },
}

impl Provider {
	pub(crate) fn deps(&self) -> &[Dep] {
		match &self.kind {
			ProviderKind::Static(_) => &[],
			ProviderKind::Single { deps, .. } | ProviderKind::Multi { deps, .. } => deps,
		}
	}

	pub(crate) fn is_static(&self) -> bool {
		matches!(self.kind, ProviderKind::Static(_))
	}

	pub(crate) fn is_multi(&self) -> bool {
		matches!(self.kind, ProviderKind::Multi { .. })
	}
}

/// A dependency slot observed by a computed provider.
///
/// Either one of the transaction sentinels (document or selection
/// changes) or another facet or field whose slot the getter reads.
#[derive(Clone)]
pub struct Dep(pub(crate) DepKind);

#[derive(Clone)]
pub(crate) enum DepKind {
	Doc,
	Selection,
	Facet(AnyFacet),
	Field(AnyField),
}

impl Dep {
	/// Observes document changes on the transaction.
	pub fn doc() -> Self {
		Self(DepKind::Doc)
	}

	/// Observes selection changes (a document change implies one).
	pub fn selection() -> Self {
		Self(DepKind::Selection)
	}

	/// Observes another facet's aggregated value.
	pub fn facet<I, O>(facet: &Facet<I, O>) -> Self {
		Self(DepKind::Facet(facet.data.clone()))
	}

	/// Observes a field's value.
	pub fn field<V>(field: &StateField<V>) -> Self {
		Self(DepKind::Field(field.handle()))
	}
}

impl FromStr for Dep {
	type Err = StateError;

	fn from_str(tag: &str) -> Result<Self, StateError> {
		match tag {
			"doc" => Ok(Self::doc()),
			"selection" => Ok(Self::selection()),
			other => Err(StateError::InvalidDependency(other.to_owned())),
		}
	}
}

impl fmt::Debug for Dep {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.0 {
			DepKind::Doc => f.write_str("Dep::Doc"),
			DepKind::Selection => f.write_str("Dep::Selection"),
			DepKind::Facet(facet) => write!(f, "Dep::Facet({})", facet.id),
			DepKind::Field(field) => write!(f, "Dep::Field({})", field.id),
		}
	}
}

use std::any::Any;
use std::sync::Arc;

/// A type-erased slot value.
///
/// Values are shared behind [`Arc`] so an unchanged slot can carry the
/// same allocation from one state to the next; pointer equality on the
/// erased value is the engine's notion of referential equality and the
/// default for all comparisons.
pub type DynValue = Arc<dyn Any + Send + Sync>;

/// Referential equality of two erased values.
pub(crate) fn same_value(a: &DynValue, b: &DynValue) -> bool {
	Arc::ptr_eq(a, b)
}

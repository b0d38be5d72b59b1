use thiserror::Error;

/// Errors raised while resolving an extension tree or evaluating a state.
///
/// All of these are synchronous and abort the operation that raised them;
/// nothing is retried by the engine. Errors returned by user-supplied
/// closures propagate through evaluation unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
	/// A computed provider targets a facet that was declared static.
	#[error("static facet cannot take computed providers")]
	StaticFacetViolation,
	/// A stored value does not carry the type its facet declares.
	#[error("value does not match the facet's declared type")]
	MissingFacetData,
	/// A slot was re-entered while it was being computed.
	#[error("cyclic dependency between state slots")]
	CyclicDependency,
	/// A dependency tag named something other than `"doc"` or `"selection"`.
	#[error("invalid dependency {0:?}: expected a facet, a state field, \"doc\", or \"selection\"")]
	InvalidDependency(String),
	/// A field was read from a state whose configuration does not contain it.
	#[error("field is not present in this configuration")]
	MissingField,
	/// A stored value does not carry the type its field declares.
	#[error("value does not match the field's declared type")]
	MissingFieldData,
}

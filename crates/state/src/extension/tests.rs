use super::{Extension, Prec, flatten};
use crate::facet::Facet;
use crate::field::{FieldConfig, StateField};
use crate::state::EditorState;

fn tags() -> Facet<&'static str, Vec<&'static str>> {
	Facet::list()
}

#[test]
fn test_precedence_orders_inputs() {
	let tags = tags();
	let state = EditorState::new(vec![
		tags.of("default"),
		Prec::Fallback.set(tags.of("fallback")),
		Prec::Override.set(tags.of("override")),
		Prec::Extend.set(tags.of("extend")),
	])
	.unwrap();
	assert_eq!(
		*state.facet(&tags).unwrap(),
		vec!["override", "extend", "default", "fallback"],
	);
}

#[test]
fn test_ties_keep_tree_order() {
	let tags = tags();
	let state = EditorState::new(vec![tags.of("first"), vec![tags.of("second")].into()]).unwrap();
	assert_eq!(*state.facet(&tags).unwrap(), vec!["first", "second"]);
}

#[test]
fn test_outer_wrapper_keeps_inner_precedence() {
	let tags = tags();
	let wrapped = Prec::Fallback.set(vec![
		Prec::Override.set(tags.of("inner")),
		tags.of("outer"),
	]);
	let state = EditorState::new(vec![wrapped, tags.of("plain")]).unwrap();
	assert_eq!(*state.facet(&tags).unwrap(), vec!["inner", "plain", "outer"]);
}

#[test]
fn test_shared_subtree_contributes_once() {
	let tags = tags();
	let shared = tags.of("once");
	let group: Extension = vec![shared.clone(), shared.clone()].into();
	let state = EditorState::new(vec![group.clone(), group, shared]).unwrap();
	assert_eq!(*state.facet(&tags).unwrap(), vec!["once"]);
}

#[test]
fn test_flatten_dedups_by_identity() {
	let tags = tags();
	let leaf = tags.of("a");
	let tree: Extension = vec![leaf.clone(), leaf.clone()].into();
	assert_eq!(flatten(&tree).len(), 1);

	// A fresh provider with the same input is a distinct extension value.
	let tree: Extension = vec![tags.of("a"), tags.of("a")].into();
	assert_eq!(flatten(&tree).len(), 2);
}

#[test]
fn test_field_attachments_inherit_field_precedence() {
	let tags = tags();
	let field = StateField::define(
		FieldConfig::<u32>::new(|_| Ok(0), |value, _, _| Ok(*value)),
	)
	.provide(&tags, |_| "from-field", None)
	.unwrap();

	let state = EditorState::new(vec![
		Prec::Override.set(Extension::from(&field)),
		tags.of("plain"),
	])
	.unwrap();
	assert_eq!(*state.facet(&tags).unwrap(), vec!["from-field", "plain"]);
}

#[test]
fn test_attachment_prec_overrides_inherited() {
	let tags = tags();
	let field = StateField::define(
		FieldConfig::<u32>::new(|_| Ok(0), |value, _, _| Ok(*value)),
	)
	.provide(&tags, |_| "late", Some(Prec::Fallback))
	.unwrap();

	let state = EditorState::new(vec![Extension::from(&field), tags.of("plain")]).unwrap();
	assert_eq!(*state.facet(&tags).unwrap(), vec!["plain", "late"]);
}

#[test]
fn test_attachments_keep_insertion_order() {
	let tags = tags();
	let field = StateField::define(
		FieldConfig::<u32>::new(|_| Ok(0), |value, _, _| Ok(*value)),
	)
	.provide(&tags, |_| "one", None)
	.unwrap()
	.provide(&tags, |_| "two", None)
	.unwrap();

	let state = EditorState::new(&field).unwrap();
	assert_eq!(*state.facet(&tags).unwrap(), vec!["one", "two"]);
}

//! End-to-end tests for extension composition.
//!
//! These exercise the public surface the way an editor shell would:
//! define facets and fields, compose an extension tree, bind a state,
//! and drive it through transactions and reconfigurations.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use vellum_state::{
	Dep, EditorState, Extension, Facet, FacetConfig, FieldConfig, Prec, StateError, StateField,
	Transaction,
};

fn counter() -> StateField<u64> {
	StateField::define(
		FieldConfig::<u64>::new(
			|_| Ok(0),
			|value, tr, _| Ok(value + u64::from(tr.doc_changed())),
		)
		.compare(|a, b| a == b),
	)
}

#[test]
fn test_tab_size_precedence() {
	let tab_size =
		Facet::<usize, usize>::define(FacetConfig::new(|sizes| sizes.first().copied().unwrap_or(4)));
	let state = EditorState::new(vec![
		tab_size.of(2),
		Prec::Override.set(tab_size.of(8)),
	])
	.unwrap();
	assert_eq!(*state.facet(&tab_size).unwrap(), 8);
}

#[test]
fn test_static_input_list() {
	let themes = Facet::<String, Vec<String>>::list();
	let state = EditorState::new(vec![
		themes.of("a".to_owned()),
		themes.of("b".to_owned()),
	])
	.unwrap();
	assert_eq!(*state.facet(&themes).unwrap(), vec!["a".to_owned(), "b".to_owned()]);
}

#[test]
fn test_field_derived_facet_recomputes_incrementally() {
	let size = Facet::<u64, u64>::define(FacetConfig::new(|inputs: &[u64]| {
		inputs.first().copied().unwrap_or(0)
	}));
	let counter = counter().provide(&size, |value| *value, None).unwrap();

	let before = EditorState::new(&counter).unwrap();
	let after = Transaction::new(before.clone()).apply().unwrap();

	// Nothing changed, so both the field and the derived facet keep
	// their previous allocations.
	assert!(Arc::ptr_eq(
		&before.field(&counter).unwrap(),
		&after.field(&counter).unwrap(),
	));
	assert!(Arc::ptr_eq(
		&before.facet(&size).unwrap(),
		&after.facet(&size).unwrap(),
	));

	let changed = Transaction::new(after).with_doc_change().apply().unwrap();
	assert_eq!(*changed.field(&counter).unwrap(), 1);
	assert_eq!(*changed.facet(&size).unwrap(), 1);
}

#[test]
fn test_mixed_static_and_dynamic_providers() {
	let sizes = Facet::<u64, Vec<u64>>::list();
	let counter = counter();
	let ext = vec![
		Extension::from(&counter),
		sizes.of(1),
		sizes
			.compute([Dep::doc()], {
				let counter = counter.clone();
				move |state| Ok(*state.field(&counter)?)
			})
			.unwrap(),
	];

	let state = EditorState::new(ext).unwrap();
	assert_eq!(*state.facet(&sizes).unwrap(), vec![1, 0]);

	let state = Transaction::new(state).with_doc_change().apply().unwrap();
	assert_eq!(*state.facet(&sizes).unwrap(), vec![1, 1]);
}

#[test]
fn test_cyclic_reads_are_detected() {
	let loop_facet = Facet::<u32, u32>::define(FacetConfig::new(|inputs: &[u32]| {
		inputs.first().copied().unwrap_or(0)
	}));
	let ext = loop_facet
		.compute([Dep::facet(&loop_facet)], {
			let loop_facet = loop_facet.clone();
			move |state| Ok(*state.facet(&loop_facet)? + 1)
		})
		.unwrap();

	let err = EditorState::new(ext).unwrap_err();
	assert_eq!(err, StateError::CyclicDependency);
}

#[test]
fn test_reconfigure_reuses_static_values() {
	let themes = Facet::<String, Vec<String>>::list();
	let ext: Extension = themes.of("a".to_owned());

	let before = EditorState::new(ext.clone()).unwrap();
	let after = before.reconfigure(ext).unwrap();

	let old_value = before.facet(&themes).unwrap();
	let new_value = after.facet(&themes).unwrap();
	assert!(Arc::ptr_eq(&old_value, &new_value), "equal static values keep their identity");
}

#[test]
fn test_computed_provider_runs_only_when_deps_change() {
	let size = Facet::<u64, u64>::define(FacetConfig::new(|inputs: &[u64]| {
		inputs.first().copied().unwrap_or(0)
	}));
	let counter = counter();
	let calls = Arc::new(AtomicUsize::new(0));
	let ext = vec![
		Extension::from(&counter),
		size.compute([Dep::field(&counter)], {
			let counter = counter.clone();
			let calls = calls.clone();
			move |state| {
				calls.fetch_add(1, Ordering::Relaxed);
				Ok(*state.field(&counter)?)
			}
		})
		.unwrap(),
	];

	let state = EditorState::new(ext).unwrap();
	assert_eq!(calls.load(Ordering::Relaxed), 1);

	// The field does not change, so the getter is skipped entirely.
	let state = Transaction::new(state).apply().unwrap();
	assert_eq!(calls.load(Ordering::Relaxed), 1);

	let state = Transaction::new(state).with_doc_change().apply().unwrap();
	assert_eq!(calls.load(Ordering::Relaxed), 2);
	assert_eq!(*state.facet(&size).unwrap(), 1);
}

#[test]
fn test_selection_dependency_observes_both_flags() {
	let tracker = Facet::<u64, Vec<u64>>::list();
	let calls = Arc::new(AtomicUsize::new(0));
	let ext = tracker
		.compute([Dep::selection()], {
			let calls = calls.clone();
			move |_| Ok(calls.fetch_add(1, Ordering::Relaxed) as u64)
		})
		.unwrap();

	let state = EditorState::new(ext).unwrap();
	assert_eq!(calls.load(Ordering::Relaxed), 1);

	let state = Transaction::new(state).with_selection_change().apply().unwrap();
	assert_eq!(calls.load(Ordering::Relaxed), 2);

	// A document change implies the selection may have moved.
	let state = Transaction::new(state).with_doc_change().apply().unwrap();
	assert_eq!(calls.load(Ordering::Relaxed), 3);

	let _state = Transaction::new(state).apply().unwrap();
	assert_eq!(calls.load(Ordering::Relaxed), 3);
}

#[test]
fn test_multi_provider_spreads_inputs() {
	let tags = Facet::<&'static str, Vec<&'static str>>::list();
	let ext = vec![
		tags.of("lead"),
		tags.compute_n(std::iter::empty(), |_| Ok(vec!["mid-a", "mid-b"]))
			.unwrap(),
		tags.of("tail"),
	];

	let state = EditorState::new(ext).unwrap();
	assert_eq!(
		*state.facet(&tags).unwrap(),
		vec!["lead", "mid-a", "mid-b", "tail"],
	);
}

#[test]
fn test_derived_facet_chain_across_reconfigure() {
	let size = Facet::<u64, u64>::define(FacetConfig::new(|inputs: &[u64]| {
		inputs.iter().copied().max().unwrap_or(0)
	}));
	let counter = counter().provide(&size, |value| *value, None).unwrap();

	let state = EditorState::new(&counter).unwrap();
	let state = Transaction::new(state).with_doc_change().apply().unwrap();
	let state = Transaction::new(state).with_doc_change().apply().unwrap();
	assert_eq!(*state.facet(&size).unwrap(), 2);

	// Reconfiguring with an extra static provider keeps the field value.
	let state = state
		.reconfigure(vec![Extension::from(&counter), size.of(1)])
		.unwrap();
	assert_eq!(*state.field(&counter).unwrap(), 2);
	assert_eq!(*state.facet(&size).unwrap(), 2);
}

use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{Dep, Facet, FacetConfig};
use crate::error::StateError;
use crate::extension::Extension;
use crate::state::EditorState;

#[test]
fn test_facet_without_providers_yields_default() {
	let tab_size =
		Facet::<usize, usize>::define(FacetConfig::new(|sizes| sizes.first().copied().unwrap_or(4)));
	let state = EditorState::new(Extension::empty()).unwrap();
	assert_eq!(*state.facet(&tab_size).unwrap(), 4);
}

#[test]
fn test_default_is_memoised_at_definition() {
	let calls = Arc::new(AtomicUsize::new(0));
	let counter = calls.clone();
	let facet = Facet::<u32, u32>::define(FacetConfig::new(move |inputs| {
		counter.fetch_add(1, Ordering::Relaxed);
		inputs.first().copied().unwrap_or(0)
	}));
	assert_eq!(calls.load(Ordering::Relaxed), 1);

	let state = EditorState::new(Extension::empty()).unwrap();
	state.facet(&facet).unwrap();
	state.facet(&facet).unwrap();
	assert_eq!(calls.load(Ordering::Relaxed), 1, "defaults never re-run combine");
}

#[test]
fn test_list_facet_collects_inputs_in_order() {
	let themes = Facet::<&'static str, Vec<&'static str>>::list();
	let state = EditorState::new(vec![themes.of("a"), themes.of("b")]).unwrap();
	assert_eq!(*state.facet(&themes).unwrap(), vec!["a", "b"]);
}

#[test]
fn test_static_facet_rejects_computed_providers() {
	let theme = Facet::<String, Vec<String>>::define(
		FacetConfig::new(|inputs: &[String]| inputs.to_vec()).static_only(),
	);
	let err = theme
		.compute(std::iter::empty(), |_| Ok("dark".to_owned()))
		.unwrap_err();
	assert_eq!(err, StateError::StaticFacetViolation);

	let err = theme
		.compute_n(std::iter::empty(), |_| Ok(Vec::new()))
		.unwrap_err();
	assert_eq!(err, StateError::StaticFacetViolation);
}

#[test]
fn test_dep_parses_known_tags() {
	assert!(Dep::from_str("doc").is_ok());
	assert!(Dep::from_str("selection").is_ok());
}

#[test]
fn test_dep_rejects_unknown_tag() {
	let err = Dep::from_str("viewport").unwrap_err();
	assert_eq!(err, StateError::InvalidDependency("viewport".to_owned()));
}

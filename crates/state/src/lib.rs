//! Extension composition and derived-state engine for the Vellum editor.
//!
//! The engine unifies two kinds of stateful contribution: *fields*, whose
//! values are carried forward and updated per transaction, and *facets*,
//! whose values are aggregated from any number of provider inputs. A
//! declarative [`Extension`] tree is compiled by [`Configuration::resolve`]
//! into a flat evaluation plan, and [`EditorState`] recomputes only the
//! slots whose dependencies actually changed when a [`Transaction`] is
//! applied.
//!
//! ```
//! use vellum_state::{EditorState, Facet, FacetConfig, Prec};
//!
//! let tab_size = Facet::<usize, usize>::define(
//! 	FacetConfig::new(|sizes| sizes.first().copied().unwrap_or(4)),
//! );
//! let state = EditorState::new(vec![
//! 	tab_size.of(2),
//! 	Prec::Override.set(tab_size.of(8)),
//! ])
//! .unwrap();
//! assert_eq!(*state.facet(&tab_size).unwrap(), 8);
//! ```

/// Compiled configuration and slot addressing.
mod config;
mod error;
/// Extension trees and precedence.
mod extension;
/// Facet definitions and providers.
mod facet;
/// State fields.
mod field;
mod id;
/// Editor states and demand-driven evaluation.
mod state;
/// The transaction contract observed by the engine.
mod transaction;
mod value;

pub use config::Configuration;
pub use error::StateError;
pub use extension::{Extension, Prec};
pub use facet::{Dep, Facet, FacetConfig};
pub use field::{FieldConfig, StateField};
pub use state::EditorState;
pub use transaction::Transaction;
pub use value::DynValue;

//! Extension trees and precedence.
//!
//! An extension is a field, a facet provider, an ordered group, or a
//! precedence wrapper around another extension. Trees nest arbitrarily
//! and may share subtrees; flattening walks them depth-first into four
//! precedence buckets, skipping any extension value it has already seen.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::facet::Provider;
use crate::field::{AnyField, StateField};

#[cfg(test)]
mod tests;

/// A composable unit of configuration.
#[derive(Clone)]
pub struct Extension(pub(crate) ExtKind);

impl fmt::Debug for Extension {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("Extension(..)")
	}
}

#[derive(Clone)]
pub(crate) enum ExtKind {
	Field(AnyField),
	Provider(Arc<Provider>),
	Group(Arc<[Extension]>),
	Prec(Prec, Arc<Extension>),
}

impl Extension {
	/// The empty extension: contributes nothing.
	pub fn empty() -> Self {
		Self(ExtKind::Group(Arc::from(Vec::new())))
	}

	pub(crate) fn provider(provider: Provider) -> Self {
		Self(ExtKind::Provider(Arc::new(provider)))
	}

	/// Identity key for flattening: the same extension value (or a clone
	/// of it) maps to the same key, distinct values never collide.
	pub(crate) fn identity(&self) -> usize {
		match &self.0 {
			ExtKind::Field(field) => Arc::as_ptr(field) as usize,
			ExtKind::Provider(provider) => Arc::as_ptr(provider) as usize,
			ExtKind::Group(items) => Arc::as_ptr(items).cast::<Extension>() as usize,
			ExtKind::Prec(_, inner) => Arc::as_ptr(inner) as usize,
		}
	}
}

impl From<Vec<Extension>> for Extension {
	fn from(items: Vec<Extension>) -> Self {
		Self(ExtKind::Group(items.into()))
	}
}

impl<const N: usize> From<[Extension; N]> for Extension {
	fn from(items: [Extension; N]) -> Self {
		Vec::from(items).into()
	}
}

impl FromIterator<Extension> for Extension {
	fn from_iter<T: IntoIterator<Item = Extension>>(items: T) -> Self {
		items.into_iter().collect::<Vec<_>>().into()
	}
}

impl<V> From<&StateField<V>> for Extension {
	fn from(field: &StateField<V>) -> Self {
		Self(ExtKind::Field(field.handle()))
	}
}

impl<V> From<StateField<V>> for Extension {
	fn from(field: StateField<V>) -> Self {
		Self::from(&field)
	}
}

/// Precedence levels for extension ordering.
///
/// Lower numeric value is higher priority; unwrapped extensions sit at
/// [`Prec::Default`]. Ties within a level keep tree order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Prec {
	Override = 0,
	Extend = 1,
	Default = 2,
	Fallback = 3,
}

impl Prec {
	/// Wraps an extension at this precedence.
	///
	/// Only extensions that are not already inside a precedence wrapper
	/// are affected; inner wrappers keep their own level.
	pub fn set(self, ext: impl Into<Extension>) -> Extension {
		Extension(ExtKind::Prec(self, Arc::new(ext.into())))
	}

	pub(crate) fn bucket(self) -> usize {
		self as usize
	}
}

impl Default for Prec {
	fn default() -> Self {
		Self::Default
	}
}

/// A leaf of the flattened tree.
pub(crate) enum FlatItem {
	Field(AnyField),
	Provider(Arc<Provider>),
}

/// Flattens an extension tree into canonical resolver order.
///
/// Depth-first, with the nearest enclosing precedence wrapper deciding
/// each leaf's bucket and a field's attached extensions recursed at the
/// field's own precedence. Buckets are concatenated highest priority
/// first.
pub(crate) fn flatten(ext: &Extension) -> Vec<FlatItem> {
	let mut buckets: [Vec<FlatItem>; 4] = Default::default();
	let mut seen = FxHashSet::default();
	collect(ext, Prec::Default, &mut buckets, &mut seen);
	buckets.into_iter().flatten().collect()
}

fn collect(
	ext: &Extension,
	prec: Prec,
	buckets: &mut [Vec<FlatItem>; 4],
	seen: &mut FxHashSet<usize>,
) {
	if !seen.insert(ext.identity()) {
		return;
	}
	match &ext.0 {
		ExtKind::Group(items) => {
			for item in items.iter() {
				collect(item, prec, buckets, seen);
			}
		}
		ExtKind::Prec(level, inner) => collect(inner, *level, buckets, seen),
		ExtKind::Field(field) => {
			buckets[prec.bucket()].push(FlatItem::Field(field.clone()));
			for attached in &field.provides {
				collect(attached, prec, buckets, seen);
			}
		}
		ExtKind::Provider(provider) => {
			buckets[prec.bucket()].push(FlatItem::Provider(provider.clone()));
		}
	}
}

use std::sync::atomic::{AtomicU32, Ordering};

/// Identity of a facet, field, or provider.
///
/// Ids are assigned from a process-wide counter and stay stable for the
/// lifetime of the process, so entities can be defined in statics and
/// shared between configurations.
pub(crate) type Id = u32;

static NEXT_ID: AtomicU32 = AtomicU32::new(0);

pub(crate) fn next_id() -> Id {
	NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

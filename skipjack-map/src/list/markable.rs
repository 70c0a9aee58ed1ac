//! Markable atomic forward pointer
//!
//! A single-word cell holding a `(reference, mark)` pair. The mark rides in
//! the low tag bit of the pointer, so the pair is observed and replaced by
//! one atomic instruction. Node allocations are word-aligned, which keeps
//! the bit free.

use crossbeam::epoch::{Atomic, Guard, Owned, Shared};
use std::sync::atomic::Ordering;

const MARK_BIT: usize = 1;

/// An atomic `(reference, mark)` pair
///
/// The mark is the logical-delete bit of the level this cell belongs to.
/// A successful publish uses release ordering and every load uses acquire,
/// so fields of a node reached through a cell are visible to the reader.
pub(crate) struct MarkableAtomic<T> {
    inner: Atomic<T>,
}

impl<T> MarkableAtomic<T> {
    /// A cell holding `(null, false)`
    pub(crate) fn null() -> Self {
        Self {
            inner: Atomic::null(),
        }
    }

    /// Atomically observes the current `(reference, mark)` pair
    pub(crate) fn load<'g>(&self, guard: &'g Guard) -> (Shared<'g, T>, bool) {
        let raw = self.inner.load(Ordering::Acquire, guard);
        (raw.with_tag(0), raw.tag() & MARK_BIT != 0)
    }

    /// The reference half of [`load`](Self::load)
    pub(crate) fn load_ref<'g>(&self, guard: &'g Guard) -> Shared<'g, T> {
        self.load(guard).0
    }

    /// The mark half of [`load`](Self::load)
    #[allow(dead_code)]
    pub(crate) fn load_mark(&self, guard: &Guard) -> bool {
        self.load(guard).1
    }

    /// Unconditionally replaces the pair
    pub(crate) fn store(&self, reference: Shared<'_, T>, mark: bool) {
        self.inner
            .store(reference.with_tag(mark as usize), Ordering::Release);
    }

    /// Replaces the pair iff it currently equals `(expected_ref, expected_mark)`
    pub(crate) fn compare_set(
        &self,
        expected_ref: Shared<'_, T>,
        expected_mark: bool,
        new_ref: Shared<'_, T>,
        new_mark: bool,
        guard: &Guard,
    ) -> bool {
        self.inner
            .compare_exchange(
                expected_ref.with_tag(expected_mark as usize),
                new_ref.with_tag(new_mark as usize),
                Ordering::AcqRel,
                Ordering::Acquire,
                guard,
            )
            .is_ok()
    }

    /// Publishes an owned allocation iff the pair equals `(expected_ref, expected_mark)`
    ///
    /// On success the node is linked with mark `false` and the shared handle
    /// is returned; on failure ownership of the allocation comes back to the
    /// caller for the next attempt.
    pub(crate) fn compare_set_owned<'g>(
        &self,
        expected_ref: Shared<'_, T>,
        expected_mark: bool,
        new: Owned<T>,
        guard: &'g Guard,
    ) -> std::result::Result<Shared<'g, T>, Owned<T>> {
        self.inner
            .compare_exchange(
                expected_ref.with_tag(expected_mark as usize),
                new,
                Ordering::AcqRel,
                Ordering::Acquire,
                guard,
            )
            .map_err(|e| e.new)
    }
}

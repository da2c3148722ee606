// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! An allocator adapter that validates releases.

use std::collections::BTreeSet;

use crate::allocator::{AllocatorConfig, AreaAllocator};
use crate::error::AllocError;
use crate::geometry::{Rect, Size};

/// Wraps an allocator and keeps track of every live allocation.
///
/// Releasing a rectangle that is not live, including releasing one twice, is rejected instead
/// of being passed on. This costs a set lookup per call and is meant for debugging and tests.
#[derive(Debug, Clone)]
pub struct Checked<A> {
    inner: A,
    live: BTreeSet<Rect>,
}

impl<A: AreaAllocator> Checked<A> {
    /// Wrap `inner`, which must not have any live allocations.
    pub fn new(inner: A) -> Self {
        Self {
            inner,
            live: BTreeSet::new(),
        }
    }

    /// Release `rect`, or report why it cannot be released.
    pub fn try_release(&mut self, rect: Rect) -> Result<(), AllocError> {
        if !self.live.remove(&rect) {
            return Err(AllocError::NotAllocated(rect));
        }
        self.inner.release(rect);
        Ok(())
    }

    /// Whether `rect` is currently allocated.
    pub fn is_live(&self, rect: Rect) -> bool {
        self.live.contains(&rect)
    }

    /// All live allocations, ordered by `x`, then `y`, then size.
    pub fn live(&self) -> impl Iterator<Item = Rect> + '_ {
        self.live.iter().copied()
    }

    /// The number of live allocations.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// The wrapped allocator.
    pub fn inner(&self) -> &A {
        &self.inner
    }

    /// Unwrap the allocator.
    pub fn into_inner(self) -> A {
        self.inner
    }
}

impl<A: AreaAllocator> AreaAllocator for Checked<A> {
    fn size(&self) -> Size {
        self.inner.size()
    }

    fn config(&self) -> AllocatorConfig {
        self.inner.config()
    }

    fn set_config(&mut self, config: AllocatorConfig) {
        self.inner.set_config(config);
    }

    fn allocate(&mut self, size: Size) -> Option<Rect> {
        let rect = self.inner.allocate(size)?;
        let inserted = self.live.insert(rect);
        debug_assert!(inserted, "allocator returned {rect} twice");
        Some(rect)
    }

    fn release(&mut self, rect: Rect) {
        if let Err(err) = self.try_release(rect) {
            log::warn!("ignoring release: {err}");
        }
    }

    fn expand(&mut self, new_size: Size) -> Result<(), AllocError> {
        self.inner.expand(new_size)
    }

    fn overhead(&self) -> u64 {
        self.inner.overhead()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GeneralAllocator, UniformAllocator};

    #[test]
    fn rejects_double_release() {
        let mut alloc = Checked::new(UniformAllocator::new(
            Size::new(32, 32),
            Size::new(16, 16),
        ));
        let a = alloc.allocate(Size::new(16, 16)).unwrap();
        assert!(alloc.is_live(a));
        assert_eq!(alloc.try_release(a), Ok(()));
        assert_eq!(alloc.try_release(a), Err(AllocError::NotAllocated(a)));
        // The free list was not corrupted by the second release.
        assert_eq!(alloc.inner().free_cells(), 4);
    }

    #[test]
    fn rejects_foreign_rects() {
        let mut alloc = Checked::new(GeneralAllocator::new(Size::new(64, 64)));
        let a = alloc.allocate(Size::new(10, 10)).unwrap();
        let foreign = Rect::new(a.x, a.y, 5, 5);
        assert_eq!(
            alloc.try_release(foreign),
            Err(AllocError::NotAllocated(foreign))
        );
        alloc.release(foreign);
        assert_eq!(alloc.live_count(), 1);
        alloc.release(a);
        assert_eq!(alloc.live_count(), 0);
        assert_eq!(alloc.into_inner().node_count(), 1);
    }

    #[test]
    fn tracks_batches() {
        let mut alloc = Checked::new(GeneralAllocator::new(Size::new(32, 32)));
        let rects: Vec<Rect> = alloc
            .allocate_batch(&[Size::new(16, 16), Size::new(64, 64), Size::new(16, 16)])
            .into_iter()
            .flatten()
            .collect();
        assert_eq!(rects.len(), 2);
        assert_eq!(
            alloc.live().collect::<Vec<_>>(),
            [Rect::new(0, 0, 16, 16), Rect::new(0, 16, 16, 16)]
        );
        alloc.release_batch(&rects);
        assert_eq!(alloc.live_count(), 0);
    }
}

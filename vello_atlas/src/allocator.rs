// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The allocation contract shared by every strategy.

use crate::error::AllocError;
use crate::general::GeneralAllocator;
use crate::geometry::{Rect, Size};
use crate::simple::SimpleAllocator;
use crate::uniform::UniformAllocator;

/// Largest extent an allocator can manage, so that every coordinate fits in an `i32`.
pub(crate) const MAX_EXTENT: u32 = i32::MAX as u32;

/// Common configuration for all allocation strategies.
///
/// Changing the configuration only affects allocations made afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocatorConfig {
    /// Every request is rounded up, per component, to a multiple of this size.
    ///
    /// A zero component behaves like `1`.
    pub minimum_allocation: Size,
    /// Extra space reserved after each placement on the right and bottom edges.
    ///
    /// The margin is not part of the returned rectangle.
    pub margin: Size,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            minimum_allocation: Size::new(1, 1),
            margin: Size::ZERO,
        }
    }
}

impl AllocatorConfig {
    /// Round `size` up to the minimum allocation granularity.
    pub fn round(&self, size: Size) -> Size {
        Size::new(
            round_up(size.width, self.minimum_allocation.width),
            round_up(size.height, self.minimum_allocation.height),
        )
    }

    /// The area actually reserved for a request of `size`: the rounded size plus the margin.
    pub fn footprint(&self, size: Size) -> Size {
        self.round(size).saturating_add(self.margin)
    }

    /// The smallest footprint any non-empty request can have.
    pub(crate) fn min_footprint(&self) -> Size {
        self.footprint(Size::new(1, 1))
    }
}

fn round_up(value: u32, granularity: u32) -> u32 {
    let granularity = granularity.max(1);
    match value % granularity {
        0 => value,
        rem => value.saturating_add(granularity - rem),
    }
}

/// Clamp an initial allocator size to the supported coordinate range.
pub(crate) fn clamp_extent(size: Size) -> Size {
    Size::new(size.width.min(MAX_EXTENT), size.height.min(MAX_EXTENT))
}

/// Validate a call to [`AreaAllocator::expand`].
pub(crate) fn check_expand(current: Size, requested: Size) -> Result<(), AllocError> {
    if !current.fits_in(requested) {
        return Err(AllocError::Shrink { current, requested });
    }
    if requested.width > MAX_EXTENT || requested.height > MAX_EXTENT {
        return Err(AllocError::Overflow {
            size: current,
            delta: Size::new(
                requested.width - current.width,
                requested.height - current.height,
            ),
        });
    }
    Ok(())
}

/// A strategy for packing rectangles into a bounded area.
///
/// Implementations never overlap two live allocations and never place anything outside of
/// [`size`](Self::size). Running out of space is reported as `None`.
///
/// # Contract
///
/// Releasing a rectangle that was not returned by `allocate` on the same instance, or releasing
/// the same rectangle twice, is a caller error. Depending on the strategy this is ignored,
/// detected and ignored, or silently corrupts the allocator's free space. Wrap the allocator in
/// [`Checked`](crate::Checked) to have these calls rejected.
pub trait AreaAllocator {
    /// The current bounds.
    fn size(&self) -> Size;

    /// The current configuration.
    fn config(&self) -> AllocatorConfig;

    /// Replace the configuration.
    fn set_config(&mut self, config: AllocatorConfig);

    /// The rounding granularity applied to requests.
    fn minimum_allocation(&self) -> Size {
        self.config().minimum_allocation
    }

    /// Set the rounding granularity applied to requests.
    fn set_minimum_allocation(&mut self, minimum_allocation: Size) {
        let config = self.config();
        self.set_config(AllocatorConfig {
            minimum_allocation,
            ..config
        });
    }

    /// The spacing reserved after each placement.
    fn margin(&self) -> Size {
        self.config().margin
    }

    /// Set the spacing reserved after each placement.
    fn set_margin(&mut self, margin: Size) {
        let config = self.config();
        self.set_config(AllocatorConfig { margin, ..config });
    }

    /// Reserve space for a rectangle of at least `size`.
    ///
    /// The returned rectangle has the rounded size, without the margin.
    fn allocate(&mut self, size: Size) -> Option<Rect>;

    /// Allocate each size in order.
    ///
    /// This is not atomic: entries that succeeded stay allocated even if later ones fail.
    fn allocate_batch(&mut self, sizes: &[Size]) -> Vec<Option<Rect>> {
        sizes.iter().map(|&size| self.allocate(size)).collect()
    }

    /// Return a previously allocated rectangle to the free pool.
    fn release(&mut self, rect: Rect);

    /// Release each rectangle in order.
    fn release_batch(&mut self, rects: &[Rect]) {
        for &rect in rects {
            self.release(rect);
        }
    }

    /// Grow the bounds to `new_size`. The new area is available immediately.
    ///
    /// Fails without changing anything if `new_size` is smaller than the current size in
    /// either dimension.
    fn expand(&mut self, new_size: Size) -> Result<(), AllocError>;

    /// Grow the bounds by `delta`.
    fn expand_by(&mut self, delta: Size) -> Result<(), AllocError> {
        let size = self.size();
        let new_size = size
            .checked_add(delta)
            .ok_or(AllocError::Overflow { size, delta })?;
        self.expand(new_size)
    }

    /// A strategy-specific measure of wasted area.
    ///
    /// Only meaningful for comparing the same instance over time.
    fn overhead(&self) -> u64;
}

impl<A: AreaAllocator + ?Sized> AreaAllocator for Box<A> {
    fn size(&self) -> Size {
        (**self).size()
    }

    fn config(&self) -> AllocatorConfig {
        (**self).config()
    }

    fn set_config(&mut self, config: AllocatorConfig) {
        (**self).set_config(config);
    }

    fn allocate(&mut self, size: Size) -> Option<Rect> {
        (**self).allocate(size)
    }

    fn allocate_batch(&mut self, sizes: &[Size]) -> Vec<Option<Rect>> {
        (**self).allocate_batch(sizes)
    }

    fn release(&mut self, rect: Rect) {
        (**self).release(rect);
    }

    fn release_batch(&mut self, rects: &[Rect]) {
        (**self).release_batch(rects);
    }

    fn expand(&mut self, new_size: Size) -> Result<(), AllocError> {
        (**self).expand(new_size)
    }

    fn expand_by(&mut self, delta: Size) -> Result<(), AllocError> {
        (**self).expand_by(delta)
    }

    fn overhead(&self) -> u64 {
        (**self).overhead()
    }
}

/// Which allocation strategy to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AllocatorKind {
    /// Row-cursor bump allocation, see [`SimpleAllocator`].
    Simple,
    /// Guillotine tree with merging, see [`GeneralAllocator`].
    #[default]
    General,
    /// Fixed-size cells, see [`UniformAllocator`].
    Uniform {
        /// The size of every cell. Must be non-zero in both dimensions.
        cell_size: Size,
    },
}

/// Construct an allocator of the given kind.
pub fn new_allocator(
    kind: AllocatorKind,
    size: Size,
    config: AllocatorConfig,
) -> Box<dyn AreaAllocator> {
    match kind {
        AllocatorKind::Simple => Box::new(SimpleAllocator::with_config(size, config)),
        AllocatorKind::General => Box::new(GeneralAllocator::with_config(size, config)),
        AllocatorKind::Uniform { cell_size } => {
            Box::new(UniformAllocator::with_config(size, cell_size, config))
        }
    }
}

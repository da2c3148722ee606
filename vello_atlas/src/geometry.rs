// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Integer geometry types used by the allocators.

use core::fmt;

/// A non-negative integer extent.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "bytemuck", derive(bytemuck::Pod, bytemuck::Zeroable))]
#[repr(C)]
pub struct Size {
    /// Extent along the x axis.
    pub width: u32,
    /// Extent along the y axis.
    pub height: u32,
}

impl Size {
    /// The empty size.
    pub const ZERO: Self = Self::new(0, 0);

    /// Create a new size.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Whether either component is zero.
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// The area covered by this size.
    pub const fn area(self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Whether `self` fits inside `other` in both dimensions.
    pub const fn fits_in(self, other: Self) -> bool {
        self.width <= other.width && self.height <= other.height
    }

    /// Component-wise maximum.
    pub fn component_max(self, other: Self) -> Self {
        Self::new(self.width.max(other.width), self.height.max(other.height))
    }

    /// Component-wise addition, saturating at `u32::MAX`.
    pub const fn saturating_add(self, other: Self) -> Self {
        Self::new(
            self.width.saturating_add(other.width),
            self.height.saturating_add(other.height),
        )
    }

    /// Component-wise addition, `None` on overflow.
    pub fn checked_add(self, other: Self) -> Option<Self> {
        Some(Self::new(
            self.width.checked_add(other.width)?,
            self.height.checked_add(other.height)?,
        ))
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl From<(u32, u32)> for Size {
    fn from((width, height): (u32, u32)) -> Self {
        Self::new(width, height)
    }
}

/// An integer rectangle: an origin plus a [`Size`].
///
/// The origin is an offset from the allocator's origin. [`Rect::ZERO`] is never a valid
/// allocation and can stand in for "no allocation" where a plain value is more convenient
/// than an `Option`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "bytemuck", derive(bytemuck::Pod, bytemuck::Zeroable))]
#[repr(C)]
pub struct Rect {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width of the rectangle.
    pub width: u32,
    /// Height of the rectangle.
    pub height: u32,
}

static_assertions::assert_eq_size!(Size, [u32; 2]);
static_assertions::assert_eq_size!(Rect, [u32; 4]);

impl Rect {
    /// The all-zero rectangle, used as the allocation failure sentinel.
    pub const ZERO: Self = Self::new(0, 0, 0, 0);

    /// Create a new rectangle.
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a rectangle from an origin and a size.
    pub const fn from_origin_size(x: i32, y: i32, size: Size) -> Self {
        Self::new(x, y, size.width, size.height)
    }

    /// The size of this rectangle.
    pub const fn size(self) -> Size {
        Size::new(self.width, self.height)
    }

    /// The exclusive right edge.
    pub const fn right(self) -> i64 {
        self.x as i64 + self.width as i64
    }

    /// The exclusive bottom edge.
    pub const fn bottom(self) -> i64 {
        self.y as i64 + self.height as i64
    }

    /// Whether the rectangle covers no area.
    pub const fn is_empty(self) -> bool {
        self.size().is_empty()
    }

    /// Whether the two rectangles share any area.
    pub fn intersects(self, other: Self) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && i64::from(self.x) < other.right()
            && i64::from(other.x) < self.right()
            && i64::from(self.y) < other.bottom()
            && i64::from(other.y) < self.bottom()
    }

    /// Whether the point lies inside the rectangle (right and bottom edges excluded).
    pub fn contains_point(self, x: i32, y: i32) -> bool {
        x >= self.x && y >= self.y && i64::from(x) < self.right() && i64::from(y) < self.bottom()
    }

    /// Whether `other` lies entirely inside `self`.
    pub fn contains_rect(self, other: Self) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}) {}x{}",
            self.x, self.y, self.width, self.height
        )
    }
}

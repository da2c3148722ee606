// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::geometry::{Rect, Size};
use thiserror::Error;

/// Errors reported for misuse of an allocator.
///
/// Running out of space is not an error; `allocate` returns `None` for that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
    /// `expand` was asked to make the allocator smaller in some dimension.
    #[error("cannot shrink allocator from {current} to {requested}")]
    Shrink {
        /// The size before the call.
        current: Size,
        /// The rejected size.
        requested: Size,
    },
    /// The expanded size does not fit the coordinate space.
    #[error("expanding {size} by {delta} overflows the coordinate space")]
    Overflow {
        /// The size before the call.
        size: Size,
        /// The requested growth.
        delta: Size,
    },
    /// The rectangle is not a live allocation of this allocator.
    #[error("rectangle {0} is not a live allocation")]
    NotAllocated(Rect),
}

// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=vello_atlas

//! Area allocators for packing rectangles into a bounded 2D coordinate space, such as the backing
//! store of a texture atlas.
//!
//! The allocators never touch pixel data. They hand out non-overlapping [`Rect`]s and the caller
//! uses those coordinates to index into its own storage (a pixmap, a GPU texture, a region of a
//! vertex buffer, ...).
//!
//! # Strategies
//!
//! All strategies implement the [`AreaAllocator`] trait:
//!
//! - [`SimpleAllocator`]: a row-cursor bump allocator. Cheapest, but never reclaims space.
//!   Good for atlases that are built once and thrown away as a whole.
//! - [`GeneralAllocator`]: a binary space partition tree using guillotine cuts. Splits free
//!   regions on allocation and merges sibling regions back together on release.
//! - [`UniformAllocator`]: a grid of equally sized cells with an O(1) free list. Optimal when
//!   every request has the same size, such as glyph caches with a fixed cell size.
//!
//! [`Checked`] wraps any allocator and rejects releases of rectangles that are not live, at the
//! cost of keeping an auxiliary set of allocations.
//!
//! # Usage
//!
//! ```
//! use vello_atlas::{AreaAllocator, GeneralAllocator, Size};
//!
//! let mut atlas = GeneralAllocator::new(Size::new(256, 256));
//! let rect = atlas.allocate(Size::new(10, 10)).unwrap();
//! assert_eq!((rect.width, rect.height), (10, 10));
//! assert!(atlas.allocate(Size::new(250, 250)).is_none());
//!
//! atlas.release(rect);
//! assert!(atlas.allocate(Size::new(256, 256)).is_some());
//! ```
//!
//! # Features
//!
//! - `bytemuck`: Implement `Pod` and `Zeroable` for [`Size`] and [`Rect`].
//!
//! Allocation failure is not an error: it is reported as `None` (the sentinel [`Rect::ZERO`] if
//! you prefer a plain value via `unwrap_or_default`). None of the allocators are thread-safe; share
//! one behind a lock or use one per worker.

// LINEBENDER LINT SET - lib.rs - v3
// See https://linebender.org/wiki/canonical-lints/
// These lints shouldn't apply to examples or tests.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
// These lints shouldn't apply to examples.
#![warn(clippy::print_stdout, clippy::print_stderr)]
// Targeting e.g. 32-bit means structs containing usize can give false positives for 64-bit.
#![cfg_attr(target_pointer_width = "64", warn(clippy::trivially_copy_pass_by_ref))]
// END LINEBENDER LINT SET
#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod allocator;
pub mod checked;
pub mod error;
pub mod general;
pub mod geometry;
pub mod simple;
pub mod uniform;

pub use allocator::{new_allocator, AllocatorConfig, AllocatorKind, AreaAllocator};
pub use checked::Checked;
pub use error::AllocError;
pub use general::GeneralAllocator;
pub use geometry::{Rect, Size};
pub use simple::SimpleAllocator;
pub use uniform::UniformAllocator;

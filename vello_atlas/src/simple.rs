// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A row-cursor bump allocator.

use crate::allocator::{check_expand, clamp_extent, AllocatorConfig, AreaAllocator};
use crate::error::AllocError;
use crate::geometry::{Rect, Size};

/// Packs rectangles left to right into rows, starting a new row when the current one is full.
///
/// Space is never reclaimed: [`release`](AreaAllocator::release) does nothing and the packing
/// cursor only moves forward. A request that does not fit in the rest of the current row starts
/// a new row, and that row is kept even when the request then fails. In exchange allocation is O(1) with no bookkeeping, which suits
/// atlases that are built once and discarded as a whole.
#[derive(Debug, Clone)]
pub struct SimpleAllocator {
    size: Size,
    config: AllocatorConfig,
    column: u32,
    row: u32,
    row_height: u32,
    /// Total footprint area handed out so far.
    used_area: u64,
}

impl SimpleAllocator {
    /// Create an allocator covering `size` with the default configuration.
    pub fn new(size: Size) -> Self {
        Self::with_config(size, AllocatorConfig::default())
    }

    /// Create an allocator covering `size`.
    pub fn with_config(size: Size, config: AllocatorConfig) -> Self {
        Self {
            size: clamp_extent(size),
            config,
            column: 0,
            row: 0,
            row_height: 0,
            used_area: 0,
        }
    }

    /// The position at which the next allocation will be attempted, as `(column, row)`.
    pub fn cursor(&self) -> (u32, u32) {
        (self.column, self.row)
    }

    /// The height of the row currently being filled.
    pub fn row_height(&self) -> u32 {
        self.row_height
    }
}

impl AreaAllocator for SimpleAllocator {
    fn size(&self) -> Size {
        self.size
    }

    fn config(&self) -> AllocatorConfig {
        self.config
    }

    fn set_config(&mut self, config: AllocatorConfig) {
        self.config = config;
    }

    fn allocate(&mut self, size: Size) -> Option<Rect> {
        if size.is_empty() {
            return None;
        }
        let rounded = self.config.round(size);
        let footprint = self.config.footprint(size);

        if u64::from(self.column) + u64::from(footprint.width) > u64::from(self.size.width) {
            // The wrap is kept even if the retry below fails.
            self.row = self.row.saturating_add(self.row_height);
            self.column = 0;
            self.row_height = footprint.height;
            if footprint.width > self.size.width {
                log::trace!("{footprint} is wider than the {} atlas", self.size);
                return None;
            }
        }
        if u64::from(self.row) + u64::from(footprint.height) > u64::from(self.size.height) {
            log::trace!("no row left for {footprint}");
            return None;
        }

        // The cursor is within the size here, which is clamped to `i32::MAX`.
        let rect = Rect::from_origin_size(self.column as i32, self.row as i32, rounded);
        self.column += footprint.width;
        self.row_height = self.row_height.max(footprint.height);
        self.used_area += footprint.area();
        Some(rect)
    }

    fn release(&mut self, rect: Rect) {
        log::trace!("ignoring release of {rect}, bump allocation never reclaims space");
    }

    fn expand(&mut self, new_size: Size) -> Result<(), AllocError> {
        check_expand(self.size, new_size)?;
        log::debug!("expanding simple allocator from {} to {new_size}", self.size);
        self.size = new_size;
        Ok(())
    }

    fn overhead(&self) -> u64 {
        let row = self.row.min(self.size.height);
        let behind_cursor = u64::from(row) * u64::from(self.size.width)
            + u64::from(self.column) * u64::from(self.row_height);
        behind_cursor.saturating_sub(self.used_area)
    }
}

// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A fixed-size cell allocator.

use crate::allocator::{check_expand, clamp_extent, AllocatorConfig, AreaAllocator};
use crate::error::AllocError;
use crate::geometry::{Rect, Size};

/// Terminates the free list.
const END: u32 = u32::MAX;

/// Divides the area into a grid of equally sized cells and hands out one cell per request.
///
/// Free cells form a singly linked list threaded through a flat array, so both allocation and
/// release are O(1). Requests whose footprint does not fit in one cell always fail.
///
/// Releasing a cell that is not allocated corrupts the free list. Only positions outside the
/// grid or off the cell boundaries are detected.
#[derive(Debug, Clone)]
pub struct UniformAllocator {
    size: Size,
    config: AllocatorConfig,
    cell_size: Size,
    /// Number of whole cells in each dimension.
    grid_size: Size,
    /// For free cells, the index of the next free cell or [`END`].
    grid: Vec<u32>,
    first_free: u32,
}

impl UniformAllocator {
    /// Create an allocator covering `size` with cells of `cell_size` and the default
    /// configuration.
    pub fn new(size: Size, cell_size: Size) -> Self {
        Self::with_config(size, cell_size, AllocatorConfig::default())
    }

    /// Create an allocator covering `size` with cells of `cell_size`.
    ///
    /// # Panics
    ///
    /// If `cell_size` is empty, or the grid has `u32::MAX` cells or more.
    pub fn with_config(size: Size, cell_size: Size, config: AllocatorConfig) -> Self {
        assert!(cell_size.width > 0, "cell width must be positive");
        assert!(cell_size.height > 0, "cell height must be positive");

        let size = clamp_extent(size);
        let grid_size = grid_size(size, cell_size);
        assert!(
            grid_size.area() < u64::from(END),
            "grid of {grid_size} cells is too large"
        );

        let mut alloc = Self {
            size,
            config,
            cell_size,
            grid_size: Size::ZERO,
            grid: Vec::new(),
            first_free: END,
        };
        alloc.rebuild(grid_size);
        alloc
    }

    /// The size of every cell.
    pub fn cell_size(&self) -> Size {
        self.cell_size
    }

    /// The number of whole cells in each dimension.
    pub fn grid_size(&self) -> Size {
        self.grid_size
    }

    /// The number of cells currently free.
    ///
    /// This walks the free list.
    pub fn free_cells(&self) -> usize {
        let mut count = 0;
        let mut cell = self.first_free;
        while cell != END {
            count += 1;
            cell = self.grid[cell as usize];
        }
        count
    }

    /// The cell index for the origin of `rect`, if it is the origin of a cell in the grid.
    fn cell_index(&self, rect: Rect) -> Option<u32> {
        let x = u32::try_from(rect.x).ok()?;
        let y = u32::try_from(rect.y).ok()?;
        if x % self.cell_size.width != 0 || y % self.cell_size.height != 0 {
            return None;
        }
        let (column, row) = (x / self.cell_size.width, y / self.cell_size.height);
        if column >= self.grid_size.width || row >= self.grid_size.height {
            return None;
        }
        Some(row * self.grid_size.width + column)
    }

    /// Resize the grid to `new_grid` cells.
    ///
    /// Free cells keep their list order, remapped to the new grid width, and cells that did not
    /// exist before are appended in row-major order.
    fn rebuild(&mut self, new_grid: Size) {
        let old_grid = self.grid_size;
        let mut grid = vec![END; new_grid.area() as usize];
        let mut head = END;
        let mut tail = END;
        let mut push = |grid: &mut Vec<u32>, cell: u32| {
            if tail == END {
                head = cell;
            } else {
                grid[tail as usize] = cell;
            }
            tail = cell;
        };

        let mut cell = self.first_free;
        while cell != END {
            let (column, row) = (cell % old_grid.width, cell / old_grid.width);
            push(&mut grid, row * new_grid.width + column);
            cell = self.grid[cell as usize];
        }
        for row in 0..new_grid.height {
            for column in 0..new_grid.width {
                if row >= old_grid.height || column >= old_grid.width {
                    push(&mut grid, row * new_grid.width + column);
                }
            }
        }

        self.grid = grid;
        self.first_free = head;
        self.grid_size = new_grid;
    }
}

fn grid_size(size: Size, cell_size: Size) -> Size {
    Size::new(size.width / cell_size.width, size.height / cell_size.height)
}

impl AreaAllocator for UniformAllocator {
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
        let footprint = self.config.footprint(size);
        if !footprint.fits_in(self.cell_size) {
            log::trace!("{footprint} does not fit in a {} cell", self.cell_size);
            return None;
        }
        if self.first_free == END {
            log::trace!("all {} cells are allocated", self.grid_size);
            return None;
        }

        let cell = self.first_free;
        self.first_free = self.grid[cell as usize];
        self.grid[cell as usize] = END;

        let (column, row) = (cell % self.grid_size.width, cell / self.grid_size.width);
        // Cell origins lie inside the size, which is clamped to `i32::MAX`.
        Some(Rect::from_origin_size(
            (column * self.cell_size.width) as i32,
            (row * self.cell_size.height) as i32,
            self.config.round(size),
        ))
    }

    fn release(&mut self, rect: Rect) {
        let Some(cell) = self.cell_index(rect) else {
            log::warn!("ignoring release of {rect}, which is not a cell of this grid");
            return;
        };
        self.grid[cell as usize] = self.first_free;
        self.first_free = cell;
    }

    fn expand(&mut self, new_size: Size) -> Result<(), AllocError> {
        check_expand(self.size, new_size)?;
        let new_grid = grid_size(new_size, self.cell_size);
        if new_grid.area() >= u64::from(END) {
            return Err(AllocError::Overflow {
                size: self.size,
                delta: Size::new(
                    new_size.width - self.size.width,
                    new_size.height - self.size.height,
                ),
            });
        }

        log::debug!(
            "expanding uniform allocator from {} to {new_size} ({} to {new_grid} cells)",
            self.size,
            self.grid_size
        );
        if new_grid != self.grid_size {
            self.rebuild(new_grid);
        }
        self.size = new_size;
        Ok(())
    }

    /// The area along the right and bottom edges not covered by whole cells.
    fn overhead(&self) -> u64 {
        let covered = Size::new(
            self.grid_size.width * self.cell_size.width,
            self.grid_size.height * self.cell_size.height,
        );
        self.size.area() - covered.area()
    }
}

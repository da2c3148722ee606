// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A guillotine allocator backed by a binary space partition tree.
//!
//! Every node of the tree covers a rectangle. Interior nodes are split in two by a single cut
//! spanning their full width or height, so the children partition the parent exactly. Leaves are
//! either free or hold exactly one allocation whose footprint is the leaf's rectangle.
//!
//! Allocating walks the tree, skipping subtrees whose `largest_free` bound is too small, and
//! carves the request out of the first free leaf that fits. Releasing frees the leaf and merges
//! it with its sibling for as long as both halves of a split are free, so a sequence of matching
//! allocate/release calls returns the tree to its original shape.

use crate::allocator::{check_expand, clamp_extent, AllocatorConfig, AreaAllocator};
use crate::error::AllocError;
use crate::geometry::{Rect, Size};
use smallvec::{smallvec, SmallVec};

// ---------------------------------------------------------------------------
// Node storage
// ---------------------------------------------------------------------------

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
struct NodeIndex(u32);

impl NodeIndex {
    const NONE: Self = Self(u32::MAX);

    fn index(self) -> usize {
        self.0 as usize
    }

    fn is_none(self) -> bool {
        self == Self::NONE
    }

    fn is_some(self) -> bool {
        self != Self::NONE
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
enum NodeKind {
    /// A leaf with no allocation.
    Free,
    /// A leaf holding one allocation.
    Occupied,
    /// An interior node with two children.
    Split,
    /// A recycled slot in the node arena.
    Unused,
}

/// The direction of a guillotine cut.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
enum Split {
    /// A vertical cut: the left child keeps the low x range.
    OnX,
    /// A horizontal cut: the left child keeps the low y range.
    OnY,
}

#[derive(Clone, Debug)]
struct Node {
    rect: Rect,
    /// Component-wise maximum size of the free leaves in this subtree.
    largest_free: Size,
    /// Non-owning back reference, only used to walk upwards.
    parent: NodeIndex,
    /// First child. For unused nodes, the next slot of the unused chain.
    left: NodeIndex,
    right: NodeIndex,
    kind: NodeKind,
    /// The rectangle size handed out for an occupied leaf, without the margin.
    allocated: Size,
}

impl Node {
    fn free(rect: Rect, parent: NodeIndex) -> Self {
        Self {
            rect,
            largest_free: rect.size(),
            parent,
            left: NodeIndex::NONE,
            right: NodeIndex::NONE,
            kind: NodeKind::Free,
            allocated: Size::ZERO,
        }
    }
}

// ---------------------------------------------------------------------------
// GeneralAllocator
// ---------------------------------------------------------------------------

/// A general purpose allocator that splits free space on allocation and merges it on release.
///
/// Free leaves are cut along the axis that leaves the larger leftover strip as one rectangle:
/// with `dw` and `dh` the leftover width and height, a vertical cut comes first when
/// `dw >= dh`, a horizontal one otherwise. The policy is fixed so that the same sequence of calls
/// always produces the same placements.
///
/// [`release`](AreaAllocator::release) locates the allocation by descending the tree and only
/// accepts a rectangle equal to the one `allocate` returned, so rectangles that are not live are
/// detected, logged and ignored.
#[derive(Debug, Clone)]
pub struct GeneralAllocator {
    size: Size,
    config: AllocatorConfig,
    nodes: Vec<Node>,
    root: NodeIndex,
    unused_nodes: NodeIndex,
}

impl GeneralAllocator {
    /// Create an allocator covering `size` with the default configuration.
    pub fn new(size: Size) -> Self {
        Self::with_config(size, AllocatorConfig::default())
    }

    /// Create an allocator covering `size`.
    pub fn with_config(size: Size, config: AllocatorConfig) -> Self {
        let size = clamp_extent(size);
        Self {
            size,
            config,
            nodes: vec![Node::free(
                Rect::from_origin_size(0, 0, size),
                NodeIndex::NONE,
            )],
            root: NodeIndex(0),
            unused_nodes: NodeIndex::NONE,
        }
    }

    /// The number of nodes currently in the tree.
    pub fn node_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| node.kind != NodeKind::Unused)
            .count()
    }

    /// The total area of all free regions, regardless of whether they are usable.
    pub fn free_area(&self) -> u64 {
        self.nodes
            .iter()
            .filter(|node| node.kind == NodeKind::Free)
            .map(|node| node.rect.size().area())
            .sum()
    }

    /// The largest free extent in each dimension.
    ///
    /// No single free region is wider or taller than this, but the two maxima may come from
    /// different regions.
    pub fn largest_free(&self) -> Size {
        self.nodes[self.root.index()].largest_free
    }

    // ----- internal helpers -----

    fn find_free_leaf(&self, footprint: Size) -> NodeIndex {
        let mut stack: SmallVec<[NodeIndex; 32]> = smallvec![self.root];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id.index()];
            if !footprint.fits_in(node.largest_free) {
                continue;
            }
            match node.kind {
                NodeKind::Free => return id,
                NodeKind::Split => {
                    // Visit the left child first.
                    stack.push(node.right);
                    stack.push(node.left);
                }
                NodeKind::Occupied | NodeKind::Unused => {}
            }
        }
        NodeIndex::NONE
    }

    /// Carve `footprint` out of the free leaf `leaf` for an allocation of `allocated`, returning
    /// the occupied node.
    fn place(&mut self, leaf: NodeIndex, footprint: Size, allocated: Size) -> NodeIndex {
        let rect = self.nodes[leaf.index()].rect;
        debug_assert_eq!(
            self.nodes[leaf.index()].kind,
            NodeKind::Free,
            "placement target must be a free leaf"
        );
        debug_assert!(
            footprint.fits_in(rect.size()),
            "placement target must be large enough"
        );

        let dw = rect.width - footprint.width;
        let dh = rect.height - footprint.height;

        let occupied = match (dw, dh) {
            (0, 0) => leaf,
            (_, 0) => self.split(leaf, Split::OnX, footprint.width).0,
            (0, _) => self.split(leaf, Split::OnY, footprint.height).0,
            _ if dw >= dh => {
                let (column, _) = self.split(leaf, Split::OnX, footprint.width);
                self.split(column, Split::OnY, footprint.height).0
            }
            _ => {
                let (row, _) = self.split(leaf, Split::OnY, footprint.height);
                self.split(row, Split::OnX, footprint.width).0
            }
        };

        let node = &mut self.nodes[occupied.index()];
        node.kind = NodeKind::Occupied;
        node.largest_free = Size::ZERO;
        node.allocated = allocated;
        occupied
    }

    /// Cut the free leaf `id` at offset `at` along `split`, returning the two new free leaves.
    ///
    /// Offsets are bounded by the allocator size, which never exceeds `i32::MAX`.
    fn split(&mut self, id: NodeIndex, split: Split, at: u32) -> (NodeIndex, NodeIndex) {
        let rect = self.nodes[id.index()].rect;
        let (left_rect, right_rect) = match split {
            Split::OnX => (
                Rect::new(rect.x, rect.y, at, rect.height),
                Rect::new(rect.x + at as i32, rect.y, rect.width - at, rect.height),
            ),
            Split::OnY => (
                Rect::new(rect.x, rect.y, rect.width, at),
                Rect::new(rect.x, rect.y + at as i32, rect.width, rect.height - at),
            ),
        };

        let left = self.new_node(Node::free(left_rect, id));
        let right = self.new_node(Node::free(right_rect, id));

        let node = &mut self.nodes[id.index()];
        node.kind = NodeKind::Split;
        node.left = left;
        node.right = right;
        (left, right)
    }

    /// Create a split node over `rect` whose children are the existing subtrees `left` and
    /// `right`.
    fn wrap(&mut self, left: NodeIndex, right: NodeIndex, rect: Rect) -> NodeIndex {
        let id = self.new_node(Node {
            rect,
            largest_free: Size::ZERO,
            parent: NodeIndex::NONE,
            left,
            right,
            kind: NodeKind::Split,
            allocated: Size::ZERO,
        });
        self.nodes[left.index()].parent = id;
        self.nodes[right.index()].parent = id;
        let largest_free = self.compute_largest_free(id);
        self.nodes[id.index()].largest_free = largest_free;
        id
    }

    /// Find the occupied leaf holding exactly the allocation `rect`.
    fn find_occupied(&self, rect: Rect) -> Option<NodeIndex> {
        let mut id = self.root;
        loop {
            let node = &self.nodes[id.index()];
            if !node.rect.contains_point(rect.x, rect.y) {
                return None;
            }
            match node.kind {
                NodeKind::Split => {
                    let left = node.left;
                    id = if self.nodes[left.index()].rect.contains_point(rect.x, rect.y) {
                        left
                    } else {
                        node.right
                    };
                }
                NodeKind::Occupied
                    if node.rect.x == rect.x
                        && node.rect.y == rect.y
                        && node.allocated == rect.size() =>
                {
                    return Some(id);
                }
                _ => return None,
            }
        }
    }

    fn compute_largest_free(&self, id: NodeIndex) -> Size {
        let node = &self.nodes[id.index()];
        match node.kind {
            NodeKind::Free => node.rect.size(),
            NodeKind::Occupied | NodeKind::Unused => Size::ZERO,
            NodeKind::Split => self.nodes[node.left.index()]
                .largest_free
                .component_max(self.nodes[node.right.index()].largest_free),
        }
    }

    /// Recompute `largest_free` from `id` up to the root.
    fn refresh_upwards(&mut self, mut id: NodeIndex) {
        while id.is_some() {
            let largest_free = self.compute_largest_free(id);
            let node = &mut self.nodes[id.index()];
            node.largest_free = largest_free;
            id = node.parent;
        }
    }

    fn new_node(&mut self, node: Node) -> NodeIndex {
        let id = self.unused_nodes;
        if id.is_some() {
            debug_assert_eq!(
                self.nodes[id.index()].kind,
                NodeKind::Unused,
                "reused node must have been Unused"
            );
            self.unused_nodes = self.nodes[id.index()].left;
            self.nodes[id.index()] = node;
            return id;
        }

        self.nodes.push(node);
        NodeIndex(self.nodes.len() as u32 - 1)
    }

    fn mark_node_unused(&mut self, id: NodeIndex) {
        debug_assert!(
            self.nodes[id.index()].kind != NodeKind::Unused,
            "node to mark unused must not already be Unused"
        );
        let node = &mut self.nodes[id.index()];
        node.kind = NodeKind::Unused;
        node.largest_free = Size::ZERO;
        node.allocated = Size::ZERO;
        node.parent = NodeIndex::NONE;
        node.right = NodeIndex::NONE;
        node.left = self.unused_nodes;
        self.unused_nodes = id;
    }

    /// Check the structural invariants of the tree, panicking on the first violation.
    #[cfg(test)]
    fn validate(&self) {
        let root = &self.nodes[self.root.index()];
        assert!(root.parent.is_none());
        assert_eq!(root.rect, Rect::from_origin_size(0, 0, self.size));

        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id.index()];
            assert_ne!(node.kind, NodeKind::Unused);
            assert_eq!(node.largest_free, self.compute_largest_free(id));
            if node.kind != NodeKind::Split {
                continue;
            }
            let left = &self.nodes[node.left.index()];
            let right = &self.nodes[node.right.index()];
            assert_eq!(left.parent, id);
            assert_eq!(right.parent, id);
            assert!(node.rect.contains_rect(left.rect));
            assert!(node.rect.contains_rect(right.rect));
            assert!(!left.rect.intersects(right.rect));
            assert_eq!(
                left.rect.size().area() + right.rect.size().area(),
                node.rect.size().area()
            );
            assert!(
                !(left.kind == NodeKind::Free && right.kind == NodeKind::Free),
                "two free siblings must have been merged"
            );
            stack.push(node.left);
            stack.push(node.right);
        }
    }
}

impl AreaAllocator for GeneralAllocator {
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

        let leaf = self.find_free_leaf(footprint);
        if leaf.is_none() {
            log::trace!("no free region for {footprint}");
            return None;
        }

        let occupied = self.place(leaf, footprint, rounded);
        self.refresh_upwards(occupied);

        let rect = self.nodes[occupied.index()].rect;
        Some(Rect::from_origin_size(rect.x, rect.y, rounded))
    }

    fn release(&mut self, rect: Rect) {
        let Some(leaf) = self.find_occupied(rect) else {
            log::warn!("ignoring release of {rect}, which is not a live allocation");
            return;
        };

        let node = &mut self.nodes[leaf.index()];
        node.kind = NodeKind::Free;
        node.allocated = Size::ZERO;
        let mut id = leaf;
        loop {
            let parent = self.nodes[id.index()].parent;
            if parent.is_none() {
                break;
            }
            let left = self.nodes[parent.index()].left;
            let right = self.nodes[parent.index()].right;
            if self.nodes[left.index()].kind != NodeKind::Free
                || self.nodes[right.index()].kind != NodeKind::Free
            {
                break;
            }

            self.mark_node_unused(left);
            self.mark_node_unused(right);
            let node = &mut self.nodes[parent.index()];
            node.kind = NodeKind::Free;
            node.left = NodeIndex::NONE;
            node.right = NodeIndex::NONE;
            id = parent;
        }

        self.refresh_upwards(id);
    }

    fn expand(&mut self, new_size: Size) -> Result<(), AllocError> {
        check_expand(self.size, new_size)?;
        if new_size == self.size {
            return Ok(());
        }
        log::debug!("expanding general allocator from {} to {new_size}", self.size);

        let old = self.size;
        let root = self.root;
        if self.nodes[root.index()].kind == NodeKind::Free {
            let node = &mut self.nodes[root.index()];
            node.rect = Rect::from_origin_size(0, 0, new_size);
            node.largest_free = new_size;
        } else {
            let mut top = root;
            if new_size.height > old.height {
                let bottom = self.new_node(Node::free(
                    Rect::new(
                        0,
                        old.height as i32,
                        old.width,
                        new_size.height - old.height,
                    ),
                    NodeIndex::NONE,
                ));
                top = self.wrap(top, bottom, Rect::new(0, 0, old.width, new_size.height));
            }
            if new_size.width > old.width {
                let right = self.new_node(Node::free(
                    Rect::new(
                        old.width as i32,
                        0,
                        new_size.width - old.width,
                        new_size.height,
                    ),
                    NodeIndex::NONE,
                ));
                top = self.wrap(top, right, Rect::from_origin_size(0, 0, new_size));
            }
            self.root = top;
        }
        self.size = new_size;
        Ok(())
    }

    /// The total area of free regions too small to hold even the smallest possible footprint.
    ///
    /// Releasing everything merges the tree back into one region and brings this back to its
    /// initial value. A release followed by a matching allocation does not always do so: the
    /// allocation can cut a new sliver out of the merged region, as a 12x8 area with an 8x8
    /// minimum allocation shows (0 before the first allocation, 32 after the second).
    fn overhead(&self) -> u64 {
        let min_footprint = self.config.min_footprint();
        self.nodes
            .iter()
            .filter(|node| {
                node.kind == NodeKind::Free
                    && !node.rect.is_empty()
                    && !min_footprint.fits_in(node.rect.size())
            })
            .map(|node| node.rect.size().area())
            .sum()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

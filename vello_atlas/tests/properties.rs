// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Randomized allocate/release sequences checked against the invariants every strategy shares.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use vello_atlas::{
    new_allocator, AllocatorConfig, AllocatorKind, AreaAllocator, Checked, GeneralAllocator,
    Rect, SimpleAllocator, Size, UniformAllocator,
};

const SEED: u64 = 0x5eed;

fn kinds() -> [AllocatorKind; 3] {
    [
        AllocatorKind::Simple,
        AllocatorKind::General,
        AllocatorKind::Uniform {
            cell_size: Size::new(24, 24),
        },
    ]
}

fn configs() -> [AllocatorConfig; 3] {
    [
        AllocatorConfig::default(),
        AllocatorConfig {
            minimum_allocation: Size::new(4, 4),
            margin: Size::ZERO,
        },
        AllocatorConfig {
            minimum_allocation: Size::new(2, 8),
            margin: Size::new(1, 2),
        },
    ]
}

fn assert_in_bounds(rect: Rect, size: Size) {
    assert!(rect.x >= 0 && rect.y >= 0, "{rect} has a negative origin");
    assert!(
        rect.right() <= i64::from(size.width) && rect.bottom() <= i64::from(size.height),
        "{rect} is outside of {size}"
    );
}

/// Run a random sequence of operations, checking non-overlap, bounds and rounding after every
/// allocation.
fn exercise(kind: AllocatorKind, config: AllocatorConfig, rng: &mut SmallRng, expand: bool) {
    let mut alloc = Checked::new(new_allocator(kind, Size::new(256, 256), config));
    for step in 0..2000 {
        if expand && step == 1000 {
            let size = alloc.size();
            alloc
                .expand(Size::new(size.width + 64, size.height + 32))
                .unwrap();
        }

        if rng.random_bool(0.35) && alloc.live_count() > 0 {
            let live: Vec<Rect> = alloc.live().collect();
            let rect = live[rng.random_range(0..live.len())];
            alloc.try_release(rect).unwrap();
            continue;
        }

        let request = Size::new(rng.random_range(1..=20), rng.random_range(1..=20));
        let Some(rect) = alloc.allocate(request) else {
            continue;
        };
        assert_in_bounds(rect, alloc.size());
        let rounded = config.round(request);
        assert!(
            rounded.fits_in(rect.size()),
            "{rect} is smaller than the rounded request {rounded}"
        );
        for other in alloc.live() {
            assert!(
                other == rect || !other.intersects(rect),
                "{rect} overlaps {other}"
            );
        }
    }
}

#[test]
fn random_sequences_never_overlap() {
    let mut rng = SmallRng::seed_from_u64(SEED);
    for kind in kinds() {
        for config in configs() {
            exercise(kind, config, &mut rng, false);
        }
    }
}

#[test]
fn random_sequences_across_expand() {
    let mut rng = SmallRng::seed_from_u64(SEED + 1);
    for kind in kinds() {
        for config in configs() {
            exercise(kind, config, &mut rng, true);
        }
    }
}

#[test]
fn margins_keep_placements_apart() {
    let config = AllocatorConfig {
        minimum_allocation: Size::new(1, 1),
        margin: Size::new(3, 3),
    };
    for kind in [AllocatorKind::Simple, AllocatorKind::General] {
        let mut alloc = new_allocator(kind, Size::new(128, 128), config);
        let mut rects = Vec::new();
        while let Some(rect) = alloc.allocate(Size::new(9, 7)) {
            rects.push(rect);
        }
        assert!(!rects.is_empty());
        for (i, a) in rects.iter().enumerate() {
            let padded = Rect::new(a.x, a.y, a.width + 3, a.height + 3);
            for b in &rects[i + 1..] {
                assert!(!padded.intersects(*b), "{b} is inside the margin of {a}");
            }
        }
    }
}

#[test]
fn general_and_uniform_reclaim_released_space() {
    let mut general = GeneralAllocator::new(Size::new(256, 256));
    let mut uniform = UniformAllocator::new(Size::new(256, 256), Size::new(32, 32));
    let allocators: [(&mut dyn AreaAllocator, Size); 2] = [
        (&mut general, Size::new(40, 24)),
        (&mut uniform, Size::new(32, 32)),
    ];
    for (alloc, request) in allocators {
        let r = alloc.allocate(request).unwrap();
        let after_first = alloc.overhead();
        alloc.release(r);
        let r2 = alloc.allocate(request).unwrap();
        assert_eq!(r2.size(), r.size());
        assert_eq!(alloc.overhead(), after_first);
    }
}

#[test]
fn general_releases_everything_back_to_one_region() {
    let mut rng = SmallRng::seed_from_u64(SEED + 2);
    let mut alloc = GeneralAllocator::new(Size::new(512, 512));
    let mut live = Vec::new();
    for _ in 0..500 {
        let size = Size::new(rng.random_range(1..=64), rng.random_range(1..=64));
        if let Some(rect) = alloc.allocate(size) {
            live.push(rect);
        }
    }
    assert!(alloc.free_area() < 512 * 512);
    while !live.is_empty() {
        let rect = live.swap_remove(rng.random_range(0..live.len()));
        alloc.release(rect);
    }
    assert_eq!(alloc.node_count(), 1);
    assert_eq!(alloc.free_area(), 512 * 512);
    assert_eq!(
        alloc.allocate(Size::new(512, 512)),
        Some(Rect::new(0, 0, 512, 512))
    );
}

#[test]
fn general_merges_split_siblings() {
    // A horizontal leftover is cut on x, a vertical one on y.
    for (area, block, doubled) in [
        (Size::new(32, 16), Size::new(16, 16), Size::new(32, 16)),
        (Size::new(16, 32), Size::new(16, 16), Size::new(16, 32)),
    ] {
        let mut alloc = GeneralAllocator::new(area);
        let a = alloc.allocate(block).unwrap();
        let b = alloc.allocate(block).unwrap();
        assert!(!a.intersects(b));
        assert!(alloc.allocate(doubled).is_none());
        alloc.release(a);
        assert!(alloc.allocate(doubled).is_none());
        alloc.release(b);
        assert_eq!(
            alloc.allocate(doubled),
            Some(Rect::from_origin_size(0, 0, doubled))
        );
    }
}

#[test]
fn simple_cursor_is_monotonic() {
    let mut rng = SmallRng::seed_from_u64(SEED + 3);
    let mut alloc = SimpleAllocator::new(Size::new(200, 200));
    let mut previous = (0, 0);
    let mut seen = Vec::new();
    for _ in 0..300 {
        let size = Size::new(rng.random_range(1..=30), rng.random_range(1..=30));
        if let Some(rect) = alloc.allocate(size) {
            assert!(!seen.iter().any(|other: &Rect| other.intersects(rect)));
            seen.push(rect);
            if rng.random_bool(0.5) {
                alloc.release(rect);
            }
        }
        let (column, row) = alloc.cursor();
        assert!(row > previous.1 || (row == previous.1 && column >= previous.0));
        previous = (column, row);
    }
}

#[test]
fn uniform_grid_saturates() {
    let cell = Size::new(10, 20);
    let mut alloc = UniformAllocator::new(Size::new(95, 85), cell);
    let n = (alloc.grid_size().width * alloc.grid_size().height) as usize;
    assert_eq!(n, 9 * 4);

    let rects: Vec<Rect> = (0..n).map(|_| alloc.allocate(cell).unwrap()).collect();
    assert!(alloc.allocate(cell).is_none());
    assert!(alloc.allocate(Size::new(1, 1)).is_none());

    alloc.release(rects[17]);
    assert_eq!(alloc.allocate(cell), Some(rects[17]));
    assert!(alloc.allocate(cell).is_none());
}

#[test]
fn end_to_end_general_256() {
    let mut alloc = new_allocator(
        AllocatorKind::General,
        Size::new(256, 256),
        AllocatorConfig::default(),
    );
    let rect = alloc.allocate(Size::new(10, 10)).unwrap();
    assert_eq!(rect.size(), Size::new(10, 10));
    assert_in_bounds(rect, Size::new(256, 256));
    assert_eq!(alloc.allocate(Size::new(250, 250)).unwrap_or_default(), Rect::ZERO);
}

#[test]
fn expanded_area_is_usable_immediately() {
    for kind in kinds() {
        let mut alloc = new_allocator(kind, Size::new(48, 48), AllocatorConfig::default());
        while alloc.allocate(Size::new(24, 24)).is_some() {}
        assert!(alloc.expand(Size::new(32, 48)).is_err());
        alloc.expand_by(Size::new(0, 24)).unwrap();
        assert_eq!(alloc.size(), Size::new(48, 72));
        let rect = alloc.allocate(Size::new(24, 24)).unwrap();
        assert_in_bounds(rect, alloc.size());
        assert!(rect.y >= 48);
    }
}

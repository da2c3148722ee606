// Copyright 2025 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{black_box, Criterion};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use vello_atlas::{new_allocator, AllocatorConfig, AllocatorKind, AreaAllocator, Rect, Size};

use crate::SEED;

const ATLAS_SIZE: Size = Size::new(4096, 4096);
const CELL_SIZE: Size = Size::new(128, 128);

const KINDS: [(&str, AllocatorKind); 3] = [
    ("simple", AllocatorKind::Simple),
    ("general", AllocatorKind::General),
    (
        "uniform",
        AllocatorKind::Uniform {
            cell_size: CELL_SIZE,
        },
    ),
];

fn make_atlas(kind: AllocatorKind) -> Box<dyn AreaAllocator> {
    new_allocator(kind, ATLAS_SIZE, AllocatorConfig::default())
}

pub fn allocator(c: &mut Criterion) {
    allocate_varied(c);
    allocate_until_full(c);
    alloc_release_churn(c);
    expand_full_atlas(c);
}

fn random_sizes(count: usize, min: u32, max: u32) -> Vec<Size> {
    let mut rng = SmallRng::from_seed(SEED);
    (0..count)
        .map(|_| Size::new(rng.random_range(min..=max), rng.random_range(min..=max)))
        .collect()
}

/// Allocate 1000 rectangles with random sizes between 8x8 and 128x128.
fn allocate_varied(c: &mut Criterion) {
    let sizes = random_sizes(1000, 8, 128);

    let mut g = c.benchmark_group("allocator");
    for (name, kind) in KINDS {
        g.bench_function(format!("{name}/alloc_1000_varied_8_128"), |b| {
            b.iter(|| {
                let mut atlas = make_atlas(kind);
                for &size in &sizes {
                    black_box(atlas.allocate(size));
                }
            });
        });
    }
    g.finish();
}

/// Pack as many 32x32 tiles as possible until the atlas is full.
fn allocate_until_full(c: &mut Criterion) {
    let mut g = c.benchmark_group("allocator");
    for (name, kind) in KINDS {
        g.bench_function(format!("{name}/alloc_until_full_32x32"), |b| {
            b.iter(|| {
                let mut atlas = make_atlas(kind);
                let mut count = 0_u32;
                while atlas.allocate(Size::new(32, 32)).is_some() {
                    count += 1;
                }
                black_box(count);
            });
        });
    }
    g.finish();
}

/// Steady-state churn: allocate 500 rects, then repeatedly release one and allocate a new one
/// (500 cycles). Measures reuse and merge performance under typical glyph-cache turnover.
fn alloc_release_churn(c: &mut Criterion) {
    let sizes = random_sizes(1000, 16, 64);

    let mut g = c.benchmark_group("allocator");
    for (name, kind) in KINDS {
        g.bench_function(format!("{name}/churn_500_steady_state"), |b| {
            b.iter(|| {
                let mut atlas = make_atlas(kind);
                let mut live: Vec<Rect> = Vec::new();

                for &size in sizes.iter().take(500) {
                    if let Some(rect) = atlas.allocate(size) {
                        live.push(rect);
                    }
                }

                let mut rng = SmallRng::from_seed(SEED);
                for &size in sizes.iter().skip(500) {
                    if !live.is_empty() {
                        let idx = rng.random_range(0..live.len());
                        atlas.release(live.swap_remove(idx));
                    }
                    if let Some(rect) = atlas.allocate(size) {
                        live.push(rect);
                    }
                }
                black_box(&live);
            });
        });
    }
    g.finish();
}

/// Fill a 1024x1024 atlas with 64x64 tiles, then double it and keep filling.
fn expand_full_atlas(c: &mut Criterion) {
    let mut g = c.benchmark_group("allocator");
    for (name, kind) in KINDS {
        g.bench_function(format!("{name}/expand_and_refill_64x64"), |b| {
            b.iter(|| {
                let mut atlas = new_allocator(
                    kind,
                    Size::new(1024, 1024),
                    AllocatorConfig::default(),
                );
                while atlas.allocate(Size::new(64, 64)).is_some() {}
                atlas
                    .expand(Size::new(2048, 2048))
                    .expect("expanding to a larger size succeeds");
                let mut count = 0_u32;
                while atlas.allocate(Size::new(64, 64)).is_some() {
                    count += 1;
                }
                black_box(count);
            });
        });
    }
    g.finish();
}

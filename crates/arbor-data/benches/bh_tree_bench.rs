use arbor_core::math::{Aabb, Vec3};
use arbor_core::LocaleId;
use arbor_data::spatial::{BhTree, BoundsSource};
use criterion::{criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::hint::black_box;

const LOCALE: LocaleId = LocaleId(0);

#[derive(Debug, Clone, Copy)]
struct Shape(Aabb);

impl BoundsSource for Shape {
    fn bounds(&self) -> Aabb {
        self.0
    }
    fn locale(&self) -> LocaleId {
        LOCALE
    }
}

fn scatter(count: usize) -> Vec<Shape> {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    (0..count)
        .map(|_| {
            let center = Vec3::new(
                rng.gen_range(-500.0..500.0),
                rng.gen_range(-500.0..500.0),
                rng.gen_range(-500.0..500.0),
            );
            Shape(Aabb::from_center_half_extents(center, Vec3::splat(rng.gen_range(0.5..4.0))))
        })
        .collect()
}

fn populated(shapes: &[Shape]) -> (BhTree<Shape>, Vec<i32>) {
    let mut tree = BhTree::with_seed(LOCALE, 1);
    let leaves: Vec<i32> = shapes.iter().map(|s| tree.create_leaf(*s)).collect();
    tree.build(&leaves);
    (tree, leaves)
}

fn bench_bh_tree(c: &mut Criterion) {
    let shapes = scatter(10_000);
    let mut group = c.benchmark_group("Bounding hull tree");

    group.bench_function("Bulk build (10k leaves)", |b| {
        b.iter(|| black_box(populated(&shapes).0.node_count()));
    });

    let (mut tree, leaves) = populated(&shapes);
    group.bench_function("Marked refresh (1% dirty)", |b| {
        b.iter(|| {
            for leaf in leaves.iter().step_by(100) {
                tree.bounds_changed(*leaf);
            }
            tree.update_marked();
            black_box(tree.root());
        });
    });

    let region = Aabb::from_center_half_extents(Vec3::ZERO, Vec3::splat(50.0));
    group.bench_function("Region select", |b| {
        b.iter(|| black_box(tree.select(&region).len()));
    });

    group.finish();
}

criterion_group!(benches, bench_bh_tree);
criterion_main!(benches);

//! # Component Table Benchmark
//!
//! Measures the hot paths of the entity/component core:
//! - table lookups with and without the previous-lookup cache
//! - transform resolution for flat and parented entities
//! - whole-world snapshot save/restore
//!
//! Run with: `cargo bench --package sable_core`

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sable_core::{ComponentTable, Entity, EntityKind, TransformComponent, TransformSystem, Vec2, World};

fn bench_table_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("table_lookup");

    for count in [1_000u64, 100_000] {
        let mut table: ComponentTable<TransformComponent> = ComponentTable::new("bench");
        for raw in 1..=count {
            table.add(Entity::from_raw(raw)).unwrap().z = raw as f32;
        }

        group.bench_with_input(BenchmarkId::new("scattered", count), &count, |b, &count| {
            b.iter(|| {
                let mut sum = 0.0;
                for raw in (1..=count).step_by(7) {
                    sum += table.get(Entity::from_raw(raw)).unwrap().z;
                }
                black_box(sum)
            });
        });

        group.bench_with_input(BenchmarkId::new("repeated", count), &count, |b, _| {
            let e = Entity::from_raw(count / 2);
            b.iter(|| {
                let mut sum = 0.0;
                for _ in 0..1_000 {
                    sum += table.get(e).unwrap().z;
                }
                black_box(sum)
            });
        });
    }

    group.finish();
}

fn populated_world(count: usize, parented: bool) -> World {
    let mut world = World::new();
    world.register(TransformSystem::new()).unwrap();
    let mut previous = Entity::NULL;
    for i in 0..count {
        let e = world.create_entity(EntityKind::Persistent);
        let tc = world.add_component::<TransformSystem>(e).unwrap();
        tc.position = Vec2::new(i as f32, 1.0);
        tc.rotation = 0.01;
        if parented && i % 4 != 0 {
            tc.parent = previous;
        }
        previous = e;
    }
    world
}

fn bench_transform_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("transform_tick");

    for parented in [false, true] {
        let mut world = populated_world(10_000, parented);
        let label = if parented { "parented" } else { "flat" };
        group.bench_function(label, |b| {
            b.iter(|| world.tick(black_box(0.016)));
        });
    }

    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let world = populated_world(10_000, false);
    let bytes = world.serialize();

    c.bench_function("snapshot_serialize_10k", |b| {
        b.iter(|| black_box(world.serialize()));
    });

    c.bench_function("snapshot_deserialize_10k", |b| {
        b.iter(|| {
            let mut restored = World::new();
            restored.register(TransformSystem::new()).unwrap();
            black_box(restored.deserialize(&bytes).unwrap())
        });
    });
}

criterion_group!(benches, bench_table_lookup, bench_transform_tick, bench_snapshot);
criterion_main!(benches);

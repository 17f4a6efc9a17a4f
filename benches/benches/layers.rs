// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Benchmarks for `understory_layers` on top of `understory_reactive`.

use criterion::{BatchSize, BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::sync::Once;

use understory_layers::{AliasTable, LayeredProperties};
use understory_reactive::Runtime;

type Props = LayeredProperties<u32, f64>;

const WIDTH: u32 = 0;
const FONT_SIZE: u32 = 1;
const PADDING: u32 = 2;
const PADDING_SIDES: [u32; 4] = [10, 11, 12, 13];

/// Builds `len` objects, each inheriting the previous one at layer 10.
fn chain(rt: &Runtime, len: usize) -> Vec<Props> {
    let mut nodes: Vec<Props> = Vec::with_capacity(len);
    for _ in 0..len {
        let mut builder = Props::builder(rt).default(WIDTH, -1.0);
        if let Some(parent) = nodes.last() {
            builder = builder.inherit(parent, 10);
        }
        nodes.push(builder.build());
    }
    nodes[0].set(1, WIDTH, Some(0.0));
    nodes
}

fn bench_layers(c: &mut Criterion) {
    static PRINT_SIZES: Once = Once::new();
    PRINT_SIZES.call_once(|| {
        eprintln!(
            "sizes: Runtime={} Props={}",
            core::mem::size_of::<Runtime>(),
            core::mem::size_of::<Props>(),
        );
    });

    let mut group = c.benchmark_group("layers");

    group.bench_function("set_literal_in_place", |b| {
        let rt = Runtime::new();
        let props = Props::new(&rt);
        props.set(0, WIDTH, Some(0.0));
        let mut v = 0.0;
        b.iter(|| {
            v += 1.0;
            props.set(0, WIDTH, Some(black_box(v)));
        });
    });

    group.bench_function("peek_after_write", |b| {
        let rt = Runtime::new();
        let props = Props::new(&rt);
        for layer in 0..8_u32 {
            props.set(layer * 10, WIDTH, Some(f64::from(layer)));
        }
        let mut v = 0.0;
        b.iter(|| {
            v += 1.0;
            props.set(70, WIDTH, None);
            props.set(0, WIDTH, Some(v));
            black_box(props.peek(WIDTH))
        });
    });

    group.bench_function("peek_unknown_key", |b| {
        let rt = Runtime::new();
        let props = Props::new(&rt);
        b.iter(|| black_box(props.peek(black_box(FONT_SIZE))));
    });

    group.bench_function("alias_fan_out", |b| {
        let rt = Runtime::new();
        let props = Props::builder(&rt)
            .apply(AliasTable::new().alias(PADDING, PADDING_SIDES))
            .build();
        let mut v = 0.0;
        b.iter(|| {
            v += 1.0;
            props.set(0, PADDING, Some(v));
        });
    });

    for len in [4_usize, 16, 64] {
        group.bench_with_input(
            BenchmarkId::new("inherited_write_then_leaf_peek", len),
            &len,
            |b, &len| {
                let rt = Runtime::new();
                let nodes = chain(&rt, len);
                let root = &nodes[0];
                let leaf = &nodes[len - 1];
                let mut v = 0.0;
                b.iter(|| {
                    v += 1.0;
                    root.set(0, WIDTH, Some(v));
                    black_box(leaf.peek(WIDTH))
                });
            },
        );
    }

    group.bench_function("build_and_destroy", |b| {
        let rt = Runtime::new();
        b.iter_batched(
            || Props::new(&rt),
            |props| {
                for key in 0..16_u32 {
                    props.set(0, key, Some(f64::from(key)));
                }
                props.destroy();
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

criterion_group!(benches, bench_layers);
criterion_main!(benches);

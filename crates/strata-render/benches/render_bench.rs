//! Benchmarks for render + rasterize of a full screen.
//!
//! - `full_repaint`: every cell changes each frame (worst case)
//! - `one_cell`: a single cell changes each frame (damage minimality)
//! - `idle`: nothing changes (full elision)
//! - `layered`: three blended planes over a filled standard plane
//!
//! Run with: cargo bench -p strata-render --bench render_bench

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use strata_core::capabilities::TerminalCapabilities;
use strata_core::config::RenderOptions;
use strata_core::geometry::CellPixels;
use strata_render::{Alpha, Channel, Channels, PlaneOptions, Screen, StyleMask};

const SIZES: [(u32, u32); 3] = [(24, 80), (40, 120), (60, 200)];

fn screen(rows: u32, cols: u32) -> Screen {
    let opts = RenderOptions {
        sync_threshold: None,
        ..RenderOptions::default()
    };
    Screen::new(rows, cols, CellPixels::new(16, 8), TerminalCapabilities::modern(), opts).unwrap()
}

fn fill(s: &Screen, frame: u32) {
    let std = s.std_plane();
    let (rows, cols) = s.dims();
    s.with_arena(|a| {
        let p = a.plane_mut(std).unwrap();
        for y in 0..rows {
            let rgb = ((y * 7 + frame) % 256) << 16 | (frame % 256) << 8 | 0x40;
            p.set_fg(Channel::from_rgb(rgb));
            let glyph = char::from(b'a' + ((y + frame) % 26) as u8);
            let line: String = std::iter::repeat_n(glyph, cols as usize).collect();
            p.putstr_yx(Some(y), Some(0), &line).unwrap();
        }
    });
}

fn bench_frames(c: &mut Criterion) {
    let mut group = c.benchmark_group("render/frame");
    for (rows, cols) in SIZES {
        group.throughput(Throughput::Elements(u64::from(rows * cols)));
        let label = format!("{cols}x{rows}");

        let s = screen(rows, cols);
        let mut sink = Vec::with_capacity(1 << 20);
        let mut n = 0;
        group.bench_with_input(BenchmarkId::new("full_repaint", &label), &(), |b, _| {
            b.iter(|| {
                n += 1;
                fill(&s, n);
                sink.clear();
                black_box(s.render_to(s.std_pile(), &mut sink).unwrap());
            })
        });

        let s = screen(rows, cols);
        fill(&s, 0);
        s.render_to(s.std_pile(), &mut sink).unwrap();
        let std = s.std_plane();
        let mut n = 0u32;
        group.bench_with_input(BenchmarkId::new("one_cell", &label), &(), |b, _| {
            b.iter(|| {
                n = n.wrapping_add(1);
                let glyph = char::from(b'A' + (n % 26) as u8);
                s.with_arena(|a| {
                    a.plane_mut(std)
                        .unwrap()
                        .putegc_yx(Some(n % rows), Some(n % cols), glyph.encode_utf8(&mut [0; 4]))
                        .unwrap()
                });
                sink.clear();
                black_box(s.render_to(s.std_pile(), &mut sink).unwrap());
            })
        });

        group.bench_with_input(BenchmarkId::new("idle", &label), &(), |b, _| {
            b.iter(|| {
                sink.clear();
                black_box(s.render_to(s.std_pile(), &mut sink).unwrap());
            })
        });
    }
    group.finish();
}

fn bench_layered(c: &mut Criterion) {
    let mut group = c.benchmark_group("render/layered");
    for (rows, cols) in SIZES {
        group.throughput(Throughput::Elements(u64::from(rows * cols)));
        let s = screen(rows, cols);
        fill(&s, 3);
        let std = s.std_plane();
        let planes: Vec<_> = (0..3u32)
            .map(|i| {
                s.with_arena(|a| {
                    let opts = PlaneOptions::new(rows / 2, cols / 2).at(i as i32 * 2, i as i32 * 4);
                    let n = a.create_child(std, &opts).unwrap();
                    let bg = Channel::from_rgb(0x202080 + i * 0x300000).with_alpha(Alpha::Blend);
                    a.plane_mut(n)
                        .unwrap()
                        .set_base(" ", StyleMask::empty(), Channels::new(Channel::DEFAULT, bg))
                        .unwrap();
                    n
                })
            })
            .collect();
        let mut sink = Vec::with_capacity(1 << 20);
        let mut step = 0i32;
        group.bench_with_input(BenchmarkId::new("move_blended", format!("{cols}x{rows}")), &(), |b, _| {
            b.iter(|| {
                step = (step + 1) % 8;
                s.with_arena(|a| {
                    for (i, n) in planes.iter().enumerate() {
                        a.move_yx(*n, step + i as i32, step * 2 + i as i32 * 4).unwrap();
                    }
                });
                sink.clear();
                black_box(s.render_to(s.std_pile(), &mut sink).unwrap());
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_frames, bench_layered);
criterion_main!(benches);

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use strand_core::*;

/// One source, `width` memos reading it, one effect reading all of them.
fn diamond(width: usize, writes: usize) {
    let (source, set_source) = create_signal(0usize);
    let total = std::rc::Rc::new(std::cell::Cell::new(0usize));

    let root = create_root(|root| {
        let memos: Vec<_> = (0..width)
            .map(|i| create_memo(move || source.get() + i))
            .collect();
        let total = total.clone();
        create_render_effect(move || total.set(memos.iter().map(|m| m.get()).sum()));
        root
    });

    for i in 1..=writes {
        set_source.set(i);
    }
    black_box(total.get());
    root.dispose();
    set_source.dispose();
}

/// `count` signals written in one batch, one effect reading all of them.
fn batched_writes(count: usize) {
    let signals: Vec<_> = (0..count).map(create_signal).collect();
    let runs = std::rc::Rc::new(std::cell::Cell::new(0usize));

    let reads: Vec<_> = signals.iter().map(|(read, _)| *read).collect();
    let r = runs.clone();
    let effect = create_render_effect(move || {
        black_box(reads.iter().map(|s| s.get()).sum::<usize>());
        r.set(r.get() + 1);
    });

    batch(|| {
        for (_, write) in &signals {
            write.update(|v| *v += 1);
        }
    });
    assert_eq!(runs.get(), 2);

    effect.dispose();
    for (_, write) in &signals {
        write.dispose();
    }
}

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("diamond 10x100", |b| b.iter(|| diamond(10, 100)));
    c.bench_function("diamond 100x10", |b| b.iter(|| diamond(100, 10)));
    c.bench_function("batched_writes 100", |b| b.iter(|| batched_writes(100)));
    c.bench_function("batched_writes 1000", |b| b.iter(|| batched_writes(1000)));
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);

use async_to_promises::{Transformer, TransformOptions};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

const SOURCE: &str = r#"
async function fetchAll(urls) {
    const results = [];
    for (const url of urls) {
        try {
            const response = await fetch(url);
            if (!response.ok) continue;
            results.push(await response.json());
        } catch (error) {
            console.error(error);
        } finally {
            done(url);
        }
    }
    return results;
}
"#;

fn transform_benchmark(c: &mut Criterion) {
    let transformer = Transformer::new(TransformOptions::default());
    c.bench_function("transform_loop_with_try", |b| {
        b.iter(|| {
            black_box(transformer.transform(black_box(SOURCE)).unwrap());
        });
    });
}

criterion_group!(benches, transform_benchmark);
criterion_main!(benches);

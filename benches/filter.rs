use criterion::{Criterion, black_box, criterion_group, criterion_main};
use lensearch::filter::{FilterQuery, apply_all_filters};
use lensearch::models::cluster_pixels;
use lensearch::types::{Candidate, ProductMeta};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use serde_json::json;

const CATEGORIES: &[&str] = &["shirt", "t-shirt", "jeans", "dress", "sneakers", "watch", "bag", ""];
const COLORS: &[&str] = &["red", "maroon", "pink", "blue", "navy", "green", "white", "black", "beige"];
const GENDERS: &[&str] = &["men", "women", "unisex", "kids"];

// 生成随机候选列表，相似度从高到低
fn generate_candidates(n: usize) -> Vec<Candidate> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..n)
        .map(|i| {
            let count = rng.random_range(0..3);
            let colors: Vec<&str> = COLORS.choose_multiple(&mut rng, count).copied().collect();
            let meta = ProductMeta::from(json!({
                "category": CATEGORIES.choose(&mut rng),
                "attributes": {"colors": colors, "gender": GENDERS.choose(&mut rng)},
            }));
            Candidate::new(format!("P{i:06}"), 1.0 - i as f32 / n as f32, meta)
        })
        .collect()
}

fn bench_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply_all_filters");

    let queries = [
        ("category_color", FilterQuery::default().category("shirt").colors(["red"])),
        (
            "fallback_categories",
            FilterQuery::default().categories(["dress", "lowerwear"]).colors(["navy", "white"]),
        ),
        ("gender", FilterQuery::default().colors(["beige"]).gender(Some("women"))),
        ("fallback", FilterQuery::default().category("jacket").colors(["olive"])),
    ];

    for n in [500, 5000] {
        let candidates = black_box(generate_candidates(n));
        for (name, query) in &queries {
            group.bench_function(format!("{name}_{n}"), |b| {
                b.iter(|| apply_all_filters(&candidates, query, 10))
            });
        }
    }

    group.finish();
}

fn bench_kmeans(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(42);
    // 100x100 缩略图的像素数量
    let pixels: Vec<[u8; 3]> = (0..10000).map(|_| rng.random()).collect();
    let pixels = black_box(pixels);

    c.bench_function("cluster_pixels_10000_5", |b| b.iter(|| cluster_pixels(&pixels, 5, 50)));
}

criterion_group!(benches, bench_filter, bench_kmeans);
criterion_main!(benches);

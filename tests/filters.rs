use std::collections::HashSet;

use lensearch::filter::*;
use lensearch::types::{Candidate, ProductMeta};
use rstest::*;
use serde_json::json;

fn product(id: &str, category: &str, colors: &[&str]) -> Candidate {
    let meta = ProductMeta::from(json!({
        "category": category,
        "attributes": {"colors": colors},
    }));
    Candidate::new(id, 0.9, meta)
}

fn ids(candidates: &[Candidate]) -> Vec<&str> {
    candidates.iter().map(|c| c.product_id.as_str()).collect()
}

#[fixture]
fn shirts() -> Vec<Candidate> {
    vec![
        product("P001", "shirt", &["maroon"]),
        product("P002", "shirt", &["burgundy"]),
        product("P003", "shirt", &["blue"]),
        product("P004", "pants", &["red"]),
    ]
}

/// 混合各种类别和颜色的候选列表
#[fixture]
fn mixed() -> Vec<Candidate> {
    vec![
        product("A", "t-shirt", &["navy"]),
        product("B", "jeans", &["blue", "white"]),
        product("C", "dress", &[]),
        product("D", "Shirt", &["Crimson"]),
        product("E", "top", &["pink"]),
        product("F", "", &["red"]),
        product("G", "sneakers", &["white"]),
        product("H", "blouse", &["green"]),
    ]
}

#[rstest]
fn shirt_then_maroon(shirts: Vec<Candidate>) {
    let by_category = filter_by_category(&shirts, "shirt");
    assert_eq!(ids(&by_category), vec!["P001", "P002", "P003"]);

    let by_color = filter_by_color_tiered(&by_category, &["maroon"], true);
    assert_eq!(ids(&by_color), vec!["P001", "P002"]);
}

#[rstest]
fn jacket_green_falls_back(shirts: Vec<Candidate>) {
    let query = FilterQuery::default().category("jacket").colors(["green"]);
    let outcome = apply_all_filters(&shirts, &query, 10);
    assert!(outcome.fallback);
    assert_eq!(outcome.results, shirts);

    let outcome = apply_all_filters(&shirts, &query, 2);
    assert_eq!(ids(&outcome.results), vec!["P001", "P002"]);
}

#[rstest]
#[case("shirt")]
#[case("upperwear")]
#[case("jeans")]
#[case("Dress")]
#[case("unknown")]
#[case("")]
#[case("kurta")]
fn category_idempotent(mixed: Vec<Candidate>, #[case] category: &str) {
    let once = filter_by_category(&mixed, category);
    let twice = filter_by_category(&once, category);
    assert_eq!(once, twice);
}

#[rstest]
#[case(&["red"])]
#[case(&["blue", "white"])]
#[case(&["Navy"])]
#[case(&["fuchsia"])]
fn color_buckets_are_ordered(mixed: Vec<Candidate>, #[case] query: &[&str]) {
    let check = |input: &[Candidate]| {
        let output = filter_by_color_tiered(input, query, true);

        // 每个商品最多出现一次，且都来自输入
        let seen: HashSet<&str> = ids(&output).into_iter().collect();
        assert_eq!(seen.len(), output.len());
        assert!(output.iter().all(|c| input.contains(c)));

        // 级别单调不增，无颜色的商品排在最后
        let query: Vec<String> = query.iter().map(|q| q.to_lowercase()).collect();
        let rank = |c: &Candidate| match c.meta.colors.is_empty() {
            true => 0,
            false => best_color_tier(&query, &c.meta.colors) as u8 + 1,
        };
        let ranks: Vec<u8> = output.iter().map(rank).collect();
        assert!(ranks.windows(2).all(|w| w[0] >= w[1]), "{ranks:?}");
        assert!(!ranks.contains(&1), "无关颜色的商品应被丢弃");
        output
    };

    let forward = check(&mixed);
    let mut reversed = mixed.clone();
    reversed.reverse();
    let backward = check(&reversed);

    // 输入顺序只影响同一级别内的顺序
    let forward_set: HashSet<&str> = ids(&forward).into_iter().collect();
    let backward_set: HashSet<&str> = ids(&backward).into_iter().collect();
    assert_eq!(forward_set, backward_set);
}

#[rstest]
#[case(FilterQuery::default(), 3)]
#[case(FilterQuery::default().category("shirt"), 10)]
#[case(FilterQuery::default().category("watch").colors(["gold"]), 5)]
#[case(FilterQuery::default().colors(["purple"]).gender(Some("women")), 1)]
#[case(FilterQuery::default().categories(["dress", "lowerwear"]).colors(["white"]), 2)]
fn composite_never_empty(mixed: Vec<Candidate>, #[case] query: FilterQuery, #[case] max: usize) {
    let outcome = apply_all_filters(&mixed, &query, max);
    assert!(!outcome.results.is_empty());
    assert!(outcome.results.len() <= max);
}

#[rstest]
fn composite_order(mixed: Vec<Candidate>) {
    let query = FilterQuery::default().category("shirt").colors(["red"]);
    let outcome = apply_all_filters(&mixed, &query, 10);
    assert!(!outcome.fallback);
    // D 为相似色，E 为相关色，A 和 H 的颜色与红色无关
    assert_eq!(ids(&outcome.results), vec!["D", "E"]);
}

#[rstest]
fn low_confidence_dress_widens_categories(mixed: Vec<Candidate>) {
    let query = FilterQuery::default().categories(["dress", "lowerwear"]);
    let outcome = apply_all_filters(&mixed, &query, 10);
    assert_eq!(ids(&outcome.results), vec!["B", "C"]);
}

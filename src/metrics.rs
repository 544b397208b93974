use std::sync::LazyLock;

use prometheus::*;

static METRIC_SEARCH_IMAGE_COUNT: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!("lens_search_image_count", "count of the image to search", &["size"])
        .unwrap()
});

static METRIC_SEARCH_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "lens_search_duration",
        "duration of the per-image search in seconds",
        &["size"]
    )
    .unwrap()
});

static METRIC_REGION_COUNT: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "lens_search_region_count",
        "count of the searched regions by category",
        &["category"]
    )
    .unwrap()
});

static METRIC_REGION_SKIPPED: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!("lens_search_region_skipped", "count of the low confidence regions")
        .unwrap()
});

static METRIC_FILTER_FALLBACK: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        "lens_filter_fallback",
        "count of the searches falling back to unfiltered candidates"
    )
    .unwrap()
});

static METRIC_TOP_SCORE: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram!(
        "lens_search_top_score",
        "similarity of the best match per region",
        (0..=20).map(|x| x as f64 / 20.0).collect()
    )
    .unwrap()
});

/// 增加图像大小指标计数
pub fn inc_image_count(size: (u32, u32)) {
    METRIC_SEARCH_IMAGE_COUNT.with_label_values(&[to_fixed_size(size)]).inc();
}

pub fn inc_search_duration(size: (u32, u32), duration: f32) {
    METRIC_SEARCH_DURATION.with_label_values(&[to_fixed_size(size)]).observe(duration as f64);
}

pub fn inc_region_count(category: &str) {
    METRIC_REGION_COUNT.with_label_values(&[category]).inc();
}

pub fn inc_region_skipped() {
    METRIC_REGION_SKIPPED.inc();
}

pub fn inc_filter_fallback() {
    METRIC_FILTER_FALLBACK.inc();
}

pub fn observe_top_score(score: f32) {
    METRIC_TOP_SCORE.observe(score as f64);
}

/// 将图像面积范围调整到几个固定值
fn to_fixed_size((width, height): (u32, u32)) -> &'static str {
    let area = width as u64 * height as u64;
    if area <= 256 * 256 {
        "256"
    } else if area <= 512 * 512 {
        "512"
    } else if area <= 1024 * 1024 {
        "1024"
    } else if area <= 2048 * 2048 {
        "2048"
    } else {
        "2048+"
    }
}

use std::collections::HashMap;
use std::sync::LazyLock;

use anyhow::Result;
use image::RgbImage;
use image::imageops::{self, FilterType};
use kmeans::{EuclideanDistance, KMeans, KMeansConfig};
use log::debug;
use rand_08::SeedableRng;
use rand_08::rngs::StdRng;
use regex::Regex;

use super::ColorProfiler;

pub type Rgb = [f32; 3];

/// 聚类使用固定的随机种子，保证同一张图片的结果不变
const KMEANS_SEED: u64 = 42;
const KMEANS_MAX_ITER: usize = 50;

/// 标题中的颜色关键词：标准颜色 => 关键词
const COLOR_KEYWORDS: &[(&str, &[&str])] = &[
    ("red", &["red", "crimson", "scarlet", "cherry", "ruby"]),
    ("maroon", &["maroon", "burgundy", "wine", "bordeaux", "oxblood"]),
    ("pink", &["pink", "rose", "blush", "coral", "salmon", "fuchsia", "magenta"]),
    ("blue", &["blue", "azure", "cobalt", "sapphire", "royal blue"]),
    ("navy", &["navy", "navy blue", "midnight", "dark blue"]),
    ("teal", &["teal", "turquoise", "cyan", "aqua"]),
    ("green", &["green", "lime", "emerald", "forest", "mint", "sage"]),
    ("olive", &["olive", "army", "khaki green", "military"]),
    ("yellow", &["yellow", "gold", "golden", "lemon", "mustard", "amber"]),
    ("orange", &["orange", "tangerine", "peach", "apricot", "rust"]),
    ("white", &["white", "ivory", "cream", "off-white", "pearl", "snow"]),
    ("black", &["black", "ebony", "jet", "onyx", "charcoal black"]),
    ("grey", &["grey", "gray", "charcoal", "slate", "silver", "ash", "smoke"]),
    (
        "brown",
        &["brown", "chocolate", "coffee", "mocha", "tan", "camel", "khaki", "beige", "nude", "taupe"],
    ),
    ("purple", &["purple", "violet", "lavender", "plum", "mauve", "lilac", "orchid"]),
    ("gold", &["gold", "golden", "brass"]),
    ("silver", &["silver", "chrome", "metallic"]),
];

/// 聚类中心映射到颜色名时使用的参考色，距离相同时取靠前的
const RGB_REFERENCE: &[(&str, [u8; 3])] = &[
    ("red", [220, 20, 60]),
    ("maroon", [128, 0, 0]),
    ("pink", [255, 105, 180]),
    ("blue", [65, 105, 225]),
    ("navy", [0, 0, 128]),
    ("teal", [0, 128, 128]),
    ("green", [34, 139, 34]),
    ("olive", [128, 128, 0]),
    ("yellow", [255, 215, 0]),
    ("orange", [255, 140, 0]),
    ("white", [255, 255, 255]),
    ("black", [0, 0, 0]),
    ("grey", [128, 128, 128]),
    ("brown", [139, 69, 19]),
    ("purple", [128, 0, 128]),
    ("gold", [255, 215, 0]),
    ("silver", [192, 192, 192]),
    ("beige", [245, 245, 220]),
];

static KEYWORD_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    COLOR_KEYWORDS
        .iter()
        .map(|(color, keywords)| {
            let alternation =
                keywords.iter().map(|k| regex::escape(k)).collect::<Vec<_>>().join("|");
            let re = Regex::new(&format!(r"\b(?:{alternation})\b")).expect("invalid color pattern");
            (*color, re)
        })
        .collect()
});

/// 最多返回的颜色数量
pub const MAX_COLORS: usize = 5;

/// 从标题中按单词边界提取颜色，按关键词表顺序返回
pub fn colors_from_title(title: &str) -> Vec<String> {
    if title.is_empty() {
        return vec![];
    }
    let title = title.to_lowercase();
    KEYWORD_PATTERNS
        .iter()
        .filter(|(_, re)| re.is_match(&title))
        .map(|(color, _)| color.to_string())
        .collect()
}

/// 返回离给定 RGB 最近的参考色名称
pub fn nearest_color_name(rgb: &Rgb) -> &'static str {
    let mut min_distance = f32::MAX;
    let mut closest = RGB_REFERENCE[0].0;
    for (name, reference) in RGB_REFERENCE {
        let distance: f32 =
            rgb.iter().zip(reference).map(|(a, &b)| (a - b as f32) * (a - b as f32)).sum();
        if distance < min_distance {
            min_distance = distance;
            closest = name;
        }
    }
    closest
}

/// 对像素做 k-means 聚类，返回非空聚类的中心和像素数量
///
/// 不同的颜色不超过 `k` 种时，每种颜色直接作为一个聚类。
pub fn cluster_pixels(pixels: &[[u8; 3]], k: usize, max_iter: usize) -> Vec<(Rgb, usize)> {
    if pixels.is_empty() || k == 0 {
        return vec![];
    }

    let mut distinct: Vec<([u8; 3], usize)> = vec![];
    let mut seen: HashMap<[u8; 3], usize> = HashMap::new();
    for p in pixels {
        match seen.get(p) {
            Some(&i) => distinct[i].1 += 1,
            None if distinct.len() == k => break,
            None => {
                seen.insert(*p, distinct.len());
                distinct.push((*p, 1));
            }
        }
    }
    if distinct.iter().map(|(_, n)| n).sum::<usize>() == pixels.len() {
        return distinct.into_iter().map(|(p, n)| (p.map(f32::from), n)).collect();
    }

    let samples: Vec<f32> = pixels.iter().flat_map(|p| p.map(f32::from)).collect();
    let km: KMeans<f32, 4, _> = KMeans::new(&samples, pixels.len(), 3, EuclideanDistance);
    let conf = KMeansConfig::build().random_generator(StdRng::seed_from_u64(KMEANS_SEED)).build();
    let state = km.kmeans_lloyd(k, max_iter, KMeans::init_random_partition, &conf);

    // 中心按分配结果重新计算，不依赖内部的对齐存储
    let mut sums = vec![[0f64; 3]; state.centroid_frequency.len()];
    for (p, &a) in pixels.iter().zip(&state.assignments) {
        sums[a].iter_mut().zip(p).for_each(|(s, &x)| *s += x as f64);
    }
    state
        .centroid_frequency
        .iter()
        .zip(sums)
        .filter(|(freq, _)| **freq > 0)
        .map(|(&freq, sum)| (sum.map(|x| (x / freq as f64) as f32), freq))
        .collect()
}

/// 使用 k-means 提取图片主色，按像素占比从高到低排列
///
/// 接近纯白或纯黑的像素通常是背景，会先被剔除；剩余像素太少时使用全部像素。
/// 映射到同一颜色名的聚类合并计数。
pub fn dominant_colors(image: &RgbImage, k: usize) -> Vec<String> {
    if image.width() == 0 || image.height() == 0 {
        return vec![];
    }
    let thumb = imageops::resize(image, 100, 100, FilterType::Triangle);
    let pixels: Vec<[u8; 3]> = thumb.pixels().map(|p| p.0).collect();

    let filtered: Vec<[u8; 3]> = pixels
        .iter()
        .filter(|p| {
            let sum: u32 = p.iter().map(|&x| x as u32).sum();
            (50..=700).contains(&sum)
        })
        .copied()
        .collect();
    let data = if filtered.len() < 100 { &pixels } else { &filtered };

    let mut names: Vec<(&'static str, usize)> = vec![];
    for (centroid, freq) in cluster_pixels(data, k, KMEANS_MAX_ITER) {
        let name = nearest_color_name(&centroid.map(|x| x.trunc()));
        match names.iter_mut().find(|(n, _)| *n == name) {
            Some((_, total)) => *total += freq,
            None => names.push((name, freq)),
        }
    }
    names.sort_by(|a, b| b.1.cmp(&a.1));
    names.into_iter().map(|(name, _)| name.to_string()).collect()
}

/// 标题关键词与图片主色结合的颜色识别
#[derive(Debug, Clone, Copy)]
pub struct EnsembleColorProfiler {
    /// 聚类数量
    pub clusters: usize,
}

impl Default for EnsembleColorProfiler {
    fn default() -> Self {
        Self { clusters: 5 }
    }
}

impl ColorProfiler for EnsembleColorProfiler {
    fn profile(&self, image: &RgbImage, title: &str) -> Result<Vec<String>> {
        let mut colors = colors_from_title(title);
        let image_colors = dominant_colors(image, self.clusters);
        debug!("标题颜色: {:?}, 图片颜色: {:?}", colors, image_colors);

        for color in image_colors {
            if !colors.contains(&color) {
                colors.push(color);
            }
        }
        colors.truncate(MAX_COLORS);
        Ok(colors)
    }
}

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use anyhow::{Context, Result};
use image::RgbImage;
use log::{debug, warn};

use super::{Classifier, Embedder};
use crate::catalog::MetadataStore;
use crate::filter::AMBIGUOUS_GROUPS;
use crate::index::{Hit, VectorIndex};
use crate::types::{Classification, UNKNOWN};

/// 分类标签层级：大类 => 具体标签
pub const CATEGORY_LABELS: &[(&str, &[&str])] = &[
    (
        "upperwear",
        &["shirt", "t-shirt", "top", "blouse", "sweater", "jacket", "coat", "hoodie", "cardigan"],
    ),
    ("lowerwear", &["pants", "jeans", "trousers", "shorts", "leggings", "skirt", "palazzo"]),
    ("dress", &["dress", "gown", "jumpsuit", "romper", "saree"]),
    ("footwear", &["shoes", "sneakers", "sandals", "boots", "heels", "slippers", "loafers"]),
    (
        "accessories",
        &[
            "watch",
            "bracelet",
            "necklace",
            "earrings",
            "ring",
            "bag",
            "purse",
            "handbag",
            "backpack",
            "belt",
            "scarf",
            "hat",
            "cap",
            "sunglasses",
        ],
    ),
];

/// 具体标签 => 大类
static LABEL_TO_CATEGORY: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    let mut map = HashMap::new();
    for (category, labels) in CATEGORY_LABELS {
        // 大类名本身也作为标签
        map.insert(*category, *category);
        for label in *labels {
            map.entry(*label).or_insert(*category);
        }
    }
    map
});

/// 低于该置信度时扩展到易混淆的类别
pub const AMBIGUOUS_THRESHOLD: f32 = 0.6;

/// 返回具体标签所属的大类
pub fn category_of(label: &str) -> Option<&'static str> {
    LABEL_TO_CATEGORY.get(label).copied()
}

/// 根据分类置信度返回需要搜索的类别集合
///
/// 置信度足够时只搜索主类别，否则加入容易与之混淆的类别
pub fn fallback_categories(category: &str, confidence: f32) -> Vec<String> {
    if confidence >= AMBIGUOUS_THRESHOLD {
        return vec![category.to_string()];
    }
    match AMBIGUOUS_GROUPS.get(category) {
        Some(group) => group.iter().map(|c| c.to_string()).collect(),
        None => vec![category.to_string()],
    }
}

/// 近邻投票分类器
///
/// 用区域特征在商品库中检索最近的 `vote_k` 个商品，每个商品按相似度给自己的类别投票，
/// 得票最高的标签即为分类结果，置信度为其得票占比。无需训练。
pub struct NeighborVoteClassifier {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    catalog: Arc<dyn MetadataStore>,
    /// 参与投票的近邻数量
    pub vote_k: usize,
    /// 低于该置信度时返回 `unknown`
    pub threshold: f32,
}

impl NeighborVoteClassifier {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        catalog: Arc<dyn MetadataStore>,
    ) -> Self {
        Self { embedder, index, catalog, vote_k: 20, threshold: 0.3 }
    }

    pub fn vote_k(mut self, vote_k: usize) -> Self {
        self.vote_k = vote_k;
        self
    }

    pub fn threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// 用最相似的 `vote_k` 个商品投票
    fn vote(&self, hits: &[Hit]) -> Classification {
        // 按首次出现的顺序记录标签，保证平票时结果确定
        let mut votes: Vec<(&'static str, f32)> = vec![];
        let mut total = 0.0;
        for hit in hits.iter().take(self.vote_k) {
            let Some((_, meta)) = self.catalog.get_metadata(hit.key) else {
                continue;
            };
            let Some((label, _)) = LABEL_TO_CATEGORY.get_key_value(meta.category.as_str()) else {
                continue;
            };
            let weight = hit.score.max(0.0);
            total += weight;
            match votes.iter_mut().find(|(l, _)| l == label) {
                Some((_, w)) => *w += weight,
                None => votes.push((label, weight)),
            }
        }

        let best = votes.into_iter().fold(None, |best: Option<(&str, f32)>, (label, w)| match best {
            Some((_, bw)) if bw >= w => best,
            _ => Some((label, w)),
        });
        let Some((label, weight)) = best.filter(|_| total > 0.0) else {
            debug!("近邻中没有可识别的类别");
            return Classification::unknown(UNKNOWN, 0.0);
        };

        let confidence = weight / total;
        let category = category_of(label).unwrap_or(label);
        if confidence < self.threshold {
            warn!("分类置信度过低: {label} ({confidence:.2})");
            return Classification::unknown(label, confidence);
        }
        debug!("分类结果: {category}/{label} ({confidence:.2})");
        Classification { category: category.to_string(), specific_label: label.to_string(), confidence }
    }
}

impl Classifier for NeighborVoteClassifier {
    fn classify(&self, image: &RgbImage) -> Result<Classification> {
        let v = self.embedder.embed(image).context("embedder failed")?;
        let hits = self.index.search(&v, self.vote_k).context("vector index failed")?;
        Ok(self.vote(&hits))
    }

    /// 直接复用已有的检索结果，不再重复提取特征和检索
    fn classify_with_hits(&self, _image: &RgbImage, hits: &[Hit]) -> Result<Classification> {
        Ok(self.vote(hits))
    }
}

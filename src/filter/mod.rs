//! 向量检索之后的过滤与分级排序
//!
//! 过滤顺序固定为：类别 => 分级颜色 => 性别 => 截断。
//! 所有过滤函数都不修改输入，返回新的序列，并保持同一级别内的相对顺序。

pub mod tables;

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

pub use self::tables::*;
use crate::metrics;
use crate::types::{Candidate, UNKNOWN};

/// 颜色匹配级别，越大越接近
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ColorTier {
    None,
    Related,
    Similar,
    Exact,
}

/// 计算查询颜色与商品颜色的匹配级别，两者都应为小写
pub fn color_tier(query: &str, color: &str) -> ColorTier {
    if query == color {
        return ColorTier::Exact;
    }
    let Some(tiers) = COLOR_SIMILARITY.get(query) else {
        return ColorTier::None;
    };
    if tiers.exact.contains(&color) {
        ColorTier::Exact
    } else if tiers.similar.contains(&color) {
        ColorTier::Similar
    } else if tiers.related.contains(&color) {
        ColorTier::Related
    } else {
        ColorTier::None
    }
}

/// 所有 (查询颜色, 商品颜色) 组合中的最高级别
///
/// 只在达到 `Exact` 时提前结束，结果与遍历顺序无关
pub fn best_color_tier<S: AsRef<str>>(query: &[S], colors: &[String]) -> ColorTier {
    let mut best = ColorTier::None;
    for q in query {
        for c in colors {
            best = best.max(color_tier(q.as_ref(), c));
            if best == ColorTier::Exact {
                return best;
            }
        }
    }
    best
}

/// 按类别过滤，`target` 为空或 `unknown` 时不做任何过滤
pub fn filter_by_category(candidates: &[Candidate], target: &str) -> Vec<Candidate> {
    filter_by_categories(candidates, &[target])
}

/// 按多个类别过滤，可接受集合为每个类别的分组并集
pub fn filter_by_categories<S: AsRef<str>>(
    candidates: &[Candidate],
    targets: &[S],
) -> Vec<Candidate> {
    let targets: Vec<String> = targets
        .iter()
        .map(|t| t.as_ref().trim().to_lowercase())
        .filter(|t| !t.is_empty() && t != UNKNOWN)
        .collect();
    if targets.is_empty() {
        return candidates.to_vec();
    }

    let mut allowed: HashSet<&str> = HashSet::new();
    for target in &targets {
        allowed.insert(target);
        if let Some(group) = CATEGORY_GROUPS.get(target.as_str()) {
            allowed.extend(group.iter().copied());
        }
    }

    let filtered: Vec<Candidate> = candidates
        .iter()
        .filter(|c| allowed.contains(c.meta.category.as_str()))
        .cloned()
        .collect();

    debug!("类别过滤: {} => {} (目标: {:?})", candidates.len(), filtered.len(), targets);
    filtered
}

/// 按颜色分级排序
///
/// 结果依次为：完全匹配、相似色、相关色、无颜色数据（仅当 `include_no_color` 时）。
/// 有颜色数据但与所有查询颜色都无关的商品会被丢弃。
pub fn filter_by_color_tiered<S: AsRef<str>>(
    candidates: &[Candidate],
    query_colors: &[S],
    include_no_color: bool,
) -> Vec<Candidate> {
    let query: Vec<String> = query_colors
        .iter()
        .map(|c| c.as_ref().trim().to_lowercase())
        .filter(|c| !c.is_empty())
        .collect();
    if query.is_empty() {
        return candidates.to_vec();
    }

    let mut exact = vec![];
    let mut similar = vec![];
    let mut related = vec![];
    let mut no_color = vec![];

    for candidate in candidates {
        if candidate.meta.colors.is_empty() {
            if include_no_color {
                no_color.push(candidate.clone());
            }
            continue;
        }
        match best_color_tier(&query, &candidate.meta.colors) {
            ColorTier::Exact => exact.push(candidate.clone()),
            ColorTier::Similar => similar.push(candidate.clone()),
            ColorTier::Related => related.push(candidate.clone()),
            ColorTier::None => {}
        }
    }

    debug!(
        "颜色过滤: {} 完全匹配, {} 相似, {} 相关, {} 无颜色",
        exact.len(),
        similar.len(),
        related.len(),
        no_color.len()
    );

    let mut result = exact;
    result.append(&mut similar);
    result.append(&mut related);
    result.append(&mut no_color);
    result
}

/// 商品性别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Men,
    Women,
    Unisex,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Men => "men",
            Self::Women => "women",
            Self::Unisex => "unisex",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "men" | "man" | "male" | "mens" => Ok(Self::Men),
            "women" | "woman" | "female" | "womens" => Ok(Self::Women),
            "unisex" => Ok(Self::Unisex),
            _ => Err(anyhow!("无效的性别: {}", s)),
        }
    }
}

/// 按性别过滤
///
/// 目标性别缺失或无效时不做过滤；商品性别缺失时视为匹配任意性别
pub fn filter_by_gender(candidates: &[Candidate], target: Option<&str>) -> Vec<Candidate> {
    let Some(target) = target.and_then(|t| t.parse::<Gender>().ok()) else {
        return candidates.to_vec();
    };

    let filtered: Vec<Candidate> = candidates
        .iter()
        .filter(|c| match c.meta.gender.as_deref() {
            None => true,
            Some(gender) => match gender.parse::<Gender>() {
                Ok(gender) => gender == target || gender == Gender::Unisex,
                Err(_) => false,
            },
        })
        .cloned()
        .collect();

    debug!("性别过滤: {} => {} (目标: {})", candidates.len(), filtered.len(), target);
    filtered
}

/// 组合过滤的条件，缺失的条件对应的过滤步骤会被跳过
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterQuery {
    pub categories: Vec<String>,
    pub colors: Vec<String>,
    pub gender: Option<String>,
}

impl FilterQuery {
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.categories = vec![category.into()];
        self
    }

    pub fn categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    pub fn colors<I, S>(mut self, colors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.colors = colors.into_iter().map(Into::into).collect();
        self
    }

    pub fn gender(mut self, gender: Option<impl Into<String>>) -> Self {
        self.gender = gender.map(Into::into);
        self
    }
}

/// 组合过滤的结果
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOutcome {
    pub results: Vec<Candidate>,
    /// 过滤结果为空，退回到原始候选
    pub fallback: bool,
}

/// 依次应用类别、颜色、性别过滤，并截断到 `max_results`
///
/// 输入非空而过滤结果为空时，丢弃全部过滤，返回截断后的原始候选
pub fn apply_all_filters(
    candidates: &[Candidate],
    query: &FilterQuery,
    max_results: usize,
) -> FilterOutcome {
    let mut result = candidates.to_vec();
    if !query.categories.is_empty() {
        result = filter_by_categories(&result, &query.categories);
    }
    if !query.colors.is_empty() {
        result = filter_by_color_tiered(&result, &query.colors, true);
    }
    if query.gender.is_some() {
        result = filter_by_gender(&result, query.gender.as_deref());
    }

    if result.is_empty() && !candidates.is_empty() {
        warn!("过滤后没有剩余商品，返回原始检索结果");
        metrics::inc_filter_fallback();
        let mut results = candidates.to_vec();
        results.truncate(max_results);
        return FilterOutcome { results, fallback: true };
    }

    result.truncate(max_results);
    FilterOutcome { results: result, fallback: false }
}

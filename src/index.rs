use std::path::Path;

use anyhow::{Result, anyhow, ensure};
use log::info;
use usearch::{Index, IndexOptions, MetricKind, ScalarKind};

/// 一次向量检索的命中
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    /// 商品在索引中的 key
    pub key: u64,
    /// 余弦相似度，越大越相似
    pub score: f32,
}

/// 向量索引
pub trait VectorIndex: Send + Sync {
    /// 返回最相似的 `k` 个向量，按相似度从高到低排列
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Hit>>;
    /// 索引中的向量数量
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// 向量维度
    fn dimensions(&self) -> usize;
}

/// 基于 usearch 的 HNSW 余弦索引
pub struct UsearchIndex {
    index: Index,
}

impl UsearchIndex {
    pub fn new(dimensions: usize) -> Result<Self> {
        let options = IndexOptions {
            dimensions,
            metric: MetricKind::Cos,
            quantization: ScalarKind::F32,
            ..Default::default()
        };
        let index = Index::new(&options)?;
        Ok(Self { index })
    }

    /// 打开索引文件，`mmap` 为真时只映射文件而不载入内存
    pub fn open(path: impl AsRef<Path>, dimensions: usize, mmap: bool) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.to_str().ok_or_else(|| anyhow!("无效的索引路径: {}", path.display()))?;
        let s = Self::new(dimensions)?;
        if mmap {
            s.index.view(path_str)?;
        } else {
            s.index.load(path_str)?;
        }
        ensure!(
            s.index.dimensions() == dimensions,
            "索引维度不匹配: {} != {}",
            s.index.dimensions(),
            dimensions
        );
        info!("加载索引: {} ({} 条向量)", path.display(), s.index.size());
        Ok(s)
    }

    /// 预留空间，添加向量前必须调用
    pub fn reserve(&self, capacity: usize) -> Result<()> {
        self.index.reserve(capacity)?;
        Ok(())
    }

    pub fn add(&self, key: u64, vector: &[f32]) -> Result<()> {
        self.index.add(key, vector)?;
        Ok(())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let path_str = path.to_str().ok_or_else(|| anyhow!("无效的索引路径: {}", path.display()))?;
        self.index.save(path_str)?;
        Ok(())
    }
}

impl VectorIndex for UsearchIndex {
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Hit>> {
        ensure!(query.len() == self.dimensions(), "查询向量维度错误: {}", query.len());
        if k == 0 || self.index.size() == 0 {
            return Ok(vec![]);
        }
        let matches = self.index.search(query, k)?;
        Ok(matches
            .keys
            .into_iter()
            .zip(matches.distances)
            .map(|(key, distance)| Hit { key, score: 1.0 - distance })
            .collect())
    }

    fn len(&self) -> usize {
        self.index.size()
    }

    fn dimensions(&self) -> usize {
        self.index.dimensions()
    }
}

/// 暴力搜索的内存索引，结果精确，适合小规模商品库和测试
#[derive(Debug, Clone, Default)]
pub struct FlatIndex {
    dimensions: usize,
    keys: Vec<u64>,
    data: Vec<f32>,
}

impl FlatIndex {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions, keys: vec![], data: vec![] }
    }

    pub fn add(&mut self, key: u64, vector: &[f32]) -> Result<()> {
        ensure!(vector.len() == self.dimensions, "向量维度错误: {}", vector.len());
        self.keys.push(key);
        self.data.extend_from_slice(vector);
        Ok(())
    }
}

impl VectorIndex for FlatIndex {
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Hit>> {
        ensure!(query.len() == self.dimensions, "查询向量维度错误: {}", query.len());
        if self.dimensions == 0 {
            return Ok(vec![]);
        }
        let qnorm = query.iter().map(|x| x * x).sum::<f32>().sqrt();
        let mut hits: Vec<Hit> = self
            .keys
            .iter()
            .zip(self.data.chunks_exact(self.dimensions))
            .map(|(&key, v)| {
                let dot: f32 = v.iter().zip(query).map(|(a, b)| a * b).sum();
                let vnorm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
                let score = if qnorm > 0.0 && vnorm > 0.0 { dot / (qnorm * vnorm) } else { 0.0 };
                Hit { key, score }
            })
            .collect();
        // 稳定排序，相似度相同时保持插入顺序
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(k);
        Ok(hits)
    }

    fn len(&self) -> usize {
        self.keys.len()
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

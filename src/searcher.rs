//! 多区域搜索流程
//!
//! 检测 => 按置信度排序截断 => 每个区域并行执行：特征提取、向量检索、分类、颜色识别、过滤排序。
//! 分类器可以复用区域的检索结果。

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use image::RgbImage;
use log::{debug, info, warn};
use rayon::prelude::*;

use crate::catalog::{Catalog, MetadataStore};
use crate::config::{ConfDir, SearchOptions};
use crate::filter::{FilterQuery, apply_all_filters};
use crate::index::VectorIndex;
use crate::metrics;
use crate::models::*;
use crate::types::*;

/// 单次搜索的请求参数
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    /// 标题或描述，用于提取颜色
    pub title: String,
    /// 性别过滤
    pub gender: Option<String>,
    /// 每个区域返回的结果数量，缺省使用配置值
    pub count: Option<usize>,
}

pub struct Searcher {
    services: ModelServices,
    index: Arc<dyn VectorIndex>,
    catalog: Arc<dyn MetadataStore>,
    opts: SearchOptions,
}

impl Searcher {
    pub fn new(
        services: ModelServices,
        index: Arc<dyn VectorIndex>,
        catalog: Arc<dyn MetadataStore>,
        opts: SearchOptions,
    ) -> Self {
        Self { services, index, catalog, opts }
    }

    /// 从配置目录载入商品库和索引，并使用内置的模型服务
    pub async fn open(conf_dir: ConfDir, opts: SearchOptions) -> Result<Self> {
        let catalog = Catalog::open(conf_dir, false).await?;
        let snapshot: Arc<dyn MetadataStore> = Arc::new(catalog.snapshot().await?);
        let index: Arc<dyn VectorIndex> =
            Arc::new(catalog.open_index(ColorLayoutEmbedder::DIMENSIONS, !opts.no_mmap)?);

        let embedder: Arc<dyn Embedder> = Arc::new(ColorLayoutEmbedder);
        let classifier = NeighborVoteClassifier::new(embedder.clone(), index.clone(), snapshot.clone())
            .vote_k(opts.vote_k)
            .threshold(opts.min_confidence);
        let services = ModelServices {
            detector: Arc::new(FullFrameDetector),
            classifier: Arc::new(classifier),
            colors: Arc::new(EnsembleColorProfiler::default()),
            embedder,
        };
        Ok(Self::new(services, index, snapshot, opts))
    }

    pub fn options(&self) -> &SearchOptions {
        &self.opts
    }

    pub fn services(&self) -> &ModelServices {
        &self.services
    }

    /// 索引中的向量数量
    pub fn index_size(&self) -> usize {
        self.index.len()
    }

    /// 商品库中的商品数量
    pub fn catalog_size(&self) -> usize {
        self.catalog.len()
    }

    /// 使用默认检测器搜索
    pub fn search(&self, image: &RgbImage, request: &SearchRequest) -> Result<SearchOutcome> {
        self.search_with(self.services.detector.as_ref(), image, request)
    }

    /// 使用指定的检测器搜索
    pub fn search_with(
        &self,
        detector: &dyn Detector,
        image: &RgbImage,
        request: &SearchRequest,
    ) -> Result<SearchOutcome> {
        let start = Instant::now();
        let size = image.dimensions();
        metrics::inc_image_count(size);

        let regions = self.detect_regions(detector, image)?;
        info!("检测到 {} 个区域", regions.len());

        let results = regions
            .par_iter()
            .map(|region| self.search_region(region, request))
            .collect::<Result<Vec<_>>>()?;
        let results: Vec<RegionResult> = results.into_iter().flatten().collect();

        metrics::inc_search_duration(size, start.elapsed().as_secs_f32());

        if results.is_empty() {
            info!("没有识别出任何物品");
            return Ok(SearchOutcome::NothingRecognized);
        }
        Ok(SearchOutcome::Found(results))
    }

    /// 检测并裁剪区域，没有检测结果时使用整张图片，最多保留 `max_regions` 个
    fn detect_regions(&self, detector: &dyn Detector, image: &RgbImage) -> Result<Vec<DetectedRegion>> {
        let detections = detector.detect(image).context("detector failed")?;

        if detections.is_empty() {
            debug!("没有检测结果，使用整张图片");
            return Ok(vec![DetectedRegion::full_image(image)]);
        }

        let mut regions: Vec<DetectedRegion> = detections
            .iter()
            .enumerate()
            .map(|(i, detection)| DetectedRegion::from_detection(i, image, detection))
            .collect();
        regions.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        regions.truncate(self.opts.max_regions.max(1));
        Ok(regions)
    }

    /// 搜索单个区域，无法识别的区域返回 `None`
    fn search_region(
        &self,
        region: &DetectedRegion,
        request: &SearchRequest,
    ) -> Result<Option<RegionResult>> {
        let v = self.services.embedder.embed(&region.crop).context("embedder failed")?;
        let hits = self.index.search(&v, self.opts.k).context("vector index failed")?;

        let classification = self
            .services
            .classifier
            .classify_with_hits(&region.crop, &hits)
            .context("classifier failed")?;
        if classification.is_unknown() && classification.confidence < self.opts.min_confidence {
            warn!(
                "跳过区域 {}: 分类置信度过低 ({:.2})",
                region.index, classification.confidence
            );
            metrics::inc_region_skipped();
            return Ok(None);
        }
        metrics::inc_region_count(&classification.category);

        let search_categories =
            fallback_categories(&classification.category, classification.confidence);

        let colors = self
            .services
            .colors
            .profile(&region.crop, &request.title)
            .context("color profiler failed")?;

        let candidates: Vec<Candidate> = hits
            .iter()
            .filter_map(|hit| {
                let (product_id, meta) = self.catalog.get_metadata(hit.key)?;
                Some(Candidate::new(product_id, hit.score, meta))
            })
            .collect();
        debug!("区域 {}: 召回 {} / {} 个商品", region.index, candidates.len(), hits.len());

        let query = FilterQuery::default()
            .categories(search_categories.iter().cloned())
            .colors(colors.iter().cloned())
            .gender(request.gender.clone().filter(|g| !g.trim().is_empty()));
        let count = request.count.unwrap_or(self.opts.count);
        let outcome = apply_all_filters(&candidates, &query, count);

        if let Some(top) = outcome.results.first() {
            metrics::observe_top_score(top.similarity_score);
        }

        Ok(Some(RegionResult {
            item_index: region.index,
            bbox: region.bbox,
            detection_confidence: region.confidence,
            category: classification.category,
            specific_label: classification.specific_label,
            classification_confidence: classification.confidence,
            search_categories,
            detected_colors: colors.into_iter().take(3).collect(),
            matches: outcome.results,
        }))
    }
}

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Result, anyhow};
use image::{Rgb, RgbImage};
use lensearch::catalog::{CatalogSnapshot, MetadataStore};
use lensearch::config::SearchOptions;
use lensearch::index::{FlatIndex, Hit, VectorIndex};
use lensearch::models::*;
use lensearch::types::*;
use lensearch::{SearchRequest, Searcher};
use rstest::*;
use serde_json::json;

const RED: [u8; 3] = [220, 20, 60];
const BLUE: [u8; 3] = [65, 105, 225];
const GREEN: [u8; 3] = [34, 139, 34];

fn solid(color: [u8; 3]) -> RgbImage {
    RgbImage::from_pixel(64, 64, Rgb(color))
}

/// 总是返回固定结果的分类器
struct FixedClassifier(Classification);

impl Classifier for FixedClassifier {
    fn classify(&self, _image: &RgbImage) -> Result<Classification> {
        Ok(self.0.clone())
    }
}

fn classified(category: &str, label: &str, confidence: f32) -> Arc<dyn Classifier> {
    Arc::new(FixedClassifier(Classification {
        category: category.to_string(),
        specific_label: label.to_string(),
        confidence,
    }))
}

/// 所有调用都失败的服务
struct Broken;

impl Detector for Broken {
    fn detect(&self, _image: &RgbImage) -> Result<Vec<Detection>> {
        Err(anyhow!("model offline"))
    }
}

impl Classifier for Broken {
    fn classify(&self, _image: &RgbImage) -> Result<Classification> {
        Err(anyhow!("model offline"))
    }
}

impl Embedder for Broken {
    fn embed(&self, _image: &RgbImage) -> Result<Vec<f32>> {
        Err(anyhow!("model offline"))
    }

    fn dimensions(&self) -> usize {
        ColorLayoutEmbedder::DIMENSIONS
    }
}

impl VectorIndex for Broken {
    fn search(&self, _query: &[f32], _k: usize) -> Result<Vec<Hit>> {
        Err(anyhow!("model offline"))
    }

    fn len(&self) -> usize {
        0
    }

    fn dimensions(&self) -> usize {
        ColorLayoutEmbedder::DIMENSIONS
    }
}

/// 记录调用次数的特征提取和索引
struct Counting {
    embeds: AtomicUsize,
    searches: AtomicUsize,
    index: Arc<dyn VectorIndex>,
}

impl Embedder for Counting {
    fn embed(&self, image: &RgbImage) -> Result<Vec<f32>> {
        self.embeds.fetch_add(1, Ordering::SeqCst);
        ColorLayoutEmbedder.embed(image)
    }

    fn dimensions(&self) -> usize {
        ColorLayoutEmbedder::DIMENSIONS
    }
}

impl VectorIndex for Counting {
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Hit>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        self.index.search(query, k)
    }

    fn len(&self) -> usize {
        self.index.len()
    }

    fn dimensions(&self) -> usize {
        self.index.dimensions()
    }
}

struct World {
    index: Arc<dyn VectorIndex>,
    catalog: Arc<dyn MetadataStore>,
}

impl World {
    fn searcher(&self, classifier: Arc<dyn Classifier>, opts: SearchOptions) -> Searcher {
        let services = ModelServices {
            detector: Arc::new(FullFrameDetector),
            classifier,
            colors: Arc::new(EnsembleColorProfiler::default()),
            embedder: Arc::new(ColorLayoutEmbedder),
        };
        Searcher::new(services, self.index.clone(), self.catalog.clone(), opts)
    }
}

#[fixture]
fn world() -> World {
    let products = [
        (1, "R1", json!({"category": "shirt", "attributes": {"colors": ["red"]}}), RED),
        (
            2,
            "R2",
            json!({"category": "shirt", "attributes": {"colors": [{"name": "Maroon"}], "gender": "women"}}),
            [128, 0, 0],
        ),
        (3, "B1", json!({"category": "jeans", "attributes": {"colors": ["blue"]}}), BLUE),
        (
            4,
            "G1",
            json!({"category": {"id": "shirt"}, "attributes": {"colors": ["green"], "gender": "men"}}),
            GREEN,
        ),
    ];

    let mut index = FlatIndex::new(ColorLayoutEmbedder::DIMENSIONS);
    for (key, _, _, color) in &products {
        let v = ColorLayoutEmbedder.embed(&solid(*color)).unwrap();
        index.add(*key, &v).unwrap();
    }
    // 索引中存在但商品库中缺失的 key
    index.add(99, &ColorLayoutEmbedder.embed(&solid(RED)).unwrap()).unwrap();

    let catalog: CatalogSnapshot = products
        .into_iter()
        .map(|(key, id, meta, _)| (key, id.to_string(), ProductMeta::from(meta)))
        .collect();

    World { index: Arc::new(index), catalog: Arc::new(catalog) }
}

fn match_ids(region: &RegionResult) -> Vec<&str> {
    region.matches.iter().map(|m| m.product_id.as_str()).collect()
}

#[rstest]
fn full_image_when_nothing_detected(world: World) -> Result<()> {
    let searcher = world.searcher(classified("upperwear", "shirt", 0.9), SearchOptions::default());
    let outcome = searcher.search(&solid(RED), &SearchRequest::default())?;

    let SearchOutcome::Found(regions) = outcome else {
        panic!("应当识别出物品");
    };
    assert_eq!(regions.len(), 1);
    let region = &regions[0];
    assert_eq!(region.item_index, 0);
    assert_eq!(region.bbox, None);
    assert_eq!(region.detection_confidence, 1.0);
    assert_eq!(region.category, "upperwear");
    assert_eq!(region.search_categories, vec!["upperwear"]);
    assert_eq!(region.detected_colors, vec!["red"]);
    // 99 没有元数据被丢弃，B1 类别不符，G1 颜色无关
    assert_eq!(match_ids(region), vec!["R1", "R2"]);
    Ok(())
}

#[rstest]
fn gender_filter(world: World) -> Result<()> {
    let searcher = world.searcher(classified("upperwear", "shirt", 0.9), SearchOptions::default());
    let request = SearchRequest { gender: Some("male".to_string()), ..Default::default() };
    let outcome = searcher.search(&solid(RED), &request)?;
    assert_eq!(match_ids(&outcome.regions()[0]), vec!["R1"]);
    Ok(())
}

#[rstest]
fn title_color_comes_first(world: World) -> Result<()> {
    let searcher = world.searcher(classified("upperwear", "shirt", 0.9), SearchOptions::default());
    let request = SearchRequest { title: "Emerald party shirt".to_string(), count: Some(1), ..Default::default() };
    let outcome = searcher.search(&solid(BLUE), &request)?;
    let region = &outcome.regions()[0];
    assert_eq!(region.detected_colors, vec!["green", "blue"]);
    assert_eq!(match_ids(region), vec!["G1"]);
    Ok(())
}

#[rstest]
fn low_confidence_unknown_is_skipped(world: World) -> Result<()> {
    let searcher = world.searcher(classified(UNKNOWN, "shirt", 0.25), SearchOptions::default());
    let outcome = searcher.search(&solid(RED), &SearchRequest::default())?;
    assert!(matches!(outcome, SearchOutcome::NothingRecognized));
    assert!(outcome.regions().is_empty());
    Ok(())
}

#[rstest]
fn unknown_above_threshold_is_kept(world: World) -> Result<()> {
    let searcher = world.searcher(classified(UNKNOWN, "shirt", 0.35), SearchOptions::default());
    let outcome = searcher.search(&solid(BLUE), &SearchRequest::default())?;
    let region = &outcome.regions()[0];
    assert_eq!(region.category, UNKNOWN);
    // 类别过滤不生效，只按颜色排序
    assert_eq!(match_ids(region), vec!["B1"]);
    Ok(())
}

#[rstest]
fn ambiguous_dress_searches_lowerwear(world: World) -> Result<()> {
    let searcher = world.searcher(classified("dress", "dress", 0.45), SearchOptions::default());
    let outcome = searcher.search(&solid(BLUE), &SearchRequest::default())?;
    let region = &outcome.regions()[0];
    assert_eq!(region.search_categories, vec!["dress", "lowerwear"]);
    assert_eq!(match_ids(region), vec!["B1"]);
    Ok(())
}

#[rstest]
fn regions_sorted_and_capped(world: World) -> Result<()> {
    let opts = SearchOptions { max_regions: 2, ..Default::default() };
    let searcher = world.searcher(classified("upperwear", "shirt", 0.9), opts);
    let detector = BoxDetector::new(vec![
        Detection { bbox: [0.0, 0.0, 32.0, 32.0], confidence: 0.5 },
        Detection { bbox: [32.0, 0.0, 64.0, 32.0], confidence: 0.9 },
        Detection { bbox: [0.0, 32.0, 32.0, 64.0], confidence: 0.7 },
        Detection { bbox: [32.0, 32.0, 64.0, 64.0], confidence: 0.3 },
    ]);
    let outcome = searcher.search_with(&detector, &solid(RED), &SearchRequest::default())?;
    let regions = outcome.regions();
    assert_eq!(regions.iter().map(|r| r.item_index).collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(regions[0].bbox, Some(BoundingBox([32, 0, 64, 32])));
    assert_eq!(regions[0].detection_confidence, 0.9);
    Ok(())
}

#[rstest]
fn recognized_without_matches() -> Result<()> {
    let world = World {
        index: Arc::new(FlatIndex::new(ColorLayoutEmbedder::DIMENSIONS)),
        catalog: Arc::new(CatalogSnapshot::default()),
    };
    let searcher = world.searcher(classified("footwear", "shoes", 0.8), SearchOptions::default());
    let outcome = searcher.search(&solid(RED), &SearchRequest::default())?;
    let SearchOutcome::Found(regions) = outcome else {
        panic!("识别出的区域即使没有匹配也应返回");
    };
    assert!(regions[0].matches.is_empty());
    Ok(())
}

#[rstest]
#[case::detector("detector failed")]
#[case::classifier("classifier failed")]
#[case::embedder("embedder failed")]
#[case::index("vector index failed")]
fn upstream_failure_propagates(world: World, #[case] context: &str) {
    let mut services = ModelServices {
        detector: Arc::new(FullFrameDetector),
        classifier: classified("upperwear", "shirt", 0.9),
        colors: Arc::new(EnsembleColorProfiler::default()),
        embedder: Arc::new(ColorLayoutEmbedder),
    };
    let mut index = world.index;
    match context {
        "detector failed" => services.detector = Arc::new(Broken),
        "classifier failed" => services.classifier = Arc::new(Broken),
        "embedder failed" => services.embedder = Arc::new(Broken),
        "vector index failed" => index = Arc::new(Broken),
        _ => unreachable!(),
    }

    let searcher = Searcher::new(services, index, world.catalog, SearchOptions::default());
    let err = searcher.search(&solid(RED), &SearchRequest::default()).unwrap_err();
    assert!(format!("{err:#}").contains(context), "{err:#}");
    assert!(format!("{err:#}").contains("model offline"));
}

#[rstest]
fn region_embedded_and_searched_once(world: World) -> Result<()> {
    let counting = Arc::new(Counting {
        embeds: AtomicUsize::new(0),
        searches: AtomicUsize::new(0),
        index: world.index,
    });

    let classifier =
        NeighborVoteClassifier::new(counting.clone(), counting.clone(), world.catalog.clone()).vote_k(1);
    let services = ModelServices {
        detector: Arc::new(FullFrameDetector),
        classifier: Arc::new(classifier),
        colors: Arc::new(EnsembleColorProfiler::default()),
        embedder: counting.clone(),
    };
    let searcher = Searcher::new(services, counting.clone(), world.catalog, SearchOptions::default());

    let outcome = searcher.search(&solid(BLUE), &SearchRequest::default())?;
    let region = &outcome.regions()[0];
    assert_eq!(region.category, "lowerwear");
    assert_eq!(region.specific_label, "jeans");
    assert_eq!(match_ids(region), vec!["B1"]);

    assert_eq!(counting.embeds.load(Ordering::SeqCst), 1);
    assert_eq!(counting.searches.load(Ordering::SeqCst), 1);
    Ok(())
}

#[rstest]
fn neighbor_vote_classifier(world: World) -> Result<()> {
    let classifier = NeighborVoteClassifier::new(
        Arc::new(ColorLayoutEmbedder),
        world.index.clone(),
        world.catalog.clone(),
    )
    .vote_k(1);

    let result = classifier.classify(&solid(BLUE))?;
    assert_eq!(result.category, "lowerwear");
    assert_eq!(result.specific_label, "jeans");
    assert!((result.confidence - 1.0).abs() < 1e-6);

    let empty = NeighborVoteClassifier::new(
        Arc::new(ColorLayoutEmbedder),
        Arc::new(FlatIndex::new(ColorLayoutEmbedder::DIMENSIONS)),
        world.catalog.clone(),
    );
    let result = empty.classify(&solid(BLUE))?;
    assert!(result.is_unknown());
    assert_eq!(result.confidence, 0.0);
    Ok(())
}

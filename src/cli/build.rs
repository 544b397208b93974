use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use indicatif::ProgressBar;
use log::{info, warn};
use rayon::prelude::*;
use regex::Regex;
use serde_json::{Value, json};
use tokio::task::block_in_place;
use walkdir::WalkDir;

use crate::Opts;
use crate::catalog::Catalog;
use crate::cli::SubCommandExtend;
use crate::models::{ColorLayoutEmbedder, ColorProfiler, Embedder, EnsembleColorProfiler};
use crate::types::ProductMeta;
use crate::utils::{self, pb_style};

/// 商品元数据文件名
const META_FILE: &str = "meta.json";

#[derive(Parser, Debug, Clone)]
pub struct BuildCommand {
    /// 商品目录，每个子目录为一个商品，包含 meta.json 和若干商品图片
    pub catalog_dir: PathBuf,
    /// 扫描的图片后缀名，多个后缀用逗号分隔
    #[arg(short, long, default_value = "jpg,png,webp")]
    pub suffix: String,
    /// 元数据中没有颜色时，根据标题和图片识别颜色并写入商品库
    #[arg(long)]
    pub enrich: bool,
    /// 构建索引时，多少个商品为一个批次
    #[arg(long, value_name = "SIZE", default_value_t = 10000)]
    pub batch_size: usize,
}

/// 一个待处理的商品目录
struct ProductDir {
    product_id: String,
    meta: String,
    images: Vec<PathBuf>,
}

impl SubCommandExtend for BuildCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let re_suf = Regex::new(&format!("(?i)^({})$", self.suffix.replace(',', "|")))?;
        let catalog = Catalog::open(opts.conf_dir.clone(), true).await?;

        let products = scan_catalog(&self.catalog_dir, &re_suf)?;
        info!("扫描到 {} 个商品", products.len());

        let embedder = ColorLayoutEmbedder;
        let profiler = EnsembleColorProfiler::default();
        let (mut added, mut skipped) = (0, 0);

        let pb = ProgressBar::new(products.len() as u64).with_style(pb_style());
        let mut changed = vec![];
        for product in products {
            let hash = hash_product(&product)?;
            if catalog.is_changed(&product.product_id, hash.as_bytes()).await? {
                changed.push((product, hash));
            } else {
                skipped += 1;
                pb.inc(1);
            }
        }

        // 每批并行处理 CPU 核数个商品
        for chunk in changed.chunks(num_cpus::get()) {
            let results = block_in_place(|| {
                chunk
                    .par_iter()
                    .map(|(product, _)| prepare_product(product, &embedder, &profiler, self.enrich))
                    .collect::<Vec<_>>()
            });
            for ((product, hash), result) in chunk.iter().zip(results) {
                pb.inc(1);
                match result {
                    Ok((meta, embedding)) => {
                        catalog
                            .upsert(&product.product_id, hash.as_bytes(), &meta, &embedding)
                            .await?;
                        pb.set_message(product.product_id.clone());
                        added += 1;
                    }
                    Err(e) => warn!("[ERR] {}: {:#}", product.product_id, e),
                }
            }
        }
        pb.finish_with_message("商品添加完成");
        info!("新增或更新 {added} 个商品，跳过 {skipped} 个未变化的商品");

        let total = catalog.build_index(embedder.dimensions(), self.batch_size).await?;
        info!("构建索引成功，共 {total} 个商品");
        Ok(())
    }
}

/// 扫描商品目录，按商品 ID 排序
fn scan_catalog(dir: &Path, re_suf: &Regex) -> Result<Vec<ProductDir>> {
    let mut products = vec![];
    for entry in fs::read_dir(dir).with_context(|| format!("无法读取目录: {}", dir.display()))? {
        let path = entry?.path();
        let meta_path = path.join(META_FILE);
        if !path.is_dir() || !meta_path.is_file() {
            continue;
        }
        let product_id = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow!("无效的商品目录: {}", path.display()))?;

        let images: Vec<PathBuf> = WalkDir::new(&path)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|p| p.extension().is_some_and(|ext| re_suf.is_match(&ext.to_string_lossy())))
            .collect();

        let meta = fs::read_to_string(&meta_path)?;
        products.push(ProductDir { product_id, meta, images });
    }
    products.sort_by(|a, b| a.product_id.cmp(&b.product_id));
    Ok(products)
}

/// 计算元数据和所有图片的 blake3 哈希
fn hash_product(product: &ProductDir) -> Result<blake3::Hash> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(product.meta.as_bytes());
    for image in &product.images {
        hasher.update(&fs::read(image)?);
    }
    Ok(hasher.finalize())
}

/// 计算商品特征向量，并在需要时补全颜色
///
/// 商品特征为所有图片特征的均值，再做 L2 归一化
fn prepare_product(
    product: &ProductDir,
    embedder: &dyn Embedder,
    profiler: &dyn ColorProfiler,
    enrich: bool,
) -> Result<(String, Vec<f32>)> {
    if product.images.is_empty() {
        return Err(anyhow!("没有商品图片"));
    }

    let images = product.images.par_iter().map(utils::imread).collect::<Result<Vec<_>>>()?;
    let embeddings =
        images.par_iter().map(|img| embedder.embed(img)).collect::<Result<Vec<_>>>()?;

    let mut embedding = vec![0f32; embedder.dimensions()];
    for v in &embeddings {
        embedding.iter_mut().zip(v).for_each(|(a, b)| *a += b);
    }
    utils::l2_normalize(&mut embedding);

    let mut meta = product.meta.clone();
    if enrich {
        let mut value: Value = serde_json::from_str(&meta).unwrap_or_else(|_| json!({}));
        let normalized = ProductMeta::from(value.clone());
        if normalized.colors.is_empty() {
            let colors = profiler.profile(&images[0], &normalized.title)?;
            info!("补全商品颜色: {} => {:?}", product.product_id, colors);
            if let Some(obj) = value.as_object_mut() {
                let attrs = obj.entry("attributes").or_insert_with(|| json!({}));
                if !attrs.is_object() {
                    *attrs = json!({});
                }
                attrs["colors"] = json!(colors);
            }
            meta = value.to_string();
        }
    }

    Ok((meta, embedding))
}

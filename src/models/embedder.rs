use anyhow::Result;
use image::RgbImage;
use image::imageops::{self, FilterType};

use super::Embedder;
use crate::utils::l2_normalize;

/// 缩略图边长
const THUMB_SIZE: u32 = 8;
/// 每个通道的直方图分桶数
const HIST_BINS: usize = 4;

/// 基于颜色布局的特征提取
///
/// 特征由两部分组成：
/// - 8x8 缩略图的 RGB 值，范围调整到 [-0.5, 0.5]，共 192 维
/// - 4x4x4 的 RGB 颜色直方图，取平方根，共 64 维
///
/// 拼接后整体做 L2 归一化，两张图片的余弦相似度同时反映颜色分布和空间布局。
#[derive(Debug, Clone, Copy, Default)]
pub struct ColorLayoutEmbedder;

impl ColorLayoutEmbedder {
    pub const DIMENSIONS: usize = (THUMB_SIZE * THUMB_SIZE * 3) as usize + HIST_BINS.pow(3);
}

impl Embedder for ColorLayoutEmbedder {
    fn embed(&self, image: &RgbImage) -> Result<Vec<f32>> {
        let mut v = Vec::with_capacity(Self::DIMENSIONS);

        let thumb = imageops::resize(image, THUMB_SIZE, THUMB_SIZE, FilterType::Triangle);
        v.extend(thumb.as_raw().iter().map(|&x| x as f32 / 255.0 - 0.5));

        let mut hist = [0f32; HIST_BINS * HIST_BINS * HIST_BINS];
        for p in image.pixels() {
            let [r, g, b] = p.0.map(|x| x as usize * HIST_BINS / 256);
            hist[(r * HIST_BINS + g) * HIST_BINS + b] += 1.0;
        }
        let total = (image.width() as f32 * image.height() as f32).max(1.0);
        v.extend(hist.iter().map(|x| (x / total).sqrt()));

        l2_normalize(&mut v);
        Ok(v)
    }

    fn dimensions(&self) -> usize {
        Self::DIMENSIONS
    }
}

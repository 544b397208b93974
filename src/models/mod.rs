//! 搜索流水线依赖的模型服务
//!
//! 检测、分类、颜色识别和特征提取都通过 trait 调用，
//! 具体实现在启动时构建一次，之后以 `Arc` 共享，只读。

mod classifier;
mod color;
mod detector;
mod embedder;

use std::sync::Arc;

use anyhow::Result;
use image::RgbImage;

pub use self::classifier::*;
pub use self::color::*;
pub use self::detector::*;
pub use self::embedder::*;
use crate::index::Hit;
use crate::types::{Classification, Detection};

/// 物品检测器
pub trait Detector: Send + Sync {
    /// 返回图片中的检测框，可以为空
    fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>>;
}

/// 物品分类器
pub trait Classifier: Send + Sync {
    fn classify(&self, image: &RgbImage) -> Result<Classification>;

    /// 搜索流程已经检索过该区域时调用，`hits` 按相似度从高到低排列
    ///
    /// 默认忽略 `hits`，直接对图片分类
    fn classify_with_hits(&self, image: &RgbImage, hits: &[Hit]) -> Result<Classification> {
        let _ = hits;
        self.classify(image)
    }
}

/// 颜色识别
pub trait ColorProfiler: Send + Sync {
    /// 返回去重后的小写颜色名，最多 5 个，标题中的颜色优先
    fn profile(&self, image: &RgbImage, title: &str) -> Result<Vec<String>>;
}

/// 图片特征提取
pub trait Embedder: Send + Sync {
    /// 返回 L2 归一化后的特征向量
    fn embed(&self, image: &RgbImage) -> Result<Vec<f32>>;
    /// 特征向量维度
    fn dimensions(&self) -> usize;
}

/// 搜索时使用的全部模型服务
#[derive(Clone)]
pub struct ModelServices {
    pub detector: Arc<dyn Detector>,
    pub classifier: Arc<dyn Classifier>,
    pub colors: Arc<dyn ColorProfiler>,
    pub embedder: Arc<dyn Embedder>,
}

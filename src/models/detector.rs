use anyhow::Result;
use image::RgbImage;
use log::{debug, warn};

use super::Detector;
use crate::types::Detection;

/// 不做检测，总是返回空列表，由搜索流程退化为整图搜索
#[derive(Debug, Clone, Copy, Default)]
pub struct FullFrameDetector;

impl Detector for FullFrameDetector {
    fn detect(&self, _image: &RgbImage) -> Result<Vec<Detection>> {
        Ok(vec![])
    }
}

/// 使用外部检测器给出的检测框
#[derive(Debug, Clone)]
pub struct BoxDetector {
    detections: Vec<Detection>,
    /// 低于该置信度的检测框被丢弃
    min_confidence: f32,
}

impl BoxDetector {
    pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.25;

    pub fn new(detections: Vec<Detection>) -> Self {
        Self { detections, min_confidence: Self::DEFAULT_MIN_CONFIDENCE }
    }

    pub fn min_confidence(mut self, min_confidence: f32) -> Self {
        self.min_confidence = min_confidence;
        self
    }
}

impl Detector for BoxDetector {
    fn detect(&self, _image: &RgbImage) -> Result<Vec<Detection>> {
        let detections: Vec<Detection> = self
            .detections
            .iter()
            .filter(|d| {
                let valid = (0.0..=1.0).contains(&d.confidence) && d.bbox.iter().all(|x| x.is_finite());
                if !valid {
                    warn!("丢弃无效的检测框: {:?} ({})", d.bbox, d.confidence);
                }
                valid && d.confidence >= self.min_confidence
            })
            .copied()
            .collect();
        debug!("检测框: {} => {}", self.detections.len(), detections.len());
        Ok(detections)
    }
}

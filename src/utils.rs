use std::path::Path;

use anyhow::{Context, Result};
use image::imageops::{self, FilterType};
use image::RgbImage;
use indicatif::ProgressStyle;

use crate::types::BoundingBox;

/// 图片最大尺寸，超过则等比缩放
pub const MAX_WIDTH: u32 = 1920;
pub const MAX_HEIGHT: u32 = 1080;

/// 读取图片文件并转换为 RGB
pub fn imread(filename: impl AsRef<Path>) -> Result<RgbImage> {
    let filename = filename.as_ref();
    let img = image::open(filename)
        .with_context(|| format!("无法读取图片: {}", filename.display()))?
        .to_rgb8();
    Ok(adjust_image_size(img, MAX_WIDTH, MAX_HEIGHT))
}

/// 从内存中解码图片并转换为 RGB
pub fn imdecode(buf: &[u8]) -> Result<RgbImage> {
    let img = image::load_from_memory(buf).context("无法解码图片")?.to_rgb8();
    Ok(adjust_image_size(img, MAX_WIDTH, MAX_HEIGHT))
}

/// 如果图片超过指定尺寸，则等比缩放
pub fn adjust_image_size(img: RgbImage, width: u32, height: u32) -> RgbImage {
    let (ow, oh) = img.dimensions();
    if ow <= width && oh <= height {
        return img;
    }
    let scale = (height as f64 / oh as f64).min(width as f64 / ow as f64);
    let nw = ((ow as f64 * scale) as u32).max(1);
    let nh = ((oh as f64 * scale) as u32).max(1);
    imageops::resize(&img, nw, nh, FilterType::Triangle)
}

/// 按检测框裁剪图片
pub fn crop(img: &RgbImage, bbox: &BoundingBox) -> RgbImage {
    let [x1, y1, ..] = bbox.0;
    imageops::crop_imm(img, x1, y1, bbox.width(), bbox.height()).to_image()
}

/// 原地 L2 归一化，零向量保持不变
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        v.iter_mut().for_each(|x| *x /= norm);
    }
}

pub fn pb_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta}) {msg}")
        .expect("invalid progress template")
        .progress_chars("#>-")
}

#[cfg(test)]
mod tests {
    use image::Rgb;

    use super::*;

    #[test]
    fn test_crop() {
        let mut img = RgbImage::new(10, 10);
        img.put_pixel(3, 4, Rgb([255, 0, 0]));
        let crop = crop(&img, &BoundingBox([3, 4, 6, 9]));
        assert_eq!(crop.dimensions(), (3, 5));
        assert_eq!(crop.get_pixel(0, 0), &Rgb([255, 0, 0]));
    }

    #[test]
    fn test_adjust_image_size() {
        let img = RgbImage::new(3840, 1080);
        assert_eq!(adjust_image_size(img, MAX_WIDTH, MAX_HEIGHT).dimensions(), (1920, 540));

        let img = RgbImage::new(100, 100);
        assert_eq!(adjust_image_size(img, MAX_WIDTH, MAX_HEIGHT).dimensions(), (100, 100));
    }

    #[test]
    fn test_l2_normalize() {
        let mut v = [3.0, 4.0];
        l2_normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);

        let mut zero = [0.0; 4];
        l2_normalize(&mut zero);
        assert_eq!(zero, [0.0; 4]);
    }
}

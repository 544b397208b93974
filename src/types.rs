use image::RgbImage;
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 分类置信度不足时使用的类别
pub const UNKNOWN: &str = "unknown";

/// 像素坐标表示的检测框，格式为 `[x1, y1, x2, y2]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoundingBox(pub [u32; 4]);

impl BoundingBox {
    /// 将任意浮点坐标裁剪到图片范围内，保证宽高至少为 1
    pub fn clamped([x1, y1, x2, y2]: [f32; 4], width: u32, height: u32) -> Self {
        let (w, h) = (width.max(1) as i64, height.max(1) as i64);
        let x1 = (x1 as i64).clamp(0, w - 1);
        let y1 = (y1 as i64).clamp(0, h - 1);
        let x2 = (x2 as i64).min(w).max(x1 + 1);
        let y2 = (y2 as i64).min(h).max(y1 + 1);
        Self([x1 as u32, y1 as u32, x2 as u32, y2 as u32])
    }

    pub fn width(&self) -> u32 {
        self.0[2] - self.0[0]
    }

    pub fn height(&self) -> u32 {
        self.0[3] - self.0[1]
    }
}

/// 外部检测器给出的检测框
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Detection {
    /// `[x1, y1, x2, y2]`，允许超出图片范围
    pub bbox: [f32; 4],
    /// 检测置信度
    pub confidence: f32,
}

/// 图片中检测到的一个物品区域
#[derive(Debug, Clone)]
pub struct DetectedRegion {
    /// 区域序号
    pub index: usize,
    /// 检测框，`None` 表示整张图片
    pub bbox: Option<BoundingBox>,
    /// 检测置信度
    pub confidence: f32,
    /// 裁剪后的区域图片
    pub crop: RgbImage,
}

impl DetectedRegion {
    /// 覆盖整张图片的区域
    pub fn full_image(image: &RgbImage) -> Self {
        Self { index: 0, bbox: None, confidence: 1.0, crop: image.clone() }
    }

    /// 从检测框裁剪出区域
    pub fn from_detection(index: usize, image: &RgbImage, detection: &Detection) -> Self {
        let bbox = BoundingBox::clamped(detection.bbox, image.width(), image.height());
        let crop = crate::utils::crop(image, &bbox);
        Self { index, bbox: Some(bbox), confidence: detection.confidence, crop }
    }
}

/// 分类结果
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// 大类，置信度不足时为 `unknown`
    pub category: String,
    /// 具体标签，如 `shirt`
    pub specific_label: String,
    /// 置信度
    pub confidence: f32,
}

impl Classification {
    pub fn unknown(specific_label: impl Into<String>, confidence: f32) -> Self {
        Self { category: UNKNOWN.to_string(), specific_label: specific_label.into(), confidence }
    }

    pub fn is_unknown(&self) -> bool {
        self.category == UNKNOWN
    }
}

/// 归一化后的商品元数据
///
/// 原始 `meta.json` 中类别和颜色字段可能是字符串，也可能是带 `id`/`name` 的对象，
/// 这里在反序列化时统一转换为小写字符串，过滤器不再关心原始格式。
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProductMeta {
    /// 小写类别，缺失时为空字符串
    pub category: String,
    /// 小写颜色名
    pub colors: Vec<String>,
    /// 小写性别，缺失时为 `None`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    /// 商品标题
    pub title: String,
    /// 商品主图路径
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// 购买链接
    pub buy_link: String,
    /// 价格信息，原样透传
    pub pricing: Value,
}

impl ProductMeta {
    /// 解析 `meta.json` 文本，格式错误时返回空元数据
    pub fn from_json_str(s: &str) -> Self {
        match serde_json::from_str::<Value>(s) {
            Ok(value) => Self::from(value),
            Err(e) => {
                log::warn!("元数据解析失败: {e}");
                Self::default()
            }
        }
    }
}

impl From<Value> for ProductMeta {
    fn from(value: Value) -> Self {
        let raw: RawProductMeta = serde_json::from_value(value).unwrap_or_default();

        let category = match raw.category {
            Some(RawCategory::Name(name)) => name,
            Some(RawCategory::Object { id }) => id.unwrap_or_default(),
            _ => String::new(),
        };

        let (colors, gender) = match raw.attributes {
            Some(RawAttributes::Map { colors, gender }) => {
                let colors = match colors {
                    Some(RawColors::List(list)) => list,
                    Some(RawColors::Single(color)) => vec![color],
                    None => vec![],
                };
                (colors, gender.and_then(RawText::into_string))
            }
            _ => (vec![], None),
        };

        let mut normalized: Vec<String> = vec![];
        for color in colors.into_iter().filter_map(RawColor::into_name) {
            let color = color.trim().to_lowercase();
            if !color.is_empty() && !normalized.contains(&color) {
                normalized.push(color);
            }
        }

        let image = match raw.images {
            Some(Value::Array(images)) => images.first().and_then(|first| match first {
                Value::String(path) => Some(path.clone()),
                Value::Object(obj) => obj.get("path").and_then(Value::as_str).map(str::to_string),
                _ => None,
            }),
            _ => None,
        };

        Self {
            category: category.trim().to_lowercase(),
            colors: normalized,
            gender: gender.map(|g| g.trim().to_lowercase()).filter(|g| !g.is_empty()),
            title: raw.title.and_then(RawText::into_string).unwrap_or_default(),
            image,
            buy_link: raw
                .source_url
                .and_then(RawText::into_string)
                .or_else(|| raw.url.and_then(RawText::into_string))
                .unwrap_or_default(),
            pricing: raw.pricing.unwrap_or(Value::Null),
        }
    }
}

#[derive(Deserialize, Default)]
struct RawProductMeta {
    #[serde(default)]
    category: Option<RawCategory>,
    #[serde(default)]
    attributes: Option<RawAttributes>,
    #[serde(default)]
    title: Option<RawText>,
    #[serde(default)]
    images: Option<Value>,
    #[serde(default)]
    source_url: Option<RawText>,
    #[serde(default)]
    url: Option<RawText>,
    #[serde(default)]
    pricing: Option<Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawText {
    Text(String),
    Other(IgnoredAny),
}

impl RawText {
    fn into_string(self) -> Option<String> {
        match self {
            Self::Text(s) => Some(s),
            Self::Other(_) => None,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawCategory {
    Name(String),
    Object {
        #[serde(default)]
        id: Option<String>,
    },
    Other(IgnoredAny),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAttributes {
    Map {
        #[serde(default)]
        colors: Option<RawColors>,
        #[serde(default)]
        gender: Option<RawText>,
    },
    Other(IgnoredAny),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawColors {
    List(Vec<RawColor>),
    Single(RawColor),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawColor {
    Name(String),
    Object {
        #[serde(default)]
        name: Option<RawText>,
        #[serde(default)]
        id: Option<RawText>,
    },
    Other(IgnoredAny),
}

impl RawColor {
    fn into_name(self) -> Option<String> {
        match self {
            Self::Name(name) => Some(name),
            Self::Object { name, id } => name
                .and_then(RawText::into_string)
                .filter(|n| !n.is_empty())
                .or_else(|| id.and_then(RawText::into_string)),
            Self::Other(_) => None,
        }
    }
}

/// 向量检索得到的候选商品
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    /// 商品 ID
    pub product_id: String,
    /// 余弦相似度，越大越相似
    pub similarity_score: f32,
    #[serde(flatten)]
    pub meta: ProductMeta,
}

impl Candidate {
    pub fn new(product_id: impl Into<String>, similarity_score: f32, meta: ProductMeta) -> Self {
        Self { product_id: product_id.into(), similarity_score, meta }
    }
}

/// 单个区域的搜索结果
#[derive(Debug, Clone, Serialize)]
pub struct RegionResult {
    /// 区域序号
    pub item_index: usize,
    /// 检测框，整图搜索时为 `null`
    pub bbox: Option<BoundingBox>,
    /// 检测置信度
    pub detection_confidence: f32,
    /// 分类大类
    pub category: String,
    /// 具体标签
    pub specific_label: String,
    /// 分类置信度
    pub classification_confidence: f32,
    /// 类别过滤实际使用的类别集合
    pub search_categories: Vec<String>,
    /// 区域主色，最多 3 个
    pub detected_colors: Vec<String>,
    /// 排序后的匹配商品
    pub matches: Vec<Candidate>,
}

/// 一次搜索的结果
#[derive(Debug, Clone)]
pub enum SearchOutcome {
    /// 没有任何区域被识别
    NothingRecognized,
    /// 至少一个区域被识别，其匹配列表可能为空
    Found(Vec<RegionResult>),
}

impl SearchOutcome {
    pub fn regions(&self) -> &[RegionResult] {
        match self {
            Self::NothingRecognized => &[],
            Self::Found(regions) => regions,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_meta_plain_fields() {
        let meta = ProductMeta::from(json!({
            "category": "Shirt",
            "title": "Maroon cotton shirt",
            "source_url": "https://shop/1",
            "images": [{"path": "image_2.jpg"}],
            "attributes": {"colors": ["Maroon", "white"], "gender": "Women"}
        }));
        assert_eq!(meta.category, "shirt");
        assert_eq!(meta.colors, vec!["maroon", "white"]);
        assert_eq!(meta.gender.as_deref(), Some("women"));
        assert_eq!(meta.image.as_deref(), Some("image_2.jpg"));
        assert_eq!(meta.buy_link, "https://shop/1");
    }

    #[test]
    fn test_meta_structured_fields() {
        let meta = ProductMeta::from(json!({
            "category": {"id": "Earring", "label": "Earrings"},
            "url": "https://shop/2",
            "attributes": {"colors": [{"name": "Gold", "hex": "#FFD700"}, {"id": "silver"}, "gold", 3]}
        }));
        assert_eq!(meta.category, "earring");
        assert_eq!(meta.colors, vec!["gold", "silver"]);
        assert_eq!(meta.gender, None);
        assert_eq!(meta.buy_link, "https://shop/2");
    }

    #[test]
    fn test_meta_malformed_fields() {
        let meta = ProductMeta::from(json!({
            "category": 42,
            "title": ["not", "a", "string"],
            "attributes": "red"
        }));
        assert_eq!(meta.category, "");
        assert!(meta.colors.is_empty());
        assert_eq!(meta.title, "");

        let meta = ProductMeta::from(json!({"attributes": {"colors": "Navy", "gender": ""}}));
        assert_eq!(meta.colors, vec!["navy"]);
        assert_eq!(meta.gender, None);

        assert_eq!(ProductMeta::from_json_str("{not json"), ProductMeta::default());
        assert_eq!(ProductMeta::from(json!([1, 2])), ProductMeta::default());
    }

    #[test]
    fn test_bbox_clamped() {
        let bbox = BoundingBox::clamped([-5.0, 10.0, 500.0, 12.9], 100, 50);
        assert_eq!(bbox, BoundingBox([0, 10, 100, 12]));

        // 宽高至少为 1
        let bbox = BoundingBox::clamped([120.0, 60.0, 80.0, 10.0], 100, 50);
        assert_eq!(bbox, BoundingBox([99, 49, 100, 50]));
        assert_eq!(bbox.width(), 1);
        assert_eq!(bbox.height(), 1);
    }
}

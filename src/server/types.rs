use axum::body::Bytes;
use axum_typed_multipart::TryFromMultipart;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 搜索请求参数
#[derive(TryFromMultipart)]
pub struct SearchParams {
    pub file: Bytes,
    pub title: Option<String>,
    pub gender: Option<String>,
    pub count: Option<usize>,
    pub boxes: Option<String>,
}

/// 搜索表单（用于API文档）
#[derive(Debug, ToSchema)]
#[allow(unused)]
pub struct SearchForm {
    /// 上传的图片文件
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub file: String,
    /// 图片标题或描述，用于提取颜色
    pub title: Option<String>,
    /// 性别过滤：men、women 或 unisex
    pub gender: Option<String>,
    /// 每个物品返回的结果数量
    pub count: Option<usize>,
    /// 外部检测器给出的检测框，JSON 数组，元素格式为 `{"bbox": [x1, y1, x2, y2], "confidence": 0.9}`
    pub boxes: Option<String>,
}

/// 搜索响应（用于API文档）
#[derive(Debug, ToSchema)]
#[allow(unused)]
pub struct SearchResponse {
    /// 搜索耗时，单位为毫秒
    pub time: u32,
    /// 每个物品的识别结果和匹配商品
    #[schema(value_type = Vec<Object>)]
    pub detected_items: Vec<serde_json::Value>,
    /// 识别出的物品数量
    pub total_items: Option<usize>,
    /// 没有识别出物品时的提示
    pub message: Option<String>,
}

/// 服务状态
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    /// 索引中的向量数量
    pub index_size: usize,
    /// 商品库中的商品数量
    pub catalog_size: usize,
}

/// 重新加载索引的参数
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ReloadRequest {
    /// 是否不使用 mmap 模式
    #[schema(default = false)]
    #[serde(default)]
    pub no_mmap: bool,
}

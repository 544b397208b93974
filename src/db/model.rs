use sqlx::FromRow;

/// 商品记录
#[derive(Debug, Clone, FromRow)]
pub struct ProductRecord {
    /// 商品 ID，同时作为向量索引的 key
    pub id: i64,
    /// 商品目录名
    pub product_id: String,
    /// 原始 meta.json
    pub meta: String,
}

/// 商品特征向量记录
#[derive(Debug, Clone, FromRow)]
pub struct EmbeddingRecord {
    pub id: i64,
    /// f32 数组的原始字节
    pub embedding: Vec<u8>,
}

use sqlx::{Executor, Result, Sqlite, SqlitePool};

use super::{EmbeddingRecord, ProductRecord};

/// 添加或更新商品记录，返回商品 ID
pub async fn upsert_product<'c, E>(
    executor: E,
    product_id: &str,
    hash: &[u8],
    meta: &str,
    embedding: &[u8],
) -> Result<i64>
where
    E: Executor<'c, Database = Sqlite>,
{
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO product (product_id, hash, meta, embedding)
        VALUES (?, ?, ?, ?)
        ON CONFLICT (product_id) DO UPDATE SET
            hash = excluded.hash,
            meta = excluded.meta,
            embedding = excluded.embedding
        RETURNING id
        "#,
    )
    .bind(product_id)
    .bind(hash)
    .bind(meta)
    .bind(embedding)
    .fetch_one(executor)
    .await?;

    Ok(id)
}

/// 获取商品的图片哈希，商品不存在时返回 `None`
pub async fn get_product_hash(executor: &SqlitePool, product_id: &str) -> Result<Option<Vec<u8>>> {
    sqlx::query_scalar(
        r#"
        SELECT hash FROM product WHERE product_id = ?
        "#,
    )
    .bind(product_id)
    .fetch_optional(executor)
    .await
}

/// 获取所有商品的元数据
pub async fn all_products(executor: &SqlitePool) -> Result<Vec<ProductRecord>> {
    sqlx::query_as(
        r#"
        SELECT id, product_id, meta FROM product ORDER BY id
        "#,
    )
    .fetch_all(executor)
    .await
}

/// 分批获取商品特征向量
pub async fn get_embeddings(
    executor: &SqlitePool,
    limit: usize,
    offset: usize,
) -> Result<Vec<EmbeddingRecord>> {
    sqlx::query_as(
        r#"
        SELECT id, embedding FROM product ORDER BY id LIMIT ? OFFSET ?
        "#,
    )
    .bind(limit as i64)
    .bind(offset as i64)
    .fetch_all(executor)
    .await
}

pub async fn count_products(executor: &SqlitePool) -> Result<u64> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM product
        "#,
    )
    .fetch_one(executor)
    .await?;

    Ok(count as u64)
}

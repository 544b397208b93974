use std::collections::HashMap;
use std::fs;

use anyhow::{Context, Result, ensure};
use indicatif::ProgressBar;
use log::{debug, info};

use crate::config::ConfDir;
use crate::db::{Database, crud, init_db};
use crate::index::UsearchIndex;
use crate::types::ProductMeta;
use crate::utils::pb_style;

/// 根据索引 key 查询商品元数据
pub trait MetadataStore: Send + Sync {
    /// 返回 `(商品 ID, 元数据)`，不存在时返回 `None`
    fn get_metadata(&self, key: u64) -> Option<(String, ProductMeta)>;
    /// 商品数量
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 商品库的只读内存快照，元数据在载入时已经归一化
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    products: HashMap<u64, (String, ProductMeta)>,
}

impl FromIterator<(u64, String, ProductMeta)> for CatalogSnapshot {
    fn from_iter<T: IntoIterator<Item = (u64, String, ProductMeta)>>(iter: T) -> Self {
        let products = iter.into_iter().map(|(key, id, meta)| (key, (id, meta))).collect();
        Self { products }
    }
}

impl MetadataStore for CatalogSnapshot {
    fn get_metadata(&self, key: u64) -> Option<(String, ProductMeta)> {
        let found = self.products.get(&key).cloned();
        if found.is_none() {
            debug!("商品元数据不存在: {key}");
        }
        found
    }

    fn len(&self) -> usize {
        self.products.len()
    }
}

/// 商品库：SQLite 中的元数据和特征向量，以及由其构建的向量索引文件
pub struct Catalog {
    conf_dir: ConfDir,
    db: Database,
}

impl Catalog {
    /// 打开商品库，`create` 为真时在配置目录不存在时创建
    pub async fn open(conf_dir: ConfDir, create: bool) -> Result<Self> {
        if create {
            fs::create_dir_all(conf_dir.path())?;
        }
        let db = init_db(conf_dir.database(), create)
            .await
            .with_context(|| format!("无法打开商品库: {}", conf_dir.database().display()))?;
        Ok(Self { conf_dir, db })
    }

    pub fn conf_dir(&self) -> &ConfDir {
        &self.conf_dir
    }

    /// 商品图片哈希是否发生变化，新商品也视为变化
    pub async fn is_changed(&self, product_id: &str, hash: &[u8]) -> Result<bool> {
        let old = crud::get_product_hash(&self.db, product_id).await?;
        Ok(old.as_deref() != Some(hash))
    }

    /// 添加或更新商品，返回其在索引中的 key
    pub async fn upsert(
        &self,
        product_id: &str,
        hash: &[u8],
        meta: &str,
        embedding: &[f32],
    ) -> Result<u64> {
        let bytes: &[u8] = bytemuck::cast_slice(embedding);
        let id = crud::upsert_product(&self.db, product_id, hash, meta, bytes).await?;
        Ok(id as u64)
    }

    pub async fn count(&self) -> Result<u64> {
        Ok(crud::count_products(&self.db).await?)
    }

    /// 载入所有商品元数据
    pub async fn snapshot(&self) -> Result<CatalogSnapshot> {
        let records = crud::all_products(&self.db).await?;
        let snapshot: CatalogSnapshot = records
            .into_iter()
            .map(|r| (r.id as u64, r.product_id, ProductMeta::from_json_str(&r.meta)))
            .collect();
        info!("载入商品元数据: {} 条", snapshot.len());
        Ok(snapshot)
    }

    /// 使用所有商品特征向量重新构建索引文件，返回索引中的向量数量
    pub async fn build_index(&self, dimensions: usize, batch_size: usize) -> Result<usize> {
        let total = crud::count_products(&self.db).await? as usize;
        let index = UsearchIndex::new(dimensions)?;
        index.reserve(total.max(1))?;

        info!("开始构建索引，共 {total} 个商品");
        let pb = ProgressBar::new(total as u64).with_style(pb_style());
        let batch_size = batch_size.max(1);
        for offset in (0..total).step_by(batch_size) {
            let records = crud::get_embeddings(&self.db, batch_size, offset).await?;
            for record in records {
                ensure!(
                    record.embedding.len() == dimensions * size_of::<f32>(),
                    "商品 {} 的特征向量维度错误",
                    record.id
                );
                let v: Vec<f32> = bytemuck::pod_collect_to_vec(&record.embedding);
                index.add(record.id as u64, &v)?;
                pb.inc(1);
            }
        }
        pb.finish_with_message("索引构建完成");

        let path = self.conf_dir.index();
        index.save(&path)?;
        info!("索引已保存: {}", path.display());
        Ok(total)
    }

    /// 打开已构建的索引文件
    pub fn open_index(&self, dimensions: usize, mmap: bool) -> Result<UsearchIndex> {
        let path = self.conf_dir.index();
        ensure!(path.exists(), "索引文件不存在，请先运行 build: {}", path.display());
        UsearchIndex::open(&path, dimensions, mmap)
    }
}

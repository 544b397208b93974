use std::sync::Arc;

use tokio::sync::RwLock;

use crate::cli::server::ServerCommand;
use crate::config::{ConfDir, SearchOptions};
use crate::searcher::Searcher;

/// 应用状态
pub struct AppState {
    /// 当前使用的搜索器，重新加载时整体替换
    pub searcher: RwLock<Arc<Searcher>>,
    /// 配置目录
    pub conf_dir: ConfDir,
    /// 搜索配置选项
    pub search: SearchOptions,
    /// 鉴权 token
    pub token: String,
}

impl AppState {
    /// 创建新的应用状态
    pub fn new(searcher: Searcher, conf_dir: ConfDir, opts: ServerCommand) -> Arc<Self> {
        Arc::new(AppState {
            searcher: RwLock::new(Arc::new(searcher)),
            conf_dir,
            search: opts.search,
            token: opts.token,
        })
    }

    /// 获取当前搜索器，不阻塞后续的重新加载
    pub async fn searcher(&self) -> Arc<Searcher> {
        self.searcher.read().await.clone()
    }
}

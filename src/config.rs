use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

use clap::{Parser, Subcommand};
use directories::ProjectDirs;

use crate::cli::*;

static CONF_DIR: LazyLock<ConfDir> = LazyLock::new(|| {
    let path = match ProjectDirs::from("", "lensearch", "lensearch") {
        Some(proj_dirs) => proj_dirs.config_dir().to_path_buf(),
        None => PathBuf::from(".lensearch"),
    };
    ConfDir { path }
});

fn default_config_dir() -> &'static str {
    CONF_DIR.path().to_str().unwrap_or(".lensearch")
}

#[derive(Parser, Debug, Clone)]
pub struct SearchOptions {
    /// 不使用 mmap 模式加载索引，而是一次性全部加载到内存
    #[arg(long)]
    pub no_mmap: bool,
    /// 每个区域从向量索引中召回的候选数量
    #[arg(short, value_name = "K", default_value_t = 500)]
    pub k: usize,
    /// 每个区域显示的结果数量
    #[arg(long, value_name = "COUNT", default_value_t = 10)]
    pub count: usize,
    /// 每张图片最多搜索的区域数量
    #[arg(long, value_name = "N", default_value_t = 5)]
    pub max_regions: usize,
    /// 分类置信度阈值，低于该值且无法识别的区域会被跳过
    #[arg(long, value_name = "CONF", default_value_t = 0.3)]
    pub min_confidence: f32,
    /// 检测置信度阈值，低于该值的检测框会被丢弃
    #[arg(long, value_name = "CONF", default_value_t = 0.25)]
    pub min_detection_confidence: f32,
    /// 分类时参与投票的近邻数量
    #[arg(long, value_name = "K", default_value_t = 20)]
    pub vote_k: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            no_mmap: false,
            k: 500,
            count: 10,
            max_regions: 5,
            min_confidence: 0.3,
            min_detection_confidence: 0.25,
            vote_k: 20,
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "lensearch", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
    /// lensearch 配置文件目录
    #[arg(short, long, default_value = default_config_dir())]
    pub conf_dir: ConfDir,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 从商品目录构建商品库和向量索引
    Build(BuildCommand),
    /// 搜索一张图片中的商品
    Search(SearchCommand),
    /// 启动 HTTP 搜索服务
    Server(ServerCommand),
    /// 识别图片的颜色
    Colors(ColorsCommand),
}

#[derive(Debug, Clone)]
pub struct ConfDir {
    path: PathBuf,
}

impl ConfDir {
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// 返回商品库文件的路径
    pub fn database(&self) -> PathBuf {
        self.path.join("catalog.db")
    }

    /// 返回向量索引文件的路径
    pub fn index(&self) -> PathBuf {
        self.path.join("catalog.usearch")
    }
}

impl FromStr for ConfDir {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self { path: PathBuf::from(s) })
    }
}

use anyhow::Result;
use clap::Parser;
use tokio::task::block_in_place;

use crate::cli::SubCommandExtend;
use crate::config::Opts;
use crate::models::{ColorProfiler, EnsembleColorProfiler, colors_from_title, dominant_colors};
use crate::utils;

#[derive(Parser, Debug, Clone)]
pub struct ColorsCommand {
    /// 图片路径
    pub image: String,
    /// 图片标题或描述
    #[arg(long, default_value_t = String::new())]
    pub title: String,
    /// 主色聚类数量
    #[arg(short, long, default_value_t = 5)]
    pub k: usize,
}

impl SubCommandExtend for ColorsCommand {
    async fn run(&self, _opts: &Opts) -> Result<()> {
        let image = utils::imread(&self.image)?;
        let profiler = EnsembleColorProfiler { clusters: self.k };

        let (image_colors, colors) = block_in_place(|| -> Result<_> {
            Ok((dominant_colors(&image, self.k), profiler.profile(&image, &self.title)?))
        })?;

        println!("标题颜色: {}", colors_from_title(&self.title).join(", "));
        println!("图片颜色: {}", image_colors.join(", "));
        println!("综合颜色: {}", colors.join(", "));
        Ok(())
    }
}

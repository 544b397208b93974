use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tokio::task::block_in_place;

use crate::cli::SubCommandExtend;
use crate::config::{Opts, SearchOptions};
use crate::models::BoxDetector;
use crate::searcher::{SearchRequest, Searcher};
use crate::types::{Detection, SearchOutcome};
use crate::utils;

#[derive(Parser, Debug, Clone)]
pub struct SearchCommand {
    #[command(flatten)]
    pub search: SearchOptions,
    /// 被搜索的图片路径
    pub image: String,
    /// 图片标题或描述，用于提取颜色
    #[arg(long, default_value_t = String::new())]
    pub title: String,
    /// 只显示指定性别的商品
    #[arg(long)]
    pub gender: Option<String>,
    /// 外部检测器给出的检测框，JSON 格式
    /// 例：--boxes '[{"bbox": [0, 0, 100, 200], "confidence": 0.9}]'
    #[arg(long, value_name = "JSON", verbatim_doc_comment)]
    pub boxes: Option<String>,
    /// 输出格式
    #[arg(long, value_name = "FORMAT", value_enum, default_value_t = OutputFormat::Table)]
    pub output_format: OutputFormat,
}

impl SubCommandExtend for SearchCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let searcher = Searcher::open(opts.conf_dir.clone(), self.search.clone()).await?;
        let image = utils::imread(&self.image)?;
        let request = SearchRequest {
            title: self.title.clone(),
            gender: self.gender.clone(),
            count: Some(self.search.count),
        };

        let outcome = match &self.boxes {
            Some(boxes) => {
                let detections: Vec<Detection> =
                    serde_json::from_str(boxes).context("无效的检测框")?;
                let detector = BoxDetector::new(detections)
                    .min_confidence(self.search.min_detection_confidence);
                block_in_place(|| searcher.search_with(&detector, &image, &request))?
            }
            None => block_in_place(|| searcher.search(&image, &request))?,
        };

        print_result(&outcome, self)
    }
}

fn print_result(outcome: &SearchOutcome, opts: &SearchCommand) -> Result<()> {
    match opts.output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(outcome.regions())?)
        }
        OutputFormat::Table => {
            if let SearchOutcome::NothingRecognized = outcome {
                println!("没有识别出任何物品");
            }
            for region in outcome.regions() {
                println!(
                    "#{} {}/{} ({:.2})\t颜色: {}",
                    region.item_index,
                    region.category,
                    region.specific_label,
                    region.classification_confidence,
                    region.detected_colors.join(", ")
                );
                for m in &region.matches {
                    println!("{:.2}\t{}\t{}", m.similarity_score, m.product_id, m.meta.title);
                }
            }
        }
    }
    Ok(())
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum OutputFormat {
    Json,
    Table,
}

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use axum::Json;
use axum::extract::State;
use axum_auth::AuthBearer;
use axum_typed_multipart::TypedMultipart;
use log::info;
use prometheus::{Encoder, TextEncoder};
use serde_json::{Value, json};
use tokio::task::block_in_place;

use super::error::{AppError, Result};
use super::state::AppState;
use super::types::*;
use crate::models::BoxDetector;
use crate::searcher::{SearchRequest, Searcher};
use crate::types::{Detection, SearchOutcome};
use crate::utils;

fn check_token(state: &AppState, token: &str) -> Result<()> {
    if token != state.token {
        return Err(AppError::unauthorized());
    }
    Ok(())
}

fn health(searcher: &Searcher) -> HealthResponse {
    HealthResponse {
        status: "ok".to_string(),
        index_size: searcher.index_size(),
        catalog_size: searcher.catalog_size(),
    }
}

/// 搜索一张图片中的商品
#[utoipa::path(
    post,
    path = "/search",
    request_body(content = SearchForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, body = SearchResponse),
        (status = 401, description = "token 错误"),
    ),
    security(("bearer" = []))
)]
pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    AuthBearer(token): AuthBearer,
    TypedMultipart(data): TypedMultipart<SearchParams>,
) -> Result<Json<Value>> {
    check_token(&state, &token)?;

    let detections = match &data.boxes {
        Some(boxes) if !boxes.trim().is_empty() => Some(
            serde_json::from_str::<Vec<Detection>>(boxes)
                .context("无效的检测框")
                .map_err(AppError::bad_request)?,
        ),
        _ => None,
    };
    let request = SearchRequest {
        title: data.title.clone().unwrap_or_default(),
        gender: data.gender.clone(),
        count: data.count,
    };

    let start = Instant::now();

    info!("正在搜索上传图片");

    let searcher = state.searcher().await;
    let outcome = block_in_place(|| -> anyhow::Result<_> {
        let image = utils::imdecode(&data.file)?;
        match detections {
            Some(detections) => {
                let detector = BoxDetector::new(detections)
                    .min_confidence(searcher.options().min_detection_confidence);
                searcher.search_with(&detector, &image, &request)
            }
            None => searcher.search(&image, &request),
        }
    })?;

    let time = start.elapsed().as_millis();
    Ok(Json(match outcome {
        SearchOutcome::NothingRecognized => json!({
            "time": time,
            "detected_items": [],
            "message": "No items recognized in the image",
        }),
        SearchOutcome::Found(regions) => json!({
            "time": time,
            "total_items": regions.len(),
            "detected_items": regions,
        }),
    }))
}

/// 服务状态
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, body = HealthResponse),
    )
)]
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(health(&*state.searcher().await))
}

/// 重新加载商品库和索引
#[utoipa::path(
    post,
    path = "/reload",
    request_body = ReloadRequest,
    responses(
        (status = 200, body = HealthResponse),
        (status = 401, description = "token 错误"),
    ),
    security(("bearer" = []))
)]
pub async fn reload_handler(
    State(state): State<Arc<AppState>>,
    AuthBearer(token): AuthBearer,
    Json(data): Json<ReloadRequest>,
) -> Result<Json<HealthResponse>> {
    check_token(&state, &token)?;

    let mut opts = state.search.clone();
    opts.no_mmap = data.no_mmap;
    let searcher = Searcher::open(state.conf_dir.clone(), opts).await?;
    let response = health(&searcher);

    *state.searcher.write().await = Arc::new(searcher);
    info!("重新加载完成: {} 个商品", response.catalog_size);
    Ok(Json(response))
}

/// prometheus 指标
#[utoipa::path(get, path = "/metrics")]
pub async fn metrics_handler() -> Result<String> {
    let encoder = TextEncoder::new();
    let mut buffer = vec![];
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

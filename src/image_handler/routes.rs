//! # HTTP 路由层
//!
//! ## 设计思路
//!
//! 路由层仅做查询参数接收、校验与结果返回，不承载业务逻辑。
//! 所有实际处理交由 `ImageServiceState`，保持处理函数薄、稳定、易测试。
//!
//! 参数校验在任何网络请求之前完成，校验失败直接返回 400。
//! 同名参数重复出现时取第一个值。

use std::time::Instant;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, Request, State};
use axum::http::header;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use bytes::Bytes;

use super::{ImageServiceState, OverlayRequest};
use crate::error::AppError;

/// 合成接口路径。
pub const OVERLAY_PATH: &str = "/imageprocessing/overlay";

/// 合成接口的原始查询参数。
#[derive(Debug, Default)]
pub struct OverlayParams {
    pub frame_url: Option<String>,
    pub image_url: Option<String>,
}

impl OverlayParams {
    /// 从解码后的查询键值对中取参数，同名键只保留第一次出现的值。
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut params = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "frame_url" => &mut params.frame_url,
                "image_url" => &mut params.image_url,
                _ => continue,
            };
            slot.get_or_insert(value);
        }
        params
    }

    /// 校验两个参数均存在且为合法的绝对 URL。
    pub fn validate(self) -> Result<OverlayRequest, AppError> {
        let frame_url = non_empty(self.frame_url);
        let image_url = non_empty(self.image_url);

        let (frame_url, image_url) = match (frame_url, image_url) {
            (Some(frame), Some(image)) => (frame, image),
            (None, None) => {
                return Err(AppError::InvalidParams(
                    "frame_url and image_url are required".to_string(),
                ));
            }
            (None, Some(_)) => return Err(AppError::InvalidParams("frame_url is required".to_string())),
            (Some(_), None) => return Err(AppError::InvalidParams("image_url is required".to_string())),
        };

        Ok(OverlayRequest {
            frame_url: parse_absolute_url("frame_url", &frame_url)?,
            image_url: parse_absolute_url("image_url", &image_url)?,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_absolute_url(name: &str, value: &str) -> Result<reqwest::Url, AppError> {
    reqwest::Url::parse(value).map_err(|e| AppError::InvalidParams(format!("invalid {}: {}", name, e)))
}

/// 构建完整路由（含请求日志中间件）。
pub fn router(state: ImageServiceState) -> Router {
    Router::new()
        .route(OVERLAY_PATH, get(overlay))
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

/// GET /imageprocessing/overlay?frame_url=<URL>&image_url=<URL>
async fn overlay(
    State(state): State<ImageServiceState>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Response, AppError> {
    let Query(pairs) = query.map_err(|e| AppError::InvalidParams(e.body_text()))?;
    let request = OverlayParams::from_pairs(pairs).validate()?;

    let png = state.render_overlay(&request).await?;

    Ok(([(header::CONTENT_TYPE, "image/png")], Bytes::from(png)).into_response())
}

/// 记录请求开始与结束（不记录 query，避免泄露签名参数）。
async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    log::info!("📥 收到请求 - {} {}", method, path);
    let response = next.run(request).await;
    log::info!(
        "📤 请求处理完成 - {} {} status={} elapsed={}ms",
        method,
        path,
        response.status().as_u16(),
        start.elapsed().as_millis()
    );

    response
}

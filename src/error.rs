//! 统一错误类型模块
//!
//! # 设计思路
//!
//! 定义全局统一的 `AppError` 枚举，替代各模块中分散的
//! `.map_err(|e| e.to_string())`、`format!(...)`、`expect()` 等不一致模式。
//!
//! 错误只分两类：
//! - 调用方输入错误（缺参、URL 不合法）：400，原样告知调用方
//! - 上游/内部错误（下载、解码、合成、编码失败）：500，只返回通用文案，
//!   具体原因写入服务端日志
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息（供日志使用）。
//! - 实现 axum `IntoResponse`，将错误映射为纯文本响应。

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};

use crate::image_handler::ImageError;

/// 应用级统一错误类型
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 请求参数缺失或格式非法
    #[error("{0}")]
    InvalidParams(String),

    /// 相框图片下载或解码失败
    #[error("相框图片处理失败: {0}")]
    FrameImage(#[source] ImageError),

    /// 主体图片下载或解码失败
    #[error("主体图片处理失败: {0}")]
    SubjectImage(#[source] ImageError),

    /// 缩放 / 合成失败
    #[error("图片合成失败: {0}")]
    Composite(#[source] ImageError),

    /// PNG 编码失败
    #[error("结果编码失败: {0}")]
    Encode(#[source] ImageError),

    /// 启动配置非法
    #[error("配置错误: {0}")]
    Config(String),

    /// 网络监听等 I/O 错误
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 其他内部错误（如阻塞任务 panic）
    #[error("内部错误: {0}")]
    Internal(String),
}

impl AppError {
    /// 对应的 HTTP 状态码。
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidParams(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 可以返回给调用方的文案。
    ///
    /// 仅参数错误会回显细节（内容只是调用方自己的输入）。
    pub fn public_message(&self) -> String {
        match self {
            Self::InvalidParams(msg) => msg.clone(),
            Self::FrameImage(_) => "failed to download frame image".to_string(),
            Self::SubjectImage(_) => "failed to download main image".to_string(),
            Self::Composite(_) => "failed to compose the images".to_string(),
            Self::Encode(_) => "failed to encode the resulting image".to_string(),
            Self::Config(_) | Self::Io(_) | Self::Internal(_) => "internal server error".to_string(),
        }
    }

    /// 图片链路错误的稳定错误码，其他错误返回 `None`。
    pub fn image_error_code(&self) -> Option<&'static str> {
        match self {
            Self::FrameImage(e) | Self::SubjectImage(e) | Self::Composite(e) | Self::Encode(e) => Some(e.code()),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("❌ [{}] {}", self.image_error_code().unwrap_or("internal"), self);
        } else {
            log::warn!("⚠️ 请求参数错误: {}", self);
        }

        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.public_message(),
        )
            .into_response()
    }
}

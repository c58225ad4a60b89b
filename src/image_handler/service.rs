//! # 服务层（可注入状态）
//!
//! ## 设计思路
//!
//! 使用 `ImageServiceState` 作为 axum `State` 注入到路由层，替代全局单例函数。
//! 好处：
//! 1. 生命周期清晰（由 `main.rs` 统一创建）
//! 2. 测试可创建独立实例（例如开启内网拦截）
//! 3. 请求之间只共享只读配置，无需加锁

use std::sync::Arc;

use super::{ImageConfig, ImageError, ImageHandler, OverlayRequest};
use crate::error::AppError;

/// 图片处理服务状态。
///
/// 克隆开销仅为一次 `Arc` 计数递增。
#[derive(Clone)]
pub struct ImageServiceState {
    handler: Arc<ImageHandler>,
}

impl ImageServiceState {
    /// 使用默认配置创建服务状态。
    pub fn new() -> Result<Self, ImageError> {
        Self::with_config(ImageConfig::default())
    }

    /// 使用自定义配置创建服务状态。
    ///
    /// # 示例
    /// ```rust,no_run
    /// use frame_overlay::image_handler::{ImageConfig, ImageServiceState};
    ///
    /// let mut config = ImageConfig::default();
    /// config.allow_private_network = false;
    /// let service = ImageServiceState::with_config(config)?;
    /// # Ok::<(), frame_overlay::image_handler::ImageError>(())
    /// ```
    pub fn with_config(config: ImageConfig) -> Result<Self, ImageError> {
        config.validate()?;
        Ok(Self {
            handler: Arc::new(ImageHandler::new(config)?),
        })
    }

    /// 执行完整处理流程：下载 → 解码 → 合成 → 编码。
    pub async fn render_overlay(&self, request: &OverlayRequest) -> Result<Vec<u8>, AppError> {
        self.handler.render_overlay(request).await
    }
}

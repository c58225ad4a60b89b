//! # 核心编排模块
//!
//! ## 设计思路
//!
//! `ImageHandler` 只负责流程编排与配置管理，不直接与 HTTP 框架绑定。
//! 处理链路固定为：
//! 1. 按角色解析下载地址（网盘分享链接改写为直链）
//! 2. 顺序下载相框图与主体图的原始字节
//! 3. 在阻塞线程池中解码、合成并编码 PNG
//!
//! ## 实现思路
//!
//! - 配置在构建后只读，HTTP 客户端随处理器创建一次并在请求间复用连接池。
//! - 每个阶段的失败按图片角色（相框 / 主体）归类为 `AppError`，便于路由层给出对应文案。
//! - 记录 `frame/subject/render/total` 阶段耗时，便于性能诊断。

use std::time::Instant;

use super::compositor::compose_overlay;
use super::source::{ImageRole, OverlayRequest, RawImageData};
use super::{ImageConfig, ImageError, ImageSource};
use crate::error::AppError;

/// 图片处理器。
///
/// 持有配置与 HTTP 客户端，并编排下载、解码、合成、编码各子模块。
pub struct ImageHandler {
    pub(super) config: ImageConfig,
    pub(super) client: reqwest::Client,
}

impl ImageHandler {
    /// 根据配置创建处理器。
    ///
    /// # 示例
    /// ```rust,ignore
    /// use frame_overlay::image_handler::{ImageConfig, ImageHandler};
    ///
    /// let handler = ImageHandler::new(ImageConfig::default())?;
    /// ```
    pub fn new(config: ImageConfig) -> Result<Self, ImageError> {
        let client = Self::http_client(&config)?;
        Ok(Self { config, client })
    }

    /// 处理主入口：下载两张图片并返回合成后的 PNG 字节。
    ///
    /// # 示例
    /// ```rust,ignore
    /// # async fn demo(handler: frame_overlay::image_handler::ImageHandler,
    /// #               request: frame_overlay::image_handler::OverlayRequest)
    /// #     -> Result<(), frame_overlay::error::AppError> {
    /// let png = handler.render_overlay(&request).await?;
    /// assert!(!png.is_empty());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn render_overlay(&self, request: &OverlayRequest) -> Result<Vec<u8>, AppError> {
        let total_start = Instant::now();

        let frame_start = Instant::now();
        let frame_raw = self
            .acquire(ImageRole::Frame, &request.frame_url)
            .await
            .map_err(AppError::FrameImage)?;
        let frame_elapsed = frame_start.elapsed();

        let subject_start = Instant::now();
        let subject_raw = self
            .acquire(ImageRole::Subject, &request.image_url)
            .await
            .map_err(AppError::SubjectImage)?;
        let subject_elapsed = subject_start.elapsed();

        let render_start = Instant::now();
        let config = self.config.clone();
        let png = tokio::task::spawn_blocking(move || Self::render_blocking(frame_raw, subject_raw, &config))
            .await
            .map_err(|e| AppError::Internal(format!("合成任务异常退出：{}", e)))??;
        let render_elapsed = render_start.elapsed();

        log::info!(
            "✅ 合成完成 - frame={}ms subject={}ms render={}ms total={}ms output={}KB",
            frame_elapsed.as_millis(),
            subject_elapsed.as_millis(),
            render_elapsed.as_millis(),
            total_start.elapsed().as_millis(),
            png.len() / 1024
        );

        Ok(png)
    }

    async fn acquire(&self, role: ImageRole, url: &reqwest::Url) -> Result<RawImageData, ImageError> {
        let source = ImageSource::resolve(role, url)?;
        self.fetch(&source).await
    }

    /// 解码 → 合成 → 编码，均为 CPU 密集步骤。
    fn render_blocking(
        frame_raw: RawImageData,
        subject_raw: RawImageData,
        config: &ImageConfig,
    ) -> Result<Vec<u8>, AppError> {
        let frame = Self::decode_image(frame_raw, config).map_err(AppError::FrameImage)?;
        let subject = Self::decode_image(subject_raw, config).map_err(AppError::SubjectImage)?;

        let canvas = compose_overlay(&subject, &frame, config.resize_filter).map_err(AppError::Composite)?;

        Self::encode_png(canvas).map_err(AppError::Encode)
    }
}

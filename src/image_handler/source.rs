//! # 数据源与中间模型
//!
//! ## 设计思路
//!
//! 将“外部输入类型”和“流水线中间结果”解耦：
//! - `ImageSource` 表示规范化后的下载目标，并记住它在合成中的角色
//! - `RawImageData` 表示已下载但未解码的字节
//! - `OverlayRequest` 表示已校验的一次合成请求

use super::normalize::normalize_source_url;
use super::ImageError;

/// 图片在合成中的角色，决定失败时对外的文案。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageRole {
    /// 相框图（叠加在上层）。
    Frame,
    /// 主体图（决定画布尺寸）。
    Subject,
}

impl ImageRole {
    pub fn label(self) -> &'static str {
        match self {
            Self::Frame => "frame",
            Self::Subject => "subject",
        }
    }
}

/// 待下载的图片。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSource {
    pub role: ImageRole,
    pub url: reqwest::Url,
}

impl ImageSource {
    /// 由请求中的绝对 URL 得到下载目标。
    ///
    /// 网盘分享链接会在这里被改写为直链；非 http/https 协议直接拒绝。
    pub fn resolve(role: ImageRole, url: &reqwest::Url) -> Result<Self, ImageError> {
        match url.scheme() {
            "http" | "https" => Ok(Self {
                role,
                url: normalize_source_url(url)?,
            }),
            other => Err(ImageError::InvalidFormat(format!(
                "{} 图片不支持的 URL 协议：{}",
                role.label(),
                other
            ))),
        }
    }
}

/// 下载阶段输出：原始字节与图片角色。
pub(crate) struct RawImageData {
    pub(crate) bytes: Vec<u8>,
    pub(crate) role: ImageRole,
}

/// 一次合成请求的两个图片地址，已通过语法校验。
#[derive(Debug, Clone)]
pub struct OverlayRequest {
    pub frame_url: reqwest::Url,
    pub image_url: reqwest::Url,
}

//! # 解码与编码流水线模块
//!
//! ## 设计思路
//!
//! 将“字节 → 图像”与“画布 → PNG”两个方向集中管理，并在关键节点增加资源上限控制。
//! 优先做尺寸检查，再进行完整解码，降低恶意输入触发高内存开销的风险。
//!
//! ## 实现思路
//!
//! 1. 猜测格式并读取 header 尺寸
//! 2. 按像素 / 内存上限快速拒绝
//! 3. 完整解码，并复核实际尺寸
//! 4. 合成结果统一编码为 PNG

use image::{DynamicImage, GenericImageView, ImageFormat, RgbaImage};
use std::io::Cursor;

use super::source::RawImageData;
use super::{ImageConfig, ImageError, ImageHandler};

impl ImageHandler {
    /// 将原始字节解码为图像。
    pub(crate) fn decode_image(
        raw: RawImageData,
        config: &ImageConfig,
    ) -> Result<DynamicImage, ImageError> {
        let format = image::guess_format(&raw.bytes)
            .map_err(|e| ImageError::InvalidFormat(format!("不支持的图片格式：{}", e)))?;

        let (header_width, header_height) = Self::inspect_dimensions_from_memory(&raw.bytes, format)?;
        Self::validate_pixel_limits(config, header_width, header_height)?;
        Self::validate_decoded_memory_limits(config, header_width, header_height)?;

        let decoded = image::load_from_memory_with_format(&raw.bytes, format)
            .map_err(|e| ImageError::Decode(format!("{:?} 解码失败：{}", format, e)))?;

        let (width, height) = decoded.dimensions();
        if width == 0 || height == 0 {
            return Err(ImageError::Decode(format!("图片尺寸为空：{}x{}", width, height)));
        }
        Self::validate_pixel_limits(config, width, height)?;
        Self::validate_decoded_memory_limits(config, width, height)?;

        log::info!(
            "✅ 图片解码成功 - 角色: {} 格式: {:?} 尺寸: {}x{}",
            raw.role.label(),
            format,
            width,
            height
        );

        Ok(decoded)
    }

    /// 将合成画布编码为 PNG 字节。
    pub(crate) fn encode_png(canvas: RgbaImage) -> Result<Vec<u8>, ImageError> {
        let (width, height) = canvas.dimensions();
        let estimated = (width as usize)
            .saturating_mul(height as usize)
            .saturating_mul(4);
        let mut cursor = Cursor::new(Vec::with_capacity(estimated.min(16 * 1024 * 1024)));

        DynamicImage::ImageRgba8(canvas)
            .write_to(&mut cursor, ImageFormat::Png)
            .map_err(|e| ImageError::Encode(format!("PNG 编码失败：{}", e)))?;

        Ok(cursor.into_inner())
    }

    /// 仅通过内存中的图片头信息读取宽高。
    ///
    /// 用于在完整解码前做像素限制检查。
    fn inspect_dimensions_from_memory(bytes: &[u8], format: ImageFormat) -> Result<(u32, u32), ImageError> {
        image::ImageReader::with_format(Cursor::new(bytes), format)
            .into_dimensions()
            .map_err(|e| ImageError::Decode(format!("无法读取图片尺寸：{}", e)))
    }

    /// 校验像素数量是否超过配置上限。
    fn validate_pixel_limits(config: &ImageConfig, width: u32, height: u32) -> Result<(), ImageError> {
        let pixels = (width as u64)
            .checked_mul(height as u64)
            .ok_or_else(|| ImageError::ResourceLimit("图片像素数溢出".to_string()))?;

        if pixels > config.max_decoded_pixels {
            return Err(ImageError::ResourceLimit(format!(
                "图片像素过大：{} 像素（限制：{} 像素）",
                pixels, config.max_decoded_pixels
            )));
        }

        Ok(())
    }

    fn validate_decoded_memory_limits(
        config: &ImageConfig,
        width: u32,
        height: u32,
    ) -> Result<(), ImageError> {
        let estimated = (width as u64)
            .checked_mul(height as u64)
            .and_then(|pixels| pixels.checked_mul(4))
            .ok_or_else(|| ImageError::ResourceLimit("图片解码内存估算溢出".to_string()))?;

        if estimated > config.max_decoded_bytes {
            return Err(ImageError::ResourceLimit(format!(
                "图片解码预计内存过大：{:.2} MB（限制：{:.2} MB）",
                estimated as f64 / 1024.0 / 1024.0,
                config.max_decoded_bytes as f64 / 1024.0 / 1024.0
            )));
        }

        Ok(())
    }
}

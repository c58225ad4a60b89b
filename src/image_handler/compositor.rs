//! # 合成模块
//!
//! ## 设计思路
//!
//! 纯函数：输入主体图与相框图，输出合成后的 RGBA 画布，不涉及任何 I/O，
//! 便于脱离网络直接做单元测试。
//!
//! ## 实现思路
//!
//! 1. 以相框尺寸为目标框：主体图已能放入时保持原尺寸，否则等比缩小至恰好放入
//! 2. 若任一边超出目标框，从左上角为锚点裁剪（只裁右侧/底部）
//! 3. 以主体图最终尺寸为画布尺寸，将相框图拉伸到同一尺寸
//! 4. 先以覆盖方式绘制主体图，再按 alpha 叠加相框图

use fast_image_resize as fr;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, ImageBuffer, Rgba, RgbaImage};

use super::ImageError;

/// 计算主体图放入 `max_width x max_height` 后的尺寸。
///
/// 已能放入时原样返回（不放大），否则等比缩小到恰好放入。
/// 全程使用整数运算，保证同一输入在不同平台上得到同一结果。
pub fn fit_dimensions(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width == 0 || height == 0 || max_width == 0 || max_height == 0 {
        return (max_width.max(1), max_height.max(1));
    }

    if width <= max_width && height <= max_height {
        return (width, height);
    }

    let (w, h) = (width as u64, height as u64);
    let (max_w, max_h) = (max_width as u64, max_height as u64);

    if w * max_h > max_w * h {
        // 主体更宽：宽度顶满
        let fitted_h = (max_w * h / w).max(1);
        (max_width, fitted_h as u32)
    } else {
        let fitted_w = (max_h * w / h).max(1);
        (fitted_w as u32, max_height)
    }
}

/// 将主体图适配到相框尺寸，必要时从原点裁剪。
pub fn fit_and_crop_to_frame(
    subject: &DynamicImage,
    frame_width: u32,
    frame_height: u32,
    filter: FilterType,
) -> Result<RgbaImage, ImageError> {
    let (src_width, src_height) = subject.dimensions();
    let (fit_width, fit_height) = fit_dimensions(src_width, src_height, frame_width, frame_height);

    let fitted = if (fit_width, fit_height) == (src_width, src_height) {
        subject.to_rgba8()
    } else {
        resize_rgba(&subject.to_rgba8(), fit_width, fit_height, filter)?
    };

    Ok(crop_to_box(fitted, frame_width, frame_height))
}

/// 以左上角为锚点裁剪到 `max_width x max_height` 以内，只裁掉右侧与底部。
///
/// 未超出时原样返回。
pub fn crop_to_box(image: RgbaImage, max_width: u32, max_height: u32) -> RgbaImage {
    let (width, height) = image.dimensions();
    if width <= max_width && height <= max_height {
        return image;
    }

    let crop_width = width.min(max_width);
    let crop_height = height.min(max_height);
    log::debug!("✂️ 裁剪主体图 {}x{} -> {}x{}", width, height, crop_width, crop_height);
    imageops::crop_imm(&image, 0, 0, crop_width, crop_height).to_image()
}

/// 执行完整合成：主体图在下，相框图在上。
pub fn compose_overlay(
    subject: &DynamicImage,
    frame: &DynamicImage,
    filter: FilterType,
) -> Result<RgbaImage, ImageError> {
    let (frame_width, frame_height) = frame.dimensions();
    let base = fit_and_crop_to_frame(subject, frame_width, frame_height, filter)?;
    let (width, height) = base.dimensions();

    let frame_rgba = frame.to_rgba8();
    let resized_frame = if (frame_width, frame_height) == (width, height) {
        frame_rgba
    } else {
        resize_rgba(&frame_rgba, width, height, filter)?
    };

    let mut canvas = RgbaImage::new(width, height);
    imageops::replace(&mut canvas, &base, 0, 0);
    imageops::overlay(&mut canvas, &resized_frame, 0, 0);

    log::debug!(
        "🖼️ 合成完成 - 相框: {}x{} 主体: {}x{} 画布: {}x{}",
        frame_width,
        frame_height,
        subject.width(),
        subject.height(),
        width,
        height
    );

    Ok(canvas)
}

/// 使用 fast_image_resize 做精确尺寸缩放，失败时回退到 `image` 自带实现。
pub(crate) fn resize_rgba(
    image: &RgbaImage,
    target_width: u32,
    target_height: u32,
    filter: FilterType,
) -> Result<RgbaImage, ImageError> {
    if target_width == 0 || target_height == 0 {
        return Err(ImageError::ResourceLimit(format!(
            "目标尺寸非法：{}x{}",
            target_width, target_height
        )));
    }

    match resize_with_fast_image_resize(image, target_width, target_height, filter) {
        Ok(resized) => Ok(resized),
        Err(err) => {
            log::warn!("⚠️ fast_image_resize 缩放失败，回退 image::resize：{}", err);
            Ok(imageops::resize(image, target_width, target_height, filter))
        }
    }
}

fn resize_with_fast_image_resize(
    image: &RgbaImage,
    target_width: u32,
    target_height: u32,
    filter: FilterType,
) -> Result<RgbaImage, ImageError> {
    let (src_width, src_height) = image.dimensions();

    let src_image = fr::images::Image::from_vec_u8(
        src_width,
        src_height,
        image.as_raw().clone(),
        fr::PixelType::U8x4,
    )
    .map_err(|e| ImageError::Decode(format!("构建源图像缓冲失败：{}", e)))?;

    let mut dst_image = fr::images::Image::new(target_width, target_height, fr::PixelType::U8x4);

    let mut resizer = fr::Resizer::new();
    let options = fr::ResizeOptions::new().resize_alg(fr::ResizeAlg::Convolution(to_fast_filter(filter)));

    resizer
        .resize(&src_image, &mut dst_image, Some(&options))
        .map_err(|e| ImageError::Decode(format!("fast_image_resize 执行失败：{}", e)))?;

    ImageBuffer::<Rgba<u8>, Vec<u8>>::from_raw(target_width, target_height, dst_image.into_vec())
        .ok_or_else(|| ImageError::Decode("fast_image_resize 输出缓冲长度异常".to_string()))
}

fn to_fast_filter(filter: FilterType) -> fr::FilterType {
    match filter {
        FilterType::Nearest => fr::FilterType::Box,
        FilterType::Triangle => fr::FilterType::Bilinear,
        FilterType::CatmullRom => fr::FilterType::CatmullRom,
        FilterType::Gaussian => fr::FilterType::Mitchell,
        FilterType::Lanczos3 => fr::FilterType::Lanczos3,
    }
}

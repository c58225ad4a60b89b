//! # URL 规范化模块
//!
//! 将已知网盘的分享链接改写为可直接下载的地址，其余链接原样返回。
//! 目前只识别 Google Drive：分享链接形如 `/file/d/<ID>/view`，
//! 文件 ID 位于按 `/` 切分后的第 4 段（首个空段计入）。

use super::ImageError;

const DRIVE_HOST: &str = "drive.google.com";
const DRIVE_DOWNLOAD_BASE: &str = "https://drive.google.com/uc";
const DRIVE_FILE_ID_SEGMENT: usize = 3;

/// 规范化图片来源地址。
pub fn normalize_source_url(url: &reqwest::Url) -> Result<reqwest::Url, ImageError> {
    if !is_drive_host(url) {
        return Ok(url.clone());
    }

    let file_id = url
        .path()
        .split('/')
        .nth(DRIVE_FILE_ID_SEGMENT)
        .filter(|segment| !segment.is_empty())
        .ok_or_else(|| ImageError::InvalidFormat("无效的 Google Drive 链接格式".to_string()))?;

    let mut direct = reqwest::Url::parse(DRIVE_DOWNLOAD_BASE)
        .map_err(|e| ImageError::InvalidFormat(format!("URL 格式错误：{}", e)))?;
    direct
        .query_pairs_mut()
        .append_pair("export", "download")
        .append_pair("id", file_id);

    log::debug!("🔁 Google Drive 链接已改写为直链 - id: {}", file_id);
    Ok(direct)
}

fn is_drive_host(url: &reqwest::Url) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };

    let host = host.to_ascii_lowercase();
    host == DRIVE_HOST || host.ends_with(".drive.google.com")
}

//! # 下载与校验模块
//!
//! ## 设计思路
//!
//! 相框图与主体图都走同一条下载链路，在“尽可能早”的阶段拒绝不合格的响应，
//! 减少不必要的内存与 CPU 消耗。不做重试，也不做缓存：失败即返回。
//!
//! ## 实现思路
//!
//! - 重定向由这里逐跳跟随，便于限制跳数并对每一跳重新检查目标。
//! - 响应体流式读取：先看声明长度，再按累计长度截断，首包与后续分块各有超时。
//! - 读到足够字节后立即按文件签名识别，非图片内容不必下载完。
//! - 内网拦截默认关闭；`allow_private_network = false` 时对每一跳拒绝本地/内网目标。

use std::net::IpAddr;
use std::time::Duration;

use reqwest::header::{ACCEPT, LOCATION};
use reqwest::Url;
use tokio::net::lookup_host;

use super::source::{ImageSource, RawImageData};
use super::{ImageConfig, ImageError, ImageHandler};

/// 超过这么多字节仍无法识别为图片，就放弃下载。
const SNIFF_LIMIT: usize = 4096;
const DEFAULT_BUFFER_CAPACITY: usize = 16 * 1024;
const ACCEPT_IMAGES: &str = "image/avif,image/webp,image/apng,image/*,*/*;q=0.8";

impl ImageHandler {
    /// 下载一张图片，返回经过签名确认的原始字节。
    pub(crate) async fn fetch(&self, source: &ImageSource) -> Result<RawImageData, ImageError> {
        log::info!(
            "🌐 开始下载{}图片 - {}",
            source.role.label(),
            display_target(&source.url)
        );

        check_target(&source.url, &self.config).await?;
        let bytes = self.fetch_following_redirects(source.url.clone()).await?;

        log::debug!("✅ {}图片下载完成 - {} bytes", source.role.label(), bytes.len());
        Ok(RawImageData {
            bytes,
            role: source.role,
        })
    }

    /// 发送请求并逐跳跟随重定向，直到拿到最终响应体。
    ///
    /// 起始地址由调用方检查，这里只检查跳转后的地址。
    pub(crate) async fn fetch_following_redirects(&self, mut url: Url) -> Result<Vec<u8>, ImageError> {
        let config = &self.config;
        let mut hops = 0usize;

        loop {
            let response = self
                .client
                .get(url.clone())
                .header(ACCEPT, ACCEPT_IMAGES)
                .send()
                .await
                .map_err(|e| request_error(e, &url))?;

            let status = response.status();
            if status.is_redirection() {
                if hops >= config.max_redirects {
                    return Err(ImageError::Network(format!(
                        "重定向超过 {} 次：{}",
                        config.max_redirects,
                        display_target(&url)
                    )));
                }
                hops += 1;

                let next = redirect_target(&response, &url)?;
                check_target(&next, config).await?;
                log::debug!("↪️ 第 {} 次跳转: {}", hops, display_target(&next));
                url = next;
                continue;
            }

            if !status.is_success() {
                return Err(ImageError::Network(format!("HTTP {}：{}", status, display_target(&url))));
            }

            return read_image_body(response, config).await;
        }
    }

    /// 按配置构建共享的 HTTP 客户端。重定向关闭，由 `fetch_following_redirects` 处理。
    pub(super) fn http_client(config: &ImageConfig) -> Result<reqwest::Client, ImageError> {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(config.download_timeout))
            .connect_timeout(Duration::from_secs(config.connect_timeout))
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ImageError::Network(format!("无法创建 HTTP 客户端：{}", e)))
    }
}

/// 流式读取响应体，同时执行体积上限、读超时与签名识别。
async fn read_image_body(mut response: reqwest::Response, config: &ImageConfig) -> Result<Vec<u8>, ImageError> {
    let limit = config.max_file_size;

    if let Some(declared) = response.content_length() {
        if declared > limit {
            return Err(ImageError::ResourceLimit(format!(
                "声明体积 {} 字节超过上限 {} 字节",
                declared, limit
            )));
        }
    }

    let capacity = response
        .content_length()
        .filter(|len| *len > 0)
        .map_or(DEFAULT_BUFFER_CAPACITY, |len| len.min(limit) as usize);
    let mut body = Vec::with_capacity(capacity);
    let mut is_image = false;

    loop {
        let wait = if body.is_empty() {
            Duration::from_millis(config.stream_first_byte_timeout_ms)
        } else {
            Duration::from_millis(config.stream_chunk_timeout_ms)
        };

        let next = match tokio::time::timeout(wait, response.chunk()).await {
            Ok(result) => result.map_err(|e| ImageError::Network(format!("读取响应体失败：{}", e.without_url())))?,
            Err(_) if body.is_empty() => {
                return Err(ImageError::Timeout(format!("等待首包超过 {}ms", wait.as_millis())));
            }
            Err(_) => {
                return Err(ImageError::Timeout(format!(
                    "读取分块超过 {}ms（已收到 {} 字节）",
                    wait.as_millis(),
                    body.len()
                )));
            }
        };

        let Some(chunk) = next else {
            break;
        };

        if (body.len() as u64).saturating_add(chunk.len() as u64) > limit {
            return Err(ImageError::ResourceLimit(format!("响应体超过上限 {} 字节", limit)));
        }
        body.extend_from_slice(&chunk);

        if !is_image {
            is_image = sniff_image(&body)?;
        }
    }

    if !is_image {
        let reason = if body.is_empty() { "响应体为空" } else { "无法识别图片类型" };
        return Err(ImageError::InvalidFormat(reason.to_string()));
    }

    Ok(body)
}

/// 按文件签名判断已收到的字节是否为图片。
///
/// `Ok(false)` 表示字节还不够，需要继续读取。
fn sniff_image(bytes: &[u8]) -> Result<bool, ImageError> {
    match infer::get(bytes) {
        Some(kind) if kind.matcher_type() == infer::MatcherType::Image => Ok(true),
        Some(kind) => Err(ImageError::InvalidFormat(format!("响应内容不是图片：{}", kind.mime_type()))),
        None if bytes.len() >= SNIFF_LIMIT => Err(ImageError::InvalidFormat(format!(
            "前 {} 字节内无法识别图片类型",
            SNIFF_LIMIT
        ))),
        None => Ok(false),
    }
}

fn redirect_target(response: &reqwest::Response, current: &Url) -> Result<Url, ImageError> {
    let location = response
        .headers()
        .get(LOCATION)
        .ok_or_else(|| ImageError::Network(format!("HTTP {} 缺少 Location 头", response.status())))?
        .to_str()
        .map_err(|e| ImageError::InvalidFormat(format!("Location 头无效：{}", e)))?;

    current
        .join(location)
        .map_err(|e| ImageError::InvalidFormat(format!("重定向地址无法解析：{}", e)))
}

/// 检查下载目标：只允许 http/https，按配置拒绝本地与内网地址。
async fn check_target(url: &Url, config: &ImageConfig) -> Result<(), ImageError> {
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ImageError::InvalidFormat(format!("仅支持 HTTP/HTTPS：{}", url.scheme())));
    }

    if config.allow_private_network {
        return Ok(());
    }

    let host = url
        .host_str()
        .ok_or_else(|| ImageError::InvalidFormat("URL 缺少主机地址".to_string()))?;
    let blocked = |what: &dyn std::fmt::Display| ImageError::InvalidFormat(format!("禁止访问内网目标：{}", what));

    if let Ok(ip) = host.trim_start_matches('[').trim_end_matches(']').parse::<IpAddr>() {
        return if is_internal_ip(ip) { Err(blocked(&ip)) } else { Ok(()) };
    }

    let lower = host.to_ascii_lowercase();
    if matches!(lower.trim_end_matches('.'), "localhost") || lower.ends_with(".local") {
        return Err(blocked(&host));
    }

    if !config.resolve_dns_for_url_safety {
        return Ok(());
    }

    let port = url.port_or_known_default().unwrap_or(80);
    let mut resolved = 0usize;
    for addr in lookup_host((host, port))
        .await
        .map_err(|e| ImageError::Network(format!("域名解析失败 {}：{}", host, e)))?
    {
        if is_internal_ip(addr.ip()) {
            return Err(blocked(&format!("{} -> {}", host, addr.ip())));
        }
        resolved += 1;
    }

    if resolved == 0 {
        return Err(ImageError::Network(format!("域名未解析到地址：{}", host)));
    }

    Ok(())
}

/// 本地、内网、链路本地、组播等不可作为下载目标的地址。
fn is_internal_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let [first, second, ..] = v4.octets();
            v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
                || v4.is_documentation()
                || v4.is_multicast()
                || first == 0
                // 100.64.0.0/10
                || (first == 100 && (64..128).contains(&second))
        }
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => is_internal_ip(IpAddr::V4(v4)),
            None => {
                v6.is_loopback()
                    || v6.is_unspecified()
                    || v6.is_unique_local()
                    || v6.is_unicast_link_local()
                    || v6.is_multicast()
            }
        },
    }
}

/// 日志里展示的地址：去掉 query 与 fragment。
fn display_target(url: &Url) -> String {
    let mut shown = url.clone();
    shown.set_query(None);
    shown.set_fragment(None);
    shown.to_string()
}

fn request_error(err: reqwest::Error, url: &Url) -> ImageError {
    let target = display_target(url);
    let err = err.without_url();

    if err.is_timeout() {
        ImageError::Timeout(format!("请求超时：{}", target))
    } else if err.is_connect() {
        ImageError::Network(format!("无法连接 {}：{}", target, err))
    } else {
        ImageError::Network(format!("请求 {} 失败：{}", target, err))
    }
}

//! 服务启动配置
//!
//! 监听地址与图片链路参数均可通过环境变量覆盖，未设置或取值非法时沿用默认值
//! （非法值会记录一条 warn 日志）。
//!
//! | 环境变量 | 对应字段 |
//! |----------|----------|
//! | `OVERLAY_BIND_ADDR` | 监听地址，默认 `0.0.0.0:8080` |
//! | `OVERLAY_MAX_FILE_SIZE` | `max_file_size`（字节） |
//! | `OVERLAY_DOWNLOAD_TIMEOUT` | `download_timeout`（秒） |
//! | `OVERLAY_CONNECT_TIMEOUT` | `connect_timeout`（秒） |
//! | `OVERLAY_FIRST_BYTE_TIMEOUT_MS` | `stream_first_byte_timeout_ms` |
//! | `OVERLAY_CHUNK_TIMEOUT_MS` | `stream_chunk_timeout_ms` |
//! | `OVERLAY_MAX_REDIRECTS` | `max_redirects` |
//! | `OVERLAY_ALLOW_PRIVATE_NETWORK` | `allow_private_network`，设为 `false` 开启内网拦截 |
//! | `OVERLAY_RESOLVE_DNS` | `resolve_dns_for_url_safety` |
//! | `OVERLAY_MAX_DECODED_PIXELS` | `max_decoded_pixels` |
//! | `OVERLAY_MAX_DECODED_BYTES` | `max_decoded_bytes` |

use std::env;
use std::str::FromStr;

use crate::image_handler::ImageConfig;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

/// 服务级配置。
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub bind_addr: String,
    pub image: ImageConfig,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            image: ImageConfig::default(),
        }
    }
}

impl ServerSettings {
    /// 从进程环境变量读取配置。
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 从任意键值来源读取配置，便于测试注入。
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        if let Some(addr) = lookup("OVERLAY_BIND_ADDR").filter(|v| !v.trim().is_empty()) {
            settings.bind_addr = addr.trim().to_string();
        }

        let image = &mut settings.image;
        override_from(&lookup, "OVERLAY_MAX_FILE_SIZE", &mut image.max_file_size);
        override_from(&lookup, "OVERLAY_DOWNLOAD_TIMEOUT", &mut image.download_timeout);
        override_from(&lookup, "OVERLAY_CONNECT_TIMEOUT", &mut image.connect_timeout);
        override_from(&lookup, "OVERLAY_FIRST_BYTE_TIMEOUT_MS", &mut image.stream_first_byte_timeout_ms);
        override_from(&lookup, "OVERLAY_CHUNK_TIMEOUT_MS", &mut image.stream_chunk_timeout_ms);
        override_from(&lookup, "OVERLAY_MAX_REDIRECTS", &mut image.max_redirects);
        override_from(&lookup, "OVERLAY_ALLOW_PRIVATE_NETWORK", &mut image.allow_private_network);
        override_from(&lookup, "OVERLAY_RESOLVE_DNS", &mut image.resolve_dns_for_url_safety);
        override_from(&lookup, "OVERLAY_MAX_DECODED_PIXELS", &mut image.max_decoded_pixels);
        override_from(&lookup, "OVERLAY_MAX_DECODED_BYTES", &mut image.max_decoded_bytes);

        settings
    }
}

fn override_from<F, T>(lookup: &F, key: &str, target: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + std::fmt::Debug,
{
    let Some(raw) = lookup(key) else {
        return;
    };

    match raw.trim().parse::<T>() {
        Ok(value) => *target = value,
        Err(_) => log::warn!("环境变量 {} 取值非法：{:?}，沿用默认值 {:?}", key, raw, target),
    }
}

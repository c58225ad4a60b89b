//! # 相框合成服务：库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                       HTTP 调用方                         │
//! │   GET /imageprocessing/overlay?frame_url=..&image_url=..  │
//! └───────┼──────────────────────────────────────────────────┘
//!         ↕ 200 image/png | 400 text/plain | 500 text/plain
//! ┌───────┼──────────────────────────────────────────────────┐
//! │       ↕            后端 (Rust, axum + tokio)              │
//! │                                                          │
//! │  ┌─ error ────── AppError (统一错误类型 → HTTP 响应)      │
//! │  │                                                       │
//! │  ├─ settings ─── 监听地址 + 环境变量覆盖                   │
//! │  │                                                       │
//! │  └─ image_handler      下载·解码·合成·编码                │
//! │      ├─ routes         参数校验 + 请求日志                │
//! │      ├─ loader         reqwest 流式下载 + 安全校验        │
//! │      └─ compositor     适配 / 裁剪 / alpha 叠加（纯函数） │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 统一错误类型 `AppError`，区分 400 与 500 |
//! | [`settings`] | 服务启动配置，支持环境变量覆盖 |
//! | [`image_handler`] | 从 URL 加载两张图片并合成 PNG |

pub mod error;
pub mod image_handler;
pub mod settings;

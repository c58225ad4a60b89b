//! # 图片合成模块（image_handler）
//!
//! ## 设计思路
//!
//! 该模块将“参数校验 → 链接规范化 → 加载校验 → 解码 → 合成 → 编码 → HTTP 暴露”
//! 按职责拆分为多个子模块，避免单文件膨胀与耦合。
//!
//! - `routes`：仅做 HTTP 参数接收/校验与响应适配（薄封装）
//! - `service`：承载可注入状态（`ImageServiceState`）
//! - `handler`：编排整条处理流水线
//! - `normalize`：网盘分享链接改写为直链
//! - `loader`：负责 HTTP 下载、重定向与体积/签名校验
//! - `pipeline`：负责解码、像素限制与 PNG 编码
//! - `compositor`：纯函数，负责适配、裁剪与叠加
//! - `config/error/source`：配置、错误、中间数据模型
//!
//! ## 新同事快速上手
//!
//! 可以按下面顺序理解调用链：
//!
//! ```text
//! GET /imageprocessing/overlay
//!    ↓
//! routes.rs（参数校验，失败 400）
//!    ↓
//! service.rs（State 注入、服务入口）
//!    ↓
//! handler.rs（统一编排 + 阶段耗时日志）
//!    ├─ source.rs / normalize.rs（来源识别 + 网盘直链）
//!    ├─ loader.rs（下载 + URL/体积/签名校验）
//!    ├─ pipeline.rs（解码 + 像素限制）
//!    ├─ compositor.rs（适配 + 裁剪 + 叠加）
//!    └─ pipeline.rs（PNG 编码）
//!    ↓
//! 返回 PNG，或 AppError → 500
//! ```

pub mod compositor;
mod config;
mod error;
mod handler;
mod loader;
pub mod normalize;
mod pipeline;
pub mod routes;
mod service;
mod source;

pub use config::ImageConfig;
pub use error::ImageError;
pub use handler::ImageHandler;
pub use routes::{router, OVERLAY_PATH};
pub use service::ImageServiceState;
pub use source::{ImageRole, ImageSource, OverlayRequest};

//! # 相框合成服务：应用入口
//!
//! 本文件仅负责日志初始化、配置读取与 HTTP 监听。
//! 业务逻辑分布在各子模块中，详见 `lib.rs` 架构文档。

use frame_overlay::error::AppError;
use frame_overlay::image_handler::{self, ImageServiceState};
use frame_overlay::settings::ServerSettings;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = ServerSettings::from_env();
    let state = ImageServiceState::with_config(settings.image.clone()).map_err(|err| {
        log::error!("startup: 图片配置非法: {err}");
        AppError::Config(err.to_string())
    })?;

    let app = image_handler::router(state);

    log::info!("startup: 服务启动，监听 {}...", settings.bind_addr);
    let listener = tokio::net::TcpListener::bind(&settings.bind_addr)
        .await
        .inspect_err(|err| log::error!("startup: 监听 {} 失败: {err}", settings.bind_addr))?;

    axum::serve(listener, app).await.inspect_err(|err| {
        log::error!("服务异常退出: {err}");
    })?;

    Ok(())
}

// 端到端测试：通过 Router 直接发请求，上游图片由本地 TcpListener 线程提供。

use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use std::net::TcpListener;
use std::thread;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use frame_overlay::image_handler::{self, ImageConfig, ImageServiceState, OVERLAY_PATH};
use image::{DynamicImage, GenericImageView, ImageBuffer, ImageFormat, Rgba};
use tower::ServiceExt;

fn png_bytes(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        if color[3] == 0 && (x < 4 || y < 4) {
            Rgba([255, 255, 255, 255])
        } else {
            Rgba(color)
        }
    });
    let mut cursor = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut cursor, ImageFormat::Png)
        .expect("failed to encode test image");
    cursor.into_inner()
}

fn http_response(status: &str, content_type: &str, body: &[u8]) -> Vec<u8> {
    let mut response = format!(
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        content_type,
        body.len()
    )
    .into_bytes();
    response.extend_from_slice(body);
    response
}

/// 按请求路径返回预置响应，处理 `connections` 个连接后退出。
fn spawn_upstream(routes: HashMap<&'static str, Vec<u8>>, connections: usize) -> (u16, thread::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind test server failed");
    let port = listener.local_addr().expect("read local addr failed").port();

    let server = thread::spawn(move || {
        for _ in 0..connections {
            let (mut stream, _) = listener.accept().expect("accept failed");
            let mut req_buf = [0u8; 2048];
            let read = stream.read(&mut req_buf).unwrap_or(0);
            let request = String::from_utf8_lossy(&req_buf[..read]);
            let path = request
                .lines()
                .next()
                .and_then(|line| line.split_whitespace().nth(1))
                .unwrap_or("/")
                .to_string();

            let response = routes
                .get(path.as_str())
                .cloned()
                .unwrap_or_else(|| http_response("404 Not Found", "text/plain", b"not found"));
            stream.write_all(&response).expect("write response failed");
            stream.flush().expect("flush failed");
        }
    });

    (port, server)
}

fn app() -> axum::Router {
    image_handler::router(ImageServiceState::new().expect("state init failed"))
}

fn hardened_app() -> axum::Router {
    let mut config = ImageConfig::default();
    config.allow_private_network = false;
    image_handler::router(ImageServiceState::with_config(config).expect("state init failed"))
}

fn overlay_uri(params: &[(&str, &str)]) -> String {
    let mut url = reqwest::Url::parse("http://service.test").expect("base url");
    url.set_path(OVERLAY_PATH);
    if !params.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in params {
            pairs.append_pair(key, value);
        }
    }

    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

async fn get(uri: &str) -> (StatusCode, Option<String>, Vec<u8>) {
    send(app(), uri).await
}

async fn send(app: axum::Router, uri: &str) -> (StatusCode, Option<String>, Vec<u8>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).expect("request"))
        .await
        .expect("router should respond");

    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body failed");

    (status, content_type, body.to_vec())
}

#[tokio::test]
async fn missing_parameters_are_rejected_without_fetching() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind test server failed");
    listener.set_nonblocking(true).expect("set nonblocking failed");
    let frame_url = format!(
        "http://127.0.0.1:{}/frame.png",
        listener.local_addr().expect("read local addr failed").port()
    );

    let (status, _, body) = get(&overlay_uri(&[("frame_url", frame_url.as_str())])).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(String::from_utf8_lossy(&body), "image_url is required");
    assert!(listener.accept().is_err(), "no upstream connection should be made");

    let (status, _, body) = get(&overlay_uri(&[])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(String::from_utf8_lossy(&body), "frame_url and image_url are required");
}

#[tokio::test]
async fn malformed_url_is_a_bad_request() {
    let (status, content_type, body) = get(&overlay_uri(&[
        ("frame_url", "not a url"),
        ("image_url", "https://example.com/a.png"),
    ]))
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(content_type.unwrap_or_default().starts_with("text/plain"));
    assert!(String::from_utf8_lossy(&body).starts_with("invalid frame_url"));
}

#[tokio::test]
async fn wide_frame_and_square_subject_produce_fitted_png() {
    let mut routes = HashMap::new();
    routes.insert("/frame.png", http_response("200 OK", "image/png", &png_bytes(200, 100, [0, 0, 0, 0])));
    routes.insert("/subject.png", http_response("200 OK", "image/png", &png_bytes(400, 400, [0, 128, 255, 255])));
    let (port, server) = spawn_upstream(routes, 2);

    let frame_url = format!("http://127.0.0.1:{}/frame.png", port);
    let image_url = format!("http://127.0.0.1:{}/subject.png", port);
    let (status, content_type, body) = get(&overlay_uri(&[
        ("frame_url", frame_url.as_str()),
        ("image_url", image_url.as_str()),
    ]))
    .await;

    server.join().expect("server thread failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("image/png"));
    let output = image::load_from_memory(&body).expect("response should be a png");
    assert_eq!(output.dimensions(), (100, 100));
}

#[tokio::test]
async fn tall_frame_is_stretched_to_subject_size() {
    let mut routes = HashMap::new();
    routes.insert("/frame.png", http_response("200 OK", "image/png", &png_bytes(100, 200, [0, 0, 0, 0])));
    routes.insert("/subject.png", http_response("200 OK", "image/png", &png_bytes(100, 50, [10, 200, 10, 255])));
    let (port, server) = spawn_upstream(routes, 2);

    let frame_url = format!("http://127.0.0.1:{}/frame.png", port);
    let image_url = format!("http://127.0.0.1:{}/subject.png", port);
    let (status, _, body) = get(&overlay_uri(&[
        ("frame_url", frame_url.as_str()),
        ("image_url", image_url.as_str()),
    ]))
    .await;

    server.join().expect("server thread failed");
    assert_eq!(status, StatusCode::OK);
    let output = image::load_from_memory(&body).expect("response should be a png");
    assert_eq!(output.dimensions(), (100, 50));
}

#[tokio::test]
async fn upstream_404_is_internal_error_without_leaking_status() {
    let mut routes = HashMap::new();
    routes.insert("/frame.png", http_response("200 OK", "image/png", &png_bytes(20, 20, [0, 0, 0, 0])));
    let (port, server) = spawn_upstream(routes, 2);

    let frame_url = format!("http://127.0.0.1:{}/frame.png", port);
    let image_url = format!("http://127.0.0.1:{}/gone.png", port);
    let (status, _, body) = get(&overlay_uri(&[
        ("frame_url", frame_url.as_str()),
        ("image_url", image_url.as_str()),
    ]))
    .await;

    server.join().expect("server thread failed");
    let body = String::from_utf8_lossy(&body);
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "failed to download main image");
    assert!(!body.contains("404"));
}

#[tokio::test]
async fn short_drive_link_is_internal_error() {
    let (status, _, body) = get(&overlay_uri(&[
        ("frame_url", "https://drive.google.com/file"),
        ("image_url", "https://example.com/a.png"),
    ]))
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(String::from_utf8_lossy(&body), "failed to download frame image");
}

#[tokio::test]
async fn non_image_body_is_internal_error() {
    let mut routes = HashMap::new();
    routes.insert("/frame.html", http_response("200 OK", "text/html", b"<html>nope</html>"));
    let (port, server) = spawn_upstream(routes, 1);

    let frame_url = format!("http://127.0.0.1:{}/frame.html", port);
    let (status, _, body) = get(&overlay_uri(&[
        ("frame_url", frame_url.as_str()),
        ("image_url", "https://example.com/a.png"),
    ]))
    .await;

    server.join().expect("server thread failed");
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(String::from_utf8_lossy(&body), "failed to download frame image");
}

#[tokio::test]
async fn repeated_requests_return_identical_bytes() {
    let frame = png_bytes(60, 40, [0, 0, 0, 0]);
    let subject = png_bytes(90, 70, [220, 40, 90, 255]);
    let mut routes = HashMap::new();
    routes.insert("/frame.png", http_response("200 OK", "image/png", &frame));
    routes.insert("/subject.png", http_response("200 OK", "image/png", &subject));
    let (port, server) = spawn_upstream(routes, 4);

    let frame_url = format!("http://127.0.0.1:{}/frame.png", port);
    let image_url = format!("http://127.0.0.1:{}/subject.png", port);
    let uri = overlay_uri(&[("frame_url", frame_url.as_str()), ("image_url", image_url.as_str())]);

    let (first_status, _, first) = get(&uri).await;
    let (second_status, _, second) = get(&uri).await;

    server.join().expect("server thread failed");
    assert_eq!(first_status, StatusCode::OK);
    assert_eq!(second_status, StatusCode::OK);
    assert_eq!(first, second);
}

#[tokio::test]
async fn small_subject_keeps_its_size() {
    let mut routes = HashMap::new();
    routes.insert("/frame.png", http_response("200 OK", "image/png", &png_bytes(200, 100, [0, 0, 0, 0])));
    routes.insert("/subject.png", http_response("200 OK", "image/png", &png_bytes(50, 50, [90, 90, 90, 255])));
    let (port, server) = spawn_upstream(routes, 2);

    let frame_url = format!("http://127.0.0.1:{}/frame.png", port);
    let image_url = format!("http://127.0.0.1:{}/subject.png", port);
    let (status, _, body) = get(&overlay_uri(&[
        ("frame_url", frame_url.as_str()),
        ("image_url", image_url.as_str()),
    ]))
    .await;

    server.join().expect("server thread failed");
    assert_eq!(status, StatusCode::OK);
    let output = image::load_from_memory(&body).expect("response should be a png");
    assert_eq!(output.dimensions(), (50, 50));
}

#[tokio::test]
async fn repeated_parameters_use_the_first_value() {
    let mut routes = HashMap::new();
    routes.insert("/frame.png", http_response("200 OK", "image/png", &png_bytes(100, 200, [0, 0, 0, 0])));
    routes.insert("/subject.png", http_response("200 OK", "image/png", &png_bytes(100, 50, [1, 2, 3, 255])));
    let (port, server) = spawn_upstream(routes, 2);

    let frame_url = format!("http://127.0.0.1:{}/frame.png", port);
    let image_url = format!("http://127.0.0.1:{}/subject.png", port);
    let (status, content_type, _) = get(&overlay_uri(&[
        ("frame_url", frame_url.as_str()),
        ("image_url", image_url.as_str()),
        ("frame_url", "not a url"),
        ("image_url", "https://example.invalid/never.png"),
    ]))
    .await;

    server.join().expect("server thread failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("image/png"));
}

#[tokio::test]
async fn hardened_service_refuses_loopback_upstream() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind test server failed");
    listener.set_nonblocking(true).expect("set nonblocking failed");
    let port = listener.local_addr().expect("read local addr failed").port();
    let frame_url = format!("http://127.0.0.1:{}/frame.png", port);
    let image_url = format!("http://127.0.0.1:{}/subject.png", port);

    let (status, _, body) = send(
        hardened_app(),
        &overlay_uri(&[("frame_url", frame_url.as_str()), ("image_url", image_url.as_str())]),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(String::from_utf8_lossy(&body), "failed to download frame image");
    assert!(listener.accept().is_err(), "no upstream connection should be made");
}

#[tokio::test]
async fn unknown_path_is_not_found() {
    let (status, _, _) = get("/imageprocessing/other").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

use std::future::Future;

use axum::{
    Json, Router,
    body::Body,
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use bytes::Bytes;
use futures_util::StreamExt;
use handoff_core::{ErrorBody, UploadReceipt};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

pub const UPLOAD_PATH: &str = "/upload";

/// `POST /upload` and nothing else. Other methods on the path and other
/// paths both answer 404.
pub fn router() -> Router {
    Router::new()
        .route(UPLOAD_PATH, post(upload).fallback(not_found))
        .fallback(not_found)
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
}

/// Serve `router()` on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    info!("Receiver listening on {}", listener.local_addr()?);
    axum::serve(listener, router())
        .with_graceful_shutdown(shutdown)
        .await
}

/// POST /upload: buffer the whole body, answer with its length and digest.
pub async fn upload(body: Body) -> Response {
    match read_body(body).await {
        Ok(bytes) => {
            let receipt = UploadReceipt::for_payload(&bytes);
            debug!("Received {} bytes sha256={}", receipt.len, receipt.sha256);
            (StatusCode::OK, Json(receipt)).into_response()
        }
        Err(e) => {
            warn!("Upload body failed: {}", e);
            internal_error(format!("Failed to read request body: {}", e))
        }
    }
}

/// Collect a request body into memory.
pub async fn read_body(body: Body) -> Result<Bytes, axum::Error> {
    let mut stream = http_body_util::BodyStream::new(body);
    let mut buf = Vec::new();
    while let Some(frame) = stream.next().await {
        if let Ok(data) = frame?.into_data() {
            buf.extend_from_slice(&data);
        }
    }
    Ok(Bytes::from(buf))
}

pub fn internal_error(message: String) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody { error: message }),
    )
        .into_response()
}

async fn not_found() -> (StatusCode, Json<ErrorBody>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            error: "Not found".into(),
        }),
    )
}

//! HTTP surface: `POST /segment` plus health and info routes.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, DefaultBodyLimit, State},
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::{
    errors::{Result, SegError},
    pipeline::{SegmentationContext, Segmented},
};

pub const ENDPOINTS: [&str; 3] = ["/segment", "/healthz", "/"];

/// Builds the service router.
///
/// Images arrive base64-encoded inside the JSON body, so axum's 2 MB default
/// body limit is lifted; request size is bounded by the deployment's proxy.
pub fn router(context: Arc<SegmentationContext>) -> Router {
    Router::new()
        .route("/", get(service_info))
        .route("/healthz", get(healthz))
        .route("/segment", post(segment))
        .fallback(not_found)
        .layer(DefaultBodyLimit::disable())
        .with_state(context)
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    kind: &'static str,
}

impl IntoResponse for SegError {
    fn into_response(self) -> Response {
        let status = if self.is_client_error() {
            warn!(kind = self.kind(), "rejected request: {}", self);
            StatusCode::BAD_REQUEST
        } else {
            error!(kind = self.kind(), "error in /segment: {}", self.detailed_message());
            StatusCode::INTERNAL_SERVER_ERROR
        };

        let body = ErrorBody {
            error: self.to_string(),
            kind: self.kind(),
        };
        (status, Json(body)).into_response()
    }
}

async fn segment(
    State(context): State<Arc<SegmentationContext>>,
    body: std::result::Result<Bytes, BytesRejection>,
) -> Result<Json<Segmented>> {
    let body = body.map_err(|rejection| {
        SegError::invalid_input(format!("Failed to read request body: {}", rejection.body_text()))
    })?;
    let image_field = image_field(&body)?;

    let segmented = tokio::task::spawn_blocking(move || context.segment(&image_field))
        .await
        .map_err(|e| SegError::inference("segmentation task", e))??;

    info!(
        width = segmented.width,
        height = segmented.height,
        "segmented image"
    );
    Ok(Json(segmented))
}

/// Validates the request body and extracts its `image` field.
fn image_field(body: &[u8]) -> Result<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(SegError::invalid_input("Missing JSON body"));
    }

    let value: Value = serde_json::from_slice(body)
        .map_err(|e| SegError::invalid_input(format!("Request body is not valid JSON: {e}")))?;

    match value {
        Value::Null => Err(SegError::invalid_input("Missing JSON body")),
        Value::Object(mut fields) => fields
            .remove("image")
            .filter(|image| !image.is_null())
            .ok_or_else(|| SegError::invalid_input("Missing image (base64)")),
        _ => Err(SegError::invalid_input("Request body must be a JSON object")),
    }
}

async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn service_info() -> Json<Value> {
    Json(json!({
        "ok": true,
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": ENDPOINTS,
    }))
}

async fn not_found(uri: Uri) -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Not found", "path": uri.path() })),
    )
}

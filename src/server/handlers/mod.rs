//! Route handlers, one module per concern.

pub mod files;
pub mod parse;
pub mod translate;

use crate::server::error::{ok, ApiResult};
use serde_json::{json, Value};

/// `GET /api/health`
pub async fn health() -> ApiResult<Value> {
    ok("Service is running", json!({ "status": "ok" }))
}

#![forbid(unsafe_code)]

pub mod client;
pub mod server;

pub use client::{RpcClient, RpcClientError};
pub use server::{Dispatcher, MethodError};

use serde_json::{Value, json};
use std::sync::atomic::{AtomicI64, Ordering};

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

// Request ids exist for correlation in logs; responses are matched to
// requests by order on the connection, not by id.
static NEXT_REQUEST_ID: AtomicI64 = AtomicI64::new(1);

pub(crate) fn next_request_id() -> i64 {
    NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed)
}

pub(crate) fn result_envelope(result: Value) -> Value {
    json!({ "result": result })
}

pub(crate) fn error_envelope(code: i64, message: &str) -> Value {
    json!({ "error": { "code": code, "message": message } })
}

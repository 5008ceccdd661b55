#![forbid(unsafe_code)]

use super::{
    INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR,
    error_envelope, result_envelope,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;

/// Fault raised by a registered method. Everything else in the taxonomy
/// (parse, invalid request, method not found) is produced by the
/// dispatcher itself.
#[derive(Debug)]
pub enum MethodError {
    InvalidParams(String),
    Internal(String),
}

impl MethodError {
    pub fn internal(err: impl std::fmt::Display) -> Self {
        MethodError::Internal(err.to_string())
    }
}

impl std::fmt::Display for MethodError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MethodError::InvalidParams(message) => write!(f, "invalid params: {message}"),
            MethodError::Internal(message) => write!(f, "internal error: {message}"),
        }
    }
}

impl std::error::Error for MethodError {}

type BoxedMethod = Box<dyn Fn(Value) -> Result<Value, MethodError> + Send + Sync>;

/// Method registry. Handlers take typed params and return typed results;
/// the params shape is enforced by deserialization before the handler runs.
#[derive(Default)]
pub struct Dispatcher {
    methods: HashMap<String, BoxedMethod>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self { methods: HashMap::new() }
    }

    pub fn register<P, R, F>(&mut self, name: &str, handler: F)
    where
        P: DeserializeOwned,
        R: Serialize,
        F: Fn(P) -> Result<R, MethodError> + Send + Sync + 'static,
    {
        let wrapped: BoxedMethod = Box::new(move |params: Value| {
            let params: P = serde_json::from_value(params)
                .map_err(|err| MethodError::InvalidParams(err.to_string()))?;
            let result = handler(params)?;
            serde_json::to_value(result).map_err(MethodError::internal)
        });
        self.methods.insert(name.to_string(), wrapped);
    }

    /// Turns one raw request body into one raw response body. Never fails:
    /// every fault becomes a structured error envelope, so a bad call can
    /// take down neither the connection nor the process.
    pub fn handle_request(&self, raw_request: &[u8]) -> Vec<u8> {
        let response = self.dispatch(raw_request);
        serde_json::to_vec(&response).unwrap_or_else(|_| {
            br#"{"error":{"code":-32603,"message":"unserializable response"}}"#.to_vec()
        })
    }

    fn dispatch(&self, raw_request: &[u8]) -> Value {
        let parsed: Value = match serde_json::from_slice(raw_request) {
            Ok(value) => value,
            Err(err) => return error_envelope(PARSE_ERROR, &format!("parse error: {err}")),
        };
        let Some(request) = parsed.as_object() else {
            return error_envelope(INVALID_REQUEST, "request must be a JSON object");
        };
        let Some(method) = request.get("method").and_then(Value::as_str) else {
            return error_envelope(INVALID_REQUEST, "request is missing a method name");
        };
        let Some(params) = request.get("params") else {
            return error_envelope(INVALID_REQUEST, "request is missing params");
        };
        if !params.is_object() {
            return error_envelope(INVALID_REQUEST, "params must be a JSON object");
        }
        let Some(handler) = self.methods.get(method) else {
            return error_envelope(METHOD_NOT_FOUND, &format!("method not found: {method}"));
        };
        match handler(params.clone()) {
            Ok(result) => result_envelope(result),
            Err(MethodError::InvalidParams(message)) => error_envelope(INVALID_PARAMS, &message),
            Err(MethodError::Internal(message)) => error_envelope(INTERNAL_ERROR, &message),
        }
    }
}

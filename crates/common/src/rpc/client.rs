#![forbid(unsafe_code)]

use super::next_request_id;
use crate::wire::{WireError, read_frame, write_frame};
use serde_json::{Value, json};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::PathBuf;

#[derive(Debug)]
pub enum RpcClientError {
    Io(std::io::Error),
    Wire(WireError),
    Json(serde_json::Error),
    ConnectionClosed,
    MalformedResponse(&'static str),
    Remote { code: i64, message: String },
}

impl std::fmt::Display for RpcClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RpcClientError::Io(err) => write!(f, "rpc i/o error: {err}"),
            RpcClientError::Wire(err) => write!(f, "rpc transport fault: {err}"),
            RpcClientError::Json(err) => write!(f, "unparseable rpc response: {err}"),
            RpcClientError::ConnectionClosed => write!(f, "rpc connection closed by peer"),
            RpcClientError::MalformedResponse(what) => write!(f, "malformed rpc response: {what}"),
            RpcClientError::Remote { code, message } => {
                write!(f, "remote error {code}: {message}")
            }
        }
    }
}

impl std::error::Error for RpcClientError {}

impl From<std::io::Error> for RpcClientError {
    fn from(err: std::io::Error) -> Self {
        RpcClientError::Io(err)
    }
}

impl From<WireError> for RpcClientError {
    fn from(err: WireError) -> Self {
        RpcClientError::Wire(err)
    }
}

/// Synchronous client for the agent's framed-JSON RPC socket.
///
/// Connects lazily on the first call. Any transport fault tears the
/// connection down; the next call reconnects. A `Remote` error is a
/// well-formed error envelope from the server and leaves the connection
/// usable.
pub struct RpcClient {
    socket_path: PathBuf,
    stream: Option<UnixStream>,
}

impl RpcClient {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self { socket_path: socket_path.into(), stream: None }
    }

    pub fn connect(&mut self) -> Result<(), RpcClientError> {
        if self.stream.is_none() {
            self.stream = Some(UnixStream::connect(&self.socket_path)?);
        }
        Ok(())
    }

    pub fn disconnect(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }

    /// One call, one response, matched by order on the connection.
    pub fn call(&mut self, method: &str, params: Value) -> Result<Value, RpcClientError> {
        self.connect()?;
        let request = json!({
            "method": method,
            "params": params,
            "id": next_request_id(),
        });
        let body = serde_json::to_vec(&request).map_err(RpcClientError::Json)?;

        let raw_response = match self.exchange(&body) {
            Ok(raw) => raw,
            Err(err) => {
                self.disconnect();
                return Err(err);
            }
        };
        let response: Value = match serde_json::from_slice(&raw_response) {
            Ok(value) => value,
            Err(err) => {
                self.disconnect();
                return Err(RpcClientError::Json(err));
            }
        };

        if let Some(error) = response.get("error") {
            let code = error.get("code").and_then(Value::as_i64).unwrap_or(super::INTERNAL_ERROR);
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown remote error")
                .to_string();
            return Err(RpcClientError::Remote { code, message });
        }
        match response.get("result") {
            Some(result) => Ok(result.clone()),
            None => {
                self.disconnect();
                Err(RpcClientError::MalformedResponse("neither result nor error present"))
            }
        }
    }

    fn exchange(&mut self, body: &[u8]) -> Result<Vec<u8>, RpcClientError> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(RpcClientError::ConnectionClosed);
        };
        write_frame(stream, body)?;
        match read_frame(stream)? {
            Some(raw) => Ok(raw),
            None => Err(RpcClientError::ConnectionClosed),
        }
    }
}

impl Drop for RpcClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

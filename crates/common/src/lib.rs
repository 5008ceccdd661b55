#![forbid(unsafe_code)]

pub mod config;
pub mod flock;
pub mod models;
pub mod rpc;
pub mod time;
pub mod wire;

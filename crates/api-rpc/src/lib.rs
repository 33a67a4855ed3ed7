//! JSON-RPC API Layer
//!
//! Implements the JSON-RPC 2.0 control surface for the RenderQ scheduler.

pub mod error;
pub mod handler;
pub mod server;
pub mod types;

pub use server::{RpcServer, RpcServerConfig};

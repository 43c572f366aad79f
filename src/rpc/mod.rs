//! Admin API over the running node. Transport for it (HTTP, IPC) is left
//! to the embedder; `AdminApi::handle_request` takes a method and params.

pub mod handler;

pub use handler::{AdminApi, ApiError, NodeInfo};

//! RPC exposure of the native service
//!
//! The service is reachable over a newline-delimited JSON channel. The method
//! table in `descriptor` says which methods answer once and which stream.

mod descriptor;
mod io;
mod message;
mod server;

pub use descriptor::{find_method, MethodDescriptor, ProxyKind, NATIVE_CHANNEL, NATIVE_METHODS};
pub use io::{log_preview, parse_request, ParseFailure, RequestReader, ResponseWriter};
pub use message::{
    MessageBoxParams, NativeCall, OpenInAppParams, OpenParams, PickDirectoryParams,
    PickFileParams, ResponseBody, RpcRequest, RpcResponse, UnsubscribeParams, UNKNOWN_REQUEST_ID,
};
pub use server::{serve, serve_stdio};

//! Ledger Gateway Library
//!
//! An HTTP gateway in front of a ledger core node that only speaks an
//! asynchronous, query-identifier-tagged protocol over a single shared
//! connection. Each HTTP request is bridged onto that connection by
//! registering a per-query waiter, suspending until the matching tagged
//! response arrives (or a deadline fires), and reassembling the raw
//! payload into a structured result.

pub mod assemble;
pub mod codec;
pub mod config;
pub mod core;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::GatewayConfig;
pub use error::{GatewayError, GatewayResult};
pub use http::HttpServer;
pub use lifecycle::{Shutdown, ShutdownListener};

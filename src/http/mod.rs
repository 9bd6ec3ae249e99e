//! HTTP boundary subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → server.rs (router, middleware, request ID)
//!     → handlers.rs (validate fields, drive session + core client)
//!     → assemble (structured result from the raw envelope)
//!     → response.rs (error taxonomy → status + body)
//! ```

pub mod handlers;
pub mod response;
pub mod server;

pub use server::{AppState, HttpServer};

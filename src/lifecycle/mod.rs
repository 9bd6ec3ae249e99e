//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Parse args → Load config → Connect core → Start metrics → Serve
//!
//! Shutdown (shutdown.rs):
//!     Signal or trigger → Stop accepting → Drain in-flight → Exit
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then the core connection, then HTTP
//! - Fail fast: any startup error is fatal
//! - Core connection loss at runtime is NOT fatal; it fails in-flight
//!   waits and subsequent calls until the process is restarted

pub mod shutdown;

pub use shutdown::{Shutdown, ShutdownListener};

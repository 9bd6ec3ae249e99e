//! Core node connection subsystem.
//!
//! # Data Flow
//! ```text
//! HTTP handler
//!     → session.rs (acquire gate, register identity)
//!     → client.rs submit (tag request, transmit frame)
//!     → correlator.rs await_response (suspend on private oneshot)
//!
//! Inbound reader task (client.rs):
//!     framed stream → wire.rs read_frame → correlator.rs deliver
//!         → matching wait resolves, or stale drop (counted)
//! ```
//!
//! # Design Decisions
//! - One shared, ordered, bidirectional stream to the core node
//! - Response routing is purely by query id; arrival order across
//!   different ids carries no meaning
//! - The session gate serializes whole units of work because the core's
//!   notion of "current identity" is connection-global

pub mod client;
pub mod correlator;
pub mod session;
pub mod wire;

pub use client::CoreClient;
pub use correlator::QueryCorrelator;
pub use session::{SessionBinding, SessionContext, SessionGate};
pub use wire::{CoreCommand, DomainId, QueryId, RequestFrame, ResponseEnvelope, UserId};

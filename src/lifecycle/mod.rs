//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → server stops accepting → in-flight requests drain
//!     → telemetry providers flushed → exit
//! ```
//!
//! # Design Decisions
//! - Telemetry is flushed after the server drains, never before, so the
//!   last requests' spans and logs are exported

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::shutdown_signal;

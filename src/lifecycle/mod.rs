//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Construct services → Spawn sweeps → Serve
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Sweeps drain → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Background sweeps are explicit `Sweeper` tasks, never implicit timers;
//!   each returns a join handle the bootstrap owns
//! - Every long-running task subscribes to one broadcast shutdown channel
//! - Components expose a plain `sweep()` so tests drive eviction directly

pub mod shutdown;
pub mod signals;
pub mod sweeper;

pub use shutdown::Shutdown;
pub use sweeper::Sweeper;

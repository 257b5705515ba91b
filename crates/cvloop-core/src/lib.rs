//! # cvloop-core
//!
//! Condition variables that let blocking-style code run on top of a
//! single-threaded, callback-driven event loop.
//!
//! This crate is platform-agnostic and contains no OS-specific code.
//! The event loop is reached only through the [`EventLoop`] trait; a
//! concrete loop lives in `cvloop-runtime`.
//!
//! ## Modules
//!
//! - `condvar` - The condition variable state machine and blocking wait
//! - `registry` - Live-count, keepalive and reentrancy bookkeeping
//! - `pump` - Cooperative driving of the event loop
//! - `traits` - Event loop boundary and the `Trigger` capability
//! - `id` - Condition variable identifier type
//! - `error` - Error types
//! - `kprint` - Kernel-style debug printing macros
//! - `env` - Environment variable utilities

pub mod id;
pub mod error;
pub mod traits;
pub mod pump;
pub mod registry;
pub mod condvar;
pub mod kprint;
pub mod env;

#[cfg(test)]
mod testing;

// Re-exports for convenience
pub use id::CvId;
pub use error::{LoopError, RecvError};
pub use traits::{EventLoop, KeepaliveHandle, Trigger};
pub use pump::{pump_until, PumpOutcome};
pub use registry::{RegistryStats, WaitGuard, WaiterRegistry, DEFAULT_KEEPALIVE_PERIOD};
pub use condvar::{Callback, CondVar};
pub use env::{env_get, env_get_bool, env_get_millis, env_get_opt};

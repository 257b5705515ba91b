//! # cvloop-runtime
//!
//! A concrete single-threaded event loop for cvloop condition variables.
//!
//! This crate provides:
//! - One-shot and repeating timers on a binary heap
//! - Immediate tasks (`next_tick`)
//! - Idle parking of the loop thread (futex on Linux)
//! - `Remote` handles for posting work from other threads
//!
//! [`Scheduler`] implements [`cvloop_core::EventLoop`], so it can back a
//! `WaiterRegistry` directly.

pub mod config;
pub mod timer;
pub mod parking;
pub mod remote;
pub mod scheduler;

// Re-exports
pub use config::LoopConfig;
pub use parking::{new_parking, LoopParking};
pub use remote::Remote;
pub use scheduler::{Scheduler, SchedulerStats};
pub use timer::{TimerHandle, TimerStats, TimerType};

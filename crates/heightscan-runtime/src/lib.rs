//! `heightscan-runtime` – the processing engine.
//!
//! Drives continuous frame-to-heightmap conversion on a dedicated worker
//! thread and exposes the lock-free control surface used to steer it.
//!
//! # Modules
//!
//! - [`processing_loop`] – [`ProcessingLoop`]: spawns the worker and returns a
//!   [`ScanHandle`] carrying the completion and progress channels.
//! - [`control`] – [`ControlPlane`]: distance window, filter-stage toggles and
//!   worker lifecycle shared with the outside world.
//! - [`retry`] – [`AcquisitionRetry`][retry::AcquisitionRetry]: exponential
//!   backoff for failed frame waits.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: initialises
//!   the global `tracing` subscriber with an optional OTLP span exporter.

pub mod control;
pub mod processing_loop;
pub mod retry;
pub mod telemetry;

pub use control::{ControlPlane, LoopState};
pub use processing_loop::{LoopConfig, LoopExit, ProcessingLoop, ScanHandle};
pub use telemetry::{TracerProviderGuard, init_tracing};

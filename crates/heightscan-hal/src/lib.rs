//! `heightscan-hal` – Depth Hardware Abstraction
//!
//! The only layer that talks to depth hardware. Everything above it consumes
//! [`DepthFrame`][heightscan_types::DepthFrame]s through the
//! [`DepthSource`][depth_source::DepthSource] trait, so drivers can be swapped
//! without touching the processing pipeline.
//!
//! # Modules
//!
//! - [`depth_source`] – [`DepthSource`][depth_source::DepthSource] trait plus
//!   the [`StreamConfig`][depth_source::StreamConfig] request and
//!   [`StreamSession`][depth_source::StreamSession] reply types.
//! - [`sim`] – [`SimDepthSource`][sim::SimDepthSource]: a headless simulated
//!   depth camera for tests and demos.

pub mod depth_source;
pub mod sim;

pub use depth_source::{DepthSource, StreamConfig, StreamSession};
pub use sim::SimDepthSource;

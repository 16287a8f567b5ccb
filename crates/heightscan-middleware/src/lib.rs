//! `heightscan-middleware` – output plumbing.
//!
//! Carries processed heightmaps from the worker thread to any number of
//! consumers without letting a slow consumer stall capture.
//!
//! # Modules
//!
//! - [`bus`] – [`HeightmapBus`]: bounded, drop-oldest broadcast channel for
//!   [`HeightmapSample`][heightscan_types::HeightmapSample]s.

pub mod bus;

pub use bus::{HeightmapBus, HeightmapReceiver};

//! `heightscan-perception` – per-frame depth processing.
//!
//! Turns raw depth frames into the 1-D height profile published by the
//! processing loop.
//!
//! # Modules
//!
//! - [`chain`] – [`FilterChain`][chain::FilterChain]: ordered, individually
//!   toggleable [`FilterStage`][chain::FilterStage]s with a forward/inverse
//!   disparity transform applied around the smoothing stages.
//! - [`filters`] – the concrete decimation, threshold, disparity, spatial and
//!   temporal filters.
//! - [`range`] – [`RangeParameters`][range::RangeParameters]: lock-free
//!   distance window shared between the control plane and the loop.
//! - [`heightmap`] – [`build_heightmap`][heightmap::build_heightmap]: parallel
//!   top-down column scan.

pub mod chain;
pub mod filters;
pub mod heightmap;
pub mod range;

//! Bounded broadcast channel for processed heightmaps.
//!
//! Uses [`tokio::sync::broadcast`] under the hood: publishing never blocks,
//! every subscriber sees every sample, and a subscriber that falls more than
//! `capacity` samples behind loses the oldest ones instead of stalling the
//! producer.
//!
//! # Example
//!
//! ```rust
//! use heightscan_middleware::HeightmapBus;
//! use heightscan_types::HeightmapSample;
//!
//! let bus = HeightmapBus::new(4);
//! let mut rx = bus.subscribe();
//! bus.publish(HeightmapSample {
//!     frame_number: 1,
//!     timestamp: chrono::Utc::now(),
//!     width: 2,
//!     height: 1,
//!     heightmap: vec![0, 0],
//! });
//! assert_eq!(rx.try_recv().map(|s| s.frame_number), Some(1));
//! ```

use heightscan_types::HeightmapSample;
use tokio::sync::broadcast;
use tracing::{trace, warn};

/// Default number of buffered samples before the oldest are dropped for slow
/// subscribers.
pub const DEFAULT_CAPACITY: usize = 16;

/// Shared heightmap output channel. Clone it cheaply – all clones share the
/// same underlying broadcast channel.
#[derive(Clone, Debug)]
pub struct HeightmapBus {
    sender: broadcast::Sender<HeightmapSample>,
}

impl HeightmapBus {
    /// Create a bus buffering up to `capacity` samples per subscriber.
    /// A capacity of `0` is raised to `1`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Hand `sample` to every current subscriber without waiting.
    ///
    /// Returns the number of subscribers that were handed the sample; `0`
    /// when nobody is listening, which is a normal condition.
    pub fn publish(&self, sample: HeightmapSample) -> usize {
        let frame_number = sample.frame_number;
        match self.sender.send(sample) {
            Ok(n) => n,
            Err(broadcast::error::SendError(_)) => {
                trace!(frame_number, "heightmap dropped: no subscribers");
                0
            }
        }
    }

    /// Subscribe to samples published from now on.
    pub fn subscribe(&self) -> HeightmapReceiver {
        HeightmapReceiver {
            receiver: self.sender.subscribe(),
            dropped: 0,
        }
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for HeightmapBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Receiver
// ────────────────────────────────────────────────────────────────────────────

/// A subscription to a [`HeightmapBus`].
///
/// Lag is absorbed: skipped samples are logged and counted in
/// [`dropped`][Self::dropped], and delivery resumes with the oldest sample
/// still buffered.
pub struct HeightmapReceiver {
    receiver: broadcast::Receiver<HeightmapSample>,
    dropped: u64,
}

impl HeightmapReceiver {
    /// Wait for the next sample.
    ///
    /// Returns `None` once every [`HeightmapBus`] clone has been dropped and
    /// the buffer is drained.
    pub async fn recv(&mut self) -> Option<HeightmapSample> {
        loop {
            match self.receiver.recv().await {
                Ok(sample) => return Some(sample),
                Err(broadcast::error::RecvError::Lagged(n)) => self.record_lag(n),
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Blocking variant of [`recv`][Self::recv] for use outside an async
    /// runtime.
    ///
    /// # Panics
    ///
    /// Panics if called from within an asynchronous execution context.
    pub fn blocking_recv(&mut self) -> Option<HeightmapSample> {
        loop {
            match self.receiver.blocking_recv() {
                Ok(sample) => return Some(sample),
                Err(broadcast::error::RecvError::Lagged(n)) => self.record_lag(n),
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Take the next buffered sample, if any, without waiting.
    pub fn try_recv(&mut self) -> Option<HeightmapSample> {
        loop {
            match self.receiver.try_recv() {
                Ok(sample) => return Some(sample),
                Err(broadcast::error::TryRecvError::Lagged(n)) => self.record_lag(n),
                Err(_) => return None,
            }
        }
    }

    /// Total number of samples this receiver has missed by lagging.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn record_lag(&mut self, n: u64) {
        self.dropped += n;
        warn!(lagged_by = n, total_dropped = self.dropped, "heightmap receiver lagged");
    }
}

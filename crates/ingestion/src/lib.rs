//! # Ingestion
//!
//! Frame ingestion and latency pipeline.
//!
//! Responsibilities:
//! - Wait for the producer's "frame ready" signal ([`SignalWaiter`])
//! - Copy every attached shared buffer and encode it to a JPEG data URI ([`FrameEncoder`])
//! - Compute capture-to-receive latency and keep a bounded history per channel
//! - Publish each cycle into the `FrameStore`, one failed channel never blocking the rest
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{FrameProcessor, SignalWaiter};
//!
//! let waiter = Arc::new(SignalWaiter::new(&config.processing.ready_tag));
//! let handle = FrameProcessor::new(&config.processing, attacher, store, waiter.clone())
//!     .spawn()?;
//!
//! // producer worker side
//! waiter.notify(&signal);
//!
//! // shutdown
//! let stats = handle.shutdown();
//! ```

pub mod encoder;
pub mod error;
mod processor;
mod signal;
mod stats;

pub use encoder::{depth_to_gray8, to_data_uri, FrameEncoder, DATA_URI_PREFIX};
pub use error::{IngestionError, Result};
pub use processor::{system_clock_ns, Clock, CycleReport, FrameProcessor, FrameProcessorHandle};
pub use signal::{SignalStats, SignalWaiter, WaitOutcome};
pub use stats::{ProcessorMetrics, ProcessorMetricsSnapshot};

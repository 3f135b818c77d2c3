//! Buffer region abstraction
//!
//! A region is read-only from the bridge's side: the producer owns and
//! mutates it, the bridge only copies it out.

use std::sync::Arc;

use contracts::ChannelDescriptor;

use crate::error::Result;

/// Externally owned memory region bound to one channel.
pub trait BufferRegion: Send + Sync {
    /// Region name (e.g. `shm_mobile_rgb`)
    fn name(&self) -> &str;

    /// Mapped size in bytes
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy the whole region into `dst`.
    ///
    /// `dst.len()` must equal [`len`](Self::len).
    fn copy_into(&self, dst: &mut [u8]);
}

/// Resolves a channel descriptor to a region.
///
/// Implementations never create or resize regions.
pub trait RegionOpener: Send + Sync {
    /// Open the region named by `descriptor.region`, sized exactly
    /// `descriptor.byte_size()`.
    fn open(&self, descriptor: &ChannelDescriptor) -> Result<Arc<dyn BufferRegion>>;

    /// Opener name (used for logging)
    fn kind(&self) -> &'static str;
}

//! # Attacher
//!
//! 共享内存挂载层：把配置中的每个通道绑定到生产者创建的内存区域。
//!
//! - [`SharedBufferAttacher`]：幂等挂载、部分挂载、后台重试
//! - [`RegionOpener`]：区域解析抽象（POSIX shm / 进程内）
//! - [`InMemoryRegions`]：mock 模式与测试使用的进程内区域
//!
//! ## Features
//!
//! - `posix-shm`（默认）：通过 `shm_open` + `mmap` 挂载 `/dev/shm` 下的区域

mod attacher;
pub mod error;
pub mod memory;
#[cfg(feature = "posix-shm")]
pub mod posix;
pub mod region;

pub use attacher::{AttachReport, Attached, SharedBufferAttacher};
pub use error::{AttachmentError, Result};
pub use memory::{InMemoryRegion, InMemoryRegions};
#[cfg(feature = "posix-shm")]
pub use posix::{PosixRegion, PosixShmOpener};
pub use region::{BufferRegion, RegionOpener};

use std::sync::Arc;

/// Opener for real producers.
///
/// Fails at attach time when built without `posix-shm`.
pub fn system_opener() -> Arc<dyn RegionOpener> {
    #[cfg(feature = "posix-shm")]
    {
        Arc::new(PosixShmOpener)
    }
    #[cfg(not(feature = "posix-shm"))]
    {
        Arc::new(UnsupportedOpener)
    }
}

#[cfg(not(feature = "posix-shm"))]
struct UnsupportedOpener;

#[cfg(not(feature = "posix-shm"))]
impl RegionOpener for UnsupportedOpener {
    fn open(&self, _descriptor: &contracts::ChannelDescriptor) -> Result<Arc<dyn BufferRegion>> {
        Err(AttachmentError::Unsupported(
            "built without the `posix-shm` feature".to_string(),
        ))
    }

    fn kind(&self) -> &'static str {
        "unsupported"
    }
}

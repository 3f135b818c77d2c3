//! POSIX shared memory regions (`shm_open` + `mmap`, read-only)
//!
//! The producer creates `/dev/shm/<region>`; the bridge opens it read-only
//! and maps it `PROT_READ`. The mapping is released on drop; the name is
//! never unlinked from this side.

use std::ptr::{null_mut, NonNull};
use std::sync::Arc;

use contracts::ChannelDescriptor;
use rustix::fs::{fstat, Mode};
use rustix::mm::{mmap, munmap, MapFlags, ProtFlags};
use rustix::{io::Errno, shm};
use tracing::debug;

use crate::error::{AttachmentError, Result};
use crate::region::{BufferRegion, RegionOpener};

/// Read-only mapping of a producer-owned region.
pub struct PosixRegion {
    name: String,
    ptr: NonNull<u8>,
    len: usize,
}

// SAFETY: the mapping is read-only from this process and lives until Drop;
// concurrent readers only perform byte copies out of it.
unsafe impl Send for PosixRegion {}
unsafe impl Sync for PosixRegion {}

impl PosixRegion {
    /// Open `name` and require its size to be exactly `expected` bytes.
    pub fn open(name: &str, expected: usize) -> Result<Self> {
        let path = shm_path(name);

        let fd = shm::open(path.as_str(), shm::OFlags::RDONLY, Mode::empty()).map_err(|err| {
            if err == Errno::NOENT {
                AttachmentError::not_found(name)
            } else {
                AttachmentError::os("shm_open", name, err.to_string())
            }
        })?;

        let stat = fstat(&fd).map_err(|err| AttachmentError::os("fstat", name, err.to_string()))?;
        if stat.st_size != expected as i64 {
            return Err(AttachmentError::SizeMismatch {
                region: name.to_string(),
                expected,
                actual: stat.st_size,
            });
        }

        // SAFETY: the region exists and fstat confirmed its size; the mapping
        // is PROT_READ and never aliases memory owned by this process.
        let ptr = unsafe {
            mmap(
                null_mut(),
                expected,
                ProtFlags::READ,
                MapFlags::SHARED,
                &fd,
                0,
            )
        }
        .map_err(|err| AttachmentError::os("mmap", name, err.to_string()))?;

        let ptr = NonNull::new(ptr.cast::<u8>())
            .ok_or_else(|| AttachmentError::os("mmap", name, "null mapping"))?;

        Ok(Self {
            name: name.to_string(),
            ptr,
            len: expected,
        })
    }
}

impl BufferRegion for PosixRegion {
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> usize {
        self.len
    }

    fn copy_into(&self, dst: &mut [u8]) {
        let n = dst.len().min(self.len);
        // SAFETY: `ptr` is valid for `len` bytes until Drop, `dst` is a
        // distinct local buffer.
        unsafe {
            std::ptr::copy_nonoverlapping(self.ptr.as_ptr(), dst.as_mut_ptr(), n);
        }
    }
}

impl Drop for PosixRegion {
    fn drop(&mut self) {
        // SAFETY: the mapping was created in `open` with exactly `len` bytes
        // and is unmapped only here; no copy can be in flight once we own
        // `self` mutably.
        if let Err(err) = unsafe { munmap(self.ptr.as_ptr().cast(), self.len) } {
            debug!(region = %self.name, error = %err, "munmap failed");
        }
    }
}

impl std::fmt::Debug for PosixRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PosixRegion")
            .field("name", &self.name)
            .field("len", &self.len)
            .finish()
    }
}

/// Opener for regions under `/dev/shm`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PosixShmOpener;

impl RegionOpener for PosixShmOpener {
    fn open(&self, descriptor: &ChannelDescriptor) -> Result<Arc<dyn BufferRegion>> {
        let region = PosixRegion::open(&descriptor.region, descriptor.byte_size())?;
        Ok(Arc::new(region))
    }

    fn kind(&self) -> &'static str {
        "posix-shm"
    }
}

/// POSIX names carry a single leading slash.
fn shm_path(name: &str) -> String {
    if name.starts_with('/') {
        name.to_string()
    } else {
        format!("/{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_gets_leading_slash() {
        assert_eq!(shm_path("shm_map"), "/shm_map");
        assert_eq!(shm_path("/shm_map"), "/shm_map");
    }

    #[test]
    fn maps_reads_and_unmaps_a_live_region() {
        let name = format!("teleop_bridge_test_live_{}", std::process::id());
        let path = shm_path(&name);
        let fd = match shm::open(
            path.as_str(),
            shm::OFlags::CREATE | shm::OFlags::RDWR,
            Mode::from_bits_truncate(0o600),
        ) {
            Ok(fd) => fd,
            Err(err) => {
                eprintln!("shared memory unavailable, skipping: {err}");
                return;
            }
        };
        let payload = [9u8; 12];
        rustix::fs::ftruncate(&fd, payload.len() as u64).unwrap();
        assert_eq!(rustix::io::write(&fd, &payload).unwrap(), payload.len());

        let region = PosixRegion::open(&name, payload.len()).unwrap();
        let mut copy = [0u8; 12];
        region.copy_into(&mut copy);
        assert_eq!(copy, payload);
        drop(region);

        assert!(matches!(
            PosixRegion::open(&name, 4),
            Err(AttachmentError::SizeMismatch { actual: 12, .. })
        ));
        shm::unlink(path.as_str()).unwrap();
    }

    #[test]
    fn missing_region_is_not_found() {
        let desc = ChannelDescriptor::color("teleop_bridge_test_missing_region", 2, 2);
        let result = PosixShmOpener.open(&desc);
        assert!(matches!(result, Err(AttachmentError::NotFound { .. })));
    }
}

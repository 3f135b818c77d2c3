//! In-process regions for mock mode and tests
//!
//! The mock producer creates regions here and writes frames into them; the
//! attacher opens them by name exactly like POSIX shared memory.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use contracts::ChannelDescriptor;
use tracing::debug;

use crate::error::{AttachmentError, Result};
use crate::region::{BufferRegion, RegionOpener};

/// Heap-backed region.
#[derive(Debug)]
pub struct InMemoryRegion {
    name: String,
    data: Mutex<Vec<u8>>,
}

impl InMemoryRegion {
    pub fn new(name: impl Into<String>, size: usize) -> Self {
        Self {
            name: name.into(),
            data: Mutex::new(vec![0; size]),
        }
    }

    /// Overwrite the region from `src` (truncated or zero-padded to the region size).
    pub fn write(&self, src: &[u8]) {
        let mut data = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        let n = src.len().min(data.len());
        data[..n].copy_from_slice(&src[..n]);
        data[n..].fill(0);
    }

    /// Mutate the region in place.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        let mut data = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        f(data.as_mut_slice())
    }
}

impl BufferRegion for InMemoryRegion {
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> usize {
        self.data.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn copy_into(&self, dst: &mut [u8]) {
        let data = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        let n = dst.len().min(data.len());
        dst[..n].copy_from_slice(&data[..n]);
    }
}

/// Named set of in-memory regions; doubles as a [`RegionOpener`].
#[derive(Debug, Default, Clone)]
pub struct InMemoryRegions {
    regions: Arc<Mutex<HashMap<String, Arc<InMemoryRegion>>>>,
}

impl InMemoryRegions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or replace) a zero-filled region.
    pub fn create(&self, name: &str, size: usize) -> Arc<InMemoryRegion> {
        let region = Arc::new(InMemoryRegion::new(name, size));
        self.regions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), Arc::clone(&region));
        debug!(region = name, size, "in-memory region created");
        region
    }

    /// Create a correctly sized region for every descriptor.
    pub fn create_for<'a>(
        &self,
        descriptors: impl IntoIterator<Item = &'a ChannelDescriptor>,
    ) -> Vec<Arc<InMemoryRegion>> {
        descriptors
            .into_iter()
            .map(|d| self.create(&d.region, d.byte_size()))
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<Arc<InMemoryRegion>> {
        self.regions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn remove(&self, name: &str) -> Option<Arc<InMemoryRegion>> {
        self.regions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
    }
}

impl RegionOpener for InMemoryRegions {
    fn open(&self, descriptor: &ChannelDescriptor) -> Result<Arc<dyn BufferRegion>> {
        let region = self
            .get(&descriptor.region)
            .ok_or_else(|| AttachmentError::not_found(&descriptor.region))?;

        let expected = descriptor.byte_size();
        let actual = region.len();
        if actual != expected {
            return Err(AttachmentError::SizeMismatch {
                region: descriptor.region.clone(),
                expected,
                actual: actual as i64,
            });
        }
        Ok(region as Arc<dyn BufferRegion>)
    }

    fn kind(&self) -> &'static str {
        "in-memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_checks_name_and_size() {
        let regions = InMemoryRegions::new();
        let desc = ChannelDescriptor::color("map", 2, 2);

        assert_eq!(
            regions.open(&desc).err(),
            Some(AttachmentError::not_found("shm_map"))
        );

        regions.create("shm_map", 5);
        assert!(matches!(
            regions.open(&desc),
            Err(AttachmentError::SizeMismatch { expected: 12, actual: 5, .. })
        ));

        regions.create("shm_map", 12);
        let region = regions.open(&desc).unwrap();
        assert_eq!(region.len(), 12);
        assert_eq!(region.name(), "shm_map");
    }

    #[test]
    fn write_then_copy() {
        let region = InMemoryRegion::new("r", 4);
        region.write(&[1, 2, 3, 4, 5]);
        let mut out = [0u8; 4];
        region.copy_into(&mut out);
        assert_eq!(out, [1, 2, 3, 4]);

        region.write(&[9]);
        region.copy_into(&mut out);
        assert_eq!(out, [9, 0, 0, 0]);

        region.with_mut(|buf| buf[3] = 7);
        region.copy_into(&mut out);
        assert_eq!(out, [9, 0, 0, 7]);
    }
}

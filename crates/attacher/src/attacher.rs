//! SharedBufferAttacher 核心实现
//!
//! 按 ChannelRegistry 挂载共享内存区域，失败的通道按固定间隔重试。
//! 部分挂载可以运行：未挂载的通道在 FrameStore 中保持占位符。

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use contracts::{ChannelDescriptor, ChannelId, ChannelRegistry};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::{AttachmentError, Result};
use crate::region::{BufferRegion, RegionOpener};

/// Result of a single `attach` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attached {
    /// Region opened by this call
    Newly,
    /// Already attached; no-op
    Already,
}

/// Outcome of one pass over every configured channel.
#[derive(Debug, Clone, Default)]
pub struct AttachReport {
    pub attached: usize,
    pub total: usize,
    pub failures: Vec<(ChannelId, AttachmentError)>,
}

impl AttachReport {
    pub fn is_complete(&self) -> bool {
        self.attached == self.total
    }
}

/// Shared memory attacher
///
/// Owns the live region handles. Readers only get byte copies out of it.
pub struct SharedBufferAttacher {
    registry: ChannelRegistry,
    opener: Arc<dyn RegionOpener>,
    attached: Mutex<HashMap<ChannelId, Arc<dyn BufferRegion>>>,
}

impl SharedBufferAttacher {
    pub fn new(registry: ChannelRegistry, opener: Arc<dyn RegionOpener>) -> Self {
        Self {
            registry,
            opener,
            attached: Mutex::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    /// Bind one channel to its region.
    ///
    /// # 幂等性
    /// 已挂载的通道直接返回 `Attached::Already`。
    pub fn attach(&self, descriptor: &ChannelDescriptor) -> Result<Attached> {
        if self.is_attached(&descriptor.id) {
            return Ok(Attached::Already);
        }

        // Open outside the map lock; the OS calls may be slow.
        let result = self.opener.open(descriptor);
        observability::record_attach_attempt(&descriptor.id, result.is_ok());
        let region = result?;

        let mut attached = self.lock();
        if attached.contains_key(&descriptor.id) {
            return Ok(Attached::Already);
        }
        info!(
            channel = %descriptor.id,
            region = %descriptor.region,
            bytes = region.len(),
            opener = self.opener.kind(),
            "attached to shared region"
        );
        attached.insert(descriptor.id.clone(), region);
        Ok(Attached::Newly)
    }

    /// One attach pass over every configured channel.
    pub fn attach_all(&self) -> AttachReport {
        let mut report = AttachReport {
            total: self.registry.len(),
            ..AttachReport::default()
        };

        for descriptor in self.registry.iter() {
            match self.attach(descriptor) {
                Ok(_) => report.attached += 1,
                Err(e) => {
                    debug!(channel = %descriptor.id, error = %e, "attach failed");
                    report.failures.push((descriptor.id.clone(), e));
                }
            }
        }
        report
    }

    pub fn is_attached(&self, channel_id: &str) -> bool {
        self.lock().contains_key(channel_id)
    }

    pub fn attached_count(&self) -> usize {
        self.lock().len()
    }

    /// Defensive copy of a channel's region.
    ///
    /// The lock is held only for the copy itself.
    pub fn copy_out(&self, channel_id: &str) -> Result<Bytes> {
        let attached = self.lock();
        let region = attached
            .get(channel_id)
            .ok_or_else(|| AttachmentError::not_attached(channel_id))?;

        let mut buf = BytesMut::zeroed(region.len());
        region.copy_into(&mut buf);
        drop(attached);

        Ok(buf.freeze())
    }

    /// Release every mapping.
    pub fn detach_all(&self) {
        let mut attached = self.lock();
        let count = attached.len();
        attached.clear();
        info!(count, "shared regions released");
    }

    /// Retry attaching on a fixed interval until every channel is attached
    /// or `cancel` fires.
    #[instrument(
        name = "attacher_retry_loop",
        skip(self, cancel),
        fields(channels = self.registry.len(), interval_ms = interval.as_millis() as u64)
    )]
    pub async fn run_retry_loop(
        self: Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> AttachReport {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut last = AttachReport {
            total: self.registry.len(),
            ..AttachReport::default()
        };

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(attached = last.attached, total = last.total, "attach retry cancelled");
                    return last;
                }
                _ = ticker.tick() => {
                    last = self.attach_all();
                    if last.is_complete() {
                        info!(attached = last.attached, "all shared regions attached");
                        return last;
                    }
                    let missing: Vec<&str> = last.failures.iter().map(|(id, _)| id.as_str()).collect();
                    warn!(
                        attached = last.attached,
                        total = last.total,
                        missing = ?missing,
                        "not all shared regions ready, retrying"
                    );
                }
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ChannelId, Arc<dyn BufferRegion>>> {
        self.attached.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SharedBufferAttacher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedBufferAttacher")
            .field("channels", &self.registry.len())
            .field("attached", &self.attached_count())
            .field("opener", &self.opener.kind())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryRegions;

    fn setup() -> (InMemoryRegions, Arc<SharedBufferAttacher>) {
        let registry = ChannelRegistry::new(vec![
            ChannelDescriptor::color("mobile_rgb", 2, 2),
            ChannelDescriptor::color("hand_rgb", 2, 2),
        ])
        .unwrap();
        let regions = InMemoryRegions::new();
        let attacher = Arc::new(SharedBufferAttacher::new(
            registry,
            Arc::new(regions.clone()),
        ));
        (regions, attacher)
    }

    #[test]
    fn attach_is_idempotent() {
        let (regions, attacher) = setup();
        regions.create("shm_mobile_rgb", 12);
        let desc = attacher.registry().get("mobile_rgb").unwrap().clone();

        assert_eq!(attacher.attach(&desc), Ok(Attached::Newly));
        assert_eq!(attacher.attach(&desc), Ok(Attached::Already));
        assert_eq!(attacher.attached_count(), 1);
    }

    #[test]
    fn partial_attachment_is_tolerated() {
        let (regions, attacher) = setup();
        regions.create("shm_hand_rgb", 12);

        let report = attacher.attach_all();
        assert_eq!(report.attached, 1);
        assert_eq!(report.total, 2);
        assert!(!report.is_complete());
        assert_eq!(report.failures[0].0, "mobile_rgb");
        assert_eq!(report.failures[0].1.reason(), "not_found");

        assert!(attacher.is_attached("hand_rgb"));
        assert!(matches!(
            attacher.copy_out("mobile_rgb"),
            Err(AttachmentError::NotAttached { .. })
        ));
    }

    #[test]
    fn copy_out_is_a_snapshot() {
        let (regions, attacher) = setup();
        let region = regions.create("shm_mobile_rgb", 12);
        region.write(&[7; 12]);
        attacher.attach_all();

        let copy = attacher.copy_out("mobile_rgb").unwrap();
        region.write(&[1; 12]);

        assert_eq!(copy.as_ref(), &[7u8; 12]);
        assert_eq!(attacher.copy_out("mobile_rgb").unwrap().as_ref(), &[1u8; 12]);
    }

    #[test]
    fn size_mismatch_is_reported() {
        let (regions, attacher) = setup();
        regions.create("shm_mobile_rgb", 100);
        let report = attacher.attach_all();
        assert!(report
            .failures
            .iter()
            .any(|(id, e)| id == "mobile_rgb" && e.reason() == "size_mismatch"));
    }

    #[tokio::test(start_paused = true)]
    async fn retry_loop_attaches_late_regions() {
        let (regions, attacher) = setup();
        regions.create("shm_mobile_rgb", 12);

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(
            Arc::clone(&attacher).run_retry_loop(Duration::from_secs(1), cancel.clone()),
        );

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(attacher.attached_count(), 1);

        regions.create("shm_hand_rgb", 12);
        let report = handle.await.unwrap();
        assert!(report.is_complete());
        assert!(attacher.is_attached("hand_rgb"));
    }

    #[tokio::test(start_paused = true)]
    async fn retry_loop_stops_on_cancel() {
        let (_regions, attacher) = setup();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(
            Arc::clone(&attacher).run_retry_loop(Duration::from_secs(1), cancel.clone()),
        );

        tokio::time::sleep(Duration::from_secs(3)).await;
        cancel.cancel();
        let report = handle.await.unwrap();
        assert_eq!(report.attached, 0);
        assert_eq!(report.failures.len(), 2);
    }
}

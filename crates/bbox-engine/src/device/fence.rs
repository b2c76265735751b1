use std::sync::Arc;

use crate::hal::{Device, FenceId, HalError, QueueId};

use super::{CommandQueue, GpuError};

/// Monotonic CPU counter paired with a GPU-signaled fence.
///
/// `signal` hands out tickets; `flush` blocks until the GPU has passed the
/// latest one. The renderer flushes once per frame.
pub struct FrameFence {
    device: Arc<dyn Device>,
    queue: QueueId,
    fence: FenceId,
    current: u64,
}

impl FrameFence {
    pub fn new(device: &Arc<dyn Device>, queue: &CommandQueue) -> Result<Self, GpuError> {
        let fence = device.create_fence(0).map_err(GpuError::FenceCreation)?;
        Ok(Self {
            device: device.clone(),
            queue: queue.id(),
            fence,
            current: 0,
        })
    }

    /// Enqueues a signal for the next ticket and returns it.
    pub fn signal(&mut self) -> Result<u64, GpuError> {
        let ticket = self.current + 1;
        self.device.signal(self.queue, self.fence, ticket)?;
        self.current = ticket;
        Ok(ticket)
    }

    /// Blocks until all work submitted so far has completed.
    pub fn flush(&mut self) -> Result<(), GpuError> {
        let ticket = self.signal()?;
        self.wait(ticket)
    }

    /// Blocks until the fence reaches `ticket`.
    pub fn wait(&self, ticket: u64) -> Result<(), GpuError> {
        if self.device.fence_completed_value(self.fence) >= ticket {
            if let Some(reason) = self.device.removed_reason() {
                return Err(GpuError::DeviceRemoved(reason));
            }
            return Ok(());
        }
        self.device.wait_for_fence(self.fence, ticket).map_err(|e| match e {
            HalError::DeviceRemoved(reason) => GpuError::DeviceRemoved(reason),
            other => GpuError::Hal(other),
        })
    }

    /// Last ticket handed out.
    pub fn current_value(&self) -> u64 {
        self.current
    }

    /// Highest value the GPU has signaled.
    pub fn completed_value(&self) -> u64 {
        self.device.fence_completed_value(self.fence)
    }
}

impl Drop for FrameFence {
    fn drop(&mut self) {
        self.device.release_fence(self.fence);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::test_support::{reference_device, simulate_removal};

    #[test]
    fn flush_reaches_the_last_ticket() {
        let device = reference_device();
        let queue = CommandQueue::new(&device).unwrap();
        let mut fence = FrameFence::new(&device, &queue).unwrap();

        let first = fence.signal().unwrap();
        fence.flush().unwrap();
        assert!(fence.completed_value() >= first);
        assert!(fence.completed_value() >= fence.current_value());
        assert_eq!(fence.current_value(), 2);
    }

    #[test]
    fn flush_without_outstanding_work_is_a_no_op() {
        let device = reference_device();
        let queue = CommandQueue::new(&device).unwrap();
        let mut fence = FrameFence::new(&device, &queue).unwrap();

        fence.flush().unwrap();
        fence.flush().unwrap();
        assert_eq!(fence.completed_value(), fence.current_value());
    }

    #[test]
    fn flush_on_a_removed_device_reports_the_reason() {
        let device = reference_device();
        let queue = CommandQueue::new(&device).unwrap();
        let mut fence = FrameFence::new(&device, &queue).unwrap();
        fence.flush().unwrap();

        simulate_removal(&device, "driver reset");
        let err = fence.flush().unwrap_err();
        assert!(matches!(err, GpuError::DeviceRemoved(ref r) if r == "driver reset"));
    }
}

use std::cell::Cell;
use std::sync::Arc;

use crate::hal::{
    ClearValue, Device, HeapType, ResourceDesc, ResourceId, ResourceState, TransitionBarrier,
};

use super::GpuError;

/// CPU-side view of the state a resource will be in once recorded work runs.
#[derive(Debug)]
pub struct ResourceStateTracker {
    state: Cell<ResourceState>,
}

impl ResourceStateTracker {
    pub fn new(initial: ResourceState) -> Self {
        Self {
            state: Cell::new(initial),
        }
    }

    pub fn current(&self) -> ResourceState {
        self.state.get()
    }

    /// Barrier moving `resource` into `required`, or `None` if it is already there.
    /// The tracked state is updated either way.
    pub fn transition(&self, resource: ResourceId, required: ResourceState) -> Option<TransitionBarrier> {
        let before = self.state.replace(required);
        (before != required).then_some(TransitionBarrier {
            resource,
            before,
            after: required,
        })
    }

    pub fn require(&self, resource: ResourceId, required: ResourceState) -> Result<(), GpuError> {
        let actual = self.current();
        if actual == required {
            Ok(())
        } else {
            Err(GpuError::StateMismatch {
                resource,
                actual,
                required,
            })
        }
    }
}

/// Exclusively owned GPU resource. Released on drop.
pub struct Resource {
    device: Arc<dyn Device>,
    id: ResourceId,
    desc: ResourceDesc,
    heap: HeapType,
    tracker: ResourceStateTracker,
}

impl Resource {
    /// Creates a committed resource; `what` names it in errors.
    pub fn committed(
        device: &Arc<dyn Device>,
        heap: HeapType,
        desc: ResourceDesc,
        initial_state: ResourceState,
        clear_value: Option<ClearValue>,
        what: &'static str,
    ) -> Result<Self, GpuError> {
        let id = device
            .create_committed_resource(heap, &desc, initial_state, clear_value)
            .map_err(GpuError::resource(what))?;

        Ok(Self {
            device: device.clone(),
            id,
            desc,
            heap,
            tracker: ResourceStateTracker::new(initial_state),
        })
    }

    /// Wraps a swap-chain back buffer reference. Back buffers start in `Present`.
    pub(crate) fn back_buffer(device: &Arc<dyn Device>, id: ResourceId, desc: ResourceDesc) -> Self {
        Self {
            device: device.clone(),
            id,
            desc,
            heap: HeapType::Default,
            tracker: ResourceStateTracker::new(ResourceState::Present),
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn desc(&self) -> &ResourceDesc {
        &self.desc
    }

    pub fn heap(&self) -> HeapType {
        self.heap
    }

    pub fn device(&self) -> &Arc<dyn Device> {
        &self.device
    }

    pub fn state(&self) -> ResourceState {
        self.tracker.current()
    }

    pub fn transition_to(&self, required: ResourceState) -> Option<TransitionBarrier> {
        self.tracker.transition(self.id, required)
    }

    pub fn require(&self, required: ResourceState) -> Result<(), GpuError> {
        self.tracker.require(self.id, required)
    }
}

impl Drop for Resource {
    fn drop(&mut self) {
        self.device.release_resource(self.id);
    }
}

impl std::fmt::Debug for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("id", &self.id)
            .field("heap", &self.heap)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::test_support::reference_device;

    #[test]
    fn transition_to_current_state_records_nothing() {
        let tracker = ResourceStateTracker::new(ResourceState::DepthWrite);
        let id = ResourceId::from_raw(7);
        assert_eq!(tracker.transition(id, ResourceState::DepthWrite), None);

        let barrier = tracker.transition(id, ResourceState::Common).unwrap();
        assert_eq!(barrier.before, ResourceState::DepthWrite);
        assert_eq!(barrier.after, ResourceState::Common);
        assert_eq!(tracker.current(), ResourceState::Common);
    }

    #[test]
    fn require_reports_mismatch() {
        let tracker = ResourceStateTracker::new(ResourceState::Present);
        let err = tracker
            .require(ResourceId::from_raw(3), ResourceState::RenderTarget)
            .unwrap_err();
        assert!(matches!(
            err,
            GpuError::StateMismatch {
                actual: ResourceState::Present,
                required: ResourceState::RenderTarget,
                ..
            }
        ));
    }

    #[test]
    fn drop_releases_the_resource() {
        let device = reference_device();
        let res = Resource::committed(
            &device,
            HeapType::Default,
            ResourceDesc::buffer(64),
            ResourceState::CopyDest,
            None,
            "test buffer",
        )
        .unwrap();
        let id = res.id();
        assert!(device.read_resource(id, 0, 4).is_ok());

        drop(res);
        assert!(device.read_resource(id, 0, 4).is_err());
    }

    #[test]
    fn creation_failure_names_the_resource() {
        let device = reference_device();
        let err = Resource::committed(
            &device,
            HeapType::Default,
            ResourceDesc::buffer(0),
            ResourceState::Common,
            None,
            "empty buffer",
        )
        .unwrap_err();
        assert!(matches!(err, GpuError::ResourceCreation { what: "empty buffer", .. }));
    }
}

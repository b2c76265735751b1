//! GPU command submission and synchronization.
//!
//! This module is responsible for:
//! - adapter selection with software fallback and device ownership
//! - the fence, queue, allocator and command list of the single-queue model
//! - swap-chain rotation and size-dependent resources
//! - upload-heap staging and resource-state tracking
//! - the fixed pipeline and root signature
//!
//! Every GPU object is wrapped in an owning handle released on drop.
//! The renderer flushes once per frame; a ring of per-frame allocator/fence
//! pairs would slot in at `FrameFence` and `CommandSubmissionEngine`.

mod adapter;
mod descriptor;
mod error;
mod fence;
mod init;
mod manager;
mod pipeline;
mod resource;
mod submission;
mod swap_chain;
mod upload;

pub use adapter::AdapterSelector;
pub use descriptor::DescriptorHeap;
pub use error::GpuError;
pub use fence::FrameFence;
pub use init::{create_instance, BackendKind, GpuInit};
pub use manager::DeviceManager;
pub use pipeline::{PipelineState, PipelineStateBuilder, RootSignature};
pub use resource::{Resource, ResourceStateTracker};
pub use submission::{CommandAllocator, CommandList, CommandQueue, CommandSubmissionEngine};
pub use swap_chain::SwapChainManager;
pub use upload::{constant_buffer_stride, UploadBuffer, CONSTANT_BUFFER_ALIGNMENT};

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use crate::hal::reference::{ReferenceDevice, ReferenceInstance};
    use crate::hal::{Device, FeatureLevel, Instance, ResourceId, ResourceState};

    pub fn reference_device() -> Arc<dyn Device> {
        let instance = ReferenceInstance::new();
        let adapter = instance.software_adapter().unwrap();
        instance.create_device(&adapter, FeatureLevel::L12_0).unwrap()
    }

    pub fn reference(device: &Arc<dyn Device>) -> &ReferenceDevice {
        device.as_any().downcast_ref::<ReferenceDevice>().unwrap()
    }

    pub fn simulate_removal(device: &Arc<dyn Device>, reason: &str) {
        reference(device).simulate_removal(reason);
    }

    pub fn reference_state_of(device: &Arc<dyn Device>, id: ResourceId) -> Option<ResourceState> {
        reference(device).resource_state(id)
    }
}

use std::sync::Arc;

use crate::hal::{CpuDescriptor, DescriptorHeapDesc, DescriptorHeapType, Device, GpuDescriptor, HeapId};

use super::GpuError;

/// Fixed-capacity descriptor heap. Views live at `start + index * increment`.
pub struct DescriptorHeap {
    device: Arc<dyn Device>,
    id: HeapId,
    desc: DescriptorHeapDesc,
    increment: u32,
    cpu_start: CpuDescriptor,
    gpu_start: Option<GpuDescriptor>,
}

impl DescriptorHeap {
    pub fn new(
        device: &Arc<dyn Device>,
        ty: DescriptorHeapType,
        capacity: u32,
        shader_visible: bool,
    ) -> Result<Self, GpuError> {
        let desc = DescriptorHeapDesc {
            ty,
            capacity,
            shader_visible,
        };
        let id = device
            .create_descriptor_heap(&desc)
            .map_err(GpuError::resource("descriptor heap"))?;

        Ok(Self {
            device: device.clone(),
            id,
            desc,
            increment: device.descriptor_increment_size(ty),
            cpu_start: device.cpu_descriptor_start(id),
            gpu_start: device.gpu_descriptor_start(id),
        })
    }

    pub fn id(&self) -> HeapId {
        self.id
    }

    pub fn capacity(&self) -> u32 {
        self.desc.capacity
    }

    pub fn increment(&self) -> u32 {
        self.increment
    }

    fn check(&self, index: u32) -> Result<u64, GpuError> {
        if index >= self.desc.capacity {
            return Err(GpuError::IndexOutOfRange {
                what: "descriptor heap",
                index: index as usize,
                len: self.desc.capacity as usize,
            });
        }
        Ok(index as u64 * self.increment as u64)
    }

    pub fn cpu_handle(&self, index: u32) -> Result<CpuDescriptor, GpuError> {
        Ok(self.cpu_start.offset(self.check(index)?))
    }

    pub fn gpu_handle(&self, index: u32) -> Result<GpuDescriptor, GpuError> {
        let offset = self.check(index)?;
        let start = self
            .gpu_start
            .ok_or_else(|| GpuError::InvalidCall(format!("{:?} heap is not shader-visible", self.desc.ty)))?;
        Ok(start.offset(offset))
    }
}

impl Drop for DescriptorHeap {
    fn drop(&mut self) {
        self.device.release_descriptor_heap(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::test_support::reference_device;

    #[test]
    fn handles_step_by_the_increment() {
        let device = reference_device();
        let heap = DescriptorHeap::new(&device, DescriptorHeapType::Rtv, 2, false).unwrap();
        let first = heap.cpu_handle(0).unwrap();
        let second = heap.cpu_handle(1).unwrap();
        assert_eq!(second.0 - first.0, heap.increment() as u64);
    }

    #[test]
    fn capacity_is_enforced() {
        let device = reference_device();
        let heap = DescriptorHeap::new(&device, DescriptorHeapType::CbvSrvUav, 2, true).unwrap();
        assert!(heap.gpu_handle(1).is_ok());
        assert!(matches!(
            heap.cpu_handle(2),
            Err(GpuError::IndexOutOfRange { index: 2, len: 2, .. })
        ));
    }

    #[test]
    fn non_visible_heaps_have_no_gpu_handles() {
        let device = reference_device();
        let heap = DescriptorHeap::new(&device, DescriptorHeapType::Dsv, 1, false).unwrap();
        assert!(matches!(heap.gpu_handle(0), Err(GpuError::InvalidCall(_))));
    }
}

use std::marker::PhantomData;
use std::sync::Arc;

use bytemuck::Pod;

use crate::hal::{ConstantBufferViewDesc, Device, HeapType, ResourceDesc, ResourceState};

use super::{GpuError, Resource};

/// Constant buffers are addressed in 256-byte units.
pub const CONSTANT_BUFFER_ALIGNMENT: usize = 256;

/// Byte stride of a constant-buffer slot holding `size` bytes.
pub const fn constant_buffer_stride(size: usize) -> usize {
    (size + CONSTANT_BUFFER_ALIGNMENT - 1) & !(CONSTANT_BUFFER_ALIGNMENT - 1)
}

/// Persistently mapped upload-heap buffer of `count` fixed-stride `T` slots.
///
/// Mapped at construction and unmapped exactly once on drop. The CPU may only
/// write a slot the GPU is not reading, which the per-frame flush guarantees.
pub struct UploadBuffer<T: Pod> {
    resource: Resource,
    stride: usize,
    count: usize,
    _marker: PhantomData<T>,
}

impl<T: Pod> UploadBuffer<T> {
    pub fn new(device: &Arc<dyn Device>, count: usize, is_constant_buffer: bool) -> Result<Self, GpuError> {
        let stride = if is_constant_buffer {
            constant_buffer_stride(std::mem::size_of::<T>())
        } else {
            std::mem::size_of::<T>()
        };

        let resource = Resource::committed(
            device,
            HeapType::Upload,
            ResourceDesc::buffer((stride * count) as u64),
            ResourceState::GenericRead,
            None,
            "upload buffer",
        )?;
        device
            .map(resource.id())
            .map_err(GpuError::resource("upload buffer mapping"))?;

        Ok(Self {
            resource,
            stride,
            count,
            _marker: PhantomData,
        })
    }

    fn check(&self, index: usize, n: usize) -> Result<(), GpuError> {
        if index.checked_add(n).map_or(true, |end| end > self.count) {
            return Err(GpuError::IndexOutOfRange {
                what: "upload buffer",
                index: index.saturating_add(n.saturating_sub(1)),
                len: self.count,
            });
        }
        Ok(())
    }

    /// Copies `value` into slot `index`.
    pub fn write(&mut self, index: usize, value: &T) -> Result<(), GpuError> {
        self.check(index, 1)?;
        self.resource
            .device()
            .write_mapped(self.resource.id(), (index * self.stride) as u64, bytemuck::bytes_of(value))?;
        Ok(())
    }

    /// Copies `values` into consecutive slots starting at `index`.
    ///
    /// Only tightly packed buffers take a single copy; constant buffers fall
    /// back to one write per slot.
    pub fn write_all(&mut self, index: usize, values: &[T]) -> Result<(), GpuError> {
        self.check(index, values.len())?;
        if self.stride == std::mem::size_of::<T>() {
            self.resource.device().write_mapped(
                self.resource.id(),
                (index * self.stride) as u64,
                bytemuck::cast_slice(values),
            )?;
            return Ok(());
        }
        for (i, v) in values.iter().enumerate() {
            self.write(index + i, v)?;
        }
        Ok(())
    }

    /// Reads slot `index` back from GPU-visible memory.
    pub fn read(&self, index: usize) -> Result<T, GpuError> {
        self.check(index, 1)?;
        let bytes = self.resource.device().read_resource(
            self.resource.id(),
            (index * self.stride) as u64,
            std::mem::size_of::<T>(),
        )?;
        Ok(bytemuck::pod_read_unaligned(&bytes))
    }

    /// Constant-buffer view covering slot `index`.
    pub fn view(&self, index: usize) -> Result<ConstantBufferViewDesc, GpuError> {
        self.check(index, 1)?;
        Ok(ConstantBufferViewDesc {
            resource: self.resource.id(),
            offset: (index * self.stride) as u64,
            size: self.stride as u32,
        })
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn byte_size(&self) -> u64 {
        (self.stride * self.count) as u64
    }
}

impl<T: Pod> Drop for UploadBuffer<T> {
    fn drop(&mut self) {
        self.resource.device().unmap(self.resource.id());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::test_support::reference_device;

    #[repr(C)]
    #[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
    struct Sample {
        a: [f32; 3],
        b: u32,
    }

    #[test]
    fn stride_rounds_to_256() {
        assert_eq!(constant_buffer_stride(1), 256);
        assert_eq!(constant_buffer_stride(256), 256);
        assert_eq!(constant_buffer_stride(257), 512);
    }

    #[test]
    fn write_then_read_returns_the_same_bytes() {
        let device = reference_device();
        let mut buf = UploadBuffer::<Sample>::new(&device, 3, true).unwrap();
        let value = Sample {
            a: [1.0, -2.5, 3.25],
            b: 0xDEAD_BEEF,
        };
        buf.write(2, &value).unwrap();
        assert_eq!(buf.read(2).unwrap(), value);
        assert_eq!(buf.read(0).unwrap(), Sample { a: [0.0; 3], b: 0 });
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let device = reference_device();
        let mut buf = UploadBuffer::<Sample>::new(&device, 2, false).unwrap();
        assert_eq!(buf.stride(), std::mem::size_of::<Sample>());
        let err = buf.write(2, &Sample { a: [0.0; 3], b: 1 }).unwrap_err();
        assert!(matches!(err, GpuError::IndexOutOfRange { index: 2, len: 2, .. }));
    }

    #[test]
    fn bulk_write_fills_packed_slots() {
        let device = reference_device();
        let mut buf = UploadBuffer::<Sample>::new(&device, 4, false).unwrap();
        let values: Vec<Sample> = (0..4).map(|i| Sample { a: [i as f32; 3], b: i }).collect();
        buf.write_all(0, &values).unwrap();
        assert_eq!(buf.read(3).unwrap(), values[3]);
        assert!(buf.write_all(1, &values).is_err());
    }

    #[test]
    fn huge_index_is_rejected_without_overflow() {
        let device = reference_device();
        let mut buf = UploadBuffer::<[f32; 4]>::new(&device, 2, true).unwrap();
        let out_of_range = |r: Result<(), GpuError>| matches!(r, Err(GpuError::IndexOutOfRange { len: 2, .. }));
        assert!(out_of_range(buf.write(usize::MAX, &[0.0; 4])));
        assert!(out_of_range(buf.write_all(usize::MAX, &[[1.0; 4], [2.0; 4]])));
        assert!(out_of_range(buf.read(usize::MAX).map(|_| ())));
        assert!(out_of_range(buf.view(usize::MAX).map(|_| ())));
        assert!(out_of_range(buf.write_all(1, &[[0.0; 4]; 2])));
    }
}

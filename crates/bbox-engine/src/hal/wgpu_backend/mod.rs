//! Hardware backend on top of wgpu.
//!
//! The explicit model is emulated:
//! - command lists are translated into one encoder per submission
//! - clears fold into the load ops of the next render pass
//! - barriers are tracked by wgpu itself and are accepted as no-ops
//! - fences advance from `Queue::on_submitted_work_done`
//! - upload-heap buffers keep a CPU shadow flushed with `Queue::write_buffer`

mod convert;
mod device;
mod encode;

use std::sync::{Arc, Mutex};

pub use device::WgpuDevice;

use super::error::{HalError, HalResult};
use super::traits::{Device, Instance};
use super::types::{Adapter, AdapterInfo, FeatureLevel, GpuPreference};

/// Instance for the wgpu backend.
pub struct WgpuInstance {
    instance: wgpu::Instance,
    /// Every adapter handed out so far; `Adapter::ordinal` indexes this.
    adapters: Mutex<Vec<wgpu::Adapter>>,
}

impl WgpuInstance {
    pub fn new() -> Self {
        // Use all backends to allow wgpu to select the optimal platform backend.
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        Self {
            instance,
            adapters: Mutex::new(Vec::new()),
        }
    }

    fn request(&self, power: wgpu::PowerPreference, force_fallback: bool) -> Option<wgpu::Adapter> {
        pollster::block_on(self.instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: power,
            compatible_surface: None,
            force_fallback_adapter: force_fallback,
        }))
        .ok()
    }

    fn register(&self, adapter: wgpu::Adapter) -> HalResult<Adapter> {
        let info = describe(&adapter);
        let mut known = self
            .adapters
            .lock()
            .map_err(|_| HalError::Backend("adapter registry poisoned".into()))?;

        let ordinal = match known.iter().position(|a| same_adapter(&a.get_info(), &adapter.get_info())) {
            Some(i) => i,
            None => {
                known.push(adapter);
                known.len() - 1
            }
        };

        Ok(Adapter { ordinal, info })
    }
}

impl Default for WgpuInstance {
    fn default() -> Self {
        Self::new()
    }
}

fn same_adapter(a: &wgpu::AdapterInfo, b: &wgpu::AdapterInfo) -> bool {
    a.name == b.name && a.vendor == b.vendor && a.device == b.device && a.backend == b.backend
}

fn describe(adapter: &wgpu::Adapter) -> AdapterInfo {
    let info = adapter.get_info();
    let max_feature_level = if adapter.get_downlevel_capabilities().is_webgpu_compliant() {
        FeatureLevel::L12_0
    } else {
        FeatureLevel::L11_0
    };

    AdapterInfo {
        name: format!("{} ({:?})", info.name, info.backend),
        vendor_id: info.vendor,
        device_id: info.device,
        // wgpu does not report memory sizes; rank discrete parts first instead.
        dedicated_video_memory: match info.device_type {
            wgpu::DeviceType::DiscreteGpu => 2,
            wgpu::DeviceType::IntegratedGpu | wgpu::DeviceType::VirtualGpu => 1,
            _ => 0,
        },
        software: info.device_type == wgpu::DeviceType::Cpu,
        max_feature_level,
    }
}

impl Instance for WgpuInstance {
    fn backend_name(&self) -> &'static str {
        "wgpu"
    }

    fn enumerate_adapters(&self, preference: GpuPreference) -> Option<Vec<Adapter>> {
        let mut raw = Vec::new();
        if preference == GpuPreference::HighPerformance {
            raw.extend(self.request(wgpu::PowerPreference::HighPerformance, false));
        }
        raw.extend(pollster::block_on(self.instance.enumerate_adapters(wgpu::Backends::all())));

        let mut out: Vec<Adapter> = Vec::new();
        for adapter in raw {
            match self.register(adapter) {
                Ok(a) if !out.iter().any(|o| o.ordinal == a.ordinal) => out.push(a),
                Ok(_) => {}
                Err(e) => log::warn!("adapter registration failed: {e}"),
            }
        }
        Some(out)
    }

    fn software_adapter(&self) -> HalResult<Adapter> {
        let adapter = self
            .request(wgpu::PowerPreference::None, true)
            .ok_or_else(|| HalError::NotFound("no fallback (software) adapter is available".into()))?;
        self.register(adapter)
    }

    fn create_device(&self, adapter: &Adapter, min_level: FeatureLevel) -> HalResult<Arc<dyn Device>> {
        if min_level > adapter.info.max_feature_level {
            return Err(HalError::Unsupported(format!(
                "{} supports feature level {} but {} was requested",
                adapter.info.name, adapter.info.max_feature_level, min_level
            )));
        }

        let raw = self
            .adapters
            .lock()
            .map_err(|_| HalError::Backend("adapter registry poisoned".into()))?
            .get(adapter.ordinal)
            .cloned()
            .ok_or_else(|| HalError::NotFound(format!("adapter ordinal {}", adapter.ordinal)))?;

        let required_limits = if min_level >= FeatureLevel::L12_0 {
            wgpu::Limits::default()
        } else {
            wgpu::Limits::downlevel_defaults()
        };

        let (device, queue) = pollster::block_on(raw.request_device(&wgpu::DeviceDescriptor {
            label: Some("bbox device"),
            required_features: wgpu::Features::empty(),
            required_limits,
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        }))
        .map_err(|e| HalError::Backend(format!("{}: {e}", adapter.info.name)))?;

        let device = WgpuDevice::new(
            self.instance.clone(),
            raw,
            device,
            queue,
            adapter.info.clone(),
            min_level,
        );
        Ok(Arc::new(device))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Holds on machines without any adapter too: every list is then empty.
    #[test]
    fn plain_enumeration_lists_every_adapter_once() {
        let inst = WgpuInstance::new();
        let raw = pollster::block_on(inst.instance.enumerate_adapters(wgpu::Backends::all()));
        let mut distinct: Vec<wgpu::AdapterInfo> = Vec::new();
        for adapter in &raw {
            let info = adapter.get_info();
            if !distinct.iter().any(|d| same_adapter(d, &info)) {
                distinct.push(info);
            }
        }

        let plain = inst.enumerate_adapters(GpuPreference::Unspecified).unwrap();
        assert_eq!(plain.len(), distinct.len());

        let preferred = inst.enumerate_adapters(GpuPreference::HighPerformance).unwrap();
        for a in &plain {
            assert!(preferred.iter().any(|p| p.ordinal == a.ordinal), "{} missing", a.name());
        }
    }

    #[test]
    fn fence_wait_blocks_until_signaled_and_rejects_unsignaled_values() {
        let inst = WgpuInstance::new();
        let Some(adapter) = inst
            .enumerate_adapters(GpuPreference::Unspecified)
            .and_then(|list| list.into_iter().next())
            .or_else(|| inst.software_adapter().ok())
        else {
            return;
        };
        let Ok(device) = inst.create_device(&adapter, FeatureLevel::L11_0) else {
            return;
        };

        let queue = device.create_command_queue().unwrap();
        let fence = device.create_fence(0).unwrap();
        for value in 1..=3 {
            device.signal(queue, fence, value).unwrap();
            device.wait_for_fence(fence, value).unwrap();
            assert!(device.fence_completed_value(fence) >= value);
        }
        assert!(device.wait_for_fence(fence, 10).is_err());
    }
}

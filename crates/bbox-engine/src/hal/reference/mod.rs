//! In-process reference backend.
//!
//! Models the explicit API without a GPU:
//! - a dedicated queue thread drains submitted work in FIFO order
//! - fences advance only when the queue thread reaches the signal
//! - every resource has real byte storage; clears and copies write it
//! - the command stream is validated like a debug layer, and the first
//!   violation removes the device
//!
//! The instance exposes one software adapter and, optionally, a scripted list
//! of hardware adapters so adapter selection can be exercised headless.

mod device;
mod executor;
mod state;

use std::sync::Arc;

pub use device::ReferenceDevice;
pub use state::{DrawRecord, ReferenceStats};

use super::error::{HalError, HalResult};
use super::traits::{Device, Instance};
use super::types::{Adapter, AdapterInfo, FeatureLevel, GpuPreference};

/// Description of a fake adapter reported by [`ReferenceInstance`].
#[derive(Debug, Clone)]
pub struct ScriptedAdapter {
    pub info: AdapterInfo,
    /// Device creation on this adapter fails even at supported levels.
    pub fail_device_creation: bool,
    pub outputs: Vec<String>,
}

impl ScriptedAdapter {
    pub fn hardware(name: &str, max_feature_level: FeatureLevel, dedicated_video_memory: u64) -> Self {
        Self {
            info: AdapterInfo {
                name: name.to_string(),
                vendor_id: 0x1234,
                device_id: 0,
                dedicated_video_memory,
                software: false,
                max_feature_level,
            },
            fail_device_creation: false,
            outputs: Vec::new(),
        }
    }

    pub fn failing(mut self) -> Self {
        self.fail_device_creation = true;
        self
    }

    pub fn with_output(mut self, name: &str) -> Self {
        self.outputs.push(name.to_string());
        self
    }
}

/// Instance for the reference backend.
#[derive(Debug, Clone)]
pub struct ReferenceInstance {
    adapters: Vec<ScriptedAdapter>,
    preference_ordering: bool,
}

pub const SOFTWARE_ADAPTER_NAME: &str = "Reference Software Rasterizer";

impl ReferenceInstance {
    /// Only the software adapter.
    pub fn new() -> Self {
        Self::with_adapters(Vec::new())
    }

    pub fn with_adapters(adapters: Vec<ScriptedAdapter>) -> Self {
        Self {
            adapters,
            preference_ordering: true,
        }
    }

    /// Makes `enumerate_adapters(HighPerformance)` report "unsupported".
    pub fn without_preference_ordering(mut self) -> Self {
        self.preference_ordering = false;
        self
    }

    fn software_info() -> AdapterInfo {
        AdapterInfo {
            name: SOFTWARE_ADAPTER_NAME.to_string(),
            vendor_id: 0x1414,
            device_id: 0x8c,
            dedicated_video_memory: 0,
            software: true,
            max_feature_level: FeatureLevel::L12_1,
        }
    }

    fn software_ordinal(&self) -> usize {
        self.adapters.len()
    }

    fn scripted(&self, ordinal: usize) -> Adapter {
        Adapter {
            ordinal,
            info: self.adapters[ordinal].info.clone(),
        }
    }
}

impl Default for ReferenceInstance {
    fn default() -> Self {
        Self::new()
    }
}

impl Instance for ReferenceInstance {
    fn backend_name(&self) -> &'static str {
        "reference"
    }

    fn enumerate_adapters(&self, preference: GpuPreference) -> Option<Vec<Adapter>> {
        let mut ordinals: Vec<usize> = (0..self.adapters.len()).collect();

        match preference {
            GpuPreference::HighPerformance => {
                if !self.preference_ordering {
                    return None;
                }
                // Stable: equal memory keeps enumeration order.
                ordinals.sort_by(|a, b| {
                    let ma = self.adapters[*a].info.dedicated_video_memory;
                    let mb = self.adapters[*b].info.dedicated_video_memory;
                    mb.cmp(&ma)
                });
            }
            GpuPreference::Unspecified => {}
        }

        let mut out: Vec<Adapter> = ordinals.into_iter().map(|i| self.scripted(i)).collect();
        // The software adapter is always reported last.
        out.push(Adapter {
            ordinal: self.software_ordinal(),
            info: Self::software_info(),
        });
        Some(out)
    }

    fn software_adapter(&self) -> HalResult<Adapter> {
        Ok(Adapter {
            ordinal: self.software_ordinal(),
            info: Self::software_info(),
        })
    }

    fn create_device(&self, adapter: &Adapter, min_level: FeatureLevel) -> HalResult<Arc<dyn Device>> {
        let (info, fail) = if adapter.ordinal == self.software_ordinal() {
            (Self::software_info(), false)
        } else {
            let scripted = self
                .adapters
                .get(adapter.ordinal)
                .ok_or_else(|| HalError::NotFound(format!("adapter ordinal {}", adapter.ordinal)))?;
            (scripted.info.clone(), scripted.fail_device_creation)
        };

        if min_level > info.max_feature_level {
            return Err(HalError::Unsupported(format!(
                "{} supports feature level {} but {} was requested",
                info.name, info.max_feature_level, min_level
            )));
        }

        if fail {
            return Err(HalError::Backend(format!("{}: device creation failed", info.name)));
        }

        let device = ReferenceDevice::new(info, min_level)?;
        Ok(Arc::new(device))
    }

    fn adapter_outputs(&self, adapter: &Adapter) -> Vec<String> {
        self.adapters
            .get(adapter.ordinal)
            .map(|a| a.outputs.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[Adapter]) -> Vec<&str> {
        list.iter().map(|a| a.name()).collect()
    }

    #[test]
    fn high_performance_orders_by_dedicated_memory() {
        let inst = ReferenceInstance::with_adapters(vec![
            ScriptedAdapter::hardware("igpu", FeatureLevel::L12_0, 128),
            ScriptedAdapter::hardware("dgpu", FeatureLevel::L12_1, 8192),
        ]);

        let hp = inst.enumerate_adapters(GpuPreference::HighPerformance).unwrap();
        assert_eq!(names(&hp), vec!["dgpu", "igpu", SOFTWARE_ADAPTER_NAME]);

        let plain = inst.enumerate_adapters(GpuPreference::Unspecified).unwrap();
        assert_eq!(names(&plain), vec!["igpu", "dgpu", SOFTWARE_ADAPTER_NAME]);
    }

    #[test]
    fn preference_ordering_can_be_unsupported() {
        let inst = ReferenceInstance::new().without_preference_ordering();
        assert!(inst.enumerate_adapters(GpuPreference::HighPerformance).is_none());
        assert!(inst.enumerate_adapters(GpuPreference::Unspecified).is_some());
    }

    #[test]
    fn device_creation_respects_feature_level_and_failure_script() {
        let inst = ReferenceInstance::with_adapters(vec![
            ScriptedAdapter::hardware("old", FeatureLevel::L11_0, 512),
            ScriptedAdapter::hardware("broken", FeatureLevel::L12_0, 512).failing(),
        ]);
        let list = inst.enumerate_adapters(GpuPreference::Unspecified).unwrap();

        let err = inst.create_device(&list[0], FeatureLevel::L12_0).err().unwrap();
        assert!(matches!(err, HalError::Unsupported(_)));

        let err = inst.create_device(&list[1], FeatureLevel::L12_0).err().unwrap();
        assert!(matches!(err, HalError::Backend(_)));

        let sw = inst.software_adapter().unwrap();
        let device = inst.create_device(&sw, FeatureLevel::L12_0).unwrap();
        assert!(device.adapter_info().software);
    }
}

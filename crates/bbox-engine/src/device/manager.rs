use std::sync::Arc;

use crate::hal::{Adapter, DescriptorHeapType, Device, FeatureLevel, Instance};

use super::{AdapterSelector, GpuError, GpuInit};

/// Owns the logical device and its cached descriptor increments.
pub struct DeviceManager {
    device: Arc<dyn Device>,
    adapter: Adapter,
    rtv_increment: u32,
    dsv_increment: u32,
    cbv_srv_uav_increment: u32,
}

impl DeviceManager {
    /// Selects an adapter and creates the device.
    ///
    /// With no compatible hardware the software adapter is used directly.
    pub fn initialize(instance: &dyn Instance, init: &GpuInit) -> Result<Self, GpuError> {
        let selector = AdapterSelector::new(instance, init.min_feature_level, init.preference);
        selector.log_adapters();

        let adapter = match selector.select_adapter() {
            Ok(adapter) => adapter,
            Err(GpuError::NoCompatibleAdapter(level)) => {
                log::warn!("no hardware adapter supports feature level {level}; using the software adapter");
                instance
                    .software_adapter()
                    .map_err(|e| GpuError::DeviceCreation(format!("software adapter unavailable: {e}")))?
            }
            Err(e) => return Err(e),
        };

        Self::create_device(instance, adapter, init.min_feature_level)
    }

    /// Creates the device on `adapter`, falling back once to the software adapter.
    pub fn create_device(instance: &dyn Instance, adapter: Adapter, min_level: FeatureLevel) -> Result<Self, GpuError> {
        let (device, adapter) = match instance.create_device(&adapter, min_level) {
            Ok(device) => (device, adapter),
            Err(first) => {
                log::warn!("device creation on {} failed ({first}); retrying on the software adapter", adapter.name());
                let software = instance
                    .software_adapter()
                    .map_err(|e| GpuError::DeviceCreation(format!("{first}; software adapter unavailable: {e}")))?;
                let device = instance
                    .create_device(&software, min_level)
                    .map_err(|e| GpuError::DeviceCreation(format!("{first}; software fallback: {e}")))?;
                (device, software)
            }
        };

        log::debug!("device created on {} at feature level {}", adapter.name(), device.feature_level());

        Ok(Self {
            rtv_increment: device.descriptor_increment_size(DescriptorHeapType::Rtv),
            dsv_increment: device.descriptor_increment_size(DescriptorHeapType::Dsv),
            cbv_srv_uav_increment: device.descriptor_increment_size(DescriptorHeapType::CbvSrvUav),
            device,
            adapter,
        })
    }

    pub fn device(&self) -> &Arc<dyn Device> {
        &self.device
    }

    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    pub fn rtv_increment(&self) -> u32 {
        self.rtv_increment
    }

    pub fn dsv_increment(&self) -> u32 {
        self.dsv_increment
    }

    pub fn cbv_srv_uav_increment(&self) -> u32 {
        self.cbv_srv_uav_increment
    }

    /// Fails with `DeviceRemoved` once the backend reports the device lost.
    pub fn check_removed(&self) -> Result<(), GpuError> {
        match self.device.removed_reason() {
            Some(reason) => Err(GpuError::DeviceRemoved(reason)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::reference::{ReferenceInstance, ScriptedAdapter, SOFTWARE_ADAPTER_NAME};
    use crate::hal::GpuPreference;

    #[test]
    fn initialize_uses_software_adapter_without_hardware() {
        let instance = ReferenceInstance::new();
        let manager = DeviceManager::initialize(&instance, &GpuInit::default()).unwrap();
        assert!(manager.adapter().is_software());
        assert_eq!(manager.adapter().name(), SOFTWARE_ADAPTER_NAME);
    }

    #[test]
    fn create_device_falls_back_once() {
        let instance = ReferenceInstance::with_adapters(vec![ScriptedAdapter::hardware(
            "flaky",
            FeatureLevel::L12_0,
            1024,
        )
        .failing()]);
        let flaky = instance.enumerate_adapters(GpuPreference::Unspecified).unwrap()[0].clone();

        let manager = DeviceManager::create_device(&instance, flaky, FeatureLevel::L12_0).unwrap();
        assert!(manager.adapter().is_software());
    }

    #[test]
    fn increments_are_cached_from_the_device() {
        let instance = ReferenceInstance::new();
        let manager = DeviceManager::initialize(&instance, &GpuInit::default()).unwrap();
        let device = manager.device();
        assert_eq!(manager.rtv_increment(), device.descriptor_increment_size(DescriptorHeapType::Rtv));
        assert_eq!(manager.dsv_increment(), device.descriptor_increment_size(DescriptorHeapType::Dsv));
        assert_eq!(
            manager.cbv_srv_uav_increment(),
            device.descriptor_increment_size(DescriptorHeapType::CbvSrvUav)
        );
        assert!(manager.check_removed().is_ok());
    }
}

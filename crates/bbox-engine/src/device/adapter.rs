use crate::hal::{Adapter, FeatureLevel, GpuPreference, Instance};

use super::GpuError;

/// Picks the first hardware adapter that can host a device at the minimum
/// feature level.
pub struct AdapterSelector<'a> {
    instance: &'a dyn Instance,
    min_feature_level: FeatureLevel,
    preference: GpuPreference,
}

impl<'a> AdapterSelector<'a> {
    pub fn new(instance: &'a dyn Instance, min_feature_level: FeatureLevel, preference: GpuPreference) -> Self {
        Self {
            instance,
            min_feature_level,
            preference,
        }
    }

    /// One line per adapter the instance reports, each followed by the
    /// display outputs attached to it.
    pub fn adapter_report(&self) -> Vec<String> {
        let Some(adapters) = self.instance.enumerate_adapters(GpuPreference::Unspecified) else {
            return Vec::new();
        };
        let mut lines = Vec::new();
        for adapter in &adapters {
            let marker = if adapter.is_software() { " (software)" } else { "" };
            lines.push(format!("adapter: {}{marker}", adapter.name()));
            for output in self.instance.adapter_outputs(adapter) {
                lines.push(format!("  output: {output}"));
            }
        }
        lines
    }

    pub fn log_adapters(&self) {
        let report = self.adapter_report();
        log::debug!("{} backend adapters:", self.instance.backend_name());
        for line in &report {
            log::debug!("  {line}");
        }
    }

    /// Candidate order: the preferred ordering when the backend supports it,
    /// then plain enumeration order for anything not yet seen.
    fn candidates(&self) -> Vec<Adapter> {
        let mut out: Vec<Adapter> = Vec::new();

        if self.preference != GpuPreference::Unspecified {
            match self.instance.enumerate_adapters(self.preference) {
                Some(list) => merge_new(&mut out, list),
                None => log::debug!("{:?} adapter ordering unsupported; using enumeration order", self.preference),
            }
        }
        if let Some(list) = self.instance.enumerate_adapters(GpuPreference::Unspecified) {
            merge_new(&mut out, list);
        }
        out
    }

    pub fn select_adapter(&self) -> Result<Adapter, GpuError> {
        for adapter in self.candidates() {
            if adapter.is_software() {
                log::debug!("skipping adapter {}: software rasterizer", adapter.name());
                continue;
            }

            // Probe device; dropped immediately.
            match self.instance.create_device(&adapter, self.min_feature_level) {
                Ok(_) => {
                    log::debug!("selected adapter {}", adapter.name());
                    return Ok(adapter);
                }
                Err(e) => log::debug!("rejecting adapter {}: {e}", adapter.name()),
            }
        }

        Err(GpuError::NoCompatibleAdapter(self.min_feature_level))
    }
}

fn merge_new(out: &mut Vec<Adapter>, list: Vec<Adapter>) {
    for a in list {
        if !out.iter().any(|o| o.ordinal == a.ordinal) {
            out.push(a);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::reference::{ReferenceInstance, ScriptedAdapter, SOFTWARE_ADAPTER_NAME};

    fn select(instance: &ReferenceInstance) -> Result<Adapter, GpuError> {
        AdapterSelector::new(instance, FeatureLevel::L12_0, GpuPreference::HighPerformance).select_adapter()
    }

    #[test]
    fn prefers_high_performance_ordering() {
        let instance = ReferenceInstance::with_adapters(vec![
            ScriptedAdapter::hardware("integrated", FeatureLevel::L12_0, 256),
            ScriptedAdapter::hardware("discrete", FeatureLevel::L12_1, 8192),
        ]);
        assert_eq!(select(&instance).unwrap().name(), "discrete");
    }

    #[test]
    fn falls_back_to_enumeration_order_without_preference_support() {
        let instance = ReferenceInstance::with_adapters(vec![
            ScriptedAdapter::hardware("integrated", FeatureLevel::L12_0, 256),
            ScriptedAdapter::hardware("discrete", FeatureLevel::L12_1, 8192),
        ])
        .without_preference_ordering();
        assert_eq!(select(&instance).unwrap().name(), "integrated");
    }

    #[test]
    fn rejects_low_feature_level_and_broken_adapters() {
        let instance = ReferenceInstance::with_adapters(vec![
            ScriptedAdapter::hardware("dx11 part", FeatureLevel::L11_1, 8192),
            ScriptedAdapter::hardware("broken", FeatureLevel::L12_0, 4096).failing(),
            ScriptedAdapter::hardware("good", FeatureLevel::L12_0, 1024),
        ]);
        assert_eq!(select(&instance).unwrap().name(), "good");
    }

    #[test]
    fn report_lists_adapters_with_their_outputs() {
        let instance = ReferenceInstance::with_adapters(vec![
            ScriptedAdapter::hardware("discrete", FeatureLevel::L12_1, 8192)
                .with_output("DISPLAY1")
                .with_output("DISPLAY2"),
            ScriptedAdapter::hardware("headless", FeatureLevel::L12_0, 1024),
        ]);
        let report = AdapterSelector::new(&instance, FeatureLevel::L12_0, GpuPreference::HighPerformance).adapter_report();
        assert_eq!(
            report,
            vec![
                "adapter: discrete".to_string(),
                "  output: DISPLAY1".to_string(),
                "  output: DISPLAY2".to_string(),
                "adapter: headless".to_string(),
                format!("adapter: {SOFTWARE_ADAPTER_NAME} (software)"),
            ]
        );
    }

    #[test]
    fn software_adapter_alone_is_not_compatible() {
        let instance = ReferenceInstance::new();
        assert!(matches!(
            select(&instance),
            Err(GpuError::NoCompatibleAdapter(FeatureLevel::L12_0))
        ));
    }
}

use crate::hal::{FeatureLevel, HalError, ResourceId, ResourceState};
use crate::mesh::MeshError;
use crate::shader::ShaderError;

/// Failures of the submission engine and the frame orchestrator.
///
/// Everything except `IndexOutOfRange` and `StateMismatch` is fatal for the
/// viewer; those two indicate a caller bug and are reported the same way.
#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    #[error("no hardware adapter supports feature level {0}")]
    NoCompatibleAdapter(FeatureLevel),

    #[error("device creation failed: {0}")]
    DeviceCreation(String),

    #[error("fence creation failed: {0}")]
    FenceCreation(#[source] HalError),

    #[error("failed to create {what}: {source}")]
    ResourceCreation {
        what: &'static str,
        #[source]
        source: HalError,
    },

    #[error("pipeline creation failed: {0}")]
    PipelineCreation(#[source] HalError),

    #[error("index {index} is out of range for {what} with {len} slots")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("{resource} is tracked in {actual:?} but {required:?} is required")]
    StateMismatch {
        resource: ResourceId,
        actual: ResourceState,
        required: ResourceState,
    },

    #[error("command allocator reset before fence value {pending} completed (completed: {completed})")]
    AllocatorInFlight { pending: u64, completed: u64 },

    #[error("invalid call: {0}")]
    InvalidCall(String),

    #[error("device removed: {0}")]
    DeviceRemoved(String),

    #[error(transparent)]
    Hal(HalError),

    #[error(transparent)]
    Shader(#[from] ShaderError),

    #[error(transparent)]
    Mesh(#[from] MeshError),
}

impl From<HalError> for GpuError {
    fn from(err: HalError) -> Self {
        match err {
            HalError::DeviceRemoved(reason) => GpuError::DeviceRemoved(reason),
            other => GpuError::Hal(other),
        }
    }
}

impl GpuError {
    pub(crate) fn resource(what: &'static str) -> impl FnOnce(HalError) -> GpuError {
        move |source| match source {
            HalError::DeviceRemoved(reason) => GpuError::DeviceRemoved(reason),
            source => GpuError::ResourceCreation { what, source },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removal_is_lifted_out_of_hal_errors() {
        let err: GpuError = HalError::DeviceRemoved("hung".into()).into();
        assert!(matches!(err, GpuError::DeviceRemoved(r) if r == "hung"));

        let err = GpuError::resource("depth buffer")(HalError::OutOfMemory);
        assert_eq!(err.to_string(), "failed to create depth buffer: out of memory");
    }
}

//! Shader compilation collaborator.
//!
//! Turns a source file, an entry point and a target profile (`vs_*` / `ps_*`)
//! into the opaque `ShaderBytecode` pipeline creation consumes.

mod wgsl;

use std::path::{Path, PathBuf};

use crate::hal::{ShaderBytecode, ShaderStage};

pub use wgsl::WgslCompiler;

#[derive(Debug, thiserror::Error)]
pub enum ShaderError {
    #[error("failed to read shader {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unknown shader profile {0:?} (expected vs_* or ps_*)")]
    Profile(String),

    #[error("failed to parse {path}:\n{message}")]
    Parse { path: PathBuf, message: String },

    #[error("shader {path} failed validation:\n{message}")]
    Validation { path: PathBuf, message: String },

    #[error("{path} has no {stage:?} entry point named {entry_point:?}")]
    MissingEntryPoint {
        path: PathBuf,
        entry_point: String,
        stage: ShaderStage,
    },
}

/// Stage targeted by a profile string such as `vs_5_1`.
pub fn stage_for_profile(profile: &str) -> Result<ShaderStage, ShaderError> {
    match profile.get(..3) {
        Some("vs_") => Ok(ShaderStage::Vertex),
        Some("ps_") => Ok(ShaderStage::Pixel),
        _ => Err(ShaderError::Profile(profile.to_string())),
    }
}

pub trait ShaderCompiler {
    fn compile(&self, path: &Path, entry_point: &str, profile: &str) -> Result<ShaderBytecode, ShaderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiles_map_to_stages() {
        assert_eq!(stage_for_profile("vs_5_1").unwrap(), ShaderStage::Vertex);
        assert_eq!(stage_for_profile("ps_5_0").unwrap(), ShaderStage::Pixel);
        assert!(matches!(stage_for_profile("cs_5_0"), Err(ShaderError::Profile(_))));
        assert!(stage_for_profile("v").is_err());
    }
}

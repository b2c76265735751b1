use std::path::Path;
use std::sync::Arc;

use naga::valid::{Capabilities, ValidationFlags, Validator};

use super::{stage_for_profile, ShaderCompiler, ShaderError};
use crate::hal::{ShaderBytecode, ShaderStage};

/// WGSL front end on naga. The bytecode carries the validated source text.
#[derive(Debug, Default, Clone, Copy)]
pub struct WgslCompiler;

impl WgslCompiler {
    pub fn new() -> Self {
        Self
    }

    /// Compiles in-memory `source`; `path` is only used in diagnostics.
    pub fn compile_source(
        &self,
        path: &Path,
        source: &str,
        entry_point: &str,
        profile: &str,
    ) -> Result<ShaderBytecode, ShaderError> {
        let stage = stage_for_profile(profile)?;

        let module = naga::front::wgsl::parse_str(source).map_err(|e| ShaderError::Parse {
            path: path.to_path_buf(),
            message: e.emit_to_string(source),
        })?;

        let strict = Validator::new(ValidationFlags::all(), Capabilities::empty()).validate(&module);
        if let Err(strict_err) = strict {
            // Passing with every capability means the source only relies on
            // optional features; report that as a warning.
            match Validator::new(ValidationFlags::all(), Capabilities::all()).validate(&module) {
                Ok(_) => log::warn!(
                    "shader {} uses optional capabilities:\n{}",
                    path.display(),
                    strict_err.emit_to_string(source)
                ),
                Err(e) => {
                    return Err(ShaderError::Validation {
                        path: path.to_path_buf(),
                        message: e.emit_to_string(source),
                    })
                }
            }
        }

        let found = module.entry_points.iter().any(|ep| {
            ep.name == entry_point
                && matches!(
                    (ep.stage, stage),
                    (naga::ShaderStage::Vertex, ShaderStage::Vertex)
                        | (naga::ShaderStage::Fragment, ShaderStage::Pixel)
                )
        });
        if !found {
            return Err(ShaderError::MissingEntryPoint {
                path: path.to_path_buf(),
                entry_point: entry_point.to_string(),
                stage,
            });
        }

        log::debug!("compiled {} ({entry_point}, {profile})", path.display());

        Ok(ShaderBytecode {
            stage,
            entry_point: entry_point.to_string(),
            bytes: Arc::from(source.as_bytes()),
        })
    }
}

impl ShaderCompiler for WgslCompiler {
    fn compile(&self, path: &Path, entry_point: &str, profile: &str) -> Result<ShaderBytecode, ShaderError> {
        let source = std::fs::read_to_string(path).map_err(|source| ShaderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.compile_source(path, &source, entry_point, profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PHONG: &str = include_str!("../../shaders/phong.wgsl");

    #[test]
    fn phong_shader_compiles_for_both_stages() {
        let c = WgslCompiler::new();
        let path = Path::new("phong.wgsl");
        let vs = c.compile_source(path, PHONG, "vs_main", "vs_5_1").unwrap();
        let ps = c.compile_source(path, PHONG, "ps_main", "ps_5_1").unwrap();
        assert_eq!(vs.stage, ShaderStage::Vertex);
        assert_eq!(ps.stage, ShaderStage::Pixel);
        assert!(!vs.bytes.is_empty());
    }

    #[test]
    fn wrong_stage_entry_point_is_missing() {
        let c = WgslCompiler::new();
        let err = c
            .compile_source(Path::new("phong.wgsl"), PHONG, "vs_main", "ps_5_1")
            .unwrap_err();
        assert!(matches!(err, ShaderError::MissingEntryPoint { .. }));
    }

    #[test]
    fn syntax_errors_carry_compiler_text() {
        let c = WgslCompiler::new();
        let err = c
            .compile_source(Path::new("bad.wgsl"), "fn broken( {", "vs_main", "vs_5_1")
            .unwrap_err();
        match err {
            ShaderError::Parse { message, .. } => assert!(!message.is_empty()),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = WgslCompiler::new()
            .compile(Path::new("/definitely/not/here.wgsl"), "vs_main", "vs_5_1")
            .unwrap_err();
        assert!(matches!(err, ShaderError::Io { .. }));
    }
}

//! Mesh import collaborator.
//!
//! Importers produce a flat triangle list; `Bounds` derives the center and the
//! scale that fits the model into a roughly two-unit cube in front of the camera.

mod bounds;
mod obj;

use std::path::{Path, PathBuf};

use crate::scene::Vertex;

pub use bounds::Bounds;
pub use obj::ObjImporter;

#[derive(Debug, thiserror::Error)]
pub enum MeshError {
    #[error("failed to load mesh {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: tobj::LoadError,
    },

    #[error("mesh {path} produced no triangles")]
    Empty { path: PathBuf },
}

pub trait MeshImporter {
    /// Loads `path` as a non-indexed triangle list.
    fn load(&self, path: &Path) -> Result<Vec<Vertex>, MeshError>;
}

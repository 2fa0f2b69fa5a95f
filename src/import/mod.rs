//! Scene import: the node/mesh/material graph a model file is parsed into.
//!
//! Importers hand back an [`ImportedScene`] that mirrors the structure of the
//! source file. [`crate::Model`] flattens it into GPU-ready meshes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use glam::{Vec2, Vec3};
use thiserror::Error;

pub mod obj;

pub use obj::ObjImporter;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("unable to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}:{line}: {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },
    #[error("unsupported model format: {0}")]
    UnsupportedFormat(PathBuf),
}

/// Texture slots as exposed by the import layer. Several slots have no
/// counterpart in the shading model and are ignored when meshes are built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ImportSlot {
    Diffuse,
    Specular,
    Ambient,
    Height,
    Normals,
    Shininess,
    Opacity,
    Displacement,
}

/// Material with its texture references grouped by slot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportedMaterial {
    pub name: String,
    pub textures: BTreeMap<ImportSlot, Vec<String>>,
}

impl ImportedMaterial {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            textures: BTreeMap::new(),
        }
    }

    pub fn add_texture(&mut self, slot: ImportSlot, path: impl Into<String>) {
        self.textures.entry(slot).or_default().push(path.into());
    }

    pub fn texture_count(&self, slot: ImportSlot) -> usize {
        self.textures.get(&slot).map_or(0, Vec::len)
    }

    pub fn textures(&self, slot: ImportSlot) -> &[String] {
        self.textures.get(&slot).map_or(&[], Vec::as_slice)
    }
}

/// Mesh data as parallel per-vertex arrays plus faces.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportedMesh {
    pub name: String,
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    /// First UV channel, if the source provides one.
    pub tex_coords: Option<Vec<Vec2>>,
    pub tangents: Vec<Vec3>,
    pub bitangents: Vec<Vec3>,
    pub faces: Vec<Vec<u32>>,
    pub material_index: usize,
}

/// Node of the scene hierarchy. Nodes only reference meshes by index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneNode {
    pub name: String,
    pub meshes: Vec<usize>,
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_meshes(mut self, meshes: Vec<usize>) -> Self {
        self.meshes = meshes;
        self
    }

    pub fn with_child(mut self, child: SceneNode) -> Self {
        self.children.push(child);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportedScene {
    pub meshes: Vec<ImportedMesh>,
    pub materials: Vec<ImportedMaterial>,
    pub root: Option<SceneNode>,
    /// Set when the importer could not produce a complete scene.
    pub incomplete: bool,
}

/// Reads a model file into an [`ImportedScene`].
pub trait SceneImporter {
    fn import(&self, path: &Path) -> Result<ImportedScene, ImportError>;
}

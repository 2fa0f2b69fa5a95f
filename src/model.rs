use std::path::{Path, PathBuf};

use glam::{Vec2, Vec3};
use log::{error, info, warn};
use thiserror::Error;

use crate::import::{
    ImportError, ImportSlot, ImportedMaterial, ImportedMesh, ImportedScene, SceneImporter,
    SceneNode,
};
use crate::mesh::{Mesh, Texture, TextureKind, Vertex};
use crate::texture::{TextureCache, TextureUploader};

/// Material slots that feed the shading model, in the order their textures
/// are appended to a mesh.
const SLOT_KINDS: [(ImportSlot, TextureKind); 4] = [
    (ImportSlot::Diffuse, TextureKind::Diffuse),
    (ImportSlot::Specular, TextureKind::Specular),
    (ImportSlot::Height, TextureKind::Normal),
    (ImportSlot::Ambient, TextureKind::Height),
];

#[derive(Debug, Error)]
pub enum ModelError {
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error("scene imported from {0} is incomplete")]
    Incomplete(PathBuf),
    #[error("scene imported from {0} has no root node")]
    MissingRoot(PathBuf),
}

/// A loaded model: flattened meshes plus the textures they share.
#[derive(Debug, Default)]
pub struct Model {
    meshes: Vec<Mesh>,
    textures: TextureCache,
    directory: PathBuf,
}

impl Model {
    /// Loads a model, logging failures and falling back to an empty model.
    pub fn load(
        path: &Path,
        importer: &dyn SceneImporter,
        uploader: &mut dyn TextureUploader,
    ) -> Self {
        match Self::try_load(path, importer, uploader) {
            Ok(model) => model,
            Err(err) => {
                error!("failed to load model: {err}");
                Self {
                    directory: parent_directory(path),
                    ..Self::default()
                }
            }
        }
    }

    pub fn try_load(
        path: &Path,
        importer: &dyn SceneImporter,
        uploader: &mut dyn TextureUploader,
    ) -> Result<Self, ModelError> {
        let scene = importer.import(path)?;
        if scene.incomplete {
            return Err(ModelError::Incomplete(path.to_path_buf()));
        }
        if scene.root.is_none() {
            return Err(ModelError::MissingRoot(path.to_path_buf()));
        }
        let model = Self::from_scene(&scene, parent_directory(path), uploader);
        info!(
            "loaded {} with {} mesh(es) and {} texture(s)",
            path.display(),
            model.meshes.len(),
            model.textures.len()
        );
        Ok(model)
    }

    /// Flattens `scene` depth-first: a node's meshes come before its
    /// children's. Texture references resolve relative to `directory`.
    pub fn from_scene(
        scene: &ImportedScene,
        directory: PathBuf,
        uploader: &mut dyn TextureUploader,
    ) -> Self {
        let mut model = Self {
            meshes: Vec::new(),
            textures: TextureCache::new(),
            directory,
        };
        if let Some(root) = &scene.root {
            model.process_node(root, scene, uploader);
        }
        model
    }

    fn process_node(
        &mut self,
        node: &SceneNode,
        scene: &ImportedScene,
        uploader: &mut dyn TextureUploader,
    ) {
        for &index in &node.meshes {
            match scene.meshes.get(index) {
                Some(mesh) => {
                    let mesh = self.process_mesh(mesh, scene, uploader);
                    self.meshes.push(mesh);
                }
                None => warn!("node {} references missing mesh {index}", node.name),
            }
        }
        for child in &node.children {
            self.process_node(child, scene, uploader);
        }
    }

    fn process_mesh(
        &mut self,
        mesh: &ImportedMesh,
        scene: &ImportedScene,
        uploader: &mut dyn TextureUploader,
    ) -> Mesh {
        let vertices = assemble_vertices(mesh);
        let indices = mesh.faces.iter().flatten().copied().collect();

        let mut textures = Vec::new();
        match scene.materials.get(mesh.material_index) {
            Some(material) => {
                for (slot, kind) in SLOT_KINDS {
                    textures.extend(self.load_material_textures(material, slot, kind, uploader));
                }
            }
            None => warn!(
                "mesh {} references missing material {}",
                mesh.name, mesh.material_index
            ),
        }
        Mesh::new(vertices, indices, textures)
    }

    fn load_material_textures(
        &mut self,
        material: &ImportedMaterial,
        slot: ImportSlot,
        kind: TextureKind,
        uploader: &mut dyn TextureUploader,
    ) -> Vec<Texture> {
        let mut textures = Vec::new();
        for path in material.textures(slot) {
            if let Some(texture) = self.textures.load(path, kind, &self.directory, uploader) {
                textures.push(texture);
            }
        }
        textures
    }

    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    pub fn texture_cache(&self) -> &TextureCache {
        &self.textures
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    pub fn vertex_count(&self) -> usize {
        self.meshes.iter().map(|mesh| mesh.vertices().len()).sum()
    }

    pub fn index_count(&self) -> usize {
        self.meshes.iter().map(|mesh| mesh.indices().len()).sum()
    }
}

fn parent_directory(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}

fn assemble_vertices(mesh: &ImportedMesh) -> Vec<Vertex> {
    let vec3_at = |values: &[Vec3], i: usize| values.get(i).copied().unwrap_or(Vec3::ZERO);
    mesh.positions
        .iter()
        .enumerate()
        .map(|(i, position)| {
            let uv = mesh
                .tex_coords
                .as_ref()
                .and_then(|uvs| uvs.get(i).copied())
                .unwrap_or(Vec2::ZERO);
            Vertex::new(
                *position,
                vec3_at(&mesh.normals, i),
                uv,
                vec3_at(&mesh.tangents, i),
                vec3_at(&mesh.bitangents, i),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::texture::{TextureError, TextureHandle};

    #[derive(Default)]
    struct FakeUploader {
        uploads: Vec<PathBuf>,
    }

    impl TextureUploader for FakeUploader {
        fn upload(&mut self, path: &Path) -> Result<TextureHandle, TextureError> {
            self.uploads.push(path.to_path_buf());
            Ok(TextureHandle(self.uploads.len() as u32))
        }
    }

    struct FakeImporter {
        scenes: HashMap<PathBuf, ImportedScene>,
    }

    impl FakeImporter {
        fn with(path: &str, scene: ImportedScene) -> Self {
            let mut scenes = HashMap::new();
            scenes.insert(PathBuf::from(path), scene);
            Self { scenes }
        }
    }

    impl SceneImporter for FakeImporter {
        fn import(&self, path: &Path) -> Result<ImportedScene, ImportError> {
            self.scenes
                .get(path)
                .cloned()
                .ok_or_else(|| ImportError::UnsupportedFormat(path.to_path_buf()))
        }
    }

    fn triangle(name: &str, material_index: usize) -> ImportedMesh {
        ImportedMesh {
            name: name.to_string(),
            positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            normals: vec![Vec3::Z; 3],
            tex_coords: Some(vec![Vec2::ZERO, Vec2::X, Vec2::Y]),
            tangents: vec![Vec3::X; 3],
            bitangents: vec![Vec3::Y; 3],
            faces: vec![vec![0, 1, 2]],
            material_index,
        }
    }

    fn textured_material(path: &str) -> ImportedMaterial {
        let mut material = ImportedMaterial::named("skin");
        material.add_texture(ImportSlot::Diffuse, path);
        material
    }

    #[test]
    fn single_textured_triangle() {
        let scene = ImportedScene {
            meshes: vec![triangle("tri", 0)],
            materials: vec![textured_material("skin.png")],
            root: Some(SceneNode::new("root").with_meshes(vec![0])),
            incomplete: false,
        };
        let importer = FakeImporter::with("assets/tri.obj", scene);
        let mut uploader = FakeUploader::default();
        let model = Model::load(Path::new("assets/tri.obj"), &importer, &mut uploader);

        assert_eq!(model.meshes().len(), 1);
        let mesh = &model.meshes()[0];
        assert_eq!(mesh.vertices().len(), 3);
        assert_eq!(mesh.indices(), &[0, 1, 2]);
        assert_eq!(mesh.textures().len(), 1);
        assert_eq!(mesh.textures()[0].kind, TextureKind::Diffuse);
        assert_eq!(uploader.uploads, vec![PathBuf::from("assets/skin.png")]);
        assert_eq!(model.directory(), Path::new("assets"));
    }

    #[test]
    fn shared_texture_is_uploaded_once() {
        let scene = ImportedScene {
            meshes: vec![triangle("a", 0), triangle("b", 0)],
            materials: vec![textured_material("skin.png")],
            root: Some(SceneNode::new("root").with_meshes(vec![0, 1])),
            incomplete: false,
        };
        let mut uploader = FakeUploader::default();
        let model = Model::from_scene(&scene, PathBuf::from("m"), &mut uploader);

        assert_eq!(uploader.uploads.len(), 1);
        assert_eq!(model.texture_cache().hits(), 1);
        assert_eq!(
            model.meshes()[0].textures()[0].handle,
            model.meshes()[1].textures()[0].handle
        );
    }

    #[test]
    fn failed_import_yields_empty_model() {
        let importer = FakeImporter::with("other.obj", ImportedScene::default());
        let mut uploader = FakeUploader::default();
        let model = Model::load(Path::new("missing.obj"), &importer, &mut uploader);
        assert!(model.is_empty());
        assert!(uploader.uploads.is_empty());
    }

    #[test]
    fn incomplete_or_rootless_scenes_are_rejected() {
        let importer = FakeImporter::with(
            "a.obj",
            ImportedScene {
                incomplete: true,
                root: Some(SceneNode::new("root")),
                ..ImportedScene::default()
            },
        );
        let mut uploader = FakeUploader::default();
        let err = Model::try_load(Path::new("a.obj"), &importer, &mut uploader).unwrap_err();
        assert!(matches!(err, ModelError::Incomplete(_)));

        let importer = FakeImporter::with("b.obj", ImportedScene::default());
        let err = Model::try_load(Path::new("b.obj"), &importer, &mut uploader).unwrap_err();
        assert!(matches!(err, ModelError::MissingRoot(_)));
    }

    #[test]
    fn meshes_are_flattened_in_pre_order() {
        let meshes = (0..4)
            .map(|i| {
                let mut mesh = triangle(&format!("m{i}"), 0);
                mesh.positions[0] = Vec3::splat(i as f32);
                mesh
            })
            .collect();
        let root = SceneNode::new("root")
            .with_meshes(vec![2])
            .with_child(
                SceneNode::new("left")
                    .with_meshes(vec![0])
                    .with_child(SceneNode::new("leaf").with_meshes(vec![3])),
            )
            .with_child(SceneNode::new("right").with_meshes(vec![1]));
        let scene = ImportedScene {
            meshes,
            materials: vec![ImportedMaterial::named("plain")],
            root: Some(root),
            incomplete: false,
        };
        let mut uploader = FakeUploader::default();
        let model = Model::from_scene(&scene, PathBuf::new(), &mut uploader);

        let order: Vec<f32> = model
            .meshes()
            .iter()
            .map(|mesh| mesh.vertices()[0].position[0])
            .collect();
        assert_eq!(order, vec![2.0, 0.0, 3.0, 1.0]);
    }

    #[test]
    fn slots_map_onto_shading_kinds() {
        let mut material = ImportedMaterial::named("all");
        material.add_texture(ImportSlot::Ambient, "ambient.png");
        material.add_texture(ImportSlot::Height, "bump.png");
        material.add_texture(ImportSlot::Specular, "spec.png");
        material.add_texture(ImportSlot::Diffuse, "diff.png");
        material.add_texture(ImportSlot::Opacity, "alpha.png");
        let scene = ImportedScene {
            meshes: vec![triangle("tri", 0)],
            materials: vec![material],
            root: Some(SceneNode::new("root").with_meshes(vec![0])),
            incomplete: false,
        };
        let mut uploader = FakeUploader::default();
        let model = Model::from_scene(&scene, PathBuf::new(), &mut uploader);

        let kinds: Vec<(TextureKind, &str)> = model.meshes()[0]
            .textures()
            .iter()
            .map(|t| (t.kind, t.path.as_str()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (TextureKind::Diffuse, "diff.png"),
                (TextureKind::Specular, "spec.png"),
                (TextureKind::Normal, "bump.png"),
                (TextureKind::Height, "ambient.png"),
            ]
        );
    }

    #[test]
    fn missing_uvs_and_short_arrays_default_to_zero() {
        let mut mesh = triangle("bare", 0);
        mesh.tex_coords = None;
        mesh.tangents.clear();
        mesh.normals.truncate(1);
        let vertices = assemble_vertices(&mesh);
        assert_eq!(vertices[1].tex_coords, [0.0, 0.0]);
        assert_eq!(vertices[1].normal, [0.0, 0.0, 0.0]);
        assert_eq!(vertices[0].normal, [0.0, 0.0, 1.0]);
        assert_eq!(vertices[2].tangent, [0.0, 0.0, 0.0]);
    }
}

use std::fmt::Write as _;
use std::time::Instant;

use crate::camera::Camera;
use crate::input::{InputState, KeyCode};
use crate::model::Model;
use crate::scene::SceneDescription;
use crate::shader::{ShaderProgram, Uniform, UniformRecorder};

/// Measures the time between consecutive frames.
#[derive(Debug, Clone, Copy)]
pub struct FrameClock {
    last: Instant,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock {
    pub fn new() -> Self {
        Self {
            last: Instant::now(),
        }
    }

    /// Seconds since the previous tick.
    pub fn tick(&mut self) -> f32 {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> f32 {
        let delta = now.saturating_duration_since(self.last).as_secs_f32();
        self.last = now;
        delta
    }
}

/// Writes the per-frame uniforms shared by every draw.
pub fn upload_frame(
    shader: &mut dyn ShaderProgram,
    camera: &Camera,
    scene: &SceneDescription,
    aspect: f32,
) {
    shader.set_vec3(Uniform::ViewerPos, camera.position());
    shader.set_float(Uniform::MaterialShininess, scene.shininess);
    scene.lights.upload(shader);
    shader.set_mat4(Uniform::Projection, camera.projection_matrix(aspect));
    shader.set_mat4(Uniform::View, camera.view_matrix());
}

/// Runs the uniform side of one frame: shared state, then the model matrix
/// of each instance followed by the samplers of every mesh drawn with it.
pub fn prepare_frame(
    shader: &mut dyn ShaderProgram,
    camera: &Camera,
    scene: &SceneDescription,
    model: &Model,
    aspect: f32,
) {
    upload_frame(shader, camera, scene, aspect);
    for instance in &scene.instances {
        shader.set_mat4(Uniform::Model, instance.model_matrix());
        for mesh in model.meshes() {
            mesh.bind_samplers(shader);
        }
    }
}

/// Camera, held keys and clock of a running viewer.
#[derive(Debug)]
pub struct ViewerState {
    pub camera: Camera,
    pub scene: SceneDescription,
    input: InputState,
    clock: FrameClock,
}

impl ViewerState {
    pub fn new(scene: SceneDescription) -> Self {
        Self {
            camera: scene.camera.build(),
            scene,
            input: InputState::new(),
            clock: FrameClock::new(),
        }
    }

    pub fn key_down(&mut self, key: KeyCode) {
        self.input.set_key_down(key);
    }

    pub fn key_up(&mut self, key: KeyCode) {
        self.input.set_key_up(key);
    }

    /// Relative pointer motion in window coordinates (y grows downwards).
    pub fn mouse_motion(&mut self, dx: f32, dy: f32) {
        self.camera.process_mouse_movement(dx, -dy, true);
    }

    pub fn scroll(&mut self, dy: f32) {
        self.camera.process_mouse_scroll(dy);
    }

    /// Advances the clock and applies held keys. Returns `true` when the
    /// viewer should close.
    pub fn update(&mut self) -> bool {
        let delta = self.clock.tick();
        self.advance(delta)
    }

    pub fn advance(&mut self, delta_time: f32) -> bool {
        self.input
            .apply(&self.scene.bindings, &mut self.camera, delta_time)
    }
}

/// Human readable report of a loaded model and the uniforms a frame wrote.
pub fn format_summary(scene: &SceneDescription, model: &Model, uniforms: &UniformRecorder) -> String {
    let cache = model.texture_cache();
    let mut out = String::new();
    let _ = writeln!(out, "Model: {}", scene.model.display());
    let _ = writeln!(out, "Meshes: {}", model.meshes().len());
    let _ = writeln!(out, "Vertices: {}", model.vertex_count());
    let _ = writeln!(out, "Indices: {}", model.index_count());
    let _ = writeln!(
        out,
        "Textures: {} (hits {}, misses {}, failed {})",
        cache.len(),
        cache.hits(),
        cache.misses(),
        cache.failed()
    );
    for (index, mesh) in model.meshes().iter().enumerate() {
        let kinds: Vec<String> = mesh
            .texture_bindings()
            .iter()
            .map(|binding| binding.uniform.name())
            .collect();
        let _ = writeln!(
            out,
            " - mesh {index}: {} vertices, {} indices, textures [{}]",
            mesh.vertices().len(),
            mesh.indices().len(),
            kinds.join(", ")
        );
    }
    let _ = writeln!(out, "Lights: {}", scene.lights.len());
    for (index, light) in scene.lights.iter().enumerate() {
        let p = light.position;
        let _ = writeln!(out, " - light {index}: at ({}, {}, {})", p.x, p.y, p.z);
    }
    let _ = writeln!(out, "Instances: {}", scene.instances.len());
    let _ = writeln!(out, "Uniforms:");
    for name in uniforms.names() {
        let _ = writeln!(out, "  {name}");
    }
    out
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use glam::{Mat4, Vec3};

    use super::*;
    use crate::import::{ImportSlot, ImportedMaterial, ImportedMesh, ImportedScene, SceneNode};
    use crate::shader::UniformValue;
    use crate::texture::{TextureError, TextureHandle, TextureUploader};

    struct StubUploader;

    impl TextureUploader for StubUploader {
        fn upload(&mut self, _path: &std::path::Path) -> Result<TextureHandle, TextureError> {
            Ok(TextureHandle(9))
        }
    }

    fn textured_model() -> Model {
        let mut material = ImportedMaterial::named("m");
        material.add_texture(ImportSlot::Diffuse, "d.png");
        let scene = ImportedScene {
            meshes: vec![ImportedMesh {
                positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
                faces: vec![vec![0, 1, 2]],
                ..ImportedMesh::default()
            }],
            materials: vec![material],
            root: Some(SceneNode::new("root").with_meshes(vec![0])),
            incomplete: false,
        };
        Model::from_scene(&scene, PathBuf::new(), &mut StubUploader)
    }

    #[test]
    fn clock_reports_elapsed_seconds() {
        let mut clock = FrameClock::new();
        let start = Instant::now() + Duration::from_millis(10);
        clock.tick_at(start);
        let delta = clock.tick_at(start + Duration::from_millis(250));
        assert!((delta - 0.25).abs() < 1e-4);
    }

    #[test]
    fn frame_upload_writes_shared_uniforms() {
        let scene = SceneDescription::default();
        let camera = scene.camera.build();
        let mut recorder = UniformRecorder::new();
        upload_frame(&mut recorder, &camera, &scene, 800.0 / 600.0);

        assert_eq!(
            recorder.last("viewer_pos"),
            Some(UniformValue::Vec3(Vec3::new(0.0, 0.0, 3.0)))
        );
        assert_eq!(recorder.last("material.shininess"), Some(UniformValue::Float(8.0)));
        assert_eq!(recorder.last("current_lights_num"), Some(UniformValue::Int(2)));
        assert_eq!(
            recorder.last("view"),
            Some(UniformValue::Mat4(camera.view_matrix()))
        );
        assert_eq!(recorder.count("projection"), 1);
        assert_eq!(recorder.count("model"), 0);
    }

    #[test]
    fn each_instance_gets_a_model_matrix() {
        let scene = SceneDescription::default();
        let camera = scene.camera.build();
        let model = textured_model();
        let mut recorder = UniformRecorder::new();
        prepare_frame(&mut recorder, &camera, &scene, &model, 1.0);

        assert_eq!(recorder.count("model"), 3);
        assert_eq!(recorder.count("material.texture_diffuse1"), 3);
        assert_eq!(
            recorder.last("model"),
            Some(UniformValue::Mat4(scene.instances[2].model_matrix()))
        );
        assert_ne!(scene.instances[2].model_matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn viewer_state_moves_and_quits() {
        let mut viewer = ViewerState::new(SceneDescription::default());
        viewer.key_down(KeyCode::Character('S'));
        assert!(!viewer.advance(1.0));
        assert!((viewer.camera.position().z - 5.5).abs() < 1e-4);
        viewer.key_up(KeyCode::Character('S'));

        viewer.mouse_motion(0.0, 100.0);
        assert!((viewer.camera.pitch() + 10.0).abs() < 1e-4);
        viewer.scroll(5.0);
        assert_eq!(viewer.camera.zoom(), 40.0);

        viewer.key_down(KeyCode::from_name("Escape").unwrap());
        assert!(viewer.advance(0.0));
    }

    #[test]
    fn summary_lists_meshes_and_uniforms() {
        let scene = SceneDescription::default();
        let model = textured_model();
        let mut recorder = UniformRecorder::new();
        prepare_frame(&mut recorder, &scene.camera.build(), &scene, &model, 1.0);
        let summary = format_summary(&scene, &model, &recorder);

        assert!(summary.contains("Meshes: 1"));
        assert!(summary.contains("Textures: 1 (hits 0, misses 1, failed 0)"));
        assert!(summary.contains("textures [material.texture_diffuse1]"));
        assert!(summary.contains("  plight[1].specular"));
        assert!(summary.contains("  current_lights_num"));
        assert!(summary.contains(" - light 0: at (1.2, 1, 2)"));
        assert!(summary.contains(" - light 1: at (-1.2, 1, 2)"));
    }
}

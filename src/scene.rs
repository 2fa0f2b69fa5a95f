use std::fs;
use std::path::{Path, PathBuf};

use glam::{EulerRot, Mat4, Quat, Vec3};
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::camera::{self, Camera};
use crate::input::{BindingError, KeyBindings};
use crate::light::{LightCaster, LightError, LightSet};

pub const DEFAULT_MODEL: &str = "resources/sylvanas.obj";
pub const DEFAULT_SHININESS: f32 = 8.0;

#[derive(Debug, Error)]
pub enum SceneError {
    #[error("unable to read scene {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid scene XML: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("<{tag}>: {message}")]
    Invalid { tag: String, message: String },
    #[error(transparent)]
    Lights(#[from] LightError),
    #[error(transparent)]
    Binding(#[from] BindingError),
}

fn invalid(tag: &str, message: impl Into<String>) -> SceneError {
    SceneError::Invalid {
        tag: tag.to_string(),
        message: message.into(),
    }
}

/// Where the viewer starts and how it responds to input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraStart {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub speed: f32,
    pub sensitivity: f32,
    pub zoom: f32,
}

impl Default for CameraStart {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 3.0),
            yaw: camera::DEFAULT_YAW,
            pitch: camera::DEFAULT_PITCH,
            speed: camera::DEFAULT_SPEED,
            sensitivity: camera::DEFAULT_SENSITIVITY,
            zoom: camera::DEFAULT_ZOOM,
        }
    }
}

impl CameraStart {
    pub fn build(&self) -> Camera {
        let mut camera = Camera::new(self.position, Vec3::Y, self.yaw, self.pitch);
        camera.set_movement_speed(self.speed);
        camera.set_mouse_sensitivity(self.sensitivity);
        camera.set_zoom(self.zoom);
        camera
    }
}

/// One placement of the model. Rotation is in degrees, applied Y, X then Z.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for Instance {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Instance {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn rotated(mut self, rotation: Vec3) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn model_matrix(&self) -> Mat4 {
        let rotation = Quat::from_euler(
            EulerRot::YXZ,
            self.rotation.y.to_radians(),
            self.rotation.x.to_radians(),
            self.rotation.z.to_radians(),
        );
        Mat4::from_scale_rotation_translation(self.scale, rotation, self.position)
    }
}

/// Everything the viewer needs to set up a frame loop.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneDescription {
    pub camera: CameraStart,
    pub model: PathBuf,
    pub shininess: f32,
    pub instances: Vec<Instance>,
    pub lights: LightSet,
    pub bindings: KeyBindings,
}

impl Default for SceneDescription {
    /// The demo scene: three copies of the bundled model lit by a yellow and
    /// a blue point light.
    fn default() -> Self {
        let attenuation = Vec3::new(1.0, 0.3, 0.032);
        let lights = [
            (Vec3::new(1.2, 1.0, 2.0), Vec3::new(1.0, 1.0, 0.0)),
            (Vec3::new(-1.2, 1.0, 2.0), Vec3::new(0.0, 0.0, 1.0)),
        ]
        .into_iter()
        .map(|(position, color)| {
            LightCaster::new()
                .with_position(position)
                .with_attenuation(attenuation)
                .with_color(color)
        })
        .collect();
        Self {
            camera: CameraStart::default(),
            model: PathBuf::from(DEFAULT_MODEL),
            shininess: DEFAULT_SHININESS,
            instances: vec![
                Instance::at(Vec3::new(0.0, -0.5, 0.0)),
                Instance::at(Vec3::new(-1.0, -0.5, 0.0)).rotated(Vec3::new(0.0, 90.0, 0.0)),
                Instance::at(Vec3::new(1.0, -0.5, 0.0)).rotated(Vec3::new(0.0, 180.0, 0.0)),
            ],
            lights,
            bindings: KeyBindings::default(),
        }
    }
}

impl SceneDescription {
    /// Reads a scene file. A relative model path is resolved against the
    /// directory holding the scene file.
    pub fn from_file(path: &Path) -> Result<Self, SceneError> {
        let xml = fs::read_to_string(path).map_err(|source| SceneError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut scene = Self::from_xml(&xml)?;
        if scene.model.is_relative() {
            if let Some(directory) = path.parent() {
                scene.model = directory.join(&scene.model);
            }
        }
        Ok(scene)
    }

    pub fn from_xml(xml: &str) -> Result<Self, SceneError> {
        let document = Document::parse(xml)?;
        let root = document.root_element();
        if !root.has_tag_name("scene") {
            return Err(invalid(root.tag_name().name(), "expected <scene> root element"));
        }

        let mut camera = CameraStart::default();
        if let Some(node) = child(&root, "camera") {
            camera.position = parse_vec3(&node, "position", camera.position)?;
            camera.yaw = parse_f32(&node, "yaw", camera.yaw)?;
            camera.pitch = parse_f32(&node, "pitch", camera.pitch)?;
            camera.speed = parse_f32(&node, "speed", camera.speed)?;
            camera.sensitivity = parse_f32(&node, "sensitivity", camera.sensitivity)?;
            camera.zoom = parse_f32(&node, "zoom", camera.zoom)?;
        }

        let model_node = child(&root, "model").ok_or_else(|| invalid("model", "tag is missing"))?;
        let model = required_text(&model_node, "path")?;
        let shininess = parse_f32(&model_node, "shininess", DEFAULT_SHININESS)?;

        let mut instances = Vec::new();
        for node in root.children().filter(|n| n.has_tag_name("instance")) {
            let defaults = Instance::default();
            instances.push(Instance {
                position: parse_vec3(&node, "position", defaults.position)?,
                rotation: parse_vec3(&node, "rotation", defaults.rotation)?,
                scale: parse_vec3(&node, "scale", defaults.scale)?,
            });
        }
        if instances.is_empty() {
            instances.push(Instance::default());
        }

        let mut lights = LightSet::new();
        for node in root.children().filter(|n| n.has_tag_name("light")) {
            let mut light = LightCaster::new()
                .with_position(parse_vec3(&node, "position", Vec3::ZERO)?)
                .with_attenuation(parse_vec3(&node, "attenuation", Vec3::new(1.0, 0.0, 0.0))?);
            if let Some(color) = optional_text(&node, "color") {
                light = light.with_color(vec3_from_str("color", &color)?);
            }
            light.ambient = parse_vec3(&node, "ambient", light.ambient)?;
            light.diffuse = parse_vec3(&node, "diffuse", light.diffuse)?;
            light.specular = parse_vec3(&node, "specular", light.specular)?;
            lights.push(light)?;
        }

        let mut bindings = KeyBindings::default();
        if let Some(node) = child(&root, "bindings") {
            for bind in node.children().filter(|n| n.has_tag_name("bind")) {
                let key = bind
                    .attribute("key")
                    .ok_or_else(|| invalid("bind", "missing key attribute"))?;
                let action = bind
                    .attribute("action")
                    .ok_or_else(|| invalid("bind", "missing action attribute"))?;
                bindings.bind_names(key, action)?;
            }
        }

        Ok(Self {
            camera,
            model: PathBuf::from(model),
            shininess,
            instances,
            lights,
            bindings,
        })
    }
}

fn child<'a, 'input>(node: &Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|child| child.has_tag_name(tag))
}

fn required_text(node: &Node<'_, '_>, tag: &str) -> Result<String, SceneError> {
    optional_text(node, tag).ok_or_else(|| invalid(tag, "tag is missing"))
}

fn optional_text(node: &Node<'_, '_>, tag: &str) -> Option<String> {
    child(node, tag)
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| text.to_string())
}

fn parse_vec3(node: &Node<'_, '_>, tag: &str, default: Vec3) -> Result<Vec3, SceneError> {
    match optional_text(node, tag) {
        Some(value) => vec3_from_str(tag, &value),
        None => Ok(default),
    }
}

fn vec3_from_str(tag: &str, value: &str) -> Result<Vec3, SceneError> {
    let numbers = value
        .split_whitespace()
        .map(|component| component.parse::<f32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| invalid(tag, format!("failed to parse vector: {err}")))?;
    match numbers.as_slice() {
        [x, y, z] => Ok(Vec3::new(*x, *y, *z)),
        _ => Err(invalid(tag, "vector needs exactly 3 components")),
    }
}

fn parse_f32(node: &Node<'_, '_>, tag: &str, default: f32) -> Result<f32, SceneError> {
    match optional_text(node, tag) {
        Some(value) => value
            .parse::<f32>()
            .map_err(|err| invalid(tag, format!("failed to parse float: {err}"))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Movement;
    use crate::input::{Action, KeyCode, NamedKey};

    const SAMPLE: &str = r#"
    <scene>
        <camera>
            <position>0 1 5</position>
            <yaw>-80</yaw>
            <speed>4</speed>
        </camera>
        <model>
            <path>assets/crate.obj</path>
            <shininess>32</shininess>
        </model>
        <instance>
            <position>1 0 0</position>
            <rotation>0 90 0</rotation>
        </instance>
        <instance>
            <scale>2 2 2</scale>
        </instance>
        <light>
            <position>1.2 1 2</position>
            <attenuation>1 0.09 0.032</attenuation>
            <color>1 1 0</color>
            <specular>0.5 0.5 0.5</specular>
        </light>
        <bindings>
            <bind key="Up" action="forward"/>
            <bind key="Q" action="quit"/>
        </bindings>
    </scene>
    "#;

    #[test]
    fn parse_scene_populates_every_section() {
        let scene = SceneDescription::from_xml(SAMPLE).unwrap();
        assert_eq!(scene.camera.position, Vec3::new(0.0, 1.0, 5.0));
        assert_eq!(scene.camera.yaw, -80.0);
        assert_eq!(scene.camera.pitch, camera::DEFAULT_PITCH);
        assert_eq!(scene.camera.speed, 4.0);
        assert_eq!(scene.model, PathBuf::from("assets/crate.obj"));
        assert_eq!(scene.shininess, 32.0);
        assert_eq!(scene.instances.len(), 2);
        assert_eq!(scene.instances[1].scale, Vec3::splat(2.0));

        assert_eq!(scene.lights.len(), 1);
        let light = scene.lights.get(0).unwrap();
        assert_eq!(light.diffuse, Vec3::new(1.0, 1.0, 0.0));
        assert_eq!(light.specular, Vec3::splat(0.5));
        assert_eq!(light.attenuation, Vec3::new(1.0, 0.09, 0.032));

        assert_eq!(
            scene.bindings.action(KeyCode::Named(NamedKey::Up)),
            Some(Action::Move(Movement::Forward))
        );
        assert_eq!(
            scene.bindings.action(KeyCode::Character('W')),
            Some(Action::Move(Movement::Forward))
        );
        assert_eq!(scene.bindings.action(KeyCode::Character('Q')), Some(Action::Quit));
    }

    #[test]
    fn minimal_scene_gets_defaults() {
        let scene =
            SceneDescription::from_xml("<scene><model><path>a.obj</path></model></scene>").unwrap();
        assert_eq!(scene.shininess, DEFAULT_SHININESS);
        assert_eq!(scene.instances, vec![Instance::default()]);
        assert!(scene.lights.is_empty());
        assert_eq!(scene.camera, CameraStart::default());
    }

    #[test]
    fn missing_model_is_an_error() {
        let err = SceneDescription::from_xml("<scene><camera/></scene>").unwrap_err();
        assert!(matches!(err, SceneError::Invalid { .. }));
    }

    #[test]
    fn bad_binding_is_reported() {
        let xml = r#"<scene><model><path>a.obj</path></model>
            <bindings><bind key="E" action="upward"/></bindings></scene>"#;
        assert!(matches!(
            SceneDescription::from_xml(xml),
            Err(SceneError::Binding(_))
        ));
    }

    #[test]
    fn short_vectors_are_rejected() {
        let xml = "<scene><model><path>a.obj</path></model>\
                   <instance><position>1 2</position></instance></scene>";
        assert!(SceneDescription::from_xml(xml).is_err());
    }

    #[test]
    fn default_scene_matches_demo() {
        let scene = SceneDescription::default();
        assert_eq!(scene.model, PathBuf::from(DEFAULT_MODEL));
        assert_eq!(scene.lights.len(), 2);
        assert_eq!(scene.instances.len(), 3);
        assert_eq!(scene.camera.position, Vec3::new(0.0, 0.0, 3.0));
    }

    #[test]
    fn instance_matrix_translates_after_rotating() {
        let instance = Instance::at(Vec3::new(-1.0, -0.5, 0.0)).rotated(Vec3::new(0.0, 90.0, 0.0));
        let moved = instance.model_matrix().transform_point3(Vec3::X);
        assert!((moved - Vec3::new(-1.0, -0.5, -1.0)).length() < 1e-5);
    }

    #[test]
    fn relative_model_path_follows_scene_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.xml");
        fs::write(&path, "<scene><model><path>m.obj</path></model></scene>").unwrap();
        let scene = SceneDescription::from_file(&path).unwrap();
        assert_eq!(scene.model, dir.path().join("m.obj"));
    }
}

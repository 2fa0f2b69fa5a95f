//! Typed uniform addressing for the shading pipeline.
//!
//! Every value the viewer hands to a shader is described by a [`Uniform`].
//! [`Uniform::name`] yields the key the shading side knows it by, so a backend
//! that still works with named uniforms sees the exact same strings while the
//! rest of the crate never builds them by hand.

use std::fmt;

use glam::{Mat4, Vec3};

use crate::mesh::TextureKind;

/// Per-light field in the `plight[i]` uniform array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightField {
    Position,
    Attenuation,
    Ambient,
    Diffuse,
    Specular,
}

impl LightField {
    pub const ALL: [LightField; 5] = [
        LightField::Position,
        LightField::Attenuation,
        LightField::Ambient,
        LightField::Diffuse,
        LightField::Specular,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LightField::Position => "position",
            LightField::Attenuation => "attenuation",
            LightField::Ambient => "ambient",
            LightField::Diffuse => "diffuse",
            LightField::Specular => "specular",
        }
    }
}

/// A single uniform slot of the shading program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Uniform {
    ViewerPos,
    MaterialShininess,
    CurrentLightsNum,
    Light { index: usize, field: LightField },
    Model,
    View,
    Projection,
    /// Sampler for the `number`-th texture (starting at 1) of a given kind.
    MaterialTexture { kind: TextureKind, number: u32 },
}

impl Uniform {
    pub fn light(index: usize, field: LightField) -> Self {
        Uniform::Light { index, field }
    }

    /// Key of the uniform as declared by the shading program.
    pub fn name(&self) -> String {
        match self {
            Uniform::ViewerPos => "viewer_pos".to_string(),
            Uniform::MaterialShininess => "material.shininess".to_string(),
            Uniform::CurrentLightsNum => "current_lights_num".to_string(),
            Uniform::Light { index, field } => format!("plight[{index}].{}", field.as_str()),
            Uniform::Model => "model".to_string(),
            Uniform::View => "view".to_string(),
            Uniform::Projection => "projection".to_string(),
            Uniform::MaterialTexture { kind, number } => {
                format!("material.{}{number}", kind.uniform_prefix())
            }
        }
    }
}

impl fmt::Display for Uniform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Value written to a uniform slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Vec3(Vec3),
    Mat4(Mat4),
}

/// Receiver of uniform writes. Implemented by the GPU backend and by
/// [`UniformRecorder`].
pub trait ShaderProgram {
    fn set_uniform(&mut self, uniform: Uniform, value: UniformValue);

    fn set_int(&mut self, uniform: Uniform, value: i32) {
        self.set_uniform(uniform, UniformValue::Int(value));
    }

    fn set_float(&mut self, uniform: Uniform, value: f32) {
        self.set_uniform(uniform, UniformValue::Float(value));
    }

    fn set_vec3(&mut self, uniform: Uniform, value: Vec3) {
        self.set_uniform(uniform, UniformValue::Vec3(value));
    }

    fn set_mat4(&mut self, uniform: Uniform, value: Mat4) {
        self.set_uniform(uniform, UniformValue::Mat4(value));
    }

    /// Uploads the model/view/projection triple.
    fn set_mvp(&mut self, model: Mat4, view: Mat4, projection: Mat4) {
        self.set_mat4(Uniform::Model, model);
        self.set_mat4(Uniform::View, view);
        self.set_mat4(Uniform::Projection, projection);
    }
}

/// Shader program that records every write in order.
#[derive(Debug, Default, Clone)]
pub struct UniformRecorder {
    writes: Vec<(Uniform, UniformValue)>,
}

impl UniformRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> &[(Uniform, UniformValue)] {
        &self.writes
    }

    /// Distinct uniform keys in first-write order.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for (uniform, _) in &self.writes {
            let name = uniform.name();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Most recent value written to the uniform called `name`.
    pub fn last(&self, name: &str) -> Option<UniformValue> {
        self.writes
            .iter()
            .rev()
            .find(|(uniform, _)| uniform.name() == name)
            .map(|(_, value)| *value)
    }

    pub fn count(&self, name: &str) -> usize {
        self.writes
            .iter()
            .filter(|(uniform, _)| uniform.name() == name)
            .count()
    }

    pub fn clear(&mut self) {
        self.writes.clear();
    }
}

impl ShaderProgram for UniformRecorder {
    fn set_uniform(&mut self, uniform: Uniform, value: UniformValue) {
        self.writes.push((uniform, value));
    }
}

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::shader::{ShaderProgram, Uniform, UniformValue};
use crate::texture::TextureHandle;

/// Interleaved vertex as uploaded to the GPU.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coords: [f32; 2],
    pub tangent: [f32; 3],
    pub bitangent: [f32; 3],
}

impl Vertex {
    pub fn new(position: Vec3, normal: Vec3, tex_coords: Vec2, tangent: Vec3, bitangent: Vec3) -> Self {
        Self {
            position: position.into(),
            normal: normal.into(),
            tex_coords: tex_coords.into(),
            tangent: tangent.into(),
            bitangent: bitangent.into(),
        }
    }
}

/// Role a texture plays in the shading model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TextureKind {
    Diffuse,
    Specular,
    Normal,
    Height,
}

impl TextureKind {
    pub const ALL: [TextureKind; 4] = [
        TextureKind::Diffuse,
        TextureKind::Specular,
        TextureKind::Normal,
        TextureKind::Height,
    ];

    /// Sampler name prefix used by the shading program.
    pub fn uniform_prefix(self) -> &'static str {
        match self {
            TextureKind::Diffuse => "texture_diffuse",
            TextureKind::Specular => "texture_specular",
            TextureKind::Normal => "texture_normal",
            TextureKind::Height => "texture_height",
        }
    }

    pub fn from_uniform_prefix(name: &str) -> Option<Self> {
        TextureKind::ALL
            .into_iter()
            .find(|kind| kind.uniform_prefix() == name)
    }
}

/// Texture loaded for a model, identified by the path its material used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Texture {
    pub handle: TextureHandle,
    pub kind: TextureKind,
    pub path: String,
}

/// Texture unit assignment for one draw call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureBinding {
    pub uniform: Uniform,
    pub unit: u32,
    pub handle: TextureHandle,
}

/// Triangle mesh with the textures its material references.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mesh {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    textures: Vec<Texture>,
}

impl Mesh {
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>, textures: Vec<Texture>) -> Self {
        Self {
            vertices,
            indices,
            textures,
        }
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn textures(&self) -> &[Texture] {
        &self.textures
    }

    /// Assigns texture units in list order and numbers each kind from 1, so
    /// the second diffuse map binds to `material.texture_diffuse2`.
    pub fn texture_bindings(&self) -> Vec<TextureBinding> {
        let mut counters = [1u32; TextureKind::ALL.len()];
        self.textures
            .iter()
            .enumerate()
            .map(|(unit, texture)| {
                let counter = &mut counters[texture.kind as usize];
                let number = *counter;
                *counter += 1;
                TextureBinding {
                    uniform: Uniform::MaterialTexture {
                        kind: texture.kind,
                        number,
                    },
                    unit: unit as u32,
                    handle: texture.handle,
                }
            })
            .collect()
    }

    /// First texture of each kind, which is what the fixed pipeline samples.
    pub fn primary_texture(&self, kind: TextureKind) -> Option<&Texture> {
        self.textures.iter().find(|texture| texture.kind == kind)
    }

    /// Points every sampler uniform at its texture unit.
    pub fn bind_samplers(&self, shader: &mut dyn ShaderProgram) {
        for binding in self.texture_bindings() {
            shader.set_uniform(binding.uniform, UniformValue::Int(binding.unit as i32));
        }
    }
}

use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4, Vec3};
use log::{debug, warn};

use crate::light::MAX_LIGHTS;
use crate::shader::{LightField, ShaderProgram, Uniform, UniformValue};

/// One entry of the `plight` array. Vectors are padded to 16 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct GpuLight {
    pub position: [f32; 4],
    pub attenuation: [f32; 4],
    pub ambient: [f32; 4],
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
}

impl GpuLight {
    fn field_mut(&mut self, field: LightField) -> &mut [f32; 4] {
        match field {
            LightField::Position => &mut self.position,
            LightField::Attenuation => &mut self.attenuation,
            LightField::Ambient => &mut self.ambient,
            LightField::Diffuse => &mut self.diffuse,
            LightField::Specular => &mut self.specular,
        }
    }
}

/// Uniforms shared by every draw of a frame (bind group 0).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FrameUniforms {
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub viewer_pos: [f32; 4],
    pub shininess: f32,
    pub lights_num: u32,
    _padding: [u32; 2],
    pub lights: [GpuLight; MAX_LIGHTS],
}

impl Default for FrameUniforms {
    fn default() -> Self {
        Self {
            view: Mat4::IDENTITY.to_cols_array_2d(),
            projection: Mat4::IDENTITY.to_cols_array_2d(),
            viewer_pos: [0.0; 4],
            shininess: 0.0,
            lights_num: 0,
            _padding: [0; 2],
            lights: [GpuLight::default(); MAX_LIGHTS],
        }
    }
}

/// Per-instance transform (bind group 1).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct InstanceUniform {
    pub model: [[f32; 4]; 4],
    pub normal: [[f32; 4]; 3],
    _padding: [f32; 4],
}

impl InstanceUniform {
    pub fn new(model: Mat4) -> Self {
        let normal = Mat3::from_mat4(model).inverse().transpose();
        Self {
            model: model.to_cols_array_2d(),
            normal: mat3_to_3x4(normal),
            _padding: [0.0; 4],
        }
    }
}

/// Per-mesh material flags (bind group 2). `flags.x` is 1 when the mesh has
/// its own normal map.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct MaterialUniform {
    pub flags: [f32; 4],
}

fn mat3_to_3x4(matrix: Mat3) -> [[f32; 4]; 3] {
    let cols = matrix.to_cols_array();
    [
        [cols[0], cols[1], cols[2], 0.0],
        [cols[3], cols[4], cols[5], 0.0],
        [cols[6], cols[7], cols[8], 0.0],
    ]
}

fn padded(value: Vec3) -> [f32; 4] {
    value.extend(0.0).into()
}

/// Collects one frame's uniform writes into GPU layouts. Every `model` write
/// opens a new instance; sampler writes are served by bind groups instead.
#[derive(Debug, Clone, Default)]
pub struct FrameBuilder {
    pub frame: FrameUniforms,
    pub instances: Vec<InstanceUniform>,
}

impl FrameBuilder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ShaderProgram for FrameBuilder {
    fn set_uniform(&mut self, uniform: Uniform, value: UniformValue) {
        match (uniform, value) {
            (Uniform::ViewerPos, UniformValue::Vec3(v)) => self.frame.viewer_pos = padded(v),
            (Uniform::MaterialShininess, UniformValue::Float(v)) => self.frame.shininess = v,
            (Uniform::CurrentLightsNum, UniformValue::Int(count)) => {
                self.frame.lights_num = count.clamp(0, MAX_LIGHTS as i32) as u32;
            }
            (Uniform::Light { index, field }, UniformValue::Vec3(v)) => {
                match self.frame.lights.get_mut(index) {
                    Some(light) => *light.field_mut(field) = padded(v),
                    None => warn!("light slot {index} exceeds the shader's {MAX_LIGHTS} lights"),
                }
            }
            (Uniform::View, UniformValue::Mat4(m)) => self.frame.view = m.to_cols_array_2d(),
            (Uniform::Projection, UniformValue::Mat4(m)) => {
                self.frame.projection = m.to_cols_array_2d();
            }
            (Uniform::Model, UniformValue::Mat4(m)) => self.instances.push(InstanceUniform::new(m)),
            (Uniform::MaterialTexture { .. }, _) => {}
            (uniform, value) => debug!("ignoring {value:?} written to {uniform}"),
        }
    }
}

pub(crate) const SHADER: &str = r#"
const MAX_LIGHTS: u32 = 8u;

struct PointLight {
    position: vec4<f32>,
    attenuation: vec4<f32>,
    ambient: vec4<f32>,
    diffuse: vec4<f32>,
    specular: vec4<f32>,
}

struct FrameUniforms {
    view: mat4x4<f32>,
    projection: mat4x4<f32>,
    viewer_pos: vec4<f32>,
    shininess: f32,
    lights_num: u32,
    plight: array<PointLight, 8>,
}

struct InstanceUniform {
    model: mat4x4<f32>,
    normal: mat3x4<f32>,
}

struct MaterialUniform {
    flags: vec4<f32>,
}

@group(0) @binding(0)
var<uniform> frame: FrameUniforms;

@group(1) @binding(0)
var<uniform> instance: InstanceUniform;

@group(2) @binding(0)
var<uniform> material: MaterialUniform;
@group(2) @binding(1)
var material_sampler: sampler;
@group(2) @binding(2)
var texture_diffuse1: texture_2d<f32>;
@group(2) @binding(3)
var texture_specular1: texture_2d<f32>;
@group(2) @binding(4)
var texture_normal1: texture_2d<f32>;
@group(2) @binding(5)
var texture_height1: texture_2d<f32>;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) tex_coords: vec2<f32>,
    @location(3) tangent: vec3<f32>,
    @location(4) bitangent: vec3<f32>,
}

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) world_pos: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) tex_coords: vec2<f32>,
    @location(3) tangent: vec3<f32>,
    @location(4) bitangent: vec3<f32>,
}

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let world_position = instance.model * vec4<f32>(input.position, 1.0);
    out.position = frame.projection * frame.view * world_position;
    out.world_pos = world_position.xyz;

    let normal_matrix = mat3x3<f32>(
        instance.normal[0].xyz,
        instance.normal[1].xyz,
        instance.normal[2].xyz
    );
    out.normal = normal_matrix * input.normal;
    out.tangent = normal_matrix * input.tangent;
    out.bitangent = normal_matrix * input.bitangent;
    out.tex_coords = input.tex_coords;
    return out;
}

fn surface_normal(input: VertexOutput) -> vec3<f32> {
    let n = normalize(input.normal);
    if (material.flags.x < 0.5 || length(input.tangent) < 0.0001) {
        return n;
    }
    let tbn = mat3x3<f32>(normalize(input.tangent), normalize(input.bitangent), n);
    let sampled = textureSample(texture_normal1, material_sampler, input.tex_coords).xyz * 2.0 - 1.0;
    return normalize(tbn * sampled);
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let albedo = textureSample(texture_diffuse1, material_sampler, input.tex_coords);
    let spec_map = textureSample(texture_specular1, material_sampler, input.tex_coords).rgb;
    let normal = surface_normal(input);
    let view_dir = normalize(frame.viewer_pos.xyz - input.world_pos);

    var color = vec3<f32>(0.0);
    let count = min(frame.lights_num, MAX_LIGHTS);
    for (var i = 0u; i < count; i = i + 1u) {
        let light = frame.plight[i];
        let to_light = light.position.xyz - input.world_pos;
        let distance = length(to_light);
        let light_dir = to_light / max(distance, 0.0001);
        let k = light.attenuation.xyz;
        let attenuation = 1.0 / (k.x + k.y * distance + k.z * distance * distance);

        let diff = max(dot(normal, light_dir), 0.0);
        let reflect_dir = reflect(-light_dir, normal);
        let spec = pow(max(dot(view_dir, reflect_dir), 0.0), max(frame.shininess, 1.0));

        let ambient = light.ambient.rgb * albedo.rgb;
        let diffuse = light.diffuse.rgb * diff * albedo.rgb;
        let specular = light.specular.rgb * spec * spec_map;
        color = color + (ambient + diffuse + specular) * attenuation;
    }
    return vec4<f32>(color, albedo.a);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::light::{LightCaster, LightSet};

    #[test]
    fn frame_block_matches_wgsl_layout() {
        assert_eq!(std::mem::size_of::<GpuLight>(), 80);
        assert_eq!(std::mem::size_of::<FrameUniforms>(), 64 + 64 + 16 + 16 + 80 * MAX_LIGHTS);
        assert_eq!(std::mem::size_of::<InstanceUniform>(), 64 + 48 + 16);
    }

    #[test]
    fn builder_collects_lights_and_instances() {
        let lights = LightSet::try_from(vec![
            LightCaster::new().with_position(Vec3::new(1.0, 2.0, 3.0)),
            LightCaster::new().with_color(Vec3::new(0.0, 0.0, 1.0)),
        ])
        .unwrap();

        let mut builder = FrameBuilder::new();
        lights.upload(&mut builder);
        builder.set_float(Uniform::MaterialShininess, 16.0);
        builder.set_mat4(Uniform::Model, Mat4::from_translation(Vec3::X));
        builder.set_mat4(Uniform::Model, Mat4::IDENTITY);

        assert_eq!(builder.frame.lights_num, 2);
        assert_eq!(builder.frame.lights[0].position, [1.0, 2.0, 3.0, 0.0]);
        assert_eq!(builder.frame.lights[1].diffuse, [0.0, 0.0, 1.0, 0.0]);
        assert_eq!(builder.frame.shininess, 16.0);
        assert_eq!(builder.instances.len(), 2);
        assert_eq!(builder.instances[0].model[3], [1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn out_of_range_light_slot_is_ignored() {
        let mut builder = FrameBuilder::new();
        builder.set_vec3(Uniform::light(MAX_LIGHTS, LightField::Position), Vec3::ONE);
        builder.set_int(Uniform::CurrentLightsNum, 99);
        assert_eq!(builder.frame.lights_num, MAX_LIGHTS as u32);
        assert!(builder.frame.lights.iter().all(|light| light.position == [0.0; 4]));
    }
}

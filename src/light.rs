use glam::Vec3;
use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shader::{LightField, ShaderProgram, Uniform};

/// Size of the `plight` array declared by the shading program.
pub const MAX_LIGHTS: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LightError {
    #[error("scene already holds {MAX_LIGHTS} lights")]
    CapacityExceeded,
}

/// Point light with constant/linear/quadratic attenuation and Phong terms.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LightCaster {
    pub position: Vec3,
    pub attenuation: Vec3,
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
}

impl LightCaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn with_attenuation(mut self, attenuation: Vec3) -> Self {
        self.attenuation = attenuation;
        self
    }

    pub fn with_ambient(mut self, ambient: Vec3) -> Self {
        self.ambient = ambient;
        self
    }

    pub fn with_diffuse(mut self, diffuse: Vec3) -> Self {
        self.diffuse = diffuse;
        self
    }

    pub fn with_specular(mut self, specular: Vec3) -> Self {
        self.specular = specular;
        self
    }

    /// Sets ambient, diffuse and specular to the same colour.
    pub fn with_color(self, color: Vec3) -> Self {
        self.with_ambient(color).with_diffuse(color).with_specular(color)
    }

    pub fn field(&self, field: LightField) -> Vec3 {
        match field {
            LightField::Position => self.position,
            LightField::Attenuation => self.attenuation,
            LightField::Ambient => self.ambient,
            LightField::Diffuse => self.diffuse,
            LightField::Specular => self.specular,
        }
    }

    /// Writes this light into slot `index` of the `plight` array.
    pub fn upload(&self, shader: &mut dyn ShaderProgram, index: usize) {
        for field in LightField::ALL {
            shader.set_vec3(Uniform::light(index, field), self.field(field));
        }
    }
}

/// Ordered set of lights. A light's index in the set is its shader slot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LightSet {
    lights: Vec<LightCaster>,
}

impl LightSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a light and returns its slot index.
    pub fn push(&mut self, light: LightCaster) -> Result<usize, LightError> {
        if self.lights.len() >= MAX_LIGHTS {
            return Err(LightError::CapacityExceeded);
        }
        self.lights.push(light);
        Ok(self.lights.len() - 1)
    }

    pub fn get(&self, index: usize) -> Option<&LightCaster> {
        self.lights.get(index)
    }

    pub fn remove(&mut self, index: usize) -> Option<LightCaster> {
        (index < self.lights.len()).then(|| self.lights.remove(index))
    }

    pub fn len(&self) -> usize {
        self.lights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LightCaster> {
        self.lights.iter()
    }

    /// Uploads every light, then the light count, once.
    pub fn upload(&self, shader: &mut dyn ShaderProgram) {
        for (index, light) in self.lights.iter().enumerate() {
            light.upload(shader, index);
        }
        shader.set_int(Uniform::CurrentLightsNum, self.lights.len() as i32);
    }
}

impl TryFrom<Vec<LightCaster>> for LightSet {
    type Error = LightError;

    fn try_from(lights: Vec<LightCaster>) -> Result<Self, Self::Error> {
        let mut set = LightSet::new();
        for light in lights {
            set.push(light)?;
        }
        Ok(set)
    }
}

/// Collects up to [`MAX_LIGHTS`] lights; the rest are dropped with a warning.
impl FromIterator<LightCaster> for LightSet {
    fn from_iter<I: IntoIterator<Item = LightCaster>>(lights: I) -> Self {
        let mut set = LightSet::new();
        let mut dropped = 0;
        for light in lights {
            if set.push(light).is_err() {
                dropped += 1;
            }
        }
        if dropped > 0 {
            warn!("ignoring {dropped} light(s) beyond the limit of {MAX_LIGHTS}");
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::{UniformRecorder, UniformValue};

    fn yellow() -> LightCaster {
        LightCaster::new()
            .with_position(Vec3::new(1.2, 1.0, 2.0))
            .with_attenuation(Vec3::new(1.0, 0.3, 0.032))
            .with_color(Vec3::new(1.0, 1.0, 0.0))
    }

    #[test]
    fn single_light_writes_its_fields_only() {
        let mut recorder = UniformRecorder::new();
        yellow().upload(&mut recorder, 3);
        assert_eq!(
            recorder.names(),
            vec![
                "plight[3].position",
                "plight[3].attenuation",
                "plight[3].ambient",
                "plight[3].diffuse",
                "plight[3].specular",
            ]
        );
        assert_eq!(recorder.count("current_lights_num"), 0);
    }

    #[test]
    fn set_upload_broadcasts_count_once_at_the_end() {
        let mut lights = LightSet::new();
        lights.push(yellow()).unwrap();
        lights
            .push(yellow().with_color(Vec3::new(0.0, 0.0, 1.0)))
            .unwrap();

        let mut recorder = UniformRecorder::new();
        lights.upload(&mut recorder);

        assert_eq!(recorder.count("current_lights_num"), 1);
        let (last, value) = recorder.writes().last().unwrap();
        assert_eq!(*last, Uniform::CurrentLightsNum);
        assert_eq!(*value, UniformValue::Int(2));
        assert_eq!(
            recorder.last("plight[1].diffuse"),
            Some(UniformValue::Vec3(Vec3::new(0.0, 0.0, 1.0)))
        );
    }

    #[test]
    fn capacity_is_enforced() {
        let mut lights = LightSet::new();
        for _ in 0..MAX_LIGHTS {
            lights.push(LightCaster::new()).unwrap();
        }
        assert_eq!(
            lights.push(LightCaster::new()),
            Err(LightError::CapacityExceeded)
        );
        assert_eq!(lights.len(), MAX_LIGHTS);
    }

    #[test]
    fn collecting_keeps_the_first_lights_up_to_capacity() {
        let lights: LightSet = (0..MAX_LIGHTS + 3)
            .map(|i| LightCaster::new().with_position(Vec3::splat(i as f32)))
            .collect();
        assert_eq!(lights.len(), MAX_LIGHTS);
        let positions: Vec<f32> = lights.iter().map(|light| light.position.x).collect();
        assert_eq!(positions, (0..MAX_LIGHTS).map(|i| i as f32).collect::<Vec<_>>());
    }

    #[test]
    fn removing_a_light_updates_the_count() {
        let mut lights = LightSet::try_from(vec![yellow(), yellow()]).unwrap();
        assert!(lights.remove(5).is_none());
        assert!(lights.remove(0).is_some());

        let mut recorder = UniformRecorder::new();
        lights.upload(&mut recorder);
        assert_eq!(
            recorder.last("current_lights_num"),
            Some(UniformValue::Int(1))
        );
    }
}

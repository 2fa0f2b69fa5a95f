//! Building blocks for a small real-time model viewer.
//!
//! Everything except [`render`] is independent of the GPU: models load
//! through the [`SceneImporter`] and [`TextureUploader`] seams and frames are
//! described as writes to a [`ShaderProgram`], so the whole pipeline can be
//! exercised headless.

pub mod app;
pub mod camera;
pub mod import;
pub mod input;
pub mod light;
pub mod mesh;
pub mod model;
pub mod render;
pub mod scene;
pub mod shader;
pub mod texture;

pub use camera::{Camera, CameraError, Movement};
pub use import::{ImportError, ImportedScene, ObjImporter, SceneImporter};
pub use input::{Action, InputState, KeyBindings, KeyCode, NamedKey};
pub use light::{LightCaster, LightError, LightSet, MAX_LIGHTS};
pub use mesh::{Mesh, Texture, TextureKind, Vertex};
pub use model::{Model, ModelError};
pub use scene::{Instance, SceneDescription, SceneError};
pub use shader::{ShaderProgram, Uniform, UniformRecorder, UniformValue};
pub use texture::{DecodeOnlyUploader, TextureCache, TextureError, TextureHandle, TextureUploader};

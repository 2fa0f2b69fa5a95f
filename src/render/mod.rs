mod native;
mod shared;

pub use native::{Renderer, TextureStore};
pub use shared::{FrameBuilder, FrameUniforms, GpuLight, InstanceUniform, MaterialUniform};

use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};

use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbaImage};
use log::{debug, error};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::mesh::{Texture, TextureKind};

/// Opaque identifier of an uploaded texture. Zero is reserved for the
/// backend's default texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TextureHandle(pub u32);

impl TextureHandle {
    pub const DEFAULT: Self = Self(0);
}

#[derive(Debug, Error)]
pub enum TextureError {
    #[error("failed to decode image {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("image {path} has {channels} channel(s); only 1, 3 or 4 are supported")]
    UnsupportedChannels { path: PathBuf, channels: u8 },
    #[error("image {path} is {width}x{height}; the device accepts at most {max}x{max}")]
    TooLarge {
        path: PathBuf,
        width: u32,
        height: u32,
        max: u32,
    },
}

/// Decoded image, expanded to RGBA8 for upload.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    /// Channel count of the source file.
    pub channels: u8,
    pub rgba: Vec<u8>,
}

impl DecodedImage {
    /// Rejects images wider or taller than `max_dimension` texels.
    pub fn ensure_fits(&self, path: &Path, max_dimension: u32) -> Result<(), TextureError> {
        if self.width.max(self.height) > max_dimension {
            return Err(TextureError::TooLarge {
                path: path.to_path_buf(),
                width: self.width,
                height: self.height,
                max: max_dimension,
            });
        }
        Ok(())
    }

    /// Full mip chain down to 1x1, each level box-filtered from the previous
    /// one. Levels are stored back to back starting with the base image.
    pub fn mip_chain(&self) -> MipChain {
        let Some(base) = RgbaImage::from_raw(self.width, self.height, self.rgba.clone()) else {
            return MipChain {
                levels: 1,
                data: self.rgba.clone(),
            };
        };
        let levels = mip_level_count(self.width, self.height);
        let mut data = base.as_raw().clone();
        let mut previous = base;
        for level in 1..levels {
            let width = (self.width >> level).max(1);
            let height = (self.height >> level).max(1);
            let next = imageops::resize(&previous, width, height, FilterType::Triangle);
            data.extend_from_slice(next.as_raw());
            previous = next;
        }
        MipChain { levels, data }
    }
}

/// RGBA8 texels of every mip level, largest first.
#[derive(Debug, Clone)]
pub struct MipChain {
    pub levels: u32,
    pub data: Vec<u8>,
}

/// Number of levels needed to reach 1x1 from a `width` x `height` image.
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

/// Reads an image file and validates its channel layout.
pub fn decode_image(path: &Path) -> Result<DecodedImage, TextureError> {
    let image = image::open(path).map_err(|source| TextureError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    decode_dynamic(path, image)
}

fn decode_dynamic(path: &Path, image: DynamicImage) -> Result<DecodedImage, TextureError> {
    let channels = image.color().channel_count();
    if !matches!(channels, 1 | 3 | 4) {
        return Err(TextureError::UnsupportedChannels {
            path: path.to_path_buf(),
            channels,
        });
    }
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(DecodedImage {
        width,
        height,
        channels,
        rgba: rgba.into_raw(),
    })
}

/// Turns an image file into a texture handle owned by some backend.
pub trait TextureUploader {
    fn upload(&mut self, path: &Path) -> Result<TextureHandle, TextureError>;
}

/// Summary of an image decoded by [`DecodeOnlyUploader`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedRecord {
    pub handle: TextureHandle,
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub channels: u8,
}

/// Uploader that decodes images without touching a GPU. Used for headless
/// runs where only the loading pipeline is exercised.
#[derive(Debug, Default)]
pub struct DecodeOnlyUploader {
    records: Vec<DecodedRecord>,
}

impl DecodeOnlyUploader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[DecodedRecord] {
        &self.records
    }
}

impl TextureUploader for DecodeOnlyUploader {
    fn upload(&mut self, path: &Path) -> Result<TextureHandle, TextureError> {
        let image = decode_image(path)?;
        let handle = TextureHandle(self.records.len() as u32 + 1);
        self.records.push(DecodedRecord {
            handle,
            path: path.to_path_buf(),
            width: image.width,
            height: image.height,
            channels: image.channels,
        });
        Ok(handle)
    }
}

/// Result of consulting a [`TextureCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLookup {
    Hit(TextureHandle),
    /// An earlier upload of this path failed.
    Failed,
    Miss,
}

/// Path-keyed cache that keeps a model from uploading the same image twice.
#[derive(Debug, Default)]
pub struct TextureCache {
    entries: HashMap<String, TextureHandle>,
    failed: HashSet<String>,
    hits: usize,
    misses: usize,
}

impl TextureCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&mut self, path: &str) -> CacheLookup {
        let key = normalize_key(path);
        if let Some(handle) = self.entries.get(&key) {
            self.hits += 1;
            return CacheLookup::Hit(*handle);
        }
        if self.failed.contains(&key) {
            return CacheLookup::Failed;
        }
        self.misses += 1;
        CacheLookup::Miss
    }

    pub fn insert(&mut self, path: &str, handle: TextureHandle) {
        self.entries.insert(normalize_key(path), handle);
    }

    pub fn mark_failed(&mut self, path: &str) {
        self.failed.insert(normalize_key(path));
    }

    /// Resolves a material texture reference relative to `directory`,
    /// uploading it on first use.
    pub fn load(
        &mut self,
        path: &str,
        kind: TextureKind,
        directory: &Path,
        uploader: &mut dyn TextureUploader,
    ) -> Option<Texture> {
        let handle = match self.lookup(path) {
            CacheLookup::Hit(handle) => handle,
            CacheLookup::Failed => return None,
            CacheLookup::Miss => {
                let file = directory.join(normalize_key(path));
                match uploader.upload(&file) {
                    Ok(handle) => {
                        debug!("loaded {kind:?} texture {}", file.display());
                        self.insert(path, handle);
                        handle
                    }
                    Err(err) => {
                        error!("failed to load texture: {err}");
                        self.mark_failed(path);
                        return None;
                    }
                }
            }
        };
        Some(Texture {
            handle,
            kind,
            path: path.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }

    pub fn failed(&self) -> usize {
        self.failed.len()
    }
}

/// Cache key for a texture reference: trimmed, forward slashes, no `.`
/// components.
pub fn normalize_key(path: &str) -> String {
    let unified = path.trim().replace('\\', "/");
    let parts: Vec<String> = Path::new(&unified)
        .components()
        .filter(|component| !matches!(component, Component::CurDir))
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect();
    let joined = parts.join("/");
    if unified.starts_with('/') {
        format!("/{}", joined.trim_start_matches('/'))
    } else {
        joined
    }
}

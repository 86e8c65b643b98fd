//! Texture handles and texture creation utilities.
//!
//! This module provides [`Texture`], a decoded RGBA image tagged with a
//! process-unique id and a bind target. The graphics binding uploads the pixels
//! the first time the handle is bound; material groups only ever compare and
//! hash the id and target.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use anyhow::*;
use image::{GenericImageView, ImageFormat, load_from_memory_with_format};

/// Bind target of a texture.
pub type TextureTarget = wgpu::TextureViewDimension;

static NEXT_TEXTURE_ID: AtomicU64 = AtomicU64::new(1);

/// A texture that a textured material group binds to unit 0.
///
/// Cloning is cheap: the pixel data is shared and the id stays the same, so a
/// clone still refers to the same GPU texture.
#[derive(Clone, Debug)]
pub struct Texture {
    id: u64,
    target: TextureTarget,
    pub label: String,
    pub pixels: Arc<image::RgbaImage>,
}

impl Texture {
    /// Load a texture from raw byte data (image file contents).
    ///
    /// # Arguments
    ///
    /// * `bytes` represent raw image file data (PNG, JPEG, etc.)
    /// * `label` is used as a debug name and usually is the file name
    /// * `format` is an optional file extension hint (e.g., "png"). If None, auto-detect.
    pub fn from_bytes(bytes: &[u8], label: &str, format: Option<&str>) -> Result<Self> {
        let img = match format.and_then(ImageFormat::from_extension) {
            None => image::load_from_memory(bytes)?,
            Some(fmt) => load_from_memory_with_format(bytes, fmt)?,
        };
        Ok(Self::from_image(&img, label))
    }

    pub fn from_image(img: &image::DynamicImage, label: &str) -> Self {
        let (width, height) = img.dimensions();
        log::debug!("texture {label}: {width}x{height}");
        Self {
            id: NEXT_TEXTURE_ID.fetch_add(1, Ordering::Relaxed),
            target: wgpu::TextureViewDimension::D2,
            label: label.to_string(),
            pixels: Arc::new(img.to_rgba8()),
        }
    }

    /// A `width` x `height` texture filled with one colour.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4], label: &str) -> Self {
        let img = image::RgbaImage::from_pixel(width.max(1), height.max(1), image::Rgba(rgba));
        Self::from_image(&image::DynamicImage::ImageRgba8(img), label)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn target(&self) -> TextureTarget {
        self.target
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    /// Size and format of the GPU texture that backs this handle.
    pub fn descriptor(&self) -> wgpu::TextureDescriptor<'_> {
        let (width, height) = self.dimensions();
        wgpu::TextureDescriptor {
            label: Some(&self.label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        }
    }
}

impl PartialEq for Texture {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.target == other.target
    }
}

impl Eq for Texture {}

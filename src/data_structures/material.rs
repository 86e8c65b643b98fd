//! Surface appearance shared by the parts of a model.

use cgmath::Vector4;

/// Flat per-part material state.
///
/// A `Material` is immutable once a decoder has built it. Every
/// [`MaterialGroup`](crate::data_structures::group::MaterialGroup) that draws a
/// part with the same appearance holds the same `Arc<Material>`, which is also
/// what `GroupPolicy::Merge` uses as the material identity.
#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub name: String,
    pub diffuse: Vector4<f32>,
    pub ambient: Vector4<f32>,
    pub specular: Vector4<f32>,
    pub emission: Vector4<f32>,
    pub shininess: f32,
    pub texture_name: Option<String>,
}

impl Material {
    pub fn new(
        name: impl Into<String>,
        diffuse: Vector4<f32>,
        ambient: Vector4<f32>,
        specular: Vector4<f32>,
        emission: Vector4<f32>,
        shininess: f32,
        texture_name: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            diffuse,
            ambient,
            specular,
            emission,
            shininess,
            texture_name,
        }
    }

    /// Diffuse colour as a plain array, the layout vertex colours use.
    pub fn diffuse_rgba(&self) -> [f32; 4] {
        self.diffuse.into()
    }
}

impl Default for Material {
    /// The stock grey material assigned to parts whose file names none.
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            diffuse: Vector4::new(0.8, 0.8, 0.8, 1.0),
            ambient: Vector4::new(0.2, 0.2, 0.2, 1.0),
            specular: Vector4::new(0.0, 0.0, 0.0, 1.0),
            emission: Vector4::new(0.0, 0.0, 0.0, 1.0),
            shininess: 20.0,
            texture_name: None,
        }
    }
}

/// Widen an RGB triple to RGBA with the given alpha.
pub(crate) fn rgba(rgb: [f32; 3], alpha: f32) -> Vector4<f32> {
    Vector4::new(rgb[0], rgb[1], rgb[2], alpha)
}

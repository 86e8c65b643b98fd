//! Wavefront OBJ decoder.
//!
//! Meshes are triangulated and re-indexed so positions, normals and texture
//! coordinates share one index buffer. `.mtl` libraries and diffuse textures
//! are looked up next to the model file.

use std::{
    collections::HashMap,
    fs::File,
    io::{BufReader, Cursor},
    path::Path,
    sync::Arc,
};

use cgmath::Vector4;

use crate::{
    codecs::{ModelDecodeError, ModelDecoder, ModelStream},
    data_structures::{
        group::GroupPolicy,
        material::{Material, rgba},
        model::{Model, ModelPart},
        texture::Texture,
        vertex::{ModelVertex, VertexData},
    },
    graphics::batch::SharedBatch,
    resources::{base_dir, texture::load_texture},
};

#[derive(Clone, Debug, Default)]
pub struct ObjDecoder {
    policy: GroupPolicy,
}

impl ObjDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(self, policy: GroupPolicy) -> Self {
        Self { policy }
    }
}

impl ModelDecoder for ObjDecoder {
    fn name(&self) -> &str {
        "obj"
    }

    fn get_file_extensions(&self) -> Vec<String> {
        vec![".obj".to_string()]
    }

    fn decode(
        &self,
        stream: &mut dyn ModelStream,
        filename: &str,
        batch: Option<SharedBatch>,
    ) -> Result<Model, ModelDecodeError> {
        let mut text = String::new();
        stream
            .read_to_string(&mut text)
            .map_err(|e| ModelDecodeError::new(format!("{filename} is not an OBJ text file: {e}")))?;

        let base = base_dir(filename);
        let mut reader = BufReader::new(Cursor::new(text.as_bytes()));
        let (models, obj_materials) = tobj::load_obj_buf(
            &mut reader,
            &tobj::LoadOptions {
                triangulate: true,
                single_index: true,
                ..Default::default()
            },
            |p| load_mtl(base, p),
        )
        .map_err(|e| ModelDecodeError::malformed(format!("{filename}: invalid OBJ data: {e}")))?;

        if models.iter().all(|m| m.mesh.indices.is_empty()) {
            return Err(ModelDecodeError::new(format!(
                "{filename} contains no OBJ faces"
            )));
        }

        let obj_materials = obj_materials.unwrap_or_else(|e| {
            log::warn!("Materials of {filename} could not be loaded ({e}), using defaults.");
            Vec::new()
        });
        let materials: Vec<(Arc<Material>, Option<Texture>)> = obj_materials
            .iter()
            .map(|m| convert_material(m, base))
            .collect();
        let fallback = (Arc::new(Material::default()), None);

        let parts = models
            .iter()
            .filter(|m| !m.mesh.indices.is_empty())
            .map(|m| {
                let (material, texture) = m
                    .mesh
                    .material_id
                    .and_then(|id| materials.get(id))
                    .unwrap_or(&fallback)
                    .clone();
                let data = vertex_data(&m.mesh, &material);
                ModelPart {
                    material,
                    texture,
                    data,
                }
            })
            .collect::<Vec<_>>();

        log::debug!("{filename}: {} OBJ parts, {} materials", parts.len(), materials.len());
        Ok(Model::from_parts(parts, batch, self.policy))
    }
}

fn load_mtl(base: &Path, path: &Path) -> tobj::MTLLoadResult {
    let full = base.join(path);
    match File::open(&full) {
        Ok(file) => tobj::load_mtl_buf(&mut BufReader::new(file)),
        Err(e) => {
            log::warn!("Material library {} not found: {e}", full.display());
            Err(tobj::LoadError::OpenFileFailed)
        }
    }
}

/// Parse a whitespace separated colour parameter such as `Ke 1 0.5 0`.
fn color_param(params: &HashMap<String, String>, key: &str) -> Option<[f32; 3]> {
    let values: Vec<f32> = params
        .get(key)?
        .split_whitespace()
        .map(str::parse)
        .collect::<Result<_, _>>()
        .ok()?;
    match values[..] {
        [r, g, b] => Some([r, g, b]),
        _ => None,
    }
}

fn convert_material(m: &tobj::Material, base: &Path) -> (Arc<Material>, Option<Texture>) {
    let default = Material::default();
    let alpha = m.dissolve.unwrap_or(1.0);
    let params: HashMap<String, String> = m
        .unknown_param
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let material = Material {
        name: m.name.clone(),
        diffuse: m.diffuse.map_or(default.diffuse, |c| rgba(c, alpha)),
        ambient: m.ambient.map_or(default.ambient, |c| rgba(c, 1.0)),
        specular: m.specular.map_or(default.specular, |c| rgba(c, 1.0)),
        emission: color_param(&params, "Ke").map_or(default.emission, |c| rgba(c, 1.0)),
        shininess: m.shininess.unwrap_or(default.shininess),
        texture_name: m.diffuse_texture.clone(),
    };

    let texture = material.texture_name.as_deref().and_then(|name| {
        match load_texture(&base.join(name)) {
            Ok(texture) => Some(texture),
            Err(e) => {
                log::warn!(
                    "Texture {name} of material {} could not be loaded ({e:#}), drawing it untextured.",
                    m.name
                );
                None
            }
        }
    });
    (Arc::new(material), texture)
}

/// OBJ files keep colours per material; per-vertex colours win when present.
fn vertex_data(mesh: &tobj::Mesh, material: &Material) -> VertexData {
    let diffuse: Vector4<f32> = material.diffuse;
    let vertices = (0..mesh.positions.len() / 3)
        .map(|i| ModelVertex {
            position: [
                mesh.positions[i * 3],
                mesh.positions[i * 3 + 1],
                mesh.positions[i * 3 + 2],
            ],
            normal: [
                mesh.normals.get(i * 3).map_or(0.0, |f| *f),
                mesh.normals.get(i * 3 + 1).map_or(0.0, |f| *f),
                mesh.normals.get(i * 3 + 2).map_or(0.0, |f| *f),
            ],
            // wgpu samples with v pointing down
            tex_coords: [
                mesh.texcoords.get(i * 2).map_or(0.0, |f| *f),
                1.0 - mesh.texcoords.get(i * 2 + 1).map_or(0.0, |f| *f),
            ],
            color: match mesh.vertex_color.get(i * 3..i * 3 + 3) {
                Some(&[r, g, b]) => [r, g, b, diffuse.w],
                _ => diffuse.into(),
            },
        })
        .collect::<Vec<_>>();

    VertexData::indexed(vertices, mesh.indices.clone())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::data_structures::group::MaterialKind;

    const TRIANGLE: &str = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 1\nf 1//1 2//1 3//1\n";

    fn decode(text: &str, filename: &str) -> Result<Model, ModelDecodeError> {
        let mut stream = Cursor::new(text.as_bytes().to_vec());
        ObjDecoder::new().decode(&mut stream, filename, None)
    }

    #[test]
    fn decodes_a_single_triangle() {
        let model = decode(TRIANGLE, "triangle.obj").unwrap();
        assert_eq!(model.len(), 1);
        assert_eq!(model.groups().len(), model.vertex_lists().len());
        assert_eq!(model.vertex_lists()[0].count(), 3);
        assert!(matches!(model.groups()[0].kind(), MaterialKind::Untextured));
        assert_eq!(model.groups()[0].material().name, "default");
    }

    #[test]
    fn quads_are_triangulated() {
        let quad = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n";
        let model = decode(quad, "quad.obj").unwrap();
        assert_eq!(model.vertex_lists()[0].count(), 6);
    }

    #[test]
    fn text_without_faces_is_not_obj() {
        let err = decode("just some notes\n", "notes.obj").unwrap_err();
        assert_eq!(err.priority(), ModelDecodeError::DEFAULT_PRIORITY);
    }

    #[test]
    fn binary_input_is_not_obj() {
        let mut stream = Cursor::new(vec![0xff, 0xfe, 0x00, 0x81]);
        let err = ObjDecoder::new().decode(&mut stream, "blob.obj", None).unwrap_err();
        assert_eq!(err.priority(), ModelDecodeError::DEFAULT_PRIORITY);
    }

    #[test]
    fn broken_vertices_are_malformed() {
        let err = decode("v 0 zero 0\nf 1 1 1\n", "broken.obj").unwrap_err();
        assert_eq!(err.priority(), ModelDecodeError::FORMAT_PRIORITY);
    }

    #[test]
    fn colour_params_need_three_floats() {
        let mut params = HashMap::new();
        params.insert("Ke".to_string(), "0.5 0.25 1".to_string());
        params.insert("Bad".to_string(), "0.5 x".to_string());
        assert_eq!(color_param(&params, "Ke"), Some([0.5, 0.25, 1.0]));
        assert_eq!(color_param(&params, "Bad"), None);
        assert_eq!(color_param(&params, "Missing"), None);
    }
}

//! glTF 2.0 decoder for `.gltf` and `.glb` files.
//!
//! Buffers may be embedded in the GLB binary chunk, inlined as base64 data
//! URIs or stored next to the model file. Node transforms are baked into the
//! vertices, so every triangle primitive of the default scene (the first scene
//! when none is marked default) becomes one model part in model space.

use std::{path::Path, sync::Arc};

use base64::Engine;
use cgmath::{InnerSpace, Matrix, Matrix3, Matrix4, SquareMatrix, Vector3};

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
    resources::{base_dir, load_binary, texture::load_texture},
};

const GLB_MAGIC: &[u8] = b"glTF";

#[derive(Clone, Debug, Default)]
pub struct GltfDecoder {
    policy: GroupPolicy,
}

impl GltfDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(self, policy: GroupPolicy) -> Self {
        Self { policy }
    }
}

type PartMaterial = (Arc<Material>, Option<Texture>);

impl ModelDecoder for GltfDecoder {
    fn name(&self) -> &str {
        "gltf"
    }

    fn get_file_extensions(&self) -> Vec<String> {
        vec![".gltf".to_string(), ".glb".to_string()]
    }

    fn decode(
        &self,
        stream: &mut dyn ModelStream,
        filename: &str,
        batch: Option<SharedBatch>,
    ) -> Result<Model, ModelDecodeError> {
        let mut bytes = Vec::new();
        stream
            .read_to_end(&mut bytes)
            .map_err(|e| ModelDecodeError::new(format!("{filename} could not be read: {e}")))?;

        let gltf = ::gltf::Gltf::from_slice(&bytes).map_err(|e| {
            let message = format!("{filename} is not a valid glTF file: {e}");
            if looks_like_gltf(&bytes) {
                ModelDecodeError::malformed(message)
            } else {
                ModelDecodeError::new(message)
            }
        })?;

        let base = base_dir(filename);
        let buffers = load_buffers(&gltf, base)?;
        let materials: Vec<PartMaterial> = gltf
            .materials()
            .map(|m| convert_material(&m, &buffers, base))
            .collect();

        let mut parts = Vec::new();
        let scene = gltf.default_scene().or_else(|| gltf.scenes().next());
        for node in scene.iter().flat_map(|s| s.nodes()) {
            collect_parts(&node, Matrix4::identity(), &buffers, &materials, &mut parts);
        }
        if parts.is_empty() {
            return Err(ModelDecodeError::malformed(format!(
                "{filename} has no triangle meshes in its scene"
            )));
        }

        log::debug!("{filename}: {} glTF primitives, {} materials", parts.len(), materials.len());
        Ok(Model::from_parts(parts, batch, self.policy))
    }
}

/// GLB magic or a JSON document.
fn looks_like_gltf(bytes: &[u8]) -> bool {
    bytes.starts_with(GLB_MAGIC)
        || bytes
            .iter()
            .find(|b| !b.is_ascii_whitespace())
            .is_some_and(|b| *b == b'{')
}

/// Contents of a `data:` URI, `None` for any other URI.
fn decode_data_uri(uri: &str) -> Option<Result<Vec<u8>, String>> {
    let rest = uri.strip_prefix("data:")?;
    let decoded = match rest.split_once(',') {
        Some((header, payload)) if header.ends_with(";base64") => {
            base64::engine::general_purpose::STANDARD
                .decode(payload)
                .map_err(|e| format!("invalid base64 payload: {e}"))
        }
        Some(_) => Err("only base64 data URIs are supported".to_string()),
        None => Err("data URI without payload".to_string()),
    };
    Some(decoded)
}

fn read_uri(uri: &str, base: &Path) -> Result<Vec<u8>, String> {
    match decode_data_uri(uri) {
        Some(result) => result,
        None => load_binary(&base.join(uri)).map_err(|e| format!("{e:#}")),
    }
}

fn load_buffers(gltf: &::gltf::Gltf, base: &Path) -> Result<Vec<Vec<u8>>, ModelDecodeError> {
    gltf.buffers()
        .map(|buffer| {
            let data = match buffer.source() {
                ::gltf::buffer::Source::Bin => gltf.blob.clone().ok_or_else(|| {
                    ModelDecodeError::malformed("buffer refers to a missing GLB binary chunk")
                })?,
                ::gltf::buffer::Source::Uri(uri) => read_uri(uri, base).map_err(|e| {
                    ModelDecodeError::malformed(format!("buffer {} ({uri}): {e}", buffer.index()))
                })?,
            };
            if data.len() < buffer.length() {
                return Err(ModelDecodeError::malformed(format!(
                    "buffer {} holds {} bytes, {} expected",
                    buffer.index(),
                    data.len(),
                    buffer.length()
                )));
            }
            Ok(data)
        })
        .collect()
}

fn load_image(image: &::gltf::Image, buffers: &[Vec<u8>], base: &Path) -> anyhow::Result<Texture> {
    match image.source() {
        ::gltf::image::Source::View { view, mime_type } => {
            let data = buffers
                .get(view.buffer().index())
                .zip(view.offset().checked_add(view.length()))
                .and_then(|(b, end)| b.get(view.offset()..end))
                .ok_or_else(|| anyhow::anyhow!("image view {} is out of range", view.index()))?;
            let label = format!("image {}", image.index());
            Texture::from_bytes(data, &label, mime_type.split('/').next_back())
        }
        ::gltf::image::Source::Uri { uri, mime_type } => match decode_data_uri(uri) {
            Some(data) => {
                let data = data.map_err(anyhow::Error::msg)?;
                let label = format!("image {}", image.index());
                Texture::from_bytes(&data, &label, mime_type.and_then(|m| m.split('/').next_back()))
            }
            None => load_texture(&base.join(uri)),
        },
    }
}

fn convert_material(
    material: &::gltf::Material,
    buffers: &[Vec<u8>],
    base: &Path,
) -> PartMaterial {
    let pbr = material.pbr_metallic_roughness();
    let [r, g, b, a] = pbr.base_color_factor();
    let default = Material::default();
    let name = material
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("material {}", material.index().unwrap_or_default()));

    let image = pbr.base_color_texture().map(|info| info.texture().source());
    let texture = image.as_ref().and_then(|image| match load_image(image, buffers, base) {
        Ok(texture) => Some(texture),
        Err(e) => {
            log::warn!("Base colour texture of {name} could not be loaded ({e:#}), drawing it untextured.");
            None
        }
    });
    let material = Material {
        texture_name: image.map(|i| i.name().map_or_else(|| format!("image {}", i.index()), str::to_string)),
        diffuse: rgba([r, g, b], a),
        emission: rgba(material.emissive_factor(), 1.0),
        name,
        ..default
    };
    (Arc::new(material), texture)
}

fn collect_parts(
    node: &::gltf::Node,
    parent: Matrix4<f32>,
    buffers: &[Vec<u8>],
    materials: &[PartMaterial],
    parts: &mut Vec<ModelPart>,
) {
    let transform = parent * Matrix4::from(node.transform().matrix());
    if let Some(mesh) = node.mesh() {
        for primitive in mesh.primitives() {
            if primitive.mode() != ::gltf::mesh::Mode::Triangles {
                log::warn!(
                    "Skipping primitive {} of mesh {}: {:?} is not supported, only triangle lists are.",
                    primitive.index(),
                    mesh.index(),
                    primitive.mode()
                );
                continue;
            }
            let (material, texture) = match primitive.material().index().and_then(|i| materials.get(i)) {
                Some(found) => found.clone(),
                None => (Arc::new(Material::default()), None),
            };
            if let Some(data) = primitive_data(&primitive, transform, buffers, &material) {
                parts.push(ModelPart {
                    material,
                    texture,
                    data,
                });
            }
        }
    }
    for child in node.children() {
        collect_parts(&child, transform, buffers, materials, parts);
    }
}

fn primitive_data(
    primitive: &::gltf::Primitive,
    transform: Matrix4<f32>,
    buffers: &[Vec<u8>],
    material: &Material,
) -> Option<VertexData> {
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));
    let Some(positions) = reader.read_positions() else {
        log::warn!("Skipping primitive {} without positions.", primitive.index());
        return None;
    };

    let linear = Matrix3::from_cols(transform.x.truncate(), transform.y.truncate(), transform.z.truncate());
    let normal_matrix = linear.invert().map_or(linear, |inverse| inverse.transpose());

    let mut vertices: Vec<ModelVertex> = positions
        .map(|p| ModelVertex {
            position: (transform * Vector3::from(p).extend(1.0)).truncate().into(),
            color: material.diffuse_rgba(),
            ..Default::default()
        })
        .collect();

    if let Some(normals) = reader.read_normals() {
        for (vertex, normal) in vertices.iter_mut().zip(normals) {
            let n = normal_matrix * Vector3::from(normal);
            let n = if n.magnitude2() > 0.0 { n.normalize() } else { n };
            vertex.normal = n.into();
        }
    }
    if let Some(tex_coords) = reader.read_tex_coords(0).map(|t| t.into_f32()) {
        for (vertex, uv) in vertices.iter_mut().zip(tex_coords) {
            vertex.tex_coords = uv;
        }
    }
    if let Some(colors) = reader.read_colors(0).map(|c| c.into_rgba_f32()) {
        for (vertex, color) in vertices.iter_mut().zip(colors) {
            vertex.color = color;
        }
    }

    Some(match reader.read_indices() {
        Some(indices) => VertexData::indexed(vertices, indices.into_u32().collect()),
        None => VertexData::new(vertices),
    })
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn triangle_bytes() -> Vec<u8> {
        [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]
            .iter()
            .flatten()
            .flat_map(|f| f.to_le_bytes())
            .collect()
    }

    fn document(buffer: &str) -> String {
        format!(
            r#"{{
                "asset": {{"version": "2.0"}},
                "scene": 0,
                "scenes": [{{"nodes": [0]}}],
                "nodes": [{{"translation": [0, 0, 0], "children": [1]}}, {{"mesh": 0, "translation": [5, 0, 0]}}],
                "materials": [{{"name": "red", "pbrMetallicRoughness": {{"baseColorFactor": [1, 0, 0, 1]}}}}],
                "meshes": [{{"primitives": [{{"attributes": {{"POSITION": 0}}, "material": 0}}]}}],
                "buffers": [{buffer}],
                "bufferViews": [{{"buffer": 0, "byteLength": 36}}],
                "accessors": [{{
                    "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                    "min": [0, 0, 0], "max": [1, 1, 0]
                }}]
            }}"#
        )
    }

    fn embedded_gltf() -> Vec<u8> {
        let payload = base64::engine::general_purpose::STANDARD.encode(triangle_bytes());
        document(&format!(
            r#"{{"byteLength": 36, "uri": "data:application/octet-stream;base64,{payload}"}}"#
        ))
        .into_bytes()
    }

    fn glb() -> Vec<u8> {
        let mut json = document(r#"{"byteLength": 36}"#).into_bytes();
        while json.len() % 4 != 0 {
            json.push(b' ');
        }
        let bin = triangle_bytes();
        let total = 12 + 8 + json.len() + 8 + bin.len();

        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(GLB_MAGIC);
        out.extend_from_slice(&2u32.to_le_bytes());
        out.extend_from_slice(&(total as u32).to_le_bytes());
        out.extend_from_slice(&(json.len() as u32).to_le_bytes());
        out.extend_from_slice(b"JSON");
        out.extend_from_slice(&json);
        out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
        out.extend_from_slice(b"BIN\0");
        out.extend_from_slice(&bin);
        out
    }

    fn decode(bytes: Vec<u8>, filename: &str) -> Result<Model, ModelDecodeError> {
        GltfDecoder::new().decode(&mut Cursor::new(bytes), filename, None)
    }

    #[test]
    fn decodes_embedded_buffers() {
        let model = decode(embedded_gltf(), "triangle.gltf").unwrap();
        assert_eq!(model.len(), 1);
        assert_eq!(model.vertex_lists()[0].count(), 3);
        let material = model.groups()[0].material();
        assert_eq!(material.name, "red");
        assert_eq!(material.diffuse_rgba(), [1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn decodes_binary_gltf() {
        let model = decode(glb(), "triangle.glb").unwrap();
        assert_eq!(model.len(), 1);
        assert_eq!(model.vertex_lists()[0].count(), 3);
    }

    #[test]
    fn node_transforms_are_baked_into_positions() {
        let gltf = ::gltf::Gltf::from_slice(&embedded_gltf()).unwrap();
        let buffers = load_buffers(&gltf, Path::new("")).unwrap();
        let material = Material::default();
        let node = gltf.nodes().nth(1).unwrap();
        let primitive = node.mesh().unwrap().primitives().next().unwrap();
        let transform = Matrix4::from(node.transform().matrix());

        let data = primitive_data(&primitive, transform, &buffers, &material).unwrap();
        assert_eq!(data.vertices[0].position, [5.0, 0.0, 0.0]);
        assert_eq!(data.vertices[2].position, [5.0, 1.0, 0.0]);
        assert_eq!(data.vertices[1].color, material.diffuse_rgba());
    }

    #[test]
    fn foreign_bytes_are_not_gltf() {
        let err = decode(b"\x00\x01binary junk".to_vec(), "junk.glb").unwrap_err();
        assert_eq!(err.priority(), ModelDecodeError::DEFAULT_PRIORITY);
    }

    #[test]
    fn broken_json_is_malformed() {
        let err = decode(br#"{"asset": "#.to_vec(), "broken.gltf").unwrap_err();
        assert_eq!(err.priority(), ModelDecodeError::FORMAT_PRIORITY);
    }

    #[test]
    fn short_buffers_are_malformed() {
        let payload = base64::engine::general_purpose::STANDARD.encode([0u8; 8]);
        let doc = document(&format!(
            r#"{{"byteLength": 36, "uri": "data:application/octet-stream;base64,{payload}"}}"#
        ));
        let err = decode(doc.into_bytes(), "short.gltf").unwrap_err();
        assert_eq!(err.priority(), ModelDecodeError::FORMAT_PRIORITY);
    }

    #[test]
    fn only_the_default_scene_is_decoded() {
        let two_scenes = |default: u32| {
            String::from_utf8(embedded_gltf())
                .unwrap()
                .replace(r#""scene": 0,"#, &format!(r#""scene": {default},"#))
                .replace(
                    r#""scenes": [{"nodes": [0]}],"#,
                    r#""scenes": [{"nodes": []}, {"nodes": [0]}],"#,
                )
                .into_bytes()
        };
        let model = decode(two_scenes(1), "second.gltf").unwrap();
        assert_eq!(model.len(), 1);

        let err = decode(two_scenes(0), "first.gltf").unwrap_err();
        assert_eq!(err.priority(), ModelDecodeError::FORMAT_PRIORITY);
    }

    #[test]
    fn image_views_past_the_end_are_rejected() {
        let mut doc = String::from_utf8(embedded_gltf()).unwrap();
        let views = r#""bufferViews": [{"buffer": 0, "byteLength": 36}],"#;
        assert!(doc.contains(views));
        doc = doc.replace(
            views,
            &format!(
                r#""bufferViews": [{{"buffer": 0, "byteLength": 36}}, {{"buffer": 0, "byteOffset": {}, "byteLength": 4}}],
                "images": [{{"bufferView": 1, "mimeType": "image/png"}}],
                "textures": [{{"source": 0}}],"#,
                usize::MAX - 1
            ),
        );
        let gltf = ::gltf::Gltf::from_slice(doc.as_bytes()).unwrap();
        let buffers = load_buffers(&gltf, Path::new("")).unwrap();
        let image = gltf.images().next().unwrap();

        let err = load_image(&image, &buffers, Path::new("")).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn data_uris() {
        assert_eq!(decode_data_uri("data:text/plain;base64,aGk="), Some(Ok(b"hi".to_vec())));
        assert!(matches!(decode_data_uri("data:text/plain,hi"), Some(Err(_))));
        assert_eq!(decode_data_uri("mesh.bin"), None);
    }
}

#![allow(dead_code)]

use std::{
    cell::Cell,
    io::{Cursor, Read, Seek, SeekFrom},
    path::{Path, PathBuf},
    rc::Rc,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use flow_model::{
    GroupPolicy, Model, ModelDecodeError, ModelDecoder, SharedBatch,
    codecs::ModelStream,
    data_structures::{
        material::Material,
        model::ModelPart,
        vertex::{ModelVertex, VertexData},
    },
};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub const TRIANGLE_OBJ: &str = "\
mtllib scene.mtl
o red_triangle
v 0 0 0
v 1 0 0
v 0 1 0
vt 0 0
vt 1 0
vt 0 1
vn 0 0 1
usemtl red
f 1/1/1 2/2/1 3/3/1
o textured_quad
v 0 0 1
v 1 0 1
v 1 1 1
v 0 1 1
usemtl wood
f 4/1/1 5/2/1 6/3/1 7/1/1
";

pub const SCENE_MTL: &str = "\
newmtl red
Kd 1 0 0
Ka 0.1 0 0
Ke 0.5 0 0
Ns 8
d 0.5

newmtl wood
Kd 1 1 1
map_Kd wood.png
";

/// An OBJ file with two parts next to its `.mtl` library and texture.
pub fn write_obj_fixture(dir: &Path) -> PathBuf {
    let obj = dir.join("scene.obj");
    std::fs::write(&obj, TRIANGLE_OBJ).unwrap();
    std::fs::write(dir.join("scene.mtl"), SCENE_MTL).unwrap();
    image::RgbaImage::from_pixel(2, 2, image::Rgba([120, 80, 40, 255]))
        .save(dir.join("wood.png"))
        .unwrap();
    obj
}

/// What a [`Scripted`] decoder does when asked to decode.
#[derive(Clone, Debug)]
pub enum Outcome {
    Fail(u32),
    Succeed,
}

/// Decoder with a fixed outcome that records how it was called.
///
/// Every call notes the stream offset it started at and then consumes a few
/// bytes, so a missing rewind shows up in the next decoder's offset.
#[derive(Clone, Debug)]
pub struct Scripted {
    pub name: String,
    pub extensions: Vec<String>,
    pub outcome: Outcome,
    pub calls: Arc<AtomicUsize>,
    pub start_offsets: Arc<Mutex<Vec<u64>>>,
}

impl Scripted {
    pub fn new(name: &str, extension: &str, outcome: Outcome) -> Self {
        Self {
            name: name.to_string(),
            extensions: vec![extension.to_string()],
            outcome,
            calls: Arc::new(AtomicUsize::new(0)),
            start_offsets: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn start_offsets(&self) -> Vec<u64> {
        self.start_offsets.lock().unwrap().clone()
    }
}

impl ModelDecoder for Scripted {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_file_extensions(&self) -> Vec<String> {
        self.extensions.clone()
    }

    fn decode(
        &self,
        stream: &mut dyn ModelStream,
        _filename: &str,
        batch: Option<SharedBatch>,
    ) -> Result<Model, ModelDecodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let offset = stream.stream_position().unwrap();
        self.start_offsets.lock().unwrap().push(offset);
        let mut head = [0u8; 4];
        let _ = stream.read(&mut head).unwrap();

        match self.outcome {
            Outcome::Fail(priority) => Err(ModelDecodeError::with_priority(
                format!("{} failed", self.name),
                priority,
            )),
            Outcome::Succeed => Ok(triangle_model(batch)),
        }
    }
}

pub fn triangle_part(material: &Arc<Material>) -> ModelPart {
    ModelPart {
        material: material.clone(),
        texture: None,
        data: VertexData::new(vec![ModelVertex::default(); 3]),
    }
}

pub fn triangle_model(batch: Option<SharedBatch>) -> Model {
    let material = Arc::new(Material::default());
    Model::from_parts(vec![triangle_part(&material)], batch, GroupPolicy::Isolated)
}

/// Seekable stream that counts how often it is dropped.
pub struct DropCounting {
    inner: Cursor<Vec<u8>>,
    drops: Rc<Cell<usize>>,
}

impl DropCounting {
    pub fn new(bytes: &[u8]) -> (Self, Rc<Cell<usize>>) {
        let drops = Rc::new(Cell::new(0));
        let stream = Self {
            inner: Cursor::new(bytes.to_vec()),
            drops: drops.clone(),
        };
        (stream, drops)
    }
}

impl Read for DropCounting {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Seek for DropCounting {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.inner.seek(pos)
    }
}

impl Drop for DropCounting {
    fn drop(&mut self) {
        self.drops.set(self.drops.get() + 1);
    }
}

/// A stream that can only be read front to back.
pub struct ReadOnly(pub Cursor<Vec<u8>>);

impl Read for ReadOnly {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.0.read(buf)
    }
}

//! Model codecs and the registry that maps file extensions to them.
//!
//! A decoder claims a set of file extensions and turns a byte stream into a
//! [`Model`]. Several decoders may claim the same extension; the registry keeps
//! them most-recently-registered first, so application code can put its own
//! decoder in front of a built-in one without removing it.
//!
//! The process-wide registry behind [`add_decoders`], [`get_decoders`] and
//! friends is created with the built-in codecs on first access. Registration is
//! meant to happen during setup, before models are loaded from several places.
//! A [`CodecRegistry`] can also be used on its own through
//! [`CodecRegistry::load`].

pub mod gltf;
pub mod obj;

use std::{
    collections::HashMap,
    fmt,
    io::{Read, Seek, Write},
    path::Path,
    sync::{Arc, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use thiserror::Error;

use crate::{data_structures::model::Model, graphics::batch::SharedBatch};

/// A rewindable byte source handed to decoders.
pub trait ModelStream: Read + Seek {}

impl<T: Read + Seek + ?Sized> ModelStream for T {}

/// Recoverable rejection of a stream by one decoder.
///
/// When every candidate decoder fails, the failure with the highest priority
/// is reported. Decoders use [`DEFAULT_PRIORITY`](Self::DEFAULT_PRIORITY) for
/// "this is not my format" and [`FORMAT_PRIORITY`](Self::FORMAT_PRIORITY) for
/// "this is my format, but it is broken".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ModelDecodeError {
    message: String,
    priority: u32,
}

impl ModelDecodeError {
    pub const DEFAULT_PRIORITY: u32 = 10;
    pub const FORMAT_PRIORITY: u32 = 20;

    pub fn new(message: impl Into<String>) -> Self {
        Self::with_priority(message, Self::DEFAULT_PRIORITY)
    }

    /// The stream is in the decoder's format but could not be decoded.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::with_priority(message, Self::FORMAT_PRIORITY)
    }

    pub fn with_priority(message: impl Into<String>, priority: u32) -> Self {
        Self {
            message: message.into(),
            priority,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn priority(&self) -> u32 {
        self.priority
    }
}

#[derive(Debug, Error)]
pub enum ModelEncodeError {
    #[error("{0}")]
    Unsupported(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub trait ModelDecoder: Send + Sync {
    /// Short name used in log output.
    fn name(&self) -> &str;

    /// Extensions this decoder reads, e.g. `".obj"`.
    fn get_file_extensions(&self) -> Vec<String>;

    /// Decode a model from `stream`.
    ///
    /// `filename` is informational and used to resolve companion files. The
    /// vertex lists go into `batch`, or into a private batch when it is `None`.
    /// Implementations should only touch the batch once decoding can no longer
    /// fail.
    fn decode(
        &self,
        stream: &mut dyn ModelStream,
        filename: &str,
        batch: Option<SharedBatch>,
    ) -> Result<Model, ModelDecodeError>;
}

pub trait ModelEncoder: Send + Sync {
    fn name(&self) -> &str;

    fn get_file_extensions(&self) -> Vec<String>;

    fn encode(
        &self,
        model: &Model,
        filename: &str,
        stream: &mut dyn Write,
    ) -> Result<(), ModelEncodeError>;
}

/// Lower-case extension with a leading dot.
fn normalize_extension(extension: &str) -> String {
    format!(".{}", extension.trim_start_matches('.').to_ascii_lowercase())
}

fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(normalize_extension)
}

#[derive(Default)]
pub struct CodecRegistry {
    decoders: Vec<Arc<dyn ModelDecoder>>,
    encoders: Vec<Arc<dyn ModelEncoder>>,
    decoder_extensions: HashMap<String, Vec<Arc<dyn ModelDecoder>>>,
    encoder_extensions: HashMap<String, Vec<Arc<dyn ModelEncoder>>>,
    defaults_registered: bool,
}

impl CodecRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in codecs.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.add_default_model_codecs();
        registry
    }

    /// Register `decoder` in front of every extension it claims.
    pub fn add_decoders(&mut self, decoder: Arc<dyn ModelDecoder>) {
        for extension in decoder.get_file_extensions() {
            self.decoder_extensions
                .entry(normalize_extension(&extension))
                .or_default()
                .insert(0, decoder.clone());
        }
        self.decoders.insert(0, decoder);
    }

    /// Register `encoder` in front of every extension it claims.
    pub fn add_encoders(&mut self, encoder: Arc<dyn ModelEncoder>) {
        for extension in encoder.get_file_extensions() {
            self.encoder_extensions
                .entry(normalize_extension(&extension))
                .or_default()
                .insert(0, encoder.clone());
        }
        self.encoders.insert(0, encoder);
    }

    /// Candidate decoders for `filename`, most recently registered first.
    pub fn get_decoders(&self, filename: &str) -> Vec<Arc<dyn ModelDecoder>> {
        extension_of(filename)
            .and_then(|ext| self.decoder_extensions.get(&ext))
            .cloned()
            .unwrap_or_default()
    }

    pub fn get_encoders(&self, filename: &str) -> Vec<Arc<dyn ModelEncoder>> {
        extension_of(filename)
            .and_then(|ext| self.encoder_extensions.get(&ext))
            .cloned()
            .unwrap_or_default()
    }

    /// Every registered decoder, most recently registered first.
    pub fn decoders(&self) -> &[Arc<dyn ModelDecoder>] {
        &self.decoders
    }

    pub fn encoders(&self) -> &[Arc<dyn ModelEncoder>] {
        &self.encoders
    }

    /// Register the built-in OBJ and glTF decoders. Later calls do nothing.
    pub fn add_default_model_codecs(&mut self) {
        if self.defaults_registered {
            return;
        }
        self.defaults_registered = true;
        self.add_decoders(Arc::new(obj::ObjDecoder::new()));
        self.add_decoders(Arc::new(gltf::GltfDecoder::new()));
    }
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = |list: &Vec<Arc<dyn ModelDecoder>>| {
            list.iter().map(|d| d.name().to_string()).collect::<Vec<_>>()
        };
        let decoders: HashMap<_, _> = self
            .decoder_extensions
            .iter()
            .map(|(ext, list)| (ext.clone(), names(list)))
            .collect();
        f.debug_struct("CodecRegistry")
            .field("decoders", &decoders)
            .field("encoders", &self.encoders.len())
            .finish()
    }
}

fn registry() -> &'static RwLock<CodecRegistry> {
    static REGISTRY: OnceLock<RwLock<CodecRegistry>> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(CodecRegistry::with_defaults()))
}

fn read_registry() -> RwLockReadGuard<'static, CodecRegistry> {
    registry().read().unwrap_or_else(PoisonError::into_inner)
}

fn write_registry() -> RwLockWriteGuard<'static, CodecRegistry> {
    registry().write().unwrap_or_else(PoisonError::into_inner)
}

/// Register a decoder with the process-wide registry.
///
/// Like every function over the process-wide registry, the first call creates
/// it with the built-in codecs already registered, so `decoder` lands in front
/// of them.
pub fn add_decoders(decoder: Arc<dyn ModelDecoder>) {
    write_registry().add_decoders(decoder);
}

/// Register an encoder with the process-wide registry.
pub fn add_encoders(encoder: Arc<dyn ModelEncoder>) {
    write_registry().add_encoders(encoder);
}

/// Candidate decoders for `filename` from the process-wide registry, which
/// holds the built-in codecs from its first use on.
pub fn get_decoders(filename: &str) -> Vec<Arc<dyn ModelDecoder>> {
    read_registry().get_decoders(filename)
}

pub fn get_encoders(filename: &str) -> Vec<Arc<dyn ModelEncoder>> {
    read_registry().get_encoders(filename)
}

/// Make sure the built-in codecs are registered process-wide.
///
/// The process-wide registry already registers them when it is first used, so
/// this only matters for code that wants the call to be explicit. Repeated
/// calls never add duplicates.
pub fn add_default_model_codecs() {
    write_registry().add_default_model_codecs();
}

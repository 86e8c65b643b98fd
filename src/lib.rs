//! flow-model
//!
//! Model loading for the flow-ngin engine. Files are turned into [`Model`]
//! instances by pluggable decoders; each model part is drawn under a material
//! group that carries its shader, texture and transform state, and the vertex
//! lists of many models can share one batch.
//!
//! High-level modules
//! - `codecs`: decoder/encoder traits, the codec registry and the built-in OBJ
//!   and glTF decoders
//! - `data_structures`: materials, transforms, vertices, textures, material
//!   groups and models
//! - `graphics`: the graphics binding trait, shader programs, batches and a
//!   headless command recorder
//! - `resources`: the `load` entry point and file helpers
//!

pub mod codecs;
pub mod data_structures;
pub mod graphics;
pub mod resources;

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath;
pub use codecs::{
    CodecRegistry, ModelDecodeError, ModelDecoder, ModelEncoder, add_decoders,
    add_default_model_codecs, add_encoders, get_decoders, get_encoders,
};
pub use data_structures::{group::GroupPolicy, model::Model};
pub use graphics::batch::{SharedBatch, new_batch};
pub use resources::{LoadError, ModelFile, load};

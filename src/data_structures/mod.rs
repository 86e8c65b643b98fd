//! Data structures behind a loaded model.
//!
//! - `material` holds the flat per-part surface description
//! - `transform` is the rotation and translation shared by a model's groups
//! - `vertex` contains the vertex layout and CPU-side geometry
//! - `texture` contains the texture handle and image decoding
//! - `group` holds material groups, the GPU state a batch bucket draws under
//! - `model` ties vertex lists, groups and a batch together

pub mod group;
pub mod material;
pub mod model;
pub mod texture;
pub mod transform;
pub mod vertex;

//! The graphics binding a model draws through.
//!
//! Material groups and batches never talk to a GPU API directly. Everything
//! they need (program activation, texture binding, uniform block writes and
//! draw calls) goes through the [`Graphics`] trait, which the host application
//! implements on top of its own device/context. [`recorder::CommandRecorder`]
//! is a headless implementation that just records the calls.
//!
//! - `batch` holds the [`Batch`](batch::Batch) contract and [`DrawBatch`](batch::DrawBatch)
//! - `shader` holds shader programs, the default material programs and the window uniform block
//! - `recorder` holds the recording `Graphics` implementation

pub mod batch;
pub mod recorder;
pub mod shader;

use crate::data_structures::{
    texture::{Texture, TextureTarget},
    vertex::VertexData,
};

use shader::ShaderProgram;

/// Primitive topology of a vertex list.
pub type Topology = wgpu::PrimitiveTopology;

/// Every built-in decoder emits triangle lists.
pub const TRIANGLES: Topology = wgpu::PrimitiveTopology::TriangleList;

/// GPU state and draw operations consumed by groups and batches.
///
/// All calls happen on the thread that owns the graphics context.
pub trait Graphics {
    /// Make `program` the active program.
    fn use_program(&mut self, program: &ShaderProgram) -> anyhow::Result<()>;

    /// Bind `texture` to texture unit `unit`.
    fn bind_texture(&mut self, unit: u32, texture: &Texture) -> anyhow::Result<()>;

    /// Clear whatever is bound to `unit` for `target`.
    fn unbind_texture(&mut self, unit: u32, target: TextureTarget) -> anyhow::Result<()>;

    /// Write `bytes` into member `member` of the uniform block `block` of `program`.
    fn write_uniform_block(
        &mut self,
        program: &ShaderProgram,
        block: &str,
        member: &str,
        bytes: &[u8],
    ) -> anyhow::Result<()>;

    /// Issue a draw call for one vertex list.
    fn draw(&mut self, topology: Topology, data: &VertexData) -> anyhow::Result<()>;
}

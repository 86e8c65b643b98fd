//! Shader programs and the shared window uniform block.

use std::sync::{
    Arc, OnceLock,
    atomic::{AtomicU64, Ordering},
};

static NEXT_PROGRAM_ID: AtomicU64 = AtomicU64::new(1);

/// A WGSL program with `vs_main` / `fs_main` entry points.
///
/// Creating a `ShaderProgram` compiles nothing: the graphics binding compiles
/// a program the first time it is used and keys its cache on [`id`](Self::id).
#[derive(Debug)]
pub struct ShaderProgram {
    id: u64,
    label: &'static str,
    source: &'static str,
    uniform_blocks: &'static [&'static str],
}

impl ShaderProgram {
    pub fn new(
        label: &'static str,
        source: &'static str,
        uniform_blocks: &'static [&'static str],
    ) -> Self {
        Self {
            id: NEXT_PROGRAM_ID.fetch_add(1, Ordering::Relaxed),
            label,
            source,
            uniform_blocks,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn source(&self) -> &'static str {
        self.source
    }

    /// Whether the program declares the uniform block `name`.
    pub fn has_uniform_block(&self, name: &str) -> bool {
        self.uniform_blocks.contains(&name)
    }

    pub fn descriptor(&self) -> wgpu::ShaderModuleDescriptor<'static> {
        wgpu::ShaderModuleDescriptor {
            label: Some(self.label),
            source: wgpu::ShaderSource::Wgsl(self.source.into()),
        }
    }
}

/// Layout of the per-window uniform block every material program reads.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct WindowBlock {
    pub projection: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
}

impl WindowBlock {
    pub const NAME: &'static str = "WindowBlock";
    pub const VIEW: &'static str = "view";
    pub const PROJECTION: &'static str = "projection";

    /// Byte offset of `member` inside the block.
    pub fn offset_of(member: &str) -> Option<usize> {
        match member {
            Self::PROJECTION => Some(0),
            Self::VIEW => Some(std::mem::size_of::<[[f32; 4]; 4]>()),
            _ => None,
        }
    }
}

const MATERIAL_BLOCKS: &[&str] = &[WindowBlock::NAME];

/// Program used by untextured material groups. Built on first use.
pub fn default_material_program() -> Arc<ShaderProgram> {
    static PROGRAM: OnceLock<Arc<ShaderProgram>> = OnceLock::new();
    PROGRAM
        .get_or_init(|| {
            Arc::new(ShaderProgram::new(
                "Material Shader",
                include_str!("material.wgsl"),
                MATERIAL_BLOCKS,
            ))
        })
        .clone()
}

/// Program used by textured material groups. Built on first use.
pub fn default_textured_material_program() -> Arc<ShaderProgram> {
    static PROGRAM: OnceLock<Arc<ShaderProgram>> = OnceLock::new();
    PROGRAM
        .get_or_init(|| {
            Arc::new(ShaderProgram::new(
                "Textured Material Shader",
                include_str!("textured_material.wgsl"),
                MATERIAL_BLOCKS,
            ))
        })
        .clone()
}

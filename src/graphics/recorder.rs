//! Headless [`Graphics`] implementation that records every call.
//!
//! Handy for inspecting draw order and state changes without a GPU, and used
//! throughout the tests.

use crate::data_structures::{
    texture::{Texture, TextureTarget},
    vertex::VertexData,
};

use super::{Graphics, Topology, shader::ShaderProgram};

/// One recorded graphics call.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    UseProgram(u64),
    BindTexture { unit: u32, texture: u64, target: TextureTarget },
    UnbindTexture { unit: u32, target: TextureTarget },
    WriteUniform { program: u64, block: String, member: String, bytes: Vec<u8> },
    Draw { topology: Topology, elements: usize },
}

#[derive(Debug, Default)]
pub struct CommandRecorder {
    commands: Vec<Command>,
}

impl CommandRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn take(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    pub fn draw_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, Command::Draw { .. }))
            .count()
    }

    /// The last matrix written to `member` of any uniform block, decoded.
    pub fn last_matrix(&self, member: &str) -> Option<[[f32; 4]; 4]> {
        self.commands.iter().rev().find_map(|c| match c {
            Command::WriteUniform {
                member: m, bytes, ..
            } if m == member && bytes.len() == std::mem::size_of::<[[f32; 4]; 4]>() => {
                Some(bytemuck::pod_read_unaligned(bytes))
            }
            _ => None,
        })
    }
}

impl Graphics for CommandRecorder {
    fn use_program(&mut self, program: &ShaderProgram) -> anyhow::Result<()> {
        self.commands.push(Command::UseProgram(program.id()));
        Ok(())
    }

    fn bind_texture(&mut self, unit: u32, texture: &Texture) -> anyhow::Result<()> {
        self.commands.push(Command::BindTexture {
            unit,
            texture: texture.id(),
            target: texture.target(),
        });
        Ok(())
    }

    fn unbind_texture(&mut self, unit: u32, target: TextureTarget) -> anyhow::Result<()> {
        self.commands.push(Command::UnbindTexture { unit, target });
        Ok(())
    }

    fn write_uniform_block(
        &mut self,
        program: &ShaderProgram,
        block: &str,
        member: &str,
        bytes: &[u8],
    ) -> anyhow::Result<()> {
        if !program.has_uniform_block(block) {
            anyhow::bail!(
                "program {} has no uniform block named {block}",
                program.label()
            );
        }
        self.commands.push(Command::WriteUniform {
            program: program.id(),
            block: block.to_string(),
            member: member.to_string(),
            bytes: bytes.to_vec(),
        });
        Ok(())
    }

    fn draw(&mut self, topology: Topology, data: &VertexData) -> anyhow::Result<()> {
        self.commands.push(Command::Draw {
            topology,
            elements: data.element_count(),
        });
        Ok(())
    }
}

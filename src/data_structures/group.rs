//! Rendering groups: the GPU state needed to draw one vertex list.
//!
//! A batch sorts vertex lists into buckets keyed by [`GroupKey`] and wraps
//! every bucket in `set_state` / `unset_state` of its group. [`MaterialGroup`]
//! is the group every decoder produces: it activates a material program, binds
//! the part's texture (textured variant only) and uploads the model's view
//! matrix into the program's `WindowBlock`.
//!
//! # Bucketing
//!
//! Under [`GroupPolicy::Isolated`] (the default) a material group is only ever
//! equal to itself, so every model part keeps its own draw slot even when two
//! parts share a material and texture. [`GroupPolicy::Merge`] lets parts of one
//! model that share a material, texture and program collapse into one bucket.
//! A merged bucket draws under a single state change, so its parts are no
//! longer drawn in the order they were added relative to other buckets.

use std::{
    cell::Cell,
    fmt,
    hash::{Hash, Hasher},
    rc::Rc,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use cgmath::Vector3;

use crate::{
    data_structures::{
        material::Material,
        texture::{Texture, TextureTarget},
        transform::Transform,
    },
    graphics::{
        Graphics,
        shader::{
            ShaderProgram, WindowBlock, default_material_program,
            default_textured_material_program,
        },
    },
};

pub type GroupId = u64;

static NEXT_GROUP_ID: AtomicU64 = AtomicU64::new(1);

fn next_group_id() -> GroupId {
    NEXT_GROUP_ID.fetch_add(1, Ordering::Relaxed)
}

/// Identity a batch buckets vertex lists by.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum GroupKey {
    /// Equal only to the group with this id.
    Isolated(GroupId),
    /// Equal for every group that sets the same state.
    Material {
        parent: Option<GroupId>,
        program: u64,
        /// Address of the shared `Arc<Material>`.
        material: usize,
        texture: Option<(u64, TextureTarget)>,
    },
}

/// Whether material groups with identical state may share a bucket.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GroupPolicy {
    #[default]
    Isolated,
    Merge,
}

/// State wrapper around a run of vertex lists in a batch.
pub trait Group: fmt::Debug {
    fn id(&self) -> GroupId;

    /// Buckets draw in ascending order; ties keep insertion order.
    fn order(&self) -> i32 {
        0
    }

    fn parent(&self) -> Option<&Rc<dyn Group>> {
        None
    }

    fn key(&self) -> GroupKey {
        GroupKey::Isolated(self.id())
    }

    fn set_state(&self, _gfx: &mut dyn Graphics) -> anyhow::Result<()> {
        Ok(())
    }

    fn unset_state(&self, _gfx: &mut dyn Graphics) -> anyhow::Result<()> {
        Ok(())
    }

    /// Set the state of every ancestor, outermost first, then this group's.
    fn set_state_recursive(&self, gfx: &mut dyn Graphics) -> anyhow::Result<()> {
        if let Some(parent) = self.parent() {
            parent.set_state_recursive(gfx)?;
        }
        self.set_state(gfx)
    }

    /// Undo [`set_state_recursive`](Self::set_state_recursive) in reverse.
    fn unset_state_recursive(&self, gfx: &mut dyn Graphics) -> anyhow::Result<()> {
        self.unset_state(gfx)?;
        if let Some(parent) = self.parent() {
            parent.unset_state_recursive(gfx)?;
        }
        Ok(())
    }
}

/// A group that sets no state; only useful as a parent or to order buckets.
#[derive(Debug)]
pub struct OrderedGroup {
    id: GroupId,
    order: i32,
    parent: Option<Rc<dyn Group>>,
}

impl OrderedGroup {
    pub fn new(order: i32) -> Self {
        Self {
            id: next_group_id(),
            order,
            parent: None,
        }
    }

    pub fn with_parent(self, parent: Rc<dyn Group>) -> Self {
        Self {
            parent: Some(parent),
            ..self
        }
    }
}

impl Group for OrderedGroup {
    fn id(&self) -> GroupId {
        self.id
    }

    fn order(&self) -> i32 {
        self.order
    }

    fn parent(&self) -> Option<&Rc<dyn Group>> {
        self.parent.as_ref()
    }
}

#[derive(Clone, Debug)]
pub enum MaterialKind {
    Untextured,
    Textured(Texture),
}

/// The group of one model part.
///
/// The transform lives in a `Cell` so that the owning
/// [`Model`](crate::data_structures::model::Model) can update it through the
/// shared `Rc` it also hands to the batch.
pub struct MaterialGroup {
    id: GroupId,
    material: Arc<Material>,
    kind: MaterialKind,
    program: Arc<ShaderProgram>,
    transform: Cell<Transform>,
    parent: Option<Rc<dyn Group>>,
    policy: GroupPolicy,
}

impl MaterialGroup {
    /// Untextured group using the shared default material program.
    pub fn new(material: Arc<Material>) -> Self {
        Self::with_kind(material, MaterialKind::Untextured, default_material_program())
    }

    /// Textured group using the shared default textured program.
    pub fn textured(material: Arc<Material>, texture: Texture) -> Self {
        Self::with_kind(
            material,
            MaterialKind::Textured(texture),
            default_textured_material_program(),
        )
    }

    fn with_kind(material: Arc<Material>, kind: MaterialKind, program: Arc<ShaderProgram>) -> Self {
        Self {
            id: next_group_id(),
            material,
            kind,
            program,
            transform: Cell::new(Transform::new()),
            parent: None,
            policy: GroupPolicy::default(),
        }
    }

    /// Draw with `program` instead of the shared default.
    pub fn with_program(self, program: Arc<ShaderProgram>) -> Self {
        Self { program, ..self }
    }

    pub fn with_parent(self, parent: Rc<dyn Group>) -> Self {
        Self {
            parent: Some(parent),
            ..self
        }
    }

    pub fn with_policy(self, policy: GroupPolicy) -> Self {
        Self { policy, ..self }
    }

    pub fn material(&self) -> &Arc<Material> {
        &self.material
    }

    pub fn kind(&self) -> &MaterialKind {
        &self.kind
    }

    pub fn texture(&self) -> Option<&Texture> {
        match &self.kind {
            MaterialKind::Textured(texture) => Some(texture),
            MaterialKind::Untextured => None,
        }
    }

    pub fn program(&self) -> &Arc<ShaderProgram> {
        &self.program
    }

    pub fn policy(&self) -> GroupPolicy {
        self.policy
    }

    pub fn transform(&self) -> Transform {
        self.transform.get()
    }

    pub fn rotation(&self) -> Vector3<f32> {
        self.transform.get().rotation
    }

    pub fn translation(&self) -> Vector3<f32> {
        self.transform.get().translation
    }

    // Only the owning model writes this, so all its groups stay in step.
    pub(crate) fn set_transform(&self, transform: Transform) {
        self.transform.set(transform);
    }

    fn set_modelview_matrix(&self, gfx: &mut dyn Graphics) -> anyhow::Result<()> {
        let view = self.transform.get().to_raw();
        gfx.write_uniform_block(
            &self.program,
            WindowBlock::NAME,
            WindowBlock::VIEW,
            bytemuck::bytes_of(&view),
        )
    }
}

impl Group for MaterialGroup {
    fn id(&self) -> GroupId {
        self.id
    }

    fn parent(&self) -> Option<&Rc<dyn Group>> {
        self.parent.as_ref()
    }

    fn key(&self) -> GroupKey {
        match self.policy {
            GroupPolicy::Isolated => GroupKey::Isolated(self.id),
            GroupPolicy::Merge => GroupKey::Material {
                parent: self.parent.as_ref().map(|p| p.id()),
                program: self.program.id(),
                material: Arc::as_ptr(&self.material) as usize,
                texture: self.texture().map(|t| (t.id(), t.target())),
            },
        }
    }

    fn set_state(&self, gfx: &mut dyn Graphics) -> anyhow::Result<()> {
        if let MaterialKind::Textured(texture) = &self.kind {
            gfx.bind_texture(0, texture)?;
        }
        gfx.use_program(&self.program)?;
        self.set_modelview_matrix(gfx)
    }

    fn unset_state(&self, gfx: &mut dyn Graphics) -> anyhow::Result<()> {
        match &self.kind {
            MaterialKind::Textured(texture) => gfx.unbind_texture(0, texture.target()),
            MaterialKind::Untextured => Ok(()),
        }
    }
}

impl PartialEq for MaterialGroup {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for MaterialGroup {}

impl Hash for MaterialGroup {
    /// Hashes the parent's id and, for textured groups, the texture id and target.
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.parent.as_ref().map(|p| p.id()).hash(state);
        if let MaterialKind::Textured(texture) = &self.kind {
            texture.id().hash(state);
            texture.target().hash(state);
        }
    }
}

impl fmt::Debug for MaterialGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MaterialGroup")
            .field("id", &self.id)
            .field("material", &self.material.name)
            .field("textured", &self.texture().is_some())
            .field("program", &self.program.label())
            .field("transform", &self.transform.get())
            .field("policy", &self.policy)
            .finish()
    }
}

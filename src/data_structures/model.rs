//! Model instances: decoded parts, their groups and the batch they live in.

use std::{fmt, rc::Rc, sync::Arc};

use cgmath::Vector3;

use crate::{
    data_structures::{
        group::{GroupPolicy, MaterialGroup},
        material::Material,
        texture::Texture,
        transform::Transform,
        vertex::VertexData,
    },
    graphics::{
        Graphics, TRIANGLES,
        batch::{SharedBatch, VertexList, new_batch},
    },
};

/// One decoded part of a model before it is added to a batch.
#[derive(Clone, Debug)]
pub struct ModelPart {
    pub material: Arc<Material>,
    pub texture: Option<Texture>,
    pub data: VertexData,
}

/// Instance of a 3D object.
///
/// `vertex_lists[i]` and `groups[i]` always describe the same part. The model's
/// own transform is authoritative: every setter writes it to all groups before
/// returning, so reading any group's transform afterwards gives the model's.
///
/// Dropping a model deletes its vertex lists from its batch.
pub struct Model {
    vertex_lists: Vec<VertexList>,
    groups: Vec<Rc<MaterialGroup>>,
    batch: SharedBatch,
    transform: Transform,
}

impl Model {
    /// Wrap vertex lists already stored in `batch`.
    pub fn new(
        vertex_lists: Vec<VertexList>,
        groups: Vec<Rc<MaterialGroup>>,
        batch: SharedBatch,
    ) -> anyhow::Result<Self> {
        anyhow::ensure!(
            vertex_lists.len() == groups.len(),
            "a model needs one group per vertex list, got {} vertex lists and {} groups",
            vertex_lists.len(),
            groups.len()
        );
        let model = Self {
            vertex_lists,
            groups,
            batch,
            transform: Transform::new(),
        };
        model.fan_out();
        Ok(model)
    }

    /// Build groups for `parts`, add them to `batch` and assemble the model.
    ///
    /// Without a batch the model gets a private one.
    ///
    /// # Panics
    ///
    /// Panics if `batch` is currently borrowed.
    pub fn from_parts(parts: Vec<ModelPart>, batch: Option<SharedBatch>, policy: GroupPolicy) -> Self {
        let batch = batch.unwrap_or_else(new_batch);
        let mut vertex_lists = Vec::with_capacity(parts.len());
        let mut groups = Vec::with_capacity(parts.len());
        {
            let mut target = batch.borrow_mut();
            for part in parts {
                let group = match part.texture {
                    Some(texture) => MaterialGroup::textured(part.material, texture),
                    None => MaterialGroup::new(part.material),
                };
                let group = Rc::new(group.with_policy(policy));
                vertex_lists.push(target.add(TRIANGLES, group.clone(), part.data));
                groups.push(group);
            }
        }
        Self {
            vertex_lists,
            groups,
            batch,
            transform: Transform::new(),
        }
    }

    pub fn vertex_lists(&self) -> &[VertexList] {
        &self.vertex_lists
    }

    pub fn groups(&self) -> &[Rc<MaterialGroup>] {
        &self.groups
    }

    /// Number of parts.
    pub fn len(&self) -> usize {
        self.vertex_lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertex_lists.is_empty()
    }

    /// The batch the model's vertex lists live in.
    pub fn batch(&self) -> &SharedBatch {
        &self.batch
    }

    /// Move the model into another batch.
    ///
    /// Passing the current batch does nothing. `None` moves the model into a
    /// new private batch. Otherwise every vertex list is migrated and
    /// re-bucketed in the target, which is expensive for models with many
    /// parts.
    pub fn set_batch(&mut self, batch: Option<SharedBatch>) -> anyhow::Result<()> {
        if let Some(batch) = &batch {
            if std::ptr::addr_eq(Rc::as_ptr(batch), Rc::as_ptr(&self.batch)) {
                return Ok(());
            }
        }
        let target = batch.unwrap_or_else(new_batch);
        log::debug!("migrating {} vertex lists to another batch", self.vertex_lists.len());
        {
            let mut source = self.batch.borrow_mut();
            // A model never spans two batches.
            if let Some(missing) = self.vertex_lists.iter().find(|l| !source.contains(l)) {
                anyhow::bail!(
                    "vertex list {} is not part of the model's batch, nothing was migrated",
                    missing.id()
                );
            }
            let mut destination = target.borrow_mut();
            for (group, list) in self.groups.iter().zip(&self.vertex_lists) {
                source.migrate(list, TRIANGLES, group.clone(), &mut *destination)?;
            }
        }
        self.batch = target;
        Ok(())
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    /// Rotation in degrees about x, y and z.
    pub fn rotation(&self) -> Vector3<f32> {
        self.transform.rotation
    }

    pub fn translation(&self) -> Vector3<f32> {
        self.transform.translation
    }

    /// Replace the whole transform of the model and all of its groups.
    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
        self.fan_out();
    }

    pub fn set_rotation(&mut self, rotation: impl Into<Vector3<f32>>) {
        self.set_transform(self.transform.with_rotation(rotation.into()));
    }

    pub fn set_translation(&mut self, translation: impl Into<Vector3<f32>>) {
        self.set_transform(self.transform.with_translation(translation.into()));
    }

    /// Draw only this model.
    ///
    /// This issues a state change per part. Prefer drawing the whole batch
    /// when several models share one.
    pub fn draw(&self, gfx: &mut dyn Graphics) -> anyhow::Result<()> {
        self.batch.borrow().draw_subset(gfx, &self.vertex_lists)
    }

    fn fan_out(&self) {
        for group in &self.groups {
            group.set_transform(self.transform);
        }
    }
}

impl Drop for Model {
    fn drop(&mut self) {
        match self.batch.try_borrow_mut() {
            Ok(mut batch) => {
                for list in &self.vertex_lists {
                    batch.delete(list);
                }
            }
            Err(_) => log::warn!(
                "batch is borrowed while dropping a model, {} vertex lists stay behind",
                self.vertex_lists.len()
            ),
        }
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("vertex_lists", &self.vertex_lists)
            .field("groups", &self.groups)
            .field("transform", &self.transform)
            .finish()
    }
}

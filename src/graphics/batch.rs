//! Batches: vertex lists bucketed by the group state they draw under.
//!
//! A batch owns the vertex data; callers hold [`VertexList`] handles. Handles
//! carry a process-unique id, so a handle stays valid when its data is migrated
//! into another batch.
//!
//! [`DrawBatch`] draws buckets in `(group order, first insertion)` order and
//! wraps each bucket in one `set_state_recursive` / `unset_state_recursive`
//! pair, so every distinct [`GroupKey`] costs one state change per draw.

use std::{
    cell::RefCell,
    collections::{HashMap, HashSet},
    fmt,
    rc::Rc,
    sync::atomic::{AtomicU64, Ordering},
};

use anyhow::anyhow;

use crate::{
    data_structures::{
        group::{Group, GroupKey},
        vertex::VertexData,
    },
    graphics::{Graphics, Topology},
};

/// A batch shared between models and the code that draws it.
pub type SharedBatch = Rc<RefCell<dyn Batch>>;

/// A fresh, empty [`DrawBatch`] behind a [`SharedBatch`] handle.
pub fn new_batch() -> SharedBatch {
    Rc::new(RefCell::new(DrawBatch::new()))
}

static NEXT_VERTEX_LIST_ID: AtomicU64 = AtomicU64::new(1);

/// Handle to one vertex list stored in some batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VertexList {
    id: u64,
    count: usize,
}

impl VertexList {
    /// A handle for `count` elements that no batch knows about yet.
    pub fn allocate(count: usize) -> Self {
        Self {
            id: NEXT_VERTEX_LIST_ID.fetch_add(1, Ordering::Relaxed),
            count,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn count(&self) -> usize {
        self.count
    }
}

/// Storage and draw contract for vertex lists.
pub trait Batch: fmt::Debug {
    /// Store `data` under `group` and hand back its handle.
    fn add(&mut self, topology: Topology, group: Rc<dyn Group>, data: VertexData) -> VertexList {
        let list = VertexList::allocate(data.element_count());
        self.insert(list, topology, group, data);
        list
    }

    /// Store `data` under an existing handle.
    fn insert(&mut self, list: VertexList, topology: Topology, group: Rc<dyn Group>, data: VertexData);

    /// Remove a vertex list and return its data.
    fn take(&mut self, list: &VertexList) -> Option<VertexData>;

    /// Remove a vertex list, releasing its data.
    fn delete(&mut self, list: &VertexList) -> bool {
        self.take(list).is_some()
    }

    fn contains(&self, list: &VertexList) -> bool;

    /// Number of vertex lists in the batch.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Draw every vertex list.
    fn draw(&self, gfx: &mut dyn Graphics) -> anyhow::Result<()>;

    /// Draw only `lists`, still honouring group order and state.
    fn draw_subset(&self, gfx: &mut dyn Graphics, lists: &[VertexList]) -> anyhow::Result<()>;

    /// Move `list` into `target` under `group`.
    ///
    /// Costs a full re-bucketing of the list in the target batch.
    fn migrate(
        &mut self,
        list: &VertexList,
        topology: Topology,
        group: Rc<dyn Group>,
        target: &mut dyn Batch,
    ) -> anyhow::Result<()> {
        let data = self
            .take(list)
            .ok_or_else(|| anyhow!("vertex list {} is not part of this batch", list.id()))?;
        target.insert(*list, topology, group, data);
        Ok(())
    }
}

struct Entry {
    topology: Topology,
    data: VertexData,
    key: GroupKey,
}

struct Bucket {
    group: Rc<dyn Group>,
    lists: Vec<VertexList>,
    seq: u64,
}

/// The stock [`Batch`].
#[derive(Default)]
pub struct DrawBatch {
    entries: HashMap<u64, Entry>,
    buckets: HashMap<GroupKey, Bucket>,
    next_seq: u64,
}

impl DrawBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of buckets, i.e. state changes a full draw performs.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    fn ordered_buckets(&self) -> Vec<&Bucket> {
        let mut buckets: Vec<&Bucket> = self.buckets.values().collect();
        buckets.sort_by_key(|b| (b.group.order(), b.seq));
        buckets
    }

    fn draw_filtered(
        &self,
        gfx: &mut dyn Graphics,
        include: impl Fn(&VertexList) -> bool,
    ) -> anyhow::Result<()> {
        for bucket in self.ordered_buckets() {
            let lists: Vec<&VertexList> = bucket.lists.iter().filter(|l| include(l)).collect();
            if lists.is_empty() {
                continue;
            }
            bucket.group.set_state_recursive(gfx)?;
            for list in lists {
                if let Some(entry) = self.entries.get(&list.id) {
                    gfx.draw(entry.topology, &entry.data)?;
                }
            }
            bucket.group.unset_state_recursive(gfx)?;
        }
        Ok(())
    }
}

impl Batch for DrawBatch {
    fn insert(&mut self, list: VertexList, topology: Topology, group: Rc<dyn Group>, data: VertexData) {
        if self.entries.contains_key(&list.id) {
            self.take(&list);
        }
        let key = group.key();
        let seq = self.next_seq;
        let bucket = self.buckets.entry(key.clone()).or_insert_with(|| Bucket {
            group,
            lists: Vec::new(),
            seq,
        });
        if bucket.seq == seq {
            self.next_seq += 1;
        }
        bucket.lists.push(list);
        self.entries.insert(
            list.id,
            Entry {
                topology,
                data,
                key,
            },
        );
    }

    fn take(&mut self, list: &VertexList) -> Option<VertexData> {
        let entry = self.entries.remove(&list.id)?;
        if let Some(bucket) = self.buckets.get_mut(&entry.key) {
            bucket.lists.retain(|l| l.id != list.id);
            if bucket.lists.is_empty() {
                self.buckets.remove(&entry.key);
            }
        }
        Some(entry.data)
    }

    fn contains(&self, list: &VertexList) -> bool {
        self.entries.contains_key(&list.id)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn draw(&self, gfx: &mut dyn Graphics) -> anyhow::Result<()> {
        self.draw_filtered(gfx, |_| true)
    }

    fn draw_subset(&self, gfx: &mut dyn Graphics, lists: &[VertexList]) -> anyhow::Result<()> {
        let wanted: HashSet<u64> = lists.iter().map(|l| l.id).collect();
        self.draw_filtered(gfx, |l| wanted.contains(&l.id))
    }
}

impl fmt::Debug for DrawBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DrawBatch")
            .field("vertex_lists", &self.entries.len())
            .field("buckets", &self.buckets.len())
            .finish()
    }
}

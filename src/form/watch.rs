use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexSet;
use serde_json::Value;

use super::node::{FieldNode, FormTree, Leaf};
use super::path::FieldPath;

static WATCH_ID_ALLOCATOR: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct WatchId(pub u64);

impl WatchId {
    pub fn next() -> Self {
        Self(WATCH_ID_ALLOCATOR.fetch_add(1, Ordering::SeqCst))
    }
}

pub type WatchCallback = Arc<dyn Fn(&FieldPath, &Value) + Send + Sync>;

/// Entry in a leaf's observer list.
#[derive(Clone)]
pub enum Watcher {
    /// Recompute the leaf's error from its validator.
    Revalidate,
    Callback { id: WatchId, callback: WatchCallback },
}

impl Debug for Watcher {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Watcher::Revalidate => f.write_str("Revalidate"),
            Watcher::Callback { id, .. } => f.debug_struct("Callback").field("id", id).finish(),
        }
    }
}

/// When value changes reach their watchers.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum FlushMode {
    /// Changes queue up until [`FormController::flush`](super::FormController::flush).
    #[default]
    Deferred,
    /// Every assignment flushes before returning.
    Immediate,
}

/// Paths whose value changed since the last flush, in first-change order.
#[derive(Debug, Default)]
pub struct ChangeQueue {
    pending: IndexSet<FieldPath>,
}

impl ChangeQueue {
    /// Returns `false` when the path was already pending.
    pub fn push(&mut self, path: FieldPath) -> bool {
        self.pending.insert(path)
    }

    pub fn drain(&mut self) -> Vec<FieldPath> {
        self.pending.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

/// A user callback scheduled by a flush, run once the form state is unlocked.
pub(super) struct PendingCallback {
    pub(super) path: FieldPath,
    pub(super) value: Value,
    pub(super) callback: WatchCallback,
}

impl PendingCallback {
    pub(super) fn run(self) {
        (self.callback)(&self.path, &self.value);
    }
}

impl Leaf {
    pub(super) fn add_revalidator(&mut self) -> bool {
        if self.validate.is_none()
            || self
                .watchers
                .iter()
                .any(|watcher| matches!(watcher, Watcher::Revalidate))
        {
            return false;
        }
        self.watchers.push(Watcher::Revalidate);
        true
    }

    pub(super) fn add_callback(&mut self, callback: WatchCallback) -> WatchId {
        let id = WatchId::next();
        self.watchers.push(Watcher::Callback { id, callback });
        id
    }

    pub(super) fn remove_callback(&mut self, id: WatchId) -> bool {
        let before = self.watchers.len();
        self.watchers
            .retain(|watcher| !matches!(watcher, Watcher::Callback { id: existing, .. } if *existing == id));
        self.watchers.len() != before
    }

    /// Runs revalidation in place and hands back the user callbacks, both in
    /// registration order.
    pub(super) fn notify(&mut self, path: &FieldPath) -> (usize, Vec<PendingCallback>) {
        let mut revalidations = 0;
        let mut callbacks = Vec::new();
        for watcher in &self.watchers {
            match watcher {
                Watcher::Revalidate => {
                    if let Some(validate) = &self.validate {
                        self.error = validate(&self.value).err();
                        revalidations += 1;
                    }
                }
                Watcher::Callback { callback, .. } => callbacks.push(PendingCallback {
                    path: path.clone(),
                    value: self.value.clone(),
                    callback: callback.clone(),
                }),
            }
        }
        (revalidations, callbacks)
    }
}

impl FormTree {
    /// Attaches a revalidating watcher to every leaf with a validator.
    /// Leaves already watched are skipped.
    pub fn attach_revalidators(&mut self) -> usize {
        self.fields
            .values_mut()
            .map(|node| match node {
                FieldNode::Leaf(leaf) => usize::from(leaf.add_revalidator()),
                FieldNode::Branch(branch) => branch.children.attach_revalidators(),
                FieldNode::Unbound => 0,
            })
            .sum()
    }
}

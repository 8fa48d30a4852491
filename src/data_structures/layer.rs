//! Layers group scene content so it can be loaded and reclaimed together.

use std::sync::Arc;

/// A logical group of scene nodes identified by a stable id.
///
/// Nodes reference their layer through an `Arc<Layer>`. Two layers can share
/// an id without being the same instance, see [`Layer::same_id`] and
/// [`Layer::is`].
#[derive(Debug, PartialEq, Eq)]
pub struct Layer {
    pub id: String,
    pub name: Option<String>,
}

impl Layer {
    pub fn new(id: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            name: None,
        })
    }

    pub fn named(id: impl Into<String>, name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            name: Some(name.into()),
        })
    }

    pub fn same_id(&self, other: &Layer) -> bool {
        self.id == other.id
    }

    /// Identity comparison: both handles point to the same layer instance.
    pub fn is(a: &Arc<Layer>, b: &Arc<Layer>) -> bool {
        Arc::ptr_eq(a, b)
    }
}

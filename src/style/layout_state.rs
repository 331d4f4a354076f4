use rustc_hash::FxHashMap;

use crate::view::NodeId;

/// Arranged geometry of one node, relative to its parent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutState {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub desired_width: f32,
    pub desired_height: f32,
}

impl LayoutState {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            desired_width: width,
            desired_height: height,
        }
    }

    pub fn with_desired(mut self, desired_width: f32, desired_height: f32) -> Self {
        self.desired_width = desired_width;
        self.desired_height = desired_height;
        self
    }
}

#[derive(Debug, Default, PartialEq)]
pub struct LayoutStateTree {
    states: FxHashMap<NodeId, LayoutState>,
}

impl LayoutStateTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node_id: NodeId, state: LayoutState) {
        self.states.insert(node_id, state);
    }

    pub fn get(&self, node_id: NodeId) -> Option<&LayoutState> {
        self.states.get(&node_id)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &LayoutState)> {
        self.states.iter()
    }
}

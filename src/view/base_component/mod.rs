use std::sync::atomic::{AtomicU64, Ordering};

use glam::Vec2;
use rustc_hash::FxHashMap;
use slotmap::{Key, KeyData, SlotMap, new_key_type};
use smol_str::{SmolStr, format_smolstr};
use tracing::warn;

use crate::config::LayoutConfig;
use crate::error::{LayoutError, LayoutResult};
use crate::style::{LayoutProps, LayoutState, LayoutStateTree, Rect, Size};
use crate::transition::{
    LayoutTransitionStorage, ThemeTransition, TrackTarget, TransitionGhost, TransitionTrigger,
};
use crate::view::components::GridCell;
use crate::view::layout_manager::{
    EffectiveViewportChangedEvent, EffectiveViewportHandler, LayoutControl, SizeChangedEvent,
    SizeChangedHandler,
};

mod core;
mod element;

pub(crate) use core::*;
pub use element::*;

new_key_type! {
    /// Handle of a node in a [`LayoutTree`].
    pub struct NodeId;
    /// Handle of a theme transition registered on a [`LayoutTree`].
    pub struct TransitionId;
}

/// Entered/left counter value meaning "during the current tick".
pub(crate) const IN_THIS_TICK: u16 = 1;

fn next_ui_node_id() -> u64 {
    static NEXT_ID: AtomicU64 = AtomicU64::new(1);
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

pub(crate) fn node_target(node: NodeId) -> TrackTarget {
    node.data().as_ffi()
}

pub(crate) fn target_node(target: TrackTarget) -> NodeId {
    NodeId::from(KeyData::from_ffi(target))
}

pub(crate) struct LayoutNode {
    pub core: LayoutCore,
    pub props: LayoutProps,
    pub name: SmolStr,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Detached children kept alive while their unload animation runs.
    pub unloading_children: Vec<NodeId>,
    pub behavior: Option<Box<dyn Layoutable>>,
    pub grid_cell: GridCell,
    pub canvas_position: Vec2,
    pub transitions: Vec<TransitionId>,
    pub child_transitions: Vec<TransitionId>,
    pub transition: Option<Box<LayoutTransitionStorage>>,
    pub entered_counter: u16,
    pub left_counter: u16,
    pub size_changed_handler: Option<SizeChangedHandler>,
    pub viewport_handler: Option<EffectiveViewportHandler>,
    pub last_effective_viewport: Option<EffectiveViewportChangedEvent>,
}

impl LayoutNode {
    fn new(behavior: Box<dyn Layoutable>, props: LayoutProps) -> Self {
        Self {
            core: LayoutCore::new(),
            props,
            name: SmolStr::default(),
            parent: None,
            children: Vec::new(),
            unloading_children: Vec::new(),
            behavior: Some(behavior),
            grid_cell: GridCell::default(),
            canvas_position: Vec2::ZERO,
            transitions: Vec::new(),
            child_transitions: Vec::new(),
            transition: None,
            entered_counter: 0,
            left_counter: 0,
            size_changed_handler: None,
            viewport_handler: None,
            last_effective_viewport: None,
        }
    }

    fn kind_name(&self) -> &'static str {
        self.behavior
            .as_ref()
            .map(|behavior| behavior.kind_name())
            .unwrap_or("Node")
    }
}

/// Arena owning every node of one UI tree.
///
/// Nodes refer to each other by [`NodeId`]; the [`LayoutManager`] only
/// borrows the tree while a layout update runs.
///
/// [`LayoutManager`]: crate::view::LayoutManager
pub struct LayoutTree {
    pub(crate) nodes: SlotMap<NodeId, LayoutNode>,
    pub(crate) root: Option<NodeId>,
    pub(crate) transitions: SlotMap<TransitionId, Box<dyn ThemeTransition>>,
    pub(crate) ghosts: FxHashMap<NodeId, TransitionGhost>,
    pub(crate) pending_unloads: Vec<NodeId>,
    pub(crate) config: LayoutConfig,
    pub(crate) viewport_listeners: usize,
    pub(crate) viewport_walk_requested: bool,
}

impl Default for LayoutTree {
    fn default() -> Self {
        Self::new(LayoutConfig::default())
    }
}

impl LayoutTree {
    pub fn new(config: LayoutConfig) -> Self {
        Self {
            nodes: SlotMap::with_key(),
            root: None,
            transitions: SlotMap::with_key(),
            ghosts: FxHashMap::default(),
            pending_unloads: Vec::new(),
            config,
            viewport_listeners: 0,
            viewport_walk_requested: false,
        }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn set_scale_factor(&mut self, scale_factor: f32) {
        if scale_factor.is_finite()
            && scale_factor > 0.0
            && scale_factor != self.config.scale_factor
        {
            self.config.scale_factor = scale_factor;
            self.invalidate_all();
        }
    }

    pub fn set_animations_enabled(&mut self, enabled: bool) {
        self.config.animations_enabled = enabled;
    }

    pub fn create_node(&mut self, behavior: impl Layoutable) -> NodeId {
        self.create_node_with_props(behavior, LayoutProps::default())
    }

    pub fn create_node_with_props(&mut self, behavior: impl Layoutable, props: LayoutProps) -> NodeId {
        self.nodes
            .insert(LayoutNode::new(Box::new(behavior), props))
    }

    pub fn set_name(&mut self, node: NodeId, name: &str) -> LayoutResult<()> {
        self.node_mut(node)?.name = SmolStr::new(name);
        Ok(())
    }

    /// Display label used in traces and cycle diagnostics.
    pub fn label(&self, node: NodeId) -> SmolStr {
        match self.nodes.get(node) {
            Some(entry) if !entry.name.is_empty() => entry.name.clone(),
            Some(entry) => format_smolstr!("{}#{}", entry.kind_name(), entry.core.id),
            None => SmolStr::new_static("<removed>"),
        }
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn set_root(&mut self, node: NodeId) -> LayoutResult<()> {
        let entry = self.node_mut(node)?;
        if entry.parent.is_some() {
            return Err(LayoutError::unsupported("use a child node as the root"));
        }
        entry.entered_counter = IN_THIS_TICK;
        self.root = Some(node);
        self.invalidate_measure(node);
        Ok(())
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains_key(node)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> LayoutResult<()> {
        self.check_attachable(parent, child)?;
        self.node_mut(parent)?.children.push(child);
        self.attach(parent, child)
    }

    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) -> LayoutResult<()> {
        self.check_attachable(parent, child)?;
        let children = &mut self.node_mut(parent)?.children;
        let index = index.min(children.len());
        children.insert(index, child);
        self.attach(parent, child)
    }

    fn check_attachable(&self, parent: NodeId, child: NodeId) -> LayoutResult<()> {
        let parent_entry = self.node(parent)?;
        let child_entry = self.node(child)?;
        if !parent_entry
            .behavior
            .as_ref()
            .is_some_and(|behavior| behavior.accepts_children())
        {
            warn!(parent = %self.label(parent), "rejected child for leaf node");
            return Err(LayoutError::unsupported("add a child to a leaf node"));
        }
        if child_entry.parent.is_some() || self.root == Some(child) || parent == child {
            return Err(LayoutError::unsupported("add a node that already has a parent"));
        }
        if self.is_ancestor_of(child, parent) {
            return Err(LayoutError::unsupported("add an ancestor as a child"));
        }
        Ok(())
    }

    fn attach(&mut self, parent: NodeId, child: NodeId) -> LayoutResult<()> {
        let entry = self.node_mut(child)?;
        entry.parent = Some(parent);
        entry.entered_counter = IN_THIS_TICK;
        self.invalidate_measure(child);
        self.invalidate_measure(parent);
        Ok(())
    }

    fn is_ancestor_of(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes.get(id).and_then(|entry| entry.parent);
        }
        false
    }

    /// Moves `child` to `index` among its siblings.
    pub fn move_child_to_index(&mut self, parent: NodeId, child: NodeId, index: usize) -> LayoutResult<()> {
        let entry = self.node(parent)?;
        if !entry
            .behavior
            .as_ref()
            .is_some_and(|behavior| behavior.supports_reordering())
        {
            warn!(parent = %self.label(parent), "rejected reorder");
            return Err(LayoutError::unsupported("reorder children of a cell-positioned panel"));
        }
        let Some(from) = entry.children.iter().position(|id| *id == child) else {
            return Err(LayoutError::unsupported("move a node within a parent it does not belong to"));
        };
        let children = &mut self.node_mut(parent)?.children;
        let child = children.remove(from);
        let index = index.min(children.len());
        children.insert(index, child);
        self.invalidate_measure(parent);
        Ok(())
    }

    /// Detaches `child` from `parent`. With an applicable unload transition
    /// the node stays alive in the parent's unloading list until its
    /// animation finishes; otherwise the subtree is dropped at once.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> LayoutResult<()> {
        let Some(index) = self
            .node(parent)?
            .children
            .iter()
            .position(|id| *id == child)
        else {
            warn!(parent = %self.label(parent), child = %self.label(child), "remove of non-child");
            return Err(LayoutError::unsupported("remove a node from a parent it is not a child of"));
        };

        let animate = self.config.animations_enabled
            && self.node(child)?.core.has_layout_storage()
            && !self
                .applicable_transitions(child, TransitionTrigger::Unload)
                .is_empty();

        let parent_entry = self.node_mut(parent)?;
        parent_entry.children.remove(index);
        if animate {
            parent_entry.unloading_children.push(child);
            self.prepare_transition_storage(child);
            self.node_mut(child)?.left_counter = IN_THIS_TICK;
            self.pending_unloads.push(child);
        } else {
            self.delete_subtree(child);
        }
        self.invalidate_measure(parent);
        Ok(())
    }

    /// Reparents `node` under `new_parent`, keeping its previous on-screen
    /// position in the transition storage so a reparent transition can start
    /// from there.
    pub fn move_child(&mut self, node: NodeId, new_parent: NodeId) -> LayoutResult<()> {
        let old_parent = self
            .node(node)?
            .parent
            .ok_or(LayoutError::unsupported("reparent a node without a parent"))?;
        if old_parent == new_parent {
            return Ok(());
        }
        let old_absolute = self.absolute_offset(node);
        let old_size = self.render_size(node);
        let opacity = self
            .ghosts
            .get(&node)
            .map(|ghost| ghost.opacity)
            .unwrap_or(self.node(node)?.props.opacity);

        {
            let parent_entry = self.node(new_parent)?;
            if !parent_entry
                .behavior
                .as_ref()
                .is_some_and(|behavior| behavior.accepts_children())
            {
                return Err(LayoutError::unsupported("add a child to a leaf node"));
            }
            if self.is_ancestor_of(node, new_parent) {
                return Err(LayoutError::unsupported("add an ancestor as a child"));
            }
        }

        self.node_mut(old_parent)?.children.retain(|id| *id != node);
        self.invalidate_measure(old_parent);
        self.node_mut(new_parent)?.children.push(node);
        self.attach(new_parent, node)?;
        self.node_mut(node)?.left_counter = IN_THIS_TICK;

        let had_layout = self.node(node)?.core.has_layout_storage();
        self.prepare_transition_storage(node);
        let relative = old_absolute - self.absolute_offset(new_parent);
        if let Some(storage) = self.node_mut(node)?.transition.as_deref_mut() {
            if had_layout {
                storage.had_layout = true;
                storage.current_offset = relative;
                storage.current_size = old_size;
                storage.next_generation_offset = relative;
                storage.next_generation_size = old_size;
            }
            storage.opacity_cache = opacity;
        }
        Ok(())
    }

    /// Drops a node whose unload animation has completed or was cancelled.
    pub(crate) fn finish_unload(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes.get(node).and_then(|entry| entry.parent)
            && let Some(parent_entry) = self.nodes.get_mut(parent)
        {
            parent_entry.unloading_children.retain(|id| *id != node);
        }
        self.delete_subtree(node);
    }

    fn delete_subtree(&mut self, node: NodeId) {
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            let Some(entry) = self.nodes.remove(id) else {
                continue;
            };
            if entry.viewport_handler.is_some() {
                self.viewport_listeners = self.viewport_listeners.saturating_sub(1);
            }
            self.ghosts.remove(&id);
            self.pending_unloads.retain(|pending| *pending != id);
            stack.extend(entry.children);
            stack.extend(entry.unloading_children);
        }
        if self.root == Some(node) {
            self.root = None;
        }
    }

    pub fn props(&self, node: NodeId) -> Option<&LayoutProps> {
        self.nodes.get(node).map(|entry| &entry.props)
    }

    pub fn update_props(&mut self, node: NodeId, update: impl FnOnce(&mut LayoutProps)) -> LayoutResult<()> {
        let entry = self.node_mut(node)?;
        let before = entry.props;
        update(&mut entry.props);
        let after = entry.props;
        let parent = entry.parent;
        if before == after {
            return Ok(());
        }
        self.invalidate_measure(node);
        if before.visibility != after.visibility
            && let Some(parent) = parent
        {
            self.invalidate_measure(parent);
        }
        Ok(())
    }

    pub fn behavior<T: Layoutable>(&self, node: NodeId) -> Option<&T> {
        self.nodes
            .get(node)?
            .behavior
            .as_ref()?
            .as_any()
            .downcast_ref::<T>()
    }

    /// Mutates the node's behavior and invalidates its measure.
    pub fn update_behavior<T: Layoutable>(&mut self, node: NodeId, update: impl FnOnce(&mut T)) -> LayoutResult<()> {
        let behavior = self
            .node_mut(node)?
            .behavior
            .as_mut()
            .and_then(|behavior| behavior.as_any_mut().downcast_mut::<T>())
            .ok_or(LayoutError::unsupported("update the behavior of a different node kind"))?;
        update(behavior);
        self.invalidate_measure(node);
        Ok(())
    }

    pub fn grid_cell(&self, node: NodeId) -> GridCell {
        self.nodes
            .get(node)
            .map(|entry| entry.grid_cell)
            .unwrap_or_default()
    }

    pub fn set_grid_cell(&mut self, node: NodeId, cell: GridCell) -> LayoutResult<()> {
        let entry = self.node_mut(node)?;
        if entry.grid_cell == cell {
            return Ok(());
        }
        entry.grid_cell = cell;
        let parent = entry.parent;
        if let Some(parent) = parent {
            self.invalidate_measure(parent);
        }
        Ok(())
    }

    pub fn canvas_position(&self, node: NodeId) -> Vec2 {
        self.nodes
            .get(node)
            .map(|entry| entry.canvas_position)
            .unwrap_or(Vec2::ZERO)
    }

    pub fn set_canvas_position(&mut self, node: NodeId, position: Vec2) -> LayoutResult<()> {
        let entry = self.node_mut(node)?;
        if entry.canvas_position == position {
            return Ok(());
        }
        entry.canvas_position = position;
        let parent = entry.parent;
        if let Some(parent) = parent {
            self.invalidate_arrange(parent);
        }
        Ok(())
    }

    /// Registers a transition that animates `node` itself.
    pub fn add_transition(&mut self, node: NodeId, transition: impl ThemeTransition) -> LayoutResult<TransitionId> {
        self.node(node)?;
        let id = self.transitions.insert(Box::new(transition));
        self.node_mut(node)?.transitions.push(id);
        Ok(id)
    }

    /// Registers a transition that animates every child of `node`.
    pub fn add_child_transition(&mut self, node: NodeId, transition: impl ThemeTransition) -> LayoutResult<TransitionId> {
        self.node(node)?;
        let id = self.transitions.insert(Box::new(transition));
        self.node_mut(node)?.child_transitions.push(id);
        Ok(id)
    }

    pub fn set_size_changed_handler<F>(&mut self, node: NodeId, handler: F) -> LayoutResult<()>
    where
        F: FnMut(&mut LayoutControl<'_>, &SizeChangedEvent) + 'static,
    {
        self.node_mut(node)?.size_changed_handler = Some(Box::new(handler));
        Ok(())
    }

    pub fn set_effective_viewport_handler<F>(&mut self, node: NodeId, handler: F) -> LayoutResult<()>
    where
        F: FnMut(&mut LayoutControl<'_>, &EffectiveViewportChangedEvent) + 'static,
    {
        let entry = self.node_mut(node)?;
        if entry.viewport_handler.is_none() {
            self.viewport_listeners += 1;
        }
        let entry = self.node_mut(node)?;
        entry.viewport_handler = Some(Box::new(handler));
        entry.last_effective_viewport = None;
        self.viewport_walk_requested = true;
        Ok(())
    }

    pub fn invalidate_measure(&mut self, node: NodeId) {
        let Some(entry) = self.nodes.get_mut(node) else {
            return;
        };
        entry
            .core
            .flags
            .insert(LayoutFlags::MEASURE_DIRTY | LayoutFlags::ARRANGE_DIRTY);
        let mut current = entry.parent;
        while let Some(id) = current {
            let Some(ancestor) = self.nodes.get_mut(id) else {
                break;
            };
            ancestor
                .core
                .flags
                .insert(LayoutFlags::ON_MEASURE_DIRTY_PATH | LayoutFlags::ON_ARRANGE_DIRTY_PATH);
            current = ancestor.parent;
        }
    }

    pub fn invalidate_arrange(&mut self, node: NodeId) {
        let Some(entry) = self.nodes.get_mut(node) else {
            return;
        };
        entry.core.flags.insert(LayoutFlags::ARRANGE_DIRTY);
        let mut current = entry.parent;
        while let Some(id) = current {
            let Some(ancestor) = self.nodes.get_mut(id) else {
                break;
            };
            ancestor.core.flags.insert(LayoutFlags::ON_ARRANGE_DIRTY_PATH);
            current = ancestor.parent;
        }
    }

    pub(crate) fn mark_arrange_path(&mut self, node: NodeId) {
        let mut current = self.nodes.get(node).and_then(|entry| entry.parent);
        while let Some(id) = current {
            let Some(ancestor) = self.nodes.get_mut(id) else {
                break;
            };
            if ancestor.core.flags.contains(LayoutFlags::ON_ARRANGE_DIRTY_PATH) {
                break;
            }
            ancestor.core.flags.insert(LayoutFlags::ON_ARRANGE_DIRTY_PATH);
            current = ancestor.parent;
        }
    }

    pub fn invalidate_all(&mut self) {
        for entry in self.nodes.values_mut() {
            entry.core.flags.insert(
                LayoutFlags::MEASURE_DIRTY
                    | LayoutFlags::ARRANGE_DIRTY
                    | LayoutFlags::ON_MEASURE_DIRTY_PATH
                    | LayoutFlags::ON_ARRANGE_DIRTY_PATH,
            );
        }
    }

    pub fn needs_measure(&self, node: NodeId) -> bool {
        self.nodes
            .get(node)
            .is_some_and(|entry| entry.core.flags.intersects(LayoutFlags::MEASURE_PENDING))
    }

    pub fn needs_arrange(&self, node: NodeId) -> bool {
        self.nodes
            .get(node)
            .is_some_and(|entry| entry.core.flags.intersects(LayoutFlags::ARRANGE_PENDING))
    }

    pub fn desired_size(&self, node: NodeId) -> Size {
        self.nodes
            .get(node)
            .map(|entry| entry.core.desired_size)
            .unwrap_or(Size::ZERO)
    }

    pub fn unclipped_desired_size(&self, node: NodeId) -> Size {
        self.nodes
            .get(node)
            .map(|entry| entry.core.unclipped_desired_size)
            .unwrap_or(Size::ZERO)
    }

    /// Arranged size; zero until the node has been arranged once.
    pub fn render_size(&self, node: NodeId) -> Size {
        self.nodes
            .get(node)
            .map(|entry| entry.core.actual_size())
            .unwrap_or(Size::ZERO)
    }

    pub fn visual_offset(&self, node: NodeId) -> Vec2 {
        self.nodes
            .get(node)
            .map(|entry| entry.core.visual_offset)
            .unwrap_or(Vec2::ZERO)
    }

    pub fn layout_rect(&self, node: NodeId) -> Option<Rect> {
        let entry = self.nodes.get(node)?;
        entry
            .core
            .has_layout_storage()
            .then(|| entry.core.layout_rect())
    }

    pub fn requires_clip(&self, node: NodeId) -> bool {
        self.nodes
            .get(node)
            .is_some_and(|entry| entry.core.requires_clip())
    }

    pub fn has_layout_storage(&self, node: NodeId) -> bool {
        self.nodes
            .get(node)
            .is_some_and(|entry| entry.core.has_layout_storage())
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.nodes
            .get(node)
            .map(|entry| entry.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn unloading_children(&self, node: NodeId) -> &[NodeId] {
        self.nodes
            .get(node)
            .map(|entry| entry.unloading_children.as_slice())
            .unwrap_or(&[])
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node).and_then(|entry| entry.parent)
    }

    /// Offset of `node` from the root's origin.
    pub fn absolute_offset(&self, node: NodeId) -> Vec2 {
        let mut offset = Vec2::ZERO;
        let mut current = Some(node);
        while let Some(id) = current {
            let Some(entry) = self.nodes.get(id) else {
                break;
            };
            offset += entry.core.visual_offset;
            current = entry.parent;
        }
        offset
    }

    pub fn ghost(&self, node: NodeId) -> Option<&TransitionGhost> {
        self.ghosts.get(&node)
    }

    pub fn ghosts(&self) -> impl Iterator<Item = (NodeId, &TransitionGhost)> {
        self.ghosts.iter().map(|(node, ghost)| (*node, ghost))
    }

    pub fn transition_storage(&self, node: NodeId) -> Option<&LayoutTransitionStorage> {
        self.nodes.get(node)?.transition.as_deref()
    }

    pub fn transition(&self, id: TransitionId) -> Option<&dyn ThemeTransition> {
        self.transitions.get(id).map(|transition| transition.as_ref())
    }

    pub fn layout_states(&self) -> LayoutStateTree {
        let mut states = LayoutStateTree::new();
        for (id, entry) in &self.nodes {
            let core = &entry.core;
            let size = core.actual_size();
            states.insert(
                id,
                LayoutState::new(core.visual_offset.x, core.visual_offset.y, size.width, size.height)
                    .with_desired(core.desired_size.width, core.desired_size.height),
            );
        }
        states
    }

    /// Transitions on the node itself and its parent's child transitions
    /// that react to `trigger`.
    pub(crate) fn applicable_transitions(&self, node: NodeId, trigger: TransitionTrigger) -> Vec<TransitionId> {
        let Some(entry) = self.nodes.get(node) else {
            return Vec::new();
        };
        let inherited = entry
            .parent
            .and_then(|parent| self.nodes.get(parent))
            .map(|parent| parent.child_transitions.as_slice())
            .unwrap_or(&[]);
        let mut out = Vec::new();
        for id in entry.transitions.iter().chain(inherited) {
            if out.contains(id) {
                continue;
            }
            if self
                .transitions
                .get(*id)
                .is_some_and(|transition| transition.participates(trigger))
            {
                out.push(*id);
            }
        }
        out
    }

    pub(crate) fn has_any_transition(&self, node: NodeId) -> bool {
        let Some(entry) = self.nodes.get(node) else {
            return false;
        };
        !entry.transitions.is_empty()
            || entry
                .parent
                .and_then(|parent| self.nodes.get(parent))
                .is_some_and(|parent| !parent.child_transitions.is_empty())
    }

    pub(crate) fn prepare_transition_storage(&mut self, node: NodeId) {
        if !self.has_any_transition(node) {
            return;
        }
        if let Some(entry) = self.nodes.get_mut(node)
            && entry.transition.is_none()
        {
            entry.transition = Some(Box::new(LayoutTransitionStorage::new(entry.props.opacity)));
        }
    }

    /// Scale used for layout rounding of `node`, `None` when rounding is off.
    pub(crate) fn rounding_scale(&self, node: NodeId) -> Option<f32> {
        let entry = self.nodes.get(node)?;
        entry
            .props
            .use_layout_rounding
            .unwrap_or(self.config.use_layout_rounding)
            .then_some(self.config.scale_factor)
    }

    pub(crate) fn node(&self, node: NodeId) -> LayoutResult<&LayoutNode> {
        self.nodes.get(node).ok_or(LayoutError::MissingNode { node })
    }

    pub(crate) fn node_mut(&mut self, node: NodeId) -> LayoutResult<&mut LayoutNode> {
        self.nodes
            .get_mut(node)
            .ok_or(LayoutError::MissingNode { node })
    }
}

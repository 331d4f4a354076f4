use glam::Vec2;
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use super::{RunResult, StoryboardId, StoryboardRequest, TransitionGhost};
use crate::error::{LayoutError, LayoutResult};
use crate::style::{Rect, Size};
use crate::view::base_component::{IN_THIS_TICK, node_target, target_node};
use crate::view::{LayoutManager, LayoutTree, NodeId, TransitionId};

/// Why a node's geometry is being animated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TransitionTrigger {
    #[default]
    None,
    Load,
    Layout,
    Reparent,
    Unload,
}

/// Per-node transition bookkeeping, allocated the first time a node with a
/// transition on itself or its parent is arranged.
#[derive(Clone, Debug, PartialEq)]
pub struct LayoutTransitionStorage {
    /// Geometry currently on screen, relative to the parent.
    pub(crate) current_offset: Vec2,
    pub(crate) current_size: Size,
    /// Geometry at the start of the current pass generation.
    pub(crate) next_generation_offset: Vec2,
    pub(crate) next_generation_size: Size,
    pub(crate) next_generation_counter: u16,
    pub(crate) had_layout: bool,
    pub(crate) arrange_input: Rect,
    pub(crate) arrange_output: Rect,
    pub(crate) size_start: Size,
    pub(crate) size_destination: Size,
    pub(crate) transform_start: Vec2,
    pub(crate) transform_destination: Vec2,
    pub(crate) opacity_start: f32,
    pub(crate) opacity_destination: f32,
    pub(crate) opacity_cache: f32,
    pub(crate) scale_start: f32,
    pub(crate) registered_transitions: Vec<TransitionId>,
    pub(crate) storyboards: Vec<StoryboardId>,
    pub(crate) trigger: TransitionTrigger,
    pub(crate) registered_in_manager: bool,
    pub(crate) registered_at: u16,
}

impl LayoutTransitionStorage {
    pub(crate) fn new(opacity: f32) -> Self {
        Self {
            current_offset: Vec2::ZERO,
            current_size: Size::ZERO,
            next_generation_offset: Vec2::ZERO,
            next_generation_size: Size::ZERO,
            next_generation_counter: 0,
            had_layout: false,
            arrange_input: Rect::ZERO,
            arrange_output: Rect::ZERO,
            size_start: Size::ZERO,
            size_destination: Size::ZERO,
            transform_start: Vec2::ZERO,
            transform_destination: Vec2::ZERO,
            opacity_start: opacity,
            opacity_destination: opacity,
            opacity_cache: opacity,
            scale_start: 1.0,
            registered_transitions: Vec::new(),
            storyboards: Vec::new(),
            trigger: TransitionTrigger::None,
            registered_in_manager: false,
            registered_at: 0,
        }
    }

    pub fn trigger(&self) -> TransitionTrigger {
        self.trigger
    }

    pub fn current_rect(&self) -> Rect {
        Rect::from_origin_size(self.current_offset, self.current_size)
    }

    /// Geometry the node had when the current pass generation began.
    pub fn next_generation_rect(&self) -> Rect {
        Rect::from_origin_size(self.next_generation_offset, self.next_generation_size)
    }

    pub fn arrange_input(&self) -> Rect {
        self.arrange_input
    }

    pub fn arrange_output(&self) -> Rect {
        self.arrange_output
    }

    pub fn is_registered(&self) -> bool {
        self.registered_in_manager
    }

    pub fn is_animating(&self) -> bool {
        !self.storyboards.is_empty()
    }

    fn snapshot(&self, node: NodeId) -> LayoutTransitionSnapshot {
        LayoutTransitionSnapshot {
            node,
            trigger: self.trigger,
            size_start: self.size_start,
            size_destination: self.size_destination,
            transform_start: self.transform_start,
            transform_destination: self.transform_destination,
            opacity_start: self.opacity_start,
            opacity_destination: self.opacity_destination,
            transitions: self.registered_transitions.clone(),
            counter: self.registered_at,
        }
    }

    fn request(&self, node: NodeId) -> StoryboardRequest {
        StoryboardRequest {
            node,
            trigger: self.trigger,
            size_start: self.size_start,
            size_destination: self.size_destination,
            transform_start: self.transform_start,
            transform_destination: self.transform_destination,
            opacity_start: self.opacity_start,
            opacity_destination: self.opacity_destination,
            scale_start: self.scale_start,
        }
    }
}

/// Before/after record of one realized transition.
#[derive(Clone, Debug, PartialEq)]
pub struct LayoutTransitionSnapshot {
    pub node: NodeId,
    pub trigger: TransitionTrigger,
    pub size_start: Size,
    pub size_destination: Size,
    pub transform_start: Vec2,
    pub transform_destination: Vec2,
    pub opacity_start: f32,
    pub opacity_destination: f32,
    pub transitions: Vec<TransitionId>,
    /// Layout-pass counter of the generation that registered it.
    pub counter: u16,
}

fn moved_beyond(threshold: f32, from: Rect, to: Rect) -> bool {
    (from.x - to.x).abs() > threshold
        || (from.y - to.y).abs() > threshold
        || (from.width - to.width).abs() > threshold
        || (from.height - to.height).abs() > threshold
}

impl LayoutManager {
    /// Called right before `node` commits a new arrange rect.
    pub(crate) fn on_layout_changing(&mut self, tree: &mut LayoutTree, node: NodeId, final_rect: Rect) {
        let counter = self.pass.counter();
        let Some(entry) = tree.nodes.get_mut(node) else {
            return;
        };
        let reparented = entry.entered_counter == IN_THIS_TICK && entry.left_counter == IN_THIS_TICK;
        let had_layout = entry.core.has_layout_storage();
        let offset = entry.core.visual_offset;
        let size = entry.core.render_size;
        let Some(storage) = entry.transition.as_deref_mut() else {
            return;
        };

        storage.arrange_input = final_rect;
        let pending = storage.registered_in_manager && storage.registered_at == counter;
        if reparented || pending {
            // Start geometry is already captured for this generation.
            return;
        }
        storage.had_layout = had_layout;
        if storage.next_generation_counter != counter {
            storage.next_generation_counter = counter;
            if had_layout {
                storage.next_generation_offset = offset;
                storage.next_generation_size = size;
                if storage.storyboards.is_empty() {
                    storage.current_offset = offset;
                    storage.current_size = size;
                }
            }
        }
    }

    /// Called right after `node` committed its arrange rect. Decides the
    /// trigger and registers the node with the applicable transitions.
    pub(crate) fn on_layout_changed(&mut self, tree: &mut LayoutTree, node: NodeId) {
        let counter = self.pass.counter();
        let threshold = tree.config.transition_delta_threshold;
        let Some(entry) = tree.nodes.get(node) else {
            return;
        };
        let Some(storage) = entry.transition.as_deref() else {
            return;
        };
        let rect = entry.core.layout_rect();
        let opacity = entry.props.opacity;
        let pending = storage.registered_in_manager && storage.registered_at == counter;
        let trigger = if pending {
            storage.trigger
        } else if entry.entered_counter != IN_THIS_TICK {
            TransitionTrigger::Layout
        } else if entry.left_counter == IN_THIS_TICK && storage.had_layout {
            TransitionTrigger::Reparent
        } else {
            TransitionTrigger::Load
        };
        let transitions = tree.applicable_transitions(node, trigger);

        let Some(storage) = tree
            .nodes
            .get_mut(node)
            .and_then(|entry| entry.transition.as_deref_mut())
        else {
            return;
        };
        storage.arrange_output = rect;
        if transitions.is_empty() {
            return;
        }

        match trigger {
            TransitionTrigger::Load => {
                storage.size_start = rect.size();
                storage.size_destination = rect.size();
                storage.transform_start = rect.origin();
                storage.transform_destination = rect.origin();
                storage.opacity_start = 1.0;
                storage.opacity_destination = opacity;
                storage.scale_start = 1.0;
            }
            TransitionTrigger::Reparent => {
                storage.size_start = storage.current_size;
                storage.size_destination = rect.size();
                storage.transform_start = storage.current_offset;
                storage.transform_destination = rect.origin();
                storage.opacity_start = storage.opacity_cache;
                storage.opacity_destination = opacity;
                storage.scale_start = 1.0;
            }
            _ => {
                let animating = !storage.storyboards.is_empty();
                let reference = if animating {
                    Rect::from_origin_size(storage.transform_destination, storage.size_destination)
                } else {
                    storage.current_rect()
                };
                if !moved_beyond(threshold, reference, rect) {
                    if !animating {
                        self.unregister_transition(tree, node);
                    }
                    return;
                }
                storage.size_start = storage.current_size;
                storage.size_destination = rect.size();
                storage.transform_start = storage.current_offset;
                storage.transform_destination = rect.origin();
                storage.opacity_start = opacity;
                storage.opacity_destination = opacity;
                storage.scale_start = 1.0;
            }
        }
        self.register_transition(tree, node, trigger, transitions, counter);
    }

    fn register_transition(
        &mut self,
        tree: &mut LayoutTree,
        node: NodeId,
        trigger: TransitionTrigger,
        transitions: Vec<TransitionId>,
        counter: u16,
    ) {
        let Some(storage) = tree
            .nodes
            .get_mut(node)
            .and_then(|entry| entry.transition.as_deref_mut())
        else {
            return;
        };
        storage.trigger = trigger;
        storage.registered_transitions = transitions;
        storage.registered_at = counter;
        if !storage.registered_in_manager {
            storage.registered_in_manager = true;
            self.deferred_transitions.push(node);
        }
        debug!(node = %tree.label(node), ?trigger, counter, "registered layout transition");
    }

    fn unregister_transition(&mut self, tree: &mut LayoutTree, node: NodeId) {
        if let Some(storage) = tree
            .nodes
            .get_mut(node)
            .and_then(|entry| entry.transition.as_deref_mut())
        {
            storage.registered_in_manager = false;
            storage.registered_transitions.clear();
            storage.trigger = TransitionTrigger::None;
        }
        self.deferred_transitions.retain(|id| *id != node);
    }

    /// Registers unload transitions for nodes removed since the last update.
    /// Nodes nothing wants to animate are dropped right away.
    pub(crate) fn process_pending_unloads(&mut self, tree: &mut LayoutTree) {
        let counter = self.pass.counter();
        for node in std::mem::take(&mut tree.pending_unloads) {
            let Some(entry) = tree.nodes.get(node) else {
                continue;
            };
            let transitions = tree.applicable_transitions(node, TransitionTrigger::Unload);
            if transitions.is_empty() || entry.transition.is_none() || !tree.config.animations_enabled {
                tree.finish_unload(node);
                continue;
            }

            let (offset, size, opacity) = match tree.ghosts.get(&node) {
                Some(ghost) => (ghost.offset(), ghost.size, ghost.opacity),
                None => (entry.core.visual_offset, entry.core.render_size, entry.props.opacity),
            };
            let Some(storage) = tree
                .nodes
                .get_mut(node)
                .and_then(|entry| entry.transition.as_deref_mut())
            else {
                continue;
            };
            storage.current_offset = offset;
            storage.current_size = size;
            storage.size_start = size;
            storage.size_destination = size;
            storage.transform_start = offset;
            storage.transform_destination = offset;
            storage.opacity_start = opacity;
            storage.opacity_destination = 1.0;
            storage.scale_start = 1.0;
            storage.arrange_output = Rect::from_origin_size(offset, size);
            self.register_transition(tree, node, TransitionTrigger::Unload, transitions, counter);
        }
    }

    /// Realizes every transition registered during the last update: groups
    /// nodes per transition for staggering, starts their storyboards and
    /// records a snapshot for each one that is set up.
    pub(crate) fn realize_registered_layout_transitions(&mut self, tree: &mut LayoutTree) {
        let registered = std::mem::take(&mut self.deferred_transitions);
        if registered.is_empty() {
            return;
        }

        let mut groups: Vec<(TransitionId, Vec<NodeId>)> = Vec::new();
        for node in &registered {
            let Some(storage) = tree.transition_storage(*node) else {
                continue;
            };
            for id in &storage.registered_transitions {
                match groups.iter_mut().find(|(group, _)| group == id) {
                    Some((_, nodes)) => nodes.push(*node),
                    None => groups.push((*id, vec![*node])),
                }
            }
        }

        let mut delays: FxHashMap<NodeId, u32> = FxHashMap::default();
        for (id, nodes) in &groups {
            let Some(transition) = tree.transitions.get(*id) else {
                continue;
            };
            let slots: Vec<Rect> = nodes.iter().map(|node| layout_slot(tree, *node)).collect();
            for (node, delay) in nodes.iter().zip(transition.stagger_delays(&slots)) {
                let entry = delays.entry(*node).or_insert(0);
                *entry = (*entry).max(delay);
            }
        }

        for node in registered {
            if tree.config.animations_enabled {
                let delay = delays.get(&node).copied().unwrap_or(0);
                self.setup_transition(tree, node, delay);
            }
            match self.validate_transition_was_setup(tree, node) {
                Ok(true) => {
                    if let Some(storage) = tree.transition_storage(node) {
                        self.snapshots.push(storage.snapshot(node));
                    }
                }
                Ok(false) => {}
                Err(err) => warn!(node = %tree.label(node), %err, "discarded layout transition"),
            }
        }
    }

    /// Builds and starts the storyboards of a registered node, replacing the
    /// ones still running. A running ghost hands its animated position over
    /// as the new start.
    fn setup_transition(&mut self, tree: &mut LayoutTree, node: NodeId, begin_delay_ms: u32) {
        let counter = self.pass.counter();
        let Some(storage) = tree
            .nodes
            .get_mut(node)
            .and_then(|entry| entry.transition.as_deref_mut())
        else {
            return;
        };
        if storage.registered_at != counter {
            return;
        }
        for id in storage.storyboards.drain(..) {
            self.storyboards.cancel(id);
        }
        if let Some(ghost) = tree.ghosts.remove(&node)
            && storage.trigger == TransitionTrigger::Layout
        {
            storage.current_offset = ghost.offset();
            storage.current_size = ghost.size;
            storage.transform_start = ghost.offset();
            storage.size_start = ghost.size;
        }

        let request = storage.request(node);
        let specs: Vec<_> = storage
            .registered_transitions
            .iter()
            .filter_map(|id| tree.transitions.get(*id))
            .flat_map(|transition| transition.create_storyboards(&request))
            .filter(|spec| !spec.is_empty())
            .collect();
        if specs.is_empty() {
            return;
        }

        let mut ghost = TransitionGhost::new(
            node,
            request.trigger,
            Rect::from_origin_size(request.transform_destination, request.size_destination),
        );
        ghost.translate = request.translate_start();
        ghost.opacity = request.opacity_start;
        ghost.scale = request.scale_start;
        ghost.visible = !(request.trigger == TransitionTrigger::Load && begin_delay_ms > 0);
        for track in specs.iter().flat_map(|spec| &spec.tracks) {
            ghost.apply(track.field, track.from);
        }

        let mut started = Vec::with_capacity(specs.len());
        for spec in &specs {
            match self.storyboards.start(node_target(node), spec, begin_delay_ms) {
                Ok(id) => started.push(id),
                Err(err) => warn!(node = %tree.label(node), %err, "storyboard rejected"),
            }
        }
        if started.is_empty() {
            return;
        }
        debug!(
            node = %tree.label(node),
            trigger = ?request.trigger,
            storyboards = started.len(),
            delay_ms = begin_delay_ms,
            "started layout transition"
        );
        if let Some(storage) = tree
            .nodes
            .get_mut(node)
            .and_then(|entry| entry.transition.as_deref_mut())
        {
            storage.storyboards = started;
        }
        tree.ghosts.insert(node, ghost);
    }

    /// Checks that a registered transition of `node` was realized in the
    /// current pass generation. Returns whether storyboards are running.
    ///
    /// State registered by an older generation is stale: it is discarded
    /// and the node is re-arranged as if it had just entered the tree.
    pub fn validate_transition_was_setup(&mut self, tree: &mut LayoutTree, node: NodeId) -> LayoutResult<bool> {
        let Some(storage) = tree.transition_storage(node) else {
            return Ok(false);
        };
        if storage.registered_at != self.pass.counter() {
            self.cancel_transitions(tree, node);
            if let Some(entry) = tree.nodes.get_mut(node) {
                entry.entered_counter = IN_THIS_TICK;
            }
            tree.invalidate_arrange(node);
            return Err(LayoutError::StaleTransitionState { node });
        }
        if storage.storyboards.is_empty() {
            self.cancel_transitions(tree, node);
            return Ok(false);
        }
        Ok(true)
    }

    /// Stops every storyboard of `node`, keeping the geometry the ghost had
    /// reached. A cancelled unload drops the node.
    pub fn cancel_transitions(&mut self, tree: &mut LayoutTree, node: NodeId) {
        let ghost = tree.ghosts.remove(&node);
        let Some(storage) = tree
            .nodes
            .get_mut(node)
            .and_then(|entry| entry.transition.as_deref_mut())
        else {
            return;
        };
        if let Some(ghost) = ghost {
            storage.current_offset = ghost.offset();
            storage.current_size = ghost.size;
            storage.opacity_cache = ghost.opacity;
        }
        for id in storage.storyboards.drain(..) {
            self.storyboards.cancel(id);
        }
        let trigger = storage.trigger;
        storage.registered_in_manager = false;
        storage.registered_transitions.clear();
        storage.trigger = TransitionTrigger::None;
        self.deferred_transitions.retain(|id| *id != node);

        if trigger == TransitionTrigger::Unload {
            tree.finish_unload(node);
        }
    }

    fn on_storyboard_completed(&mut self, tree: &mut LayoutTree, node: NodeId) {
        let Some(storage) = tree
            .nodes
            .get_mut(node)
            .and_then(|entry| entry.transition.as_deref_mut())
        else {
            return;
        };
        storage
            .storyboards
            .retain(|id| self.storyboards.is_running(*id));
        if !storage.storyboards.is_empty() {
            return;
        }
        let trigger = storage.trigger;
        let output = storage.arrange_output;

        self.cancel_transitions(tree, node);
        if trigger == TransitionTrigger::Unload {
            return;
        }
        if let Some(storage) = tree
            .nodes
            .get_mut(node)
            .and_then(|entry| entry.transition.as_deref_mut())
        {
            storage.current_offset = output.origin();
            storage.current_size = output.size();
        }
        tree.invalidate_arrange(node);
    }

    /// Advances running storyboards by `dt_seconds`, moves their ghosts and
    /// finishes the transitions whose storyboards all completed.
    pub fn advance_transitions(&mut self, tree: &mut LayoutTree, dt_seconds: f32) -> RunResult {
        let result = self.storyboards.run(dt_seconds);

        for (_, target) in self.storyboards.take_begun() {
            if let Some(ghost) = tree.ghosts.get_mut(&target_node(target)) {
                ghost.visible = true;
            }
        }
        for sample in self.storyboards.take_samples() {
            if let Some(ghost) = tree.ghosts.get_mut(&target_node(sample.target)) {
                ghost.apply(sample.field, sample.value);
            }
        }
        let mut completed: Vec<NodeId> = Vec::new();
        for (_, target) in self.storyboards.take_completed() {
            let node = target_node(target);
            if !completed.contains(&node) {
                completed.push(node);
            }
        }
        for node in completed {
            self.on_storyboard_completed(tree, node);
        }
        result
    }
}

/// Where `node` starts its transition, in root coordinates.
fn layout_slot(tree: &LayoutTree, node: NodeId) -> Rect {
    let Some(storage) = tree.transition_storage(node) else {
        return Rect::ZERO;
    };
    let parent_origin = tree
        .parent(node)
        .map_or(Vec2::ZERO, |parent| tree.absolute_offset(parent));
    Rect::from_origin_size(parent_origin + storage.transform_start, storage.size_start)
}

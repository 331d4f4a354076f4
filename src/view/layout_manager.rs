use glam::Vec2;
use smol_str::SmolStr;
use tracing::{debug, error};

use crate::error::{LayoutError, LayoutResult};
use crate::style::{Rect, Size};
use crate::transition::{LayoutTransitionSnapshot, StoryboardRuntime};
use crate::view::base_component::{LayoutFlags, LayoutTree, NodeId, arrange_node, measure_node};

/// First value of the layout-pass counter. 0 means "never" and 1 marks a
/// node that entered or left during the current tick.
const FIRST_PASS_COUNTER: u16 = 2;

pub type SizeChangedHandler = Box<dyn FnMut(&mut LayoutControl<'_>, &SizeChangedEvent)>;
pub type EffectiveViewportHandler =
    Box<dyn FnMut(&mut LayoutControl<'_>, &EffectiveViewportChangedEvent)>;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SizeChangedEvent {
    pub node: NodeId,
    /// Render size when the node was first queued in this update.
    pub previous: Size,
    pub new: Size,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EffectiveViewportChangedEvent {
    pub node: NodeId,
    /// Visible part of the viewport in node-local coordinates, cut down by
    /// every clipping ancestor.
    pub effective_viewport: Rect,
    pub max_viewport: Rect,
    pub bring_into_view_distance_x: f32,
    pub bring_into_view_distance_y: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RenderInvalidationKind {
    Content,
    Transform,
}

/// A render-side callback recorded during arrange, drained by the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RenderInvalidation {
    pub node: NodeId,
    pub kind: RenderInvalidationKind,
}

/// What notification handlers may touch while the manager is between
/// passes.
pub struct LayoutControl<'a> {
    tree: &'a mut LayoutTree,
    layout_in_progress: bool,
}

impl<'a> LayoutControl<'a> {
    pub(crate) fn new(tree: &'a mut LayoutTree, layout_in_progress: bool) -> Self {
        Self {
            tree,
            layout_in_progress,
        }
    }

    pub fn tree(&self) -> &LayoutTree {
        self.tree
    }

    pub fn tree_mut(&mut self) -> &mut LayoutTree {
        self.tree
    }

    pub fn is_layout_in_progress(&self) -> bool {
        self.layout_in_progress
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PassKind {
    Measure,
    Arrange,
    EffectiveViewport,
    SizeChanged,
}

impl PassKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Measure => "measure",
            Self::Arrange => "arrange",
            Self::EffectiveViewport => "viewport",
            Self::SizeChanged => "size-changed",
        }
    }
}

/// Per-tree pass state: the explicit traversal stack, the 16-bit pass
/// counter and the cycle countdown.
#[derive(Debug)]
pub(crate) struct LayoutPassContext {
    stack: Vec<NodeId>,
    counter: u16,
    countdown: i64,
    max_depth: usize,
    /// Labels of nodes entered during the current iteration, recorded only
    /// inside the diagnostic window.
    trace: Option<Vec<SmolStr>>,
}

impl LayoutPassContext {
    fn new() -> Self {
        Self {
            stack: Vec::new(),
            counter: FIRST_PASS_COUNTER,
            countdown: 0,
            max_depth: crate::config::LayoutConfig::DEFAULT_MAX_DEPTH,
            trace: None,
        }
    }

    pub(crate) fn counter(&self) -> u16 {
        self.counter
    }

    /// Number of nodes currently being measured or arranged.
    pub(crate) fn depth(&self) -> usize {
        self.stack.len()
    }

    pub(crate) fn contains(&self, node: NodeId) -> bool {
        self.stack.contains(&node)
    }

    fn advance_counter(&mut self) {
        self.counter = match self.counter.checked_add(1) {
            Some(next) => next,
            None => FIRST_PASS_COUNTER,
        };
    }
}

/// Drives measure and arrange over a [`LayoutTree`] until it converges.
///
/// One manager belongs to one tree. `SizeChanged` and
/// `EffectiveViewportChanged` are queued during the passes and raised only
/// once the traversal stack is empty.
pub struct LayoutManager {
    pub(crate) pass: LayoutPassContext,
    last_size: Option<Size>,
    size_changed_queue: Vec<(NodeId, Size)>,
    effective_viewport_queue: Vec<EffectiveViewportChangedEvent>,
    pub(crate) deferred_transitions: Vec<NodeId>,
    render_invalidations: Vec<RenderInvalidation>,
    pub(crate) snapshots: Vec<LayoutTransitionSnapshot>,
    pub(crate) storyboards: StoryboardRuntime,
}

impl Default for LayoutManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LayoutManager {
    pub fn new() -> Self {
        Self {
            pass: LayoutPassContext::new(),
            last_size: None,
            size_changed_queue: Vec::new(),
            effective_viewport_queue: Vec::new(),
            deferred_transitions: Vec::new(),
            render_invalidations: Vec::new(),
            snapshots: Vec::new(),
            storyboards: StoryboardRuntime::new(),
        }
    }

    /// True while a measure or arrange is on the traversal stack.
    pub fn is_layout_in_progress(&self) -> bool {
        self.pass.depth() > 0
    }

    /// Whether `node` and each of its ancestors up to and including `target`
    /// are on the traversal stack. Notifications for such a chain have to
    /// wait until the stack unwinds.
    pub fn is_in_flight(&self, tree: &LayoutTree, node: NodeId, target: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if !self.pass.contains(id) {
                return false;
            }
            if id == target {
                return true;
            }
            current = tree.parent(id);
        }
        false
    }

    pub fn layout_pass_counter(&self) -> u16 {
        self.pass.counter
    }

    /// Runs measure and arrange until the tree is clean, then raises the
    /// queued notifications and realizes registered transitions.
    ///
    /// Fails with [`LayoutError::LayoutCycleExceeded`] when the tree keeps
    /// invalidating itself for `cycle_limit` iterations.
    pub fn update_layout(&mut self, tree: &mut LayoutTree, size: Size) -> LayoutResult<()> {
        self.pass.max_depth = tree.config.max_depth;
        self.process_pending_unloads(tree);

        let Some(root) = tree.root else {
            self.last_size = Some(size);
            return Ok(());
        };

        let size_pending = self.last_size != Some(size);
        let root_flags = tree.node(root)?.core.flags;
        if !size_pending
            && !root_flags.intersects(LayoutFlags::MEASURE_PENDING | LayoutFlags::ARRANGE_PENDING)
            && !tree.viewport_walk_requested
            && self.size_changed_queue.is_empty()
            && self.effective_viewport_queue.is_empty()
            && self.deferred_transitions.is_empty()
        {
            return Ok(());
        }

        let result = self.run_layout_loop(tree, root, size, size_pending);
        self.pass.stack.clear();
        self.pass.trace = None;

        match &result {
            Ok(()) => self.realize_registered_layout_transitions(tree),
            Err(_) => {
                for (node, _) in self.size_changed_queue.drain(..) {
                    if let Some(entry) = tree.nodes.get_mut(node) {
                        entry.core.flags.remove(LayoutFlags::SIZE_CHANGED_QUEUED);
                    }
                }
                self.effective_viewport_queue.clear();
            }
        }
        self.pass.advance_counter();
        result
    }

    fn run_layout_loop(
        &mut self,
        tree: &mut LayoutTree,
        root: NodeId,
        size: Size,
        mut size_pending: bool,
    ) -> LayoutResult<()> {
        let limit = tree.config.cycle_limit;
        let window = i64::from(tree.config.diagnostic_window);
        let root_rect = Rect::from_size(size);
        let mut diagnostics = Vec::new();
        self.pass.countdown = i64::from(limit);

        loop {
            if self.pass.countdown <= 0 {
                error!(iterations = limit, ?diagnostics, "layout cycle detected");
                return Err(LayoutError::LayoutCycleExceeded {
                    iterations: limit,
                    diagnostics,
                });
            }
            self.pass.countdown -= 1;
            let countdown = self.pass.countdown;
            self.pass.trace = (countdown < window).then(Vec::new);

            let kind = if size_pending || tree.needs_measure(root) {
                size_pending = false;
                self.last_size = Some(size);
                measure_node(tree, self, root, size)?;
                PassKind::Measure
            } else if tree.needs_arrange(root) || tree.node(root)?.core.final_rect != Some(root_rect) {
                arrange_node(tree, self, root, root_rect)?;
                PassKind::Arrange
            } else if tree.viewport_walk_requested {
                tree.viewport_walk_requested = false;
                self.effective_viewport_walk(tree, root, root_rect);
                self.raise_effective_viewport_changed(tree);
                PassKind::EffectiveViewport
            } else if !self.effective_viewport_queue.is_empty() {
                self.raise_effective_viewport_changed(tree);
                PassKind::EffectiveViewport
            } else if !self.size_changed_queue.is_empty() {
                self.raise_size_changed(tree);
                PassKind::SizeChanged
            } else {
                return Ok(());
            };

            debug!(pass = kind.as_str(), countdown, "layout pass");
            if let Some(nodes) = self.pass.trace.take() {
                diagnostics.push(format!(
                    "Layout Iteration Countdown: {countdown} pass={} nodes=[{}]",
                    kind.as_str(),
                    nodes.join(", ")
                ));
            }
        }
    }

    pub(crate) fn enter_node(&mut self, tree: &LayoutTree, node: NodeId) -> LayoutResult<()> {
        let depth = self.pass.depth();
        if depth >= self.pass.max_depth {
            return Err(LayoutError::LayoutDepthExceeded { depth: depth + 1 });
        }
        self.pass.stack.push(node);
        if let Some(trace) = self.pass.trace.as_mut() {
            let label = tree.label(node);
            if !trace.contains(&label) {
                trace.push(label);
            }
        }
        Ok(())
    }

    pub(crate) fn exit_node(&mut self, node: NodeId) {
        if let Some(index) = self.pass.stack.iter().rposition(|id| *id == node) {
            self.pass.stack.truncate(index);
        }
    }

    /// Marks every stack entry above `target` ancestor-dirty.
    pub(crate) fn propagate_ancestor_dirty(&mut self, tree: &mut LayoutTree, target: NodeId) {
        let Some(index) = self.pass.stack.iter().position(|id| *id == target) else {
            return;
        };
        for node in &self.pass.stack[index + 1..] {
            if let Some(entry) = tree.nodes.get_mut(*node) {
                entry.core.flags.insert(LayoutFlags::ANCESTOR_DIRTY);
            }
        }
    }

    /// Queues a `SizeChanged` for `node` unless it is already queued. Only
    /// nodes with a handler are queued. The event is raised once the
    /// traversal stack is empty.
    pub fn enqueue_size_changed(&mut self, tree: &mut LayoutTree, node: NodeId, previous: Size) {
        let Some(entry) = tree.nodes.get_mut(node) else {
            return;
        };
        if entry.size_changed_handler.is_none()
            || entry.core.flags.contains(LayoutFlags::SIZE_CHANGED_QUEUED)
        {
            return;
        }
        entry.core.flags.insert(LayoutFlags::SIZE_CHANGED_QUEUED);
        self.size_changed_queue.push((node, previous));
    }

    /// Queues an `EffectiveViewportChanged` event. Queued events are raised
    /// in order once the traversal stack is empty.
    pub fn enqueue_effective_viewport_changed(&mut self, event: EffectiveViewportChangedEvent) {
        self.effective_viewport_queue.push(event);
    }

    pub(crate) fn push_render_invalidation(&mut self, node: NodeId, kind: RenderInvalidationKind) {
        let invalidation = RenderInvalidation { node, kind };
        if !self.render_invalidations.contains(&invalidation) {
            self.render_invalidations.push(invalidation);
        }
    }

    pub fn take_render_invalidations(&mut self) -> Vec<RenderInvalidation> {
        std::mem::take(&mut self.render_invalidations)
    }

    /// Snapshots of the transitions realized by past updates, oldest first.
    pub fn take_transition_snapshots(&mut self) -> Vec<LayoutTransitionSnapshot> {
        std::mem::take(&mut self.snapshots)
    }

    fn raise_size_changed(&mut self, tree: &mut LayoutTree) {
        let queue = std::mem::take(&mut self.size_changed_queue);
        for (node, previous) in queue {
            let Some(entry) = tree.nodes.get_mut(node) else {
                continue;
            };
            entry.core.flags.remove(LayoutFlags::SIZE_CHANGED_QUEUED);
            let event = SizeChangedEvent {
                node,
                previous,
                new: entry.core.render_size,
            };
            let Some(mut handler) = entry.size_changed_handler.take() else {
                continue;
            };
            handler(&mut LayoutControl::new(tree, false), &event);
            if let Some(entry) = tree.nodes.get_mut(node)
                && entry.size_changed_handler.is_none()
            {
                entry.size_changed_handler = Some(handler);
            }
        }
    }

    /// Walks the tree with an explicit stack, computing each listener's
    /// viewport and queueing the event where it changed.
    fn effective_viewport_walk(&mut self, tree: &LayoutTree, root: NodeId, root_rect: Rect) {
        let mut pending = vec![(root, Vec2::ZERO, root_rect)];

        while let Some((node, parent_origin, clip)) = pending.pop() {
            let Some(entry) = tree.nodes.get(node) else {
                continue;
            };
            if entry.props.is_collapsed() {
                continue;
            }
            let origin = parent_origin + entry.core.visual_offset;
            let bounds = Rect::from_origin_size(origin, entry.core.render_size);
            // A clipped node is cut to the slot its parent gave it.
            let slot = entry
                .core
                .final_rect
                .map_or(bounds, |rect| rect.translate(parent_origin));

            if entry.viewport_handler.is_some() {
                let event = EffectiveViewportChangedEvent {
                    node,
                    effective_viewport: clip.translate(-origin),
                    max_viewport: root_rect.translate(-origin),
                    bring_into_view_distance_x: bring_into_view_distance(
                        bounds.x,
                        bounds.right(),
                        clip.x,
                        clip.right(),
                    ),
                    bring_into_view_distance_y: bring_into_view_distance(
                        bounds.y,
                        bounds.bottom(),
                        clip.y,
                        clip.bottom(),
                    ),
                };
                if entry.last_effective_viewport != Some(event) {
                    self.enqueue_effective_viewport_changed(event);
                }
            }

            let child_clip = if entry.core.requires_clip() {
                clip.intersect(slot)
            } else {
                clip
            };
            for child in entry.children.iter().rev() {
                pending.push((*child, origin, child_clip));
            }
        }
    }

    fn raise_effective_viewport_changed(&mut self, tree: &mut LayoutTree) {
        let queue = std::mem::take(&mut self.effective_viewport_queue);
        for event in queue {
            let Some(entry) = tree.nodes.get_mut(event.node) else {
                continue;
            };
            entry.last_effective_viewport = Some(event);
            let Some(mut handler) = entry.viewport_handler.take() else {
                continue;
            };
            handler(&mut LayoutControl::new(tree, false), &event);
            if let Some(entry) = tree.nodes.get_mut(event.node)
                && entry.viewport_handler.is_none()
            {
                entry.viewport_handler = Some(handler);
            }
        }
    }
}

fn bring_into_view_distance(start: f32, end: f32, viewport_start: f32, viewport_end: f32) -> f32 {
    if start > viewport_end {
        start - viewport_end
    } else if end < viewport_start {
        end - viewport_start
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use super::*;
    use crate::config::LayoutConfig;
    use crate::style::LayoutProps;
    use crate::view::base_component::{LayoutCx, Layoutable};
    use crate::view::components::{
        Canvas, ContentBox, Grid, GridCell, Orientation, Panel, StackPanel, TrackDefinition,
    };
    use pretty_assertions::assert_eq;

    /// Counts measures and optionally invalidates another node from inside
    /// its own measure.
    struct Probe {
        measures: Rc<Cell<u32>>,
        invalidate: Option<NodeId>,
    }

    impl Layoutable for Probe {
        fn measure_override(&mut self, cx: &mut LayoutCx<'_>, _available: Size) -> LayoutResult<Size> {
            self.measures.set(self.measures.get() + 1);
            if let Some(target) = self.invalidate {
                cx.invalidate_measure(target);
            }
            Ok(Size::new(10.0, 10.0))
        }

        fn arrange_override(&mut self, _cx: &mut LayoutCx<'_>, final_size: Size) -> LayoutResult<Size> {
            Ok(final_size)
        }

        fn accepts_children(&self) -> bool {
            false
        }

        fn kind_name(&self) -> &'static str {
            "Probe"
        }

        fn as_any(&self) -> &dyn std::any::Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
            self
        }
    }

    /// Arranges every child twice per pass: once into a small slot, then
    /// into the real one.
    struct DoubleArrange;

    impl Layoutable for DoubleArrange {
        fn measure_override(&mut self, cx: &mut LayoutCx<'_>, available: Size) -> LayoutResult<Size> {
            for child in cx.children() {
                cx.measure_child(child, available)?;
            }
            Ok(Size::ZERO)
        }

        fn arrange_override(&mut self, cx: &mut LayoutCx<'_>, final_size: Size) -> LayoutResult<Size> {
            for child in cx.children() {
                cx.arrange_child(child, Rect::new(0.0, 0.0, 10.0, 10.0))?;
                cx.arrange_child(child, Rect::from_size(final_size))?;
            }
            Ok(final_size)
        }

        fn kind_name(&self) -> &'static str {
            "DoubleArrange"
        }

        fn as_any(&self) -> &dyn std::any::Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
            self
        }
    }

    /// Records what the traversal stack looks like from inside its measure
    /// and queues two viewport events from inside its arrange.
    struct StackWitness {
        ancestor: NodeId,
        stranger: NodeId,
        seen: Rc<RefCell<Vec<(bool, bool)>>>,
    }

    impl StackWitness {
        fn event(node: NodeId, width: f32) -> EffectiveViewportChangedEvent {
            EffectiveViewportChangedEvent {
                node,
                effective_viewport: Rect::new(0.0, 0.0, width, 10.0),
                max_viewport: Rect::new(0.0, 0.0, 100.0, 100.0),
                bring_into_view_distance_x: 0.0,
                bring_into_view_distance_y: 0.0,
            }
        }
    }

    impl Layoutable for StackWitness {
        fn measure_override(&mut self, cx: &mut LayoutCx<'_>, _available: Size) -> LayoutResult<Size> {
            self.seen
                .borrow_mut()
                .push((cx.is_in_flight(self.ancestor), cx.is_in_flight(self.stranger)));
            Ok(Size::new(10.0, 10.0))
        }

        fn arrange_override(&mut self, cx: &mut LayoutCx<'_>, final_size: Size) -> LayoutResult<Size> {
            let node = cx.node();
            cx.enqueue_effective_viewport_changed(Self::event(node, 1.0));
            cx.enqueue_effective_viewport_changed(Self::event(node, 2.0));
            Ok(final_size)
        }

        fn accepts_children(&self) -> bool {
            false
        }

        fn kind_name(&self) -> &'static str {
            "StackWitness"
        }

        fn as_any(&self) -> &dyn std::any::Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
            self
        }
    }

    fn probe(tree: &mut LayoutTree) -> (NodeId, Rc<Cell<u32>>) {
        let measures = Rc::new(Cell::new(0));
        let node = tree.create_node(Probe {
            measures: measures.clone(),
            invalidate: None,
        });
        (node, measures)
    }

    #[test_log::test]
    fn self_invalidating_tree_fails_after_exactly_the_cycle_limit() {
        let mut tree = LayoutTree::default();
        let root = tree.create_node(Panel::new());
        tree.set_root(root).unwrap();
        let (looper, measures) = probe(&mut tree);
        tree.set_name(looper, "looper").unwrap();
        tree.add_child(root, looper).unwrap();
        tree.update_behavior::<Probe>(looper, |probe| probe.invalidate = Some(root))
            .unwrap();

        let mut manager = LayoutManager::new();
        let error = manager
            .update_layout(&mut tree, Size::new(100.0, 100.0))
            .unwrap_err();

        let LayoutError::LayoutCycleExceeded {
            iterations,
            diagnostics,
        } = error
        else {
            panic!("expected a cycle error, got {error:?}");
        };
        assert_eq!(iterations, 250);
        assert_eq!(measures.get(), 250);
        assert_eq!(diagnostics.len(), 8);
        assert!(diagnostics[0].starts_with("Layout Iteration Countdown: 7 pass=measure"));
        assert!(diagnostics[7].starts_with("Layout Iteration Countdown: 0 "));
        assert!(diagnostics.iter().all(|line| line.contains("looper")));
        assert!(!manager.is_layout_in_progress());
    }

    #[test]
    fn smaller_cycle_limit_is_honored() {
        let mut tree = LayoutTree::new(LayoutConfig::new().cycle_limit(12).diagnostic_window(3));
        let root = tree.create_node(Panel::new());
        tree.set_root(root).unwrap();
        let (looper, measures) = probe(&mut tree);
        tree.add_child(root, looper).unwrap();
        tree.update_behavior::<Probe>(looper, |probe| probe.invalidate = Some(root))
            .unwrap();

        let error = LayoutManager::new()
            .update_layout(&mut tree, Size::new(10.0, 10.0))
            .unwrap_err();

        assert!(matches!(
            &error,
            LayoutError::LayoutCycleExceeded { iterations: 12, diagnostics } if diagnostics.len() == 3
        ));
        assert_eq!(measures.get(), 12);
    }

    #[test]
    fn traversal_depth_is_bounded() {
        let mut tree = LayoutTree::new(LayoutConfig::new().max_depth(16));
        let root = tree.create_node(Panel::new());
        tree.set_root(root).unwrap();
        let mut parent = root;
        for _ in 0..20 {
            let child = tree.create_node(Panel::new());
            tree.add_child(parent, child).unwrap();
            parent = child;
        }

        let mut manager = LayoutManager::new();
        let error = manager
            .update_layout(&mut tree, Size::new(10.0, 10.0))
            .unwrap_err();

        assert_eq!(error, LayoutError::LayoutDepthExceeded { depth: 17 });
        assert!(error.is_fatal());
        assert!(!manager.is_layout_in_progress());
    }

    #[test]
    fn size_changed_fires_once_per_node_after_the_pass() {
        let mut tree = LayoutTree::default();
        let root = tree.create_node(DoubleArrange);
        tree.set_root(root).unwrap();

        let events: Rc<RefCell<Vec<(SizeChangedEvent, bool)>>> = Rc::default();
        let mut children = Vec::new();
        for _ in 0..2 {
            let child = tree.create_node(ContentBox::new(Size::new(5.0, 5.0)));
            tree.add_child(root, child).unwrap();
            let sink = events.clone();
            tree.set_size_changed_handler(child, move |control, event| {
                sink.borrow_mut()
                    .push((*event, control.is_layout_in_progress()));
            })
            .unwrap();
            children.push(child);
        }

        let mut manager = LayoutManager::new();
        manager
            .update_layout(&mut tree, Size::new(50.0, 40.0))
            .unwrap();

        let expected: Vec<(SizeChangedEvent, bool)> = children
            .iter()
            .map(|&node| {
                (
                    SizeChangedEvent {
                        node,
                        previous: Size::ZERO,
                        new: Size::new(50.0, 40.0),
                    },
                    false,
                )
            })
            .collect();
        assert_eq!(*events.borrow(), expected);

        manager
            .update_layout(&mut tree, Size::new(50.0, 40.0))
            .unwrap();
        assert_eq!(events.borrow().len(), 2);
    }

    #[test]
    fn size_changed_reports_the_last_size_of_the_pass() {
        let mut tree = LayoutTree::default();
        let root = tree.create_node(DoubleArrange);
        tree.set_root(root).unwrap();
        let child = tree.create_node(ContentBox::new(Size::new(5.0, 5.0)));
        tree.add_child(root, child).unwrap();
        let events: Rc<RefCell<Vec<SizeChangedEvent>>> = Rc::default();
        let sink = events.clone();
        tree.set_size_changed_handler(child, move |_, event| sink.borrow_mut().push(*event))
            .unwrap();

        let mut manager = LayoutManager::new();
        manager.update_layout(&mut tree, Size::new(50.0, 40.0)).unwrap();
        manager.update_layout(&mut tree, Size::new(60.0, 30.0)).unwrap();

        assert_eq!(
            events.borrow()[1..].to_vec(),
            vec![SizeChangedEvent {
                node: child,
                previous: Size::new(50.0, 40.0),
                new: Size::new(60.0, 30.0),
            }]
        );
    }

    #[test]
    fn viewport_events_queued_during_arrange_are_raised_in_order() {
        let mut tree = LayoutTree::default();
        let root = tree.create_node(Panel::new());
        tree.set_root(root).unwrap();
        let stranger = tree.create_node(Panel::new());
        tree.add_child(root, stranger).unwrap();
        let middle = tree.create_node(Panel::new());
        tree.add_child(root, middle).unwrap();
        let seen: Rc<RefCell<Vec<(bool, bool)>>> = Rc::default();
        let witness = tree.create_node(StackWitness {
            ancestor: root,
            stranger,
            seen: seen.clone(),
        });
        tree.add_child(middle, witness).unwrap();

        let events: Rc<RefCell<Vec<(EffectiveViewportChangedEvent, bool)>>> = Rc::default();
        let sink = events.clone();
        tree.set_effective_viewport_handler(witness, move |control, event| {
            sink.borrow_mut()
                .push((*event, control.is_layout_in_progress()));
        })
        .unwrap();

        let mut manager = LayoutManager::new();
        manager.update_layout(&mut tree, Size::new(100.0, 100.0)).unwrap();

        assert_eq!(*seen.borrow(), vec![(true, false)]);
        assert!(!manager.is_in_flight(&tree, witness, root));

        let events = events.borrow();
        assert_eq!(
            events[..2].to_vec(),
            vec![
                (StackWitness::event(witness, 1.0), false),
                (StackWitness::event(witness, 2.0), false),
            ]
        );
        // The walk's own event follows the queued ones.
        assert_eq!(events.len(), 3);
        assert_eq!(events[2].0.node, witness);
    }

    #[test]
    fn size_changed_handler_may_dirty_the_tree() {
        let mut tree = LayoutTree::default();
        let root = tree.create_node(StackPanel::new(Orientation::Vertical));
        tree.set_root(root).unwrap();
        let first = tree.create_node(ContentBox::new(Size::new(5.0, 10.0)));
        let second = tree.create_node(ContentBox::new(Size::new(5.0, 10.0)));
        tree.add_child(root, first).unwrap();
        tree.add_child(root, second).unwrap();
        tree.set_size_changed_handler(first, move |control, event| {
            let height = event.new.height * 2.0;
            control
                .tree_mut()
                .update_props(second, |props| props.height = Some(height))
                .unwrap();
        })
        .unwrap();

        LayoutManager::new()
            .update_layout(&mut tree, Size::new(100.0, 100.0))
            .unwrap();

        assert_eq!(tree.render_size(second).height, 20.0);
        assert_eq!(tree.visual_offset(second).y, 10.0);
        assert!(!tree.needs_measure(root));
    }

    #[test]
    fn repeated_updates_are_idempotent() {
        let mut tree = LayoutTree::default();
        let root = tree.create_node(
            Grid::new()
                .columns([TrackDefinition::star(1.0), TrackDefinition::auto()])
                .rows([TrackDefinition::auto(), TrackDefinition::star(2.0)]),
        );
        tree.set_root(root).unwrap();
        let stack = tree.create_node(StackPanel::new(Orientation::Horizontal).spacing(3.0));
        tree.add_child(root, stack).unwrap();
        tree.set_grid_cell(stack, GridCell::new(1, 1)).unwrap();
        for width in [12.5, 30.0, 7.25] {
            let leaf = tree.create_node_with_props(
                ContentBox::new(Size::new(width, 9.0)),
                LayoutProps::new().margin(crate::style::Thickness::uniform(1.5)),
            );
            tree.add_child(stack, leaf).unwrap();
        }

        let mut manager = LayoutManager::new();
        manager
            .update_layout(&mut tree, Size::new(333.0, 211.0))
            .unwrap();
        let first = tree.layout_states();

        manager
            .update_layout(&mut tree, Size::new(333.0, 211.0))
            .unwrap();
        assert_eq!(tree.layout_states(), first);

        tree.invalidate_all();
        manager
            .update_layout(&mut tree, Size::new(333.0, 211.0))
            .unwrap();
        assert_eq!(tree.layout_states(), first);
    }

    #[test]
    fn unchanged_tree_returns_early() {
        let mut tree = LayoutTree::default();
        let root = tree.create_node(Panel::new());
        tree.set_root(root).unwrap();
        let (leaf, measures) = probe(&mut tree);
        tree.add_child(root, leaf).unwrap();

        let mut manager = LayoutManager::new();
        manager.update_layout(&mut tree, Size::new(40.0, 40.0)).unwrap();
        assert_eq!(measures.get(), 1);
        let counter = manager.layout_pass_counter();

        manager.update_layout(&mut tree, Size::new(40.0, 40.0)).unwrap();
        assert_eq!(measures.get(), 1);
        assert_eq!(manager.layout_pass_counter(), counter);

        manager.update_layout(&mut tree, Size::new(60.0, 40.0)).unwrap();
        assert_eq!(measures.get(), 2);
        assert_eq!(tree.render_size(leaf), Size::new(60.0, 40.0));
    }

    #[test]
    fn effective_viewport_reports_distance_and_only_changes() {
        let mut tree = LayoutTree::default();
        let root = tree.create_node(Canvas::new());
        tree.set_root(root).unwrap();
        let child = tree.create_node(ContentBox::new(Size::new(30.0, 30.0)));
        tree.add_child(root, child).unwrap();
        tree.set_canvas_position(child, Vec2::new(150.0, 20.0)).unwrap();

        let events: Rc<RefCell<Vec<EffectiveViewportChangedEvent>>> = Rc::default();
        let sink = events.clone();
        tree.set_effective_viewport_handler(child, move |_, event| sink.borrow_mut().push(*event))
            .unwrap();

        let mut manager = LayoutManager::new();
        manager.update_layout(&mut tree, Size::new(100.0, 100.0)).unwrap();
        assert_eq!(
            *events.borrow(),
            vec![EffectiveViewportChangedEvent {
                node: child,
                effective_viewport: Rect::new(-150.0, -20.0, 100.0, 100.0),
                max_viewport: Rect::new(-150.0, -20.0, 100.0, 100.0),
                bring_into_view_distance_x: 50.0,
                bring_into_view_distance_y: 0.0,
            }]
        );

        manager.update_layout(&mut tree, Size::new(100.0, 100.0)).unwrap();
        assert_eq!(events.borrow().len(), 1);

        tree.set_canvas_position(child, Vec2::new(10.0, 10.0)).unwrap();
        manager.update_layout(&mut tree, Size::new(100.0, 100.0)).unwrap();
        let events = events.borrow();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].bring_into_view_distance_x, 0.0);
        assert_eq!(events[1].effective_viewport, Rect::new(-10.0, -10.0, 100.0, 100.0));
    }

    #[test]
    fn clipping_ancestor_narrows_the_effective_viewport() {
        let mut tree = LayoutTree::default();
        let root = tree.create_node(Canvas::new());
        tree.set_root(root).unwrap();
        let frame = tree.create_node_with_props(Panel::new(), LayoutProps::new().size(40.0, 40.0));
        tree.add_child(root, frame).unwrap();
        tree.set_canvas_position(frame, Vec2::new(10.0, 10.0)).unwrap();
        let content = tree.create_node_with_props(Panel::new(), LayoutProps::new().size(100.0, 100.0));
        tree.add_child(frame, content).unwrap();
        let leaf = tree.create_node(ContentBox::new(Size::ZERO));
        tree.add_child(content, leaf).unwrap();

        let events: Rc<RefCell<Vec<EffectiveViewportChangedEvent>>> = Rc::default();
        let sink = events.clone();
        tree.set_effective_viewport_handler(leaf, move |_, event| sink.borrow_mut().push(*event))
            .unwrap();

        LayoutManager::new()
            .update_layout(&mut tree, Size::new(200.0, 200.0))
            .unwrap();

        assert!(tree.requires_clip(content));
        assert!(!tree.requires_clip(frame));
        let events = events.borrow();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].effective_viewport, Rect::new(0.0, 0.0, 40.0, 40.0));
        assert_eq!(events[0].max_viewport, Rect::new(-10.0, -10.0, 200.0, 200.0));
    }

    #[test]
    fn pass_counter_skips_reserved_values() {
        let mut context = LayoutPassContext::new();
        assert_eq!(context.counter(), 2);
        context.counter = u16::MAX;
        context.advance_counter();
        assert_eq!(context.counter(), 2);
        assert_eq!(context.depth(), 0);
        assert!(!context.contains(NodeId::default()));
    }
}

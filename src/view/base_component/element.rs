use std::any::Any;

use glam::Vec2;
use tracing::trace;

use super::{LayoutFlags, LayoutTree, NodeId};
use crate::config::trace_layout_enabled;
use crate::error::{LayoutError, LayoutResult};
use crate::style::{Alignment, Rect, Size, layout_round, layout_round_floor};
use crate::view::components::GridCell;
use crate::view::layout_manager::{
    EffectiveViewportChangedEvent, LayoutManager, RenderInvalidationKind,
};

/// Node-kind specific sizing: the two overrides called from inside the
/// framework's measure and arrange.
pub trait Layoutable: Any {
    /// Desired size of the content given the space left after margins and
    /// min/max clamping. Each axis of `available` may be infinite.
    fn measure_override(&mut self, cx: &mut LayoutCx<'_>, available: Size) -> LayoutResult<Size>;

    /// Arranges children inside `final_size` and returns the size used.
    fn arrange_override(&mut self, cx: &mut LayoutCx<'_>, final_size: Size) -> LayoutResult<Size>;

    fn accepts_children(&self) -> bool {
        true
    }

    fn supports_reordering(&self) -> bool {
        true
    }

    fn kind_name(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Handle given to overrides: access to the node's children and the ability
/// to measure and arrange them.
pub struct LayoutCx<'a> {
    pub(crate) tree: &'a mut LayoutTree,
    pub(crate) manager: &'a mut LayoutManager,
    node: NodeId,
}

impl<'a> LayoutCx<'a> {
    pub(crate) fn new(tree: &'a mut LayoutTree, manager: &'a mut LayoutManager, node: NodeId) -> Self {
        Self {
            tree,
            manager,
            node,
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.tree.parent(self.node)
    }

    pub fn tree(&self) -> &LayoutTree {
        self.tree
    }

    pub fn children(&self) -> Vec<NodeId> {
        self.tree.children(self.node).to_vec()
    }

    pub fn measure_child(&mut self, child: NodeId, available: Size) -> LayoutResult<Size> {
        measure_node(self.tree, self.manager, child, available)?;
        Ok(self.tree.desired_size(child))
    }

    pub fn arrange_child(&mut self, child: NodeId, final_rect: Rect) -> LayoutResult<()> {
        arrange_node(self.tree, self.manager, child, final_rect)
    }

    pub fn desired_size(&self, child: NodeId) -> Size {
        self.tree.desired_size(child)
    }

    pub fn is_collapsed(&self, child: NodeId) -> bool {
        self.tree
            .props(child)
            .is_none_or(|props| props.is_collapsed())
    }

    pub fn grid_cell(&self, child: NodeId) -> GridCell {
        self.tree.grid_cell(child)
    }

    pub fn canvas_position(&self, child: NodeId) -> Vec2 {
        self.tree.canvas_position(child)
    }

    pub fn rounding_scale(&self) -> Option<f32> {
        self.tree.rounding_scale(self.node)
    }

    /// Rounds to device pixels when rounding is on for this node.
    pub fn layout_round(&self, value: f32) -> f32 {
        match self.rounding_scale() {
            Some(scale) => layout_round(value, scale),
            None => value,
        }
    }

    /// Invalidates `target`'s measure. When `target` is an ancestor being
    /// laid out right now, every node between it and this one is marked
    /// ancestor-dirty so the next pass measures them again.
    pub fn invalidate_measure(&mut self, target: NodeId) {
        self.tree.invalidate_measure(target);
        if self.is_in_flight(target) {
            self.manager.propagate_ancestor_dirty(self.tree, target);
        }
    }

    /// Whether this node and its ancestors up to `target` are all being laid
    /// out right now.
    pub fn is_in_flight(&self, target: NodeId) -> bool {
        self.manager.is_in_flight(self.tree, self.node, target)
    }

    pub fn enqueue_size_changed(&mut self, node: NodeId, previous: Size) {
        self.manager.enqueue_size_changed(self.tree, node, previous);
    }

    pub fn enqueue_effective_viewport_changed(&mut self, event: EffectiveViewportChangedEvent) {
        self.manager.enqueue_effective_viewport_changed(event);
    }

    pub fn invalidate_arrange(&mut self, target: NodeId) {
        self.tree.invalidate_arrange(target);
    }
}

pub(crate) fn measure_node(
    tree: &mut LayoutTree,
    manager: &mut LayoutManager,
    node: NodeId,
    available: Size,
) -> LayoutResult<()> {
    let entry = tree.node_mut(node)?;
    if entry.props.is_collapsed() {
        entry.core.desired_size = Size::ZERO;
        entry.core.unclipped_desired_size = Size::ZERO;
        entry.core.previous_available = Some(available);
        entry.core.flags.remove(LayoutFlags::MEASURE_PENDING);
        return Ok(());
    }

    let flags = entry.core.flags;
    let full = flags.intersects(LayoutFlags::MEASURE_DIRTY | LayoutFlags::ANCESTOR_DIRTY)
        || entry.core.previous_available != Some(available);
    if !full && !flags.contains(LayoutFlags::ON_MEASURE_DIRTY_PATH) {
        return Ok(());
    }

    manager.enter_node(tree, node)?;
    let result = if full {
        measure_core(tree, manager, node, available)
    } else {
        measure_dirty_path(tree, manager, node, available)
    };
    manager.exit_node(node);
    result
}

/// Re-measures only the dirty children; escalates to a full measure when a
/// child's desired size moved.
fn measure_dirty_path(
    tree: &mut LayoutTree,
    manager: &mut LayoutManager,
    node: NodeId,
    available: Size,
) -> LayoutResult<()> {
    tree.node_mut(node)?
        .core
        .flags
        .remove(LayoutFlags::ON_MEASURE_DIRTY_PATH);

    let mut escalate = false;
    for child in tree.children(node).to_vec() {
        let child_entry = tree.node(child)?;
        if !child_entry
            .core
            .flags
            .intersects(LayoutFlags::MEASURE_PENDING)
        {
            continue;
        }
        let Some(previous) = child_entry.core.previous_available else {
            escalate = true;
            break;
        };
        let before = child_entry.core.desired_size;
        measure_node(tree, manager, child, previous)?;
        if tree.desired_size(child) != before {
            escalate = true;
            break;
        }
    }

    if escalate {
        measure_core(tree, manager, node, available)
    } else {
        Ok(())
    }
}

fn measure_core(
    tree: &mut LayoutTree,
    manager: &mut LayoutManager,
    node: NodeId,
    available: Size,
) -> LayoutResult<()> {
    let scale = tree.rounding_scale(node);
    let entry = tree.node_mut(node)?;
    entry.core.flags.remove(
        LayoutFlags::MEASURE_DIRTY | LayoutFlags::ON_MEASURE_DIRTY_PATH | LayoutFlags::ANCESTOR_DIRTY,
    );
    entry.core.flags.insert(LayoutFlags::ARRANGE_DIRTY);
    entry.core.previous_available = Some(available);
    let props = entry.props;
    tree.mark_arrange_path(node);

    let round = |value: f32| scale.map_or(value, |scale| layout_round(value, scale));
    let margin = props.margin.map(round);
    let bounds = props.min_max();

    let mut framework_available = Size::new(
        (available.width - margin.horizontal()).max(0.0),
        (available.height - margin.vertical()).max(0.0),
    );
    if let Some(scale) = scale {
        framework_available = Size::new(
            layout_round_floor(framework_available.width, scale),
            layout_round_floor(framework_available.height, scale),
        );
    }
    framework_available = framework_available.min(bounds.max).max(bounds.min);

    let measured = run_override(tree, manager, node, |behavior, cx| {
        behavior.measure_override(cx, framework_available)
    })?;

    // NaN from an override counts as unset and falls back to the minimum.
    let desired = measured.max(bounds.min);
    let desired = Size::new(round(desired.width), round(desired.height));
    let unclipped = desired;
    let desired = desired.min(bounds.max);

    let clipped = Size::new(
        desired.width + margin.horizontal(),
        desired.height + margin.vertical(),
    )
    .min(available)
    .non_negative();
    let clipped = Size::new(round(clipped.width), round(clipped.height));

    let entry = tree.node_mut(node)?;
    entry.core.unclipped_desired_size = unclipped;
    entry.core.desired_size = clipped;

    if trace_layout_enabled() {
        trace!(
            node = %tree.label(node),
            ?available,
            desired = ?clipped,
            "measure"
        );
    }
    Ok(())
}

pub(crate) fn arrange_node(
    tree: &mut LayoutTree,
    manager: &mut LayoutManager,
    node: NodeId,
    final_rect: Rect,
) -> LayoutResult<()> {
    let entry = tree.node_mut(node)?;
    if entry.props.is_collapsed() {
        entry.core.flags.remove(LayoutFlags::ARRANGE_PENDING);
        return Ok(());
    }

    if entry.core.flags.intersects(LayoutFlags::MEASURE_PENDING) {
        let available = entry
            .core
            .previous_available
            .unwrap_or(final_rect.size());
        measure_node(tree, manager, node, available)?;
    }

    let entry = tree.node(node)?;
    let full = entry.core.flags.contains(LayoutFlags::ARRANGE_DIRTY)
        || entry.core.final_rect != Some(final_rect);
    if !full && !entry.core.flags.contains(LayoutFlags::ON_ARRANGE_DIRTY_PATH) {
        return Ok(());
    }

    manager.enter_node(tree, node)?;
    let result = if full {
        arrange_full(tree, manager, node, final_rect)
    } else {
        arrange_dirty_path(tree, manager, node, final_rect)
    };
    manager.exit_node(node);
    result
}

fn arrange_dirty_path(
    tree: &mut LayoutTree,
    manager: &mut LayoutManager,
    node: NodeId,
    final_rect: Rect,
) -> LayoutResult<()> {
    tree.node_mut(node)?
        .core
        .flags
        .remove(LayoutFlags::ON_ARRANGE_DIRTY_PATH);

    for child in tree.children(node).to_vec() {
        let child_entry = tree.node(child)?;
        if !child_entry
            .core
            .flags
            .intersects(LayoutFlags::ARRANGE_PENDING)
        {
            continue;
        }
        match child_entry.core.final_rect {
            Some(rect) => arrange_node(tree, manager, child, rect)?,
            None => return arrange_full(tree, manager, node, final_rect),
        }
    }
    Ok(())
}

fn arrange_full(
    tree: &mut LayoutTree,
    manager: &mut LayoutManager,
    node: NodeId,
    final_rect: Rect,
) -> LayoutResult<()> {
    tree.prepare_transition_storage(node);
    manager.on_layout_changing(tree, node, final_rect);

    arrange_core(tree, manager, node, final_rect)?;

    let entry = tree.node_mut(node)?;
    entry.core.final_rect = Some(final_rect);
    entry.core.flags.insert(LayoutFlags::HAS_LAYOUT_STORAGE);

    manager.on_layout_changed(tree, node);

    let counter = manager.pass.counter();
    let entry = tree.node_mut(node)?;
    if entry.entered_counter == super::IN_THIS_TICK {
        entry.entered_counter = counter;
    }
    if entry.left_counter == super::IN_THIS_TICK {
        entry.left_counter = counter;
    }
    Ok(())
}

fn arrange_core(
    tree: &mut LayoutTree,
    manager: &mut LayoutManager,
    node: NodeId,
    final_rect: Rect,
) -> LayoutResult<()> {
    let scale = tree.rounding_scale(node);
    let entry = tree.node_mut(node)?;
    entry
        .core
        .flags
        .remove(LayoutFlags::ARRANGE_DIRTY | LayoutFlags::ON_ARRANGE_DIRTY_PATH);
    let props = entry.props;
    let unclipped = entry.core.unclipped_desired_size;
    let had_layout = entry.core.has_layout_storage();
    let old_render = entry.core.render_size;
    let old_offset = entry.core.visual_offset;

    let round = |value: f32| scale.map_or(value, |scale| layout_round(value, scale));
    let margin = props.margin.map(round);
    let bounds = props.min_max();

    let client = Size::new(
        (final_rect.width - margin.horizontal()).max(0.0),
        (final_rect.height - margin.vertical()).max(0.0),
    );
    let mut arrange_size = client;
    let mut needs_clip = false;

    if arrange_size.width < unclipped.width {
        needs_clip = true;
        arrange_size.width = unclipped.width;
    }
    if arrange_size.height < unclipped.height {
        needs_clip = true;
        arrange_size.height = unclipped.height;
    }
    if props.horizontal_alignment != Alignment::Stretch {
        arrange_size.width = unclipped.width;
    }
    if props.vertical_alignment != Alignment::Stretch {
        arrange_size.height = unclipped.height;
    }

    let effective_max = bounds.max.max(unclipped);
    if effective_max.width < arrange_size.width {
        needs_clip = true;
        arrange_size.width = effective_max.width;
    }
    if effective_max.height < arrange_size.height {
        needs_clip = true;
        arrange_size.height = effective_max.height;
    }

    let inner = run_override(tree, manager, node, |behavior, cx| {
        behavior.arrange_override(cx, arrange_size)
    })?;

    let mut render_size = inner.non_negative();
    if let Some(scale) = scale
        && scale != 1.0
    {
        render_size = Size::new(
            layout_round(render_size.width, scale),
            layout_round(render_size.height, scale),
        );
    }

    let clipped_ink = render_size.min(bounds.max);
    needs_clip |= clipped_ink.width < render_size.width || clipped_ink.height < render_size.height;
    needs_clip |= client.width < clipped_ink.width || client.height < clipped_ink.height;

    let offset = Vec2::new(
        alignment_offset(props.horizontal_alignment, client.width, clipped_ink.width)
            + final_rect.x
            + margin.left,
        alignment_offset(props.vertical_alignment, client.height, clipped_ink.height)
            + final_rect.y
            + margin.top,
    );
    let offset = Vec2::new(round(offset.x), round(offset.y));

    let entry = tree.node_mut(node)?;
    entry.core.render_size = render_size;
    entry.core.visual_offset = offset;
    entry.core.set_requires_clip(needs_clip);

    let size_changed = !had_layout || old_render != render_size;
    let offset_changed = old_offset != offset;
    if size_changed {
        manager.enqueue_size_changed(tree, node, old_render);
        manager.push_render_invalidation(node, RenderInvalidationKind::Content);
    }
    if offset_changed {
        manager.push_render_invalidation(node, RenderInvalidationKind::Transform);
    }
    if (size_changed || offset_changed) && tree.viewport_listeners > 0 {
        tree.viewport_walk_requested = true;
    }

    if trace_layout_enabled() {
        trace!(
            node = %tree.label(node),
            ?final_rect,
            render = ?render_size,
            clip = needs_clip,
            "arrange"
        );
    }
    Ok(())
}

/// Offset of `ink` inside `client` for one axis. Stretched content that
/// overflows is pinned to the start.
fn alignment_offset(alignment: Alignment, client: f32, ink: f32) -> f32 {
    let alignment = match alignment {
        Alignment::Stretch if ink > client => Alignment::Start,
        other => other,
    };
    match alignment {
        Alignment::Start => 0.0,
        Alignment::Center | Alignment::Stretch => (client - ink) * 0.5,
        Alignment::End => client - ink,
    }
}

/// Lends the node's behavior to `call` and puts it back afterwards, also
/// when the override fails.
fn run_override(
    tree: &mut LayoutTree,
    manager: &mut LayoutManager,
    node: NodeId,
    call: impl FnOnce(&mut dyn Layoutable, &mut LayoutCx<'_>) -> LayoutResult<Size>,
) -> LayoutResult<Size> {
    let Some(mut behavior) = tree.node_mut(node)?.behavior.take() else {
        return Err(LayoutError::unsupported("re-enter the layout of a node"));
    };
    let result = {
        let mut cx = LayoutCx::new(tree, manager, node);
        call(behavior.as_mut(), &mut cx)
    };
    if let Some(entry) = tree.nodes.get_mut(node) {
        entry.behavior = Some(behavior);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::{LayoutProps, Thickness, Visibility};
    use crate::view::components::{ContentBox, Panel};
    use crate::view::layout_manager::LayoutManager;
    use pretty_assertions::assert_eq;

    fn layout(tree: &mut LayoutTree, size: Size) {
        let mut manager = LayoutManager::new();
        manager.update_layout(tree, size).unwrap();
    }

    #[test]
    fn alignment_offsets() {
        assert_eq!(alignment_offset(Alignment::Start, 100.0, 40.0), 0.0);
        assert_eq!(alignment_offset(Alignment::Center, 100.0, 40.0), 30.0);
        assert_eq!(alignment_offset(Alignment::End, 100.0, 40.0), 60.0);
        assert_eq!(alignment_offset(Alignment::Stretch, 100.0, 140.0), 0.0);
    }

    #[test]
    fn margin_and_explicit_size_shape_desired_size() {
        let mut tree = LayoutTree::default();
        let root = tree.create_node(Panel::new());
        let child = tree.create_node_with_props(
            ContentBox::new(Size::new(10.0, 10.0)),
            LayoutProps::new()
                .size(50.0, 20.0)
                .margin(Thickness::new(5.0, 1.0, 5.0, 1.0))
                .align(Alignment::Center, Alignment::Start),
        );
        tree.set_root(root).unwrap();
        tree.add_child(root, child).unwrap();

        layout(&mut tree, Size::new(200.0, 100.0));

        assert_eq!(tree.desired_size(child), Size::new(60.0, 22.0));
        assert_eq!(tree.render_size(child), Size::new(50.0, 20.0));
        assert_eq!(tree.visual_offset(child), Vec2::new(75.0, 1.0));
        assert!(!tree.requires_clip(child));
    }

    #[test]
    fn desired_size_is_clamped_to_available() {
        let mut tree = LayoutTree::default();
        let root = tree.create_node(Panel::new());
        let child = tree.create_node(ContentBox::new(Size::new(300.0, 30.0)));
        tree.set_root(root).unwrap();
        tree.add_child(root, child).unwrap();

        layout(&mut tree, Size::new(100.0, 100.0));

        assert_eq!(tree.desired_size(child), Size::new(100.0, 30.0));
        assert_eq!(tree.unclipped_desired_size(child), Size::new(100.0, 30.0));
    }

    #[test]
    fn min_size_larger_than_slot_requires_clip() {
        let mut tree = LayoutTree::default();
        let root = tree.create_node(Panel::new());
        let child = tree.create_node_with_props(
            ContentBox::new(Size::ZERO),
            LayoutProps::new().min_size(150.0, 10.0),
        );
        tree.set_root(root).unwrap();
        tree.add_child(root, child).unwrap();

        layout(&mut tree, Size::new(100.0, 100.0));

        assert_eq!(tree.unclipped_desired_size(child), Size::new(150.0, 10.0));
        assert_eq!(tree.render_size(child), Size::new(150.0, 100.0));
        assert!(tree.requires_clip(child));
        assert_eq!(tree.visual_offset(child).x, 0.0);
    }

    #[test]
    fn collapsed_children_take_no_space() {
        let mut tree = LayoutTree::default();
        let root = tree.create_node(Panel::new());
        let child = tree.create_node_with_props(
            ContentBox::new(Size::new(40.0, 40.0)),
            LayoutProps::new().visibility(Visibility::Collapsed),
        );
        tree.set_root(root).unwrap();
        tree.add_child(root, child).unwrap();

        layout(&mut tree, Size::new(100.0, 100.0));

        assert_eq!(tree.desired_size(child), Size::ZERO);
        assert_eq!(tree.render_size(child), Size::ZERO);
        assert!(!tree.has_layout_storage(child));
    }

    #[test]
    fn layout_rounding_snaps_to_device_pixels() {
        let mut tree = LayoutTree::new(crate::LayoutConfig::new().scale_factor(2.0));
        let root = tree.create_node(Panel::new());
        let child = tree.create_node_with_props(
            ContentBox::new(Size::new(10.3, 10.3)),
            LayoutProps::new().align(Alignment::Start, Alignment::Start),
        );
        tree.set_root(root).unwrap();
        tree.add_child(root, child).unwrap();

        layout(&mut tree, Size::new(100.0, 100.0));

        assert_eq!(tree.desired_size(child), Size::new(10.5, 10.5));
        assert_eq!(tree.render_size(child), Size::new(10.5, 10.5));
    }

    /// Content whose measure reports a NaN width.
    struct NanWidth;

    impl Layoutable for NanWidth {
        fn measure_override(&mut self, _cx: &mut LayoutCx<'_>, _available: Size) -> LayoutResult<Size> {
            Ok(Size::new(f32::NAN, 12.0))
        }

        fn arrange_override(&mut self, _cx: &mut LayoutCx<'_>, final_size: Size) -> LayoutResult<Size> {
            Ok(final_size)
        }

        fn kind_name(&self) -> &'static str {
            "NanWidth"
        }

        crate::view::components::impl_layoutable_any!();
    }

    #[test]
    fn nan_content_falls_back_to_min() {
        let mut tree = LayoutTree::default();
        let root = tree.create_node(Panel::new());
        let bare = tree.create_node_with_props(
            NanWidth,
            LayoutProps::new().align(Alignment::Start, Alignment::Start),
        );
        let bounded = tree.create_node_with_props(
            NanWidth,
            LayoutProps::new()
                .min_size(15.0, 0.0)
                .align(Alignment::Start, Alignment::Start),
        );
        tree.set_root(root).unwrap();
        tree.add_child(root, bare).unwrap();
        tree.add_child(root, bounded).unwrap();

        layout(&mut tree, Size::new(100.0, 100.0));

        assert_eq!(tree.desired_size(bare), Size::new(0.0, 12.0));
        assert_eq!(tree.desired_size(bounded), Size::new(15.0, 12.0));
        assert_eq!(tree.render_size(bounded), Size::new(15.0, 12.0));
    }

    #[test]
    fn nan_explicit_size_counts_as_unset() {
        let mut tree = LayoutTree::default();
        let root = tree.create_node(Panel::new());
        let child = tree.create_node_with_props(
            ContentBox::new(Size::new(20.0, 10.0)),
            LayoutProps::new().align(Alignment::Start, Alignment::Start),
        );
        tree.set_root(root).unwrap();
        tree.add_child(root, child).unwrap();
        tree.update_props(child, |props| props.width = Some(f32::NAN))
            .unwrap();

        layout(&mut tree, Size::new(100.0, 100.0));

        assert_eq!(tree.desired_size(child), Size::new(20.0, 10.0));
        assert_eq!(tree.render_size(child), Size::new(20.0, 10.0));
    }

    #[test]
    fn negative_margins_grow_past_the_slot() {
        let mut tree = LayoutTree::default();
        let root = tree.create_node(Panel::new());
        let free = tree.create_node_with_props(
            ContentBox::new(Size::new(20.0, 20.0)),
            LayoutProps::new().margin(Thickness::uniform(-10.0)),
        );
        let capped = tree.create_node_with_props(
            ContentBox::new(Size::new(20.0, 20.0)),
            LayoutProps::new()
                .margin(Thickness::uniform(-10.0))
                .max_size(50.0, 50.0),
        );
        tree.set_root(root).unwrap();
        tree.add_child(root, free).unwrap();
        tree.add_child(root, capped).unwrap();

        layout(&mut tree, Size::new(100.0, 100.0));

        assert_eq!(tree.desired_size(free), Size::ZERO);
        assert_eq!(tree.unclipped_desired_size(free), Size::new(20.0, 20.0));
        assert_eq!(tree.render_size(free), Size::new(120.0, 120.0));
        assert_eq!(tree.visual_offset(free), Vec2::new(-10.0, -10.0));
        assert!(!tree.requires_clip(free));

        assert_eq!(tree.render_size(capped), Size::new(50.0, 50.0));
        assert_eq!(tree.visual_offset(capped), Vec2::new(25.0, 25.0));
        assert!(tree.requires_clip(capped));
    }

    #[test]
    fn render_size_is_zero_before_first_arrange() {
        let mut tree = LayoutTree::default();
        let node = tree.create_node(ContentBox::new(Size::new(10.0, 10.0)));
        assert_eq!(tree.render_size(node), Size::ZERO);
        assert_eq!(tree.layout_rect(node), None);
    }
}

use bitflags::bitflags;
use glam::Vec2;

use super::next_ui_node_id;
use crate::style::{Rect, Size};

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct LayoutFlags: u16 {
        const MEASURE_DIRTY = 1 << 0;
        const ARRANGE_DIRTY = 1 << 1;
        const ON_MEASURE_DIRTY_PATH = 1 << 2;
        const ON_ARRANGE_DIRTY_PATH = 1 << 3;
        /// A descendant invalidated an ancestor while both were on the
        /// traversal stack; the next measure must not be skipped.
        const ANCESTOR_DIRTY = 1 << 4;
        /// Set once the node completed its first arrange.
        const HAS_LAYOUT_STORAGE = 1 << 5;
        const SIZE_CHANGED_QUEUED = 1 << 6;
        const REQUIRES_CLIP = 1 << 7;
    }
}

impl LayoutFlags {
    pub const MEASURE_PENDING: Self = Self::MEASURE_DIRTY
        .union(Self::ON_MEASURE_DIRTY_PATH)
        .union(Self::ANCESTOR_DIRTY);
    pub const ARRANGE_PENDING: Self = Self::ARRANGE_DIRTY.union(Self::ON_ARRANGE_DIRTY_PATH);
}

/// Mutable layout state of one node.
#[derive(Clone, Debug)]
pub(crate) struct LayoutCore {
    pub id: u64,
    pub flags: LayoutFlags,
    pub desired_size: Size,
    pub unclipped_desired_size: Size,
    pub render_size: Size,
    pub visual_offset: Vec2,
    pub previous_available: Option<Size>,
    pub final_rect: Option<Rect>,
}

impl LayoutCore {
    pub fn new() -> Self {
        Self::new_with_id(next_ui_node_id())
    }

    pub fn new_with_id(id: u64) -> Self {
        Self {
            id,
            flags: LayoutFlags::MEASURE_DIRTY | LayoutFlags::ARRANGE_DIRTY,
            desired_size: Size::ZERO,
            unclipped_desired_size: Size::ZERO,
            render_size: Size::ZERO,
            visual_offset: Vec2::ZERO,
            previous_available: None,
            final_rect: None,
        }
    }

    pub fn has_layout_storage(&self) -> bool {
        self.flags.contains(LayoutFlags::HAS_LAYOUT_STORAGE)
    }

    /// Render size, or zero before the first arrange.
    pub fn actual_size(&self) -> Size {
        if self.has_layout_storage() {
            self.render_size
        } else {
            Size::ZERO
        }
    }

    pub fn layout_rect(&self) -> Rect {
        Rect::from_origin_size(self.visual_offset, self.render_size)
    }

    pub fn set_requires_clip(&mut self, requires_clip: bool) {
        self.flags.set(LayoutFlags::REQUIRES_CLIP, requires_clip);
    }

    pub fn requires_clip(&self) -> bool {
        self.flags.contains(LayoutFlags::REQUIRES_CLIP)
    }
}

#[cfg(test)]
mod tests {
    use super::{LayoutCore, LayoutFlags};
    use crate::style::Size;

    #[test]
    fn fresh_core_is_dirty_without_storage() {
        let core = LayoutCore::new_with_id(7);

        assert!(core.flags.contains(LayoutFlags::MEASURE_DIRTY | LayoutFlags::ARRANGE_DIRTY));
        assert!(!core.has_layout_storage());
        assert_eq!(core.actual_size(), Size::ZERO);
    }

    #[test]
    fn actual_size_needs_layout_storage() {
        let mut core = LayoutCore::new_with_id(7);
        core.render_size = Size::new(10.0, 10.0);
        assert_eq!(core.actual_size(), Size::ZERO);

        core.flags = LayoutFlags::HAS_LAYOUT_STORAGE;
        assert_eq!(core.actual_size(), Size::new(10.0, 10.0));
        assert!(!core.flags.intersects(LayoutFlags::MEASURE_PENDING | LayoutFlags::ARRANGE_PENDING));
    }
}

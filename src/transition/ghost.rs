use glam::Vec2;

use super::{GhostField, TransitionTrigger};
use crate::style::{Rect, Size};
use crate::view::NodeId;

/// Stand-in drawn in place of a node while its storyboards run. The node
/// itself already sits at its destination; the ghost carries the animated
/// offset from there.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransitionGhost {
    pub node: NodeId,
    pub trigger: TransitionTrigger,
    pub destination_offset: Vec2,
    pub size: Size,
    pub translate: Vec2,
    pub scale: f32,
    pub opacity: f32,
    pub visible: bool,
}

impl TransitionGhost {
    pub(crate) fn new(node: NodeId, trigger: TransitionTrigger, destination: Rect) -> Self {
        Self {
            node,
            trigger,
            destination_offset: destination.origin(),
            size: destination.size(),
            translate: Vec2::ZERO,
            scale: 1.0,
            opacity: 1.0,
            visible: true,
        }
    }

    /// Offset the ghost is currently drawn at, relative to its parent.
    pub fn offset(&self) -> Vec2 {
        self.destination_offset + self.translate
    }

    pub fn bounds(&self) -> Rect {
        Rect::from_origin_size(
            self.offset(),
            Size::new(self.size.width * self.scale, self.size.height * self.scale),
        )
    }

    pub(crate) fn apply(&mut self, field: GhostField, value: f32) {
        match field {
            GhostField::TranslateX => self.translate.x = value,
            GhostField::TranslateY => self.translate.y = value,
            GhostField::Opacity => self.opacity = value.clamp(0.0, 1.0),
            GhostField::Scale => self.scale = value.max(0.0),
        }
    }
}

use glam::Vec2;

use super::impl_layoutable_any;
use crate::error::LayoutResult;
use crate::style::{Rect, Size};
use crate::view::base_component::{LayoutCx, Layoutable};

/// Places children at their attached canvas position with their desired
/// size. Reports no desired size of its own.
#[derive(Clone, Copy, Debug, Default)]
pub struct Canvas;

impl Canvas {
    pub fn new() -> Self {
        Self
    }
}

impl Layoutable for Canvas {
    fn measure_override(&mut self, cx: &mut LayoutCx<'_>, _available: Size) -> LayoutResult<Size> {
        for child in cx.children() {
            cx.measure_child(child, Size::INFINITE)?;
        }
        Ok(Size::ZERO)
    }

    fn arrange_override(&mut self, cx: &mut LayoutCx<'_>, final_size: Size) -> LayoutResult<Size> {
        for child in cx.children() {
            let position = cx.canvas_position(child);
            let position = Vec2::new(cx.layout_round(position.x), cx.layout_round(position.y));
            cx.arrange_child(child, Rect::from_origin_size(position, cx.desired_size(child)))?;
        }
        Ok(final_size)
    }

    fn kind_name(&self) -> &'static str {
        "Canvas"
    }

    impl_layoutable_any!();
}

use super::impl_layoutable_any;
use crate::error::LayoutResult;
use crate::style::{Rect, Size};
use crate::view::base_component::{LayoutCx, Layoutable};

/// Overlays its children: desired size is the largest child and every child
/// gets the whole final rect.
#[derive(Clone, Copy, Debug, Default)]
pub struct Panel;

impl Panel {
    pub fn new() -> Self {
        Self
    }
}

impl Layoutable for Panel {
    fn measure_override(&mut self, cx: &mut LayoutCx<'_>, available: Size) -> LayoutResult<Size> {
        let mut desired = Size::ZERO;
        for child in cx.children() {
            desired = desired.max(cx.measure_child(child, available)?);
        }
        Ok(desired)
    }

    fn arrange_override(&mut self, cx: &mut LayoutCx<'_>, final_size: Size) -> LayoutResult<Size> {
        for child in cx.children() {
            cx.arrange_child(child, Rect::from_size(final_size))?;
        }
        Ok(final_size)
    }

    fn kind_name(&self) -> &'static str {
        "Panel"
    }

    impl_layoutable_any!();
}

use super::impl_layoutable_any;
use crate::error::LayoutResult;
use crate::style::Size;
use crate::view::base_component::{LayoutCx, Layoutable};

/// Leaf standing in for measured content such as text or an image.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ContentBox {
    pub intrinsic: Size,
}

impl ContentBox {
    pub fn new(intrinsic: Size) -> Self {
        Self { intrinsic }
    }

    pub fn set_intrinsic(&mut self, intrinsic: Size) {
        self.intrinsic = intrinsic;
    }
}

impl Layoutable for ContentBox {
    fn measure_override(&mut self, _cx: &mut LayoutCx<'_>, available: Size) -> LayoutResult<Size> {
        Ok(self.intrinsic.non_negative().min(available))
    }

    fn arrange_override(&mut self, _cx: &mut LayoutCx<'_>, final_size: Size) -> LayoutResult<Size> {
        Ok(final_size)
    }

    fn accepts_children(&self) -> bool {
        false
    }

    fn kind_name(&self) -> &'static str {
        "ContentBox"
    }

    impl_layoutable_any!();
}

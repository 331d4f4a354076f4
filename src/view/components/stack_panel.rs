use super::impl_layoutable_any;
use crate::error::LayoutResult;
use crate::style::{Rect, Size};
use crate::view::base_component::{LayoutCx, Layoutable};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Orientation {
    #[default]
    Vertical,
    Horizontal,
}

/// Lines children up along one axis. Each child is offered unbounded space
/// along that axis.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StackPanel {
    pub orientation: Orientation,
    pub spacing: f32,
}

impl StackPanel {
    pub fn new(orientation: Orientation) -> Self {
        Self {
            orientation,
            spacing: 0.0,
        }
    }

    pub fn spacing(mut self, spacing: f32) -> Self {
        self.spacing = spacing.max(0.0);
        self
    }
}

impl Layoutable for StackPanel {
    fn measure_override(&mut self, cx: &mut LayoutCx<'_>, available: Size) -> LayoutResult<Size> {
        let child_available = match self.orientation {
            Orientation::Vertical => Size::new(available.width, f32::INFINITY),
            Orientation::Horizontal => Size::new(f32::INFINITY, available.height),
        };
        let mut along = 0.0_f32;
        let mut across = 0.0_f32;
        let mut visible = 0usize;
        for child in cx.children() {
            let desired = cx.measure_child(child, child_available)?;
            if cx.is_collapsed(child) {
                continue;
            }
            visible += 1;
            match self.orientation {
                Orientation::Vertical => {
                    along += desired.height;
                    across = across.max(desired.width);
                }
                Orientation::Horizontal => {
                    along += desired.width;
                    across = across.max(desired.height);
                }
            }
        }
        along += self.spacing * visible.saturating_sub(1) as f32;
        Ok(match self.orientation {
            Orientation::Vertical => Size::new(across, along),
            Orientation::Horizontal => Size::new(along, across),
        })
    }

    fn arrange_override(&mut self, cx: &mut LayoutCx<'_>, final_size: Size) -> LayoutResult<Size> {
        let mut cursor = 0.0_f32;
        for child in cx.children() {
            if cx.is_collapsed(child) {
                continue;
            }
            let desired = cx.desired_size(child);
            let rect = match self.orientation {
                Orientation::Vertical => Rect::new(0.0, cursor, final_size.width, desired.height),
                Orientation::Horizontal => Rect::new(cursor, 0.0, desired.width, final_size.height),
            };
            cx.arrange_child(child, rect)?;
            cursor += match self.orientation {
                Orientation::Vertical => desired.height,
                Orientation::Horizontal => desired.width,
            } + self.spacing;
        }
        Ok(final_size)
    }

    fn kind_name(&self) -> &'static str {
        "StackPanel"
    }

    impl_layoutable_any!();
}

use super::{Size, Thickness};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Alignment {
    #[default]
    Stretch,
    Start,
    Center,
    End,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Visibility {
    #[default]
    Visible,
    Collapsed,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MinMax {
    pub min: Size,
    pub max: Size,
}

/// Layout-affecting properties of a node. Explicit sizes are `None` when
/// unset; a `NaN` passed to the setters counts as unset.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayoutProps {
    pub width: Option<f32>,
    pub height: Option<f32>,
    pub min_width: f32,
    pub min_height: f32,
    pub max_width: f32,
    pub max_height: f32,
    pub margin: Thickness,
    pub horizontal_alignment: Alignment,
    pub vertical_alignment: Alignment,
    pub visibility: Visibility,
    pub use_layout_rounding: Option<bool>,
    pub opacity: f32,
}

impl Default for LayoutProps {
    fn default() -> Self {
        Self::new()
    }
}

impl LayoutProps {
    pub const fn new() -> Self {
        Self {
            width: None,
            height: None,
            min_width: 0.0,
            min_height: 0.0,
            max_width: f32::INFINITY,
            max_height: f32::INFINITY,
            margin: Thickness::ZERO,
            horizontal_alignment: Alignment::Stretch,
            vertical_alignment: Alignment::Stretch,
            visibility: Visibility::Visible,
            use_layout_rounding: None,
            opacity: 1.0,
        }
    }

    pub fn width(mut self, width: f32) -> Self {
        self.width = explicit(width);
        self
    }

    pub fn height(mut self, height: f32) -> Self {
        self.height = explicit(height);
        self
    }

    pub fn size(self, width: f32, height: f32) -> Self {
        self.width(width).height(height)
    }

    pub fn min_size(mut self, min_width: f32, min_height: f32) -> Self {
        self.min_width = non_nan_or(min_width, 0.0);
        self.min_height = non_nan_or(min_height, 0.0);
        self
    }

    pub fn max_size(mut self, max_width: f32, max_height: f32) -> Self {
        self.max_width = non_nan_or(max_width, f32::INFINITY);
        self.max_height = non_nan_or(max_height, f32::INFINITY);
        self
    }

    pub fn margin(mut self, margin: Thickness) -> Self {
        self.margin = margin;
        self
    }

    pub fn align(mut self, horizontal: Alignment, vertical: Alignment) -> Self {
        self.horizontal_alignment = horizontal;
        self.vertical_alignment = vertical;
        self
    }

    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn layout_rounding(mut self, enabled: bool) -> Self {
        self.use_layout_rounding = Some(enabled);
        self
    }

    pub fn opacity(mut self, opacity: f32) -> Self {
        self.opacity = non_nan_or(opacity, 1.0).clamp(0.0, 1.0);
        self
    }

    pub fn is_collapsed(&self) -> bool {
        self.visibility == Visibility::Collapsed
    }

    /// Effective bounds per axis: an explicit size pins both ends, `min`
    /// always wins over `max`.
    pub fn min_max(&self) -> MinMax {
        let (min_width, max_width) = axis_min_max(
            self.width.and_then(explicit),
            non_nan_or(self.min_width, 0.0),
            non_nan_or(self.max_width, f32::INFINITY),
        );
        let (min_height, max_height) = axis_min_max(
            self.height.and_then(explicit),
            non_nan_or(self.min_height, 0.0),
            non_nan_or(self.max_height, f32::INFINITY),
        );
        MinMax {
            min: Size::new(min_width, min_height),
            max: Size::new(max_width, max_height),
        }
    }
}

fn axis_min_max(explicit: Option<f32>, min: f32, max: f32) -> (f32, f32) {
    let resolved_max = explicit.unwrap_or(f32::INFINITY).min(max).max(min);
    let resolved_min = explicit.unwrap_or(0.0).min(resolved_max).max(min);
    (resolved_min, resolved_max)
}

fn explicit(value: f32) -> Option<f32> {
    (!value.is_nan()).then_some(value)
}

fn non_nan_or(value: f32, fallback: f32) -> f32 {
    if value.is_nan() { fallback } else { value }
}

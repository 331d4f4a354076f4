use glam::Vec2;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const ZERO: Self = Self::new(0.0, 0.0);
    pub const INFINITE: Self = Self::new(f32::INFINITY, f32::INFINITY);

    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn min(self, rhs: Self) -> Self {
        Self::new(self.width.min(rhs.width), self.height.min(rhs.height))
    }

    pub fn max(self, rhs: Self) -> Self {
        Self::new(self.width.max(rhs.width), self.height.max(rhs.height))
    }

    pub fn non_negative(self) -> Self {
        self.max(Self::ZERO)
    }

    pub fn is_finite(self) -> bool {
        self.width.is_finite() && self.height.is_finite()
    }

    pub fn to_vec2(self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub const fn from_size(size: Size) -> Self {
        Self::new(0.0, 0.0, size.width, size.height)
    }

    pub const fn from_origin_size(origin: Vec2, size: Size) -> Self {
        Self::new(origin.x, origin.y, size.width, size.height)
    }

    pub fn origin(self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    pub const fn size(self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn right(self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(self) -> f32 {
        self.y + self.height
    }

    pub fn translate(self, delta: Vec2) -> Self {
        Self::new(self.x + delta.x, self.y + delta.y, self.width, self.height)
    }

    /// Empty intersections collapse to a zero-sized rect at the clamped origin.
    pub fn intersect(self, rhs: Self) -> Self {
        let x = self.x.max(rhs.x);
        let y = self.y.max(rhs.y);
        let right = self.right().min(rhs.right());
        let bottom = self.bottom().min(rhs.bottom());
        Self::new(x, y, (right - x).max(0.0), (bottom - y).max(0.0))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Thickness {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Thickness {
    pub const ZERO: Self = Self::uniform(0.0);

    pub const fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub const fn uniform(value: f32) -> Self {
        Self::new(value, value, value, value)
    }

    pub fn horizontal(self) -> f32 {
        self.left + self.right
    }

    pub fn vertical(self) -> f32 {
        self.top + self.bottom
    }

    pub fn combined(self) -> Size {
        Size::new(self.horizontal(), self.vertical())
    }

    pub fn map(self, f: impl Fn(f32) -> f32) -> Self {
        Self::new(f(self.left), f(self.top), f(self.right), f(self.bottom))
    }
}

/// Snaps `value` to the nearest device pixel.
pub fn layout_round(value: f32, scale: f32) -> f32 {
    if !value.is_finite() || scale <= 0.0 {
        return value;
    }
    (value * scale).round() / scale
}

/// Snaps `value` down to a device pixel; used for available sizes so content
/// never receives more room than the slot has.
pub fn layout_round_floor(value: f32, scale: f32) -> f32 {
    if !value.is_finite() || scale <= 0.0 {
        return value;
    }
    (value * scale).floor() / scale
}

use crate::style::{GridLength, GridUnitType};

/// One row or column of a [`Grid`](super::Grid).
///
/// `length`, `min` and `max` are user input; the remaining fields are
/// recomputed on every measure and arrange.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackDefinition {
    pub length: GridLength,
    pub min: f32,
    pub max: f32,
    /// `length.unit`, or `Auto` when the length is out of its domain.
    pub(crate) user_unit: GridUnitType,
    pub(crate) invalid_length: bool,
    pub(crate) effective_unit: GridUnitType,
    pub(crate) effective_min: f32,
    pub(crate) measure_arrange_size: f32,
    pub(crate) size_cache: f32,
    pub(crate) final_offset: f32,
}

impl Default for TrackDefinition {
    fn default() -> Self {
        Self::new(GridLength::default())
    }
}

impl TrackDefinition {
    pub const fn new(length: GridLength) -> Self {
        Self {
            length,
            min: 0.0,
            max: f32::INFINITY,
            user_unit: length.unit,
            invalid_length: false,
            effective_unit: length.unit,
            effective_min: 0.0,
            measure_arrange_size: 0.0,
            size_cache: 0.0,
            final_offset: 0.0,
        }
    }

    pub const fn auto() -> Self {
        Self::new(GridLength::AUTO)
    }

    pub const fn pixel(value: f32) -> Self {
        Self::new(GridLength::pixel(value))
    }

    pub const fn star(weight: f32) -> Self {
        Self::new(GridLength::star(weight))
    }

    /// Parses the track grammar; malformed input becomes an `Auto` track.
    pub fn parse(input: &str) -> Self {
        Self::new(GridLength::parse_or_auto(input))
    }

    pub const fn min(mut self, min: f32) -> Self {
        self.min = min;
        self
    }

    pub const fn max(mut self, max: f32) -> Self {
        self.max = max;
        self
    }

    /// Resolved size after the last measure or arrange.
    pub fn actual_size(&self) -> f32 {
        self.measure_arrange_size
    }

    /// Offset from the grid's inner origin after the last arrange, not
    /// counting spacing.
    pub fn offset(&self) -> f32 {
        self.final_offset
    }

    pub(crate) fn user_min(&self) -> f32 {
        if self.min.is_nan() { 0.0 } else { self.min.max(0.0) }
    }

    pub(crate) fn user_max(&self) -> f32 {
        if self.max.is_nan() { f32::INFINITY } else { self.max.max(0.0) }
    }

    pub(crate) fn preferred_size(&self) -> f32 {
        if self.effective_unit != GridUnitType::Auto
            && self.effective_min < self.measure_arrange_size
        {
            self.measure_arrange_size
        } else {
            self.effective_min
        }
    }

    pub(crate) fn update_effective_min(&mut self, size: f32) {
        self.effective_min = self.effective_min.max(size);
    }
}

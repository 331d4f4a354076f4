/// Easing curve of a storyboard track.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TimeFunction {
    Linear,
    EaseIn,
    #[default]
    EaseOut,
    EaseInOut,
}

impl TimeFunction {
    pub fn sample(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::EaseIn => t * t,
            Self::EaseOut => 1.0 - (1.0 - t) * (1.0 - t),
            Self::EaseInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - ((-2.0 * t + 2.0).powi(2) * 0.5)
                }
            }
        }
    }

    /// Value between `from` and `to` at progress `t`.
    pub fn interpolate(self, from: f32, to: f32, t: f32) -> f32 {
        from + (to - from) * self.sample(t)
    }
}

/// Progress in `[0, 1]` of a track that has run for `elapsed_seconds`, or
/// `None` while it is still inside its delay.
pub fn normalized_timeline_progress(
    elapsed_seconds: f32,
    delay_seconds: f32,
    duration_seconds: f32,
) -> Option<f32> {
    if elapsed_seconds < delay_seconds {
        return None;
    }
    if duration_seconds <= f32::EPSILON {
        return Some(1.0);
    }
    Some(((elapsed_seconds - delay_seconds) / duration_seconds).clamp(0.0, 1.0))
}
